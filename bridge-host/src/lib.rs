// Host-side half of the bridge: TCP command listener, main-thread execution
// scheduler, command registry, and the reference handlers over an in-memory
// scene store. Embed this inside the content tool being controlled; the demo
// binary in main.rs stands in for such a host.

pub mod handlers;
pub mod listener;
pub mod registry;
pub mod scene;
pub mod scheduler;
