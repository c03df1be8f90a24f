// Main-thread execution handoff. The host's object graph tolerates exactly
// one mutating thread, so connection tasks never call a handler themselves:
// they queue the decoded command here and await the reply. Whatever thread
// runs the executor is the designated main thread.

use std::panic::{AssertUnwindSafe, catch_unwind};

use anyhow::{Result, anyhow};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error};

use scenebridge_protocol::{Command, Response};

use crate::registry::CommandRegistry;
use crate::scene::SceneStore;

struct ScheduledCommand {
    command: Command,
    reply: oneshot::Sender<Response>,
}

/// Producer half, cloned into every connection task. The underlying channel
/// is unbounded and FIFO; commands run in the order they were scheduled,
/// interleaved only with whatever else the host does between drains.
#[derive(Clone)]
pub struct Scheduler {
    tx: mpsc::UnboundedSender<ScheduledCommand>,
}

impl Scheduler {
    /// Queue one command for the executor thread. The returned receiver
    /// resolves once the handler has run; it errors only if the executor
    /// shut down before getting to it.
    pub fn schedule(&self, command: Command) -> Result<oneshot::Receiver<Response>> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(ScheduledCommand {
                command,
                reply: reply_tx,
            })
            .map_err(|_| anyhow!("Host executor is not running"))?;
        Ok(reply_rx)
    }
}

/// Consumer half. Owns the registry and the scene store outright - there is
/// no lock around either, thread affinity is the synchronization.
pub struct Executor {
    rx: mpsc::UnboundedReceiver<ScheduledCommand>,
    registry: CommandRegistry,
    store: SceneStore,
}

/// Build a connected scheduler/executor pair.
pub fn channel(registry: CommandRegistry, store: SceneStore) -> (Scheduler, Executor) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Scheduler { tx }, Executor {
        rx,
        registry,
        store,
    })
}

impl Executor {
    /// Block on the queue until every `Scheduler` handle has been dropped.
    /// Call this from the thread that owns the host's state; it must not run
    /// inside an async context.
    pub fn run(mut self) {
        while let Some(job) = self.rx.blocking_recv() {
            self.execute(job);
        }
        debug!("Executor queue closed, stopping");
    }

    /// Execute everything currently queued and return how many commands ran.
    /// For hosts that poll once per frame instead of parking a thread.
    pub fn drain(&mut self) -> usize {
        let mut executed = 0;
        while let Ok(job) = self.rx.try_recv() {
            self.execute(job);
            executed += 1;
        }
        executed
    }

    pub fn store(&self) -> &SceneStore {
        &self.store
    }

    fn execute(&mut self, job: ScheduledCommand) {
        let ScheduledCommand { command, reply } = job;
        let name = command.command.clone();

        // The dispatcher already converts handler errors; this boundary only
        // has to keep a panicking handler from taking down the host loop.
        let response = catch_unwind(AssertUnwindSafe(|| {
            self.registry.dispatch(&mut self.store, &command)
        }))
        .unwrap_or_else(|_| {
            error!("Handler '{}' panicked", name);
            Response::error(format!("Handler '{}' panicked", name))
        });

        if reply.send(response).is_err() {
            debug!("Client gone before '{}' finished, dropping response", name);
        }
    }
}
