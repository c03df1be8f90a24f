// In-memory stand-in for the host application's object graph. A real host
// owns something like this natively (and it is not thread-safe there either);
// handlers only ever touch the store from the executor thread.

/// One named object in the scene.
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub name: String,
    /// Host-style type tag, e.g. "MESH", "LIGHT", "CAMERA".
    pub object_type: String,
    pub location: [f64; 3],
    pub selected: bool,
}

impl SceneObject {
    pub fn new(name: impl Into<String>, object_type: impl Into<String>, location: [f64; 3]) -> Self {
        Self {
            name: name.into(),
            object_type: object_type.into(),
            location,
            selected: false,
        }
    }
}

/// The one shared mutable resource in the system. All access is serialized
/// onto a single thread by the scheduler; the store itself carries no locks.
#[derive(Debug)]
pub struct SceneStore {
    name: String,
    objects: Vec<SceneObject>,
    materials: Vec<String>,
}

impl SceneStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            objects: Vec::new(),
            materials: Vec::new(),
        }
    }

    /// Small populated scene for the demo binary and tests.
    pub fn demo() -> Self {
        let mut store = Self::new("Scene");
        store.add_object(SceneObject::new("Cube", "MESH", [0.0, 0.0, 0.0]));
        store.add_object(SceneObject::new("Light", "LIGHT", [4.08, 1.01, 5.9]));
        store.add_object(SceneObject::new("Camera", "CAMERA", [7.36, -6.93, 4.96]));
        store.add_material("Material");
        store.add_material("Metal.Rough");
        store
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn objects(&self) -> &[SceneObject] {
        &self.objects
    }

    pub fn materials(&self) -> &[String] {
        &self.materials
    }

    pub fn add_material(&mut self, name: impl Into<String>) {
        self.materials.push(name.into());
    }

    pub fn add_object(&mut self, object: SceneObject) {
        self.objects.push(object);
    }

    pub fn find(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|obj| obj.name == name)
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut SceneObject> {
        self.objects.iter_mut().find(|obj| obj.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.find(name).is_some()
    }

    /// Pick a free name, suffixing ".001", ".002", ... the way content tools
    /// deduplicate. Returns `base` itself when it is untaken.
    pub fn unique_name(&self, base: &str) -> String {
        if !self.contains(base) {
            return base.to_string();
        }
        let mut n = 1;
        loop {
            let candidate = format!("{}.{:03}", base, n);
            if !self.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    pub fn selected_names(&self) -> Vec<String> {
        self.objects
            .iter()
            .filter(|obj| obj.selected)
            .map(|obj| obj.name.clone())
            .collect()
    }

    pub fn clear_selection(&mut self) {
        for obj in &mut self.objects {
            obj.selected = false;
        }
    }
}
