//! Reachability-based resource tracking.
//!
//! Every GPU-backed object created during a scene generation is
//! registered here the moment it exists. `dispose` performs one sweep
//! that releases everything exactly once; the registry is keyed on
//! object identity so double-tracking is a no-op and double-dispose is
//! impossible.

use fnv::FnvHashMap;
use std::cell::Cell;
use std::rc::Rc;

use crate::scene::{GeometryHandle, MaterialHandle, Node, NodeHandle, Scene, TextureHandle};

/// A handle to any trackable GPU-backed object.
#[derive(Clone)]
pub enum Resource {
    Geometry(GeometryHandle),
    Material(MaterialHandle),
    Texture(TextureHandle),
    Node(NodeHandle),
}

impl Resource {
    fn id(&self) -> usize {
        match self {
            Resource::Geometry(h) => Rc::as_ptr(h) as usize,
            Resource::Material(h) => Rc::as_ptr(h) as usize,
            Resource::Texture(h) => Rc::as_ptr(h) as usize,
            Resource::Node(h) => Rc::as_ptr(h) as usize,
        }
    }
}

/// Monotonically increasing generation token. The disposal sweep
/// advances it; asynchronous asset results compare the value captured
/// before the load against the current one and discard themselves when
/// the generation has moved on.
#[derive(Clone)]
pub struct Generation(Rc<Cell<u64>>);

impl Generation {
    pub fn get(&self) -> u64 {
        self.0.get()
    }

    /// Advance the token. Called by the disposal sweep; exposed so test
    /// collaborators can simulate a sweep racing an in-flight load.
    pub fn advance(&self) {
        self.0.set(self.0.get() + 1);
    }
}

pub struct ResourceTracker {
    resources: FnvHashMap<usize, Resource>,
    generation: Generation,
}

impl Default for ResourceTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceTracker {
    pub fn new() -> Self {
        Self {
            resources: FnvHashMap::default(),
            generation: Generation(Rc::new(Cell::new(0))),
        }
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }

    pub fn contains(&self, resource: &Resource) -> bool {
        self.resources.contains_key(&resource.id())
    }

    pub fn generation(&self) -> Generation {
        self.generation.clone()
    }

    /// Register a resource and everything reachable from it: a node's
    /// geometry, material and children; a material's texture fields and
    /// texture-valued uniforms. Tracking twice is a no-op.
    pub fn track(&mut self, resource: Resource) {
        self.resources.insert(resource.id(), resource.clone());
        match &resource {
            Resource::Node(node) => {
                let n = node.borrow();
                if let Some(geometry) = &n.geometry {
                    self.track(Resource::Geometry(geometry.clone()));
                }
                if let Some(material) = &n.material {
                    self.track(Resource::Material(material.clone()));
                }
                for child in &n.children {
                    self.track(Resource::Node(child.clone()));
                }
            }
            Resource::Material(material) => {
                let m = material.borrow();
                let textures = [
                    m.map.clone(),
                    m.env_map.clone(),
                    m.uniforms.color_texture.clone(),
                ];
                drop(m);
                for texture in textures.into_iter().flatten() {
                    self.track(Resource::Texture(texture));
                }
            }
            Resource::Geometry(_) | Resource::Texture(_) => {}
        }
    }

    /// Sequence form of `track`; an empty iterator is the no-op form.
    pub fn track_all<I: IntoIterator<Item = Resource>>(&mut self, resources: I) {
        for resource in resources {
            self.track(resource);
        }
    }

    /// Remove a resource from future disposal without disposing it.
    pub fn untrack(&mut self, resource: &Resource) {
        self.resources.remove(&resource.id());
    }

    /// Full sweep: release every child of the scene root, then every
    /// registered resource, detaching nodes from their parents along the
    /// way. After this the registry is empty, the root has no children
    /// and the generation token has advanced. Sweeping an empty registry
    /// is a no-op.
    pub fn dispose(&mut self, scene: &Scene) {
        let children: Vec<NodeHandle> = scene.root.borrow().children.iter().cloned().collect();
        for child in children {
            dispose_node(&child);
            Node::detach(&child);
        }
        scene.root.borrow_mut().children.clear();

        let drained: Vec<Resource> = self.resources.drain().map(|(_, r)| r).collect();
        for resource in drained {
            match resource {
                Resource::Node(node) => {
                    Node::detach(&node);
                    dispose_node(&node);
                }
                Resource::Geometry(geometry) => geometry.borrow_mut().dispose(),
                Resource::Material(material) => dispose_material(&material),
                Resource::Texture(texture) => texture.borrow_mut().dispose(),
            }
        }
        self.generation.advance();
    }
}

/// Release a node's geometry and material (with its textures), then the
/// node itself. Each underlying `dispose` is idempotent, so a resource
/// reached both here and through the registry is still released once.
fn dispose_node(node: &NodeHandle) {
    let (geometry, material) = {
        let n = node.borrow();
        (n.geometry.clone(), n.material.clone())
    };
    if let Some(material) = material {
        dispose_material(&material);
    }
    if let Some(geometry) = geometry {
        geometry.borrow_mut().dispose();
    }
    node.borrow_mut().dispose();
}

fn dispose_material(material: &MaterialHandle) {
    let textures = {
        let m = material.borrow();
        [
            m.map.clone(),
            m.env_map.clone(),
            m.uniforms.color_texture.clone(),
        ]
    };
    for texture in textures.into_iter().flatten() {
        texture.borrow_mut().dispose();
    }
    material.borrow_mut().dispose();
}
