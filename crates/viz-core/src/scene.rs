//! Scene-graph data model shared with the renderer frontend.
//!
//! These types are plain data the core owns and mutates; the frontend
//! uploads them to the GPU. Every GPU-backed type carries an idempotent
//! `dispose()` that fires an optional hook exactly once, so the frontend
//! (and tests) can observe when the backing resource must be released.

use glam::{Mat4, Vec3};
use smallvec::SmallVec;
use std::cell::RefCell;
use std::rc::{Rc, Weak};

use crate::constants::BACKGROUND_COLOR;

pub type DisposeHook = Box<dyn FnMut()>;

pub type TextureHandle = Rc<RefCell<Texture>>;
pub type GeometryHandle = Rc<RefCell<Geometry>>;
pub type MaterialHandle = Rc<RefCell<Material>>;
pub type NodeHandle = Rc<RefCell<Node>>;

pub struct Texture {
    pub label: String,
    pub width: u32,
    pub height: u32,
    /// RGBA8 pixel data; empty when the asset failed to decode.
    pub pixels: Vec<u8>,
    disposed: bool,
    hook: Option<DisposeHook>,
}

impl Texture {
    pub fn new(label: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> TextureHandle {
        Rc::new(RefCell::new(Self {
            label: label.into(),
            width,
            height,
            pixels,
            disposed: false,
            hook: None,
        }))
    }

    pub fn set_dispose_hook(&mut self, hook: DisposeHook) {
        self.hook = Some(hook);
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.pixels = Vec::new();
        if let Some(mut hook) = self.hook.take() {
            hook();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Which attribute buffers were mutated this frame and need re-upload.
#[derive(Clone, Copy, Debug, Default)]
pub struct DirtyFlags {
    pub positions: bool,
    pub colors: bool,
    pub scales: bool,
    pub displacement: bool,
}

#[derive(Default)]
pub struct Geometry {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
    /// Per-point color triples (particle clouds).
    pub colors: Vec<f32>,
    /// Per-point scale scalars (particle clouds).
    pub scales: Vec<f32>,
    /// Per-vertex displacement scalars driving the deformation shader.
    pub displacement: Vec<f32>,
    /// Per-vertex noise scalars, clamped each frame.
    pub noise: Vec<f32>,
    pub dirty: DirtyFlags,
    disposed: bool,
    hook: Option<DisposeHook>,
}

impl Geometry {
    pub fn new() -> GeometryHandle {
        Rc::new(RefCell::new(Self::default()))
    }

    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn uv_count(&self) -> usize {
        self.uvs.len() / 2
    }

    /// The length the displacement/noise buffers must have: the uv
    /// attribute count when uvs exist, the vertex count otherwise.
    pub fn scalar_count(&self) -> usize {
        if self.uvs.is_empty() {
            self.vertex_count()
        } else {
            self.uv_count()
        }
    }

    pub fn set_dispose_hook(&mut self, hook: DisposeHook) {
        self.hook = Some(hook);
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        self.positions = Vec::new();
        self.normals = Vec::new();
        self.uvs = Vec::new();
        self.indices = Vec::new();
        self.colors = Vec::new();
        self.scales = Vec::new();
        self.displacement = Vec::new();
        self.noise = Vec::new();
        if let Some(mut hook) = self.hook.take() {
            hook();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

/// Uniform block of the shared deformation shader.
#[derive(Clone)]
pub struct Uniforms {
    pub amplitude: f32,
    pub color: [f32; 3],
    pub color_texture: Option<TextureHandle>,
}

impl Default for Uniforms {
    fn default() -> Self {
        Self {
            amplitude: 1.0,
            color: [1.0, 1.0, 0.0], // shader default, nudged every frame
            color_texture: None,
        }
    }
}

pub struct Material {
    pub wireframe: bool,
    pub transparent: bool,
    pub opacity: f32,
    /// Base point size for particle materials.
    pub point_size: f32,
    pub vertex_colors: bool,
    pub map: Option<TextureHandle>,
    pub env_map: Option<TextureHandle>,
    pub uniforms: Uniforms,
    disposed: bool,
    hook: Option<DisposeHook>,
}

impl Material {
    pub fn new() -> MaterialHandle {
        Rc::new(RefCell::new(Self {
            wireframe: false,
            transparent: false,
            opacity: 1.0,
            point_size: 1.0,
            vertex_colors: false,
            map: None,
            env_map: None,
            uniforms: Uniforms::default(),
            disposed: false,
            hook: None,
        }))
    }

    pub fn set_dispose_hook(&mut self, hook: DisposeHook) {
        self.hook = Some(hook);
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(mut hook) = self.hook.take() {
            hook();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum NodeKind {
    Group,
    Mesh,
    Points,
    DirectionalLight { intensity: f32, cast_shadow: bool },
    AmbientLight { color: [f32; 3] },
}

pub struct Node {
    pub kind: NodeKind,
    pub geometry: Option<GeometryHandle>,
    pub material: Option<MaterialHandle>,
    pub children: SmallVec<[NodeHandle; 4]>,
    pub parent: Weak<RefCell<Node>>,
    pub position: Vec3,
    pub rotation: Vec3,
    disposed: bool,
    hook: Option<DisposeHook>,
}

impl Node {
    pub fn new(kind: NodeKind) -> NodeHandle {
        Rc::new(RefCell::new(Self {
            kind,
            geometry: None,
            material: None,
            children: SmallVec::new(),
            parent: Weak::new(),
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            disposed: false,
            hook: None,
        }))
    }

    pub fn with_geometry(
        kind: NodeKind,
        geometry: GeometryHandle,
        material: MaterialHandle,
    ) -> NodeHandle {
        let node = Self::new(kind);
        {
            let mut n = node.borrow_mut();
            n.geometry = Some(geometry);
            n.material = Some(material);
        }
        node
    }

    pub fn add_child(parent: &NodeHandle, child: NodeHandle) {
        child.borrow_mut().parent = Rc::downgrade(parent);
        parent.borrow_mut().children.push(child);
    }

    /// Remove the node from its parent's child list, if it has one.
    pub fn detach(node: &NodeHandle) {
        let parent = node.borrow().parent.upgrade();
        if let Some(parent) = parent {
            parent.borrow_mut().children.retain(|c| !Rc::ptr_eq(c, node));
            node.borrow_mut().parent = Weak::new();
        }
    }

    pub fn set_dispose_hook(&mut self, hook: DisposeHook) {
        self.hook = Some(hook);
    }

    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(mut hook) = self.hook.take() {
            hook();
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }
}

pub enum Background {
    Color([f32; 3]),
    Texture(TextureHandle),
}

/// The single mutable scene graph. Only the root container and the
/// camera outlive a regeneration sweep.
pub struct Scene {
    pub root: NodeHandle,
    pub background: Background,
    pub environment: Option<TextureHandle>,
}

impl Scene {
    pub fn new() -> Self {
        Self {
            root: Node::new(NodeKind::Group),
            background: Background::Color(BACKGROUND_COLOR),
            environment: None,
        }
    }

    pub fn add(&self, node: NodeHandle) {
        Node::add_child(&self.root, node);
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

/// Right-handed perspective camera; the frontend builds matrices from it.
#[derive(Clone, Debug)]
pub struct Camera {
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub fov_degrees: f32,
    pub aspect: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fov_degrees.to_radians(), self.aspect, self.znear, self.zfar)
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }
}
