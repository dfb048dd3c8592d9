//! Procedural geometry generation.
//!
//! Each generation builds exactly one of three variants (displaced
//! sphere, displaced box, loaded model) under a shared attribute
//! contract: a position attribute, a per-vertex displacement scalar and
//! a per-vertex noise scalar whose lengths always match the realized
//! vertex layout. Everything created here is tracked the moment it
//! exists.

use rand::Rng;
use std::f32::consts::{PI, TAU};

use crate::assets::{model_path, texture_path, AssetLoader, ModelData};
use crate::constants::DEFAULT_DISPLACEMENT_COUNT;
use crate::error::SceneError;
use crate::scene::{Geometry, GeometryHandle, Material, MaterialHandle, Node, NodeHandle, NodeKind, Texture};
use crate::tracker::{Generation, Resource, ResourceTracker};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Variant {
    Sphere,
    Box,
    Model,
}

impl Variant {
    pub fn draw(rng: &mut impl Rng) -> Self {
        match rng.gen_range(0..3) {
            0 => Variant::Sphere,
            1 => Variant::Box,
            _ => Variant::Model,
        }
    }
}

pub struct MeshGenerator {
    /// Vertex count of the previous geometry; scalar buffers are
    /// pre-allocated at this size and rebuilt once the real layout is
    /// known.
    displacement_count: usize,
}

impl Default for MeshGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshGenerator {
    pub fn new() -> Self {
        Self {
            displacement_count: DEFAULT_DISPLACEMENT_COUNT,
        }
    }

    pub fn displacement_count(&self) -> usize {
        self.displacement_count
    }

    /// Build one randomly selected variant as a tracked mesh node.
    pub fn generate(
        &mut self,
        tracker: &mut ResourceTracker,
        loader: &dyn AssetLoader,
    ) -> Result<NodeHandle, SceneError> {
        let variant = Variant::draw(&mut rand::thread_rng());
        self.generate_variant(variant, tracker, loader)
    }

    /// Variant-explicit entry point, used by `generate` and by tests.
    pub fn generate_variant(
        &mut self,
        variant: Variant,
        tracker: &mut ResourceTracker,
        loader: &dyn AssetLoader,
    ) -> Result<NodeHandle, SceneError> {
        let mut rng = rand::thread_rng();
        let noise_scale = rng.gen_range(5..25) as f32;

        let geometry = match variant {
            Variant::Sphere => {
                let radius = rng.gen_range(50..150) as f32;
                let segments = rng.gen_range(100..200);
                let rings = rng.gen_range(50..80);
                sphere_geometry(radius, segments, rings)
            }
            Variant::Box => {
                let dims = [
                    rng.gen_range(50..150) as f32,
                    rng.gen_range(50..150) as f32,
                    rng.gen_range(50..150) as f32,
                ];
                let segs = [
                    rng.gen_range(10..50),
                    rng.gen_range(10..50),
                    rng.gen_range(10..50),
                ];
                box_geometry(dims[0], dims[1], dims[2], segs[0], segs[1], segs[2])
            }
            Variant::Model => self.model_geometry(&tracker.generation(), loader, &mut rng)?,
        };

        // Re-derive the scalar buffers from the realized layout right
        // away; a sphere/box/model never matches the previous count.
        let count = geometry.borrow().scalar_count();
        {
            let mut g = geometry.borrow_mut();
            g.displacement = vec![0.0; count];
            g.noise = (0..count).map(|_| rng.gen::<f32>() * noise_scale).collect();
        }
        self.displacement_count = count;

        let material = self.shader_material(tracker, loader, &mut rng);
        let mesh = Node::with_geometry(NodeKind::Mesh, geometry, material);
        tracker.track(Resource::Node(mesh.clone()));
        Ok(mesh)
    }

    fn model_geometry(
        &self,
        generation: &Generation,
        loader: &dyn AssetLoader,
        rng: &mut impl Rng,
    ) -> Result<GeometryHandle, SceneError> {
        let started = generation.get();
        let path = model_path(rng);
        let model = loader.load_model(&path).map_err(SceneError::AssetLoad)?;
        // A sweep may have run while the load was in flight; a stale
        // result must never be attached to the new scene.
        if generation.get() != started {
            return Err(SceneError::StaleGeneration(started));
        }
        Ok(model_to_geometry(model))
    }

    /// Shared shader material: random texture, wireframe coin-flip,
    /// amplitude/color/colorTexture uniforms. A texture load failure
    /// degrades to an untextured material.
    fn shader_material(
        &self,
        tracker: &mut ResourceTracker,
        loader: &dyn AssetLoader,
        rng: &mut impl Rng,
    ) -> MaterialHandle {
        let path = texture_path(rng);
        let texture = match loader.load_texture(&path) {
            Ok(data) => {
                let texture = Texture::new(path, data.width, data.height, data.pixels);
                tracker.track(Resource::Texture(texture.clone()));
                Some(texture)
            }
            Err(err) => {
                log::warn!("texture {path} failed to load, rendering untextured: {err:#}");
                None
            }
        };

        let material = Material::new();
        {
            let mut m = material.borrow_mut();
            m.wireframe = rng.gen_bool(0.5);
            m.transparent = true;
            m.uniforms.amplitude = 1.0;
            m.uniforms.color = [1.0, 1.0, 0.0];
            m.uniforms.color_texture = texture;
        }
        tracker.track(Resource::Material(material.clone()));
        material
    }
}

/// Latitude/longitude sphere grid; vertex count is
/// `(segments + 1) * (rings + 1)`.
pub fn sphere_geometry(radius: f32, segments: u32, rings: u32) -> GeometryHandle {
    let geometry = Geometry::new();
    {
        let mut g = geometry.borrow_mut();
        let cap = ((segments + 1) * (rings + 1)) as usize;
        g.positions.reserve(cap * 3);
        g.normals.reserve(cap * 3);
        g.uvs.reserve(cap * 2);

        for iy in 0..=rings {
            let v = iy as f32 / rings as f32;
            let theta = v * PI;
            for ix in 0..=segments {
                let u = ix as f32 / segments as f32;
                let phi = u * TAU;
                let nx = theta.sin() * phi.cos();
                let ny = theta.cos();
                let nz = theta.sin() * phi.sin();
                g.positions.extend_from_slice(&[radius * nx, radius * ny, radius * nz]);
                g.normals.extend_from_slice(&[nx, ny, nz]);
                g.uvs.extend_from_slice(&[u, 1.0 - v]);
            }
        }
        let row = segments + 1;
        for iy in 0..rings {
            for ix in 0..segments {
                let a = iy * row + ix;
                let b = a + row;
                g.indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }
    }
    geometry
}

/// Six independent face grids, each with its own vertices so per-face
/// normals stay flat; vertex count is
/// `2 * ((sy+1)(sz+1) + (sx+1)(sz+1) + (sx+1)(sy+1))`.
pub fn box_geometry(width: f32, height: f32, depth: f32, sx: u32, sy: u32, sz: u32) -> GeometryHandle {
    let geometry = Geometry::new();
    {
        let mut borrow = geometry.borrow_mut();
        let g = &mut *borrow;
        // (u axis, v axis, w axis, u sign, v sign, plane width, plane height, w offset, grid)
        build_plane(g, 2, 1, 0, -1.0, -1.0, depth, height, width / 2.0, sz, sy);
        build_plane(g, 2, 1, 0, 1.0, -1.0, depth, height, -width / 2.0, sz, sy);
        build_plane(g, 0, 2, 1, 1.0, 1.0, width, depth, height / 2.0, sx, sz);
        build_plane(g, 0, 2, 1, 1.0, -1.0, width, depth, -height / 2.0, sx, sz);
        build_plane(g, 0, 1, 2, 1.0, -1.0, width, height, depth / 2.0, sx, sy);
        build_plane(g, 0, 1, 2, -1.0, -1.0, width, height, -depth / 2.0, sx, sy);
    }
    geometry
}

#[allow(clippy::too_many_arguments)]
fn build_plane(
    g: &mut Geometry,
    u: usize,
    v: usize,
    w: usize,
    udir: f32,
    vdir: f32,
    plane_width: f32,
    plane_height: f32,
    w_offset: f32,
    grid_x: u32,
    grid_y: u32,
) {
    let seg_w = plane_width / grid_x as f32;
    let seg_h = plane_height / grid_y as f32;
    let half_w = plane_width / 2.0;
    let half_h = plane_height / 2.0;
    let offset = g.vertex_count() as u32;

    for iy in 0..=grid_y {
        let y = iy as f32 * seg_h - half_h;
        for ix in 0..=grid_x {
            let x = ix as f32 * seg_w - half_w;
            let mut position = [0.0f32; 3];
            position[u] = x * udir;
            position[v] = y * vdir;
            position[w] = w_offset;
            g.positions.extend_from_slice(&position);

            let mut normal = [0.0f32; 3];
            normal[w] = w_offset.signum();
            g.normals.extend_from_slice(&normal);

            g.uvs
                .extend_from_slice(&[ix as f32 / grid_x as f32, 1.0 - iy as f32 / grid_y as f32]);
        }
    }
    let row = grid_x + 1;
    for iy in 0..grid_y {
        for ix in 0..grid_x {
            let a = offset + iy * row + ix;
            let b = a + row;
            g.indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
        }
    }
}

fn model_to_geometry(model: ModelData) -> GeometryHandle {
    let geometry = Geometry::new();
    {
        let mut g = geometry.borrow_mut();
        g.positions = model.positions;
        g.uvs = model.uvs;
        g.indices = model.indices;
        g.normals = if model.normals.len() == g.positions.len() {
            model.normals
        } else {
            // Fall back to radial normals so the deformation shader
            // still has a displacement direction.
            g.positions
                .chunks_exact(3)
                .flat_map(|p| {
                    let len = (p[0] * p[0] + p[1] * p[1] + p[2] * p[2]).sqrt().max(1e-6);
                    [p[0] / len, p[1] / len, p[2] / len]
                })
                .collect()
        };
    }
    geometry
}
