//! Particle clouds derived from the generated mesh.
//!
//! The first cloud mirrors the mesh's vertex positions exactly (its own
//! grid positions are computed and then discarded for rendering) while
//! keeping the grid's color data; the second cloud renders the retained
//! grid positions with per-point scales.

use rand::Rng;

use crate::constants::PARTICLE_GRID;
use crate::scene::{Geometry, Material, Node, NodeHandle, NodeKind};
use crate::tracker::{Resource, ResourceTracker};

pub struct ParticleGenerator {
    /// Grid positions retained between `add_custom_dots` and
    /// `add_random_points`.
    vertices: Vec<f32>,
    sizes: Vec<f32>,
}

impl Default for ParticleGenerator {
    fn default() -> Self {
        Self::new()
    }
}

impl ParticleGenerator {
    pub fn new() -> Self {
        Self {
            vertices: Vec::new(),
            sizes: Vec::new(),
        }
    }

    /// Build the mesh-silhouette cloud: a PARTICLE_GRID^2 grid of
    /// zero-centered random points whose positions are then overwritten
    /// by the mesh's own vertex positions. The grid colors survive,
    /// cycled to exactly one triple per rendered point.
    pub fn add_custom_dots(&mut self, tracker: &mut ResourceTracker, mesh: &NodeHandle) -> NodeHandle {
        let mut rng = rand::thread_rng();
        self.vertices.clear();
        self.sizes.clear();

        let point_total = PARTICLE_GRID * PARTICLE_GRID;
        let mut colors = Vec::with_capacity(point_total * 3);
        let accent = hsl_to_rgb(0.1, 1.0, 0.5);
        for _ in 0..point_total {
            for _ in 0..3 {
                // Difference of two draws: zero-centered, non-uniform.
                let value = rng.gen_range(1..205) - rng.gen_range(1..205);
                self.vertices.push(value as f32);
            }
            colors.extend_from_slice(&[0.0, accent[1], 0.0]);
            self.sizes.push(rng.gen_range(1..25) as f32);
        }

        let geometry = Geometry::new();
        {
            let mut g = geometry.borrow_mut();
            if let Some(source) = mesh.borrow().geometry.as_ref() {
                g.positions = source.borrow().positions.clone();
            }
            let point_count = g.vertex_count();
            g.colors = colors.iter().copied().cycle().take(point_count * 3).collect();
        }

        let material = Material::new();
        {
            let mut m = material.borrow_mut();
            m.vertex_colors = true;
            m.point_size = rng.gen_range(1..10) as f32;
        }

        let points = Node::with_geometry(NodeKind::Points, geometry, material);
        tracker.track(Resource::Node(points.clone()));
        points
    }

    /// Build the freeform cloud from the grid retained by the last
    /// `add_custom_dots` call.
    pub fn add_random_points(&self, tracker: &mut ResourceTracker) -> NodeHandle {
        let geometry = Geometry::new();
        {
            let mut g = geometry.borrow_mut();
            g.positions = self.vertices.clone();
            g.scales = self.sizes.clone();
        }

        let material = Material::new();
        {
            let mut m = material.borrow_mut();
            m.transparent = true;
            m.opacity = 0.1;
            m.uniforms.color = [1.0, 1.0, 1.0];
        }

        let points = Node::with_geometry(NodeKind::Points, geometry, material);
        tracker.track(Resource::Node(points.clone()));
        points
    }
}

/// Standard HSL to RGB conversion (h, s, l in [0, 1]).
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> [f32; 3] {
    if s == 0.0 {
        return [l, l, l];
    }
    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;
    [
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    ]
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hsl_accent_is_flat_green_ish() {
        let rgb = hsl_to_rgb(0.1, 1.0, 0.5);
        // h = 0.1 lands on the rising red-to-yellow edge: g = 0.6.
        assert!((rgb[1] - 0.6).abs() < 1e-4);
    }
}
