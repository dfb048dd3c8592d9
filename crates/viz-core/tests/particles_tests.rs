// Particle field tests: silhouette mirroring and buffer-length
// invariants for both clouds.

use viz_core::constants::PARTICLE_GRID;
use viz_core::particles::ParticleGenerator;
use viz_core::procgen::sphere_geometry;
use viz_core::scene::{Material, Node, NodeKind};
use viz_core::tracker::ResourceTracker;

fn test_mesh() -> viz_core::scene::NodeHandle {
    Node::with_geometry(NodeKind::Mesh, sphere_geometry(50.0, 8, 6), Material::new())
}

#[test]
fn silhouette_cloud_mirrors_mesh_positions() {
    let mut tracker = ResourceTracker::new();
    let mut dots = ParticleGenerator::new();
    let mesh = test_mesh();

    let points = dots.add_custom_dots(&mut tracker, &mesh);
    let cloud_geometry = points.borrow().geometry.clone().unwrap();
    let mesh_geometry = mesh.borrow().geometry.clone().unwrap();
    assert_eq!(
        cloud_geometry.borrow().positions,
        mesh_geometry.borrow().positions
    );
}

#[test]
fn silhouette_cloud_buffer_lengths_agree() {
    let mut tracker = ResourceTracker::new();
    let mut dots = ParticleGenerator::new();
    let points = dots.add_custom_dots(&mut tracker, &test_mesh());
    let geometry = points.borrow().geometry.clone().unwrap();
    let g = geometry.borrow();

    let point_count = g.vertex_count();
    assert_eq!(g.positions.len(), 3 * point_count);
    assert_eq!(g.colors.len(), 3 * point_count);
    assert_eq!(g.positions.len() % 3, 0);
}

#[test]
fn freeform_cloud_keeps_the_grid_arrays() {
    let mut tracker = ResourceTracker::new();
    let mut dots = ParticleGenerator::new();
    dots.add_custom_dots(&mut tracker, &test_mesh());

    let other = dots.add_random_points(&mut tracker);
    let geometry = other.borrow().geometry.clone().unwrap();
    let g = geometry.borrow();

    let point_count = PARTICLE_GRID * PARTICLE_GRID;
    assert_eq!(g.positions.len(), 3 * point_count);
    assert_eq!(g.scales.len(), point_count);
    assert!(g.scales.iter().all(|s| (1.0..25.0).contains(s)));
    // Zero-centered difference of two draws stays inside (-204, 204).
    assert!(g.positions.iter().all(|p| p.abs() < 205.0));
}

#[test]
fn freeform_cloud_material_is_low_opacity() {
    let mut tracker = ResourceTracker::new();
    let mut dots = ParticleGenerator::new();
    dots.add_custom_dots(&mut tracker, &test_mesh());
    let other = dots.add_random_points(&mut tracker);
    let material = other.borrow().material.clone().unwrap();
    let m = material.borrow();
    assert!(m.transparent);
    assert!((m.opacity - 0.1).abs() < 1e-6);
}

#[test]
fn both_clouds_are_tracked_at_creation() {
    let mut tracker = ResourceTracker::new();
    let mut dots = ParticleGenerator::new();
    let before = tracker.len();
    dots.add_custom_dots(&mut tracker, &test_mesh());
    let after_first = tracker.len();
    assert!(after_first > before);
    dots.add_random_points(&mut tracker);
    assert!(tracker.len() > after_first);
}
