// Tests for the resource tracker: identity semantics, recursive
// reachability, and the exactly-once disposal sweep.

use std::cell::Cell;
use std::rc::Rc;

use viz_core::scene::{Geometry, Material, Node, NodeKind, Scene, Texture};
use viz_core::tracker::{Resource, ResourceTracker};

fn counter_hook(counter: &Rc<Cell<u32>>) -> Box<dyn FnMut()> {
    let counter = Rc::clone(counter);
    Box::new(move || counter.set(counter.get() + 1))
}

#[test]
fn tracking_is_idempotent() {
    let mut tracker = ResourceTracker::new();
    let geometry = Geometry::new();
    tracker.track(Resource::Geometry(geometry.clone()));
    tracker.track(Resource::Geometry(geometry.clone()));
    tracker.track(Resource::Geometry(geometry));
    assert_eq!(tracker.len(), 1);
}

#[test]
fn tracking_a_node_includes_all_dependents() {
    let mut tracker = ResourceTracker::new();

    let map = Texture::new("map", 1, 1, vec![0; 4]);
    let env = Texture::new("env", 1, 1, vec![0; 4]);
    let uniform_tex = Texture::new("uniform", 1, 1, vec![0; 4]);
    let material = Material::new();
    {
        let mut m = material.borrow_mut();
        m.map = Some(map);
        m.env_map = Some(env);
        m.uniforms.color_texture = Some(uniform_tex);
    }

    let node = Node::with_geometry(NodeKind::Mesh, Geometry::new(), material);
    let child = Node::with_geometry(NodeKind::Points, Geometry::new(), Material::new());
    Node::add_child(&node, child);

    tracker.track(Resource::Node(node));
    // node + geometry + material + 3 textures + child + child geometry
    // + child material
    assert_eq!(tracker.len(), 9);
}

#[test]
fn registry_never_exceeds_distinct_resource_count() {
    let mut tracker = ResourceTracker::new();
    let node = Node::with_geometry(NodeKind::Mesh, Geometry::new(), Material::new());
    for _ in 0..5 {
        tracker.track(Resource::Node(node.clone()));
    }
    assert_eq!(tracker.len(), 3);
}

#[test]
fn dispose_releases_each_resource_exactly_once() {
    let mut tracker = ResourceTracker::new();
    let scene = Scene::new();

    let geo_count = Rc::new(Cell::new(0));
    let mat_count = Rc::new(Cell::new(0));
    let tex_count = Rc::new(Cell::new(0));
    let node_count = Rc::new(Cell::new(0));

    let texture = Texture::new("t", 1, 1, vec![0; 4]);
    texture.borrow_mut().set_dispose_hook(counter_hook(&tex_count));

    let geometry = Geometry::new();
    geometry.borrow_mut().set_dispose_hook(counter_hook(&geo_count));

    let material = Material::new();
    {
        let mut m = material.borrow_mut();
        m.uniforms.color_texture = Some(texture.clone());
        m.set_dispose_hook(counter_hook(&mat_count));
    }

    let node = Node::with_geometry(NodeKind::Mesh, geometry.clone(), material.clone());
    node.borrow_mut().set_dispose_hook(counter_hook(&node_count));

    scene.add(node.clone());
    tracker.track(Resource::Node(node.clone()));
    assert_eq!(tracker.len(), 4);

    tracker.dispose(&scene);

    // The node was reachable both as a root child and via the registry;
    // each hook still fired exactly once.
    assert_eq!(geo_count.get(), 1);
    assert_eq!(mat_count.get(), 1);
    assert_eq!(tex_count.get(), 1);
    assert_eq!(node_count.get(), 1);

    assert!(tracker.is_empty());
    assert!(scene.root.borrow().children.is_empty());
    assert!(node.borrow().is_disposed());
    assert!(geometry.borrow().is_disposed());

    // A second sweep over the now-empty registry is a no-op.
    tracker.dispose(&scene);
    assert_eq!(geo_count.get(), 1);
    assert_eq!(node_count.get(), 1);
}

#[test]
fn dispose_advances_the_generation_token() {
    let mut tracker = ResourceTracker::new();
    let scene = Scene::new();
    let generation = tracker.generation();
    let before = generation.get();
    tracker.dispose(&scene);
    tracker.dispose(&scene);
    assert_eq!(generation.get(), before + 2);
}

#[test]
fn untracked_resources_survive_the_sweep() {
    let mut tracker = ResourceTracker::new();
    let scene = Scene::new();

    let count = Rc::new(Cell::new(0));
    let geometry = Geometry::new();
    geometry.borrow_mut().set_dispose_hook(counter_hook(&count));

    let resource = Resource::Geometry(geometry.clone());
    tracker.track(resource.clone());
    tracker.untrack(&resource);
    assert!(tracker.is_empty());

    tracker.dispose(&scene);
    assert_eq!(count.get(), 0);
    assert!(!geometry.borrow().is_disposed());
}

#[test]
fn disposing_without_a_hook_is_a_silent_noop() {
    let mut tracker = ResourceTracker::new();
    let scene = Scene::new();
    let node = Node::new(NodeKind::Group);
    scene.add(node.clone());
    tracker.track(Resource::Node(node.clone()));
    tracker.dispose(&scene);
    assert!(node.borrow().is_disposed());
}

#[test]
fn track_all_with_nothing_is_a_noop() {
    let mut tracker = ResourceTracker::new();
    tracker.track_all(std::iter::empty());
    assert!(tracker.is_empty());
}
