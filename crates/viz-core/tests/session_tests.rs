// End-to-end session lifecycle: construction, frame updates and the
// regeneration sweep, driven through in-memory asset loaders.

use anyhow::{anyhow, Result};
use viz_core::assets::{AssetLoader, ModelData, TextureData};
use viz_core::{Background, SceneSession, NOISE_CLAMP};

/// Serves one triangle and a 2x2 texture for every path.
struct StubLoader;

impl AssetLoader for StubLoader {
    fn load_model(&self, _path: &str) -> Result<ModelData> {
        Ok(ModelData {
            positions: vec![0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0, 0.0],
            normals: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            uvs: vec![0.0, 0.0, 1.0, 0.0, 0.0, 1.0],
            indices: vec![0, 1, 2],
        })
    }

    fn load_texture(&self, _path: &str) -> Result<TextureData> {
        Ok(TextureData {
            width: 2,
            height: 2,
            pixels: vec![255; 16],
        })
    }

    fn load_environment(&self, _path: &str) -> Result<TextureData> {
        self.load_texture(_path)
    }
}

struct FailingLoader;

impl AssetLoader for FailingLoader {
    fn load_model(&self, path: &str) -> Result<ModelData> {
        Err(anyhow!("no such model: {path}"))
    }

    fn load_texture(&self, path: &str) -> Result<TextureData> {
        Err(anyhow!("no such texture: {path}"))
    }

    fn load_environment(&self, path: &str) -> Result<TextureData> {
        Err(anyhow!("no such environment: {path}"))
    }
}

#[test]
fn new_session_builds_a_populated_scene() {
    let session = SceneSession::new(&StubLoader);
    assert!(session.mesh.is_some());
    assert!(session.points.is_some());
    assert!((1..=10).contains(&session.rand1));
    assert!((1..=10).contains(&session.rand2));
    assert!(!session.post.passes.is_empty());
    assert!(!session.tracker.is_empty());
    // Lights plus mesh plus at least one cloud.
    assert!(session.scene.root.borrow().children.len() >= 4);
}

#[test]
fn environment_probe_sets_the_background() {
    let session = SceneSession::new(&StubLoader);
    assert!(matches!(session.scene.background, Background::Texture(_)));
    assert!(session.scene.environment.is_some());
}

#[test]
fn regeneration_sweeps_and_rebuilds() {
    let mut session = SceneSession::new(&StubLoader);
    let old_mesh = session.mesh.clone().unwrap();
    session.regenerate(&StubLoader);
    let new_mesh = session.mesh.clone().unwrap();
    assert!(!std::rc::Rc::ptr_eq(&old_mesh, &new_mesh));
    assert!(old_mesh
        .borrow()
        .geometry
        .as_ref()
        .map(|g| g.borrow().is_disposed())
        .unwrap_or(true));
    assert!(!session.tracker.is_empty());
}

#[test]
fn back_to_back_regenerations_are_safe() {
    let mut session = SceneSession::new(&StubLoader);
    session.regenerate(&StubLoader);
    session.regenerate(&StubLoader);
    assert!(session.mesh.is_some());
}

#[test]
fn mesh_less_session_still_renders() {
    let mut session = SceneSession::new(&FailingLoader);
    assert!(session.mesh.is_none());
    assert!(session.points.is_none());
    assert!(matches!(session.scene.background, Background::Color(_)));
    for _ in 0..3 {
        session.render();
    }
    session.regenerate(&FailingLoader);
    session.render();
}

#[test]
fn rendering_marks_particle_buffers_dirty() {
    let mut session = SceneSession::new(&StubLoader);
    session.render();
    let points = session.points.clone().unwrap();
    let geometry = points.borrow().geometry.clone().unwrap();
    let g = geometry.borrow();
    assert!(g.dirty.positions);
    assert!(g.dirty.colors);
}

#[test]
fn mesh_noise_stays_clamped_across_frames() {
    let mut session = SceneSession::new(&StubLoader);
    for _ in 0..5 {
        session.render();
    }
    let mesh = session.mesh.clone().unwrap();
    let geometry = mesh.borrow().geometry.clone().unwrap();
    let g = geometry.borrow();
    assert!(!g.noise.is_empty());
    for n in &g.noise {
        assert!((-NOISE_CLAMP..=NOISE_CLAMP).contains(n));
    }
}

#[test]
fn fallback_spectrum_drives_the_first_frames() {
    let session = SceneSession::new(&StubLoader);
    let snapshot = session.sampler.get();
    assert_eq!(snapshot[0], 100);
    assert_eq!(snapshot[5], 50);
}

#[test]
fn render_tolerates_detached_handles() {
    let mut session = SceneSession::new(&StubLoader);
    // Simulate the window between sweep and rebuild.
    session.mesh = None;
    session.points = None;
    session.points_other = None;
    session.render();
}
