//! Scene session: the per-frame animation driver and the periodic
//! lifecycle controller.
//!
//! One `SceneSession` owns the scene graph, camera, tracker, sampler,
//! generators and the per-generation parameters; the host calls
//! `render` from its frame callback and `regenerate` on click or on the
//! periodic timer. The frame path never suspends and tolerates a scene
//! mid-regeneration (absent mesh or clouds).

use glam::Vec3;
use instant::Instant;
use rand::Rng;

use crate::assets::{environment_path, AssetLoader};
use crate::constants::{BACKGROUND_COLOR, CAMERA_DISTANCE, CAMERA_ORBIT_SCALE, NOISE_CLAMP};
use crate::particles::ParticleGenerator;
use crate::post::{build_pipeline, PostPipeline};
use crate::procgen::MeshGenerator;
use crate::sampler::{Snapshot, SpectrumSampler};
use crate::scene::{Background, Camera, Node, NodeHandle, NodeKind, Scene, Texture};
use crate::tracker::{Resource, ResourceTracker};

pub struct SceneSession {
    pub scene: Scene,
    pub camera: Camera,
    pub tracker: ResourceTracker,
    pub sampler: SpectrumSampler,
    mesher: MeshGenerator,
    dots: ParticleGenerator,

    /// Per-generation parameters; redrawn once per regeneration, never
    /// per frame.
    pub rand1: u32,
    pub rand2: u32,
    pub post: PostPipeline,

    pub mesh: Option<NodeHandle>,
    pub points: Option<NodeHandle>,
    pub points_other: Option<NodeHandle>,

    started: Instant,
}

impl SceneSession {
    pub fn new(loader: &dyn AssetLoader) -> Self {
        let mut rng = rand::thread_rng();
        let rand1 = rng.gen_range(1..=10);
        let rand2 = rng.gen_range(1..=10);
        let post = build_pipeline(rand1, &mut rng);
        let camera = Camera {
            position: Vec3::new(0.0, 0.0, CAMERA_DISTANCE),
            target: Vec3::ZERO,
            up: Vec3::Y,
            fov_degrees: rng.gen_range(5..50) as f32,
            aspect: 1.0,
            znear: 1.0,
            zfar: 1000.0,
        };
        let mut session = Self {
            scene: Scene::new(),
            camera,
            tracker: ResourceTracker::new(),
            sampler: SpectrumSampler::new(),
            mesher: MeshGenerator::new(),
            dots: ParticleGenerator::new(),
            rand1,
            rand2,
            post,
            mesh: None,
            points: None,
            points_other: None,
            started: Instant::now(),
        };
        session.set_lighting(loader);
        session.build_content(loader);
        session
    }

    /// Full regeneration: one synchronous disposal sweep, then a fresh
    /// camera fov, post pipeline, generation parameters, lighting and
    /// content. Safe to call twice in a row; the second sweep runs over
    /// an empty registry.
    pub fn regenerate(&mut self, loader: &dyn AssetLoader) {
        self.tracker.dispose(&self.scene);
        self.mesh = None;
        self.points = None;
        self.points_other = None;
        self.scene.background = Background::Color(BACKGROUND_COLOR);
        self.scene.environment = None;

        let mut rng = rand::thread_rng();
        self.camera.fov_degrees = rng.gen_range(5..50) as f32;
        self.post = build_pipeline(self.rand1, &mut rng);
        self.rand1 = rng.gen_range(1..=10);
        self.rand2 = rng.gen_range(1..=10);
        self.set_lighting(loader);
        self.build_content(loader);
    }

    fn build_content(&mut self, loader: &dyn AssetLoader) {
        match self.mesher.generate(&mut self.tracker, loader) {
            Ok(mesh) => {
                self.scene.add(mesh.clone());

                let points = self.dots.add_custom_dots(&mut self.tracker, &mesh);
                self.scene.add(points.clone());
                self.points = Some(points);

                if rand::thread_rng().gen_range(1..=4) == 1 {
                    let other = self.dots.add_random_points(&mut self.tracker);
                    self.scene.add(other.clone());
                    self.points_other = Some(other);
                }
                self.mesh = Some(mesh);
            }
            Err(err) => {
                // Recoverable: the frame loop runs mesh-less until the
                // next regeneration cycle retries.
                log::warn!("scene generation failed, retrying next cycle: {err}");
            }
        }
    }

    fn set_lighting(&mut self, loader: &dyn AssetLoader) {
        let directional = Node::new(NodeKind::DirectionalLight {
            intensity: 100_000.0,
            cast_shadow: true,
        });
        directional.borrow_mut().position = Vec3::new(100.0, 0.0, 0.0);
        self.tracker.track(Resource::Node(directional.clone()));
        self.scene.add(directional);

        let ambient = Node::new(NodeKind::AmbientLight {
            color: [0.25, 0.25, 0.25], // 0x404040
        });
        self.tracker.track(Resource::Node(ambient.clone()));
        self.scene.add(ambient);

        // Background probe from a random environment map; on failure the
        // flat background color stays.
        let mut rng = rand::thread_rng();
        let generation = self.tracker.generation();
        let started = generation.get();
        let path = environment_path(&mut rng);
        match loader.load_environment(&path) {
            Ok(data) if generation.get() == started => {
                let env = Texture::new(path, data.width, data.height, data.pixels);
                self.tracker.track(Resource::Texture(env.clone()));
                self.scene.background = Background::Texture(env.clone());
                self.scene.environment = Some(env);
            }
            Ok(_) => log::debug!("discarding stale environment probe {path}"),
            Err(err) => log::warn!("environment probe {path} failed: {err:#}"),
        }
    }

    /// Elapsed session time on the animation clock (hundredths of a
    /// second, matching the trigonometric phase scales below).
    fn clock(&self) -> f32 {
        self.started.elapsed().as_millis() as f32 * 0.01
    }

    /// Per-frame update: deform particle and mesh attributes from the
    /// current spectrum snapshot and move the camera. Never suspends.
    pub fn render(&mut self) {
        let time = self.clock();
        let spectrum = self.sampler.get();
        let mut rng = rand::thread_rng();

        if let Some(points) = self.points.clone() {
            self.render_points(&points, time, &spectrum, &mut rng);
        }
        if let Some(other) = self.points_other.clone() {
            self.render_scatter(&other, &spectrum, &mut rng);
        }

        // Lissajous-like orbit scaled by rand1; odd rand1 keeps the
        // camera in the horizontal plane.
        let orbit = CAMERA_ORBIT_SCALE * self.rand1 as f32;
        self.camera.position.x = orbit * (time / 100.0).sin();
        self.camera.position.z = orbit * (time / 100.0).cos();
        if self.rand1 % 2 == 0 {
            self.camera.position.y = orbit * (time / 100.0).cos();
        }
        if let Some(mesh) = &self.mesh {
            self.camera.target = mesh.borrow().position;
        }

        if let Some(mesh) = self.mesh.clone() {
            self.render_mesh(&mesh, &spectrum, &mut rng);
        }
    }

    fn render_points(
        &self,
        points: &NodeHandle,
        time: f32,
        spectrum: &Snapshot,
        rng: &mut impl Rng,
    ) {
        {
            let mut node = points.borrow_mut();
            node.rotation.z = 0.01 * time;
            node.rotation.x = 0.01 * time;
        }
        let Some(geometry) = points.borrow().geometry.clone() else {
            return;
        };
        let mut g = geometry.borrow_mut();
        if g.is_disposed() || g.positions.is_empty() {
            return;
        }

        let l = g.positions.len();
        let r1: f32 = if self.rand1 > 5 { 1.0 } else { -1.0 };
        let r2: f32 = if self.rand2 > 5 { 1.0 } else { -1.0 };
        let mut phase = 0usize;
        for i in 0..l - 1 {
            if g.positions[i] > 0.0 && spectrum[6] > 100 {
                g.positions[i] += spectrum[6] as f32 / 1000.0 + rng.gen::<f32>() * (1.0 - r1);
            } else if spectrum[4] > 50 {
                g.positions[i] -= (time * spectrum[3] as f32 + i as f32).cos();
            }

            let frac = i as f32 / l as f32;
            match phase {
                0 => {
                    g.colors[i] = spectrum[4] as f32 / 100.0 + spectrum[7] as f32 / 255.0 * r1;
                    if self.rand1 % 2 == 0 {
                        g.colors[i] -= frac.sin();
                    }
                    phase += 1;
                }
                1 => {
                    g.colors[i] = spectrum[5] as f32 / 100.0 + spectrum[1] as f32 / 255.0 * r2;
                    if self.rand1 % 2 == 0 {
                        g.colors[i] -= frac.cos();
                    }
                    phase += 1;
                }
                _ => {
                    g.colors[i] = spectrum[9] as f32 / 100.0 + spectrum[1] as f32 / 255.0 * r1;
                    if self.rand1 % 2 == 0 {
                        g.colors[i] -= frac.tan();
                    }
                    phase = 0;
                }
            }

            if self.rand1 < 2 {
                g.colors[i] += frac * r1;
            }
        }
        g.dirty.positions = true;
        g.dirty.colors = true;
    }

    fn render_scatter(&self, other: &NodeHandle, spectrum: &Snapshot, rng: &mut impl Rng) {
        let Some(geometry) = other.borrow().geometry.clone() else {
            return;
        };
        let mut g = geometry.borrow_mut();
        if g.is_disposed() || g.positions.is_empty() {
            return;
        }

        let drift = (spectrum[9] as f32).cos() / 10.0;
        for i in 0..g.positions.len() - 1 {
            g.positions[i] += drift + (rng.gen::<f32>() - rng.gen::<f32>()) / 10.0;
        }
        let scale = 100.0 * (spectrum[9] as f32 / 255.0) + self.rand1 as f32;
        for s in g.scales.iter_mut() {
            *s = scale;
        }
        g.dirty.positions = true;
        g.dirty.scales = true;
    }

    fn render_mesh(&self, mesh: &NodeHandle, spectrum: &Snapshot, rng: &mut impl Rng) {
        let (geometry, material) = {
            let m = mesh.borrow();
            (m.geometry.clone(), m.material.clone())
        };

        if let Some(material) = material {
            let mut m = material.borrow_mut();
            if !m.is_disposed() {
                m.uniforms.amplitude = spectrum[7] as f32 / 5000.0;
                for channel in m.uniforms.color.iter_mut() {
                    *channel = channel.clamp(0.0, 2.0);
                    let step = rng.gen::<f32>() / 20.0;
                    *channel += if spectrum[rng.gen_range(1..6)] > 150 {
                        step
                    } else {
                        -step
                    };
                }
            }
        }

        let Some(geometry) = geometry else {
            return;
        };
        let mut g = geometry.borrow_mut();
        if g.is_disposed() {
            return;
        }

        let bin = spectrum[(self.rand1 - 1) as usize] as f32;
        for i in 0..g.displacement.len() {
            g.noise[i] = g.noise[i].clamp(-NOISE_CLAMP, NOISE_CLAMP);
            g.displacement[i] += bin / 2.0;
        }
        g.dirty.displacement = true;

        if self.rand2 > 5 {
            let l = g.positions.len();
            let stride = self.rand1.max(1) as usize;
            let mut i = 1;
            while i < l.saturating_sub(4) {
                let x = rng.gen::<f32>() * spectrum[3] as f32;
                g.positions[i] += x / 1000.0;
                g.positions[i + 1] += x / 1000.0;
                g.positions[i + 2] += x / 1000.0;
                i += stride;
            }
            g.dirty.positions = true;
        }
    }
}
