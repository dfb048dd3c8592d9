// Shared tuning constants used by the core and the native frontend.

// Spectrum
pub const SPECTRUM_BINS: usize = 16; // analyser bins exposed to the animation driver
pub const FALLBACK_RAMP_STEP: u8 = 10; // fallback spectrum descends by this per bin

// Procedural geometry
pub const DEFAULT_DISPLACEMENT_COUNT: usize = 25_000; // scalar buffer size before the first geometry exists
pub const NOISE_CLAMP: f32 = 5.0; // per-vertex noise is held in [-NOISE_CLAMP, NOISE_CLAMP]

// Asset pools (picked uniformly at random per generation)
pub const MODEL_ASSET_COUNT: u32 = 2;
pub const TEXTURE_ASSET_COUNT: u32 = 13;
pub const ENVIRONMENT_ASSET_COUNT: u32 = 15;

// Particle fields
pub const PARTICLE_GRID: usize = 100; // the freeform cloud is PARTICLE_GRID^2 points

// Camera and lifecycle
pub const CAMERA_DISTANCE: f32 = 500.0; // initial camera z
pub const CAMERA_ORBIT_SCALE: f32 = -50.0; // orbit radius is this times rand1
pub const REGENERATE_INTERVAL_SECS: f32 = 10.0; // periodic scene rebuild cadence

pub const BACKGROUND_COLOR: [f32; 3] = [0.0196, 0.0196, 0.0196]; // 0x050505
