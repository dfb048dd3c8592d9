pub mod assets;
pub mod constants;
pub mod error;
pub mod particles;
pub mod post;
pub mod procgen;
pub mod sampler;
pub mod scene;
pub mod session;
pub mod tracker;

pub use constants::*;
pub use error::SceneError;
pub use post::{build_pipeline, PassConfig, PostPipeline};
pub use sampler::{SpectrumSampler, SpectrumWriter};
pub use scene::{Background, Camera, Scene};
pub use session::SceneSession;
pub use tracker::{Generation, Resource, ResourceTracker};
