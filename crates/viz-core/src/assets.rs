//! Asset-loader collaborator interface.
//!
//! The core never touches the filesystem; the frontend implements this
//! trait (gltf/image on native) and tests use in-memory mocks. Load
//! failures are ordinary `anyhow` errors that the session degrades on.

use anyhow::Result;
use rand::Rng;

use crate::constants::{ENVIRONMENT_ASSET_COUNT, MODEL_ASSET_COUNT, TEXTURE_ASSET_COUNT};

#[derive(Clone, Debug, Default)]
pub struct ModelData {
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<u32>,
}

#[derive(Clone, Debug, Default)]
pub struct TextureData {
    pub width: u32,
    pub height: u32,
    /// RGBA8.
    pub pixels: Vec<u8>,
}

pub trait AssetLoader {
    fn load_model(&self, path: &str) -> Result<ModelData>;
    fn load_texture(&self, path: &str) -> Result<TextureData>;
    fn load_environment(&self, path: &str) -> Result<TextureData>;
}

pub fn model_path(rng: &mut impl Rng) -> String {
    format!("models/{}.gltf", rng.gen_range(1..=MODEL_ASSET_COUNT))
}

pub fn texture_path(rng: &mut impl Rng) -> String {
    format!("image/texture/{}.jpg", rng.gen_range(1..=TEXTURE_ASSET_COUNT))
}

pub fn environment_path(rng: &mut impl Rng) -> String {
    format!("hdri/{}.hdr", rng.gen_range(1..=ENVIRONMENT_ASSET_COUNT))
}
