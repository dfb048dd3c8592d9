//! Post-processing pipeline configuration.
//!
//! The core only composes per-pass numeric configuration; the frontend
//! owns the actual passes. Which optional passes are present is gated on
//! `rand1` for the lifetime of a generation.

use rand::Rng;

#[derive(Clone, Debug, PartialEq)]
pub enum PassConfig {
    Render,
    Bloom { strength: f32, radius: f32, threshold: f32 },
    Afterimage { damp: f32 },
    Film {
        noise_intensity: f32,
        scanline_intensity: f32,
        scanline_count: f32,
        grayscale: bool,
    },
    Grayscale,
    DepthOfField { focus: f32, aperture: f32, max_blur: f32 },
}

#[derive(Clone, Debug, Default)]
pub struct PostPipeline {
    pub passes: Vec<PassConfig>,
}

impl PostPipeline {
    pub fn has_grayscale(&self) -> bool {
        self.passes.iter().any(|p| matches!(p, PassConfig::Grayscale))
    }

    pub fn has_depth_of_field(&self) -> bool {
        self.passes
            .iter()
            .any(|p| matches!(p, PassConfig::DepthOfField { .. }))
    }

    pub fn has_film(&self) -> bool {
        self.passes.iter().any(|p| matches!(p, PassConfig::Film { .. }))
    }
}

pub fn build_pipeline(rand1: u32, rng: &mut impl Rng) -> PostPipeline {
    let mut passes = vec![
        PassConfig::Render,
        PassConfig::Bloom {
            strength: rng.gen_range(1..3) as f32 / 10.0,
            radius: 0.1,
            threshold: 0.0,
        },
        PassConfig::Afterimage { damp: rng.gen::<f32>() },
    ];
    if rand1 % 2 == 0 {
        passes.push(PassConfig::Film {
            noise_intensity: rng.gen::<f32>(),
            scanline_intensity: rng.gen::<f32>(),
            scanline_count: rng.gen::<f32>() * 1000.0,
            grayscale: false,
        });
    }
    if rand1 == 1 || rand1 == 8 {
        passes.push(PassConfig::Grayscale);
    }
    if rand1 > 7 {
        passes.push(PassConfig::DepthOfField {
            focus: 10.0,
            aperture: rng.gen::<f32>() * 5.0,
            max_blur: 0.01,
        });
    }
    PostPipeline { passes }
}
