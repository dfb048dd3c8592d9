//! Microphone capture and spectrum analysis.
//!
//! A cpal input stream feeds overlapping 32-sample blocks through a
//! Hann-windowed FFT; the low 16 magnitude bins are smoothed, mapped
//! from decibels to bytes and published through the `SpectrumWriter`.
//! When no input device exists the stream is simply absent and the
//! sampler's fallback ramp stays in place.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rustfft::num_complex::Complex;
use rustfft::{Fft, FftPlanner};

use viz_core::sampler::SpectrumWriter;
use viz_core::SPECTRUM_BINS;

const FFT_SIZE: usize = 2 * SPECTRUM_BINS;
const HOP: usize = FFT_SIZE / 2;
/// Exponential smoothing factor applied to each bin between blocks.
const SMOOTHING: f32 = 0.8;
const MIN_DB: f32 = -100.0;
const MAX_DB: f32 = -30.0;

struct Analyser {
    fft: Arc<dyn Fft<f32>>,
    window: [f32; FFT_SIZE],
    pending: Vec<f32>,
    smoothed: [f32; SPECTRUM_BINS],
    writer: SpectrumWriter,
}

impl Analyser {
    fn new(writer: SpectrumWriter) -> Self {
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(FFT_SIZE);
        let window = std::array::from_fn(|i| {
            let t = i as f32 / (FFT_SIZE - 1) as f32;
            0.5 - 0.5 * (std::f32::consts::TAU * t).cos()
        });
        Self {
            fft,
            window,
            pending: Vec::with_capacity(FFT_SIZE * 4),
            smoothed: [MIN_DB; SPECTRUM_BINS],
            writer,
        }
    }

    fn push(&mut self, samples: impl Iterator<Item = f32>) {
        self.pending.extend(samples);
        while self.pending.len() >= FFT_SIZE {
            self.analyse_block();
            // 50% overlap between consecutive blocks.
            self.pending.drain(..HOP);
        }
    }

    fn analyse_block(&mut self) {
        let mut buffer: Vec<Complex<f32>> = self.pending[..FFT_SIZE]
            .iter()
            .zip(self.window.iter())
            .map(|(sample, w)| Complex::new(sample * w, 0.0))
            .collect();
        self.fft.process(&mut buffer);

        let mut snapshot = [0u8; SPECTRUM_BINS];
        for (i, out) in snapshot.iter_mut().enumerate() {
            let magnitude = buffer[i].norm() / FFT_SIZE as f32;
            let db = 20.0 * magnitude.max(1e-10).log10();
            self.smoothed[i] = SMOOTHING * self.smoothed[i] + (1.0 - SMOOTHING) * db;
            *out = byte_level(self.smoothed[i]);
        }
        self.writer.store(snapshot);
    }
}

/// Map a smoothed dB level onto the 0..=255 byte range the animation
/// formulas consume.
fn byte_level(db: f32) -> u8 {
    let t = (db - MIN_DB) / (MAX_DB - MIN_DB);
    (t.clamp(0.0, 1.0) * 255.0) as u8
}

/// Open the default input device and start publishing spectra. Returns
/// `None` when capture is unavailable; the caller keeps the stream
/// alive for the lifetime of the window.
pub fn start_capture(writer: SpectrumWriter) -> Option<cpal::Stream> {
    let host = cpal::default_host();
    let device = host.default_input_device()?;
    let config = device.default_input_config().ok()?;
    let channels = config.channels() as usize;
    let analyser = Analyser::new(writer);

    let err_fn = |err| log::warn!("capture stream error: {err}");

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => {
            build_stream_f32(&device, &config.into(), channels, analyser, err_fn).ok()?
        }
        cpal::SampleFormat::I16 => {
            build_stream_i16(&device, &config.into(), channels, analyser, err_fn).ok()?
        }
        cpal::SampleFormat::U16 => {
            build_stream_u16(&device, &config.into(), channels, analyser, err_fn).ok()?
        }
        _ => return None,
    };

    stream.play().ok()?;
    Some(stream)
}

fn mono<'a>(data: &'a [f32], channels: usize) -> impl Iterator<Item = f32> + 'a {
    data.chunks_exact(channels)
        .map(move |frame| frame.iter().copied().sum::<f32>() / channels as f32)
}

fn build_stream_f32(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut analyser: Analyser,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    device.build_input_stream(
        config,
        move |data: &[f32], _| analyser.push(mono(data, channels)),
        err_fn,
        None,
    )
}

fn build_stream_i16(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut analyser: Analyser,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    device.build_input_stream(
        config,
        move |data: &[i16], _| {
            let samples: Vec<f32> = data.iter().map(|s| *s as f32 / i16::MAX as f32).collect();
            analyser.push(mono(&samples, channels));
        },
        err_fn,
        None,
    )
}

fn build_stream_u16(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    channels: usize,
    mut analyser: Analyser,
    err_fn: impl Fn(cpal::StreamError) + Send + 'static,
) -> Result<cpal::Stream, cpal::BuildStreamError> {
    device.build_input_stream(
        config,
        move |data: &[u16], _| {
            let samples: Vec<f32> = data
                .iter()
                .map(|s| *s as f32 / u16::MAX as f32 * 2.0 - 1.0)
                .collect();
            analyser.push(mono(&samples, channels));
        },
        err_fn,
        None,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use viz_core::sampler::SpectrumSampler;

    #[test]
    fn silence_maps_to_the_noise_floor() {
        assert_eq!(byte_level(MIN_DB), 0);
        assert_eq!(byte_level(MIN_DB - 40.0), 0);
    }

    #[test]
    fn loud_levels_saturate_at_255() {
        assert_eq!(byte_level(MAX_DB), 255);
        assert_eq!(byte_level(0.0), 255);
    }

    #[test]
    fn a_pure_tone_concentrates_energy_in_one_bin() {
        let sampler = SpectrumSampler::new();
        let mut analyser = Analyser::new(sampler.writer());
        // Full-scale cosine at bin 4 of a 32-point transform.
        let tone: Vec<f32> = (0..FFT_SIZE * 8)
            .map(|n| (std::f32::consts::TAU * 4.0 * n as f32 / FFT_SIZE as f32).cos())
            .collect();
        analyser.push(tone.into_iter());
        let snapshot = sampler.get();
        assert!(snapshot[4] > snapshot[1]);
        assert!(snapshot[4] > snapshot[10]);
    }

    #[test]
    fn short_buffers_accumulate_until_a_block_fills() {
        let sampler = SpectrumSampler::new();
        let mut analyser = Analyser::new(sampler.writer());
        analyser.push([0.1f32; 8].into_iter());
        // Fallback ramp still in place: no block analysed yet.
        assert_eq!(sampler.get()[0], 100);
        analyser.push([0.1f32; FFT_SIZE].into_iter());
        assert_ne!(sampler.get()[0], 100);
    }
}
