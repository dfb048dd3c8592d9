//! Rolling audio-spectrum snapshot.
//!
//! The sampler owns a 16-bin byte spectrum that a capture thread
//! overwrites wholesale. When no capture is running (permission denied,
//! no device) the snapshot stays at its deterministic initial ramp and
//! animation proceeds regardless; capture failure is logged by the
//! frontend, never raised here.

use std::sync::{Arc, Mutex};

use crate::constants::{FALLBACK_RAMP_STEP, SPECTRUM_BINS};

pub type Snapshot = [u8; SPECTRUM_BINS];

/// Writer half handed to the capture thread; replaces the snapshot
/// wholesale at the sensor's cadence.
#[derive(Clone)]
pub struct SpectrumWriter {
    shared: Arc<Mutex<Snapshot>>,
}

impl SpectrumWriter {
    pub fn store(&self, snapshot: Snapshot) {
        *self.shared.lock().unwrap() = snapshot;
    }
}

pub struct SpectrumSampler {
    shared: Arc<Mutex<Snapshot>>,
    cursor: usize,
}

impl Default for SpectrumSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectrumSampler {
    pub fn new() -> Self {
        let mut ramp = [0u8; SPECTRUM_BINS];
        for (i, bin) in ramp.iter_mut().enumerate() {
            *bin = 100u8.saturating_sub(i as u8 * FALLBACK_RAMP_STEP);
        }
        Self {
            shared: Arc::new(Mutex::new(ramp)),
            cursor: 0,
        }
    }

    pub fn writer(&self) -> SpectrumWriter {
        SpectrumWriter {
            shared: Arc::clone(&self.shared),
        }
    }

    /// The whole current snapshot. The animation driver grabs one copy
    /// per frame rather than locking per bin.
    pub fn get(&self) -> Snapshot {
        *self.shared.lock().unwrap()
    }

    /// Amplitude at a fixed bin. An index beyond the snapshot is a
    /// programming error and panics.
    pub fn get_by_index(&self, index: usize) -> u8 {
        self.get()[index]
    }

    /// Amplitude at an advancing cursor that wraps across the 16 bins.
    pub fn get_next(&mut self) -> u8 {
        let value = self.get()[self.cursor];
        self.cursor = (self.cursor + 1) % SPECTRUM_BINS;
        value
    }
}
