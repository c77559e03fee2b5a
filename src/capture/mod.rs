//! Audio capture collaborators.
//!
//! Capture devices are pulled on the session tick instead of pushing through
//! callbacks: `take_chunks(now)` hands over every chunk completed since the
//! previous call. Chunk payloads are 16-bit little-endian mono PCM.

pub mod recording;
pub mod stub;

#[cfg(feature = "mic")]
pub mod cpal;

pub use recording::{Recording, Track};
pub use stub::StubCapture;

#[cfg(feature = "mic")]
pub use self::cpal::CpalCapture;

use serde::{Deserialize, Serialize};

use crate::error::CaptureError;

/// PCM layout of captured chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AudioFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

impl AudioFormat {
    pub fn mono(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            channels: 1,
        }
    }

    /// Samples per channel in one chunk of `period_ms`.
    pub fn samples_per_period(&self, period_ms: u64) -> usize {
        (u64::from(self.sample_rate) * period_ms / 1_000) as usize
    }
}

/// One captured block of audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub index: u64,
    pub captured_at_ms: u64,
    pub data: Vec<u8>,
}

impl AudioChunk {
    pub fn size_bytes(&self) -> usize {
        self.data.len()
    }
}

/// Source of captured audio chunks.
pub trait CaptureDevice {
    /// Begin producing chunks every `chunk_period_ms`, starting at `now_ms`.
    fn start(&mut self, chunk_period_ms: u64, now_ms: u64) -> Result<(), CaptureError>;

    fn stop(&mut self);

    fn is_inactive(&self) -> bool;

    fn format(&self) -> AudioFormat;

    /// Chunks completed since the previous call.
    fn take_chunks(&mut self, now_ms: u64) -> Vec<AudioChunk>;
}

pub(crate) fn encode_pcm16(samples: impl IntoIterator<Item = i16>) -> Vec<u8> {
    samples
        .into_iter()
        .flat_map(|sample| sample.to_le_bytes())
        .collect()
}

pub(crate) fn float_to_pcm16(sample: f32) -> i16 {
    (sample.clamp(-1.0, 1.0) * f32::from(i16::MAX)) as i16
}
