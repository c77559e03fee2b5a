//! Original and received audio kept for playback comparison.

use std::path::Path;

use super::{AudioChunk, AudioFormat};

/// Which side of the simulated link to export.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Track {
    Original,
    Received,
}

/// Chunks captured locally and chunks that survived the simulated link.
#[derive(Debug, Clone)]
pub struct Recording {
    format: AudioFormat,
    original: Vec<AudioChunk>,
    received: Vec<AudioChunk>,
}

impl Recording {
    pub fn new(format: AudioFormat) -> Self {
        Self {
            format,
            original: Vec::new(),
            received: Vec::new(),
        }
    }

    pub fn format(&self) -> AudioFormat {
        self.format
    }

    pub fn push_original(&mut self, chunk: AudioChunk) {
        self.original.push(chunk);
    }

    /// Copy the original chunk `index` to the received track.
    ///
    /// Returns the chunk size, or `None` when the index was never captured.
    pub fn mark_received(&mut self, index: u64) -> Option<usize> {
        let chunk = self.find_original(index)?.clone();
        let size = chunk.size_bytes();
        self.received.push(chunk);
        Some(size)
    }

    pub fn find_original(&self, index: u64) -> Option<&AudioChunk> {
        match self
            .original
            .binary_search_by_key(&index, |chunk| chunk.index)
        {
            Ok(position) => self.original.get(position),
            Err(_) => self.original.iter().find(|chunk| chunk.index == index),
        }
    }

    pub fn original(&self) -> &[AudioChunk] {
        &self.original
    }

    pub fn received(&self) -> &[AudioChunk] {
        &self.received
    }

    pub fn track(&self, track: Track) -> &[AudioChunk] {
        match track {
            Track::Original => &self.original,
            Track::Received => &self.received,
        }
    }

    /// Concatenated payload of one track, in arrival order.
    pub fn track_bytes(&self, track: Track) -> Vec<u8> {
        self.track(track)
            .iter()
            .flat_map(|chunk| chunk.data.iter().copied())
            .collect()
    }

    /// Write one track as a 16-bit PCM WAV file.
    pub fn write_wav(&self, path: impl AsRef<Path>, track: Track) -> Result<usize, hound::Error> {
        let spec = hound::WavSpec {
            channels: self.format.channels,
            sample_rate: self.format.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec)?;
        let mut written = 0usize;
        for chunk in self.track(track) {
            for pair in chunk.data.chunks_exact(2) {
                writer.write_sample(i16::from_le_bytes([pair[0], pair[1]]))?;
                written += 1;
            }
        }
        writer.finalize()?;
        Ok(written)
    }
}
