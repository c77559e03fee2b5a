use std::f32::consts::PI;

use crate::error::CaptureError;

use super::{encode_pcm16, float_to_pcm16, AudioChunk, AudioFormat, CaptureDevice};

const TONE_AMPLITUDE: f32 = 0.3;

/// Deterministic capture device used for CLI runs and tests.
///
/// Produces a continuous sine tone without touching audio hardware. It can be
/// configured to refuse `start` to exercise the capture-failure path.
pub struct StubCapture {
    format: AudioFormat,
    tone_hz: f32,
    period_ms: u64,
    running: bool,
    next_index: u64,
    next_due_ms: u64,
    phase: f32,
    refuse_with: Option<CaptureError>,
}

impl StubCapture {
    pub fn new(sample_rate: u32, tone_hz: f32) -> Self {
        Self {
            format: AudioFormat::mono(sample_rate.max(1)),
            tone_hz,
            period_ms: 100,
            running: false,
            next_index: 0,
            next_due_ms: 0,
            phase: 0.0,
            refuse_with: None,
        }
    }

    /// A device whose `start` always fails with `err`.
    pub fn refusing(err: CaptureError) -> Self {
        Self {
            refuse_with: Some(err),
            ..Self::default()
        }
    }

    /// Let a previously refusing device start on the next attempt.
    pub fn grant(&mut self) {
        self.refuse_with = None;
    }

    fn render_chunk(&mut self, captured_at_ms: u64) -> AudioChunk {
        let count = self.format.samples_per_period(self.period_ms);
        let step = 2.0 * PI * self.tone_hz / self.format.sample_rate as f32;
        let mut samples = Vec::with_capacity(count);
        for _ in 0..count {
            samples.push(float_to_pcm16(TONE_AMPLITUDE * self.phase.sin()));
            self.phase = (self.phase + step) % (2.0 * PI);
        }

        let chunk = AudioChunk {
            index: self.next_index,
            captured_at_ms,
            data: encode_pcm16(samples),
        };
        self.next_index += 1;
        chunk
    }
}

impl Default for StubCapture {
    fn default() -> Self {
        Self::new(8_000, 440.0)
    }
}

impl CaptureDevice for StubCapture {
    fn start(&mut self, chunk_period_ms: u64, now_ms: u64) -> Result<(), CaptureError> {
        if let Some(err) = &self.refuse_with {
            return Err(err.clone());
        }
        if self.running {
            return Err(CaptureError::AlreadyRunning);
        }

        self.period_ms = chunk_period_ms.max(1);
        self.next_due_ms = now_ms + self.period_ms;
        self.running = true;
        Ok(())
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_inactive(&self) -> bool {
        !self.running
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn take_chunks(&mut self, now_ms: u64) -> Vec<AudioChunk> {
        let mut chunks = Vec::new();
        if !self.running {
            return chunks;
        }

        while self.next_due_ms <= now_ms {
            let due = self.next_due_ms;
            chunks.push(self.render_chunk(due));
            self.next_due_ms += self.period_ms;
        }
        chunks
    }
}
