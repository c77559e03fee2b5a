//! Microphone capture through cpal.
//!
//! The cpal input callback runs on the audio thread and only pushes samples
//! into a lock-free SPSC ring; the session thread drains it on each tick and
//! cuts fixed-length PCM chunks.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::{Consumer, RingBuffer};

use crate::error::CaptureError;

use super::{encode_pcm16, float_to_pcm16, AudioChunk, AudioFormat, CaptureDevice};

/// Seconds of audio the ring can hold before the callback starts dropping.
const RING_SECONDS: usize = 2;

pub struct CpalCapture {
    format: AudioFormat,
    stream: Option<cpal::Stream>,
    consumer: Option<Consumer<f32>>,
    pending: Vec<i16>,
    samples_per_chunk: usize,
    next_index: u64,
}

impl CpalCapture {
    pub fn new() -> Self {
        Self {
            format: AudioFormat::mono(48_000),
            stream: None,
            consumer: None,
            pending: Vec::new(),
            samples_per_chunk: 4_800,
            next_index: 0,
        }
    }
}

impl Default for CpalCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureDevice for CpalCapture {
    fn start(&mut self, chunk_period_ms: u64, _now_ms: u64) -> Result<(), CaptureError> {
        if self.stream.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }

        let host = cpal::default_host();
        let device = host
            .default_input_device()
            .ok_or_else(|| CaptureError::DeviceUnavailable {
                details: "No default input device found".to_string(),
            })?;

        let config = device
            .default_input_config()
            .map_err(|e| CaptureError::StreamOpenFailed {
                reason: format!("Failed to get default input config: {:?}", e),
            })?;

        let stream_config: cpal::StreamConfig = config.clone().into();
        let channels_count = usize::from(stream_config.channels.max(1));
        let sample_rate = stream_config.sample_rate.0;

        let (mut producer, consumer) = RingBuffer::<f32>::new(sample_rate as usize * RING_SECONDS);

        let err_fn = |err| tracing::warn!("[CpalCapture] Input stream error: {}", err);

        let stream = match config.sample_format() {
            cpal::SampleFormat::F32 => device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    // First channel only; samples are dropped when the ring is full.
                    for frame in data.chunks(channels_count) {
                        if let Some(sample) = frame.first() {
                            let _ = producer.push(*sample);
                        }
                    }
                },
                err_fn,
                None,
            ),
            _ => {
                return Err(CaptureError::StreamOpenFailed {
                    reason: "Only F32 sample format is currently supported for input".to_string(),
                })
            }
        }
        .map_err(map_build_error)?;

        stream.play().map_err(|e| CaptureError::StreamOpenFailed {
            reason: format!("{:?}", e),
        })?;

        self.format = AudioFormat::mono(sample_rate);
        self.samples_per_chunk = self.format.samples_per_period(chunk_period_ms).max(1);
        self.pending.clear();
        self.consumer = Some(consumer);
        self.stream = Some(stream);
        tracing::info!(
            "[CpalCapture] Capturing at {} Hz, {} samples per chunk",
            sample_rate,
            self.samples_per_chunk
        );
        Ok(())
    }

    fn stop(&mut self) {
        if let Some(stream) = self.stream.take() {
            if let Err(err) = stream.pause() {
                tracing::warn!("[CpalCapture] Failed to pause input stream: {:?}", err);
            }
        }
        self.consumer = None;
    }

    fn is_inactive(&self) -> bool {
        self.stream.is_none()
    }

    fn format(&self) -> AudioFormat {
        self.format
    }

    fn take_chunks(&mut self, now_ms: u64) -> Vec<AudioChunk> {
        let Some(consumer) = self.consumer.as_mut() else {
            return Vec::new();
        };

        while let Ok(sample) = consumer.pop() {
            self.pending.push(float_to_pcm16(sample));
        }

        let mut chunks = Vec::new();
        while self.pending.len() >= self.samples_per_chunk {
            let block: Vec<i16> = self.pending.drain(..self.samples_per_chunk).collect();
            chunks.push(AudioChunk {
                index: self.next_index,
                captured_at_ms: now_ms,
                data: encode_pcm16(block),
            });
            self.next_index += 1;
        }
        chunks
    }
}

fn map_build_error(err: cpal::BuildStreamError) -> CaptureError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceUnavailable {
            details: "input device disappeared".to_string(),
        },
        cpal::BuildStreamError::BackendSpecific { err }
            if err.description.to_lowercase().contains("permission") =>
        {
            CaptureError::PermissionDenied
        }
        other => CaptureError::StreamOpenFailed {
            reason: format!("{:?}", other),
        },
    }
}
