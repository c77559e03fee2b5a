// Capture error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Capture error code constants
///
/// Error code range: 1001-1004
pub struct CaptureErrorCodes {}

impl CaptureErrorCodes {
    /// Microphone permission denied
    pub const PERMISSION_DENIED: i32 = 1001;

    /// No usable input device
    pub const DEVICE_UNAVAILABLE: i32 = 1002;

    /// Capture is already running
    pub const ALREADY_RUNNING: i32 = 1003;

    /// Failed to open the input stream
    pub const STREAM_OPEN_FAILED: i32 = 1004;
}

/// Log a capture error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_capture_error(err: &CaptureError, context: &str) {
    error!(
        "Capture error in {}: code={}, component=CaptureDevice, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised by capture devices.
///
/// A capture error at session start aborts the start before any session
/// state is touched; the operator can retry.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureError {
    /// Microphone permission denied
    PermissionDenied,

    /// No input device could be found
    DeviceUnavailable { details: String },

    /// Capture already running
    AlreadyRunning,

    /// Failed to open audio stream
    StreamOpenFailed { reason: String },
}

impl ErrorCode for CaptureError {
    fn code(&self) -> i32 {
        match self {
            CaptureError::PermissionDenied => CaptureErrorCodes::PERMISSION_DENIED,
            CaptureError::DeviceUnavailable { .. } => CaptureErrorCodes::DEVICE_UNAVAILABLE,
            CaptureError::AlreadyRunning => CaptureErrorCodes::ALREADY_RUNNING,
            CaptureError::StreamOpenFailed { .. } => CaptureErrorCodes::STREAM_OPEN_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            CaptureError::PermissionDenied => {
                "Microphone permission denied. Please grant microphone access.".to_string()
            }
            CaptureError::DeviceUnavailable { details } => {
                format!("No input device available: {}", details)
            }
            CaptureError::AlreadyRunning => {
                "Capture already running. Stop the session first.".to_string()
            }
            CaptureError::StreamOpenFailed { reason } => {
                format!("Failed to open audio stream: {}", reason)
            }
        }
    }
}

impl fmt::Display for CaptureError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "CaptureError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for CaptureError {}

impl From<std::io::Error> for CaptureError {
    fn from(err: std::io::Error) -> Self {
        CaptureError::DeviceUnavailable {
            details: err.to_string(),
        }
    }
}
