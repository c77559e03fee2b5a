// Error types for the call quality meter
//
// Capture errors abort a session start; statistics errors are handled per tick.
// Both carry numeric codes so CLI and HTTP surfaces can report them uniformly.

mod capture;
mod stats;

pub use capture::{log_capture_error, CaptureError, CaptureErrorCodes};
pub use stats::{log_stats_error, StatsError, StatsErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
