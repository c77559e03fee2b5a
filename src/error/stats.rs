// Transport statistics error types and constants

use crate::error::ErrorCode;
use log::warn;
use std::fmt;

/// Statistics error code constants
///
/// Error code range: 2001-2003
pub struct StatsErrorCodes {}

impl StatsErrorCodes {
    /// Report payload could not be decoded
    pub const MALFORMED: i32 = 2001;

    /// Replay provider has no snapshots left
    pub const EXHAUSTED: i32 = 2002;

    /// I/O failure while loading reports
    pub const IO: i32 = 2003;
}

/// Log a statistics error.
///
/// Statistics failures never end a session, so they are logged at warn level.
pub fn log_stats_error(err: &StatsError, context: &str) {
    warn!(
        "Stats error in {}: code={}, component=StatsProvider, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors surfaced by transport-statistics providers.
#[derive(Debug, Clone, PartialEq)]
pub enum StatsError {
    /// Payload did not match the expected report layout
    Malformed { reason: String },

    /// No snapshots remain
    Exhausted,

    /// Underlying I/O failure
    Io { details: String },
}

impl ErrorCode for StatsError {
    fn code(&self) -> i32 {
        match self {
            StatsError::Malformed { .. } => StatsErrorCodes::MALFORMED,
            StatsError::Exhausted => StatsErrorCodes::EXHAUSTED,
            StatsError::Io { .. } => StatsErrorCodes::IO,
        }
    }

    fn message(&self) -> String {
        match self {
            StatsError::Malformed { reason } => format!("Malformed statistics: {}", reason),
            StatsError::Exhausted => "Statistics replay exhausted".to_string(),
            StatsError::Io { details } => format!("Statistics I/O error: {}", details),
        }
    }
}

impl fmt::Display for StatsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "StatsError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for StatsError {}

impl From<std::io::Error> for StatsError {
    fn from(err: std::io::Error) -> Self {
        StatsError::Io {
            details: err.to_string(),
        }
    }
}

impl From<serde_json::Error> for StatsError {
    fn from(err: serde_json::Error) -> Self {
        StatsError::Malformed {
            reason: err.to_string(),
        }
    }
}
