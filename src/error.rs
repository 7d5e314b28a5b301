//! Errors that abort a whole scan.
//!
//! Per-port failures never show up here: a refused, unreachable or timed out
//! connection is recorded in that port's [`ProbeOutcome`](crate::scanner::ProbeOutcome).
use thiserror::Error;

/// Fatal conditions that cannot be attributed to a single port.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScanError {
    /// The range does not satisfy `1 <= start <= end <= 65535`.
    #[error("invalid port range {start}-{end}, ports must satisfy 1 <= start <= end <= 65535")]
    InvalidPortRange { start: u32, end: u32 },

    /// The host ran out of sockets or file descriptors mid-scan.
    #[error("{0}. Please reduce the batch size or raise the ulimit")]
    ResourceExhausted(String),
}

/// Result type alias for scan operations
pub type ScanResult<T> = Result<T, ScanError>;
