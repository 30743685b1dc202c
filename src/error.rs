//! Error types for the copy engine and the ring beneath it

use crate::ops::Direction;
use std::io;
use thiserror::Error;

/// Result type used throughout the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort a copy
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error from the system
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// io_uring setup failed
    #[error("io_uring setup failed: {0}")]
    Setup(#[source] io::Error),

    /// No submission slot for an operation that must be resubmitted
    #[error("submission queue is full")]
    SubmissionQueueFull,

    /// `io_uring_submit` returned a negative code
    #[error("submit failed: {0}")]
    Submit(#[source] io::Error),

    /// A completion carried an error other than `EAGAIN`
    #[error("{direction} at offset {offset} failed: {source}")]
    Completion {
        direction: Direction,
        offset: u64,
        #[source]
        source: io::Error,
    },

    /// A read returned 0 bytes before the expected size was reached
    #[error("source ended early at offset {offset}")]
    UnexpectedEof { offset: u64 },

    /// A write made no progress
    #[error("destination accepted no data at offset {offset}")]
    WriteZero { offset: u64 },

    /// An operation kept completing with `EAGAIN`
    #[error("{direction} at offset {offset} still busy after {attempts} retries")]
    RetriesExhausted {
        direction: Direction,
        offset: u64,
        attempts: u32,
    },

    /// The descriptor is neither a regular file nor a block device
    #[error("size not obtainable: {0}")]
    SizeUnavailable(String),

    /// Rejected configuration value
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Scheduler bookkeeping reached an impossible state
    #[error("copy engine invariant violated: {0}")]
    InvariantViolated(String),
}

impl Error {
    /// Errno behind this error, when there is one
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            Error::Io(e) | Error::Setup(e) | Error::Submit(e) => e.raw_os_error(),
            Error::Completion { source, .. } => source.raw_os_error(),
            _ => None,
        }
    }
}

/// Convert a negative return code to an io::Error
pub(crate) fn from_ret_code(ret: i32) -> io::Error {
    io::Error::from_raw_os_error(-ret)
}

/// Check a return code and convert to Result
pub(crate) fn check_ret(ret: i32) -> io::Result<i32> {
    if ret < 0 {
        Err(from_ret_code(ret))
    } else {
        Ok(ret)
    }
}
