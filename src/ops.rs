//! Operation preparation helpers
//!
//! Safe-ish wrappers around the liburing `prep_*` calls used by the copy
//! engine, plus the [`Request`] descriptor that the [`Ring`](crate::Ring)
//! trait consumes.

use crate::sys;
use std::fmt;
use std::os::unix::io::RawFd;

/// Helper trait for preparing operations on SQEs
pub trait PrepareOp {
    /// Prepare this operation on the given SQE
    fn prepare(&self, sqe: &mut sys::io_uring_sqe);
}

/// Which way bytes move for an operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Source file into the operation buffer
    Read,
    /// Operation buffer into the destination file
    Write,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Read => f.write_str("read"),
            Direction::Write => f.write_str("write"),
        }
    }
}

/// Read operation
pub struct Read {
    /// File descriptor to read from
    pub fd: RawFd,
    /// Buffer to read into
    pub buf: *mut u8,
    /// Number of bytes to read
    pub len: u32,
    /// Offset in the file to read from
    pub offset: u64,
}

impl PrepareOp for Read {
    fn prepare(&self, sqe: &mut sys::io_uring_sqe) {
        unsafe {
            sys::io_uring_prep_read(
                sqe,
                self.fd,
                self.buf as *mut std::ffi::c_void,
                self.len,
                self.offset,
            );
        }
    }
}

/// Write operation
pub struct Write {
    /// File descriptor to write to
    pub fd: RawFd,
    /// Buffer to write from
    pub buf: *const u8,
    /// Number of bytes to write
    pub len: u32,
    /// Offset in the file to write to
    pub offset: u64,
}

impl PrepareOp for Write {
    fn prepare(&self, sqe: &mut sys::io_uring_sqe) {
        unsafe {
            sys::io_uring_prep_write(
                sqe,
                self.fd,
                self.buf as *const std::ffi::c_void,
                self.len,
                self.offset,
            );
        }
    }
}

/// A fully resolved read or write, ready to be attached to a submission slot
///
/// The buffer pointer is borrowed from an operation owned by the
/// [`Tracker`](crate::Tracker); whoever pushes a `Request` must keep that
/// buffer alive until the matching completion has been reaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Request {
    /// Read or write
    pub direction: Direction,
    /// Source descriptor for reads, destination for writes
    pub fd: RawFd,
    /// Start of the buffer region for this submission
    pub buf: *mut u8,
    /// Bytes to transfer
    pub len: u32,
    /// File offset
    pub offset: u64,
    /// Opaque token echoed back in the completion
    pub user_data: u64,
}

impl PrepareOp for Request {
    fn prepare(&self, sqe: &mut sys::io_uring_sqe) {
        match self.direction {
            Direction::Read => Read {
                fd: self.fd,
                buf: self.buf,
                len: self.len,
                offset: self.offset,
            }
            .prepare(sqe),
            Direction::Write => Write {
                fd: self.fd,
                buf: self.buf,
                len: self.len,
                offset: self.offset,
            }
            .prepare(sqe),
        }
        sqe.set_user_data(self.user_data);
    }
}

/// Extension methods for io_uring_sqe
pub trait SqeExt {
    /// Set user data on this SQE
    fn set_user_data(&mut self, data: u64);
}

impl SqeExt for sys::io_uring_sqe {
    fn set_user_data(&mut self, data: u64) {
        unsafe {
            sys::io_uring_sqe_set_data64(self, data);
        }
    }
}
