//! Submission and completion queue operations

use crate::error::{check_ret, Error, Result};
use crate::ops::PrepareOp;
use crate::sys;
use std::marker::PhantomData;

/// Submission queue for io_uring
///
/// Used to obtain submission queue entries (SQEs) and submit them to the kernel.
pub struct SubmissionQueue<'ring> {
    ring: *mut sys::io_uring,
    _phantom: PhantomData<&'ring mut sys::io_uring>,
}

impl<'ring> SubmissionQueue<'ring> {
    pub(crate) fn new(ring: &'ring mut sys::io_uring) -> Self {
        Self {
            ring,
            _phantom: PhantomData,
        }
    }

    /// Get the next available submission queue entry
    ///
    /// Returns `None` if the submission queue is full.
    pub fn get_sqe(&mut self) -> Option<&mut sys::io_uring_sqe> {
        let sqe = unsafe { sys::io_uring_get_sqe(self.ring) };

        if sqe.is_null() {
            None
        } else {
            Some(unsafe { &mut *sqe })
        }
    }

    /// Take a slot and prepare `op` on it
    ///
    /// Returns `false` without touching the ring when no slot is free.
    pub fn push<P: PrepareOp>(&mut self, op: &P) -> bool {
        match self.get_sqe() {
            Some(sqe) => {
                op.prepare(sqe);
                true
            }
            None => false,
        }
    }

    /// Submit all pending SQEs to the kernel
    ///
    /// Returns the number of SQEs submitted.
    pub fn submit(&mut self) -> Result<usize> {
        let ret = unsafe { sys::io_uring_submit(self.ring) };
        check_ret(ret).map(|n| n as usize).map_err(Error::Submit)
    }
}

/// Completion queue for io_uring
///
/// Used to retrieve and process completion queue entries (CQEs).
pub struct CompletionQueue<'ring> {
    ring: *mut sys::io_uring,
    _phantom: PhantomData<&'ring mut sys::io_uring>,
}

impl<'ring> CompletionQueue<'ring> {
    pub(crate) fn new(ring: &'ring mut sys::io_uring) -> Self {
        Self {
            ring,
            _phantom: PhantomData,
        }
    }

    /// Wait for a completion queue entry
    ///
    /// This blocks until at least one CQE is available. The entry stays at
    /// the head of the queue until [`advance`](Self::advance) retires it.
    pub fn wait_cqe(&mut self) -> Result<Cqe<'_>> {
        let mut cqe: *mut sys::io_uring_cqe = std::ptr::null_mut();

        let ret = unsafe { sys::io_uring_wait_cqe(self.ring, &mut cqe) };
        check_ret(ret)?;

        if cqe.is_null() {
            Err(Error::InvariantViolated(
                "io_uring_wait_cqe returned no entry".into(),
            ))
        } else {
            Ok(Cqe {
                cqe,
                _phantom: PhantomData,
            })
        }
    }

    /// Peek at a completion queue entry without blocking
    ///
    /// Returns `None` if no CQEs are available.
    pub fn peek_cqe(&mut self) -> Option<Cqe<'_>> {
        let mut cqe: *mut sys::io_uring_cqe = std::ptr::null_mut();

        let ret = unsafe { sys::io_uring_peek_cqe(self.ring, &mut cqe) };

        if ret < 0 || cqe.is_null() {
            None
        } else {
            Some(Cqe {
                cqe,
                _phantom: PhantomData,
            })
        }
    }

    /// Mark the `nr` oldest CQEs as seen so the kernel can reuse them
    pub fn advance(&mut self, nr: u32) {
        unsafe { sys::io_uring_cq_advance(self.ring, nr) }
    }
}

/// A single completion queue entry, borrowed from the ring
pub struct Cqe<'ring> {
    cqe: *mut sys::io_uring_cqe,
    _phantom: PhantomData<&'ring mut sys::io_uring_cqe>,
}

impl<'ring> Cqe<'ring> {
    /// Get the user data that was set on the SQE
    pub fn user_data(&self) -> u64 {
        unsafe { (*self.cqe).user_data }
    }

    /// Get the result code for this operation
    ///
    /// Negative values indicate errors (errno values).
    pub fn result(&self) -> i32 {
        unsafe { (*self.cqe).res }
    }
}
