//! Main IoUring struct and setup operations

use crate::error::{check_ret, Error, Result};
use crate::flags::SetupFlags;
use crate::queue::{CompletionQueue, SubmissionQueue};
use crate::sys;
use std::mem::MaybeUninit;
use std::os::unix::io::{AsRawFd, RawFd};

/// The main io_uring instance
///
/// This provides a safe wrapper around the `io_uring` C struct.
/// The ring is automatically cleaned up when dropped.
///
/// # Example
///
/// ```no_run
/// use uringcp::IoUring;
///
/// let ring = IoUring::new(32)?;
/// # Ok::<(), uringcp::Error>(())
/// ```
pub struct IoUring {
    ring: sys::io_uring,
    entries: u32,
}

impl IoUring {
    /// Create a new io_uring instance with the specified number of entries
    ///
    /// The number of entries will be rounded up to the nearest power of 2.
    ///
    /// # Errors
    ///
    /// Returns an error if the kernel doesn't support io_uring or if setup fails.
    pub fn new(entries: u32) -> Result<Self> {
        Self::with_flags(entries, SetupFlags::empty())
    }

    /// Create a new io_uring instance with specific setup flags
    pub fn with_flags(entries: u32, flags: SetupFlags) -> Result<Self> {
        let mut ring = MaybeUninit::<sys::io_uring>::uninit();

        let ret = unsafe { sys::io_uring_queue_init(entries, ring.as_mut_ptr(), flags.bits()) };

        check_ret(ret).map_err(Error::Setup)?;
        tracing::debug!(entries, flags = ?flags, "io_uring ready");

        Ok(Self {
            ring: unsafe { ring.assume_init() },
            entries,
        })
    }

    /// Number of entries the ring was asked for
    pub fn entries(&self) -> u32 {
        self.entries
    }

    /// Submit all queued submission queue entries
    ///
    /// Returns the number of submitted entries.
    pub fn submit(&mut self) -> Result<usize> {
        self.submission().submit()
    }

    /// Get a reference to the submission queue
    pub fn submission(&mut self) -> SubmissionQueue<'_> {
        SubmissionQueue::new(&mut self.ring)
    }

    /// Get a reference to the completion queue
    pub fn completion(&mut self) -> CompletionQueue<'_> {
        CompletionQueue::new(&mut self.ring)
    }
}

impl AsRawFd for IoUring {
    fn as_raw_fd(&self) -> RawFd {
        self.ring.ring_fd
    }
}

impl Drop for IoUring {
    fn drop(&mut self) {
        unsafe {
            sys::io_uring_queue_exit(&mut self.ring);
        }
    }
}

// io_uring is safe to send between threads once created
unsafe impl Send for IoUring {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_ring() {
        let ring = IoUring::new(8);
        assert!(ring.is_ok(), "Failed to create io_uring");
    }

    #[test]
    fn test_create_with_clamp() {
        let ring = IoUring::with_flags(8, SetupFlags::CLAMP).unwrap();
        assert_eq!(ring.entries(), 8);
        assert!(ring.as_raw_fd() >= 0);
    }
}
