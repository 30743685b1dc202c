//! The ring interface consumed by the copy scheduler
//!
//! [`CopySession`](crate::CopySession) only needs a handful of primitives:
//! queue a request on a free slot, submit, wait for or peek at a completion,
//! and retire it. [`IoUring`] provides them on top of liburing; tests drive
//! the scheduler through a scripted in-memory ring instead.

use crate::error::Result;
use crate::ops::Request;
use crate::uring::IoUring;

#[cfg(test)]
pub(crate) mod mock;

/// A reaped completion, copied out of the completion queue
///
/// Hand it back through [`Ring::acknowledge`] once handled.
#[derive(Debug, PartialEq, Eq)]
pub struct Completion {
    /// Bytes transferred, or a negative errno
    pub result: i32,
    /// Token of the operation this completion belongs to
    pub user_data: u64,
}

/// Submission/completion primitives the copy scheduler runs on
pub trait Ring {
    /// Attach `request` to a free submission slot
    ///
    /// Returns `false` when no slot is available; the ring is left untouched.
    ///
    /// # Safety
    ///
    /// The buffer described by `request` must stay valid, and must not be
    /// accessed by anyone else, until its completion has been reaped.
    unsafe fn push(&mut self, request: &Request) -> bool;

    /// Hand every queued request to the kernel
    fn submit(&mut self) -> Result<usize>;

    /// Block until at least one completion is available
    fn wait_completion(&mut self) -> Result<Completion>;

    /// Return a completion if one is ready, without blocking
    fn peek_completion(&mut self) -> Option<Completion>;

    /// Retire the completion most recently returned by
    /// [`wait_completion`](Ring::wait_completion) or
    /// [`peek_completion`](Ring::peek_completion)
    fn acknowledge(&mut self, completion: Completion);
}

impl<R: Ring + ?Sized> Ring for &mut R {
    unsafe fn push(&mut self, request: &Request) -> bool {
        (**self).push(request)
    }

    fn submit(&mut self) -> Result<usize> {
        (**self).submit()
    }

    fn wait_completion(&mut self) -> Result<Completion> {
        (**self).wait_completion()
    }

    fn peek_completion(&mut self) -> Option<Completion> {
        (**self).peek_completion()
    }

    fn acknowledge(&mut self, completion: Completion) {
        (**self).acknowledge(completion)
    }
}

impl Ring for IoUring {
    unsafe fn push(&mut self, request: &Request) -> bool {
        self.submission().push(request)
    }

    fn submit(&mut self) -> Result<usize> {
        IoUring::submit(self)
    }

    fn wait_completion(&mut self) -> Result<Completion> {
        let mut cq = self.completion();
        loop {
            match cq.wait_cqe() {
                Ok(cqe) => {
                    return Ok(Completion {
                        result: cqe.result(),
                        user_data: cqe.user_data(),
                    })
                }
                Err(e) if e.raw_os_error() == Some(libc::EINTR) => continue,
                Err(e) => return Err(e),
            }
        }
    }

    fn peek_completion(&mut self) -> Option<Completion> {
        let mut cq = self.completion();
        let cqe = cq.peek_cqe()?;
        Some(Completion {
            result: cqe.result(),
            user_data: cqe.user_data(),
        })
    }

    fn acknowledge(&mut self, _completion: Completion) {
        // The acknowledged entry is always the current head
        self.completion().advance(1);
    }
}
