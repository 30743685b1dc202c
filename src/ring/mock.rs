//! Scripted in-memory ring for scheduler tests
//!
//! Requests are executed against in-memory "files" keyed by descriptor when
//! they are submitted, and their completions become visible in submission
//! order (or reversed per batch). A fault hook can shorten or fail any
//! request before it runs.

use super::{Completion, Ring};
use crate::error::{Error, Result};
use crate::ops::{Direction, Request};
use std::collections::{HashMap, VecDeque};
use std::io;
use std::os::unix::io::RawFd;

/// What the fault hook wants to happen to a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Fault {
    /// Transfer at most this many bytes
    Short(u32),
    /// Complete with `-errno` and transfer nothing
    Errno(i32),
}

type FaultHook = Box<dyn FnMut(&Request) -> Option<Fault>>;

pub(crate) struct MockRing {
    slots: usize,
    queued: Vec<Request>,
    ready: VecDeque<Completion>,
    files: HashMap<RawFd, Vec<u8>>,
    fault: Option<FaultHook>,
    reverse_batches: bool,
    fail_submit_call: Option<usize>,
    unacked: bool,
    /// Every request handed to the kernel, in order
    pub submitted: Vec<Request>,
    pub submit_calls: usize,
    pub acks: usize,
    pub max_in_flight: usize,
    in_flight: usize,
}

impl MockRing {
    pub fn new(slots: usize) -> Self {
        Self {
            slots,
            queued: Vec::new(),
            ready: VecDeque::new(),
            files: HashMap::new(),
            fault: None,
            reverse_batches: false,
            fail_submit_call: None,
            unacked: false,
            submitted: Vec::new(),
            submit_calls: 0,
            acks: 0,
            max_in_flight: 0,
            in_flight: 0,
        }
    }

    pub fn with_file(mut self, fd: RawFd, contents: Vec<u8>) -> Self {
        self.files.insert(fd, contents);
        self
    }

    pub fn with_fault(mut self, hook: impl FnMut(&Request) -> Option<Fault> + 'static) -> Self {
        self.fault = Some(Box::new(hook));
        self
    }

    /// Deliver each submitted batch's completions last-to-first
    pub fn reversed(mut self) -> Self {
        self.reverse_batches = true;
        self
    }

    /// Make the `n`th submit call (0-based) fail with `EBUSY`
    pub fn failing_submit(mut self, n: usize) -> Self {
        self.fail_submit_call = Some(n);
        self
    }

    /// Submitted requests whose completions have not been reaped
    pub fn pending(&self) -> usize {
        self.in_flight
    }

    pub fn has_unacked(&self) -> bool {
        self.unacked
    }

    pub fn file(&self, fd: RawFd) -> &[u8] {
        self.files.get(&fd).map(Vec::as_slice).unwrap_or(&[])
    }

    fn execute(&mut self, req: &Request) -> i32 {
        let fault = self.fault.as_mut().and_then(|hook| hook(req));
        let len = match fault {
            Some(Fault::Errno(errno)) => return -errno,
            Some(Fault::Short(n)) => n.min(req.len),
            None => req.len,
        } as usize;
        let offset = req.offset as usize;

        match req.direction {
            Direction::Read => {
                let src = self.files.get(&req.fd).map(Vec::as_slice).unwrap_or(&[]);
                let n = len.min(src.len().saturating_sub(offset));
                if n > 0 {
                    let dst = unsafe { std::slice::from_raw_parts_mut(req.buf, n) };
                    dst.copy_from_slice(&src[offset..offset + n]);
                }
                n as i32
            }
            Direction::Write => {
                let file = self.files.entry(req.fd).or_default();
                if file.len() < offset + len {
                    file.resize(offset + len, 0);
                }
                let src = unsafe { std::slice::from_raw_parts(req.buf as *const u8, len) };
                file[offset..offset + len].copy_from_slice(src);
                len as i32
            }
        }
    }

    fn reap(&mut self) -> Option<Completion> {
        assert!(!self.unacked, "completion reaped before the previous one was acknowledged");
        let completion = self.ready.pop_front()?;
        self.unacked = true;
        self.in_flight -= 1;
        Some(completion)
    }
}

impl Ring for MockRing {
    unsafe fn push(&mut self, request: &Request) -> bool {
        if self.queued.len() >= self.slots {
            return false;
        }
        self.queued.push(*request);
        true
    }

    fn submit(&mut self) -> Result<usize> {
        let call = self.submit_calls;
        self.submit_calls += 1;
        if self.fail_submit_call == Some(call) {
            return Err(Error::Submit(io::Error::from_raw_os_error(libc::EBUSY)));
        }

        let batch = std::mem::take(&mut self.queued);
        let mut done = Vec::with_capacity(batch.len());
        for req in &batch {
            let result = self.execute(req);
            done.push(Completion {
                result,
                user_data: req.user_data,
            });
        }
        if self.reverse_batches {
            done.reverse();
        }

        self.in_flight += batch.len();
        self.max_in_flight = self.max_in_flight.max(self.in_flight);
        self.submitted.extend_from_slice(&batch);
        self.ready.extend(done);
        Ok(batch.len())
    }

    fn wait_completion(&mut self) -> Result<Completion> {
        // A real ring would block forever here
        self.reap().ok_or_else(|| {
            Error::InvariantViolated("wait with nothing in flight".into())
        })
    }

    fn peek_completion(&mut self) -> Option<Completion> {
        self.reap()
    }

    fn acknowledge(&mut self, _completion: Completion) {
        assert!(self.unacked, "acknowledge without a reaped completion");
        self.unacked = false;
        self.acks += 1;
    }
}
