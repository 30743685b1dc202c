//! Pipelined copy scheduler
//!
//! A [`CopySession`] keeps up to `queue_depth` operations in flight. Each
//! pass queues as many block reads as the depth allows, submits them, then
//! drains completions: a finished read is turned into the write of the same
//! range and submitted straight away, a finished write retires its block.
//! Short transfers and `EAGAIN` resubmit the same operation.
//!
//! # Example
//!
//! ```no_run
//! use uringcp::{copy_path, CopyConfig};
//!
//! let report = copy_path("in.bin", "out.bin", &CopyConfig::default())?;
//! println!("{} bytes", report.bytes);
//! # Ok::<(), uringcp::Error>(())
//! ```

use crate::config::CopyConfig;
use crate::error::{from_ret_code, Error, Result};
use crate::ops::Direction;
use crate::ring::{Completion, Ring};
use crate::size::file_size;
use crate::tracker::{Endpoints, Token, Tracker};
use crate::uring::IoUring;
use std::fs::{File, OpenOptions};
use std::os::unix::fs::OpenOptionsExt;
use std::os::unix::io::{AsRawFd, RawFd};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{debug, trace, warn};

/// Counters describing where a session stands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Progress {
    pub bytes_remaining_to_read: u64,
    pub bytes_remaining_to_write: u64,
    pub in_flight_reads: usize,
    pub in_flight_writes: usize,
}

impl Progress {
    pub fn in_flight(&self) -> usize {
        self.in_flight_reads + self.in_flight_writes
    }

    /// `true` when every byte has been written and nothing is outstanding
    pub fn is_finished(&self) -> bool {
        *self == Progress::default()
    }
}

/// Summary of a successful copy
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CopyReport {
    /// Bytes copied
    pub bytes: u64,
    /// Blocks the copy was split into
    pub blocks: u64,
    /// Calls to submit
    pub submit_calls: u64,
    /// Completions that moved fewer bytes than requested
    pub short_completions: u64,
    /// `EAGAIN` completions that were resubmitted
    pub transient_retries: u64,
    pub elapsed: Duration,
}

/// One source-to-destination copy driven over a [`Ring`]
pub struct CopySession<R: Ring> {
    // Declared first so an owned ring is torn down before the buffers the
    // kernel may still reference are freed.
    ring: R,
    tracker: Tracker,
    endpoints: Endpoints,
    queue_depth: usize,
    block_size: u32,
    max_transient_retries: u32,
    size: u64,
    next_read_offset: u64,
    progress: Progress,
    /// Pushed but not yet accepted by a successful submit
    unsubmitted: usize,
    /// Accepted by the ring and not yet reaped
    outstanding: usize,
    report: CopyReport,
}

impl<R: Ring> CopySession<R> {
    /// Plan a copy of the first `size` bytes of `source` into `dest`
    ///
    /// Fails with [`Error::InvalidConfig`] when `config` does not validate.
    pub fn new(
        ring: R,
        source: RawFd,
        dest: RawFd,
        size: u64,
        config: &CopyConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            ring,
            tracker: Tracker::new(),
            endpoints: Endpoints { source, dest },
            queue_depth: config.queue_depth as usize,
            block_size: config.block_size,
            max_transient_retries: config.max_transient_retries,
            size,
            next_read_offset: 0,
            progress: Progress {
                bytes_remaining_to_read: size,
                bytes_remaining_to_write: size,
                ..Progress::default()
            },
            unsubmitted: 0,
            outstanding: 0,
            report: CopyReport::default(),
        })
    }

    pub fn progress(&self) -> Progress {
        self.progress
    }

    /// Drive the copy until every byte is written or a fatal error occurs
    ///
    /// On error, completions for requests the ring already accepted are
    /// reaped before returning, so no buffer is freed while the kernel may
    /// still use it.
    pub fn run(&mut self) -> Result<CopyReport> {
        match self.pump() {
            Ok(report) => Ok(report),
            Err(e) => {
                self.settle();
                Err(e)
            }
        }
    }

    fn pump(&mut self) -> Result<CopyReport> {
        let started = Instant::now();
        debug!(
            size = self.size,
            queue_depth = self.queue_depth,
            block_size = self.block_size,
            "copy started"
        );

        while self.progress.bytes_remaining_to_write > 0 {
            if self.fill()? > 0 {
                self.submit()?;
            } else if self.progress.in_flight() == 0 {
                return Err(Error::InvariantViolated(format!(
                    "no read could be queued and nothing is in flight, {:?}",
                    self.progress
                )));
            }
            self.drain()?;
        }

        self.check_finished()?;
        self.report.bytes = self.size;
        self.report.elapsed = started.elapsed();
        debug!(report = ?self.report, "copy finished");
        Ok(self.report.clone())
    }

    /// Queue reads until the depth bound, the end of the source, or a full
    /// submission queue; returns how many were queued
    fn fill(&mut self) -> Result<usize> {
        let mut queued = 0;
        while self.progress.bytes_remaining_to_read > 0
            && self.progress.in_flight() < self.queue_depth
        {
            let chunk = self
                .progress
                .bytes_remaining_to_read
                .min(u64::from(self.block_size)) as u32;
            let token = self.tracker.create_read(self.next_read_offset, chunk);
            if !self.push(token)? {
                // Saturated ring: wait for completions instead
                self.tracker.discard(token)?;
                break;
            }

            self.next_read_offset += u64::from(chunk);
            self.progress.bytes_remaining_to_read -= u64::from(chunk);
            self.progress.in_flight_reads += 1;
            self.report.blocks += 1;
            queued += 1;
        }

        if queued > 0 {
            trace!(queued, next_offset = self.next_read_offset, "reads queued");
        }
        Ok(queued)
    }

    /// Handle completions: block for the first, then take whatever else is
    /// ready, blocking again only while no new read could be queued
    fn drain(&mut self) -> Result<()> {
        if self.progress.in_flight() == 0 {
            return Ok(());
        }

        let completion = self.ring.wait_completion()?;
        self.complete(completion)?;

        loop {
            while let Some(completion) = self.ring.peek_completion() {
                self.complete(completion)?;
            }

            let p = self.progress;
            if p.bytes_remaining_to_write == 0 || p.in_flight() == 0 {
                return Ok(());
            }
            if p.bytes_remaining_to_read > 0 && p.in_flight() < self.queue_depth {
                return Ok(());
            }

            let completion = self.ring.wait_completion()?;
            self.complete(completion)?;
        }
    }

    fn complete(&mut self, completion: Completion) -> Result<()> {
        self.outstanding -= 1;
        let outcome = self.handle(&completion);
        self.ring.acknowledge(completion);
        outcome
    }

    fn handle(&mut self, completion: &Completion) -> Result<()> {
        let token = completion.user_data;
        let op = self.tracker.get(token)?;
        let direction = op.direction();
        let offset = op.cursor_offset();
        let requested = op.cursor_len();
        trace!(token, %direction, offset, requested, result = completion.result, "completion");

        if completion.result < 0 {
            if completion.result != -libc::EAGAIN {
                return Err(Error::Completion {
                    direction,
                    offset,
                    source: from_ret_code(completion.result),
                });
            }

            let attempts = self.tracker.note_transient_retry(token)?;
            if attempts > self.max_transient_retries {
                return Err(Error::RetriesExhausted {
                    direction,
                    offset,
                    attempts: attempts - 1,
                });
            }
            warn!(%direction, offset, attempts, "EAGAIN, resubmitting");
            self.report.transient_retries += 1;
            return self.resubmit(token);
        }

        let transferred = completion.result as u32;
        if transferred > requested {
            return Err(Error::InvariantViolated(format!(
                "{} at offset {} moved {} bytes, {} requested",
                direction, offset, transferred, requested
            )));
        }

        if transferred < requested {
            if transferred == 0 {
                return Err(match direction {
                    Direction::Read => Error::UnexpectedEof { offset },
                    Direction::Write => Error::WriteZero { offset },
                });
            }
            trace!(%direction, offset, transferred, requested, "short completion");
            self.tracker.advance(token, transferred)?;
            self.report.short_completions += 1;
            return self.resubmit(token);
        }

        self.tracker.advance(token, transferred)?;
        match direction {
            Direction::Read => {
                self.tracker.promote_to_write(token)?;
                self.resubmit(token)?;
                self.progress.in_flight_reads -= 1;
                self.progress.in_flight_writes += 1;
            }
            Direction::Write => {
                let op = self.tracker.destroy(token)?;
                self.progress.in_flight_writes -= 1;
                self.progress.bytes_remaining_to_write -= u64::from(op.origin_len());
            }
        }
        Ok(())
    }

    fn push(&mut self, token: Token) -> Result<bool> {
        let request = self.tracker.request(token, &self.endpoints)?;
        // SAFETY: the buffer lives in the tracker until this operation's
        // write completes. On the error path `settle` reaps every accepted
        // request, and leaks the tracker if any may still reach the kernel.
        let pushed = unsafe { self.ring.push(&request) };
        if pushed {
            self.unsubmitted += 1;
        }
        Ok(pushed)
    }

    /// Requeue an operation that already holds a slot's worth of budget and
    /// submit it immediately
    fn resubmit(&mut self, token: Token) -> Result<()> {
        if !self.push(token)? {
            return Err(Error::SubmissionQueueFull);
        }
        self.submit()
    }

    fn submit(&mut self) -> Result<()> {
        let accepted = self.ring.submit()?.min(self.unsubmitted);
        self.unsubmitted -= accepted;
        self.outstanding += accepted;
        self.report.submit_calls += 1;
        Ok(())
    }

    /// Wait out every request the ring accepted, discarding the results
    fn settle(&mut self) {
        while self.outstanding > 0 {
            match self.ring.wait_completion() {
                Ok(completion) => {
                    self.outstanding -= 1;
                    self.ring.acknowledge(completion);
                }
                Err(e) => {
                    warn!(
                        error = %e,
                        outstanding = self.outstanding,
                        "giving up on in-flight requests"
                    );
                    break;
                }
            }
        }

        if self.outstanding > 0 || self.unsubmitted > 0 {
            // The ring may still touch these buffers; never free them
            warn!(
                outstanding = self.outstanding,
                unsubmitted = self.unsubmitted,
                operations = self.tracker.len(),
                "leaking operation buffers still referenced by the ring"
            );
            std::mem::forget(std::mem::take(&mut self.tracker));
        }
    }

    fn check_finished(&self) -> Result<()> {
        if !self.progress.is_finished() || !self.tracker.is_empty() {
            return Err(Error::InvariantViolated(format!(
                "copy ended with {:?} and {} tracked operations",
                self.progress,
                self.tracker.len()
            )));
        }
        Ok(())
    }
}

/// Copy everything `source` holds right now into `dest`
///
/// Both descriptors must stay open for the duration of the call. `dest` is
/// written at the same offsets as `source`; its other contents are untouched.
pub fn copy_fd<S: AsRawFd, D: AsRawFd>(
    source: &S,
    dest: &D,
    config: &CopyConfig,
) -> Result<CopyReport> {
    config.validate()?;
    let size = file_size(source.as_raw_fd())?;
    let ring = IoUring::with_flags(config.queue_depth, config.setup_flags)?;

    let mut session = CopySession::new(
        ring,
        source.as_raw_fd(),
        dest.as_raw_fd(),
        size,
        config,
    )?;
    session.run()
}

/// Copy the file at `source` to `dest`, creating or truncating `dest`
pub fn copy_path<P: AsRef<Path>, Q: AsRef<Path>>(
    source: P,
    dest: Q,
    config: &CopyConfig,
) -> Result<CopyReport> {
    // Before the destination is truncated
    config.validate()?;
    let source = File::open(source.as_ref())?;
    let dest = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o644)
        .open(dest.as_ref())?;
    copy_fd(&source, &dest, config)
}
