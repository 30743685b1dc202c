//! In-flight operation bookkeeping
//!
//! Every read the scheduler queues becomes an [`Operation`] stored in the
//! [`Tracker`] and addressed by a [`Token`], which travels through the ring as
//! the submission's `user_data`. The operation's buffer is allocated once and
//! serves both the read and, after promotion, the write of the same range.

use crate::error::{Error, Result};
use crate::ops::{Direction, Request};
use std::os::unix::io::RawFd;

/// Opaque handle for an operation; echoed back by the ring as `user_data`
pub type Token = u64;

/// The two descriptors a copy moves bytes between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoints {
    /// Descriptor reads are issued against
    pub source: RawFd,
    /// Descriptor writes are issued against
    pub dest: RawFd,
}

impl Endpoints {
    /// Descriptor an operation of `direction` targets
    pub fn fd_for(&self, direction: Direction) -> RawFd {
        match direction {
            Direction::Read => self.source,
            Direction::Write => self.dest,
        }
    }
}

/// One block of the copy, first as a read and then as a write
///
/// The cursor always describes the unfinished suffix of the origin range:
/// `cursor_offset + cursor_len == origin_offset + origin_len`.
#[derive(Debug)]
pub struct Operation {
    direction: Direction,
    buffer: Box<[u8]>,
    cursor_offset: u64,
    cursor_len: u32,
    origin_offset: u64,
    origin_len: u32,
    transient_retries: u32,
}

impl Operation {
    /// Allocate a zeroed buffer of `len` bytes for a read rooted at `offset`
    pub fn new_read(offset: u64, len: u32) -> Self {
        Self {
            direction: Direction::Read,
            buffer: vec![0u8; len as usize].into_boxed_slice(),
            cursor_offset: offset,
            cursor_len: len,
            origin_offset: offset,
            origin_len: len,
            transient_retries: 0,
        }
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn cursor_offset(&self) -> u64 {
        self.cursor_offset
    }

    pub fn cursor_len(&self) -> u32 {
        self.cursor_len
    }

    pub fn origin_offset(&self) -> u64 {
        self.origin_offset
    }

    pub fn origin_len(&self) -> u32 {
        self.origin_len
    }

    /// Whole buffer, as filled so far
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// `true` once the current direction has nothing left to transfer
    pub fn is_satisfied(&self) -> bool {
        self.cursor_len == 0
    }

    /// Consecutive `EAGAIN` completions since the last progress
    pub fn transient_retries(&self) -> u32 {
        self.transient_retries
    }

    /// Account a short completion of `n` bytes
    pub fn advance(&mut self, n: u32) -> Result<()> {
        if n > self.cursor_len {
            return Err(Error::InvariantViolated(format!(
                "advance by {} past {} remaining bytes at offset {}",
                n, self.cursor_len, self.cursor_offset
            )));
        }
        self.cursor_offset += u64::from(n);
        self.cursor_len -= n;
        self.transient_retries = 0;
        Ok(())
    }

    /// Turn a finished read into the write of the same range, keeping the buffer
    pub fn promote_to_write(&mut self) -> Result<()> {
        if self.direction != Direction::Read || !self.is_satisfied() {
            return Err(Error::InvariantViolated(format!(
                "promotion of unfinished {} at offset {}",
                self.direction, self.origin_offset
            )));
        }
        self.direction = Direction::Write;
        self.cursor_offset = self.origin_offset;
        self.cursor_len = self.origin_len;
        self.transient_retries = 0;
        Ok(())
    }

    /// Describe the next submission of this operation
    ///
    /// The returned pointer addresses the unfinished tail of the buffer.
    pub fn request(&mut self, token: Token, endpoints: &Endpoints) -> Request {
        let done = (self.origin_len - self.cursor_len) as usize;
        Request {
            direction: self.direction,
            fd: endpoints.fd_for(self.direction),
            buf: self.buffer[done..].as_mut_ptr(),
            len: self.cursor_len,
            offset: self.cursor_offset,
            user_data: token,
        }
    }
}

/// Slab of live operations keyed by [`Token`]
#[derive(Debug, Default)]
pub struct Tracker {
    slots: Vec<Option<Operation>>,
    free: Vec<usize>,
    live: usize,
}

impl Tracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a read of `len` bytes at `offset` and return its token
    pub fn create_read(&mut self, offset: u64, len: u32) -> Token {
        let op = Operation::new_read(offset, len);
        let index = match self.free.pop() {
            Some(index) => {
                self.slots[index] = Some(op);
                index
            }
            None => {
                self.slots.push(Some(op));
                self.slots.len() - 1
            }
        };
        self.live += 1;
        index as Token
    }

    pub fn get(&self, token: Token) -> Result<&Operation> {
        self.slots
            .get(token as usize)
            .and_then(Option::as_ref)
            .ok_or_else(|| unknown(token))
    }

    pub fn get_mut(&mut self, token: Token) -> Result<&mut Operation> {
        self.slots
            .get_mut(token as usize)
            .and_then(Option::as_mut)
            .ok_or_else(|| unknown(token))
    }

    pub fn advance(&mut self, token: Token, n: u32) -> Result<()> {
        self.get_mut(token)?.advance(n)
    }

    pub fn promote_to_write(&mut self, token: Token) -> Result<()> {
        self.get_mut(token)?.promote_to_write()
    }

    /// Count one more `EAGAIN` for `token`, returning the new streak length
    pub fn note_transient_retry(&mut self, token: Token) -> Result<u32> {
        let op = self.get_mut(token)?;
        op.transient_retries += 1;
        Ok(op.transient_retries)
    }

    /// Build the next submission for `token`
    pub fn request(&mut self, token: Token, endpoints: &Endpoints) -> Result<Request> {
        Ok(self.get_mut(token)?.request(token, endpoints))
    }

    /// Retire a fully written operation, freeing its buffer
    pub fn destroy(&mut self, token: Token) -> Result<Operation> {
        let op = self.get(token)?;
        if op.direction() != Direction::Write || !op.is_satisfied() {
            return Err(Error::InvariantViolated(format!(
                "destroy of unfinished {} at offset {}",
                op.direction(),
                op.origin_offset()
            )));
        }
        self.take(token)
    }

    /// Drop an operation that never reached the ring
    pub fn discard(&mut self, token: Token) -> Result<Operation> {
        self.take(token)
    }

    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn take(&mut self, token: Token) -> Result<Operation> {
        let op = self
            .slots
            .get_mut(token as usize)
            .and_then(Option::take)
            .ok_or_else(|| unknown(token))?;
        self.free.push(token as usize);
        self.live -= 1;
        Ok(op)
    }
}

fn unknown(token: Token) -> Error {
    Error::InvariantViolated(format!("completion for unknown operation {}", token))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ENDS: Endpoints = Endpoints { source: 3, dest: 4 };

    #[test]
    fn test_new_read_covers_origin() {
        let op = Operation::new_read(8192, 4096);
        assert_eq!(op.direction(), Direction::Read);
        assert_eq!(op.cursor_offset(), 8192);
        assert_eq!(op.cursor_len(), 4096);
        assert_eq!(op.buffer().len(), 4096);
        assert!(!op.is_satisfied());
    }

    #[test]
    fn test_advance_keeps_suffix_invariant() {
        let mut op = Operation::new_read(100, 50);
        op.advance(20).unwrap();
        assert_eq!(op.cursor_offset(), 120);
        assert_eq!(op.cursor_len(), 30);
        assert_eq!(
            op.cursor_offset() + u64::from(op.cursor_len()),
            op.origin_offset() + u64::from(op.origin_len())
        );

        let req = op.request(9, &ENDS);
        assert_eq!(req.offset, 120);
        assert_eq!(req.len, 30);
        assert_eq!(req.buf as usize, op.buffer().as_ptr() as usize + 20);
    }

    #[test]
    fn test_advance_past_cursor_is_rejected() {
        let mut op = Operation::new_read(0, 10);
        assert!(matches!(op.advance(11), Err(Error::InvariantViolated(_))));
        assert_eq!(op.cursor_len(), 10);
    }

    #[test]
    fn test_promote_reuses_buffer_and_resets_cursor() {
        let mut op = Operation::new_read(4096, 16);
        let before = op.buffer().as_ptr();
        op.advance(6).unwrap();
        op.advance(10).unwrap();
        assert!(op.is_satisfied());

        op.promote_to_write().unwrap();
        assert_eq!(op.direction(), Direction::Write);
        assert_eq!(op.cursor_offset(), 4096);
        assert_eq!(op.cursor_len(), 16);
        assert_eq!(op.buffer().as_ptr(), before);

        let req = op.request(1, &ENDS);
        assert_eq!(req.fd, ENDS.dest);
        assert_eq!(req.buf as *const u8, before);
    }

    #[test]
    fn test_promote_requires_finished_read() {
        let mut op = Operation::new_read(0, 8);
        assert!(op.promote_to_write().is_err());
    }

    #[test]
    fn test_tracker_reuses_tokens() {
        let mut tracker = Tracker::new();
        let a = tracker.create_read(0, 4);
        let b = tracker.create_read(4, 4);
        assert_ne!(a, b);
        assert_eq!(tracker.len(), 2);

        tracker.discard(a).unwrap();
        let c = tracker.create_read(8, 4);
        assert_eq!(c, a);
        assert_eq!(tracker.get(c).unwrap().origin_offset(), 8);
        assert!(tracker.get(99).is_err());
    }

    #[test]
    fn test_destroy_only_finished_write() {
        let mut tracker = Tracker::new();
        let t = tracker.create_read(0, 4);
        assert!(tracker.destroy(t).is_err());

        tracker.advance(t, 4).unwrap();
        tracker.promote_to_write(t).unwrap();
        assert!(tracker.destroy(t).is_err());

        tracker.advance(t, 4).unwrap();
        let op = tracker.destroy(t).unwrap();
        assert_eq!(op.origin_len(), 4);
        assert!(tracker.is_empty());
    }

    #[test]
    fn test_progress_resets_retry_streak() {
        let mut tracker = Tracker::new();
        let t = tracker.create_read(0, 8);
        assert_eq!(tracker.note_transient_retry(t).unwrap(), 1);
        assert_eq!(tracker.note_transient_retry(t).unwrap(), 2);
        tracker.advance(t, 3).unwrap();
        assert_eq!(tracker.get(t).unwrap().transient_retries(), 0);
    }
}
