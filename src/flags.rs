//! Ring setup flags

use crate::sys;
use bitflags::bitflags;

bitflags! {
    /// Flags passed to `io_uring_queue_init`
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct SetupFlags: u32 {
        /// Clamp the entry count to the kernel maximum instead of failing
        const CLAMP = sys::IORING_SETUP_CLAMP;
        /// Let a kernel thread poll the submission queue
        const SQPOLL = sys::IORING_SETUP_SQPOLL;
        /// Only the submitting task touches the ring
        const SINGLE_ISSUER = sys::IORING_SETUP_SINGLE_ISSUER;
        /// Defer task work until the application waits for completions
        const DEFER_TASKRUN = sys::IORING_SETUP_DEFER_TASKRUN;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_distinct() {
        let all = SetupFlags::all();
        assert_eq!(all.bits().count_ones(), 4);
        assert!(SetupFlags::default().is_empty());
    }
}
