//! Pipelined file copy on top of liburing
//!
//! `uringcp` copies one file descriptor into another by keeping a fixed
//! number of reads and writes in flight on an io_uring instead of issuing
//! one blocking call at a time. A finished read becomes the write of the same
//! range in place, reusing its buffer.
//!
//! The crate is layered:
//!
//! - [`IoUring`], [`SubmissionQueue`] and [`CompletionQueue`] wrap the
//!   system liburing;
//! - [`Ring`] is the small interface the scheduler needs from them;
//! - [`Tracker`] owns the in-flight [`Operation`]s and their buffers;
//! - [`CopySession`] drives a whole copy; [`copy_fd`] and [`copy_path`] set
//!   one up for you.
//!
//! # Example
//!
//! ```no_run
//! use std::fs::File;
//! use uringcp::{copy_fd, CopyConfig};
//!
//! let src = File::open("/var/log/syslog")?;
//! let dst = File::create("/tmp/syslog.copy")?;
//! let report = copy_fd(&src, &dst, &CopyConfig::default().with_queue_depth(64))?;
//! assert_eq!(report.bytes, src.metadata()?.len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod sys;

pub mod config;
pub mod copy;
pub mod error;
pub mod flags;
pub mod ops;
pub mod queue;
pub mod ring;
pub mod size;
pub mod tracker;
mod uring;

pub use config::{parse_size, CopyConfig};
pub use copy::{copy_fd, copy_path, CopyReport, CopySession, Progress};
pub use error::{Error, Result};
pub use flags::SetupFlags;
pub use ops::{Direction, Request};
pub use queue::{CompletionQueue, Cqe, SubmissionQueue};
pub use ring::{Completion, Ring};
pub use size::file_size;
pub use tracker::{Endpoints, Operation, Token, Tracker};
pub use uring::IoUring;
