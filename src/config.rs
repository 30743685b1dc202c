//! Copy configuration

use crate::error::{Error, Result};
use crate::flags::SetupFlags;

/// Default number of operations kept in flight
pub const DEFAULT_QUEUE_DEPTH: u32 = 32;

/// Default transfer size of one operation
pub const DEFAULT_BLOCK_SIZE: u32 = 16 * 1024;

/// Default cap on consecutive `EAGAIN` completions for one operation
pub const DEFAULT_MAX_TRANSIENT_RETRIES: u32 = 64;

/// Kernel limit on submission queue entries
pub const MAX_QUEUE_DEPTH: u32 = 32768;

/// Tunables for a copy session
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyConfig {
    /// Reads plus writes allowed in flight at once; also the ring size
    pub queue_depth: u32,
    /// Bytes per operation; the last block may be shorter
    pub block_size: u32,
    /// `EAGAIN` completions tolerated in a row for one operation
    pub max_transient_retries: u32,
    /// Flags for ring setup
    pub setup_flags: SetupFlags,
}

impl Default for CopyConfig {
    fn default() -> Self {
        Self {
            queue_depth: DEFAULT_QUEUE_DEPTH,
            block_size: DEFAULT_BLOCK_SIZE,
            max_transient_retries: DEFAULT_MAX_TRANSIENT_RETRIES,
            setup_flags: SetupFlags::empty(),
        }
    }
}

impl CopyConfig {
    pub fn with_queue_depth(mut self, queue_depth: u32) -> Self {
        self.queue_depth = queue_depth;
        self
    }

    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    pub fn with_max_transient_retries(mut self, retries: u32) -> Self {
        self.max_transient_retries = retries;
        self
    }

    pub fn with_setup_flags(mut self, flags: SetupFlags) -> Self {
        self.setup_flags = flags;
        self
    }

    /// Reject values the scheduler cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.queue_depth == 0 || self.queue_depth > MAX_QUEUE_DEPTH {
            return Err(Error::InvalidConfig(format!(
                "queue depth must be between 1 and {}, got {}",
                MAX_QUEUE_DEPTH, self.queue_depth
            )));
        }
        // A completion result is an i32
        if self.block_size == 0 || self.block_size > i32::MAX as u32 {
            return Err(Error::InvalidConfig(format!(
                "block size must be between 1 and {}, got {}",
                i32::MAX,
                self.block_size
            )));
        }
        Ok(())
    }
}

/// Parse a size such as `16K`, `1M` or `4096` into bytes
pub fn parse_size(size: &str) -> std::result::Result<u32, String> {
    let size = size.trim().to_uppercase();
    if size.is_empty() {
        return Err("Empty size string".to_string());
    }

    let digits_end = size
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(size.len());
    let (num_str, suffix) = size.split_at(digits_end);

    let multiplier: u64 = match suffix.trim() {
        "" | "B" => 1,
        "K" | "KB" | "KIB" => 1024,
        "M" | "MB" | "MIB" => 1024 * 1024,
        "G" | "GB" | "GIB" => 1024 * 1024 * 1024,
        other => return Err(format!("Unknown size suffix: {}", other)),
    };

    let num: u64 = num_str
        .parse()
        .map_err(|_| format!("Invalid number: {}", num_str))?;

    num.checked_mul(multiplier)
        .and_then(|bytes| u32::try_from(bytes).ok())
        .ok_or_else(|| format!("Size too large: {}", size))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = CopyConfig::default();
        assert_eq!(config.queue_depth, 32);
        assert_eq!(config.block_size, 16 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert!(CopyConfig::default().with_queue_depth(0).validate().is_err());
        assert!(CopyConfig::default().with_block_size(0).validate().is_err());
        assert!(CopyConfig::default()
            .with_queue_depth(MAX_QUEUE_DEPTH + 1)
            .validate()
            .is_err());
    }

    #[test]
    fn test_parse_size() {
        assert_eq!(parse_size("4096").unwrap(), 4096);
        assert_eq!(parse_size("16K").unwrap(), 16 * 1024);
        assert_eq!(parse_size("16kb").unwrap(), 16 * 1024);
        assert_eq!(parse_size("1M").unwrap(), 1024 * 1024);
        assert_eq!(parse_size("1G").unwrap(), 1024 * 1024 * 1024);
        assert!(parse_size("").is_err());
        assert!(parse_size("12Q").is_err());
        assert!(parse_size("8G").is_err());
    }
}
