//! Source size discovery

use crate::error::{Error, Result};
use std::io;
use std::mem::MaybeUninit;
use std::os::unix::io::RawFd;

/// `_IOR(0x12, 114, size_t)` from `<linux/fs.h>`
#[cfg(target_pointer_width = "64")]
const BLKGETSIZE64: u64 = 0x8008_1272;
#[cfg(target_pointer_width = "32")]
const BLKGETSIZE64: u64 = 0x8004_1272;

/// Total byte length behind `fd`
///
/// Regular files report `st_size`, block devices their capacity. Anything
/// else (pipes, sockets, directories, character devices) has no size a copy
/// could be planned around.
pub fn file_size(fd: RawFd) -> Result<u64> {
    let mut st = MaybeUninit::<libc::stat>::uninit();
    if unsafe { libc::fstat(fd, st.as_mut_ptr()) } < 0 {
        return Err(io::Error::last_os_error().into());
    }
    let st = unsafe { st.assume_init() };

    match st.st_mode & libc::S_IFMT {
        libc::S_IFREG => Ok(st.st_size as u64),
        libc::S_IFBLK => {
            let mut bytes: u64 = 0;
            if unsafe { libc::ioctl(fd, BLKGETSIZE64 as _, &mut bytes as *mut u64) } != 0 {
                return Err(io::Error::last_os_error().into());
            }
            Ok(bytes)
        }
        mode => Err(Error::SizeUnavailable(format!(
            "descriptor {} is not a regular file or block device (mode {:o})",
            fd, mode
        ))),
    }
}
