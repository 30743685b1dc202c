//! Low-level FFI bindings to liburing
//!
//! Raw, unsafe declarations. Everything above this module goes through
//! [`IoUring`](crate::IoUring) and the queue wrappers.

#![allow(non_upper_case_globals)]
#![allow(non_camel_case_types)]
#![allow(non_snake_case)]
#![allow(dead_code)]
#![allow(missing_docs)]
#![allow(clippy::missing_safety_doc)]

use std::os::raw::{c_int, c_uint, c_void};

include!(concat!(env!("OUT_DIR"), "/bindings.rs"));

// Static inline in liburing.h, so bindgen skips them; liburing-ffi exports
// them as real symbols.
extern "C" {
    pub fn io_uring_get_sqe(ring: *mut io_uring) -> *mut io_uring_sqe;
    pub fn io_uring_sqe_set_data64(sqe: *mut io_uring_sqe, data: u64);

    pub fn io_uring_peek_cqe(ring: *mut io_uring, cqe_ptr: *mut *mut io_uring_cqe) -> c_int;
    pub fn io_uring_wait_cqe(ring: *mut io_uring, cqe_ptr: *mut *mut io_uring_cqe) -> c_int;
    pub fn io_uring_cq_advance(ring: *mut io_uring, nr: c_uint);

    pub fn io_uring_prep_read(
        sqe: *mut io_uring_sqe,
        fd: c_int,
        buf: *mut c_void,
        nbytes: c_uint,
        offset: u64,
    );
    pub fn io_uring_prep_write(
        sqe: *mut io_uring_sqe,
        fd: c_int,
        buf: *const c_void,
        nbytes: c_uint,
        offset: u64,
    );
}
