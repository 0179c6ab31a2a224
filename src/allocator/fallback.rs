//! Fallback allocation - the host's original allocator
//!
//! Every request the arenas do not own (no arena context, or a pointer no
//! arena recognises) is forwarded here verbatim.

use core::ffi::c_void;

/// realloc-shaped allocator the adaptor delegates foreign traffic to
///
/// The contract mirrors C `realloc`: a null `ptr` allocates, a zero `size`
/// frees and returns null, anything else resizes.
pub trait FallbackAllocator {
    /// # Safety
    /// `ptr` must be null or a live pointer obtained from this allocator.
    unsafe fn realloc(&mut self, ptr: *mut u8, size: usize) -> *mut u8;
}

/// C heap (`malloc`/`realloc`/`free`)
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemAllocator;

impl FallbackAllocator for SystemAllocator {
    unsafe fn realloc(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
        if size == 0 {
            libc::free(ptr as *mut c_void);
            core::ptr::null_mut()
        } else {
            libc::realloc(ptr as *mut c_void, size) as *mut u8
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_allocator_round_trip() {
        let mut system = SystemAllocator;
        unsafe {
            let ptr = system.realloc(core::ptr::null_mut(), 8);
            assert!(!ptr.is_null());
            ptr.copy_from_nonoverlapping(b"Hello\0".as_ptr(), 6);

            let grown = system.realloc(ptr, 64);
            assert!(!grown.is_null());
            assert_eq!(core::slice::from_raw_parts(grown, 6), b"Hello\0");

            assert!(system.realloc(grown, 0).is_null());
        }
    }
}
