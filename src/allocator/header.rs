//! Allocation tags - size headers prefixed before every arena pointer
//!
//! Design: Every pointer handed out by an arena is preceded by an 8-byte tag
//! holding the size the caller originally requested (not the padded footprint).
//! The tag is what lets realloc recover how many bytes to preserve without an
//! external size map.
//!
//! Layout of one tagged block:
//! ```text
//! cursor ──► [ tag: u64 ][ data: size bytes ][ pad to 8 ]
//!                        ▲
//!                        └── returned pointer
//! ```

use core::ptr::NonNull;

/// Size of the tag preceding every arena allocation
pub const TAG_SIZE: usize = core::mem::size_of::<u64>();

/// Alignment of every tagged block (and therefore every returned pointer)
pub const BLOCK_ALIGN: usize = 8;

/// Footprint of a request once tagged and padded: `size + 8`, rounded up to 8.
///
/// Returns `None` if the computation overflows.
#[inline]
pub const fn tagged_size(size: usize) -> Option<usize> {
    match size.checked_add(TAG_SIZE + BLOCK_ALIGN - 1) {
        Some(n) => Some(n & !(BLOCK_ALIGN - 1)),
        None => None,
    }
}

/// Handle to the tag word in front of an arena pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Tag {
    word: NonNull<u64>,
}

impl Tag {
    /// Write a fresh tag at `cursor` and return the data pointer following it.
    ///
    /// # Safety
    /// `cursor` must be 8-aligned with at least `TAG_SIZE` writable bytes.
    #[inline]
    pub unsafe fn write_at(cursor: NonNull<u8>, size: usize) -> NonNull<u8> {
        let word = cursor.as_ptr() as *mut u64;
        word.write(size as u64);
        NonNull::new_unchecked(cursor.as_ptr().add(TAG_SIZE))
    }

    /// Locate the tag of `ptr`, provided the tag lies within `[start, end)`.
    #[inline]
    pub fn locate(ptr: NonNull<u8>, start: usize, end: usize) -> Option<Self> {
        let addr = ptr.as_ptr() as usize;
        let tag_addr = addr.checked_sub(TAG_SIZE)?;
        if tag_addr < start || addr > end || tag_addr % BLOCK_ALIGN != 0 {
            return None;
        }

        // Bounds checked above: the tag word sits inside the same page.
        let word = unsafe { ptr.as_ptr().sub(TAG_SIZE) } as *mut u64;
        NonNull::new(word).map(|word| Self { word })
    }

    /// Recorded request size
    ///
    /// # Safety
    /// The tag must belong to a live block written by [`Tag::write_at`].
    #[inline]
    pub unsafe fn size(&self) -> usize {
        self.word.as_ptr().read() as usize
    }

    /// Overwrite the recorded request size
    ///
    /// # Safety
    /// Same as [`Tag::size`].
    #[inline]
    pub unsafe fn set_size(&self, size: usize) {
        self.word.as_ptr().write(size as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn footprint_rounds_to_eight() {
        assert_eq!(tagged_size(0), Some(8));
        assert_eq!(tagged_size(1), Some(16));
        assert_eq!(tagged_size(2), Some(16));
        assert_eq!(tagged_size(8), Some(16));
        assert_eq!(tagged_size(9), Some(24));
        assert_eq!(tagged_size(16), Some(24));
        assert_eq!(tagged_size(usize::MAX), None);
    }

    #[test]
    fn write_then_locate() {
        let mut buffer = [0u64; 4];
        let base = NonNull::new(buffer.as_mut_ptr() as *mut u8).unwrap();
        let start = base.as_ptr() as usize;

        let data = unsafe { Tag::write_at(base, 13) };
        assert_eq!(data.as_ptr() as usize, start + TAG_SIZE);

        let tag = Tag::locate(data, start, start + 32).expect("tag in bounds");
        assert_eq!(unsafe { tag.size() }, 13);

        unsafe { tag.set_size(5) };
        assert_eq!(buffer[0], 5);
    }

    #[test]
    fn locate_rejects_tag_before_start() {
        let mut buffer = [0u64; 2];
        let base = NonNull::new(buffer.as_mut_ptr() as *mut u8).unwrap();
        let start = base.as_ptr() as usize;

        assert!(Tag::locate(base, start, start + 16).is_none());
    }
}
