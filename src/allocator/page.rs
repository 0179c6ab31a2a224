//! Pages - contiguous extents acquired from the system allocator
//!
//! Design: One allocation per page, 8-byte aligned, bumped front to back.
//! A page remembers the most recent pointer it handed out so that pointer
//! alone may be resized in place.

use core::ptr::NonNull;
use std::alloc::{alloc, dealloc, Layout};

use super::bump::align_up;
use super::header::{Tag, BLOCK_ALIGN};
use crate::error::ArenaError;

/// One contiguous storage extent with a bump cursor
pub struct Page {
    start: NonNull<u8>,
    layout: Layout,
    capacity: usize,
    /// Offset of the next free byte
    cursor: usize,
    /// Most recent pointer handed out from this page. Compared by address
    /// only, never dereferenced through this field.
    last: Option<NonNull<u8>>,
}

impl Page {
    /// Acquire a page of `capacity` usable bytes from the system allocator
    pub fn new(capacity: usize) -> Result<Self, ArenaError> {
        let oom = ArenaError::OutOfMemory { requested: capacity };
        // Zero-sized layouts are not allowed; keep at least one block.
        let layout = Layout::from_size_align(capacity.max(BLOCK_ALIGN), BLOCK_ALIGN)
            .map_err(|_| oom.clone())?;

        let start = NonNull::new(unsafe { alloc(layout) }).ok_or(oom)?;

        Ok(Self {
            start,
            layout,
            capacity,
            cursor: 0,
            last: None,
        })
    }

    /// First usable byte
    #[inline]
    pub fn base(&self) -> NonNull<u8> {
        self.start
    }

    /// Address of the first usable byte
    #[inline]
    pub fn start(&self) -> usize {
        self.start.as_ptr() as usize
    }

    /// Address one past the last usable byte
    #[inline]
    pub fn end(&self) -> usize {
        self.start() + self.capacity
    }

    /// Address of the bump cursor
    #[inline]
    pub fn cursor(&self) -> usize {
        self.start() + self.cursor
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes between `start` and the cursor
    #[inline]
    pub fn used(&self) -> usize {
        self.cursor
    }

    /// Bytes between the cursor and `end`
    #[inline]
    pub fn available(&self) -> usize {
        self.capacity - self.cursor
    }

    #[inline]
    pub fn last(&self) -> Option<NonNull<u8>> {
        self.last
    }

    /// Whether `addr` falls within `[start, end)`
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.start() && addr < self.end()
    }

    /// Whether `addr` could be a pointer handed out from this page. The end
    /// address is included: a zero-size block in the last 8 bytes points there.
    #[inline]
    pub fn holds(&self, addr: usize) -> bool {
        addr >= self.start() && addr <= self.end()
    }

    /// Tag of a pointer handed out from this page
    #[inline]
    pub fn tag_of(&self, ptr: NonNull<u8>) -> Option<Tag> {
        Tag::locate(ptr, self.start(), self.end())
    }

    /// Carve a tagged block of `footprint` bytes recording `size`.
    ///
    /// The caller guarantees `footprint <= self.available()`.
    pub(crate) fn bump(&mut self, size: usize, footprint: usize) -> NonNull<u8> {
        debug_assert!(footprint <= self.available(), "page overrun");
        debug_assert!(footprint % BLOCK_ALIGN == 0, "unaligned footprint");

        // cursor + TAG_SIZE is within the page: footprint >= TAG_SIZE.
        let ptr = unsafe {
            let cursor = NonNull::new_unchecked(self.start.as_ptr().add(self.cursor));
            Tag::write_at(cursor, size)
        };
        self.cursor += footprint;
        self.last = Some(ptr);
        ptr
    }

    /// Grow or shrink `ptr` in place if it is the most recent block on this
    /// page and the new extent still fits. Returns whether it was resized.
    pub(crate) fn resize_last(&mut self, ptr: NonNull<u8>, size: usize) -> bool {
        if self.last != Some(ptr) {
            return false;
        }

        let offset = ptr.as_ptr() as usize - self.start();
        let end = match offset.checked_add(size) {
            Some(end) if end <= self.capacity => end,
            _ => return false,
        };
        // An unaligned page end caps the cursor; the page is then full.
        let new_cursor = align_up(end, BLOCK_ALIGN).min(self.capacity);

        let Some(tag) = self.tag_of(ptr) else {
            return false;
        };
        // `ptr` is this page's last block, so its tag is live.
        unsafe { tag.set_size(size) };
        self.cursor = new_cursor;
        true
    }

    /// Move the cursor back to `offset` and forget the last block
    pub(crate) fn rewind(&mut self, offset: usize) {
        debug_assert!(offset <= self.capacity, "rewind past end of page");
        self.cursor = offset;
        self.last = None;
    }
}

impl Drop for Page {
    fn drop(&mut self) {
        unsafe {
            dealloc(self.start.as_ptr(), self.layout);
        }
    }
}

impl core::fmt::Debug for Page {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Page")
            .field("start", &format_args!("{:#x}", self.start()))
            .field("end", &format_args!("{:#x}", self.end()))
            .field("used", &self.cursor)
            .field("last", &self.last)
            .finish()
    }
}
