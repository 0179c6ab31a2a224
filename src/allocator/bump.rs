//! Page-chain bump allocation - O(1) fast path
//!
//! Design: Only the newest page receives new blocks. When it runs out, a
//! fresh page sized to the request plus a fixed slack is pushed and becomes
//! the new head; whatever was left on the previous page stays unused (except
//! for in-place growth of that page's last block).

use core::ptr::NonNull;

use super::header::tagged_size;
use super::page::Page;
use crate::error::ArenaError;
use crate::logging::{debug, trace};

/// Bump allocator over a chain of pages owned by one arena
pub struct BumpAllocator {
    /// Oldest first; the last entry is the page currently being filled.
    pages: Vec<Page>,
    /// Lowest page start seen so far
    beg: usize,
    /// Highest page end seen so far
    end: usize,
    /// Extra bytes added to every page created on demand
    slack: usize,
}

impl BumpAllocator {
    /// Chain starting from an already prepared initial page
    pub fn new(initial: Page, slack: usize) -> Self {
        let (beg, end) = (initial.start(), initial.end());
        Self {
            pages: vec![initial],
            beg,
            end,
            slack,
        }
    }

    /// Fast path: bump a tagged block of `size` bytes, growing the chain if
    /// the current page lacks room.
    #[inline]
    pub fn alloc(&mut self, size: usize) -> Result<NonNull<u8>, ArenaError> {
        let footprint = tagged_size(size).ok_or(ArenaError::OutOfMemory { requested: size })?;

        if footprint > self.current().available() {
            self.add_page(footprint)?;
        }

        let ptr = self.current_mut().bump(size, footprint);
        trace!(target: "allocator", size, footprint, ptr = ?ptr, "bump allocation");
        Ok(ptr)
    }

    /// Slow path: push a page with room for `footprint` plus slack
    fn add_page(&mut self, footprint: usize) -> Result<(), ArenaError> {
        let capacity = footprint
            .checked_add(self.slack)
            .ok_or(ArenaError::OutOfMemory { requested: footprint })?;
        let page = Page::new(capacity)?;

        self.beg = self.beg.min(page.start());
        self.end = self.end.max(page.end());

        debug!(
            target: "allocator",
            capacity,
            pages = self.pages.len() + 1,
            "added arena page"
        );
        self.pages.push(page);
        Ok(())
    }

    /// Resize `ptr`, which lives on page `index`.
    ///
    /// The trailing block of a page is resized in place when the new extent
    /// fits; anything else is copied into a fresh block and the old bytes are
    /// abandoned until reset.
    ///
    /// # Safety
    /// `ptr` must be a live block previously returned from this chain and
    /// `index` must be the page that contains it.
    pub unsafe fn realloc(
        &mut self,
        index: usize,
        ptr: NonNull<u8>,
        size: usize,
    ) -> Result<NonNull<u8>, ArenaError> {
        if self.pages[index].resize_last(ptr, size) {
            trace!(target: "allocator", size, ptr = ?ptr, "resized in place");
            return Ok(ptr);
        }

        // A zero-size block at a page end may abut the next page's start.
        let tag = self.pages[index]
            .tag_of(ptr)
            .or_else(|| self.pages.iter().find_map(|page| page.tag_of(ptr)));
        debug_assert!(tag.is_some(), "arena block {:?} has no tag on page {}", ptr, index);
        let recorded = tag.map(|tag| tag.size()).unwrap_or(0);
        let dest = self.alloc(size)?;
        core::ptr::copy_nonoverlapping(ptr.as_ptr(), dest.as_ptr(), size.min(recorded));

        trace!(target: "allocator", size, recorded, from = ?ptr, to = ?dest, "reallocated by copy");
        Ok(dest)
    }

    /// Index of the page containing `addr`, searching newest first
    pub fn page_of(&self, addr: usize) -> Option<usize> {
        if !self.contains(addr) {
            return None;
        }
        self.pages.iter().rposition(|page| page.holds(addr))
    }

    /// Whether `addr` falls within the chain's overall `[beg, end]` bounds
    #[inline]
    pub fn contains(&self, addr: usize) -> bool {
        addr >= self.beg && addr <= self.end
    }

    /// Drop every page but the oldest and rewind it to `offset`
    pub fn truncate(&mut self, offset: usize) {
        self.pages.truncate(1);
        let initial = &mut self.pages[0];
        initial.rewind(offset);
        self.beg = initial.start();
        self.end = initial.end();
    }

    /// Page currently receiving allocations
    #[inline]
    pub fn current(&self) -> &Page {
        // The chain always holds its initial page.
        &self.pages[self.pages.len() - 1]
    }

    #[inline]
    fn current_mut(&mut self) -> &mut Page {
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    /// The oldest (initial) page
    #[inline]
    pub fn initial(&self) -> &Page {
        &self.pages[0]
    }

    /// Page by chain index (0 is the oldest)
    #[inline]
    pub fn page(&self, index: usize) -> &Page {
        &self.pages[index]
    }

    /// Pages newest first
    pub fn pages(&self) -> impl Iterator<Item = &Page> {
        self.pages.iter().rev()
    }

    #[inline]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Overall `[beg, end)` bounds
    #[inline]
    pub fn bounds(&self) -> (usize, usize) {
        (self.beg, self.end)
    }
}

/// Align address upward to next multiple of alignment
///
/// Uses bit manipulation for branch-free execution:
/// - Add (align - 1) to round up
/// - Mask with !(align - 1) to align down
#[inline(always)]
pub(crate) const fn align_up(addr: usize, align: usize) -> usize {
    (addr.wrapping_add(align).wrapping_sub(1)) & !align.wrapping_sub(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_align_up() {
        assert_eq!(align_up(0, 8), 0);
        assert_eq!(align_up(1, 8), 8);
        assert_eq!(align_up(8, 8), 8);
        assert_eq!(align_up(9, 8), 16);
    }

    #[test]
    fn chain_grows_when_page_is_full() {
        let mut bump = BumpAllocator::new(Page::new(32).unwrap(), 64);
        bump.alloc(16).unwrap();
        assert_eq!(bump.current().available(), 8);

        let ptr = bump.alloc(16).unwrap();
        assert_eq!(bump.page_count(), 2);
        assert_eq!(bump.current().capacity(), 24 + 64);
        assert_eq!(bump.page_of(ptr.as_ptr() as usize), Some(1));
    }

    #[test]
    fn realloc_finds_tag_on_another_page() {
        let mut bump = BumpAllocator::new(Page::new(8).unwrap(), 0);
        // Zero-size block pointing at the end of the first page.
        let empty = bump.alloc(0).unwrap();
        assert_eq!(empty.as_ptr() as usize, bump.initial().end());
        bump.alloc(8).unwrap();
        assert_eq!(bump.page_count(), 2);

        // Resolved against the newer page: the tag lookup has to fall back.
        let moved = unsafe { bump.realloc(1, empty, 4) }.unwrap();
        assert_ne!(moved, empty);
        assert_eq!(bump.page_of(moved.as_ptr() as usize), Some(2));
        assert_eq!(unsafe { bump.current().tag_of(moved).unwrap().size() }, 4);
    }

    #[test]
    fn bounds_enclose_every_page() {
        let mut bump = BumpAllocator::new(Page::new(16).unwrap(), 0);
        for _ in 0..4 {
            bump.alloc(32).unwrap();
        }
        let (beg, end) = bump.bounds();
        for page in bump.pages() {
            assert!(beg <= page.start());
            assert!(page.end() <= end);
        }
    }

    #[test]
    fn truncate_restores_initial_extent() {
        let initial = Page::new(16).unwrap();
        let extent = (initial.start(), initial.end());
        let mut bump = BumpAllocator::new(initial, 0);
        bump.alloc(8).unwrap();
        bump.alloc(64).unwrap();

        bump.truncate(0);
        assert_eq!(bump.page_count(), 1);
        assert_eq!(bump.bounds(), extent);
        assert_eq!(bump.current().available(), 16);
    }

    #[test]
    fn foreign_address_has_no_page() {
        let bump = BumpAllocator::new(Page::new(16).unwrap(), 0);
        let local = 0u64;
        assert_eq!(bump.page_of(&local as *const u64 as usize), None);
    }
}
