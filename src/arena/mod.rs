//! Arenas - page chains paired with their own collector state
//!
//! Design: An arena is created from one combined allocation holding its
//! preallocated object slots followed by raw storage. Slots feed the
//! collector while the arena is active; storage feeds the bump allocator.
//!
//! ```text
//! initial page: [ slot 0 | slot 1 | ... | slot n-1 | storage ........ ]
//!                                                  ▲
//!                                                  └── cursor after create/reset
//! ```
//!
//! Reset drops every page grown since, rethreads the slots and rewinds the
//! cursor, so replaying the same allocation sequence yields the same
//! addresses. Pointers obtained before a reset must not be used afterwards;
//! [`crate::handle::ArenaPtr`] turns that into a checkable error.

mod registry;
mod stats;

pub use registry::{ArenaId, Registry};
pub use stats::ArenaStats;

use core::ptr::NonNull;

use crate::allocator::{BumpAllocator, Page};
use crate::error::ArenaError;
use crate::gc::{thread_freelist, GcState, SLOT_SIZE};

/// A long-lived allocation region
pub struct Arena {
    gc: GcState,
    bump: BumpAllocator,
    initial_objects: usize,
    /// Bumped on every reset
    epoch: u32,
}

impl Arena {
    /// Allocate an arena with `object_count` slots and `storage_bytes` of raw
    /// storage in its initial page. Pages grown later carry `slack` extra bytes.
    pub fn new(object_count: usize, storage_bytes: usize, slack: usize) -> Result<Self, ArenaError> {
        let slot_bytes = Self::slot_bytes(object_count)?;
        let capacity = slot_bytes
            .checked_add(storage_bytes)
            .ok_or(ArenaError::OutOfMemory {
                requested: storage_bytes,
            })?;

        let mut page = Page::new(capacity)?;
        // The page holds at least `slot_bytes`, aligned for slots.
        let free_list = unsafe { thread_freelist(page.base().cast(), object_count, None) };
        page.rewind(slot_bytes);

        Ok(Self {
            gc: GcState::for_arena(free_list),
            bump: BumpAllocator::new(page, slack),
            initial_objects: object_count,
            epoch: 0,
        })
    }

    fn slot_bytes(object_count: usize) -> Result<usize, ArenaError> {
        object_count
            .checked_mul(SLOT_SIZE)
            .ok_or(ArenaError::OutOfMemory {
                requested: object_count,
            })
    }

    /// Bump-allocate a tagged block of `size` bytes
    #[inline]
    pub fn alloc(&mut self, size: usize) -> Result<NonNull<u8>, ArenaError> {
        self.bump.alloc(size)
    }

    /// Resize a block living on page `page`
    ///
    /// # Safety
    /// `ptr` must be a live block of this arena and `page` the page holding it
    /// (as returned by [`Arena::page_of`]).
    #[inline]
    pub unsafe fn realloc(
        &mut self,
        page: usize,
        ptr: NonNull<u8>,
        size: usize,
    ) -> Result<NonNull<u8>, ArenaError> {
        self.bump.realloc(page, ptr, size)
    }

    /// Page index holding `ptr`, if this arena owns it
    #[inline]
    pub fn page_of(&self, ptr: NonNull<u8>) -> Option<usize> {
        self.bump.page_of(ptr.as_ptr() as usize)
    }

    /// Drop grown pages, rethread the object slots and rewind the initial page
    pub fn reset(&mut self) {
        // `slot_bytes` was validated when the arena was created.
        let slot_bytes = self.initial_objects * SLOT_SIZE;
        self.bump.truncate(slot_bytes);

        let base = self.bump.initial().base().cast();
        let free_list = unsafe { thread_freelist(base, self.initial_objects, None) };
        self.gc.reset(free_list);
        self.epoch = self.epoch.wrapping_add(1);
    }

    /// Utilisation figures, reading object counts from `gc`
    ///
    /// `gc` is the arena's own state, or the host's live state while the
    /// arena is active.
    pub fn stats_with(&self, gc: &GcState) -> ArenaStats {
        ArenaStats::collect(&self.bump, gc)
    }

    /// Utilisation figures from the arena's stored collector state
    pub fn stats(&self) -> ArenaStats {
        self.stats_with(&self.gc)
    }

    #[inline]
    pub fn gc(&self) -> &GcState {
        &self.gc
    }

    #[inline]
    pub fn gc_mut(&mut self) -> &mut GcState {
        &mut self.gc
    }

    #[inline]
    pub fn bump(&self) -> &BumpAllocator {
        &self.bump
    }

    /// Bytes left on the page currently receiving allocations
    #[inline]
    pub fn available(&self) -> usize {
        self.bump.current().available()
    }

    #[inline]
    pub fn initial_objects(&self) -> usize {
        self.initial_objects
    }

    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }
}

impl core::fmt::Debug for Arena {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Arena")
            .field("pages", &self.bump.page_count())
            .field("initial_objects", &self.initial_objects)
            .field("epoch", &self.epoch)
            .finish()
    }
}
