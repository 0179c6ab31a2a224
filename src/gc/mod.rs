//! Collector state - the slice of the host collector that arenas swap
//!
//! Design: The host's collector keeps its object slots on a freelist and
//! counts live objects. An arena carries its own copy of that state; while a
//! scope is active the arena's state *is* the host's state, so every object
//! the host creates is carved out of the arena.
//!
//! Arena states are created disabled and coloured red so host tracing skips
//! them; only a bulk reset reclaims their slots.

mod freelist;

pub use freelist::{ObjectSlot, SlotTag, HEAP_PAGE_SLOTS, SLOT_SIZE};
pub(crate) use freelist::thread as thread_freelist;

use core::ptr::NonNull;

/// Mark colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Color {
    White,
    /// Skipped during host traversal
    Red,
}

/// Collector state swapped between the host and arenas
#[derive(Debug)]
pub struct GcState {
    free_list: Option<NonNull<ObjectSlot>>,
    live: usize,
    /// Heap pages grown on demand, in allocation order
    heaps: Vec<NonNull<u8>>,
    disabled: bool,
    color: Color,
}

impl GcState {
    /// Fresh host collector state with an empty freelist
    pub fn host() -> Self {
        Self {
            free_list: None,
            live: 0,
            heaps: Vec::new(),
            disabled: false,
            color: Color::White,
        }
    }

    /// Collector state for an arena whose preallocated slots start at `free_list`
    pub(crate) fn for_arena(free_list: Option<NonNull<ObjectSlot>>) -> Self {
        Self {
            free_list,
            live: 0,
            heaps: Vec::new(),
            disabled: true,
            color: Color::Red,
        }
    }

    /// Objects handed out since creation (or the last reset)
    #[inline]
    pub fn live(&self) -> usize {
        self.live
    }

    /// Slots still on the freelist
    pub fn free_objects(&self) -> usize {
        // Every link was written by `thread_freelist` over owned memory.
        unsafe { freelist::count(self.free_list) }
    }

    #[inline]
    pub fn free_list(&self) -> Option<NonNull<ObjectSlot>> {
        self.free_list
    }

    #[inline]
    pub fn is_disabled(&self) -> bool {
        self.disabled
    }

    #[inline]
    pub fn color(&self) -> Color {
        self.color
    }

    /// Heap pages this state grew on demand
    #[inline]
    pub fn heaps(&self) -> &[NonNull<u8>] {
        &self.heaps
    }

    /// Take the first free slot and mark it live
    pub(crate) fn pop_slot(&mut self) -> Option<NonNull<ObjectSlot>> {
        let slot = self.free_list?;
        unsafe {
            let slot_ref = &mut *slot.as_ptr();
            self.free_list = slot_ref.next.take();
            slot_ref.tag = SlotTag::Live;
        }
        self.live += 1;
        Some(slot)
    }

    /// Thread a freshly allocated heap page of `slots` slots onto the freelist
    ///
    /// # Safety
    /// `memory` must hold `slots * SLOT_SIZE` writable, 8-aligned bytes that
    /// stay valid for as long as this state is in use.
    pub(crate) unsafe fn add_heap(&mut self, memory: NonNull<u8>, slots: usize) {
        self.free_list = thread_freelist(memory.cast(), slots, self.free_list);
        self.heaps.push(memory);
    }

    /// Start over from `free_list` with nothing live and no extra heaps
    pub(crate) fn reset(&mut self, free_list: Option<NonNull<ObjectSlot>>) {
        self.free_list = free_list;
        self.live = 0;
        self.heaps.clear();
    }

    /// Hand over the grown heap pages, e.g. for release at teardown
    pub(crate) fn take_heaps(&mut self) -> Vec<NonNull<u8>> {
        std::mem::take(&mut self.heaps)
    }
}

impl Default for GcState {
    fn default() -> Self {
        Self::host()
    }
}
