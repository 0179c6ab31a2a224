//! Arena utilisation figures

use serde::Serialize;

use crate::allocator::BumpAllocator;
use crate::gc::{GcState, SLOT_SIZE};

/// Utilisation of one arena.
///
/// Storage figures exclude the bytes taken by object slots, so they describe
/// raw storage only. `free_storage` can stay high when the tail of a page is
/// too small for the next request and is skipped.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ArenaStats {
    /// Pages in the chain; more than one means the initial reservation overflowed
    pub pages: usize,
    /// Object slots in existence (live + free)
    pub total_objects: usize,
    /// Slots handed out since creation or the last reset
    pub live_objects: usize,
    /// Slots still on the freelist
    pub free_objects: usize,
    pub total_storage: usize,
    pub used_storage: usize,
    pub free_storage: usize,
}

impl ArenaStats {
    pub(crate) fn collect(bump: &BumpAllocator, gc: &GcState) -> Self {
        let mut stats = Self {
            live_objects: gc.live(),
            free_objects: gc.free_objects(),
            ..Self::default()
        };
        stats.total_objects = stats.live_objects + stats.free_objects;

        for page in bump.pages() {
            stats.pages += 1;
            stats.total_storage += page.capacity();
            stats.used_storage += page.used();
            stats.free_storage += page.available();
        }

        let slot_bytes = stats.total_objects.saturating_mul(SLOT_SIZE);
        stats.total_storage = stats.total_storage.saturating_sub(slot_bytes);
        stats.used_storage = stats.used_storage.saturating_sub(slot_bytes);
        stats
    }
}
