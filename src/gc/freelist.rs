//! Object slots and their freelist
//!
//! Slots are threaded front to back: slot `i` links to slot `i + 1` and the
//! last slot links to whatever followed the region (usually nothing).

use core::ptr::NonNull;

/// Slots per heap page grown on demand by the host
pub const HEAP_PAGE_SLOTS: usize = 1024;

/// Size of one object slot
pub const SLOT_SIZE: usize = core::mem::size_of::<ObjectSlot>();

/// Slot occupancy
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotTag {
    Free = 0,
    Live = 1,
}

/// Fixed-size object record (48 bytes)
#[repr(C, align(8))]
#[derive(Debug)]
pub struct ObjectSlot {
    pub tag: SlotTag,
    /// Next free slot while this one is free
    pub next: Option<NonNull<ObjectSlot>>,
    pub payload: [u64; 4],
}

/// Initialise `count` slots starting at `base` as a freelist ending in
/// `tail`. Returns the new head (`tail` when `count` is zero).
///
/// # Safety
/// `base` must point to `count * SLOT_SIZE` writable, 8-aligned bytes.
pub unsafe fn thread(
    base: NonNull<ObjectSlot>,
    count: usize,
    tail: Option<NonNull<ObjectSlot>>,
) -> Option<NonNull<ObjectSlot>> {
    let mut next = tail;
    for index in (0..count).rev() {
        let slot = base.as_ptr().add(index);
        slot.write(ObjectSlot {
            tag: SlotTag::Free,
            next,
            payload: [0; 4],
        });
        next = Some(NonNull::new_unchecked(slot));
    }
    next
}

/// Number of slots reachable from `head`
///
/// # Safety
/// Every link reachable from `head` must point to an initialised slot.
pub unsafe fn count(head: Option<NonNull<ObjectSlot>>) -> usize {
    let mut count = 0;
    let mut cursor = head;
    while let Some(slot) = cursor {
        count += 1;
        cursor = (*slot.as_ptr()).next;
    }
    count
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slot_is_48_bytes() {
        assert_eq!(SLOT_SIZE, 48);
        assert_eq!(core::mem::align_of::<ObjectSlot>(), 8);
    }

    #[test]
    fn thread_links_front_to_back() {
        let mut storage: Vec<core::mem::MaybeUninit<ObjectSlot>> = Vec::with_capacity(3);
        let base = NonNull::new(storage.as_mut_ptr() as *mut ObjectSlot).unwrap();

        unsafe {
            let head = thread(base, 3, None).expect("head");
            assert_eq!(head, base);
            assert_eq!(count(Some(head)), 3);

            let second = (*head.as_ptr()).next.expect("second");
            assert_eq!(second.as_ptr(), base.as_ptr().add(1));
            let third = (*second.as_ptr()).next.expect("third");
            assert!((*third.as_ptr()).next.is_none());
            assert_eq!((*third.as_ptr()).tag, SlotTag::Free);
        }
    }

    #[test]
    fn empty_region_returns_tail() {
        let mut storage: Vec<core::mem::MaybeUninit<ObjectSlot>> = Vec::with_capacity(1);
        let base = NonNull::new(storage.as_mut_ptr() as *mut ObjectSlot).unwrap();
        unsafe {
            assert!(thread(base, 0, None).is_none());
            let tail = thread(base, 1, None);
            let other = NonNull::dangling();
            assert_eq!(thread(other, 0, tail), tail);
        }
    }
}
