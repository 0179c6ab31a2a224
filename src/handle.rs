//! Checked arena pointers
//!
//! Raw pointers into an arena dangle silently once the arena is reset. An
//! [`ArenaPtr`] remembers the arena's reset epoch at the time it was taken,
//! so resolving it after a reset (or after the arena is released) fails
//! instead of handing back a pointer into recycled storage.

use core::ptr::NonNull;

use crate::arena::{Arena, ArenaId};
use crate::error::ArenaError;

/// Arena pointer tagged with the epoch it was obtained in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaPtr {
    arena: ArenaId,
    epoch: u32,
    ptr: NonNull<u8>,
}

impl ArenaPtr {
    /// Tag `ptr`, which must belong to `arena`
    pub(crate) fn new(id: ArenaId, arena: &Arena, ptr: NonNull<u8>) -> Result<Self, ArenaError> {
        if arena.page_of(ptr).is_none() {
            return Err(ArenaError::ForeignPointer {
                arena: id,
                addr: ptr.as_ptr() as usize,
            });
        }
        Ok(Self {
            arena: id,
            epoch: arena.epoch(),
            ptr,
        })
    }

    /// The pointer, provided `arena` has not been reset since it was tagged
    pub(crate) fn check(&self, arena: &Arena) -> Result<NonNull<u8>, ArenaError> {
        if arena.epoch() != self.epoch {
            return Err(ArenaError::StaleHandle {
                tracked_epoch: self.epoch,
                current_epoch: arena.epoch(),
            });
        }
        Ok(self.ptr)
    }

    #[inline]
    pub fn arena(&self) -> ArenaId {
        self.arena
    }

    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_after_reset() {
        let id = ArenaId::new(0, 0);
        let mut arena = Arena::new(0, 32, 0).unwrap();
        let ptr = arena.alloc(8).unwrap();

        let handle = ArenaPtr::new(id, &arena, ptr).unwrap();
        assert_eq!(handle.check(&arena), Ok(ptr));

        arena.reset();
        assert_eq!(
            handle.check(&arena),
            Err(ArenaError::StaleHandle { tracked_epoch: 0, current_epoch: 1 })
        );
    }

    #[test]
    fn rejects_foreign_pointer() {
        let arena = Arena::new(0, 32, 0).unwrap();
        let mut local = 0u8;
        let err = ArenaPtr::new(ArenaId::new(0, 0), &arena, NonNull::from(&mut local)).unwrap_err();
        assert!(matches!(err, ArenaError::ForeignPointer { .. }));
    }
}
