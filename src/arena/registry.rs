//! Arena registry - generation-checked table of live arenas
//!
//! Arenas are addressed by [`ArenaId`] (slot index + generation). Releasing an
//! arena bumps its slot's generation, so ids held past release stop resolving
//! instead of aliasing whatever reuses the slot.

use core::fmt;
use core::ptr::NonNull;

use super::Arena;
use crate::allocator::Context;
use crate::error::ArenaError;

/// Handle to a registered arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArenaId {
    index: u32,
    generation: u32,
}

impl ArenaId {
    pub const fn new(index: u32, generation: u32) -> Self {
        Self { index, generation }
    }

    #[inline]
    pub fn index(&self) -> u32 {
        self.index
    }

    #[inline]
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for ArenaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "arena#{}.{}", self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    arena: Option<Arena>,
}

/// Growable arena table with a ceiling on live arenas
pub struct Registry {
    slots: Vec<Slot>,
    vacant: Vec<u32>,
    live: usize,
    capacity: usize,
}

impl Registry {
    /// Default ceiling on simultaneously live arenas
    pub const DEFAULT_CAPACITY: usize = 64;

    pub fn new(capacity: usize) -> Self {
        Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            live: 0,
            capacity,
        }
    }

    /// Register `arena` in the next free slot
    pub fn insert(&mut self, arena: Arena) -> Result<ArenaId, ArenaError> {
        if self.live >= self.capacity {
            return Err(ArenaError::RegistryFull {
                capacity: self.capacity,
            });
        }

        let index = match self.vacant.pop() {
            Some(index) => index,
            None => {
                let index = u32::try_from(self.slots.len()).map_err(|_| ArenaError::RegistryFull {
                    capacity: self.capacity,
                })?;
                self.slots.push(Slot {
                    generation: 0,
                    arena: None,
                });
                index
            }
        };

        let slot = &mut self.slots[index as usize];
        slot.arena = Some(arena);
        self.live += 1;
        Ok(ArenaId::new(index, slot.generation))
    }

    /// Remove the arena, invalidating `id` and every copy of it
    pub fn remove(&mut self, id: ArenaId) -> Option<Arena> {
        let slot = self.slot_mut(id)?;
        let arena = slot.arena.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.vacant.push(id.index);
        self.live -= 1;
        Some(arena)
    }

    pub fn get(&self, id: ArenaId) -> Option<&Arena> {
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
            .and_then(|slot| slot.arena.as_ref())
    }

    pub fn get_mut(&mut self, id: ArenaId) -> Option<&mut Arena> {
        self.slot_mut(id).and_then(|slot| slot.arena.as_mut())
    }

    fn slot_mut(&mut self, id: ArenaId) -> Option<&mut Slot> {
        self.slots
            .get_mut(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }

    /// Whether `context` names a live arena
    #[inline]
    pub fn is_arena(&self, context: Context) -> bool {
        self.arena_of(context).is_some()
    }

    /// The live arena named by `context`, if any
    pub fn arena_of(&self, context: Context) -> Option<ArenaId> {
        match context {
            Context::Arena(id) if self.get(id).is_some() => Some(id),
            _ => None,
        }
    }

    /// Page index within arena `id` holding `ptr`
    pub fn locate(&self, id: ArenaId, ptr: NonNull<u8>) -> Option<usize> {
        self.get(id)?.page_of(ptr)
    }

    /// Scan every live arena for the one owning `ptr`
    pub fn owner_of(&self, ptr: NonNull<u8>) -> Option<(ArenaId, usize)> {
        self.iter()
            .find_map(|(id, arena)| arena.page_of(ptr).map(|page| (id, page)))
    }

    /// Live arenas in slot order
    pub fn iter(&self) -> impl Iterator<Item = (ArenaId, &Arena)> {
        self.slots.iter().enumerate().filter_map(|(index, slot)| {
            slot.arena
                .as_ref()
                .map(|arena| (ArenaId::new(index as u32, slot.generation), arena))
        })
    }

    /// Live arena count
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Ceiling on live arenas
    #[inline]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new(Self::DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn arena() -> Arena {
        Arena::new(0, 32, 0).expect("arena")
    }

    #[test]
    fn insert_assigns_sequential_slots() {
        let mut registry = Registry::default();
        let a = registry.insert(arena()).unwrap();
        let b = registry.insert(arena()).unwrap();
        assert_eq!(a, ArenaId::new(0, 0));
        assert_eq!(b, ArenaId::new(1, 0));
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn capacity_is_enforced() {
        let mut registry = Registry::new(1);
        registry.insert(arena()).unwrap();
        assert_eq!(
            registry.insert(arena()).unwrap_err(),
            ArenaError::RegistryFull { capacity: 1 }
        );
    }

    #[test]
    fn removed_ids_go_stale() {
        let mut registry = Registry::default();
        let a = registry.insert(arena()).unwrap();
        assert!(registry.remove(a).is_some());
        assert!(registry.get(a).is_none());
        assert!(!registry.is_arena(Context::Arena(a)));

        let b = registry.insert(arena()).unwrap();
        assert_eq!(b.index(), a.index());
        assert_ne!(b.generation(), a.generation());
        assert!(registry.get(a).is_none());
        assert!(registry.get(b).is_some());
    }

    #[test]
    fn host_context_is_not_an_arena() {
        let mut registry = Registry::default();
        registry.insert(arena()).unwrap();
        assert!(!registry.is_arena(Context::Host(0)));
        assert!(!registry.is_arena(Context::Arena(ArenaId::new(7, 0))));
    }

    #[test]
    fn owner_scan_finds_the_right_arena() {
        let mut registry = Registry::default();
        let a = registry.insert(arena()).unwrap();
        let b = registry.insert(arena()).unwrap();

        let ptr = registry.get_mut(b).unwrap().alloc(8).unwrap();
        assert_eq!(registry.owner_of(ptr), Some((b, 0)));
        assert_eq!(registry.locate(a, ptr), None);
    }
}
