//! Memory allocator - bump allocation into arenas, everything else forwarded
//!
//! Design: Three-layer architecture:
//! 1. Bump allocation into an arena's newest page (fast path)
//! 2. Page growth when the newest page is exhausted (slow path, amortised by slack)
//! 3. The host's original allocator for anything no arena owns
//!
//! [`Allocator::allocf`] is the single realloc-shaped entry point the host
//! calls for every allocation, resize and free.

mod bump;
mod fallback;
mod header;
mod page;


pub use bump::BumpAllocator;
pub use fallback::{FallbackAllocator, SystemAllocator};
pub use header::{tagged_size, Tag, BLOCK_ALIGN, TAG_SIZE};
pub use page::Page;

use core::fmt;
use core::ptr::{self, NonNull};

use crate::arena::{Arena, ArenaId, Registry};
use crate::config::Config;
use crate::error::ArenaError;
use crate::logging::{error, trace};

/// Allocation context carried by every call into the adaptor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Context {
    /// The host's own opaque context
    Host(usize),
    /// An arena registered with the adaptor
    Arena(ArenaId),
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(data) => write!(f, "host({:#x})", data),
            Self::Arena(id) => write!(f, "{}", id),
        }
    }
}

/// Allocator adaptor: arena registry plus the remembered fallback
pub struct Allocator {
    registry: Registry,
    fallback: Box<dyn FallbackAllocator>,
    /// Slack added to every page grown on demand
    slack: usize,
}

impl Allocator {
    pub fn new(config: &Config, fallback: Box<dyn FallbackAllocator>) -> Self {
        Self {
            registry: Registry::new(config.registry.max_arenas),
            fallback,
            slack: config.pages.slack_bytes(),
        }
    }

    /// Create an arena with `object_count` preallocated slots and
    /// `storage_bytes` of raw storage, and register it.
    pub fn create_arena(
        &mut self,
        object_count: usize,
        storage_bytes: usize,
    ) -> Result<ArenaId, ArenaError> {
        if self.registry.len() >= self.registry.capacity() {
            return Err(ArenaError::RegistryFull {
                capacity: self.registry.capacity(),
            });
        }
        let arena = Arena::new(object_count, storage_bytes, self.slack)?;
        self.registry.insert(arena)
    }

    #[inline]
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    #[inline]
    pub fn registry_mut(&mut self) -> &mut Registry {
        &mut self.registry
    }

    /// Bump-allocate `size` bytes in the arena `id`
    pub fn alloc_with_arena(&mut self, id: ArenaId, size: usize) -> Result<NonNull<u8>, ArenaError> {
        self.registry
            .get_mut(id)
            .ok_or(ArenaError::UnknownArena { arena: id })?
            .alloc(size)
    }

    /// malloc/realloc/free in one call.
    ///
    /// - `size == 0` frees. Arena blocks are never reclaimed individually, so
    ///   this is a no-op for them; foreign pointers are really freed.
    /// - A null `ptr` allocates in the context's arena, or via the fallback
    ///   when the context is not a live arena.
    /// - Otherwise the owning arena is found (hint first, then every arena)
    ///   and the block is resized in place or copied. Pointers no arena owns
    ///   are forwarded to the fallback untouched.
    ///
    /// Returns null when an arena allocation fails.
    ///
    /// # Safety
    /// `ptr` must be null, a live block returned by this adaptor, or a live
    /// pointer owned by the fallback allocator.
    pub unsafe fn allocf(&mut self, ptr: *mut u8, size: usize, context: Context) -> *mut u8 {
        let hint = self.registry.arena_of(context);

        let Some(old) = NonNull::new(ptr) else {
            return match hint {
                Some(_) if size == 0 => ptr::null_mut(),
                Some(id) => self.alloc_or_null(id, size),
                None => self.fallback.realloc(ptr, size),
            };
        };

        let owner = hint
            .and_then(|id| self.registry.locate(id, old).map(|page| (id, page)))
            .or_else(|| self.registry.owner_of(old));

        let Some((id, page)) = owner else {
            trace!(target: "allocator", ptr = ?old, size, "forwarding foreign pointer");
            return self.fallback.realloc(ptr, size);
        };

        if size == 0 {
            trace!(target: "allocator", ptr = ?old, arena = %id, "ignoring free of arena block");
            return ptr::null_mut();
        }

        let Some(arena) = self.registry.get_mut(id) else {
            return ptr::null_mut();
        };
        match arena.realloc(page, old, size) {
            Ok(new) => new.as_ptr(),
            Err(err) => {
                error!(target: "allocator", arena = %id, size, error = %err, "arena reallocation failed");
                ptr::null_mut()
            }
        }
    }

    fn alloc_or_null(&mut self, id: ArenaId, size: usize) -> *mut u8 {
        match self.alloc_with_arena(id, size) {
            Ok(ptr) => ptr.as_ptr(),
            Err(err) => {
                error!(target: "allocator", arena = %id, size, error = %err, "arena allocation failed");
                ptr::null_mut()
            }
        }
    }
}

impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Allocator")
            .field("arenas", &self.registry.len())
            .field("slack", &self.slack)
            .finish_non_exhaustive()
    }
}
