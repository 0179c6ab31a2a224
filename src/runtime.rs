//! Runtime - host collector state, allocator adaptor and the arena API
//!
//! Design: The `Runtime` stands in for the embedding interpreter. It owns the
//! host's collector state, the allocation context passed with every
//! allocation, and the adaptor that routes those allocations. All public
//! arena operations (`allocate`, `eval`, `reset`, `stats`, `release`) live
//! here; scope binding itself is in [`crate::scope`].

use core::mem;
use core::ptr::{self, NonNull};

use crate::allocator::{Allocator, Context, FallbackAllocator, SystemAllocator};
use crate::arena::{Arena, ArenaId, ArenaStats};
use crate::config::Config;
use crate::error::ArenaError;
use crate::gc::{GcState, ObjectSlot, HEAP_PAGE_SLOTS, SLOT_SIZE};
use crate::handle::ArenaPtr;
use crate::logging::{self, debug, error, warn};

/// The host interpreter's swappable state
#[derive(Debug)]
pub struct HostState {
    pub(crate) gc: GcState,
    /// Context handed to the allocator with every host allocation
    pub(crate) context: Context,
}

impl HostState {
    pub fn new(data: usize) -> Self {
        Self {
            gc: GcState::host(),
            context: Context::Host(data),
        }
    }

    #[inline]
    pub fn gc(&self) -> &GcState {
        &self.gc
    }

    #[inline]
    pub fn context(&self) -> Context {
        self.context
    }
}

/// Arena runtime bound to one host
#[derive(Debug)]
pub struct Runtime {
    pub(crate) host: HostState,
    pub(crate) allocator: Allocator,
    config: Config,
}

impl Runtime {
    /// Runtime whose fallback is the C allocator
    pub fn new(config: Config) -> Self {
        Self::with_fallback(config, SystemAllocator)
    }

    /// Runtime forwarding non-arena allocations to `fallback`
    pub fn with_fallback(config: Config, fallback: impl FallbackAllocator + 'static) -> Self {
        let allocator = Allocator::new(&config, Box::new(fallback));
        debug!(
            max_arenas = config.registry.max_arenas,
            slack = config.pages.slack_bytes(),
            "runtime initialized"
        );
        Self {
            host: HostState::new(0),
            allocator,
            config,
        }
    }

    /// Create an arena with `object_count` preallocated object slots and
    /// `storage_bytes` of raw storage.
    ///
    /// Refused while any arena is active.
    pub fn allocate(&mut self, object_count: usize, storage_bytes: usize) -> Result<ArenaId, ArenaError> {
        if let Some(active) = self.active() {
            warn!(%active, "arena allocation refused inside an active scope");
            return Err(ArenaError::NestedScope { active });
        }

        let id = self.allocator.create_arena(object_count, storage_bytes)?;
        logging::log_arena_allocated(id, object_count, storage_bytes);
        Ok(id)
    }

    /// Run `scope` with `arena` bound as the host's allocator and collector
    /// state. The host state is restored afterwards, even if `scope` panics.
    pub fn eval<R>(
        &mut self,
        arena: ArenaId,
        scope: impl FnOnce(&mut Runtime) -> R,
    ) -> Result<R, ArenaError> {
        let mut guard = self.enter(arena)?;
        Ok(scope(&mut *guard))
    }

    /// Discard everything allocated in `arena` since creation or the last
    /// reset. Every raw pointer into the arena dangles afterwards.
    pub fn reset(&mut self, id: ArenaId) -> Result<(), ArenaError> {
        let active = self.active() == Some(id);
        let arena = self
            .allocator
            .registry_mut()
            .get_mut(id)
            .ok_or(ArenaError::UnknownArena { arena: id })?;

        // While active, the arena's collector state lives in the host.
        if active {
            mem::swap(arena.gc_mut(), &mut self.host.gc);
        }
        logging::log_arena_reset(id, &arena.stats());
        arena.reset();
        if active {
            mem::swap(arena.gc_mut(), &mut self.host.gc);
        }
        Ok(())
    }

    /// Utilisation figures for `arena`
    pub fn stats(&self, id: ArenaId) -> Result<ArenaStats, ArenaError> {
        let arena = self.arena(id).ok_or(ArenaError::UnknownArena { arena: id })?;
        if self.active() == Some(id) {
            Ok(arena.stats_with(&self.host.gc))
        } else {
            Ok(arena.stats())
        }
    }

    /// Free the arena's pages and retire its id
    pub fn release(&mut self, id: ArenaId) -> Result<(), ArenaError> {
        if self.active() == Some(id) {
            return Err(ArenaError::ArenaActive { arena: id });
        }
        self.allocator
            .registry_mut()
            .remove(id)
            .ok_or(ArenaError::UnknownArena { arena: id })?;
        logging::log_arena_released(id);
        Ok(())
    }

    /// Allocate `size` bytes under the current context
    pub fn malloc(&mut self, size: usize) -> *mut u8 {
        // A null pointer carries no ownership requirements.
        unsafe { self.allocator.allocf(ptr::null_mut(), size, self.host.context) }
    }

    /// Resize `ptr` under the current context
    ///
    /// # Safety
    /// `ptr` must be null or a live block from [`Runtime::malloc`],
    /// [`Runtime::realloc`] or the fallback allocator.
    pub unsafe fn realloc(&mut self, ptr: *mut u8, size: usize) -> *mut u8 {
        self.allocator.allocf(ptr, size, self.host.context)
    }

    /// Free `ptr` under the current context; a no-op for arena blocks
    ///
    /// # Safety
    /// Same contract as [`Runtime::realloc`]; `ptr` must not be used afterwards.
    pub unsafe fn free(&mut self, ptr: *mut u8) {
        self.allocator.allocf(ptr, 0, self.host.context);
    }

    /// The adaptor entry point with an explicit context
    ///
    /// # Safety
    /// See [`Allocator::allocf`].
    pub unsafe fn allocf(&mut self, ptr: *mut u8, size: usize, context: Context) -> *mut u8 {
        self.allocator.allocf(ptr, size, context)
    }

    /// Create a host object, growing the collector by one heap page when the
    /// freelist is empty. Inside a scope the slot comes from the arena.
    pub fn new_object(&mut self) -> Result<NonNull<ObjectSlot>, ArenaError> {
        if let Some(slot) = self.host.gc.pop_slot() {
            return Ok(slot);
        }

        let bytes = HEAP_PAGE_SLOTS * SLOT_SIZE;
        let Some(memory) = NonNull::new(self.malloc(bytes)) else {
            error!(bytes, context = %self.host.context, "failed to grow object heap");
            return Err(ArenaError::OutOfMemory { requested: bytes });
        };
        debug!(slots = HEAP_PAGE_SLOTS, context = %self.host.context, "grew object heap");

        // `malloc` returns blocks aligned to at least 8 bytes.
        unsafe { self.host.gc.add_heap(memory, HEAP_PAGE_SLOTS) };
        self.host
            .gc
            .pop_slot()
            .ok_or(ArenaError::OutOfMemory { requested: bytes })
    }

    /// The arena currently bound, if any
    #[inline]
    pub fn active(&self) -> Option<ArenaId> {
        match self.host.context {
            Context::Arena(id) => Some(id),
            Context::Host(_) => None,
        }
    }

    #[inline]
    pub fn context(&self) -> Context {
        self.host.context
    }

    /// The collector state the host is currently using
    #[inline]
    pub fn gc(&self) -> &GcState {
        &self.host.gc
    }

    #[inline]
    pub fn host(&self) -> &HostState {
        &self.host
    }

    #[inline]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[inline]
    pub fn allocator(&self) -> &Allocator {
        &self.allocator
    }

    pub fn arena(&self, id: ArenaId) -> Option<&Arena> {
        self.allocator.registry().get(id)
    }

    /// Whether `context` names a live arena
    #[inline]
    pub fn is_arena(&self, context: Context) -> bool {
        self.allocator.registry().is_arena(context)
    }

    /// Whether `ptr` lies in one of `arena`'s pages
    pub fn is_in_arena(&self, id: ArenaId, ptr: *const u8) -> bool {
        NonNull::new(ptr as *mut u8)
            .and_then(|ptr| self.allocator.registry().locate(id, ptr))
            .is_some()
    }

    /// Bytes left on the page `arena` is currently filling
    pub fn page_available(&self, id: ArenaId) -> Result<usize, ArenaError> {
        self.arena(id)
            .map(Arena::available)
            .ok_or(ArenaError::UnknownArena { arena: id })
    }

    /// Tag `ptr` with the arena's current epoch
    pub fn track(&self, id: ArenaId, ptr: NonNull<u8>) -> Result<ArenaPtr, ArenaError> {
        let arena = self.arena(id).ok_or(ArenaError::UnknownArena { arena: id })?;
        ArenaPtr::new(id, arena, ptr)
    }

    /// The tracked pointer, unless its arena was reset or released since
    pub fn resolve(&self, handle: &ArenaPtr) -> Result<NonNull<u8>, ArenaError> {
        let arena = self
            .arena(handle.arena())
            .ok_or(ArenaError::UnknownArena { arena: handle.arena() })?;
        handle.check(arena)
    }
}

impl Default for Runtime {
    fn default() -> Self {
        Self::new(Config::default())
    }
}

impl Drop for Runtime {
    fn drop(&mut self) {
        // Host heap pages came from the fallback; arenas free their own pages.
        let context = self.host.context;
        for heap in self.host.gc.take_heaps() {
            unsafe { self.allocator.allocf(heap.as_ptr(), 0, context) };
        }
    }
}
