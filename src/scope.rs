//! Scoped binding of an arena as the host's allocator and collector state
//!
//! Entering swaps the arena's collector state and context into the host;
//! dropping the guard swaps them back. Only one arena may be bound at a time.
//!
//! ```
//! use gc_arena::Runtime;
//!
//! let mut rt = Runtime::default();
//! let arena = rt.allocate(16, 1024).unwrap();
//! {
//!     let mut scope = rt.enter(arena).unwrap();
//!     let block = scope.malloc(64);
//!     assert!(scope.is_in_arena(arena, block));
//! } // host state restored here
//! assert_eq!(rt.active(), None);
//! ```

use core::mem;
use core::ops::{Deref, DerefMut};

use crate::allocator::Context;
use crate::arena::ArenaId;
use crate::error::ArenaError;
use crate::gc::GcState;
use crate::logging::{self, warn};
use crate::runtime::Runtime;

/// Host state saved while an arena is bound
#[derive(Debug)]
struct SavedHost {
    gc: GcState,
    context: Context,
}

/// RAII binding of one arena; derefs to the runtime it borrows
#[derive(Debug)]
pub struct ScopeGuard<'rt> {
    runtime: &'rt mut Runtime,
    arena: ArenaId,
    saved: Option<SavedHost>,
}

impl Runtime {
    /// Bind `arena` until the returned guard is dropped
    pub fn enter(&mut self, arena: ArenaId) -> Result<ScopeGuard<'_>, ArenaError> {
        if let Some(active) = self.active() {
            warn!(%active, requested = %arena, "nested arena scope rejected");
            return Err(ArenaError::NestedScope { active });
        }

        let state = self
            .allocator
            .registry_mut()
            .get_mut(arena)
            .ok_or(ArenaError::UnknownArena { arena })?;
        let arena_gc = mem::take(state.gc_mut());

        let saved = SavedHost {
            gc: mem::replace(&mut self.host.gc, arena_gc),
            context: mem::replace(&mut self.host.context, Context::Arena(arena)),
        };
        logging::log_scope(arena, true);

        Ok(ScopeGuard {
            runtime: self,
            arena,
            saved: Some(saved),
        })
    }
}

impl<'rt> ScopeGuard<'rt> {
    /// The bound arena
    #[inline]
    pub fn arena(&self) -> ArenaId {
        self.arena
    }

    /// Whether the arena is still bound
    #[inline]
    pub fn is_active(&self) -> bool {
        self.saved.is_some()
    }

    /// Unbind now rather than at the end of the enclosing block
    pub fn exit(mut self) {
        self.restore();
    }

    fn restore(&mut self) {
        let Some(saved) = self.saved.take() else {
            return;
        };
        let arena_gc = mem::replace(&mut self.runtime.host.gc, saved.gc);
        self.runtime.host.context = saved.context;

        // A bound arena cannot be released, so it is still registered.
        if let Some(state) = self.runtime.allocator.registry_mut().get_mut(self.arena) {
            *state.gc_mut() = arena_gc;
        }
        logging::log_scope(self.arena, false);
    }
}

impl Deref for ScopeGuard<'_> {
    type Target = Runtime;

    fn deref(&self) -> &Runtime {
        self.runtime
    }
}

impl DerefMut for ScopeGuard<'_> {
    fn deref_mut(&mut self) -> &mut Runtime {
        self.runtime
    }
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gc::Color;

    #[test]
    fn enter_swaps_collector_state() {
        let mut rt = Runtime::default();
        let arena = rt.allocate(2, 0).unwrap();

        let scope = rt.enter(arena).unwrap();
        assert_eq!(scope.active(), Some(arena));
        assert_eq!(scope.context(), Context::Arena(arena));
        assert!(scope.gc().is_disabled());
        assert_eq!(scope.gc().color(), Color::Red);
        assert_eq!(scope.gc().free_objects(), 2);
        drop(scope);

        assert_eq!(rt.active(), None);
        assert!(!rt.gc().is_disabled());
        assert_eq!(rt.arena(arena).unwrap().gc().free_objects(), 2);
    }

    #[test]
    fn exit_restores_early() {
        let mut rt = Runtime::default();
        let arena = rt.allocate(0, 16).unwrap();

        let scope = rt.enter(arena).unwrap();
        assert!(scope.is_active());
        scope.exit();
        assert_eq!(rt.context(), Context::Host(0));
    }

    #[test]
    fn nested_enter_is_rejected() {
        let mut rt = Runtime::default();
        let a = rt.allocate(0, 16).unwrap();
        let b = rt.allocate(0, 16).unwrap();

        let mut scope = rt.enter(a).unwrap();
        assert_eq!(
            scope.enter(b).unwrap_err(),
            ArenaError::NestedScope { active: a }
        );
        assert_eq!(
            scope.enter(a).unwrap_err(),
            ArenaError::NestedScope { active: a }
        );
        assert_eq!(scope.active(), Some(a));
    }

    #[test]
    fn objects_in_scope_come_from_the_arena() {
        let mut rt = Runtime::default();
        let arena = rt.allocate(1, 0).unwrap();

        let mut scope = rt.enter(arena).unwrap();
        let first = scope.new_object().unwrap();
        assert!(scope.is_in_arena(arena, first.as_ptr().cast::<u8>()));
        // Freelist exhausted: the next heap page is malloc'd inside the arena.
        let second = scope.new_object().unwrap();
        assert!(scope.is_in_arena(arena, second.as_ptr().cast::<u8>()));
        assert_eq!(scope.gc().live(), 2);
        drop(scope);

        assert_eq!(rt.gc().live(), 0);
        assert_eq!(rt.stats(arena).unwrap().live_objects, 2);
    }
}
