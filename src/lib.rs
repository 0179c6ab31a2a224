//! Region-based arenas for a garbage-collected host runtime
//!
//! An arena is a chain of pages that serves both the host's object slots and
//! its raw storage while a scope is active. Nothing allocated inside is
//! collected individually; [`Runtime::reset`] reclaims everything at once.
//!
//! # Architecture
//!
//! - **allocator**: page-chain bump allocation, size tags and the
//!   realloc-shaped adaptor that routes every host allocation
//! - **arena**: arenas, the generation-checked registry and stats
//! - **gc**: the host collector state that arenas swap in and out
//! - **runtime** / **scope**: the host stand-in and RAII scope binding
//! - **handle**: epoch-checked pointers that detect use after reset
//!
//! ```
//! use gc_arena::Runtime;
//!
//! let mut rt = Runtime::default();
//! let level = rt.allocate(64, 4096).unwrap();
//!
//! let object = rt.eval(level, |rt| rt.new_object().unwrap()).unwrap();
//! assert!(rt.is_in_arena(level, object.as_ptr().cast::<u8>()));
//! assert_eq!(rt.stats(level).unwrap().live_objects, 1);
//!
//! rt.reset(level).unwrap();
//! assert_eq!(rt.stats(level).unwrap().live_objects, 0);
//! ```

pub mod allocator;
pub mod arena;
pub mod config;
pub mod error;
pub mod gc;
pub mod handle;
pub mod logging;
pub mod runtime;
pub mod scope;

pub use allocator::{Allocator, Context, FallbackAllocator, SystemAllocator};
pub use arena::{Arena, ArenaId, ArenaStats};
pub use config::Config;
pub use error::ArenaError;
pub use gc::{GcState, ObjectSlot};
pub use handle::ArenaPtr;
pub use runtime::{HostState, Runtime};
pub use scope::ScopeGuard;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
