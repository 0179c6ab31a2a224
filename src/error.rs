//! Arena error types.

use std::error::Error;
use std::fmt;

use crate::arena::ArenaId;

/// Errors reported by arena operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArenaError {
    /// An arena scope was entered (or an arena allocated) while another arena
    /// is already active.
    NestedScope { active: ArenaId },
    /// The operation is not permitted while the arena is the active context.
    ArenaActive { arena: ArenaId },
    /// The id does not name a live arena (never allocated or released).
    UnknownArena { arena: ArenaId },
    /// The registry reached its configured ceiling.
    RegistryFull { capacity: usize },
    /// The system allocator could not satisfy a request, or the request size
    /// overflowed.
    OutOfMemory { requested: usize },
    /// A tracked pointer outlived a reset of its arena.
    StaleHandle { tracked_epoch: u32, current_epoch: u32 },
    /// A pointer expected to live in an arena does not.
    ForeignPointer { arena: ArenaId, addr: usize },
    /// Configuration could not be read or parsed.
    Config(String),
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NestedScope { active } => {
                write!(f, "nested arenas are not supported: {} is already active", active)
            }
            Self::ArenaActive { arena } => {
                write!(f, "{} is currently active", arena)
            }
            Self::UnknownArena { arena } => {
                write!(f, "unknown arena: {}", arena)
            }
            Self::RegistryFull { capacity } => {
                write!(f, "arena registry is full ({} arenas)", capacity)
            }
            Self::OutOfMemory { requested } => {
                write!(f, "out of memory: failed to allocate {} bytes", requested)
            }
            Self::StaleHandle { tracked_epoch, current_epoch } => {
                write!(
                    f,
                    "stale arena pointer: tracked at epoch {}, arena is at epoch {}",
                    tracked_epoch, current_epoch
                )
            }
            Self::ForeignPointer { arena, addr } => {
                write!(f, "pointer {:#x} does not belong to {}", addr, arena)
            }
            Self::Config(msg) => write!(f, "configuration error: {}", msg),
        }
    }
}

impl Error for ArenaError {}
