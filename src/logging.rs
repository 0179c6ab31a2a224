//! Logging infrastructure - structured tracing for the arena allocator
//!
//! Design: Uses `tracing` for structured, contextual logging with:
//! - Per-allocation `trace!` events under the `allocator` target
//! - Arena lifecycle events (create, reset, release) at `info!`
//! - Scope enter/exit at `debug!`
//! - Console or rolling-file output, pretty/compact/JSON

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan, MakeWriter},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Layer,
};

// Re-export tracing macros for use throughout the crate
pub use tracing::{debug, error, info, trace, warn, Level};

use crate::arena::{ArenaId, ArenaStats};

/// Global logging state
static LOGGER_INITIALIZED: OnceCell<()> = OnceCell::new();

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable format with timestamps
    Pretty,
    /// Compact format for production
    #[default]
    Compact,
    /// JSON format for structured logging
    Json,
}

/// Log output destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogOutput {
    Stdout,
    Stderr,
    /// File with daily rotation
    File { directory: String, prefix: String },
}

/// Logging configuration
#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: Level,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Whether to include span events
    pub span_events: bool,
    /// Custom filter directives (e.g., "gc_arena=debug,allocator=trace")
    pub filter: Option<String>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            format: LogFormat::Compact,
            output: LogOutput::Stderr,
            span_events: false,
            filter: None,
        }
    }
}

impl LogConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn with_format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_output(mut self, output: LogOutput) -> Self {
        self.output = output;
        self
    }

    pub fn with_span_events(mut self, enabled: bool) -> Self {
        self.span_events = enabled;
        self
    }

    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = Some(filter.into());
        self
    }
}

/// Initialize the global logging system (first call wins)
///
/// Returns a `WorkerGuard` that must be kept alive for the duration of the
/// program so buffered logs are flushed. Returns `None` if logging was
/// already initialized.
pub fn init_logging(config: LogConfig) -> Option<WorkerGuard> {
    if LOGGER_INITIALIZED.set(()).is_err() {
        return None;
    }

    let (writer, guard) = match &config.output {
        LogOutput::Stdout => tracing_appender::non_blocking(std::io::stdout()),
        LogOutput::Stderr => tracing_appender::non_blocking(std::io::stderr()),
        LogOutput::File { directory, prefix } => {
            tracing_appender::non_blocking(rolling::daily(directory, prefix))
        }
    };

    install(writer, &config);
    Some(guard)
}

fn install<W>(writer: W, config: &LogConfig)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = build_filter(config);
    let layer = fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_span_events(span_events_config(config.span_events));

    // Another subscriber may already be installed (e.g. by the host).
    let _ = match config.format {
        LogFormat::Pretty => tracing_subscriber::registry()
            .with(layer.pretty().with_filter(filter))
            .try_init(),
        LogFormat::Compact => tracing_subscriber::registry()
            .with(layer.compact().with_filter(filter))
            .try_init(),
        LogFormat::Json => tracing_subscriber::registry()
            .with(layer.json().with_filter(filter))
            .try_init(),
    };
}

fn build_filter(config: &LogConfig) -> EnvFilter {
    let base_filter = EnvFilter::from_default_env().add_directive(config.level.into());

    match &config.filter {
        Some(filter_str) => filter_str.split(',').fold(base_filter, |filter, directive| {
            filter.add_directive(directive.parse().unwrap_or_else(|_| {
                warn!("Invalid filter directive: {}", directive);
                config.level.into()
            }))
        }),
        None => base_filter,
    }
}

fn span_events_config(enabled: bool) -> FmtSpan {
    if enabled {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    }
}

/// Initialize logging with defaults for development
pub fn init_dev_logging() -> Option<WorkerGuard> {
    init_logging(LogConfig {
        level: Level::DEBUG,
        format: LogFormat::Pretty,
        output: LogOutput::Stderr,
        span_events: true,
        filter: Some("gc_arena=debug".to_string()),
    })
}

/// Check if logging is initialized
pub fn is_initialized() -> bool {
    LOGGER_INITIALIZED.get().is_some()
}

/// Log an arena creation
#[inline]
pub fn log_arena_allocated(arena: ArenaId, objects: usize, storage: usize) {
    info!(target: "arena", %arena, objects, storage, "arena allocated");
}

/// Log an arena reset
#[inline]
pub fn log_arena_reset(arena: ArenaId, before: &ArenaStats) {
    info!(
        target: "arena",
        %arena,
        pages_freed = before.pages.saturating_sub(1),
        live_objects = before.live_objects,
        used_storage = before.used_storage,
        "arena reset"
    );
}

/// Log an arena release at teardown
#[inline]
pub fn log_arena_released(arena: ArenaId) {
    info!(target: "arena", %arena, "arena released");
}

/// Log a scope transition
#[inline]
pub fn log_scope(arena: ArenaId, entered: bool) {
    if entered {
        debug!(target: "arena", %arena, "entered arena scope");
    } else {
        debug!(target: "arena", %arena, "exited arena scope");
    }
}
