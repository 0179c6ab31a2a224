//! Runtime configuration loaded from `gc-arena.toml`

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;

use crate::arena::Registry;
use crate::error::ArenaError;
use crate::gc::{HEAP_PAGE_SLOTS, SLOT_SIZE};
use crate::logging::{Level, LogConfig, LogFormat, LogOutput};

/// File name searched for by [`Config::discover`]
pub const CONFIG_FILE: &str = "gc-arena.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub registry: RegistryConfig,

    #[serde(default)]
    pub pages: PageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Ceiling on simultaneously live arenas
    #[serde(default = "default_max_arenas")]
    pub max_arenas: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageConfig {
    /// Extra room, in object slots, given to every page grown on demand
    #[serde(default = "default_slack_slots")]
    pub slack_slots: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub format: LogFormat,

    /// Log to daily-rotated files in this directory instead of stderr
    #[serde(default)]
    pub directory: Option<String>,

    /// Log to stdout instead of stderr; `directory` takes precedence
    #[serde(default)]
    pub stdout: bool,

    /// Extra filter directives, e.g. "allocator=trace"
    #[serde(default)]
    pub filter: Option<String>,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            max_arenas: default_max_arenas(),
        }
    }
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            slack_slots: default_slack_slots(),
        }
    }
}

impl PageConfig {
    /// Slack in bytes
    pub fn slack_bytes(&self) -> usize {
        self.slack_slots.saturating_mul(SLOT_SIZE)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::default(),
            directory: None,
            stdout: false,
            filter: None,
        }
    }
}

impl LoggingConfig {
    /// Translate into a [`LogConfig`] for [`crate::logging::init_logging`]
    pub fn to_log_config(&self) -> Result<LogConfig, ArenaError> {
        let level = Level::from_str(&self.level)
            .map_err(|_| ArenaError::Config(format!("invalid log level: {}", self.level)))?;

        let output = match &self.directory {
            Some(directory) => LogOutput::File {
                directory: directory.clone(),
                prefix: "gc-arena".to_string(),
            },
            None if self.stdout => LogOutput::Stdout,
            None => LogOutput::Stderr,
        };

        let mut config = LogConfig::new()
            .with_level(level)
            .with_format(self.format)
            .with_output(output);
        if let Some(filter) = &self.filter {
            config = config.with_filter(filter.clone());
        }
        Ok(config)
    }
}

fn default_max_arenas() -> usize { Registry::DEFAULT_CAPACITY }
fn default_slack_slots() -> usize { HEAP_PAGE_SLOTS }
fn default_level() -> String { "info".to_string() }

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ArenaError> {
        let content = fs::read_to_string(path)
            .map_err(|e| ArenaError::Config(format!("failed to read {}: {}", path.display(), e)))?;

        Self::parse(&content)
    }

    /// Parse configuration from TOML string
    pub fn parse(content: &str) -> Result<Self, ArenaError> {
        toml::from_str(content).map_err(|e| ArenaError::Config(format!("failed to parse config: {}", e)))
    }

    /// Load `gc-arena.toml` from the current directory or its parents,
    /// falling back to defaults
    pub fn discover() -> Self {
        let mut current = std::env::current_dir().ok();

        while let Some(dir) = current {
            let config_path = dir.join(CONFIG_FILE);
            if config_path.exists() {
                if let Ok(config) = Self::load(&config_path) {
                    return config;
                }
            }
            current = dir.parent().map(|p| p.to_path_buf());
        }

        Self::default()
    }

    /// Generate default configuration file content
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# Failed to generate config"))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ArenaError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ArenaError::Config(format!("failed to serialize config: {}", e)))?;

        fs::write(path, content)
            .map_err(|e| ArenaError::Config(format!("failed to write {}: {}", path.display(), e)))
    }
}
