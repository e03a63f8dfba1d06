//! Configuration loading and typed config structures for the Chatter server.
//!
//! The configuration lives in `chatter-config.yaml` in the working
//! directory. Every field has a default, so an empty or missing file gives
//! a working single-world server on port 2822.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use chatter_world::WorldSettings;
use serde::Deserialize;

/// Errors that can occur when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read the configuration file from disk.
    #[error("failed to read config file: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Failed to parse YAML content.
    #[error("failed to parse config YAML: {source}")]
    Yaml {
        /// The underlying YAML parse error.
        source: serde_yml::Error,
    },

    /// The configuration parsed but makes no sense.
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl From<serde_yml::Error> for ConfigError {
    fn from(source: serde_yml::Error) -> Self {
        Self::Yaml { source }
    }
}

/// Top-level server configuration.
///
/// Mirrors the structure of `chatter-config.yaml`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ChatterConfig {
    /// Listener settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Tick scheduler settings.
    #[serde(default)]
    pub tick: TickConfig,

    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// World that sessions join by default.
    #[serde(default = "default_world_id")]
    pub default_world: String,

    /// Worlds to create at startup.
    #[serde(default = "default_worlds")]
    pub worlds: Vec<WorldConfig>,
}

impl Default for ChatterConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            tick: TickConfig::default(),
            logging: LoggingConfig::default(),
            default_world: default_world_id(),
            worlds: default_worlds(),
        }
    }
}

impl ChatterConfig {
    /// Load configuration from a YAML file, then apply environment
    /// overrides and validate.
    ///
    /// Environment variables override YAML values:
    /// - `CHATTER_HOST` overrides `server.host`
    /// - `CHATTER_PORT` overrides `server.port`
    /// - `CHATTER_TICK_MS` overrides `tick.interval_ms`
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read,
    /// [`ConfigError::Yaml`] if it is not valid YAML, or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::parse(&contents)
    }

    /// Load from `path` if it exists, otherwise start from defaults.
    /// Environment overrides and validation apply either way.
    ///
    /// # Errors
    ///
    /// See [`from_file`](Self::from_file).
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if path.exists() {
            Self::from_file(path)
        } else {
            let mut config = Self::default();
            config.apply_overrides(|key| std::env::var(key).ok())?;
            config.validate()?;
            Ok(config)
        }
    }

    /// Parse configuration from a YAML string, then apply environment
    /// overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Yaml`] if the string is not valid YAML or
    /// [`ConfigError::Invalid`] if validation fails.
    pub fn parse(yaml: &str) -> Result<Self, ConfigError> {
        let mut config: Self = if yaml.trim().is_empty() {
            Self::default()
        } else {
            serde_yml::from_str(yaml)?
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides looked up through `lookup` (normally the process
    /// environment).
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a numeric override does not
    /// parse.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(host) = lookup("CHATTER_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("CHATTER_PORT") {
            self.server.port = port
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("CHATTER_PORT is not a port: {port:?} ({e})")))?;
        }
        if let Some(ms) = lookup("CHATTER_TICK_MS") {
            self.tick.interval_ms = ms
                .parse()
                .map_err(|e| ConfigError::Invalid(format!("CHATTER_TICK_MS is not a number: {ms:?} ({e})")))?;
        }
        Ok(())
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] describing the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick.interval_ms == 0 {
            return Err(ConfigError::Invalid("tick.interval_ms must be positive".into()));
        }
        if self.worlds.is_empty() {
            return Err(ConfigError::Invalid("at least one world is required".into()));
        }

        let mut seen = BTreeSet::new();
        for world in &self.worlds {
            if !seen.insert(world.id.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate world id {:?}", world.id)));
            }
            let exponent = world.settings.growth_exponent;
            if !(exponent > 0.0 && exponent <= 4.0) {
                return Err(ConfigError::Invalid(format!(
                    "world {:?}: growth_exponent {exponent} outside (0, 4]",
                    world.id
                )));
            }
            if world.settings.growth_interval_ticks == 0 {
                return Err(ConfigError::Invalid(format!(
                    "world {:?}: growth_interval_ticks must be positive",
                    world.id
                )));
            }
        }
        if !seen.contains(self.default_world.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "default_world {:?} is not a configured world",
                self.default_world
            )));
        }
        Ok(())
    }
}

/// Listener configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ServerConfig {
    /// Interface to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// TCP port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    /// `host:port` for binding.
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Tick scheduler configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct TickConfig {
    /// Milliseconds between ticks (33 is about 30 Hz).
    #[serde(default = "default_tick_interval_ms")]
    pub interval_ms: u64,
}

impl Default for TickConfig {
    fn default() -> Self {
        Self {
            interval_ms: default_tick_interval_ms(),
        }
    }
}

impl TickConfig {
    /// The interval as a [`Duration`](std::time::Duration).
    pub const fn interval(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.interval_ms)
    }
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when `RUST_LOG` is unset (trace, debug, info, warn,
    /// error, or a full filter directive).
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

/// One world to create at startup.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WorldConfig {
    /// World id.
    #[serde(default = "default_world_id")]
    pub id: String,

    /// Markov corpus file; the built-in corpus when absent.
    #[serde(default)]
    pub corpus_path: Option<PathBuf>,

    /// Spawn point, growth tuning, terrain and startup plants.
    #[serde(flatten)]
    pub settings: WorldSettings,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            id: default_world_id(),
            corpus_path: None,
            settings: WorldSettings::default(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".into()
}

const fn default_port() -> u16 {
    2822
}

const fn default_tick_interval_ms() -> u64 {
    33
}

fn default_log_level() -> String {
    "info".into()
}

fn default_world_id() -> String {
    "default".into()
}

fn default_worlds() -> Vec<WorldConfig> {
    vec![WorldConfig::default()]
}
