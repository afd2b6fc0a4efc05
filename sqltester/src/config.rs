///
/// # Run Configuration
///
/// Settings that shape a whole run. Every field has a default, so an empty
/// file is a valid configuration; command-line flags override file values.
///
/// ## Example sqltester.toml
///
/// ```toml
/// keep_going = true
/// verbosity = 1
/// default_db = "scratch.db"
/// null_value = "NULL"
/// unknown_commands = "ignore"        # abort-script | abort-run | ignore
/// honor_required_properties = true
/// strict_directives = false
/// skip_blank_lines = false
/// ```
///

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const MAX_VERBOSITY: u8 = 3;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read config at {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config at {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// What to do with a `--name` line whose name is not registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnknownCommandPolicy {
    /// Abort the current script, keep running the others.
    #[default]
    AbortScript,
    AbortRun,
    /// Log and skip the line.
    Ignore,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct RunConfig {
    pub keep_going: bool,
    pub verbosity: u8,
    pub default_db: String,
    pub null_value: String,
    pub unknown_commands: UnknownCommandPolicy,
    pub honor_required_properties: bool,
    pub strict_directives: bool,
    pub skip_blank_lines: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            keep_going: false,
            verbosity: 0,
            default_db: "test.db".to_string(),
            null_value: "nil".to_string(),
            unknown_commands: UnknownCommandPolicy::AbortScript,
            honor_required_properties: false,
            strict_directives: false,
            skip_blank_lines: false,
        }
    }
}

impl RunConfig {
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity.min(MAX_VERBOSITY);
        self
    }

    pub fn with_keep_going(mut self, keep_going: bool) -> Self {
        self.keep_going = keep_going;
        self
    }
}

pub fn load_config(path: &Path) -> Result<RunConfig, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

pub fn parse_config_str(content: &str) -> Result<RunConfig, toml::de::Error> {
    let mut config: RunConfig = toml::from_str(content)?;
    config.verbosity = config.verbosity.min(MAX_VERBOSITY);
    Ok(config)
}
