///
/// Interpreter error types.
///
/// Every error that can end a script: engine failures, assertion mismatches,
/// malformed commands and directives, undecodable input and I/O. Errors that
/// are raised while a script is running carry its location.
///
/// Fatal errors terminate the run unless keep-going is set; non-fatal ones
/// only abort the current script.
///

use std::fmt;
use std::path::PathBuf;

use sqltester_sqlite3::EngineError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::scanner::ScanError;

/// Where in a script something happened.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ScriptLocation {
    pub module: Option<String>,
    pub test_case: Option<String>,
    pub file: String,
    pub line: usize,
}

impl fmt::Display for ScriptLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.module.as_deref().unwrap_or("<unnamed>"))?;
        if let Some(test_case) = &self.test_case {
            write!(f, "[{}]", test_case)?;
        }
        write!(f, "[{}] line {}", self.file, self.line)
    }
}

#[derive(Debug, Error)]
pub enum TesterError {
    #[error("DB error #{}: {}", .0.code, .0.message)]
    Db(#[from] EngineError),

    #[error("no database is open in slot {slot}")]
    NoDatabase { slot: usize },

    #[error("{location}: {command} mismatch: expected <<{expected}>> but got <<{actual}>>")]
    Assertion {
        location: ScriptLocation,
        command: String,
        expected: String,
        actual: String,
    },

    #[error("{location}: {command} requires {requirement}")]
    ArgCount {
        location: ScriptLocation,
        command: String,
        requirement: String,
    },

    #[error("{location}: unknown command: {name}")]
    UnknownCommand {
        location: ScriptLocation,
        name: String,
        fatal: bool,
    },

    #[error("{location}: incompatible directive: {detail}")]
    IncompatibleDirective {
        location: ScriptLocation,
        detail: String,
        fatal: bool,
    },

    #[error("{location}: {message}")]
    ScriptFailed {
        location: ScriptLocation,
        message: String,
    },

    #[error("{location}: {source}")]
    Decode {
        location: ScriptLocation,
        source: ScanError,
    },

    #[error("Cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Cannot write output: {0}")]
    Output(#[source] std::io::Error),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TesterError {
    /// Whether the error ends the whole run (absent keep-going).
    pub fn is_fatal(&self) -> bool {
        match self {
            TesterError::UnknownCommand { fatal, .. }
            | TesterError::IncompatibleDirective { fatal, .. } => *fatal,
            _ => true,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            TesterError::Db(_) => "DbError",
            TesterError::NoDatabase { .. } => "NoDatabase",
            TesterError::Assertion { .. } => "AssertionFailed",
            TesterError::ArgCount { .. } => "ArgCount",
            TesterError::UnknownCommand { .. } => "UnknownCommand",
            TesterError::IncompatibleDirective { .. } => "IncompatibleDirective",
            TesterError::ScriptFailed { .. } => "TestScriptFailed",
            TesterError::Decode { .. } => "DecodeError",
            TesterError::Io { .. } => "IoError",
            TesterError::Output(_) => "OutputError",
            TesterError::Config(_) => "ConfigError",
        }
    }

    pub fn location(&self) -> Option<&ScriptLocation> {
        match self {
            TesterError::Assertion { location, .. }
            | TesterError::ArgCount { location, .. }
            | TesterError::UnknownCommand { location, .. }
            | TesterError::IncompatibleDirective { location, .. }
            | TesterError::ScriptFailed { location, .. }
            | TesterError::Decode { location, .. } => Some(location),
            _ => None,
        }
    }
}
