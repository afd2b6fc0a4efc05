//!
//! sqltester - SQL Test-Script Interpreter
//!
//! Reads test scripts that interleave SQL with `--command` lines, runs the
//! SQL through an embedded SQLite and checks the rendered output against
//! expectations written in the script.
//!
//! Pipeline:
//!
//! ```text
//! bytes -> Scanner -> DirectiveFilter -> command dispatch or input buffer
//!       -> Session::exec_sql -> result buffer -> comparison
//! ```
//!
//! Modules:
//! - scanner: byte-accurate line reader
//! - directive: compatibility filter for legacy control lines
//! - command: command registry and handlers
//! - session: database slots, buffers, counters
//! - exec: statement execution, row rendering and escaping
//! - glob: wildcard matching with the `#` number extension
//! - script: one script file and its line loop
//! - runner: multi-file driver and totals
//!

pub mod command;
pub mod config;
pub mod diagnostic;
pub mod directive;
pub mod error;
pub mod exec;
pub mod glob;
pub mod runner;
pub mod scanner;
pub mod script;
pub mod session;

pub use command::{Command, CommandRegistry, parse_command_line};
pub use config::{ConfigError, RunConfig, UnknownCommandPolicy, load_config, parse_config_str};
pub use diagnostic::{DiagnosticReporter, ScriptDiagnostic};
pub use error::{ScriptLocation, TesterError};
pub use exec::{BufferMode, ExecStatus, RowMode, escape};
pub use runner::{RunTotals, Runner, ScriptReport, ScriptState};
pub use script::TestScript;
pub use session::{MAX_DB_HANDLES, Session};
