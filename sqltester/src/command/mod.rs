//!
//! Command Module - `--name` Lines and Their Handlers
//!
//! A command line matches `--<name>[ <args>]` where the name is lowercase
//! letters and dashes. Arguments are split on whitespace; there is no
//! quoting. Handlers are stateless: everything they touch lives in the
//! `Session` or the `TestScript`.
//!
//! Handler groups:
//! - database: open, new, close, db
//! - settings: column-names, null, print, testcase, verbosity, oom
//! - verify: run, result, json, glob, notglob, tableresult, json-block
//!

mod database;
mod registry;
mod settings;
mod verify;

use smallvec::SmallVec;

use crate::directive::is_space;
use crate::error::TesterError;
use crate::exec::BufferMode;
use crate::script::TestScript;
use crate::session::{MAX_DB_HANDLES, Session};

pub use registry::CommandRegistry;

/// Parsed command line: argv[0] is the name, the rest are arguments.
pub type Argv = SmallVec<[String; 4]>;

/// Splits a `--name args...` line into argv, or `None` for other lines.
pub fn parse_command_line(line: &str) -> Option<Argv> {
    let rest = line.strip_prefix("--")?;
    let name_len = rest
        .bytes()
        .take_while(|b| b.is_ascii_lowercase() || *b == b'-')
        .count();
    if name_len == 0 {
        return None;
    }
    let after = &rest[name_len..];
    if !after.is_empty() && !after.starts_with(' ') {
        return None;
    }
    Some(
        rest.trim_matches(is_space)
            .split(is_space)
            .filter(|arg| !arg.is_empty())
            .map(str::to_string)
            .collect(),
    )
}

/// Inclusive argument-count bounds, not counting argv[0].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exactly(n: usize) -> Self {
        Self { min: n, max: Some(n) }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Self { min, max: Some(max) }
    }

    pub const fn at_least(min: usize) -> Self {
        Self { min, max: None }
    }

    pub fn accepts(&self, argc: usize) -> bool {
        argc >= self.min && self.max.is_none_or(|max| argc <= max)
    }

    fn requirement(&self) -> String {
        match self.max {
            Some(max) if max == self.min => format!("exactly {} argument(s)", self.min),
            Some(max) => format!("{}-{} arguments.", self.min, max),
            None => format!("at least {} arguments.", self.min),
        }
    }
}

impl std::fmt::Display for Arity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.max {
            Some(max) if max == self.min => write!(f, "{}", self.min),
            Some(max) => write!(f, "{}..={}", self.min, max),
            None => write!(f, "{}..", self.min),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Open { create: bool },
    Close,
    Db,
    ColumnNames,
    Null,
    Print,
    TestCase,
    Verbosity,
    Noop,
    Run,
    Result { buffer: BufferMode },
    Glob { negate: bool },
    TableResult { json: bool },
}

impl Command {
    pub const fn arity(&self) -> Arity {
        match self {
            Command::Open { .. }
            | Command::Db
            | Command::ColumnNames
            | Command::Null
            | Command::TestCase
            | Command::Verbosity => Arity::exactly(1),
            Command::Close | Command::Run => Arity::range(0, 1),
            Command::Print | Command::Noop | Command::Result { .. } => Arity::at_least(0),
            Command::Glob { .. } => Arity::at_least(1),
            Command::TableResult { .. } => Arity::exactly(0),
        }
    }

    /// Checks the argument count, then runs the handler.
    pub fn process(
        &self,
        session: &mut Session,
        script: &mut TestScript<'_>,
        argv: &[String],
    ) -> Result<(), TesterError> {
        let arity = self.arity();
        let argc = argv.len().saturating_sub(1);
        if !arity.accepts(argc) {
            return Err(TesterError::ArgCount {
                location: script.location(),
                command: argv.first().cloned().unwrap_or_default(),
                requirement: arity.requirement(),
            });
        }

        match *self {
            Command::Open { create } => database::open(session, argv, create),
            Command::Close => database::close(session, script, argv),
            Command::Db => database::select(session, script, argv),
            Command::ColumnNames => settings::column_names(session, script, argv),
            Command::Null => settings::null(session, argv),
            Command::Print => settings::print(session, script, argv),
            Command::TestCase => settings::test_case(session, script, argv),
            Command::Verbosity => settings::verbosity(script, argv),
            Command::Noop => Ok(()),
            Command::Run => verify::run(session, script, argv),
            Command::Result { buffer } => verify::result(session, script, argv, buffer),
            Command::Glob { negate } => verify::glob(session, script, argv, negate),
            Command::TableResult { json } => verify::table_result(session, script, argv, json),
        }
    }
}

/// Trims bytes up to and including space from both ends.
pub(crate) fn trim_blanks(s: &str) -> &str {
    s.trim_matches(|c: char| c <= ' ')
}

pub(crate) fn parse_int(script: &TestScript<'_>, arg: &str) -> Result<i64, TesterError> {
    arg.parse::<i64>()
        .map_err(|_| script.fail(format!("invalid integer argument: {}", arg)))
}

pub(crate) fn parse_slot(script: &TestScript<'_>, arg: &str) -> Result<usize, TesterError> {
    let n = parse_int(script, arg)?;
    usize::try_from(n)
        .ok()
        .filter(|slot| *slot < MAX_DB_HANDLES)
        .ok_or_else(|| script.fail(format!("illegal db number: {}", n)))
}
