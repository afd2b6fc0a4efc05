//!
//! SQL-executing commands: run, result, json, glob, notglob, tableresult,
//! json-block.
//!
//! Each takes the pending input buffer as its SQL, clears the result
//! buffer, executes, and (except `run`) compares what was rendered.
//!

use tracing::debug;

use super::{parse_slot, trim_blanks};
use crate::directive::is_space;
use crate::error::TesterError;
use crate::exec::{BufferMode, ExecStatus, RowMode};
use crate::glob;
use crate::script::TestScript;
use crate::session::Session;

const BODY_TERMINATOR: &str = "--end";

pub(super) fn run(
    session: &mut Session,
    script: &TestScript<'_>,
    argv: &[String],
) -> Result<(), TesterError> {
    let slot = argv.get(1).map(|arg| parse_slot(script, arg)).transpose()?;
    let sql = session.take_input();
    session.clear_result();
    let status = session.exec_sql(slot, false, BufferMode::None, RowMode::OneLine, &sql)?;
    if let ExecStatus::Failed(err) = status {
        script.verbose(
            1,
            format_args!(
                "{} non-fatal command error #{}: {}\nfor SQL:\n{}",
                argv[0], err.code, err.message, sql
            ),
        );
    }
    Ok(())
}

/// `--result` and `--json`: the trimmed output must equal the arguments
/// joined by single spaces.
pub(super) fn result(
    session: &mut Session,
    script: &TestScript<'_>,
    argv: &[String],
    buffer: BufferMode,
) -> Result<(), TesterError> {
    session.increment_test_counter();
    let sql = session.take_input();
    session.clear_result();
    session.exec_sql(None, false, buffer, RowMode::OneLine, &sql)?;
    let produced = session.take_result();
    let actual = trim_blanks(&produced);
    let expected = argv[1..].join(" ");
    if actual != expected {
        return Err(script.assertion(&argv[0], expected, actual));
    }
    debug!(command = %argv[0], "result matched");
    Ok(())
}

pub(super) fn glob(
    session: &mut Session,
    script: &TestScript<'_>,
    argv: &[String],
    negate: bool,
) -> Result<(), TesterError> {
    session.increment_test_counter();
    let sql = session.take_input();
    session.clear_result();
    session.exec_sql(None, true, BufferMode::Escaped, RowMode::OneLine, &sql)?;
    let produced = session.take_result();
    let pattern = argv[1..].join(" ");
    script.verbose(2, format_args!("{} pattern: {}", argv[0], pattern));
    if !glob::passes(&pattern, &produced, negate) {
        return Err(script.assertion(&argv[0], pattern, produced));
    }
    Ok(())
}

/// `--tableresult` and `--json-block`: one expected line per produced row,
/// read from the lines that follow up to `--end`.
pub(super) fn table_result(
    session: &mut Session,
    script: &mut TestScript<'_>,
    argv: &[String],
    json: bool,
) -> Result<(), TesterError> {
    let name = argv[0].as_str();
    session.increment_test_counter();
    let Some(body) = script.fetch_terminated_body(session, BODY_TERMINATOR)? else {
        return Err(script.fail(format!("{} must be terminated with {}.", name, BODY_TERMINATOR)));
    };

    let expected: Vec<String> = body
        .iter()
        .map(|line| collapse_whitespace(line))
        .filter(|line| !line.is_empty())
        .collect();
    if expected.is_empty() {
        let what = if json { "json snippets" } else { "globs" };
        return Err(script.fail(format!("{} requires 1 or more {}.", name, what)));
    }

    let sql = session.take_input();
    session.clear_result();
    let buffer = if json { BufferMode::AsIs } else { BufferMode::Escaped };
    session.exec_sql(None, true, buffer, RowMode::NewLine, &sql)?;
    let produced = session.take_result();
    let rows: Vec<&str> = produced.split_terminator('\n').collect();

    if rows.len() != expected.len() {
        return Err(script.assertion(
            name,
            format!("{} row(s)", expected.len()),
            format!("{} row(s)", rows.len()),
        ));
    }
    for (row, pattern) in rows.iter().zip(&expected) {
        let matched = if json {
            pattern.as_str() == *row
        } else {
            glob::matches(pattern, row)
        };
        if !matched {
            return Err(script.assertion(name, pattern.as_str(), *row));
        }
    }
    Ok(())
}

fn collapse_whitespace(line: &str) -> String {
    trim_blanks(line)
        .split(is_space)
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}
