//! column-names / null / print / testcase / verbosity

use super::parse_int;
use crate::config::MAX_VERBOSITY;
use crate::error::TesterError;
use crate::script::TestScript;
use crate::session::Session;

pub(super) fn column_names(
    session: &mut Session,
    script: &TestScript<'_>,
    argv: &[String],
) -> Result<(), TesterError> {
    let enabled = parse_int(script, &argv[1])? != 0;
    session.set_column_names(enabled);
    Ok(())
}

pub(super) fn null(session: &mut Session, argv: &[String]) -> Result<(), TesterError> {
    session.set_null_value(&argv[1]);
    Ok(())
}

/// With arguments, prints them on one line. Without, prints the pending
/// input buffer verbatim.
pub(super) fn print(
    session: &mut Session,
    script: &TestScript<'_>,
    argv: &[String],
) -> Result<(), TesterError> {
    let prefix = script.location();
    if argv.len() > 1 {
        session.write_output(format_args!("{}: {}\n", prefix, argv[1..].join(" ")))
    } else {
        let input = session.input_text().to_string();
        session.write_output(format_args!("{}: {}", prefix, input))
    }
}

pub(super) fn test_case(
    session: &mut Session,
    script: &mut TestScript<'_>,
    argv: &[String],
) -> Result<(), TesterError> {
    script.set_test_case(&argv[1]);
    session.clear_result();
    session.clear_input();
    Ok(())
}

pub(super) fn verbosity(script: &mut TestScript<'_>, argv: &[String]) -> Result<(), TesterError> {
    let level = parse_int(script, &argv[1])?.clamp(0, i64::from(MAX_VERBOSITY));
    script.set_verbosity(level as u8);
    Ok(())
}
