//! open / new / close / db

use super::parse_slot;
use crate::error::TesterError;
use crate::script::TestScript;
use crate::session::Session;

pub(super) fn open(session: &mut Session, argv: &[String], create: bool) -> Result<(), TesterError> {
    session.open_current(&argv[1], create)
}

pub(super) fn close(
    session: &mut Session,
    script: &TestScript<'_>,
    argv: &[String],
) -> Result<(), TesterError> {
    match argv.get(1).map(String::as_str) {
        None => session.close_current(),
        Some("all") => session.close_all(),
        Some(arg) => {
            let slot = parse_slot(script, arg)?;
            session.close_slot(slot);
        }
    }
    Ok(())
}

pub(super) fn select(
    session: &mut Session,
    script: &TestScript<'_>,
    argv: &[String],
) -> Result<(), TesterError> {
    let slot = parse_slot(script, &argv[1])?;
    session.select_slot(slot);
    Ok(())
}
