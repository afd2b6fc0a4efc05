//!
//! Diagnostic Module - Rendering Script Aborts
//!
//! Turns a `TesterError` into a miette report that shows the offending
//! script line with a label and, where there is one, a hint.
//!
//! Usage:
//!   let reporter = DiagnosticReporter::new(&script);
//!   reporter.report(&err);
//!

use miette::{Diagnostic, LabeledSpan, NamedSource, Report, SourceSpan};
use thiserror::Error;

use crate::error::TesterError;
use crate::script::TestScript;

#[derive(Debug, Error)]
#[error("{message}")]
pub struct ScriptDiagnostic {
    message: String,
    src: NamedSource<String>,
    span: SourceSpan,
    label: String,
    help_text: Option<String>,
}

impl Diagnostic for ScriptDiagnostic {
    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.src)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(LabeledSpan::new_primary_with_span(
            Some(self.label.clone()),
            self.span,
        ))))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        self.help_text
            .as_ref()
            .map(|h| Box::new(h.clone()) as Box<dyn std::fmt::Display>)
    }
}

impl ScriptDiagnostic {
    pub fn from_error(err: &TesterError, script: &TestScript<'_>) -> Self {
        let line = err
            .location()
            .map_or_else(|| script.line_no(), |location| location.line);
        let span = script.line_span(line).unwrap_or_default();
        let (label, help) = error_details(err);

        Self {
            message: format!("{}: {}", err.kind(), err),
            src: NamedSource::new(
                script.path().display().to_string(),
                String::from_utf8_lossy(script.source()).into_owned(),
            ),
            span: (span.start, span.len()).into(),
            label,
            help_text: help,
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn span(&self) -> SourceSpan {
        self.span
    }
}

fn error_details(err: &TesterError) -> (String, Option<String>) {
    match err {
        TesterError::Db(engine) => (
            format!("{} raised here", engine.code_name()),
            Some("check the SQL buffered above this command".to_string()),
        ),
        TesterError::NoDatabase { slot } => (
            format!("slot {} is empty", slot),
            Some("open a database in that slot with --open or --new".to_string()),
        ),
        TesterError::Assertion { command, .. } => (format!("{} failed", command), None),
        TesterError::ArgCount { command, requirement, .. } => (
            format!("wrong number of arguments to {}", command),
            Some(format!("{} requires {}", command, requirement)),
        ),
        TesterError::UnknownCommand { name, .. } => (
            format!("unknown command '{}'", name),
            Some("run with --internals to list the available commands".to_string()),
        ),
        TesterError::IncompatibleDirective { .. } => (
            "not supported by this interpreter".to_string(),
            Some("the script is skipped".to_string()),
        ),
        TesterError::ScriptFailed { message, .. } => (message.clone(), None),
        TesterError::Decode { source, .. } => (
            format!("byte #{} is not valid UTF-8", source.byte),
            None,
        ),
        TesterError::Io { .. } | TesterError::Output(_) | TesterError::Config(_) => {
            ("error".to_string(), None)
        }
    }
}

pub struct DiagnosticReporter<'a, 'r> {
    script: &'a TestScript<'r>,
}

impl<'a, 'r> DiagnosticReporter<'a, 'r> {
    pub fn new(script: &'a TestScript<'r>) -> Self {
        Self { script }
    }

    pub fn report(&self, err: &TesterError) {
        let diag = ScriptDiagnostic::from_error(err, self.script);
        let report = Report::new(diag);
        eprintln!("{:?}", report);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CommandRegistry;
    use crate::config::RunConfig;
    use crate::scanner::Span;

    #[test]
    fn test_diagnostic_points_at_failing_line() {
        let registry = CommandRegistry::standard();
        let config = RunConfig::default();
        let script = TestScript::from_source("t.test", "SELECT 1;\n--result 2\n", &config, &registry);
        let err = TesterError::Assertion {
            location: crate::error::ScriptLocation {
                file: "t.test".to_string(),
                line: 2,
                ..Default::default()
            },
            command: "result".to_string(),
            expected: "2".to_string(),
            actual: "1".to_string(),
        };

        let diag = ScriptDiagnostic::from_error(&err, &script);
        assert!(diag.message().starts_with("AssertionFailed"));
        assert_eq!(diag.span(), SourceSpan::from((10, 10)));
        assert_eq!(script.line_span(2), Some(Span::new(10, 20)));
    }

    #[test]
    fn test_diagnostic_without_location() {
        let registry = CommandRegistry::standard();
        let config = RunConfig::default();
        let script = TestScript::from_source("t.test", "SELECT 1;\n", &config, &registry);
        let err = TesterError::NoDatabase { slot: 2 };

        let diag = ScriptDiagnostic::from_error(&err, &script);
        assert_eq!(diag.span(), SourceSpan::from((0, 0)));
        assert!(diag.help_text.is_some());
    }
}
