///
/// Test Script - One Parsed File and Its Line Loop
///
/// A script mixes SQL text with `--command` lines. Lines are read in order;
/// every line first passes the directive filter, then command lines are
/// dispatched and everything else is appended to the session's input
/// buffer.
///
/// Key types:
/// - TestScript: file name, module/test-case labels, scanner, verbosity
///
/// Design decisions:
/// - The registry is borrowed, never global; commands reach it through the
///   script when they need to recognize a body terminator
/// - Verbose output goes through `tracing`, gated by the script's own level
///

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, trace, warn};

use crate::command::{CommandRegistry, parse_command_line};
use crate::config::{RunConfig, UnknownCommandPolicy};
use crate::directive::{Directive, DirectiveFilter};
use crate::error::{ScriptLocation, TesterError};
use crate::scanner::{Scanner, Span};
use crate::session::Session;

pub struct TestScript<'r> {
    path: PathBuf,
    display_name: String,
    module_name: Option<String>,
    test_case: Option<String>,
    scanner: Scanner,
    verbosity: u8,
    filter: DirectiveFilter,
    strict_directives: bool,
    unknown_commands: UnknownCommandPolicy,
    registry: &'r CommandRegistry,
}

impl<'r> TestScript<'r> {
    pub fn from_file(
        path: &Path,
        config: &RunConfig,
        registry: &'r CommandRegistry,
    ) -> Result<Self, TesterError> {
        let src = std::fs::read(path).map_err(|source| TesterError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self::from_source(path, src, config, registry))
    }

    pub fn from_source(
        path: impl Into<PathBuf>,
        src: impl Into<Vec<u8>>,
        config: &RunConfig,
        registry: &'r CommandRegistry,
    ) -> Self {
        let path = path.into();
        Self {
            display_name: path.display().to_string(),
            path,
            module_name: None,
            test_case: None,
            scanner: Scanner::new(src).with_skip_blank_lines(config.skip_blank_lines),
            verbosity: config.verbosity,
            filter: DirectiveFilter::new(config.honor_required_properties),
            strict_directives: config.strict_directives,
            unknown_commands: config.unknown_commands,
            registry,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn module_name(&self) -> Option<&str> {
        self.module_name.as_deref()
    }

    pub fn test_case(&self) -> Option<&str> {
        self.test_case.as_deref()
    }

    pub fn set_test_case(&mut self, name: &str) {
        self.test_case = Some(name.to_string());
    }

    pub fn verbosity(&self) -> u8 {
        self.verbosity
    }

    pub fn set_verbosity(&mut self, level: u8) {
        self.verbosity = level;
    }

    pub fn source(&self) -> &[u8] {
        self.scanner.source()
    }

    pub fn line_no(&self) -> usize {
        self.scanner.line_no()
    }

    pub fn line_span(&self, line_no: usize) -> Option<Span> {
        self.scanner.line_span(line_no)
    }

    pub fn location(&self) -> ScriptLocation {
        self.location_at(self.scanner.line_no())
    }

    fn location_at(&self, line: usize) -> ScriptLocation {
        ScriptLocation {
            module: self.module_name.clone(),
            test_case: self.test_case.clone(),
            file: self.display_name.clone(),
            line,
        }
    }

    pub fn fail(&self, message: impl Into<String>) -> TesterError {
        TesterError::ScriptFailed {
            location: self.location(),
            message: message.into(),
        }
    }

    pub fn assertion(
        &self,
        command: &str,
        expected: impl Into<String>,
        actual: impl Into<String>,
    ) -> TesterError {
        TesterError::Assertion {
            location: self.location(),
            command: command.to_string(),
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// Emits `message` when this script's verbosity is at least `level`.
    pub fn verbose(&self, level: u8, message: fmt::Arguments<'_>) {
        if self.verbosity < level {
            return;
        }
        let location = self.location();
        if level <= 1 {
            debug!("{} {}", location, message);
        } else {
            trace!("{} {}", location, message);
        }
    }

    /// Runs the script to EOF against `session`.
    pub fn run(&mut self, session: &mut Session) -> Result<(), TesterError> {
        self.scanner.rewind();
        self.test_case = None;
        while let Some(line) = self.next_line()? {
            self.verbose(3, format_args!("input line: {}", line));
            self.check_directive(session, &line, self.line_no())?;
            match parse_command_line(&line) {
                Some(argv) => self.process_command(session, &argv)?,
                None => session.append_input(&line),
            }
        }
        Ok(())
    }

    /// Collects the lines after a command up to one whose trimmed text is
    /// `terminator`, which is consumed. `None` when a registered command or
    /// EOF comes first; that line is left unread.
    pub fn fetch_terminated_body(
        &mut self,
        session: &mut Session,
        terminator: &str,
    ) -> Result<Option<Vec<String>>, TesterError> {
        let mut body = Vec::new();
        while let Some(line) = self.peek_line()? {
            self.check_directive(session, &line, self.line_no() + 1)?;
            if line.trim() == terminator {
                self.scanner.consume_peeked();
                return Ok(Some(body));
            }
            if self.is_registered_command(&line) {
                break;
            }
            self.scanner.consume_peeked();
            self.verbose(3, format_args!("body line: {}", line));
            body.push(line);
        }
        Ok(None)
    }

    fn is_registered_command(&self, line: &str) -> bool {
        parse_command_line(line).is_some_and(|argv| self.registry.contains(&argv[0]))
    }

    fn next_line(&mut self) -> Result<Option<String>, TesterError> {
        let next = self.scanner.line_no() + 1;
        self.scanner.next_line().map_err(|source| TesterError::Decode {
            location: self.location_at(next),
            source,
        })
    }

    fn peek_line(&mut self) -> Result<Option<String>, TesterError> {
        let next = self.scanner.line_no() + 1;
        self.scanner.peek_line().map_err(|source| TesterError::Decode {
            location: self.location_at(next),
            source,
        })
    }

    fn check_directive(
        &mut self,
        session: &mut Session,
        line: &str,
        line_no: usize,
    ) -> Result<(), TesterError> {
        match self.filter.check(line) {
            Ok(Directive::None) => Ok(()),
            Ok(Directive::ModuleName(name)) => {
                self.module_name = Some(name.to_string());
                Ok(())
            }
            Ok(Directive::RequiredProperties(fragments)) => {
                for sql in fragments {
                    self.verbose(1, format_args!("adding db-init SQL: {}", sql));
                    session.append_db_init_sql(sql)?;
                }
                Ok(())
            }
            Err(incompatible) => Err(TesterError::IncompatibleDirective {
                location: self.location_at(line_no),
                detail: incompatible.detail,
                fatal: self.strict_directives,
            }),
        }
    }

    fn process_command(&mut self, session: &mut Session, argv: &[String]) -> Result<(), TesterError> {
        self.verbose(1, format_args!("running command: {}", argv.join(" ")));
        if !session.input_text().is_empty() {
            self.verbose(3, format_args!("input buffer = {}", session.input_text()));
        }

        let registry = self.registry;
        match registry.get(&argv[0]) {
            Some(command) => command.process(session, self, argv),
            None => match self.unknown_commands {
                UnknownCommandPolicy::Ignore => {
                    warn!("{} ignoring unknown command: {}", self.location(), argv[0]);
                    Ok(())
                }
                policy => Err(TesterError::UnknownCommand {
                    location: self.location(),
                    name: argv[0].clone(),
                    fatal: policy == UnknownCommandPolicy::AbortRun,
                }),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session_in(dir: &TempDir, config: &RunConfig) -> Session {
        let config = RunConfig {
            default_db: dir.path().join("test.db").to_string_lossy().into_owned(),
            ..config.clone()
        };
        Session::new(&config, Box::new(std::io::sink()))
    }

    fn run_source(src: &str, config: &RunConfig) -> (Result<(), TesterError>, Session) {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let registry = CommandRegistry::standard();
        let mut session = session_in(&dir, config);
        let mut script = TestScript::from_source("inline.test", src, config, &registry);
        let outcome = script.run(&mut session);
        session.close_all();
        (outcome, session)
    }

    #[test]
    fn test_content_goes_to_input_buffer() {
        let (outcome, session) = run_source("SELECT 1;\n\nSELECT 2;\n", &RunConfig::default());
        assert!(outcome.is_ok());
        assert_eq!(session.input_text(), "SELECT 1;\n\nSELECT 2;\n");
    }

    #[test]
    fn test_result_passes() {
        let src = "--testcase c1\nSELECT 1, 'a';\n--result 1 a\n";
        let (outcome, session) = run_source(src, &RunConfig::default());
        outcome.expect("script should pass");
        assert_eq!(session.counters().file, 1);
    }

    #[test]
    fn test_result_mismatch_carries_location() {
        let src = "** SCRIPT_MODULE_NAME: mod1\n--testcase c2\nSELECT 2;\n--result 3\n";
        let (outcome, _) = run_source(src, &RunConfig::default());
        let err = outcome.unwrap_err();
        assert!(err.is_fatal());
        match err {
            TesterError::Assertion { location, expected, actual, .. } => {
                assert_eq!(location.to_string(), "[mod1][c2][inline.test] line 4");
                assert_eq!(expected, "3");
                assert_eq!(actual, "2");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_testcase_clears_buffers() {
        let (outcome, session) = run_source("SELECT 1;\n--testcase t\n", &RunConfig::default());
        assert!(outcome.is_ok());
        assert!(session.input_text().is_empty());
        assert!(session.result_text().is_empty());
    }

    #[test]
    fn test_unknown_command_policies() {
        let src = "--nope 1 2\nSELECT 1;\n";
        let (outcome, _) = run_source(src, &RunConfig::default());
        let err = outcome.unwrap_err();
        assert_eq!(err.kind(), "UnknownCommand");
        assert!(!err.is_fatal());

        let config = RunConfig {
            unknown_commands: UnknownCommandPolicy::AbortRun,
            ..RunConfig::default()
        };
        assert!(run_source(src, &config).0.unwrap_err().is_fatal());

        let config = RunConfig {
            unknown_commands: UnknownCommandPolicy::Ignore,
            ..RunConfig::default()
        };
        let (outcome, session) = run_source(src, &config);
        assert!(outcome.is_ok());
        assert_eq!(session.input_text(), "SELECT 1;\n");
    }

    #[test]
    fn test_arg_count_checked_first() {
        let (outcome, _) = run_source("--open\n", &RunConfig::default());
        let err = outcome.unwrap_err();
        assert_eq!(err.kind(), "ArgCount");
        assert!(err.to_string().contains("open requires exactly 1 argument(s)"));
    }

    #[test]
    fn test_illegal_slot() {
        let (outcome, _) = run_source("--db 7\n", &RunConfig::default());
        assert!(outcome.unwrap_err().to_string().contains("illegal db number: 7"));
        let (outcome, _) = run_source("--db x\n", &RunConfig::default());
        assert!(outcome.unwrap_err().to_string().contains("invalid integer"));
    }

    #[test]
    fn test_tableresult_body() {
        let src = "\
SELECT 1, 'a b' UNION ALL SELECT 2, NULL;
--tableresult
  1   a	b
2 nil

--end
SELECT 3;
--result 3
";
        let (outcome, session) = run_source(src, &RunConfig::default());
        outcome.expect("tableresult should pass");
        assert_eq!(session.counters().file, 2);
    }

    #[test]
    fn test_tableresult_requires_end() {
        let src = "SELECT 1;\n--tableresult\n1\n--result 1\n";
        let (outcome, _) = run_source(src, &RunConfig::default());
        assert!(outcome.unwrap_err().to_string().contains("must be terminated with --end"));
    }

    #[test]
    fn test_tableresult_row_count_mismatch() {
        let src = "SELECT 1 UNION ALL SELECT 2;\n--tableresult\n*\n--end\n";
        let (outcome, _) = run_source(src, &RunConfig::default());
        let err = outcome.unwrap_err();
        assert_eq!(err.kind(), "AssertionFailed");
        assert!(err.to_string().contains("expected <<1 row(s)>> but got <<2 row(s)>>"));
    }

    #[test]
    fn test_tableresult_with_no_rows() {
        let src = "SELECT 1 WHERE 0;\n--tableresult\n*\n--end\n";
        let (outcome, _) = run_source(src, &RunConfig::default());
        let err = outcome.unwrap_err();
        assert_eq!(err.kind(), "AssertionFailed");
        assert!(err.to_string().contains("<<0 row(s)>>"));
    }

    #[test]
    fn test_body_lines_pass_directive_filter() {
        let src = "SELECT 1;\n--tableresult\n# 1\n--end\n";
        let (outcome, _) = run_source(src, &RunConfig::default());
        let err = outcome.unwrap_err();
        assert_eq!(err.kind(), "IncompatibleDirective");
        assert_eq!(err.location().map(|l| l.line), Some(3));
    }

    #[test]
    fn test_verbosity_command() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let registry = CommandRegistry::standard();
        let config = RunConfig::default();
        let mut session = session_in(&dir, &config);

        let mut script = TestScript::from_source("inline.test", "--verbosity 2\n", &config, &registry);
        script.run(&mut session).expect("script should pass");
        assert_eq!(script.verbosity(), 2);

        let mut script = TestScript::from_source("inline.test", "--verbosity 9\n", &config, &registry);
        script.run(&mut session).expect("script should pass");
        assert_eq!(script.verbosity(), 3);
    }

    #[test]
    fn test_close_numbered_slot() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let registry = CommandRegistry::standard();
        let config = RunConfig::default();
        let mut session = session_in(&dir, &config);
        let src = format!(
            "--new {}\n--db 2\n--new {}\n--db 0\n--close 2\n",
            dir.path().join("a.db").display(),
            dir.path().join("b.db").display()
        );
        let mut script = TestScript::from_source("inline.test", src, &config, &registry);
        script.run(&mut session).expect("script should pass");
        assert!(session.is_open(0));
        assert!(!session.is_open(2));
        assert_eq!(session.current_slot(), 0);
        session.close_all();

        let (outcome, _) = run_source("--close 7\n", &config);
        assert!(outcome.unwrap_err().to_string().contains("illegal db number: 7"));
    }

    #[test]
    fn test_print_multi_line_input() {
        #[derive(Clone, Default)]
        struct Capture(std::rc::Rc<std::cell::RefCell<Vec<u8>>>);

        impl std::io::Write for Capture {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.borrow_mut().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let dir = TempDir::new().expect("Failed to create temp dir");
        let registry = CommandRegistry::standard();
        let config = RunConfig {
            default_db: dir.path().join("test.db").to_string_lossy().into_owned(),
            ..RunConfig::default()
        };
        let capture = Capture::default();
        let mut session = Session::new(&config, Box::new(capture.clone()));
        let src = "SELECT 1;\nSELECT 2;\n--print\n";
        let mut script = TestScript::from_source("inline.test", src, &config, &registry);
        script.run(&mut session).expect("script should pass");

        let printed = String::from_utf8_lossy(&capture.0.borrow()).into_owned();
        assert_eq!(printed, "[<unnamed>][inline.test] line 3: SELECT 1;\nSELECT 2;\n");
        assert_eq!(session.input_text(), "SELECT 1;\nSELECT 2;\n");
    }

    #[test]
    fn test_body_may_contain_unregistered_dash_lines() {
        let src = "SELECT '--x';\n--json-block\n--x\n--end\n";
        let (outcome, _) = run_source(src, &RunConfig::default());
        outcome.expect("json-block should pass");
    }

    #[test]
    fn test_incompatible_directive() {
        let (outcome, _) = run_source("SELECT 1;\n#if 0\n", &RunConfig::default());
        let err = outcome.unwrap_err();
        assert_eq!(err.kind(), "IncompatibleDirective");
        assert!(!err.is_fatal());

        let config = RunConfig {
            strict_directives: true,
            ..RunConfig::default()
        };
        assert!(run_source("--- x\n", &config).0.unwrap_err().is_fatal());
    }

    #[test]
    fn test_decode_error_location() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let registry = CommandRegistry::standard();
        let config = RunConfig::default();
        let mut session = session_in(&dir, &config);
        let mut script =
            TestScript::from_source("bad.test", b"SELECT 1;\nSELECT '\xff';\n".to_vec(), &config, &registry);
        let err = script.run(&mut session).unwrap_err();
        assert_eq!(err.kind(), "DecodeError");
        assert_eq!(err.location().map(|l| l.line), Some(2));
    }
}
