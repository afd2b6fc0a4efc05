///
/// Script Runner
///
/// Drives a list of script files end to end. The session is reset before
/// every file; only the run-wide test total survives between files.
///
/// A script that fails is reported (kind, message, source diagnostic) and
/// counted as aborted. The run then stops if the error is fatal and
/// keep-going is off, otherwise it moves on to the next file.
///

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::command::CommandRegistry;
use crate::config::RunConfig;
use crate::diagnostic::DiagnosticReporter;
use crate::error::TesterError;
use crate::script::TestScript;
use crate::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptState {
    NotStarted,
    Running,
    FinishedOk,
    FinishedAborted,
}

#[derive(Debug, Clone)]
pub struct ScriptReport {
    pub path: PathBuf,
    pub state: ScriptState,
    pub tests: usize,
    pub elapsed: Duration,
    /// Kind and message of the error that aborted the script.
    pub failure: Option<(&'static str, String)>,
}

impl ScriptReport {
    fn new(path: &Path) -> Self {
        Self {
            path: path.to_path_buf(),
            state: ScriptState::NotStarted,
            tests: 0,
            elapsed: Duration::ZERO,
            failure: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunTotals {
    pub files: usize,
    pub tests: usize,
    pub aborted: usize,
}

pub struct Runner {
    config: RunConfig,
    registry: CommandRegistry,
    session: Session,
    scripts: Vec<PathBuf>,
    reports: Vec<ScriptReport>,
    totals: RunTotals,
    elapsed: Duration,
}

impl Runner {
    pub fn new(config: RunConfig, output: Box<dyn Write>) -> Self {
        let session = Session::new(&config, output);
        Self {
            config,
            registry: CommandRegistry::standard(),
            session,
            scripts: Vec::new(),
            reports: Vec::new(),
            totals: RunTotals::default(),
            elapsed: Duration::ZERO,
        }
    }

    pub fn add_script(&mut self, path: impl Into<PathBuf>) {
        self.scripts.push(path.into());
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn registry(&self) -> &CommandRegistry {
        &self.registry
    }

    pub fn totals(&self) -> RunTotals {
        self.totals
    }

    pub fn reports(&self) -> &[ScriptReport] {
        &self.reports
    }

    /// Runs every added script. `Err` means the run was terminated early by
    /// a fatal script error; totals stay readable either way.
    pub fn run(&mut self) -> Result<(), TesterError> {
        let started = Instant::now();
        let scripts = std::mem::take(&mut self.scripts);
        let outcome = self.run_scripts(&scripts);
        self.scripts = scripts;

        self.session.close_all();
        self.session.remove_default_db();
        self.elapsed = started.elapsed();
        info!(
            files = self.totals.files,
            tests = self.totals.tests,
            aborted = self.totals.aborted,
            "run finished"
        );
        self.say(format_args!(
            "Total run-time: {}ms\n",
            self.elapsed.as_millis()
        ))?;
        self.session.flush_output()?;
        outcome
    }

    fn run_scripts(&mut self, scripts: &[PathBuf]) -> Result<(), TesterError> {
        for path in scripts {
            let mut report = ScriptReport::new(path);
            self.session.reset();
            self.totals.files += 1;
            report.state = ScriptState::Running;
            info!(path = %path.display(), "starting script");
            self.say(format_args!("starting [{}]\n", path.display()))?;

            let started = Instant::now();
            let outcome = self.run_one(path);
            report.elapsed = started.elapsed();
            report.tests = self.session.counters().file;
            self.totals.tests = self.session.counters().total;

            let terminate = match outcome {
                Ok(()) => {
                    report.state = ScriptState::FinishedOk;
                    None
                }
                Err(err) => {
                    report.state = ScriptState::FinishedAborted;
                    report.failure = Some((err.kind(), err.to_string()));
                    self.totals.aborted += 1;
                    warn!(path = %path.display(), kind = err.kind(), "script aborted: {}", err);
                    self.say(format_args!("EXCEPTION: {}: {}\n", err.kind(), err))?;
                    if self.config.keep_going {
                        self.say(format_args!(
                            "Continuing anyway because of the keep-going option.\n"
                        ))?;
                        None
                    } else if err.is_fatal() {
                        Some(err)
                    } else {
                        None
                    }
                }
            };

            let verdict = if report.state == ScriptState::FinishedOk {
                "ok"
            } else {
                "FAILED"
            };
            self.say(format_args!(
                "finished [{}]: {} {} test(s) in {}ms\n",
                path.display(),
                verdict,
                report.tests,
                report.elapsed.as_millis()
            ))?;
            self.reports.push(report);

            if let Some(err) = terminate {
                return Err(err);
            }
        }
        Ok(())
    }

    fn run_one(&mut self, path: &Path) -> Result<(), TesterError> {
        let mut script = TestScript::from_file(path, &self.config, &self.registry)?;
        let outcome = script.run(&mut self.session);
        if let Err(err) = &outcome {
            DiagnosticReporter::new(&script).report(err);
        }
        outcome
    }

    /// Writes the run totals, as printed at the end of every run.
    pub fn write_summary(&mut self) -> Result<(), TesterError> {
        let totals = self.totals;
        self.say(format_args!(
            "Processed {} test(s) in {} file(s).\n",
            totals.tests, totals.files
        ))?;
        if totals.aborted > 0 {
            self.say(format_args!("Aborted {} script(s).\n", totals.aborted))?;
        }
        self.session.flush_output()
    }

    /// Writes the command table, engine version and effective configuration.
    pub fn write_internals(&mut self) -> Result<(), TesterError> {
        let mut text = String::from("Registered commands:\n");
        for (name, command) in self.registry.iter() {
            text.push_str(&format!("  --{:<14} args: {}\n", name, command.arity()));
        }
        text.push_str(&format!(
            "SQL engine: SQLite {}\n",
            sqltester_sqlite3::engine_version()
        ));
        text.push_str("Configuration:\n");
        let config = toml::to_string(&self.config).unwrap_or_else(|e| format!("<{}>\n", e));
        for line in config.lines() {
            text.push_str("  ");
            text.push_str(line);
            text.push('\n');
        }
        self.say(format_args!("{}", text))?;
        self.session.flush_output()
    }

    fn say(&mut self, args: fmt::Arguments<'_>) -> Result<(), TesterError> {
        self.session.write_output(args)
    }
}
