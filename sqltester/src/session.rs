///
/// Session - Mutable State Shared by All Commands of a Script
///
/// Holds the database-handle slots, the input buffer (pending SQL), the
/// result buffer (rendered output), the db-init SQL replayed on every new
/// handle, display settings, test counters and the output sink.
///
/// Exactly one slot is current at any time. The input and result buffers
/// are consumed with take-and-clear by the command that reads them.
///

use std::fmt;
use std::io::Write;

use sqltester_sqlite3::Database;
use tracing::{debug, trace};

use crate::config::RunConfig;
use crate::error::TesterError;
use crate::exec::{self, BufferMode, ExecStatus, RenderOptions, RowMode};

pub const MAX_DB_HANDLES: usize = 7;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TestCounters {
    pub file: usize,
    pub total: usize,
}

pub struct Session {
    handles: [Option<Database>; MAX_DB_HANDLES],
    current: usize,
    input: String,
    result: String,
    db_init_sql: String,
    null_value: String,
    default_null: String,
    emit_column_names: bool,
    default_db: String,
    counters: TestCounters,
    output: Box<dyn Write>,
}

impl Session {
    pub fn new(config: &RunConfig, output: Box<dyn Write>) -> Self {
        Self {
            handles: std::array::from_fn(|_| None),
            current: 0,
            input: String::new(),
            result: String::new(),
            db_init_sql: String::new(),
            null_value: config.null_value.clone(),
            default_null: config.null_value.clone(),
            emit_column_names: false,
            default_db: config.default_db.clone(),
            counters: TestCounters::default(),
            output,
        }
    }

    /// Per-file reset. Only the run-wide test total survives.
    pub fn reset(&mut self) {
        self.clear_input();
        self.clear_result();
        self.db_init_sql.clear();
        self.close_all();
        self.counters.file = 0;
        self.null_value = self.default_null.clone();
        self.emit_column_names = false;
        self.current = 0;
    }

    pub fn append_input(&mut self, line: &str) {
        self.input.push_str(line);
        self.input.push('\n');
    }

    pub fn input_text(&self) -> &str {
        &self.input
    }

    pub fn take_input(&mut self) -> String {
        std::mem::take(&mut self.input)
    }

    pub fn clear_input(&mut self) {
        self.input.clear();
    }

    pub fn result_text(&self) -> &str {
        &self.result
    }

    pub fn take_result(&mut self) -> String {
        std::mem::take(&mut self.result)
    }

    pub fn clear_result(&mut self) {
        self.result.clear();
    }

    pub fn null_value(&self) -> &str {
        &self.null_value
    }

    pub fn set_null_value(&mut self, token: &str) {
        self.null_value = token.to_string();
    }

    pub fn set_column_names(&mut self, enabled: bool) {
        self.emit_column_names = enabled;
    }

    pub fn column_names(&self) -> bool {
        self.emit_column_names
    }

    pub fn current_slot(&self) -> usize {
        self.current
    }

    pub fn select_slot(&mut self, slot: usize) {
        debug_assert!(slot < MAX_DB_HANDLES);
        self.current = slot;
    }

    pub fn is_open(&self, slot: usize) -> bool {
        self.handles.get(slot).is_some_and(Option::is_some)
    }

    pub fn close_slot(&mut self, slot: usize) {
        if let Some(db) = self.handles.get_mut(slot).and_then(Option::take) {
            db.close();
        }
    }

    pub fn close_current(&mut self) {
        self.close_slot(self.current);
    }

    pub fn close_all(&mut self) {
        for slot in 0..MAX_DB_HANDLES {
            self.close_slot(slot);
        }
    }

    /// Opens `path` in `slot`, making it current. Whatever occupied the slot
    /// is closed first and the db-init SQL is replayed on the new handle.
    pub fn open_slot(&mut self, slot: usize, path: &str, create: bool) -> Result<(), TesterError> {
        self.close_slot(slot);
        self.current = slot;
        let db = Database::open(path, create)?;
        if !self.db_init_sql.is_empty() {
            if let Err(err) = exec::execute(&db, &self.db_init_sql, &RenderOptions::silent(), None) {
                db.close();
                return Err(err.into());
            }
        }
        self.handles[slot] = Some(db);
        Ok(())
    }

    pub fn open_current(&mut self, path: &str, create: bool) -> Result<(), TesterError> {
        self.open_slot(self.current, path, create)
    }

    fn open_default_db(&mut self) -> Result<(), TesterError> {
        let path = self.default_db.clone();
        self.remove_default_db();
        debug!(path = %path, "lazily opening default database");
        self.open_slot(0, &path, true)
    }

    pub fn remove_default_db(&self) {
        if std::fs::remove_file(&self.default_db).is_ok() {
            trace!(path = %self.default_db, "removed default database");
        }
    }

    pub fn db_init_sql(&self) -> &str {
        &self.db_init_sql
    }

    /// Adds bootstrap SQL for later handles and runs it on the current one.
    pub fn append_db_init_sql(&mut self, sql: &str) -> Result<(), TesterError> {
        self.db_init_sql.push_str(sql);
        self.db_init_sql.push('\n');
        if let Some(db) = &self.handles[self.current] {
            exec::execute(db, sql, &RenderOptions::silent(), None)?;
        }
        Ok(())
    }

    pub fn increment_test_counter(&mut self) {
        self.counters.file += 1;
        self.counters.total += 1;
    }

    pub fn counters(&self) -> TestCounters {
        self.counters
    }

    pub fn write_output(&mut self, args: fmt::Arguments<'_>) -> Result<(), TesterError> {
        self.output.write_fmt(args).map_err(TesterError::Output)
    }

    pub fn flush_output(&mut self) -> Result<(), TesterError> {
        self.output.flush().map_err(TesterError::Output)
    }

    fn resolve_slot(&mut self, slot: Option<usize>) -> Result<usize, TesterError> {
        let target = slot.unwrap_or(self.current);
        if !self.is_open(target) && !self.is_open(0) {
            self.open_default_db()?;
            if slot.is_none() {
                return Ok(self.current);
            }
        }
        Ok(target)
    }

    /// Runs `sql` on `slot` (or the current slot) and renders into the
    /// result buffer per `buffer`.
    ///
    /// Engine errors are appended to the result buffer when buffering. With
    /// `throw_on_error` they are raised; otherwise they come back as
    /// `ExecStatus::Failed`.
    pub fn exec_sql(
        &mut self,
        slot: Option<usize>,
        throw_on_error: bool,
        buffer: BufferMode,
        rows: RowMode,
        sql: &str,
    ) -> Result<ExecStatus, TesterError> {
        let slot = self.resolve_slot(slot)?;
        let Some(db) = self.handles[slot].as_ref() else {
            return Err(TesterError::NoDatabase { slot });
        };
        let opts = RenderOptions {
            buffer,
            rows,
            null_value: &self.null_value,
            column_names: self.emit_column_names,
        };
        let buffering = buffer != BufferMode::None;
        let out = buffering.then_some(&mut self.result);

        match exec::execute(db, sql, &opts, out) {
            Ok(()) => Ok(ExecStatus::Ok),
            Err(err) => {
                if buffering {
                    exec::append_engine_error(&mut self.result, &err);
                }
                if throw_on_error {
                    Err(err.into())
                } else {
                    Ok(ExecStatus::Failed(err))
                }
            }
        }
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn session_in(dir: &TempDir) -> Session {
        let config = RunConfig {
            default_db: dir.path().join("test.db").to_string_lossy().into_owned(),
            ..RunConfig::default()
        };
        Session::new(&config, Box::new(std::io::sink()))
    }

    #[test]
    fn test_lazy_default_database() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut session = session_in(&dir);
        assert!(!session.is_open(0));

        session.select_slot(3);
        let status = session
            .exec_sql(None, true, BufferMode::Escaped, RowMode::OneLine, "SELECT 1, 2")
            .expect("exec");
        assert!(status.is_ok());
        assert!(session.is_open(0));
        assert_eq!(session.current_slot(), 0);
        assert_eq!(session.take_result(), "1 2");
        assert!(dir.path().join("test.db").exists());

        session.remove_default_db();
        session.close_all();
    }

    #[test]
    fn test_non_fatal_error_is_buffered() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut session = session_in(&dir);
        let status = session
            .exec_sql(None, false, BufferMode::Escaped, RowMode::OneLine, "SELECT * FROM nope")
            .expect("non-fatal");
        match status {
            ExecStatus::Failed(err) => assert_eq!(err.code_name(), "SQLITE_ERROR"),
            ExecStatus::Ok => panic!("expected failure"),
        }
        assert_eq!(session.take_result(), "SQLITE_ERROR {no such table: nope}");
    }

    #[test]
    fn test_fatal_error_is_raised() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut session = session_in(&dir);
        let err = session
            .exec_sql(None, true, BufferMode::None, RowMode::OneLine, "SELEC 1")
            .unwrap_err();
        assert!(matches!(err, TesterError::Db(_)));
        assert!(session.result_text().is_empty());
    }

    #[test]
    fn test_explicit_empty_slot() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut session = session_in(&dir);
        session
            .exec_sql(None, true, BufferMode::None, RowMode::OneLine, "SELECT 1")
            .expect("default db");
        let err = session
            .exec_sql(Some(4), true, BufferMode::None, RowMode::OneLine, "SELECT 1")
            .unwrap_err();
        assert!(matches!(err, TesterError::NoDatabase { slot: 4 }));
    }

    #[test]
    fn test_db_init_sql_replayed_on_open() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut session = session_in(&dir);
        session
            .append_db_init_sql("pragma recursive_triggers=on;")
            .expect("append");
        let path = dir.path().join("other.db");
        session
            .open_slot(2, &path.to_string_lossy(), true)
            .expect("open");
        assert_eq!(session.current_slot(), 2);
        session
            .exec_sql(None, true, BufferMode::Escaped, RowMode::OneLine, "pragma recursive_triggers")
            .expect("exec");
        assert_eq!(session.take_result(), "1");
    }

    #[test]
    fn test_reset() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut session = session_in(&dir);
        session.append_input("SELECT 1;");
        session.set_null_value("NULL");
        session.set_column_names(true);
        session.increment_test_counter();
        session.append_db_init_sql("pragma temp_store=0;").expect("append");
        let path = dir.path().join("x.db");
        session.open_slot(5, &path.to_string_lossy(), true).expect("open");

        session.reset();
        assert!(session.input_text().is_empty());
        assert!(session.db_init_sql().is_empty());
        assert_eq!(session.null_value(), "nil");
        assert!(!session.column_names());
        assert_eq!(session.current_slot(), 0);
        assert!(!session.is_open(5));
        assert_eq!(session.counters(), TestCounters { file: 0, total: 1 });
    }

    #[test]
    fn test_take_clears_buffers() {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut session = session_in(&dir);
        session.append_input("SELECT 1;");
        session.append_input("SELECT 2;");
        assert_eq!(session.take_input(), "SELECT 1;\nSELECT 2;\n");
        assert!(session.input_text().is_empty());
    }
}
