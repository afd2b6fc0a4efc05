///
/// Connection, statement and row-cursor handles.
///
/// Statements borrow their connection and rows borrow their statement, so
/// the borrow checker enforces reset-before-finalize-before-close.
///

use rusqlite::{Batch, Connection, OpenFlags, Rows, Statement};
use tracing::{debug, warn};

use crate::error::EngineError;
use crate::text::value_text;

pub struct Database {
    conn: Connection,
    path: String,
}

impl Database {
    /// Opens `path` read-write. Without `create` a missing file is an error.
    pub fn open(path: &str, create: bool) -> Result<Self, EngineError> {
        let mut flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_URI
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        if create {
            flags |= OpenFlags::SQLITE_OPEN_CREATE;
        }
        let conn = Connection::open_with_flags(path, flags)?;
        debug!(path, create, "opened database");
        Ok(Self {
            conn,
            path: path.to_string(),
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// Walks `sql` one statement at a time.
    pub fn statements<'conn, 'sql>(&'conn self, sql: &'sql str) -> Statements<'conn, 'sql> {
        Statements {
            batch: Batch::new(&self.conn, sql),
        }
    }

    pub fn close(self) {
        let path = self.path;
        match self.conn.close() {
            Ok(()) => debug!(path = %path, "closed database"),
            Err((_, err)) => warn!(path = %path, error = %err, "failed to close database cleanly"),
        }
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").field("path", &self.path).finish()
    }
}

pub struct Statements<'conn, 'sql> {
    batch: Batch<'conn, 'sql>,
}

impl<'conn> Statements<'conn, '_> {
    /// Prepares the next statement. `None` once the remaining text holds
    /// nothing but whitespace and comments.
    pub fn next_statement(&mut self) -> Result<Option<PreparedStatement<'conn>>, EngineError> {
        Ok(self.batch.next()?.map(PreparedStatement::new))
    }
}

pub struct PreparedStatement<'conn> {
    stmt: Statement<'conn>,
    columns: Vec<String>,
}

impl<'conn> PreparedStatement<'conn> {
    fn new(stmt: Statement<'conn>) -> Self {
        let columns = (0..stmt.column_count())
            .map(|i| stmt.column_name(i).unwrap_or("").to_string())
            .collect();
        Self { stmt, columns }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn column_name(&self, idx: usize) -> Option<&str> {
        self.columns.get(idx).map(String::as_str)
    }

    pub fn column_names(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&mut self) -> RowCursor<'_> {
        RowCursor {
            rows: self.stmt.raw_query(),
            width: self.columns.len(),
        }
    }
}

pub struct RowCursor<'stmt> {
    rows: Rows<'stmt>,
    width: usize,
}

impl RowCursor<'_> {
    /// Steps once. NULL columns come back as `None`.
    pub fn step(&mut self) -> Result<Option<Vec<Option<String>>>, EngineError> {
        let Some(row) = self.rows.next()? else {
            return Ok(None);
        };
        let mut values = Vec::with_capacity(self.width);
        for idx in 0..self.width {
            values.push(value_text(row.get_ref(idx)?));
        }
        Ok(Some(values))
    }
}
