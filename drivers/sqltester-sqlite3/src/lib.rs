///
/// sqltester SQLite3 Driver
///
/// The narrow engine interface consumed by the interpreter. Uses rusqlite
/// with bundled SQLite for zero system dependency.
///
/// Architecture:
/// - `Database` owns one connection and is owned by exactly one session slot.
/// - `Statements` walks a multi-statement SQL buffer one prepared statement
///   at a time; whitespace/comment-only remainders end the walk.
/// - `RowCursor` steps a statement and renders each column the way
///   `sqlite3_column_text` would. Dropping the cursor resets the statement,
///   dropping the `PreparedStatement` finalizes it.
/// - Errors carry the primary result code and the engine's message.
///

pub mod database;
pub mod error;
pub mod text;

pub use database::{Database, PreparedStatement, RowCursor, Statements};
pub use error::{EngineError, result_code_name};
pub use text::format_real;

/// Version string of the linked SQLite library.
pub fn engine_version() -> &'static str {
    rusqlite::version()
}
