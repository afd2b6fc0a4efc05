//!
//! Execution Engine - Running Buffered SQL and Formatting Rows
//!
//! Runs a multi-statement SQL buffer against one database handle, one
//! statement at a time, and renders produced rows into the result buffer.
//!
//! Rendering:
//! - Values in a row are separated by one space
//! - With column names enabled, each value is preceded by its column name
//!   and a space
//! - NULL renders as the session's null token, never escaped
//! - Rows are joined by a space (OneLine) or each ended by LF (NewLine)
//!
//! Engine failures are appended to the result buffer as
//! `<SQLITE_CODE> {<escaped message>}` when buffering, then either raised or
//! returned as a non-fatal status.
//!

use std::borrow::Cow;

use sqltester_sqlite3::{Database, EngineError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferMode {
    /// Rows are stepped but not rendered.
    None,
    Escaped,
    AsIs,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowMode {
    OneLine,
    NewLine,
}

/// Non-raising result of `Session::exec_sql`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecStatus {
    Ok,
    Failed(EngineError),
}

impl ExecStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, ExecStatus::Ok)
    }
}

pub(crate) struct RenderOptions<'a> {
    pub buffer: BufferMode,
    pub rows: RowMode,
    pub null_value: &'a str,
    pub column_names: bool,
}

impl RenderOptions<'_> {
    pub(crate) fn silent() -> Self {
        RenderOptions {
            buffer: BufferMode::None,
            rows: RowMode::OneLine,
            null_value: "",
            column_names: false,
        }
    }

    fn render<'v>(&self, value: &'v str) -> Cow<'v, str> {
        match self.buffer {
            BufferMode::Escaped => escape(value),
            _ => Cow::Borrowed(value),
        }
    }
}

fn needs_quoting(b: u8) -> bool {
    b < 0x20 || b == b'"' || b == b'\\'
}

/// Escapes a value for comparison against script text.
///
/// - empty -> `{}`
/// - no control byte, quote, backslash or brace -> unchanged
/// - braces only -> wrapped in braces
/// - otherwise double-quoted, with `\\`, `\"` and `\NNN` octal escapes
pub fn escape(value: &str) -> Cow<'_, str> {
    if value.is_empty() {
        return Cow::Borrowed("{}");
    }
    let bytes = value.as_bytes();
    let quoting = bytes.iter().any(|&b| needs_quoting(b));
    if !quoting {
        if bytes.iter().any(|&b| b == b'{' || b == b'}') {
            return Cow::Owned(format!("{{{}}}", value));
        }
        return Cow::Borrowed(value);
    }

    let mut out = String::with_capacity(value.len() + 8);
    out.push('"');
    for ch in value.chars() {
        match ch {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\{:03o}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
    Cow::Owned(out)
}

/// `<SQLITE_CODE> <message>`, the message escaped and brace-wrapped unless
/// escaping already produced a brace form.
pub(crate) fn append_engine_error(buf: &mut String, err: &EngineError) {
    let message = escape(&err.message);
    buf.push_str(err.code_name());
    buf.push(' ');
    if message.starts_with('{') {
        buf.push_str(&message);
    } else {
        buf.push('{');
        buf.push_str(&message);
        buf.push('}');
    }
}

/// Runs every statement in `sql`, rendering rows into `out` when present.
pub(crate) fn execute(
    db: &Database,
    sql: &str,
    opts: &RenderOptions<'_>,
    mut out: Option<&mut String>,
) -> Result<(), EngineError> {
    let mut spacing = 0usize;
    let mut statements = db.statements(sql);

    while let Some(mut stmt) = statements.next_statement()? {
        let Some(buf) = out.as_mut() else {
            let mut rows = stmt.rows();
            while rows.step()?.is_some() {}
            continue;
        };

        let names = if opts.column_names {
            stmt.column_names().to_vec()
        } else {
            Vec::new()
        };
        let mut rows = stmt.rows();
        while let Some(values) = rows.step()? {
            for (idx, value) in values.iter().enumerate() {
                if spacing > 0 {
                    buf.push(' ');
                }
                spacing += 1;
                if let Some(name) = names.get(idx) {
                    buf.push_str(&opts.render(name));
                    buf.push(' ');
                }
                match value {
                    Some(text) => buf.push_str(&opts.render(text)),
                    None => buf.push_str(opts.null_value),
                }
            }
            if opts.rows == RowMode::NewLine {
                spacing = 0;
                buf.push('\n');
            }
        }
    }
    Ok(())
}
