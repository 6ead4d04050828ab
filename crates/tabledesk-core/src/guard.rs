//! Guarded execution of operator-supplied SQL.
//!
//! The guard is a textual heuristic, not a parser. It refuses `DROP` and
//! `DELETE` statements whose text has no `WHERE` anywhere in it. A `WHERE`
//! inside a string literal, an identifier or a subquery satisfies the check,
//! and statements such as `UPDATE` without a filter are not restricted.
//! Leading comments are skipped before the keyword is read.
//! Exactly one statement runs per call: text after a terminating semicolon
//! (outside quotes and comments) is rejected before anything is prepared.

use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::value::ResultSet;

/// Leading keywords that need a `WHERE` somewhere in the text.
const GUARDED_KEYWORDS: &[&str] = &["DROP", "DELETE"];

/// Outcome of an ad-hoc statement.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecOutcome {
    /// A statement that produced a result set.
    Rows(ResultSet),
    /// A statement that changed data or schema.
    Mutation {
        /// Rows changed by the statement.
        affected: usize,
    },
}

/// The text after any leading whitespace and comments.
fn skip_leading_trivia(sql: &str) -> &str {
    let mut rest = sql;
    loop {
        let trimmed = rest.trim_start();
        if let Some(after) = trimmed.strip_prefix("--") {
            rest = after.find('\n').map_or("", |end| &after[end + 1..]);
        } else if let Some(after) = trimmed.strip_prefix("/*") {
            rest = after.find("*/").map_or("", |end| &after[end + 2..]);
        } else {
            return trimmed;
        }
    }
}

/// First word of the statement, upper-cased.
fn leading_keyword(sql: &str) -> String {
    skip_leading_trivia(sql)
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// True when a semicolon outside quotes and comments is followed by more SQL.
fn has_trailing_statement(sql: &str) -> bool {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut i = 0;
    let mut terminated = false;

    while i < len {
        match bytes[i] {
            b'-' if bytes.get(i + 1) == Some(&b'-') => {
                while i < len && bytes[i] != b'\n' {
                    i += 1;
                }
            }
            b'/' if bytes.get(i + 1) == Some(&b'*') => {
                i += 2;
                while i < len && !(bytes[i] == b'*' && bytes.get(i + 1) == Some(&b'/')) {
                    i += 1;
                }
                i += 2;
            }
            b';' => {
                terminated = true;
                i += 1;
            }
            b if b.is_ascii_whitespace() => i += 1,
            quote @ (b'\'' | b'"' | b'`' | b'[') => {
                if terminated {
                    return true;
                }
                let close = if quote == b'[' { b']' } else { quote };
                i += 1;
                // Doubled quotes are escapes; scanning past them as two strings is equivalent.
                while i < len && bytes[i] != close {
                    i += 1;
                }
                i += 1;
            }
            _ => {
                if terminated {
                    return true;
                }
                i += 1;
            }
        }
    }
    false
}

/// Apply the guard policy without executing anything.
pub fn check(sql: &str) -> Result<()> {
    let sql = sql.trim();
    if skip_leading_trivia(sql).is_empty() {
        return Err(Error::EmptyCommand);
    }

    let keyword = leading_keyword(sql);
    if GUARDED_KEYWORDS.contains(&keyword.as_str()) && !sql.to_uppercase().contains("WHERE") {
        warn!(%keyword, "Rejected unguarded command");
        return Err(Error::UnsafeCommand(format!(
            "{} without WHERE is not allowed",
            keyword
        )));
    }
    if has_trailing_statement(sql) {
        warn!(%keyword, "Rejected multi-statement command");
        return Err(Error::UnsafeCommand(
            "only one statement can be executed per command".to_string(),
        ));
    }
    Ok(())
}

/// Runs ad-hoc SQL against one connection after the guard check.
pub struct GuardedExecutor<'a> {
    conn: &'a Connection,
}

impl<'a> GuardedExecutor<'a> {
    /// Create an executor bound to a connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Check and run a single statement.
    ///
    /// Statements that yield columns (every `SELECT`, plus `PRAGMA` and the like)
    /// return their full result set; anything else returns the changed-row count
    /// and is committed immediately. Schema statements report zero.
    pub fn execute(&self, sql: &str) -> Result<ExecOutcome> {
        check(sql)?;
        let sql = sql.trim();

        let mut stmt = self.conn.prepare(sql)?;
        if stmt.column_count() > 0 {
            let result = ResultSet::collect(&mut stmt, [])?;
            info!(rows = result.len(), columns = result.columns.len(), "Ad-hoc query completed");
            return Ok(ExecOutcome::Rows(result));
        }

        let before = self.conn.total_changes();
        let changed = stmt.execute([])?;
        // sqlite3_changes() keeps the last DML count across DDL statements.
        let affected = if self.conn.total_changes() == before { 0 } else { changed };
        info!(affected, keyword = %leading_keyword(sql), "Ad-hoc command completed");
        Ok(ExecOutcome::Mutation { affected })
    }
}
