//! Bulk export and import between tables and tabular buffers.
//!
//! Import is not atomic: rows are inserted one statement at a time in buffer
//! order, and a failure leaves every earlier row committed. The error reports
//! how far the import got.

use std::collections::HashSet;

use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

use crate::catalog::Introspector;
use crate::error::{Error, Result};
use crate::query;
use crate::validate::Assignment;
use crate::value::Value;

/// Header plus rows, the interchange shape for one transfer.
#[derive(Debug, Clone, PartialEq)]
pub struct TabularBuffer {
    sheet_name: String,
    header: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl TabularBuffer {
    /// Create a buffer. Rows shorter than the header read as null in the
    /// missing cells; extra cells are ignored.
    pub fn new(sheet_name: impl Into<String>, header: Vec<String>, rows: Vec<Vec<Value>>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
            header,
            rows,
        }
    }

    /// Name of the sheet the buffer came from or will be written to.
    pub fn sheet_name(&self) -> &str {
        &self.sheet_name
    }

    /// Column names.
    pub fn header(&self) -> &[String] {
        &self.header
    }

    /// Data rows.
    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    /// Number of data rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Check if there are no data rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell at `row`, `column`, or null when the row is short.
    pub fn cell(&self, row: usize, column: usize) -> &Value {
        const NULL: &Value = &Value::Null;
        self.rows
            .get(row)
            .and_then(|cells| cells.get(column))
            .unwrap_or(NULL)
    }
}

/// Result of a completed import.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    /// Rows inserted.
    pub inserted: usize,
}

/// Export and import bound to one connection.
pub struct Transfer<'a> {
    conn: &'a Connection,
}

impl<'a> Transfer<'a> {
    /// Create a transfer engine bound to a connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Read every row of a table or view into a buffer.
    ///
    /// An object with no rows is an error rather than an empty sheet.
    pub fn export(&self, object: &str) -> Result<TabularBuffer> {
        let object = Introspector::new(self.conn).resolve_object(object)?;
        let result = query::select_all(&object).query(self.conn)?;
        if result.is_empty() {
            return Err(Error::EmptyResult(object.name().to_string()));
        }

        info!(object = object.name(), rows = result.len(), "Exported object");
        Ok(TabularBuffer::new(object.name(), result.columns, result.rows))
    }

    /// Append the buffer's rows to a table, reconciling columns by name.
    pub fn import(&self, table: &str, buffer: &TabularBuffer) -> Result<ImportReport> {
        if buffer.is_empty() {
            return Err(Error::EmptyInput);
        }

        let schema = Introspector::new(self.conn).table_schema(table)?;

        let mut seen = HashSet::new();
        let mut mismatched = Vec::new();
        let mut columns = Vec::with_capacity(buffer.header().len());
        for name in buffer.header() {
            match schema.column(name) {
                Some(column) if seen.insert(column.name()) => columns.push(column),
                Some(_) => mismatched.push(format!("{} (duplicate)", name)),
                None if name.trim().is_empty() => mismatched.push("(blank header)".to_string()),
                None => mismatched.push(name.clone()),
            }
        }
        if !mismatched.is_empty() {
            return Err(Error::ColumnMismatch {
                table: schema.name().to_string(),
                columns: mismatched,
            });
        }

        for index in 0..buffer.len() {
            let assignments: Vec<Assignment<'_>> = columns
                .iter()
                .copied()
                .enumerate()
                .map(|(i, column)| Assignment {
                    column,
                    value: buffer.cell(index, i).clone().normalized(),
                })
                .collect();

            if let Err(err) = query::insert(&schema, &assignments).execute(self.conn) {
                warn!(table, inserted = index, failed_row = index + 1, error = %err, "Import stopped");
                return Err(Error::PartialImport {
                    inserted: index,
                    failed_row: index + 1,
                    reason: err.to_string(),
                });
            }
        }

        info!(table, inserted = buffer.len(), "Imported rows");
        Ok(ImportReport {
            inserted: buffer.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE item (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                qty INTEGER DEFAULT 1,
                note TEXT
            );
            "#,
        )
        .unwrap();
        conn
    }

    fn header(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn count(conn: &Connection) -> i64 {
        conn.query_row("SELECT COUNT(*) FROM item", [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn test_export_empty_table_fails() {
        let conn = setup();
        assert!(matches!(
            Transfer::new(&conn).export("item"),
            Err(Error::EmptyResult(_))
        ));
    }

    #[test]
    fn test_export_keeps_result_order() {
        let conn = setup();
        conn.execute_batch("INSERT INTO item (name, note) VALUES ('a', NULL), ('b', 'x');")
            .unwrap();
        let buffer = Transfer::new(&conn).export("item").unwrap();
        assert_eq!(buffer.header(), header(&["id", "name", "qty", "note"]).as_slice());
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.cell(1, 3), &Value::from("x"));
        assert_eq!(buffer.cell(0, 3), &Value::Null);
    }

    #[test]
    fn test_import_empty_buffer() {
        let conn = setup();
        let buffer = TabularBuffer::new("item", header(&["name"]), vec![]);
        assert!(matches!(
            Transfer::new(&conn).import("item", &buffer),
            Err(Error::EmptyInput)
        ));
    }

    #[test]
    fn test_import_unknown_column() {
        let conn = setup();
        let buffer = TabularBuffer::new(
            "item",
            header(&["name", "colour"]),
            vec![vec![Value::from("a"), Value::from("red")]],
        );
        match Transfer::new(&conn).import("item", &buffer) {
            Err(Error::ColumnMismatch { columns, .. }) => assert_eq!(columns, vec!["colour"]),
            other => panic!("expected column mismatch, got {:?}", other),
        }
        assert_eq!(count(&conn), 0);
    }

    #[test]
    fn test_import_duplicate_header() {
        let conn = setup();
        let buffer = TabularBuffer::new(
            "item",
            header(&["name", "name"]),
            vec![vec![Value::from("a"), Value::from("b")]],
        );
        assert!(matches!(
            Transfer::new(&conn).import("item", &buffer),
            Err(Error::ColumnMismatch { .. })
        ));
    }

    #[test]
    fn test_import_headers_ignore_case() {
        let conn = setup();
        let buffer = TabularBuffer::new(
            "item",
            header(&["Name", "QTY"]),
            vec![vec![Value::from("bolt"), Value::Integer(4)]],
        );
        assert_eq!(Transfer::new(&conn).import("item", &buffer).unwrap().inserted, 1);
        let (name, qty): (String, i64) = conn
            .query_row("SELECT name, qty FROM item", [], |r| Ok((r.get(0)?, r.get(1)?)))
            .unwrap();
        assert_eq!((name.as_str(), qty), ("bolt", 4));

        let clashing = TabularBuffer::new(
            "item",
            header(&["name", "NAME"]),
            vec![vec![Value::from("a"), Value::from("b")]],
        );
        match Transfer::new(&conn).import("item", &clashing) {
            Err(Error::ColumnMismatch { columns, .. }) => {
                assert_eq!(columns, vec!["NAME (duplicate)"])
            }
            other => panic!("expected column mismatch, got {:?}", other),
        }
    }

    #[test]
    fn test_import_subset_uses_defaults() {
        let conn = setup();
        let buffer = TabularBuffer::new(
            "item",
            header(&["note", "name"]),
            vec![
                vec![Value::from(""), Value::from("first")],
                vec![Value::from("n"), Value::from("second")],
            ],
        );
        let report = Transfer::new(&conn).import("item", &buffer).unwrap();
        assert_eq!(report.inserted, 2);

        let (qty, note): (i64, Option<String>) = conn
            .query_row("SELECT qty, note FROM item WHERE name = 'first'", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(qty, 1);
        assert_eq!(note, None);
    }

    #[test]
    fn test_import_stops_at_failing_row() {
        let conn = setup();
        let buffer = TabularBuffer::new(
            "item",
            header(&["name"]),
            vec![
                vec![Value::from("ok")],
                vec![Value::from("fine")],
                vec![Value::Null],
                vec![Value::from("never")],
            ],
        );
        match Transfer::new(&conn).import("item", &buffer) {
            Err(Error::PartialImport {
                inserted,
                failed_row,
                reason,
            }) => {
                assert_eq!(inserted, 2);
                assert_eq!(failed_row, 3);
                assert!(reason.contains("NOT NULL"));
            }
            other => panic!("expected partial import, got {:?}", other),
        }
        assert_eq!(count(&conn), 2);
    }

    #[test]
    fn test_import_into_unknown_table() {
        let conn = setup();
        let buffer = TabularBuffer::new("x", header(&["a"]), vec![vec![Value::Integer(1)]]);
        assert!(matches!(
            Transfer::new(&conn).import("missing", &buffer),
            Err(Error::TableNotFound(_))
        ));
    }
}
