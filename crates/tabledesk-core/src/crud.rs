//! Generic row operations over any table.
//!
//! Each call re-reads the catalog, validates the payload against the live
//! column set, builds the statement and runs it on the caller's connection.

use rusqlite::Connection;
use tracing::info;

use crate::catalog::Introspector;
use crate::error::{Error, Result};
use crate::query::{self, RowKey};
use crate::validate::{validate_for_insert, validate_for_update};
use crate::value::{ResultSet, Row};

/// Row-level CRUD bound to one connection.
pub struct RowEditor<'a> {
    conn: &'a Connection,
}

impl<'a> RowEditor<'a> {
    /// Create an editor bound to a connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Every row of a table or view.
    pub fn fetch_all(&self, object: &str) -> Result<ResultSet> {
        let object = Introspector::new(self.conn).resolve_object(object)?;
        Ok(query::select_all(&object).query(self.conn)?)
    }

    /// Insert a row and return its rowid.
    pub fn insert(&self, table: &str, payload: &Row) -> Result<i64> {
        let schema = Introspector::new(self.conn).table_schema(table)?;
        let assignments = validate_for_insert(schema.columns(), payload)?;
        query::insert(&schema, &assignments).execute(self.conn)?;

        let rowid = self.conn.last_insert_rowid();
        info!(table, rowid, columns = assignments.len(), "Inserted row");
        Ok(rowid)
    }

    /// Update the row addressed by `key` with the payload's updatable columns.
    pub fn update(&self, table: &str, key: &RowKey, payload: &Row) -> Result<usize> {
        let schema = Introspector::new(self.conn).table_schema(table)?;
        let assignments = validate_for_update(schema.columns(), payload)?;
        let affected = query::update_by_key(&schema, &assignments, key)?.execute(self.conn)?;
        if affected == 0 {
            return Err(Error::RowNotFound(table.to_string()));
        }

        info!(table, affected, columns = assignments.len(), "Updated row");
        Ok(affected)
    }

    /// Delete the row addressed by `key`.
    pub fn delete(&self, table: &str, key: &RowKey) -> Result<usize> {
        let schema = Introspector::new(self.conn).table_schema(table)?;
        let affected = query::delete_by_key(&schema, key)?.execute(self.conn)?;
        if affected == 0 {
            return Err(Error::RowNotFound(table.to_string()));
        }

        info!(table, affected, "Deleted row");
        Ok(affected)
    }
}
