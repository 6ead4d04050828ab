//! Dynamic statement construction.
//!
//! Identifiers only come from catalog handles and are always quoted; values are
//! always bound parameters. Nothing in a row payload can change the shape of a
//! statement.

use rusqlite::{params_from_iter, Connection};
use serde::Deserialize;
use tracing::debug;

use crate::catalog::{CatalogObject, TableSchema};
use crate::error::ValidationError;
use crate::validate::Assignment;
use crate::value::{ResultSet, Row, Value};

/// Implicit row identifier for tables without a declared primary key.
const ROWID: &str = "rowid";

/// Quote an identifier for embedding in SQL text.
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Identifies one row of a table.
///
/// A bare scalar addresses single-column keys (and `rowid`); an object names
/// every column of a composite key.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum RowKey {
    /// Column-to-value mapping for each key column.
    Composite(Row),
    /// Value of the only key column.
    Single(Value),
}

impl From<i64> for RowKey {
    fn from(id: i64) -> Self {
        RowKey::Single(Value::Integer(id))
    }
}

/// A parameterized SQL statement.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    sql: String,
    params: Vec<Value>,
}

impl Statement {
    /// SQL text with `?` placeholders.
    pub fn sql(&self) -> &str {
        &self.sql
    }

    /// Bound values in placeholder order.
    pub fn params(&self) -> &[Value] {
        &self.params
    }

    /// Run as a mutation and return the number of changed rows.
    pub fn execute(&self, conn: &Connection) -> rusqlite::Result<usize> {
        debug!(sql = %self.sql, params = self.params.len(), "Executing statement");
        conn.execute(&self.sql, params_from_iter(self.params.iter()))
    }

    /// Run as a query and collect the result set.
    pub fn query(&self, conn: &Connection) -> rusqlite::Result<ResultSet> {
        debug!(sql = %self.sql, params = self.params.len(), "Running query");
        let mut stmt = conn.prepare(&self.sql)?;
        ResultSet::collect(&mut stmt, params_from_iter(self.params.iter()))
    }
}

/// `SELECT *` over a table or view.
pub fn select_all(object: &CatalogObject) -> Statement {
    Statement {
        sql: format!("SELECT * FROM {}", quote_ident(object.name())),
        params: Vec::new(),
    }
}

/// `INSERT` of the given assignments, or `DEFAULT VALUES` when there are none.
pub fn insert(table: &TableSchema, assignments: &[Assignment<'_>]) -> Statement {
    let target = quote_ident(table.name());
    if assignments.is_empty() {
        return Statement {
            sql: format!("INSERT INTO {} DEFAULT VALUES", target),
            params: Vec::new(),
        };
    }

    let columns: Vec<String> = assignments
        .iter()
        .map(|a| quote_ident(a.column.name()))
        .collect();
    let placeholders = vec!["?"; assignments.len()].join(", ");

    Statement {
        sql: format!(
            "INSERT INTO {} ({}) VALUES ({})",
            target,
            columns.join(", "),
            placeholders
        ),
        params: assignments.iter().map(|a| a.value.clone()).collect(),
    }
}

/// `UPDATE ... SET ... WHERE <key>`.
pub fn update_by_key(
    table: &TableSchema,
    assignments: &[Assignment<'_>],
    key: &RowKey,
) -> Result<Statement, ValidationError> {
    if assignments.is_empty() {
        return Err(ValidationError::NoChanges);
    }
    let (predicate, key_params) = key_predicate(table, key)?;

    let set_list: Vec<String> = assignments
        .iter()
        .map(|a| format!("{} = ?", quote_ident(a.column.name())))
        .collect();
    let mut params: Vec<Value> = assignments.iter().map(|a| a.value.clone()).collect();
    params.extend(key_params);

    Ok(Statement {
        sql: format!(
            "UPDATE {} SET {} WHERE {}",
            quote_ident(table.name()),
            set_list.join(", "),
            predicate
        ),
        params,
    })
}

/// `DELETE ... WHERE <key>`.
pub fn delete_by_key(table: &TableSchema, key: &RowKey) -> Result<Statement, ValidationError> {
    let (predicate, params) = key_predicate(table, key)?;
    Ok(Statement {
        sql: format!("DELETE FROM {} WHERE {}", quote_ident(table.name()), predicate),
        params,
    })
}

/// Build the WHERE clause that addresses exactly one row.
fn key_predicate(
    table: &TableSchema,
    key: &RowKey,
) -> Result<(String, Vec<Value>), ValidationError> {
    let key_columns: Vec<&str> = {
        let declared = table.key_columns();
        if declared.is_empty() {
            vec![ROWID]
        } else {
            declared.into_iter().map(|c| c.name()).collect()
        }
    };

    let values: Vec<Value> = match key {
        RowKey::Single(value) if key_columns.len() == 1 => vec![value.clone()],
        RowKey::Single(_) => {
            return Err(ValidationError::InvalidRowKey(format!(
                "'{}' has a composite key ({}); supply an object",
                table.name(),
                key_columns.join(", ")
            )))
        }
        RowKey::Composite(row) => {
            if let Some(extra) = row
                .columns()
                .find(|c| !key_columns.iter().any(|k| k.eq_ignore_ascii_case(c)))
            {
                return Err(ValidationError::InvalidRowKey(format!(
                    "'{}' is not a key column of '{}'",
                    extra,
                    table.name()
                )));
            }
            key_columns
                .iter()
                .map(|name| {
                    row.lookup(name).cloned().ok_or_else(|| {
                        ValidationError::InvalidRowKey(format!("missing key column '{}'", name))
                    })
                })
                .collect::<Result<_, _>>()?
        }
    };

    if values.iter().any(Value::is_empty) {
        return Err(ValidationError::InvalidRowKey(
            "key values cannot be empty".to_string(),
        ));
    }

    let predicate = key_columns
        .iter()
        .map(|name| format!("{} = ?", quote_ident(name)))
        .collect::<Vec<_>>()
        .join(" AND ");
    Ok((predicate, values))
}
