//! Alias groups: alternate names mapped onto a canonical group id.
//!
//! The alias table is an ordinary user table resolved through the catalog, so
//! its name and columns are configuration rather than code.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::info;

use crate::catalog::{ColumnDescriptor, Introspector, TableSchema};
use crate::error::{Error, Result, ValidationError};
use crate::query;
use crate::suggest::Candidate;
use crate::validate::Assignment;
use crate::value::Value;

fn quote(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Where aliases live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AliasTable {
    /// Table name.
    pub table: String,
    /// Integer column holding the group id.
    pub group_column: String,
    /// Text column holding the alias.
    pub alias_column: String,
}

impl Default for AliasTable {
    fn default() -> Self {
        Self {
            table: "altnames".to_string(),
            group_column: "id".to_string(),
            alias_column: "altname".to_string(),
        }
    }
}

/// A committed alias.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AliasLink {
    /// Group the alias belongs to.
    pub group_id: i64,
    /// The alias text.
    pub alias_name: String,
    /// Whether the link started a new group.
    pub new_group: bool,
}

/// Alias operations bound to one connection.
pub struct AliasStore<'a> {
    conn: &'a Connection,
    schema: TableSchema,
    group: ColumnDescriptor,
    alias: ColumnDescriptor,
}

impl<'a> AliasStore<'a> {
    /// Resolve the alias table against the live catalog.
    pub fn open(conn: &'a Connection, layout: &AliasTable) -> Result<Self> {
        let schema = Introspector::new(conn).table_schema(&layout.table)?;
        let lookup = |name: &String| {
            schema.column(name).cloned().ok_or_else(|| Error::ColumnMismatch {
                table: layout.table.clone(),
                columns: vec![name.clone()],
            })
        };
        let group = lookup(&layout.group_column)?;
        let alias = lookup(&layout.alias_column)?;
        Ok(Self {
            conn,
            schema,
            group,
            alias,
        })
    }

    /// Whether the pair is already linked.
    pub fn exists(&self, alias_name: &str, group_id: i64) -> Result<bool> {
        let sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?1 AND {} = ?2 LIMIT 1",
            quote(self.schema.name()),
            quote(self.alias.name()),
            quote(self.group.name()),
        );
        let found: Option<i64> = self
            .conn
            .query_row(&sql, rusqlite::params![alias_name, group_id], |row| row.get(0))
            .optional()?;
        Ok(found.is_some())
    }

    /// Number of alias rows.
    pub fn count(&self) -> Result<usize> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote(self.schema.name()));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count as usize)
    }

    fn next_group_id(&self) -> Result<i64> {
        let sql = format!(
            "SELECT COALESCE(MAX({}), 0) + 1 FROM {}",
            quote(self.group.name()),
            quote(self.schema.name()),
        );
        Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
    }

    /// Link an alias to a group, or start a new group when `group_id` is `None`.
    ///
    /// An existing `(alias, group)` pair is rejected with [`Error::Conflict`]
    /// before anything is written.
    pub fn link(&self, alias_name: &str, group_id: Option<i64>) -> Result<AliasLink> {
        let alias_name = alias_name.trim();
        if alias_name.is_empty() {
            return Err(ValidationError::MissingRequiredField("alias_name".to_string()).into());
        }

        let (group_id, new_group) = match group_id {
            Some(id) => {
                if self.exists(alias_name, id)? {
                    return Err(Error::Conflict {
                        alias: alias_name.to_string(),
                        group_id: id,
                    });
                }
                (id, false)
            }
            None => (self.next_group_id()?, true),
        };

        let assignments = [
            Assignment {
                column: &self.group,
                value: Value::Integer(group_id),
            },
            Assignment {
                column: &self.alias,
                value: Value::from(alias_name),
            },
        ];
        query::insert(&self.schema, &assignments).execute(self.conn)?;

        info!(alias = alias_name, group_id, new_group, "Linked alias");
        Ok(AliasLink {
            group_id,
            alias_name: alias_name.to_string(),
            new_group,
        })
    }

    /// One representative name per group, for the suggestion workflow.
    pub fn candidates(&self) -> Result<Vec<Candidate>> {
        let sql = format!(
            "SELECT {group}, MIN({alias}) FROM {table} \
             WHERE {group} IS NOT NULL AND {alias} IS NOT NULL \
             GROUP BY {group} ORDER BY {group}",
            group = quote(self.group.name()),
            alias = quote(self.alias.name()),
            table = quote(self.schema.name()),
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let candidates = stmt
            .query_map([], |row| {
                let id: Value = row.get(0)?;
                let name: Value = row.get(1)?;
                Ok(Candidate::new(id.to_string(), name.to_string()))
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE altnames (id INTEGER NOT NULL, altname TEXT NOT NULL);
            INSERT INTO altnames VALUES (1, 'steel bolt'), (1, 'bolt'), (2, 'hex nut');
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_link_to_existing_group() {
        let conn = setup();
        let store = AliasStore::open(&conn, &AliasTable::default()).unwrap();
        let link = store.link("bolt M8", Some(1)).unwrap();
        assert_eq!(link.group_id, 1);
        assert!(!link.new_group);
        assert!(store.exists("bolt M8", 1).unwrap());
    }

    #[test]
    fn test_duplicate_link_conflicts() {
        let conn = setup();
        let store = AliasStore::open(&conn, &AliasTable::default()).unwrap();
        let before = store.count().unwrap();
        assert!(matches!(
            store.link("bolt", Some(1)),
            Err(Error::Conflict { group_id: 1, .. })
        ));
        assert_eq!(store.count().unwrap(), before);

        // Same alias in another group is fine.
        store.link("bolt", Some(2)).unwrap();
    }

    #[test]
    fn test_link_without_group_creates_one() {
        let conn = setup();
        let store = AliasStore::open(&conn, &AliasTable::default()).unwrap();
        let link = store.link("washer", None).unwrap();
        assert_eq!(link.group_id, 3);
        assert!(link.new_group);
    }

    #[test]
    fn test_blank_alias_rejected() {
        let conn = setup();
        let store = AliasStore::open(&conn, &AliasTable::default()).unwrap();
        assert!(matches!(
            store.link("   ", Some(1)),
            Err(Error::Validation(ValidationError::MissingRequiredField(_)))
        ));
    }

    #[test]
    fn test_candidates_one_per_group() {
        let conn = setup();
        let store = AliasStore::open(&conn, &AliasTable::default()).unwrap();
        let candidates = store.candidates().unwrap();
        assert_eq!(
            candidates,
            vec![Candidate::new("1", "bolt"), Candidate::new("2", "hex nut")]
        );
    }

    #[test]
    fn test_open_checks_layout() {
        let conn = setup();
        let layout = AliasTable {
            alias_column: "label".to_string(),
            ..AliasTable::default()
        };
        assert!(matches!(
            AliasStore::open(&conn, &layout),
            Err(Error::ColumnMismatch { .. })
        ));

        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            AliasStore::open(&conn, &AliasTable::default()),
            Err(Error::TableNotFound(_))
        ));
    }
}
