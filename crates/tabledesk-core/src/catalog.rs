//! Live schema introspection.
//!
//! Everything here is read from `sqlite_master` and `pragma_table_info` on each
//! call. The handles returned ([`CatalogObject`], [`TableSchema`],
//! [`ColumnDescriptor`]) have no public constructors, so an identifier can only
//! reach the query builder after it has been matched against the catalog.

use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;
use tracing::debug;

use crate::error::{Error, Result};

/// Kind of a catalog object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    /// Base table.
    Table,
    /// View.
    View,
}

impl ObjectKind {
    fn parse(kind: &str) -> Option<Self> {
        match kind {
            "table" => Some(ObjectKind::Table),
            "view" => Some(ObjectKind::View),
            _ => None,
        }
    }
}

/// A table or view confirmed to exist in the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CatalogObject {
    name: String,
    kind: ObjectKind,
}

impl CatalogObject {
    /// Object name as stored in the catalog.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Table or view.
    pub fn kind(&self) -> ObjectKind {
        self.kind
    }
}

/// Tables and views of the current database.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectList {
    /// Base table names.
    pub tables: Vec<String>,
    /// View names.
    pub views: Vec<String>,
}

/// Metadata for one column of a table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ColumnDescriptor {
    name: String,
    declared_type: String,
    not_null: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    default_value: Option<String>,
    is_primary_key: bool,
    position: usize,
    #[serde(skip)]
    key_position: usize,
}

impl ColumnDescriptor {
    #[cfg(test)]
    pub(crate) fn new(name: impl Into<String>, declared_type: impl Into<String>, position: usize) -> Self {
        Self {
            name: name.into(),
            declared_type: declared_type.into(),
            not_null: false,
            default_value: None,
            is_primary_key: false,
            position,
            key_position: 0,
        }
    }

    #[cfg(test)]
    pub(crate) fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    #[cfg(test)]
    pub(crate) fn primary_key(mut self, key_position: usize) -> Self {
        self.is_primary_key = true;
        self.key_position = key_position;
        self
    }

    /// Column name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Type as written in the table definition (may be empty).
    pub fn declared_type(&self) -> &str {
        &self.declared_type
    }

    /// Whether the column carries a NOT NULL constraint.
    pub fn is_not_null(&self) -> bool {
        self.not_null
    }

    /// Default expression text, if any.
    pub fn default_value(&self) -> Option<&str> {
        self.default_value.as_deref()
    }

    /// Whether the column is part of the primary key.
    pub fn is_primary_key(&self) -> bool {
        self.is_primary_key
    }

    /// Zero-based physical position.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Candidate for insert and update payloads.
    pub fn is_insertable(&self) -> bool {
        !self.is_primary_key
    }
}

/// A table and its columns in physical order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSchema {
    table: CatalogObject,
    columns: Vec<ColumnDescriptor>,
}

impl TableSchema {
    pub(crate) fn from_parts(name: impl Into<String>, columns: Vec<ColumnDescriptor>) -> Self {
        Self {
            table: CatalogObject {
                name: name.into(),
                kind: ObjectKind::Table,
            },
            columns,
        }
    }

    /// Table name.
    pub fn name(&self) -> &str {
        &self.table.name
    }

    /// The table as a catalog object.
    pub fn object(&self) -> &CatalogObject {
        &self.table
    }

    /// All columns in physical order.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// Look up a column by name. SQLite identifiers are case-insensitive, so an
    /// exact match wins and any ASCII-case variant is accepted otherwise.
    pub fn column(&self, name: &str) -> Option<&ColumnDescriptor> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .or_else(|| self.columns.iter().find(|c| c.name.eq_ignore_ascii_case(name)))
    }

    /// Columns allowed in insert and update payloads.
    pub fn insertable_columns(&self) -> impl Iterator<Item = &ColumnDescriptor> {
        self.columns.iter().filter(|c| c.is_insertable())
    }

    /// Primary-key columns ordered by key position. Empty when the table has no
    /// declared key and rows are addressed by `rowid`.
    pub fn key_columns(&self) -> Vec<&ColumnDescriptor> {
        let mut keys: Vec<&ColumnDescriptor> =
            self.columns.iter().filter(|c| c.is_primary_key).collect();
        keys.sort_by_key(|c| c.key_position);
        keys
    }
}

/// Read-only view over the live catalog of one connection.
pub struct Introspector<'a> {
    conn: &'a Connection,
}

impl<'a> Introspector<'a> {
    /// Create an introspector bound to a connection.
    pub fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// List user tables and views, excluding SQLite's internal objects.
    pub fn list_objects(&self) -> Result<ObjectList> {
        let mut stmt = self.conn.prepare(
            "SELECT name, type FROM sqlite_master \
             WHERE type IN ('table', 'view') AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\' \
             ORDER BY name",
        )?;
        let mut objects = ObjectList::default();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let name: String = row.get(0)?;
            let kind: String = row.get(1)?;
            match ObjectKind::parse(&kind) {
                Some(ObjectKind::Table) => objects.tables.push(name),
                Some(ObjectKind::View) => objects.views.push(name),
                None => {}
            }
        }
        debug!(
            tables = objects.tables.len(),
            views = objects.views.len(),
            "Listed catalog objects"
        );
        Ok(objects)
    }

    /// Find a table or view by exact name.
    pub fn resolve_object(&self, name: &str) -> Result<CatalogObject> {
        self.lookup(name)?
            .ok_or_else(|| Error::ObjectNotFound(name.to_string()))
    }

    /// Describe the columns of a table, in physical order.
    pub fn describe_columns(&self, table: &str) -> Result<Vec<ColumnDescriptor>> {
        Ok(self.table_schema(table)?.columns)
    }

    /// Resolve a table and its columns.
    pub fn table_schema(&self, table: &str) -> Result<TableSchema> {
        match self.lookup(table)? {
            Some(object) if object.kind == ObjectKind::Table => {}
            _ => return Err(Error::TableNotFound(table.to_string())),
        }

        let mut stmt = self.conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk \
             FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map([table], |row| {
                let key_position: i64 = row.get(5)?;
                Ok(ColumnDescriptor {
                    position: row.get::<_, i64>(0)? as usize,
                    name: row.get(1)?,
                    declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    not_null: row.get::<_, i64>(3)? != 0,
                    default_value: row.get(4)?,
                    is_primary_key: key_position > 0,
                    key_position: key_position.max(0) as usize,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        debug!(table, columns = columns.len(), "Described table");
        Ok(TableSchema::from_parts(table, columns))
    }

    fn lookup(&self, name: &str) -> Result<Option<CatalogObject>> {
        let kind: Option<String> = self
            .conn
            .query_row(
                "SELECT type FROM sqlite_master \
                 WHERE name = ?1 AND type IN ('table', 'view') \
                 AND name NOT LIKE 'sqlite\\_%' ESCAPE '\\'",
                [name],
                |row| row.get(0),
            )
            .optional()?;
        Ok(kind.and_then(|kind| {
            ObjectKind::parse(&kind).map(|kind| CatalogObject {
                name: name.to_string(),
                kind,
            })
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE person (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                email TEXT,
                age INTEGER DEFAULT 18
            );
            CREATE TABLE membership (
                person_id INTEGER NOT NULL,
                club TEXT NOT NULL,
                since TEXT,
                PRIMARY KEY (club, person_id)
            );
            CREATE TABLE "odd ""name""" (value TEXT);
            CREATE VIEW adults AS SELECT name FROM person WHERE age >= 18;
            "#,
        )
        .unwrap();
        conn
    }

    #[test]
    fn test_list_objects_splits_tables_and_views() {
        let conn = setup();
        let objects = Introspector::new(&conn).list_objects().unwrap();
        assert_eq!(objects.tables, vec!["membership", "odd \"name\"", "person"]);
        assert_eq!(objects.views, vec!["adults"]);
    }

    #[test]
    fn test_list_objects_hides_internal_tables() {
        let conn = setup();
        conn.execute_batch("CREATE TABLE seq (id INTEGER PRIMARY KEY AUTOINCREMENT, v TEXT);")
            .unwrap();
        let objects = Introspector::new(&conn).list_objects().unwrap();
        assert!(objects.tables.iter().all(|t| !t.starts_with("sqlite_")));
        assert!(objects.tables.contains(&"seq".to_string()));
    }

    #[test]
    fn test_describe_columns() {
        let conn = setup();
        let columns = Introspector::new(&conn).describe_columns("person").unwrap();
        let names: Vec<&str> = columns.iter().map(|c| c.name()).collect();
        assert_eq!(names, vec!["id", "name", "email", "age"]);

        assert!(columns[0].is_primary_key());
        assert!(columns[1].is_not_null());
        assert!(!columns[2].is_not_null());
        assert_eq!(columns[3].default_value(), Some("18"));
        assert_eq!(columns[3].declared_type(), "INTEGER");
        assert_eq!(columns[3].position(), 3);
    }

    #[test]
    fn test_composite_key_order() {
        let conn = setup();
        let schema = Introspector::new(&conn).table_schema("membership").unwrap();
        let keys: Vec<&str> = schema.key_columns().iter().map(|c| c.name()).collect();
        assert_eq!(keys, vec!["club", "person_id"]);
        let insertable: Vec<&str> = schema.insertable_columns().map(|c| c.name()).collect();
        assert_eq!(insertable, vec!["since"]);
    }

    #[test]
    fn test_describe_unknown_or_view_is_not_found() {
        let conn = setup();
        let introspector = Introspector::new(&conn);
        assert!(matches!(
            introspector.describe_columns("missing"),
            Err(Error::TableNotFound(_))
        ));
        assert!(matches!(
            introspector.describe_columns("adults"),
            Err(Error::TableNotFound(_))
        ));
    }

    #[test]
    fn test_resolve_object() {
        let conn = setup();
        let introspector = Introspector::new(&conn);
        assert_eq!(introspector.resolve_object("adults").unwrap().kind(), ObjectKind::View);
        assert_eq!(introspector.resolve_object("person").unwrap().kind(), ObjectKind::Table);
        assert!(matches!(
            introspector.resolve_object("person; DROP TABLE person"),
            Err(Error::ObjectNotFound(_))
        ));
    }
}
