//! TableDesk Core - Schema-driven CRUD, guarded SQL and spreadsheet transfer.
//!
//! Everything in this crate works from what the live SQLite catalog reports,
//! so tables added or altered at runtime are picked up on the next call:
//! - Catalog introspection of tables, views and column metadata
//! - Payload validation and parameterized statement building
//! - A guarded executor for ad-hoc SQL
//! - Workbook export and import with column reconciliation
//! - Alias groups and LLM-assisted similarity suggestions

pub mod alias;
pub mod catalog;
pub mod crud;
pub mod error;
pub mod guard;
pub mod query;
pub mod suggest;
pub mod transfer;
pub mod validate;
pub mod value;
pub mod xlsx;

pub use alias::{AliasLink, AliasStore, AliasTable};
pub use catalog::{CatalogObject, ColumnDescriptor, Introspector, ObjectKind, ObjectList, TableSchema};
pub use crud::RowEditor;
pub use error::{Error, Result, ValidationError};
pub use guard::{ExecOutcome, GuardedExecutor};
pub use query::{RowKey, Statement};
pub use suggest::{Candidate, Suggestion, SuggestionService, DEFAULT_TOP_N};
pub use transfer::{ImportReport, TabularBuffer, Transfer};
pub use validate::{validate_for_insert, validate_for_update, Assignment};
pub use value::{ResultSet, Row, Value};
pub use xlsx::{SheetFormat, XLSX_CONTENT_TYPE};
