//! Core error types.

use thiserror::Error;

/// Rejections produced while checking a row payload against column metadata.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// A NOT NULL column received no value, null, or an empty string.
    #[error("field '{0}' is required")]
    MissingRequiredField(String),

    /// An update payload touched no updatable column.
    #[error("no updatable fields were submitted")]
    NoChanges,

    /// The row key does not match the shape of the table's key.
    #[error("invalid row key: {0}")]
    InvalidRowKey(String),
}

/// Engine errors.
#[derive(Debug, Error)]
pub enum Error {
    /// Neither a table nor a view with this name exists.
    #[error("table or view not found: {0}")]
    ObjectNotFound(String),

    /// No table with this name exists.
    #[error("table not found: {0}")]
    TableNotFound(String),

    /// No row matched the supplied key.
    #[error("no row in '{0}' matches the given key")]
    RowNotFound(String),

    /// Payload rejected by the constraint validator.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Empty or whitespace-only SQL text.
    #[error("empty SQL command")]
    EmptyCommand,

    /// Ad-hoc SQL tripped the guard policy.
    #[error("unsafe command rejected: {0}")]
    UnsafeCommand(String),

    /// Underlying database failure.
    #[error("database error: {0}")]
    Store(#[from] rusqlite::Error),

    /// The alias is already linked to the group.
    #[error("alias '{alias}' is already linked to group {group_id}")]
    Conflict {
        /// Alias name.
        alias: String,
        /// Group identifier.
        group_id: i64,
    },

    /// Import header names columns the target table does not have.
    #[error("columns not present in '{table}': {}", .columns.join(", "))]
    ColumnMismatch {
        /// Target table.
        table: String,
        /// Offending header names.
        columns: Vec<String>,
    },

    /// Import buffer carried no data rows.
    #[error("the uploaded sheet contains no data rows")]
    EmptyInput,

    /// Export source returned no rows.
    #[error("'{0}' contains no rows to export")]
    EmptyResult(String),

    /// Bulk import stopped partway; earlier rows remain committed.
    #[error("import stopped at row {failed_row} after {inserted} rows were inserted: {reason}")]
    PartialImport {
        /// Rows committed before the failure.
        inserted: usize,
        /// 1-based data row that failed.
        failed_row: usize,
        /// Store message for the failing row.
        reason: String,
    },

    /// Upload with an extension the codec does not read.
    #[error("unsupported file format: {0}")]
    UnsupportedFormat(String),

    /// Spreadsheet encoding or decoding failure.
    #[error("spreadsheet error: {0}")]
    Tabular(String),

    /// Suggestion service transport or decode failure.
    #[error("suggestion service error: {0}")]
    Upstream(String),
}

impl From<rust_xlsxwriter::XlsxError> for Error {
    fn from(err: rust_xlsxwriter::XlsxError) -> Self {
        Error::Tabular(err.to_string())
    }
}

impl From<calamine::Error> for Error {
    fn from(err: calamine::Error) -> Self {
        Error::Tabular(err.to_string())
    }
}

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, Error>;
