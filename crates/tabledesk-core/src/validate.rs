//! Constraint validation for row payloads.
//!
//! The validator only knows what the catalog reported: which columns are part
//! of the primary key and which carry NOT NULL. Type checking is left to the
//! store.

use crate::catalog::ColumnDescriptor;
use crate::error::ValidationError;
use crate::value::{Row, Value};

/// A column paired with the value to write into it.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment<'a> {
    /// Target column, taken from introspected metadata.
    pub column: &'a ColumnDescriptor,
    /// Normalized value.
    pub value: Value,
}

/// Check an insert payload and return the assignments to write.
///
/// Columns are visited in physical order and the first missing required field
/// is reported. Payload keys match column names ignoring ASCII case.
/// Primary-key columns and payload keys that match no column are skipped;
/// absent nullable columns are left to their default.
pub fn validate_for_insert<'a>(
    columns: &'a [ColumnDescriptor],
    payload: &Row,
) -> Result<Vec<Assignment<'a>>, ValidationError> {
    let mut assignments = Vec::new();

    for column in columns.iter().filter(|c| c.is_insertable()) {
        let value = payload.lookup(column.name());
        if column.is_not_null() && value.map_or(true, Value::is_empty) {
            return Err(ValidationError::MissingRequiredField(column.name().to_string()));
        }
        if let Some(value) = value {
            assignments.push(Assignment {
                column,
                value: value.clone().normalized(),
            });
        }
    }

    Ok(assignments)
}

/// Check an update payload and return the SET list.
///
/// Only non-key columns present in the payload are included. A payload that
/// touches none of them is rejected with [`ValidationError::NoChanges`].
pub fn validate_for_update<'a>(
    columns: &'a [ColumnDescriptor],
    payload: &Row,
) -> Result<Vec<Assignment<'a>>, ValidationError> {
    let mut assignments = Vec::new();

    for column in columns.iter().filter(|c| c.is_insertable()) {
        let Some(value) = payload.lookup(column.name()) else {
            continue;
        };
        if column.is_not_null() && value.is_empty() {
            return Err(ValidationError::MissingRequiredField(column.name().to_string()));
        }
        assignments.push(Assignment {
            column,
            value: value.clone().normalized(),
        });
    }

    if assignments.is_empty() {
        return Err(ValidationError::NoChanges);
    }
    Ok(assignments)
}
