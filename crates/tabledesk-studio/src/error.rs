use axum::{
    extract::{multipart::MultipartRejection, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tabledesk_core::{Error as CoreError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<rusqlite::Error> for StudioError {
    fn from(err: rusqlite::Error) -> Self {
        StudioError::Core(CoreError::Store(err))
    }
}

impl From<tokio::task::JoinError> for StudioError {
    fn from(err: tokio::task::JoinError) -> Self {
        StudioError::Internal(err.to_string())
    }
}

impl From<JsonRejection> for StudioError {
    fn from(rejection: JsonRejection) -> Self {
        StudioError::InvalidRequest(rejection.body_text())
    }
}

impl From<MultipartRejection> for StudioError {
    fn from(rejection: MultipartRejection) -> Self {
        StudioError::InvalidRequest(rejection.body_text())
    }
}

impl StudioError {
    fn classify(&self) -> (StatusCode, &'static str) {
        match self {
            StudioError::Core(err) => match err {
                CoreError::ObjectNotFound(_) => (StatusCode::NOT_FOUND, "OBJECT_NOT_FOUND"),
                CoreError::TableNotFound(_) => (StatusCode::NOT_FOUND, "TABLE_NOT_FOUND"),
                CoreError::RowNotFound(_) => (StatusCode::NOT_FOUND, "ROW_NOT_FOUND"),
                CoreError::Validation(ValidationError::MissingRequiredField(_)) => {
                    (StatusCode::BAD_REQUEST, "MISSING_REQUIRED_FIELD")
                }
                CoreError::Validation(ValidationError::NoChanges) => {
                    (StatusCode::BAD_REQUEST, "NO_CHANGES")
                }
                CoreError::Validation(ValidationError::InvalidRowKey(_)) => {
                    (StatusCode::BAD_REQUEST, "INVALID_ROW_KEY")
                }
                CoreError::EmptyCommand => (StatusCode::BAD_REQUEST, "EMPTY_COMMAND"),
                CoreError::UnsafeCommand(_) => (StatusCode::FORBIDDEN, "UNSAFE_COMMAND"),
                CoreError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DATABASE_ERROR"),
                CoreError::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT"),
                CoreError::ColumnMismatch { .. } => (StatusCode::BAD_REQUEST, "COLUMN_MISMATCH"),
                CoreError::EmptyInput => (StatusCode::BAD_REQUEST, "EMPTY_INPUT"),
                CoreError::EmptyResult(_) => (StatusCode::NOT_FOUND, "EMPTY_RESULT"),
                CoreError::PartialImport { .. } => {
                    (StatusCode::INTERNAL_SERVER_ERROR, "PARTIAL_IMPORT")
                }
                CoreError::UnsupportedFormat(_) => {
                    (StatusCode::UNSUPPORTED_MEDIA_TYPE, "UNSUPPORTED_FORMAT")
                }
                CoreError::Tabular(_) => (StatusCode::BAD_REQUEST, "INVALID_WORKBOOK"),
                CoreError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR"),
            },
            StudioError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "INVALID_REQUEST"),
            StudioError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
            StudioError::Io(_) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR"),
        }
    }

    /// Extra fields carried next to `code` and `message`.
    fn details(&self) -> Option<Value> {
        match self {
            StudioError::Core(CoreError::PartialImport {
                inserted,
                failed_row,
                ..
            }) => Some(json!({ "inserted": inserted, "failed_row": failed_row })),
            StudioError::Core(CoreError::ColumnMismatch { columns, .. }) => {
                Some(json!({ "columns": columns }))
            }
            StudioError::Core(CoreError::Conflict { alias, group_id }) => {
                Some(json!({ "alias_name": alias, "group_id": group_id }))
            }
            _ => None,
        }
    }
}

impl IntoResponse for StudioError {
    fn into_response(self) -> Response {
        let (status, error_code) = self.classify();
        if status.is_server_error() {
            tracing::error!(code = error_code, "{}", self);
        } else {
            tracing::debug!(code = error_code, "{}", self);
        }

        let mut error = json!({
            "code": error_code,
            "message": self.to_string(),
        });
        if let (Some(details), Some(map)) = (self.details(), error.as_object_mut()) {
            map.insert("details".to_string(), details);
        }

        let body = Json(json!({
            "success": false,
            "error": error,
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, StudioError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (CoreError::TableNotFound("t".into()), StatusCode::NOT_FOUND),
            (
                CoreError::Validation(ValidationError::MissingRequiredField("name".into())),
                StatusCode::BAD_REQUEST,
            ),
            (CoreError::UnsafeCommand("DROP".into()), StatusCode::FORBIDDEN),
            (
                CoreError::Conflict {
                    alias: "a".into(),
                    group_id: 1,
                },
                StatusCode::CONFLICT,
            ),
            (CoreError::UnsupportedFormat("x.csv".into()), StatusCode::UNSUPPORTED_MEDIA_TYPE),
            (CoreError::Upstream("refused".into()), StatusCode::BAD_GATEWAY),
            (
                CoreError::PartialImport {
                    inserted: 2,
                    failed_row: 3,
                    reason: "NOT NULL".into(),
                },
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(StudioError::from(err).into_response().status(), status);
        }
    }

    #[test]
    fn test_partial_import_details() {
        let err = StudioError::from(CoreError::PartialImport {
            inserted: 2,
            failed_row: 3,
            reason: "boom".into(),
        });
        assert_eq!(err.details(), Some(json!({ "inserted": 2, "failed_row": 3 })));
    }
}
