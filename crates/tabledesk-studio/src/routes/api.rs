use axum::{
    extract::{
        multipart::MultipartRejection,
        rejection::JsonRejection,
        Multipart, Path, State,
    },
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tabledesk_core::{
    suggest, xlsx, AliasStore, Candidate, Error as CoreError, ExecOutcome,
    GuardedExecutor, Introspector, Row, RowEditor, RowKey, SheetFormat, Transfer,
    ValidationError,
};

use crate::error::{Result, StudioError};
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        // Catalog
        .route("/api/schema", get(get_schema))
        .route("/api/table_info/:table", get(get_table_info))
        // Rows
        .route("/api/data/:name", get(get_data))
        .route("/api/insert/:table", post(insert_row))
        .route("/api/update/:table", post(update_row))
        .route("/api/delete/:table", post(delete_row))
        // Ad-hoc SQL
        .route("/api/sql_command", post(sql_command))
        // Spreadsheet transfer
        .route("/api/export_to_excel/:name", get(export_to_excel))
        .route("/api/import_from_excel/:table", post(import_from_excel))
        // Aliases
        .route("/api/ai_suggestions", post(ai_suggestions))
        .route("/api/link_altname", post(link_altname))
}

// ============================================================================
// Catalog
// ============================================================================

async fn get_schema(State(state): State<AppState>) -> Result<Json<Value>> {
    let objects = state
        .database
        .run(|conn| Introspector::new(conn).list_objects())
        .await?;

    Ok(Json(json!({
        "success": true,
        "tables": objects.tables,
        "views": objects.views,
    })))
}

async fn get_table_info(
    State(state): State<AppState>,
    Path(table): Path<String>,
) -> Result<Json<Value>> {
    let schema = state
        .database
        .run(move |conn| Introspector::new(conn).table_schema(&table))
        .await?;

    Ok(Json(json!({
        "success": true,
        "table": schema.name(),
        "columns": schema.columns(),
    })))
}

// ============================================================================
// Rows
// ============================================================================

async fn get_data(State(state): State<AppState>, Path(name): Path<String>) -> Result<Json<Value>> {
    let result = state
        .database
        .run(move |conn| RowEditor::new(conn).fetch_all(&name))
        .await?;

    Ok(Json(json!({
        "success": true,
        "columns": result.columns,
        "rows": result.records(),
        "count": result.len(),
    })))
}

async fn insert_row(
    State(state): State<AppState>,
    Path(table): Path<String>,
    body: std::result::Result<Json<Row>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(payload) = body?;
    let rowid = state
        .database
        .run(move |conn| RowEditor::new(conn).insert(&table, &payload))
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Row inserted",
        "rowid": rowid,
    })))
}

#[derive(Deserialize)]
struct UpdateRequest {
    key: RowKey,
    values: Row,
}

async fn update_row(
    State(state): State<AppState>,
    Path(table): Path<String>,
    body: std::result::Result<Json<UpdateRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = body?;
    let affected = state
        .database
        .run(move |conn| RowEditor::new(conn).update(&table, &request.key, &request.values))
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Row updated",
        "affected": affected,
    })))
}

#[derive(Deserialize)]
struct DeleteRequest {
    key: RowKey,
}

async fn delete_row(
    State(state): State<AppState>,
    Path(table): Path<String>,
    body: std::result::Result<Json<DeleteRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = body?;
    let affected = state
        .database
        .run(move |conn| RowEditor::new(conn).delete(&table, &request.key))
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Row deleted",
        "affected": affected,
    })))
}

// ============================================================================
// Ad-hoc SQL
// ============================================================================

#[derive(Deserialize)]
struct SqlRequest {
    #[serde(default)]
    sql: String,
}

async fn sql_command(
    State(state): State<AppState>,
    body: std::result::Result<Json<SqlRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = body?;
    let outcome = state
        .database
        .run(move |conn| GuardedExecutor::new(conn).execute(&request.sql))
        .await?;

    let body = match outcome {
        ExecOutcome::Rows(result) => json!({
            "success": true,
            "kind": "rows",
            "columns": result.columns,
            "results": result.records(),
            "count": result.len(),
        }),
        ExecOutcome::Mutation { affected } => json!({
            "success": true,
            "kind": "mutation",
            "affected": affected,
            "message": format!("Command executed, {} row(s) changed", affected),
        }),
    };
    Ok(Json(body))
}

// ============================================================================
// Spreadsheet Transfer
// ============================================================================

async fn export_to_excel(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Response> {
    let (object, bytes) = state
        .database
        .run(move |conn| {
            let buffer = Transfer::new(conn).export(&name)?;
            let bytes = xlsx::write_workbook(&buffer)?;
            Ok((buffer.sheet_name().to_string(), bytes))
        })
        .await?;

    let filename = xlsx::export_filename(&object).replace('"', "_");
    let headers = [
        (header::CONTENT_TYPE, xlsx::XLSX_CONTENT_TYPE.to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        ),
    ];
    Ok((headers, bytes).into_response())
}

/// First `file` part of the upload, as `(filename, bytes)`.
async fn read_upload(multipart: &mut Multipart) -> Result<(String, Vec<u8>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| StudioError::InvalidRequest(e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or_default().to_string();
        if filename.trim().is_empty() {
            return Err(StudioError::InvalidRequest("no file selected".to_string()));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| StudioError::InvalidRequest(e.to_string()))?;
        return Ok((filename, bytes.to_vec()));
    }
    Err(StudioError::InvalidRequest(
        "multipart field 'file' is missing".to_string(),
    ))
}

async fn import_from_excel(
    State(state): State<AppState>,
    Path(table): Path<String>,
    multipart: std::result::Result<Multipart, MultipartRejection>,
) -> Result<Json<Value>> {
    let mut multipart = multipart?;
    let (filename, bytes) = read_upload(&mut multipart).await?;
    let format = SheetFormat::from_filename(&filename)?;
    tracing::info!(%table, %filename, bytes = bytes.len(), "Import upload received");

    let report = state
        .database
        .run(move |conn| {
            let buffer = xlsx::read_workbook(&bytes, format)?;
            Transfer::new(conn).import(&table, &buffer)
        })
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("Imported {} row(s)", report.inserted),
        "inserted": report.inserted,
    })))
}

// ============================================================================
// Aliases
// ============================================================================

#[derive(Deserialize)]
struct SuggestionRequest {
    #[serde(default)]
    new_name: String,
    #[serde(default)]
    existing_names: Option<Vec<Candidate>>,
}

async fn ai_suggestions(
    State(state): State<AppState>,
    body: std::result::Result<Json<SuggestionRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = body?;
    if request.new_name.trim().is_empty() {
        let missing = ValidationError::MissingRequiredField("new_name".to_string());
        return Err(CoreError::from(missing).into());
    }

    let candidates = match request.existing_names {
        Some(candidates) => candidates,
        None => {
            let layout = state.config.aliases.clone();
            state
                .database
                .run(move |conn| AliasStore::open(conn, &layout)?.candidates())
                .await?
        }
    };

    let suggestions = suggest::suggest(
        state.suggester.as_ref(),
        &request.new_name,
        &candidates,
        state.config.suggest.top_n,
    )
    .await?;

    Ok(Json(json!({
        "success": true,
        "suggestions": suggestions,
    })))
}

#[derive(Deserialize)]
struct LinkRequest {
    #[serde(default)]
    new_name: String,
    #[serde(default)]
    id: Option<Value>,
}

/// Group ids come back from suggestions as strings; accept either form.
fn group_id(raw: Option<Value>) -> Result<Option<i64>> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n
            .as_i64()
            .map(Some)
            .ok_or_else(|| StudioError::InvalidRequest(format!("invalid group id: {}", n))),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| StudioError::InvalidRequest(format!("invalid group id: {}", s))),
        Some(other) => Err(StudioError::InvalidRequest(format!(
            "invalid group id: {}",
            other
        ))),
    }
}

async fn link_altname(
    State(state): State<AppState>,
    body: std::result::Result<Json<LinkRequest>, JsonRejection>,
) -> Result<Json<Value>> {
    let Json(request) = body?;
    let group_id = group_id(request.id)?;
    let layout = state.config.aliases.clone();
    let link = state
        .database
        .run(move |conn| AliasStore::open(conn, &layout)?.link(&request.new_name, group_id))
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": format!("'{}' linked to group {}", link.alias_name, link.group_id),
        "link": link,
    })))
}
