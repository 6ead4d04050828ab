use axum::{extract::State, routing::get, Json, Router};
use serde_json::{json, Value};

use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}

async fn health_check(State(state): State<AppState>) -> Json<Value> {
    let database_ok = state
        .database
        .run(|conn| Ok(conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?))
        .await
        .is_ok();

    Json(json!({
        "status": if database_ok { "healthy" } else { "degraded" },
        "service": "tabledesk-studio",
        "version": env!("CARGO_PKG_VERSION"),
        "database": {
            "path": state.database.path().display().to_string(),
            "reachable": database_ok,
        }
    }))
}
