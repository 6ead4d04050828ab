//! TableDesk Studio - HTTP access to the TableDesk engine
//!
//! This crate serves the engine over JSON with:
//! - Catalog browsing and generic row editing for any table
//! - Guarded ad-hoc SQL
//! - Workbook export and import
//! - Alias linking with LLM-ranked suggestions

pub mod config;
pub mod demo;
pub mod error;
pub mod routes;
pub mod session;
pub mod state;
pub mod upstream;

use axum::{extract::DefaultBodyLimit, Router};
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::state::AppState;

/// Create the Axum router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let body_limit = DefaultBodyLimit::max(state.config.max_upload_bytes);

    Router::new()
        // Health check
        .merge(routes::health::routes())
        // REST API
        .merge(routes::api::routes())
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(body_limit),
        )
        .with_state(state)
}
