pub mod health;

use axum::{
    http::Uri,
    routing::{get, post},
    Router,
};

use crate::errors::AppError;
use crate::matching::handlers;
use crate::state::AppState;

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("No route for {uri}"))
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Matching engine
        .route("/api/v1/match", post(handlers::handle_match))
        // Standalone extractors
        .route("/api/v1/skills/extract", post(handlers::handle_extract_skills))
        .route(
            "/api/v1/seniority/extract",
            post(handlers::handle_extract_seniority),
        )
        .route(
            "/api/v1/domain/classify",
            post(handlers::handle_classify_domain),
        )
        // Taxonomy data table
        .route("/api/v1/taxonomy", get(handlers::handle_taxonomy_info))
        .route(
            "/api/v1/taxonomy/reload",
            post(handlers::handle_taxonomy_reload),
        )
        .fallback(not_found)
        .with_state(state)
}
