use axum::{extract::State, Json};
use serde_json::{json, Value};

use crate::state::AppState;

/// GET /health
/// Returns a simple status object with service version and the live taxonomy.
pub async fn health_handler(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "service": "matchgate-api",
        "taxonomy_version": state.taxonomy.current().version(),
        "semantic_scoring": state.embedder.is_available(),
        "embedding_model": state.embedder.model()
    }))
}
