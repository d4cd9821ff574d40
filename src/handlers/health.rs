use axum::Json;
use serde_json::{Value, json};

/// GET /api/health -> static liveness payload.
pub async fn health() -> Json<Value> {
    Json(json!({
        "success": true,
        "message": "API is running"
    }))
}
