use axum::{extract::State, http::StatusCode, Json};
use serde_json::{json, Value};

use crate::state::AppState;

pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now().to_rfc3339()
    }))
}

pub async fn detailed_health(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let store_healthy = match state.store.health_check().await {
        Ok(()) => true,
        Err(error) => {
            tracing::warn!(store = state.store.name(), error = %error, "Store health check failed");
            false
        }
    };

    let status = if store_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(json!({
            "status": if store_healthy { "healthy" } else { "degraded" },
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "components": {
                "store": {
                    "backend": state.store.name(),
                    "status": if store_healthy { "healthy" } else { "unhealthy" },
                },
            }
        })),
    )
}
