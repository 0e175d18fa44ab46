use axum::{extract::State, response::Json};
use serde_json::{json, Value};

use crate::{database, AppState};

/// GET /api/health - liveness plus a database connectivity probe
pub async fn health_check(State(app_state): State<AppState>) -> Json<Value> {
    let database_ok = match database::health_check(&app_state.db_pool).await {
        Ok(()) => true,
        Err(e) => {
            tracing::error!("Database health check failed: {}", e);
            false
        }
    };

    Json(json!({
        "status": if database_ok { "healthy" } else { "degraded" },
        "database": if database_ok { "connected" } else { "disconnected" },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET / - service banner
pub async fn root() -> Json<Value> {
    Json(json!({
        "message": "Nmap Scanner API",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "operational",
    }))
}
