//! Liveness and dependency health.

use std::collections::BTreeMap;

use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;
use serde::Serialize;

use crate::middleware::AppState;

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// `ok` or `degraded`.
    pub status: String,
    /// Time of the probe.
    pub timestamp: String,
    /// Per-dependency results.
    pub checks: BTreeMap<&'static str, String>,
}

/// `GET /healthz` — 200 when every dependency answers, 503 otherwise.
pub async fn healthz(State(state): State<AppState>) -> (StatusCode, Json<HealthResponse>) {
    let mut checks = BTreeMap::new();
    let mut status = "ok";

    match pushgate_db::health(state.db.as_ref()).await {
        Ok(()) => {
            checks.insert("database", "healthy".to_string());
        }
        Err(e) => {
            status = "degraded";
            checks.insert("database", format!("unhealthy: {e}"));
        }
    }

    let code = if status == "ok" {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        code,
        Json(HealthResponse {
            status: status.to_string(),
            timestamp: Utc::now().to_rfc3339(),
            checks,
        }),
    )
}
