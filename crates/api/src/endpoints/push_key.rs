//! VAPID public key handout for subscribing browsers.

use axum::{Json, extract::State};
use serde::Serialize;

use crate::middleware::AppState;
use pushgate_common::{AppError, AppResult};

/// Public key response.
#[derive(Debug, Serialize)]
pub struct PublicKeyResponse {
    /// Base64url-encoded uncompressed P-256 point.
    pub public_key: String,
}

/// `GET /v1/push/public-key` — 503 when no key is configured.
pub async fn public_key(State(state): State<AppState>) -> AppResult<Json<PublicKeyResponse>> {
    if state.vapid_public_key.is_empty() {
        return Err(AppError::NotConfigured(
            "VAPID public key not configured".to_string(),
        ));
    }

    Ok(Json(PublicKeyResponse {
        public_key: state.vapid_public_key.clone(),
    }))
}
