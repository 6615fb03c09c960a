//! API middleware.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use sea_orm::DatabaseConnection;

use pushgate_common::{
    AppError, MAX_CLOCK_SKEW, Timer, get_metrics, timestamp_within_skew, verify_request,
};
use pushgate_core::{NotificationService, SubscriptionService};

/// Largest request body the signature middleware will buffer.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Application state.
#[derive(Clone)]
pub struct AppState {
    /// Subscription lifecycle service.
    pub subscription_service: SubscriptionService,
    /// Notification admission service.
    pub notification_service: NotificationService,
    /// Database handle for the readiness probe.
    pub db: Arc<DatabaseConnection>,
    /// Shared secret for producer request signing.
    pub hmac_secret: String,
    /// VAPID public key served to subscribing browsers. Empty means unset.
    pub vapid_public_key: String,
}

/// Producer request-signature middleware.
///
/// Buffers the body once, verifies `X-Timestamp` freshness and the
/// `X-Signature` HMAC, then restores the body for the handler. Every failure
/// mode is a plain 401.
pub async fn require_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    match verify_signed_request(&state, request).await {
        Ok(request) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

async fn verify_signed_request(state: &AppState, request: Request) -> Result<Request, AppError> {
    let (parts, body) = request.into_parts();

    let timestamp = parts
        .headers
        .get("x-timestamp")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?
        .to_string();

    let signature = parts
        .headers
        .get("x-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or(AppError::Unauthorized)?
        .to_string();

    if !timestamp_within_skew(&timestamp, MAX_CLOCK_SKEW, Utc::now()) {
        return Err(AppError::Unauthorized);
    }

    let bytes = axum::body::to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|_| AppError::BadRequest("failed to read request body".to_string()))?;

    let verified = verify_request(
        state.hmac_secret.as_bytes(),
        parts.method.as_str(),
        parts.uri.path(),
        &bytes,
        &timestamp,
        &signature,
    );

    if !verified {
        return Err(AppError::Unauthorized);
    }

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

/// Record request counters and latency for every response.
pub async fn track_metrics(request: Request, next: Next) -> Response {
    let metrics = get_metrics();
    metrics.start_request();
    let timer = Timer::start();

    let response = next.run(request).await;

    metrics.end_request();
    metrics.record_http_request(response.status().as_u16(), timer.elapsed());

    response
}
