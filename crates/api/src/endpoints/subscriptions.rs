//! Subscription endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::middleware::AppState;
use pushgate_common::AppResult;
use pushgate_core::RegisterInput;
use pushgate_db::entities::device_subscription;

/// Subscription encryption keys supplied by the browser.
#[derive(Debug, Deserialize, Validate)]
pub struct SubscriptionKeys {
    /// P256DH public key (base64url).
    #[validate(length(min = 1, message = "keys.p256dh is required"))]
    pub p256dh: String,
    /// Auth secret (base64url).
    #[validate(length(min = 1, message = "keys.auth is required"))]
    pub auth: String,
}

/// Request to register a device subscription.
#[derive(Debug, Deserialize, Validate)]
pub struct RegisterSubscriptionRequest {
    /// Owning user.
    #[validate(length(min = 1, max = 255, message = "user_id must be 1-255 characters"))]
    pub user_id: String,
    /// Push endpoint URL.
    #[validate(
        length(min = 1, max = 500, message = "endpoint must be 1-500 characters"),
        custom(function = validate_https_endpoint)
    )]
    pub endpoint: String,
    /// Encryption keys.
    #[validate(nested)]
    pub keys: SubscriptionKeys,
    /// Caller-assigned device identifier.
    pub device_id: Option<String>,
    /// Registering browser's user agent.
    pub user_agent: Option<String>,
    /// Preferred locale.
    #[validate(length(max = 10, message = "locale exceeds 10 characters"))]
    pub locale: Option<String>,
    /// IANA timezone.
    #[validate(length(max = 50, message = "timezone exceeds 50 characters"))]
    pub timezone: Option<String>,
}

fn validate_https_endpoint(endpoint: &str) -> Result<(), ValidationError> {
    if endpoint.starts_with("https://") {
        Ok(())
    } else {
        Err(ValidationError::new("endpoint").with_message("endpoint must be an HTTPS URL".into()))
    }
}

/// Subscription representation returned to producers.
#[derive(Debug, Serialize)]
pub struct SubscriptionResponse {
    /// Subscription ID.
    pub id: Uuid,
    /// Owning user.
    pub user_id: String,
    /// Push endpoint URL.
    pub endpoint: String,
    /// Delivery eligibility.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: String,
}

impl From<device_subscription::Model> for SubscriptionResponse {
    fn from(model: device_subscription::Model) -> Self {
        Self {
            id: model.id,
            user_id: model.user_id,
            endpoint: model.endpoint,
            is_active: model.is_active,
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

/// Register a device subscription; idempotent on the endpoint.
///
/// 201 for a new row, 200 when the endpoint was already registered.
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterSubscriptionRequest>,
) -> AppResult<(StatusCode, Json<SubscriptionResponse>)> {
    request.validate()?;

    let outcome = state
        .subscription_service
        .register(RegisterInput {
            user_id: request.user_id,
            endpoint: request.endpoint,
            p256dh: request.keys.p256dh,
            auth: request.keys.auth,
            device_id: request.device_id,
            user_agent: request.user_agent,
            locale: request.locale,
            timezone: request.timezone,
        })
        .await?;

    let code = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((code, Json(SubscriptionResponse::from(outcome.subscription))))
}

/// Unregister a subscription (soft delete). 204 on success, 404 when unknown.
async fn unregister(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    state.subscription_service.unregister(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(register))
        .route("/{id}", delete(unregister))
}
