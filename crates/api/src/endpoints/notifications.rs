//! Notification endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::middleware::AppState;
use pushgate_common::{AppError, AppResult};
use pushgate_core::{Priority, SendInput};
use pushgate_db::entities::{delivery_attempt, notification};

/// Request to send a notification.
#[derive(Debug, Deserialize, Validate)]
pub struct SendNotificationRequest {
    /// Short tag naming the kind of notification.
    #[serde(rename = "type")]
    #[validate(length(min = 1, max = 50, message = "type must be 1-50 characters"))]
    pub kind: String,
    /// Recipients.
    #[validate(
        length(min = 1, max = 1000, message = "user_ids must contain 1-1000 entries"),
        custom(function = validate_user_ids)
    )]
    pub user_ids: Vec<String>,
    /// Producer-supplied idempotency token.
    #[validate(length(max = 255, message = "idempotency_key exceeds 255 characters"))]
    pub idempotency_key: Option<String>,
    /// Display title.
    #[validate(length(max = 255, message = "title exceeds 255 characters"))]
    pub title: Option<String>,
    /// Display body.
    #[validate(length(max = 1000, message = "body exceeds 1000 characters"))]
    pub body: Option<String>,
    /// Icon URL.
    #[validate(length(max = 500, message = "icon URL exceeds 500 characters"))]
    pub icon: Option<String>,
    /// Click-through URL.
    #[validate(length(max = 500, message = "url exceeds 500 characters"))]
    pub url: Option<String>,
    /// Locale hint.
    #[validate(length(max = 10, message = "locale exceeds 10 characters"))]
    pub locale: Option<String>,
    /// Opaque producer data; must be a JSON object when present.
    pub data: Option<serde_json::Value>,
    /// Producer-supplied grouping token.
    #[validate(length(max = 255, message = "dedupe_key exceeds 255 characters"))]
    pub dedupe_key: Option<String>,
    /// Push TTL in seconds (0 ..= 28 days).
    #[validate(range(min = 0, max = 2_419_200, message = "ttl_seconds must be between 0 and 2419200"))]
    pub ttl_seconds: Option<i32>,
    /// low | normal | high | critical.
    pub priority: Option<String>,
}

fn validate_user_ids(user_ids: &[String]) -> Result<(), ValidationError> {
    for user_id in user_ids {
        if user_id.trim().is_empty() {
            return Err(ValidationError::new("user_ids")
                .with_message("user_ids entries must be non-empty".into()));
        }
        if user_id.len() > 255 {
            return Err(ValidationError::new("user_ids")
                .with_message("user_ids entries exceed 255 characters".into()));
        }
    }
    Ok(())
}

impl SendNotificationRequest {
    /// Validate and convert into the service input.
    fn into_input(self) -> AppResult<SendInput> {
        self.validate()?;

        let priority = match self.priority.as_deref() {
            None => Priority::default(),
            Some(raw) => Priority::parse(raw).ok_or_else(|| {
                AppError::Validation(
                    "priority must be one of: low, normal, high, critical".to_string(),
                )
            })?,
        };

        let data = match self.data {
            None => serde_json::json!({}),
            Some(value) if value.is_object() => value,
            Some(_) => {
                return Err(AppError::Validation("data must be a JSON object".to_string()));
            }
        };

        Ok(SendInput {
            kind: self.kind,
            user_ids: self.user_ids,
            idempotency_key: self.idempotency_key,
            title: self.title,
            body: self.body,
            icon: self.icon,
            url: self.url,
            locale: self.locale,
            data,
            dedupe_key: self.dedupe_key,
            ttl_seconds: self.ttl_seconds,
            priority,
        })
    }
}

/// Response to a send call.
#[derive(Debug, Serialize)]
pub struct SendNotificationResponse {
    /// Notification ID.
    pub id: Uuid,
    /// Notification kind tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Current status.
    pub status: String,
    /// Number of recipients.
    pub recipient_count: u64,
    /// Creation timestamp.
    pub created_at: String,
}

/// Notification details.
#[derive(Debug, Serialize)]
pub struct GetNotificationResponse {
    /// Notification ID.
    pub id: Uuid,
    /// Notification kind tag.
    #[serde(rename = "type")]
    pub kind: String,
    /// Display title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Display body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    /// Icon URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    /// Click-through URL.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Locale hint.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    /// Opaque producer data.
    pub data: serde_json::Value,
    /// Current status.
    pub status: String,
    /// Number of recipients.
    pub recipient_count: u64,
    /// Creation timestamp.
    pub created_at: String,
}

impl GetNotificationResponse {
    fn from_model(model: notification::Model, recipient_count: u64) -> Self {
        Self {
            id: model.id,
            kind: model.kind,
            title: model.title,
            body: model.body,
            icon: model.icon,
            url: model.url,
            locale: model.locale,
            data: model.data,
            status: model.status,
            recipient_count,
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

/// One delivery attempt.
#[derive(Debug, Serialize)]
pub struct AttemptResponse {
    /// Attempt ID.
    pub id: Uuid,
    /// Notification delivered.
    pub notification_id: Uuid,
    /// Target subscription, absent once hard-deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<Uuid>,
    /// Recipient user.
    pub user_id: String,
    /// delivered | failed | skipped | pruned.
    pub status: String,
    /// Vendor HTTP status.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_status: Option<i32>,
    /// Push call latency.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<i32>,
    /// Error description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Prior failed attempts for this pair.
    pub retry_count: i32,
    /// Whether this attempt deactivated the subscription.
    pub pruned: bool,
    /// Recording timestamp.
    pub created_at: String,
}

impl From<delivery_attempt::Model> for AttemptResponse {
    fn from(model: delivery_attempt::Model) -> Self {
        Self {
            id: model.id,
            notification_id: model.notification_id,
            subscription_id: model.subscription_id,
            user_id: model.user_id,
            status: model.status,
            http_status: model.http_status,
            latency_ms: model.latency_ms,
            error: model.error,
            retry_count: model.retry_count,
            pruned: model.pruned,
            created_at: model.created_at.to_rfc3339(),
        }
    }
}

/// Attempts for one notification.
#[derive(Debug, Serialize)]
pub struct ListAttemptsResponse {
    /// The notification.
    pub notification_id: Uuid,
    /// Attempts, newest first.
    pub attempts: Vec<AttemptResponse>,
    /// Attempt count.
    pub total: usize,
}

/// Admit a notification. 201 for a new row, 200 on idempotent replay.
async fn send(
    State(state): State<AppState>,
    Json(request): Json<SendNotificationRequest>,
) -> AppResult<(StatusCode, Json<SendNotificationResponse>)> {
    let input = request.into_input()?;
    let outcome = state.notification_service.send(input).await?;

    let code = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    Ok((
        code,
        Json(SendNotificationResponse {
            id: outcome.notification.id,
            kind: outcome.notification.kind,
            status: outcome.notification.status,
            recipient_count: outcome.recipient_count,
            created_at: outcome.notification.created_at.to_rfc3339(),
        }),
    ))
}

/// Fetch notification details. 404 when unknown.
async fn get_notification(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<GetNotificationResponse>> {
    let (notification, recipient_count) = state.notification_service.get(id).await?;
    Ok(Json(GetNotificationResponse::from_model(
        notification,
        recipient_count,
    )))
}

/// List delivery attempts for a notification, newest first.
async fn list_attempts(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<ListAttemptsResponse>> {
    let attempts = state.notification_service.list_attempts(id).await?;
    let attempts: Vec<AttemptResponse> = attempts.into_iter().map(AttemptResponse::from).collect();

    Ok(Json(ListAttemptsResponse {
        notification_id: id,
        total: attempts.len(),
        attempts,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", post(send))
        .route("/{id}", get(get_notification))
        .route("/{id}/attempts", get(list_attempts))
}
