//! Web Push client.
//!
//! One operation: a VAPID-signed, aes128gcm-encrypted POST to a vendor push
//! endpoint. The `web-push` crate builds the encrypted message and the VAPID
//! assertion; the request itself goes through `reqwest` so the raw HTTP
//! status and wall-clock latency stay observable for the attempt ledger.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use uuid::Uuid;
use web_push::{ContentEncoding, SubscriptionInfo, VapidSignatureBuilder, WebPushMessageBuilder};

use crate::services::notification::Priority;
use pushgate_common::{AppError, AppResult, Timer};
use pushgate_db::entities::notification;

/// Fallback TTL when the notification carries none.
pub const DEFAULT_TTL_SECONDS: u32 = 3600;

/// Push message urgency, forwarded to the vendor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Urgency {
    /// Deliver opportunistically.
    Low,
    /// Deliver without delay-tolerance hints.
    Normal,
    /// Wake the device if needed.
    High,
}

impl Urgency {
    /// Header value per the Web Push protocol.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl From<Priority> for Urgency {
    fn from(priority: Priority) -> Self {
        match priority {
            Priority::Low => Self::Low,
            Priority::Normal => Self::Normal,
            Priority::High | Priority::Critical => Self::High,
        }
    }
}

/// One push call: target subscription credentials plus message parameters.
#[derive(Debug, Clone)]
pub struct PushRequest {
    /// Vendor push endpoint URL.
    pub endpoint: String,
    /// Subscription P256DH public key (base64url).
    pub p256dh: String,
    /// Subscription auth secret (base64url).
    pub auth: String,
    /// TTL header value.
    pub ttl_seconds: u32,
    /// Urgency header value.
    pub urgency: Urgency,
    /// Serialized push payload, encrypted before sending.
    pub payload: Vec<u8>,
}

/// Raw outcome of one push call.
#[derive(Debug, Clone)]
pub struct PushOutcome {
    /// HTTP status from the vendor; absent on transport errors and timeouts.
    pub http_status: Option<u16>,
    /// Transport error description, when `http_status` is absent.
    pub error: Option<String>,
    /// Wall-clock latency of the call.
    pub elapsed: Duration,
}

/// Classified verdict for a push outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    /// 2xx: the vendor accepted the message.
    Delivered,
    /// 404 or 410: the subscription is dead, prune it.
    Pruned,
    /// Other 4xx: permanent rejection, no retry, no prune.
    PermanentFailure,
    /// 5xx, transport error, or timeout: worth retrying.
    RetryableFailure,
}

impl Verdict {
    /// Attempt ledger status for this verdict.
    #[must_use]
    pub const fn attempt_status(self) -> &'static str {
        match self {
            Self::Delivered => "delivered",
            Self::Pruned | Self::PermanentFailure | Self::RetryableFailure => "failed",
        }
    }

    /// Whether the target subscription should be deactivated.
    #[must_use]
    pub const fn prunes_subscription(self) -> bool {
        matches!(self, Self::Pruned)
    }

    /// Whether the broker should re-invoke the task.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::RetryableFailure)
    }
}

/// Classify a push outcome per the vendor-response table.
#[must_use]
pub fn classify(outcome: &PushOutcome) -> Verdict {
    match outcome.http_status {
        Some(status) if (200..300).contains(&status) => Verdict::Delivered,
        Some(404 | 410) => Verdict::Pruned,
        Some(status) if (400..500).contains(&status) => Verdict::PermanentFailure,
        // 5xx, unexpected 1xx/3xx, or no status at all (transport error).
        Some(_) | None => Verdict::RetryableFailure,
    }
}

/// JSON payload emitted to the subscriber's service worker.
#[derive(Debug, Clone, Serialize)]
pub struct PushPayload {
    /// Source notification.
    pub notification_id: Uuid,
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
}

impl PushPayload {
    /// Build the payload from a notification row.
    #[must_use]
    pub fn from_notification(notification: &notification::Model) -> Self {
        Self {
            notification_id: notification.id,
            kind: notification.kind.clone(),
            title: notification.title.clone(),
            body: notification.body.clone(),
            icon: notification.icon.clone(),
            url: notification.url.clone(),
            locale: notification.locale.clone(),
            data: notification.data.clone(),
        }
    }

    /// Serialize to the bytes handed to the push client.
    pub fn to_bytes(&self) -> AppResult<Vec<u8>> {
        serde_json::to_vec(self)
            .map_err(|e| AppError::Internal(format!("Failed to serialize push payload: {e}")))
    }
}

/// Trait for performing one push call.
///
/// Abstracted so the delivery worker can run against a mock vendor in tests.
#[async_trait]
pub trait PushClient: Send + Sync {
    /// Perform one push call.
    ///
    /// # Errors
    /// Returns an error only for local, permanent failures (bad key
    /// material, unserializable message). Transport failures come back as an
    /// `Ok` outcome without an HTTP status.
    async fn send(&self, request: PushRequest) -> AppResult<PushOutcome>;
}

/// VAPID-authenticated Web Push sender.
#[derive(Clone)]
pub struct WebPushSender {
    vapid_private_key: String,
    vapid_subject: String,
    http: reqwest::Client,
}

impl WebPushSender {
    /// Create a new sender.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be initialized.
    pub fn new(
        vapid_private_key: String,
        vapid_subject: String,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create push HTTP client: {e}")))?;

        Ok(Self {
            vapid_private_key,
            vapid_subject,
            http,
        })
    }
}

#[async_trait]
impl PushClient for WebPushSender {
    async fn send(&self, request: PushRequest) -> AppResult<PushOutcome> {
        let timer = Timer::start();

        let subscription_info =
            SubscriptionInfo::new(&request.endpoint, &request.p256dh, &request.auth);

        let mut sig_builder = VapidSignatureBuilder::from_base64(
            &self.vapid_private_key,
            web_push::URL_SAFE_NO_PAD,
            &subscription_info,
        )
        .map_err(|e| AppError::Push(format!("Failed to create VAPID signature builder: {e}")))?;

        sig_builder.add_claim("sub", self.vapid_subject.clone());

        let signature = sig_builder
            .build()
            .map_err(|e| AppError::Push(format!("Failed to build VAPID signature: {e}")))?;

        let mut message_builder = WebPushMessageBuilder::new(&subscription_info);
        message_builder.set_payload(ContentEncoding::Aes128Gcm, &request.payload);
        message_builder.set_vapid_signature(signature);
        message_builder.set_ttl(request.ttl_seconds);

        let message = message_builder
            .build()
            .map_err(|e| AppError::Push(format!("Failed to build Web Push message: {e}")))?;

        let mut http_request = self
            .http
            .post(message.endpoint.to_string())
            .header("TTL", message.ttl)
            .header("Urgency", request.urgency.as_str());

        if let Some(payload) = message.payload {
            for (name, value) in payload.crypto_headers {
                http_request = http_request.header(name, value);
            }
            http_request = http_request
                .header(
                    reqwest::header::CONTENT_ENCODING,
                    payload.content_encoding.to_str(),
                )
                .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
                .body(payload.content);
        }

        match http_request.send().await {
            Ok(response) => Ok(PushOutcome {
                http_status: Some(response.status().as_u16()),
                error: None,
                elapsed: timer.elapsed(),
            }),
            Err(e) => {
                let error = if e.is_timeout() {
                    "push request timed out".to_string()
                } else {
                    format!("transport error: {e}")
                };
                Ok(PushOutcome {
                    http_status: None,
                    error: Some(error),
                    elapsed: timer.elapsed(),
                })
            }
        }
    }
}
