//! Producer request signing.
//!
//! Producers authenticate every protected API call with two headers:
//! `X-Timestamp` (RFC 3339) and `X-Signature`, the base64 of
//! HMAC-SHA256(secret, METHOD ∥ PATH ∥ BODY ∥ TIMESTAMP). Verification is
//! constant-time and rejects timestamps outside the skew window.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use chrono::{DateTime, TimeDelta, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Maximum tolerated clock skew between producer and service.
pub const MAX_CLOCK_SKEW: TimeDelta = TimeDelta::minutes(5);

fn mac_for(secret: &[u8], method: &str, path: &str, body: &[u8], timestamp: &str) -> HmacSha256 {
    #[allow(clippy::expect_used)] // HMAC-SHA256 accepts keys of any length
    let mut mac = HmacSha256::new_from_slice(secret).expect("HMAC accepts any key length");
    mac.update(method.as_bytes());
    mac.update(path.as_bytes());
    mac.update(body);
    mac.update(timestamp.as_bytes());
    mac
}

/// Compute the base64 signature over method + path + body + timestamp.
#[must_use]
pub fn sign_request(secret: &[u8], method: &str, path: &str, body: &[u8], timestamp: &str) -> String {
    let mac = mac_for(secret, method, path, body, timestamp);
    BASE64.encode(mac.finalize().into_bytes())
}

/// Verify a provided signature against a freshly computed one.
///
/// The comparison happens inside [`Mac::verify_slice`], which is
/// constant-time. Undecodable signatures are rejected.
#[must_use]
pub fn verify_request(
    secret: &[u8],
    method: &str,
    path: &str,
    body: &[u8],
    timestamp: &str,
    provided: &str,
) -> bool {
    let Ok(provided_bytes) = BASE64.decode(provided) else {
        return false;
    };

    let mac = mac_for(secret, method, path, body, timestamp);
    mac.verify_slice(&provided_bytes).is_ok()
}

/// Check that an RFC 3339 timestamp is within the skew window around `now`.
///
/// Malformed timestamps fail the check.
#[must_use]
pub fn timestamp_within_skew(timestamp: &str, max_skew: TimeDelta, now: DateTime<Utc>) -> bool {
    let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) else {
        return false;
    };

    let delta = now.signed_duration_since(parsed.with_timezone(&Utc));
    delta.abs() <= max_skew
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn test_sign_and_verify() {
        let timestamp = "2025-06-01T12:00:00Z";
        let body = br#"{"type":"t","user_ids":["u1"]}"#;

        let signature = sign_request(SECRET, "POST", "/v1/notifications", body, timestamp);

        assert!(verify_request(
            SECRET,
            "POST",
            "/v1/notifications",
            body,
            timestamp,
            &signature
        ));
    }

    #[test]
    fn test_tampered_body_rejected() {
        let timestamp = "2025-06-01T12:00:00Z";
        let signature = sign_request(SECRET, "POST", "/v1/notifications", b"original", timestamp);

        assert!(!verify_request(
            SECRET,
            "POST",
            "/v1/notifications",
            b"tampered",
            timestamp,
            &signature
        ));
    }

    #[test]
    fn test_wrong_method_rejected() {
        let timestamp = "2025-06-01T12:00:00Z";
        let signature = sign_request(SECRET, "POST", "/v1/notifications", b"", timestamp);

        assert!(!verify_request(
            SECRET,
            "DELETE",
            "/v1/notifications",
            b"",
            timestamp,
            &signature
        ));
    }

    #[test]
    fn test_garbage_signature_rejected() {
        assert!(!verify_request(
            SECRET,
            "POST",
            "/v1/notifications",
            b"",
            "2025-06-01T12:00:00Z",
            "not base64!!!"
        ));
    }

    #[test]
    fn test_timestamp_within_skew() {
        let now = DateTime::parse_from_rfc3339("2025-06-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);

        assert!(timestamp_within_skew("2025-06-01T12:00:00Z", MAX_CLOCK_SKEW, now));
        assert!(timestamp_within_skew("2025-06-01T11:56:00Z", MAX_CLOCK_SKEW, now));
        assert!(timestamp_within_skew("2025-06-01T12:04:59Z", MAX_CLOCK_SKEW, now));
        // Exactly ten minutes stale.
        assert!(!timestamp_within_skew(
            "2025-06-01T11:50:00Z",
            MAX_CLOCK_SKEW,
            now
        ));
        // Five minutes and one second in the future.
        assert!(!timestamp_within_skew(
            "2025-06-01T12:05:01Z",
            MAX_CLOCK_SKEW,
            now
        ));
    }

    #[test]
    fn test_malformed_timestamp_rejected() {
        let now = Utc::now();
        assert!(!timestamp_within_skew("yesterday", MAX_CLOCK_SKEW, now));
        assert!(!timestamp_within_skew("", MAX_CLOCK_SKEW, now));
    }
}
