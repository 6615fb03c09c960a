//! Metrics exposition.

use axum::{
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use pushgate_common::get_metrics;

/// `GET /metrics` — Prometheus text exposition.
pub async fn prometheus() -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        get_metrics().to_prometheus(),
    )
        .into_response()
}
