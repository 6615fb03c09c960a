//! API endpoints.

mod health;
mod metrics;
mod notifications;
mod push_key;
mod subscriptions;

use axum::{Router, middleware, routing::get};
use tower_http::catch_panic::CatchPanicLayer;

use crate::middleware::{AppState, require_signature, track_metrics};

/// Create the API router.
///
/// Health, metrics, and the VAPID public key are public; everything under
/// `/v1/subscriptions` and `/v1/notifications` requires a signed request.
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .nest("/v1/subscriptions", subscriptions::router())
        .nest("/v1/notifications", notifications::router())
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            require_signature,
        ));

    Router::new()
        .route("/healthz", get(health::healthz))
        .route("/metrics", get(metrics::prometheus))
        .route("/v1/push/public-key", get(push_key::public_key))
        .merge(protected)
        // Panics surface as opaque 500s, counted by the metrics layer.
        .layer(CatchPanicLayer::new())
        .layer(middleware::from_fn(track_metrics))
        .with_state(state)
}
