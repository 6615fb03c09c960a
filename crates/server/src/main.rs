//! Pushgate server entry point.
//!
//! Runs the producer API, the delivery worker pool, and the maintenance
//! sweeper in one process.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use apalis::layers::retry::{RetryLayer, RetryPolicy};
use apalis::prelude::*;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pushgate_api::{AppState, router};
use pushgate_common::Config;
use pushgate_core::{NotificationService, SubscriptionService, WebPushSender};
use pushgate_db::repositories::{AttemptRepository, NotificationRepository, SubscriptionRepository};
use pushgate_queue::{
    DeliverContext, DeliveryStorages, QueueName, RedisDeliveryQueue, RetryConfig, Sweeper,
    SweeperConfig, deliver_worker,
};

/// Waits for a shutdown signal (SIGINT or SIGTERM).
///
/// On Unix systems, this listens for both SIGINT (Ctrl+C) and SIGTERM.
/// On Windows, this only listens for Ctrl+C.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            info!("Received SIGINT, initiating graceful shutdown...");
        },
        () = terminate => {
            info!("Received SIGTERM, initiating graceful shutdown...");
        },
    }
}

async fn monitor_shutdown() -> std::io::Result<()> {
    shutdown_signal().await;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env if present (development convenience)
    let _ = dotenvy::dotenv();

    let config = Config::load()?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("pushgate={},tower_http=info", config.log_level).into()
            }),
        )
        .init();

    info!(port = config.port, "Starting pushgate server...");

    // Connect to database and run migrations
    let db = pushgate_db::init(&config).await?;
    info!("Connected to database");

    info!("Running database migrations...");
    pushgate_db::migrate(&db).await?;
    info!("Migrations completed");

    // Connect to Redis and initialize the delivery queues
    info!("Connecting to Redis...");
    let redis_client = redis::Client::open(config.redis_url())?;
    let redis_conn = redis::aio::ConnectionManager::new(redis_client).await?;
    let storages = DeliveryStorages::new(redis_conn);
    info!("Connected to Redis job queues");

    // Repositories
    let db = Arc::new(db);
    let subscription_repo = SubscriptionRepository::new(Arc::clone(&db));
    let notification_repo = NotificationRepository::new(Arc::clone(&db));
    let attempt_repo = AttemptRepository::new(Arc::clone(&db));

    // Services
    let delivery_queue = Arc::new(RedisDeliveryQueue::new(storages.clone()));
    let subscription_service = SubscriptionService::new(subscription_repo.clone());
    let notification_service = NotificationService::new(
        notification_repo.clone(),
        subscription_repo.clone(),
        attempt_repo.clone(),
        delivery_queue,
    );

    // Push sender shared by all workers
    let push_sender = WebPushSender::new(
        config.vapid_private_key.clone(),
        config.vapid_subject.clone(),
        Duration::from_secs(config.push_timeout_secs),
    )?;

    let retry = RetryConfig::with_max_retries(config.max_retries);
    let deliver_ctx = DeliverContext {
        subscriptions: subscription_repo.clone(),
        notifications: notification_repo.clone(),
        attempts: attempt_repo.clone(),
        push_client: Arc::new(push_sender),
        retry: retry.clone(),
    };

    // Delivery worker pool: slots split across the three queues by weight
    info!(
        concurrency = config.worker_concurrency,
        "Starting delivery workers..."
    );
    let max_retries = config.max_retries as usize;
    let worker_storages = storages.clone();
    let worker_concurrency = config.worker_concurrency;
    tokio::spawn(async move {
        let mut monitor = Monitor::new();

        for queue in QueueName::ALL {
            let count = queue.worker_count(worker_concurrency);
            info!(queue = %queue, workers = count, "Registering queue workers");

            for index in 0..count {
                monitor = monitor.register(
                    WorkerBuilder::new(format!("deliver-{queue}-{index}"))
                        .layer(RetryLayer::new(RetryPolicy::retries(max_retries)))
                        .data(deliver_ctx.clone())
                        .backend(worker_storages.get(queue).clone())
                        .build_fn(deliver_worker),
                );
            }
        }

        if let Err(e) = monitor.run_with_signal(monitor_shutdown()).await {
            tracing::error!(error = %e, "Delivery worker monitor failed");
        }
    });

    // Maintenance sweeper
    Sweeper::new(
        notification_repo,
        subscription_repo,
        attempt_repo,
        notification_service.clone(),
        SweeperConfig::default(),
    )
    .spawn();
    info!("Maintenance sweeper started");

    // HTTP API
    let state = AppState {
        subscription_service,
        notification_service,
        db,
        hmac_secret: config.hmac_secret.clone(),
        vapid_public_key: config.vapid_public_key.clone(),
    };

    let cors_layer = if config.cors_allowed_origins.is_empty() {
        tracing::warn!(
            "CORS_ALLOWED_ORIGINS not set, using permissive CORS. Set it for production!"
        );
        CorsLayer::permissive()
    } else {
        let origins: Vec<axum::http::HeaderValue> = config
            .cors_allowed_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let app = router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}
