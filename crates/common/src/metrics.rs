//! Metrics collection for pushgate.
//!
//! Provides application-level counters for monitoring the admission path,
//! the delivery pipeline, and subscription churn.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Global metrics instance.
static METRICS: std::sync::OnceLock<Arc<Metrics>> = std::sync::OnceLock::new();

/// Get the global metrics instance.
pub fn get_metrics() -> &'static Arc<Metrics> {
    METRICS.get_or_init(|| Arc::new(Metrics::new()))
}

/// Application metrics collector.
#[derive(Debug)]
pub struct Metrics {
    // === Request Metrics ===
    /// Total HTTP requests received
    pub http_requests_total: AtomicU64,
    /// Active HTTP requests
    pub http_requests_active: AtomicU64,
    /// HTTP requests by status code category (2xx, 4xx, 5xx)
    pub http_requests_2xx: AtomicU64,
    pub http_requests_4xx: AtomicU64,
    pub http_requests_5xx: AtomicU64,
    /// Total request latency in microseconds
    pub http_request_latency_us_total: AtomicU64,
    /// Request count for average calculation
    pub http_request_latency_count: AtomicU64,

    // === Admission Metrics ===
    /// Notifications accepted (new rows created)
    pub notifications_accepted: AtomicU64,
    /// Idempotent replays returned without side effect
    pub notifications_replayed: AtomicU64,

    // === Subscription Metrics ===
    /// Subscriptions registered
    pub subscriptions_registered: AtomicU64,
    /// Subscriptions deactivated (unregister or terminal vendor verdict)
    pub subscriptions_deactivated: AtomicU64,

    // === Job Queue Metrics ===
    /// Delivery tasks enqueued
    pub jobs_enqueued: AtomicU64,
    /// Tasks acknowledged to the broker
    pub jobs_completed: AtomicU64,
    /// Tasks returned to the broker for retry
    pub jobs_failed: AtomicU64,

    // === Delivery Metrics ===
    /// Push attempts that reached the vendor with a 2xx
    pub deliveries_delivered: AtomicU64,
    /// Push attempts that failed (any non-2xx or transport error)
    pub deliveries_failed: AtomicU64,
    /// Attempts that ended with the subscription pruned
    pub deliveries_pruned: AtomicU64,
    /// Attempts skipped because the subscription was gone or inactive
    pub deliveries_skipped: AtomicU64,
    /// Total push latency in microseconds
    pub push_latency_us_total: AtomicU64,
    /// Push count for average calculation
    pub push_latency_count: AtomicU64,
}

impl Metrics {
    /// Create a new metrics instance with all counters at zero.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            http_requests_total: AtomicU64::new(0),
            http_requests_active: AtomicU64::new(0),
            http_requests_2xx: AtomicU64::new(0),
            http_requests_4xx: AtomicU64::new(0),
            http_requests_5xx: AtomicU64::new(0),
            http_request_latency_us_total: AtomicU64::new(0),
            http_request_latency_count: AtomicU64::new(0),

            notifications_accepted: AtomicU64::new(0),
            notifications_replayed: AtomicU64::new(0),

            subscriptions_registered: AtomicU64::new(0),
            subscriptions_deactivated: AtomicU64::new(0),

            jobs_enqueued: AtomicU64::new(0),
            jobs_completed: AtomicU64::new(0),
            jobs_failed: AtomicU64::new(0),

            deliveries_delivered: AtomicU64::new(0),
            deliveries_failed: AtomicU64::new(0),
            deliveries_pruned: AtomicU64::new(0),
            deliveries_skipped: AtomicU64::new(0),
            push_latency_us_total: AtomicU64::new(0),
            push_latency_count: AtomicU64::new(0),
        }
    }

    /// Record an HTTP request.
    pub fn record_http_request(&self, status_code: u16, latency: Duration) {
        self.http_requests_total.fetch_add(1, Ordering::Relaxed);

        match status_code {
            200..=299 => self.http_requests_2xx.fetch_add(1, Ordering::Relaxed),
            400..=499 => self.http_requests_4xx.fetch_add(1, Ordering::Relaxed),
            500..=599 => self.http_requests_5xx.fetch_add(1, Ordering::Relaxed),
            _ => 0,
        };

        self.http_request_latency_us_total
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.http_request_latency_count
            .fetch_add(1, Ordering::Relaxed);
    }

    /// Start tracking an active request.
    pub fn start_request(&self) {
        self.http_requests_active.fetch_add(1, Ordering::Relaxed);
    }

    /// End tracking an active request.
    pub fn end_request(&self) {
        self.http_requests_active.fetch_sub(1, Ordering::Relaxed);
    }

    /// Record a push attempt outcome with its wall-clock latency.
    pub fn record_push(&self, delivered: bool, latency: Duration) {
        if delivered {
            self.deliveries_delivered.fetch_add(1, Ordering::Relaxed);
        } else {
            self.deliveries_failed.fetch_add(1, Ordering::Relaxed);
        }
        self.push_latency_us_total
            .fetch_add(latency.as_micros() as u64, Ordering::Relaxed);
        self.push_latency_count.fetch_add(1, Ordering::Relaxed);
    }

    /// Get a snapshot of all metrics.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            http_requests_total: self.http_requests_total.load(Ordering::Relaxed),
            http_requests_active: self.http_requests_active.load(Ordering::Relaxed),
            http_requests_2xx: self.http_requests_2xx.load(Ordering::Relaxed),
            http_requests_4xx: self.http_requests_4xx.load(Ordering::Relaxed),
            http_requests_5xx: self.http_requests_5xx.load(Ordering::Relaxed),
            http_request_latency_avg_us: self.average_latency_us(),

            notifications_accepted: self.notifications_accepted.load(Ordering::Relaxed),
            notifications_replayed: self.notifications_replayed.load(Ordering::Relaxed),

            subscriptions_registered: self.subscriptions_registered.load(Ordering::Relaxed),
            subscriptions_deactivated: self.subscriptions_deactivated.load(Ordering::Relaxed),

            jobs_enqueued: self.jobs_enqueued.load(Ordering::Relaxed),
            jobs_completed: self.jobs_completed.load(Ordering::Relaxed),
            jobs_failed: self.jobs_failed.load(Ordering::Relaxed),

            deliveries_delivered: self.deliveries_delivered.load(Ordering::Relaxed),
            deliveries_failed: self.deliveries_failed.load(Ordering::Relaxed),
            deliveries_pruned: self.deliveries_pruned.load(Ordering::Relaxed),
            deliveries_skipped: self.deliveries_skipped.load(Ordering::Relaxed),
            push_latency_avg_us: self.average_push_latency_us(),
        }
    }

    /// Calculate average HTTP request latency.
    fn average_latency_us(&self) -> u64 {
        let total = self.http_request_latency_us_total.load(Ordering::Relaxed);
        let count = self.http_request_latency_count.load(Ordering::Relaxed);
        if count > 0 { total / count } else { 0 }
    }

    /// Calculate average push latency.
    fn average_push_latency_us(&self) -> u64 {
        let total = self.push_latency_us_total.load(Ordering::Relaxed);
        let count = self.push_latency_count.load(Ordering::Relaxed);
        if count > 0 { total / count } else { 0 }
    }

    /// Export metrics in Prometheus format.
    #[must_use]
    pub fn to_prometheus(&self) -> String {
        let snapshot = self.snapshot();
        let mut output = String::new();

        output.push_str("# HELP pushgate_http_requests_total Total HTTP requests\n");
        output.push_str("# TYPE pushgate_http_requests_total counter\n");
        output.push_str(&format!(
            "pushgate_http_requests_total {}\n",
            snapshot.http_requests_total
        ));

        output.push_str("# HELP pushgate_http_requests_active Active HTTP requests\n");
        output.push_str("# TYPE pushgate_http_requests_active gauge\n");
        output.push_str(&format!(
            "pushgate_http_requests_active {}\n",
            snapshot.http_requests_active
        ));

        output.push_str("# HELP pushgate_http_requests_by_status HTTP requests by status\n");
        output.push_str("# TYPE pushgate_http_requests_by_status counter\n");
        output.push_str(&format!(
            "pushgate_http_requests_by_status{{status=\"2xx\"}} {}\n",
            snapshot.http_requests_2xx
        ));
        output.push_str(&format!(
            "pushgate_http_requests_by_status{{status=\"4xx\"}} {}\n",
            snapshot.http_requests_4xx
        ));
        output.push_str(&format!(
            "pushgate_http_requests_by_status{{status=\"5xx\"}} {}\n",
            snapshot.http_requests_5xx
        ));

        output.push_str("# HELP pushgate_http_request_latency_avg_us Average request latency\n");
        output.push_str("# TYPE pushgate_http_request_latency_avg_us gauge\n");
        output.push_str(&format!(
            "pushgate_http_request_latency_avg_us {}\n",
            snapshot.http_request_latency_avg_us
        ));

        output.push_str("# HELP pushgate_notifications_accepted Notifications accepted\n");
        output.push_str("# TYPE pushgate_notifications_accepted counter\n");
        output.push_str(&format!(
            "pushgate_notifications_accepted {}\n",
            snapshot.notifications_accepted
        ));

        output.push_str("# HELP pushgate_notifications_replayed Idempotent replays\n");
        output.push_str("# TYPE pushgate_notifications_replayed counter\n");
        output.push_str(&format!(
            "pushgate_notifications_replayed {}\n",
            snapshot.notifications_replayed
        ));

        output.push_str("# HELP pushgate_subscriptions_registered Subscriptions registered\n");
        output.push_str("# TYPE pushgate_subscriptions_registered counter\n");
        output.push_str(&format!(
            "pushgate_subscriptions_registered {}\n",
            snapshot.subscriptions_registered
        ));

        output.push_str("# HELP pushgate_subscriptions_deactivated Subscriptions deactivated\n");
        output.push_str("# TYPE pushgate_subscriptions_deactivated counter\n");
        output.push_str(&format!(
            "pushgate_subscriptions_deactivated {}\n",
            snapshot.subscriptions_deactivated
        ));

        output.push_str("# HELP pushgate_jobs_enqueued Delivery tasks enqueued\n");
        output.push_str("# TYPE pushgate_jobs_enqueued counter\n");
        output.push_str(&format!("pushgate_jobs_enqueued {}\n", snapshot.jobs_enqueued));

        output.push_str("# HELP pushgate_jobs_completed Delivery tasks acknowledged\n");
        output.push_str("# TYPE pushgate_jobs_completed counter\n");
        output.push_str(&format!(
            "pushgate_jobs_completed {}\n",
            snapshot.jobs_completed
        ));

        output.push_str("# HELP pushgate_jobs_failed Delivery tasks returned for retry\n");
        output.push_str("# TYPE pushgate_jobs_failed counter\n");
        output.push_str(&format!("pushgate_jobs_failed {}\n", snapshot.jobs_failed));

        output.push_str("# HELP pushgate_deliveries_by_outcome Push attempts by outcome\n");
        output.push_str("# TYPE pushgate_deliveries_by_outcome counter\n");
        output.push_str(&format!(
            "pushgate_deliveries_by_outcome{{outcome=\"delivered\"}} {}\n",
            snapshot.deliveries_delivered
        ));
        output.push_str(&format!(
            "pushgate_deliveries_by_outcome{{outcome=\"failed\"}} {}\n",
            snapshot.deliveries_failed
        ));
        output.push_str(&format!(
            "pushgate_deliveries_by_outcome{{outcome=\"pruned\"}} {}\n",
            snapshot.deliveries_pruned
        ));
        output.push_str(&format!(
            "pushgate_deliveries_by_outcome{{outcome=\"skipped\"}} {}\n",
            snapshot.deliveries_skipped
        ));

        output.push_str("# HELP pushgate_push_latency_avg_us Average push latency\n");
        output.push_str("# TYPE pushgate_push_latency_avg_us gauge\n");
        output.push_str(&format!(
            "pushgate_push_latency_avg_us {}\n",
            snapshot.push_latency_avg_us
        ));

        output
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of all metrics at a point in time.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    // HTTP
    pub http_requests_total: u64,
    pub http_requests_active: u64,
    pub http_requests_2xx: u64,
    pub http_requests_4xx: u64,
    pub http_requests_5xx: u64,
    pub http_request_latency_avg_us: u64,

    // Admission
    pub notifications_accepted: u64,
    pub notifications_replayed: u64,

    // Subscriptions
    pub subscriptions_registered: u64,
    pub subscriptions_deactivated: u64,

    // Jobs
    pub jobs_enqueued: u64,
    pub jobs_completed: u64,
    pub jobs_failed: u64,

    // Deliveries
    pub deliveries_delivered: u64,
    pub deliveries_failed: u64,
    pub deliveries_pruned: u64,
    pub deliveries_skipped: u64,
    pub push_latency_avg_us: u64,
}

/// Timer guard for measuring operation duration.
pub struct Timer {
    start: Instant,
}

impl Timer {
    /// Start a new timer.
    #[must_use]
    pub fn start() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get elapsed duration since timer start.
    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}
