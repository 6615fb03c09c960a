//! Application configuration.

use serde::Deserialize;

/// Application configuration, loaded from the environment.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Port the HTTP API binds to.
    #[serde(default = "default_port")]
    pub port: u16,

    /// `PostgreSQL` connection URL.
    pub database_url: String,

    /// Maximum number of connections in the database pool.
    #[serde(default = "default_database_max_connections")]
    pub database_max_connections: u32,

    /// Minimum number of connections in the database pool.
    #[serde(default = "default_database_min_connections")]
    pub database_min_connections: u32,

    /// Redis address for the task broker (`host:port` or a full URL).
    #[serde(default = "default_redis_addr")]
    pub redis_addr: String,

    /// VAPID public key (base64url, uncompressed P-256 point).
    pub vapid_public_key: String,

    /// VAPID private key (base64url, raw scalar).
    pub vapid_private_key: String,

    /// VAPID subject claim, typically a `mailto:` or `https:` URL.
    #[serde(default = "default_vapid_subject")]
    pub vapid_subject: String,

    /// Shared secret for producer request signing.
    pub hmac_secret: String,

    /// Log level filter (`error`, `warn`, `info`, `debug`, `trace`).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Allowed CORS origins. Empty means permissive (development only).
    #[serde(default)]
    pub cors_allowed_origins: Vec<String>,

    /// Total delivery worker concurrency across all queues.
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Maximum broker retries per delivery task.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-attempt timeout for the push HTTP call, in seconds.
    #[serde(default = "default_push_timeout_secs")]
    pub push_timeout_secs: u64,

    /// Deadline for draining in-flight work on shutdown, in seconds.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
}

const fn default_port() -> u16 {
    8080
}

const fn default_database_max_connections() -> u32 {
    25
}

const fn default_database_min_connections() -> u32 {
    5
}

fn default_redis_addr() -> String {
    "localhost:6379".to_string()
}

fn default_vapid_subject() -> String {
    "mailto:admin@example.com".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_worker_concurrency() -> usize {
    10
}

const fn default_max_retries() -> u32 {
    3
}

const fn default_push_timeout_secs() -> u64 {
    30
}

const fn default_shutdown_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Required: `DATABASE_URL`, `VAPID_PUBLIC_KEY`, `VAPID_PRIVATE_KEY`,
    /// `HMAC_SECRET`. Everything else has a default.
    pub fn load() -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(
                config::Environment::default()
                    .try_parsing(true)
                    .list_separator(",")
                    .with_list_parse_key("cors_allowed_origins"),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Redis connection URL for the broker client.
    ///
    /// `REDIS_ADDR` accepts a bare `host:port` for parity with other
    /// deployments of this service; a full `redis://` URL passes through.
    #[must_use]
    pub fn redis_url(&self) -> String {
        if self.redis_addr.starts_with("redis://") || self.redis_addr.starts_with("rediss://") {
            self.redis_addr.clone()
        } else {
            format!("redis://{}", self.redis_addr)
        }
    }
}
