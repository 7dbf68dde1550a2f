use config::{Config, Environment, File};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_STOCK_TYPE: &str = "default";
const DEFAULT_SESSION_BACKEND: &str = "in-memory";
const DEFAULT_SESSION_NAMESPACE: &str = "basket:session";
const DEFAULT_SESSION_TTL_SECS: u64 = 30 * 24 * 60 * 60; // carts expire after 30 days
const DEFAULT_REDIS_URL: &str = "redis://localhost:6379";
const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("configuration validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Session store configuration
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Backend to use: "in-memory" or "redis"
    #[serde(default = "default_session_backend")]
    pub backend: String,

    /// Redis connection URL for the session store
    #[serde(default = "default_redis_url")]
    pub redis_url: String,

    /// Prefix for session keys
    #[serde(default = "default_session_namespace")]
    #[validate(length(min = 1))]
    pub namespace: String,

    /// Time to live for stored baskets in seconds, none for no expiry
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: Option<u64>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            backend: default_session_backend(),
            redis_url: default_redis_url(),
            namespace: default_session_namespace(),
            ttl_secs: default_session_ttl(),
        }
    }
}

/// Application configuration for the basket layer
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Currency assumed for empty baskets
    #[serde(default = "default_currency")]
    #[validate(length(equal = 3))]
    pub default_currency: String,

    /// Stock type used when the caller doesn't pass one
    #[serde(default = "default_stock_type")]
    #[validate(length(min = 1))]
    pub default_stock_type: String,

    /// Basket value from which delivery is free, none to disable
    #[serde(default)]
    pub free_delivery_threshold: Option<Decimal>,

    /// Capacity of the mutation event channel
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    #[serde(default)]
    #[validate]
    pub session: SessionConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            default_currency: default_currency(),
            default_stock_type: default_stock_type(),
            free_delivery_threshold: None,
            event_channel_capacity: default_event_channel_capacity(),
            session: SessionConfig::default(),
        }
    }
}

impl AppConfig {
    /// Loads the configuration from an optional file plus `BASKET_*`
    /// environment overrides (e.g. `BASKET_SESSION__REDIS_URL`).
    pub fn load(path: Option<&str>) -> Result<Self, ConfigLoadError> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }

        let settings = builder
            .add_source(Environment::with_prefix("BASKET").separator("__"))
            .build()?;

        let config: AppConfig = settings.try_deserialize()?;
        config.validate()?;

        info!(
            backend = %config.session.backend,
            namespace = %config.session.namespace,
            "basket configuration loaded"
        );
        Ok(config)
    }
}

fn default_currency() -> String {
    DEFAULT_CURRENCY.to_string()
}

fn default_stock_type() -> String {
    DEFAULT_STOCK_TYPE.to_string()
}

fn default_session_backend() -> String {
    DEFAULT_SESSION_BACKEND.to_string()
}

fn default_session_namespace() -> String {
    DEFAULT_SESSION_NAMESPACE.to_string()
}

fn default_session_ttl() -> Option<u64> {
    Some(DEFAULT_SESSION_TTL_SECS)
}

fn default_redis_url() -> String {
    DEFAULT_REDIS_URL.to_string()
}

fn default_event_channel_capacity() -> usize {
    DEFAULT_EVENT_CHANNEL_CAPACITY
}
