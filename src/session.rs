//! Session store backends for the basket aggregate.
//!
//! The basket travels as an opaque JSON blob keyed by customer/session id.
//! Writes are not atomic across requests: two in-flight requests for the same
//! session race at the store level, last write wins. The store is the source
//! of truth and is re-read on the next request.

use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use redis::AsyncCommands;
use tracing::debug;

use crate::entities::basket::Basket;
use crate::errors::BasketError;

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Loads the basket stored under `key`, or `None` for a fresh session.
    async fn load(&self, key: &str) -> Result<Option<Basket>, BasketError>;

    /// Writes the basket under `key`, replacing any previous state.
    async fn store(&self, key: &str, basket: &Basket) -> Result<(), BasketError>;

    async fn remove(&self, key: &str) -> Result<(), BasketError>;
}

/// Process-local session store, used by tests and single-node embeddings.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    entries: DashMap<String, String>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn load(&self, key: &str) -> Result<Option<Basket>, BasketError> {
        match self.entries.get(key) {
            Some(entry) => Ok(Some(serde_json::from_str(entry.value())?)),
            None => Ok(None),
        }
    }

    async fn store(&self, key: &str, basket: &Basket) -> Result<(), BasketError> {
        let blob = serde_json::to_string(basket)?;
        self.entries.insert(key.to_string(), blob);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BasketError> {
        self.entries.remove(key);
        Ok(())
    }
}

/// Redis-backed session store with per-entry TTL.
#[derive(Clone)]
pub struct RedisSessionStore {
    manager: redis::aio::ConnectionManager,
    namespace: String,
    ttl: Option<Duration>,
}

impl RedisSessionStore {
    /// Connects to redis and namespaces every key with `namespace`.
    pub async fn connect(
        url: &str,
        namespace: impl Into<String>,
        ttl: Option<Duration>,
    ) -> Result<Self, BasketError> {
        let client = redis::Client::open(url)?;
        let manager = client.get_tokio_connection_manager().await?;
        Ok(Self {
            manager,
            namespace: namespace.into(),
            ttl,
        })
    }

    fn namespaced(&self, key: &str) -> String {
        format!("{}:{}", self.namespace, key)
    }
}

#[async_trait]
impl SessionStore for RedisSessionStore {
    async fn load(&self, key: &str) -> Result<Option<Basket>, BasketError> {
        let mut conn = self.manager.clone();
        let blob: Option<String> = conn.get(self.namespaced(key)).await?;
        match blob {
            Some(blob) => Ok(Some(serde_json::from_str(&blob)?)),
            None => Ok(None),
        }
    }

    async fn store(&self, key: &str, basket: &Basket) -> Result<(), BasketError> {
        let blob = serde_json::to_string(basket)?;
        let key = self.namespaced(key);
        let mut conn = self.manager.clone();
        match self.ttl {
            Some(ttl) => {
                let _: () = conn.set_ex(&key, blob, ttl.as_secs() as usize).await?;
            }
            None => {
                let _: () = conn.set(&key, blob).await?;
            }
        }
        debug!(%key, "stored basket session");
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BasketError> {
        let mut conn = self.manager.clone();
        let _: () = conn.del(self.namespaced(key)).await?;
        Ok(())
    }
}
