//! Persistent key-value store shared by every context.
//!
//! There is no transaction isolation: callers do read-modify-write and accept that the
//! last writer wins.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::{CoreError, DatabaseError};
use crate::types::{keys, Settings};

#[async_trait]
pub trait Store: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, CoreError>;
    async fn set(&self, key: &str, value: Value) -> Result<(), CoreError>;
    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), CoreError> {
        for (key, value) in entries {
            self.set(&key, value).await?;
        }
        Ok(())
    }
    async fn remove(&self, key: &str) -> Result<(), CoreError>;
}

/// Typed accessors layered over any [`Store`].
#[async_trait]
pub trait StoreExt: Store {
    async fn get_typed<T>(&self, key: &str) -> Result<Option<T>, CoreError>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(Value::Null) | None => Ok(None),
            Some(value) => Ok(Some(serde_json::from_value(value)?)),
        }
    }

    /// Reads a value, falling back to the default when absent or unreadable.
    async fn get_or_default<T>(&self, key: &str) -> Result<T, CoreError>
    where
        T: DeserializeOwned + Default + Send,
    {
        match self.get_typed::<T>(key).await {
            Ok(value) => Ok(value.unwrap_or_default()),
            Err(CoreError::Serialization(e)) => {
                warn!("Discarding unreadable value under {}: {}", key, e);
                Ok(T::default())
            }
            Err(CoreError::Database(DatabaseError::CorruptValue { .. })) => {
                warn!("Discarding corrupt value under {}", key);
                Ok(T::default())
            }
            Err(e) => Err(e),
        }
    }

    async fn set_typed<T>(&self, key: &str, value: &T) -> Result<(), CoreError>
    where
        T: Serialize + Sync,
    {
        self.set(key, serde_json::to_value(value)?).await
    }

    async fn load_settings(&self) -> Result<Settings, CoreError> {
        let defaults = Settings::default();
        Ok(Settings {
            use_ai: self.get_or_default(keys::USE_AI).await?,
            api_key: self.get_or_default(keys::API_KEY).await?,
            api_provider: self
                .get_typed::<String>(keys::API_PROVIDER)
                .await
                .ok()
                .flatten()
                .filter(|p| !p.is_empty())
                .unwrap_or(defaults.api_provider),
            connect_x: self.get_or_default(keys::CONNECT_X).await?,
        })
    }
}

impl<S: Store + ?Sized> StoreExt for S {}

/// In-process store used by tests and ephemeral hosts.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    entries: Arc<RwLock<HashMap<String, Value>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, CoreError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> Result<(), CoreError> {
        self.entries.write().await.insert(key.to_string(), value);
        Ok(())
    }

    async fn set_many(&self, entries: Vec<(String, Value)>) -> Result<(), CoreError> {
        let mut guard = self.entries.write().await;
        for (key, value) in entries {
            guard.insert(key, value);
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), CoreError> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
