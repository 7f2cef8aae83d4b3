use async_trait::async_trait;
use tokio::sync::RwLock;

use super::{KeyValueStore, StoreMap};
use crate::errors::ServiceError;

/// In-memory store for tests and demos.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<StoreMap>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn load(&self) -> Result<StoreMap, ServiceError> {
        Ok(self.inner.read().await.clone())
    }

    async fn save(&self, map: &StoreMap) -> Result<(), ServiceError> {
        *self.inner.write().await = map.clone();
        Ok(())
    }
}
