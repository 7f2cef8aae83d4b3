//! Storage abstractions for the service layer
//!
//! The sample keeps its state in one flat string map that is loaded and
//! saved as a whole. Backends perform no locking; callers own the
//! read-modify-write cycle.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::errors::ServiceError;

pub mod json_file_store;
pub mod memory;

pub use json_file_store::JsonFileStore;
pub use memory::MemoryStore;

pub type StoreMap = HashMap<String, String>;

#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Whole persisted map; empty if nothing was ever saved.
    async fn load(&self) -> Result<StoreMap, ServiceError>;

    /// Replace the persisted map with `map`.
    async fn save(&self, map: &StoreMap) -> Result<(), ServiceError>;

    async fn get(&self, key: &str) -> Result<Option<String>, ServiceError> {
        Ok(self.load().await?.remove(key))
    }

    /// Load, set one key, save. Not atomic with respect to other writers.
    async fn set(&self, key: String, value: String) -> Result<(), ServiceError> {
        let mut map = self.load().await?;
        map.insert(key, value);
        self.save(&map).await
    }
}
