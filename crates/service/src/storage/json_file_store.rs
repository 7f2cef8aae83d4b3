use std::{io::ErrorKind, path::PathBuf};

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;

use super::{KeyValueStore, StoreMap};
use crate::errors::ServiceError;

/// JSON file-backed key-value map.
///
/// The file holds one JSON object of strings and is rewritten in full on
/// every save. It is created lazily by the first save; a missing file loads as
/// an empty map, an unparsable one is an error.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    file_path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { file_path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.file_path
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    async fn load(&self) -> Result<StoreMap, ServiceError> {
        let bytes = match fs::read(&self.file_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(StoreMap::new()),
            Err(e) => return Err(ServiceError::io(&format!("read {}", self.file_path.display()), e)),
        };
        serde_json::from_slice(&bytes)
            .map_err(|e| ServiceError::io(&format!("parse {}", self.file_path.display()), e))
    }

    async fn save(&self, map: &StoreMap) -> Result<(), ServiceError> {
        if let Some(parent) = self.file_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| ServiceError::io(&format!("create {}", parent.display()), e))?;
        }
        let data = serde_json::to_vec(map).map_err(|e| ServiceError::io("serialize store", e))?;
        fs::write(&self.file_path, data)
            .await
            .map_err(|e| ServiceError::io(&format!("write {}", self.file_path.display()), e))?;
        debug!(path = %self.file_path.display(), entries = map.len(), "store saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tmp_path() -> PathBuf {
        std::env::temp_dir().join(format!("pc_store_{}", uuid::Uuid::new_v4())).join("storage.json")
    }

    #[tokio::test]
    async fn missing_file_loads_empty_and_is_created_on_first_save() -> Result<(), anyhow::Error> {
        let path = tmp_path();
        let store = JsonFileStore::new(&path);

        assert!(store.load().await?.is_empty());
        assert!(store.get("tx-1").await?.is_none());
        assert!(fs::metadata(&path).await.is_err(), "reads must not create the file");

        store.set("tx-1".into(), "created".into()).await?;
        store.set("tx-2".into(), "declined".into()).await?;
        store.set("tx-1".into(), "confirmed".into()).await?;

        // a fresh handle sees the persisted state
        let reloaded = JsonFileStore::new(&path).load().await?;
        assert_eq!(reloaded.len(), 2);
        assert_eq!(reloaded["tx-1"], "confirmed");

        let raw: serde_json::Value = serde_json::from_slice(&fs::read(&path).await?)?;
        assert_eq!(raw["tx-2"], "declined");

        let _ = fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error_not_an_empty_map() -> Result<(), anyhow::Error> {
        let path = tmp_path();
        fs::create_dir_all(path.parent().unwrap()).await?;
        fs::write(&path, b"{not json").await?;

        let store = JsonFileStore::new(&path);
        assert!(matches!(store.load().await, Err(ServiceError::Io(_))));

        fs::write(&path, br#"{"tx": 3}"#).await?;
        assert!(matches!(store.load().await, Err(ServiceError::Io(_))));

        let _ = fs::remove_dir_all(path.parent().unwrap()).await;
        Ok(())
    }
}
