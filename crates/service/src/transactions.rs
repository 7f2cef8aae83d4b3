use std::{fmt, str::FromStr, sync::Arc};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::storage::KeyValueStore;

/// Lifecycle of a PC transaction: `created`, then `confirmed` or `declined`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Created,
    Confirmed,
    Declined,
}

impl Status {
    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Created => "created",
            Status::Confirmed => "confirmed",
            Status::Declined => "declined",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "created" => Ok(Status::Created),
            "confirmed" => Ok(Status::Confirmed),
            "declined" => Ok(Status::Declined),
            other => Err(ServiceError::InvalidArgument(format!("unknown transaction status `{other}`"))),
        }
    }
}

/// Transaction status bookkeeping on top of a [`KeyValueStore`].
///
/// The store maps `transaction_id -> status` and `user_id -> transaction_id`
/// (the user's most recent transaction). Both keys live in the same flat map.
///
/// The default tracker serializes its own read-modify-write cycles. Writers
/// in other processes, or other trackers on the same store, can still
/// interleave and lose updates.
///
/// # Examples
/// ```
/// use std::sync::Arc;
/// use service::storage::MemoryStore;
/// use service::transactions::{Status, TransactionStatusTracker};
/// let tracker = TransactionStatusTracker::new(Arc::new(MemoryStore::new()));
/// tokio_test::block_on(tracker.record_status(Some("user-1"), "tx-1", Status::Created)).unwrap();
/// let status = tokio_test::block_on(tracker.get_status(Some("user-1"), None)).unwrap();
/// assert_eq!(status, Some(Status::Created));
/// ```
pub struct TransactionStatusTracker {
    store: Arc<dyn KeyValueStore>,
    write_lock: Option<Mutex<()>>,
}

impl TransactionStatusTracker {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, write_lock: Some(Mutex::new(())) }
    }

    /// Tracker without in-process write serialization: concurrent
    /// `record_status` calls race and the last save wins.
    pub fn unsynchronized(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store, write_lock: None }
    }

    pub fn serializes_writes(&self) -> bool {
        self.write_lock.is_some()
    }

    /// Store `status` for `transaction_id` and, when given, point `user_id`
    /// at this transaction. Both keys are written in one load/modify/save cycle.
    #[instrument(skip(self))]
    pub async fn record_status(
        &self,
        user_id: Option<&str>,
        transaction_id: &str,
        status: Status,
    ) -> Result<(), ServiceError> {
        if transaction_id.trim().is_empty() {
            return Err(ServiceError::InvalidArgument("transaction id is empty".into()));
        }

        let _guard = match &self.write_lock {
            Some(lock) => Some(lock.lock().await),
            None => None,
        };

        let mut map = self.store.load().await?;
        map.insert(transaction_id.to_string(), status.as_str().to_string());
        if let Some(user_id) = user_id {
            map.insert(user_id.to_string(), transaction_id.to_string());
        }
        self.store.save(&map).await?;

        info!(%status, "transaction_status_recorded");
        Ok(())
    }

    /// Look up a status by transaction id, or by user id through the user's
    /// last transaction. A user id takes precedence when both are given.
    /// Returns `None` when either hop misses, including a transaction id
    /// that turns out to be a user's pointer entry.
    #[instrument(skip(self))]
    pub async fn get_status(
        &self,
        user_id: Option<&str>,
        transaction_id: Option<&str>,
    ) -> Result<Option<Status>, ServiceError> {
        if user_id.is_none() && transaction_id.is_none() {
            return Err(ServiceError::InvalidArgument(
                "either a user id or a transaction id is required".into(),
            ));
        }

        let map = self.store.load().await?;
        let transaction_id = match (user_id, transaction_id) {
            (Some(user_id), _) => match map.get(user_id) {
                Some(tx) => tx.as_str(),
                None => return Ok(None),
            },
            (None, Some(tx)) => tx,
            (None, None) => unreachable!("checked above"),
        };

        let Some(raw) = map.get(transaction_id) else { return Ok(None) };
        match raw.parse::<Status>() {
            Ok(status) => Ok(Some(status)),
            // user ids share the map and point at another key; they are not transactions
            Err(_) if map.contains_key(raw) => Ok(None),
            Err(_) => Err(ServiceError::Io(format!(
                "stored value `{raw}` for `{transaction_id}` is not a transaction status"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{JsonFileStore, MemoryStore, StoreMap};
    use async_trait::async_trait;
    use tokio::sync::Barrier;

    fn tracker() -> TransactionStatusTracker {
        TransactionStatusTracker::new(Arc::new(MemoryStore::new()))
    }

    #[tokio::test]
    async fn recorded_status_is_returned_by_transaction_id() -> Result<(), ServiceError> {
        let t = tracker();
        for (tx, status) in [("tx-a", Status::Created), ("tx-b", Status::Confirmed), ("tx-c", Status::Declined)] {
            t.record_status(None, tx, status).await?;
            assert_eq!(t.get_status(None, Some(tx)).await?, Some(status));
        }
        Ok(())
    }

    #[tokio::test]
    async fn user_id_resolves_to_last_transaction() -> Result<(), ServiceError> {
        let t = tracker();
        t.record_status(Some("sample-1"), "tx-1", Status::Created).await?;
        assert_eq!(t.get_status(Some("sample-1"), None).await?, Some(Status::Created));

        // a callback updates the transaction without knowing the user
        t.record_status(None, "tx-1", Status::Confirmed).await?;
        assert_eq!(t.get_status(Some("sample-1"), None).await?, Some(Status::Confirmed));

        // a newer transaction replaces the user's pointer
        t.record_status(Some("sample-1"), "tx-2", Status::Created).await?;
        assert_eq!(t.get_status(Some("sample-1"), None).await?, Some(Status::Created));
        assert_eq!(t.get_status(None, Some("tx-1")).await?, Some(Status::Confirmed));
        Ok(())
    }

    #[tokio::test]
    async fn unknown_ids_are_not_found() -> Result<(), ServiceError> {
        let t = tracker();
        assert_eq!(t.get_status(None, Some("nope")).await?, None);
        assert_eq!(t.get_status(Some("nobody"), None).await?, None);

        t.record_status(None, "tx-1", Status::Declined).await?;
        assert_eq!(t.get_status(Some("nobody"), Some("tx-1")).await?, None);
        Ok(())
    }

    #[tokio::test]
    async fn missing_ids_are_invalid() {
        let t = tracker();
        assert!(matches!(t.get_status(None, None).await, Err(ServiceError::InvalidArgument(_))));
        assert!(matches!(
            t.record_status(None, " ", Status::Created).await,
            Err(ServiceError::InvalidArgument(_))
        ));
    }

    #[tokio::test]
    async fn user_id_is_not_a_transaction_id() -> Result<(), ServiceError> {
        let t = tracker();
        t.record_status(Some("sample-7"), "tx-1", Status::Created).await?;
        assert_eq!(t.get_status(None, Some("sample-7")).await?, None);
        assert_eq!(t.get_status(Some("sample-7"), None).await?, Some(Status::Created));
        Ok(())
    }

    #[tokio::test]
    async fn corrupt_status_value_is_an_error() -> Result<(), ServiceError> {
        let store = Arc::new(MemoryStore::new());
        store.set("tx-1".into(), "maybe".into()).await?;
        let t = TransactionStatusTracker::new(store);
        assert!(matches!(t.get_status(None, Some("tx-1")).await, Err(ServiceError::Io(_))));
        Ok(())
    }

    #[tokio::test]
    async fn file_backed_tracker_persists_across_instances() -> Result<(), anyhow::Error> {
        let path = std::env::temp_dir().join(format!("pc_tracker_{}.json", uuid::Uuid::new_v4()));
        TransactionStatusTracker::new(Arc::new(JsonFileStore::new(&path)))
            .record_status(Some("u"), "tx", Status::Confirmed)
            .await?;
        let again = TransactionStatusTracker::new(Arc::new(JsonFileStore::new(&path)));
        assert_eq!(again.get_status(Some("u"), None).await?, Some(Status::Confirmed));
        let _ = tokio::fs::remove_file(&path).await;
        Ok(())
    }

    /// Store whose `load` waits until `parties` loads are in flight, forcing
    /// read-modify-write cycles to interleave.
    struct InterleavingStore {
        inner: MemoryStore,
        barrier: Barrier,
    }

    #[async_trait]
    impl KeyValueStore for InterleavingStore {
        async fn load(&self) -> Result<StoreMap, ServiceError> {
            let map = self.inner.load().await?;
            self.barrier.wait().await;
            Ok(map)
        }

        async fn save(&self, map: &StoreMap) -> Result<(), ServiceError> {
            self.inner.save(map).await
        }
    }

    #[tokio::test]
    async fn unsynchronized_writers_lose_updates() -> Result<(), ServiceError> {
        let store = Arc::new(InterleavingStore { inner: MemoryStore::new(), barrier: Barrier::new(2) });
        let t = TransactionStatusTracker::unsynchronized(store.clone());
        assert!(!t.serializes_writes());

        let (a, b) = tokio::join!(
            t.record_status(None, "tx-a", Status::Confirmed),
            t.record_status(None, "tx-b", Status::Declined),
        );
        a?;
        b?;

        // both cycles loaded the empty map, so only the last save survives
        assert_eq!(store.inner.load().await?.len(), 1);
        Ok(())
    }

    /// Store that yields between load and save to give other tasks a chance
    /// to run inside the cycle.
    #[derive(Default)]
    struct YieldingStore {
        inner: MemoryStore,
    }

    #[async_trait]
    impl KeyValueStore for YieldingStore {
        async fn load(&self) -> Result<StoreMap, ServiceError> {
            let map = self.inner.load().await?;
            tokio::task::yield_now().await;
            Ok(map)
        }

        async fn save(&self, map: &StoreMap) -> Result<(), ServiceError> {
            self.inner.save(map).await
        }
    }

    #[tokio::test]
    async fn serialized_writers_keep_every_update() -> Result<(), ServiceError> {
        let store = Arc::new(YieldingStore::default());
        let t = Arc::new(TransactionStatusTracker::new(store.clone()));

        let tasks: Vec<_> = (0..16)
            .map(|i| {
                let t = Arc::clone(&t);
                tokio::spawn(async move { t.record_status(None, &format!("tx-{i}"), Status::Created).await })
            })
            .collect();
        for task in tasks {
            task.await.expect("join")?;
        }

        assert_eq!(store.inner.load().await?.len(), 16);
        Ok(())
    }
}
