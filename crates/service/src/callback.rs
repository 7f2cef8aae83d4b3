//! PC transaction callbacks.
//!
//! PC posts `{"pc_callback": {...}}` whenever a user confirms or declines a
//! transaction. Only version 3 `transaction_callback`s are accepted.

use std::sync::Arc;

use serde::Deserialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::metrics::CALLBACKS_TOTAL;
use crate::transactions::{Status, TransactionStatusTracker};

pub const TRANSACTION_CALLBACK: &str = "transaction_callback";
pub const CALLBACK_VERSION: i64 = 3;

#[derive(Debug, Deserialize)]
pub struct CallbackEnvelope {
    pub pc_callback: PcCallback,
}

#[derive(Debug, Deserialize)]
pub struct PcCallback {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub version: Option<i64>,
    #[serde(default)]
    pub result: Option<CallbackResult>,
    #[serde(default)]
    pub transaction_callback: Option<TransactionCallback>,
}

#[derive(Debug, Deserialize)]
pub struct CallbackResult {
    pub error_code: i64,
    #[serde(default)]
    pub error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct TransactionCallback {
    pub transaction_id: String,
    /// Present (and non-null) only when the user confirmed.
    #[serde(default)]
    pub confirmation: Option<Value>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CallbackOutcome {
    Recorded { transaction_id: String, status: Status },
    /// PC reported an error for the transaction; nothing was stored.
    Ignored { error_code: i64 },
}

#[derive(Debug, Error)]
pub enum CallbackError {
    #[error("rejected callback: {0}")]
    Rejected(String),
    #[error(transparent)]
    Store(#[from] ServiceError),
}

/// Validates callbacks and records the derived transaction status.
pub struct CallbackHandler {
    tracker: Arc<TransactionStatusTracker>,
}

impl CallbackHandler {
    pub fn new(tracker: Arc<TransactionStatusTracker>) -> Self {
        Self { tracker }
    }

    #[instrument(skip_all, fields(bytes = body.len()))]
    pub async fn handle(&self, body: &[u8]) -> Result<CallbackOutcome, CallbackError> {
        let res = self.process(body).await;
        let outcome = match &res {
            Ok(CallbackOutcome::Recorded { .. }) => "recorded",
            Ok(CallbackOutcome::Ignored { .. }) => "ignored",
            Err(CallbackError::Rejected(_)) => "rejected",
            Err(CallbackError::Store(_)) => "failed",
        };
        CALLBACKS_TOTAL.with_label_values(&[outcome]).inc();
        res
    }

    async fn process(&self, body: &[u8]) -> Result<CallbackOutcome, CallbackError> {
        let callback = parse(body)?;

        let result = callback
            .result
            .ok_or_else(|| CallbackError::Rejected("missing result".into()))?;
        if result.error_code != 0 {
            warn!(
                error_code = result.error_code,
                error_message = result.error_message.as_deref().unwrap_or_default(),
                transaction_id = ?callback.transaction_callback.as_ref().map(|t| &t.transaction_id),
                "callback reports an error; ignored"
            );
            return Ok(CallbackOutcome::Ignored { error_code: result.error_code });
        }

        let transaction = callback
            .transaction_callback
            .ok_or_else(|| CallbackError::Rejected("missing transaction_callback".into()))?;

        if transaction.transaction_id.trim().is_empty() {
            return Err(CallbackError::Rejected("empty transaction_id".into()));
        }

        let status = if transaction.confirmation.is_some() { Status::Confirmed } else { Status::Declined };
        self.tracker
            .record_status(None, &transaction.transaction_id, status)
            .await?;

        info!(transaction_id = %transaction.transaction_id, %status, "callback recorded");
        Ok(CallbackOutcome::Recorded { transaction_id: transaction.transaction_id, status })
    }
}

/// Decode and check the envelope: `type` and `version` must be present and
/// name a version 3 transaction callback.
pub fn parse(body: &[u8]) -> Result<PcCallback, CallbackError> {
    let envelope: CallbackEnvelope = serde_json::from_slice(body)
        .map_err(|e| CallbackError::Rejected(format!("unparsable callback: {e}")))?;
    let callback = envelope.pc_callback;

    let (Some(kind), Some(version)) = (callback.kind.as_deref(), callback.version) else {
        return Err(CallbackError::Rejected("missing type or version".into()));
    };
    if kind != TRANSACTION_CALLBACK || version != CALLBACK_VERSION {
        return Err(CallbackError::Rejected(format!("unsupported callback {kind} v{version}")));
    }
    Ok(callback)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryStore, StoreMap};
    use async_trait::async_trait;
    use serde_json::json;

    fn setup() -> (Arc<MemoryStore>, Arc<TransactionStatusTracker>, CallbackHandler) {
        let store = Arc::new(MemoryStore::new());
        let tracker = Arc::new(TransactionStatusTracker::new(store.clone()));
        let handler = CallbackHandler::new(tracker.clone());
        (store, tracker, handler)
    }

    fn callback(error_code: i64, confirmation: Option<Value>) -> Vec<u8> {
        let mut tc = json!({"transaction_id": "tx-1"});
        if let Some(c) = confirmation {
            tc["confirmation"] = c;
        }
        serde_json::to_vec(&json!({"pc_callback": {
            "type": "transaction_callback",
            "version": 3,
            "result": {"error_code": error_code, "error_message": ""},
            "transaction_callback": tc,
        }}))
        .unwrap()
    }

    #[tokio::test]
    async fn confirmation_present_means_confirmed() -> Result<(), anyhow::Error> {
        let (_, tracker, handler) = setup();
        let out = handler.handle(&callback(0, Some(json!({"sign": "abc"})))).await?;
        assert_eq!(out, CallbackOutcome::Recorded { transaction_id: "tx-1".into(), status: Status::Confirmed });
        assert_eq!(tracker.get_status(None, Some("tx-1")).await?, Some(Status::Confirmed));
        Ok(())
    }

    #[tokio::test]
    async fn confirmation_absent_or_null_means_declined() -> Result<(), anyhow::Error> {
        let (_, tracker, handler) = setup();
        handler.handle(&callback(0, None)).await?;
        assert_eq!(tracker.get_status(None, Some("tx-1")).await?, Some(Status::Declined));

        handler.handle(&callback(0, Some(Value::Null))).await?;
        assert_eq!(tracker.get_status(None, Some("tx-1")).await?, Some(Status::Declined));
        Ok(())
    }

    #[tokio::test]
    async fn remote_error_is_ignored_without_mutation() -> Result<(), anyhow::Error> {
        let (store, _, handler) = setup();
        let out = handler.handle(&callback(12, Some(json!({})))).await?;
        assert_eq!(out, CallbackOutcome::Ignored { error_code: 12 });
        assert!(store.load().await?.is_empty());
        Ok(())
    }

    #[tokio::test]
    async fn malformed_or_foreign_callbacks_are_rejected() -> Result<(), anyhow::Error> {
        let (store, _, handler) = setup();
        let bodies = [
            b"not json".to_vec(),
            serde_json::to_vec(&json!({}))?,
            serde_json::to_vec(&json!({"pc_callback": {"version": 3}}))?,
            serde_json::to_vec(&json!({"pc_callback": {"type": "transaction_callback"}}))?,
            serde_json::to_vec(&json!({"pc_callback": {"type": "transaction_callback", "version": 2,
                "result": {"error_code": 0}, "transaction_callback": {"transaction_id": "t"}}}))?,
            serde_json::to_vec(&json!({"pc_callback": {"type": "user_callback", "version": 3,
                "result": {"error_code": 0}, "transaction_callback": {"transaction_id": "t"}}}))?,
            serde_json::to_vec(&json!({"pc_callback": {"type": "transaction_callback", "version": 3,
                "result": {"error_code": 0}}}))?,
        ];
        for body in bodies {
            let res = handler.handle(&body).await;
            assert!(matches!(res, Err(CallbackError::Rejected(_))), "{}", String::from_utf8_lossy(&body));
        }
        assert!(store.load().await?.is_empty());
        Ok(())
    }

    struct BrokenStore;

    #[async_trait]
    impl KeyValueStore for BrokenStore {
        async fn load(&self) -> Result<StoreMap, ServiceError> {
            Ok(StoreMap::new())
        }

        async fn save(&self, _map: &StoreMap) -> Result<(), ServiceError> {
            Err(ServiceError::Io("disk full".into()))
        }
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_store_error() {
        let handler = CallbackHandler::new(Arc::new(TransactionStatusTracker::new(Arc::new(BrokenStore))));
        let res = handler.handle(&callback(0, None)).await;
        assert!(matches!(res, Err(CallbackError::Store(ServiceError::Io(_)))));
    }
}
