//! Authentication by transaction confirmation.
//!
//! `start` asks PC to create a transaction for the user and records it as
//! `created`; the user signs it in the mobile app, PC delivers a callback, and
//! `finish` checks what the callback recorded for the user's last transaction.

use std::sync::Arc;

use common::pc::{CreateTransaction, PcApi, TransactionData};
use tracing::{info, instrument, warn};

use crate::errors::ServiceError;
use crate::metrics::record_pc_call;
use crate::transactions::{Status, TransactionStatusTracker};

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub transaction_text: String,
    pub callback_url: Option<String>,
}

pub struct AuthenticationService {
    tracker: Arc<TransactionStatusTracker>,
    pc: Arc<dyn PcApi>,
    cfg: AuthConfig,
}

impl AuthenticationService {
    pub fn new(tracker: Arc<TransactionStatusTracker>, pc: Arc<dyn PcApi>, cfg: AuthConfig) -> Self {
        Self { tracker, pc, cfg }
    }

    /// Create an authentication transaction for `user_id`; returns its id.
    #[instrument(skip(self))]
    pub async fn start(&self, user_id: &str) -> Result<String, ServiceError> {
        if user_id.trim().is_empty() {
            return Err(ServiceError::InvalidArgument("pc_user_id not specified".into()));
        }
        let request = CreateTransaction {
            transaction_data: TransactionData { text: self.cfg.transaction_text.clone() },
            callback_url: self.cfg.callback_url.clone(),
        };
        let res = self.pc.create_transaction(user_id, &request).await;
        record_pc_call("create_transaction", &res);
        let transaction_id = res?;

        self.tracker
            .record_status(Some(user_id), &transaction_id, Status::Created)
            .await?;
        info!(%transaction_id, "authentication_started");
        Ok(transaction_id)
    }

    /// Status of the user's last transaction. Only [`Status::Confirmed`]
    /// means the user is authenticated.
    #[instrument(skip(self))]
    pub async fn finish(&self, user_id: &str) -> Result<Status, ServiceError> {
        if user_id.trim().is_empty() {
            return Err(ServiceError::InvalidArgument("pc_user_id not specified".into()));
        }
        let status = self
            .tracker
            .get_status(Some(user_id), None)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("no transaction for user {user_id}")))?;
        if status != Status::Confirmed {
            warn!(%status, "authentication not confirmed");
        }
        Ok(status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;
    use common::pc::mock::MockPcApi;

    fn service(pc: Arc<MockPcApi>) -> (Arc<TransactionStatusTracker>, AuthenticationService) {
        let tracker = Arc::new(TransactionStatusTracker::new(Arc::new(MemoryStore::new())));
        let cfg = AuthConfig { transaction_text: "Log in?".into(), callback_url: Some("http://cb".into()) };
        (tracker.clone(), AuthenticationService::new(tracker, pc, cfg))
    }

    #[tokio::test]
    async fn start_then_confirm_then_finish() -> Result<(), ServiceError> {
        let pc = Arc::new(MockPcApi::default());
        let (tracker, auth) = service(pc.clone());

        let tx = auth.start("sample-1").await?;
        assert_eq!(auth.finish("sample-1").await?, Status::Created);

        let sent = pc.created_transactions();
        assert_eq!(sent[0].0, "sample-1");
        assert_eq!(sent[0].1.transaction_data.text, "Log in?");
        assert_eq!(sent[0].1.callback_url.as_deref(), Some("http://cb"));

        tracker.record_status(None, &tx, Status::Confirmed).await?;
        assert_eq!(auth.finish("sample-1").await?, Status::Confirmed);
        Ok(())
    }

    #[tokio::test]
    async fn finish_without_transaction_is_not_found() {
        let (_, auth) = service(Arc::new(MockPcApi::default()));
        assert!(matches!(auth.finish("ghost").await, Err(ServiceError::NotFound(_))));
        assert!(matches!(auth.start(" ").await, Err(ServiceError::InvalidArgument(_))));
    }

    #[tokio::test]
    async fn pc_failure_records_nothing() {
        let (tracker, auth) = service(Arc::new(MockPcApi::failing(9, "user blocked")));
        assert!(matches!(auth.start("sample-1").await, Err(ServiceError::Pc(_))));
        assert_eq!(tracker.get_status(Some("sample-1"), None).await.unwrap(), None);
    }
}
