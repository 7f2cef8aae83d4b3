use std::sync::Arc;

use common::pc::PcApi;
use service::{
    alias::AliasResolver,
    auth::{AuthConfig, AuthenticationService},
    callback::CallbackHandler,
    qr::QrUserService,
    storage::KeyValueStore,
    transactions::TransactionStatusTracker,
};

/// Shared handler state. Everything behind it is injected so tests can run on
/// memory stores and a mock PC.
#[derive(Clone)]
pub struct AppState {
    pub tracker: Arc<TransactionStatusTracker>,
    pub callbacks: Arc<CallbackHandler>,
    pub aliases: Arc<AliasResolver>,
    pub qr_users: Arc<QrUserService>,
    pub auth: Arc<AuthenticationService>,
}

pub struct StateParts {
    pub transaction_store: Arc<dyn KeyValueStore>,
    pub alias_store: Arc<dyn KeyValueStore>,
    pub pc: Arc<dyn PcApi>,
    pub auth: AuthConfig,
    pub serialize_writes: bool,
}

impl AppState {
    pub fn new(parts: StateParts) -> Self {
        let tracker = Arc::new(if parts.serialize_writes {
            TransactionStatusTracker::new(parts.transaction_store)
        } else {
            TransactionStatusTracker::unsynchronized(parts.transaction_store)
        });
        Self {
            callbacks: Arc::new(CallbackHandler::new(Arc::clone(&tracker))),
            aliases: Arc::new(AliasResolver::new(parts.alias_store, Arc::clone(&parts.pc))),
            qr_users: Arc::new(QrUserService::new(Arc::clone(&parts.pc))),
            auth: Arc::new(AuthenticationService::new(Arc::clone(&tracker), parts.pc, parts.auth)),
            tracker,
        }
    }
}
