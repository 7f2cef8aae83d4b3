//! Personalization by alias.
//!
//! An operator creates an alias and hands it to the user. The mobile app sends
//! the alias back, we create a PC user whose key is exported as JSON encrypted
//! with the alias' activation code, and the app asks the user for that code.
//! Storing the activation code next to the alias is for demo purposes only; a
//! real deployment generates it at provisioning time and delivers it through a
//! separate channel.

use std::sync::Arc;

use common::pc::{CreateUserParams, PcApi};
use rand::Rng;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::metrics::record_pc_call;
use crate::storage::KeyValueStore;

const ALIAS_CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const ALIAS_LEN: usize = 8;
const ACTIVATION_CODE_LEN: usize = 8;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct NewAlias {
    pub alias: String,
    pub activation_code: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ProvisionedUser {
    pub user_id: String,
    pub key_json: Value,
    pub activation_code: String,
}

fn random_string(charset: &[u8], len: usize) -> String {
    let mut rng = rand::thread_rng();
    (0..len).map(|_| charset[rng.gen_range(0..charset.len())] as char).collect()
}

pub struct AliasResolver {
    store: Arc<dyn KeyValueStore>,
    pc: Arc<dyn PcApi>,
    write_lock: Mutex<()>,
}

impl AliasResolver {
    pub fn new(store: Arc<dyn KeyValueStore>, pc: Arc<dyn PcApi>) -> Self {
        Self { store, pc, write_lock: Mutex::new(()) }
    }

    /// Create and persist a fresh alias with its activation code.
    #[instrument(skip(self))]
    pub async fn create_alias(&self) -> Result<NewAlias, ServiceError> {
        let _guard = self.write_lock.lock().await;
        let mut map = self.store.load().await?;

        let alias = loop {
            let candidate = random_string(ALIAS_CHARSET, ALIAS_LEN);
            if !map.contains_key(&candidate) {
                break candidate;
            }
        };
        let activation_code = random_string(b"0123456789", ACTIVATION_CODE_LEN);

        map.insert(alias.clone(), activation_code.clone());
        self.store.save(&map).await?;

        info!(%alias, "alias_created");
        Ok(NewAlias { alias, activation_code })
    }

    pub async fn activation_code(&self, alias: &str) -> Result<Option<String>, ServiceError> {
        self.store.get(alias).await
    }

    /// Create a PC user for a previously issued alias.
    #[instrument(skip(self))]
    pub async fn provision(&self, alias: &str) -> Result<ProvisionedUser, ServiceError> {
        let not_found = || ServiceError::NotFound("alias not found".into());
        if alias.trim().is_empty() {
            return Err(not_found());
        }
        let activation_code = self.activation_code(alias).await?.ok_or_else(not_found)?;

        let res = self.pc.create_user(&CreateUserParams::key_json(activation_code.clone())).await;
        record_pc_call("create_user", &res);
        let user = res?;

        info!(user_id = %user.user_id, "pc_user_provisioned");
        Ok(ProvisionedUser { user_id: user.user_id, key_json: user.key_json, activation_code })
    }
}
