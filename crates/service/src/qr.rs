//! Personalization by QR code: PC creates the user and renders its key as
//! an image that the sample UI shows for the mobile app to scan.

use std::sync::Arc;

use common::pc::{CreateUserParams, PcApi};
use serde::Serialize;
use tracing::{info, instrument};

use crate::errors::ServiceError;
use crate::metrics::record_pc_call;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QrUser {
    pub user_id: String,
    /// Base64 image as returned by PC.
    pub user_qr: String,
}

pub struct QrUserService {
    pc: Arc<dyn PcApi>,
}

impl QrUserService {
    pub fn new(pc: Arc<dyn PcApi>) -> Self {
        Self { pc }
    }

    #[instrument(skip(self))]
    pub async fn create_user(&self) -> Result<QrUser, ServiceError> {
        let res = self.pc.create_user_qr(&CreateUserParams::qr()).await;
        record_pc_call("create_user_qr", &res);
        let user = res?;

        info!(user_id = %user.user_id, "pc_user_created_with_qr");
        Ok(QrUser { user_id: user.user_id, user_qr: user.key_qr })
    }
}
