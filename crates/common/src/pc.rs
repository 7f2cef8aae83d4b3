//! Client for the PC REST API.
//!
//! Every PC answer is wrapped in the same envelope:
//! `{"answer": {"result": {"error_code": 0, "error_message": ""}, "<field>": {...}}}`.
//! [`PcClient::call`] unwraps it into a single `Result`, and the [`PcApi`]
//! trait exposes the few typed operations the backend needs.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Timeout applied to every PC request unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum PcError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("PC error {code}: {message}")]
    RemoteApi { code: i64, message: String },
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl PcError {
    /// Error code reported by PC, `0` when the failure happened on our side.
    pub fn code(&self) -> i64 {
        match self {
            PcError::RemoteApi { code, .. } => *code,
            _ => 0,
        }
    }

    /// Human readable description without the variant prefix.
    pub fn description(&self) -> &str {
        match self {
            PcError::InvalidArgument(msg) | PcError::Transport(msg) | PcError::Protocol(msg) => msg,
            PcError::RemoteApi { message, .. } => message,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Envelope {
    answer: Answer,
}

#[derive(Debug, Deserialize)]
struct Answer {
    result: AnswerResult,
    #[serde(flatten)]
    fields: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct AnswerResult {
    error_code: i64,
    #[serde(default)]
    error_message: Option<String>,
}

/// Decode a raw PC response body.
///
/// A non-zero `error_code` wins over everything else, including the HTTP
/// status. With `expected` set, the named member of `answer` must be present
/// and non-null.
pub fn parse_answer(body: &[u8], expected: Option<&str>) -> Result<Option<Value>, PcError> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| PcError::Protocol(format!("malformed PC answer: {e}")))?;
    let Answer { result, mut fields } = envelope.answer;

    if result.error_code != 0 {
        return Err(PcError::RemoteApi {
            code: result.error_code,
            message: result.error_message.unwrap_or_default(),
        });
    }

    let Some(field) = expected else { return Ok(None) };
    match fields.remove(field) {
        Some(value) if !value.is_null() => Ok(Some(value)),
        _ => Err(PcError::Protocol(format!("unexpected response shape: missing `{field}`"))),
    }
}

/// Parameters for `POST /{system_id}/users`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateUserParams {
    pub id_prefix: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_encryption_password: Option<String>,
    pub return_key_method: String,
}

impl CreateUserParams {
    /// Minimal parameters asking PC to export the key as JSON encrypted with
    /// the given activation code.
    pub fn key_json(activation_code: impl Into<String>) -> Self {
        Self {
            id_prefix: "sample-".into(),
            key_encryption_password: Some(activation_code.into()),
            return_key_method: "KEY_JSON".into(),
        }
    }

    /// Parameters asking PC to render the key as a QR code image for the
    /// mobile app to scan.
    pub fn qr() -> Self {
        Self { id_prefix: "sample-".into(), key_encryption_password: None, return_key_method: "QR".into() }
    }
}

/// `answer.user_created`. The exported key is kept opaque.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserCreated {
    pub user_id: String,
    pub key_json: Value,
}

/// `answer.user_created` for the QR key-return method. `key_qr` is PC's
/// base64 image, passed on untouched.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QrUserCreated {
    pub user_id: String,
    pub key_qr: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransactionData {
    pub text: String,
}

/// Parameters for `POST /{system_id}/users/{user_id}/transactions`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CreateTransaction {
    pub transaction_data: TransactionData,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub callback_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TransactionCreated {
    transaction_id: String,
}

/// Typed PC operations used by the backend.
#[async_trait]
pub trait PcApi: Send + Sync {
    async fn create_user(&self, params: &CreateUserParams) -> Result<UserCreated, PcError>;
    async fn create_user_qr(&self, params: &CreateUserParams) -> Result<QrUserCreated, PcError>;
    async fn create_transaction(&self, user_id: &str, request: &CreateTransaction) -> Result<String, PcError>;
}

/// reqwest-backed PC client bound to one PC server and system id.
#[derive(Debug, Clone)]
pub struct PcClient {
    http: reqwest::Client,
    base_url: String,
    system_id: String,
}

impl PcClient {
    pub fn new(base_url: impl Into<String>, system_id: impl Into<String>, timeout: Duration) -> Result<Self, PcError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PcError::Transport(e.to_string()))?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { http, base_url, system_id: system_id.into() })
    }

    pub fn users_url(&self) -> String {
        format!("{}/{}/users", self.base_url, self.system_id)
    }

    pub fn transactions_url(&self, user_id: &str) -> String {
        format!("{}/{}/transactions", self.users_url(), user_id)
    }

    /// Make one call to PC.
    ///
    /// Without a body a GET is issued, otherwise the body is POSTed as JSON.
    /// Returns `Ok(None)` when `expected` is `None` and PC reported no error.
    #[instrument(skip(self, request), fields(method = request.map_or("GET", |_| "POST")))]
    pub async fn call(&self, url: &str, request: Option<&Value>, expected: Option<&str>) -> Result<Option<Value>, PcError> {
        if url.trim().is_empty() {
            return Err(PcError::InvalidArgument("url is empty".into()));
        }

        let builder = match request {
            None => self.http.get(url),
            Some(body) => {
                let bytes = serde_json::to_vec(body).map_err(|e| PcError::InvalidArgument(e.to_string()))?;
                self.http
                    .post(url)
                    .header(CONTENT_TYPE, "application/json")
                    .header(CONTENT_LENGTH, bytes.len())
                    .body(bytes)
            }
        };

        let resp = builder.send().await.map_err(|e| {
            warn!(error = %e, "PC request failed");
            PcError::Transport(e.to_string())
        })?;
        let status = resp.status();
        let body = resp.bytes().await.map_err(|e| PcError::Transport(e.to_string()))?;
        debug!(%status, bytes = body.len(), "PC answered");

        parse_answer(&body, expected)
    }

    async fn call_expecting(&self, url: &str, request: &Value, expected: &str) -> Result<Value, PcError> {
        self.call(url, Some(request), Some(expected))
            .await?
            .ok_or_else(|| PcError::Protocol(format!("unexpected response shape: missing `{expected}`")))
    }
}

#[async_trait]
impl PcApi for PcClient {
    async fn create_user(&self, params: &CreateUserParams) -> Result<UserCreated, PcError> {
        let request = serde_json::to_value(params).map_err(|e| PcError::InvalidArgument(e.to_string()))?;
        let answer = self.call_expecting(&self.users_url(), &request, "user_created").await?;
        serde_json::from_value(answer).map_err(|e| PcError::Protocol(format!("user_created: {e}")))
    }

    async fn create_user_qr(&self, params: &CreateUserParams) -> Result<QrUserCreated, PcError> {
        let request = serde_json::to_value(params).map_err(|e| PcError::InvalidArgument(e.to_string()))?;
        let answer = self.call_expecting(&self.users_url(), &request, "user_created").await?;
        serde_json::from_value(answer).map_err(|e| PcError::Protocol(format!("user_created: {e}")))
    }

    async fn create_transaction(&self, user_id: &str, request: &CreateTransaction) -> Result<String, PcError> {
        if user_id.trim().is_empty() {
            return Err(PcError::InvalidArgument("user id is empty".into()));
        }
        let body = serde_json::to_value(request).map_err(|e| PcError::InvalidArgument(e.to_string()))?;
        let answer = self.call_expecting(&self.transactions_url(user_id), &body, "transaction_created").await?;
        let created: TransactionCreated =
            serde_json::from_value(answer).map_err(|e| PcError::Protocol(format!("transaction_created: {e}")))?;
        Ok(created.transaction_id)
    }
}

/// Simple in-memory PC double for tests and demos without a PC server.
pub mod mock {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    pub struct MockPcApi {
        failure: Option<(i64, String)>,
        next_id: AtomicU64,
        users: Mutex<Vec<CreateUserParams>>,
        transactions: Mutex<Vec<(String, CreateTransaction)>>,
    }

    impl MockPcApi {
        /// A double whose every call fails with the given PC error code.
        pub fn failing(code: i64, message: impl Into<String>) -> Self {
            Self { failure: Some((code, message.into())), ..Self::default() }
        }

        pub fn created_users(&self) -> Vec<CreateUserParams> {
            self.users.lock().unwrap().clone()
        }

        pub fn created_transactions(&self) -> Vec<(String, CreateTransaction)> {
            self.transactions.lock().unwrap().clone()
        }

        fn check(&self) -> Result<u64, PcError> {
            match &self.failure {
                Some((code, message)) => Err(PcError::RemoteApi { code: *code, message: message.clone() }),
                None => Ok(self.next_id.fetch_add(1, Ordering::SeqCst) + 1),
            }
        }
    }

    #[async_trait]
    impl PcApi for MockPcApi {
        async fn create_user(&self, params: &CreateUserParams) -> Result<UserCreated, PcError> {
            let n = self.check()?;
            self.users.lock().unwrap().push(params.clone());
            Ok(UserCreated {
                user_id: format!("{}{n}", params.id_prefix),
                key_json: serde_json::json!({ "mock_key": n }),
            })
        }

        async fn create_user_qr(&self, params: &CreateUserParams) -> Result<QrUserCreated, PcError> {
            let n = self.check()?;
            self.users.lock().unwrap().push(params.clone());
            Ok(QrUserCreated { user_id: format!("{}{n}", params.id_prefix), key_qr: format!("R0lGODlh{n}") })
        }

        async fn create_transaction(&self, user_id: &str, request: &CreateTransaction) -> Result<String, PcError> {
            let n = self.check()?;
            self.transactions.lock().unwrap().push((user_id.to_string(), request.clone()));
            Ok(format!("tx-{n}"))
        }
    }
}
