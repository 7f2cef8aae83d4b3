use common::pc::PcError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("storage error: {0}")]
    Io(String),
    #[error(transparent)]
    Pc(#[from] PcError),
}

impl ServiceError {
    pub fn io(context: &str, e: impl std::fmt::Display) -> Self { Self::Io(format!("{context}: {e}")) }
}
