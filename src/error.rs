use thiserror::Error;

use crate::store::StoreError;
use crate::tls::TlsError;

#[derive(Error, Debug)]
pub enum RollcallError {
    #[error("Transport error: {0}")]
    Transport(#[from] std::io::Error),

    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    #[error("Authentication failed")]
    AuthenticationFailure,

    #[error("Coordinator closed the connection without responding (is the shared secret right?)")]
    NoResponse,

    #[error("Store unavailable: {0}")]
    StoreUnavailable(#[from] StoreError),

    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),

    #[error("Timed out waiting for peer")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<serde_json::Error> for RollcallError {
    fn from(e: serde_json::Error) -> Self {
        RollcallError::MalformedMessage(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, RollcallError>;
