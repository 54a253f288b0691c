//! Error types of encrypted transfers.
//!
//! Every error aborts the transfer it occurred in. Nothing is retried and chunks
//! already accepted by the server are left as they are.

use {
    reqwest::StatusCode,
    std::{io, result},
};

pub type Result<T, E = TransferError> = result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    /// The server could not be reached or the request timed out.
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The server answered with an unexpected status.
    #[error("unexpected status {status}: {message}")]
    Status { status: StatusCode, message: String },

    /// A required header or field is missing or malformed.
    #[error("protocol error: {0}")]
    Protocol(String),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The session already ran a transfer.
    #[error("invalid session state: {0}")]
    InvalidState(String),
}

impl TransferError {
    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol(message.into())
    }

    /// Whether the error was reported by the server rather than detected locally.
    #[must_use]
    #[inline]
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Status { .. } | Self::Protocol(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// The server public key is missing, malformed or not an RSA key.
    #[error("failed to parse public key: {0}")]
    KeyParse(String),

    #[error("failed to wrap session key: {0}")]
    KeyWrap(#[from] rsa::Error),

    #[error("ciphertext too short: {len} bytes, expected at least {min}")]
    CiphertextTooShort { len: usize, min: usize },

    #[error("secure random source failed: {0}")]
    Rng(String),
}
