pub mod credentials;
pub mod dto;
pub mod endpoints;
pub mod transaction;
pub mod util;

pub use crate::{
    credentials::{AccessToken, TokenClaims},
    transaction::{ChunkDescriptor, ChunkLayout, Direction, TransferTransaction},
};
use {
    derive_more::{Display, From, Into},
    serde::{Deserialize, Serialize},
};

/// Identifier of a file stored on the server.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into, Display)]
pub struct FileId(pub String);

/// Server-issued token scoping the key exchange and chunk requests of one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, From, Into, Display)]
pub struct TransactionId(pub String);

impl FileId {
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TransactionId {
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Default chunk length used for uploads.
pub const DEFAULT_CHUNK_SIZE: u64 = 128 * 1024 * 1024;
