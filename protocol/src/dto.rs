//! JSON bodies exchanged with the API.

use serde::{Deserialize, Serialize};

/// Server-side description of a stored file, used to drive a download.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub filename: String,
    pub size: u64,
    pub nb_parts: u64,
}

/// Body of the key submission request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKeyRequest {
    /// Base64 of the RSA-OAEP encrypted session key.
    pub aeskey: String,
}

/// Storage quota of an account, in megabytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoxInfo {
    pub capacity_mb: i64,
    pub used_mb: i64,
    pub remaining_mb: i64,
}

/// Error body returned with non-success statuses.
///
/// Two shapes are in use: `{"error": true, "msg": "..."}` (legacy) and
/// `{"error": "...", "message": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub msg: Option<String>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
}

impl ApiError {
    /// Picks the most specific human-readable message available.
    #[must_use]
    #[inline]
    pub fn message(&self) -> &str {
        [self.message.as_deref(), self.msg.as_deref()]
            .into_iter()
            .flatten()
            .chain(self.error.as_ref().and_then(serde_json::Value::as_str))
            .find(|msg| !msg.is_empty())
            .unwrap_or("unknown error")
    }

    /// Extracts a message from a raw response body.
    ///
    /// Bodies that are not a JSON object (plain text 404 pages, for example) are returned as is.
    #[must_use]
    #[inline]
    pub fn message_from_body(body: &[u8]) -> String {
        match serde_json::from_slice::<Self>(body) {
            Ok(err) => err.message().to_owned(),
            Err(_) => String::from_utf8_lossy(body).trim().to_owned(),
        }
    }
}
