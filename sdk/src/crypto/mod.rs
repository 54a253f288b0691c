//! Hybrid encryption of transferred files.
//!
//! For every transfer the client generates a fresh 256-bit session key. The key is
//! hex-encoded, encrypted with the server's RSA public key using OAEP padding
//! (SHA-256 for both the hash and MGF1) and submitted in base64. The raw key never
//! leaves the process.
//!
//! File content is split into chunks and each chunk is encrypted independently
//! with AES-256 in CTR mode. A random nonce is chosen per chunk and written in
//! front of the ciphertext:
//!
//! - nonce (128 bits) - initial value of the big-endian block counter
//! - encrypted content - same length as the plaintext
//!
//! The chunk format carries no authentication tag, so corrupted ciphertext decrypts
//! to corrupted plaintext without an error. The format is shared with the server
//! and is kept as is.

mod cipher;
mod key;

pub use cipher::{ChunkCipher, NONCE_LEN};
pub use key::{PUBLIC_KEY_LINE_LEN, SESSION_KEY_LEN, SessionKey, WrappedKey, normalize_pem, wrap_key};
