//! End-to-end encrypted chunked transfers.
//!
//! A [`TransferSession`] negotiates a transaction with the server, hands over a
//! one-time key wrapped with the server's RSA public key and then moves the file
//! as a sequence of independently encrypted chunks.

pub mod client;
pub mod crypto;
pub mod error;
pub mod key_exchange;
pub mod pipeline;
pub mod progress;
pub mod session;

pub use crate::{
    client::{Client, Timeouts},
    error::{CryptoError, Result, TransferError},
    progress::{NoProgress, Progress},
    session::{SessionState, TransferSession},
};
