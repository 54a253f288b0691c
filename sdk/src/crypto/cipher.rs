use {
    crate::{crypto::SessionKey, error::CryptoError},
    aes::Aes256,
    ctr::cipher::{KeyIvInit, StreamCipher},
    rand::{TryRngCore, rngs::OsRng},
};

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Length of the nonce stored in front of every encrypted chunk.
pub const NONCE_LEN: usize = 16;

/// Encrypts and decrypts individual chunks with a session key.
pub struct ChunkCipher<'a> {
    key: &'a SessionKey,
}

impl<'a> ChunkCipher<'a> {
    #[must_use]
    #[inline]
    pub fn new(key: &'a SessionKey) -> Self {
        Self { key }
    }

    /// Returns `nonce || ciphertext`, `NONCE_LEN` bytes longer than `plaintext`.
    #[inline]
    pub fn encrypt_chunk(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut nonce = [0_u8; NONCE_LEN];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(|err| CryptoError::Rng(err.to_string()))?;

        let mut output = Vec::with_capacity(NONCE_LEN.saturating_add(plaintext.len()));
        output.extend_from_slice(&nonce);
        output.extend_from_slice(plaintext);
        let (_, body) = output.split_at_mut(NONCE_LEN);
        self.keystream(&nonce).apply_keystream(body);
        Ok(output)
    }

    /// Reverses `encrypt_chunk`. Fails only if `ciphertext` cannot contain a nonce.
    #[inline]
    pub fn decrypt_chunk(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let (nonce, body) = ciphertext.split_first_chunk::<NONCE_LEN>().ok_or(
            CryptoError::CiphertextTooShort {
                len: ciphertext.len(),
                min: NONCE_LEN,
            },
        )?;
        let mut plaintext = body.to_vec();
        self.keystream(nonce).apply_keystream(&mut plaintext);
        Ok(plaintext)
    }

    fn keystream(&self, nonce: &[u8; NONCE_LEN]) -> Aes256Ctr {
        Aes256Ctr::new(self.key.as_bytes().into(), nonce.into())
    }
}
