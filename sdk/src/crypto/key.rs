use {
    crate::error::CryptoError,
    base64::{Engine, prelude::BASE64_STANDARD},
    rand::{TryRngCore, rngs::OsRng},
    regex::Regex,
    rsa::{
        Oaep, RsaPublicKey,
        pkcs8::{DecodePublicKey, spki},
        rand_core::OsRng as OaepRng,
    },
    sha2::Sha256,
    std::{
        fmt::{self, Debug},
        sync::LazyLock,
    },
};

pub const SESSION_KEY_LEN: usize = 32;

/// Width of the base64 lines of a normalized PEM document.
pub const PUBLIC_KEY_LINE_LEN: usize = 64;

const PEM_HEADER: &str = "-----BEGIN PUBLIC KEY-----";
const PEM_FOOTER: &str = "-----END PUBLIC KEY-----";

/// One-time AES-256 key of a single transfer.
pub struct SessionKey([u8; SESSION_KEY_LEN]);

impl SessionKey {
    /// Draws a new key from the operating system's secure random source.
    #[inline]
    pub fn generate() -> Result<Self, CryptoError> {
        let mut key = [0_u8; SESSION_KEY_LEN];
        OsRng
            .try_fill_bytes(&mut key)
            .map_err(|err| CryptoError::Rng(err.to_string()))?;
        Ok(Self(key))
    }

    #[inline]
    pub fn from_hex(value: &str) -> Result<Self, CryptoError> {
        let mut key = [0_u8; SESSION_KEY_LEN];
        hex::decode_to_slice(value, &mut key)
            .map_err(|err| CryptoError::KeyParse(format!("invalid session key: {err}")))?;
        Ok(Self(key))
    }

    #[must_use]
    #[inline]
    pub fn as_bytes(&self) -> &[u8; SESSION_KEY_LEN] {
        &self.0
    }

    /// Lowercase hex form of the key. This is the plaintext of the RSA wrap.
    #[must_use]
    #[inline]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl Debug for SessionKey {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionKey").finish()
    }
}

/// Session key encrypted with the server's public key, base64-encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrappedKey(String);

impl WrappedKey {
    #[must_use]
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[expect(clippy::expect_used, reason = "static pattern")]
static PEM_BOUNDARY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"-----\s*(BEGIN|END)[A-Z0-9 ]*-----").expect("invalid PEM boundary pattern")
});

/// Rebuilds a well-formed PEM document from a possibly unwrapped one.
///
/// The server may send the key as a single line (HTTP headers cannot hold line
/// breaks), while PEM decoders require the payload to be wrapped. Existing
/// boundaries and every character outside the base64 alphabet are dropped, and
/// the payload is wrapped at [`PUBLIC_KEY_LINE_LEN`] characters between
/// `PUBLIC KEY` boundaries.
/// Normalizing an already normalized document returns it unchanged.
#[must_use]
#[inline]
pub fn normalize_pem(raw: &str) -> String {
    let payload: Vec<char> = PEM_BOUNDARY
        .replace_all(raw, "")
        .chars()
        .filter(|&c| is_base64_char(c))
        .collect();

    let mut pem = String::with_capacity(payload.len().saturating_add(80));
    pem.push_str(PEM_HEADER);
    pem.push('\n');
    for line in payload.chunks(PUBLIC_KEY_LINE_LEN) {
        pem.extend(line);
        pem.push('\n');
    }
    pem.push_str(PEM_FOOTER);
    pem
}

fn is_base64_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '+' | '/' | '=')
}

fn parse_public_key(public_key_pem: &str) -> Result<RsaPublicKey, CryptoError> {
    let pem = normalize_pem(public_key_pem);
    if pem.len() == PEM_HEADER.len() + PEM_FOOTER.len() + 1 {
        return Err(CryptoError::KeyParse("public key is empty".into()));
    }
    RsaPublicKey::from_public_key_pem(&pem).map_err(|err| match err {
        spki::Error::OidUnknown { oid } => {
            CryptoError::KeyParse(format!("not an RSA public key (algorithm {oid})"))
        }
        err => CryptoError::KeyParse(err.to_string()),
    })
}

/// Encrypts `key_hex` for the holder of `public_key_pem`.
///
/// Uses RSA-OAEP with SHA-256 as both the digest and the MGF1 digest. OAEP is
/// randomized, so wrapping the same key twice gives different results.
#[inline]
pub fn wrap_key(key_hex: &str, public_key_pem: &str) -> Result<WrappedKey, CryptoError> {
    let public_key = parse_public_key(public_key_pem)?;
    let ciphertext = public_key.encrypt(
        &mut OaepRng,
        Oaep::new::<Sha256>(),
        key_hex.as_bytes(),
    )?;
    Ok(WrappedKey(BASE64_STANDARD.encode(ciphertext)))
}
