use {
    anyhow::{Context as _, Error, bail, ensure},
    base64::{
        Engine,
        prelude::{BASE64_STANDARD_NO_PAD, BASE64_URL_SAFE_NO_PAD},
    },
    serde::{Deserialize, Deserializer, Serialize, de},
    std::{
        borrow::Cow,
        fmt::{self, Debug},
        str::FromStr,
        time::{Duration, SystemTime, UNIX_EPOCH},
    },
};

/// Secret token used by the client to authenticate against the API.
///
/// The token is sent as a bearer credential with every request, so it must be
/// usable as an HTTP header value.
#[derive(Clone, Serialize)]
pub struct AccessToken(String);

impl AccessToken {
    #[must_use]
    #[inline]
    pub fn as_unmasked_str(&self) -> &str {
        &self.0
    }

    /// Reads the account and expiration time from the token.
    ///
    /// The token is a JWT. Its signature is not checked, only the server can do that.
    #[inline]
    pub fn claims(&self) -> anyhow::Result<TokenClaims> {
        let parts: Vec<&str> = self.0.split('.').collect();
        let &[_, payload, _] = parts.as_slice() else {
            bail!("access token is not a JWT");
        };
        let json = BASE64_URL_SAFE_NO_PAD
            .decode(payload)
            .or_else(|_| BASE64_STANDARD_NO_PAD.decode(payload))
            .context("invalid access token payload")?;
        let raw: RawClaims =
            serde_json::from_slice(&json).context("invalid access token payload")?;
        let expires_at = UNIX_EPOCH
            .checked_add(Duration::from_secs(raw.exp))
            .context("access token expiration time is out of range")?;
        Ok(TokenClaims {
            email: raw.email,
            expires_at,
        })
    }
}

#[derive(Deserialize)]
struct RawClaims {
    #[serde(default)]
    email: String,
    exp: u64,
}

/// Account information carried by an [`AccessToken`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenClaims {
    pub email: String,
    pub expires_at: SystemTime,
}

impl TokenClaims {
    #[must_use]
    #[inline]
    pub fn is_expired_at(&self, now: SystemTime) -> bool {
        now > self.expires_at
    }

    #[must_use]
    #[inline]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(SystemTime::now())
    }
}

impl FromStr for AccessToken {
    type Err = Error;

    #[inline]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        ensure!(!s.is_empty(), "access token is empty");
        if let Some(c) = s.chars().find(|c| !c.is_ascii_graphic()) {
            bail!("access token contains invalid character {c:?}");
        }
        Ok(Self(s.to_owned()))
    }
}

impl<'de> Deserialize<'de> for AccessToken {
    #[inline]
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Cow::<'_, str>::deserialize(deserializer)?
            .parse()
            .map_err(de::Error::custom)
    }
}

impl Debug for AccessToken {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessToken").finish()
    }
}
