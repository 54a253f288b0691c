use {
    crate::cli::default_config_path,
    anyhow::{Context as _, Result, bail, ensure},
    byte_unit::Byte,
    derivative::Derivative,
    eph_protocol::{AccessToken, DEFAULT_CHUNK_SIZE},
    eph_sdk::Timeouts,
    serde::Deserialize,
    std::{
        env,
        path::{Path, PathBuf},
        time::Duration,
    },
    url::Url,
};

pub const TOKEN_ENV: &str = "EPHEMERALFILES_TOKEN";
pub const ENDPOINT_ENV: &str = "EPHEMERALFILES_ENDPOINT";

const DEFAULT_ENDPOINT: &str = "https://api.ephemeralfiles.com";
#[cfg(feature = "keyring")]
const KEYRING_SERVICE: &str = "eph";
#[cfg(feature = "keyring")]
const KEYRING_USER: &str = "eph_access_token";

#[derive(Derivative, Clone, Deserialize)]
#[derivative(Debug)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default = "default_endpoint")]
    pub endpoint: Url,
    #[derivative(Debug = "ignore")]
    #[serde(default)]
    pub access_token: Option<AccessToken>,
    /// Keep the access token in the system keyring instead of the config file.
    #[serde(default)]
    pub use_keyring: bool,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_log_filter")]
    pub log_filter: String,
    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,
    #[serde(default = "default_chunk_timeout", with = "humantime_serde")]
    pub chunk_timeout: Duration,
    /// Plaintext size of upload chunks.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: Byte,
}

#[expect(clippy::expect_used, reason = "constant URL")]
fn default_endpoint() -> Url {
    DEFAULT_ENDPOINT.parse().expect("invalid default endpoint")
}

fn default_log_filter() -> String {
    "info".into()
}

fn default_request_timeout() -> Duration {
    Timeouts::default().control
}

fn default_chunk_timeout() -> Duration {
    Timeouts::default().chunk
}

fn default_chunk_size() -> Byte {
    Byte::from_u64(DEFAULT_CHUNK_SIZE)
}

impl Default for Config {
    #[inline]
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            access_token: None,
            use_keyring: false,
            log_file: None,
            log_filter: default_log_filter(),
            request_timeout: default_request_timeout(),
            chunk_timeout: default_chunk_timeout(),
            chunk_size: default_chunk_size(),
        }
    }
}

impl Config {
    /// Loads the config file and applies environment overrides.
    ///
    /// A missing file is only an error if its path was given explicitly.
    #[inline]
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::read(path)?,
            None => {
                let path = default_config_path()?;
                if path.try_exists()? {
                    Self::read(&path)?
                } else {
                    Self::default()
                }
            }
        };
        config.apply_env(|name| env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    fn read(path: &Path) -> Result<Self> {
        let text = fs_err::read_to_string(path)?;
        Self::parse(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    #[inline]
    pub fn parse(text: &str) -> Result<Self> {
        Ok(json5::from_str(text)?)
    }

    /// Environment variables take precedence over the file.
    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(endpoint) = var(ENDPOINT_ENV).filter(|v| !v.trim().is_empty()) {
            self.endpoint = endpoint
                .trim()
                .parse()
                .with_context(|| format!("invalid {ENDPOINT_ENV}"))?;
        }
        if let Some(token) = var(TOKEN_ENV).filter(|v| !v.trim().is_empty()) {
            self.access_token = Some(token.parse().with_context(|| format!("invalid {TOKEN_ENV}"))?);
            self.use_keyring = false;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        ensure!(self.chunk_size.as_u64() > 0, "`chunk_size` must be positive");
        ensure!(
            !self.request_timeout.is_zero() && !self.chunk_timeout.is_zero(),
            "timeouts must be positive"
        );
        Ok(())
    }

    #[must_use]
    #[inline]
    pub fn timeouts(&self) -> Timeouts {
        Timeouts {
            control: self.request_timeout,
            chunk: self.chunk_timeout,
        }
    }

    #[must_use]
    #[inline]
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size.as_u64()
    }

    /// Resolves the access token, asking for it if the keyring has none yet.
    #[inline]
    pub fn access_token(&self) -> Result<AccessToken> {
        if self.use_keyring {
            if self.access_token.is_some() {
                bail!(
                    "invalid config: if `use_keyring` is true, \
                    `access_token` cannot be specified in the config"
                );
            }
            return fetch_keyring_token()?.parse();
        }
        self.access_token.clone().with_context(|| {
            format!("missing `access_token` or `use_keyring` in config, or {TOKEN_ENV} variable")
        })
    }
}

#[cfg(feature = "keyring")]
fn fetch_keyring_token() -> Result<String> {
    use tracing::{info, warn};

    let entry = keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER)?;
    match entry.get_password() {
        Ok(token) => Ok(token),
        Err(keyring::Error::NoEntry) => {
            info!("access token not found in keyring");
            let token = rpassword::prompt_password("Input access token: ")?;
            if token.trim().is_empty() {
                bail!("no value provided");
            }
            match entry.set_password(&token) {
                Ok(()) => info!("access token saved to keyring"),
                Err(err) => warn!("failed to save access token in keyring: {err}"),
            }
            Ok(token)
        }
        Err(err) => Err(err.into()),
    }
}

#[cfg(not(feature = "keyring"))]
fn fetch_keyring_token() -> Result<String> {
    bail!("`use_keyring` is set but eph was built without keyring support")
}
