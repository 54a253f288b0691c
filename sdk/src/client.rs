use {
    crate::error::{Result, TransferError},
    eph_protocol::{
        AccessToken, FileId,
        dto::{ApiError, BoxInfo, FileInfo},
        endpoints::Endpoints,
    },
    reqwest::{Method, RequestBuilder, Response, Url},
    std::time::Duration,
    tracing::{debug, instrument},
};

/// Timeout of control requests: transaction setup, key submission, file info.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);
/// Transferring a full chunk may take a long time on a slow link.
pub const CHUNK_TIMEOUT: Duration = Duration::from_secs(30 * 60);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub control: Duration,
    pub chunk: Duration,
}

impl Default for Timeouts {
    #[inline]
    fn default() -> Self {
        Self {
            control: DEFAULT_TIMEOUT,
            chunk: CHUNK_TIMEOUT,
        }
    }
}

/// Authenticated connection to the API.
///
/// Build it once and borrow it for every transfer in order to reuse the connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    reqwest: reqwest::Client,
    endpoints: Endpoints,
    token: AccessToken,
    timeouts: Timeouts,
}

impl Client {
    #[inline]
    pub fn new(endpoints: Endpoints, token: AccessToken) -> Result<Self> {
        Ok(Self {
            reqwest: reqwest::Client::builder()
                .user_agent(concat!("eph/", env!("CARGO_PKG_VERSION")))
                .build()?,
            endpoints,
            token,
            timeouts: Timeouts::default(),
        })
    }

    #[must_use]
    #[inline]
    pub fn with_timeouts(mut self, timeouts: Timeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    #[must_use]
    #[inline]
    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    #[must_use]
    #[inline]
    pub fn timeouts(&self) -> Timeouts {
        self.timeouts
    }

    pub(crate) fn control_request(&self, method: Method, url: Url) -> RequestBuilder {
        self.request(method, url, self.timeouts.control)
    }

    pub(crate) fn chunk_request(&self, method: Method, url: Url) -> RequestBuilder {
        self.request(method, url, self.timeouts.chunk)
    }

    fn request(&self, method: Method, url: Url, timeout: Duration) -> RequestBuilder {
        self.reqwest
            .request(method, url)
            .bearer_auth(self.token.as_unmasked_str())
            .timeout(timeout)
    }

    /// Sends the request and turns non-success statuses into errors.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        check_status(response).await
    }

    /// Fetches the metadata that drives a download.
    #[instrument(skip_all, fields(%file_id))]
    #[inline]
    pub async fn file_info(&self, file_id: &FileId) -> Result<FileInfo> {
        let request = self.control_request(Method::GET, self.endpoints.file_info(file_id));
        let body = self.send(request).await?.bytes().await?;
        let info: FileInfo = serde_json::from_slice(&body)
            .map_err(|err| TransferError::protocol(format!("invalid file info: {err}")))?;
        debug!(?info, "received file info");
        Ok(info)
    }

    /// Deletes a stored file.
    #[instrument(skip_all, fields(%file_id))]
    #[inline]
    pub async fn remove_file(&self, file_id: &FileId) -> Result<()> {
        let request = self.control_request(Method::DELETE, self.endpoints.file(file_id));
        self.send(request).await?;
        debug!("file removed");
        Ok(())
    }

    /// Fetches the storage quota of the account the token belongs to.
    #[instrument(skip_all, fields(%email))]
    #[inline]
    pub async fn box_info(&self, email: &str) -> Result<BoxInfo> {
        let request = self.control_request(Method::GET, self.endpoints.box_info(email));
        let body = self.send(request).await?.bytes().await?;
        serde_json::from_slice(&body)
            .map_err(|err| TransferError::protocol(format!("invalid box info: {err}")))
    }
}

async fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    // The body only carries the message, a failure to read it is not worth reporting.
    let body = response.bytes().await.unwrap_or_default();
    let mut message = ApiError::message_from_body(&body);
    // `HEAD` responses never have a body.
    if message.is_empty() {
        message = status.canonical_reason().unwrap_or("unknown error").to_owned();
    }
    Err(TransferError::Status { status, message })
}
