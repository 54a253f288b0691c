use {
    crate::{FileId, TransactionId},
    anyhow::{Result, format_err},
    url::Url,
};

pub const API_VERSION: &str = "v1";

/// Transaction id of a new upload.
pub const UPLOAD_ID_HEADER: &str = "X-Upload-Id";
/// File id assigned to a new upload.
pub const FILE_ID_HEADER: &str = "X-File-Id";
/// Transaction id of a new download.
pub const TRANSACTION_ID_HEADER: &str = "X-Transaction-Id";
/// Server RSA public key for the transaction, possibly as a single unwrapped line.
pub const PUBLIC_KEY_HEADER: &str = "X-File-Public-Key";

/// Name of the multipart form field carrying an encrypted chunk.
pub const CHUNK_FORM_FIELD: &str = "uploadfile";

/// Builds API URLs relative to the configured server URL.
#[derive(Debug, Clone)]
pub struct Endpoints {
    base: Url,
}

impl Endpoints {
    #[inline]
    pub fn new(base: Url) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(format_err!("server URL {base} cannot be a base"));
        }
        Ok(Self { base })
    }

    #[must_use]
    #[inline]
    pub fn base(&self) -> &Url {
        &self.base
    }

    fn api<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Url {
        let mut url = self.base.clone();
        // Checked in `new`.
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty()
                .extend(["api", API_VERSION])
                .extend(segments);
        }
        url
    }

    /// `HEAD`: opens an upload transaction.
    #[must_use]
    #[inline]
    pub fn new_upload(&self) -> Url {
        self.api(["files"])
    }

    /// `POST`: submits the wrapped key of an upload transaction.
    #[must_use]
    #[inline]
    pub fn upload_key(&self, transaction: &TransactionId) -> Url {
        self.api(["files", transaction.as_str(), "upload-key"])
    }

    /// `DELETE`: removes a stored file.
    #[must_use]
    #[inline]
    pub fn file(&self, file: &FileId) -> Url {
        self.api(["files", file.as_str()])
    }

    /// `GET`: storage quota of the account.
    #[must_use]
    #[inline]
    pub fn box_info(&self, email: &str) -> Url {
        self.api(["box", email, "default"])
    }

    /// `GET`: file name, size and number of parts of a stored file.
    #[must_use]
    #[inline]
    pub fn file_info(&self, file: &FileId) -> Url {
        self.api(["files", "info", file.as_str()])
    }

    /// `HEAD`: opens a download transaction.
    #[must_use]
    #[inline]
    pub fn new_download(&self, file: &FileId) -> Url {
        self.api(["public-key", "download", file.as_str()])
    }

    /// `POST`: submits the wrapped key of a download transaction.
    #[must_use]
    #[inline]
    pub fn download_key(&self, transaction: &TransactionId) -> Url {
        self.api(["download-transaction", transaction.as_str(), "aeskey"])
    }

    /// `POST` (upload) or `GET` (download) of a single chunk.
    #[must_use]
    #[inline]
    pub fn chunk(&self, transaction: &TransactionId, index: u64) -> Url {
        self.api(["multipart", transaction.as_str(), &index.to_string()])
    }
}
