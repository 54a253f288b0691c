use {
    crate::{
        client::Client,
        crypto::{SessionKey, WrappedKey, wrap_key},
        error::{Result, TransferError},
    },
    eph_protocol::{
        Direction, FileId, TransactionId, TransferTransaction,
        dto::WrappedKeyRequest,
        endpoints::{FILE_ID_HEADER, PUBLIC_KEY_HEADER, TRANSACTION_ID_HEADER, UPLOAD_ID_HEADER},
    },
    reqwest::{Method, header::HeaderMap},
    tracing::{debug, instrument},
};

/// Server answer to a transaction request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Negotiated {
    pub transaction_id: TransactionId,
    pub file_id: FileId,
    /// Server public key as sent, possibly without line breaks.
    pub public_key: String,
}

/// Negotiates transactions and hands the session key to the server.
pub struct KeyExchange<'a> {
    client: &'a Client,
}

impl<'a> KeyExchange<'a> {
    #[must_use]
    #[inline]
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// Opens an upload transaction. The server assigns the file id upfront.
    #[instrument(skip_all)]
    #[inline]
    pub async fn initiate_upload(&self) -> Result<Negotiated> {
        let url = self.client.endpoints().new_upload();
        let response = self
            .client
            .send(self.client.control_request(Method::HEAD, url))
            .await?;
        let headers = response.headers();
        let negotiated = Negotiated {
            transaction_id: required_header(headers, UPLOAD_ID_HEADER)?.into(),
            file_id: required_header(headers, FILE_ID_HEADER)?.into(),
            public_key: required_header(headers, PUBLIC_KEY_HEADER)?,
        };
        debug!(
            transaction_id = %negotiated.transaction_id,
            file_id = %negotiated.file_id,
            "upload transaction opened"
        );
        Ok(negotiated)
    }

    /// Opens a download transaction for an existing file.
    #[instrument(skip_all, fields(%file_id))]
    #[inline]
    pub async fn initiate_download(&self, file_id: &FileId) -> Result<Negotiated> {
        let url = self.client.endpoints().new_download(file_id);
        let response = self
            .client
            .send(self.client.control_request(Method::HEAD, url))
            .await?;
        let headers = response.headers();
        let negotiated = Negotiated {
            transaction_id: required_header(headers, TRANSACTION_ID_HEADER)?.into(),
            file_id: file_id.clone(),
            public_key: required_header(headers, PUBLIC_KEY_HEADER)?,
        };
        debug!(transaction_id = %negotiated.transaction_id, "download transaction opened");
        Ok(negotiated)
    }

    /// Generates the session key of `transaction` and registers it with the server.
    ///
    /// Only the wrapped form of the key is sent. The returned key is the one
    /// chunks of this transaction must be encrypted or decrypted with.
    #[instrument(skip_all, fields(transaction_id = %transaction.id, direction = %transaction.direction))]
    #[inline]
    pub async fn exchange_key(
        &self,
        transaction: &TransferTransaction,
        public_key: &str,
    ) -> Result<SessionKey> {
        let key = SessionKey::generate()?;
        let wrapped = wrap_key(&key.to_hex(), public_key)?;
        self.submit_wrapped_key(transaction, &wrapped).await?;
        Ok(key)
    }

    #[inline]
    pub async fn submit_wrapped_key(
        &self,
        transaction: &TransferTransaction,
        wrapped: &WrappedKey,
    ) -> Result<()> {
        let endpoints = self.client.endpoints();
        let url = match transaction.direction {
            Direction::Upload => endpoints.upload_key(&transaction.id),
            Direction::Download => endpoints.download_key(&transaction.id),
        };
        let request = self
            .client
            .control_request(Method::POST, url)
            .json(&WrappedKeyRequest {
                aeskey: wrapped.as_str().to_owned(),
            });
        self.client.send(request).await?;
        debug!("wrapped key accepted");
        Ok(())
    }
}

fn required_header(headers: &HeaderMap, name: &str) -> Result<String> {
    let value = headers
        .get(name)
        .ok_or_else(|| TransferError::protocol(format!("missing {name} header")))?
        .to_str()
        .map_err(|_| TransferError::protocol(format!("{name} header is not valid text")))?
        .trim();
    if value.is_empty() {
        return Err(TransferError::protocol(format!("{name} header is empty")));
    }
    Ok(value.to_owned())
}
