use {
    crate::{
        client::Client,
        error::{Result, TransferError},
        key_exchange::KeyExchange,
        pipeline::{ChunkPipeline, ChunkReader, ChunkWriter},
        progress::{NoProgress, Progress},
    },
    eph_protocol::{
        DEFAULT_CHUNK_SIZE, Direction, FileId, TransferTransaction, util::maybe_block_in_place,
    },
    std::{
        io,
        path::{Path, PathBuf},
    },
    tracing::{debug, info, instrument, warn},
};

/// Lifecycle of a [`TransferSession`].
///
/// `Completed` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    TransactionInitiated,
    KeyExchanged,
    Transferring { index: u64 },
    Completed,
    Failed,
}

/// Runs a single encrypted upload or download.
///
/// The key exchange always completes before the first chunk is transferred.
/// A session cannot be reused: once a transfer was attempted, further calls
/// fail with [`TransferError::InvalidState`].
pub struct TransferSession<'a> {
    client: &'a Client,
    chunk_size: u64,
    progress: &'a dyn Progress,
    state: SessionState,
}

impl<'a> TransferSession<'a> {
    #[must_use]
    #[inline]
    pub fn new(client: &'a Client) -> Self {
        Self {
            client,
            chunk_size: DEFAULT_CHUNK_SIZE,
            progress: &NoProgress,
            state: SessionState::Idle,
        }
    }

    /// Sets the plaintext length of upload chunks. Downloads follow the server's layout.
    #[must_use]
    #[inline]
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    #[must_use]
    #[inline]
    pub fn with_progress(mut self, progress: &'a dyn Progress) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    #[inline]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Encrypts and uploads the file at `path`, returning the id the server assigned to it.
    #[instrument(skip_all, fields(?path))]
    #[inline]
    pub async fn upload_encrypted(&mut self, path: &Path) -> Result<FileId> {
        self.ensure_idle()?;
        let result = self.upload(path).await;
        self.finish(&result);
        result
    }

    async fn upload(&mut self, path: &Path) -> Result<FileId> {
        let file_name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| {
                io::Error::new(io::ErrorKind::InvalidInput, "path does not name a file")
            })?;
        let mut reader = maybe_block_in_place(|| ChunkReader::open(path, self.chunk_size))?;
        let layout = reader.layout();

        let exchange = KeyExchange::new(self.client);
        let negotiated = exchange.initiate_upload().await?;
        let transaction = TransferTransaction {
            id: negotiated.transaction_id,
            direction: Direction::Upload,
            file_id: negotiated.file_id,
            total_size: layout.total_size(),
            chunk_count: layout.chunk_count(),
        };
        transition(&mut self.state, SessionState::TransactionInitiated);

        let key = exchange
            .exchange_key(&transaction, &negotiated.public_key)
            .await?;
        transition(&mut self.state, SessionState::KeyExchanged);

        self.progress.start(&file_name, transaction.total_size);
        let result = ChunkPipeline::new(self.client, &transaction, &key, self.progress)
            .upload(&mut reader, &file_name, |index| {
                transition(&mut self.state, SessionState::Transferring { index });
            })
            .await;
        self.progress.finish();
        result?;

        info!(
            file_id = %transaction.file_id,
            size = transaction.total_size,
            chunks = transaction.chunk_count,
            "upload complete"
        );
        Ok(transaction.file_id)
    }

    /// Downloads and decrypts a file.
    ///
    /// If `output` is an existing directory, the file is stored in it under the
    /// name provided by the server. Returns the path of the written file, which is
    /// removed again if the transfer fails.
    #[instrument(skip_all, fields(%file_id, ?output))]
    #[inline]
    pub async fn download_encrypted(&mut self, file_id: &FileId, output: &Path) -> Result<PathBuf> {
        self.ensure_idle()?;
        let result = self.download(file_id, output).await;
        self.finish(&result);
        result
    }

    async fn download(&mut self, file_id: &FileId, output: &Path) -> Result<PathBuf> {
        let info = self.client.file_info(file_id).await?;
        let target = output_path(output, &info.filename)?;

        let exchange = KeyExchange::new(self.client);
        let negotiated = exchange.initiate_download(file_id).await?;
        let transaction = TransferTransaction {
            id: negotiated.transaction_id,
            direction: Direction::Download,
            file_id: negotiated.file_id,
            total_size: info.size,
            chunk_count: info.nb_parts,
        };
        transition(&mut self.state, SessionState::TransactionInitiated);

        let key = exchange
            .exchange_key(&transaction, &negotiated.public_key)
            .await?;
        transition(&mut self.state, SessionState::KeyExchanged);

        let mut writer = maybe_block_in_place(|| ChunkWriter::create(&target))?;
        self.progress.start(&info.filename, transaction.total_size);
        let pipeline = ChunkPipeline::new(self.client, &transaction, &key, self.progress);
        let result = pipeline
            .download(&mut writer, |index| {
                transition(&mut self.state, SessionState::Transferring { index });
            })
            .await
            .and_then(|_| maybe_block_in_place(|| writer.finish()))
            .and_then(|written| {
                if written == transaction.total_size {
                    Ok(())
                } else {
                    Err(TransferError::protocol(format!(
                        "size mismatch: received {written} bytes, expected {}",
                        transaction.total_size
                    )))
                }
            });
        self.progress.finish();
        drop(writer);

        if let Err(err) = result {
            if let Err(remove_err) = maybe_block_in_place(|| fs_err::remove_file(&target)) {
                warn!(error = %remove_err, "failed to remove incomplete download");
            }
            return Err(err);
        }
        info!(
            path = %target.display(),
            size = transaction.total_size,
            chunks = transaction.chunk_count,
            "download complete"
        );
        Ok(target)
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.state == SessionState::Idle {
            Ok(())
        } else {
            Err(TransferError::InvalidState(format!(
                "session already used, current state: {:?}",
                self.state
            )))
        }
    }

    fn finish<T>(&mut self, result: &Result<T>) {
        let next = if result.is_ok() {
            SessionState::Completed
        } else {
            SessionState::Failed
        };
        transition(&mut self.state, next);
    }
}

fn transition(state: &mut SessionState, next: SessionState) {
    debug!(from = ?state, to = ?next, "session state changed");
    *state = next;
}

/// Resolves where a download is written.
///
/// Only the last component of the server-provided name is used, so a crafted
/// name cannot point outside of the chosen directory.
fn output_path(output: &Path, server_name: &str) -> Result<PathBuf> {
    if !maybe_block_in_place(|| output.is_dir()) {
        return Ok(output.to_path_buf());
    }
    let name = Path::new(server_name)
        .file_name()
        .filter(|name| !name.is_empty())
        .ok_or_else(|| {
            TransferError::protocol(format!("server sent an unusable file name: {server_name:?}"))
        })?;
    Ok(output.join(name))
}
