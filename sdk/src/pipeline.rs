//! Sequential transfer of encrypted chunks.
//!
//! One chunk is held in memory at a time and exactly one request is in flight.
//! The first failure aborts the whole transfer.

use {
    crate::{
        client::Client,
        crypto::{ChunkCipher, SessionKey},
        error::Result,
        progress::Progress,
    },
    eph_protocol::{
        ChunkDescriptor, ChunkLayout, TransferTransaction, endpoints::CHUNK_FORM_FIELD,
        util::maybe_block_in_place,
    },
    fs_err::File,
    reqwest::{
        Method,
        header::CONTENT_RANGE,
        multipart::{Form, Part},
    },
    std::{
        io::{self, Read, Seek, SeekFrom, Write},
        path::Path,
    },
    tracing::{debug, instrument},
};

const CHUNK_MIME_TYPE: &str = "application/octet-stream";

/// Reads a local file one chunk at a time.
#[derive(Debug)]
pub struct ChunkReader {
    file: File,
    layout: ChunkLayout,
    next_index: u64,
}

impl ChunkReader {
    #[inline]
    pub fn open(path: &Path, chunk_size: u64) -> Result<Self> {
        let file = File::open(path)?;
        let total_size = file.metadata()?.len();
        let layout = ChunkLayout::new(total_size, chunk_size)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, format!("{err:#}")))?;
        Ok(Self {
            file,
            layout,
            next_index: 0,
        })
    }

    #[must_use]
    #[inline]
    pub fn layout(&self) -> ChunkLayout {
        self.layout
    }

    /// Returns the next chunk and its plaintext, or `None` after the last one.
    ///
    /// Fails with `UnexpectedEof` if the file got shorter since it was opened.
    #[inline]
    pub fn next_chunk(&mut self) -> Result<Option<(ChunkDescriptor, Vec<u8>)>> {
        let Some(chunk) = self.layout.chunk(self.next_index) else {
            return Ok(None);
        };
        let len = chunk.buffer_len().map_err(|err| io::Error::other(format!("{err:#}")))?;
        self.file.seek(SeekFrom::Start(chunk.start()))?;
        let mut data = Vec::with_capacity(len);
        Read::by_ref(&mut self.file)
            .take(chunk.len())
            .read_to_end(&mut data)?;
        if data.len() != len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "file changed while reading: expected {len} bytes at offset {}, got {}",
                    chunk.start(),
                    data.len(),
                ),
            )
            .into());
        }
        self.next_index = self.next_index.saturating_add(1);
        Ok(Some((chunk, data)))
    }
}

/// Writes decrypted chunks to a local file in arrival order.
#[derive(Debug)]
pub struct ChunkWriter {
    file: File,
    written: u64,
}

impl ChunkWriter {
    /// Creates the file, truncating any previous content.
    #[inline]
    pub fn create(path: &Path) -> Result<Self> {
        Ok(Self {
            file: File::create(path)?,
            written: 0,
        })
    }

    #[inline]
    pub fn write_chunk(&mut self, plaintext: &[u8]) -> Result<()> {
        self.file.write_all(plaintext)?;
        self.written = self.written.saturating_add(byte_len(plaintext));
        Ok(())
    }

    #[must_use]
    #[inline]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Flushes the content to disk and returns the number of bytes written.
    #[inline]
    pub fn finish(&mut self) -> Result<u64> {
        self.file.flush()?;
        self.file.sync_all()?;
        Ok(self.written)
    }
}

/// Moves the chunks of one transaction between the local file and the server.
pub struct ChunkPipeline<'a> {
    client: &'a Client,
    transaction: &'a TransferTransaction,
    cipher: ChunkCipher<'a>,
    progress: &'a dyn Progress,
}

impl<'a> ChunkPipeline<'a> {
    #[must_use]
    #[inline]
    pub fn new(
        client: &'a Client,
        transaction: &'a TransferTransaction,
        key: &'a SessionKey,
        progress: &'a dyn Progress,
    ) -> Self {
        Self {
            client,
            transaction,
            cipher: ChunkCipher::new(key),
            progress,
        }
    }

    /// Encrypts and sends every chunk of `reader`.
    ///
    /// `on_chunk` is called with the index of each chunk before it is sent.
    #[instrument(skip_all, fields(transaction_id = %self.transaction.id))]
    #[inline]
    pub async fn upload(
        &self,
        reader: &mut ChunkReader,
        file_name: &str,
        mut on_chunk: impl FnMut(u64) + Send,
    ) -> Result<()> {
        while let Some((chunk, plaintext)) = maybe_block_in_place(|| reader.next_chunk())? {
            on_chunk(chunk.index);
            let ciphertext = maybe_block_in_place(|| self.cipher.encrypt_chunk(&plaintext))?;
            self.upload_chunk(&chunk, file_name, ciphertext).await?;
            debug!(index = chunk.index, range = %chunk.content_range(), "chunk uploaded");
            self.progress.advance(chunk.len());
        }
        Ok(())
    }

    async fn upload_chunk(
        &self,
        chunk: &ChunkDescriptor,
        file_name: &str,
        ciphertext: Vec<u8>,
    ) -> Result<()> {
        let part = Part::bytes(ciphertext)
            .file_name(file_name.to_owned())
            .mime_str(CHUNK_MIME_TYPE)?;
        let url = self
            .client
            .endpoints()
            .chunk(&self.transaction.id, chunk.index);
        let request = self
            .client
            .chunk_request(Method::POST, url)
            .header(CONTENT_RANGE, chunk.content_range())
            .multipart(Form::new().part(CHUNK_FORM_FIELD, part));
        self.client.send(request).await?;
        Ok(())
    }

    /// Fetches, decrypts and writes chunks `0..chunk_count` of the transaction.
    ///
    /// Returns the number of plaintext bytes written.
    #[instrument(skip_all, fields(transaction_id = %self.transaction.id))]
    #[inline]
    pub async fn download(
        &self,
        writer: &mut ChunkWriter,
        mut on_chunk: impl FnMut(u64) + Send,
    ) -> Result<u64> {
        for index in 0..self.transaction.chunk_count {
            on_chunk(index);
            let url = self.client.endpoints().chunk(&self.transaction.id, index);
            let ciphertext = self
                .client
                .send(self.client.chunk_request(Method::GET, url))
                .await?
                .bytes()
                .await?;
            let plaintext = maybe_block_in_place(|| self.cipher.decrypt_chunk(&ciphertext))?;
            maybe_block_in_place(|| writer.write_chunk(&plaintext))?;
            debug!(index, len = plaintext.len(), "chunk downloaded");
            self.progress.advance(byte_len(&plaintext));
        }
        Ok(writer.written())
    }
}

fn byte_len(data: &[u8]) -> u64 {
    u64::try_from(data.len()).unwrap_or(u64::MAX)
}
