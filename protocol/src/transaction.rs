use {
    crate::{FileId, TransactionId},
    anyhow::{Context as _, Result, ensure},
    derive_more::Display,
    serde::{Deserialize, Serialize},
    std::ops::Range,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
pub enum Direction {
    #[display("upload")]
    Upload,
    #[display("download")]
    Download,
}

/// Server-issued context of a single file transfer.
///
/// Created once the server has answered the transaction request and never modified afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferTransaction {
    pub id: TransactionId,
    pub direction: Direction,
    pub file_id: FileId,
    pub total_size: u64,
    pub chunk_count: u64,
}

/// Partition of a file into contiguous fixed-size chunks.
///
/// Every chunk except the last one is exactly `chunk_size` bytes long.
/// An empty file has no chunks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkLayout {
    total_size: u64,
    chunk_size: u64,
}

impl ChunkLayout {
    #[inline]
    pub fn new(total_size: u64, chunk_size: u64) -> Result<Self> {
        ensure!(chunk_size > 0, "chunk size must be positive");
        Ok(Self {
            total_size,
            chunk_size,
        })
    }

    #[must_use]
    #[inline]
    pub fn total_size(&self) -> u64 {
        self.total_size
    }

    #[must_use]
    #[inline]
    pub fn chunk_size(&self) -> u64 {
        self.chunk_size
    }

    #[must_use]
    #[inline]
    pub fn chunk_count(&self) -> u64 {
        self.total_size.div_ceil(self.chunk_size)
    }

    /// Returns the descriptor of the chunk at `index`, or `None` past the last chunk.
    #[must_use]
    #[inline]
    pub fn chunk(&self, index: u64) -> Option<ChunkDescriptor> {
        let start = index.checked_mul(self.chunk_size)?;
        if start >= self.total_size {
            return None;
        }
        let end = start
            .saturating_add(self.chunk_size)
            .min(self.total_size);
        Some(ChunkDescriptor {
            index,
            range: start..end,
            total_size: self.total_size,
        })
    }

    /// Chunks in increasing index order.
    #[inline]
    pub fn chunks(&self) -> impl Iterator<Item = ChunkDescriptor> + '_ {
        (0..self.chunk_count()).map_while(|index| self.chunk(index))
    }
}

/// Position of one chunk within the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkDescriptor {
    pub index: u64,
    /// Half-open byte range of the chunk.
    pub range: Range<u64>,
    pub total_size: u64,
}

impl ChunkDescriptor {
    #[must_use]
    #[inline]
    pub fn start(&self) -> u64 {
        self.range.start
    }

    /// Offset of the last byte of the chunk.
    #[must_use]
    #[inline]
    pub fn end_inclusive(&self) -> u64 {
        self.range.end.saturating_sub(1)
    }

    #[must_use]
    #[inline]
    pub fn len(&self) -> u64 {
        self.range.end.saturating_sub(self.range.start)
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }

    /// Length of the chunk as an in-memory buffer size.
    #[inline]
    pub fn buffer_len(&self) -> Result<usize> {
        usize::try_from(self.len()).context("chunk does not fit in memory")
    }

    /// Value of the `Content-Range` header placing this chunk in the file.
    #[must_use]
    #[inline]
    pub fn content_range(&self) -> String {
        format!(
            "bytes {}-{}/{}",
            self.start(),
            self.end_inclusive(),
            self.total_size
        )
    }
}
