/// Receives transfer progress in plaintext bytes.
pub trait Progress: Send + Sync {
    fn start(&self, label: &str, total: u64);
    fn advance(&self, bytes: u64);
    /// Called once the transfer is over, whether it succeeded or not.
    fn finish(&self);
}

/// Ignores all progress.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl Progress for NoProgress {
    #[inline]
    fn start(&self, _label: &str, _total: u64) {}

    #[inline]
    fn advance(&self, _bytes: u64) {}

    #[inline]
    fn finish(&self) {}
}
