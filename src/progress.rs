use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Byte counter of one part. Clones share the same counter: the part's worker
/// is the only writer, everyone else reads for display.
#[derive(Debug, Clone)]
pub struct Progress {
    total: u64,
    processed: Arc<AtomicU64>,
}

impl Progress {
    pub fn new(total: u64) -> Self {
        Self::with_processed(total, 0)
    }

    pub(crate) fn with_processed(total: u64, processed: u64) -> Self {
        Self {
            total,
            processed: Arc::new(AtomicU64::new(processed.min(total))),
        }
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn remaining(&self) -> u64 {
        self.total.saturating_sub(self.processed())
    }

    pub fn is_complete(&self) -> bool {
        self.processed() >= self.total
    }

    pub fn percent(&self) -> u64 {
        if self.total == 0 {
            return 100;
        }
        self.processed() * 100 / self.total
    }

    pub(crate) fn advance(&self, written: u64) {
        self.processed.fetch_add(written, Ordering::Relaxed);
    }

    /// Only called between runs, never while a worker owns the counter.
    pub(crate) fn reset(&self) {
        self.processed.store(0, Ordering::Relaxed);
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.percent())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_counter() {
        let progress = Progress::new(200);
        let view = progress.clone();
        progress.advance(50);
        assert_eq!(view.processed(), 50);
        assert_eq!(view.remaining(), 150);
        assert_eq!(view.to_string(), "25%");
    }

    #[test]
    fn empty_progress_is_complete() {
        let progress = Progress::new(0);
        assert!(progress.is_complete());
        assert_eq!(progress.percent(), 100);
    }

    #[test]
    fn restored_progress_is_clamped_to_total() {
        let progress = Progress::with_processed(10, 25);
        assert_eq!(progress.processed(), 10);
    }
}
