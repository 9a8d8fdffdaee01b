use std::path::{Path, PathBuf};

use tokio_util::sync::CancellationToken;

use crate::progress::Progress;
use crate::store::SegmentStore;

/// Inclusive byte range `[from, to]` of the remote resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub from: u64,
    pub to: u64,
}

impl ByteRange {
    pub fn len(&self) -> u64 {
        self.to - self.from + 1
    }

    /// `Range` header value for this range minus its first `skip` bytes.
    pub fn header(&self, skip: u64) -> String {
        format!("bytes={}-{}", self.from + skip, self.to)
    }
}

/// One contiguous segment of the resource together with its staging file
/// and stop signal.
#[derive(Debug)]
pub struct Part {
    pub(crate) index: usize,
    pub(crate) range: ByteRange,
    pub(crate) progress: Progress,
    pub(crate) staging_path: PathBuf,
    /// Taken by the worker while a run is in progress and handed back when it
    /// returns. `None` also after the combiner closed it.
    pub(crate) store: Option<SegmentStore>,
    pub(crate) stop: CancellationToken,
}

impl Part {
    pub(crate) fn new(index: usize, range: ByteRange, store: SegmentStore) -> Self {
        Self {
            index,
            range,
            progress: Progress::new(range.len()),
            staging_path: store.path().to_path_buf(),
            store: Some(store),
            stop: CancellationToken::new(),
        }
    }

    pub(crate) fn restore(
        index: usize,
        range: ByteRange,
        processed: u64,
        store: SegmentStore,
    ) -> Self {
        Self {
            progress: Progress::with_processed(range.len(), processed),
            ..Self::new(index, range, store)
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn range(&self) -> ByteRange {
        self.range
    }

    pub fn from(&self) -> u64 {
        self.range.from
    }

    pub fn to(&self) -> u64 {
        self.range.to
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn staging_path(&self) -> &Path {
        &self.staging_path
    }

    pub fn is_complete(&self) -> bool {
        self.progress.is_complete()
    }

    /// `Range` header for the bytes still missing from this part.
    pub fn range_header(&self) -> String {
        self.range.header(self.progress.processed())
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.is_cancelled()
    }
}
