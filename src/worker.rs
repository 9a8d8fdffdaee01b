//! Fetching one part into its staging file.

use std::io;

use futures::TryStreamExt;
use reqwest::header::RANGE;
use reqwest::{Client, StatusCode};
use tokio::io::AsyncReadExt;
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::error::FetchError;
use crate::part::ByteRange;
use crate::progress::Progress;
use crate::store::SegmentStore;
use crate::throttle::ThrottleGate;

/// Everything a worker needs besides the staging file it owns.
pub(crate) struct FetchTask {
    pub client: Client,
    pub url: String,
    pub index: usize,
    pub range: ByteRange,
    pub progress: Progress,
    pub stop: CancellationToken,
    pub buffer_size: u64,
    pub rate_limit: Option<u64>,
    pub errors: UnboundedSender<FetchError>,
}

/// Fills the part's staging file and hands it back. Failures go to the shared
/// error channel instead of the return value.
pub(crate) async fn fetch_part(task: FetchTask, mut store: SegmentStore) -> SegmentStore {
    let result = match copy_range(&task, &mut store).await {
        Ok(()) => store.flush().await.map_err(|source| FetchError::Transfer {
            index: task.index,
            source,
        }),
        Err(err) => Err(err),
    };

    match result {
        Ok(()) => debug!(
            index = task.index,
            processed = task.progress.processed(),
            stopped = task.stop.is_cancelled(),
            "part worker finished"
        ),
        Err(err) => {
            // The monitor only goes away once every sender is dropped.
            let _ = task.errors.send(err);
        }
    }
    store
}

async fn copy_range(task: &FetchTask, store: &mut SegmentStore) -> Result<(), FetchError> {
    let index = task.index;
    if task.progress.is_complete() || task.stop.is_cancelled() {
        return Ok(());
    }

    let start = task.range.from + task.progress.processed();
    let response = task
        .client
        .get(&task.url)
        .header(RANGE, task.range.header(task.progress.processed()))
        .send()
        .await
        .map_err(|source| FetchError::Request { index, source })?;

    let status = response.status();
    match status {
        StatusCode::PARTIAL_CONTENT => {}
        // A full body only lines up with the part when it starts at byte 0.
        StatusCode::OK if start == 0 => {}
        StatusCode::OK => return Err(FetchError::RangeIgnored { index, start }),
        _ => return Err(FetchError::Status { index, status }),
    }

    let body = StreamReader::new(response.bytes_stream().map_err(io::Error::other));
    tokio::pin!(body);

    let gate = task.rate_limit.map(ThrottleGate::per_second);
    let round = gate
        .as_ref()
        .map_or(task.buffer_size, ThrottleGate::bytes_per_tick);

    loop {
        let remaining = task.progress.remaining();
        if remaining == 0 {
            return Ok(());
        }

        match &gate {
            Some(gate) => {
                tokio::select! {
                    _ = task.stop.cancelled() => return Ok(()),
                    _ = gate.tick() => {}
                }
            }
            None if task.stop.is_cancelled() => return Ok(()),
            None => {}
        }

        let wanted = round.min(remaining);

        let mut chunk = body.as_mut().take(wanted);
        let written = store
            .write_from(&mut chunk)
            .await
            .map_err(|source| FetchError::Transfer { index, source })?;
        task.progress.advance(written);

        if written < wanted {
            // End of stream before the range was filled.
            return Err(FetchError::ShortBody {
                index,
                expected: task.progress.total(),
                received: task.progress.processed(),
            });
        }
    }
}
