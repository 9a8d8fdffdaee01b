//! Splitting a resource into parts.

use reqwest::Client;
use tracing::debug;

use crate::config::Config;
use crate::downloader::Session;
use crate::error::PlanningError;
use crate::part::{ByteRange, Part};
use crate::probe::ResourceMetadata;
use crate::store::SegmentStore;

/// Splits `[0, size)` into at most `connections` contiguous ranges.
///
/// Without range support a single range covers the whole resource. The part
/// count never exceeds `size`, so no range is empty, and the last range
/// absorbs the remainder of the division. A zero-sized resource has no parts.
pub fn partition(size: u64, connections: usize, range_supported: bool) -> Vec<ByteRange> {
    if size == 0 {
        return Vec::new();
    }

    let count = if range_supported {
        (connections.max(1) as u64).min(size)
    } else {
        1
    };
    let base = size / count;

    (0..count)
        .map(|i| {
            let from = i * base;
            let to = if i == count - 1 {
                size - 1
            } else {
                (i + 1) * base - 1
            };
            ByteRange { from, to }
        })
        .collect()
}

/// Plans the parts of `metadata` and eagerly creates their staging files.
pub async fn plan(
    client: Client,
    url: String,
    metadata: ResourceMetadata,
    mut config: Config,
) -> Result<Session, PlanningError> {
    config.validate()?;

    let ranges = partition(metadata.size, config.connections, metadata.range_supported);
    if !ranges.is_empty() {
        config.connections = ranges.len();
    }

    let mut parts = Vec::with_capacity(ranges.len());
    for (index, range) in ranges.into_iter().enumerate() {
        let path = config.staging_path(&metadata.name, index);
        let store = SegmentStore::create(&path)
            .await
            .map_err(|source| PlanningError::Staging { path, source })?;
        debug!(index, from = range.from, to = range.to, path = %store.path().display(), "planned part");
        parts.push(Part::new(index, range, store));
    }

    Ok(Session::from_parts(client, url, config, metadata, parts))
}
