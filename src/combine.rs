//! Reassembling staging files into the output file.

use std::io::SeekFrom;
use std::path::Path;

use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tracing::{debug, warn};

use crate::error::CombineError;
use crate::part::Part;
use crate::store::{self, SegmentStore};

const COPY_BUFFER: usize = 64 * 1024;

/// Writes every part's staged bytes at its absolute offset of `output`.
/// Staging files are left in place, so merging twice gives the same result.
pub(crate) async fn merge(parts: &mut [Part], output: &Path) -> Result<(), CombineError> {
    for part in parts.iter() {
        if !part.is_complete() {
            return Err(CombineError::Incomplete {
                index: part.index,
                processed: part.progress.processed(),
                total: part.progress.total(),
            });
        }
    }

    let output_err = |source| CombineError::Output {
        path: output.to_path_buf(),
        source,
    };
    let mut file = store::create_file(output).await.map_err(output_err)?;
    let mut buffer = vec![0u8; COPY_BUFFER];

    for part in parts.iter_mut() {
        let staging_err = |source| CombineError::Staging {
            path: part.staging_path.clone(),
            source,
        };

        let mut staged = match part.store.take() {
            Some(store) => store,
            None => SegmentStore::reopen(&part.staging_path, part.progress.total())
                .await
                .map_err(staging_err)?,
        };
        staged.finalize().await.map_err(staging_err)?;

        file.seek(SeekFrom::Start(part.range.from))
            .await
            .map_err(output_err)?;
        let mut reader = staged.file_mut().take(part.range.len());
        let mut copied = 0u64;
        loop {
            let read = reader.read(&mut buffer).await.map_err(staging_err)?;
            if read == 0 {
                break;
            }
            file.write_all(&buffer[..read]).await.map_err(output_err)?;
            copied += read as u64;
        }
        if copied < part.range.len() {
            return Err(staging_err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("staging file holds {} of {} bytes", copied, part.range.len()),
            )));
        }
        debug!(index = part.index, offset = part.range.from, bytes = copied, "merged part");
        // The staging handle is closed here.
    }

    file.flush().await.map_err(output_err)?;
    Ok(())
}

/// Deletes every staging file. Failures are logged only: the output file is
/// already complete at this point.
pub(crate) async fn remove_staging(parts: &mut [Part]) {
    for part in parts.iter_mut() {
        part.store = None;
        if let Err(err) = fs::remove_file(&part.staging_path).await {
            warn!(path = %part.staging_path.display(), error = %err, "failed to remove staging file");
        }
    }
}
