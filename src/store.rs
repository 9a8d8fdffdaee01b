//! Per-part staging files.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncRead, AsyncSeekExt, AsyncWriteExt};

/// Creates `path` after making sure its parent directory exists, truncating
/// any previous content.
pub async fn create_file(path: &Path) -> io::Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).await?;
        }
    }
    OpenOptions::new()
        .create(true)
        .read(true)
        .write(true)
        .truncate(true)
        .open(path)
        .await
}

/// The staging file of one part. Bytes are appended at the current offset,
/// which starts at 0 for a fresh part and at the recorded progress for a
/// reopened one.
#[derive(Debug)]
pub struct SegmentStore {
    path: PathBuf,
    file: File,
}

impl SegmentStore {
    pub async fn create(path: impl Into<PathBuf>) -> io::Result<Self> {
        let path = path.into();
        let file = create_file(&path).await?;
        Ok(Self { path, file })
    }

    /// Reopens an existing staging file holding `len` valid bytes and
    /// positions it for append. Bytes past `len` are discarded.
    pub async fn reopen(path: impl Into<PathBuf>, len: u64) -> io::Result<Self> {
        let path = path.into();
        let mut file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .open(&path)
            .await?;

        let current = file.metadata().await?.len();
        if current < len {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("staging file holds {} bytes, expected at least {}", current, len),
            ));
        }
        if current > len {
            file.set_len(len).await?;
        }
        file.seek(SeekFrom::Start(len)).await?;

        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copies everything `reader` yields to the current offset.
    pub async fn write_from<R>(&mut self, reader: &mut R) -> io::Result<u64>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        tokio::io::copy(reader, &mut self.file).await
    }

    pub async fn flush(&mut self) -> io::Result<()> {
        self.file.flush().await
    }

    /// Flushes pending writes and rewinds to offset 0 for reading.
    pub async fn finalize(&mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }

    /// Drops all staged bytes.
    pub async fn reset(&mut self) -> io::Result<()> {
        self.file.flush().await?;
        self.file.set_len(0).await?;
        self.file.seek(SeekFrom::Start(0)).await?;
        Ok(())
    }

    pub(crate) fn file_mut(&mut self) -> &mut File {
        &mut self.file
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn create_makes_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/file.part0");

        let store = SegmentStore::create(&path).await.unwrap();

        assert_eq!(store.path(), path.as_path());
        assert!(path.exists());
    }

    #[tokio::test]
    async fn reopen_appends_after_recorded_length() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.part0");
        std::fs::write(&path, b"hello garbage").unwrap();

        let mut store = SegmentStore::reopen(&path, 5).await.unwrap();
        store.write_from(&mut &b" world"[..]).await.unwrap();
        store.finalize().await.unwrap();

        let mut content = String::new();
        store.file_mut().read_to_string(&mut content).await.unwrap();
        assert_eq!(content, "hello world");
    }

    #[tokio::test]
    async fn reopen_rejects_short_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.part0");
        std::fs::write(&path, b"abc").unwrap();

        let err = SegmentStore::reopen(&path, 10).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn reset_discards_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.part0");

        let mut store = SegmentStore::create(&path).await.unwrap();
        store.write_from(&mut &b"stale"[..]).await.unwrap();
        store.reset().await.unwrap();
        store.write_from(&mut &b"new"[..]).await.unwrap();
        store.flush().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }
}
