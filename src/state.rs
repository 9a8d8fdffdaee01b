//! Save and load of session snapshots.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::downloader::Session;
use crate::error::{DeserializationError, SerializationError};
use crate::part::{ByteRange, Part};
use crate::probe::ResourceMetadata;
use crate::store::SegmentStore;

pub const STATE_VERSION: u32 = 1;

/// Plain-value snapshot of a session. Live file handles and stop signals are
/// rebuilt on load.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub version: u32,
    pub saved_at: DateTime<Utc>,
    pub url: String,
    pub config: Config,
    pub metadata: ResourceMetadata,
    pub parts: Vec<PartState>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PartState {
    pub index: usize,
    pub from: u64,
    pub to: u64,
    pub processed: u64,
    pub staging_path: PathBuf,
}

impl PartState {
    pub fn range(&self) -> ByteRange {
        ByteRange {
            from: self.from,
            to: self.to,
        }
    }
}

#[derive(Deserialize)]
struct VersionOnly {
    version: u32,
}

impl SessionState {
    pub fn capture(session: &Session) -> Self {
        Self {
            version: STATE_VERSION,
            saved_at: Utc::now(),
            url: session.url().to_string(),
            config: session.config().clone(),
            metadata: session.metadata().clone(),
            parts: session
                .parts()
                .iter()
                .map(|p| PartState {
                    index: p.index(),
                    from: p.from(),
                    to: p.to(),
                    processed: p.progress().processed(),
                    staging_path: p.staging_path().to_path_buf(),
                })
                .collect(),
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, SerializationError> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Decodes a snapshot, rejecting other versions before looking at the rest.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, DeserializationError> {
        let VersionOnly { version } = serde_json::from_slice(bytes)?;
        if version != STATE_VERSION {
            return Err(DeserializationError::Version {
                found: version,
                expected: STATE_VERSION,
            });
        }
        let state: SessionState = serde_json::from_slice(bytes)?;
        state.validate()?;
        Ok(state)
    }

    fn validate(&self) -> Result<(), DeserializationError> {
        let mut next = 0u64;
        for (position, part) in self.parts.iter().enumerate() {
            if part.index != position {
                return Err(inconsistent(format!(
                    "part at position {} has index {}",
                    position, part.index
                )));
            }
            if part.from != next || part.to < part.from {
                return Err(inconsistent(format!(
                    "part {} covers [{}, {}], expected to start at {}",
                    part.index, part.from, part.to, next
                )));
            }
            if part.processed > part.range().len() {
                return Err(inconsistent(format!(
                    "part {} processed {} of {} bytes",
                    part.index,
                    part.processed,
                    part.range().len()
                )));
            }
            next = part.to + 1;
        }
        if next != self.metadata.size {
            return Err(inconsistent(format!(
                "parts cover {} bytes of {}",
                next, self.metadata.size
            )));
        }
        if !self.metadata.range_supported && self.parts.len() > 1 {
            return Err(inconsistent(
                "several parts for a resource without range support".to_string(),
            ));
        }
        Ok(())
    }

    /// Rebuilds a live session, reopening every staging file for append at its
    /// recorded progress.
    pub async fn restore(self) -> Result<Session, DeserializationError> {
        let client = self
            .config
            .build_client()
            .map_err(DeserializationError::Client)?;

        let mut parts = Vec::with_capacity(self.parts.len());
        for part in self.parts {
            let store = SegmentStore::reopen(&part.staging_path, part.processed)
                .await
                .map_err(|source| DeserializationError::Staging {
                    path: part.staging_path.clone(),
                    source,
                })?;
            parts.push(Part::restore(part.index, part.range(), part.processed, store));
        }

        let mut session = Session::from_parts(client, self.url, self.config, self.metadata, parts);
        session.restore_status();
        Ok(session)
    }
}

fn inconsistent(message: String) -> DeserializationError {
    DeserializationError::Inconsistent(message)
}

impl Session {
    /// Encodes the session as a [`SessionState`].
    ///
    /// A running session is borrowed mutably by [`Session::run`], so a
    /// snapshot of an in-flight download is taken by interrupting it through
    /// its [`InterruptHandle`](crate::InterruptHandle) and saving once `run`
    /// has returned. Every worker has handed its staging file back by then, so
    /// the recorded progress matches the bytes on disk.
    pub fn save(&self) -> Result<Vec<u8>, SerializationError> {
        SessionState::capture(self).to_bytes()
    }

    pub async fn load(bytes: &[u8]) -> Result<Session, DeserializationError> {
        SessionState::from_bytes(bytes)?.restore().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner;
    use reqwest::Client;

    async fn planned(dir: &std::path::Path) -> Session {
        let config = Config {
            connections: 3,
            staging_dir: dir.join("staging"),
            output_dir: dir.to_path_buf(),
            rate_limit: Some(4096),
            buffer_size: 1024,
            timeout: Some(std::time::Duration::from_secs(30)),
        };
        let metadata = ResourceMetadata {
            size: 1000,
            name: "data.bin".to_string(),
            range_supported: true,
        };
        planner::plan(Client::new(), "http://localhost/data.bin".to_string(), metadata, config)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn load_of_save_preserves_session() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = planned(dir.path()).await;

        // Pretend part 1 already staged 100 bytes.
        let part = &mut session.parts[1];
        std::fs::write(&part.staging_path, vec![7u8; 100]).unwrap();
        part.store = None;
        part.progress.advance(100);

        let bytes = session.save().unwrap();
        let loaded = Session::load(&bytes).await.unwrap();

        assert_eq!(loaded.url(), session.url());
        assert_eq!(loaded.config(), session.config());
        assert_eq!(loaded.metadata(), session.metadata());
        assert_eq!(loaded.parts().len(), session.parts().len());
        for (a, b) in loaded.parts().iter().zip(session.parts()) {
            assert_eq!(a.index(), b.index());
            assert_eq!(a.range(), b.range());
            assert_eq!(a.progress().processed(), b.progress().processed());
            assert_eq!(a.progress().total(), b.progress().total());
            assert_eq!(a.staging_path(), b.staging_path());
        }
        assert_eq!(loaded.parts()[1].range_header(), "bytes=433-665");
        // Reopened, not truncated.
        assert_eq!(std::fs::read(loaded.parts()[1].staging_path()).unwrap().len(), 100);
    }

    #[tokio::test]
    async fn rejects_other_versions() {
        let dir = tempfile::tempdir().unwrap();
        let session = planned(dir.path()).await;

        let mut value: serde_json::Value = serde_json::from_slice(&session.save().unwrap()).unwrap();
        value["version"] = serde_json::json!(STATE_VERSION + 1);
        let bytes = serde_json::to_vec(&value).unwrap();

        let err = Session::load(&bytes).await.unwrap_err();
        assert!(matches!(err, DeserializationError::Version { found, .. } if found == STATE_VERSION + 1));
    }

    #[tokio::test]
    async fn rejects_malformed_bytes() {
        let err = Session::load(b"not a session").await.unwrap_err();
        assert!(matches!(err, DeserializationError::Malformed(_)));
    }

    #[tokio::test]
    async fn rejects_gaps_between_parts() {
        let dir = tempfile::tempdir().unwrap();
        let session = planned(dir.path()).await;

        let mut state = SessionState::capture(&session);
        state.parts[1].from += 1;
        let bytes = state.to_bytes().unwrap();

        let err = Session::load(&bytes).await.unwrap_err();
        assert!(matches!(err, DeserializationError::Inconsistent(_)));
    }

    #[tokio::test]
    async fn rejects_progress_beyond_staged_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let session = planned(dir.path()).await;

        let mut state = SessionState::capture(&session);
        state.parts[0].processed = 50;
        let bytes = state.to_bytes().unwrap();

        let err = Session::load(&bytes).await.unwrap_err();
        assert!(matches!(err, DeserializationError::Staging { .. }));
    }

    #[tokio::test]
    async fn fully_staged_session_loads_as_completed() {
        let dir = tempfile::tempdir().unwrap();
        let mut session = planned(dir.path()).await;
        let body: Vec<u8> = (0..1000u32).map(|i| (i % 251) as u8).collect();
        for part in session.parts.iter_mut() {
            let bytes = &body[part.range.from as usize..=part.range.to as usize];
            std::fs::write(&part.staging_path, bytes).unwrap();
            part.store = None;
            part.progress.advance(bytes.len() as u64);
        }
        let bytes = session.save().unwrap();
        drop(session);

        let mut loaded = Session::load(&bytes).await.unwrap();
        assert_eq!(loaded.status(), crate::SessionStatus::Completed);

        let output = loaded.combine().await.unwrap();
        assert_eq!(std::fs::read(output).unwrap(), body);
        assert_eq!(loaded.status(), crate::SessionStatus::Combined);
    }
}
