use std::path::PathBuf;
use std::time::Duration;

use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::error::PlanningError;

const USER_AGENT: &str = concat!("segfetch/", env!("CARGO_PKG_VERSION"));

/// Settings of one download session. Persisted with the session state so a
/// resumed download keeps the settings it was started with.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Requested number of parts fetched concurrently.
    pub connections: usize,
    /// Directory holding the per-part staging files.
    pub staging_dir: PathBuf,
    /// Directory receiving the combined file.
    pub output_dir: PathBuf,
    /// Bytes per second, applied to every part on its own.
    pub rate_limit: Option<u64>,
    /// Bytes per copy round when no rate limit is set.
    pub buffer_size: u64,
    /// Whole-request timeout. `None` lets a stalled connection block forever.
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            connections: num_cpus::get(),
            staging_dir: PathBuf::from(".segfetch"),
            output_dir: PathBuf::from("."),
            rate_limit: None,
            buffer_size: 64 * 1024,
            timeout: None,
        }
    }
}

impl Config {
    pub fn validate(&self) -> Result<(), PlanningError> {
        if self.connections == 0 {
            return Err(PlanningError::InvalidConfig("connections must be at least 1"));
        }
        if self.buffer_size == 0 {
            return Err(PlanningError::InvalidConfig("buffer size must be at least 1"));
        }
        if self.rate_limit == Some(0) {
            return Err(PlanningError::InvalidConfig("rate limit must be at least 1 byte per second"));
        }
        Ok(())
    }

    pub fn staging_path(&self, name: &str, index: usize) -> PathBuf {
        self.staging_dir.join(format!("{}.part{}", name, index))
    }

    pub fn output_path(&self, name: &str) -> PathBuf {
        self.output_dir.join(name)
    }

    pub fn build_client(&self) -> reqwest::Result<Client> {
        let mut builder = Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10));
        if let Some(timeout) = self.timeout {
            builder = builder.timeout(timeout);
        }
        builder.build()
    }
}
