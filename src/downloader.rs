use std::path::PathBuf;

use reqwest::Client;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::combine;
use crate::config::Config;
use crate::error::{CombineError, FetchError, PlanningError, RunError, SessionError};
use crate::part::Part;
use crate::planner;
use crate::probe::{self, ResourceMetadata};
use crate::progress::Progress;
use crate::store::SegmentStore;
use crate::worker::{self, FetchTask};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Planned,
    Running,
    Completed,
    Aborted,
    Combined,
}

/// Stops every worker of the session it was taken from. Workers finish their
/// current copy round and return; the run then reports
/// [`RunError::Interrupted`].
#[derive(Debug, Clone)]
pub struct InterruptHandle {
    token: CancellationToken,
}

impl InterruptHandle {
    pub fn interrupt(&self) {
        self.token.cancel();
    }
}

/// One download attempt: the remote resource, its parts and their staging
/// files.
#[derive(Debug)]
pub struct Session {
    url: String,
    config: Config,
    metadata: ResourceMetadata,
    pub(crate) parts: Vec<Part>,
    client: Client,
    status: SessionStatus,
    interrupt: CancellationToken,
}

impl Session {
    /// Probes `url` and plans its parts with a client built from `config`.
    pub async fn create(url: impl Into<String>, config: Config) -> Result<Self, SessionError> {
        let url = url.into();
        let client = config.build_client().map_err(PlanningError::Client)?;
        let metadata = probe::probe(&client, &url).await?;
        let session = planner::plan(client, url, metadata, config).await?;
        Ok(session)
    }

    pub(crate) fn from_parts(
        client: Client,
        url: String,
        config: Config,
        metadata: ResourceMetadata,
        parts: Vec<Part>,
    ) -> Self {
        Self {
            url,
            config,
            metadata,
            parts,
            client,
            status: SessionStatus::Planned,
            interrupt: CancellationToken::new(),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn metadata(&self) -> &ResourceMetadata {
        &self.metadata
    }

    pub fn parts(&self) -> &[Part] {
        &self.parts
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn output_path(&self) -> PathBuf {
        self.config.output_path(&self.metadata.name)
    }

    /// Bytes staged so far over all parts.
    pub fn processed(&self) -> u64 {
        self.parts.iter().map(|p| p.progress.processed()).sum()
    }

    /// Live progress counters, one per part, readable while the session runs.
    pub fn progress(&self) -> Vec<Progress> {
        self.parts.iter().map(|p| p.progress.clone()).collect()
    }

    /// Handle for stopping the current run, or the next one when no run is in
    /// progress. An interrupt is consumed by the run it stops.
    pub fn interrupt_handle(&self) -> InterruptHandle {
        InterruptHandle {
            token: self.interrupt.clone(),
        }
    }

    /// Fetches every incomplete part concurrently, then combines the staging
    /// files into the output file.
    ///
    /// The first worker error stops all other workers and is returned; the
    /// staging files and progress are kept so the session can be saved and
    /// resumed.
    pub async fn run(&mut self) -> Result<(), RunError> {
        if self.status == SessionStatus::Combined {
            return Err(RunError::AlreadyCombined);
        }
        if self.interrupt.is_cancelled() {
            self.interrupt = CancellationToken::new();
            self.status = SessionStatus::Aborted;
            return Err(RunError::Interrupted);
        }
        self.status = SessionStatus::Running;

        let fetched = self.fetch_parts().await;
        if self.interrupt.is_cancelled() {
            self.interrupt = CancellationToken::new();
        }
        if let Err(err) = fetched {
            self.status = SessionStatus::Aborted;
            return Err(err);
        }
        if self.parts.iter().any(|p| !p.is_complete()) {
            self.status = SessionStatus::Aborted;
            return Err(RunError::Interrupted);
        }

        self.status = SessionStatus::Completed;
        let output = self.combine().await?;
        info!(url = %self.url, output = %output.display(), size = self.metadata.size, "download complete");
        Ok(())
    }

    async fn fetch_parts(&mut self) -> Result<(), RunError> {
        let (errors, mut received) = mpsc::unbounded_channel::<FetchError>();

        for part in self.parts.iter_mut() {
            part.stop = self.interrupt.child_token();
        }

        let mut handles = Vec::new();
        for part in self.parts.iter_mut() {
            if part.is_complete() {
                continue;
            }

            let staging_err = |source| FetchError::Staging {
                index: part.index,
                path: part.staging_path.clone(),
                source,
            };
            let mut store = match part.store.take() {
                Some(store) => store,
                None => match SegmentStore::reopen(&part.staging_path, part.progress.processed()).await {
                    Ok(store) => store,
                    Err(source) => {
                        let _ = errors.send(staging_err(source));
                        continue;
                    }
                },
            };

            // A server without range support always starts from byte 0.
            if !self.metadata.range_supported && part.progress.processed() > 0 {
                if let Err(source) = store.reset().await {
                    let _ = errors.send(staging_err(source));
                    part.store = Some(store);
                    continue;
                }
                part.progress.reset();
            }

            let task = FetchTask {
                client: self.client.clone(),
                url: self.url.clone(),
                index: part.index,
                range: part.range,
                progress: part.progress.clone(),
                stop: part.stop.clone(),
                buffer_size: self.config.buffer_size,
                rate_limit: self.config.rate_limit,
                errors: errors.clone(),
            };
            handles.push((part.index, task, store));
        }

        let stops: Vec<CancellationToken> = self.parts.iter().map(|p| p.stop.clone()).collect();
        let url = self.url.clone();
        let monitor = tokio::spawn(async move {
            let mut first = None;
            while let Some(err) = received.recv().await {
                error!(url = %url, part = err.index(), error = %err, "part failed, stopping download");
                for stop in &stops {
                    stop.cancel();
                }
                first.get_or_insert(err);
            }
            first
        });

        let handles: Vec<_> = handles
            .into_iter()
            .map(|(index, task, store)| (index, tokio::spawn(worker::fetch_part(task, store))))
            .collect();

        for (index, handle) in handles {
            match handle.await {
                Ok(store) => self.parts[index].store = Some(store),
                Err(join_err) => {
                    error!(part = index, error = %join_err, "part worker died");
                    let _ = errors.send(FetchError::Panicked { index });
                }
            }
        }
        drop(errors);

        match monitor.await? {
            Some(err) => Err(err.into()),
            None => Ok(()),
        }
    }

    /// Merges the staging files into the output file and deletes them.
    ///
    /// Only valid once every part is complete. On failure the staging files
    /// stay untouched so the merge can be retried on its own.
    pub async fn combine(&mut self) -> Result<PathBuf, CombineError> {
        let output = self.output_path();
        combine::merge(&mut self.parts, &output).await?;
        combine::remove_staging(&mut self.parts).await;
        self.status = SessionStatus::Combined;
        Ok(output)
    }

    /// Writes the output file without deleting the staging files.
    pub async fn merge(&mut self) -> Result<PathBuf, CombineError> {
        let output = self.output_path();
        combine::merge(&mut self.parts, &output).await?;
        Ok(output)
    }

    pub(crate) fn restore_status(&mut self) {
        self.status = if self.parts.iter().all(Part::is_complete) {
            SessionStatus::Completed
        } else {
            SessionStatus::Planned
        };
    }
}
