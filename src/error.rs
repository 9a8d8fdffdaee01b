//! Error types for every stage of a segmented download.

use std::io;
use std::path::PathBuf;

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("invalid url {url}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },

    #[error("failed to send metadata request: {0}")]
    Request(#[from] reqwest::Error),

    #[error("metadata request failed with status {0}")]
    Status(StatusCode),

    #[error("response carries no content length")]
    MissingLength,

    #[error("unparseable content length {0:?}")]
    InvalidLength(String),
}

#[derive(Debug, Error)]
pub enum PlanningError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),

    #[error("failed to build http client: {0}")]
    Client(#[from] reqwest::Error),

    #[error("failed to create staging file {}: {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Failure of a single part's transfer. Any one of these aborts the run.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("part {index}: request failed: {source}")]
    Request {
        index: usize,
        #[source]
        source: reqwest::Error,
    },

    #[error("part {index}: request failed with status {status}")]
    Status { index: usize, status: StatusCode },

    #[error("part {index}: server answered a request starting at byte {start} with the whole resource")]
    RangeIgnored { index: usize, start: u64 },

    #[error("part {index}: transfer failed: {source}")]
    Transfer {
        index: usize,
        #[source]
        source: io::Error,
    },

    #[error("part {index}: body ended after {received} of {expected} bytes")]
    ShortBody {
        index: usize,
        expected: u64,
        received: u64,
    },

    #[error("part {index}: failed to open staging file {}: {source}", .path.display())]
    Staging {
        index: usize,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("part {index}: worker panicked")]
    Panicked { index: usize },
}

impl FetchError {
    pub fn index(&self) -> usize {
        match self {
            FetchError::Request { index, .. }
            | FetchError::Status { index, .. }
            | FetchError::RangeIgnored { index, .. }
            | FetchError::Transfer { index, .. }
            | FetchError::ShortBody { index, .. }
            | FetchError::Staging { index, .. }
            | FetchError::Panicked { index } => *index,
        }
    }
}

#[derive(Debug, Error)]
pub enum CombineError {
    #[error("part {index} is incomplete ({processed} of {total} bytes)")]
    Incomplete {
        index: usize,
        processed: u64,
        total: u64,
    },

    #[error("failed to write output file {}: {source}", .path.display())]
    Output {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to read staging file {}: {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Terminal outcome of [`Session::run`](crate::Session::run).
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error(transparent)]
    Combine(#[from] CombineError),

    #[error("download interrupted before all parts completed")]
    Interrupted,

    #[error("session has already been combined")]
    AlreadyCombined,

    #[error("error monitor failed: {0}")]
    Monitor(#[from] tokio::task::JoinError),
}

#[derive(Debug, Error)]
#[error("failed to encode session state: {0}")]
pub struct SerializationError(#[from] serde_json::Error);

#[derive(Debug, Error)]
pub enum DeserializationError {
    #[error("malformed session state: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("unsupported session state version {found} (expected {expected})")]
    Version { found: u32, expected: u32 },

    #[error("inconsistent session state: {0}")]
    Inconsistent(String),

    #[error("failed to reopen staging file {}: {source}", .path.display())]
    Staging {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to build http client: {0}")]
    Client(#[source] reqwest::Error),
}

/// Failure while building a session from a URL (probe followed by plan).
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Probe(#[from] ProbeError),

    #[error(transparent)]
    Planning(#[from] PlanningError),
}
