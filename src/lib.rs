//! Segmented HTTP downloads.
//!
//! A resource is probed with a HEAD request, split into contiguous byte
//! ranges, fetched concurrently into per-part staging files and finally
//! combined into one output file. A session can be saved at any point before
//! it is combined and loaded again to resume.
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use segfetch::{Config, Session};
//!
//! let mut session = Session::create("https://example.com/file.tar.gz", Config::default()).await?;
//! if let Err(err) = session.run().await {
//!     std::fs::write("file.state.json", session.save()?)?;
//!     return Err(err.into());
//! }
//! # Ok(())
//! # }
//! ```

mod combine;
pub mod config;
pub mod downloader;
pub mod error;
pub mod part;
pub mod planner;
pub mod probe;
pub mod progress;
pub mod state;
pub mod store;
pub mod throttle;
pub mod utils;
mod worker;

pub use config::Config;
pub use downloader::{InterruptHandle, Session, SessionStatus};
pub use error::{
    CombineError, DeserializationError, FetchError, PlanningError, ProbeError, RunError,
    SerializationError, SessionError,
};
pub use part::{ByteRange, Part};
pub use planner::{partition, plan};
pub use probe::{probe, ResourceMetadata};
pub use progress::Progress;
pub use state::{PartState, SessionState, STATE_VERSION};
