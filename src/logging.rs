use anyhow::{anyhow, Result};
use tracing_subscriber::filter::LevelFilter;

/// Installs the stderr subscriber. Progress bars share stderr, so the
/// default level keeps the output to warnings and errors.
pub fn init(level: LevelFilter) -> Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init()
        .map_err(|e| anyhow!("Failed to initialize logging: {}", e))
}
