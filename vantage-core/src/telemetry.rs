//! Tracing subscriber setup for binaries and tests embedding the engine.

use tracing_subscriber::{EnvFilter, fmt};

/// Install a global fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter`. Safe to call more than once; later calls are no-ops.
pub fn init_tracing(default_filter: &str) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))?;

    let installed = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!("tracing initialized; default_filter={default_filter}");
    }
    Ok(())
}
