//! TUI Minesweeper key input (workspace facade crate).
//!
//! This package exposes the `tui_msweep::{input,term,types}` public API while
//! the implementation lives in dedicated crates under `crates/`.

pub use tui_msweep_input as input;
pub use tui_msweep_term as term;
pub use tui_msweep_types as types;

/// Install the `tracing` subscriber used by the binaries.
///
/// The filter comes from `MSWEEP_LOG` (default `warn`). Output goes to the
/// file named by `MSWEEP_LOG_PATH` when set, otherwise to stderr.
pub fn init_logging() -> anyhow::Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_env("MSWEEP_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match std::env::var("MSWEEP_LOG_PATH").ok().filter(|p| !p.trim().is_empty()) {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path.trim())?;
            builder
                .with_ansi(false)
                .with_writer(std::sync::Mutex::new(file))
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))?;
        }
        None => {
            builder
                .with_writer(std::io::stderr)
                .try_init()
                .map_err(|e| anyhow::anyhow!("failed to install logger: {e}"))?;
        }
    }
    Ok(())
}
