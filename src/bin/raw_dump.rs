//! Raw batch dump.
//!
//! Prints every coalesced batch with its bytes and arrival time, without
//! decoding. Useful for checking what a terminal actually sends for a key.
//! Ctrl-C exits.

use std::io::{self, Write};
use std::time::Instant;

use anyhow::Result;

use tui_msweep::term::{KeySession, SessionConfig};
use tui_msweep::types::ETX;

fn main() -> Result<()> {
    tui_msweep::init_logging()?;

    let config = SessionConfig::from_env();
    let session = KeySession::open(&config)?;
    tracing::info!(?config, "dumping raw batches");

    let result = run(&session);

    let closed = session.close();
    result?;
    closed?;
    Ok(())
}

fn run(session: &KeySession) -> Result<()> {
    let started = Instant::now();
    let mut out = io::stdout();
    writeln!(out, "waiting for input, Ctrl-C exits")?;
    out.flush()?;

    while let Ok(batch) = session.recv() {
        let at = batch.timestamp().saturating_duration_since(started);
        writeln!(
            out,
            "bytes: {:?}, time: {:.3}ms",
            batch.bytes(),
            at.as_secs_f64() * 1000.0
        )?;
        out.flush()?;

        if batch.bytes().first() == Some(&ETX) {
            writeln!(out, "received Ctrl-C, exiting")?;
            break;
        }
    }
    Ok(())
}
