//! Terminal key tester (default binary).
//!
//! This is the reference consumer of the input pipeline: it blocks on
//! batches, decodes them and prints each logical key. Game code drives the
//! minefield the same way.
//!
//! Quit with `q` or Ctrl-C.

use std::io::{self, Write};

use anyhow::Result;
use crossterm::{
    style::{Color, Print, ResetColor, SetForegroundColor},
    QueueableCommand,
};

use tui_msweep::input::KeyTrie;
use tui_msweep::term::{KeySession, SessionConfig};
use tui_msweep::types::LogicalKey;

fn main() -> Result<()> {
    tui_msweep::init_logging()?;

    let config = SessionConfig::from_env();
    let session = KeySession::open(&config)?;

    let result = run(&session);

    // Always try to restore terminal state.
    let closed = session.close();
    result?;
    closed?;
    Ok(())
}

fn run(session: &KeySession) -> Result<()> {
    let trie = KeyTrie::default();
    let mut out = io::stdout();

    out.queue(Print(
        "arrows, hjkl, wasd, space, enter. q or Ctrl-C quits.\n",
    ))?;
    out.flush()?;

    loop {
        let batch = match session.recv() {
            Ok(batch) => batch,
            Err(err) => {
                tracing::info!(error = %err, "input closed");
                return Ok(());
            }
        };

        for key in trie.decode_all(batch.bytes()) {
            match key {
                Some(LogicalKey::Interrupt) => return Ok(()),
                Some(key) => {
                    out.queue(SetForegroundColor(Color::Green))?;
                    out.queue(Print(format!("{:<6}", key.as_str())))?;
                    out.queue(ResetColor)?;
                }
                None if batch.bytes() == b"q" => return Ok(()),
                None => {
                    out.queue(SetForegroundColor(Color::DarkYellow))?;
                    out.queue(Print("no match"))?;
                    out.queue(ResetColor)?;
                }
            }
            out.queue(Print(format!(" {:02x?}\n", batch.bytes())))?;
        }
        out.flush()?;
    }
}
