//! Terminal lifecycle module.
//!
//! Owns the interactive input device for the lifetime of the game:
//!
//! - [`guard`]: raw mode on acquisition, restore on release/drop/panic/signal
//! - [`device`]: `poll(2)`-based reader that lets the byte source stop cleanly
//! - [`session`]: guard plus input pipeline, shut down in the right order
//!
//! Goals:
//! - Never leave the user's terminal in raw mode
//! - Stop touching the device before restoring it
//! - Keep the decoding side (`input`) free of terminal details

pub mod device;
pub mod error;
pub mod guard;
pub mod session;
mod signals;

pub use tui_msweep_input as input;
pub use tui_msweep_types as types;

pub use device::TtyDevice;
pub use error::TermError;
pub use guard::TerminalGuard;
pub use session::{DeviceSource, KeySession, SessionConfig};
