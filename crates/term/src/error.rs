use std::io;

use nix::errno::Errno;
use thiserror::Error;

use crate::input::PipelineError;

#[derive(Debug, Error)]
pub enum TermError {
    #[error("{device} is not a terminal")]
    NotATerminal { device: String },

    #[error("{op} failed on {device}: {errno}")]
    Ioctl {
        op: &'static str,
        device: String,
        #[source]
        errno: Errno,
    },

    #[error("failed to open {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] io::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}
