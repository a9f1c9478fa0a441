//! Input device abstraction used by the byte source.

use std::io::{self, Read};
use std::time::Duration;

/// Result of waiting for one input unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadOutcome {
    /// One unit was read.
    Unit(u8),
    /// Nothing arrived before the timeout.
    Idle,
    /// The device reached end-of-stream.
    Closed,
}

/// A byte-oriented input device.
///
/// Implementations should return within roughly `timeout` so the byte source
/// can observe its stop flag. Devices that can only block (plain readers) may
/// ignore the timeout; the pipeline then stops once the device yields a byte
/// or closes.
pub trait ByteDevice: Send + 'static {
    fn read_unit(&mut self, timeout: Duration) -> io::Result<ReadOutcome>;
}

/// Adapts any blocking [`Read`] (pipes, files, in-memory buffers).
#[derive(Debug)]
pub struct ReaderDevice<R> {
    inner: R,
}

impl<R: Read + Send + 'static> ReaderDevice<R> {
    pub fn new(inner: R) -> Self {
        Self { inner }
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Send + 'static> ByteDevice for ReaderDevice<R> {
    fn read_unit(&mut self, _timeout: Duration) -> io::Result<ReadOutcome> {
        let mut byte = [0u8; 1];
        match self.inner.read(&mut byte)? {
            0 => Ok(ReadOutcome::Closed),
            _ => Ok(ReadOutcome::Unit(byte[0])),
        }
    }
}
