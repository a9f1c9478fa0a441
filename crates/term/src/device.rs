//! Terminal-backed [`ByteDevice`].

use std::fs::File;
use std::io::{self, Read};
use std::os::fd::AsFd;
use std::time::Duration;

use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use crate::input::{ByteDevice, ReadOutcome};

/// Reads one byte at a time from a terminal, waiting with `poll(2)` so the
/// byte source can notice a stop request between units.
#[derive(Debug)]
pub struct TtyDevice {
    file: File,
}

impl TtyDevice {
    pub fn new(file: File) -> Self {
        Self { file }
    }
}

/// `poll(2)` timeout in milliseconds, rounded up so a nonzero wait never
/// becomes a busy loop.
fn poll_millis(timeout: Duration) -> i32 {
    timeout
        .as_nanos()
        .div_ceil(1_000_000)
        .min(i32::MAX as u128) as i32
}

impl ByteDevice for TtyDevice {
    fn read_unit(&mut self, timeout: Duration) -> io::Result<ReadOutcome> {
        let poll_timeout = PollTimeout::try_from(poll_millis(timeout)).unwrap_or(PollTimeout::MAX);

        let mut fds = [PollFd::new(self.file.as_fd(), PollFlags::POLLIN)];
        let ready = match poll(&mut fds, poll_timeout) {
            Ok(ready) => ready,
            Err(Errno::EINTR) => return Err(io::ErrorKind::Interrupted.into()),
            Err(errno) => return Err(errno.into()),
        };
        if ready == 0 {
            return Ok(ReadOutcome::Idle);
        }

        let revents = fds[0].revents().unwrap_or(PollFlags::empty());
        if revents.contains(PollFlags::POLLIN) {
            let mut byte = [0u8; 1];
            return match (&self.file).read(&mut byte) {
                Ok(0) => Ok(ReadOutcome::Closed),
                Ok(_) => Ok(ReadOutcome::Unit(byte[0])),
                // A pty slave reports EIO once the master side is gone.
                Err(err) if err.raw_os_error() == Some(Errno::EIO as i32) => Ok(ReadOutcome::Closed),
                Err(err) => Err(err),
            };
        }

        if revents.intersects(PollFlags::POLLHUP | PollFlags::POLLERR | PollFlags::POLLNVAL) {
            return Ok(ReadOutcome::Closed);
        }
        Ok(ReadOutcome::Idle)
    }
}
