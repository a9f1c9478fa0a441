//! Byte source: reads the device one unit at a time and timestamps each unit.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crossbeam_channel::Sender;

use crate::device::{ByteDevice, ReadOutcome};
use crate::types::RawEvent;

/// Why the byte source loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceExit {
    /// The stop flag was raised.
    Stopped,
    /// The device reached end-of-stream.
    Closed,
    /// The coalescing stage hung up.
    Disconnected,
    /// A read failed with this error kind.
    Failed(io::ErrorKind),
}

/// Run the byte source loop on the current thread.
///
/// Every unit read is sent as a [`RawEvent`] in read order. The loop returns
/// when `stop` is raised, the device closes or fails, or the receiver is
/// dropped. Returning drops `tx`, which is how closure propagates downstream.
pub fn run_byte_source<D: ByteDevice>(
    mut device: D,
    tx: Sender<RawEvent>,
    stop: Arc<AtomicBool>,
    poll_interval: Duration,
) -> SourceExit {
    tracing::debug!(poll_ms = poll_interval.as_millis() as u64, "byte source started");

    let exit = loop {
        if stop.load(Ordering::Acquire) {
            break SourceExit::Stopped;
        }

        match device.read_unit(poll_interval) {
            Ok(ReadOutcome::Unit(unit)) => {
                let event = RawEvent::new(unit, Instant::now());
                tracing::trace!(unit, "read unit");
                if tx.send(event).is_err() {
                    break SourceExit::Disconnected;
                }
            }
            Ok(ReadOutcome::Idle) => {}
            Ok(ReadOutcome::Closed) => {
                tracing::info!("input device reached end of stream");
                break SourceExit::Closed;
            }
            Err(err) if err.kind() == io::ErrorKind::Interrupted => {
                tracing::debug!("device read interrupted, retrying");
            }
            Err(err) => {
                tracing::error!(error = %err, kind = ?err.kind(), "device read failed");
                break SourceExit::Failed(err.kind());
            }
        }
    };

    tracing::debug!(?exit, "byte source stopped");
    exit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::ReaderDevice;
    use crossbeam_channel::unbounded;
    use std::collections::VecDeque;
    use std::io::Cursor;

    struct ScriptedDevice {
        script: VecDeque<io::Result<ReadOutcome>>,
    }

    impl ByteDevice for ScriptedDevice {
        fn read_unit(&mut self, _timeout: Duration) -> io::Result<ReadOutcome> {
            self.script.pop_front().unwrap_or(Ok(ReadOutcome::Closed))
        }
    }

    fn no_stop() -> Arc<AtomicBool> {
        Arc::new(AtomicBool::new(false))
    }

    #[test]
    fn forwards_units_in_order_then_closes() {
        let (tx, rx) = unbounded();
        let dev = ReaderDevice::new(Cursor::new(b"\x1b[A".to_vec()));

        let exit = run_byte_source(dev, tx, no_stop(), Duration::from_millis(5));
        assert_eq!(exit, SourceExit::Closed);

        let events: Vec<RawEvent> = rx.iter().collect();
        assert_eq!(events.len(), 3);
        assert!(events.iter().all(|e| e.bytes.len() == 1));
        let bytes: Vec<u8> = events.iter().map(|e| e.bytes[0]).collect();
        assert_eq!(bytes, b"\x1b[A");
        assert!(events.windows(2).all(|w| w[0].timestamp <= w[1].timestamp));
    }

    #[test]
    fn stop_flag_ends_loop_before_reading() {
        let (tx, rx) = unbounded();
        let dev = ReaderDevice::new(Cursor::new(b"abc".to_vec()));
        let stop = Arc::new(AtomicBool::new(true));

        let exit = run_byte_source(dev, tx, stop, Duration::from_millis(5));
        assert_eq!(exit, SourceExit::Stopped);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn idle_and_interrupted_reads_are_retried() {
        let (tx, rx) = unbounded();
        let dev = ScriptedDevice {
            script: VecDeque::from(vec![
                Ok(ReadOutcome::Idle),
                Err(io::Error::from(io::ErrorKind::Interrupted)),
                Ok(ReadOutcome::Unit(b'k')),
            ]),
        };

        let exit = run_byte_source(dev, tx, no_stop(), Duration::from_millis(5));
        assert_eq!(exit, SourceExit::Closed);
        assert_eq!(rx.recv().unwrap().bytes, b"k");
    }

    #[test]
    fn read_error_ends_loop() {
        let (tx, rx) = unbounded();
        let dev = ScriptedDevice {
            script: VecDeque::from(vec![
                Ok(ReadOutcome::Unit(b'j')),
                Err(io::Error::from(io::ErrorKind::BrokenPipe)),
                Ok(ReadOutcome::Unit(b'k')),
            ]),
        };

        let exit = run_byte_source(dev, tx, no_stop(), Duration::from_millis(5));
        assert_eq!(exit, SourceExit::Failed(io::ErrorKind::BrokenPipe));
        let events: Vec<RawEvent> = rx.iter().collect();
        assert_eq!(events.len(), 1);
    }

    #[test]
    fn dropped_receiver_ends_loop() {
        let (tx, rx) = unbounded();
        drop(rx);
        let dev = ReaderDevice::new(Cursor::new(b"abc".to_vec()));

        let exit = run_byte_source(dev, tx, no_stop(), Duration::from_millis(5));
        assert_eq!(exit, SourceExit::Disconnected);
    }
}
