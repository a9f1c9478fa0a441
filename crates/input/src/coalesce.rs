//! Coalescing stage: merges bursts of raw events into batches.
//!
//! An escape sequence typically arrives as several bytes within a fraction of
//! a millisecond. Grouping units separated by less than the quiescence window
//! lets the decoder see the whole sequence at once.

use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::types::{Batch, RawEvent};

/// How the stage detects the end of a burst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoalesceStrategy {
    /// Sleep one window, then try a non-blocking dequeue. Stops at the first
    /// empty attempt.
    #[default]
    Sleep,
    /// Wait up to one window for the next event, restarting the wait after
    /// each arrival.
    Debounce,
}

impl CoalesceStrategy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "sleep" => Some(CoalesceStrategy::Sleep),
            "debounce" => Some(CoalesceStrategy::Debounce),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CoalesceStrategy::Sleep => "sleep",
            CoalesceStrategy::Debounce => "debounce",
        }
    }
}

/// Why the coalescing loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoalesceExit {
    /// The byte source hung up and every pending event was flushed.
    UpstreamClosed,
    /// The consumer dropped its receiver.
    Disconnected,
}

/// Run the coalescing loop on the current thread.
///
/// Blocks for the first event of a batch, then keeps absorbing events until
/// one quiescence window passes without input, and sends the batch. A batch
/// pending when the byte source hangs up is still sent before returning.
pub fn run_coalescer(
    rx: Receiver<RawEvent>,
    tx: Sender<Batch>,
    quiescence: Duration,
    strategy: CoalesceStrategy,
) -> CoalesceExit {
    tracing::debug!(
        quiescence_us = quiescence.as_micros() as u64,
        strategy = strategy.as_str(),
        "coalescer started"
    );

    let mut batches: u64 = 0;
    let exit = loop {
        let Ok(first) = rx.recv() else {
            break CoalesceExit::UpstreamClosed;
        };

        let mut batch = Batch::from_event(first);
        let upstream_open = match strategy {
            CoalesceStrategy::Sleep => gather_sleeping(&rx, &mut batch, quiescence),
            CoalesceStrategy::Debounce => gather_debounced(&rx, &mut batch, quiescence),
        };

        tracing::trace!(len = batch.len(), "batch ready");
        if tx.send(batch).is_err() {
            break CoalesceExit::Disconnected;
        }
        batches += 1;

        if !upstream_open {
            break CoalesceExit::UpstreamClosed;
        }
    };

    tracing::debug!(?exit, batches, "coalescer stopped");
    exit
}

/// Returns false once the upstream queue is closed and empty.
fn gather_sleeping(rx: &Receiver<RawEvent>, batch: &mut Batch, quiescence: Duration) -> bool {
    loop {
        thread::sleep(quiescence);
        match rx.try_recv() {
            Ok(event) => batch.absorb(event),
            Err(TryRecvError::Empty) => return true,
            Err(TryRecvError::Disconnected) => return false,
        }
    }
}

fn gather_debounced(rx: &Receiver<RawEvent>, batch: &mut Batch, quiescence: Duration) -> bool {
    loop {
        match rx.recv_timeout(quiescence) {
            Ok(event) => batch.absorb(event),
            Err(RecvTimeoutError::Timeout) => return true,
            Err(RecvTimeoutError::Disconnected) => return false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::unbounded;
    use std::time::Instant;

    const WINDOW: Duration = Duration::from_millis(3);

    fn event(byte: u8, at: Instant) -> RawEvent {
        RawEvent::new(byte, at)
    }

    #[test]
    fn strategy_from_str() {
        assert_eq!(CoalesceStrategy::from_str("sleep"), Some(CoalesceStrategy::Sleep));
        assert_eq!(
            CoalesceStrategy::from_str(" Debounce "),
            Some(CoalesceStrategy::Debounce)
        );
        assert_eq!(CoalesceStrategy::from_str("spin"), None);
        assert_eq!(CoalesceStrategy::default(), CoalesceStrategy::Sleep);
    }

    #[test]
    fn events_within_window_merge() {
        for strategy in [CoalesceStrategy::Sleep, CoalesceStrategy::Debounce] {
            let (raw_tx, raw_rx) = unbounded();
            let (batch_tx, batch_rx) = unbounded();
            let t0 = Instant::now();
            let t1 = t0 + Duration::from_micros(200);
            raw_tx.send(event(b'a', t0)).unwrap();
            raw_tx.send(event(b'b', t1)).unwrap();
            drop(raw_tx);

            let exit = run_coalescer(raw_rx, batch_tx, WINDOW, strategy);
            assert_eq!(exit, CoalesceExit::UpstreamClosed);

            let batches: Vec<Batch> = batch_rx.iter().collect();
            assert_eq!(batches.len(), 1, "{strategy:?}");
            assert_eq!(batches[0].bytes(), b"ab");
            assert_eq!(batches[0].timestamp(), t1);
        }
    }

    #[test]
    fn escape_sequence_burst_becomes_one_batch() {
        let (raw_tx, raw_rx) = unbounded();
        let (batch_tx, batch_rx) = unbounded();
        let now = Instant::now();
        for byte in *b"\x1b[A" {
            raw_tx.send(event(byte, now)).unwrap();
        }
        drop(raw_tx);

        run_coalescer(raw_rx, batch_tx, WINDOW, CoalesceStrategy::Sleep);
        let batch = batch_rx.recv().unwrap();
        assert_eq!(batch.bytes(), b"\x1b[A");
        assert!(batch_rx.try_recv().is_err());
    }

    #[test]
    fn event_after_window_starts_new_batch() {
        let (raw_tx, raw_rx) = unbounded();
        let (batch_tx, batch_rx) = unbounded();
        let handle =
            thread::spawn(move || run_coalescer(raw_rx, batch_tx, WINDOW, CoalesceStrategy::Sleep));

        raw_tx.send(event(b'k', Instant::now())).unwrap();
        let first = batch_rx.recv_timeout(Duration::from_secs(2)).unwrap();

        raw_tx.send(event(b'j', Instant::now())).unwrap();
        let second = batch_rx.recv_timeout(Duration::from_secs(2)).unwrap();
        drop(raw_tx);

        assert_eq!(first.bytes(), b"k");
        assert_eq!(second.bytes(), b"j");
        assert!(second.timestamp() >= first.timestamp());
        assert_eq!(handle.join().unwrap(), CoalesceExit::UpstreamClosed);
    }

    #[test]
    fn long_burst_keeps_every_byte_in_order() {
        let (raw_tx, raw_rx) = unbounded();
        let (batch_tx, batch_rx) = unbounded();
        let input: Vec<u8> = (0..=255u8).collect();
        let now = Instant::now();
        for &byte in &input {
            raw_tx.send(event(byte, now)).unwrap();
        }
        drop(raw_tx);

        run_coalescer(raw_rx, batch_tx, Duration::from_micros(10), CoalesceStrategy::Debounce);
        let output: Vec<u8> = batch_rx.iter().flat_map(Batch::into_bytes).collect();
        assert_eq!(output, input);
    }

    #[test]
    fn closed_upstream_without_events() {
        let (raw_tx, raw_rx) = unbounded::<RawEvent>();
        let (batch_tx, batch_rx) = unbounded();
        drop(raw_tx);

        let exit = run_coalescer(raw_rx, batch_tx, WINDOW, CoalesceStrategy::Sleep);
        assert_eq!(exit, CoalesceExit::UpstreamClosed);
        assert!(batch_rx.recv().is_err());
    }

    #[test]
    fn dropped_consumer_ends_loop() {
        let (raw_tx, raw_rx) = unbounded();
        let (batch_tx, batch_rx) = unbounded();
        drop(batch_rx);
        raw_tx.send(event(b' ', Instant::now())).unwrap();

        let exit = run_coalescer(raw_rx, batch_tx, WINDOW, CoalesceStrategy::Sleep);
        assert_eq!(exit, CoalesceExit::Disconnected);
    }
}
