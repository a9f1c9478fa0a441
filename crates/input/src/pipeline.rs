//! Wiring: device → byte source thread → coalescer thread → consumer.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError, TryRecvError};
use thiserror::Error;

use crate::coalesce::{run_coalescer, CoalesceExit, CoalesceStrategy};
use crate::device::ByteDevice;
use crate::source::{run_byte_source, SourceExit};
use crate::trie::KeyTrie;
use crate::types::{Batch, LogicalKey, DEFAULT_POLL_INTERVAL_MS, DEFAULT_QUIESCENCE_MS};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("input pipeline closed")]
    Closed,
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Pipeline tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Idle gap that closes a batch.
    pub quiescence: Duration,
    /// Longest the byte source waits on the device before re-checking its
    /// stop flag.
    pub poll_interval: Duration,
    pub strategy: CoalesceStrategy,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            quiescence: Duration::from_millis(DEFAULT_QUIESCENCE_MS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            strategy: CoalesceStrategy::default(),
        }
    }
}

impl PipelineConfig {
    /// Create from environment variables
    ///
    /// - `MSWEEP_QUIESCENCE_MS`: batch window in milliseconds
    /// - `MSWEEP_POLL_MS`: stop-flag check interval in milliseconds (> 0)
    /// - `MSWEEP_COALESCE`: `sleep` or `debounce`
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Like [`PipelineConfig::from_env`] with a custom variable lookup.
    /// Missing or unparsable values fall back to the defaults.
    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let quiescence = lookup("MSWEEP_QUIESCENCE_MS")
            .and_then(|s| s.trim().parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(defaults.quiescence);

        let poll_interval = lookup("MSWEEP_POLL_MS")
            .and_then(|s| s.trim().parse::<u64>().ok())
            .filter(|ms| *ms > 0)
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        let strategy = lookup("MSWEEP_COALESCE")
            .and_then(|s| CoalesceStrategy::from_str(&s))
            .unwrap_or(defaults.strategy);

        Self {
            quiescence,
            poll_interval,
            strategy,
        }
    }
}

/// How the background threads ended. `None` means the thread panicked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PipelineExit {
    pub source: Option<SourceExit>,
    pub coalescer: Option<CoalesceExit>,
}

/// Running input pipeline.
///
/// Owns the byte source and coalescer threads and the receiving end of the
/// batch queue. Queues are unbounded; input arrives at typing speed.
///
/// Dropping the pipeline stops and joins both threads, same as
/// [`InputPipeline::shutdown`].
#[derive(Debug)]
pub struct InputPipeline {
    batches: Receiver<Batch>,
    stop: Arc<AtomicBool>,
    source: Option<JoinHandle<SourceExit>>,
    coalescer: Option<JoinHandle<CoalesceExit>>,
}

impl InputPipeline {
    /// Start both background threads reading from `device`.
    pub fn spawn<D: ByteDevice>(device: D, config: &PipelineConfig) -> Result<Self, PipelineError> {
        let (raw_tx, raw_rx) = unbounded();
        let (batch_tx, batch_rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));

        let quiescence = config.quiescence;
        let strategy = config.strategy;
        let coalescer = thread::Builder::new()
            .name("msweep-coalescer".into())
            .spawn(move || run_coalescer(raw_rx, batch_tx, quiescence, strategy))
            .map_err(|source| PipelineError::Spawn {
                name: "coalescer",
                source,
            })?;

        let poll_interval = config.poll_interval;
        let source_stop = Arc::clone(&stop);
        // On failure the closure, and with it `raw_tx`, is dropped, so the
        // coalescer sees a closed queue and exits.
        let source = match thread::Builder::new()
            .name("msweep-byte-source".into())
            .spawn(move || run_byte_source(device, raw_tx, source_stop, poll_interval))
        {
            Ok(handle) => handle,
            Err(source) => {
                let _ = coalescer.join();
                return Err(PipelineError::Spawn {
                    name: "byte source",
                    source,
                });
            }
        };

        tracing::debug!(?config, "input pipeline started");
        Ok(Self {
            batches: batch_rx,
            stop,
            source: Some(source),
            coalescer: Some(coalescer),
        })
    }

    /// Block until the next batch arrives.
    pub fn recv(&self) -> Result<Batch, PipelineError> {
        self.batches.recv().map_err(|_| PipelineError::Closed)
    }

    /// Return the next batch if one is ready.
    pub fn try_recv(&self) -> Result<Option<Batch>, PipelineError> {
        match self.batches.try_recv() {
            Ok(batch) => Ok(Some(batch)),
            Err(TryRecvError::Empty) => Ok(None),
            Err(TryRecvError::Disconnected) => Err(PipelineError::Closed),
        }
    }

    /// Wait up to `timeout` for the next batch.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Batch>, PipelineError> {
        match self.batches.recv_timeout(timeout) {
            Ok(batch) => Ok(Some(batch)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(PipelineError::Closed),
        }
    }

    /// Block for the next batch and decode it with [`KeyTrie::decode`].
    ///
    /// `Ok(None)` is an unrecognized batch, not an error.
    pub fn recv_key(&self, trie: &KeyTrie) -> Result<Option<LogicalKey>, PipelineError> {
        let batch = self.recv()?;
        let key = trie.decode(batch.bytes());
        if key.is_none() {
            tracing::debug!(bytes = ?batch.bytes(), "unrecognized batch");
        }
        Ok(key)
    }

    /// The batch queue, for use with `crossbeam_channel::select!`.
    pub fn batches(&self) -> &Receiver<Batch> {
        &self.batches
    }

    /// Stop the byte source and join both threads.
    ///
    /// Returns once neither thread touches the device any more. With a device
    /// that honors its read timeout this takes at most one poll interval plus
    /// one quiescence window.
    pub fn shutdown(mut self) -> PipelineExit {
        self.stop_and_join()
    }

    fn stop_and_join(&mut self) -> PipelineExit {
        self.stop.store(true, Ordering::Release);

        let source = self.source.take().and_then(|h| h.join().ok());
        let coalescer = self.coalescer.take().and_then(|h| h.join().ok());
        let exit = PipelineExit { source, coalescer };
        tracing::debug!(?exit, "input pipeline stopped");
        exit
    }
}

impl Drop for InputPipeline {
    fn drop(&mut self) {
        if self.source.is_some() || self.coalescer.is_some() {
            let _ = self.stop_and_join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn config_defaults() {
        let config = PipelineConfig::default();
        assert_eq!(config.quiescence, Duration::from_millis(3));
        assert_eq!(config.poll_interval, Duration::from_millis(50));
        assert_eq!(config.strategy, CoalesceStrategy::Sleep);
        assert_eq!(PipelineConfig::from_vars(vars(&[])), config);
    }

    #[test]
    fn config_from_vars() {
        let config = PipelineConfig::from_vars(vars(&[
            ("MSWEEP_QUIESCENCE_MS", "10"),
            ("MSWEEP_POLL_MS", "20"),
            ("MSWEEP_COALESCE", "debounce"),
        ]));
        assert_eq!(config.quiescence, Duration::from_millis(10));
        assert_eq!(config.poll_interval, Duration::from_millis(20));
        assert_eq!(config.strategy, CoalesceStrategy::Debounce);
    }

    #[test]
    fn config_rejects_bad_values() {
        let config = PipelineConfig::from_vars(vars(&[
            ("MSWEEP_QUIESCENCE_MS", "soon"),
            ("MSWEEP_POLL_MS", "0"),
            ("MSWEEP_COALESCE", "spin"),
        ]));
        assert_eq!(config, PipelineConfig::default());
    }
}
