//! A raw-mode terminal plus the input pipeline reading from it.

use std::path::PathBuf;
use std::time::Duration;

use crate::device::TtyDevice;
use crate::error::TermError;
use crate::guard::TerminalGuard;
use crate::input::{InputPipeline, KeyTrie, PipelineConfig, PipelineError, PipelineExit};
use crate::types::{Batch, LogicalKey};

/// Which device to read keys from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceSource {
    /// Open a terminal by path.
    Tty(PathBuf),
    /// Use the process's standard input.
    Stdin,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub device: DeviceSource,
    pub pipeline: PipelineConfig,
    /// Restore the terminal and exit on SIGINT/SIGTERM/SIGHUP/SIGQUIT.
    pub handle_signals: bool,
    /// Restore the terminal from the panic hook.
    pub restore_on_panic: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            device: DeviceSource::Tty(PathBuf::from("/dev/tty")),
            pipeline: PipelineConfig::default(),
            handle_signals: true,
            restore_on_panic: true,
        }
    }
}

impl SessionConfig {
    /// Create from environment variables
    ///
    /// - `MSWEEP_TTY`: device path, or `-` for standard input (default `/dev/tty`)
    /// - `MSWEEP_SIGNALS`: `0`/`false` disables the signal handler
    /// - plus everything read by [`PipelineConfig::from_env`]
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let device = lookup("MSWEEP_TTY")
            .map(|s| s.trim().to_string())
            .and_then(|s| match s.as_str() {
                "" => None,
                "-" => Some(DeviceSource::Stdin),
                _ => Some(DeviceSource::Tty(PathBuf::from(s))),
            })
            .unwrap_or(defaults.device);

        let handle_signals = lookup("MSWEEP_SIGNALS")
            .map(|s| !matches!(s.trim().to_lowercase().as_str(), "0" | "false" | "off"))
            .unwrap_or(defaults.handle_signals);

        Self {
            device,
            pipeline: PipelineConfig::from_vars(&lookup),
            handle_signals,
            restore_on_panic: defaults.restore_on_panic,
        }
    }
}

/// Raw-mode terminal with a running input pipeline.
///
/// Shutting down (via [`KeySession::close`] or `Drop`) first stops and joins
/// the pipeline threads, then restores the terminal mode.
#[derive(Debug)]
pub struct KeySession {
    // Field order is drop order: the pipeline must be joined before the
    // guard restores the terminal.
    pipeline: InputPipeline,
    guard: TerminalGuard,
}

impl KeySession {
    /// Acquire the configured device and start reading from it.
    pub fn open(config: &SessionConfig) -> Result<Self, TermError> {
        let guard = match &config.device {
            DeviceSource::Tty(path) => TerminalGuard::open(path)?,
            DeviceSource::Stdin => TerminalGuard::stdin()?,
        };
        Self::start(guard, config)
    }

    /// Start reading from an already acquired guard.
    pub fn start(mut guard: TerminalGuard, config: &SessionConfig) -> Result<Self, TermError> {
        if config.handle_signals {
            guard.handle_signals()?;
        }
        if config.restore_on_panic {
            guard.restore_on_panic();
        }

        let device = TtyDevice::new(guard.try_clone_device()?);
        let pipeline = InputPipeline::spawn(device, &config.pipeline)?;
        tracing::info!(device = guard.device_name(), "key session started");

        Ok(Self { pipeline, guard })
    }

    pub fn recv(&self) -> Result<Batch, PipelineError> {
        self.pipeline.recv()
    }

    pub fn try_recv(&self) -> Result<Option<Batch>, PipelineError> {
        self.pipeline.try_recv()
    }

    pub fn recv_timeout(&self, timeout: Duration) -> Result<Option<Batch>, PipelineError> {
        self.pipeline.recv_timeout(timeout)
    }

    pub fn recv_key(&self, trie: &KeyTrie) -> Result<Option<LogicalKey>, PipelineError> {
        self.pipeline.recv_key(trie)
    }

    pub fn pipeline(&self) -> &InputPipeline {
        &self.pipeline
    }

    pub fn guard(&self) -> &TerminalGuard {
        &self.guard
    }

    /// Join the pipeline threads, then restore the terminal.
    pub fn close(self) -> Result<PipelineExit, TermError> {
        let Self { pipeline, guard } = self;
        let exit = pipeline.shutdown();
        guard.release()?;
        tracing::info!(device = guard.device_name(), ?exit, "key session closed");
        Ok(exit)
    }
}
