//! Raw-mode guard for the interactive input device.
//!
//! The guard saves the device's termios on acquisition and puts it back on
//! release. Release is idempotent and runs from every exit path the guard can
//! observe: an explicit [`TerminalGuard::release`], `Drop`, the panic hook
//! installed by [`TerminalGuard::restore_on_panic`] (release builds abort on
//! panic, so `Drop` never runs there), and the signal thread started by
//! [`TerminalGuard::handle_signals`].

use std::fs::File;
use std::io::{self, IsTerminal};
use std::os::fd::AsFd;
use std::os::unix::fs::OpenOptionsExt;
use std::panic;
use std::path::Path;
use std::sync::{Arc, Once, Weak};

use nix::sys::termios::{self, OutputFlags, SetArg, SpecialCharacterIndices, Termios};
use parking_lot::{const_mutex, Mutex};

use crate::error::TermError;
use crate::signals::SignalRestore;

/// Guards the panic hook restores. The hook itself is installed once.
static PANIC_RESTORE: Mutex<Vec<Weak<RestoreState>>> = const_mutex(Vec::new());
static PANIC_HOOK: Once = Once::new();

/// Saved configuration shared with the panic hook and signal thread.
#[derive(Debug)]
pub(crate) struct RestoreState {
    file: File,
    device: String,
    saved: Mutex<Option<Termios>>,
}

impl RestoreState {
    /// Put the saved termios back. A no-op once it has succeeded.
    ///
    /// With `blocking == false` the call gives up instead of waiting for a
    /// concurrent restore, which keeps a panic inside `restore` from
    /// deadlocking the panic hook.
    pub(crate) fn restore(&self, blocking: bool) -> Result<bool, TermError> {
        let mut saved = if blocking {
            self.saved.lock()
        } else {
            match self.saved.try_lock() {
                Some(guard) => guard,
                None => return Ok(false),
            }
        };

        let Some(original) = saved.take() else {
            return Ok(false);
        };

        if let Err(errno) = termios::tcsetattr(&self.file, SetArg::TCSADRAIN, &original) {
            *saved = Some(original);
            return Err(TermError::Ioctl {
                op: "tcsetattr",
                device: self.device.clone(),
                errno,
            });
        }

        tracing::debug!(device = %self.device, "terminal mode restored");
        Ok(true)
    }

    fn is_raw(&self) -> bool {
        self.saved.lock().is_some()
    }
}

/// Exclusive raw-mode access to one terminal device.
///
/// Raw mode here is `cfmakeraw` (no line editing, no echo, no signal keys,
/// one unit per read) with output post-processing kept on, so `\n` still
/// moves to the start of the next line.
#[derive(Debug)]
pub struct TerminalGuard {
    file: File,
    state: Arc<RestoreState>,
    signals: Option<SignalRestore>,
}

impl TerminalGuard {
    /// Open `path` (typically `/dev/tty`) and switch it to raw mode.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TermError> {
        let path = path.as_ref();
        let device = path.display().to_string();
        let file = File::options()
            .read(true)
            .write(true)
            .custom_flags(nix::libc::O_NOCTTY | nix::libc::O_CLOEXEC)
            .open(path)
            .map_err(|source| TermError::Open {
                device: device.clone(),
                source,
            })?;
        Self::acquire(file, device)
    }

    /// Switch the process's standard input to raw mode.
    pub fn stdin() -> Result<Self, TermError> {
        let fd = io::stdin().as_fd().try_clone_to_owned()?;
        Self::acquire(File::from(fd), "stdin")
    }

    /// Switch an already open device to raw mode.
    ///
    /// Fails with [`TermError::NotATerminal`] if `file` is not interactive and
    /// with [`TermError::Ioctl`] if its configuration cannot be read or set.
    pub fn acquire(file: File, device: impl Into<String>) -> Result<Self, TermError> {
        let device = device.into();
        if !file.is_terminal() {
            return Err(TermError::NotATerminal { device });
        }

        let ioctl = |op: &'static str| {
            let device = device.clone();
            move |errno| TermError::Ioctl { op, device, errno }
        };

        let original = termios::tcgetattr(&file).map_err(ioctl("tcgetattr"))?;
        let restore_file = file.try_clone()?;

        let mut raw = original.clone();
        termios::cfmakeraw(&mut raw);
        raw.output_flags |= OutputFlags::OPOST;
        raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
        raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
        termios::tcsetattr(&file, SetArg::TCSAFLUSH, &raw).map_err(ioctl("tcsetattr"))?;

        tracing::info!(device = %device, "terminal switched to raw mode");
        Ok(Self {
            file,
            state: Arc::new(RestoreState {
                file: restore_file,
                device,
                saved: Mutex::new(Some(original)),
            }),
            signals: None,
        })
    }

    /// Human-readable device name used in errors and logs.
    pub fn device_name(&self) -> &str {
        &self.state.device
    }

    /// True until the saved configuration has been restored.
    pub fn is_raw(&self) -> bool {
        self.state.is_raw()
    }

    /// A new handle to the device, for readers.
    pub fn try_clone_device(&self) -> io::Result<File> {
        self.file.try_clone()
    }

    /// Restore the saved configuration. Safe to call more than once.
    pub fn release(&self) -> Result<(), TermError> {
        self.state.restore(true).map(|_| ())
    }

    /// Restore the terminal before the current panic hook runs.
    ///
    /// The hook is installed once per process and restores every guard
    /// registered here that is still alive. Dropped guards are pruned on the
    /// next registration.
    pub fn restore_on_panic(&self) {
        let state: Weak<RestoreState> = Arc::downgrade(&self.state);
        {
            let mut armed = PANIC_RESTORE.lock();
            armed.retain(|weak| weak.strong_count() > 0);
            if !armed.iter().any(|weak| weak.ptr_eq(&state)) {
                armed.push(state);
            }
        }

        PANIC_HOOK.call_once(|| {
            let previous = panic::take_hook();
            panic::set_hook(Box::new(move |info| {
                if let Some(armed) = PANIC_RESTORE.try_lock() {
                    for state in armed.iter().filter_map(Weak::upgrade) {
                        let _ = state.restore(false);
                    }
                }
                previous(info);
            }));
        });
    }

    /// Restore the terminal and exit when SIGINT, SIGTERM, SIGHUP or SIGQUIT
    /// arrives. The handler thread is stopped when the guard is dropped.
    pub fn handle_signals(&mut self) -> Result<(), TermError> {
        if self.signals.is_none() {
            let signals = SignalRestore::install(Arc::downgrade(&self.state))
                .map_err(TermError::Signal)?;
            self.signals = Some(signals);
        }
        Ok(())
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            tracing::error!(error = %err, "failed to restore terminal mode");
        }
    }
}
