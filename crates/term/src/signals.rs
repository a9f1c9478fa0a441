//! Signal-driven terminal restore.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;
use signal_hook::consts::signal::{SIGHUP, SIGINT, SIGQUIT, SIGTERM};
use signal_hook::iterator::{Handle, Signals};

use crate::guard::RestoreState;

const TERM_SIGNALS: [i32; 4] = [SIGINT, SIGTERM, SIGHUP, SIGQUIT];

/// Process-wide fallback for the termination signals.
///
/// signal-hook keeps its OS-level handler installed after every `Signals` is
/// dropped, which would leave the process ignoring Ctrl-C and `kill`. A
/// conditional default action is registered once per signal, ahead of any
/// `Signals`, and fires only while no guard is armed.
struct Fallback {
    idle: Arc<AtomicBool>,
    armed: Mutex<usize>,
}

static FALLBACK: OnceLock<Fallback> = OnceLock::new();

fn fallback() -> io::Result<&'static Fallback> {
    if let Some(fallback) = FALLBACK.get() {
        return Ok(fallback);
    }
    let idle = Arc::new(AtomicBool::new(true));
    let mut registered = Ok(());
    let fallback = FALLBACK.get_or_init(|| {
        for signal in TERM_SIGNALS {
            if let Err(err) = signal_hook::flag::register_conditional_default(signal, idle.clone())
            {
                registered = Err(err);
                break;
            }
        }
        Fallback {
            idle,
            armed: Mutex::new(0),
        }
    });
    registered.map(|()| fallback)
}

impl Fallback {
    fn arm(&self) {
        let mut armed = self.armed.lock();
        *armed += 1;
        self.idle.store(false, Ordering::SeqCst);
    }

    fn disarm(&self) {
        let mut armed = self.armed.lock();
        *armed = armed.saturating_sub(1);
        if *armed == 0 {
            self.idle.store(true, Ordering::SeqCst);
        }
    }
}

/// Background thread that restores the terminal and exits on termination
/// signals. Raw mode disables the keys that would normally raise SIGINT and
/// SIGQUIT, so these arrive only from outside (`kill`, a closing session).
#[derive(Debug)]
pub(crate) struct SignalRestore {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl SignalRestore {
    pub(crate) fn install(state: Weak<RestoreState>) -> io::Result<Self> {
        let fallback = fallback()?;
        let mut signals = Signals::new(TERM_SIGNALS)?;
        let handle = signals.handle();
        let thread = thread::Builder::new()
            .name("msweep-signals".into())
            .spawn(move || {
                if let Some(signal) = signals.forever().next() {
                    tracing::warn!(signal, "termination signal received, restoring terminal");
                    if let Some(state) = state.upgrade() {
                        if let Err(err) = state.restore(true) {
                            tracing::error!(error = %err, "failed to restore terminal mode");
                        }
                    }
                    std::process::exit(128 + signal);
                }
            })?;
        fallback.arm();

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }
}

impl Drop for SignalRestore {
    fn drop(&mut self) {
        // The owning guard restores the terminal before its fields drop, so
        // the default action is safe to hand back first.
        if let Some(fallback) = FALLBACK.get() {
            fallback.disarm();
        }
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}
