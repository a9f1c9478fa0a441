//! End-to-end tests over a pseudo-terminal: raw mode, decoding and restore.

use std::fs::File;
use std::io::Write;
use std::time::Duration;

use nix::pty::openpty;
use nix::sys::termios::{tcgetattr, LocalFlags};

use tui_msweep::input::{CoalesceExit, KeyTrie, PipelineConfig, SourceExit};
use tui_msweep::term::{KeySession, SessionConfig, TerminalGuard};
use tui_msweep::types::LogicalKey;

struct Pty {
    master: File,
    slave: File,
}

fn open_pty() -> Pty {
    let pty = openpty(None, None).expect("openpty");
    Pty {
        master: File::from(pty.master),
        slave: File::from(pty.slave),
    }
}

fn session_config() -> SessionConfig {
    SessionConfig {
        pipeline: PipelineConfig {
            quiescence: Duration::from_millis(10),
            poll_interval: Duration::from_millis(10),
            ..PipelineConfig::default()
        },
        handle_signals: false,
        restore_on_panic: false,
        ..SessionConfig::default()
    }
}

fn start(pty: &Pty) -> KeySession {
    let guard = TerminalGuard::acquire(pty.slave.try_clone().unwrap(), "pty").unwrap();
    KeySession::start(guard, &session_config()).unwrap()
}

#[test]
fn test_keys_through_pty() {
    let mut pty = open_pty();
    let session = start(&pty);
    let trie = KeyTrie::default();

    pty.master.write_all(b"\x1b[A").unwrap();
    assert_eq!(session.recv_key(&trie).unwrap(), Some(LogicalKey::Up));

    pty.master.write_all(b"h").unwrap();
    assert_eq!(session.recv_key(&trie).unwrap(), Some(LogicalKey::Left));

    // Raw mode delivers Enter as CR and Ctrl-C as a plain byte.
    pty.master.write_all(b"\r").unwrap();
    assert_eq!(session.recv_key(&trie).unwrap(), Some(LogicalKey::Enter));

    pty.master.write_all(&[0x03]).unwrap();
    assert_eq!(session.recv_key(&trie).unwrap(), Some(LogicalKey::Interrupt));

    pty.master.write_all(b"q").unwrap();
    assert_eq!(session.recv_key(&trie).unwrap(), None);

    session.close().unwrap();
}

#[test]
fn test_close_joins_threads_then_restores() {
    let pty = open_pty();
    let before = tcgetattr(&pty.slave).unwrap();
    assert!(before.local_flags.contains(LocalFlags::ICANON));

    let session = start(&pty);
    let raw = tcgetattr(&pty.slave).unwrap();
    assert!(!raw.local_flags.contains(LocalFlags::ICANON));
    assert!(session.guard().is_raw());

    let exit = session.close().unwrap();
    assert_eq!(exit.source, Some(SourceExit::Stopped));
    assert_eq!(exit.coalescer, Some(CoalesceExit::UpstreamClosed));

    let after = tcgetattr(&pty.slave).unwrap();
    assert_eq!(after.local_flags, before.local_flags);
    assert_eq!(after.output_flags, before.output_flags);
}

#[test]
fn test_drop_restores_terminal() {
    let pty = open_pty();
    let before = tcgetattr(&pty.slave).unwrap();

    drop(start(&pty));

    let after = tcgetattr(&pty.slave).unwrap();
    assert_eq!(after.local_flags, before.local_flags);
}

#[test]
fn test_hangup_closes_input() {
    let pty = open_pty();
    let Pty { master, slave } = pty;
    let guard = TerminalGuard::acquire(slave, "pty").unwrap();
    let session = KeySession::start(guard, &session_config()).unwrap();

    drop(master);
    assert!(session.recv_timeout(Duration::from_secs(2)).is_err());
    assert!(session.pipeline().batches().is_empty());
}
