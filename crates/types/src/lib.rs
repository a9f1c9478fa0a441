//! Core types module - shared data structures and constants
//!
//! This module defines the values that flow through the key input pipeline.
//! All types are pure data structures with no external dependencies, making them
//! usable by the byte source, the coalescing stage, the decoder and the game loop.
//!
//! # Pipeline Values
//!
//! | Type | Produced by | Description |
//! |------|-------------|-------------|
//! | [`RawEvent`] | byte source | One input unit plus the instant it was read |
//! | [`Batch`] | coalescing stage | Units that arrived within one quiescence window |
//! | [`LogicalKey`] | key trie decoder | Device-independent key press |
//!
//! # Timing Constants
//!
//! Timing values are in milliseconds:
//!
//! | Constant | Value | Description |
//! |----------|-------|-------------|
//! | `DEFAULT_QUIESCENCE_MS` | 3 | Idle gap that closes a batch |
//! | `DEFAULT_POLL_INTERVAL_MS` | 50 | Upper bound on how long the byte source waits before re-checking its stop flag |
//!
//! # Examples
//!
//! ```
//! use std::time::Instant;
//! use tui_msweep_types::{Batch, LogicalKey, RawEvent};
//!
//! let key = LogicalKey::from_str("up").unwrap();
//! assert_eq!(key, LogicalKey::Up);
//! assert_eq!(key as u8, 0);
//!
//! let now = Instant::now();
//! let mut batch = Batch::from_event(RawEvent::new(0x1b, now));
//! batch.absorb(RawEvent::new(b'[', now));
//! batch.absorb(RawEvent::new(b'A', now));
//! assert_eq!(batch.bytes(), b"\x1b[A");
//! ```

use std::time::Instant;

/// Idle gap that closes a batch (3ms).
pub const DEFAULT_QUIESCENCE_MS: u64 = 3;

/// Byte source stop-flag check interval (50ms).
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 50;

/// Escape byte (0x1b) that prefixes ANSI sequences.
pub const ESC: u8 = 0x1b;

/// Carriage return byte delivered by Enter in raw mode.
pub const CR: u8 = b'\r';

/// End-of-text byte delivered by Ctrl-C once signal generation is disabled.
pub const ETX: u8 = 0x03;


/// Device-independent key press produced by the decoder.
///
/// Discriminants are fixed at compile time so they can be logged or stored
/// as plain integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LogicalKey {
    Up = 0,
    Down = 1,
    Left = 2,
    Right = 3,
    Enter = 4,
    Space = 5,
    /// Ctrl-C. Raw mode turns it into a plain byte instead of SIGINT.
    Interrupt = 6,
}

impl LogicalKey {
    /// Every key, in discriminant order.
    pub const ALL: [LogicalKey; 7] = [
        LogicalKey::Up,
        LogicalKey::Down,
        LogicalKey::Left,
        LogicalKey::Right,
        LogicalKey::Enter,
        LogicalKey::Space,
        LogicalKey::Interrupt,
    ];

    /// Parse a key name (case-insensitive)
    ///
    /// # Examples
    ///
    /// ```
    /// use tui_msweep_types::LogicalKey;
    ///
    /// assert_eq!(LogicalKey::from_str("Left"), Some(LogicalKey::Left));
    /// assert_eq!(LogicalKey::from_str("space"), Some(LogicalKey::Space));
    /// assert_eq!(LogicalKey::from_str("unknown"), None);
    /// ```
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "up" => Some(LogicalKey::Up),
            "down" => Some(LogicalKey::Down),
            "left" => Some(LogicalKey::Left),
            "right" => Some(LogicalKey::Right),
            "enter" => Some(LogicalKey::Enter),
            "space" => Some(LogicalKey::Space),
            "interrupt" => Some(LogicalKey::Interrupt),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogicalKey::Up => "up",
            LogicalKey::Down => "down",
            LogicalKey::Left => "left",
            LogicalKey::Right => "right",
            LogicalKey::Enter => "enter",
            LogicalKey::Space => "space",
            LogicalKey::Interrupt => "interrupt",
        }
    }

    /// True for the four cursor-movement keys.
    pub fn is_direction(&self) -> bool {
        matches!(
            self,
            LogicalKey::Up | LogicalKey::Down | LogicalKey::Left | LogicalKey::Right
        )
    }
}

/// One input unit read from the device, stamped with the read instant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub bytes: Vec<u8>,
    pub timestamp: Instant,
}

impl RawEvent {
    pub fn new(byte: u8, timestamp: Instant) -> Self {
        Self {
            bytes: vec![byte],
            timestamp,
        }
    }
}

/// Units that arrived close enough together to be decoded as one key.
///
/// Bytes are kept in arrival order and the timestamp is that of the last
/// contributing [`RawEvent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Batch {
    bytes: Vec<u8>,
    timestamp: Instant,
}

impl Batch {
    /// Start a batch from its first event.
    pub fn from_event(event: RawEvent) -> Self {
        Self {
            bytes: event.bytes,
            timestamp: event.timestamp,
        }
    }

    /// Append a later event's bytes and take over its timestamp.
    pub fn absorb(&mut self, event: RawEvent) {
        self.bytes.extend_from_slice(&event.bytes);
        self.timestamp = event.timestamp;
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn timestamp(&self) -> Instant {
        self.timestamp
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}
