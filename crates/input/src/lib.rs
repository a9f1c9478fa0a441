//! Terminal key input module (game-facing).
//!
//! This module is independent of any terminal backend. It turns a stream of
//! raw input units into [`crate::types::LogicalKey`]s:
//!
//! - [`source`]: background loop that reads one unit at a time from a [`ByteDevice`]
//! - [`coalesce`]: background loop that groups units arriving within a quiescence window
//! - [`trie`]: pure prefix-trie decoder from a batch to a key
//! - [`pipeline`]: threads and queues tying the stages together
//!
//! # Example
//!
//! ```
//! use std::io::Cursor;
//! use tui_msweep_input::{InputPipeline, KeyTrie, PipelineConfig, ReaderDevice};
//! use tui_msweep_input::types::LogicalKey;
//!
//! let device = ReaderDevice::new(Cursor::new(b"k".to_vec()));
//! let pipeline = InputPipeline::spawn(device, &PipelineConfig::default()).unwrap();
//!
//! let trie = KeyTrie::default();
//! assert_eq!(pipeline.recv_key(&trie).unwrap(), Some(LogicalKey::Up));
//! assert!(pipeline.recv().is_err());
//! ```

pub mod coalesce;
pub mod device;
pub mod pipeline;
pub mod source;
pub mod trie;

pub use tui_msweep_types as types;

pub use coalesce::{run_coalescer, CoalesceExit, CoalesceStrategy};
pub use device::{ByteDevice, ReadOutcome, ReaderDevice};
pub use pipeline::{InputPipeline, PipelineConfig, PipelineError, PipelineExit};
pub use source::{run_byte_source, SourceExit};
pub use trie::{DecodeAll, KeyTrie, KeyTrieBuilder};
