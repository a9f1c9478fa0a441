//! Prefix-trie decoder from raw byte batches to logical keys.
//!
//! A batch is decoded in one pass with no continuation: an incomplete prefix
//! (for example a lone `ESC`) is reported as no match and is not carried over
//! to the next batch.

use std::collections::BTreeMap;

use crate::types::{LogicalKey, CR, ESC, ETX};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Leaf(LogicalKey),
    Inner {
        children: BTreeMap<u8, Node>,
        /// Key for a batch that ends exactly at this node.
        sentinel: Option<LogicalKey>,
    },
}

impl Node {
    fn inner() -> Self {
        Node::Inner {
            children: BTreeMap::new(),
            sentinel: None,
        }
    }

    fn insert(&mut self, seq: &[u8], key: LogicalKey) {
        let Some((&byte, rest)) = seq.split_first() else {
            match self {
                Node::Leaf(existing) => *existing = key,
                Node::Inner { sentinel, .. } => *sentinel = Some(key),
            }
            return;
        };

        // A leaf that gains children keeps its key as the sentinel.
        if let Node::Leaf(existing) = *self {
            *self = Node::Inner {
                children: BTreeMap::new(),
                sentinel: Some(existing),
            };
        }

        if let Node::Inner { children, .. } = self {
            let child = children.entry(byte).or_insert_with(|| {
                if rest.is_empty() {
                    Node::Leaf(key)
                } else {
                    Node::inner()
                }
            });
            child.insert(rest, key);
        }
    }
}

/// Immutable map from byte sequences to [`LogicalKey`]s.
///
/// Built with [`KeyTrie::builder`]. [`KeyTrie::default`] returns the
/// minesweeper bindings (arrows, vi keys, WASD, Enter, Space, Ctrl-C).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyTrie {
    root: Node,
}

impl KeyTrie {
    pub fn builder() -> KeyTrieBuilder {
        KeyTrieBuilder { root: Node::inner() }
    }

    /// Bindings used by the minesweeper game loop.
    pub fn minesweeper() -> Self {
        use LogicalKey::*;

        Self::builder()
            .bind(&[CR], Enter)
            .bind(b" ", Space)
            .bind(&[ETX], Interrupt)
            .bind(&[ESC, b'[', b'A'], Up)
            .bind(&[ESC, b'[', b'B'], Down)
            .bind(&[ESC, b'[', b'D'], Left)
            .bind(&[ESC, b'[', b'C'], Right)
            .bind(b"k", Up)
            .bind(b"j", Down)
            .bind(b"h", Left)
            .bind(b"l", Right)
            .bind(b"w", Up)
            .bind(b"s", Down)
            .bind(b"a", Left)
            .bind(b"d", Right)
            .build()
    }

    /// Decode one batch.
    ///
    /// Returns `None` when the batch is unrecognized or ends on an incomplete
    /// prefix. When a complete key is reached before the end of the batch, the
    /// key is returned and the trailing bytes are ignored; use
    /// [`KeyTrie::decode_all`] to decode them too.
    pub fn decode(&self, bytes: &[u8]) -> Option<LogicalKey> {
        self.walk(bytes).0
    }

    /// Decode every key in a batch, re-decoding the bytes left over after an
    /// early match.
    ///
    /// Yields `Some(key)` per recognized key. If the remainder cannot be
    /// recognized a single `None` is yielded and iteration stops.
    pub fn decode_all<'a>(&'a self, bytes: &'a [u8]) -> DecodeAll<'a> {
        DecodeAll {
            trie: self,
            rest: bytes,
            done: false,
        }
    }

    /// Returns the decoded key and how many bytes were consumed.
    fn walk(&self, bytes: &[u8]) -> (Option<LogicalKey>, usize) {
        let mut node = &self.root;
        for (i, byte) in bytes.iter().enumerate() {
            match node {
                Node::Leaf(key) => return (Some(*key), i),
                Node::Inner { children, .. } => match children.get(byte) {
                    Some(child) => node = child,
                    None => return (None, bytes.len()),
                },
            }
        }

        let key = match node {
            Node::Leaf(key) => Some(*key),
            Node::Inner { sentinel, .. } => *sentinel,
        };
        (key, bytes.len())
    }
}

impl Default for KeyTrie {
    fn default() -> Self {
        Self::minesweeper()
    }
}

/// Collects bindings for a [`KeyTrie`].
#[derive(Debug, Clone)]
pub struct KeyTrieBuilder {
    root: Node,
}

impl KeyTrieBuilder {
    /// Bind `seq` to `key`.
    ///
    /// Binding a sequence that is a strict prefix of another binding makes that
    /// prefix a complete key when a batch ends on it. Rebinding a sequence
    /// replaces its key. Empty sequences are ignored.
    pub fn bind(mut self, seq: &[u8], key: LogicalKey) -> Self {
        if seq.is_empty() {
            tracing::warn!(key = key.as_str(), "ignoring empty key binding");
            return self;
        }
        self.root.insert(seq, key);
        self
    }

    pub fn build(self) -> KeyTrie {
        KeyTrie { root: self.root }
    }
}

/// Iterator returned by [`KeyTrie::decode_all`].
#[derive(Debug, Clone)]
pub struct DecodeAll<'a> {
    trie: &'a KeyTrie,
    rest: &'a [u8],
    done: bool,
}

impl Iterator for DecodeAll<'_> {
    type Item = Option<LogicalKey>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.rest.is_empty() {
            return None;
        }

        let (key, used) = self.trie.walk(self.rest);
        self.rest = &self.rest[used..];
        if key.is_none() {
            self.done = true;
        }
        Some(key)
    }
}
