//! Line framing with per-sender fragment buffers
//!
//! Frames are `\n`-terminated lines. A chunk may end mid-line; the trailing
//! fragment is buffered under the chunk's `sender_key` until the next chunk
//! completes it. Fragments are capped: once a sender's buffered partial
//! exceeds the cap the frame is dropped with a warning and the buffer reset.
//! When a TCP connection closes, its buffered remainder is discarded.

use std::collections::HashMap;

use bytes::{Bytes, BytesMut};

use crate::MAX_FRAGMENT_BYTES;

/// Per-sender partial-line buffers
#[derive(Debug, Default)]
pub struct FragmentBuffers {
    buffers: HashMap<String, SenderBuffer>,
    max_fragment: usize,
}

#[derive(Debug, Default)]
struct SenderBuffer {
    partial: BytesMut,
    /// Set while discarding an over-cap line up to its newline
    overflowed: bool,
}

impl FragmentBuffers {
    /// Create buffers with the default fragment cap
    pub fn new() -> Self {
        Self::with_max_fragment(MAX_FRAGMENT_BYTES)
    }

    /// Create buffers with an explicit fragment cap
    pub fn with_max_fragment(max_fragment: usize) -> Self {
        Self {
            buffers: HashMap::new(),
            max_fragment,
        }
    }

    /// Feed a chunk for a sender, returning the complete frames it yields
    ///
    /// Returned frames exclude the newline; `\r\n` endings are trimmed.
    /// Empty lines are dropped.
    pub fn push(&mut self, sender_key: &str, chunk: &[u8]) -> Vec<Bytes> {
        let buffer = self.buffers.entry(sender_key.to_string()).or_default();
        let mut frames = Vec::new();

        for &byte in chunk {
            if byte == b'\n' {
                if buffer.overflowed {
                    // End of the dropped line; resume normal framing
                    buffer.overflowed = false;
                    buffer.partial.clear();
                    continue;
                }
                let mut line = buffer.partial.split().freeze();
                if line.ends_with(b"\r") {
                    line.truncate(line.len() - 1);
                }
                if !line.is_empty() {
                    frames.push(line);
                }
                continue;
            }

            if buffer.overflowed {
                continue;
            }
            if buffer.partial.len() >= self.max_fragment {
                tracing::warn!(
                    sender_key,
                    cap = self.max_fragment,
                    "frame exceeds fragment cap, dropping line"
                );
                buffer.overflowed = true;
                buffer.partial.clear();
                continue;
            }
            buffer.partial.extend_from_slice(&[byte]);
        }

        frames
    }

    /// Discard a sender's buffered remainder (connection closed)
    pub fn close(&mut self, sender_key: &str) {
        self.buffers.remove(sender_key);
    }

    /// Number of senders with buffered state
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    /// Whether no sender has buffered state
    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    /// Bytes currently buffered for a sender
    pub fn buffered(&self, sender_key: &str) -> usize {
        self.buffers
            .get(sender_key)
            .map(|b| b.partial.len())
            .unwrap_or(0)
    }
}
