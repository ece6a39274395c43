//! Frame extraction buffer for accumulating partial reads.
//!
//! Serial reads deliver arbitrary chunks: partial frames, several coalesced
//! frames, or garbage between frames after a resync. The buffer accumulates
//! whatever arrives and greedily extracts every complete `SOP .. EOP` frame:
//!
//! 1. Bytes before the first [`SOP`] are discarded (resynchronisation).
//! 2. A frame start without its end is retained for the next push.
//! 3. The bytes strictly between the delimiters are unstuffed; a frame that
//!    fails unstuffing is skipped and scanning resumes after its [`EOP`].
//!
//! The buffer is compacted after every pass, and a frame start that runs
//! past [`MAX_FRAME_SIZE`] without an end is dropped, so the buffer never
//! grows without bound.

use bytes::{Buf, Bytes, BytesMut};

use super::stuffing::{self, EOP, SOP};

/// Upper bound on a single in-flight frame.
///
/// The largest packet the module emits is a 28-byte notification, which
/// stuffs to at most 58 bytes on the wire. Anything far beyond that is a
/// desynchronised stream, not a frame.
pub const MAX_FRAME_SIZE: usize = 1024;

/// Buffer for incoming bytes with greedy frame extraction.
pub struct FrameBuffer {
    /// Accumulated bytes not yet forming a complete frame.
    buffer: BytesMut,
}

impl FrameBuffer {
    /// Create an empty frame buffer.
    pub fn new() -> Self {
        Self {
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Push raw bytes and extract all complete frames.
    ///
    /// Returns the decoded payloads in wire order. Malformed frames are
    /// logged and skipped; partial data is retained for the next push.
    pub fn push(&mut self, data: &[u8]) -> Vec<Bytes> {
        self.buffer.extend_from_slice(data);

        let mut payloads = Vec::new();
        loop {
            let Some(start) = self.buffer.iter().position(|&b| b == SOP) else {
                if !self.buffer.is_empty() {
                    tracing::trace!(
                        discarded = self.buffer.len(),
                        "dropping bytes outside any frame"
                    );
                    self.buffer.clear();
                }
                break;
            };
            if start > 0 {
                tracing::trace!(discarded = start, "resynchronising to next frame start");
                self.buffer.advance(start);
            }

            let Some(end) = self.buffer[1..].iter().position(|&b| b == EOP).map(|i| i + 1) else {
                if self.buffer.len() > MAX_FRAME_SIZE {
                    tracing::warn!(
                        len = self.buffer.len(),
                        "unterminated frame exceeds the size bound, dropping its start"
                    );
                    self.buffer.advance(1);
                    continue;
                }
                // Partial frame, keep accumulating.
                break;
            };

            match stuffing::decode(&self.buffer[1..end]) {
                Ok(payload) => payloads.push(Bytes::from(payload)),
                Err(err) => tracing::warn!(%err, "skipping malformed frame"),
            }
            self.buffer.advance(end + 1);
        }

        payloads
    }

    /// Number of buffered bytes awaiting a frame end.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.buffer.clear();
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}
