//! Assembled frame with typed accessors.
//!
//! Represents one complete fixed-size wire frame reduced to the part
//! that matters after assembly: its compressed payload. Uses
//! `bytes::Bytes` for zero-copy slicing out of the receive buffer.
//!
//! # Example
//!
//! ```
//! use shapetun::protocol::Frame;
//! use bytes::Bytes;
//!
//! let frame = Frame::new(Bytes::from_static(b"compressed"));
//! assert!(!frame.is_padding());
//! assert_eq!(frame.compressed_len(), 10);
//! ```

use bytes::Bytes;

use super::wire_format::{encode_frame_into, FRAME_HEADER_SIZE};

/// One assembled wire frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Compressed packet-list payload; empty for a padding frame.
    pub compressed: Bytes,
}

impl Frame {
    /// Create a frame from its compressed payload.
    pub fn new(compressed: Bytes) -> Self {
        Self { compressed }
    }

    /// Create a padding frame (no payload).
    pub fn padding() -> Self {
        Self {
            compressed: Bytes::new(),
        }
    }

    /// Whether this frame carries no packets at all.
    ///
    /// Distinct from a frame whose packet list contains a zero-length
    /// packet; padding is the absence of a packet list.
    #[inline]
    pub fn is_padding(&self) -> bool {
        self.compressed.is_empty()
    }

    /// Get a reference to the compressed payload.
    #[inline]
    pub fn compressed(&self) -> &[u8] {
        &self.compressed
    }

    /// Get the compressed payload length.
    #[inline]
    pub fn compressed_len(&self) -> usize {
        self.compressed.len()
    }
}

/// Build a complete raw frame as a single byte vector.
///
/// Allocating convenience for tests and one-off frames; the sender
/// reuses a single buffer with `encode_frame_into` instead.
///
/// # Example
///
/// ```
/// use shapetun::protocol::build_raw_frame;
///
/// let frame = build_raw_frame(b"hello", 64);
/// assert_eq!(frame.len(), 64);
/// assert_eq!(frame[1], 5); // compressed length, low byte
/// ```
pub fn build_raw_frame(compressed: &[u8], frame_size: usize) -> Vec<u8> {
    debug_assert!(frame_size >= FRAME_HEADER_SIZE + compressed.len());
    let mut buf = vec![0u8; frame_size];
    encode_frame_into(&mut buf, compressed);
    buf
}
