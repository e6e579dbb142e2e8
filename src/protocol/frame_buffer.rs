//! Incremental assembly of fixed-size frames.
//!
//! Transport reads arrive as arbitrary chunks; this module buffers
//! them and cuts them into whole frames, splitting off `BytesMut`
//! regions rather than copying. Assembly is a two-state machine:
//! - `WaitingForHeader`: the 2-byte compressed-length field is still
//!   incomplete
//! - `WaitingForBody`: the length is known and checked, the remaining
//!   `frame_size - 2` bytes (payload plus padding) are still arriving
//!
//! The length field is checked the moment both header bytes exist, so
//! a corrupt stream is rejected without buffering a full frame of
//! garbage first.
//!
//! # Example
//!
//! ```ignore
//! let mut assembler = FrameBuffer::new(frame_size);
//! for frame in assembler.push(&chunk)? {
//!     receiver.process(&frame, &mut device).await?;
//! }
//! ```

use bytes::BytesMut;

use super::wire_format::{decode_frame_header, FRAME_HEADER_SIZE};
use super::Frame;
use crate::error::{Result, TunnelError};

/// Assembly position within the current frame.
#[derive(Debug, Clone)]
enum State {
    /// The 2-byte length field is still incomplete.
    WaitingForHeader,
    /// Length known and validated; the fixed-size remainder is pending.
    WaitingForBody { compressed_len: usize },
}

/// Cuts an incoming byte stream into fixed-size frames.
///
/// Frames never vary in size; the length field only separates
/// compressed payload from padding within the body. The field is
/// validated before any body byte is consumed, so a corrupt stream
/// fails fast instead of desynchronizing.
pub struct FrameBuffer {
    /// Bytes received but not yet cut into frames.
    buffer: BytesMut,
    /// Assembly position.
    state: State,
    /// Size of every frame on this wire.
    frame_size: usize,
}

impl FrameBuffer {
    /// Create an assembler for the given fixed frame size.
    pub fn new(frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(frame_size * 4),
            state: State::WaitingForHeader,
            frame_size,
        }
    }

    /// Feed a chunk of transport bytes and collect every frame that
    /// completed.
    ///
    /// Chunks need not align with frames in any way; leftover bytes
    /// stay buffered for the next call.
    ///
    /// # Errors
    ///
    /// `Framing` when a length field claims more payload than a frame
    /// body holds; the stream cannot be trusted afterwards.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<Frame>> {
        self.buffer.extend_from_slice(data);

        let mut frames = Vec::new();
        while let Some(frame) = self.extract_frame()? {
            frames.push(frame);
        }

        Ok(frames)
    }

    /// Cut one frame off the front of the buffer, if it is all there.
    fn extract_frame(&mut self) -> Result<Option<Frame>> {
        match self.state {
            State::WaitingForHeader => {
                let Some(compressed_len) = decode_frame_header(&self.buffer) else {
                    return Ok(None);
                };
                let compressed_len = compressed_len as usize;

                if compressed_len > self.frame_size - FRAME_HEADER_SIZE {
                    return Err(TunnelError::Framing(format!(
                        "Compressed length {} exceeds frame budget {}",
                        compressed_len,
                        self.frame_size - FRAME_HEADER_SIZE
                    )));
                }

                let _ = self.buffer.split_to(FRAME_HEADER_SIZE);
                self.state = State::WaitingForBody { compressed_len };

                // The body may already be complete.
                self.extract_frame()
            }

            State::WaitingForBody { compressed_len } => {
                let body_len = self.frame_size - FRAME_HEADER_SIZE;
                if self.buffer.len() < body_len {
                    return Ok(None);
                }

                // Payload up front; the padding tail goes with the slice.
                let body = self.buffer.split_to(body_len).freeze();
                self.state = State::WaitingForHeader;

                Ok(Some(Frame::new(body.slice(..compressed_len))))
            }
        }
    }

    /// Bytes buffered towards the frame currently being assembled.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Whether nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Whether the stream position is exactly between two frames.
    ///
    /// A clean shutdown ends here; end-of-stream anywhere else means
    /// the peer died mid-frame.
    pub fn at_frame_boundary(&self) -> bool {
        self.buffer.is_empty() && matches!(self.state, State::WaitingForHeader)
    }

    /// Drop all buffered bytes and start over at a header.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.state = State::WaitingForHeader;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::build_raw_frame;

    const FRAME_SIZE: usize = 32;

    #[test]
    fn test_whole_frame_in_one_push() {
        let mut buffer = FrameBuffer::new(FRAME_SIZE);
        let bytes = build_raw_frame(b"hello", FRAME_SIZE);

        let frames = buffer.push(&bytes).unwrap();

        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].compressed(), b"hello");
        assert!(!frames[0].is_padding());
        assert!(buffer.at_frame_boundary());
    }

    #[test]
    fn test_padding_frame_assembles_like_any_other() {
        let mut buffer = FrameBuffer::new(FRAME_SIZE);

        let frames = buffer.push(&vec![0u8; FRAME_SIZE]).unwrap();

        assert_eq!(frames.len(), 1);
        assert!(frames[0].is_padding());
        assert!(buffer.at_frame_boundary());
    }

    #[test]
    fn test_back_to_back_frames_in_one_chunk() {
        let mut buffer = FrameBuffer::new(FRAME_SIZE);
        let chunk = [
            build_raw_frame(b"first", FRAME_SIZE),
            build_raw_frame(b"", FRAME_SIZE),
            build_raw_frame(b"third", FRAME_SIZE),
        ]
        .concat();

        let frames = buffer.push(&chunk).unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[0].compressed(), b"first");
        assert!(frames[1].is_padding());
        assert_eq!(frames[2].compressed(), b"third");
        assert!(buffer.at_frame_boundary());
    }

    #[test]
    fn test_split_length_field() {
        let mut buffer = FrameBuffer::new(FRAME_SIZE);
        let bytes = build_raw_frame(b"test", FRAME_SIZE);

        // One byte is not enough to decode the length field.
        let frames = buffer.push(&bytes[..1]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.len(), 1);

        let frames = buffer.push(&bytes[1..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].compressed(), b"test");
    }

    #[test]
    fn test_fragmented_body() {
        let mut buffer = FrameBuffer::new(FRAME_SIZE);
        let bytes = build_raw_frame(b"fragmented body", FRAME_SIZE);

        let frames = buffer.push(&bytes[..10]).unwrap();
        assert!(frames.is_empty());
        assert_eq!(buffer.len(), 10 - FRAME_HEADER_SIZE);
        assert!(!buffer.at_frame_boundary());

        let frames = buffer.push(&bytes[10..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].compressed(), b"fragmented body");
    }

    #[test]
    fn test_one_byte_chunks() {
        let mut buffer = FrameBuffer::new(FRAME_SIZE);
        let bytes = build_raw_frame(b"hi", FRAME_SIZE);

        let mut assembled = Vec::new();
        for chunk in bytes.chunks(1) {
            assembled.extend(buffer.push(chunk).unwrap());
        }

        assert_eq!(assembled.len(), 1);
        assert_eq!(assembled[0].compressed(), b"hi");
    }

    #[test]
    fn test_oversize_length_rejected_before_body() {
        let mut buffer = FrameBuffer::new(FRAME_SIZE);

        // Claim more compressed bytes than any frame can carry; the
        // two header bytes alone must trigger the error.
        let claimed = (FRAME_SIZE - FRAME_HEADER_SIZE + 1) as u16;
        let result = buffer.push(&claimed.to_be_bytes());

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("exceeds frame budget"));
    }

    #[test]
    fn test_nonzero_padding_bytes_are_ignored() {
        let mut buffer = FrameBuffer::new(FRAME_SIZE);
        let mut bytes = build_raw_frame(b"data", FRAME_SIZE);
        // Scribble over the padding region
        for b in &mut bytes[FRAME_HEADER_SIZE + 4..] {
            *b = 0xEE;
        }

        let frames = buffer.push(&bytes).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].compressed(), b"data");
    }

    #[test]
    fn test_frame_then_partial_remainder() {
        let mut buffer = FrameBuffer::new(FRAME_SIZE);
        let next = build_raw_frame(b"pending", FRAME_SIZE);

        let mut chunk = build_raw_frame(b"complete", FRAME_SIZE);
        chunk.extend_from_slice(&next[..7]);

        let frames = buffer.push(&chunk).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].compressed(), b"complete");
        assert!(!buffer.at_frame_boundary());

        let frames = buffer.push(&next[7..]).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].compressed(), b"pending");
        assert!(buffer.at_frame_boundary());
    }

    #[test]
    fn test_clear_discards_partial_frame() {
        let mut buffer = FrameBuffer::new(FRAME_SIZE);

        let gone = build_raw_frame(b"gone", FRAME_SIZE);
        buffer.push(&gone[..9]).unwrap();
        assert!(!buffer.at_frame_boundary());

        buffer.clear();
        assert!(buffer.is_empty());
        assert!(buffer.at_frame_boundary());

        let frames = buffer.push(&build_raw_frame(b"fresh", FRAME_SIZE)).unwrap();
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].compressed(), b"fresh");
    }

    #[test]
    fn test_header_consumed_means_mid_frame() {
        let mut buffer = FrameBuffer::new(FRAME_SIZE);
        let bytes = build_raw_frame(b"x", FRAME_SIZE);

        // Exactly the header: buffered bytes are gone but a frame is open
        buffer.push(&bytes[..FRAME_HEADER_SIZE]).unwrap();
        assert!(buffer.is_empty());
        assert!(!buffer.at_frame_boundary());
    }
}
