//! Frame and packet-list layout on the wire.
//!
//! Every wire frame has the same fixed size, derived from the batch
//! capacity:
//! ```text
//! ┌────────────────┬──────────────────────┬──────────────────────┐
//! │ Compressed len │ Compressed payload   │ Zero padding         │
//! │ 2 bytes        │ L bytes              │ frame_size - 2 - L   │
//! │ uint16 BE      │ LZ4 block            │                      │
//! └────────────────┴──────────────────────┴──────────────────────┘
//! ```
//! A compressed length of 0 marks a pure padding frame carrying no
//! packets.
//!
//! The decompressed payload is a packet list:
//! ```text
//! ┌──────────┬──────────┬───────────┬─────┬──────────┬───────────┐
//! │ Count N  │ Len 1    │ Data 1    │ ... │ Len N    │ Data N    │
//! │ uint16 BE│ uint16 BE│ bytes     │     │ uint16 BE│ bytes     │
//! └──────────┴──────────┴───────────┴─────┴──────────┴───────────┘
//! ```
//!
//! All multi-byte integers are Big Endian. Every embedded length is
//! validated against the remaining span before any bytes are copied.

use crate::error::{Result, TunnelError};

/// Frame header size in bytes: the uint16 compressed-length field.
pub const FRAME_HEADER_SIZE: usize = 2;

/// Packet list header size in bytes: the uint16 packet count.
pub const LIST_HEADER_SIZE: usize = 2;

/// Per-packet header size in bytes: the uint16 packet length.
pub const PACKET_HEADER_SIZE: usize = 2;

/// Headroom added on top of the batch capacity for the frame header and
/// worst-case compression expansion of incompressible data.
pub const FRAME_HEADROOM: usize = 64;

/// Fixed frame size for a given batch capacity.
#[inline]
pub fn frame_size(batch_capacity: usize) -> usize {
    batch_capacity + FRAME_HEADROOM
}

/// Largest compressed payload a frame can carry.
#[inline]
pub fn payload_budget(frame_size: usize) -> usize {
    frame_size - FRAME_HEADER_SIZE
}

/// Largest single packet a batch of the given capacity can hold: the
/// capacity minus the list header and one packet header.
#[inline]
pub fn max_packet_len(batch_capacity: usize) -> usize {
    batch_capacity - LIST_HEADER_SIZE - PACKET_HEADER_SIZE
}

/// Encode one frame into `frame`: length field, compressed payload, zero
/// padding to the end. `frame` must already have the fixed frame size.
///
/// # Panics
///
/// Debug builds assert that the payload and header fit within `frame`.
pub fn encode_frame_into(frame: &mut [u8], compressed: &[u8]) {
    debug_assert!(frame.len() >= FRAME_HEADER_SIZE + compressed.len());
    let len = compressed.len();
    frame[0..FRAME_HEADER_SIZE].copy_from_slice(&(len as u16).to_be_bytes());
    frame[FRAME_HEADER_SIZE..FRAME_HEADER_SIZE + len].copy_from_slice(compressed);
    frame[FRAME_HEADER_SIZE + len..].fill(0);
}

/// Decode the compressed-length field from the start of a frame.
///
/// Returns `None` if fewer than `FRAME_HEADER_SIZE` bytes are available.
#[inline]
pub fn decode_frame_header(buf: &[u8]) -> Option<u16> {
    if buf.len() < FRAME_HEADER_SIZE {
        return None;
    }
    Some(u16::from_be_bytes([buf[0], buf[1]]))
}

/// Validating cursor over a decompressed packet list.
///
/// Yields each packet as a subslice of the payload. Every length field is
/// checked against the remaining span before the packet is exposed, and
/// [`finish`](Self::finish) rejects bytes left over after the final
/// packet.
///
/// # Example
///
/// ```
/// use shapetun::protocol::PacketListIter;
///
/// // Count 1, one 3-byte packet.
/// let payload = [0, 1, 0, 3, 0xAA, 0xBB, 0xCC];
/// let mut iter = PacketListIter::parse(&payload).unwrap();
/// assert_eq!(iter.packet_count(), 1);
/// assert_eq!(iter.try_next().unwrap(), Some(&[0xAA, 0xBB, 0xCC][..]));
/// assert_eq!(iter.try_next().unwrap(), None);
/// iter.finish().unwrap();
/// ```
#[derive(Debug)]
pub struct PacketListIter<'a> {
    buf: &'a [u8],
    cursor: usize,
    remaining: u16,
    count: u16,
}

impl<'a> PacketListIter<'a> {
    /// Parse the count field and position the cursor on the first packet.
    pub fn parse(buf: &'a [u8]) -> Result<Self> {
        if buf.len() < LIST_HEADER_SIZE {
            return Err(TunnelError::Framing(
                "Packet list shorter than its count field".to_string(),
            ));
        }
        let count = u16::from_be_bytes([buf[0], buf[1]]);
        Ok(Self {
            buf,
            cursor: LIST_HEADER_SIZE,
            remaining: count,
            count,
        })
    }

    /// Total number of packets the list claims to hold.
    #[inline]
    pub fn packet_count(&self) -> u16 {
        self.count
    }

    /// Advance to the next packet, or `Ok(None)` once the count is
    /// exhausted.
    pub fn try_next(&mut self) -> Result<Option<&'a [u8]>> {
        if self.remaining == 0 {
            return Ok(None);
        }
        if self.cursor + PACKET_HEADER_SIZE > self.buf.len() {
            return Err(TunnelError::Framing(
                "Packet header extends past decompressed payload".to_string(),
            ));
        }
        let len =
            u16::from_be_bytes([self.buf[self.cursor], self.buf[self.cursor + 1]]) as usize;
        let start = self.cursor + PACKET_HEADER_SIZE;
        if start + len > self.buf.len() {
            return Err(TunnelError::Framing(format!(
                "Packet length {} exceeds remaining {} bytes",
                len,
                self.buf.len() - start
            )));
        }
        self.cursor = start + len;
        self.remaining -= 1;
        Ok(Some(&self.buf[start..start + len]))
    }

    /// Verify that the entire payload was consumed.
    ///
    /// Call after `try_next` has returned `None`; bytes left past the
    /// final packet mean the length fields and the payload disagree.
    pub fn finish(&self) -> Result<()> {
        if self.remaining == 0 && self.cursor != self.buf.len() {
            return Err(TunnelError::Framing(format!(
                "{} trailing bytes after final packet",
                self.buf.len() - self.cursor
            )));
        }
        Ok(())
    }
}

/// Decode a full packet list into owned packets.
pub fn decode_packet_list(buf: &[u8]) -> Result<Vec<Vec<u8>>> {
    let mut iter = PacketListIter::parse(buf)?;
    let mut packets = Vec::with_capacity(iter.packet_count() as usize);
    while let Some(packet) = iter.try_next()? {
        packets.push(packet.to_vec());
    }
    iter.finish()?;
    Ok(packets)
}
