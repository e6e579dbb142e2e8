//! Receive-side frame processing: decompress, parse, deliver.
//!
//! Every non-padding frame must decompress into a well-formed packet
//! list that fits the batch capacity; anything else is a protocol
//! violation and tears the tunnel down. Packets are written to the
//! interface one at a time, in the order the peer admitted them.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{trace, warn};

use crate::codec::Lz4Codec;
use crate::config::TunnelConfig;
use crate::error::Result;
use crate::protocol::{Frame, PacketListIter};
use crate::stats::TunnelStats;

/// Processes inbound frames and writes the contained packets to the
/// interface. Owns the decompression buffer so no allocation happens
/// per frame.
pub struct Receiver {
    decompressed: Vec<u8>,
    stats: Arc<TunnelStats>,
}

impl Receiver {
    pub fn new(config: &TunnelConfig, stats: Arc<TunnelStats>) -> Self {
        Self {
            // A conforming peer never batches beyond its capacity, so a
            // larger decompression result is itself a violation.
            decompressed: vec![0u8; config.batch_capacity],
            stats,
        }
    }

    /// Handle one complete frame.
    ///
    /// Padding frames are counted and dropped. Data frames are
    /// decompressed and their packets written to `device` in order.
    ///
    /// # Errors
    ///
    /// `Decompress` if the payload is not valid LZ4 or inflates beyond
    /// the batch capacity, `Framing` if the packet list is malformed,
    /// `Io` if the interface write fails. All are fatal to the session.
    pub async fn process<W>(&mut self, frame: &Frame, device: &mut W) -> Result<()>
    where
        W: AsyncWrite + Unpin,
    {
        if frame.is_padding() {
            trace!("padding frame received");
            self.stats.record_frame_received(true);
            return Ok(());
        }

        let n = Lz4Codec::decompress_into(frame.compressed(), &mut self.decompressed)?;
        let mut packets = PacketListIter::parse(&self.decompressed[..n])?;
        trace!(
            compressed = frame.compressed_len(),
            raw = n,
            packets = packets.packet_count(),
            "data frame received"
        );
        if packets.packet_count() == 0 {
            // Parses fine and delivers nothing, but a peer is not
            // supposed to spend a data frame on an empty list.
            warn!("data frame with an empty packet list");
        }

        while let Some(packet) = packets.try_next()? {
            device.write_all(packet).await?;
            self.stats.record_delivered();
        }
        packets.finish()?;

        self.stats.record_frame_received(false);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TunnelError;
    use bytes::Bytes;
    use std::io::Cursor;
    use std::time::Duration;

    fn test_config() -> TunnelConfig {
        TunnelConfig {
            batch_capacity: 100,
            max_packet_size: 96,
            send_interval: Duration::from_millis(100),
            ..Default::default()
        }
    }

    fn receiver(config: &TunnelConfig) -> (Receiver, Arc<TunnelStats>) {
        let stats = Arc::new(TunnelStats::default());
        (Receiver::new(config, stats.clone()), stats)
    }

    fn compress_frame(raw: &[u8]) -> Frame {
        let mut buf = vec![0u8; Lz4Codec::worst_case_len(raw.len())];
        let n = Lz4Codec::compress_into(raw, &mut buf).unwrap();
        buf.truncate(n);
        Frame::new(Bytes::from(buf))
    }

    /// Serialize packets into a packet list.
    fn list(packets: &[&[u8]]) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(packets.len() as u16).to_be_bytes());
        for p in packets {
            buf.extend_from_slice(&(p.len() as u16).to_be_bytes());
            buf.extend_from_slice(p);
        }
        buf
    }

    #[tokio::test]
    async fn test_padding_frame_delivers_nothing() {
        let config = test_config();
        let (mut rx, stats) = receiver(&config);
        let mut device = Cursor::new(Vec::new());

        rx.process(&Frame::padding(), &mut device).await.unwrap();

        assert!(device.into_inner().is_empty());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.padding_frames_received, 1);
        assert_eq!(snapshot.packets_delivered, 0);
    }

    #[tokio::test]
    async fn test_packets_delivered_in_order() {
        let config = test_config();
        let (mut rx, stats) = receiver(&config);
        let mut device = Cursor::new(Vec::new());

        let frame = compress_frame(&list(&[b"alpha", b"beta", b"gamma"]));
        rx.process(&frame, &mut device).await.unwrap();

        assert_eq!(device.into_inner(), b"alphabetagamma");
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.packets_delivered, 3);
        assert_eq!(snapshot.data_frames_received, 1);
    }

    #[tokio::test]
    async fn test_empty_packet_list_delivers_nothing() {
        let config = test_config();
        let (mut rx, stats) = receiver(&config);
        let mut device = Cursor::new(Vec::new());

        let frame = compress_frame(&list(&[]));
        rx.process(&frame, &mut device).await.unwrap();

        assert!(device.into_inner().is_empty());
        let snapshot = stats.snapshot();
        assert_eq!(snapshot.data_frames_received, 1);
        assert_eq!(snapshot.packets_delivered, 0);
    }

    #[tokio::test]
    async fn test_truncated_packet_list_is_fatal() {
        let config = test_config();
        let (mut rx, _stats) = receiver(&config);
        let mut device = Cursor::new(Vec::new());

        // Claims two packets but carries one.
        let mut raw = list(&[b"only"]);
        raw[0..2].copy_from_slice(&2u16.to_be_bytes());
        let frame = compress_frame(&raw);

        let result = rx.process(&frame, &mut device).await;
        assert!(matches!(result, Err(TunnelError::Framing(_))));
    }

    #[tokio::test]
    async fn test_garbage_payload_is_fatal() {
        let config = test_config();
        let (mut rx, _stats) = receiver(&config);
        let mut device = Cursor::new(Vec::new());

        let frame = Frame::new(Bytes::from_static(&[0xFF; 24]));
        let result = rx.process(&frame, &mut device).await;
        assert!(matches!(result, Err(TunnelError::Decompress(_))));
    }

    #[tokio::test]
    async fn test_overinflating_payload_is_fatal() {
        let config = test_config();
        let (mut rx, _stats) = receiver(&config);
        let mut device = Cursor::new(Vec::new());

        // Valid LZ4, but inflates past the batch capacity.
        let frame = compress_frame(&vec![0u8; 400]);
        let result = rx.process(&frame, &mut device).await;
        assert!(matches!(result, Err(TunnelError::Decompress(_))));
    }
}
