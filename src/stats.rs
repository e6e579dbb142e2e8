//! Session statistics.
//!
//! Lightweight atomic counters shared by both tunnel tasks; a snapshot
//! is logged when the session ends. Relaxed ordering is enough, the
//! counters never gate control flow.

use std::sync::atomic::{AtomicU64, Ordering};

/// Counters for one tunnel session.
#[derive(Debug, Default)]
pub struct TunnelStats {
    /// Packets read from the interface and admitted to a batch.
    pub packets_captured: AtomicU64,
    /// Packets recovered from frames and written to the interface.
    pub packets_delivered: AtomicU64,
    /// Frames sent that carried at least one packet.
    pub data_frames_sent: AtomicU64,
    /// Pure padding frames sent.
    pub padding_frames_sent: AtomicU64,
    /// Frames received that carried at least one packet.
    pub data_frames_received: AtomicU64,
    /// Pure padding frames received.
    pub padding_frames_received: AtomicU64,
}

/// Plain-value copy of the counters at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub packets_captured: u64,
    pub packets_delivered: u64,
    pub data_frames_sent: u64,
    pub padding_frames_sent: u64,
    pub data_frames_received: u64,
    pub padding_frames_received: u64,
}

impl TunnelStats {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn record_captured(&self) {
        self.packets_captured.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_delivered(&self) {
        self.packets_delivered.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_frame_sent(&self, padding: bool) {
        if padding {
            self.padding_frames_sent.fetch_add(1, Ordering::Relaxed);
        } else {
            self.data_frames_sent.fetch_add(1, Ordering::Relaxed);
        }
    }

    #[inline]
    pub fn record_frame_received(&self, padding: bool) {
        if padding {
            self.padding_frames_received.fetch_add(1, Ordering::Relaxed);
        } else {
            self.data_frames_received.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Copy all counters at one instant.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            packets_captured: self.packets_captured.load(Ordering::Relaxed),
            packets_delivered: self.packets_delivered.load(Ordering::Relaxed),
            data_frames_sent: self.data_frames_sent.load(Ordering::Relaxed),
            padding_frames_sent: self.padding_frames_sent.load(Ordering::Relaxed),
            data_frames_received: self.data_frames_received.load(Ordering::Relaxed),
            padding_frames_received: self.padding_frames_received.load(Ordering::Relaxed),
        }
    }
}

impl StatsSnapshot {
    /// Total frames sent, data and padding combined.
    pub fn frames_sent(&self) -> u64 {
        self.data_frames_sent + self.padding_frames_sent
    }

    /// Total frames received, data and padding combined.
    pub fn frames_received(&self) -> u64 {
        self.data_frames_received + self.padding_frames_received
    }
}
