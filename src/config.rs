//! Tunnel configuration and startup validation.
//!
//! All sizing and timing knobs are fixed at construction and validated
//! before a session starts; nothing is renegotiated on the wire. The
//! frame size is derived from the batch capacity rather than configured
//! separately, so the two can never disagree.

use std::time::Duration;

use crate::codec::Lz4Codec;
use crate::error::{Result, TunnelError};
use crate::protocol::{
    frame_size, max_packet_len, payload_budget, FRAME_HEADER_SIZE, FRAME_HEADROOM,
    LIST_HEADER_SIZE, PACKET_HEADER_SIZE,
};

/// Default batch capacity in bytes.
pub const DEFAULT_BATCH_CAPACITY: usize = 2000;

/// Default maximum packet size (typical Ethernet MTU).
pub const DEFAULT_MAX_PACKET_SIZE: usize = 1500;

/// Default send interval: one frame every 500 ms.
pub const DEFAULT_SEND_INTERVAL: Duration = Duration::from_millis(500);

/// Default read deadline for assembling one frame.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(10);

/// Default write deadline for one frame.
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_secs(5);

/// Tunnel configuration.
///
/// # Example
///
/// ```
/// use shapetun::TunnelConfig;
///
/// let config = TunnelConfig::default();
/// assert!(config.validate().is_ok());
/// assert_eq!(config.frame_size(), 2064);
/// ```
#[derive(Debug, Clone)]
pub struct TunnelConfig {
    /// Maximum serialized size of one batch (frames are this plus the
    /// fixed headroom).
    pub batch_capacity: usize,
    /// Largest packet the interface may deliver; the device MTU is set
    /// to this value.
    pub max_packet_size: usize,
    /// Fixed interval between outgoing frames.
    pub send_interval: Duration,
    /// Deadline for assembling one incoming frame.
    pub read_timeout: Duration,
    /// Deadline for writing one outgoing frame.
    pub write_timeout: Duration,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            max_packet_size: DEFAULT_MAX_PACKET_SIZE,
            send_interval: DEFAULT_SEND_INTERVAL,
            read_timeout: DEFAULT_READ_TIMEOUT,
            write_timeout: DEFAULT_WRITE_TIMEOUT,
        }
    }
}

impl TunnelConfig {
    /// Fixed size of every wire frame for this configuration.
    #[inline]
    pub fn frame_size(&self) -> usize {
        frame_size(self.batch_capacity)
    }

    /// Largest compressed payload a frame can carry.
    #[inline]
    pub fn payload_budget(&self) -> usize {
        payload_budget(self.frame_size())
    }

    /// Validate the configuration before a session starts.
    ///
    /// Checks:
    /// - the batch capacity fits the u16 wire fields and holds at least
    ///   one packet
    /// - the maximum packet fits one batch structurally
    /// - a single maximum-size packet compresses within the frame
    ///   budget even in the codec's worst case
    /// - the deadlines are consistent with the send cadence
    pub fn validate(&self) -> Result<()> {
        let min_capacity = LIST_HEADER_SIZE + PACKET_HEADER_SIZE + 1;
        if self.batch_capacity < min_capacity {
            return Err(TunnelError::Config(format!(
                "Batch capacity {} cannot hold a single packet (minimum {})",
                self.batch_capacity, min_capacity
            )));
        }

        let max_representable = u16::MAX as usize + FRAME_HEADER_SIZE - FRAME_HEADROOM;
        if self.batch_capacity > max_representable {
            return Err(TunnelError::Config(format!(
                "Batch capacity {} overflows the 16-bit length field (maximum {})",
                self.batch_capacity, max_representable
            )));
        }

        if self.max_packet_size == 0 {
            return Err(TunnelError::Config(
                "Maximum packet size must be at least 1".to_string(),
            ));
        }

        let structural_max = max_packet_len(self.batch_capacity);
        if self.max_packet_size > structural_max {
            return Err(TunnelError::Config(format!(
                "Maximum packet size {} exceeds what a batch of {} bytes can hold ({})",
                self.max_packet_size, self.batch_capacity, structural_max
            )));
        }

        let single = LIST_HEADER_SIZE + PACKET_HEADER_SIZE + self.max_packet_size;
        if Lz4Codec::worst_case_len(single) > self.payload_budget() {
            return Err(TunnelError::Config(format!(
                "A single {}-byte packet could compress to {} bytes, exceeding the frame budget {}",
                self.max_packet_size,
                Lz4Codec::worst_case_len(single),
                self.payload_budget()
            )));
        }

        if self.send_interval.is_zero() {
            return Err(TunnelError::Config(
                "Send interval must be non-zero".to_string(),
            ));
        }

        if self.read_timeout <= self.send_interval {
            return Err(TunnelError::Config(format!(
                "Read timeout {:?} must exceed the send interval {:?}",
                self.read_timeout, self.send_interval
            )));
        }

        if self.write_timeout.is_zero() {
            return Err(TunnelError::Config(
                "Write timeout must be non-zero".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TunnelConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_frame_size_relation() {
        let config = TunnelConfig::default();
        assert_eq!(config.frame_size(), DEFAULT_BATCH_CAPACITY + FRAME_HEADROOM);
        assert_eq!(config.payload_budget(), config.frame_size() - 2);
    }

    #[test]
    fn test_tiny_capacity_rejected() {
        let config = TunnelConfig {
            batch_capacity: 4,
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("cannot hold a single packet"));
    }

    #[test]
    fn test_capacity_overflowing_length_field_rejected() {
        let config = TunnelConfig {
            batch_capacity: 70_000,
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("overflows the 16-bit length field"));
    }

    #[test]
    fn test_oversized_max_packet_rejected() {
        let config = TunnelConfig {
            batch_capacity: 100,
            max_packet_size: 97, // structural max is 96
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("exceeds what a batch"));
    }

    #[test]
    fn test_zero_max_packet_rejected() {
        let config = TunnelConfig {
            max_packet_size: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_interval_rejected() {
        let config = TunnelConfig {
            send_interval: Duration::ZERO,
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("Send interval must be non-zero"));
    }

    #[test]
    fn test_read_timeout_below_interval_rejected() {
        let config = TunnelConfig {
            send_interval: Duration::from_millis(500),
            read_timeout: Duration::from_millis(200),
            ..Default::default()
        };
        let result = config.validate();
        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("must exceed the send interval"));
    }

    #[test]
    fn test_zero_write_timeout_rejected() {
        let config = TunnelConfig {
            write_timeout: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_packet_at_structural_limit_is_valid() {
        let config = TunnelConfig {
            batch_capacity: 100,
            max_packet_size: 96,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }
}
