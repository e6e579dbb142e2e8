//! Error types for shapetun.

use thiserror::Error;

/// Main error type for all tunnel operations.
#[derive(Debug, Error)]
pub enum TunnelError {
    /// I/O error during device/socket operations.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// TUN device configuration or setup error.
    #[error("TUN device error: {0}")]
    Device(#[from] tun::Error),

    /// Invalid tunnel configuration, rejected before the session starts.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// The interface produced a packet that can never fit a frame.
    #[error("Packet too large: {len} bytes exceeds limit of {max}")]
    PacketTooLarge { len: usize, max: usize },

    /// Framing error (inconsistent length fields, trailing bytes, etc.).
    #[error("Framing error: {0}")]
    Framing(String),

    /// An admitted batch failed to compress within the frame budget.
    #[error("Codec overflow: {compressed} compressed bytes exceeds frame budget of {budget}")]
    CodecOverflow { compressed: usize, budget: usize },

    /// Compression backend error.
    #[error("Compression error: {0}")]
    Compress(#[from] lz4_flex::block::CompressError),

    /// Decompression backend error (corrupt or truncated payload).
    #[error("Decompression error: {0}")]
    Decompress(#[from] lz4_flex::block::DecompressError),

    /// No complete frame arrived within the read deadline.
    #[error("Frame read timed out")]
    ReadTimeout,

    /// A frame write did not complete within the write deadline.
    #[error("Frame write timed out")]
    WriteTimeout,

    /// Connection closed in the middle of a frame.
    #[error("Connection closed")]
    ConnectionClosed,
}

/// Result type alias using TunnelError.
pub type Result<T> = std::result::Result<T, TunnelError>;
