//! Transport module - the TCP link carrying the frame stream.
//!
//! The wire protocol only assumes an ordered, reliable byte stream, so
//! the tunnel core stays generic over `AsyncRead + AsyncWrite`; this
//! module provides the concrete TCP endpoints the binary uses.

mod tcp;

pub use tcp::{TunnelListener, TunnelStream};
