//! # shapetun
//!
//! A traffic-shaping IP tunnel over TCP.
//!
//! Packets captured from a TUN interface are batched, LZ4-compressed
//! and sent as fixed-size frames on a fixed schedule. When there is no
//! traffic, zero-filled padding frames keep the schedule, so an
//! observer of the transport sees the same frame size and timing
//! whatever the interface carries.
//!
//! ## Architecture
//!
//! - **Capture side**: interface reads are admitted into batches that
//!   are guaranteed to compress within one frame
//! - **Wire**: `[compressed length: u16 BE][LZ4 payload][zero padding]`,
//!   every frame exactly batch capacity + 64 bytes
//! - **Delivery side**: strict parsing; a malformed frame ends the
//!   session rather than being skipped
//!
//! ## Example
//!
//! ```ignore
//! use shapetun::transport::TunnelStream;
//! use shapetun::Tunnel;
//!
//! #[tokio::main]
//! async fn main() -> shapetun::Result<()> {
//!     let device = shapetun::device::open_device(&device_config)?;
//!     let transport = TunnelStream::connect("192.0.2.1:55555").await?;
//!
//!     let tunnel = Tunnel::builder().start(device, transport).await?;
//!     tunnel.wait().await
//! }
//! ```

pub mod batch;
pub mod codec;
pub mod config;
pub mod device;
pub mod error;
pub mod protocol;
pub mod stats;
pub mod transport;

mod receiver;
mod sender;
mod tunnel;

pub use config::TunnelConfig;
pub use error::{Result, TunnelError};
pub use stats::{StatsSnapshot, TunnelStats};
pub use tunnel::{ShutdownHandle, Tunnel, TunnelBuilder};
