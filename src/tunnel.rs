//! Tunnel builder and runtime loop.
//!
//! The [`TunnelBuilder`] provides a fluent API for configuring the
//! tunnel and starting it over an interface and a transport. The
//! [`Tunnel`] manages the lifecycle:
//! 1. Validate the configuration
//! 2. Split interface and transport into halves
//! 3. Spawn the sender task (fixed schedule, transport write half)
//! 4. Spawn the io task (interface reads, transport reads, deliveries)
//! 5. Tear both down on the first fatal error or on shutdown
//!
//! # Example
//!
//! ```ignore
//! use shapetun::transport::TunnelStream;
//! use shapetun::Tunnel;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let device = shapetun::device::open_device(&device_config)?;
//!     let transport = TunnelStream::connect("192.0.2.1:55555").await?;
//!
//!     let tunnel = Tunnel::builder()
//!         .send_interval(std::time::Duration::from_millis(500))
//!         .start(device, transport)
//!         .await?;
//!
//!     tunnel.wait().await?;
//!     Ok(())
//! }
//! ```

use std::io;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};
use tokio::sync::watch;
use tokio::task::{JoinError, JoinHandle};
use tokio::time;
use tracing::debug;

use crate::batch::{BatchAccumulator, BatchQueue};
use crate::config::TunnelConfig;
use crate::error::{Result, TunnelError};
use crate::protocol::FrameBuffer;
use crate::receiver::Receiver;
use crate::sender::spawn_sender_task;
use crate::stats::{StatsSnapshot, TunnelStats};

/// Read buffer for the transport, large enough for several frames.
const LINK_READ_BUFFER_SIZE: usize = 64 * 1024;

/// Builder for configuring and starting a tunnel.
pub struct TunnelBuilder {
    config: TunnelConfig,
}

impl TunnelBuilder {
    pub fn new() -> Self {
        Self {
            config: TunnelConfig::default(),
        }
    }

    /// Set the batch capacity in bytes. Determines the frame size.
    pub fn batch_capacity(mut self, capacity: usize) -> Self {
        self.config.batch_capacity = capacity;
        self
    }

    /// Set the largest packet accepted from the interface.
    pub fn max_packet_size(mut self, size: usize) -> Self {
        self.config.max_packet_size = size;
        self
    }

    /// Set the interval between outgoing frames.
    pub fn send_interval(mut self, interval: Duration) -> Self {
        self.config.send_interval = interval;
        self
    }

    /// Set the inbound frame deadline.
    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config.read_timeout = timeout;
        self
    }

    /// Set the outbound frame deadline.
    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config.write_timeout = timeout;
        self
    }

    /// Validate the configuration and start the tunnel.
    pub async fn start<D, T>(self, device: D, transport: T) -> Result<Tunnel>
    where
        D: AsyncRead + AsyncWrite + Send + 'static,
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        Tunnel::start(self.config, device, transport).await
    }
}

impl Default for TunnelBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A cloneable handle that requests tunnel shutdown.
#[derive(Clone)]
pub struct ShutdownHandle {
    shutdown: Arc<watch::Sender<()>>,
}

impl ShutdownHandle {
    /// Request shutdown. Both tasks stop at the next frame boundary.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }
}

/// A running tunnel session.
///
/// Use `shutdown()` (or a [`ShutdownHandle`]) to stop it, `wait()` to
/// join both tasks and collect the session outcome.
pub struct Tunnel {
    shutdown: Arc<watch::Sender<()>>,
    io_task: JoinHandle<Result<()>>,
    sender_task: JoinHandle<Result<()>>,
    stats: Arc<TunnelStats>,
}

enum First {
    Io,
    Sender,
}

impl Tunnel {
    /// Create a new tunnel builder.
    pub fn builder() -> TunnelBuilder {
        TunnelBuilder::new()
    }

    /// Start a tunnel session over `device` and `transport`.
    ///
    /// # Errors
    ///
    /// `Config` when the configuration is inconsistent; the session
    /// itself reports errors through [`Tunnel::wait`].
    pub async fn start<D, T>(config: TunnelConfig, device: D, transport: T) -> Result<Tunnel>
    where
        D: AsyncRead + AsyncWrite + Send + 'static,
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        // 1. Validate before anything is spawned
        config.validate()?;

        // 2. Split both endpoints
        let (device_reader, device_writer) = tokio::io::split(device);
        let (transport_reader, transport_writer) = tokio::io::split(transport);

        // 3. Shared state
        let queue = Arc::new(BatchQueue::new(config.batch_capacity));
        let stats = Arc::new(TunnelStats::default());
        let (shutdown_tx, shutdown_rx) = watch::channel(());

        // 4. Sender task owns the transport write half
        let sender_task = spawn_sender_task(
            transport_writer,
            queue.clone(),
            &config,
            stats.clone(),
            shutdown_rx.clone(),
        );

        // 5. Io task owns everything else
        let accumulator = BatchAccumulator::new(queue, &config);
        let receiver = Receiver::new(&config, stats.clone());
        let io_task = tokio::spawn(io_loop(
            device_reader,
            device_writer,
            transport_reader,
            accumulator,
            receiver,
            config,
            stats.clone(),
            shutdown_rx,
        ));

        Ok(Tunnel {
            shutdown: Arc::new(shutdown_tx),
            io_task,
            sender_task,
            stats,
        })
    }

    /// Request shutdown without waiting.
    pub fn shutdown(&self) {
        let _ = self.shutdown.send(());
    }

    /// A handle that can request shutdown after `wait()` consumed the
    /// tunnel.
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            shutdown: self.shutdown.clone(),
        }
    }

    /// Counters for the running session.
    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// A handle to the live counters, usable after `wait()`.
    pub fn stats_handle(&self) -> Arc<TunnelStats> {
        self.stats.clone()
    }

    /// Wait for the session to end and return its outcome.
    ///
    /// Resolves when either task finishes, then shuts the other down
    /// and joins it. The first error wins; a shutdown-initiated end is
    /// `Ok(())`.
    pub async fn wait(mut self) -> Result<()> {
        let (first, first_result) = tokio::select! {
            r = &mut self.io_task => (First::Io, join_result(r)),
            r = &mut self.sender_task => (First::Sender, join_result(r)),
        };

        let _ = self.shutdown.send(());

        let second_result = match first {
            First::Io => join_result((&mut self.sender_task).await),
            First::Sender => join_result((&mut self.io_task).await),
        };

        first_result.and(second_result)
    }
}

impl Drop for Tunnel {
    fn drop(&mut self) {
        let _ = self.shutdown.send(());
    }
}

fn join_result(result: std::result::Result<Result<()>, JoinError>) -> Result<()> {
    match result {
        Ok(task_result) => task_result,
        Err(e) => Err(TunnelError::Io(io::Error::new(io::ErrorKind::Other, e))),
    }
}

/// Main io loop: interface reads feed the batch queue, transport reads
/// feed the frame assembler, completed frames are delivered back to the
/// interface.
///
/// The inbound deadline is absolute and moves only when a complete
/// frame arrives, so a peer trickling bytes without ever finishing a
/// frame still times out.
#[allow(clippy::too_many_arguments)]
async fn io_loop<DR, DW, TR>(
    mut device_reader: DR,
    mut device_writer: DW,
    mut transport_reader: TR,
    mut accumulator: BatchAccumulator,
    mut receiver: Receiver,
    config: TunnelConfig,
    stats: Arc<TunnelStats>,
    mut shutdown: watch::Receiver<()>,
) -> Result<()>
where
    DR: AsyncRead + Unpin,
    DW: AsyncWrite + Unpin,
    TR: AsyncRead + Unpin,
{
    let mut assembler = FrameBuffer::new(config.frame_size());
    // One byte beyond the maximum so an oversized interface read is
    // detected instead of silently truncated.
    let mut packet_buf = vec![0u8; config.max_packet_size + 1];
    let mut link_buf = vec![0u8; LINK_READ_BUFFER_SIZE];
    let mut read_deadline = time::Instant::now() + config.read_timeout;

    debug!("io loop started");

    loop {
        tokio::select! {
            read = device_reader.read(&mut packet_buf) => {
                let n = read?;
                if n == 0 {
                    return Err(TunnelError::Io(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "interface closed",
                    )));
                }
                stats.record_captured();
                accumulator.admit(&packet_buf[..n])?;
            }

            read = time::timeout_at(read_deadline, transport_reader.read(&mut link_buf)) => {
                match read {
                    Err(_) => return Err(TunnelError::ReadTimeout),
                    Ok(Err(e)) => return Err(e.into()),
                    Ok(Ok(0)) => {
                        return if assembler.at_frame_boundary() {
                            debug!("peer closed at a frame boundary");
                            Ok(())
                        } else {
                            Err(TunnelError::ConnectionClosed)
                        };
                    }
                    Ok(Ok(n)) => {
                        let frames = assembler.push(&link_buf[..n])?;
                        if !frames.is_empty() {
                            read_deadline = time::Instant::now() + config.read_timeout;
                        }
                        for frame in &frames {
                            receiver.process(frame, &mut device_writer).await?;
                        }
                    }
                }
            }

            _ = shutdown.changed() => {
                debug!("io loop stopped");
                return Ok(());
            }
        }
    }
}
