//! Dedicated sender task enforcing the fixed transmission schedule.
//!
//! # Architecture
//!
//! ```text
//! tick ──► take_ready() ──► Some(batch) ──► compress ──► frame ──► transport
//!                      └──► None ─────────► zero padding ──► frame ──► transport
//! ```
//!
//! One frame leaves per tick, always `frame_size` bytes, whether or not
//! any packets are pending. The cadence and the frame size are the only
//! things an observer of the transport can measure.
//!
//! Missed ticks are skipped rather than burst: after a stall the
//! schedule resumes at the next slot instead of flushing a backlog of
//! frames at once.

use std::sync::Arc;

use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, trace};

use crate::batch::BatchQueue;
use crate::codec::Lz4Codec;
use crate::config::TunnelConfig;
use crate::error::{Result, TunnelError};
use crate::protocol::encode_frame_into;
use crate::stats::TunnelStats;

/// Spawn the sender task.
///
/// # Arguments
///
/// * `writer` - The transport write half
/// * `queue` - Shared batch queue filled by the interface reader
/// * `config` - Tunnel configuration (validated)
/// * `stats` - Shared counters
/// * `shutdown` - Watch channel observed for shutdown
///
/// # Returns
///
/// A `JoinHandle` resolving to `Ok(())` on shutdown or the first fatal
/// error (write failure, write deadline, compression overflow).
pub fn spawn_sender_task<W>(
    writer: W,
    queue: Arc<BatchQueue>,
    config: &TunnelConfig,
    stats: Arc<TunnelStats>,
    shutdown: watch::Receiver<()>,
) -> JoinHandle<Result<()>>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    tokio::spawn(sender_loop(writer, queue, config.clone(), stats, shutdown))
}

/// Main sender loop: one frame per tick until shutdown or error.
async fn sender_loop<W>(
    mut writer: W,
    queue: Arc<BatchQueue>,
    config: TunnelConfig,
    stats: Arc<TunnelStats>,
    mut shutdown: watch::Receiver<()>,
) -> Result<()>
where
    W: AsyncWrite + Unpin,
{
    let frame_size = config.frame_size();
    let payload_budget = config.payload_budget();

    let mut interval = time::interval(config.send_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    // Reused across ticks; a padding frame is the whole buffer zeroed.
    let mut frame = vec![0u8; frame_size];
    let mut scratch = vec![0u8; Lz4Codec::worst_case_len(config.batch_capacity)];

    debug!(frame_size, interval = ?config.send_interval, "sender started");

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                debug!("sender stopped");
                return Ok(());
            }
        }

        match queue.take_ready() {
            Some(batch) => {
                let compressed = Lz4Codec::compress_into(batch.as_packet_list(), &mut scratch)?;
                if compressed > payload_budget {
                    // Admission guarantees this never happens; treat a
                    // violation as fatal rather than send a bad frame.
                    return Err(TunnelError::CodecOverflow {
                        compressed,
                        budget: payload_budget,
                    });
                }
                encode_frame_into(&mut frame, &scratch[..compressed]);
                trace!(
                    packets = batch.packet_count(),
                    raw = batch.serialized_len(),
                    compressed,
                    "sending data frame"
                );
                stats.record_frame_sent(false);
            }
            None => {
                frame.fill(0);
                trace!("sending padding frame");
                stats.record_frame_sent(true);
            }
        }

        let write = async {
            writer.write_all(&frame).await?;
            writer.flush().await
        };
        match time::timeout(config.write_timeout, write).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => return Err(TunnelError::WriteTimeout),
        }
    }
}
