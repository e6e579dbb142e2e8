//! Packet batching between the interface reader and the sender.
//!
//! Ownership model:
//! ```text
//! reader task                    sender task
//! ───────────                    ───────────
//! admit(packet) ──┐                  ┌── take_ready()
//!                 ▼                  ▼
//!            ┌─────────────────────────────┐
//!            │ BatchQueue (one mutex)      │
//!            │   open:   Batch  (tail)     │
//!            │   closed: VecDeque<Batch>   │
//!            └─────────────────────────────┘
//! ```
//! A batch is exclusively owned by whichever side currently holds it:
//! the queue while buffered, the sender once taken. The lock is held
//! only for bookkeeping and the packet copy; the admission compression
//! trial runs outside the lock, revalidated through a generation
//! counter.
//!
//! A `Batch` is its own serialization: the buffer is a valid packet
//! list at every instant, so the serialized size needs no separate
//! accounting and the sender can compress it as-is.

use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::codec::Lz4Codec;
use crate::config::TunnelConfig;
use crate::error::{Result, TunnelError};
use crate::protocol::{LIST_HEADER_SIZE, PACKET_HEADER_SIZE};

/// An ordered run of packets accumulated for one outgoing frame.
#[derive(Debug)]
pub struct Batch {
    buf: Vec<u8>,
    count: u16,
}

impl Batch {
    fn with_capacity(capacity: usize) -> Self {
        let mut buf = Vec::with_capacity(capacity);
        buf.extend_from_slice(&0u16.to_be_bytes());
        Self { buf, count: 0 }
    }

    /// Exact size of the serialized packet list so far.
    #[inline]
    pub fn serialized_len(&self) -> usize {
        self.buf.len()
    }

    /// Number of packets in the batch.
    #[inline]
    pub fn packet_count(&self) -> u16 {
        self.count
    }

    /// Whether the batch holds no packets.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// The batch as a ready-to-compress packet list.
    #[inline]
    pub fn as_packet_list(&self) -> &[u8] {
        &self.buf
    }

    fn push(&mut self, packet: &[u8]) {
        self.buf
            .extend_from_slice(&(packet.len() as u16).to_be_bytes());
        self.buf.extend_from_slice(packet);
        self.count += 1;
        self.buf[0..LIST_HEADER_SIZE].copy_from_slice(&self.count.to_be_bytes());
    }
}

#[derive(Debug)]
struct QueueInner {
    open: Batch,
    closed: VecDeque<Batch>,
    generation: u64,
    capacity: usize,
}

impl QueueInner {
    /// Close a non-empty open batch and install a fresh one. A no-op on
    /// an empty open batch: empty batches are never queued.
    fn rollover(&mut self) {
        if self.open.is_empty() {
            return;
        }
        self.generation += 1;
        let closed = mem::replace(&mut self.open, Batch::with_capacity(self.capacity));
        self.closed.push_back(closed);
    }
}

/// The shared queue: one open tail batch plus closed batches awaiting
/// transmission, behind a single mutex.
#[derive(Debug)]
pub struct BatchQueue {
    inner: Mutex<QueueInner>,
}

impl BatchQueue {
    pub fn new(batch_capacity: usize) -> Self {
        Self {
            inner: Mutex::new(QueueInner {
                open: Batch::with_capacity(batch_capacity),
                closed: VecDeque::new(),
                generation: 0,
                capacity: batch_capacity,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the batch the next frame should carry, oldest first.
    ///
    /// Prefers a closed batch; with none queued, a non-empty open batch
    /// is closed and taken so low-rate traffic is not stranded behind
    /// padding. Returns `None` only when there is nothing to send at
    /// all, which is exactly the padding case.
    pub fn take_ready(&self) -> Option<Batch> {
        let mut inner = self.lock();
        if let Some(batch) = inner.closed.pop_front() {
            return Some(batch);
        }
        if inner.open.is_empty() {
            return None;
        }
        inner.generation += 1;
        let capacity = inner.capacity;
        Some(mem::replace(
            &mut inner.open,
            Batch::with_capacity(capacity),
        ))
    }

    /// Close the open batch (if non-empty) without taking it.
    pub fn close_open(&self) {
        self.lock().rollover();
    }

    /// Number of closed batches waiting to be sent.
    pub fn closed_len(&self) -> usize {
        self.lock().closed.len()
    }
}

/// Admission policy for incoming packets.
///
/// Decides whether a packet joins the open batch or forces a rollover,
/// so that every batch ever closed is guaranteed to compress within the
/// frame payload budget.
pub struct BatchAccumulator {
    queue: Arc<BatchQueue>,
    batch_capacity: usize,
    payload_budget: usize,
    max_packet_size: usize,
    trial_input: Vec<u8>,
    trial_output: Vec<u8>,
}

impl BatchAccumulator {
    pub fn new(queue: Arc<BatchQueue>, config: &TunnelConfig) -> Self {
        Self {
            queue,
            batch_capacity: config.batch_capacity,
            payload_budget: config.payload_budget(),
            max_packet_size: config.max_packet_size,
            trial_input: Vec::with_capacity(config.batch_capacity),
            trial_output: vec![0u8; Lz4Codec::worst_case_len(config.batch_capacity)],
        }
    }

    /// Admit one packet into the queue.
    ///
    /// The packet lands in the open batch when both the raw capacity
    /// and the compressed budget allow it; otherwise the open batch is
    /// closed and the packet starts a new one. Startup validation
    /// guarantees a lone packet always fits a fresh batch.
    ///
    /// # Errors
    ///
    /// `PacketTooLarge` if the packet exceeds the configured maximum;
    /// the interface MTU is supposed to make this unreachable.
    pub fn admit(&mut self, packet: &[u8]) -> Result<()> {
        if packet.len() > self.max_packet_size {
            return Err(TunnelError::PacketTooLarge {
                len: packet.len(),
                max: self.max_packet_size,
            });
        }
        let additional = PACKET_HEADER_SIZE + packet.len();

        loop {
            let snapshot_generation = {
                let mut inner = self.queue.lock();
                let projected = inner.open.serialized_len() + additional;

                if projected > self.batch_capacity {
                    inner.rollover();
                    inner.open.push(packet);
                    return Ok(());
                }
                if Lz4Codec::worst_case_len(projected) <= self.payload_budget {
                    inner.open.push(packet);
                    return Ok(());
                }

                // Worst case inconclusive: snapshot for a trial outside
                // the lock.
                self.trial_input.clear();
                self.trial_input.extend_from_slice(inner.open.as_packet_list());
                inner.generation
            };

            let fits = self.trial_fits(packet)?;

            let mut inner = self.queue.lock();
            if inner.generation != snapshot_generation {
                // The open batch was closed under us; re-evaluate.
                continue;
            }
            if !fits {
                inner.rollover();
            }
            inner.open.push(packet);
            return Ok(());
        }
    }

    /// Compress the open-batch snapshot plus the candidate packet and
    /// compare against the payload budget.
    fn trial_fits(&mut self, packet: &[u8]) -> Result<bool> {
        let count = u16::from_be_bytes([self.trial_input[0], self.trial_input[1]]) + 1;
        self.trial_input[0..LIST_HEADER_SIZE].copy_from_slice(&count.to_be_bytes());
        self.trial_input
            .extend_from_slice(&(packet.len() as u16).to_be_bytes());
        self.trial_input.extend_from_slice(packet);

        let compressed = Lz4Codec::compress_into(&self.trial_input, &mut self.trial_output)?;
        Ok(compressed <= self.payload_budget)
    }
}
