//! Lock-free SPSC byte ring between the stream reader and the parser

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ringbuf::{
    traits::{Consumer, Observer, Producer, Split},
    HeapCons, HeapProd, HeapRb,
};
use tracing::debug;

use crate::error::{IrisError, Result};
use crate::stats::Stats;

/// Passive circular byte buffer between the capture side and the parser.
///
/// Single producer (the reader task), single consumer (the engine); the
/// two halves never lock. Capacity must be a power of two and must cover
/// the worst-case byte burst between two parser passes.
pub struct ByteRing;

impl ByteRing {
    /// Allocate the ring and split it into its two halves.
    pub fn with_capacity(
        capacity: usize,
        stats: Arc<Stats>,
    ) -> Result<(RingProducer, RingConsumer)> {
        if !capacity.is_power_of_two() {
            return Err(IrisError::RingCapacity(capacity));
        }
        let (prod, cons) = HeapRb::<u8>::new(capacity).split();
        let paused = Arc::new(AtomicBool::new(false));
        Ok((
            RingProducer {
                prod,
                stats,
                paused: paused.clone(),
            },
            RingConsumer {
                cons,
                capacity,
                paused,
            },
        ))
    }
}

/// Producer half, owned by the byte-stream reader.
pub struct RingProducer {
    prod: HeapProd<u8>,
    stats: Arc<Stats>,
    paused: Arc<AtomicBool>,
}

impl RingProducer {
    /// Push as much of `bytes` as fits. Bytes that do not fit are
    /// dropped and counted as overflow; while the consumer holds the
    /// pause gate (profile switch) input is discarded uncounted.
    pub fn push(&mut self, bytes: &[u8]) -> usize {
        if self.paused.load(Ordering::Acquire) {
            return 0;
        }
        let pushed = self.prod.push_slice(bytes);
        let lost = bytes.len() - pushed;
        if lost > 0 {
            self.stats.add_overflow(lost);
            metrics::counter!("iris_ring_overflow_bytes").increment(lost as u64);
            debug!(lost, "ring full, dropping input bytes");
        }
        pushed
    }
}

/// Consumer half, owned by the engine.
pub struct RingConsumer {
    cons: HeapCons<u8>,
    capacity: usize,
    paused: Arc<AtomicBool>,
}

impl RingConsumer {
    /// Pop up to `buf.len()` bytes; returns how many were read.
    pub fn pop(&mut self, buf: &mut [u8]) -> usize {
        self.cons.pop_slice(buf)
    }

    /// Unread bytes currently buffered.
    pub fn occupied(&self) -> usize {
        self.cons.occupied_len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Close the pause gate: the producer discards input until
    /// [`resume`](Self::resume).
    pub fn pause(&self) {
        self.paused.store(true, Ordering::Release);
    }

    pub fn resume(&self) {
        self.paused.store(false, Ordering::Release);
    }

    /// Discard everything currently buffered.
    pub fn clear(&mut self) {
        let mut scratch = [0u8; 512];
        while self.cons.pop_slice(&mut scratch) > 0 {}
    }
}
