//! Pipeline counters, shared read-only with the diagnostics side

use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::utils::CachePadded;

/// Process-wide pipeline statistics.
///
/// Written from the engine thread and the ingest producer, read from
/// anywhere through a shared `Arc`. Reset only on explicit command.
#[derive(Default)]
pub struct Stats {
    inner: CachePadded<Counters>,
}

#[derive(Default)]
struct Counters {
    bytes_sent: AtomicU64,
    frames_sent: AtomicU64,
    frames_dropped: AtomicU64,
    crc_ok_lines: AtomicU64,
    crc_errors: AtomicU64,
    gap_bytes: AtomicU64,
    resyncs: AtomicU64,
    overflow_bytes: AtomicU64,
    max_fill: AtomicU64,
}

/// Plain-value copy of [`Stats`] at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub bytes_sent: u64,
    pub frames_sent: u64,
    pub frames_dropped: u64,
    pub crc_ok_lines: u64,
    pub crc_errors: u64,
    pub gap_bytes: u64,
    pub resyncs: u64,
    pub overflow_bytes: u64,
    pub max_fill: u64,
}

impl Stats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_bytes_sent(&self, n: usize) {
        self.inner.bytes_sent.fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn incr_frames_sent(&self) {
        self.inner.frames_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_frames_dropped(&self) {
        self.inner.frames_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_crc_ok(&self) {
        self.inner.crc_ok_lines.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_crc_errors(&self) {
        self.inner.crc_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_gap_bytes(&self) {
        self.inner.gap_bytes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn incr_resyncs(&self) {
        self.inner.resyncs.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_overflow(&self, n: usize) {
        self.inner
            .overflow_bytes
            .fetch_add(n as u64, Ordering::Relaxed);
    }

    pub fn record_fill(&self, fill: u64) {
        self.inner.max_fill.fetch_max(fill, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        let c = &*self.inner;
        StatsSnapshot {
            bytes_sent: c.bytes_sent.load(Ordering::Relaxed),
            frames_sent: c.frames_sent.load(Ordering::Relaxed),
            frames_dropped: c.frames_dropped.load(Ordering::Relaxed),
            crc_ok_lines: c.crc_ok_lines.load(Ordering::Relaxed),
            crc_errors: c.crc_errors.load(Ordering::Relaxed),
            gap_bytes: c.gap_bytes.load(Ordering::Relaxed),
            resyncs: c.resyncs.load(Ordering::Relaxed),
            overflow_bytes: c.overflow_bytes.load(Ordering::Relaxed),
            max_fill: c.max_fill.load(Ordering::Relaxed),
        }
    }

    /// Zero every counter. Frame ids are not statistics and live in the
    /// assembler; they survive a reset.
    pub fn reset(&self) {
        let c = &*self.inner;
        c.bytes_sent.store(0, Ordering::Relaxed);
        c.frames_sent.store(0, Ordering::Relaxed);
        c.frames_dropped.store(0, Ordering::Relaxed);
        c.crc_ok_lines.store(0, Ordering::Relaxed);
        c.crc_errors.store(0, Ordering::Relaxed);
        c.gap_bytes.store(0, Ordering::Relaxed);
        c.resyncs.store(0, Ordering::Relaxed);
        c.overflow_bytes.store(0, Ordering::Relaxed);
        c.max_fill.store(0, Ordering::Relaxed);
    }
}
