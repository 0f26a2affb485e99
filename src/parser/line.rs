//! Line-framing state machine
//!
//! Consumes ring bytes and yields validated line records. Inter-line
//! gaps are scanned forward under a byte budget instead of falling back
//! to a cold rescan: gap filler is 0x00 on the link, so a false sync
//! match inside a gap is vanishingly rare and resync latency stays
//! bounded.

use std::sync::Arc;

use tracing::trace;

use crate::ingest::RingConsumer;
use crate::parser::checksum::{line_crc, record_trailer};
use crate::profile::{Profile, SYNC_BYTE};
use crate::stats::Stats;

/// Gap bytes tolerated between lines before declaring loss of sync.
/// The link inserts up to ~20 idle bytes between lines.
pub const MAX_GAP_BYTES: usize = 64;

/// Ring bytes consumed per parser pass, keeping each tick bounded.
pub const DEFAULT_PARSE_BUDGET: usize = 8192;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Cold byte-by-byte search for a sync marker. Startup, or total
    /// loss of alignment.
    ScanSync,
    /// Accumulating a fixed-length line record.
    ReadLine,
    /// Post-line scan for the next sync marker, bounded by a budget.
    ScanGap,
}

/// Incremental line parser over the byte ring.
pub struct LineParser {
    profile: Profile,
    state: ParseState,
    line: Vec<u8>,
    pos: usize,
    gap_budget: isize,
    /// Row-address trust established since the last cold resync: set by
    /// a CRC-valid line, cleared by any fall back to `ScanSync`.
    locked: bool,
    stats: Arc<Stats>,
}

impl LineParser {
    pub fn new(profile: Profile, stats: Arc<Stats>) -> Self {
        Self {
            profile,
            state: ParseState::ScanSync,
            line: vec![0u8; profile.line_len as usize],
            pos: 0,
            gap_budget: 0,
            locked: false,
            stats,
        }
    }

    /// Drop all framing state and adopt a new geometry.
    pub fn reset(&mut self, profile: Profile) {
        self.profile = profile;
        self.state = ParseState::ScanSync;
        self.line.resize(profile.line_len as usize, 0);
        self.pos = 0;
        self.gap_budget = 0;
        self.locked = false;
    }

    pub fn state(&self) -> ParseState {
        self.state
    }

    /// Drain up to `budget` bytes from the ring, invoking `on_line` with
    /// the extracted row address and pixel payload of every CRC-valid
    /// line. Returns whether any bytes were consumed.
    pub fn run_pass(
        &mut self,
        ring: &mut RingConsumer,
        budget: usize,
        mut on_line: impl FnMut(u8, &[u8]),
    ) -> bool {
        let mut remaining = budget;
        let mut chunk = [0u8; 512];
        let mut consumed = false;
        while remaining > 0 {
            let want = remaining.min(chunk.len());
            let n = ring.pop(&mut chunk[..want]);
            if n == 0 {
                break;
            }
            consumed = true;
            remaining -= n;
            for &b in &chunk[..n] {
                self.step(b, &mut on_line);
            }
        }
        consumed
    }

    /// Feed one byte. Split out from [`run_pass`](Self::run_pass) so
    /// tests can drive the machine without a ring.
    pub fn step(&mut self, b: u8, on_line: &mut impl FnMut(u8, &[u8])) {
        match self.state {
            ParseState::ScanSync => {
                if b == SYNC_BYTE {
                    self.line[0] = b;
                    self.pos = 1;
                    self.locked = false;
                    self.state = ParseState::ReadLine;
                }
            }

            ParseState::ScanGap => {
                // A sync match resumes immediately regardless of the
                // remaining budget.
                if b == SYNC_BYTE {
                    self.line[0] = b;
                    self.pos = 1;
                    self.state = ParseState::ReadLine;
                } else {
                    self.stats.incr_gap_bytes();
                    self.gap_budget -= 1;
                    if self.gap_budget <= 0 {
                        trace!("gap budget exhausted, cold rescan");
                        self.stats.incr_resyncs();
                        self.locked = false;
                        self.state = ParseState::ScanSync;
                    }
                }
            }

            ParseState::ReadLine => {
                self.line[self.pos] = b;
                self.pos += 1;

                // Early reject once the row byte is in: an out-of-range
                // row means this was not a real line start.
                if self.pos == 2 {
                    let row = self.profile.extract_row(b);
                    if row as u16 >= self.profile.total_rows {
                        if self.locked {
                            // Aligned until now, so the stream likely
                            // slipped mid-line: scan far enough to cover
                            // the rest of a full line plus a gap.
                            self.gap_budget = self.extended_gap_budget();
                            self.state = ParseState::ScanGap;
                        } else if b == SYNC_BYTE {
                            // Cold false sync on a pixel value; the bad
                            // row byte itself is the next candidate.
                            self.line[0] = b;
                            self.pos = 1;
                        } else {
                            self.state = ParseState::ScanSync;
                            self.pos = 0;
                        }
                        return;
                    }
                }

                if self.pos >= self.profile.line_len as usize {
                    let ok = self.finish_line(on_line);
                    self.pos = 0;
                    if ok {
                        // CRC passed, alignment is trustworthy.
                        self.locked = true;
                        self.gap_budget = MAX_GAP_BYTES as isize;
                    } else {
                        // Likely a false sync match inside gap data:
                        // scan with the extended budget for the real
                        // next line.
                        self.gap_budget = self.extended_gap_budget();
                    }
                    self.state = ParseState::ScanGap;
                }
            }
        }
    }

    fn extended_gap_budget(&self) -> isize {
        (MAX_GAP_BYTES + self.profile.line_len as usize) as isize
    }

    fn finish_line(&mut self, on_line: &mut impl FnMut(u8, &[u8])) -> bool {
        let payload_end = 2 + self.profile.payload_len();
        let expected = record_trailer(&self.line);
        let computed = line_crc(&self.line[2..payload_end]);
        if computed != expected {
            self.stats.incr_crc_errors();
            return false;
        }
        self.stats.incr_crc_ok();
        let row = self.profile.extract_row(self.line[1]);
        on_line(row, &self.line[2..payload_end]);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal geometry: 4-pixel rows, 2 active + 1 metadata, 8-byte
    /// line records.
    fn test_profile() -> Profile {
        Profile {
            name: "TEST",
            width: 4,
            active_rows: 2,
            total_rows: 3,
            line_len: 8,
            baud: 1_000_000,
            row_mask: 0xFF,
        }
    }

    fn parser(profile: Profile) -> (LineParser, Arc<Stats>) {
        let stats = Arc::new(Stats::new());
        (LineParser::new(profile, stats.clone()), stats)
    }

    fn feed(p: &mut LineParser, bytes: &[u8]) -> Vec<(u8, Vec<u8>)> {
        let mut out = Vec::new();
        for &b in bytes {
            p.step(b, &mut |row, payload| out.push((row, payload.to_vec())));
        }
        out
    }

    #[test]
    fn cold_scan_finds_line_in_garbage() {
        let profile = test_profile();
        let (mut p, stats) = parser(profile);
        let mut stream = vec![0x11, 0x22, 0x00];
        stream.extend(profile.encode_line(1, &[10, 20, 30, 40]));
        let lines = feed(&mut p, &stream);
        assert_eq!(lines, vec![(1, vec![10, 20, 30, 40])]);
        assert_eq!(stats.snapshot().crc_ok_lines, 1);
        assert_eq!(p.state(), ParseState::ScanGap);
    }

    #[test]
    fn corrupted_checksum_discards_line_once() {
        let profile = test_profile();
        let (mut p, stats) = parser(profile);
        let mut line = profile.encode_line(0, &[1, 2, 3, 4]);
        line[3] ^= 0x40; // flip a payload bit
        let lines = feed(&mut p, &line);
        assert!(lines.is_empty());
        assert_eq!(stats.snapshot().crc_errors, 1);
        assert_eq!(stats.snapshot().crc_ok_lines, 0);
    }

    #[test]
    fn sync_in_gap_resumes_within_budget() {
        let profile = test_profile();
        let (mut p, stats) = parser(profile);
        let mut stream = profile.encode_line(0, &[1, 1, 1, 1]);
        stream.extend(std::iter::repeat(0u8).take(20)); // idle gap
        stream.extend(profile.encode_line(1, &[2, 2, 2, 2]));
        let lines = feed(&mut p, &stream);
        assert_eq!(lines.len(), 2);
        assert_eq!(stats.snapshot().gap_bytes, 20);
        assert_eq!(stats.snapshot().resyncs, 0);
    }

    #[test]
    fn gap_budget_exhaustion_goes_cold_then_relocks() {
        let profile = test_profile();
        let (mut p, stats) = parser(profile);
        let mut stream = profile.encode_line(0, &[1, 1, 1, 1]);
        stream.extend(std::iter::repeat(0u8).take(MAX_GAP_BYTES + 10));
        stream.extend(profile.encode_line(1, &[2, 2, 2, 2]));
        let lines = feed(&mut p, &stream);
        assert_eq!(lines.len(), 2);
        assert_eq!(stats.snapshot().resyncs, 1);
    }

    #[test]
    fn false_sync_recovers_within_extended_budget() {
        let profile = test_profile();
        let (mut p, stats) = parser(profile);
        // Establish lock.
        let mut stream = profile.encode_line(0, &[1, 1, 1, 1]);
        // A false sync inside the gap whose following "row" byte is out
        // of range: the parser must fall to ScanGap with the extended
        // budget, not lose lock.
        stream.push(SYNC_BYTE);
        stream.push(0xEE); // row 238 >= total_rows
        stream.extend(std::iter::repeat(0u8).take(4));
        stream.extend(profile.encode_line(1, &[2, 2, 2, 2]));
        let lines = feed(&mut p, &stream);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1].0, 1);
        assert_eq!(stats.snapshot().resyncs, 0);
    }

    #[test]
    fn cold_invalid_row_restarts_on_sync_byte_itself() {
        let profile = test_profile();
        let (mut p, _stats) = parser(profile);
        // 0x5D pixel value looks like a sync; the next byte is another
        // 0x5D which is itself out of range as a row but is a sync
        // candidate, and the real line starts right there.
        let mut stream = vec![SYNC_BYTE];
        stream.extend(profile.encode_line(1, &[7, 7, 7, 7]));
        let lines = feed(&mut p, &stream);
        assert_eq!(lines, vec![(1, vec![7, 7, 7, 7])]);
    }

    #[test]
    fn checksum_failure_keeps_scanning_not_cold() {
        let profile = test_profile();
        let (mut p, stats) = parser(profile);
        let mut bad = profile.encode_line(0, &[5, 5, 5, 5]);
        let len = bad.len();
        bad[len - 1] ^= 0xFF;
        let mut stream = bad;
        stream.extend(std::iter::repeat(0u8).take(3));
        stream.extend(profile.encode_line(1, &[6, 6, 6, 6]));
        let lines = feed(&mut p, &stream);
        assert_eq!(lines, vec![(1, vec![6, 6, 6, 6])]);
        assert_eq!(stats.snapshot().crc_errors, 1);
        assert_eq!(stats.snapshot().resyncs, 0);
    }

    #[test]
    fn run_pass_respects_budget() {
        let profile = test_profile();
        let stats = Arc::new(Stats::new());
        let (mut tx, mut rx) =
            crate::ingest::ByteRing::with_capacity(256, stats.clone()).unwrap();
        let mut p = LineParser::new(profile, stats);
        let mut stream = Vec::new();
        for _ in 0..8 {
            stream.extend(profile.encode_line(0, &[1, 2, 3, 4]));
        }
        tx.push(&stream);

        let mut lines = 0usize;
        // Budget covers exactly two 8-byte records per pass.
        assert!(p.run_pass(&mut rx, 16, |_, _| lines += 1));
        assert_eq!(lines, 2);
        assert_eq!(rx.occupied(), stream.len() - 16);
        while p.run_pass(&mut rx, 16, |_, _| lines += 1) {}
        assert_eq!(lines, 8);
    }
}
