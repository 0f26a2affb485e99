//! Control and diagnostics plane
//!
//! Single-byte command tokens and the one-line status report.

use crate::profile::{Mode, Profile};
use crate::stats::StatsSnapshot;

/// Host commands, one byte each on the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Switch the link profile; resets the whole pipeline.
    Switch(Mode),
    /// Report the status line.
    Status,
    /// Zero all statistics counters.
    ResetStats,
    /// Enter update mode: stop the engine so a supervisor can restage.
    Boot,
}

impl Command {
    pub fn from_byte(b: u8) -> Option<Command> {
        match b {
            b'N' | b'n' => Some(Command::Switch(Mode::Nichia)),
            b'O' | b'o' => Some(Command::Switch(Mode::Osram)),
            b'S' | b's' => Some(Command::Status),
            b'R' | b'r' => Some(Command::ResetStats),
            b'B' | b'b' => Some(Command::Boot),
            _ => None,
        }
    }
}

/// Render the status report: every pipeline statistic plus the active
/// mode and bit rate, as one `key=value` line (terminator added on the
/// wire).
pub fn status_line(profile: &Profile, snap: &StatsSnapshot, ring_capacity: usize) -> String {
    format!(
        "MODE={} BAUD={} USB={} SENT={} DROP={} CRC_OK={} CRC_ERR={} GAP={} RESYNC={} OVERFLOW={} MAXFILL={}/{}",
        profile.name,
        profile.baud,
        snap.bytes_sent,
        snap.frames_sent,
        snap.frames_dropped,
        snap.crc_ok_lines,
        snap.crc_errors,
        snap.gap_bytes,
        snap.resyncs,
        snap.overflow_bytes,
        snap.max_fill,
        ring_capacity,
    )
}
