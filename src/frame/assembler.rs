//! Frame assembly from validated lines
//!
//! Rows land in the assembling buffer at `row * width`. A row address
//! that does not advance past the previous one marks a frame boundary:
//! the accumulated buffer is emitted before the new row is placed.
//! Under sink backpressure the completed frame is dropped whole, never
//! queued.

use std::sync::Arc;

use tracing::debug;

use crate::frame::header::{FrameHeader, FRAME_HDR_SIZE};
use crate::frame::pair::FramePair;
use crate::profile::Profile;
use crate::sink::pump::TransmitPump;
use crate::stats::Stats;

pub struct FrameAssembler {
    profile: Profile,
    placed: Vec<bool>,
    placed_count: usize,
    prev_row: Option<u8>,
    /// Free-running frame counter; advances for dropped frames too and
    /// survives profile switches and stats resets.
    frame_id: u32,
    stats: Arc<Stats>,
}

impl FrameAssembler {
    pub fn new(profile: Profile, stats: Arc<Stats>) -> Self {
        Self {
            profile,
            placed: vec![false; profile.total_rows as usize],
            placed_count: 0,
            prev_row: None,
            frame_id: 0,
            stats,
        }
    }

    /// Drop the partial frame and adopt a new geometry. The frame id
    /// keeps counting.
    pub fn reset(&mut self, profile: Profile) {
        self.profile = profile;
        self.placed.clear();
        self.placed.resize(profile.total_rows as usize, false);
        self.placed_count = 0;
        self.prev_row = None;
    }

    /// Rows placed into the current frame so far.
    pub fn rows_placed(&self) -> usize {
        self.placed_count
    }

    pub fn frame_id(&self) -> u32 {
        self.frame_id
    }

    /// Accept one validated line. Emits the accumulated frame first if
    /// this row signals a boundary; metadata rows (`row >= active_rows`)
    /// advance the boundary detector but are never placed.
    pub fn place_row(
        &mut self,
        row: u8,
        payload: &[u8],
        pair: &mut FramePair,
        pump: &mut TransmitPump,
    ) {
        if let Some(prev) = self.prev_row {
            if row <= prev && self.placed_count > 0 {
                self.finish_frame(pair, pump);
            }
        }
        self.prev_row = Some(row);

        let r = row as usize;
        if r < self.profile.active_rows as usize {
            let w = self.profile.payload_len();
            pair.assembling_mut()[r * w..(r + 1) * w].copy_from_slice(payload);
            if !self.placed[r] {
                self.placed[r] = true;
                self.placed_count += 1;
            }
        }
    }

    fn finish_frame(&mut self, pair: &mut FramePair, pump: &mut TransmitPump) {
        self.frame_id = self.frame_id.wrapping_add(1);
        let frame_bytes = self.profile.frame_bytes();

        if pair.swap_roles() {
            let header = FrameHeader {
                frame_id: self.frame_id,
                width: self.profile.width,
                height: self.profile.active_rows,
            };
            pump.load(header.encode(), FRAME_HDR_SIZE + frame_bytes);
            self.stats.incr_frames_sent();
            metrics::counter!("iris_frames_sent").increment(1);
        } else {
            self.stats.incr_frames_dropped();
            metrics::counter!("iris_frames_dropped").increment(1);
            debug!(frame_id = self.frame_id, "sink busy, dropping completed frame");
        }

        pair.clear_assembling(frame_bytes);
        self.placed.fill(false);
        self.placed_count = 0;
    }
}
