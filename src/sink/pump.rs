//! Non-blocking transmit pump
//!
//! Drains one completed frame (8-byte header, then pixels) into the
//! sink through repeated bounded invocations. A single monotonic offset
//! spans header and payload. The pump never blocks and never retries: a
//! disconnected channel abandons the in-flight frame.

use std::sync::Arc;

use tracing::trace;

use crate::frame::header::FRAME_HDR_SIZE;
use crate::frame::pair::FramePair;
use crate::sink::SinkChannel;
use crate::stats::Stats;

/// Write attempts per service call, keeping each tick bounded.
const PUMP_PASSES: usize = 4;

struct InFlight {
    header: [u8; FRAME_HDR_SIZE],
    offset: usize,
    total: usize,
}

/// Chunked writer from the sending frame buffer into the sink channel.
pub struct TransmitPump {
    in_flight: Option<InFlight>,
    stats: Arc<Stats>,
}

impl TransmitPump {
    pub fn new(stats: Arc<Stats>) -> Self {
        Self {
            in_flight: None,
            stats,
        }
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_none()
    }

    /// Begin sending the buffer the pair just swapped out. Call only
    /// after a successful role swap.
    pub fn load(&mut self, header: [u8; FRAME_HDR_SIZE], total: usize) {
        debug_assert!(self.in_flight.is_none());
        self.in_flight = Some(InFlight {
            header,
            offset: 0,
            total,
        });
    }

    /// Forget any in-flight frame without touching the pair.
    pub fn abort(&mut self) {
        self.in_flight = None;
    }

    /// Advance the in-flight send by a bounded amount. Returns whether
    /// any progress (bytes or state) was made.
    pub fn service<S: SinkChannel + ?Sized>(&mut self, pair: &mut FramePair, sink: &mut S) -> bool {
        let Some(mut flight) = self.in_flight.take() else {
            return false;
        };

        if !sink.is_connected() {
            // Channel gone: abandon the frame, return to idle.
            trace!("sink disconnected, abandoning in-flight frame");
            pair.finish_send();
            return true;
        }

        let pix_len = flight.total - FRAME_HDR_SIZE;
        let pix = match pair.sending() {
            Some(buf) => &buf[..pix_len],
            None => {
                // No buffer checked out; nothing sane to send.
                return true;
            }
        };

        let mut wrote = 0usize;
        let mut completed = false;
        for _ in 0..PUMP_PASSES {
            let mut avail = sink.write_available();
            if avail == 0 {
                break;
            }

            if flight.offset < FRAME_HDR_SIZE {
                let rem = FRAME_HDR_SIZE - flight.offset;
                let chunk = avail.min(rem);
                let n = sink.write(&flight.header[flight.offset..flight.offset + chunk]);
                flight.offset += n;
                wrote += n;
                if n < chunk {
                    break;
                }
                avail -= n;
                if avail == 0 {
                    continue;
                }
            }

            let pix_off = flight.offset - FRAME_HDR_SIZE;
            if pix_off < pix_len {
                let rem = pix_len - pix_off;
                let chunk = avail.min(rem);
                let n = sink.write(&pix[pix_off..pix_off + chunk]);
                flight.offset += n;
                wrote += n;
                if n < chunk {
                    break;
                }
            }

            if flight.offset >= flight.total {
                completed = true;
                break;
            }
        }
        sink.flush();
        self.stats.add_bytes_sent(wrote);

        if completed {
            pair.finish_send();
            true
        } else {
            let progressed = wrote > 0;
            self.in_flight = Some(flight);
            progressed
        }
    }
}
