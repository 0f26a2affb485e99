//! The reassembly engine: context object and cooperative scheduler
//!
//! One logical loop services ingestion drain, parse, assembly and the
//! transmit pump, each doing strictly bounded work per tick so no stage
//! starves another. Commands are only actioned between ticks, so a
//! profile switch never tears a frame.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use tracing::{debug, info, warn};

use crate::control::{status_line, Command};
use crate::frame::{FrameAssembler, FramePair};
use crate::ingest::RingConsumer;
use crate::parser::LineParser;
use crate::profile::{Mode, Profile, MAX_FRAME_BYTES};
use crate::sink::{SinkChannel, TransmitPump};
use crate::stats::Stats;

/// Backoff when a tick found no ring bytes and no sink space. Components
/// themselves never sleep or block.
const IDLE_SLEEP: Duration = Duration::from_micros(200);

pub struct Engine<S: SinkChannel> {
    profile: Profile,
    parser: LineParser,
    assembler: FrameAssembler,
    pair: FramePair,
    pump: TransmitPump,
    ring: RingConsumer,
    sink: S,
    stats: Arc<Stats>,
    /// Active profile published read-only for diagnostics outside the
    /// engine thread.
    published: Arc<ArcSwap<Profile>>,
    commands: flume::Receiver<Command>,
    responses: flume::Sender<String>,
    parse_budget: usize,
}

impl<S: SinkChannel> Engine<S> {
    pub fn new(
        profile: Profile,
        ring: RingConsumer,
        sink: S,
        stats: Arc<Stats>,
        commands: flume::Receiver<Command>,
        responses: flume::Sender<String>,
        parse_budget: usize,
    ) -> crate::error::Result<Self> {
        profile.validate()?;
        let pair_capacity = MAX_FRAME_BYTES.max(profile.frame_bytes());
        Ok(Self {
            parser: LineParser::new(profile, stats.clone()),
            assembler: FrameAssembler::new(profile, stats.clone()),
            pair: FramePair::new(pair_capacity),
            pump: TransmitPump::new(stats.clone()),
            ring,
            sink,
            published: Arc::new(ArcSwap::from_pointee(profile)),
            profile,
            stats,
            commands,
            responses,
            parse_budget,
        })
    }

    /// Handle to the active profile for observers (status logging).
    pub fn profile_watch(&self) -> Arc<ArcSwap<Profile>> {
        self.published.clone()
    }

    /// Borrow the sink, e.g. to inspect a memory sink after a run.
    pub fn sink_ref(&self) -> &S {
        &self.sink
    }

    /// One bounded scheduler pass over every stage. Returns whether any
    /// stage made progress.
    pub fn tick(&mut self) -> bool {
        let mut worked = self.parse_pass();
        // Pump twice per tick so a completed frame starts draining in
        // the same pass that assembled it.
        worked |= self.pump.service(&mut self.pair, &mut self.sink);
        worked |= self.pump.service(&mut self.pair, &mut self.sink);
        worked
    }

    /// Run until the command channel closes or a Boot command arrives.
    pub fn run(&mut self) {
        info!(mode = self.profile.name, "engine running");
        loop {
            let worked = self.tick();
            match self.commands.try_recv() {
                Ok(cmd) => {
                    if self.handle_command(cmd) {
                        break;
                    }
                }
                Err(flume::TryRecvError::Empty) => {}
                Err(flume::TryRecvError::Disconnected) => break,
            }
            if !worked {
                std::thread::sleep(IDLE_SLEEP);
            }
        }
        info!("engine stopped");
    }

    fn parse_pass(&mut self) -> bool {
        let fill = self.ring.occupied();
        self.stats.record_fill(fill as u64);
        if fill == 0 {
            return false;
        }
        metrics::gauge!("iris_ring_fill").set(fill as f64);

        let Self {
            parser,
            ring,
            assembler,
            pair,
            pump,
            parse_budget,
            ..
        } = self;
        parser.run_pass(ring, *parse_budget, |row, payload| {
            assembler.place_row(row, payload, pair, pump);
        })
    }

    /// Returns true when the engine should stop.
    fn handle_command(&mut self, cmd: Command) -> bool {
        debug!(?cmd, "control command");
        match cmd {
            Command::Switch(mode) => {
                self.switch_profile(mode);
                false
            }
            Command::Status => {
                let line = status_line(&self.profile, &self.stats.snapshot(), self.ring.capacity());
                if self.responses.try_send(line).is_err() {
                    warn!("status response dropped, no listener");
                }
                false
            }
            Command::ResetStats => {
                self.stats.reset();
                false
            }
            Command::Boot => {
                info!("entering update mode");
                true
            }
        }
    }

    /// Atomic pipeline reset onto a new geometry. Ingestion is paused
    /// while parser, assembler, buffers and pump reset together, so no
    /// in-flight bytes are parsed against the wrong profile.
    fn switch_profile(&mut self, mode: Mode) {
        let profile = mode.profile();
        info!(from = self.profile.name, to = profile.name, "profile switch");
        self.ring.pause();
        self.ring.clear();
        self.parser.reset(profile);
        self.assembler.reset(profile);
        self.pump.abort();
        self.pair.reset();
        self.profile = profile;
        self.published.store(Arc::new(profile));
        self.ring.resume();
    }
}
