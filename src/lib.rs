//! Iris: frame-aware LVDS-to-host bridge core
//!
//! Turns the continuous, error-prone byte stream of an LVDS panel link
//! into discrete, validated, fixed-geometry grayscale frames:
//!
//! ```text
//! byte stream -> ring -> line parser -> frame assembler -> sink pump
//! ```
//!
//! Rather than forwarding raw bytes to a sink that cannot keep up, the
//! engine parses the line protocol, assembles complete frames, and
//! drops whole frames under backpressure, so the sink only ever sees
//! complete, correct frames.

pub mod control;
pub mod engine;
pub mod error;
pub mod frame;
pub mod ingest;
pub mod parser;
pub mod profile;
pub mod sink;
pub mod stats;

use serde::{Deserialize, Serialize};

pub use control::Command;
pub use engine::Engine;
pub use error::{IrisError, Result};
pub use profile::{Mode, Profile};
pub use stats::{Stats, StatsSnapshot};

/// System configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub input: InputConfig,
    pub output: OutputConfig,
    pub pipeline: PipelineConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InputConfig {
    /// Byte-stream source: serial device, FIFO, or `-` for stdin.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Address the viewer sink listens on.
    pub listen: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ring capacity in bytes; must be a power of two and cover the
    /// worst-case burst between two parser passes.
    pub ring_capacity: usize,
    /// Ring bytes consumed per parser pass.
    pub parse_budget: usize,
    pub initial_profile: String,
    /// Seconds between throughput log lines; 0 disables.
    pub status_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: InputConfig::default(),
            output: OutputConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: "/dev/ttyACM0".into(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:7700".into(),
        }
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ring_capacity: 1 << 15,
            parse_budget: 8192,
            initial_profile: "nichia".into(),
            status_interval_secs: 10,
        }
    }
}

impl Config {
    /// Layer an optional TOML file and `IRIS_*` environment overrides
    /// over the defaults.
    pub fn load(path: Option<&str>) -> Result<Config> {
        let mut builder = config::Config::builder();
        builder = match path {
            Some(p) => builder.add_source(config::File::with_name(p)),
            None => builder.add_source(config::File::with_name("iris").required(false)),
        };
        builder = builder.add_source(
            config::Environment::with_prefix("IRIS")
                .separator("__")
                .try_parsing(true),
        );
        Ok(builder.build()?.try_deserialize()?)
    }
}
