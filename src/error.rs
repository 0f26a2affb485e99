//! Library error type

use thiserror::Error;

#[derive(Debug, Error)]
pub enum IrisError {
    #[error("ring capacity {0} is not a power of two")]
    RingCapacity(usize),

    #[error("profile {profile}: line length {line_len} does not frame a {width}-pixel row")]
    Geometry {
        profile: &'static str,
        width: u16,
        line_len: u16,
    },

    #[error("unknown profile {0:?}")]
    UnknownProfile(String),

    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, IrisError>;
