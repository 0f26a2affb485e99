pub mod checksum;
pub mod line;

pub use line::{LineParser, ParseState};
