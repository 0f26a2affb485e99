//! Downstream bulk-transfer channel

pub mod pump;
pub mod tcp;

pub use pump::TransmitPump;
pub use tcp::TcpSink;

/// Non-blocking byte channel the pump drains frames into.
///
/// Implementations must never block: `write` returns how many bytes the
/// channel accepted right now, possibly zero. `write_available` is an
/// upper bound used to size the next attempt; zero means "no space,
/// come back later".
pub trait SinkChannel {
    fn is_connected(&mut self) -> bool;
    fn write_available(&mut self) -> usize;
    fn write(&mut self, buf: &[u8]) -> usize;
    fn flush(&mut self);
}

/// Sink that collects everything into memory. Backs tests and offline
/// frame capture.
#[derive(Default)]
pub struct MemorySink {
    pub data: Vec<u8>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SinkChannel for MemorySink {
    fn is_connected(&mut self) -> bool {
        true
    }

    fn write_available(&mut self) -> usize {
        4096
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        self.data.extend_from_slice(buf);
        buf.len()
    }

    fn flush(&mut self) {}
}
