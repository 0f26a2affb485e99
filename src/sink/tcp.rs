//! Nonblocking TCP viewer sink
//!
//! The listener task hands accepted connections over a channel; the
//! engine-side sink adopts the newest one and writes frames without
//! ever blocking the tick loop.

use std::io::{ErrorKind, Write};
use std::net::TcpStream;

use tracing::{info, warn};

use crate::sink::SinkChannel;

/// Upper bound handed to the pump per write attempt.
const WRITE_CHUNK: usize = 16 * 1024;

pub struct TcpSink {
    stream: Option<TcpStream>,
    incoming: flume::Receiver<TcpStream>,
}

impl TcpSink {
    /// `incoming` carries nonblocking, connected streams from the
    /// accept loop.
    pub fn new(incoming: flume::Receiver<TcpStream>) -> Self {
        Self {
            stream: None,
            incoming,
        }
    }

    fn adopt_latest(&mut self) {
        while let Ok(stream) = self.incoming.try_recv() {
            if self.stream.is_some() {
                info!("replacing viewer connection with newer one");
            }
            self.stream = Some(stream);
        }
    }
}

impl SinkChannel for TcpSink {
    fn is_connected(&mut self) -> bool {
        self.adopt_latest();
        self.stream.is_some()
    }

    fn write_available(&mut self) -> usize {
        if self.stream.is_some() {
            WRITE_CHUNK
        } else {
            0
        }
    }

    fn write(&mut self, buf: &[u8]) -> usize {
        let Some(stream) = self.stream.as_mut() else {
            return 0;
        };
        match stream.write(buf) {
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::WouldBlock => 0,
            Err(e) => {
                warn!(error = %e, "viewer connection lost");
                self.stream = None;
                0
            }
        }
    }

    fn flush(&mut self) {
        if let Some(stream) = self.stream.as_mut() {
            match stream.flush() {
                Ok(()) => {}
                Err(e) if e.kind() == ErrorKind::WouldBlock => {}
                Err(e) => {
                    warn!(error = %e, "viewer connection lost on flush");
                    self.stream = None;
                }
            }
        }
    }
}
