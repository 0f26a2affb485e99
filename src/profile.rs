//! Link profiles: line geometry and bit rate for each supported panel

use serde::{Deserialize, Serialize};

use crate::error::{IrisError, Result};
use crate::parser::checksum::line_crc;

/// Line-sync marker. Gap/idle filler on the link is 0x00, so a sync
/// match inside a gap is effectively impossible.
pub const SYNC_BYTE: u8 = 0x5D;

/// Bytes of framing around the pixel payload: sync + row + 16-bit CRC.
pub const LINE_OVERHEAD: usize = 4;

/// Supported panel protocols, selectable at runtime over the control channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Nichia,
    Osram,
}

impl Mode {
    /// Geometry and bit rate for this mode.
    pub fn profile(self) -> Profile {
        match self {
            Mode::Nichia => NICHIA,
            Mode::Osram => OSRAM,
        }
    }

    pub fn from_name(name: &str) -> Result<Mode> {
        match name.to_ascii_lowercase().as_str() {
            "nichia" => Ok(Mode::Nichia),
            "osram" => Ok(Mode::Osram),
            _ => Err(IrisError::UnknownProfile(name.to_string())),
        }
    }
}

/// Immutable line/frame geometry of one link protocol.
///
/// A line record on the wire is `[sync][row][width pixels][crc16 BE]`,
/// so `line_len == width + 4` always holds. Rows in
/// `active_rows..total_rows` are trailing metadata rows: validated and
/// counted, never placed into a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Profile {
    pub name: &'static str,
    pub width: u16,
    pub active_rows: u16,
    pub total_rows: u16,
    pub line_len: u16,
    pub baud: u32,
    /// Mask applied to the raw row byte. Nichia carries an odd-parity
    /// bit in bit 7 (row 0 arrives as 0x80); Osram sends the row raw.
    pub row_mask: u8,
}

pub const NICHIA: Profile = Profile {
    name: "NICHIA",
    width: 256,
    active_rows: 64,
    total_rows: 68,
    line_len: 260,
    baud: 12_500_000,
    row_mask: 0x7F,
};

pub const OSRAM: Profile = Profile {
    name: "OSRAM",
    width: 320,
    active_rows: 80,
    total_rows: 84,
    line_len: 324,
    baud: 20_000_000,
    row_mask: 0xFF,
};

/// Largest pixel buffer any built-in profile can need.
pub const MAX_FRAME_BYTES: usize =
    (OSRAM.width as usize) * (OSRAM.active_rows as usize);

impl Profile {
    /// Pixel bytes in one completed frame.
    pub fn frame_bytes(&self) -> usize {
        self.width as usize * self.active_rows as usize
    }

    /// Pixel payload bytes in one line record.
    pub fn payload_len(&self) -> usize {
        self.width as usize
    }

    /// Strip the parity bit (if any) off a raw row byte.
    pub fn extract_row(&self, raw: u8) -> u8 {
        raw & self.row_mask
    }

    /// Inverse of [`extract_row`](Self::extract_row): set the odd-parity
    /// bit the way the panel hardware does, so synthesized streams match
    /// real captures.
    pub fn encode_row(&self, row: u8) -> u8 {
        if self.row_mask == 0xFF {
            return row;
        }
        let data = row & self.row_mask;
        if data.count_ones() % 2 == 0 {
            data | !self.row_mask
        } else {
            data
        }
    }

    /// Build one well-formed line record. Used by tests and stream
    /// simulators; the capture path never encodes.
    pub fn encode_line(&self, row: u8, payload: &[u8]) -> Vec<u8> {
        debug_assert_eq!(payload.len(), self.payload_len());
        let mut line = Vec::with_capacity(self.line_len as usize);
        line.push(SYNC_BYTE);
        line.push(self.encode_row(row));
        line.extend_from_slice(payload);
        line.extend_from_slice(&line_crc(payload).to_be_bytes());
        line
    }

    /// Reject geometries the parser cannot frame.
    pub fn validate(&self) -> Result<()> {
        if self.line_len as usize != self.width as usize + LINE_OVERHEAD
            || self.active_rows > self.total_rows
            || self.active_rows == 0
        {
            return Err(IrisError::Geometry {
                profile: self.name,
                width: self.width,
                line_len: self.line_len,
            });
        }
        Ok(())
    }
}
