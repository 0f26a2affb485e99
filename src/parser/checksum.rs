//! Per-line CRC validation
//!
//! CRC-16/CCITT-FALSE (poly 0x1021, init 0xFFFF, no reflection) over the
//! pixel payload only. The panel appends the value big-endian as the
//! last two bytes of every line record.

use crc::{Crc, CRC_16_IBM_3740};
use once_cell::sync::Lazy;

/// CRC_16_IBM_3740 is the CCITT-FALSE algorithm; the 256-entry table is
/// built once on first use.
static LINE_CRC: Lazy<Crc<u16>> = Lazy::new(|| Crc::<u16>::new(&CRC_16_IBM_3740));

/// Checksum of a line's pixel payload.
pub fn line_crc(payload: &[u8]) -> u16 {
    LINE_CRC.checksum(payload)
}

/// Expected checksum stored in a complete line record's trailer.
pub fn record_trailer(record: &[u8]) -> u16 {
    let len = record.len();
    u16::from_be_bytes([record[len - 2], record[len - 1]])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matches_ccitt_false_check_value() {
        // The standard check input for CRC-16/CCITT-FALSE.
        assert_eq!(line_crc(b"123456789"), 0x29B1);
    }

    #[test]
    fn trailer_is_big_endian() {
        let mut record = vec![0u8; 8];
        record[6] = 0x29;
        record[7] = 0xB1;
        assert_eq!(record_trailer(&record), 0x29B1);
    }

    #[test]
    fn single_bit_flip_changes_crc() {
        let mut payload = vec![0u8; 256];
        let clean = line_crc(&payload);
        payload[100] ^= 0x01;
        assert_ne!(line_crc(&payload), clean);
    }
}
