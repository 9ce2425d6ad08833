//! Sensor response classification
//!
//! The gateway answers a read command with a short binary frame. Fields are
//! addressed by offsets into the lowercase hex encoding of that frame:
//! - `[0:2]`   connectivity code, `00` = sensor not reporting
//! - `[12:14]` occupancy code, `00` = free, `01` = occupied
//!
//! Anything shorter than 14 hex characters, or carrying another occupancy
//! code, is `Malformed`. Undocumented codes are never mapped to a state.

use crate::domain::types::{Occupancy, RawResponse};

/// Minimum hex length of a well-formed reply
pub const MIN_HEX_LEN: usize = 14;

const CODE_DISCONNECTED: &str = "00";
const CODE_FREE: &str = "00";
const CODE_OCCUPIED: &str = "01";

/// Classify raw gateway bytes (hex-encodes before slicing)
pub fn classify(raw: &[u8]) -> Occupancy {
    classify_hex(&hex::encode(raw))
}

/// Classify a response already in its hex representation.
///
/// Total over every string: slicing goes through `str::get`, so short input
/// or a non-ASCII boundary yields `Malformed` instead of a panic.
pub fn classify_hex(response: &str) -> Occupancy {
    if response.len() < MIN_HEX_LEN {
        return Occupancy::Malformed;
    }

    if response.get(0..2) == Some(CODE_DISCONNECTED) {
        return Occupancy::Disconnected;
    }

    match response.get(12..14) {
        Some(CODE_FREE) => Occupancy::Free,
        Some(CODE_OCCUPIED) => Occupancy::Occupied,
        _ => Occupancy::Malformed,
    }
}

impl RawResponse {
    pub fn classify(&self) -> Occupancy {
        classify(self.as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_input_is_malformed() {
        assert_eq!(classify_hex(""), Occupancy::Malformed);
        assert_eq!(classify_hex("0"), Occupancy::Malformed);
        assert_eq!(classify_hex("0100000000000"), Occupancy::Malformed);
        assert_eq!(classify(&[]), Occupancy::Malformed);
    }

    #[test]
    fn test_free() {
        let response = format!("01{}00", "0".repeat(10));
        assert_eq!(response.len(), 14);
        assert_eq!(classify_hex(&response), Occupancy::Free);
    }

    #[test]
    fn test_occupied() {
        let response = format!("01{}01", "0".repeat(10));
        assert_eq!(classify_hex(&response), Occupancy::Occupied);
    }

    #[test]
    fn test_disconnected_wins_over_status() {
        assert_eq!(classify_hex(&"0".repeat(14)), Occupancy::Disconnected);
        let with_tail = format!("00{}01ffff", "0".repeat(10));
        assert_eq!(classify_hex(&with_tail), Occupancy::Disconnected);
    }

    #[test]
    fn test_unknown_status_code_is_malformed() {
        let response = format!("01{}02", "0".repeat(10));
        assert_eq!(classify_hex(&response), Occupancy::Malformed);
        let response = format!("01{}ff", "0".repeat(10));
        assert_eq!(classify_hex(&response), Occupancy::Malformed);
    }

    #[test]
    fn test_raw_bytes_are_hex_encoded_first() {
        // byte 6 becomes hex [12:14]
        assert_eq!(classify(&[0x01, 0, 0, 0, 0, 0, 0x00]), Occupancy::Free);
        assert_eq!(classify(&[0x01, 0, 0, 0, 0, 0, 0x01]), Occupancy::Occupied);
        assert_eq!(classify(&[0x00, 0, 0, 0, 0, 0, 0x01]), Occupancy::Disconnected);
        // ASCII "01000000000000" must not be read as a hex reply
        assert_eq!(classify(b"01000000000000"), Occupancy::Malformed);
        let raw = RawResponse::from(vec![0x7F, 0x10, 0x22, 0, 0, 0, 0x01, 0xAA]);
        assert_eq!(raw.classify(), Occupancy::Occupied);
    }

    #[test]
    fn test_non_ascii_input_never_panics() {
        // multi-byte chars straddling the slice offsets
        assert_eq!(classify_hex("ééééééé"), Occupancy::Malformed);
        assert_eq!(classify_hex("0é000000000000"), Occupancy::Free);
        assert_eq!(classify_hex("01000000000é00"), Occupancy::Malformed);
        assert_eq!(classify_hex("ééééééééééééééé"), Occupancy::Malformed);
    }

    #[test]
    fn test_total_and_deterministic_over_byte_strings() {
        for len in 0..=16usize {
            for seed in 0u8..=255 {
                let raw: Vec<u8> =
                    (0..len).map(|i| seed.wrapping_mul(31).wrapping_add(i as u8)).collect();
                assert_eq!(classify(&raw), classify(&raw));
            }
        }
    }
}
