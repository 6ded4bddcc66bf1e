//! Deterministic keystream used for the XOR transform.
//!
//! Encoding and decoding are the same operation, so a protected program
//! only needs `keystream_byte` and `decode_in_place` copied verbatim into
//! its own source to recover obfuscated strings at runtime with the
//! original key. This module deliberately imports nothing.

/// Value added to a rejected keystream byte until it leaves the excluded
/// ranges. 47 is coprime with 256, so the walk visits all 256 values and
/// always terminates.
const KEYSTREAM_STEP: u8 = 47;

/// Keystream byte for `key` at `index`, where `index` is the 0-based
/// position within the target string (not within the file).
///
/// Never returns 0, 10, or a printable ASCII byte (32..=126 inclusive).
pub fn keystream_byte(key: u8, index: usize) -> u8 {
    let mut value = key.wrapping_mul(index.wrapping_add(1) as u8);
    while value == 0 || value == 10 || (32..=126).contains(&value) {
        value = value.wrapping_add(KEYSTREAM_STEP);
    }
    value
}

/// Obfuscate `data` in place with `key`.
pub fn encode_in_place(key: u8, data: &mut [u8]) {
    for (index, byte) in data.iter_mut().enumerate() {
        *byte ^= keystream_byte(key, index);
    }
}

/// Recover obfuscated bytes in place. XOR is self-inverse, so this is the
/// encoding transform under a second name.
pub fn decode_in_place(key: u8, data: &mut [u8]) {
    encode_in_place(key, data);
}
