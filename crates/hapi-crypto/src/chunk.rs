//! SQSH chunk payload cipher
//!
//! When a chunk's cipher flag is set, payload byte `i` is stored as
//! `(b ^ i) + i` and decoded as `(b - i) ^ i`, with `i` truncated to eight
//! bits and all arithmetic wrapping.

/// Decode a ciphered chunk payload in place.
pub fn decrypt_chunk(data: &mut [u8]) {
    for (i, byte) in data.iter_mut().enumerate() {
        let i = i as u8;
        *byte = byte.wrapping_sub(i) ^ i;
    }
}

/// Encode a chunk payload in place (inverse of [`decrypt_chunk`]).
pub fn encrypt_chunk(data: &mut [u8]) {
    for (i, byte) in data.iter_mut().enumerate() {
        let i = i as u8;
        *byte = (*byte ^ i).wrapping_add(i);
    }
}
