//! Archive scrambling key
//!
//! The header carries a raw key word. A zero word means the archive body is
//! stored in the clear; otherwise the effective key is
//! `!((word << 2) | (word >> 6))` and a byte `b` stored at absolute position
//! `p` decodes to `(p ^ key) ^ !b`, truncated to eight bits.

use std::fmt;

/// Effective archive scrambling key.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct HapiKey(u32);

impl HapiKey {
    /// Derive the scrambling key from the header key word.
    ///
    /// Returns `None` when the word is zero (unscrambled archive).
    pub const fn from_header(word: u32) -> Option<Self> {
        if word == 0 {
            None
        } else {
            Some(Self(!((word << 2) | (word >> 6))))
        }
    }

    /// The derived 32-bit key value.
    pub const fn value(self) -> u32 {
        self.0
    }

    /// Decode one byte read from absolute file position `pos`.
    #[inline]
    pub const fn decrypt_byte(self, pos: u64, byte: u8) -> u8 {
        (pos as u8 ^ self.0 as u8) ^ !byte
    }

    /// Inverse of [`decrypt_byte`](Self::decrypt_byte).
    #[inline]
    pub const fn encrypt_byte(self, pos: u64, byte: u8) -> u8 {
        !(byte ^ pos as u8 ^ self.0 as u8)
    }

    /// Decode `buf` in place, where `buf[0]` was read from position `start`.
    pub fn decrypt_in_place(self, start: u64, buf: &mut [u8]) {
        for (pos, byte) in (start..).zip(buf.iter_mut()) {
            *byte = self.decrypt_byte(pos, *byte);
        }
    }

    /// Encode `buf` in place, where `buf[0]` will be stored at position `start`.
    pub fn encrypt_in_place(self, start: u64, buf: &mut [u8]) {
        for (pos, byte) in (start..).zip(buf.iter_mut()) {
            *byte = self.encrypt_byte(pos, *byte);
        }
    }
}

impl fmt::Debug for HapiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HapiKey({:#010x})", self.0)
    }
}
