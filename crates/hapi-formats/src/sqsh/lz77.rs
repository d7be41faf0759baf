//! LZ77 variant used by SQSH chunks
//!
//! The stream is a sequence of groups: one tag byte followed by up to eight
//! tokens, consumed least significant bit first. A clear bit is a literal
//! byte. A set bit is a little-endian `u16` whose upper 12 bits index a
//! 4096-byte ring window and whose lower 4 bits hold the copy length minus
//! two. A window index of zero terminates the stream. The window starts
//! zeroed with its write cursor at 1.

use super::error::{SqshError, SqshResult};

const WINDOW_SIZE: usize = 4096;
const WINDOW_MASK: usize = WINDOW_SIZE - 1;
const MIN_MATCH: usize = 2;

struct Window {
    buf: [u8; WINDOW_SIZE],
    cursor: usize,
}

impl Window {
    const fn new() -> Self {
        Self {
            buf: [0; WINDOW_SIZE],
            cursor: 1,
        }
    }

    #[inline]
    fn push(&mut self, byte: u8) {
        self.buf[self.cursor] = byte;
        self.cursor = (self.cursor + 1) & WINDOW_MASK;
    }
}

/// Decompress `input`, which must expand to at most `limit` bytes.
pub fn decompress(input: &[u8], limit: usize) -> SqshResult<Vec<u8>> {
    let mut out = Vec::with_capacity(limit);
    let mut window = Window::new();
    let mut pos = 0;

    let emit = |out: &mut Vec<u8>, window: &mut Window, byte: u8| {
        if out.len() >= limit {
            return Err(SqshError::Lz77Overflow(limit));
        }
        out.push(byte);
        window.push(byte);
        Ok(())
    };

    loop {
        let tag = *input.get(pos).ok_or(SqshError::Lz77Truncated(pos))?;
        pos += 1;

        for bit in 0..8 {
            if tag & (1 << bit) == 0 {
                let byte = *input.get(pos).ok_or(SqshError::Lz77Truncated(pos))?;
                pos += 1;
                emit(&mut out, &mut window, byte)?;
                continue;
            }

            let token = input
                .get(pos..pos + 2)
                .map(|b| u16::from_le_bytes([b[0], b[1]]))
                .ok_or(SqshError::Lz77Truncated(pos))?;
            pos += 2;

            let mut src = usize::from(token >> 4);
            if src == 0 {
                return Ok(out);
            }

            let count = usize::from(token & 0x0F) + MIN_MATCH;
            for _ in 0..count {
                let byte = window.buf[src];
                emit(&mut out, &mut window, byte)?;
                src = (src + 1) & WINDOW_MASK;
            }
        }
    }
}
