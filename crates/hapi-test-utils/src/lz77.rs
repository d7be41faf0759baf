//! Greedy encoder for the SQSH LZ77 variant
//!
//! Matches are found through a table of the last position of every 3-byte
//! prefix, which is plenty for fixtures.

use std::collections::HashMap;

const WINDOW_SIZE: usize = 4096;
const WINDOW_MASK: usize = WINDOW_SIZE - 1;
const MIN_MATCH: usize = 3;
const MAX_MATCH: usize = 17;

struct Emitter {
    out: Vec<u8>,
    tag_pos: usize,
    bit: u8,
}

impl Emitter {
    fn new() -> Self {
        Self {
            out: vec![0],
            tag_pos: 0,
            bit: 0,
        }
    }

    fn next_slot(&mut self) {
        if self.bit == 8 {
            self.tag_pos = self.out.len();
            self.out.push(0);
            self.bit = 0;
        }
    }

    fn literal(&mut self, byte: u8) {
        self.next_slot();
        self.out.push(byte);
        self.bit += 1;
    }

    fn reference(&mut self, token: u16) {
        self.next_slot();
        self.out[self.tag_pos] |= 1 << self.bit;
        self.out.extend_from_slice(&token.to_le_bytes());
        self.bit += 1;
    }

    fn finish(mut self) -> Vec<u8> {
        self.reference(0);
        self.out
    }
}

/// Compress `data` into an LZ77 stream terminated by an end marker.
pub fn compress(data: &[u8]) -> Vec<u8> {
    let mut emitter = Emitter::new();
    let mut last_seen: HashMap<[u8; 3], usize> = HashMap::new();
    let prefix = |i: usize| -> Option<[u8; 3]> {
        data.get(i..i + MIN_MATCH).map(|p| [p[0], p[1], p[2]])
    };

    let mut i = 0;
    while i < data.len() {
        let mut best = None;

        if let Some(key) = prefix(i)
            && let Some(&j) = last_seen.get(&key)
        {
            // Output byte j sits in window slot j + 1
            let src = (j + 1) & WINDOW_MASK;
            if i - j < WINDOW_SIZE && src != 0 {
                let max = MAX_MATCH.min(data.len() - i);
                let len = (0..max).take_while(|&k| data[j + k] == data[i + k]).count();
                if len >= MIN_MATCH {
                    best = Some((src, len));
                }
            }
        }

        let advance = match best {
            Some((src, len)) => {
                emitter.reference(((src as u16) << 4) | (len - 2) as u16);
                len
            }
            None => {
                emitter.literal(data[i]);
                1
            }
        };

        for k in i..i + advance {
            if let Some(key) = prefix(k) {
                last_seen.insert(key, k);
            }
        }
        i += advance;
    }

    emitter.finish()
}
