//! Byte sources: the decrypting archive reader and bounded windows over it
//!
//! Everything after the fixed header of a scrambled archive is stored XORed
//! with the archive key and the byte's absolute position, so decoding has to
//! happen at the point where bytes leave the file. [`ScrambledReader`] wraps
//! any `Read + Seek` and does exactly that once a key is installed; parsers
//! above it see plain little-endian data.

use std::io::{self, Read, Seek, SeekFrom};

use binrw::{BinRead, BinResult, NullString};
use hapi_crypto::HapiKey;

/// Random-access reader over archive bytes, decoded with the archive key.
pub trait ByteSource: Read + Seek + Sized {
    /// Install the archive key. `None` turns decoding off.
    fn set_key(&mut self, key: Option<HapiKey>);

    /// Currently installed key.
    fn key(&self) -> Option<HapiKey>;

    /// Seek to an absolute archive offset.
    fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.seek(SeekFrom::Start(offset))?;
        Ok(())
    }

    /// Current absolute position.
    fn position(&mut self) -> io::Result<u64> {
        self.stream_position()
    }

    /// Read a single byte.
    fn read_byte(&mut self) -> BinResult<u8> {
        u8::read_le(self)
    }

    /// Read a little-endian `u32`.
    fn read_u32_le(&mut self) -> BinResult<u32> {
        u32::read_le(self)
    }

    /// Read a null-terminated string. Bytes that are not UTF-8 are replaced.
    fn read_cstring(&mut self) -> BinResult<String> {
        let raw = NullString::read_le(self)?;
        Ok(String::from_utf8_lossy(&raw.0).into_owned())
    }
}

/// Archive reader that undoes HAPI scrambling.
///
/// Tracks its own position so decoding never needs to query the inner
/// reader.
#[derive(Debug)]
pub struct ScrambledReader<R> {
    inner: R,
    key: Option<HapiKey>,
    pos: u64,
}

impl<R: Read + Seek> ScrambledReader<R> {
    /// Wrap `inner`, starting unscrambled at its current position.
    pub fn new(mut inner: R) -> io::Result<Self> {
        let pos = inner.stream_position()?;
        Ok(Self {
            inner,
            key: None,
            pos,
        })
    }

    /// Get a reference to the inner reader
    pub const fn get_ref(&self) -> &R {
        &self.inner
    }

    /// Unwrap the inner reader
    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read + Seek> Read for ScrambledReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        if let Some(key) = self.key {
            key.decrypt_in_place(self.pos, &mut buf[..n]);
        }
        self.pos += n as u64;
        Ok(n)
    }
}

impl<R: Read + Seek> Seek for ScrambledReader<R> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.pos = self.inner.seek(pos)?;
        Ok(self.pos)
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}

impl<R: Read + Seek> ByteSource for ScrambledReader<R> {
    fn set_key(&mut self, key: Option<HapiKey>) {
        self.key = key;
    }

    fn key(&self) -> Option<HapiKey> {
        self.key
    }
}

/// Window of `len` bytes starting at `start` within a source.
///
/// Positions are window-relative; reads stop at the end of the window even if
/// the source continues.
#[derive(Debug)]
pub struct SubStream<'a, S> {
    source: &'a mut S,
    start: u64,
    len: u64,
    pos: u64,
}

impl<'a, S: Read + Seek> SubStream<'a, S> {
    /// Create a window over `source[start..start + len]`.
    pub fn new(source: &'a mut S, start: u64, len: u64) -> Self {
        Self {
            source,
            start,
            len,
            pos: 0,
        }
    }

    /// Window length in bytes.
    pub const fn len(&self) -> u64 {
        self.len
    }

    /// Whether the window is empty.
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Absolute offset of the window within the source.
    pub const fn start(&self) -> u64 {
        self.start
    }

    /// Bytes left before the end of the window.
    pub const fn remaining(&self) -> u64 {
        self.len.saturating_sub(self.pos)
    }
}

impl<S: Read + Seek> Read for SubStream<'_, S> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let remaining = self.remaining();
        if remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let target = self.start + self.pos;
        if self.source.stream_position()? != target {
            self.source.seek(SeekFrom::Start(target))?;
        }

        let max = usize::try_from(remaining).map_or(buf.len(), |r| r.min(buf.len()));
        let n = self.source.read(&mut buf[..max])?;
        self.pos += n as u64;
        Ok(n)
    }
}

impl<S: Read + Seek> Seek for SubStream<'_, S> {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let new_pos = match pos {
            SeekFrom::Start(offset) => Some(offset),
            SeekFrom::End(delta) => self.len.checked_add_signed(delta),
            SeekFrom::Current(delta) => self.pos.checked_add_signed(delta),
        };

        match new_pos {
            Some(new_pos) => {
                self.pos = new_pos;
                Ok(new_pos)
            }
            None => Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of sub-stream",
            )),
        }
    }

    fn stream_position(&mut self) -> io::Result<u64> {
        Ok(self.pos)
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn scrambled(plain: &[u8], key: HapiKey, from: usize) -> Vec<u8> {
        let mut data = plain.to_vec();
        key.encrypt_in_place(from as u64, &mut data[from..]);
        data
    }

    #[test]
    fn test_reads_plain_until_key_is_set() {
        let key = HapiKey::from_header(0x55).unwrap();
        let mut plain = 0xDEAD_BEEF_u32.to_le_bytes().to_vec();
        plain.extend_from_slice(&0x1234_5678_u32.to_le_bytes());
        let data = scrambled(&plain, key, 4);

        let mut reader = ScrambledReader::new(Cursor::new(data)).unwrap();
        assert_eq!(reader.read_u32_le().unwrap(), 0xDEAD_BEEF);

        reader.set_key(Some(key));
        assert_eq!(reader.read_u32_le().unwrap(), 0x1234_5678);
        assert_eq!(reader.position().unwrap(), 8);
    }

    #[test]
    fn test_decoding_follows_seeks() {
        let key = HapiKey::from_header(0xABCD).unwrap();
        let plain: Vec<u8> = (0..=255u8).collect();
        let data = scrambled(&plain, key, 0);

        let mut reader = ScrambledReader::new(Cursor::new(data)).unwrap();
        reader.set_key(Some(key));

        reader.seek_to(200).unwrap();
        assert_eq!(reader.read_byte().unwrap(), 200);
        reader.seek_to(17).unwrap();
        assert_eq!(reader.read_byte().unwrap(), 17);
        assert_eq!(reader.read_byte().unwrap(), 18);
    }

    #[test]
    fn test_read_cstring() {
        let key = HapiKey::from_header(9).unwrap();
        let data = scrambled(b"\0\0unitpics\0rest", key, 0);

        let mut reader = ScrambledReader::new(Cursor::new(data)).unwrap();
        reader.set_key(Some(key));
        reader.seek_to(2).unwrap();
        assert_eq!(reader.read_cstring().unwrap(), "unitpics");
        assert_eq!(reader.position().unwrap(), 11);
    }

    #[test]
    fn test_read_cstring_without_terminator_fails() {
        let mut reader = ScrambledReader::new(Cursor::new(b"abc".to_vec())).unwrap();
        assert!(reader.read_cstring().is_err());
    }

    #[test]
    fn test_sub_stream_is_bounded() {
        let mut source = Cursor::new((0..100u8).collect::<Vec<_>>());
        let mut window = SubStream::new(&mut source, 10, 5);

        let mut out = Vec::new();
        window.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![10, 11, 12, 13, 14]);
        assert_eq!(window.remaining(), 0);
    }

    #[test]
    fn test_sub_stream_seek_is_window_relative() {
        let mut source = Cursor::new((0..100u8).collect::<Vec<_>>());
        let mut window = SubStream::new(&mut source, 40, 10);

        window.seek(SeekFrom::End(-2)).unwrap();
        let mut buf = [0u8; 4];
        let n = window.read(&mut buf).unwrap();
        assert_eq!(&buf[..n], &[48, 49]);

        window.seek(SeekFrom::Start(1)).unwrap();
        window.seek(SeekFrom::Current(2)).unwrap();
        let n = window.read(&mut buf[..1]).unwrap();
        assert_eq!(&buf[..n], &[43]);

        assert!(window.seek(SeekFrom::Current(-100)).is_err());
    }

    #[test]
    fn test_sub_stream_past_source_end_reads_short() {
        let mut source = Cursor::new(vec![1u8, 2, 3]);
        let mut window = SubStream::new(&mut source, 1, 50);

        let mut out = Vec::new();
        window.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![2, 3]);
    }

    #[test]
    fn test_sub_stream_over_scrambled_reader() {
        let key = HapiKey::from_header(0x77).unwrap();
        let plain: Vec<u8> = (0..64u8).collect();
        let data = scrambled(&plain, key, 0);

        let mut reader = ScrambledReader::new(Cursor::new(data)).unwrap();
        reader.set_key(Some(key));

        let mut window = SubStream::new(&mut reader, 32, 4);
        let mut out = Vec::new();
        window.read_to_end(&mut out).unwrap();
        assert_eq!(out, vec![32, 33, 34, 35]);
    }
}
