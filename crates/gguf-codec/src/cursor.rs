//! Little-endian binary cursor over a byte channel.
//!
//! [`ByteReader`] and [`ByteWriter`] wrap any [`Read`] or [`Write`] (file,
//! in-memory buffer, socket) and count the bytes that pass through them, so
//! alignment padding can be computed without [`std::io::Seek`].

use std::io::{self, Read, Write};

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};

use crate::{GgufError, Result};

/// Round `offset` up to the next multiple of `alignment`.
///
/// `alignment` must be non-zero.
pub fn align_offset(offset: u64, alignment: u64) -> u64 {
    offset + padding_for(offset, alignment)
}

/// Like [`align_offset`], but `None` if the result does not fit in a `u64`.
pub fn checked_align_offset(offset: u64, alignment: u64) -> Option<u64> {
    offset.checked_add(padding_for(offset, alignment))
}

/// Number of zero bytes needed after `offset` to reach `alignment`.
pub fn padding_for(offset: u64, alignment: u64) -> u64 {
    (alignment - offset % alignment) % alignment
}

/// Forward-only reader of GGUF primitives.
#[derive(Debug)]
pub struct ByteReader<R> {
    inner: R,
    position: u64,
}

impl<R: Read> ByteReader<R> {
    /// Wrap a byte source positioned at the start of a GGUF stream.
    pub fn new(inner: R) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Give back the wrapped source.
    pub fn into_inner(self) -> R {
        self.inner
    }

    fn fail(&self, err: io::Error) -> GgufError {
        if err.kind() == io::ErrorKind::UnexpectedEof {
            GgufError::TruncatedInput {
                position: self.position,
            }
        } else {
            GgufError::Io(err)
        }
    }

    fn advance<T>(&mut self, width: u64, read: io::Result<T>) -> Result<T> {
        let value = read.map_err(|e| self.fail(e))?;
        self.position += width;
        Ok(value)
    }

    /// Read an unsigned byte.
    pub fn read_u8(&mut self) -> Result<u8> {
        let r = self.inner.read_u8();
        self.advance(1, r)
    }

    /// Read a signed byte.
    pub fn read_i8(&mut self) -> Result<i8> {
        let r = self.inner.read_i8();
        self.advance(1, r)
    }

    /// Read a little-endian `u16`.
    pub fn read_u16(&mut self) -> Result<u16> {
        let r = self.inner.read_u16::<LittleEndian>();
        self.advance(2, r)
    }

    /// Read a little-endian `i16`.
    pub fn read_i16(&mut self) -> Result<i16> {
        let r = self.inner.read_i16::<LittleEndian>();
        self.advance(2, r)
    }

    /// Read a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32> {
        let r = self.inner.read_u32::<LittleEndian>();
        self.advance(4, r)
    }

    /// Read a little-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32> {
        let r = self.inner.read_i32::<LittleEndian>();
        self.advance(4, r)
    }

    /// Read a little-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64> {
        let r = self.inner.read_u64::<LittleEndian>();
        self.advance(8, r)
    }

    /// Read a little-endian `i64`.
    pub fn read_i64(&mut self) -> Result<i64> {
        let r = self.inner.read_i64::<LittleEndian>();
        self.advance(8, r)
    }

    /// Read a little-endian `f32`.
    pub fn read_f32(&mut self) -> Result<f32> {
        let r = self.inner.read_f32::<LittleEndian>();
        self.advance(4, r)
    }

    /// Read a little-endian `f64`.
    pub fn read_f64(&mut self) -> Result<f64> {
        let r = self.inner.read_f64::<LittleEndian>();
        self.advance(8, r)
    }

    /// Read a one-byte boolean. Any non-zero byte is `true`.
    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_u8()? != 0)
    }

    /// Read exactly `len` raw bytes.
    ///
    /// The buffer grows with the data actually received, so a bogus length
    /// on a short stream fails with `TruncatedInput` instead of allocating
    /// `len` bytes up front.
    pub fn read_bytes(&mut self, len: u64) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        let read = (&mut self.inner).take(len).read_to_end(&mut bytes);
        let got = read.map_err(|e| self.fail(e))?;
        if (got as u64) < len {
            return Err(GgufError::TruncatedInput {
                position: self.position,
            });
        }
        self.position += len;
        Ok(bytes)
    }

    /// Read a length-prefixed UTF-8 string (`u64` length, no terminator).
    ///
    /// Fails with `StringTooLarge` when the declared length exceeds `max_len`.
    pub fn read_string(&mut self, max_len: u64) -> Result<String> {
        let len = self.read_u64()?;
        if len > max_len {
            return Err(GgufError::StringTooLarge {
                size: len,
                max: max_len,
            });
        }
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes).map_err(|_| GgufError::InvalidUtf8)
    }
}

/// Append-only writer of GGUF primitives.
#[derive(Debug)]
pub struct ByteWriter<W> {
    inner: W,
    position: u64,
}

impl<W: Write> ByteWriter<W> {
    /// Wrap a byte sink. Positions are counted from zero.
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Bytes written so far.
    pub fn position(&self) -> u64 {
        self.position
    }

    /// Give back the wrapped sink.
    pub fn into_inner(self) -> W {
        self.inner
    }

    fn advance(&mut self, width: u64, written: io::Result<()>) -> Result<()> {
        written?;
        self.position += width;
        Ok(())
    }

    /// Write an unsigned byte.
    pub fn write_u8(&mut self, v: u8) -> Result<()> {
        let r = self.inner.write_u8(v);
        self.advance(1, r)
    }

    /// Write a signed byte.
    pub fn write_i8(&mut self, v: i8) -> Result<()> {
        let r = self.inner.write_i8(v);
        self.advance(1, r)
    }

    /// Write a little-endian `u16`.
    pub fn write_u16(&mut self, v: u16) -> Result<()> {
        let r = self.inner.write_u16::<LittleEndian>(v);
        self.advance(2, r)
    }

    /// Write a little-endian `i16`.
    pub fn write_i16(&mut self, v: i16) -> Result<()> {
        let r = self.inner.write_i16::<LittleEndian>(v);
        self.advance(2, r)
    }

    /// Write a little-endian `u32`.
    pub fn write_u32(&mut self, v: u32) -> Result<()> {
        let r = self.inner.write_u32::<LittleEndian>(v);
        self.advance(4, r)
    }

    /// Write a little-endian `i32`.
    pub fn write_i32(&mut self, v: i32) -> Result<()> {
        let r = self.inner.write_i32::<LittleEndian>(v);
        self.advance(4, r)
    }

    /// Write a little-endian `u64`.
    pub fn write_u64(&mut self, v: u64) -> Result<()> {
        let r = self.inner.write_u64::<LittleEndian>(v);
        self.advance(8, r)
    }

    /// Write a little-endian `i64`.
    pub fn write_i64(&mut self, v: i64) -> Result<()> {
        let r = self.inner.write_i64::<LittleEndian>(v);
        self.advance(8, r)
    }

    /// Write a little-endian `f32`.
    pub fn write_f32(&mut self, v: f32) -> Result<()> {
        let r = self.inner.write_f32::<LittleEndian>(v);
        self.advance(4, r)
    }

    /// Write a little-endian `f64`.
    pub fn write_f64(&mut self, v: f64) -> Result<()> {
        let r = self.inner.write_f64::<LittleEndian>(v);
        self.advance(8, r)
    }

    /// Write a boolean as a single `0`/`1` byte.
    pub fn write_bool(&mut self, v: bool) -> Result<()> {
        self.write_u8(u8::from(v))
    }

    /// Write raw bytes.
    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        let len = u64::try_from(bytes.len())
            .map_err(|_| GgufError::IntegerOverflow("byte count"))?;
        let r = self.inner.write_all(bytes);
        self.advance(len, r)
    }

    /// Write a length-prefixed UTF-8 string (`u64` length, no terminator).
    pub fn write_string(&mut self, s: &str) -> Result<()> {
        let len =
            u64::try_from(s.len()).map_err(|_| GgufError::IntegerOverflow("string length"))?;
        self.write_u64(len)?;
        self.write_bytes(s.as_bytes())
    }

    /// Write zero bytes up to the next multiple of `alignment`.
    ///
    /// Returns the number of padding bytes written.
    pub fn pad_to_alignment(&mut self, alignment: u64) -> Result<u64> {
        let padding = padding_for(self.position, alignment);
        let zeros = [0u8; 64];
        let mut remaining = padding;
        while remaining > 0 {
            let chunk = remaining.min(zeros.len() as u64) as usize;
            self.write_bytes(&zeros[..chunk])?;
            remaining -= chunk as u64;
        }
        Ok(padding)
    }

    /// Flush the wrapped sink.
    pub fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alignment() {
        assert_eq!(align_offset(0, 32), 0);
        assert_eq!(align_offset(1, 32), 32);
        assert_eq!(align_offset(32, 32), 32);
        assert_eq!(align_offset(33, 32), 64);
        assert_eq!(align_offset(7, 1), 7);
        assert_eq!(padding_for(33, 32), 31);
        assert_eq!(checked_align_offset(u64::MAX, 32), None);
        assert_eq!(checked_align_offset(u64::MAX - 31, 32), Some(u64::MAX - 31));
    }

    #[test]
    fn test_primitives_are_little_endian() {
        let mut w = ByteWriter::new(Vec::new());
        w.write_u32(0x0102_0304).unwrap();
        w.write_i16(-2).unwrap();
        w.write_bool(true).unwrap();
        w.write_f32(1.5).unwrap();
        assert_eq!(w.position(), 11);

        let bytes = w.into_inner();
        assert_eq!(&bytes[0..4], &[0x04, 0x03, 0x02, 0x01]);
        assert_eq!(&bytes[4..6], &[0xFE, 0xFF]);
        assert_eq!(bytes[6], 1);

        let mut r = ByteReader::new(bytes.as_slice());
        assert_eq!(r.read_u32().unwrap(), 0x0102_0304);
        assert_eq!(r.read_i16().unwrap(), -2);
        assert!(r.read_bool().unwrap());
        assert_eq!(r.read_f32().unwrap(), 1.5);
        assert_eq!(r.position(), 11);
    }

    #[test]
    fn test_string_layout() {
        let mut w = ByteWriter::new(Vec::new());
        w.write_string("hi").unwrap();
        w.write_string("").unwrap();
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 8 + 2 + 8);
        assert_eq!(&bytes[0..8], &2u64.to_le_bytes());
        assert_eq!(&bytes[8..10], b"hi");

        let mut r = ByteReader::new(bytes.as_slice());
        assert_eq!(r.read_string(1024).unwrap(), "hi");
        assert_eq!(r.read_string(1024).unwrap(), "");
        assert_eq!(r.position(), 18);
    }

    #[test]
    fn test_trailing_nul_is_kept() {
        let mut w = ByteWriter::new(Vec::new());
        w.write_string("a\0").unwrap();
        let bytes = w.into_inner();
        let mut r = ByteReader::new(bytes.as_slice());
        assert_eq!(r.read_string(16).unwrap(), "a\0");
    }

    #[test]
    fn test_truncated_input() {
        let bytes = [1u8, 2, 3];
        let mut r = ByteReader::new(&bytes[..]);
        assert!(matches!(
            r.read_u32(),
            Err(GgufError::TruncatedInput { position: 0 })
        ));

        let mut w = ByteWriter::new(Vec::new());
        w.write_u64(1_000_000).unwrap();
        w.write_bytes(b"short").unwrap();
        let bytes = w.into_inner();
        let mut r = ByteReader::new(bytes.as_slice());
        assert!(matches!(
            r.read_string(u64::MAX),
            Err(GgufError::TruncatedInput { position: 8 })
        ));
    }

    #[test]
    fn test_string_limit() {
        let mut w = ByteWriter::new(Vec::new());
        w.write_string("hello").unwrap();
        let bytes = w.into_inner();
        let mut r = ByteReader::new(bytes.as_slice());
        assert!(matches!(
            r.read_string(4),
            Err(GgufError::StringTooLarge { size: 5, max: 4 })
        ));
    }

    #[test]
    fn test_invalid_utf8() {
        let mut w = ByteWriter::new(Vec::new());
        w.write_u64(2).unwrap();
        w.write_bytes(&[0xC3, 0x28]).unwrap();
        let bytes = w.into_inner();
        let mut r = ByteReader::new(bytes.as_slice());
        assert!(matches!(r.read_string(16), Err(GgufError::InvalidUtf8)));
    }

    #[test]
    fn test_pad_to_alignment() {
        let mut w = ByteWriter::new(Vec::new());
        w.write_bytes(&[0xAA; 5]).unwrap();
        assert_eq!(w.pad_to_alignment(32).unwrap(), 27);
        assert_eq!(w.pad_to_alignment(32).unwrap(), 0);
        w.write_u8(1).unwrap();
        assert_eq!(w.pad_to_alignment(128).unwrap(), 95);
        let bytes = w.into_inner();
        assert_eq!(bytes.len(), 128);
        assert!(bytes[5..32].iter().all(|&b| b == 0));
    }
}
