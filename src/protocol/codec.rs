//! Wire encoding and decoding primitives.
//!
//! PostgreSQL sends all integers in big-endian (network byte order).
//! Decoders take a payload slice and return the value plus the remaining
//! bytes, so message parsers thread the slice through a chain of reads.

use zerocopy::byteorder::big_endian::{I16 as I16BE, I32 as I32BE, U32 as U32BE};
use zerocopy::FromBytes;

use crate::error::{Error, Result};

/// Read a 2-byte big-endian signed integer.
#[inline]
pub fn read_i16(data: &[u8]) -> Result<(i16, &[u8])> {
    let (value, rest) = I16BE::read_from_prefix(data)
        .map_err(|_| Error::Protocol(format!("read_i16: need 2 bytes, have {}", data.len())))?;
    Ok((value.get(), rest))
}

/// Read a 4-byte big-endian signed integer.
#[inline]
pub fn read_i32(data: &[u8]) -> Result<(i32, &[u8])> {
    let (value, rest) = I32BE::read_from_prefix(data)
        .map_err(|_| Error::Protocol(format!("read_i32: need 4 bytes, have {}", data.len())))?;
    Ok((value.get(), rest))
}

/// Read a 4-byte big-endian unsigned integer.
#[inline]
pub fn read_u32(data: &[u8]) -> Result<(u32, &[u8])> {
    let (value, rest) = U32BE::read_from_prefix(data)
        .map_err(|_| Error::Protocol(format!("read_u32: need 4 bytes, have {}", data.len())))?;
    Ok((value.get(), rest))
}

/// Read a null-terminated UTF-8 string (the protocol `String` type).
#[inline]
pub fn read_cstr(data: &[u8]) -> Result<(&str, &[u8])> {
    let pos = memchr::memchr(0, data)
        .ok_or_else(|| Error::Protocol("read_cstr: missing null terminator".into()))?;
    let s = std::str::from_utf8(&data[..pos])
        .map_err(|e| Error::Protocol(format!("read_cstr: invalid UTF-8: {e}")))?;
    Ok((s, &data[pos + 1..]))
}

/// Read a length-prefixed byte slice where a length of -1 means NULL.
#[inline]
pub fn read_nullable_bytes(data: &[u8]) -> Result<(Option<&[u8]>, &[u8])> {
    let (len, rest) = read_i32(data)?;
    if len == -1 {
        return Ok((None, rest));
    }
    let len = usize::try_from(len)
        .map_err(|_| Error::Protocol(format!("read_nullable_bytes: negative length {len}")))?;
    if rest.len() < len {
        return Err(Error::Protocol(format!(
            "read_nullable_bytes: need {len} bytes, have {}",
            rest.len()
        )));
    }
    Ok((Some(&rest[..len]), &rest[len..]))
}

/// Write a 2-byte big-endian signed integer.
#[inline]
pub fn write_i16(out: &mut Vec<u8>, value: i16) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write a 4-byte big-endian signed integer.
#[inline]
pub fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_be_bytes());
}

/// Write a null-terminated string.
#[inline]
pub fn write_cstr(out: &mut Vec<u8>, s: &str) {
    out.extend_from_slice(s.as_bytes());
    out.push(0);
}

/// Write a length-prefixed byte slice; `None` encodes as length -1.
#[inline]
pub fn write_nullable_bytes(out: &mut Vec<u8>, value: Option<&[u8]>) {
    match value {
        Some(bytes) => {
            write_i32(out, bytes.len() as i32);
            out.extend_from_slice(bytes);
        }
        None => write_i32(out, -1),
    }
}

/// Builder for a single frontend message, handling the length field.
///
/// Message shape: a 1-byte tag (absent for startup-family messages),
/// then a 4-byte big-endian length that counts itself but not the tag,
/// then the payload. `finish` back-patches the length.
pub struct MessageBuilder<'a> {
    buf: &'a mut Vec<u8>,
    len_at: usize,
}

impl<'a> MessageBuilder<'a> {
    /// Begin a tagged message.
    pub fn tagged(buf: &'a mut Vec<u8>, tag: u8) -> Self {
        buf.push(tag);
        Self::untagged(buf)
    }

    /// Begin a startup-family message, which carries no tag byte.
    pub fn untagged(buf: &'a mut Vec<u8>) -> Self {
        let len_at = buf.len();
        buf.extend_from_slice(&[0; 4]);
        Self { buf, len_at }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        write_i16(self.buf, value);
    }

    pub fn write_i32(&mut self, value: i32) {
        write_i32(self.buf, value);
    }

    pub fn write_bytes(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn write_cstr(&mut self, s: &str) {
        write_cstr(self.buf, s);
    }

    pub fn write_nullable_bytes(&mut self, value: Option<&[u8]>) {
        write_nullable_bytes(self.buf, value);
    }

    /// Fill in the length field and finish the message.
    pub fn finish(self) {
        let len = (self.buf.len() - self.len_at) as i32;
        self.buf[self.len_at..self.len_at + 4].copy_from_slice(&len.to_be_bytes());
    }
}
