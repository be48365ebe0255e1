//! Field level encoding shared by every event.
//!
//! Strings and byte arrays carry their own length prefix. Some fields use a
//! one byte prefix and others a four byte one; the width is chosen per field by
//! the event that writes it and must not be unified.
use thiserror::Error;

use crate::protocol::EventType;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("empty payload")]
    Empty,
    #[error("unknown event tag {0}")]
    UnknownTag(u8),
    #[error("truncated payload: {field} needs {needed} bytes at offset {offset}, {available} left")]
    Truncated {
        field: &'static str,
        offset: usize,
        needed: usize,
        available: usize,
    },
    #[error("negative length {length} for {field}")]
    NegativeLength { field: &'static str, length: i64 },
    #[error("{field} is not valid utf-8")]
    InvalidUtf8 { field: &'static str },
    #[error("ip address of {0} bytes")]
    InvalidIpLength(usize),
    #[error("{remaining} trailing bytes after {event_type}")]
    TrailingBytes {
        event_type: EventType,
        remaining: usize,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{field} is {len} bytes and does not fit a {width} byte length prefix")]
    FieldTooLong {
        field: &'static str,
        len: usize,
        width: u8,
    },
    #[error("{field} expects {expected} entries, got {actual}")]
    WrongEntryCount {
        field: &'static str,
        expected: usize,
        actual: usize,
    },
}

#[derive(Debug)]
pub struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    pub fn new(event_type: EventType) -> Self {
        Self {
            buf: vec![event_type.tag()],
        }
    }

    pub fn put_u8(&mut self, value: u8) -> &mut Self {
        self.buf.push(value);
        self
    }

    pub fn put_i32(&mut self, value: i32) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_i64(&mut self, value: i64) -> &mut Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn put_count(&mut self, field: &'static str, count: usize) -> Result<&mut Self, EncodeError> {
        let count = i32::try_from(count).map_err(|_| EncodeError::FieldTooLong {
            field,
            len: count,
            width: 4,
        })?;
        Ok(self.put_i32(count))
    }

    pub fn put_short_bytes(
        &mut self,
        field: &'static str,
        bytes: &[u8],
    ) -> Result<&mut Self, EncodeError> {
        let len = u8::try_from(bytes.len()).map_err(|_| EncodeError::FieldTooLong {
            field,
            len: bytes.len(),
            width: 1,
        })?;
        self.buf.push(len);
        self.buf.extend_from_slice(bytes);
        Ok(self)
    }

    pub fn put_short_str(&mut self, field: &'static str, value: &str) -> Result<&mut Self, EncodeError> {
        self.put_short_bytes(field, value.as_bytes())
    }

    pub fn put_long_bytes(
        &mut self,
        field: &'static str,
        bytes: &[u8],
    ) -> Result<&mut Self, EncodeError> {
        self.put_count(field, bytes.len())?;
        self.buf.extend_from_slice(bytes);
        Ok(self)
    }

    pub fn put_long_str(&mut self, field: &'static str, value: &str) -> Result<&mut Self, EncodeError> {
        self.put_long_bytes(field, value.as_bytes())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

pub struct ByteReader<'a> {
    buf: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, offset: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.offset
    }

    fn take(&mut self, field: &'static str, needed: usize) -> Result<&'a [u8], DecodeError> {
        if self.remaining() < needed {
            return Err(DecodeError::Truncated {
                field,
                offset: self.offset,
                needed,
                available: self.remaining(),
            });
        }
        let slice = &self.buf[self.offset..self.offset + needed];
        self.offset += needed;
        Ok(slice)
    }

    pub fn get_u8(&mut self, field: &'static str) -> Result<u8, DecodeError> {
        Ok(self.take(field, 1)?[0])
    }

    pub fn get_i32(&mut self, field: &'static str) -> Result<i32, DecodeError> {
        let mut raw = [0u8; 4];
        raw.copy_from_slice(self.take(field, 4)?);
        Ok(i32::from_be_bytes(raw))
    }

    pub fn get_i64(&mut self, field: &'static str) -> Result<i64, DecodeError> {
        let mut raw = [0u8; 8];
        raw.copy_from_slice(self.take(field, 8)?);
        Ok(i64::from_be_bytes(raw))
    }

    pub fn get_count(&mut self, field: &'static str) -> Result<usize, DecodeError> {
        let value = self.get_i32(field)?;
        usize::try_from(value).map_err(|_| DecodeError::NegativeLength {
            field,
            length: value as i64,
        })
    }

    pub fn get_short_bytes(&mut self, field: &'static str) -> Result<&'a [u8], DecodeError> {
        let len = self.get_u8(field)? as usize;
        self.take(field, len)
    }

    pub fn get_short_string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let raw = self.get_short_bytes(field)?;
        to_string(field, raw)
    }

    pub fn get_long_bytes(&mut self, field: &'static str) -> Result<&'a [u8], DecodeError> {
        let len = self.get_count(field)?;
        self.take(field, len)
    }

    pub fn get_long_string(&mut self, field: &'static str) -> Result<String, DecodeError> {
        let raw = self.get_long_bytes(field)?;
        to_string(field, raw)
    }

    pub fn finish(self, event_type: EventType) -> Result<(), DecodeError> {
        match self.remaining() {
            0 => Ok(()),
            remaining => Err(DecodeError::TrailingBytes {
                event_type,
                remaining,
            }),
        }
    }
}

fn to_string(field: &'static str, raw: &[u8]) -> Result<String, DecodeError> {
    String::from_utf8(raw.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { field })
}
