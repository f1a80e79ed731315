use crate::error::{GridError, GridResult};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;

/// Length marker written in place of an absent string or data blob.
const NULL_LENGTH: i32 = -1;

/// An opaque, already-serialized key or value.
///
/// Containers store and compare `Data` byte-wise; they never look inside it. Typed proxies
/// convert to and from user types with `serde_json`.
#[derive(Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Data(pub Bytes);

impl Data {
    pub fn from_json<T: Serialize>(value: &T) -> GridResult<Self> {
        serde_json::to_vec(value)
            .map(|bytes| Data(Bytes::from(bytes)))
            .map_err(|e| GridError::Serialization(e.to_string()))
    }

    pub fn to_json<T: DeserializeOwned>(&self) -> GridResult<T> {
        serde_json::from_slice(&self.0).map_err(|e| GridError::Serialization(e.to_string()))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data(Bytes::copy_from_slice(value.as_bytes()))
    }
}

impl From<Vec<u8>> for Data {
    fn from(value: Vec<u8>) -> Self {
        Data(Bytes::from(value))
    }
}

impl fmt::Debug for Data {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match std::str::from_utf8(&self.0) {
            Ok(text) if text.len() <= 64 => write!(f, "Data({:?})", text),
            _ => write!(f, "Data({} bytes)", self.0.len()),
        }
    }
}

/// Growable big-endian output buffer.
#[derive(Default)]
pub struct ObjectDataOutput {
    buf: BytesMut,
}

impl ObjectDataOutput {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(64),
        }
    }

    pub fn write_u8(&mut self, value: u8) {
        self.buf.put_u8(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buf.put_u8(value as u8);
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buf.put_i32(value);
    }

    pub fn write_u32(&mut self, value: u32) {
        self.buf.put_u32(value);
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buf.put_i64(value);
    }

    pub fn write_u64(&mut self, value: u64) {
        self.buf.put_u64(value);
    }

    pub fn write_string(&mut self, value: &str) {
        self.buf.put_i32(value.len() as i32);
        self.buf.put_slice(value.as_bytes());
    }

    pub fn write_opt_string(&mut self, value: Option<&str>) {
        match value {
            Some(value) => self.write_string(value),
            None => self.buf.put_i32(NULL_LENGTH),
        }
    }

    pub fn write_data(&mut self, value: &Data) {
        self.buf.put_i32(value.0.len() as i32);
        self.buf.put_slice(&value.0);
    }

    pub fn write_opt_data(&mut self, value: Option<&Data>) {
        match value {
            Some(value) => self.write_data(value),
            None => self.buf.put_i32(NULL_LENGTH),
        }
    }

    /// An error as `(code, message)`; the receiver rebuilds it with `GridError::from_wire`.
    pub fn write_error(&mut self, error: &GridError) {
        self.write_i32(error.code());
        self.write_string(&error.wire_message());
    }

    /// Raw bytes with no length prefix (used for nested, already framed payloads).
    pub fn write_raw(&mut self, value: &[u8]) {
        self.buf.put_slice(value);
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over a received buffer. Every read checks the remaining length so a truncated or
/// mis-ordered field stream surfaces as `GridError::Serialization` rather than a panic.
pub struct ObjectDataInput {
    buf: Bytes,
}

impl ObjectDataInput {
    pub fn new(buf: Bytes) -> Self {
        Self { buf }
    }

    fn ensure(&self, needed: usize, what: &str) -> GridResult<()> {
        if self.buf.remaining() < needed {
            return Err(GridError::Serialization(format!(
                "unexpected end of stream reading {} (need {}, have {})",
                what,
                needed,
                self.buf.remaining()
            )));
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> GridResult<u8> {
        self.ensure(1, "u8")?;
        Ok(self.buf.get_u8())
    }

    pub fn read_bool(&mut self) -> GridResult<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(GridError::Serialization(format!(
                "invalid boolean byte {}",
                other
            ))),
        }
    }

    pub fn read_i32(&mut self) -> GridResult<i32> {
        self.ensure(4, "i32")?;
        Ok(self.buf.get_i32())
    }

    pub fn read_u32(&mut self) -> GridResult<u32> {
        self.ensure(4, "u32")?;
        Ok(self.buf.get_u32())
    }

    pub fn read_i64(&mut self) -> GridResult<i64> {
        self.ensure(8, "i64")?;
        Ok(self.buf.get_i64())
    }

    pub fn read_u64(&mut self) -> GridResult<u64> {
        self.ensure(8, "u64")?;
        Ok(self.buf.get_u64())
    }

    fn read_len(&mut self) -> GridResult<Option<usize>> {
        let len = self.read_i32()?;
        if len == NULL_LENGTH {
            return Ok(None);
        }
        if len < 0 {
            return Err(GridError::Serialization(format!("negative length {}", len)));
        }
        let len = len as usize;
        self.ensure(len, "length-prefixed field")?;
        Ok(Some(len))
    }

    pub fn read_opt_string(&mut self) -> GridResult<Option<String>> {
        match self.read_len()? {
            Some(len) => {
                let raw = self.buf.split_to(len);
                String::from_utf8(raw.to_vec())
                    .map(Some)
                    .map_err(|e| GridError::Serialization(e.to_string()))
            }
            None => Ok(None),
        }
    }

    pub fn read_string(&mut self) -> GridResult<String> {
        self.read_opt_string()?
            .ok_or_else(|| GridError::Serialization("unexpected null string".to_string()))
    }

    pub fn read_opt_data(&mut self) -> GridResult<Option<Data>> {
        Ok(self.read_len()?.map(|len| Data(self.buf.split_to(len))))
    }

    pub fn read_data(&mut self) -> GridResult<Data> {
        self.read_opt_data()?
            .ok_or_else(|| GridError::Serialization("unexpected null data".to_string()))
    }

    pub fn read_error(&mut self) -> GridResult<GridError> {
        let code = self.read_i32()?;
        let message = self.read_string()?;
        Ok(GridError::from_wire(code, message))
    }

    pub fn remaining(&self) -> usize {
        self.buf.remaining()
    }
}
