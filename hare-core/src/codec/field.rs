//! AMQP field primitives: short/long strings, typed field values and
//! field tables.
//!
//! All integers are big-endian (network order). Decoders never panic on a
//! short buffer: every read is preceded by a length check that reports
//! [`HareError::Truncated`].

use std::borrow::Borrow;
use std::collections::BTreeMap;
use std::fmt;

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::HareError;

/// Fail with `Truncated` unless `src` holds at least `needed` bytes.
pub(crate) fn ensure(src: &impl Buf, needed: usize, context: &'static str) -> Result<(), HareError> {
    if src.remaining() < needed {
        return Err(HareError::Truncated {
            context,
            needed,
            remaining: src.remaining(),
        });
    }
    Ok(())
}

/// Write a length-prefixed (u8) short string.
pub fn put_short_str(dst: &mut impl BufMut, value: &str) -> Result<(), HareError> {
    let len = u8::try_from(value.len()).map_err(|_| HareError::ShortStringTooLong(value.len()))?;
    dst.put_u8(len);
    dst.put_slice(value.as_bytes());
    Ok(())
}

/// Read a length-prefixed (u8) short string.
pub fn get_short_str(src: &mut impl Buf) -> Result<String, HareError> {
    ensure(src, 1, "short string length")?;
    let len = src.get_u8() as usize;
    ensure(src, len, "short string")?;
    let raw = src.copy_to_bytes(len);
    Ok(String::from_utf8(raw.to_vec())?)
}

/// Write a length-prefixed (u32) long string.
pub fn put_long_bytes(dst: &mut impl BufMut, value: &[u8]) -> Result<(), HareError> {
    let len = u32::try_from(value.len()).map_err(|_| HareError::LongValueTooLong(value.len()))?;
    dst.put_u32(len);
    dst.put_slice(value);
    Ok(())
}

/// Read a length-prefixed (u32) long string as raw bytes.
pub fn get_long_bytes(src: &mut impl Buf) -> Result<Bytes, HareError> {
    ensure(src, 4, "long string length")?;
    let len = src.get_u32() as usize;
    ensure(src, len, "long string")?;
    Ok(src.copy_to_bytes(len))
}

// ── ShortString ──────────────────────────────────────────────────

/// A UTF-8 string guaranteed to fit a short-string length prefix.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ShortString(String);

impl ShortString {
    pub const MAX_LEN: usize = u8::MAX as usize;

    pub fn new(value: impl Into<String>) -> Result<Self, HareError> {
        let value = value.into();
        if value.len() > Self::MAX_LEN {
            return Err(HareError::ShortStringTooLong(value.len()));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_u8(self.0.len() as u8);
        dst.put_slice(self.0.as_bytes());
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self, HareError> {
        get_short_str(src).map(Self)
    }
}

impl TryFrom<&str> for ShortString {
    type Error = HareError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<String> for ShortString {
    type Error = HareError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl Borrow<str> for ShortString {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl AsRef<str> for ShortString {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShortString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ── FieldValue ───────────────────────────────────────────────────

/// A typed value inside a field table or field array.
///
/// Type tags follow the RabbitMQ dialect of the 0-9-1 errata.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Boolean(bool),
    ShortShortInt(i8),
    ShortShortUInt(u8),
    ShortInt(i16),
    ShortUInt(u16),
    LongInt(i32),
    LongUInt(u32),
    LongLongInt(i64),
    Float(f32),
    Double(f64),
    Decimal { scale: u8, value: u32 },
    LongString(String),
    FieldArray(Vec<FieldValue>),
    Timestamp(u64),
    FieldTable(FieldTable),
    ByteArray(Bytes),
    Void,
}

impl FieldValue {
    /// The one-byte type tag written before the value.
    pub fn tag(&self) -> u8 {
        match self {
            FieldValue::Boolean(_) => b't',
            FieldValue::ShortShortInt(_) => b'b',
            FieldValue::ShortShortUInt(_) => b'B',
            FieldValue::ShortInt(_) => b's',
            FieldValue::ShortUInt(_) => b'u',
            FieldValue::LongInt(_) => b'I',
            FieldValue::LongUInt(_) => b'i',
            FieldValue::LongLongInt(_) => b'l',
            FieldValue::Float(_) => b'f',
            FieldValue::Double(_) => b'd',
            FieldValue::Decimal { .. } => b'D',
            FieldValue::LongString(_) => b'S',
            FieldValue::FieldArray(_) => b'A',
            FieldValue::Timestamp(_) => b'T',
            FieldValue::FieldTable(_) => b'F',
            FieldValue::ByteArray(_) => b'x',
            FieldValue::Void => b'V',
        }
    }

    /// Write the type tag followed by the value.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), HareError> {
        dst.put_u8(self.tag());
        match self {
            FieldValue::Boolean(v) => dst.put_u8(u8::from(*v)),
            FieldValue::ShortShortInt(v) => dst.put_i8(*v),
            FieldValue::ShortShortUInt(v) => dst.put_u8(*v),
            FieldValue::ShortInt(v) => dst.put_i16(*v),
            FieldValue::ShortUInt(v) => dst.put_u16(*v),
            FieldValue::LongInt(v) => dst.put_i32(*v),
            FieldValue::LongUInt(v) => dst.put_u32(*v),
            FieldValue::LongLongInt(v) => dst.put_i64(*v),
            FieldValue::Float(v) => dst.put_f32(*v),
            FieldValue::Double(v) => dst.put_f64(*v),
            FieldValue::Decimal { scale, value } => {
                dst.put_u8(*scale);
                dst.put_u32(*value);
            }
            FieldValue::LongString(v) => put_long_bytes(dst, v.as_bytes())?,
            FieldValue::FieldArray(values) => {
                let mut body = BytesMut::new();
                for value in values {
                    value.encode(&mut body)?;
                }
                put_long_bytes(dst, &body)?;
            }
            FieldValue::Timestamp(v) => dst.put_u64(*v),
            FieldValue::FieldTable(table) => table.encode(dst)?,
            FieldValue::ByteArray(v) => put_long_bytes(dst, v)?,
            FieldValue::Void => {}
        }
        Ok(())
    }

    /// Read a type tag and the value that follows it.
    pub fn decode(src: &mut impl Buf) -> Result<Self, HareError> {
        ensure(src, 1, "field type tag")?;
        let tag = src.get_u8();
        let value = match tag {
            b't' => {
                ensure(src, 1, "boolean")?;
                FieldValue::Boolean(src.get_u8() != 0)
            }
            b'b' => {
                ensure(src, 1, "short-short-int")?;
                FieldValue::ShortShortInt(src.get_i8())
            }
            b'B' => {
                ensure(src, 1, "short-short-uint")?;
                FieldValue::ShortShortUInt(src.get_u8())
            }
            b's' => {
                ensure(src, 2, "short-int")?;
                FieldValue::ShortInt(src.get_i16())
            }
            b'u' => {
                ensure(src, 2, "short-uint")?;
                FieldValue::ShortUInt(src.get_u16())
            }
            b'I' => {
                ensure(src, 4, "long-int")?;
                FieldValue::LongInt(src.get_i32())
            }
            b'i' => {
                ensure(src, 4, "long-uint")?;
                FieldValue::LongUInt(src.get_u32())
            }
            b'l' => {
                ensure(src, 8, "long-long-int")?;
                FieldValue::LongLongInt(src.get_i64())
            }
            b'f' => {
                ensure(src, 4, "float")?;
                FieldValue::Float(src.get_f32())
            }
            b'd' => {
                ensure(src, 8, "double")?;
                FieldValue::Double(src.get_f64())
            }
            b'D' => {
                ensure(src, 5, "decimal")?;
                FieldValue::Decimal {
                    scale: src.get_u8(),
                    value: src.get_u32(),
                }
            }
            b'S' => {
                let raw = get_long_bytes(src)?;
                FieldValue::LongString(String::from_utf8(raw.to_vec())?)
            }
            b'A' => {
                let mut body = get_long_bytes(src)?;
                let mut values = Vec::new();
                while body.has_remaining() {
                    values.push(FieldValue::decode(&mut body)?);
                }
                FieldValue::FieldArray(values)
            }
            b'T' => {
                ensure(src, 8, "timestamp")?;
                FieldValue::Timestamp(src.get_u64())
            }
            b'F' => FieldValue::FieldTable(FieldTable::decode(src)?),
            b'x' => FieldValue::ByteArray(get_long_bytes(src)?),
            b'V' => FieldValue::Void,
            other => {
                return Err(HareError::UnknownVariant {
                    type_name: "FieldValue",
                    value: other as u64,
                });
            }
        };
        Ok(value)
    }
}

impl From<bool> for FieldValue {
    fn from(v: bool) -> Self {
        FieldValue::Boolean(v)
    }
}

impl From<i32> for FieldValue {
    fn from(v: i32) -> Self {
        FieldValue::LongInt(v)
    }
}

impl From<i64> for FieldValue {
    fn from(v: i64) -> Self {
        FieldValue::LongLongInt(v)
    }
}

impl From<f64> for FieldValue {
    fn from(v: f64) -> Self {
        FieldValue::Double(v)
    }
}

impl From<&str> for FieldValue {
    fn from(v: &str) -> Self {
        FieldValue::LongString(v.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(v: String) -> Self {
        FieldValue::LongString(v)
    }
}

impl From<FieldTable> for FieldValue {
    fn from(v: FieldTable) -> Self {
        FieldValue::FieldTable(v)
    }
}

// ── FieldTable ───────────────────────────────────────────────────

/// An ordered mapping of short-string keys to typed values.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FieldTable(BTreeMap<ShortString, FieldValue>);

impl FieldTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, replacing any previous value under `key`.
    pub fn insert(&mut self, key: ShortString, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.0.insert(key, value.into())
    }

    /// Builder-style insert for string keys.
    pub fn with(mut self, key: &str, value: impl Into<FieldValue>) -> Result<Self, HareError> {
        self.insert(ShortString::new(key)?, value);
        Ok(self)
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.0.get(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ShortString, &FieldValue)> {
        self.0.iter()
    }

    /// Write the u32 byte length followed by each `name, value` pair.
    pub fn encode(&self, dst: &mut BytesMut) -> Result<(), HareError> {
        let mut body = BytesMut::new();
        for (key, value) in &self.0 {
            key.encode(&mut body);
            value.encode(&mut body)?;
        }
        put_long_bytes(dst, &body)
    }

    pub fn decode(src: &mut impl Buf) -> Result<Self, HareError> {
        let mut body = get_long_bytes(src)?;
        let mut table = BTreeMap::new();
        while body.has_remaining() {
            let key = ShortString::decode(&mut body)?;
            let value = FieldValue::decode(&mut body)?;
            table.insert(key, value);
        }
        Ok(Self(table))
    }
}

impl FromIterator<(ShortString, FieldValue)> for FieldTable {
    fn from_iter<I: IntoIterator<Item = (ShortString, FieldValue)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

// ── Tests ────────────────────────────────────────────────────────
