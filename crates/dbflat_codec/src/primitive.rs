//! Fixed-width scalar codec.
//!
//! Every scalar is written little-endian with its natural width. Reads are
//! the exact inverse, bit for bit, including negative integers, NaN
//! payloads and infinities.

use crate::error::{CodecError, CodecResult};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A scalar that has a fixed little-endian wire representation.
pub trait FixedWidth: Sized + Copy {
    /// Encoded size in bytes.
    const WIDTH: usize;

    /// Declared type of this scalar.
    const FIELD_TYPE: FieldType;

    /// Append the little-endian bytes of `self` to `out`.
    fn write_le(self, out: &mut Vec<u8>);

    /// Decode from the first `Self::WIDTH` bytes.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is shorter than `Self::WIDTH`; [`read_fixed`] checks first.
    fn from_le_slice(bytes: &[u8]) -> Self;
}

macro_rules! impl_fixed_width {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FixedWidth for $ty {
                const WIDTH: usize = std::mem::size_of::<$ty>();
                const FIELD_TYPE: FieldType = FieldType::$variant;

                #[inline]
                fn write_le(self, out: &mut Vec<u8>) {
                    out.extend_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; std::mem::size_of::<$ty>()];
                    raw.copy_from_slice(&bytes[..Self::WIDTH]);
                    <$ty>::from_le_bytes(raw)
                }
            }
        )*
    };
}

impl_fixed_width! {
    i8 => I8,
    u8 => U8,
    i16 => I16,
    u16 => U16,
    i32 => I32,
    u32 => U32,
    i64 => I64,
    u64 => U64,
    f32 => F32,
    f64 => F64,
}

impl FixedWidth for bool {
    const WIDTH: usize = 1;
    const FIELD_TYPE: FieldType = FieldType::Bool;

    #[inline]
    fn write_le(self, out: &mut Vec<u8>) {
        out.push(u8::from(self));
    }

    #[inline]
    fn from_le_slice(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }
}

/// Append the little-endian encoding of `value` to `out`.
pub fn write_fixed_into<T: FixedWidth>(value: T, out: &mut Vec<u8>) {
    value.write_le(out);
}

/// Encode `value` into a fresh buffer.
pub fn write_fixed<T: FixedWidth>(value: T) -> Vec<u8> {
    let mut out = Vec::with_capacity(T::WIDTH);
    value.write_le(&mut out);
    out
}

/// Decode a `T` from the first `T::WIDTH` bytes of `bytes`.
///
/// # Errors
///
/// Returns [`CodecError::UnexpectedEof`] if `bytes` is shorter than the type.
pub fn read_fixed<T: FixedWidth>(bytes: &[u8]) -> CodecResult<T> {
    if bytes.len() < T::WIDTH {
        return Err(CodecError::UnexpectedEof {
            needed: T::WIDTH,
            available: bytes.len(),
        });
    }
    Ok(T::from_le_slice(bytes))
}

/// Declared type of a field value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldType {
    /// One byte, zero is false.
    Bool,
    /// Signed 8-bit integer.
    I8,
    /// Unsigned 8-bit integer.
    U8,
    /// Signed 16-bit integer.
    I16,
    /// Unsigned 16-bit integer.
    U16,
    /// Signed 32-bit integer.
    I32,
    /// Unsigned 32-bit integer.
    U32,
    /// Signed 64-bit integer.
    I64,
    /// Unsigned 64-bit integer.
    U64,
    /// IEEE 754 single precision.
    F32,
    /// IEEE 754 double precision.
    F64,
    /// UTF-8 text, variable length.
    String,
    /// Opaque bytes, variable length.
    Bytes,
}

impl FieldType {
    /// Byte width for fixed-width types, `None` for variable-length ones.
    #[must_use]
    pub const fn fixed_width(self) -> Option<usize> {
        match self {
            Self::Bool | Self::I8 | Self::U8 => Some(1),
            Self::I16 | Self::U16 => Some(2),
            Self::I32 | Self::U32 | Self::F32 => Some(4),
            Self::I64 | Self::U64 | Self::F64 => Some(8),
            Self::String | Self::Bytes => None,
        }
    }

    /// Whether values of this type are length-prefixed on the wire.
    #[must_use]
    pub const fn is_variable(self) -> bool {
        self.fixed_width().is_none()
    }

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::U16 => "u16",
            Self::I32 => "i32",
            Self::U32 => "u32",
            Self::I64 => "i64",
            Self::U64 => "u64",
            Self::F32 => "f32",
            Self::F64 => "f64",
            Self::String => "string",
            Self::Bytes => "bytes",
        }
    }

    /// Parse a type name.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnsupportedFieldType`] for names with no wire form.
    pub fn from_name(name: &str) -> CodecResult<Self> {
        Ok(match name {
            "bool" => Self::Bool,
            "i8" => Self::I8,
            "u8" => Self::U8,
            "i16" => Self::I16,
            "u16" => Self::U16,
            "i32" => Self::I32,
            "u32" => Self::U32,
            "i64" => Self::I64,
            "u64" => Self::U64,
            "f32" => Self::F32,
            "f64" => Self::F64,
            "string" => Self::String,
            "bytes" => Self::Bytes,
            other => return Err(CodecError::unsupported_type(other)),
        })
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A typed field value, as produced by a record adapter.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Boolean.
    Bool(bool),
    /// Signed 8-bit integer.
    I8(i8),
    /// Unsigned 8-bit integer.
    U8(u8),
    /// Signed 16-bit integer.
    I16(i16),
    /// Unsigned 16-bit integer.
    U16(u16),
    /// Signed 32-bit integer.
    I32(i32),
    /// Unsigned 32-bit integer.
    U32(u32),
    /// Signed 64-bit integer.
    I64(i64),
    /// Unsigned 64-bit integer.
    U64(u64),
    /// Single precision float.
    F32(f32),
    /// Double precision float.
    F64(f64),
    /// UTF-8 text.
    String(String),
    /// Raw bytes.
    Bytes(Vec<u8>),
}

impl Value {
    /// Declared type of this value.
    #[must_use]
    pub fn field_type(&self) -> FieldType {
        match self {
            Self::Bool(_) => FieldType::Bool,
            Self::I8(_) => FieldType::I8,
            Self::U8(_) => FieldType::U8,
            Self::I16(_) => FieldType::I16,
            Self::U16(_) => FieldType::U16,
            Self::I32(_) => FieldType::I32,
            Self::U32(_) => FieldType::U32,
            Self::I64(_) => FieldType::I64,
            Self::U64(_) => FieldType::U64,
            Self::F32(_) => FieldType::F32,
            Self::F64(_) => FieldType::F64,
            Self::String(_) => FieldType::String,
            Self::Bytes(_) => FieldType::Bytes,
        }
    }

    /// Append the payload bytes of this value to `out`.
    ///
    /// Scalars contribute their raw little-endian bytes; text and bytes are
    /// copied verbatim (the record encoder adds the length prefix).
    pub fn write_payload(&self, out: &mut Vec<u8>) {
        match self {
            Self::Bool(v) => v.write_le(out),
            Self::I8(v) => v.write_le(out),
            Self::U8(v) => v.write_le(out),
            Self::I16(v) => v.write_le(out),
            Self::U16(v) => v.write_le(out),
            Self::I32(v) => v.write_le(out),
            Self::U32(v) => v.write_le(out),
            Self::I64(v) => v.write_le(out),
            Self::U64(v) => v.write_le(out),
            Self::F32(v) => v.write_le(out),
            Self::F64(v) => v.write_le(out),
            Self::String(s) => out.extend_from_slice(s.as_bytes()),
            Self::Bytes(b) => out.extend_from_slice(b),
        }
    }

    /// Payload bytes of this value in a fresh buffer.
    #[must_use]
    pub fn to_payload(&self) -> Vec<u8> {
        let mut out = Vec::new();
        self.write_payload(&mut out);
        out
    }

    /// Decode a payload of the given declared type.
    ///
    /// Fixed-width payloads must be exactly the type's width.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::UnexpectedEof`] on a short payload,
    /// [`CodecError::SizeMismatch`] on a long one and
    /// [`CodecError::UnsupportedFieldType`] for text that is not UTF-8.
    pub fn read(field_type: FieldType, bytes: &[u8]) -> CodecResult<Self> {
        if let Some(width) = field_type.fixed_width() {
            if bytes.len() > width {
                return Err(CodecError::SizeMismatch {
                    expected: width,
                    actual: bytes.len(),
                });
            }
        }
        Ok(match field_type {
            FieldType::Bool => Self::Bool(read_fixed(bytes)?),
            FieldType::I8 => Self::I8(read_fixed(bytes)?),
            FieldType::U8 => Self::U8(read_fixed(bytes)?),
            FieldType::I16 => Self::I16(read_fixed(bytes)?),
            FieldType::U16 => Self::U16(read_fixed(bytes)?),
            FieldType::I32 => Self::I32(read_fixed(bytes)?),
            FieldType::U32 => Self::U32(read_fixed(bytes)?),
            FieldType::I64 => Self::I64(read_fixed(bytes)?),
            FieldType::U64 => Self::U64(read_fixed(bytes)?),
            FieldType::F32 => Self::F32(read_fixed(bytes)?),
            FieldType::F64 => Self::F64(read_fixed(bytes)?),
            FieldType::String => Self::String(
                std::str::from_utf8(bytes)
                    .map_err(|_| CodecError::unsupported_type("non-UTF-8 string"))?
                    .to_owned(),
            ),
            FieldType::Bytes => Self::Bytes(bytes.to_vec()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn integers_are_little_endian() {
        assert_eq!(write_fixed(0x0102_u16), vec![0x02, 0x01]);
        assert_eq!(write_fixed(300_u32), vec![0x2c, 0x01, 0x00, 0x00]);
        assert_eq!(write_fixed(-1_i32), vec![0xff; 4]);
    }

    #[test]
    fn negative_values_roundtrip() {
        for v in [i64::MIN, -1, 0, 1, i64::MAX] {
            assert_eq!(read_fixed::<i64>(&write_fixed(v)).unwrap(), v);
        }
        assert_eq!(read_fixed::<i8>(&write_fixed(-128_i8)).unwrap(), -128);
    }

    #[test]
    fn float_specials_are_bit_exact() {
        let quiet = f64::from_bits(0x7ff8_0000_0000_0001);
        let back = read_fixed::<f64>(&write_fixed(quiet)).unwrap();
        assert_eq!(back.to_bits(), quiet.to_bits());

        for v in [f32::INFINITY, f32::NEG_INFINITY, -0.0_f32] {
            let back = read_fixed::<f32>(&write_fixed(v)).unwrap();
            assert_eq!(back.to_bits(), v.to_bits());
        }
    }

    #[test]
    fn bool_encoding() {
        assert_eq!(write_fixed(true), vec![1]);
        assert_eq!(write_fixed(false), vec![0]);
        assert!(read_fixed::<bool>(&[7]).unwrap());
    }

    #[test]
    fn short_read_is_an_error() {
        assert_eq!(
            read_fixed::<u64>(&[1, 2, 3]),
            Err(CodecError::UnexpectedEof {
                needed: 8,
                available: 3
            })
        );
    }

    #[test]
    fn value_payload_roundtrip() {
        let values = [
            Value::U64(300),
            Value::I16(-2),
            Value::F64(1.5),
            Value::String("sender".into()),
            Value::Bytes(vec![0, 1, 2]),
        ];
        for value in values {
            let payload = value.to_payload();
            assert_eq!(Value::read(value.field_type(), &payload).unwrap(), value);
        }
    }

    #[test]
    fn value_read_rejects_wrong_width() {
        assert!(matches!(
            Value::read(FieldType::U32, &[0; 8]),
            Err(CodecError::SizeMismatch { expected: 4, actual: 8 })
        ));
        assert!(matches!(
            Value::read(FieldType::U32, &[0; 2]),
            Err(CodecError::UnexpectedEof { .. })
        ));
    }

    #[test]
    fn type_names_roundtrip() {
        for ty in [FieldType::Bool, FieldType::U64, FieldType::F32, FieldType::Bytes] {
            assert_eq!(FieldType::from_name(ty.name()).unwrap(), ty);
        }
        assert!(matches!(
            FieldType::from_name("complex128"),
            Err(CodecError::UnsupportedFieldType { .. })
        ));
    }

    #[test]
    fn fixed_widths() {
        assert_eq!(FieldType::Bool.fixed_width(), Some(1));
        assert_eq!(FieldType::U16.fixed_width(), Some(2));
        assert_eq!(FieldType::F32.fixed_width(), Some(4));
        assert_eq!(FieldType::I64.fixed_width(), Some(8));
        assert!(FieldType::String.is_variable());
        assert_eq!(<u32 as FixedWidth>::WIDTH, 4);
    }
}
