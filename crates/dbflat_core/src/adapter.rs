//! Boundary between application types and field lists.
//!
//! Types opt in by implementing [`ToFields`] and [`FromFields`] by hand.
//! Tags are the stable identity of a field across schema versions: a
//! reader ignores tags it does not know and treats missing optional tags
//! as absent.

use crate::builder::Builder;
use crate::decoder::DecodedRecord;
use crate::error::{DbflatError, DbflatResult};
use crate::field::{CompFlags, FieldBuf};
use crate::inspector::Inspector;
use dbflat_codec::{FieldType, Value};
use std::borrow::Cow;

/// Receives fields from a [`ToFields`] implementation.
pub trait FieldSink {
    /// Append one field.
    fn push_field(&mut self, tag: u16, comp_flags: CompFlags, payload: &[u8], hot: bool);

    /// Append a typed value; variable-length types get the array bit.
    fn push_value(&mut self, tag: u16, value: &Value, hot: bool) {
        let flags = if value.field_type().is_variable() {
            CompFlags::ARRAY
        } else {
            CompFlags::RAW
        };
        self.push_field(tag, flags, &value.to_payload(), hot);
    }
}

impl FieldSink for Builder {
    fn push_field(&mut self, tag: u16, comp_flags: CompFlags, payload: &[u8], hot: bool) {
        self.add_field(tag, comp_flags, payload, hot);
    }

    fn push_value(&mut self, tag: u16, value: &Value, hot: bool) {
        self.add_value(tag, value, hot);
    }
}

/// An owned field list that remembers which tags are hot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldList {
    /// Fields in insertion order.
    pub fields: Vec<FieldBuf>,
    /// Tags flagged hot.
    pub hot_tags: Vec<u16>,
}

impl FieldList {
    /// An empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Collect the fields of `value`.
    ///
    /// # Errors
    ///
    /// Propagates errors from [`ToFields::to_fields`].
    pub fn from_value<T: ToFields + ?Sized>(value: &T) -> DbflatResult<Self> {
        let mut list = Self::new();
        value.to_fields(&mut list)?;
        Ok(list)
    }
}

impl FieldSink for FieldList {
    fn push_field(&mut self, tag: u16, comp_flags: CompFlags, payload: &[u8], hot: bool) {
        self.fields.push(FieldBuf::new(tag, comp_flags, payload));
        if hot {
            self.hot_tags.push(tag);
        }
    }
}

/// Looks fields up by tag.
pub trait FieldLookup<'a> {
    /// Payload of `tag`, if present.
    ///
    /// # Errors
    ///
    /// Returns decode errors met while looking.
    fn lookup(&self, tag: u16) -> DbflatResult<Option<Cow<'a, [u8]>>>;
}

impl<'a> FieldLookup<'a> for DecodedRecord<'a> {
    fn lookup(&self, tag: u16) -> DbflatResult<Option<Cow<'a, [u8]>>> {
        Ok(self.get(tag).map(|field| field.payload.clone()))
    }
}

impl<'a> FieldLookup<'a> for Inspector<'a> {
    fn lookup(&self, tag: u16) -> DbflatResult<Option<Cow<'a, [u8]>>> {
        self.get_field(tag)
    }
}

/// An application type that can describe itself as fields.
pub trait ToFields {
    /// Push every field of `self` into `sink`.
    ///
    /// # Errors
    ///
    /// Implementations may reject values they cannot represent.
    fn to_fields(&self, sink: &mut dyn FieldSink) -> DbflatResult<()>;
}

/// An application type that can be rebuilt from fields.
pub trait FromFields: Sized {
    /// Rebuild from `source`.
    ///
    /// # Errors
    ///
    /// Returns [`DbflatError::MissingField`] for absent required fields, or
    /// a decode error.
    fn from_fields<'a>(source: &dyn FieldLookup<'a>) -> DbflatResult<Self>;
}

/// Typed value of `tag`, or `None` when absent.
///
/// # Errors
///
/// Returns a codec error if the payload does not decode as `field_type`.
pub fn read_value<'a>(
    source: &dyn FieldLookup<'a>,
    tag: u16,
    field_type: FieldType,
) -> DbflatResult<Option<Value>> {
    source
        .lookup(tag)?
        .map(|payload| Value::read(field_type, &payload).map_err(DbflatError::from))
        .transpose()
}

/// Typed value of a required `tag`.
///
/// # Errors
///
/// Returns [`DbflatError::MissingField`] when absent, otherwise as
/// [`read_value`].
pub fn require_value<'a>(
    source: &dyn FieldLookup<'a>,
    tag: u16,
    field_type: FieldType,
) -> DbflatResult<Value> {
    read_value(source, tag, field_type)?.ok_or(DbflatError::MissingField { tag })
}

/// Raw payload of a required `tag`.
///
/// # Errors
///
/// Returns [`DbflatError::MissingField`] when absent.
pub fn require_bytes<'a>(source: &dyn FieldLookup<'a>, tag: u16) -> DbflatResult<Cow<'a, [u8]>> {
    source.lookup(tag)?.ok_or(DbflatError::MissingField { tag })
}
