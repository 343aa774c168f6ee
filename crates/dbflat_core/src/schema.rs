//! Width registry and schema documents.
//!
//! A fixed-width field carries no length on the wire, so a reader needs an
//! out-of-band `tag -> width` contract to step over it. [`FieldWidths`] is
//! that contract; [`Schema`] is the versioned JSON document that usually
//! backs it.
//!
//! ```json
//! {
//!   "schema_id": 112,
//!   "version": 1,
//!   "fields": [
//!     { "name": "sender", "tag": 1, "comp_flags": 32768, "length": -1, "hot": true },
//!     { "name": "amount", "tag": 3, "length": 8, "type": "u64" }
//!   ]
//! }
//! ```

use crate::error::{DbflatError, DbflatResult};
use crate::field::CompFlags;
use crate::header::HotBitmap;
use dbflat_codec::FieldType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

/// Maps tags to the byte width of fixed-width fields.
pub trait FieldWidths {
    /// Width of `tag` when it is fixed-width and known.
    fn fixed_width(&self, tag: u16) -> Option<usize>;
}

/// A registry that knows no widths.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFixedWidths;

impl FieldWidths for NoFixedWidths {
    fn fixed_width(&self, _tag: u16) -> Option<usize> {
        None
    }
}

impl FieldWidths for HashMap<u16, usize> {
    fn fixed_width(&self, tag: u16) -> Option<usize> {
        self.get(&tag).copied()
    }
}

impl FieldWidths for BTreeMap<u16, usize> {
    fn fixed_width(&self, tag: u16) -> Option<usize> {
        self.get(&tag).copied()
    }
}

impl<T: FieldWidths + ?Sized> FieldWidths for &T {
    fn fixed_width(&self, tag: u16) -> Option<usize> {
        (**self).fixed_width(tag)
    }
}

/// Length marker for variable-length entries.
pub const VARIABLE_LENGTH: i32 = -1;

/// One field of a schema document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Human-readable name.
    pub name: String,
    /// Field tag.
    pub tag: u16,
    /// Default flags for this field.
    #[serde(default)]
    pub comp_flags: u16,
    /// Byte width, or `-1` for variable-length.
    pub length: i32,
    /// Whether the field belongs to the default hot set.
    #[serde(default)]
    pub hot: bool,
    /// Declared value type, when known.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
}

impl FieldSchema {
    /// Width when fixed.
    #[must_use]
    pub fn width(&self) -> Option<usize> {
        usize::try_from(self.length).ok()
    }

    /// Flags as a [`CompFlags`].
    #[must_use]
    pub const fn flags(&self) -> CompFlags {
        CompFlags::from_bits(self.comp_flags)
    }

    fn validate(&self) -> DbflatResult<()> {
        let flags = self.flags();
        if flags.has_reserved_bits() {
            return Err(DbflatError::schema(format!(
                "field {} ({}) sets reserved comp_flags bits",
                self.name, self.tag
            )));
        }
        match self.length {
            VARIABLE_LENGTH => {
                if !flags.is_array() {
                    return Err(DbflatError::schema(format!(
                        "variable-length field {} ({}) must set the array bit",
                        self.name, self.tag
                    )));
                }
            }
            len if len > 0 => {
                if flags.is_array() {
                    return Err(DbflatError::schema(format!(
                        "fixed-length field {} ({}) must not set the array bit",
                        self.name, self.tag
                    )));
                }
            }
            len => {
                return Err(DbflatError::schema(format!(
                    "field {} ({}) has invalid length {len}",
                    self.name, self.tag
                )));
            }
        }
        if let Some(ty) = self.field_type {
            if ty.fixed_width() != self.width() {
                return Err(DbflatError::schema(format!(
                    "field {} ({}) declared {ty} but length {}",
                    self.name, self.tag, self.length
                )));
            }
        }
        Ok(())
    }
}

#[derive(Deserialize, Serialize)]
struct SchemaDocument {
    schema_id: u64,
    #[serde(default = "default_version")]
    version: u32,
    fields: Vec<FieldSchema>,
}

const fn default_version() -> u32 {
    1
}

/// A validated, versioned schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schema {
    schema_id: u64,
    version: u32,
    fields: Vec<FieldSchema>,
    widths: HashMap<u16, usize>,
}

impl Schema {
    /// Build a schema from its entries.
    ///
    /// # Errors
    ///
    /// Returns [`DbflatError::Schema`] for a zero or duplicate tag, a bad
    /// length, or flags inconsistent with the length.
    pub fn new(schema_id: u64, version: u32, mut fields: Vec<FieldSchema>) -> DbflatResult<Self> {
        fields.sort_by_key(|field| field.tag);
        let mut widths = HashMap::with_capacity(fields.len());
        for (i, field) in fields.iter().enumerate() {
            if field.tag == 0 {
                return Err(DbflatError::schema(format!("field {} has tag 0", field.name)));
            }
            if i > 0 && fields[i - 1].tag == field.tag {
                return Err(DbflatError::schema(format!("duplicate tag {}", field.tag)));
            }
            field.validate()?;
            if let Some(width) = field.width() {
                widths.insert(field.tag, width);
            }
        }
        Ok(Self {
            schema_id,
            version,
            fields,
            widths,
        })
    }

    /// Parse and validate a JSON schema document.
    ///
    /// # Errors
    ///
    /// Returns [`DbflatError::Json`] for malformed JSON or
    /// [`DbflatError::Schema`] for an invalid schema.
    pub fn from_json(json: &str) -> DbflatResult<Self> {
        let doc: SchemaDocument = serde_json::from_str(json)?;
        Self::new(doc.schema_id, doc.version, doc.fields)
    }

    /// Load a JSON schema document from `path`.
    ///
    /// # Errors
    ///
    /// Returns [`DbflatError::Io`] if the file cannot be read, otherwise as
    /// [`Schema::from_json`].
    pub fn load(path: impl AsRef<Path>) -> DbflatResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    /// Serialize back to pretty JSON.
    ///
    /// # Errors
    ///
    /// Returns [`DbflatError::Json`] if serialization fails.
    pub fn to_json(&self) -> DbflatResult<String> {
        let doc = SchemaDocument {
            schema_id: self.schema_id,
            version: self.version,
            fields: self.fields.clone(),
        };
        Ok(serde_json::to_string_pretty(&doc)?)
    }

    /// Schema identifier written into record headers.
    #[must_use]
    pub const fn schema_id(&self) -> u64 {
        self.schema_id
    }

    /// Document version.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Entries sorted by tag.
    #[must_use]
    pub fn fields(&self) -> &[FieldSchema] {
        &self.fields
    }

    /// Entry for `tag`.
    #[must_use]
    pub fn field(&self, tag: u16) -> Option<&FieldSchema> {
        self.fields
            .binary_search_by_key(&tag, |field| field.tag)
            .ok()
            .map(|i| &self.fields[i])
    }

    /// Entry named `name`.
    #[must_use]
    pub fn field_by_name(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|field| field.name == name)
    }

    /// Tags marked hot that fit the hot bitmap.
    #[must_use]
    pub fn hot_tags(&self) -> Vec<u16> {
        self.fields
            .iter()
            .filter(|field| field.hot && HotBitmap::in_range(field.tag))
            .map(|field| field.tag)
            .collect()
    }
}

impl FieldWidths for Schema {
    fn fixed_width(&self, tag: u16) -> Option<usize> {
        self.widths.get(&tag).copied()
    }
}
