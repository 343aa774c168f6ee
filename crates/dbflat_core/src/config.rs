//! Encoder and decoder configuration.

use crate::error::{DbflatError, DbflatResult};
use crate::schema::{FieldWidths, NoFixedWidths};
use dbflat_codec::CompressorRegistry;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// A shareable width registry.
pub type SharedWidths = Arc<dyn FieldWidths + Send + Sync>;

/// How fields are laid out in a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// Every field gets a vtable slot.
    #[default]
    FullVTable,
    /// Hot fields get vtable slots; the rest follow as a tag-walk section.
    HotVTable,
    /// No header, just a sequence of tag-walk tuples.
    TagWalk,
}

impl Strategy {
    /// Stable lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::FullVTable => "full",
            Self::HotVTable => "hot",
            Self::TagWalk => "tagwalk",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Strategy {
    type Err = DbflatError;

    fn from_str(s: &str) -> DbflatResult<Self> {
        match s {
            "full" | "full-vtable" => Ok(Self::FullVTable),
            "hot" | "hot-vtable" => Ok(Self::HotVTable),
            "tagwalk" | "tag-walk" => Ok(Self::TagWalk),
            _ => Err(DbflatError::UnknownStrategy { name: s.to_owned() }),
        }
    }
}

/// Configuration for an [`Encoder`](crate::Encoder).
#[derive(Clone, Default)]
pub struct EncoderConfig {
    /// Compressors available to fields.
    pub compressors: CompressorRegistry,
    /// When set, fixed-width payloads are checked against these widths.
    pub widths: Option<SharedWidths>,
}

impl EncoderConfig {
    /// Creates a configuration with the built-in compressors and no width
    /// validation.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compressor registry.
    #[must_use]
    pub fn compressors(mut self, compressors: CompressorRegistry) -> Self {
        self.compressors = compressors;
        self
    }

    /// Validates fixed-width payload sizes against `widths`.
    #[must_use]
    pub fn validate_widths(mut self, widths: SharedWidths) -> Self {
        self.widths = Some(widths);
        self
    }
}

impl fmt::Debug for EncoderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EncoderConfig")
            .field("compressors", &self.compressors)
            .field("validate_widths", &self.widths.is_some())
            .finish()
    }
}

/// Configuration for a [`Decoder`](crate::Decoder).
#[derive(Clone)]
pub struct DecoderConfig {
    /// Compressors available to fields.
    pub compressors: CompressorRegistry,
    /// Widths of fixed-width fields.
    pub widths: SharedWidths,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            compressors: CompressorRegistry::default(),
            widths: Arc::new(NoFixedWidths),
        }
    }
}

impl DecoderConfig {
    /// Creates a configuration with the built-in compressors and no known
    /// fixed widths.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the compressor registry.
    #[must_use]
    pub fn compressors(mut self, compressors: CompressorRegistry) -> Self {
        self.compressors = compressors;
        self
    }

    /// Sets the width registry.
    #[must_use]
    pub fn widths(mut self, widths: SharedWidths) -> Self {
        self.widths = widths;
        self
    }
}

impl fmt::Debug for DecoderConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecoderConfig")
            .field("compressors", &self.compressors)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbflat_codec::{COMP_HUFFMAN, COMP_ZSTD};
    use std::collections::HashMap;

    #[test]
    fn default_configs() {
        let encoder = EncoderConfig::default();
        assert!(encoder.widths.is_none());
        assert!(encoder.compressors.contains(COMP_HUFFMAN));

        let decoder = DecoderConfig::default();
        assert_eq!(decoder.widths.fixed_width(1), None);
        assert!(decoder.compressors.contains(COMP_ZSTD));
    }

    #[test]
    fn builder_pattern() {
        let widths: HashMap<u16, usize> = [(3, 8)].into_iter().collect();
        let config = DecoderConfig::new()
            .compressors(CompressorRegistry::raw_only())
            .widths(Arc::new(widths));
        assert_eq!(config.widths.fixed_width(3), Some(8));
        assert!(!config.compressors.contains(COMP_ZSTD));
    }

    #[test]
    fn strategy_names_parse() {
        for strategy in [Strategy::FullVTable, Strategy::HotVTable, Strategy::TagWalk] {
            assert_eq!(strategy.name().parse::<Strategy>().unwrap(), strategy);
        }
        assert!(matches!(
            "sideways".parse::<Strategy>(),
            Err(DbflatError::UnknownStrategy { name }) if name == "sideways"
        ));
    }
}
