//! Property-based test generators using proptest.
//!
//! Generated field sets always satisfy the encoder's input invariants:
//! unique non-zero tags, no reserved comp_flags bits, and a width entry
//! for every fixed-width tag.

use dbflat_codec::{COMP_HUFFMAN, COMP_RAW, COMP_RLE, COMP_ZSTD};
use dbflat_core::{CompFlags, FieldBuf, LayoutPlan, Strategy as Layout, MAX_HOT_TAG};
use proptest::prelude::*;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

/// Widths used for fixed-width fields.
pub const FIXED_WIDTHS: [usize; 4] = [1, 2, 4, 8];

/// Largest tag produced by [`tag_strategy`].
pub const MAX_GENERATED_TAG: u16 = 40;

/// Strategy for generating tags, biased toward the hot range.
pub fn tag_strategy() -> impl Strategy<Value = u16> {
    prop_oneof![
        2 => 1..=MAX_HOT_TAG,
        1 => (MAX_HOT_TAG + 1)..=MAX_GENERATED_TAG,
    ]
}

/// Strategy for generating a registered compressor id.
pub fn compressor_strategy() -> impl Strategy<Value = u8> {
    prop::sample::select(vec![COMP_RAW, COMP_RLE, COMP_HUFFMAN, COMP_ZSTD])
}

/// Strategy for generating a layout strategy.
pub fn layout_strategy() -> impl Strategy<Value = Layout> {
    prop::sample::select(vec![Layout::FullVTable, Layout::HotVTable, Layout::TagWalk])
}

/// Strategy for generating payloads with long runs, so compressors have
/// something to work with.
pub fn payload_strategy() -> impl Strategy<Value = Vec<u8>> {
    prop_oneof![
        prop::collection::vec(any::<u8>(), 0..96),
        (any::<u8>(), 0usize..300).prop_map(|(byte, len)| vec![byte; len]),
        prop::collection::vec(prop::sample::select(b"abcab ".to_vec()), 0..200),
    ]
}

/// Shape of one generated field.
#[derive(Debug, Clone)]
pub enum FieldShape {
    /// Fixed-width raw payload.
    Fixed(Vec<u8>),
    /// Length-prefixed payload with a compressor id.
    Array(u8, Vec<u8>),
}

impl FieldShape {
    /// Whether a reader needs a registered width to skip this field.
    #[must_use]
    pub const fn is_fixed(&self) -> bool {
        matches!(self, Self::Fixed(_))
    }

    /// The field this shape describes under `tag`.
    #[must_use]
    pub fn to_field(&self, tag: u16) -> FieldBuf {
        match self {
            Self::Fixed(payload) => FieldBuf::new(tag, CompFlags::RAW, payload.clone()),
            Self::Array(id, payload) => FieldBuf::new(tag, CompFlags::array(*id), payload.clone()),
        }
    }
}

/// Strategy for generating one field shape.
pub fn field_shape_strategy() -> impl Strategy<Value = FieldShape> {
    prop_oneof![
        1 => prop::sample::select(FIXED_WIDTHS.to_vec())
            .prop_flat_map(|width| prop::collection::vec(any::<u8>(), width))
            .prop_map(FieldShape::Fixed),
        3 => (compressor_strategy(), payload_strategy())
            .prop_map(|(id, payload)| FieldShape::Array(id, payload)),
    ]
}

/// A generated encoder input with everything needed to decode it.
#[derive(Debug, Clone)]
pub struct FieldSetCase {
    /// Fields in an arbitrary order.
    pub fields: Vec<FieldBuf>,
    /// Width of every fixed-width tag.
    pub widths: HashMap<u16, usize>,
    /// Tags requested hot; may include absent or out-of-range tags.
    pub hot_tags: Vec<u16>,
    /// Whether vtable payloads are padded to 8 bytes.
    pub align: bool,
}

impl FieldSetCase {
    /// The encoder input for `strategy`, with this case's hot tags and
    /// alignment.
    #[must_use]
    pub fn plan(&self, strategy: Layout) -> LayoutPlan<'_, Vec<FieldBuf>> {
        LayoutPlan::new(&self.fields)
            .strategy(strategy)
            .hot_tags(&self.hot_tags)
            .align(self.align)
    }

    /// Fields sorted by tag.
    #[must_use]
    pub fn sorted(&self) -> Vec<FieldBuf> {
        let mut fields = self.fields.clone();
        fields.sort_by_key(|field| field.tag);
        fields
    }

    /// The width registry as a shareable value.
    #[must_use]
    pub fn shared_widths(&self) -> Arc<HashMap<u16, usize>> {
        Arc::new(self.widths.clone())
    }

    /// Tags that end up hot in an encoded record.
    #[must_use]
    pub fn effective_hot(&self) -> Vec<u16> {
        let mut hot: Vec<u16> = self
            .fields
            .iter()
            .map(|field| field.tag)
            .filter(|tag| (1..=MAX_HOT_TAG).contains(tag) && self.hot_tags.contains(tag))
            .collect();
        hot.sort_unstable();
        hot
    }
}

/// Strategy for generating a field set of up to `max_fields` fields.
pub fn field_set_strategy(max_fields: usize) -> impl Strategy<Value = FieldSetCase> {
    (
        prop::collection::btree_map(tag_strategy(), field_shape_strategy(), 0..=max_fields),
        prop::collection::vec(0u16..=12, 0..8),
        any::<bool>(),
    )
        .prop_flat_map(|(shapes, hot_tags, align)| {
            let len = shapes.len();
            (
                Just(shapes),
                Just(hot_tags),
                Just(align),
                Just((0..len).collect::<Vec<usize>>()).prop_shuffle(),
            )
        })
        .prop_map(
            |(shapes, hot_tags, align, order): (
                BTreeMap<u16, FieldShape>,
                Vec<u16>,
                bool,
                Vec<usize>,
            )| {
                let entries: Vec<(u16, FieldShape)> = shapes.into_iter().collect();
                let mut widths = HashMap::new();
                let fields = order
                    .into_iter()
                    .map(|i| {
                        let (tag, shape) = &entries[i];
                        if let FieldShape::Fixed(payload) = shape {
                            widths.insert(*tag, payload.len());
                        }
                        shape.to_field(*tag)
                    })
                    .collect();
                FieldSetCase {
                    fields,
                    widths,
                    hot_tags,
                    align,
                }
            },
        )
}

/// How hard a property suite pushes the generators.
///
/// Presets scale the number of cases together with the size of generated
/// field sets, since truncation and framing properties cost grows with
/// record length. Set `DBFLAT_PROPTEST_BUDGET` to `smoke`, `standard` or
/// `soak` to pick a preset through [`PropertyBudget::from_env`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PropertyBudget {
    /// Cases per property.
    pub cases: u32,
    /// Largest field set handed to [`field_set_strategy`].
    pub max_fields: usize,
    /// Shrink iterations before giving up on a minimal failure.
    pub max_shrink_iters: u32,
}

impl PropertyBudget {
    /// Small records, few cases; for unit tests inside the testkit.
    #[must_use]
    pub const fn smoke() -> Self {
        Self {
            cases: 24,
            max_fields: 6,
            max_shrink_iters: 64,
        }
    }

    /// The budget of the cross-crate property suite.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            cases: 128,
            max_fields: 24,
            max_shrink_iters: 512,
        }
    }

    /// Every generated tag in play and many cases.
    #[must_use]
    pub const fn soak() -> Self {
        Self {
            cases: 2048,
            max_fields: MAX_GENERATED_TAG as usize,
            max_shrink_iters: 4096,
        }
    }

    /// The preset named by `DBFLAT_PROPTEST_BUDGET`, else `fallback`.
    #[must_use]
    pub fn from_env(fallback: Self) -> Self {
        match std::env::var("DBFLAT_PROPTEST_BUDGET").as_deref() {
            Ok("smoke") => Self::smoke(),
            Ok("standard") => Self::standard(),
            Ok("soak") => Self::soak(),
            _ => fallback,
        }
    }

    /// Field sets sized for this budget.
    pub fn field_sets(&self) -> impl Strategy<Value = FieldSetCase> {
        field_set_strategy(self.max_fields)
    }

    /// The matching proptest configuration.
    #[must_use]
    pub fn proptest_config(&self) -> ProptestConfig {
        ProptestConfig {
            cases: self.cases,
            max_shrink_iters: self.max_shrink_iters,
            ..ProptestConfig::default()
        }
    }
}

impl Default for PropertyBudget {
    fn default() -> Self {
        Self::standard()
    }
}
