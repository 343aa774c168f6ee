//! Verify command implementation.

use super::{load_decoder, split_units, CommandResult, Unit};
use dbflat_core::{Decoder, FieldWidths, Inspector, Layout, Schema};
use std::path::Path;
use tracing::debug;

/// Verification result.
#[derive(Debug, Default)]
pub struct VerifyResult {
    /// Number of records and streams checked.
    pub units_checked: usize,
    /// Number of fields decoded.
    pub fields_checked: usize,
    /// Problems found.
    pub errors: Vec<String>,
}

impl VerifyResult {
    fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Runs the verify command.
pub fn run(path: &Path, schema: Option<&Path>) -> CommandResult<()> {
    println!("Verifying {}", path.display());
    println!();

    let (decoder, schema) = load_decoder(schema)?;
    let buf = std::fs::read(path)?;
    let result = verify_bytes(&decoder, schema.as_deref(), &buf);

    println!("  Units checked:  {}", result.units_checked);
    println!("  Fields checked: {}", result.fields_checked);
    for error in &result.errors {
        println!("  Error: {error}");
    }

    println!();
    if result.is_ok() {
        println!("✓ Verification passed");
        Ok(())
    } else {
        println!("✗ Verification failed");
        Err("Verification failed".into())
    }
}

/// Check every unit of an in-memory file.
///
/// Each unit is decoded in full; hot fields must read back the same
/// through the hot path, every field must be reachable through the
/// inspector, and fixed-width fields must match the schema.
pub fn verify_bytes(decoder: &Decoder, schema: Option<&Schema>, buf: &[u8]) -> VerifyResult {
    let mut result = VerifyResult::default();
    let units = match split_units(decoder, buf) {
        Ok(units) => units,
        Err(e) => {
            result.errors.push(e.to_string());
            return result;
        }
    };
    for unit in units {
        result.units_checked += 1;
        if let Err(e) = verify_unit(decoder, schema, unit, &mut result) {
            result.errors.push(format!(
                "{} at offset {}: {e}",
                unit.layout.name(),
                unit.offset
            ));
        }
    }
    result
}

fn verify_unit(
    decoder: &Decoder,
    schema: Option<&Schema>,
    unit: Unit<'_>,
    result: &mut VerifyResult,
) -> CommandResult<()> {
    let record = decoder.decode_any(unit.bytes)?;
    let inspector = Inspector::with_buffer(decoder.clone(), unit.bytes)?;
    let at = unit.offset;

    for field in &record {
        result.fields_checked += 1;
        if inspector.get_field(field.tag)?.as_deref() != Some(&field.payload[..]) {
            result
                .errors
                .push(format!("offset {at}: tag {} differs under lookup", field.tag));
        }
        if let Some(expected) = schema.and_then(|s| s.fixed_width(field.tag)) {
            if field.payload.len() != expected {
                result.errors.push(format!(
                    "offset {at}: tag {} has {} bytes, schema says {expected}",
                    field.tag,
                    field.payload.len()
                ));
            }
        }
    }

    if unit.layout == Layout::Record {
        let header = record.header().copied().ok_or("record without header")?;
        for tag in header.hot_bitmap.tags() {
            let hot = decoder.read_hot_field(unit.bytes, tag, 0)?;
            if record.payload(tag) != Some(&hot[..]) {
                result
                    .errors
                    .push(format!("offset {at}: hot tag {tag} differs from full decode"));
            }
        }
        debug!(offset = at, hot = header.hot_bitmap.len(), "record verified");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbflat_core::{CompFlags, Encoder, Field, LayoutPlan, Strategy};
    use std::sync::Arc;

    fn sample(strategy: Strategy) -> Vec<u8> {
        let amount = 5u64.to_le_bytes();
        let fields = [
            Field::array(1, b"one"),
            Field::new(2, CompFlags::RAW, &amount),
            Field::new(12, CompFlags::array(2), b"twelve twelve twelve"),
        ];
        let plan = LayoutPlan::new(&fields[..])
            .strategy(strategy)
            .hot_tags(&[1, 2]);
        Encoder::default().encode_to_vec(&plan).unwrap()
    }

    fn widths(width: usize) -> Schema {
        Schema::from_json(&format!(
            r#"{{ "schema_id": 1, "fields": [ {{ "name": "amount", "tag": 2, "length": {width} }} ] }}"#
        ))
        .unwrap()
    }

    #[test]
    fn every_strategy_verifies() {
        for strategy in [Strategy::FullVTable, Strategy::HotVTable, Strategy::TagWalk] {
            let schema = widths(8);
            let decoder = Decoder::with_widths(Arc::new(schema.clone()));
            let result = verify_bytes(&decoder, Some(&schema), &sample(strategy));
            assert!(result.is_ok(), "{strategy}: {:?}", result.errors);
            assert_eq!(result.fields_checked, 3, "{strategy}");
        }
    }

    #[test]
    fn concatenated_records_verify() {
        let mut file = sample(Strategy::FullVTable);
        file.extend(sample(Strategy::HotVTable));
        let schema = widths(8);
        let decoder = Decoder::with_widths(Arc::new(schema.clone()));
        let result = verify_bytes(&decoder, Some(&schema), &file);
        assert!(result.is_ok(), "{:?}", result.errors);
        assert_eq!(result.units_checked, 2);
    }

    #[test]
    fn truncation_is_reported() {
        let file = sample(Strategy::HotVTable);
        let result = verify_bytes(&Decoder::default(), None, &file[..file.len() - 3]);
        assert!(!result.is_ok());
    }

    #[test]
    fn length_prefixed_field_checked_against_schema() {
        let schema = Schema::from_json(
            r#"{ "schema_id": 1, "fields": [
                { "name": "amount", "tag": 2, "length": 8 },
                { "name": "digest", "tag": 12, "length": 8 }
            ] }"#,
        )
        .unwrap();
        let decoder = Decoder::with_widths(Arc::new(schema.clone()));
        let result = verify_bytes(&decoder, Some(&schema), &sample(Strategy::FullVTable));
        assert_eq!(result.errors.len(), 1, "{:?}", result.errors);
        assert!(result.errors[0].contains("tag 12 has 20 bytes"));
    }
}
