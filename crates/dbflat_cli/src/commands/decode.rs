//! Decode command implementation.

use super::{load_decoder, printable, split_units, CommandResult};
use dbflat_core::{Decoder, Schema};
use serde::Serialize;
use std::path::Path;

/// Decoded file.
#[derive(Debug, Serialize)]
pub struct DecodeResult {
    /// File path.
    pub path: String,
    /// Records in file order.
    pub records: Vec<RecordReport>,
}

/// One decoded record or stream.
#[derive(Debug, Serialize)]
pub struct RecordReport {
    /// Byte offset in the file.
    pub offset: usize,
    /// `record` or `tagwalk`.
    pub layout: &'static str,
    /// Schema id from the header.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_id: Option<u64>,
    /// Fields sorted by tag.
    pub fields: Vec<FieldReport>,
}

/// One decoded field.
#[derive(Debug, Serialize)]
pub struct FieldReport {
    /// Field tag.
    pub tag: u16,
    /// Name from the schema, if one was given.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Raw comp_flags.
    pub comp_flags: u16,
    /// Decompressed payload as hex.
    pub hex: String,
    /// Payload as text when printable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Runs the decode command.
pub fn run(path: &Path, schema: Option<&Path>, format: &str) -> CommandResult<()> {
    let (decoder, schema) = load_decoder(schema)?;
    let buf = std::fs::read(path)?;
    let mut result = decode_bytes(&decoder, schema.as_deref(), &buf)?;
    result.path = path.display().to_string();

    match format {
        "json" => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        _ => {
            print_text_output(&result);
        }
    }

    Ok(())
}

/// Decode every unit of an in-memory file.
pub fn decode_bytes(
    decoder: &Decoder,
    schema: Option<&Schema>,
    buf: &[u8],
) -> CommandResult<DecodeResult> {
    let mut records = Vec::new();
    for unit in split_units(decoder, buf)? {
        let record = decoder
            .decode_any(unit.bytes)
            .map_err(|e| format!("{} at offset {}: {e}", unit.layout.name(), unit.offset))?;
        let fields = record
            .iter()
            .map(|field| FieldReport {
                tag: field.tag,
                name: schema
                    .and_then(|s| s.field(field.tag))
                    .map(|f| f.name.clone()),
                comp_flags: field.comp_flags.bits(),
                hex: hex::encode(&field.payload),
                text: printable(&field.payload).map(str::to_owned),
            })
            .collect();
        records.push(RecordReport {
            offset: unit.offset,
            layout: unit.layout.name(),
            schema_id: record.schema_id(),
            fields,
        });
    }
    Ok(DecodeResult {
        path: String::new(),
        records,
    })
}

fn print_text_output(result: &DecodeResult) {
    println!("DBFlat Decode: {}", result.path);
    for (index, record) in result.records.iter().enumerate() {
        println!();
        match record.schema_id {
            Some(id) => println!(
                "[{index}] {} at offset {} (schema {id})",
                record.layout, record.offset
            ),
            None => println!("[{index}] {} at offset {}", record.layout, record.offset),
        }
        for field in &record.fields {
            let label = field
                .name
                .as_deref()
                .map(|name| format!("{} ({name})", field.tag))
                .unwrap_or_else(|| field.tag.to_string());
            match &field.text {
                Some(text) => println!("  {label:<16} {}  {text:?}", field.hex),
                None => println!("  {label:<16} {}", field.hex),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbflat_core::{Builder, CompFlags, HeaderFlags};
    use std::sync::Arc;

    const SCHEMA: &str = r#"{
        "schema_id": 3,
        "fields": [
            { "name": "name", "tag": 1, "comp_flags": 32768, "length": -1, "hot": true },
            { "name": "count", "tag": 2, "length": 4, "type": "u32" }
        ]
    }"#;

    #[test]
    fn decodes_with_schema_names() {
        let schema = Arc::new(Schema::from_json(SCHEMA).unwrap());
        let mut builder = Builder::new();
        builder
            .add_field(1, CompFlags::ARRAY, b"widget", true)
            .add_field(2, CompFlags::RAW, &7u32.to_le_bytes(), false);
        let buf = builder.commit(3, HeaderFlags::SCHEMA_ID).unwrap().to_vec();

        let decoder = Decoder::with_widths(schema.clone());
        let result = decode_bytes(&decoder, Some(&schema), &buf).unwrap();
        let record = &result.records[0];
        assert_eq!(record.schema_id, Some(3));
        assert_eq!(record.fields[0].name.as_deref(), Some("name"));
        assert_eq!(record.fields[0].text.as_deref(), Some("widget"));
        assert_eq!(record.fields[1].hex, "07000000");
        assert_eq!(record.fields[1].text, None);
    }

    #[test]
    fn fixed_width_without_schema_is_skipped() {
        let mut builder = Builder::new();
        builder
            .add_field(1, CompFlags::ARRAY, b"widget", true)
            .add_field(2, CompFlags::RAW, &7u32.to_le_bytes(), false);
        let buf = builder.commit(0, HeaderFlags::NONE).unwrap().to_vec();

        let result = decode_bytes(&Decoder::default(), None, &buf).unwrap();
        let tags: Vec<u16> = result.records[0].fields.iter().map(|f| f.tag).collect();
        assert_eq!(tags, vec![1]);
    }

    #[test]
    fn run_with_schema_file() {
        let dir = tempfile::tempdir().unwrap();
        let schema_path = dir.path().join("schema.json");
        std::fs::write(&schema_path, SCHEMA).unwrap();

        let mut builder = Builder::new();
        builder.add_field(1, CompFlags::ARRAY, b"widget", true);
        let record_path = dir.path().join("one.dbf");
        std::fs::write(&record_path, builder.commit(3, HeaderFlags::SCHEMA_ID).unwrap()).unwrap();

        run(&record_path, Some(&schema_path), "json").unwrap();
        run(&record_path, None, "text").unwrap();
    }
}
