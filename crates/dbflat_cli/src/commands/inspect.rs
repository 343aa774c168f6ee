//! Inspect command implementation.

use super::{split_units, CommandResult, Unit};
use dbflat_core::{Decoder, Inspector, VTable};
use serde::Serialize;
use std::path::Path;

/// File inspection result.
#[derive(Debug, Serialize)]
pub struct InspectResult {
    /// File path.
    pub path: String,
    /// File size in bytes.
    pub size: usize,
    /// Records and streams in file order.
    pub units: Vec<UnitReport>,
}

/// Layout of one record or stream.
#[derive(Debug, Serialize)]
pub struct UnitReport {
    /// Byte offset in the file.
    pub offset: usize,
    /// `record` or `tagwalk`.
    pub layout: &'static str,
    /// Length in bytes.
    pub length: usize,
    /// Header fields, for records.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub header: Option<HeaderReport>,
    /// Vtable slots, for records.
    pub slots: Vec<SlotReport>,
    /// Tag-walk tuples: the cold section of a record, or the whole stream.
    pub tuples: Vec<TupleReport>,
}

/// Decoded header fields.
#[derive(Debug, Serialize)]
pub struct HeaderReport {
    /// Format version.
    pub version: u16,
    /// Raw flags word.
    pub flags: u16,
    /// Schema id, when present.
    pub schema_id: Option<u64>,
    /// Hot tags from the bitmap.
    pub hot_tags: Vec<u16>,
    /// Absolute vtable offset.
    pub vtable_off: u32,
    /// Number of vtable slots.
    pub vtable_slots: u8,
    /// Absolute data offset.
    pub data_offset: u16,
    /// Declared record length.
    pub record_len: u32,
    /// Cold section offset, or 0.
    pub cold_offset: u32,
}

/// One vtable slot.
#[derive(Debug, Serialize)]
pub struct SlotReport {
    /// Field tag.
    pub tag: u16,
    /// Raw comp_flags.
    pub comp_flags: u16,
    /// Offset relative to the data region.
    pub offset: u32,
}

/// One tag-walk tuple.
#[derive(Debug, Serialize)]
pub struct TupleReport {
    /// Field tag.
    pub tag: u16,
    /// Raw comp_flags.
    pub comp_flags: u16,
    /// Decompressed payload size.
    pub payload_len: usize,
}

/// Runs the inspect command.
pub fn run(path: &Path, format: &str) -> CommandResult<()> {
    let buf = std::fs::read(path)?;
    let mut result = inspect_bytes(&buf)?;
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

/// Build the report for an in-memory file.
pub fn inspect_bytes(buf: &[u8]) -> CommandResult<InspectResult> {
    let decoder = Decoder::default();
    let units = split_units(&decoder, buf)?
        .into_iter()
        .map(|unit| report_unit(&decoder, unit))
        .collect::<CommandResult<Vec<_>>>()?;
    Ok(InspectResult {
        path: String::new(),
        size: buf.len(),
        units,
    })
}

fn report_unit(decoder: &Decoder, unit: Unit<'_>) -> CommandResult<UnitReport> {
    let mut inspector = Inspector::with_buffer(decoder.clone(), unit.bytes)?;
    let mut report = UnitReport {
        offset: unit.offset,
        layout: unit.layout.name(),
        length: unit.bytes.len(),
        header: None,
        slots: Vec::new(),
        tuples: Vec::new(),
    };

    if let Some(header) = inspector.header().copied() {
        report.slots = VTable::new(unit.bytes, &header)?
            .iter()
            .map(|slot| SlotReport {
                tag: slot.tag,
                comp_flags: slot.comp_flags.bits(),
                offset: slot.offset,
            })
            .collect();
        report.header = Some(HeaderReport {
            version: header.version,
            flags: header.flags.bits(),
            schema_id: header.schema_id,
            hot_tags: header.hot_bitmap.tags().collect(),
            vtable_off: header.vtable_off,
            vtable_slots: header.vtable_slots,
            data_offset: header.data_offset,
            record_len: header.record_len,
            cold_offset: header.cold_offset,
        });
    }

    while let Some(field) = inspector
        .next()
        .map_err(|e| format!("{} at offset {}: {e}", unit.layout.name(), unit.offset))?
    {
        report.tuples.push(TupleReport {
            tag: field.tag,
            comp_flags: field.comp_flags.bits(),
            payload_len: field.payload.len(),
        });
    }
    Ok(report)
}

fn print_text_output(result: &InspectResult) {
    println!("DBFlat File Inspection");
    println!("======================");
    println!();
    println!("Path: {}", result.path);
    println!("Size: {} bytes", result.size);

    for (index, unit) in result.units.iter().enumerate() {
        println!();
        println!(
            "[{index}] {} at offset {}, {} bytes",
            unit.layout, unit.offset, unit.length
        );
        if let Some(header) = &unit.header {
            println!("  Version:      {}", header.version);
            println!("  Flags:        {:#06x}", header.flags);
            if let Some(id) = header.schema_id {
                println!("  Schema id:    {id}");
            }
            println!("  Hot tags:     {:?}", header.hot_tags);
            println!(
                "  VTable:       {} slots at {}",
                header.vtable_slots, header.vtable_off
            );
            println!("  Data offset:  {}", header.data_offset);
            if header.cold_offset != 0 {
                println!("  Cold section: {}", header.cold_offset);
            }
        }
        if !unit.slots.is_empty() {
            println!("  Slots:");
            for slot in &unit.slots {
                println!(
                    "    tag {:>5}  flags {:#06x}  offset {}",
                    slot.tag, slot.comp_flags, slot.offset
                );
            }
        }
        if !unit.tuples.is_empty() {
            println!("  Tuples:");
            for tuple in &unit.tuples {
                println!(
                    "    tag {:>5}  flags {:#06x}  {} bytes",
                    tuple.tag, tuple.comp_flags, tuple.payload_len
                );
            }
        }
    }
}
