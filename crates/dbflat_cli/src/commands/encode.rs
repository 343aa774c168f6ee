//! Encode command implementation.

use super::CommandResult;
use dbflat_core::{CompFlags, Encoder, FieldBuf, LayoutPlan, Strategy};
use serde::Deserialize;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// One entry of the JSON field list.
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FieldSpec {
    /// Field tag.
    pub tag: u16,
    /// Raw comp_flags; defaults to 0.
    #[serde(default)]
    pub comp_flags: u16,
    /// Payload as hex.
    #[serde(default)]
    pub hex: Option<String>,
    /// Payload as UTF-8 text.
    #[serde(default)]
    pub text: Option<String>,
    /// Whether the field is hot.
    #[serde(default)]
    pub hot: bool,
}

impl FieldSpec {
    fn payload(&self) -> CommandResult<Vec<u8>> {
        match (&self.hex, &self.text) {
            (Some(hex), None) => {
                hex::decode(hex).map_err(|e| format!("tag {}: bad hex: {e}", self.tag).into())
            }
            (None, Some(text)) => Ok(text.as_bytes().to_vec()),
            (None, None) => Ok(Vec::new()),
            (Some(_), Some(_)) => Err(format!("tag {}: give either hex or text", self.tag).into()),
        }
    }
}

/// Layout options for the encode command.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Layout strategy.
    pub strategy: Strategy,
    /// Align fixed-width fields.
    pub align: bool,
    /// Schema id to write.
    pub schema_id: Option<u64>,
    /// Append instead of truncating the output.
    pub append: bool,
}

/// Runs the encode command.
pub fn run(input: &Path, output: &Path, options: &EncodeOptions) -> CommandResult<()> {
    let json = std::fs::read_to_string(input)?;
    let specs: Vec<FieldSpec> = serde_json::from_str(&json)?;
    let bytes = encode_specs(&specs, options)?;

    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .write(true)
        .append(options.append)
        .truncate(!options.append)
        .open(output)?;
    file.write_all(&bytes)?;
    file.flush()?;

    info!(
        fields = specs.len(),
        bytes = bytes.len(),
        strategy = %options.strategy,
        "wrote {}",
        output.display()
    );
    Ok(())
}

/// Encode a parsed field list.
pub fn encode_specs(specs: &[FieldSpec], options: &EncodeOptions) -> CommandResult<Vec<u8>> {
    let fields = specs
        .iter()
        .map(|spec| {
            Ok(FieldBuf::new(
                spec.tag,
                CompFlags::from_bits(spec.comp_flags),
                spec.payload()?,
            ))
        })
        .collect::<CommandResult<Vec<_>>>()?;
    let hot: Vec<u16> = specs.iter().filter(|s| s.hot).map(|s| s.tag).collect();

    let mut plan = LayoutPlan::new(&fields)
        .strategy(options.strategy)
        .hot_tags(&hot)
        .align(options.align);
    if let Some(id) = options.schema_id {
        plan = plan.schema_id(id);
    }
    Ok(Encoder::default().encode_to_vec(&plan)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbflat_core::{Decoder, Header};

    fn specs(json: &str) -> Vec<FieldSpec> {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn encodes_text_and_hex() {
        let specs = specs(
            r#"[
                { "tag": 2, "comp_flags": 32768, "text": "bob", "hot": true },
                { "tag": 1, "comp_flags": 32768, "hex": "616c696365", "hot": true },
                { "tag": 9, "comp_flags": 32770, "text": "aaaaaaaaaaaaaaaa" }
            ]"#,
        );
        let options = EncodeOptions {
            schema_id: Some(112),
            ..EncodeOptions::default()
        };
        let buf = encode_specs(&specs, &options).unwrap();

        let header = Header::parse(&buf).unwrap();
        assert_eq!(header.schema_id, Some(112));
        let decoder = Decoder::default();
        assert_eq!(&*decoder.read_hot_field(&buf, 1, 0).unwrap(), b"alice");
        let record = decoder.decode_record(&buf).unwrap();
        assert_eq!(record.payload(9), Some(&b"aaaaaaaaaaaaaaaa"[..]));
    }

    #[test]
    fn tagwalk_output_has_no_header() {
        let specs = specs(r#"[{ "tag": 4, "comp_flags": 32768, "text": "x" }]"#);
        let options = EncodeOptions {
            strategy: Strategy::TagWalk,
            ..EncodeOptions::default()
        };
        let buf = encode_specs(&specs, &options).unwrap();
        assert_eq!(buf, vec![4, 0, 0x00, 0x80, 1, b'x']);
    }

    #[test]
    fn rejects_bad_entries() {
        let both = specs(r#"[{ "tag": 1, "hex": "00", "text": "a" }]"#);
        assert!(encode_specs(&both, &EncodeOptions::default()).is_err());

        let bad_hex = specs(r#"[{ "tag": 1, "hex": "zz" }]"#);
        assert!(encode_specs(&bad_hex, &EncodeOptions::default()).is_err());

        let dup = specs(r#"[{ "tag": 1, "text": "a" }, { "tag": 1, "text": "b" }]"#);
        assert!(encode_specs(&dup, &EncodeOptions::default()).is_err());

        assert!(serde_json::from_str::<Vec<FieldSpec>>(r#"[{ "tag": 1, "colour": 2 }]"#).is_err());
    }

    #[test]
    fn run_appends_records() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("fields.json");
        let output = dir.path().join("out.dbf");
        std::fs::write(&input, r#"[{ "tag": 1, "comp_flags": 32768, "text": "a", "hot": true }]"#)
            .unwrap();

        let options = EncodeOptions::default();
        run(&input, &output, &options).unwrap();
        let single = std::fs::read(&output).unwrap().len();

        let options = EncodeOptions {
            append: true,
            ..options
        };
        run(&input, &output, &options).unwrap();
        assert_eq!(std::fs::read(&output).unwrap().len(), 2 * single);

        run(&input, &output, &EncodeOptions::default()).unwrap();
        assert_eq!(std::fs::read(&output).unwrap().len(), single);
    }
}
