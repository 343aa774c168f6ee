//! Application-type fixtures.
//!
//! `Transaction` and `TransactionV2` model one schema at two versions: v2
//! adds a hot `id` field under tag 4. Both map onto the same tags so each
//! version can read records written by the other.

use dbflat_codec::{FieldType, Value};
use dbflat_core::{
    read_value, require_bytes, require_value, Builder, DbflatError, DbflatResult, FieldLookup,
    FieldSink, FromFields, HeaderFlags, Schema, ToFields,
};

/// Schema id shared by both transaction versions.
pub const TRANSACTION_SCHEMA_ID: u64 = 112;

/// Tag of the sender field.
pub const TAG_SENDER: u16 = 1;
/// Tag of the receiver field.
pub const TAG_RECEIVER: u16 = 2;
/// Tag of the amount field.
pub const TAG_AMOUNT: u16 = 3;
/// Tag of the id field added in v2.
pub const TAG_ID: u16 = 4;
/// Tag of the memo field.
pub const TAG_MEMO: u16 = 10;

/// Version 1 of the transaction schema.
pub const TRANSACTION_SCHEMA_V1: &str = r#"{
    "schema_id": 112,
    "version": 1,
    "fields": [
        { "name": "sender", "tag": 1, "comp_flags": 32768, "length": -1, "hot": true, "type": "string" },
        { "name": "receiver", "tag": 2, "comp_flags": 32768, "length": -1, "hot": true, "type": "string" },
        { "name": "amount", "tag": 3, "length": 8, "hot": true, "type": "u64" },
        { "name": "memo", "tag": 10, "comp_flags": 32770, "length": -1, "type": "string" }
    ]
}"#;

/// Version 2 of the transaction schema.
pub const TRANSACTION_SCHEMA_V2: &str = r#"{
    "schema_id": 112,
    "version": 2,
    "fields": [
        { "name": "sender", "tag": 1, "comp_flags": 32768, "length": -1, "hot": true, "type": "string" },
        { "name": "receiver", "tag": 2, "comp_flags": 32768, "length": -1, "hot": true, "type": "string" },
        { "name": "amount", "tag": 3, "length": 8, "hot": true, "type": "u64" },
        { "name": "id", "tag": 4, "comp_flags": 32768, "length": -1, "hot": true, "type": "string" },
        { "name": "memo", "tag": 10, "comp_flags": 32770, "length": -1, "type": "string" }
    ]
}"#;

/// Parse the transaction schema at `version` (1 or 2).
///
/// # Panics
///
/// Panics for any other version; the fixtures are fixed documents.
#[must_use]
pub fn transaction_schema(version: u32) -> Schema {
    let json = match version {
        1 => TRANSACTION_SCHEMA_V1,
        2 => TRANSACTION_SCHEMA_V2,
        other => panic!("no transaction schema version {other}"),
    };
    Schema::from_json(json).expect("fixture schema is valid")
}

fn text(value: Value, tag: u16) -> DbflatResult<String> {
    match value {
        Value::String(s) => Ok(s),
        _ => Err(DbflatError::MissingField { tag }),
    }
}

fn push_memo(sink: &mut dyn FieldSink, memo: &str) {
    // Memos compress well with Huffman.
    sink.push_field(
        TAG_MEMO,
        dbflat_core::CompFlags::array(dbflat_codec::COMP_HUFFMAN),
        memo.as_bytes(),
        false,
    );
}

/// A transfer between two accounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    /// Sending account.
    pub sender: String,
    /// Receiving account.
    pub receiver: String,
    /// Amount in minor units.
    pub amount: u64,
    /// Free-form note.
    pub memo: String,
}

impl ToFields for Transaction {
    fn to_fields(&self, sink: &mut dyn FieldSink) -> DbflatResult<()> {
        sink.push_value(TAG_SENDER, &Value::String(self.sender.clone()), true);
        sink.push_value(TAG_RECEIVER, &Value::String(self.receiver.clone()), true);
        sink.push_value(TAG_AMOUNT, &Value::U64(self.amount), true);
        push_memo(sink, &self.memo);
        Ok(())
    }
}

impl FromFields for Transaction {
    fn from_fields<'a>(source: &dyn FieldLookup<'a>) -> DbflatResult<Self> {
        let sender = text(require_value(source, TAG_SENDER, FieldType::String)?, TAG_SENDER)?;
        let receiver = text(
            require_value(source, TAG_RECEIVER, FieldType::String)?,
            TAG_RECEIVER,
        )?;
        let Value::U64(amount) = require_value(source, TAG_AMOUNT, FieldType::U64)? else {
            return Err(DbflatError::MissingField { tag: TAG_AMOUNT });
        };
        let memo = String::from_utf8_lossy(&require_bytes(source, TAG_MEMO)?).into_owned();
        Ok(Self {
            sender,
            receiver,
            amount,
            memo,
        })
    }
}

/// [`Transaction`] with an optional transaction id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionV2 {
    /// Fields shared with v1.
    pub base: Transaction,
    /// Transaction id; absent in records written by v1.
    pub id: Option<String>,
}

impl ToFields for TransactionV2 {
    fn to_fields(&self, sink: &mut dyn FieldSink) -> DbflatResult<()> {
        self.base.to_fields(sink)?;
        if let Some(id) = &self.id {
            sink.push_value(TAG_ID, &Value::String(id.clone()), true);
        }
        Ok(())
    }
}

impl FromFields for TransactionV2 {
    fn from_fields<'a>(source: &dyn FieldLookup<'a>) -> DbflatResult<Self> {
        let base = Transaction::from_fields(source)?;
        let id = read_value(source, TAG_ID, FieldType::String)?
            .map(|value| text(value, TAG_ID))
            .transpose()?;
        Ok(Self { base, id })
    }
}

/// A transaction with recognisable field values.
#[must_use]
pub fn sample_transaction() -> Transaction {
    Transaction {
        sender: "Hello I'm Test 1".into(),
        receiver: "Hello I'm Test 2".into(),
        amount: 300,
        memo: "rent rent rent rent rent".into(),
    }
}

/// Encode `value` as one full-vtable record under the transaction schema id.
///
/// # Errors
///
/// Propagates encoder errors.
pub fn encode_transaction<T: ToFields + ?Sized>(value: &T) -> DbflatResult<Vec<u8>> {
    let mut builder = Builder::new();
    value.to_fields(&mut builder)?;
    Ok(builder
        .commit(TRANSACTION_SCHEMA_ID, HeaderFlags::SCHEMA_ID)?
        .to_vec())
}
