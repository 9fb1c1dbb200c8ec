//! Binary schema codec for OBT content payloads.
//!
//! Payloads are flat structs of string fields serialized in the EOSIO ABI
//! binary form: `string` is a varuint32 length followed by UTF-8 bytes, and
//! `string?` is a presence byte followed by the string when present.
//!
//! Each content type has two schema variants. The strict variant declares
//! every field as `string`; the compat variant declares the trailing memo,
//! hash and offline url as `string?`. Outbound payloads are encoded with the
//! compat variant. Inbound payloads carry no version tag, so decoding walks
//! [`DECODE_STRATEGIES`] in order and keeps the first one that parses.

use std::fmt;
use std::str::FromStr;

use bytes::{Buf, BufMut, BytesMut};
use serde_json::{Map, Value};

/// Intermediate representation: field name to string value.
pub type Fields = Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("unknown content type: {0}")]
    UnknownContentType(String),
    #[error("missing field: {0}")]
    MissingField(&'static str),
    #[error("field {0} is not a string")]
    InvalidFieldValue(&'static str),
    #[error("field {0} is too long")]
    FieldTooLong(&'static str),
    #[error("unexpected end of input reading {0}")]
    UnexpectedEof(&'static str),
    #[error("malformed varuint32 length in {0}")]
    MalformedVarint(&'static str),
    #[error("invalid presence flag {flag} for {field}")]
    InvalidPresenceFlag { field: &'static str, flag: u8 },
    #[error("field {0} is not valid UTF-8")]
    InvalidUtf8(&'static str),
    #[error("{0} trailing bytes after last field")]
    TrailingBytes(usize),
    #[error("no schema variant could decode the content")]
    DecodingExhausted,
}

/// Which payload an encrypted content field carries. Known from the ledger
/// action that carried it, never from the ciphertext.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentType {
    /// `new_funds_content`, carried by a funds request.
    Request,
    /// `record_send_content`, carried by an OBT record.
    Record,
}

impl ContentType {
    pub fn schema_name(self) -> &'static str {
        match self {
            Self::Request => "new_funds_content",
            Self::Record => "record_send_content",
        }
    }
}

impl FromStr for ContentType {
    type Err = SchemaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "request" | "new_funds_content" => Ok(Self::Request),
            "record" | "record_send_content" => Ok(Self::Record),
            other => Err(SchemaError::UnknownContentType(other.to_string())),
        }
    }
}

impl fmt::Display for ContentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.schema_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    OptionalString,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDescriptor {
    pub name: &'static str,
    pub ty: FieldType,
}

const fn required(name: &'static str) -> FieldDescriptor {
    FieldDescriptor { name, ty: FieldType::String }
}

const fn optional(name: &'static str) -> FieldDescriptor {
    FieldDescriptor { name, ty: FieldType::OptionalString }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaVariant {
    /// Every field is a required `string`.
    Strict,
    /// Trailing memo, hash and offline url are `string?`.
    Compat,
}

#[derive(Debug)]
pub struct SchemaDescriptor {
    pub name: &'static str,
    pub variant: SchemaVariant,
    pub fields: &'static [FieldDescriptor],
}

impl SchemaDescriptor {
    pub fn field_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.fields.iter().map(|f| f.name)
    }
}

pub static NEW_FUNDS_CONTENT: SchemaDescriptor = SchemaDescriptor {
    name: "new_funds_content",
    variant: SchemaVariant::Strict,
    fields: &[
        required("payee_public_address"),
        required("amount"),
        required("chain_code"),
        required("token_code"),
        required("memo"),
        required("hash"),
        required("offline_url"),
    ],
};

pub static NEW_FUNDS_CONTENT_COMPAT: SchemaDescriptor = SchemaDescriptor {
    name: "new_funds_content",
    variant: SchemaVariant::Compat,
    fields: &[
        required("payee_public_address"),
        required("amount"),
        required("chain_code"),
        required("token_code"),
        optional("memo"),
        optional("hash"),
        optional("offline_url"),
    ],
};

pub static RECORD_SEND_CONTENT: SchemaDescriptor = SchemaDescriptor {
    name: "record_send_content",
    variant: SchemaVariant::Strict,
    fields: &[
        required("payer_public_address"),
        required("payee_public_address"),
        required("amount"),
        required("chain_code"),
        required("token_code"),
        required("status"),
        required("obt_id"),
        required("memo"),
        required("hash"),
        required("offline_url"),
    ],
};

pub static RECORD_SEND_CONTENT_COMPAT: SchemaDescriptor = SchemaDescriptor {
    name: "record_send_content",
    variant: SchemaVariant::Compat,
    fields: &[
        required("payer_public_address"),
        required("payee_public_address"),
        required("amount"),
        required("chain_code"),
        required("token_code"),
        required("status"),
        required("obt_id"),
        optional("memo"),
        optional("hash"),
        optional("offline_url"),
    ],
};

pub fn schema_for(content_type: ContentType, variant: SchemaVariant) -> &'static SchemaDescriptor {
    match (content_type, variant) {
        (ContentType::Request, SchemaVariant::Strict) => &NEW_FUNDS_CONTENT,
        (ContentType::Request, SchemaVariant::Compat) => &NEW_FUNDS_CONTENT_COMPAT,
        (ContentType::Record, SchemaVariant::Strict) => &RECORD_SEND_CONTENT,
        (ContentType::Record, SchemaVariant::Compat) => &RECORD_SEND_CONTENT_COMPAT,
    }
}

fn field_value<'a>(fields: &'a Fields, field: &FieldDescriptor) -> Result<&'a str, SchemaError> {
    match fields.get(field.name) {
        Some(Value::String(s)) => Ok(s),
        None | Some(Value::Null) if field.ty == FieldType::OptionalString => Ok(""),
        None | Some(Value::Null) => Err(SchemaError::MissingField(field.name)),
        Some(_) => Err(SchemaError::InvalidFieldValue(field.name)),
    }
}

fn put_varuint32(buf: &mut BytesMut, mut value: u32) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            buf.put_u8(byte);
            return;
        }
        buf.put_u8(byte | 0x80);
    }
}

fn put_string(buf: &mut BytesMut, field: &'static str, value: &str) -> Result<(), SchemaError> {
    let len = u32::try_from(value.len()).map_err(|_| SchemaError::FieldTooLong(field))?;
    put_varuint32(buf, len);
    buf.put_slice(value.as_bytes());
    Ok(())
}

/// Encode `fields` with `schema`.
///
/// With the compat variant an empty optional field is written as a zero
/// presence byte, except that a trailing run of empty optional fields is
/// left out of the byte stream entirely.
pub fn encode(schema: &SchemaDescriptor, fields: &Fields) -> Result<Vec<u8>, SchemaError> {
    let values = schema
        .fields
        .iter()
        .map(|field| field_value(fields, field))
        .collect::<Result<Vec<_>, _>>()?;

    let mut written = values.len();
    while written > 0
        && schema.fields[written - 1].ty == FieldType::OptionalString
        && values[written - 1].is_empty()
    {
        written -= 1;
    }

    let mut buf = BytesMut::with_capacity(128);
    for (field, value) in schema.fields.iter().zip(&values).take(written) {
        match field.ty {
            FieldType::String => put_string(&mut buf, field.name, value)?,
            FieldType::OptionalString if value.is_empty() => buf.put_u8(0),
            FieldType::OptionalString => {
                buf.put_u8(1);
                put_string(&mut buf, field.name, value)?;
            }
        }
    }
    Ok(buf.to_vec())
}

fn read_varuint32(buf: &mut &[u8], field: &'static str) -> Result<u32, SchemaError> {
    let mut value: u32 = 0;
    for shift in (0..35).step_by(7) {
        if !buf.has_remaining() {
            return Err(SchemaError::UnexpectedEof(field));
        }
        let byte = buf.get_u8();
        if shift == 28 && byte > 0x0f {
            return Err(SchemaError::MalformedVarint(field));
        }
        value |= u32::from(byte & 0x7f) << shift;
        if byte & 0x80 == 0 {
            return Ok(value);
        }
    }
    Err(SchemaError::MalformedVarint(field))
}

fn read_string(buf: &mut &[u8], field: &'static str) -> Result<String, SchemaError> {
    let len = read_varuint32(buf, field)? as usize;
    if buf.remaining() < len {
        return Err(SchemaError::UnexpectedEof(field));
    }
    let raw = buf[..len].to_vec();
    buf.advance(len);
    String::from_utf8(raw).map_err(|_| SchemaError::InvalidUtf8(field))
}

/// Decode `bytes` exactly as `schema` declares them. Every byte must be
/// consumed.
pub fn decode(schema: &SchemaDescriptor, bytes: &[u8]) -> Result<Fields, SchemaError> {
    let mut buf = bytes;
    let mut fields = Fields::new();
    for field in schema.fields {
        let value = match field.ty {
            FieldType::String => read_string(&mut buf, field.name)?,
            // End of input at an optional field: it and everything after it
            // were omitted.
            FieldType::OptionalString if !buf.has_remaining() => String::new(),
            FieldType::OptionalString => match buf.get_u8() {
                0 => String::new(),
                1 => read_string(&mut buf, field.name)?,
                flag => {
                    return Err(SchemaError::InvalidPresenceFlag {
                        field: field.name,
                        flag,
                    })
                }
            },
        };
        fields.insert(field.name.to_string(), Value::String(value));
    }
    if buf.has_remaining() {
        return Err(SchemaError::TrailingBytes(buf.remaining()));
    }
    Ok(fields)
}

/// Read length-prefixed strings in declared order with no schema rules.
/// Fields past the end of input are empty; bytes past the last field are
/// ignored.
pub fn decode_positional(schema: &SchemaDescriptor, bytes: &[u8]) -> Result<Fields, SchemaError> {
    let mut buf = bytes;
    if !buf.has_remaining() {
        let first = schema.fields.first().map_or("payload", |f| f.name);
        return Err(SchemaError::UnexpectedEof(first));
    }
    let mut fields = Fields::new();
    for field in schema.fields {
        let value = if buf.has_remaining() {
            read_string(&mut buf, field.name)?
        } else {
            String::new()
        };
        fields.insert(field.name.to_string(), Value::String(value));
    }
    Ok(fields)
}

/// One way of reading an untagged payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeStrategy {
    /// Compat schema, trailing optional fields.
    Compat,
    /// Strict schema, every field required.
    Strict,
    /// Plain string sequence in declared order.
    Positional,
}

/// Tried in this order; the first success wins.
pub const DECODE_STRATEGIES: [DecodeStrategy; 3] = [
    DecodeStrategy::Compat,
    DecodeStrategy::Strict,
    DecodeStrategy::Positional,
];

impl DecodeStrategy {
    pub fn decode(self, content_type: ContentType, bytes: &[u8]) -> Result<Fields, SchemaError> {
        match self {
            Self::Compat => decode(schema_for(content_type, SchemaVariant::Compat), bytes),
            Self::Strict => decode(schema_for(content_type, SchemaVariant::Strict), bytes),
            Self::Positional => {
                decode_positional(schema_for(content_type, SchemaVariant::Strict), bytes)
            }
        }
    }
}

/// Fields decoded by [`decode_with_fallback`] and the strategy that read them.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded {
    pub strategy: DecodeStrategy,
    pub fields: Fields,
}

pub fn decode_with_fallback(content_type: ContentType, bytes: &[u8]) -> Result<Decoded, SchemaError> {
    for strategy in DECODE_STRATEGIES {
        match strategy.decode(content_type, bytes) {
            Ok(fields) => {
                tracing::debug!(
                    schema = content_type.schema_name(),
                    ?strategy,
                    len = bytes.len(),
                    "decoded content"
                );
                return Ok(Decoded { strategy, fields });
            }
            Err(err) => {
                tracing::trace!(
                    schema = content_type.schema_name(),
                    ?strategy,
                    error = %err,
                    "decode strategy rejected content"
                );
            }
        }
    }
    tracing::debug!(
        schema = content_type.schema_name(),
        len = bytes.len(),
        "no decode strategy accepted content"
    );
    Err(SchemaError::DecodingExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn fields(value: Value) -> Fields {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    fn request_fields(memo: &str, hash: &str, offline_url: &str) -> Fields {
        fields(json!({
            "payee_public_address": "addr1",
            "amount": "1.0000",
            "chain_code": "FIO",
            "token_code": "FIO",
            "memo": memo,
            "hash": hash,
            "offline_url": offline_url,
        }))
    }

    fn strings(values: &[&str]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        for v in values {
            put_string(&mut buf, "test", v).unwrap();
        }
        buf.to_vec()
    }

    #[test]
    fn test_content_type_names() {
        assert_eq!("request".parse::<ContentType>().unwrap(), ContentType::Request);
        assert_eq!("new_funds_content".parse::<ContentType>().unwrap(), ContentType::Request);
        assert_eq!("RECORD".parse::<ContentType>().unwrap(), ContentType::Record);
        assert_eq!(ContentType::Record.to_string(), "record_send_content");
        assert_eq!(
            "cancel".parse::<ContentType>().unwrap_err(),
            SchemaError::UnknownContentType("cancel".into())
        );
    }

    #[test]
    fn test_descriptors_share_field_order() {
        for ct in [ContentType::Request, ContentType::Record] {
            let strict: Vec<_> = schema_for(ct, SchemaVariant::Strict).field_names().collect();
            let compat: Vec<_> = schema_for(ct, SchemaVariant::Compat).field_names().collect();
            assert_eq!(strict, compat);
            assert_eq!(&strict[strict.len() - 3..], &["memo", "hash", "offline_url"]);
        }
        assert_eq!(NEW_FUNDS_CONTENT.fields.len(), 7);
        assert_eq!(RECORD_SEND_CONTENT.fields.len(), 10);
    }

    #[test]
    fn test_compat_omits_trailing_empty_optionals() {
        let bytes = encode(&NEW_FUNDS_CONTENT_COMPAT, &request_fields("", "", "")).unwrap();
        assert_eq!(bytes, strings(&["addr1", "1.0000", "FIO", "FIO"]));
    }

    #[test]
    fn test_compat_flags_present_optionals() {
        let bytes = encode(&NEW_FUNDS_CONTENT_COMPAT, &request_fields("", "abc", "")).unwrap();
        let mut expected = strings(&["addr1", "1.0000", "FIO", "FIO"]);
        expected.extend_from_slice(&[0, 1, 3, b'a', b'b', b'c']);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn test_strict_writes_every_field() {
        let bytes = encode(&NEW_FUNDS_CONTENT, &request_fields("", "", "")).unwrap();
        assert_eq!(bytes, strings(&["addr1", "1.0000", "FIO", "FIO", "", "", ""]));
    }

    #[test]
    fn test_encode_missing_required_field() {
        let mut f = request_fields("", "", "");
        f.remove("amount");
        assert_eq!(
            encode(&NEW_FUNDS_CONTENT_COMPAT, &f).unwrap_err(),
            SchemaError::MissingField("amount")
        );

        let mut f = request_fields("", "", "");
        f.remove("memo");
        assert_eq!(encode(&NEW_FUNDS_CONTENT, &f).unwrap_err(), SchemaError::MissingField("memo"));
        assert!(encode(&NEW_FUNDS_CONTENT_COMPAT, &f).is_ok());
    }

    #[test]
    fn test_encode_non_string_value() {
        let mut f = request_fields("", "", "");
        f.insert("amount".into(), json!(1.5));
        assert_eq!(
            encode(&NEW_FUNDS_CONTENT_COMPAT, &f).unwrap_err(),
            SchemaError::InvalidFieldValue("amount")
        );
    }

    #[test]
    fn test_varuint32_multi_byte() {
        let long = "x".repeat(300);
        let bytes = strings(&[&long]);
        assert_eq!(&bytes[..2], &[0xac, 0x02]);

        let mut buf = bytes.as_slice();
        assert_eq!(read_string(&mut buf, "test").unwrap(), long);
        assert!(buf.is_empty());
    }

    #[test]
    fn test_varuint32_overflow_rejected() {
        let mut buf: &[u8] = &[0xff, 0xff, 0xff, 0xff, 0x7f];
        assert_eq!(
            read_varuint32(&mut buf, "test").unwrap_err(),
            SchemaError::MalformedVarint("test")
        );
    }

    #[test]
    fn test_compat_decode_rejects_trailing_bytes() {
        let mut bytes = strings(&["addr1", "1.0000", "FIO", "FIO"]);
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(
            decode(&NEW_FUNDS_CONTENT_COMPAT, &bytes).unwrap_err(),
            SchemaError::TrailingBytes(1)
        );
    }

    #[test]
    fn test_fallback_compat_first() {
        let bytes = encode(&NEW_FUNDS_CONTENT_COMPAT, &request_fields("", "", "")).unwrap();
        let decoded = decode_with_fallback(ContentType::Request, &bytes).unwrap();
        assert_eq!(decoded.strategy, DecodeStrategy::Compat);
        assert_eq!(decoded.fields, request_fields("", "", ""));
    }

    #[test]
    fn test_fallback_to_strict() {
        let full = request_fields("for lunch", "deadbeef", "https://example.com/obt");
        let bytes = encode(&NEW_FUNDS_CONTENT, &full).unwrap();
        assert!(decode(&NEW_FUNDS_CONTENT_COMPAT, &bytes).is_err());

        let decoded = decode_with_fallback(ContentType::Request, &bytes).unwrap();
        assert_eq!(decoded.strategy, DecodeStrategy::Strict);
        assert_eq!(decoded.fields, full);
    }

    #[test]
    fn test_strict_and_compat_encodings_decode_alike() {
        let full = request_fields("m", "h", "u");
        let strict = encode(&NEW_FUNDS_CONTENT, &full).unwrap();
        let compat = encode(&NEW_FUNDS_CONTENT_COMPAT, &full).unwrap();
        assert_ne!(strict, compat);
        assert_eq!(
            decode_with_fallback(ContentType::Request, &strict).unwrap().fields,
            decode_with_fallback(ContentType::Request, &compat).unwrap().fields
        );
    }

    #[test]
    fn test_fallback_to_positional() {
        // Five strings: not a strict record (ten fields), not a compat
        // record (seven required fields).
        let bytes = strings(&["payer", "payee", "2.5", "BTC", "BTC"]);
        let decoded = decode_with_fallback(ContentType::Record, &bytes).unwrap();
        assert_eq!(decoded.strategy, DecodeStrategy::Positional);
        assert_eq!(decoded.fields["payer_public_address"], "payer");
        assert_eq!(decoded.fields["token_code"], "BTC");
        assert_eq!(decoded.fields["status"], "");
        assert_eq!(decoded.fields["offline_url"], "");
    }

    #[test]
    fn test_unrecognized_bytes_exhaust_fallback() {
        for bytes in [
            vec![0xff, 0xff, 0xff, 0xff, 0xff, 0xff],
            vec![0x20, b'a', b'b'],
            vec![0x02, 0xc3, 0x28],
            vec![],
        ] {
            assert_eq!(
                decode_with_fallback(ContentType::Request, &bytes).unwrap_err(),
                SchemaError::DecodingExhausted,
                "input {bytes:?}"
            );
        }
    }
}
