//! Conversion of raw body bytes into text and JSON views.
//!
//! Nothing here is cached: every view is computed from the bytes handed in, so changing the
//! encoding of an exchange changes the next view without touching the stored body.
use encoding_rs::Encoding;
use serde_json::{Map, Value};

use crate::errors::{ExchangeError, MaterializeError};

/// Looks up a WHATWG encoding label (`"utf-8"`, `"latin1"`, `"shift_jis"`, ...).
pub fn encoding_for_label(label: &str) -> Result<&'static Encoding, ExchangeError> {
    Encoding::for_label(label.trim().as_bytes()).ok_or_else(|| ExchangeError::UnknownEncoding(label.to_string()))
}

/// Decodes `body` with `encoding`. Malformed sequences become U+FFFD.
///
/// A leading byte order mark is stripped only when it belongs to `encoding`, so an explicit
/// encoding choice is never overridden by BOM sniffing.
pub fn decode_text(encoding: &'static Encoding, body: &[u8]) -> String {
    let (text, _had_errors) = encoding.decode_with_bom_removal(body);
    text.into_owned()
}

/// Parses the decoded body as a JSON document.
pub fn parse_document(encoding: &'static Encoding, body: &[u8]) -> Result<Value, MaterializeError> {
    if body.is_empty() {
        return Err(MaterializeError::NoData);
    }

    let text = decode_text(encoding, body);
    Ok(serde_json::from_str(&text)?)
}

pub fn into_object(doc: Value) -> Result<Map<String, Value>, MaterializeError> {
    match doc {
        Value::Object(map) => Ok(map),
        other => Err(MaterializeError::UnexpectedShape {
            expected: "object",
            found: shape_name(&other),
        }),
    }
}

pub fn into_array(doc: Value) -> Result<Vec<Value>, MaterializeError> {
    match doc {
        Value::Array(items) => Ok(items),
        other => Err(MaterializeError::UnexpectedShape {
            expected: "array",
            found: shape_name(&other),
        }),
    }
}

fn shape_name(doc: &Value) -> &'static str {
    match doc {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
