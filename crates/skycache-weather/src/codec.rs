//! Weather payload codec: raw provider JSON to [`WeatherRecord`] and back.
//!
//! Pure functions, no I/O.

use serde_json::Value;

use crate::error::CodecError;
use crate::types::WeatherRecord;

/// Parse and validate a raw payload.
///
/// The top level must be a JSON object carrying a `days` array; every day
/// needs a `datetime` date.
pub fn decode(raw: &[u8]) -> Result<WeatherRecord, CodecError> {
    let value: Value = serde_json::from_slice(raw)
        .map_err(|e| CodecError::MalformedPayload(format!("invalid JSON: {}", e)))?;

    if !value.is_object() {
        return Err(CodecError::MalformedPayload(format!(
            "expected a JSON object, found {}",
            kind_of(&value)
        )));
    }

    serde_json::from_value(value).map_err(|e| CodecError::MalformedPayload(e.to_string()))
}

/// Serialize a record back to provider-shaped JSON.
pub fn encode(record: &WeatherRecord) -> Result<Vec<u8>, CodecError> {
    serde_json::to_vec(record).map_err(|e| CodecError::Encode(e.to_string()))
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
