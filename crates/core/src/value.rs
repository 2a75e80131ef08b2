//! Property values and their tagged wire form.
//!
//! | Value | Wire tag |
//! |---|---|
//! | `Bool` | `bool_value` |
//! | `Double`, non-integral or out of integer range | `double_value` |
//! | `Double` integral, `Int`, `UInt` with value >= 0 | `pos_int_value` (magnitude) |
//! | `Double` integral, `Int` with value < 0 | `neg_int_value` (magnitude) |
//! | `String` | `string_value` |
//! | `Json` | `json_value` (serialized text) |
//!
//! Decoding is lossy in two documented ways: positive integers come back as
//! `UInt`, and JSON text comes back as a `String` holding the text.

use serde::Serialize;

use crate::geobuf::data::value::ValueType;
use crate::geobuf::data::Value;
use crate::{Error, Result};

/// 2^63, the magnitude of `i64::MIN`.
const I64_MIN_MAGNITUDE: u64 = 1 << 63;

/// A typed feature property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Bool(bool),
    Double(f64),
    String(String),
    Int(i64),
    UInt(u64),
    /// Any composite value (array, object, null), stored as JSON text.
    Json(serde_json::Value),
}

impl PropertyValue {
    /// Build a JSON property from any serializable value.
    ///
    /// Fails with [`Error::UnsupportedValueType`] when the value has no JSON
    /// representation, e.g. a map with non-string keys.
    pub fn json_from<T: Serialize + ?Sized>(value: &T) -> Result<Self> {
        serde_json::to_value(value)
            .map(PropertyValue::Json)
            .map_err(|e| Error::UnsupportedValueType(e.to_string()))
    }
}

impl From<bool> for PropertyValue {
    fn from(value: bool) -> Self {
        PropertyValue::Bool(value)
    }
}

impl From<f64> for PropertyValue {
    fn from(value: f64) -> Self {
        PropertyValue::Double(value)
    }
}

impl From<i64> for PropertyValue {
    fn from(value: i64) -> Self {
        PropertyValue::Int(value)
    }
}

impl From<i32> for PropertyValue {
    fn from(value: i32) -> Self {
        PropertyValue::Int(value.into())
    }
}

impl From<u64> for PropertyValue {
    fn from(value: u64) -> Self {
        PropertyValue::UInt(value)
    }
}

impl From<&str> for PropertyValue {
    fn from(value: &str) -> Self {
        PropertyValue::String(value.to_string())
    }
}

impl From<String> for PropertyValue {
    fn from(value: String) -> Self {
        PropertyValue::String(value)
    }
}

impl From<serde_json::Value> for PropertyValue {
    /// Scalars map to their typed variants; everything else stays JSON.
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Bool(b) => PropertyValue::Bool(b),
            serde_json::Value::String(s) => PropertyValue::String(s),
            serde_json::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    PropertyValue::Int(i)
                } else if let Some(u) = n.as_u64() {
                    PropertyValue::UInt(u)
                } else {
                    PropertyValue::Double(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            other => PropertyValue::Json(other),
        }
    }
}

impl From<&PropertyValue> for serde_json::Value {
    fn from(value: &PropertyValue) -> Self {
        match value {
            PropertyValue::Bool(b) => serde_json::Value::Bool(*b),
            // JSON has no NaN or infinity
            PropertyValue::Double(d) => serde_json::Number::from_f64(*d)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            PropertyValue::String(s) => serde_json::Value::String(s.clone()),
            PropertyValue::Int(i) => serde_json::Value::from(*i),
            PropertyValue::UInt(u) => serde_json::Value::from(*u),
            PropertyValue::Json(v) => v.clone(),
        }
    }
}

/// Integer tag for an integral double that fits the supported range.
fn integral_double(value: f64) -> Option<ValueType> {
    // Both bounds are powers of two and therefore exact.
    const POS_LIMIT: f64 = 18_446_744_073_709_551_616.0;
    const NEG_LIMIT: f64 = -9_223_372_036_854_775_808.0;

    if !value.is_finite() || value.fract() != 0.0 {
        return None;
    }
    if value >= 0.0 && value < POS_LIMIT {
        Some(ValueType::PosIntValue(value as u64))
    } else if value < 0.0 && value >= NEG_LIMIT {
        Some(ValueType::NegIntValue((value as i64).unsigned_abs()))
    } else {
        None
    }
}

/// Encode a property value into its tagged wire form.
pub fn encode_value(value: &PropertyValue) -> Result<Value> {
    let value_type = match value {
        PropertyValue::Bool(b) => ValueType::BoolValue(*b),
        PropertyValue::Double(d) => integral_double(*d).unwrap_or(ValueType::DoubleValue(*d)),
        PropertyValue::String(s) => ValueType::StringValue(s.clone()),
        PropertyValue::Int(i) if *i >= 0 => ValueType::PosIntValue(i.unsigned_abs()),
        // unsigned_abs keeps i64::MIN representable
        PropertyValue::Int(i) => ValueType::NegIntValue(i.unsigned_abs()),
        PropertyValue::UInt(u) => ValueType::PosIntValue(*u),
        PropertyValue::Json(v) => ValueType::JsonValue(
            serde_json::to_string(v).map_err(|e| Error::UnsupportedValueType(e.to_string()))?,
        ),
    };

    Ok(Value {
        value_type: Some(value_type),
    })
}

/// Decode a tagged wire value.
pub fn decode_value(value: &Value) -> Result<PropertyValue> {
    let value_type = value
        .value_type
        .as_ref()
        .ok_or_else(|| Error::MalformedMessage("value carries no type tag".to_string()))?;

    Ok(match value_type {
        ValueType::BoolValue(b) => PropertyValue::Bool(*b),
        ValueType::DoubleValue(d) => PropertyValue::Double(*d),
        ValueType::StringValue(s) => PropertyValue::String(s.clone()),
        ValueType::PosIntValue(u) => PropertyValue::UInt(*u),
        ValueType::NegIntValue(magnitude) if *magnitude <= I64_MIN_MAGNITUDE => {
            // 2^63 wraps to i64::MIN, which negates to itself.
            PropertyValue::Int((*magnitude as i64).wrapping_neg())
        }
        ValueType::NegIntValue(magnitude) => {
            log::debug!(
                "Negative integer magnitude {} exceeds i64, decoding as double",
                magnitude
            );
            PropertyValue::Double(-(*magnitude as f64))
        }
        ValueType::JsonValue(text) => PropertyValue::String(text.clone()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn tag(value: PropertyValue) -> ValueType {
        encode_value(&value).unwrap().value_type.unwrap()
    }

    fn roundtrip(value: PropertyValue) -> PropertyValue {
        decode_value(&encode_value(&value).unwrap()).unwrap()
    }

    #[test]
    fn test_encode_int_values() {
        assert_eq!(tag(PropertyValue::Int(1)), ValueType::PosIntValue(1));
        assert_eq!(tag(PropertyValue::Int(-1)), ValueType::NegIntValue(1));
        assert_eq!(tag(PropertyValue::Int(-128)), ValueType::NegIntValue(128));
        assert_eq!(tag(PropertyValue::Int(0)), ValueType::PosIntValue(0));
        assert_eq!(tag(PropertyValue::UInt(36)), ValueType::PosIntValue(36));
        assert_eq!(tag(PropertyValue::UInt(u64::MAX)), ValueType::PosIntValue(u64::MAX));
        assert_eq!(
            tag(PropertyValue::Int(i64::MAX)),
            ValueType::PosIntValue(9_223_372_036_854_775_807)
        );
    }

    #[test]
    fn test_i64_min_boundary() {
        assert_eq!(
            tag(PropertyValue::Int(i64::MIN)),
            ValueType::NegIntValue(9_223_372_036_854_775_808)
        );
        assert_eq!(roundtrip(PropertyValue::Int(i64::MIN)), PropertyValue::Int(i64::MIN));
    }

    #[test]
    fn test_encode_double_values() {
        assert_eq!(tag(PropertyValue::Double(12.5)), ValueType::DoubleValue(12.5));
        assert_eq!(tag(PropertyValue::Double(128.123)), ValueType::DoubleValue(128.123));
        assert_eq!(tag(PropertyValue::Double(12.0)), ValueType::PosIntValue(12));
        assert_eq!(tag(PropertyValue::Double(-3.0)), ValueType::NegIntValue(3));
        assert_eq!(tag(PropertyValue::Double(1e20)), ValueType::DoubleValue(1e20));
        assert_eq!(tag(PropertyValue::Double(-1e19)), ValueType::DoubleValue(-1e19));
        assert!(matches!(
            tag(PropertyValue::Double(f64::INFINITY)),
            ValueType::DoubleValue(d) if d.is_infinite()
        ));
    }

    #[test]
    fn test_encode_string_bool_json() {
        assert_eq!(
            tag(PropertyValue::from("Testing 123")),
            ValueType::StringValue("Testing 123".to_string())
        );
        assert_eq!(tag(PropertyValue::Bool(false)), ValueType::BoolValue(false));
        assert_eq!(
            tag(PropertyValue::Json(json!(["A", "B", "C"]))),
            ValueType::JsonValue(r#"["A","B","C"]"#.to_string())
        );
        assert_eq!(
            tag(PropertyValue::Json(json!({"1": 1}))),
            ValueType::JsonValue(r#"{"1":1}"#.to_string())
        );
    }

    #[test]
    fn test_roundtrip_scalars() {
        assert_eq!(roundtrip(PropertyValue::Bool(true)), PropertyValue::Bool(true));
        assert_eq!(roundtrip(PropertyValue::Double(128.123)), PropertyValue::Double(128.123));
        assert_eq!(roundtrip(PropertyValue::from("text")), PropertyValue::from("text"));
        assert_eq!(roundtrip(PropertyValue::Int(-42)), PropertyValue::Int(-42));
        assert_eq!(roundtrip(PropertyValue::Int(42)), PropertyValue::UInt(42));
        assert_eq!(roundtrip(PropertyValue::UInt(u64::MAX)), PropertyValue::UInt(u64::MAX));
    }

    #[test]
    fn test_json_decodes_to_text() {
        let decoded = roundtrip(PropertyValue::Json(json!({"a": [1, 2]})));
        let PropertyValue::String(text) = decoded else {
            panic!("expected JSON text");
        };
        let reparsed: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(reparsed, json!({"a": [1, 2]}));
    }

    #[test]
    fn test_json_from_rejects_non_string_keys() {
        let mut map = HashMap::new();
        map.insert((1, 2), "tuple key");
        assert!(matches!(
            PropertyValue::json_from(&map),
            Err(Error::UnsupportedValueType(_))
        ));

        assert_eq!(
            PropertyValue::json_from(&vec!["A", "B"]).unwrap(),
            PropertyValue::Json(json!(["A", "B"]))
        );
    }

    #[test]
    fn test_decode_oversized_negative_magnitude() {
        let value = Value {
            value_type: Some(ValueType::NegIntValue(u64::MAX)),
        };
        assert_eq!(
            decode_value(&value).unwrap(),
            PropertyValue::Double(-(u64::MAX as f64))
        );
    }

    #[test]
    fn test_decode_untagged_value() {
        assert!(matches!(
            decode_value(&Value::default()),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_from_json_value() {
        assert_eq!(PropertyValue::from(json!(7)), PropertyValue::Int(7));
        assert_eq!(PropertyValue::from(json!(u64::MAX)), PropertyValue::UInt(u64::MAX));
        assert_eq!(PropertyValue::from(json!(1.5)), PropertyValue::Double(1.5));
        assert_eq!(PropertyValue::from(json!(null)), PropertyValue::Json(json!(null)));
        assert_eq!(
            serde_json::Value::from(&PropertyValue::Double(f64::NAN)),
            serde_json::Value::Null
        );
    }
}
