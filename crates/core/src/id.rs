//! Feature identifiers.
//!
//! Identifiers that fit a signed 64-bit integer travel as `int_id`; anything
//! else travels as its text in `id`. A string identifier is never coerced to
//! an integer, so `"1234"` decodes back to the string `"1234"`.

use std::fmt;

use crate::geobuf::data::feature::IdType;

/// Identifier of a feature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FeatureId {
    Int(i64),
    String(String),
}

impl FeatureId {
    /// Identifier for an unsigned integer, falling back to its text when it
    /// exceeds `i64::MAX`.
    pub fn from_u64(value: u64) -> Self {
        match i64::try_from(value) {
            Ok(i) => FeatureId::Int(i),
            Err(_) => {
                log::debug!("Feature id {} overflows i64, storing as string", value);
                FeatureId::String(value.to_string())
            }
        }
    }

    /// Identifier for a floating-point number. Integral values in the `i64`
    /// range become integer ids; everything else keeps its textual form.
    pub fn from_f64(value: f64) -> Self {
        const LIMIT: f64 = 9_223_372_036_854_775_808.0;
        if value.fract() == 0.0 && (-LIMIT..LIMIT).contains(&value) {
            FeatureId::Int(value as i64)
        } else {
            log::debug!("Feature id {} is not an i64, storing as string", value);
            FeatureId::String(value.to_string())
        }
    }

    /// Identifier for a JSON number.
    pub fn from_number(number: &serde_json::Number) -> Self {
        if let Some(i) = number.as_i64() {
            FeatureId::Int(i)
        } else if let Some(u) = number.as_u64() {
            FeatureId::from_u64(u)
        } else {
            match number.as_f64() {
                Some(f) if f.fract() == 0.0 => FeatureId::from_f64(f),
                _ => FeatureId::String(number.to_string()),
            }
        }
    }
}

impl fmt::Display for FeatureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FeatureId::Int(i) => write!(f, "{}", i),
            FeatureId::String(s) => f.write_str(s),
        }
    }
}

impl From<i64> for FeatureId {
    fn from(value: i64) -> Self {
        FeatureId::Int(value)
    }
}

impl From<i32> for FeatureId {
    fn from(value: i32) -> Self {
        FeatureId::Int(value.into())
    }
}

impl From<&str> for FeatureId {
    fn from(value: &str) -> Self {
        FeatureId::String(value.to_string())
    }
}

impl From<String> for FeatureId {
    fn from(value: String) -> Self {
        FeatureId::String(value)
    }
}

/// Encode an optional identifier. An absent id emits nothing.
pub fn encode_id(id: Option<&FeatureId>) -> Option<IdType> {
    id.map(|id| match id {
        FeatureId::Int(i) => IdType::IntId(*i),
        FeatureId::String(s) => IdType::Id(s.clone()),
    })
}

/// Decode an optional identifier.
pub fn decode_id(id: Option<&IdType>) -> Option<FeatureId> {
    id.map(|id| match id {
        IdType::IntId(i) => FeatureId::Int(*i),
        IdType::Id(s) => FeatureId::String(s.clone()),
    })
}
