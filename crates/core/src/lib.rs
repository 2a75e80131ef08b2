//! Lossless geobuf encoding for `geo` geometries and features.
//!
//! Geobuf replaces floating-point coordinate pairs with delta-coded integers
//! at a fixed decimal precision, and replaces repeated property keys with a
//! shared, indexed key table. This crate converts between that message and an
//! in-memory model built on [`geo::Geometry`]:
//!
//! - **Analysis**: one pass picks the smallest lossless precision and collects
//!   the sorted key table
//! - **Geometry codec**: flattens nested shapes into `coords` + `lengths`
//! - **Value codec**: typed properties to and from six tagged wire forms
//! - **Identifier codec**: integer or string feature ids
//!
//! The protobuf wire form is handled by prost.
//!
//! # Examples
//!
//! ```
//! use geo::point;
//! use geobuf_core::{decode, encode, Feature, GeoData};
//!
//! let feature = Feature::new(point!(x: 124.123, y: 234.456))
//!     .with_id(1)
//!     .with_property("name", "pier");
//!
//! let message = encode(&GeoData::Feature(feature.clone())).unwrap();
//! assert_eq!(message.precision, Some(3));
//!
//! let GeoData::Feature(decoded) = decode(&message).unwrap() else {
//!     unreachable!()
//! };
//! assert_eq!(decoded.geometry, feature.geometry);
//! ```

use prost::Message;
use thiserror::Error;

pub mod analyze;
pub mod convert;
pub mod delta;
pub mod geobuf;
pub mod geometry;
pub mod id;
pub mod message;
pub mod model;
pub mod precision;
pub mod value;

pub use geobuf::Data;
pub use id::FeatureId;
pub use model::{Feature, FeatureCollection, GeoData, Properties};
pub use value::PropertyValue;

use crate::geometry::DEFAULT_MAX_DEPTH;
use crate::precision::{DEFAULT_MAX_PRECISION, PRECISION_LIMIT};

/// Largest supported coordinate dimensionality (x, y, z, m).
pub const MAX_DIMENSIONS: u32 = 4;

/// Errors that can occur while encoding or decoding geobuf messages
#[derive(Error, Debug)]
pub enum Error {
    #[error("Unsupported property value: {0}")]
    UnsupportedValueType(String),

    #[error("Malformed geobuf message: {0}")]
    MalformedMessage(String),

    #[error("Non-finite coordinate at {path}")]
    NonFiniteCoordinate { path: String },

    #[error("Coordinate {value} at {path} does not fit a 64-bit integer at precision {precision}")]
    CoordinateOutOfRange {
        path: String,
        value: f64,
        precision: u32,
    },

    #[error("Property key {key:?} at {path} is not in the key table")]
    UnknownKey { path: String, key: String },

    #[error("Ring at {path} has {points} points, a closed ring needs at least 4")]
    DegenerateRing { path: String, points: usize },

    #[error("Too many parts at {path}: {len}")]
    LengthOverflow { path: String, len: usize },

    #[error("Geometry collections nested deeper than {limit} at {path}")]
    NestingTooDeep { path: String, limit: usize },

    #[error("Invalid options: {0}")]
    InvalidOptions(String),

    #[error("Protobuf decoding failed: {0}")]
    Decode(#[from] prost::DecodeError),

    #[error("GeoJSON conversion failed: {0}")]
    GeoJson(String),
}

impl Error {
    /// Prefix a malformed-message or value error with the location it
    /// occurred at.
    pub(crate) fn at(self, path: &str) -> Self {
        match self {
            Error::MalformedMessage(msg) => Error::MalformedMessage(format!("{path}: {msg}")),
            Error::UnsupportedValueType(msg) => {
                Error::UnsupportedValueType(format!("{path}: {msg}"))
            }
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// Options for building a geobuf message
///
/// Without a fixed `precision`, the detected exponent is lowered when the
/// largest coordinate would not fit a 64-bit integer at it, trading decimals
/// for range. A fixed `precision` is never adjusted; coordinates that do not
/// fit fail with [`Error::CoordinateOutOfRange`].
#[derive(Debug, Clone, PartialEq)]
pub struct EncodeOptions {
    /// Fixed precision exponent. `None` uses the smallest lossless one.
    pub precision: Option<u32>,
    /// Cap on the detected precision exponent
    pub max_precision: u32,
    /// Coordinate dimensionality written to the message (default: 2)
    pub dimension: u32,
    /// Key table to use instead of the sorted table derived from the input
    pub keys: Option<Vec<String>>,
    /// Limit on nested geometry collections
    pub max_depth: usize,
}

impl Default for EncodeOptions {
    fn default() -> Self {
        Self {
            precision: None,
            max_precision: DEFAULT_MAX_PRECISION,
            dimension: 2,
            keys: None,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EncodeOptions {
    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = Some(precision);
        self
    }

    pub fn with_max_precision(mut self, max_precision: u32) -> Self {
        self.max_precision = max_precision;
        self
    }

    pub fn with_dimension(mut self, dimension: u32) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_keys(mut self, keys: Vec<String>) -> Self {
        self.keys = Some(keys);
        self
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if !(2..=MAX_DIMENSIONS).contains(&self.dimension) {
            return Err(Error::InvalidOptions(format!(
                "dimension must be between 2 and {}, got {}",
                MAX_DIMENSIONS, self.dimension
            )));
        }
        for (name, precision) in [
            ("precision", self.precision.unwrap_or(0)),
            ("max_precision", self.max_precision),
        ] {
            if precision > PRECISION_LIMIT {
                return Err(Error::InvalidOptions(format!(
                    "{} must be at most {}, got {}",
                    name, PRECISION_LIMIT, precision
                )));
            }
        }
        Ok(())
    }
}

/// Options for reading a geobuf message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodeOptions {
    /// Limit on nested geometry collections
    pub max_depth: usize,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

/// Encode with the smallest lossless precision and a derived key table.
pub fn encode(data: &GeoData) -> Result<Data> {
    encode_with_options(data, &EncodeOptions::default())
}

pub fn encode_with_options(data: &GeoData, options: &EncodeOptions) -> Result<Data> {
    message::build_message(data, options)
}

pub fn decode(message: &Data) -> Result<GeoData> {
    decode_with_options(message, &DecodeOptions::default())
}

pub fn decode_with_options(message: &Data, options: &DecodeOptions) -> Result<GeoData> {
    message::read_message(message, options)
}

/// Encode straight to protobuf bytes.
pub fn encode_to_vec(data: &GeoData, options: &EncodeOptions) -> Result<Vec<u8>> {
    Ok(encode_with_options(data, options)?.encode_to_vec())
}

/// Decode protobuf bytes.
pub fn decode_from_slice(bytes: &[u8]) -> Result<GeoData> {
    let message = Data::decode(bytes)?;
    decode(&message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{point, Geometry};

    #[test]
    fn test_options_default() {
        let options = EncodeOptions::default();
        assert_eq!(options.precision, None);
        assert_eq!(options.max_precision, 9);
        assert_eq!(options.dimension, 2);
        assert_eq!(options.max_depth, 64);
    }

    #[test]
    fn test_invalid_options() {
        let data = GeoData::Geometry(Geometry::Point(point!(x: 1.0, y: 2.0)));
        for options in [
            EncodeOptions::default().with_dimension(1),
            EncodeOptions::default().with_dimension(5),
            EncodeOptions::default().with_precision(23),
            EncodeOptions::default().with_max_precision(30),
            EncodeOptions::default().with_keys(vec!["a".to_string(), "a".to_string()]),
        ] {
            assert!(matches!(
                encode_with_options(&data, &options),
                Err(Error::InvalidOptions(_))
            ));
        }
    }

    #[test]
    fn test_bytes_roundtrip() {
        let data = GeoData::Geometry(Geometry::Point(point!(x: -73.9857, y: 40.7484)));
        let bytes = encode_to_vec(&data, &EncodeOptions::default()).unwrap();
        assert_eq!(decode_from_slice(&bytes).unwrap(), data);
    }

    #[test]
    fn test_decode_garbage_bytes() {
        assert!(matches!(
            decode_from_slice(&[0xff, 0xff, 0xff]),
            Err(Error::Decode(_))
        ));
    }

    #[test]
    fn test_error_at_prefixes_location() {
        let err = Error::MalformedMessage("bad".to_string()).at("features[0]");
        assert_eq!(err.to_string(), "Malformed geobuf message: features[0]: bad");

        let err = Error::UnsupportedValueType("nan".to_string()).at("feature.properties.height");
        assert_eq!(
            err.to_string(),
            "Unsupported property value: feature.properties.height: nan"
        );

        let err = Error::InvalidOptions("x".to_string()).at("features[0]");
        assert!(matches!(err, Error::InvalidOptions(_)));
    }
}
