//! Geobuf wire messages.
//!
//! These types mirror the public `geobuf.proto` schema (proto2) and are
//! serialized by prost. Coordinates travel as `sint64`, so the wire layer
//! applies zig-zag encoding to the signed deltas produced by [`crate::delta`].
//!
//! See <https://github.com/mapbox/geobuf/blob/master/geobuf.proto>.

use prost::Message;

/// Default coordinate dimensionality when the field is absent.
pub const DEFAULT_DIMENSIONS: u32 = 2;

/// Default precision exponent when the field is absent.
pub const DEFAULT_PRECISION: u32 = 6;

/// Top-level geobuf message.
#[derive(Clone, PartialEq, Message)]
pub struct Data {
    /// Shared property-key table, referenced by index from features.
    #[prost(string, repeated, tag = "1")]
    pub keys: Vec<String>,
    /// Number of coordinate axes per point.
    #[prost(uint32, optional, tag = "2", default = "2")]
    pub dimensions: Option<u32>,
    /// Number of decimal digits kept for coordinates (the exponent P).
    #[prost(uint32, optional, tag = "3", default = "6")]
    pub precision: Option<u32>,
    #[prost(oneof = "data::DataType", tags = "4, 5, 6")]
    pub data_type: Option<data::DataType>,
}

pub mod data {
    use prost::{Message, Oneof};

    /// Payload carried by a [`super::Data`] message.
    #[derive(Clone, PartialEq, Oneof)]
    pub enum DataType {
        #[prost(message, tag = "4")]
        FeatureCollection(FeatureCollection),
        #[prost(message, tag = "5")]
        Feature(Feature),
        #[prost(message, tag = "6")]
        Geometry(Geometry),
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct FeatureCollection {
        #[prost(message, repeated, tag = "1")]
        pub features: Vec<Feature>,
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct Feature {
        #[prost(message, optional, tag = "1")]
        pub geometry: Option<Geometry>,
        #[prost(oneof = "feature::IdType", tags = "11, 12")]
        pub id_type: Option<feature::IdType>,
        /// Property values, referenced by index from `properties`.
        #[prost(message, repeated, tag = "13")]
        pub values: Vec<Value>,
        /// Consecutive `[key_index, value_index]` pairs.
        #[prost(uint32, repeated, tag = "14")]
        pub properties: Vec<u32>,
    }

    pub mod feature {
        use prost::Oneof;

        #[derive(Clone, PartialEq, Eq, Oneof)]
        pub enum IdType {
            #[prost(string, tag = "11")]
            Id(String),
            #[prost(sint64, tag = "12")]
            IntId(i64),
        }
    }

    #[derive(Clone, PartialEq, Message)]
    pub struct Geometry {
        #[prost(enumeration = "geometry::Type", required, tag = "1")]
        pub r#type: i32,
        /// Structural descriptor partitioning `coords` into parts.
        #[prost(uint32, repeated, tag = "2")]
        pub lengths: Vec<u32>,
        /// Delta-coded, precision-scaled coordinates.
        #[prost(sint64, repeated, tag = "3")]
        pub coords: Vec<i64>,
        /// Children of a geometry collection.
        #[prost(message, repeated, tag = "4")]
        pub geometries: Vec<Geometry>,
    }

    pub mod geometry {
        use prost::Enumeration;

        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Enumeration)]
        #[repr(i32)]
        pub enum Type {
            Point = 0,
            Multipoint = 1,
            Linestring = 2,
            Multilinestring = 3,
            Polygon = 4,
            Multipolygon = 5,
            Geometrycollection = 6,
        }
    }

    /// Tagged property value.
    ///
    /// Exactly one of the variants must be present in a valid message.
    #[derive(Clone, PartialEq, Message)]
    pub struct Value {
        #[prost(oneof = "value::ValueType", tags = "1, 2, 3, 4, 5, 6")]
        pub value_type: Option<value::ValueType>,
    }

    pub mod value {
        use prost::Oneof;

        #[derive(Clone, PartialEq, Oneof)]
        pub enum ValueType {
            #[prost(string, tag = "1")]
            StringValue(String),
            #[prost(double, tag = "2")]
            DoubleValue(f64),
            #[prost(uint64, tag = "3")]
            PosIntValue(u64),
            #[prost(uint64, tag = "4")]
            NegIntValue(u64),
            #[prost(bool, tag = "5")]
            BoolValue(bool),
            #[prost(string, tag = "6")]
            JsonValue(String),
        }
    }
}

impl Data {
    /// Dimensionality, falling back to the schema default.
    pub fn dimensions_or_default(&self) -> u32 {
        self.dimensions.unwrap_or(DEFAULT_DIMENSIONS)
    }

    /// Precision exponent, falling back to the schema default.
    pub fn precision_or_default(&self) -> u32 {
        self.precision.unwrap_or(DEFAULT_PRECISION)
    }
}
