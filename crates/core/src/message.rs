//! Message builder and reader.
//!
//! Building runs the analysis pass once, fixes precision and the key table
//! for the whole message, then encodes the payload. Reading is the exact
//! inverse, driven by the precision, dimension and keys stored in the message.

use std::collections::HashMap;

use crate::analyze::{analyze, check_range, KeyTable};
use crate::geobuf::data::{
    DataType, Feature as FeatureMessage, FeatureCollection as FeatureCollectionMessage, Value,
};
use crate::geobuf::Data;
use crate::geometry::GeometryCodec;
use crate::id::{decode_id, encode_id};
use crate::model::{Feature, FeatureCollection, GeoData, Properties};
use crate::precision::{fitting_precision, PRECISION_LIMIT};
use crate::value::{decode_value, encode_value, PropertyValue};
use crate::{DecodeOptions, EncodeOptions, Error, Result, MAX_DIMENSIONS};

/// Build a geobuf message for `data`.
pub fn build_message(data: &GeoData, options: &EncodeOptions) -> Result<Data> {
    options.validate()?;

    let analysis = analyze(data, options.max_precision, options.max_depth)?;
    let precision = match options.precision {
        Some(precision) => precision,
        None => {
            if analysis.precision_clamped {
                log::warn!(
                    "Coordinates need more than {} decimal digits, rounding at the cap",
                    options.max_precision
                );
            }
            match fitting_precision(analysis.max_abs, analysis.precision) {
                Some(precision) if precision < analysis.precision => {
                    log::warn!(
                        "Coordinate magnitude {} does not fit at precision {}, lowering to {}",
                        analysis.max_abs,
                        analysis.precision,
                        precision
                    );
                    precision
                }
                // Out-of-range input is reported by check_range below.
                _ => analysis.precision,
            }
        }
    };
    check_range(data, &analysis, precision, options.max_depth)?;

    let keys = match &options.keys {
        Some(keys) => KeyTable::from_keys(keys.clone())?,
        None => analysis.key_table()?,
    };

    let builder = MessageBuilder {
        codec: GeometryCodec::new(precision, options.dimension as usize)
            .with_max_depth(options.max_depth),
        keys: &keys,
    };

    let data_type = match data {
        GeoData::Geometry(geometry) => DataType::Geometry(builder.codec.encode(geometry, "geometry")?),
        GeoData::Feature(feature) => DataType::Feature(builder.feature(feature, "feature")?),
        GeoData::FeatureCollection(collection) => {
            DataType::FeatureCollection(builder.feature_collection(collection)?)
        }
    };

    log::debug!(
        "Encoded {} with {} keys at precision {}",
        data.kind(),
        keys.len(),
        precision
    );

    Ok(Data {
        keys: keys.into_keys(),
        dimensions: Some(options.dimension),
        precision: Some(precision),
        data_type: Some(data_type),
    })
}

/// Rebuild the geometry or features carried by `message`.
pub fn read_message(message: &Data, options: &DecodeOptions) -> Result<GeoData> {
    let dimension = message.dimensions_or_default();
    if !(2..=MAX_DIMENSIONS).contains(&dimension) {
        return Err(Error::MalformedMessage(format!(
            "unsupported dimension {}",
            dimension
        )));
    }
    let precision = message.precision_or_default();
    if precision > PRECISION_LIMIT {
        return Err(Error::MalformedMessage(format!(
            "precision {} exceeds {}",
            precision, PRECISION_LIMIT
        )));
    }

    let reader = MessageReader {
        codec: GeometryCodec::new(precision, dimension as usize).with_max_depth(options.max_depth),
        keys: &message.keys,
    };

    let data_type = message
        .data_type
        .as_ref()
        .ok_or_else(|| Error::MalformedMessage("message has no payload".to_string()))?;

    let data = match data_type {
        DataType::Geometry(geometry) => GeoData::Geometry(reader.codec.decode(geometry, "geometry")?),
        DataType::Feature(feature) => GeoData::Feature(reader.feature(feature, "feature")?),
        DataType::FeatureCollection(collection) => GeoData::FeatureCollection(
            collection
                .features
                .iter()
                .enumerate()
                .map(|(i, feature)| reader.feature(feature, &format!("features[{i}]")))
                .collect::<Result<FeatureCollection>>()?,
        ),
    };

    log::debug!(
        "Decoded {} with {} keys at precision {}",
        data.kind(),
        message.keys.len(),
        precision
    );

    Ok(data)
}

struct MessageBuilder<'a> {
    codec: GeometryCodec,
    keys: &'a KeyTable,
}

impl MessageBuilder<'_> {
    fn feature_collection(&self, collection: &FeatureCollection) -> Result<FeatureCollectionMessage> {
        let features = collection
            .features
            .iter()
            .enumerate()
            .map(|(i, feature)| self.feature(feature, &format!("features[{i}]")))
            .collect::<Result<Vec<_>>>()?;
        Ok(FeatureCollectionMessage { features })
    }

    fn feature(&self, feature: &Feature, path: &str) -> Result<FeatureMessage> {
        let geometry = self
            .codec
            .encode(&feature.geometry, &format!("{path}.geometry"))?;

        let mut values = FeatureValues::default();
        let mut properties = Vec::with_capacity(feature.properties.len() * 2);
        for (key, value) in &feature.properties {
            let key_idx = self.keys.index_of(key).ok_or_else(|| Error::UnknownKey {
                path: format!("{path}.properties"),
                key: key.clone(),
            })?;
            properties.push(key_idx);
            properties.push(
                values
                    .get_or_insert(value)
                    .map_err(|e| e.at(&format!("{path}.properties.{key}")))?,
            );
        }

        Ok(FeatureMessage {
            geometry: Some(geometry),
            id_type: encode_id(feature.id.as_ref()),
            values: values.values,
            properties,
        })
    }
}

/// Per-feature value list. Equal values share one entry.
#[derive(Default)]
struct FeatureValues {
    values: Vec<Value>,
    value_index: HashMap<String, u32>, // Debug rendering of the value
}

impl FeatureValues {
    fn get_or_insert(&mut self, value: &PropertyValue) -> Result<u32> {
        let value_key = format!("{:?}", value);

        if let Some(&idx) = self.value_index.get(&value_key) {
            return Ok(idx);
        }
        let idx = self.values.len() as u32;
        self.values.push(encode_value(value)?);
        self.value_index.insert(value_key, idx);
        Ok(idx)
    }
}

struct MessageReader<'a> {
    codec: GeometryCodec,
    keys: &'a [String],
}

impl MessageReader<'_> {
    fn feature(&self, feature: &FeatureMessage, path: &str) -> Result<Feature> {
        let geometry = feature
            .geometry
            .as_ref()
            .ok_or_else(|| Error::MalformedMessage(format!("{path}: feature has no geometry")))?;
        let geometry = self.codec.decode(geometry, &format!("{path}.geometry"))?;

        if feature.properties.len() % 2 != 0 {
            return Err(Error::MalformedMessage(format!(
                "{path}: properties has odd length {}",
                feature.properties.len()
            )));
        }

        let mut properties = Properties::with_capacity(feature.properties.len() / 2);
        for pair in feature.properties.chunks_exact(2) {
            let (key_idx, value_idx) = (pair[0] as usize, pair[1] as usize);
            let key = self.keys.get(key_idx).ok_or_else(|| {
                Error::MalformedMessage(format!("{path}: key index {key_idx} out of range"))
            })?;
            let value = feature.values.get(value_idx).ok_or_else(|| {
                Error::MalformedMessage(format!("{path}: value index {value_idx} out of range"))
            })?;
            let value = decode_value(value).map_err(|e| e.at(&format!("{path}.values[{value_idx}]")))?;
            properties.insert(key.clone(), value);
        }

        Ok(Feature {
            id: decode_id(feature.id_type.as_ref()),
            geometry,
            properties,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geobuf::data::feature::IdType;
    use crate::geobuf::data::geometry::Type;
    use crate::geobuf::data::value::ValueType;
    use crate::geobuf::data::Geometry as GeometryMessage;
    use crate::id::FeatureId;
    use geo::{line_string, point, Geometry};

    fn sample_feature() -> Feature {
        Feature::new(line_string![(x: 124.123, y: 234.456), (x: 124.2, y: 234.5)])
            .with_id(7)
            .with_property("name", "road")
            .with_property("lanes", 2)
            .with_property("alias", "road")
    }

    #[test]
    fn test_build_geometry_message() {
        let data = GeoData::Geometry(Geometry::Point(point!(x: 124.123, y: 234.456)));
        let message = build_message(&data, &EncodeOptions::default()).unwrap();

        assert_eq!(message.precision, Some(3));
        assert_eq!(message.dimensions, Some(2));
        assert!(message.keys.is_empty());
        let Some(DataType::Geometry(geometry)) = &message.data_type else {
            panic!("expected a geometry payload");
        };
        assert_eq!(geometry.coords, vec![124123, 234456]);
    }

    #[test]
    fn test_build_feature_message() {
        let message = build_message(&sample_feature().into(), &EncodeOptions::default()).unwrap();

        assert_eq!(message.keys, vec!["alias", "lanes", "name"]);
        let Some(DataType::Feature(feature)) = &message.data_type else {
            panic!("expected a feature payload");
        };
        assert_eq!(feature.id_type, Some(IdType::IntId(7)));
        // "road" is stored once and referenced by both "name" and "alias".
        assert_eq!(feature.properties, vec![2, 0, 1, 1, 0, 0]);
        assert_eq!(feature.values.len(), 2);
        assert_eq!(
            feature.values[1].value_type,
            Some(ValueType::PosIntValue(2))
        );
    }

    #[test]
    fn test_feature_roundtrip() {
        let feature = sample_feature();
        let message = build_message(&feature.clone().into(), &EncodeOptions::default()).unwrap();
        let decoded = read_message(&message, &DecodeOptions::default()).unwrap();

        let GeoData::Feature(decoded) = decoded else {
            panic!("expected a feature");
        };
        assert_eq!(decoded.geometry, feature.geometry);
        assert_eq!(decoded.id, Some(FeatureId::Int(7)));
        assert_eq!(decoded.properties["name"], PropertyValue::from("road"));
        assert_eq!(decoded.properties["lanes"], PropertyValue::UInt(2));
        let order: Vec<&str> = decoded.properties.keys().map(String::as_str).collect();
        assert_eq!(order, ["name", "lanes", "alias"]);
    }

    #[test]
    fn test_supplied_key_table() {
        let options = EncodeOptions::default().with_keys(vec![
            "name".to_string(),
            "lanes".to_string(),
            "alias".to_string(),
            "unused".to_string(),
        ]);
        let message = build_message(&sample_feature().into(), &options).unwrap();
        assert_eq!(message.keys, vec!["name", "lanes", "alias", "unused"]);

        let options = EncodeOptions::default().with_keys(vec!["name".to_string()]);
        match build_message(&sample_feature().into(), &options) {
            Err(Error::UnknownKey { path, key }) => {
                assert_eq!(path, "feature.properties");
                assert_eq!(key, "lanes");
            }
            other => panic!("expected UnknownKey, got {:?}", other),
        }
    }

    #[test]
    fn test_precision_override() {
        let data = GeoData::Geometry(Geometry::Point(point!(x: 124.123, y: 234.456)));
        let message = build_message(&data, &EncodeOptions::default().with_precision(1)).unwrap();
        assert_eq!(message.precision, Some(1));
        let Some(DataType::Geometry(geometry)) = &message.data_type else {
            panic!("expected a geometry payload");
        };
        assert_eq!(geometry.coords, vec![1241, 2345]);
    }

    #[test]
    fn test_out_of_range_coordinate_rejected() {
        let data = GeoData::Geometry(Geometry::Point(point!(x: 1.0e12, y: 0.0)));
        assert!(build_message(&data, &EncodeOptions::default()).is_ok());
        assert!(matches!(
            build_message(&data, &EncodeOptions::default().with_precision(9)),
            Err(Error::CoordinateOutOfRange { precision: 9, .. })
        ));
    }

    #[test]
    fn test_precision_lowered_to_fit_magnitude() {
        let data = GeoData::Geometry(Geometry::LineString(line_string![
            (x: 1.0e10, y: 0.0),
            (x: 0.123456789, y: 1.0),
        ]));
        let message = build_message(&data, &EncodeOptions::default()).unwrap();
        assert_eq!(message.precision, Some(8));

        let GeoData::Geometry(Geometry::LineString(decoded)) =
            read_message(&message, &DecodeOptions::default()).unwrap()
        else {
            panic!("expected a line string");
        };
        assert_eq!(decoded.0[0].x, 1.0e10);
        assert!((decoded.0[1].x - 0.123456789).abs() < 1e-8);

        let data = GeoData::Geometry(Geometry::Point(point!(x: 1.0e19, y: 0.5)));
        match build_message(&data, &EncodeOptions::default()) {
            Err(Error::CoordinateOutOfRange { path, precision, .. }) => {
                assert_eq!(path, "geometry.coordinates[0]");
                assert_eq!(precision, 1);
            }
            other => panic!("expected CoordinateOutOfRange, got {:?}", other),
        }
    }

    fn feature_message(properties: Vec<u32>, values: Vec<Value>) -> Data {
        Data {
            keys: vec!["a".to_string()],
            dimensions: Some(2),
            precision: Some(0),
            data_type: Some(DataType::Feature(FeatureMessage {
                geometry: Some(GeometryMessage {
                    r#type: Type::Point as i32,
                    coords: vec![1, 2],
                    ..Default::default()
                }),
                id_type: Some(IdType::Id("1234".to_string())),
                values,
                properties,
            })),
        }
    }

    #[test]
    fn test_read_rejects_bad_property_indices() {
        let value = Value {
            value_type: Some(ValueType::BoolValue(true)),
        };
        let options = DecodeOptions::default();

        assert!(read_message(&feature_message(vec![0, 0], vec![value.clone()]), &options).is_ok());
        for properties in [vec![0], vec![1, 0], vec![0, 1]] {
            assert!(matches!(
                read_message(&feature_message(properties, vec![value.clone()]), &options),
                Err(Error::MalformedMessage(_))
            ));
        }
    }

    #[test]
    fn test_read_string_id() {
        let decoded = read_message(&feature_message(vec![], vec![]), &DecodeOptions::default()).unwrap();
        let GeoData::Feature(feature) = decoded else {
            panic!("expected a feature");
        };
        assert_eq!(feature.id, Some(FeatureId::String("1234".to_string())));
        assert_eq!(feature.geometry, Geometry::Point(point!(x: 1.0, y: 2.0)));
    }

    #[test]
    fn test_read_rejects_missing_payload_and_bad_header() {
        let options = DecodeOptions::default();
        assert!(matches!(
            read_message(&Data::default(), &options),
            Err(Error::MalformedMessage(_))
        ));

        let mut message = feature_message(vec![], vec![]);
        message.dimensions = Some(1);
        assert!(matches!(
            read_message(&message, &options),
            Err(Error::MalformedMessage(_))
        ));

        let mut message = feature_message(vec![], vec![]);
        message.precision = Some(u32::MAX);
        assert!(matches!(
            read_message(&message, &options),
            Err(Error::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_read_rejects_feature_without_geometry() {
        let mut message = feature_message(vec![], vec![]);
        if let Some(DataType::Feature(feature)) = &mut message.data_type {
            feature.geometry = None;
        }
        assert!(matches!(
            read_message(&message, &DecodeOptions::default()),
            Err(Error::MalformedMessage(msg)) if msg.contains("no geometry")
        ));
    }
}
