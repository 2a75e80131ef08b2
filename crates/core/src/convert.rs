//! Conversions between GeoJSON documents and [`GeoData`].
//!
//! JSON numbers become `Int`, `UInt` or `Double` properties; arrays, objects
//! and null stay JSON. Numeric feature ids that are not `i64` values fall
//! back to their textual form. Features without a geometry are rejected,
//! since every geobuf feature carries exactly one.

use geo::Geometry;
use geojson::feature::Id;
use geojson::{GeoJson, JsonObject};

use crate::id::FeatureId;
use crate::model::{Feature, FeatureCollection, GeoData, Properties};
use crate::value::PropertyValue;
use crate::{Error, Result};

fn geometry_from_geojson(geometry: geojson::Geometry) -> Result<Geometry<f64>> {
    Geometry::<f64>::try_from(geometry).map_err(|e| Error::GeoJson(e.to_string()))
}

fn geometry_to_geojson(geometry: &Geometry<f64>) -> geojson::Geometry {
    geojson::Geometry::new(geojson::Value::from(geometry))
}

impl TryFrom<geojson::Feature> for Feature {
    type Error = Error;

    fn try_from(feature: geojson::Feature) -> Result<Self> {
        let geometry = feature
            .geometry
            .ok_or_else(|| Error::GeoJson("feature has no geometry".to_string()))?;

        let id = feature.id.map(|id| match id {
            Id::String(s) => FeatureId::String(s),
            Id::Number(n) => FeatureId::from_number(&n),
        });

        let properties: Properties = feature
            .properties
            .unwrap_or_default()
            .into_iter()
            .map(|(key, value)| (key, PropertyValue::from(value)))
            .collect();

        Ok(Feature {
            id,
            geometry: geometry_from_geojson(geometry)?,
            properties,
        })
    }
}

impl From<&Feature> for geojson::Feature {
    fn from(feature: &Feature) -> Self {
        let properties: JsonObject = feature
            .properties
            .iter()
            .map(|(key, value)| (key.clone(), serde_json::Value::from(value)))
            .collect();

        geojson::Feature {
            bbox: None,
            geometry: Some(geometry_to_geojson(&feature.geometry)),
            id: feature.id.as_ref().map(|id| match id {
                FeatureId::Int(i) => Id::Number((*i).into()),
                FeatureId::String(s) => Id::String(s.clone()),
            }),
            properties: Some(properties),
            foreign_members: None,
        }
    }
}

impl TryFrom<GeoJson> for GeoData {
    type Error = Error;

    fn try_from(geojson: GeoJson) -> Result<Self> {
        Ok(match geojson {
            GeoJson::Geometry(geometry) => GeoData::Geometry(geometry_from_geojson(geometry)?),
            GeoJson::Feature(feature) => GeoData::Feature(Feature::try_from(feature)?),
            GeoJson::FeatureCollection(collection) => GeoData::FeatureCollection(
                collection
                    .features
                    .into_iter()
                    .map(Feature::try_from)
                    .collect::<Result<FeatureCollection>>()?,
            ),
        })
    }
}

impl From<&GeoData> for GeoJson {
    fn from(data: &GeoData) -> Self {
        match data {
            GeoData::Geometry(geometry) => GeoJson::Geometry(geometry_to_geojson(geometry)),
            GeoData::Feature(feature) => GeoJson::Feature(feature.into()),
            GeoData::FeatureCollection(collection) => {
                GeoJson::FeatureCollection(geojson::FeatureCollection {
                    bbox: None,
                    features: collection.features.iter().map(Into::into).collect(),
                    foreign_members: None,
                })
            }
        }
    }
}
