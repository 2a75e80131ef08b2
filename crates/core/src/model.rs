//! In-memory features and the top-level encode/decode input.

use geo::Geometry;
use indexmap::IndexMap;

use crate::id::FeatureId;
use crate::value::PropertyValue;

/// Feature properties in insertion order.
pub type Properties = IndexMap<String, PropertyValue>;

/// A geometry with an optional identifier and properties.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: Option<FeatureId>,
    pub geometry: Geometry<f64>,
    pub properties: Properties,
}

impl Feature {
    /// Feature without id or properties.
    pub fn new(geometry: impl Into<Geometry<f64>>) -> Self {
        Self {
            id: None,
            geometry: geometry.into(),
            properties: Properties::new(),
        }
    }

    pub fn with_id(mut self, id: impl Into<FeatureId>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<PropertyValue>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }
}

/// An ordered sequence of features.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureCollection {
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

impl FromIterator<Feature> for FeatureCollection {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        Self {
            features: iter.into_iter().collect(),
        }
    }
}

/// Anything a geobuf message can carry.
#[derive(Debug, Clone, PartialEq)]
pub enum GeoData {
    Geometry(Geometry<f64>),
    Feature(Feature),
    FeatureCollection(FeatureCollection),
}

impl GeoData {
    /// Short name of the payload kind, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            GeoData::Geometry(_) => "geometry",
            GeoData::Feature(_) => "feature",
            GeoData::FeatureCollection(_) => "feature collection",
        }
    }
}

impl From<Geometry<f64>> for GeoData {
    fn from(geometry: Geometry<f64>) -> Self {
        GeoData::Geometry(geometry)
    }
}

impl From<Feature> for GeoData {
    fn from(feature: Feature) -> Self {
        GeoData::Feature(feature)
    }
}

impl From<FeatureCollection> for GeoData {
    fn from(collection: FeatureCollection) -> Self {
        GeoData::FeatureCollection(collection)
    }
}
