//! Analysis pass run once before a message is built.
//!
//! A single walk over the input finds the smallest precision exponent that
//! reproduces every coordinate, validates coordinates, and collects the
//! property keys into a sorted, deduplicated [`KeyTable`].

use std::collections::{BTreeSet, HashMap};
use std::fmt;

use geo::{Coord, Geometry, LineString, Polygon};

use crate::model::{Feature, GeoData};
use crate::precision::{fits_precision, required_precision};
use crate::{Error, Result};

/// Property keys, each addressed by its position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeyTable {
    keys: Vec<String>,
    key_index: HashMap<String, u32>,
}

impl KeyTable {
    /// Table in the caller's order. Duplicate keys are rejected.
    pub fn from_keys(keys: Vec<String>) -> Result<Self> {
        let mut key_index = HashMap::with_capacity(keys.len());
        for (idx, key) in keys.iter().enumerate() {
            let idx = u32::try_from(idx)
                .map_err(|_| Error::InvalidOptions("key table exceeds u32 entries".to_string()))?;
            if key_index.insert(key.clone(), idx).is_some() {
                return Err(Error::InvalidOptions(format!(
                    "duplicate key {:?} in key table",
                    key
                )));
            }
        }
        Ok(Self { keys, key_index })
    }

    /// Table in lexicographic order, so equal key sets always get equal
    /// indices.
    pub fn sorted(keys: BTreeSet<String>) -> Result<Self> {
        Self::from_keys(keys.into_iter().collect())
    }

    pub fn index_of(&self, key: &str) -> Option<u32> {
        self.key_index.get(key).copied()
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn into_keys(self) -> Vec<String> {
        self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Result of [`analyze`].
#[derive(Debug, Clone, PartialEq)]
pub struct Analysis {
    /// Smallest exponent reproducing every coordinate, capped.
    pub precision: u32,
    /// Set when some coordinate needs more digits than the cap allows.
    pub precision_clamped: bool,
    /// Every property key seen, sorted.
    pub keys: BTreeSet<String>,
    /// Largest coordinate magnitude.
    pub max_abs: f64,
}

impl Analysis {
    pub fn key_table(&self) -> Result<KeyTable> {
        KeyTable::sorted(self.keys.clone())
    }
}

/// Walk `data` once, computing precision and keys.
///
/// Initial precision is 0, so integer-only input encodes at scale 1.
pub fn analyze(data: &GeoData, max_precision: u32, max_depth: usize) -> Result<Analysis> {
    let mut analysis = Analysis {
        precision: 0,
        precision_clamped: false,
        keys: BTreeSet::new(),
        max_abs: 0.0,
    };

    let mut walker = Walker::new(max_depth, |value: f64, path: &TreePath| {
        if !value.is_finite() {
            return Err(Error::NonFiniteCoordinate {
                path: path.to_string(),
            });
        }
        match required_precision(value, max_precision) {
            Some(precision) => analysis.precision = analysis.precision.max(precision),
            None => {
                analysis.precision = max_precision;
                analysis.precision_clamped = true;
            }
        }
        analysis.max_abs = analysis.max_abs.max(value.abs());
        Ok(())
    });
    walker.data(data)?;

    for_each_feature(data, |feature| {
        analysis.keys.extend(feature.properties.keys().cloned());
    });

    Ok(analysis)
}

/// Check that every coordinate fits an `i64` at `precision`.
///
/// Only walks the input again when the largest magnitude does not fit, to
/// report the first offending coordinate.
pub fn check_range(data: &GeoData, analysis: &Analysis, precision: u32, max_depth: usize) -> Result<()> {
    if fits_precision(analysis.max_abs, precision) {
        return Ok(());
    }

    let mut walker = Walker::new(max_depth, |value: f64, path: &TreePath| {
        if fits_precision(value, precision) {
            Ok(())
        } else {
            Err(Error::CoordinateOutOfRange {
                path: path.to_string(),
                value,
                precision,
            })
        }
    });
    walker.data(data)
}

fn for_each_feature(data: &GeoData, mut f: impl FnMut(&Feature)) {
    match data {
        GeoData::Geometry(_) => {}
        GeoData::Feature(feature) => f(feature),
        GeoData::FeatureCollection(collection) => collection.features.iter().for_each(f),
    }
}

/// One step of a [`TreePath`].
#[derive(Debug, Clone)]
enum Segment {
    Field(&'static str),
    Index(usize),
}

/// Location inside the input tree, rendered like
/// `features[2].geometry.coordinates[0][4][1]`.
#[derive(Debug, Clone, Default)]
pub struct TreePath(Vec<Segment>);

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.0.iter().enumerate() {
            match segment {
                Segment::Field(name) if i == 0 => f.write_str(name)?,
                Segment::Field(name) => write!(f, ".{}", name)?,
                Segment::Index(idx) => write!(f, "[{}]", idx)?,
            }
        }
        Ok(())
    }
}

/// Depth-first walk over every coordinate scalar, tracking its path.
struct Walker<F> {
    path: TreePath,
    max_depth: usize,
    visit: F,
}

impl<F> Walker<F>
where
    F: FnMut(f64, &TreePath) -> Result<()>,
{
    fn new(max_depth: usize, visit: F) -> Self {
        Self {
            path: TreePath::default(),
            max_depth,
            visit,
        }
    }

    fn scoped(&mut self, segment: Segment, f: impl FnOnce(&mut Self) -> Result<()>) -> Result<()> {
        self.path.0.push(segment);
        let result = f(self);
        self.path.0.pop();
        result
    }

    fn data(&mut self, data: &GeoData) -> Result<()> {
        match data {
            GeoData::Geometry(geometry) => {
                self.scoped(Segment::Field("geometry"), |w| w.geometry(geometry, 0))
            }
            GeoData::Feature(feature) => self.scoped(Segment::Field("feature"), |w| {
                w.scoped(Segment::Field("geometry"), |w| w.geometry(&feature.geometry, 0))
            }),
            GeoData::FeatureCollection(collection) => {
                self.scoped(Segment::Field("features"), |w| {
                    for (i, feature) in collection.features.iter().enumerate() {
                        w.scoped(Segment::Index(i), |w| {
                            w.scoped(Segment::Field("geometry"), |w| {
                                w.geometry(&feature.geometry, 0)
                            })
                        })?;
                    }
                    Ok(())
                })
            }
        }
    }

    fn geometry(&mut self, geometry: &Geometry<f64>, depth: usize) -> Result<()> {
        match geometry {
            Geometry::GeometryCollection(collection) => {
                if depth >= self.max_depth {
                    return Err(Error::NestingTooDeep {
                        path: self.path.to_string(),
                        limit: self.max_depth,
                    });
                }
                self.scoped(Segment::Field("geometries"), |w| {
                    for (i, child) in collection.iter().enumerate() {
                        w.scoped(Segment::Index(i), |w| w.geometry(child, depth + 1))?;
                    }
                    Ok(())
                })
            }
            other => self.scoped(Segment::Field("coordinates"), |w| w.coordinates(other)),
        }
    }

    fn coordinates(&mut self, geometry: &Geometry<f64>) -> Result<()> {
        match geometry {
            Geometry::Point(point) => self.coord(&point.0),
            Geometry::Line(line) => self.coords(&[line.start, line.end]),
            Geometry::LineString(line) => self.coords(&line.0),
            Geometry::MultiPoint(points) => {
                let coords: Vec<Coord<f64>> = points.iter().map(|p| p.0).collect();
                self.coords(&coords)
            }
            Geometry::MultiLineString(lines) => self.each(&lines.0, |w, line| w.coords(&line.0)),
            Geometry::Polygon(polygon) => self.polygon(polygon),
            Geometry::Rect(rect) => self.polygon(&rect.to_polygon()),
            Geometry::Triangle(triangle) => self.polygon(&triangle.to_polygon()),
            Geometry::MultiPolygon(polygons) => self.each(&polygons.0, |w, p| w.polygon(p)),
            Geometry::GeometryCollection(_) => Ok(()),
        }
    }

    fn polygon(&mut self, polygon: &Polygon<f64>) -> Result<()> {
        let rings: Vec<&LineString<f64>> = std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .collect();
        self.each(&rings, |w, ring| w.coords(&ring.0))
    }

    fn each<T>(&mut self, items: &[T], mut f: impl FnMut(&mut Self, &T) -> Result<()>) -> Result<()> {
        for (i, item) in items.iter().enumerate() {
            self.scoped(Segment::Index(i), |w| f(w, item))?;
        }
        Ok(())
    }

    fn coords(&mut self, coords: &[Coord<f64>]) -> Result<()> {
        self.each(coords, |w, coord| w.coord(coord))
    }

    fn coord(&mut self, coord: &Coord<f64>) -> Result<()> {
        for (axis, value) in [coord.x, coord.y].into_iter().enumerate() {
            self.path.0.push(Segment::Index(axis));
            let result = (self.visit)(value, &self.path);
            self.path.0.pop();
            result?;
        }
        Ok(())
    }
}
