//! Geometry structural codec.
//!
//! Maps each geometry shape to a flat `coords` buffer plus a `lengths`
//! descriptor that tells the decoder how to split the buffer back into parts:
//!
//! | Shape | `lengths` |
//! |---|---|
//! | Point, MultiPoint, LineString | empty |
//! | MultiLineString | point count per line |
//! | Polygon | point count per ring, minus the closing point |
//! | MultiPolygon | `[polygons, rings₀, len₀₀, len₀₁, …, rings₁, len₁₀, …]` |
//!
//! Every line and ring is delta-coded independently (see [`crate::delta`]).
//! Geometry collections recurse through the `geometries` field.

use geo::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};

use crate::delta::{decode_line, encode_line};
use crate::geobuf::data::geometry::Type;
use crate::geobuf::data::Geometry as GeometryMessage;
use crate::{Error, Result};

/// Default limit on nested geometry collections.
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Fewest points a non-empty ring may have, closing point included.
pub const MIN_RING_POINTS: usize = 4;

/// Encodes and decodes geometries at a fixed precision and dimensionality.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GeometryCodec {
    precision: u32,
    dimension: usize,
    max_depth: usize,
}

impl GeometryCodec {
    /// Create a codec. `dimension` must be at least 2.
    pub fn new(precision: u32, dimension: usize) -> Self {
        Self {
            precision,
            dimension,
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }

    /// Set the collection nesting limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Encode a geometry. `path` names it in error messages.
    ///
    /// Coordinates are expected to be finite and within range at this
    /// precision; [`crate::analyze`] checks both before a message is built.
    pub fn encode(&self, geometry: &Geometry<f64>, path: &str) -> Result<GeometryMessage> {
        self.encode_nested(geometry, path, 0)
    }

    /// Decode a geometry message. `path` names it in error messages.
    pub fn decode(&self, message: &GeometryMessage, path: &str) -> Result<Geometry<f64>> {
        self.decode_nested(message, path, 0)
    }

    fn encode_nested(
        &self,
        geometry: &Geometry<f64>,
        path: &str,
        depth: usize,
    ) -> Result<GeometryMessage> {
        let (geom_type, coords, lengths) = match geometry {
            Geometry::Point(point) => (Type::Point, self.line(&[point.0], false), vec![]),
            Geometry::MultiPoint(points) => {
                let coords: Vec<Coord<f64>> = points.iter().map(|p| p.0).collect();
                (Type::Multipoint, self.line(&coords, false), vec![])
            }
            Geometry::LineString(line) => (Type::Linestring, self.line(&line.0, false), vec![]),
            Geometry::Line(line) => (
                Type::Linestring,
                self.line(&[line.start, line.end], false),
                vec![],
            ),
            Geometry::MultiLineString(lines) => {
                let mut coords = Vec::new();
                let mut lengths = Vec::with_capacity(lines.0.len());
                for line in lines {
                    lengths.push(part_length(line.0.len(), path)?);
                    coords.extend(self.line(&line.0, false));
                }
                (Type::Multilinestring, coords, lengths)
            }
            Geometry::Polygon(polygon) => {
                let (coords, lengths) = self.rings(polygon, &format!("{path}.coordinates"))?;
                (Type::Polygon, coords, lengths)
            }
            Geometry::Rect(rect) => {
                let (coords, lengths) =
                    self.rings(&rect.to_polygon(), &format!("{path}.coordinates"))?;
                (Type::Polygon, coords, lengths)
            }
            Geometry::Triangle(triangle) => {
                let (coords, lengths) =
                    self.rings(&triangle.to_polygon(), &format!("{path}.coordinates"))?;
                (Type::Polygon, coords, lengths)
            }
            Geometry::MultiPolygon(polygons) => {
                let mut coords = Vec::new();
                let mut lengths = vec![part_length(polygons.0.len(), path)?];
                for (i, polygon) in polygons.iter().enumerate() {
                    let (ring_coords, ring_lengths) =
                        self.rings(polygon, &format!("{path}.coordinates[{i}]"))?;
                    lengths.push(part_length(ring_lengths.len(), path)?);
                    lengths.extend(ring_lengths);
                    coords.extend(ring_coords);
                }
                (Type::Multipolygon, coords, lengths)
            }
            Geometry::GeometryCollection(collection) => {
                if depth >= self.max_depth {
                    return Err(Error::NestingTooDeep {
                        path: path.to_string(),
                        limit: self.max_depth,
                    });
                }
                let geometries = collection
                    .iter()
                    .enumerate()
                    .map(|(i, child)| {
                        self.encode_nested(child, &format!("{path}.geometries[{i}]"), depth + 1)
                    })
                    .collect::<Result<Vec<_>>>()?;
                return Ok(GeometryMessage {
                    r#type: Type::Geometrycollection as i32,
                    geometries,
                    ..Default::default()
                });
            }
        };

        Ok(GeometryMessage {
            r#type: geom_type as i32,
            lengths,
            coords,
            geometries: vec![],
        })
    }

    fn line(&self, coords: &[Coord<f64>], closed: bool) -> Vec<i64> {
        encode_line(coords, self.precision, self.dimension, closed)
    }

    /// Closed delta encoding of every ring, with one `lengths` entry per ring.
    ///
    /// Empty rings are kept; rings with 1 to 3 points cannot survive closed-ring
    /// compression and are rejected.
    fn rings(&self, polygon: &Polygon<f64>, path: &str) -> Result<(Vec<i64>, Vec<u32>)> {
        let mut coords = Vec::new();
        let mut lengths = Vec::new();
        for (i, ring) in polygon_rings(polygon).into_iter().enumerate() {
            let points = ring.0.len();
            if points > 0 && points < MIN_RING_POINTS {
                return Err(Error::DegenerateRing {
                    path: format!("{path}[{i}]"),
                    points,
                });
            }
            lengths.push(part_length(points.saturating_sub(1), path)?);
            coords.extend(self.line(&ring.0, true));
        }
        Ok((coords, lengths))
    }

    fn decode_nested(
        &self,
        message: &GeometryMessage,
        path: &str,
        depth: usize,
    ) -> Result<Geometry<f64>> {
        let geom_type = Type::try_from(message.r#type).map_err(|_| {
            Error::MalformedMessage(format!("{path}: unknown geometry type {}", message.r#type))
        })?;

        let mut coords = CoordCursor::new(&message.coords, self.dimension);
        let geometry = match geom_type {
            Type::Point => {
                let point = coords.take_all();
                if point.len() != self.dimension {
                    return Err(Error::MalformedMessage(format!(
                        "{path}: point has {} coordinates, expected {}",
                        point.len(),
                        self.dimension
                    )));
                }
                let decoded = self.unline(point, false).map_err(|e| e.at(path))?;
                Geometry::Point(Point(decoded[0]))
            }
            Type::Multipoint => {
                let decoded = self.unline(coords.take_all(), false).map_err(|e| e.at(path))?;
                Geometry::MultiPoint(MultiPoint(decoded.into_iter().map(Point).collect()))
            }
            Type::Linestring => {
                let decoded = self.unline(coords.take_all(), false).map_err(|e| e.at(path))?;
                Geometry::LineString(LineString(decoded))
            }
            Type::Multilinestring => {
                let lines = self
                    .decode_parts(&message.lengths, &mut coords, false)
                    .map_err(|e| e.at(path))?;
                Geometry::MultiLineString(MultiLineString(
                    lines.into_iter().map(LineString).collect(),
                ))
            }
            Type::Polygon => {
                let rings = self
                    .decode_parts(&message.lengths, &mut coords, true)
                    .map_err(|e| e.at(path))?;
                Geometry::Polygon(polygon_from_rings(rings))
            }
            Type::Multipolygon => {
                let polygons = self
                    .decode_polygons(&message.lengths, &mut coords)
                    .map_err(|e| e.at(path))?;
                Geometry::MultiPolygon(MultiPolygon(polygons))
            }
            Type::Geometrycollection => {
                if depth >= self.max_depth {
                    return Err(Error::NestingTooDeep {
                        path: path.to_string(),
                        limit: self.max_depth,
                    });
                }
                let geometries = message
                    .geometries
                    .iter()
                    .enumerate()
                    .map(|(i, child)| {
                        self.decode_nested(child, &format!("{path}.geometries[{i}]"), depth + 1)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Geometry::GeometryCollection(GeometryCollection(geometries))
            }
        };

        coords.finish().map_err(|e| e.at(path))?;
        Ok(geometry)
    }

    fn unline(&self, flat: &[i64], closed: bool) -> Result<Vec<Coord<f64>>> {
        decode_line(flat, self.precision, self.dimension, closed)
    }

    /// Lines or rings described by one `lengths` entry each.
    ///
    /// Absent lengths with coordinates present mean a single part spanning the
    /// whole buffer, as written by encoders that skip single-part lengths.
    fn decode_parts(
        &self,
        lengths: &[u32],
        coords: &mut CoordCursor<'_>,
        closed: bool,
    ) -> Result<Vec<Vec<Coord<f64>>>> {
        if lengths.is_empty() {
            if coords.is_empty() {
                return Ok(vec![]);
            }
            return Ok(vec![self.unline(coords.take_all(), closed)?]);
        }

        lengths
            .iter()
            .map(|&points| self.unline(coords.take(points)?, closed))
            .collect()
    }

    /// Walk the nested MultiPolygon lengths header in lockstep with the
    /// coordinate buffer.
    fn decode_polygons(
        &self,
        lengths: &[u32],
        coords: &mut CoordCursor<'_>,
    ) -> Result<Vec<Polygon<f64>>> {
        if lengths.is_empty() {
            if coords.is_empty() {
                return Ok(vec![]);
            }
            let ring = self.unline(coords.take_all(), true)?;
            return Ok(vec![polygon_from_rings(vec![ring])]);
        }

        let mut header = lengths.iter().copied();
        let mut next = |what: &str| {
            header.next().ok_or_else(|| {
                Error::MalformedMessage(format!("lengths ended before {what}"))
            })
        };

        let polygon_count = next("the polygon count")?;
        let mut polygons = Vec::new();
        for polygon in 0..polygon_count {
            let ring_count = next(&format!("the ring count of polygon {polygon}"))?;
            let mut rings = Vec::new();
            for ring in 0..ring_count {
                let points = next(&format!("the length of ring {ring} of polygon {polygon}"))?;
                rings.push(self.unline(coords.take(points)?, true)?);
            }
            polygons.push(polygon_from_rings(rings));
        }

        let trailing = header.count();
        if trailing > 0 {
            return Err(Error::MalformedMessage(format!(
                "{trailing} lengths entries left after {polygon_count} polygons"
            )));
        }

        Ok(polygons)
    }
}

/// Sequential reader over a flat coordinate buffer.
struct CoordCursor<'a> {
    coords: &'a [i64],
    dimension: usize,
}

impl<'a> CoordCursor<'a> {
    fn new(coords: &'a [i64], dimension: usize) -> Self {
        Self { coords, dimension }
    }

    fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// Next `points` points worth of coordinates.
    fn take(&mut self, points: u32) -> Result<&'a [i64]> {
        let wanted = (points as usize)
            .checked_mul(self.dimension)
            .filter(|&n| n <= self.coords.len())
            .ok_or_else(|| {
                Error::MalformedMessage(format!(
                    "part of {points} points needs more than the {} coordinates left",
                    self.coords.len()
                ))
            })?;
        let (head, tail) = self.coords.split_at(wanted);
        self.coords = tail;
        Ok(head)
    }

    fn take_all(&mut self) -> &'a [i64] {
        std::mem::take(&mut self.coords)
    }

    /// Fail if coordinates remain unconsumed.
    fn finish(&self) -> Result<()> {
        if self.coords.is_empty() {
            Ok(())
        } else {
            Err(Error::MalformedMessage(format!(
                "{} coordinates left over after decoding",
                self.coords.len()
            )))
        }
    }
}

fn part_length(len: usize, path: &str) -> Result<u32> {
    u32::try_from(len).map_err(|_| Error::LengthOverflow {
        path: path.to_string(),
        len,
    })
}

/// Exterior followed by interiors. A polygon with an empty exterior and no
/// holes has no rings at all.
fn polygon_rings(polygon: &Polygon<f64>) -> Vec<&LineString<f64>> {
    if polygon.exterior().0.is_empty() && polygon.interiors().is_empty() {
        return vec![];
    }
    std::iter::once(polygon.exterior())
        .chain(polygon.interiors())
        .collect()
}

fn polygon_from_rings(rings: Vec<Vec<Coord<f64>>>) -> Polygon<f64> {
    let mut rings = rings.into_iter().map(LineString);
    let exterior = rings.next().unwrap_or_else(|| LineString(vec![]));
    Polygon::new(exterior, rings.collect())
}
