//! Coordinate delta codec.
//!
//! A sequence of points is flattened into one integer array. Every axis keeps
//! a running sum, and each point stores only its difference from the previous
//! point on that axis:
//!
//! ```text
//! (123.123, 234.234), (123.134, 234.236)  at P = 3
//!   -> 123123, 234234, 11, 2
//! ```
//!
//! Closed rings drop their final point, which the decoder restores by
//! repeating the first one. No zig-zag transform happens here; the wire layer
//! stores coordinates as `sint64`.

use geo::Coord;

use crate::precision::{to_float, to_int};
use crate::{Error, Result};

/// Value of axis `axis` of `coord`. Axes beyond x/y are zero.
#[inline]
fn axis_value(coord: &Coord<f64>, axis: usize) -> f64 {
    match axis {
        0 => coord.x,
        1 => coord.y,
        _ => 0.0,
    }
}

/// Delta-encode a line of points.
///
/// `dimension` must be at least 2. With `closed` set, the trailing point (the
/// ring's closing copy of the first point) is not emitted.
pub fn encode_line(coords: &[Coord<f64>], precision: u32, dimension: usize, closed: bool) -> Vec<i64> {
    let emitted = if closed {
        coords.len().saturating_sub(1)
    } else {
        coords.len()
    };

    let mut sums = vec![0i64; dimension];
    let mut flat = Vec::with_capacity(emitted * dimension);

    for coord in &coords[..emitted] {
        for (axis, sum) in sums.iter_mut().enumerate() {
            let scaled = to_int(axis_value(coord, axis), precision);
            flat.push(scaled.wrapping_sub(*sum));
            *sum = scaled;
        }
    }

    flat
}

/// Decode a delta-encoded line back to points.
///
/// With `closed` set, the first point is appended again to close the ring.
/// An empty input decodes to an empty line, closed or not.
pub fn decode_line(
    flat: &[i64],
    precision: u32,
    dimension: usize,
    closed: bool,
) -> Result<Vec<Coord<f64>>> {
    if flat.len() % dimension != 0 {
        return Err(Error::MalformedMessage(format!(
            "{} coordinates do not divide into points of dimension {}",
            flat.len(),
            dimension
        )));
    }

    let mut sums = vec![0i64; dimension];
    let mut coords = Vec::with_capacity(flat.len() / dimension + usize::from(closed));

    for point in flat.chunks_exact(dimension) {
        for (sum, delta) in sums.iter_mut().zip(point) {
            *sum = sum.wrapping_add(*delta);
        }
        coords.push(Coord {
            x: to_float(sums[0], precision),
            y: to_float(sums[1], precision),
        });
    }

    if closed {
        if let Some(&first) = coords.first() {
            coords.push(first);
        }
    }

    Ok(coords)
}
