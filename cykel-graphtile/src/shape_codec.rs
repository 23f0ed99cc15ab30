//! # Shape encoding/decoding
//!
//! Edge geometries (and response polylines) are stored as zigzag varints,
//! delta-encoded at 1e-6 degree precision: latitude first, then longitude,
//! each relative to the previous point.
//!
//! See Google's [protobuf docs](https://protobuf.dev/programming-guides/encoding/)
//! for info on varint encoding generally.

use geo::{Coord, coord};
use integer_encoding::VarInt;

const PRECISION: f64 = 1e-6;

/// Defensive cap on decoded points per shape.
/// A corrupt length field should not be able to allocate unbounded memory.
const MAX_SHAPE_POINTS: usize = 5_000;

const MAX_LAT: i64 = 90_000_000;
const MAX_LON: i64 = 180_000_000;

/// Decodes a varint-encoded shape into coordinates.
///
/// Decoding stops early (returning the accepted prefix) when the input is
/// truncated, a decoded coordinate leaves the valid lat/lon range, or the
/// point cap is reached.
pub fn decode_shape(bytes: &[u8]) -> Vec<Coord<f64>> {
    // Pre-allocating 1/4 of the byte length is a decent guess:
    // most deltas are small, so most varints are 2-3 bytes per component.
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity((bytes.len() / 4).min(MAX_SHAPE_POINTS));
    let mut pos = 0;
    let mut lat: i64 = 0;
    let mut lon: i64 = 0;
    while pos < bytes.len() && coords.len() < MAX_SHAPE_POINTS {
        let Some((dlat, n)) = i64::decode_var(&bytes[pos..]) else {
            break;
        };
        pos += n;
        let Some((dlon, n)) = i64::decode_var(&bytes[pos..]) else {
            break;
        };
        pos += n;

        // Saturating so corrupt deltas cannot overflow the accumulators.
        lat = lat.saturating_add(dlat);
        lon = lon.saturating_add(dlon);
        if lat.abs() > MAX_LAT || lon.abs() > MAX_LON {
            break;
        }

        #[expect(clippy::cast_precision_loss)]
        coords.push(coord! {
            x: lon as f64 * PRECISION,
            y: lat as f64 * PRECISION,
        });
    }
    coords
}

/// Decodes only the first coordinate of a shape.
///
/// Useful when snapping or labelling an edge without paying for the full
/// geometry. Returns `None` for empty or truncated input.
pub fn decode_first_coordinate(bytes: &[u8]) -> Option<Coord<f64>> {
    let (lat, n) = i64::decode_var(bytes)?;
    let (lon, _) = i64::decode_var(&bytes[n..])?;
    if lat.abs() > MAX_LAT || lon.abs() > MAX_LON {
        return None;
    }
    #[expect(clippy::cast_precision_loss)]
    let coord = coord! { x: lon as f64 * PRECISION, y: lat as f64 * PRECISION };
    Some(coord)
}

/// Encodes coordinates as a delta varint shape at 1e-6 precision.
///
/// Coordinates are rounded to six decimal places; `decode_shape` of the
/// result yields the rounded sequence.
pub fn encode_shape<'a>(coords: impl IntoIterator<Item = &'a Coord<f64>>) -> Vec<u8> {
    let mut out = Vec::new();
    let mut prev_lat: i64 = 0;
    let mut prev_lon: i64 = 0;
    for coord in coords {
        #[expect(clippy::cast_possible_truncation)]
        let lat = (coord.y / PRECISION).round() as i64;
        #[expect(clippy::cast_possible_truncation)]
        let lon = (coord.x / PRECISION).round() as i64;
        out.extend((lat - prev_lat).encode_var_vec());
        out.extend((lon - prev_lon).encode_var_vec());
        prev_lat = lat;
        prev_lon = lon;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_round_trip_two_points() {
        let shape = vec![
            coord! { x: 16.373_812, y: 48.208_123 },
            coord! { x: 16.374_000, y: 48.208_500 },
        ];
        let encoded = encode_shape(&shape);
        let decoded = decode_shape(&encoded);
        assert_eq!(decoded.len(), 2);
        for (orig, rt) in shape.iter().zip(&decoded) {
            assert!((orig.x - rt.x).abs() < 5e-7, "lon {} vs {}", orig.x, rt.x);
            assert!((orig.y - rt.y).abs() < 5e-7, "lat {} vs {}", orig.y, rt.y);
        }
    }

    #[test]
    fn test_first_coordinate() {
        let shape = vec![
            coord! { x: 1.5, y: 42.5 },
            coord! { x: 1.6, y: 42.6 },
        ];
        let encoded = encode_shape(&shape);
        let first = decode_first_coordinate(&encoded).expect("decodes");
        assert!((first.x - 1.5).abs() < 1e-9);
        assert!((first.y - 42.5).abs() < 1e-9);
        assert_eq!(decode_first_coordinate(&[]), None);
    }

    #[test]
    fn test_out_of_range_stops_with_prefix() {
        // First point is valid; the second jumps past the north pole.
        let mut bytes = Vec::new();
        bytes.extend(48_000_000i64.encode_var_vec());
        bytes.extend(16_000_000i64.encode_var_vec());
        bytes.extend(50_000_000i64.encode_var_vec()); // lat -> 98 degrees
        bytes.extend(0i64.encode_var_vec());

        let decoded = decode_shape(&bytes);
        assert_eq!(decoded.len(), 1);
        assert!((decoded[0].y - 48.0).abs() < 1e-9);
    }

    #[test]
    fn test_truncated_varint_stops_with_prefix() {
        let mut bytes = encode_shape(&[coord! { x: 1.0, y: 1.0 }]);
        // A lone continuation byte can never complete.
        bytes.push(0x80);
        let decoded = decode_shape(&bytes);
        assert_eq!(decoded.len(), 1);
    }

    #[test]
    fn test_point_cap() {
        let shape: Vec<_> = (0..6_000)
            .map(|i| coord! { x: f64::from(i) * 1e-5, y: 0.0 })
            .collect();
        let encoded = encode_shape(&shape);
        let decoded = decode_shape(&encoded);
        assert_eq!(decoded.len(), 5_000);
    }

    proptest! {
        #[test]
        fn round_trip_random_shapes(
            points in prop::collection::vec((-89.9f64..89.9, -179.9f64..179.9), 1..50)
        ) {
            let shape: Vec<_> = points
                .iter()
                .map(|(lat, lon)| coord! { x: *lon, y: *lat })
                .collect();
            let encoded = encode_shape(&shape);
            let decoded = decode_shape(&encoded);
            prop_assert_eq!(decoded.len(), shape.len());
            for (orig, rt) in shape.iter().zip(&decoded) {
                prop_assert!((orig.x - rt.x).abs() < 5.01e-7);
                prop_assert!((orig.y - rt.y).abs() < 5.01e-7);
            }

            // Re-encoding the decoded (i.e. already-rounded) shape is lossless.
            let reencoded = encode_shape(&decoded);
            prop_assert_eq!(&reencoded, &encoded);
        }
    }
}
