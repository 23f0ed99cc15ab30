//! # Spatial utilities useful for routing

use geo::Coord;

const METERS_PER_DEGREE_LAT: f64 = 111_132.954;

/// The grid pitch of the in-tile node bucket index: hundredths of a degree,
/// roughly 1.1 km of latitude per bucket.
const BUCKET_SCALE: f64 = 100.0;

/// The bucket key for a coordinate in the node spatial index.
#[expect(clippy::cast_possible_truncation)]
pub fn bucket_key(coord: Coord<f64>) -> (i32, i32) {
    (
        (coord.y * BUCKET_SCALE).floor() as i32,
        (coord.x * BUCKET_SCALE).floor() as i32,
    )
}

/// Fast distance approximation.
///
/// Intended for _fast_ estimates over _short_ distances (a few kilometers),
/// e.g. ranking nearest-node candidates without paying for trigonometry
/// per comparison.
///
/// # Limitations
///
/// * Accuracy decreases at polar latitudes.
/// * Does NOT account for the antimeridian.
/// * Overestimates; expected error under 1m for short distances.
pub struct DistanceApproximator {
    center: Coord<f64>,
    meters_per_lon_degree: f64,
    meters_per_lat_degree: f64,
}

impl DistanceApproximator {
    /// Create a new approximator centered on the given point.
    #[inline]
    pub fn new(center: Coord<f64>) -> Self {
        let lon_scale = center.y.to_radians().cos();
        Self {
            center,
            meters_per_lon_degree: lon_scale * METERS_PER_DEGREE_LAT,
            meters_per_lat_degree: METERS_PER_DEGREE_LAT,
        }
    }

    /// Returns an approximation of the **squared** distance in meters to the
    /// given point.
    ///
    /// Compare against `max_distance * max_distance` to avoid `sqrt`.
    #[inline]
    pub fn distance_squared(&self, other: Coord<f64>) -> f64 {
        let dlat = (other.y - self.center.y) * self.meters_per_lat_degree;
        let dlon = (other.x - self.center.x) * self.meters_per_lon_degree;
        (dlat * dlat) + (dlon * dlon)
    }
}
