use geo::{HaversineDistance, Point};

use crate::models::BoundingBox;

/// Kilometres per degree of latitude
const KM_PER_DEGREE: f64 = 111.0;

/// Great-circle distance between two coordinates in kilometres
///
/// Arguments are in degrees, latitude first.
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let from = Point::new(lon1, lat1);
    let to = Point::new(lon2, lat2);
    from.haversine_distance(&to) / 1000.0
}

/// Bounding box of `radius_km` around a centre point
///
/// Cheap rectangular pre-filter for the candidate query. Longitude span widens
/// with latitude and is clamped near the poles.
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_km: f64) -> BoundingBox {
    let lat_delta = radius_km / KM_PER_DEGREE;

    let cos_lat = lat.to_radians().cos().abs().max(0.01);
    let lon_delta = (radius_km / (KM_PER_DEGREE * cos_lat)).min(180.0);

    BoundingBox {
        min_lat: (lat - lat_delta).max(-90.0),
        max_lat: (lat + lat_delta).min(90.0),
        min_lon: lon - lon_delta,
        max_lon: lon + lon_delta,
    }
}

/// Check if a point is within a bounding box
///
/// The box may extend past ±180°, so the longitude is also tried shifted by
/// a full turn either way.
#[inline]
pub fn is_within_bounding_box(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    if lat < bbox.min_lat || lat > bbox.max_lat {
        return false;
    }
    [lon, lon + 360.0, lon - 360.0]
        .iter()
        .any(|l| *l >= bbox.min_lon && *l <= bbox.max_lon)
}
