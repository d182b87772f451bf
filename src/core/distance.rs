use geo::{Centroid, MultiPoint, Point};

use crate::models::GeoPoint;

/// Earth's radius in meters
const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Geospatial bounding box
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

/// Calculate the Haversine distance between two points in meters
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// # Returns
/// Distance in meters
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    // Rounding can push `a` just past 1 for near-antipodal points
    let a = ((delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2))
    .clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

/// Haversine distance between two points in meters
#[inline]
pub fn distance_between(a: &GeoPoint, b: &GeoPoint) -> f64 {
    haversine_distance(a.latitude, a.longitude, b.latitude, b.longitude)
}

/// Calculate a bounding box around a center point
///
/// Cheaper than Haversine, used as a pre-check only. The longitude span is
/// the widest a circle of `radius_m` reaches at this latitude.
///
/// Longitudes are not wrapped: the box may extend past ±180°, and
/// `is_within_bounding_box` accounts for that.
pub fn calculate_bounding_box(lat: f64, lon: f64, radius_m: f64) -> BoundingBox {
    // Angular radius, with slack for rounding at the edge
    let angular = radius_m.max(0.0) / EARTH_RADIUS_M * (1.0 + 1e-9);
    let lat_delta = angular.to_degrees();

    // A box reaching a pole covers every longitude
    let reach = angular.sin() / lat.to_radians().cos().abs();
    let reaches_pole = lat + lat_delta >= 90.0 || lat - lat_delta <= -90.0;
    let lon_delta = if reaches_pole || !reach.is_finite() || reach >= 1.0 {
        180.0
    } else {
        reach.asin().to_degrees()
    };

    BoundingBox {
        min_lat: lat - lat_delta,
        max_lat: lat + lat_delta,
        min_lon: lon - lon_delta,
        max_lon: lon + lon_delta,
    }
}

/// Check if a point is within a bounding box, across the antimeridian too
#[inline]
pub fn is_within_bounding_box(lat: f64, lon: f64, bbox: &BoundingBox) -> bool {
    if lat < bbox.min_lat || lat > bbox.max_lat {
        return false;
    }
    if bbox.max_lon - bbox.min_lon >= 360.0 {
        return true;
    }
    [lon, lon - 360.0, lon + 360.0]
        .iter()
        .any(|l| *l >= bbox.min_lon && *l <= bbox.max_lon)
}

/// Unweighted centroid of a set of points, `None` when empty
///
/// Groups straddling the antimeridian are averaged on a 0-360° longitude
/// scale so the centroid stays between them.
pub fn group_centroid(points: &[GeoPoint]) -> Option<GeoPoint> {
    let (min_lon, max_lon) = points.iter().fold((f64::MAX, f64::MIN), |(lo, hi), p| {
        (lo.min(p.longitude), hi.max(p.longitude))
    });
    let shift = max_lon - min_lon > 180.0;

    let multi: MultiPoint<f64> = points
        .iter()
        .map(|p| {
            let lon = if shift && p.longitude < 0.0 {
                p.longitude + 360.0
            } else {
                p.longitude
            };
            Point::new(lon, p.latitude)
        })
        .collect::<Vec<_>>()
        .into();

    multi.centroid().map(|c| {
        let lon = if c.x() > 180.0 { c.x() - 360.0 } else { c.x() };
        GeoPoint::new(c.y(), lon)
    })
}

/// Distance from `target` to the closest of `points`
pub fn nearest_distance(points: &[GeoPoint], target: &GeoPoint) -> Option<f64> {
    points
        .iter()
        .map(|p| distance_between(p, target))
        .min_by(|a, b| a.total_cmp(b))
}
