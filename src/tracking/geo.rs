use crate::tracking::types::GpsPoint;

/// Mean Earth radius used by the haversine formula.
pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Great-circle distance between two points, in meters.
pub fn distance_meters(a: &GpsPoint, b: &GpsPoint) -> f64 {
    haversine(a.latitude, a.longitude, b.latitude, b.longitude)
}

fn haversine(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let dlat = (lat2 - lat1).to_radians();
    let dlon = (lon2 - lon1).to_radians();
    let a = (dlat / 2.0).sin().powi(2)
        + lat1.to_radians().cos() * lat2.to_radians().cos() * (dlon / 2.0).sin().powi(2);
    // Rounding can push `a` a hair past 1.0 for antipodal points.
    let a = a.clamp(0.0, 1.0);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_M * c
}

/// Sum of consecutive distances over a sequence already sorted by timestamp.
///
/// Callers are expected to go through [`crate::tracking::points::sort_by_time`]
/// first; batches can arrive out of order.
pub fn total_distance(ordered: &[GpsPoint]) -> f64 {
    ordered
        .windows(2)
        .map(|window| match window {
            [first, second] => distance_meters(first, second),
            _ => 0.0,
        })
        .sum()
}
