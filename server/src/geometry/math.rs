//! Great-circle distance and spherical polygon area
//!
//! All functions take degrees and return meters (or square meters). The
//! sphere uses the WGS84 equatorial radius, so results drift from true
//! ellipsoidal values by up to ~0.5% depending on latitude.
//!
//! `spherical_polygon_area` is the spherical-excess style approximation used
//! by web map toolkits. It is accurate to within 0.5% of the planar value
//! for polygons under a few hundred kilometers across that stay clear of
//! the poles and the antimeridian. Larger or pole-spanning rings are not
//! corrected.

use super::types::LatLng;

/// Earth radius in meters (WGS84 semi-major axis)
pub const EARTH_RADIUS_M: f64 = 6_378_137.0;

/// Great-circle distance between two points in meters
pub fn haversine_distance(p1: LatLng, p2: LatLng) -> f64 {
    let lat1 = p1.lat.to_radians();
    let lat2 = p2.lat.to_radians();
    let d_lat = (p2.lat - p1.lat).to_radians();
    let d_lng = (p2.lng - p1.lng).to_radians();

    let a = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_M * c
}

/// Sum of consecutive segment lengths, optionally closing the ring.
///
/// Returns 0 for fewer than two points.
pub fn polyline_length(points: &[LatLng], close_loop: bool) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }

    let open: f64 = points
        .windows(2)
        .map(|pair| haversine_distance(pair[0], pair[1]))
        .sum();

    if close_loop {
        // len >= 2 checked above
        open + haversine_distance(points[points.len() - 1], points[0])
    } else {
        open
    }
}

/// Approximate area of the closed ring through `points` in square meters.
///
/// Returns 0 for fewer than three points.
pub fn spherical_polygon_area(points: &[LatLng]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }

    let n = points.len();
    let mut sum = 0.0;
    for i in 0..n {
        let p1 = points[i];
        let p2 = points[(i + 1) % n];
        sum += (p2.lng - p1.lng).to_radians()
            * (p1.lat.to_radians().sin() + p2.lat.to_radians().sin());
    }

    (sum * EARTH_RADIUS_M * EARTH_RADIUS_M / 2.0).abs()
}
