//! Geometry module
//!
//! Pure great-circle math and human-readable formatting used by the
//! measurement and routing sessions. Nothing in here holds state.

pub mod format;
pub mod math;
pub mod types;

pub use format::{format_area, format_distance, format_duration};
pub use math::{EARTH_RADIUS_M, haversine_distance, polyline_length, spherical_polygon_area};
pub use types::{Bounds, LatLng};
