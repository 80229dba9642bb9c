//! Human-readable distance, area and duration strings

/// `< 1000 m` as whole meters, otherwise kilometers with 2 decimals
pub fn format_distance(meters: f64) -> String {
    if meters < 1000.0 {
        format!("{} m", meters.round() as i64)
    } else {
        format!("{:.2} km", meters / 1000.0)
    }
}

/// `< 1 km²` as whole square meters, otherwise square kilometers with 2 decimals
pub fn format_area(square_meters: f64) -> String {
    if square_meters < 1_000_000.0 {
        format!("{} m²", square_meters.round() as i64)
    } else {
        format!("{:.2} km²", square_meters / 1_000_000.0)
    }
}

/// Hours and minutes from one hour up, plain minutes below.
///
/// Any positive duration shows at least one minute.
pub fn format_duration(seconds: f64) -> String {
    let seconds = seconds.max(0.0);
    if seconds >= 3600.0 {
        let mut hours = (seconds / 3600.0).floor() as u64;
        let mut minutes = ((seconds - hours as f64 * 3600.0) / 60.0).round() as u64;
        if minutes == 60 {
            hours += 1;
            minutes = 0;
        }
        format!("{} h {} min", hours, minutes)
    } else {
        let mut minutes = (seconds / 60.0).round() as u64;
        if seconds > 0.0 && minutes == 0 {
            minutes = 1;
        }
        format!("{} min", minutes)
    }
}
