//! Server configuration
//!
//! Configuration is loaded from environment variables over built-in defaults.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::geometry::LatLng;
use crate::services::{PositionOptions, SearchConfig};

/// Main server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server bind address
    pub host: String,
    /// Preferred server port
    pub port: u16,
    /// How many following ports to try when the preferred one is taken
    pub port_fallback_attempts: u16,
    /// Directory of the file-backed key-value store
    pub data_dir: PathBuf,
    /// Sent with every upstream request
    pub user_agent: String,

    pub static_files: StaticFilesConfig,
    pub routing: RoutingConfig,
    pub geocoder: GeocoderConfig,
    pub geolocation: GeolocationConfig,
    pub map: MapConfig,
}

/// Front-end assets
#[derive(Debug, Clone, Default)]
pub struct StaticFilesConfig {
    pub dir: Option<PathBuf>,
}

/// OSRM-compatible routing service
#[derive(Debug, Clone)]
pub struct RoutingConfig {
    pub url: String,
    pub profile: String,
    pub timeout: Duration,
}

/// Nominatim-compatible geocoder
#[derive(Debug, Clone)]
pub struct GeocoderConfig {
    pub url: String,
    /// `countrycodes` bias for biased queries
    pub country_codes: Option<String>,
    /// Appended to the first query, e.g. "Tokyo Tower, Japan"
    pub country_suffix: Option<String>,
    pub language: String,
    pub timeout: Duration,
    /// Results requested per upstream call
    pub limit: usize,
}

#[derive(Debug, Clone)]
pub struct GeolocationConfig {
    pub timeout: Duration,
    pub max_age: Duration,
    /// Fixed device position; locate requests fail without one
    pub device_position: Option<LatLng>,
}

/// Initial camera
#[derive(Debug, Clone)]
pub struct MapConfig {
    pub center: LatLng,
    pub zoom: u8,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            port_fallback_attempts: 10,
            data_dir: PathBuf::from("./data"),
            user_agent: concat!("webmap/", env!("CARGO_PKG_VERSION")).to_string(),
            static_files: StaticFilesConfig::default(),
            routing: RoutingConfig::default(),
            geocoder: GeocoderConfig::default(),
            geolocation: GeolocationConfig::default(),
            map: MapConfig::default(),
        }
    }
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            url: "https://router.project-osrm.org".to_string(),
            profile: "driving".to_string(),
            timeout: Duration::from_secs(15),
        }
    }
}

impl Default for GeocoderConfig {
    fn default() -> Self {
        Self {
            url: "https://nominatim.openstreetmap.org".to_string(),
            country_codes: Some("jp".to_string()),
            country_suffix: Some("Japan".to_string()),
            language: "ja".to_string(),
            timeout: Duration::from_secs(10),
            limit: 5,
        }
    }
}

impl Default for GeolocationConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(10),
            max_age: Duration::from_secs(60),
            device_position: None,
        }
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            center: LatLng::new(35.6762, 139.6503),
            zoom: 10,
        }
    }
}

impl GeocoderConfig {
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig {
            country_suffix: self.country_suffix.clone(),
            country_bias: self.country_codes.clone(),
            ..SearchConfig::default()
        }
    }
}

impl GeolocationConfig {
    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            timeout: self.timeout,
            maximum_age: self.max_age,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        let secs = |key: &str| {
            lookup(key)
                .and_then(|v| v.parse::<u64>().ok())
                .map(Duration::from_secs)
        };

        // Server config
        if let Some(host) = lookup("HOST") {
            config.host = host;
        }
        if let Some(port) = lookup("PORT")
            && let Ok(p) = port.parse()
        {
            config.port = p;
        }
        if let Some(val) = lookup("PORT_FALLBACK_ATTEMPTS")
            && let Ok(n) = val.parse()
        {
            config.port_fallback_attempts = n;
        }
        if let Some(dir) = lookup("DATA_DIR")
            && !dir.is_empty()
        {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(dir) = lookup("STATIC_FILES_DIR")
            && !dir.is_empty()
        {
            config.static_files.dir = Some(PathBuf::from(dir));
        }
        if let Some(agent) = lookup("USER_AGENT")
            && !agent.is_empty()
        {
            config.user_agent = agent;
        }

        // Routing config
        if let Some(url) = lookup("ROUTING_URL") {
            config.routing.url = url;
        }
        if let Some(profile) = lookup("ROUTING_PROFILE") {
            config.routing.profile = profile;
        }
        if let Some(timeout) = secs("ROUTING_TIMEOUT_SECS") {
            config.routing.timeout = timeout;
        }

        // Geocoder config
        if let Some(url) = lookup("GEOCODER_URL") {
            config.geocoder.url = url;
        }
        if let Some(codes) = lookup("GEOCODER_COUNTRY_CODES") {
            config.geocoder.country_codes = Some(codes).filter(|c| !c.is_empty());
        }
        if let Some(suffix) = lookup("GEOCODER_COUNTRY_SUFFIX") {
            config.geocoder.country_suffix = Some(suffix).filter(|s| !s.is_empty());
        }
        if let Some(language) = lookup("GEOCODER_LANGUAGE") {
            config.geocoder.language = language;
        }
        if let Some(timeout) = secs("GEOCODER_TIMEOUT_SECS") {
            config.geocoder.timeout = timeout;
        }

        // Geolocation config
        if let Some(timeout) = secs("GEOLOCATION_TIMEOUT_SECS") {
            config.geolocation.timeout = timeout;
        }
        if let Some(max_age) = secs("GEOLOCATION_MAX_AGE_SECS") {
            config.geolocation.max_age = max_age;
        }
        if let (Some(lat), Some(lng)) = (lookup("DEVICE_LAT"), lookup("DEVICE_LNG"))
            && let (Ok(lat), Ok(lng)) = (lat.parse::<f64>(), lng.parse::<f64>())
        {
            let position = LatLng::new(lat, lng);
            if position.is_finite() {
                config.geolocation.device_position = Some(position);
            }
        }

        config
    }

    /// Ports to try in order: the preferred one, then its successors
    pub fn candidate_ports(&self) -> impl Iterator<Item = u16> + '_ {
        (0..=self.port_fallback_attempts).map_while(move |i| self.port.checked_add(i))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.host, "0.0.0.0");
        assert_eq!(config.port, 8000);
        assert_eq!(config.routing.profile, "driving");
        assert_eq!(config.geolocation.timeout, Duration::from_secs(10));
        assert_eq!(config.geolocation.max_age, Duration::from_secs(60));
        assert_eq!(config.map.zoom, 10);
    }

    #[test]
    fn test_config_from_lookup() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "9100"),
            ("ROUTING_TIMEOUT_SECS", "3"),
            ("GEOCODER_COUNTRY_CODES", ""),
            ("DEVICE_LAT", "35.0"),
            ("DEVICE_LNG", "135.0"),
            ("GEOLOCATION_MAX_AGE_SECS", "not-a-number"),
        ]));

        assert_eq!(config.port, 9100);
        assert_eq!(config.routing.timeout, Duration::from_secs(3));
        assert_eq!(config.geocoder.country_codes, None);
        assert_eq!(config.geocoder.country_suffix.as_deref(), Some("Japan"));
        assert_eq!(
            config.geolocation.device_position,
            Some(LatLng::new(35.0, 135.0))
        );
        assert_eq!(config.geolocation.max_age, Duration::from_secs(60));
    }

    #[test]
    fn test_candidate_ports() {
        let mut config = Config::default();
        config.port_fallback_attempts = 2;
        assert_eq!(config.candidate_ports().collect::<Vec<_>>(), vec![8000, 8001, 8002]);

        config.port = u16::MAX;
        assert_eq!(config.candidate_ports().collect::<Vec<_>>(), vec![u16::MAX]);
    }
}
