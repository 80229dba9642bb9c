//! Routing collaborator (OSRM HTTP API)

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use super::types::ServiceError;
use crate::geometry::LatLng;

/// A computed route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Route {
    pub geometry: Vec<LatLng>,
    pub distance_meters: f64,
    pub duration_seconds: f64,
}

/// Trait for routing services
#[async_trait]
pub trait RoutingService: Send + Sync {
    /// Route from `start` to `end`; the first returned alternative wins
    async fn route(&self, start: LatLng, end: LatLng) -> Result<Route, ServiceError>;
}

/// Wire format of an OSRM `route` response
#[derive(Debug, Deserialize)]
pub struct OsrmResponse {
    pub code: String,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub routes: Vec<OsrmRoute>,
}

#[derive(Debug, Deserialize)]
pub struct OsrmRoute {
    pub geometry: OsrmGeometry,
    pub distance: f64,
    pub duration: f64,
}

/// GeoJSON LineString, coordinates in `[lng, lat]` order
#[derive(Debug, Deserialize)]
pub struct OsrmGeometry {
    pub coordinates: Vec<[f64; 2]>,
}

impl OsrmResponse {
    /// First route, or the failure the response describes
    pub fn into_route(self) -> Result<Route, ServiceError> {
        if self.code != "Ok" {
            return Err(ServiceError::NoRoute(
                self.message.unwrap_or(self.code),
            ));
        }
        let first = self
            .routes
            .into_iter()
            .next()
            .ok_or(ServiceError::EmptyResult)?;

        Ok(Route {
            geometry: first
                .geometry
                .coordinates
                .into_iter()
                .map(|[lng, lat]| LatLng::new(lat, lng))
                .collect(),
            distance_meters: first.distance,
            duration_seconds: first.duration,
        })
    }
}

/// OSRM-backed routing service
pub struct OsrmRoutingService {
    client: reqwest::Client,
    base_url: String,
    profile: String,
}

impl OsrmRoutingService {
    pub fn new(
        base_url: &str,
        profile: &str,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            profile: profile.to_string(),
        })
    }

    pub fn route_url(&self, start: LatLng, end: LatLng) -> String {
        format!(
            "{}/route/v1/{}/{},{};{},{}?overview=full&geometries=geojson",
            self.base_url, self.profile, start.lng, start.lat, end.lng, end.lat
        )
    }
}

#[async_trait]
impl RoutingService for OsrmRoutingService {
    async fn route(&self, start: LatLng, end: LatLng) -> Result<Route, ServiceError> {
        let url = self.route_url(start, end);
        debug!("Requesting route: {}", url);

        let response = self.client.get(&url).send().await?;
        let status = response.status();
        // OSRM reports NoRoute/InvalidQuery as a JSON body on 4xx
        let body = response.text().await?;
        match serde_json::from_str::<OsrmResponse>(&body) {
            Ok(parsed) => parsed.into_route(),
            Err(_) if !status.is_success() => Err(ServiceError::Status(status.as_u16())),
            Err(e) => Err(ServiceError::Decode(e.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> Result<Route, ServiceError> {
        serde_json::from_value::<OsrmResponse>(value)
            .unwrap()
            .into_route()
    }

    #[test]
    fn test_first_route_is_used_and_coordinates_flipped() {
        let route = parse(json!({
            "code": "Ok",
            "routes": [
                {"geometry": {"type": "LineString", "coordinates": [[135.0, 35.0], [135.1, 35.1]]},
                 "distance": 15234.5, "duration": 1260.0},
                {"geometry": {"type": "LineString", "coordinates": []},
                 "distance": 1.0, "duration": 1.0}
            ]
        }))
        .unwrap();

        assert_eq!(route.geometry[0], LatLng::new(35.0, 135.0));
        assert_eq!(route.distance_meters, 15234.5);
        assert_eq!(route.duration_seconds, 1260.0);
    }

    #[test]
    fn test_non_ok_code_is_failure() {
        let err = parse(json!({"code": "NoRoute", "message": "Impossible route"})).unwrap_err();
        assert_eq!(err, ServiceError::NoRoute("Impossible route".to_string()));
    }

    #[test]
    fn test_empty_route_list_is_failure() {
        let err = parse(json!({"code": "Ok", "routes": []})).unwrap_err();
        assert_eq!(err, ServiceError::EmptyResult);
    }

    #[test]
    fn test_route_url_uses_lng_lat_order() {
        let service = OsrmRoutingService::new(
            "https://router.example/",
            "driving",
            Duration::from_secs(5),
            "webmap-test",
        )
        .unwrap();
        assert_eq!(
            service.route_url(LatLng::new(35.0, 135.0), LatLng::new(34.5, 135.5)),
            "https://router.example/route/v1/driving/135,35;135.5,34.5?overview=full&geometries=geojson"
        );
    }
}
