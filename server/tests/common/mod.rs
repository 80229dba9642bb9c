//! Common Test Utilities for Integration Tests
//!
//! Shared helpers used across integration test modules.

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use serde_json::Value;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tower::util::ServiceExt;
use webmap_server::geometry::LatLng;
use webmap_server::marker::{MarkerStore, MemoryKeyValueStore};
use webmap_server::render::Scene;
use webmap_server::services::{
    FixedPositionProvider, GeocodeQuery, GeocodingService, Geolocator, Place, PositionOptions,
    Route, RoutingService, ServiceError,
};
use webmap_server::{AppState, MapSession, api_routes};

/// Position reported by the test geolocation provider
pub const DEVICE_POSITION: LatLng = LatLng {
    lat: 34.6937,
    lng: 135.5023,
};

/// Routing service returning a canned result
pub struct MockRoutingService {
    result: Result<Route, ServiceError>,
    calls: AtomicUsize,
}

impl MockRoutingService {
    pub fn ok() -> Self {
        Self::with_result(Ok(Route {
            geometry: vec![LatLng::new(35.68, 139.76), LatLng::new(35.66, 139.70)],
            distance_meters: 7_450.0,
            duration_seconds: 4_000.0,
        }))
    }

    pub fn with_result(result: Result<Route, ServiceError>) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RoutingService for MockRoutingService {
    async fn route(&self, _start: LatLng, _end: LatLng) -> Result<Route, ServiceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

/// Geocoder answering every query with the same places
pub struct MockGeocoder {
    places: Vec<Place>,
    queries: Mutex<Vec<GeocodeQuery>>,
}

impl MockGeocoder {
    pub fn new(places: Vec<Place>) -> Self {
        Self {
            places,
            queries: Mutex::new(Vec::new()),
        }
    }

    pub fn queries(&self) -> Vec<GeocodeQuery> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl GeocodingService for MockGeocoder {
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<Place>, ServiceError> {
        self.queries.lock().unwrap().push(query.clone());
        Ok(self.places.clone())
    }
}

pub fn create_test_place(id: &str, display_name: &str) -> Place {
    Place {
        place_id: id.to_string(),
        display_name: display_name.to_string(),
        position: LatLng::new(35.6586, 139.7454),
    }
}

/// Handles to the collaborators behind a test app
pub struct TestServices {
    pub routing: Arc<MockRoutingService>,
    pub geocoder: Arc<MockGeocoder>,
}

/// Create a test application with explicit collaborators
pub fn create_test_app_with(
    routing: MockRoutingService,
    device: Option<LatLng>,
) -> (Router, AppState, TestServices) {
    let store = MarkerStore::new(Arc::new(MemoryKeyValueStore::new()));
    let session = MapSession::new(store, Scene::default());

    let routing = Arc::new(routing);
    let geocoder = Arc::new(MockGeocoder::new(vec![
        create_test_place("1", "Tokyo Tower, Minato, Tokyo, Japan"),
        create_test_place("2", "Tokyo Tower Street, Minato, Tokyo, Japan"),
    ]));
    let geolocator = Arc::new(Geolocator::new(
        Arc::new(FixedPositionProvider::new(device)),
        PositionOptions::default(),
    ));

    let state = AppState::new(session, routing.clone(), geocoder.clone(), geolocator);
    let app = api_routes(state.clone());

    (app, state, TestServices { routing, geocoder })
}

/// Create a test application router with state
pub fn create_test_app_with_state() -> (Router, AppState) {
    let (app, state, _) = create_test_app_with(MockRoutingService::ok(), Some(DEVICE_POSITION));
    (app, state)
}

/// Create a test application router with all routes configured
pub fn create_test_app() -> Router {
    create_test_app_with_state().0
}

/// Send a request and decode the JSON response body (`Null` when empty)
pub async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(json) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

/// Post an interaction event
pub async fn post_event(app: &Router, event: Value) -> (StatusCode, Value) {
    send(app, "POST", "/api/events", Some(event)).await
}
