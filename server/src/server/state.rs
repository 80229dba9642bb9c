use std::sync::Arc;
use tokio::sync::Mutex;

use crate::services::{GeocodingService, Geolocator, PlaceSearch, RoutingService, SearchConfig};
use crate::session::MapSession;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    /// The single interactive session; handlers hold the lock only for
    /// synchronous work, never across an upstream call
    pub session: Arc<Mutex<MapSession>>,
    pub routing: Arc<dyn RoutingService>,
    pub geocoder: Arc<dyn GeocodingService>,
    pub search: Arc<PlaceSearch>,
    pub geolocator: Arc<Geolocator>,
}

impl AppState {
    pub fn new(
        session: MapSession,
        routing: Arc<dyn RoutingService>,
        geocoder: Arc<dyn GeocodingService>,
        geolocator: Arc<Geolocator>,
    ) -> Self {
        Self {
            session: Arc::new(Mutex::new(session)),
            routing,
            geocoder,
            search: Arc::new(PlaceSearch::new(SearchConfig::default())),
            geolocator,
        }
    }

    pub fn with_search_config(mut self, config: SearchConfig) -> Self {
        self.search = Arc::new(PlaceSearch::new(config));
        self
    }
}
