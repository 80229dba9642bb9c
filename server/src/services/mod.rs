//! External geo-service collaborators
//!
//! - `RoutingService` / `OsrmRoutingService`: driving routes between two points
//! - `GeocodingService` / `NominatimGeocoder` plus `PlaceSearch`, the
//!   progressively broader search built on top of it
//! - `GeolocationProvider` / `Geolocator`: one-shot device position with
//!   timeout and maximum-age caching

pub mod geocoding;
pub mod geolocation;
pub mod routing;
mod types;

pub use geocoding::{
    GeocodeQuery, GeocodingService, NominatimGeocoder, Place, PlaceSearch, SearchConfig,
    SearchHit, SearchResults,
};
pub use geolocation::{
    FixedPositionProvider, GeolocationProvider, Geolocator, PositionFix, PositionOptions,
};
pub use routing::{OsrmRoutingService, Route, RoutingService};
pub use types::ServiceError;
