//! Webmap Server Library
//!
//! This module exports the map session components for use in integration
//! tests and the `webmap` binary.

pub mod config;
pub mod geometry;
pub mod marker;
pub mod protocol;
pub mod render;
pub mod server;
pub mod services;
pub mod session;

// Re-export commonly used types
pub use config::Config;
pub use geometry::LatLng;
pub use marker::{MarkerStore, STORAGE_KEY};
pub use protocol::{ClientEvent, SessionSnapshot};
pub use server::{AppState, api_routes};
pub use session::{MapEvent, MapSession};
