//! Marker module
//!
//! Owns the persistent annotation markers:
//! - `MarkerStore` for CRUD, id assignment, load/export/import
//! - `KeyValueStore` trait for the persistence collaborator, with file-backed
//!   and in-memory implementations
//! - `FilterEngine` for the category-filtered visible subset

pub mod filter;
pub mod persistence;
pub mod store;
pub mod types;

pub use filter::{CategoryFilter, FilterEngine, FilterState, FilterSummary};
pub use persistence::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, PersistenceError};
pub use store::{ImportReport, LoadReport, MarkerStore, PersistenceStatus, STORAGE_KEY};
pub use types::{
    IconStyle, IconType, ImportError, MAX_MARKER_ID, Marker, MarkerError, MarkerFields, MarkerId,
    MarkerRecord, RawMarkerRecord, parse_import_document,
};
