//! MarkerStore: sole owner of persistent markers
//!
//! Every successful mutation writes the full marker set through to the
//! persistence collaborator. A failed write is logged and recorded in
//! `PersistenceStatus` but never rolls back the in-memory change.

use indexmap::IndexMap;
use metrics::counter;
use serde::Serialize;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::persistence::{KeyValueStore, PersistenceError};
use super::types::{
    MAX_MARKER_ID, Marker, MarkerError, MarkerFields, MarkerId, MarkerRecord, RawMarkerRecord,
    ValidRecord, parse_import_document,
};
use crate::geometry::LatLng;

/// Fixed key the marker document is stored under
pub const STORAGE_KEY: &str = "webmap_markers";

/// Outcome of the most recent write-through
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PersistenceStatus {
    Synced,
    Degraded { error: String },
}

/// Counts from `load_from_persistence`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub loaded: usize,
    pub skipped: usize,
}

/// Counts from `import_replace`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: usize,
    pub total: usize,
}

/// Ordered marker set with monotonic id assignment
pub struct MarkerStore {
    markers: IndexMap<MarkerId, Marker>,
    next_id: MarkerId,
    backend: Arc<dyn KeyValueStore>,
    persistence: PersistenceStatus,
}

impl MarkerStore {
    /// Empty store; call `load_from_persistence` to read saved markers
    pub fn new(backend: Arc<dyn KeyValueStore>) -> Self {
        Self {
            markers: IndexMap::new(),
            next_id: 1,
            backend,
            persistence: PersistenceStatus::Synced,
        }
    }

    /// Build a store and load whatever the backend holds.
    ///
    /// A read failure is logged and leaves the store empty.
    pub async fn open(backend: Arc<dyn KeyValueStore>) -> Self {
        let mut store = Self::new(backend);
        if let Err(e) = store.load_from_persistence().await {
            error!("Failed to load markers: {}", e);
            store.persistence = PersistenceStatus::Degraded {
                error: e.to_string(),
            };
        }
        store
    }

    pub fn next_id(&self) -> MarkerId {
        self.next_id
    }

    pub fn len(&self) -> usize {
        self.markers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.markers.is_empty()
    }

    pub fn get(&self, id: MarkerId) -> Option<&Marker> {
        self.markers.get(&id)
    }

    /// Markers in creation order
    pub fn iter(&self) -> impl Iterator<Item = &Marker> {
        self.markers.values()
    }

    pub fn persistence_status(&self) -> &PersistenceStatus {
        &self.persistence
    }

    /// Create a marker at `position`
    pub async fn create(
        &mut self,
        position: LatLng,
        fields: MarkerFields,
    ) -> Result<Marker, MarkerError> {
        let marker = self.insert_new(position, fields)?;
        counter!("webmap_markers_created_total").increment(1);
        info!("Created marker {} '{}' at {}", marker.id, marker.title, position);
        self.persist().await;
        Ok(marker)
    }

    /// Replace a marker's editable fields, and its position when given
    pub async fn update(
        &mut self,
        id: MarkerId,
        fields: MarkerFields,
        position: Option<LatLng>,
    ) -> Result<Marker, MarkerError> {
        let fields = fields.normalized()?;
        if let Some(p) = position {
            validate_position(p)?;
        }

        let marker = self.markers.get_mut(&id).ok_or_else(|| {
            warn!("Update of unknown marker {}", id);
            MarkerError::NotFound(id)
        })?;
        marker.title = fields.title;
        marker.description = fields.description;
        marker.icon_type = fields.icon_type;
        if let Some(p) = position {
            marker.position = p;
        }
        let updated = marker.clone();

        debug!("Updated marker {}", id);
        self.persist().await;
        Ok(updated)
    }

    /// Remove a marker
    pub async fn delete(&mut self, id: MarkerId) -> Result<Marker, MarkerError> {
        let removed = self.markers.shift_remove(&id).ok_or_else(|| {
            warn!("Delete of unknown marker {}", id);
            MarkerError::NotFound(id)
        })?;
        counter!("webmap_markers_deleted_total").increment(1);
        info!("Deleted marker {} '{}'", id, removed.title);
        self.persist().await;
        Ok(removed)
    }

    /// Remove every marker. `next_id` is left untouched.
    pub async fn clear_all(&mut self) -> usize {
        let count = self.markers.len();
        self.markers.clear();
        info!("Cleared {} markers", count);
        self.persist().await;
        count
    }

    /// Replace the in-memory set with the persisted document.
    ///
    /// Invalid records are skipped. Records without a usable id (missing,
    /// non-positive, or already taken) get ids above the largest valid one.
    pub async fn load_from_persistence(&mut self) -> Result<LoadReport, PersistenceError> {
        let Some(document) = self.backend.get(STORAGE_KEY).await? else {
            debug!("No saved markers under '{}'", STORAGE_KEY);
            return Ok(LoadReport {
                loaded: 0,
                skipped: 0,
            });
        };

        let items = match serde_json::from_str::<Value>(&document)? {
            Value::Array(items) => items,
            _ => {
                return Err(PersistenceError::Backend(format!(
                    "'{}' does not hold a marker array",
                    STORAGE_KEY
                )));
            }
        };

        let total = items.len();
        let valid: Vec<ValidRecord> = items
            .into_iter()
            .filter_map(RawMarkerRecord::from_value)
            .filter_map(|raw| raw.validate())
            .collect();

        let mut seen = HashSet::new();
        let explicit: Vec<Option<MarkerId>> = valid
            .iter()
            .map(|r| r.id.filter(|id| seen.insert(*id)))
            .collect();
        let mut max_id = explicit.iter().flatten().copied().max().unwrap_or(0);

        self.markers.clear();
        for (record, id) in valid.into_iter().zip(explicit) {
            let id = match id {
                Some(id) => id,
                None if max_id < MAX_MARKER_ID => {
                    max_id += 1;
                    max_id
                }
                None => {
                    warn!("No id left for saved marker '{}'", record.fields.title);
                    continue;
                }
            };
            self.markers.insert(
                id,
                Marker {
                    id,
                    position: record.position,
                    title: record.fields.title,
                    description: record.fields.description,
                    icon_type: record.fields.icon_type,
                },
            );
        }
        self.next_id = self.next_id.max(max_id + 1);

        let report = LoadReport {
            loaded: self.markers.len(),
            skipped: total - self.markers.len(),
        };
        info!(
            "Loaded {} saved markers ({} skipped), next id {}",
            report.loaded, report.skipped, self.next_id
        );
        Ok(report)
    }

    /// The full marker set in canonical record form
    pub fn export_all(&self) -> Vec<MarkerRecord> {
        self.markers.values().map(Marker::to_record).collect()
    }

    /// Pretty-printed export document
    pub fn export_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.export_all())
    }

    /// Clear the store, then create a marker for every valid record.
    ///
    /// Imported markers get fresh ids; ids in the document are ignored.
    pub async fn import_replace(&mut self, records: Vec<Value>) -> ImportReport {
        let total = records.len();
        self.markers.clear();

        let mut imported = 0;
        for raw in records.into_iter().filter_map(RawMarkerRecord::from_value) {
            let Some(record) = raw.validate() else {
                continue;
            };
            if self.insert_new(record.position, record.fields).is_ok() {
                imported += 1;
            }
        }

        counter!("webmap_markers_created_total").increment(imported as u64);
        info!("Imported {} of {} markers", imported, total);
        self.persist().await;

        ImportReport {
            imported,
            skipped: total - imported,
            total,
        }
    }

    /// Parse an import document and replace the store with it
    pub async fn import_document(
        &mut self,
        text: &str,
    ) -> Result<ImportReport, super::types::ImportError> {
        let records = parse_import_document(text)?;
        Ok(self.import_replace(records).await)
    }

    fn insert_new(&mut self, position: LatLng, fields: MarkerFields) -> Result<Marker, MarkerError> {
        validate_position(position)?;
        let fields = fields.normalized()?;

        let id = self.next_id;
        if id > MAX_MARKER_ID {
            return Err(MarkerError::Validation("marker ids exhausted".to_string()));
        }
        self.next_id = id + 1;

        let marker = Marker {
            id,
            position,
            title: fields.title,
            description: fields.description,
            icon_type: fields.icon_type,
        };
        self.markers.insert(id, marker.clone());
        Ok(marker)
    }

    /// Full-set write-through
    async fn persist(&mut self) {
        let result = match serde_json::to_string(&self.export_all()) {
            Ok(document) => self.backend.set(STORAGE_KEY, &document).await,
            Err(e) => Err(e.into()),
        };

        match result {
            Ok(()) => {
                debug!("Persisted {} markers", self.markers.len());
                self.persistence = PersistenceStatus::Synced;
            }
            Err(e) => {
                counter!("webmap_persistence_failures_total").increment(1);
                error!("Failed to persist markers: {}", e);
                self.persistence = PersistenceStatus::Degraded {
                    error: e.to_string(),
                };
            }
        }
    }
}

fn validate_position(position: LatLng) -> Result<(), MarkerError> {
    if position.is_finite() {
        Ok(())
    } else {
        Err(MarkerError::Validation(
            "coordinates must be finite numbers".to_string(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::persistence::MemoryKeyValueStore;
    use crate::marker::types::IconType;
    use async_trait::async_trait;
    use serde_json::json;

    struct FailingStore;

    #[async_trait]
    impl KeyValueStore for FailingStore {
        async fn get(&self, _key: &str) -> Result<Option<String>, PersistenceError> {
            Ok(None)
        }

        async fn set(&self, _key: &str, _value: &str) -> Result<(), PersistenceError> {
            Err(PersistenceError::Backend("quota exceeded".to_string()))
        }
    }

    fn memory_store() -> (MarkerStore, Arc<MemoryKeyValueStore>) {
        let backend = Arc::new(MemoryKeyValueStore::new());
        (MarkerStore::new(backend.clone()), backend)
    }

    async fn saved_records(backend: &MemoryKeyValueStore) -> Vec<MarkerRecord> {
        let doc = backend.get(STORAGE_KEY).await.unwrap().unwrap();
        serde_json::from_str(&doc).unwrap()
    }

    #[tokio::test]
    async fn test_create_assigns_increasing_ids_and_persists() {
        let (mut store, backend) = memory_store();

        let a = store
            .create(LatLng::new(35.0, 135.0), MarkerFields::new("A"))
            .await
            .unwrap();
        let b = store
            .create(LatLng::new(35.1, 135.1), MarkerFields::new("B"))
            .await
            .unwrap();

        assert_eq!(a.id, 1);
        assert!(b.id > a.id);
        assert_eq!(store.next_id(), 3);
        assert_eq!(saved_records(&backend).await.len(), 2);
    }

    #[tokio::test]
    async fn test_create_rejects_blank_title_and_bad_coordinates() {
        let (mut store, _) = memory_store();

        let err = store
            .create(LatLng::new(35.0, 135.0), MarkerFields::new("  "))
            .await
            .unwrap_err();
        assert!(matches!(err, MarkerError::Validation(_)));

        let err = store
            .create(LatLng::new(f64::NAN, 135.0), MarkerFields::new("A"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarkerError::Validation(_)));

        assert!(store.is_empty());
        assert_eq!(store.next_id(), 1);
    }

    #[tokio::test]
    async fn test_delete_keeps_next_id() {
        let (mut store, _) = memory_store();
        let marker = store
            .create(LatLng::new(35.0, 135.0), MarkerFields::new("A"))
            .await
            .unwrap();

        store.delete(marker.id).await.unwrap();

        assert!(store.is_empty());
        assert_eq!(store.next_id(), 2);
        assert!(store.next_id() > 1);
    }

    #[tokio::test]
    async fn test_delete_and_update_missing_report_not_found() {
        let (mut store, _) = memory_store();
        assert_eq!(store.delete(42).await, Err(MarkerError::NotFound(42)));
        assert_eq!(
            store.update(42, MarkerFields::new("A"), None).await,
            Err(MarkerError::NotFound(42))
        );
    }

    #[tokio::test]
    async fn test_update_preserves_position_unless_given() {
        let (mut store, _) = memory_store();
        let marker = store
            .create(LatLng::new(35.0, 135.0), MarkerFields::new("A"))
            .await
            .unwrap();

        let updated = store
            .update(
                marker.id,
                MarkerFields::new("B").with_icon(IconType::Food),
                None,
            )
            .await
            .unwrap();
        assert_eq!(updated.position, marker.position);
        assert_eq!(updated.title, "B");
        assert_eq!(updated.icon_type, IconType::Food);

        let moved = store
            .update(marker.id, MarkerFields::new("B"), Some(LatLng::new(1.0, 2.0)))
            .await
            .unwrap();
        assert_eq!(moved.position, LatLng::new(1.0, 2.0));
    }

    #[tokio::test]
    async fn test_clear_all_keeps_next_id() {
        let (mut store, backend) = memory_store();
        for title in ["A", "B", "C"] {
            store
                .create(LatLng::new(0.0, 0.0), MarkerFields::new(title))
                .await
                .unwrap();
        }
        assert_eq!(store.clear_all().await, 3);
        assert!(store.is_empty());
        assert_eq!(store.next_id(), 4);
        assert!(saved_records(&backend).await.is_empty());
    }

    #[tokio::test]
    async fn test_load_skips_invalid_and_fills_missing_ids() {
        let doc = json!([
            {"lat": 35.0, "lng": 135.0, "title": "no id"},
            {"id": 7, "lat": 35.1, "lng": 135.1, "title": "seven", "iconType": "park"},
            {"id": 2, "lat": "bad", "lng": 135.1, "title": "bad lat"},
            {"id": 3, "lat": 1, "lng": 1, "title": ""},
            {"id": 7, "lat": 1, "lng": 1, "title": "duplicate"},
            "not an object"
        ])
        .to_string();
        let backend = Arc::new(MemoryKeyValueStore::with_entry(STORAGE_KEY, &doc));
        let mut store = MarkerStore::new(backend);

        let report = store.load_from_persistence().await.unwrap();

        assert_eq!(report, LoadReport { loaded: 3, skipped: 3 });
        let ids: Vec<MarkerId> = store.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![8, 7, 9]);
        assert_eq!(store.get(7).unwrap().icon_type, IconType::Park);
        assert_eq!(store.next_id(), 10);
    }

    #[tokio::test]
    async fn test_load_ignores_out_of_range_id() {
        let doc = json!([
            {"id": 18446744073709551615u64, "lat": 35, "lng": 135, "title": "A"},
            {"id": 4, "lat": 35, "lng": 135, "title": "B"}
        ])
        .to_string();
        let backend = Arc::new(MemoryKeyValueStore::with_entry(STORAGE_KEY, &doc));
        let mut store = MarkerStore::new(backend);

        let report = store.load_from_persistence().await.unwrap();

        assert_eq!(report, LoadReport { loaded: 2, skipped: 0 });
        let ids: Vec<MarkerId> = store.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![5, 4]);
        assert_eq!(store.next_id(), 6);
    }

    #[tokio::test]
    async fn test_ids_stop_at_the_ceiling() {
        let doc = json!([
            {"id": MAX_MARKER_ID, "lat": 35, "lng": 135, "title": "last"},
            {"lat": 35, "lng": 135, "title": "no room"}
        ])
        .to_string();
        let backend = Arc::new(MemoryKeyValueStore::with_entry(STORAGE_KEY, &doc));
        let mut store = MarkerStore::new(backend);

        let report = store.load_from_persistence().await.unwrap();
        assert_eq!(report, LoadReport { loaded: 1, skipped: 1 });
        assert_eq!(store.next_id(), MAX_MARKER_ID + 1);

        let err = store
            .create(LatLng::new(35.0, 135.0), MarkerFields::new("C"))
            .await
            .unwrap_err();
        assert!(matches!(err, MarkerError::Validation(_)));
        assert_eq!(store.len(), 1);
        assert_eq!(store.next_id(), MAX_MARKER_ID + 1);
    }

    #[tokio::test]
    async fn test_load_empty_backend_starts_at_one() {
        let (mut store, _) = memory_store();
        let report = store.load_from_persistence().await.unwrap();
        assert_eq!(report.loaded, 0);
        assert_eq!(store.next_id(), 1);
    }

    #[tokio::test]
    async fn test_persist_then_load_round_trips() {
        let (mut store, backend) = memory_store();
        store
            .create(
                LatLng::new(35.0, 135.0),
                MarkerFields::new("A").with_description("first"),
            )
            .await
            .unwrap();
        store
            .create(
                LatLng::new(34.0, 134.0),
                MarkerFields::new("B").with_icon(IconType::Star),
            )
            .await
            .unwrap();
        let exported = store.export_all();

        let mut reloaded = MarkerStore::new(backend);
        reloaded.load_from_persistence().await.unwrap();

        assert_eq!(reloaded.export_all(), exported);
        assert_eq!(reloaded.next_id(), 3);
    }

    #[tokio::test]
    async fn test_import_replace_counts_and_is_idempotent() {
        let (mut store, _) = memory_store();
        store
            .create(LatLng::new(0.0, 0.0), MarkerFields::new("old"))
            .await
            .unwrap();

        let records = vec![
            json!({"id": 1, "lat": 35.0, "lng": 135.0, "title": "A", "iconType": "food"}),
            json!({"lat": 36.0, "lng": 136.0, "title": "B"}),
            json!({"lat": "x", "lng": 136.0, "title": "C"}),
        ];

        let first = store.import_replace(records.clone()).await;
        assert_eq!(
            first,
            ImportReport {
                imported: 2,
                skipped: 1,
                total: 3
            }
        );
        let content = |s: &MarkerStore| -> Vec<(String, IconType)> {
            s.iter().map(|m| (m.title.clone(), m.icon_type)).collect()
        };
        let after_first = content(&store);

        let second = store.import_replace(records).await;
        assert_eq!(second, first);
        assert_eq!(content(&store), after_first);
        assert!(store.iter().all(|m| m.title != "old"));
        // ids keep climbing across imports
        assert!(store.iter().all(|m| m.id > 3));
    }

    #[tokio::test]
    async fn test_import_document_rejects_non_array() {
        let (mut store, _) = memory_store();
        assert!(store.import_document("{}").await.is_err());
    }

    #[tokio::test]
    async fn test_write_failure_keeps_memory_state() {
        let mut store = MarkerStore::new(Arc::new(FailingStore));

        let marker = store
            .create(LatLng::new(35.0, 135.0), MarkerFields::new("A"))
            .await
            .unwrap();

        assert_eq!(store.get(marker.id), Some(&marker));
        assert!(matches!(
            store.persistence_status(),
            PersistenceStatus::Degraded { .. }
        ));
    }
}
