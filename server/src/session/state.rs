//! The `MapSession` aggregate
//!
//! One owned value holds the marker store, both transient sessions, the
//! filter and the mode controller. Every interaction goes through it, so
//! there is no shared mutable state outside this struct.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, TimeZone};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::measurement::{LiveResult, MeasureKind, MeasurementSession};
use super::mode::{ClickTarget, Effect, InteractionMode, InteractionModeController, ModeEvent};
use super::route::{
    RouteCompletion, RouteRequest, RouteSession, RouteSlot, RouteStatus, RouteSummary,
};
use crate::geometry::LatLng;
use crate::marker::{
    CategoryFilter, FilterEngine, FilterState, FilterSummary, ImportError, ImportReport,
    KeyValueStore, Marker, MarkerError, MarkerFields, MarkerId, MarkerStore,
};
use crate::protocol::{MeasurementView, RouteView, SessionSnapshot};
use crate::render::{MapRenderer, PrimitiveHandle, PrimitiveKind, PrimitiveStyle, Scene};
use crate::services::{PositionFix, Route, ServiceError};

/// Zoom applied when jumping to a city preset
pub const CITY_ZOOM: u8 = 12;
/// Zoom applied when showing a search hit or the device position
pub const PLACE_ZOOM: u8 = 15;

const TEMP_MARKER_COLOR: &str = "#3388ff";

#[derive(Debug, Error, PartialEq)]
pub enum SessionError {
    #[error(transparent)]
    Marker(#[from] MarkerError),

    #[error("No marker dialog is open")]
    NoDialog,

    #[error("The open dialog is not editing an existing marker")]
    NotEditing,
}

/// Draft shown by the marker dialog
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MarkerDialog {
    New { position: LatLng },
    Edit { id: MarkerId },
}

/// Last clicked position as shown in the status bar
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClickReadout {
    pub position: LatLng,
    pub text: String,
}

/// Preset destinations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum City {
    Tokyo,
    Osaka,
    Kyoto,
}

impl City {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "tokyo" => Some(City::Tokyo),
            "osaka" => Some(City::Osaka),
            "kyoto" => Some(City::Kyoto),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            City::Tokyo => "Tokyo",
            City::Osaka => "Osaka",
            City::Kyoto => "Kyoto",
        }
    }

    pub fn position(self) -> LatLng {
        match self {
            City::Tokyo => LatLng::new(35.6762, 139.6503),
            City::Osaka => LatLng::new(34.6937, 135.5023),
            City::Kyoto => LatLng::new(35.0116, 135.7681),
        }
    }
}

/// Input to `MapSession::handle`
#[derive(Debug, Clone, PartialEq)]
pub enum MapEvent {
    MapClicked(LatLng),
    MeasureToggled(MeasureKind),
    RouteToggled(RouteSlot),
    Reset,
    RouteRequested,
    RouteCleared,
    /// Response from the routing collaborator for a dispatched request
    RouteResolved {
        token: u64,
        result: Result<Route, ServiceError>,
    },
}

/// What an event did
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EventOutcome {
    DialogOpened {
        position: LatLng,
    },
    MeasurementUpdated {
        result: LiveResult,
    },
    RoutePointSet {
        slot: RouteSlot,
        position: LatLng,
        mode: InteractionMode,
        #[serde(skip_serializing_if = "Option::is_none")]
        dispatched: Option<RouteRequest>,
    },
    ModeChanged {
        mode: InteractionMode,
    },
    RouteDispatched {
        request: RouteRequest,
    },
    RouteApplied {
        summary: RouteSummary,
    },
    RouteFailed {
        message: String,
    },
    RouteDiscarded {
        token: u64,
    },
    RouteCleared,
    Rejected {
        code: &'static str,
        message: String,
    },
}

impl EventOutcome {
    /// The route request the caller must now resolve, if any
    pub fn dispatched(&self) -> Option<RouteRequest> {
        match self {
            EventOutcome::RouteDispatched { request } => Some(*request),
            EventOutcome::RoutePointSet { dispatched, .. } => *dispatched,
            _ => None,
        }
    }
}

/// Export document plus its download name
#[derive(Debug, Clone, PartialEq)]
pub struct ExportFile {
    pub file_name: String,
    pub body: String,
}

pub struct MapSession<R: MapRenderer = Scene> {
    markers: MarkerStore,
    measurement: MeasurementSession,
    route: RouteSession,
    filter: FilterState,
    controller: InteractionModeController,
    dialog: Option<MarkerDialog>,
    marker_layer: HashMap<MarkerId, PrimitiveHandle>,
    temp_markers: Vec<PrimitiveHandle>,
    focused: Option<MarkerId>,
    last_click: Option<ClickReadout>,
    renderer: R,
}

impl<R: MapRenderer> MapSession<R> {
    pub fn new(markers: MarkerStore, renderer: R) -> Self {
        let mut session = Self {
            markers,
            measurement: MeasurementSession::new(),
            route: RouteSession::new(),
            filter: FilterState::default(),
            controller: InteractionModeController::new(),
            dialog: None,
            marker_layer: HashMap::new(),
            temp_markers: Vec::new(),
            focused: None,
            last_click: None,
            renderer,
        };
        session.sync_marker_layer();
        session
    }

    /// Load the persisted markers and build a session around them
    pub async fn open(backend: Arc<dyn KeyValueStore>, renderer: R) -> Self {
        let markers = MarkerStore::open(backend).await;
        Self::new(markers, renderer)
    }

    pub fn markers(&self) -> &MarkerStore {
        &self.markers
    }

    pub fn measurement(&self) -> &MeasurementSession {
        &self.measurement
    }

    pub fn route(&self) -> &RouteSession {
        &self.route
    }

    pub fn mode(&self) -> InteractionMode {
        self.controller.mode()
    }

    pub fn dialog(&self) -> Option<MarkerDialog> {
        self.dialog
    }

    /// Marker whose popup is open after a focus jump
    pub fn focused(&self) -> Option<MarkerId> {
        self.focused
    }

    pub fn last_click(&self) -> Option<&ClickReadout> {
        self.last_click.as_ref()
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn temp_marker_count(&self) -> usize {
        self.temp_markers.len()
    }

    pub fn filter_summary(&self) -> FilterSummary {
        FilterEngine::apply(&self.markers, &self.filter.selected)
    }

    /// Feed one interaction event through the controller
    pub fn handle(&mut self, event: MapEvent) -> EventOutcome {
        match event {
            MapEvent::MapClicked(position) => self.on_click(position),
            MapEvent::MeasureToggled(kind) => self.on_mode_event(ModeEvent::MeasureToggled(kind)),
            MapEvent::RouteToggled(slot) => self.on_mode_event(ModeEvent::RouteToggled(slot)),
            MapEvent::Reset => self.on_mode_event(ModeEvent::Reset),
            MapEvent::RouteRequested => match self.route.request_route() {
                Ok(request) => {
                    if matches!(self.controller.mode(), InteractionMode::RoutePicking(_)) {
                        self.controller.force_idle();
                    }
                    EventOutcome::RouteDispatched { request }
                }
                Err(e) => {
                    info!("Route request rejected: {}", e);
                    EventOutcome::Rejected {
                        code: "incomplete_selection",
                        message: e.to_string(),
                    }
                }
            },
            MapEvent::RouteCleared => {
                self.route.clear(&mut self.renderer);
                if matches!(self.controller.mode(), InteractionMode::RoutePicking(_)) {
                    self.controller.force_idle();
                }
                EventOutcome::RouteCleared
            }
            MapEvent::RouteResolved { token, result } => {
                match self.route.complete(token, result, &mut self.renderer) {
                    RouteCompletion::Applied(summary) => EventOutcome::RouteApplied { summary },
                    RouteCompletion::Failed(_) => EventOutcome::RouteFailed {
                        message: match self.route.status() {
                            RouteStatus::Failed { message } => message.clone(),
                            _ => "Route search failed".to_string(),
                        },
                    },
                    RouteCompletion::Stale => EventOutcome::RouteDiscarded { token },
                }
            }
        }
    }

    fn on_click(&mut self, position: LatLng) -> EventOutcome {
        if !position.is_finite() {
            return EventOutcome::Rejected {
                code: "validation",
                message: "coordinates must be finite numbers".to_string(),
            };
        }
        self.last_click = Some(ClickReadout {
            position,
            text: position.readout(),
        });

        match self.controller.click_target() {
            ClickTarget::MarkerDialog => {
                self.dialog = Some(MarkerDialog::New { position });
                debug!("Marker dialog opened at {}", position);
                EventOutcome::DialogOpened { position }
            }
            ClickTarget::Measurement(kind) => {
                match self.measurement.add_point(position, &mut self.renderer) {
                    Some(result) => EventOutcome::MeasurementUpdated {
                        result: result.clone(),
                    },
                    None => {
                        warn!("Click ignored: no {:?} measurement in progress", kind);
                        EventOutcome::Rejected {
                            code: "no_measurement",
                            message: "No measurement in progress".to_string(),
                        }
                    }
                }
            }
            ClickTarget::RouteSlot(slot) => {
                self.route.set_point(slot, position, &mut self.renderer);
                let other_filled = match slot.other() {
                    RouteSlot::Start => self.route.start().is_some(),
                    RouteSlot::End => self.route.end().is_some(),
                };
                let transition = self.controller.after_route_point(slot, other_filled);
                let dispatched = self.run_effects(&transition.effects);
                EventOutcome::RoutePointSet {
                    slot,
                    position,
                    mode: transition.next,
                    dispatched,
                }
            }
        }
    }

    fn on_mode_event(&mut self, event: ModeEvent) -> EventOutcome {
        let transition = self.controller.apply(event);
        self.run_effects(&transition.effects);
        EventOutcome::ModeChanged {
            mode: transition.next,
        }
    }

    fn run_effects(&mut self, effects: &[Effect]) -> Option<RouteRequest> {
        let mut dispatched = None;
        for effect in effects {
            match *effect {
                Effect::StartMeasurement(kind) => self.measurement.start(kind, &mut self.renderer),
                Effect::StopMeasurement => self.measurement.finish(),
                Effect::CancelMeasurement => self.measurement.reset(true, &mut self.renderer),
                Effect::ResetMeasurementPoints => {
                    self.measurement.reset(false, &mut self.renderer)
                }
                Effect::BeginRouteSelection(slot) => self.route.begin_selection(slot),
                Effect::CancelRouteSelection => self.route.cancel_selection(&mut self.renderer),
                Effect::ClearRoute => self.route.clear(&mut self.renderer),
                Effect::DispatchRoute => match self.route.request_route() {
                    Ok(request) => dispatched = Some(request),
                    Err(e) => warn!("Automatic route dispatch failed: {}", e),
                },
            }
        }
        dispatched
    }

    pub async fn create_marker(
        &mut self,
        position: LatLng,
        fields: MarkerFields,
    ) -> Result<Marker, SessionError> {
        let marker = self.markers.create(position, fields).await?;
        self.sync_marker_layer();
        Ok(marker)
    }

    pub async fn update_marker(
        &mut self,
        id: MarkerId,
        fields: MarkerFields,
        position: Option<LatLng>,
    ) -> Result<Marker, SessionError> {
        let marker = self.markers.update(id, fields, position).await?;
        self.sync_marker_layer();
        Ok(marker)
    }

    pub async fn delete_marker(&mut self, id: MarkerId) -> Result<Marker, SessionError> {
        let marker = self.markers.delete(id).await?;
        if self.dialog == Some(MarkerDialog::Edit { id }) {
            self.dialog = None;
        }
        self.sync_marker_layer();
        Ok(marker)
    }

    /// Empty the store and drop every temporary marker
    pub async fn clear_markers(&mut self) -> usize {
        let removed = self.markers.clear_all().await;
        self.clear_temp_markers();
        if matches!(self.dialog, Some(MarkerDialog::Edit { .. })) {
            self.dialog = None;
        }
        self.sync_marker_layer();
        removed
    }

    pub fn open_edit_dialog(&mut self, id: MarkerId) -> Result<&Marker, SessionError> {
        let marker = self.markers.get(id).ok_or(MarkerError::NotFound(id))?;
        self.dialog = Some(MarkerDialog::Edit { id });
        Ok(marker)
    }

    /// Create or update from the open dialog. The dialog stays open on error.
    pub async fn save_dialog(&mut self, fields: MarkerFields) -> Result<Marker, SessionError> {
        let marker = match self.dialog.ok_or(SessionError::NoDialog)? {
            MarkerDialog::New { position } => self.markers.create(position, fields).await?,
            MarkerDialog::Edit { id } => self.markers.update(id, fields, None).await?,
        };
        self.dialog = None;
        self.sync_marker_layer();
        Ok(marker)
    }

    /// Close the dialog; returns whether one was open
    pub fn cancel_dialog(&mut self) -> bool {
        self.dialog.take().is_some()
    }

    pub async fn delete_from_dialog(&mut self) -> Result<Marker, SessionError> {
        match self.dialog {
            Some(MarkerDialog::Edit { id }) => self.delete_marker(id).await,
            Some(MarkerDialog::New { .. }) => Err(SessionError::NotEditing),
            None => Err(SessionError::NoDialog),
        }
    }

    /// Replace the marker set; temporary markers go too
    pub async fn import_records(&mut self, records: Vec<Value>) -> ImportReport {
        let report = self.markers.import_replace(records).await;
        self.after_import();
        report
    }

    pub async fn import_document(&mut self, text: &str) -> Result<ImportReport, ImportError> {
        let report = self.markers.import_document(text).await?;
        self.after_import();
        Ok(report)
    }

    fn after_import(&mut self) {
        self.clear_temp_markers();
        self.dialog = None;
        self.sync_marker_layer();
    }

    /// Pretty-printed record array named after `now`
    pub fn export_file<Tz>(&self, now: DateTime<Tz>) -> Result<ExportFile, serde_json::Error>
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        Ok(ExportFile {
            file_name: now.format("webmap_markers_%Y%m%d_%H%M.json").to_string(),
            body: self.markers.export_json()?,
        })
    }

    pub fn set_filter(&mut self, category: CategoryFilter) -> FilterSummary {
        debug!("Filter set to '{}'", category.as_str());
        self.filter.selected = category;
        self.sync_marker_layer();
        self.filter_summary()
    }

    /// Redraw marker pins for the currently visible subset
    fn sync_marker_layer(&mut self) {
        self.focused = self.focused.filter(|id| self.markers.get(*id).is_some());
        for (_, handle) in self.marker_layer.drain() {
            self.renderer.remove_primitive(handle);
        }
        for marker in self.markers.iter().filter(|m| self.filter.selected.matches(m)) {
            let style = marker.style();
            let handle = self.renderer.add_primitive(
                PrimitiveKind::Pin,
                vec![marker.position],
                PrimitiveStyle::color(style.color)
                    .with_glyph(style.emoji)
                    .with_label(marker.title.clone()),
            );
            self.marker_layer.insert(marker.id, handle);
        }
    }

    fn place_temp_marker(&mut self, position: LatLng, label: &str, zoom: u8) {
        self.renderer.set_view(position, zoom);
        let handle = self.renderer.add_primitive(
            PrimitiveKind::Pin,
            vec![position],
            PrimitiveStyle::color(TEMP_MARKER_COLOR).with_label(label),
        );
        self.temp_markers.push(handle);
    }

    fn clear_temp_markers(&mut self) {
        for handle in self.temp_markers.drain(..) {
            self.renderer.remove_primitive(handle);
        }
    }

    /// Center on a saved marker and open its popup
    pub fn focus_marker(&mut self, id: MarkerId) -> Result<&Marker, SessionError> {
        let marker = self.markers.get(id).ok_or(MarkerError::NotFound(id))?;
        self.renderer.set_view(marker.position, PLACE_ZOOM);
        self.focused = Some(id);
        debug!("Focused marker {}", id);
        Ok(marker)
    }

    pub fn zoom_to_city(&mut self, city: City) {
        info!("Zooming to {}", city.label());
        self.place_temp_marker(city.position(), city.label(), CITY_ZOOM);
    }

    /// Center on a chosen search result
    pub fn show_place(&mut self, position: LatLng, name: &str) -> Result<(), SessionError> {
        if !position.is_finite() {
            return Err(MarkerError::Validation("coordinates must be finite numbers".into()).into());
        }
        self.place_temp_marker(position, name, PLACE_ZOOM);
        Ok(())
    }

    pub fn show_device_position(&mut self, fix: &PositionFix) {
        self.place_temp_marker(fix.position, "Current location", PLACE_ZOOM);
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            mode: self.controller.mode(),
            measurement: MeasurementView {
                kind: self.measurement.mode(),
                points: self.measurement.points().to_vec(),
                result: self.measurement.result().cloned(),
            },
            route: RouteView {
                start: self.route.start(),
                end: self.route.end(),
                selection: self.route.selection(),
                status: self.route.status().clone(),
                summary: self.route.summary().cloned(),
            },
            filter: self.filter_summary(),
            dialog: self.dialog,
            focused: self.focused,
            last_click: self.last_click.clone(),
            zoom: self.renderer.current_zoom(),
            persistence: self.markers.persistence_status().clone(),
            marker_count: self.markers.len(),
            next_id: self.markers.next_id(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marker::{IconType, MemoryKeyValueStore};
    use crate::session::measurement::MeasurementReading;

    fn session() -> MapSession {
        MapSession::new(
            MarkerStore::new(Arc::new(MemoryKeyValueStore::new())),
            Scene::default(),
        )
    }

    fn route_between(start: LatLng, end: LatLng) -> Route {
        Route {
            geometry: vec![start, end],
            distance_meters: 2_500.0,
            duration_seconds: 420.0,
        }
    }

    #[tokio::test]
    async fn test_create_then_delete_leaves_next_id_advanced() {
        let mut session = session();
        let outcome = session.handle(MapEvent::MapClicked(LatLng::new(35.0, 135.0)));
        assert_eq!(
            outcome,
            EventOutcome::DialogOpened {
                position: LatLng::new(35.0, 135.0)
            }
        );

        let marker = session.save_dialog(MarkerFields::new("A")).await.unwrap();
        assert_eq!(session.renderer().count_of(PrimitiveKind::Pin), 1);

        session.delete_marker(marker.id).await.unwrap();

        assert!(session.markers().is_empty());
        assert!(session.markers().next_id() > 1);
        assert!(session.renderer().is_empty());
    }

    #[tokio::test]
    async fn test_focus_marker_centers_and_tracks_popup() {
        let mut session = session();
        let marker = session
            .create_marker(LatLng::new(34.9858, 135.7588), MarkerFields::new("Station"))
            .await
            .unwrap();

        let focused = session.focus_marker(marker.id).unwrap();
        assert_eq!(focused.title, "Station");
        assert_eq!(session.renderer().viewport().center, marker.position);
        assert_eq!(session.renderer().current_zoom(), PLACE_ZOOM);
        assert_eq!(session.snapshot().focused, Some(marker.id));

        session.delete_marker(marker.id).await.unwrap();
        assert_eq!(session.focused(), None);

        let err = session.focus_marker(marker.id).unwrap_err();
        assert_eq!(err, SessionError::Marker(MarkerError::NotFound(marker.id)));
    }

    #[tokio::test]
    async fn test_dialog_stays_open_on_empty_title() {
        let mut session = session();
        session.handle(MapEvent::MapClicked(LatLng::new(35.0, 135.0)));

        let err = session.save_dialog(MarkerFields::new("   ")).await.unwrap_err();

        assert!(matches!(err, SessionError::Marker(MarkerError::Validation(_))));
        assert!(session.dialog().is_some());
        assert!(session.markers().is_empty());
    }

    #[tokio::test]
    async fn test_edit_dialog_updates_and_deletes() {
        let mut session = session();
        let marker = session
            .create_marker(LatLng::new(35.0, 135.0), MarkerFields::new("Cafe"))
            .await
            .unwrap();

        session.open_edit_dialog(marker.id).unwrap();
        let updated = session
            .save_dialog(MarkerFields::new("Ramen").with_icon(IconType::Food))
            .await
            .unwrap();
        assert_eq!(updated.position, marker.position);
        assert_eq!(updated.icon_type, IconType::Food);
        assert!(session.dialog().is_none());

        session.open_edit_dialog(marker.id).unwrap();
        session.delete_from_dialog().await.unwrap();
        assert!(session.markers().is_empty());
        assert_eq!(
            session.open_edit_dialog(marker.id).unwrap_err(),
            SessionError::Marker(MarkerError::NotFound(marker.id))
        );
    }

    #[test]
    fn test_distance_measurement_scenario() {
        let mut session = session();
        session.handle(MapEvent::MeasureToggled(MeasureKind::Distance));
        session.handle(MapEvent::MapClicked(LatLng::new(0.0, 0.0)));
        let outcome = session.handle(MapEvent::MapClicked(LatLng::new(0.0, 0.01)));

        let EventOutcome::MeasurementUpdated { result } = outcome else {
            panic!("expected a measurement update");
        };
        let MeasurementReading::Distance { meters } = result.reading else {
            panic!("expected a distance");
        };
        assert!((meters - 1113.0).abs() < 1.0);
        assert_eq!(result.text, "Distance: 1.11 km");
        assert!(session.dialog().is_none());
    }

    #[tokio::test]
    async fn test_filter_with_no_matches_hides_everything() {
        let mut session = session();
        for title in ["Home", "Office"] {
            session
                .create_marker(LatLng::new(35.0, 135.0), MarkerFields::new(title))
                .await
                .unwrap();
        }

        let summary = session.set_filter(CategoryFilter::parse("food"));

        assert!(summary.visible.is_empty());
        assert_eq!(summary.hidden_count, summary.total_count);
        assert_eq!(session.renderer().count_of(PrimitiveKind::Pin), 0);

        session.set_filter(CategoryFilter::All);
        assert_eq!(session.renderer().count_of(PrimitiveKind::Pin), 2);
    }

    #[test]
    fn test_route_clicks_dispatch_and_resolve() {
        let mut session = session();
        let start = LatLng::new(35.68, 139.76);
        let end = LatLng::new(35.66, 139.70);

        session.handle(MapEvent::RouteToggled(RouteSlot::Start));
        let first = session.handle(MapEvent::MapClicked(start));
        assert!(first.dispatched().is_none());
        assert_eq!(session.mode(), InteractionMode::RoutePicking(RouteSlot::End));

        let second = session.handle(MapEvent::MapClicked(end));
        let request = second.dispatched().expect("second point dispatches");
        assert_eq!(session.mode(), InteractionMode::Idle);
        assert!(session.dialog().is_none());

        let resolved = session.handle(MapEvent::RouteResolved {
            token: request.token,
            result: Ok(route_between(start, end)),
        });
        let EventOutcome::RouteApplied { summary } = resolved else {
            panic!("expected route applied");
        };
        assert_eq!(summary.text, "Distance: 2.50 km / Duration: 7 min");
    }

    #[test]
    fn test_route_request_with_only_start_is_rejected() {
        let mut session = session();
        session.handle(MapEvent::RouteToggled(RouteSlot::Start));
        session.handle(MapEvent::MapClicked(LatLng::new(35.0, 135.0)));

        let outcome = session.handle(MapEvent::RouteRequested);

        assert!(matches!(outcome, EventOutcome::Rejected { .. }));
        assert_eq!(session.mode(), InteractionMode::RoutePicking(RouteSlot::End));
        assert_eq!(session.route().start(), Some(LatLng::new(35.0, 135.0)));
    }

    #[test]
    fn test_failed_route_leaves_idle_with_endpoints() {
        let mut session = session();
        session.handle(MapEvent::RouteToggled(RouteSlot::Start));
        session.handle(MapEvent::MapClicked(LatLng::new(35.0, 135.0)));
        let request = session
            .handle(MapEvent::MapClicked(LatLng::new(35.1, 135.1)))
            .dispatched()
            .unwrap();

        let outcome = session.handle(MapEvent::RouteResolved {
            token: request.token,
            result: Err(ServiceError::Timeout),
        });

        assert!(matches!(outcome, EventOutcome::RouteFailed { .. }));
        assert_eq!(session.mode(), InteractionMode::Idle);
        assert!(session.route().is_complete());
        assert!(matches!(session.route().status(), RouteStatus::Failed { .. }));
    }

    #[test]
    fn test_route_toggle_cancels_measurement_run() {
        let mut session = session();
        session.handle(MapEvent::MeasureToggled(MeasureKind::Area));
        session.handle(MapEvent::MapClicked(LatLng::new(0.0, 0.0)));
        session.handle(MapEvent::MapClicked(LatLng::new(0.0, 0.01)));

        session.handle(MapEvent::RouteToggled(RouteSlot::Start));

        assert_eq!(session.measurement().mode(), None);
        assert!(session.measurement().points().is_empty());
        assert!(session.renderer().is_empty());
    }

    #[tokio::test]
    async fn test_clear_markers_drops_temporary_markers() {
        let mut session = session();
        session
            .create_marker(LatLng::new(35.0, 135.0), MarkerFields::new("Saved"))
            .await
            .unwrap();
        session.zoom_to_city(City::Kyoto);
        assert_eq!(session.renderer().viewport().zoom, CITY_ZOOM);
        assert_eq!(session.temp_marker_count(), 1);

        let removed = session.clear_markers().await;

        assert_eq!(removed, 1);
        assert_eq!(session.temp_marker_count(), 0);
        assert!(session.renderer().is_empty());
    }

    #[test]
    fn test_export_file_name_uses_timestamp() {
        let session = session();
        let now = chrono::Utc.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();

        let file = session.export_file(now).unwrap();

        assert_eq!(file.file_name, "webmap_markers_20240309_0705.json");
        assert_eq!(file.body, "[]");
    }

    #[test]
    fn test_click_readout_uses_four_decimals() {
        let mut session = session();
        session.handle(MapEvent::MapClicked(LatLng::new(35.123456, 139.98766)));

        let snapshot = session.snapshot();
        assert_eq!(
            snapshot.last_click.map(|c| c.text),
            Some("35.1235, 139.9877".to_string())
        );
        assert_eq!(snapshot.zoom, 10);
    }
}
