use serde::{Deserialize, Serialize};

use crate::geometry::LatLng;
use crate::marker::{FilterSummary, IconType, MarkerFields, MarkerId, PersistenceStatus};
use crate::render::{Primitive, Viewport};
use crate::session::{
    ClickReadout, EventOutcome, InteractionMode, LiveResult, MapEvent, MarkerDialog, MeasureKind,
    RouteSlot, RouteStatus, RouteSummary,
};

/// Interaction events posted to `/api/events`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    MapClicked { lat: f64, lng: f64 },
    MeasureToggled { kind: MeasureKind },
    RouteToggled { slot: RouteSlot },
    Reset,
    RouteRequested,
    RouteCleared,
}

impl From<ClientEvent> for MapEvent {
    fn from(event: ClientEvent) -> Self {
        match event {
            ClientEvent::MapClicked { lat, lng } => MapEvent::MapClicked(LatLng::new(lat, lng)),
            ClientEvent::MeasureToggled { kind } => MapEvent::MeasureToggled(kind),
            ClientEvent::RouteToggled { slot } => MapEvent::RouteToggled(slot),
            ClientEvent::Reset => MapEvent::Reset,
            ClientEvent::RouteRequested => MapEvent::RouteRequested,
            ClientEvent::RouteCleared => MapEvent::RouteCleared,
        }
    }
}

/// Reply to an interaction event
#[derive(Debug, Clone, Serialize)]
pub struct EventResponse {
    pub outcome: EventOutcome,
    /// Set when the event dispatched a route request that was resolved inline
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<EventOutcome>,
    pub state: SessionSnapshot,
}

#[derive(Debug, Clone, Serialize)]
pub struct MeasurementView {
    pub kind: Option<MeasureKind>,
    pub points: Vec<LatLng>,
    pub result: Option<LiveResult>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteView {
    pub start: Option<LatLng>,
    pub end: Option<LatLng>,
    pub selection: Option<RouteSlot>,
    pub status: RouteStatus,
    pub summary: Option<RouteSummary>,
}

/// Everything the front-end needs to redraw its panels
#[derive(Debug, Clone, Serialize)]
pub struct SessionSnapshot {
    pub mode: InteractionMode,
    pub measurement: MeasurementView,
    pub route: RouteView,
    pub filter: FilterSummary,
    pub dialog: Option<MarkerDialog>,
    pub focused: Option<MarkerId>,
    pub last_click: Option<ClickReadout>,
    pub zoom: u8,
    pub persistence: PersistenceStatus,
    pub marker_count: usize,
    pub next_id: MarkerId,
}

/// Primitives and camera for the map widget
#[derive(Debug, Clone, Serialize)]
pub struct SceneResponse {
    pub viewport: Viewport,
    pub primitives: Vec<Primitive>,
}

/// Body of `POST /api/markers`
#[derive(Debug, Clone, Deserialize)]
pub struct CreateMarkerRequest {
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon_type: IconType,
}

impl CreateMarkerRequest {
    pub fn position(&self) -> LatLng {
        LatLng::new(self.lat, self.lng)
    }

    pub fn fields(&self) -> MarkerFields {
        MarkerFields::new(self.title.clone())
            .with_description(self.description.clone())
            .with_icon(self.icon_type)
    }
}

/// Body of `PUT /api/markers/:id`. Position is kept unless both coordinates are given.
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateMarkerRequest {
    #[serde(flatten)]
    pub fields: MarkerFields,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
}

impl UpdateMarkerRequest {
    pub fn position(&self) -> Option<LatLng> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(LatLng::new(lat, lng)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClearMarkersResponse {
    pub removed: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FilterRequest {
    pub category: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
}

/// Body of `POST /api/search/select`
#[derive(Debug, Clone, Deserialize)]
pub struct SelectPlaceRequest {
    pub lat: f64,
    pub lng: f64,
    pub name: String,
}

/// One row of the icon catalogue, with how many saved markers use it
#[derive(Debug, Clone, Serialize)]
pub struct IconEntry {
    pub icon: IconType,
    pub emoji: &'static str,
    pub color: &'static str,
    pub label: &'static str,
    pub count: usize,
}

impl IconEntry {
    pub fn new(icon: IconType, count: usize) -> Self {
        let style = icon.style();
        Self {
            icon,
            emoji: style.emoji,
            color: style.color,
            label: style.label,
            count,
        }
    }
}

/// Camera after a city, search or locate jump
#[derive(Debug, Clone, Serialize)]
pub struct ViewResponse {
    pub label: String,
    pub viewport: Viewport,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_event_wire_format() {
        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"map_clicked","lat":35.5,"lng":139.25}"#).unwrap();
        assert_eq!(
            MapEvent::from(event),
            MapEvent::MapClicked(LatLng::new(35.5, 139.25))
        );

        let event: ClientEvent =
            serde_json::from_str(r#"{"type":"measure_toggled","kind":"area"}"#).unwrap();
        assert_eq!(event, ClientEvent::MeasureToggled { kind: MeasureKind::Area });

        let event: ClientEvent = serde_json::from_str(r#"{"type":"route_cleared"}"#).unwrap();
        assert_eq!(MapEvent::from(event), MapEvent::RouteCleared);
    }

    #[test]
    fn test_update_request_keeps_position_without_both_coordinates() {
        let req: UpdateMarkerRequest =
            serde_json::from_str(r#"{"title":"Park","icon_type":"park","lat":35.0}"#).unwrap();

        assert_eq!(req.position(), None);
        assert_eq!(req.fields.icon_type, IconType::Park);
        assert_eq!(req.fields.description, "");
    }
}
