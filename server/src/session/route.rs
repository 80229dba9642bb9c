//! Start/end selection and route request tracking
//!
//! Requests carry a generation token. Only the response whose token matches
//! the latest request is applied; anything older is discarded.

use metrics::counter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::geometry::{Bounds, LatLng, format_distance, format_duration};
use crate::render::{MapRenderer, PrimitiveHandle, PrimitiveKind, PrimitiveStyle};
use crate::services::{Route, ServiceError};

const ROUTE_COLOR: &str = "#3388ff";
const START_COLOR: &str = "#4CAF50";
const END_COLOR: &str = "#f44336";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RouteSlot {
    Start,
    End,
}

impl RouteSlot {
    pub fn other(self) -> Self {
        match self {
            RouteSlot::Start => RouteSlot::End,
            RouteSlot::End => RouteSlot::Start,
        }
    }
}

/// Route errors raised before any request is issued
#[derive(Debug, Clone, Error, PartialEq)]
pub enum RouteError {
    #[error("Select both a start and an end point first ({missing:?} is missing)")]
    IncompleteSelection { missing: RouteSlot },
}

/// A request handed to the routing collaborator
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RouteRequest {
    pub token: u64,
    pub start: LatLng,
    pub end: LatLng,
}

/// Summary of the last computed route
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RouteSummary {
    pub distance_meters: f64,
    pub duration_seconds: f64,
    pub text: String,
}

impl RouteSummary {
    fn from_route(route: &Route) -> Self {
        Self {
            distance_meters: route.distance_meters,
            duration_seconds: route.duration_seconds,
            text: format!(
                "Distance: {} / Duration: {}",
                format_distance(route.distance_meters),
                format_duration(route.duration_seconds)
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum RouteStatus {
    Idle,
    Awaiting { slot: RouteSlot },
    Calculating { token: u64 },
    Ready,
    Failed { message: String },
}

/// What `complete` did with a response
#[derive(Debug, Clone, PartialEq)]
pub enum RouteCompletion {
    Applied(RouteSummary),
    Failed(ServiceError),
    /// A newer request started (or the route was cleared) since this one
    Stale,
}

#[derive(Debug, Clone, Default, PartialEq)]
struct RouteVisuals {
    start: Option<PrimitiveHandle>,
    end: Option<PrimitiveHandle>,
    line: Option<PrimitiveHandle>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RouteSession {
    start: Option<LatLng>,
    end: Option<LatLng>,
    selection: Option<RouteSlot>,
    generation: u64,
    in_flight: Option<u64>,
    route: Option<Route>,
    summary: Option<RouteSummary>,
    status: RouteStatus,
    visuals: RouteVisuals,
}

impl Default for RouteSession {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteSession {
    pub fn new() -> Self {
        Self {
            start: None,
            end: None,
            selection: None,
            generation: 0,
            in_flight: None,
            route: None,
            summary: None,
            status: RouteStatus::Idle,
            visuals: RouteVisuals::default(),
        }
    }

    pub fn start(&self) -> Option<LatLng> {
        self.start
    }

    pub fn end(&self) -> Option<LatLng> {
        self.end
    }

    pub fn selection(&self) -> Option<RouteSlot> {
        self.selection
    }

    pub fn is_complete(&self) -> bool {
        self.start.is_some() && self.end.is_some()
    }

    pub fn in_flight(&self) -> Option<u64> {
        self.in_flight
    }

    pub fn route(&self) -> Option<&Route> {
        self.route.as_ref()
    }

    pub fn summary(&self) -> Option<&RouteSummary> {
        self.summary.as_ref()
    }

    pub fn status(&self) -> &RouteStatus {
        &self.status
    }

    /// Wait for a click to fill `slot`
    pub fn begin_selection(&mut self, slot: RouteSlot) {
        self.selection = Some(slot);
        self.status = RouteStatus::Awaiting { slot };
    }

    /// Abandon an in-progress selection.
    ///
    /// A half-picked pair is dropped; a complete pair and its summary stay.
    pub fn cancel_selection(&mut self, renderer: &mut dyn MapRenderer) {
        self.selection = None;
        if !self.is_complete() {
            self.start = None;
            self.end = None;
            remove(&mut self.visuals.start, renderer);
            remove(&mut self.visuals.end, renderer);
        }
        if matches!(self.status, RouteStatus::Awaiting { .. }) {
            self.status = if self.summary.is_some() {
                RouteStatus::Ready
            } else {
                RouteStatus::Idle
            };
        }
    }

    /// Record an endpoint and draw its pin
    pub fn set_point(&mut self, slot: RouteSlot, point: LatLng, renderer: &mut dyn MapRenderer) {
        let (target, handle, color, label) = match slot {
            RouteSlot::Start => (&mut self.start, &mut self.visuals.start, START_COLOR, "Start"),
            RouteSlot::End => (&mut self.end, &mut self.visuals.end, END_COLOR, "End"),
        };
        *target = Some(point);
        remove(handle, renderer);
        *handle = Some(renderer.add_primitive(
            PrimitiveKind::Pin,
            vec![point],
            PrimitiveStyle::color(color).with_label(label),
        ));
        self.selection = None;
        debug!("Route {:?} set to {}", slot, point);
    }

    /// Issue a new request token for the current pair.
    ///
    /// Fails without touching any state when an endpoint is missing.
    pub fn request_route(&mut self) -> Result<RouteRequest, RouteError> {
        let (start, end) = match (self.start, self.end) {
            (Some(start), Some(end)) => (start, end),
            (None, _) => {
                return Err(RouteError::IncompleteSelection {
                    missing: RouteSlot::Start,
                });
            }
            (_, None) => {
                return Err(RouteError::IncompleteSelection {
                    missing: RouteSlot::End,
                });
            }
        };

        self.generation += 1;
        let token = self.generation;
        if let Some(previous) = self.in_flight.replace(token) {
            debug!("Route request {} supersedes {}", token, previous);
        }
        self.selection = None;
        self.status = RouteStatus::Calculating { token };
        info!("Dispatching route request {} from {} to {}", token, start, end);

        Ok(RouteRequest { token, start, end })
    }

    /// Apply the response for `token`, unless it is stale
    pub fn complete(
        &mut self,
        token: u64,
        result: Result<Route, ServiceError>,
        renderer: &mut dyn MapRenderer,
    ) -> RouteCompletion {
        if self.in_flight != Some(token) {
            counter!("webmap_route_requests_total", "outcome" => "stale").increment(1);
            debug!("Discarding stale route response {}", token);
            return RouteCompletion::Stale;
        }
        self.in_flight = None;

        match result {
            Ok(route) => {
                counter!("webmap_route_requests_total", "outcome" => "ok").increment(1);
                remove(&mut self.visuals.line, renderer);
                if route.geometry.len() >= 2 {
                    self.visuals.line = Some(renderer.add_primitive(
                        PrimitiveKind::Polyline,
                        route.geometry.clone(),
                        PrimitiveStyle::color(ROUTE_COLOR),
                    ));
                }
                if let Some(bounds) = Bounds::of(&route.geometry) {
                    renderer.fit_bounds(bounds);
                }

                let summary = RouteSummary::from_route(&route);
                info!("Route {} resolved: {}", token, summary.text);
                self.route = Some(route);
                self.summary = Some(summary.clone());
                self.status = RouteStatus::Ready;
                RouteCompletion::Applied(summary)
            }
            Err(e) => {
                counter!("webmap_route_requests_total", "outcome" => "error").increment(1);
                warn!("Route request {} failed: {}", token, e);
                self.status = RouteStatus::Failed {
                    message: format!("Route search failed: {}", e),
                };
                RouteCompletion::Failed(e)
            }
        }
    }

    /// Drop endpoints, route and visuals. Pending responses become stale.
    pub fn clear(&mut self, renderer: &mut dyn MapRenderer) {
        remove(&mut self.visuals.start, renderer);
        remove(&mut self.visuals.end, renderer);
        remove(&mut self.visuals.line, renderer);
        let generation = self.generation;
        *self = Self::new();
        self.generation = generation;
    }
}

fn remove(handle: &mut Option<PrimitiveHandle>, renderer: &mut dyn MapRenderer) {
    if let Some(h) = handle.take() {
        renderer.remove_primitive(h);
    }
}
