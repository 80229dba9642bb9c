//! Interaction state: measurement, routing, mode arbitration and the
//! `MapSession` aggregate that owns them.

pub mod measurement;
pub mod mode;
pub mod route;
pub mod state;

pub use measurement::{LiveResult, MeasureKind, MeasurementReading, MeasurementSession};
pub use mode::{ClickTarget, Effect, InteractionMode, InteractionModeController, ModeEvent, Transition};
pub use route::{
    RouteCompletion, RouteError, RouteRequest, RouteSession, RouteSlot, RouteStatus, RouteSummary,
};
pub use state::{
    CITY_ZOOM, City, ClickReadout, EventOutcome, ExportFile, MapEvent, MapSession, MarkerDialog,
    PLACE_ZOOM, SessionError,
};
