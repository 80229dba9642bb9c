//! Exclusive interaction mode and map-click arbitration
//!
//! The controller only decides. `plan` is pure: it maps the current mode and
//! an event to the next mode plus the side effects the owner must run on the
//! measurement and route sessions.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::measurement::MeasureKind;
use super::route::RouteSlot;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(tag = "mode", content = "detail", rename_all = "snake_case")]
pub enum InteractionMode {
    #[default]
    Idle,
    Measuring(MeasureKind),
    RoutePicking(RouteSlot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModeEvent {
    MeasureToggled(MeasureKind),
    RouteToggled(RouteSlot),
    Reset,
}

/// Work the session owner performs after a transition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Effect {
    /// Begin a fresh run (points and visuals cleared)
    StartMeasurement(MeasureKind),
    /// Leave measuring, keeping the last result on screen
    StopMeasurement,
    /// Leave measuring and drop the run entirely
    CancelMeasurement,
    ResetMeasurementPoints,
    BeginRouteSelection(RouteSlot),
    CancelRouteSelection,
    ClearRoute,
    DispatchRoute,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next: InteractionMode,
    pub effects: Vec<Effect>,
}

impl Transition {
    fn to(next: InteractionMode, effects: Vec<Effect>) -> Self {
        Self { next, effects }
    }
}

/// Consumer of a map click
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickTarget {
    MarkerDialog,
    Measurement(MeasureKind),
    RouteSlot(RouteSlot),
}

#[derive(Debug, Clone, Default)]
pub struct InteractionModeController {
    mode: InteractionMode,
}

impl InteractionModeController {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> InteractionMode {
        self.mode
    }

    pub fn plan(&self, event: ModeEvent) -> Transition {
        use InteractionMode::*;

        match (self.mode, event) {
            (Idle, ModeEvent::MeasureToggled(kind)) => {
                Transition::to(Measuring(kind), vec![Effect::StartMeasurement(kind)])
            }
            (Measuring(current), ModeEvent::MeasureToggled(kind)) if current == kind => {
                Transition::to(Idle, vec![Effect::StopMeasurement])
            }
            (Measuring(_), ModeEvent::MeasureToggled(kind)) => {
                Transition::to(Measuring(kind), vec![Effect::StartMeasurement(kind)])
            }
            (RoutePicking(_), ModeEvent::MeasureToggled(kind)) => Transition::to(
                Measuring(kind),
                vec![Effect::CancelRouteSelection, Effect::StartMeasurement(kind)],
            ),

            (Idle, ModeEvent::RouteToggled(slot)) => {
                Transition::to(RoutePicking(slot), vec![Effect::BeginRouteSelection(slot)])
            }
            (Measuring(_), ModeEvent::RouteToggled(slot)) => Transition::to(
                RoutePicking(slot),
                vec![Effect::CancelMeasurement, Effect::BeginRouteSelection(slot)],
            ),
            (RoutePicking(current), ModeEvent::RouteToggled(slot)) if current == slot => {
                Transition::to(Idle, vec![Effect::CancelRouteSelection])
            }
            (RoutePicking(_), ModeEvent::RouteToggled(slot)) => {
                Transition::to(RoutePicking(slot), vec![Effect::BeginRouteSelection(slot)])
            }

            (Idle, ModeEvent::Reset) => Transition::to(Idle, Vec::new()),
            (Measuring(kind), ModeEvent::Reset) => {
                Transition::to(Measuring(kind), vec![Effect::ResetMeasurementPoints])
            }
            (RoutePicking(_), ModeEvent::Reset) => Transition::to(Idle, vec![Effect::ClearRoute]),
        }
    }

    /// Adopt a planned transition
    pub fn commit(&mut self, transition: &Transition) {
        if self.mode != transition.next {
            debug!("Interaction mode {:?} -> {:?}", self.mode, transition.next);
        }
        self.mode = transition.next;
    }

    pub fn apply(&mut self, event: ModeEvent) -> Transition {
        let transition = self.plan(event);
        self.commit(&transition);
        transition
    }

    /// Exactly one consumer per click
    pub fn click_target(&self) -> ClickTarget {
        match self.mode {
            InteractionMode::Idle => ClickTarget::MarkerDialog,
            InteractionMode::Measuring(kind) => ClickTarget::Measurement(kind),
            InteractionMode::RoutePicking(slot) => ClickTarget::RouteSlot(slot),
        }
    }

    /// Follow-up once a clicked point filled `slot`.
    ///
    /// Moves on to the other slot while it is empty; once both are set the
    /// selection ends and a route request is dispatched.
    pub fn after_route_point(&mut self, slot: RouteSlot, other_filled: bool) -> Transition {
        let transition = if other_filled {
            Transition::to(InteractionMode::Idle, vec![Effect::DispatchRoute])
        } else {
            let next = slot.other();
            Transition::to(
                InteractionMode::RoutePicking(next),
                vec![Effect::BeginRouteSelection(next)],
            )
        };
        self.commit(&transition);
        transition
    }

    /// Drop back to idle, e.g. after a failed async call
    pub fn force_idle(&mut self) {
        self.mode = InteractionMode::Idle;
    }
}
