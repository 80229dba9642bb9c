//! Distance / area measurement runs

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::{
    LatLng, format_area, format_distance, polyline_length, spherical_polygon_area,
};
use crate::render::{MapRenderer, PrimitiveHandle, PrimitiveKind, PrimitiveStyle};

const MEASURE_COLOR: &str = "#e91e63";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MeasureKind {
    Distance,
    Area,
}

impl MeasureKind {
    /// Points needed before a numeric result exists
    pub fn min_points(self) -> usize {
        match self {
            MeasureKind::Distance => 2,
            MeasureKind::Area => 3,
        }
    }

    fn noun(self) -> &'static str {
        match self {
            MeasureKind::Distance => "distance",
            MeasureKind::Area => "area",
        }
    }
}

/// Numeric state of a run
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MeasurementReading {
    /// Not enough points yet
    Pending { needed: usize },
    Distance { meters: f64 },
    Area { square_meters: f64, perimeter_meters: f64 },
}

/// Reading plus its display text
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiveResult {
    pub reading: MeasurementReading,
    pub text: String,
}

impl LiveResult {
    fn compute(kind: MeasureKind, points: &[LatLng]) -> Self {
        if points.len() < kind.min_points() {
            return Self {
                reading: MeasurementReading::Pending {
                    needed: kind.min_points() - points.len(),
                },
                text: format!(
                    "Click at least {} points on the map to measure {}",
                    kind.min_points(),
                    kind.noun()
                ),
            };
        }

        match kind {
            MeasureKind::Distance => {
                let meters = polyline_length(points, false);
                Self {
                    reading: MeasurementReading::Distance { meters },
                    text: format!("Distance: {}", format_distance(meters)),
                }
            }
            MeasureKind::Area => {
                let square_meters = spherical_polygon_area(points);
                let perimeter_meters = polyline_length(points, true);
                Self {
                    reading: MeasurementReading::Area {
                        square_meters,
                        perimeter_meters,
                    },
                    text: format!(
                        "Area: {} / Perimeter: {}",
                        format_area(square_meters),
                        format_distance(perimeter_meters)
                    ),
                }
            }
        }
    }
}

/// One measurement run: clicked points, drawn visuals and the live result.
///
/// `points` is empty whenever `mode` is `None`.
#[derive(Debug, Default)]
pub struct MeasurementSession {
    mode: Option<MeasureKind>,
    points: Vec<LatLng>,
    result: Option<LiveResult>,
    vertices: Vec<PrimitiveHandle>,
    shape: Option<PrimitiveHandle>,
}

impl MeasurementSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&self) -> Option<MeasureKind> {
        self.mode
    }

    pub fn points(&self) -> &[LatLng] {
        &self.points
    }

    pub fn result(&self) -> Option<&LiveResult> {
        self.result.as_ref()
    }

    /// Begin a fresh run, dropping any previous points and visuals
    pub fn start(&mut self, kind: MeasureKind, renderer: &mut dyn MapRenderer) {
        self.clear_visuals(renderer);
        self.points.clear();
        self.mode = Some(kind);
        self.result = Some(LiveResult::compute(kind, &self.points));
        debug!("Measurement started: {:?}", kind);
    }

    /// Append a clicked point and recompute. Ignored outside a run.
    pub fn add_point(&mut self, point: LatLng, renderer: &mut dyn MapRenderer) -> Option<&LiveResult> {
        let kind = self.mode?;
        self.points.push(point);

        self.vertices.push(renderer.add_primitive(
            PrimitiveKind::Vertex,
            vec![point],
            PrimitiveStyle::color(MEASURE_COLOR),
        ));
        self.redraw_shape(kind, renderer);

        self.result = Some(LiveResult::compute(kind, &self.points));
        self.result.as_ref()
    }

    /// Clear points and visuals. The mode survives unless `clear_mode`.
    pub fn reset(&mut self, clear_mode: bool, renderer: &mut dyn MapRenderer) {
        self.clear_visuals(renderer);
        self.points.clear();
        if clear_mode {
            self.mode = None;
            self.result = None;
        } else {
            self.result = self.mode.map(|kind| LiveResult::compute(kind, &self.points));
        }
    }

    /// End the run but keep the last result and its drawing on screen
    pub fn finish(&mut self) {
        self.mode = None;
        self.points.clear();
    }

    fn redraw_shape(&mut self, kind: MeasureKind, renderer: &mut dyn MapRenderer) {
        if let Some(handle) = self.shape.take() {
            renderer.remove_primitive(handle);
        }
        let style = PrimitiveStyle::color(MEASURE_COLOR);
        self.shape = match (kind, self.points.len()) {
            (_, 0 | 1) => None,
            (MeasureKind::Area, n) if n >= 3 => Some(renderer.add_primitive(
                PrimitiveKind::Polygon,
                self.points.clone(),
                style,
            )),
            (MeasureKind::Area, _) => Some(renderer.add_primitive(
                PrimitiveKind::Polyline,
                self.points.clone(),
                style.dashed(),
            )),
            (MeasureKind::Distance, _) => Some(renderer.add_primitive(
                PrimitiveKind::Polyline,
                self.points.clone(),
                style,
            )),
        };
    }

    fn clear_visuals(&mut self, renderer: &mut dyn MapRenderer) {
        for handle in self.vertices.drain(..) {
            renderer.remove_primitive(handle);
        }
        if let Some(handle) = self.shape.take() {
            renderer.remove_primitive(handle);
        }
    }
}
