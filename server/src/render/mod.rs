//! Rendering collaborator
//!
//! The map widget only ever receives transient primitives. `MapRenderer` is
//! the capability surface the session draws through; `Scene` is the
//! in-memory implementation whose JSON form the browser front-end replays.

use indexmap::IndexMap;
use serde::Serialize;

use crate::geometry::{Bounds, LatLng, haversine_distance};

/// Opaque handle for a placed primitive
pub type PrimitiveHandle = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PrimitiveKind {
    /// Labeled pin (markers, search hits, route endpoints)
    Pin,
    /// Small vertex dot (measurement clicks)
    Vertex,
    Polyline,
    Polygon,
}

/// Visual style hints for a primitive
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct PrimitiveStyle {
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub glyph: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub dashed: bool,
}

impl PrimitiveStyle {
    pub fn color(color: &str) -> Self {
        Self {
            color: color.to_string(),
            ..Self::default()
        }
    }

    pub fn with_glyph(mut self, glyph: &str) -> Self {
        self.glyph = Some(glyph.to_string());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn dashed(mut self) -> Self {
        self.dashed = true;
        self
    }
}

/// A placed primitive
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Primitive {
    pub handle: PrimitiveHandle,
    pub kind: PrimitiveKind,
    pub coords: Vec<LatLng>,
    pub style: PrimitiveStyle,
}

/// Capability surface of the map widget
pub trait MapRenderer: Send {
    fn add_primitive(
        &mut self,
        kind: PrimitiveKind,
        coords: Vec<LatLng>,
        style: PrimitiveStyle,
    ) -> PrimitiveHandle;

    /// Returns false if the handle was unknown
    fn remove_primitive(&mut self, handle: PrimitiveHandle) -> bool;

    fn fit_bounds(&mut self, bounds: Bounds);

    fn set_view(&mut self, center: LatLng, zoom: u8);

    fn current_zoom(&self) -> u8;

    fn distance_between(&self, p1: LatLng, p2: LatLng) -> f64 {
        haversine_distance(p1, p2)
    }
}

/// Current camera
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Viewport {
    pub center: LatLng,
    pub zoom: u8,
    /// Set by `fit_bounds`; cleared by `set_view`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fit: Option<Bounds>,
}

/// In-memory primitive table
#[derive(Debug, Clone, Serialize)]
pub struct Scene {
    viewport: Viewport,
    primitives: IndexMap<PrimitiveHandle, Primitive>,
    #[serde(skip)]
    next_handle: PrimitiveHandle,
}

/// Zoom used when fitting bounds that collapse to a point
const FIT_MAX_ZOOM: u8 = 17;

impl Scene {
    pub fn new(center: LatLng, zoom: u8) -> Self {
        Self {
            viewport: Viewport {
                center,
                zoom,
                fit: None,
            },
            primitives: IndexMap::new(),
            next_handle: 1,
        }
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn get(&self, handle: PrimitiveHandle) -> Option<&Primitive> {
        self.primitives.get(&handle)
    }

    pub fn primitives(&self) -> impl Iterator<Item = &Primitive> {
        self.primitives.values()
    }

    pub fn len(&self) -> usize {
        self.primitives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.primitives.is_empty()
    }

    pub fn count_of(&self, kind: PrimitiveKind) -> usize {
        self.primitives.values().filter(|p| p.kind == kind).count()
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new(LatLng::new(35.6762, 139.6503), 10)
    }
}

impl MapRenderer for Scene {
    fn add_primitive(
        &mut self,
        kind: PrimitiveKind,
        coords: Vec<LatLng>,
        style: PrimitiveStyle,
    ) -> PrimitiveHandle {
        let handle = self.next_handle;
        self.next_handle += 1;
        self.primitives.insert(
            handle,
            Primitive {
                handle,
                kind,
                coords,
                style,
            },
        );
        handle
    }

    fn remove_primitive(&mut self, handle: PrimitiveHandle) -> bool {
        self.primitives.shift_remove(&handle).is_some()
    }

    fn fit_bounds(&mut self, bounds: Bounds) {
        // Pick the largest zoom whose 256px world tile still shows the span
        let span = (bounds.north_east.lat - bounds.south_west.lat)
            .abs()
            .max((bounds.north_east.lng - bounds.south_west.lng).abs());
        let zoom = if span <= 0.0 {
            FIT_MAX_ZOOM
        } else {
            (360.0 / span).log2().floor().clamp(0.0, FIT_MAX_ZOOM as f64) as u8
        };
        self.viewport = Viewport {
            center: bounds.center(),
            zoom,
            fit: Some(bounds),
        };
    }

    fn set_view(&mut self, center: LatLng, zoom: u8) {
        self.viewport = Viewport {
            center,
            zoom,
            fit: None,
        };
    }

    fn current_zoom(&self) -> u8 {
        self.viewport.zoom
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_are_unique_and_removable() {
        let mut scene = Scene::default();
        let a = scene.add_primitive(
            PrimitiveKind::Pin,
            vec![LatLng::new(0.0, 0.0)],
            PrimitiveStyle::color("#fff"),
        );
        let b = scene.add_primitive(
            PrimitiveKind::Vertex,
            vec![LatLng::new(0.0, 1.0)],
            PrimitiveStyle::color("#fff"),
        );
        assert_ne!(a, b);
        assert!(scene.remove_primitive(a));
        assert!(!scene.remove_primitive(a));
        assert_eq!(scene.len(), 1);
        assert_eq!(scene.count_of(PrimitiveKind::Vertex), 1);
    }

    #[test]
    fn test_fit_bounds_centers_and_zooms() {
        let mut scene = Scene::default();
        let bounds = Bounds::of(&[LatLng::new(35.0, 135.0), LatLng::new(35.5, 135.5)]).unwrap();
        scene.fit_bounds(bounds);
        assert_eq!(scene.viewport().center, LatLng::new(35.25, 135.25));
        assert_eq!(scene.current_zoom(), 9);
        assert_eq!(scene.viewport().fit, Some(bounds));

        scene.set_view(LatLng::new(0.0, 0.0), 15);
        assert_eq!(scene.current_zoom(), 15);
        assert!(scene.viewport().fit.is_none());
    }
}
