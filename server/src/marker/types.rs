//! Marker types, record formats and error definitions

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::geometry::LatLng;

/// Marker identifier: positive, unique within a store
pub type MarkerId = u64;

/// Largest assignable id; keeps ids exact as JSON numbers in any consumer
pub const MAX_MARKER_ID: MarkerId = (1 << 53) - 1;

/// Errors from marker operations
#[derive(Debug, Error, PartialEq)]
pub enum MarkerError {
    #[error("Invalid marker: {0}")]
    Validation(String),

    #[error("Marker not found: {0}")]
    NotFound(MarkerId),
}

/// Errors from reading an import document
#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Import document is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Import document must be a JSON array of markers")]
    NotAnArray,
}

/// Marker category. Controls the glyph/color and acts as the filter key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IconType {
    #[default]
    Default,
    Home,
    Work,
    Food,
    Shop,
    Hospital,
    School,
    Park,
    Star,
}

/// Display metadata for an icon type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IconStyle {
    pub emoji: &'static str,
    pub color: &'static str,
    pub label: &'static str,
}

impl IconType {
    pub const ALL: [IconType; 9] = [
        IconType::Default,
        IconType::Home,
        IconType::Work,
        IconType::Food,
        IconType::Shop,
        IconType::Hospital,
        IconType::School,
        IconType::Park,
        IconType::Star,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IconType::Default => "default",
            IconType::Home => "home",
            IconType::Work => "work",
            IconType::Food => "food",
            IconType::Shop => "shop",
            IconType::Hospital => "hospital",
            IconType::School => "school",
            IconType::Park => "park",
            IconType::Star => "star",
        }
    }

    /// Exact lookup by wire name
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|icon| icon.as_str() == name)
    }

    /// Lookup that falls back to `Default` for unknown names
    pub fn from_name_or_default(name: &str) -> Self {
        Self::from_name(name).unwrap_or_default()
    }

    pub fn style(&self) -> IconStyle {
        let (emoji, color, label) = match self {
            IconType::Default => ("📍", "#ff0000", "Default"),
            IconType::Home => ("🏠", "#4CAF50", "Home"),
            IconType::Work => ("🏢", "#2196F3", "Work"),
            IconType::Food => ("🍽️", "#FF9800", "Food"),
            IconType::Shop => ("🛒", "#9C27B0", "Shop"),
            IconType::Hospital => ("🏥", "#f44336", "Hospital"),
            IconType::School => ("🏫", "#607D8B", "School"),
            IconType::Park => ("🌳", "#4CAF50", "Park"),
            IconType::Star => ("⭐", "#FFC107", "Star"),
        };
        IconStyle {
            emoji,
            color,
            label,
        }
    }
}

/// A persisted point annotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Marker {
    pub id: MarkerId,
    pub position: LatLng,
    pub title: String,
    pub description: String,
    pub icon_type: IconType,
}

impl Marker {
    pub fn style(&self) -> IconStyle {
        self.icon_type.style()
    }

    pub fn to_record(&self) -> MarkerRecord {
        MarkerRecord {
            id: self.id,
            lat: self.position.lat,
            lng: self.position.lng,
            title: self.title.clone(),
            description: self.description.clone(),
            icon_type: self.icon_type,
            emoji: self.icon_type.style().emoji.to_string(),
        }
    }
}

/// User-editable marker fields
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MarkerFields {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub icon_type: IconType,
}

impl MarkerFields {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_icon(mut self, icon_type: IconType) -> Self {
        self.icon_type = icon_type;
        self
    }

    /// Trim text fields and reject an empty title
    pub fn normalized(self) -> Result<Self, MarkerError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(MarkerError::Validation("title must not be empty".to_string()));
        }
        Ok(Self {
            title,
            description: self.description.trim().to_string(),
            icon_type: self.icon_type,
        })
    }
}

/// Canonical persisted / exported record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkerRecord {
    pub id: MarkerId,
    pub lat: f64,
    pub lng: f64,
    pub title: String,
    pub description: String,
    pub icon_type: IconType,
    pub emoji: String,
}

/// Loosely-typed record as found in storage or an import file
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawMarkerRecord {
    pub id: Option<Value>,
    pub lat: Option<Value>,
    pub lng: Option<Value>,
    pub title: Option<Value>,
    pub description: Option<Value>,
    pub icon_type: Option<Value>,
}

/// A raw record that passed validation
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ValidRecord {
    pub id: Option<MarkerId>,
    pub position: LatLng,
    pub fields: MarkerFields,
}

impl RawMarkerRecord {
    pub fn from_value(value: Value) -> Option<Self> {
        serde_json::from_value(value).ok()
    }

    /// Finite coordinates and a non-empty title, or `None`.
    ///
    /// Missing or malformed `id` / `iconType` are not fatal.
    pub(crate) fn validate(&self) -> Option<ValidRecord> {
        let lat = self.lat.as_ref().and_then(coerce_number)?;
        let lng = self.lng.as_ref().and_then(coerce_number)?;
        let title = match &self.title {
            Some(Value::String(s)) if !s.trim().is_empty() => s.trim().to_string(),
            _ => return None,
        };
        let description = match &self.description {
            Some(Value::String(s)) => s.trim().to_string(),
            _ => String::new(),
        };
        let icon_type = match &self.icon_type {
            Some(Value::String(s)) => IconType::from_name_or_default(s),
            _ => IconType::Default,
        };

        Some(ValidRecord {
            id: self.id.as_ref().and_then(coerce_id),
            position: LatLng::new(lat, lng),
            fields: MarkerFields {
                title,
                description,
                icon_type,
            },
        })
    }
}

/// JSON numbers and numeric strings, if finite
fn coerce_number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

/// Positive integral JSON numbers
fn coerce_id(value: &Value) -> Option<MarkerId> {
    let Value::Number(n) = value else {
        return None;
    };
    if let Some(id) = n.as_u64() {
        return (1..=MAX_MARKER_ID).contains(&id).then_some(id);
    }
    let f = n.as_f64()?;
    (f.is_finite() && f >= 1.0 && f.fract() == 0.0 && f <= MAX_MARKER_ID as f64).then_some(f as u64)
}

/// Parse an import/persistence document into its array elements
pub fn parse_import_document(text: &str) -> Result<Vec<Value>, ImportError> {
    match serde_json::from_str::<Value>(text)? {
        Value::Array(items) => Ok(items),
        _ => Err(ImportError::NotAnArray),
    }
}
