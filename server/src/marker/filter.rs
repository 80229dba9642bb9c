//! Category filter over the marker set

use serde::{Deserialize, Serialize};

use super::store::MarkerStore;
use super::types::{IconType, Marker, MarkerId};

/// Selected category: everything, or one exact icon-type name
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum CategoryFilter {
    #[default]
    All,
    Category(String),
}

impl CategoryFilter {
    pub fn parse(value: &str) -> Self {
        if value == "all" {
            Self::All
        } else {
            Self::Category(value.to_string())
        }
    }

    pub fn matches(&self, marker: &Marker) -> bool {
        match self {
            Self::All => true,
            Self::Category(name) => marker.icon_type.as_str() == name,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::All => "all",
            Self::Category(name) => name,
        }
    }
}

impl From<String> for CategoryFilter {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<CategoryFilter> for String {
    fn from(value: CategoryFilter) -> Self {
        value.as_str().to_string()
    }
}

/// Current filter selection
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterState {
    pub selected: CategoryFilter,
}

/// Visible subset and counts
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FilterSummary {
    pub category: String,
    pub visible: Vec<MarkerId>,
    pub hidden_count: usize,
    pub total_count: usize,
}

/// Read-only view computations over a `MarkerStore`
pub struct FilterEngine;

impl FilterEngine {
    pub fn apply(store: &MarkerStore, category: &CategoryFilter) -> FilterSummary {
        let visible: Vec<MarkerId> = store
            .iter()
            .filter(|m| category.matches(m))
            .map(|m| m.id)
            .collect();
        let total_count = store.len();

        FilterSummary {
            category: category.as_str().to_string(),
            hidden_count: total_count - visible.len(),
            visible,
            total_count,
        }
    }

    /// Marker count per icon type, in catalogue order
    pub fn category_counts(store: &MarkerStore) -> Vec<(IconType, usize)> {
        IconType::ALL
            .into_iter()
            .map(|icon| (icon, store.iter().filter(|m| m.icon_type == icon).count()))
            .collect()
    }
}
