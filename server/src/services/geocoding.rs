//! Geocoding collaborator and progressive place search

use async_trait::async_trait;
use metrics::counter;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use super::types::ServiceError;
use crate::geometry::LatLng;

/// A named location returned by the geocoder
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Place {
    /// Opaque identifier from the service, used for de-duplication
    pub place_id: String,
    pub display_name: String,
    pub position: LatLng,
}

/// A single geocoder request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeocodeQuery {
    pub text: String,
    /// Country code(s) the service should restrict to, e.g. `jp`
    pub country_bias: Option<String>,
}

/// Trait for geocoding services
#[async_trait]
pub trait GeocodingService: Send + Sync {
    /// Ranked candidates for a query
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<Place>, ServiceError>;
}

/// Nominatim `search` result row. Coordinates arrive as strings.
#[derive(Debug, Deserialize)]
struct NominatimPlace {
    place_id: Value,
    #[serde(default)]
    display_name: String,
    lat: String,
    lon: String,
}

impl NominatimPlace {
    fn into_place(self) -> Option<Place> {
        let lat = self.lat.trim().parse::<f64>().ok()?;
        let lng = self.lon.trim().parse::<f64>().ok()?;
        let position = LatLng::new(lat, lng);
        if !position.is_finite() {
            return None;
        }
        let place_id = match self.place_id {
            Value::String(s) => s,
            other => other.to_string(),
        };
        Some(Place {
            place_id,
            display_name: self.display_name,
            position,
        })
    }
}

/// Parse a Nominatim response body, dropping rows with unusable coordinates
pub fn parse_nominatim(body: &str) -> Result<Vec<Place>, ServiceError> {
    let rows: Vec<NominatimPlace> =
        serde_json::from_str(body).map_err(|e| ServiceError::Decode(e.to_string()))?;
    Ok(rows.into_iter().filter_map(NominatimPlace::into_place).collect())
}

/// Nominatim-backed geocoder
pub struct NominatimGeocoder {
    client: reqwest::Client,
    base_url: String,
    language: String,
    limit: usize,
}

impl NominatimGeocoder {
    pub fn new(
        base_url: &str,
        language: &str,
        limit: usize,
        timeout: Duration,
        user_agent: &str,
    ) -> Result<Self, ServiceError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(user_agent)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            language: language.to_string(),
            limit,
        })
    }
}

#[async_trait]
impl GeocodingService for NominatimGeocoder {
    async fn geocode(&self, query: &GeocodeQuery) -> Result<Vec<Place>, ServiceError> {
        counter!("webmap_geocode_queries_total").increment(1);
        let limit = self.limit.to_string();
        let mut params: Vec<(&str, &str)> = vec![
            ("format", "json"),
            ("q", &query.text),
            ("limit", &limit),
            ("accept-language", &self.language),
        ];
        if let Some(ref countries) = query.country_bias {
            params.push(("countrycodes", countries));
        }

        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&params)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(ServiceError::Status(response.status().as_u16()));
        }
        let body = response.text().await?;
        parse_nominatim(&body)
    }
}

/// Tuning for `PlaceSearch`
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Appended to biased queries, e.g. `"Japan"`
    pub country_suffix: Option<String>,
    /// Country codes passed as the service-side bias
    pub country_bias: Option<String>,
    /// Broader steps run while fewer hits than this were found
    pub min_hits: usize,
    /// Maximum results returned
    pub max_results: usize,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            country_suffix: Some("Japan".to_string()),
            country_bias: Some("jp".to_string()),
            min_hits: 3,
            max_results: 5,
        }
    }
}

/// A displayed search result
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    pub place: Place,
    /// First component of the display name
    pub main_name: String,
    /// The next two components, comma-joined
    pub sub_name: String,
}

impl SearchHit {
    fn from_place(place: Place) -> Self {
        let parts: Vec<&str> = place.display_name.split(',').map(str::trim).collect();
        let main_name = parts.first().copied().unwrap_or_default().to_string();
        let sub_name = parts.iter().skip(1).take(2).copied().collect::<Vec<_>>().join(", ");
        Self {
            place,
            main_name,
            sub_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchResults {
    pub query: String,
    pub hits: Vec<SearchHit>,
}

/// Progressive search: biased exact query, then unbiased, then per-token
pub struct PlaceSearch {
    config: SearchConfig,
}

impl PlaceSearch {
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    fn biased(&self, text: &str) -> GeocodeQuery {
        let text = match self.config.country_suffix {
            Some(ref suffix) => format!("{}, {}", text, suffix),
            None => text.to_string(),
        };
        GeocodeQuery {
            text,
            country_bias: self.config.country_bias.clone(),
        }
    }

    pub async fn search(&self, geocoder: &dyn GeocodingService, query: &str) -> SearchResults {
        let query = query.trim();
        let mut found: Vec<Place> = Vec::new();
        if query.is_empty() {
            return SearchResults {
                query: String::new(),
                hits: Vec::new(),
            };
        }

        run_step(geocoder, &self.biased(query), &mut found, "exact").await;

        if found.len() < self.config.min_hits {
            let unbiased = GeocodeQuery {
                text: query.to_string(),
                country_bias: None,
            };
            run_step(geocoder, &unbiased, &mut found, "unbiased").await;
        }

        if found.len() < self.config.min_hits && query.chars().count() > 2 {
            for part in split_tokens(query) {
                if part.chars().count() > 1 {
                    run_step(geocoder, &self.biased(part), &mut found, "token").await;
                }
                if found.len() >= self.config.max_results {
                    break;
                }
            }
        }

        found.truncate(self.config.max_results);
        debug!("Search '{}' produced {} results", query, found.len());
        SearchResults {
            query: query.to_string(),
            hits: found.into_iter().map(SearchHit::from_place).collect(),
        }
    }
}

/// Query tokens: whitespace (incl. ideographic space), `,` and `、` separate
fn split_tokens(query: &str) -> impl Iterator<Item = &str> {
    query
        .split(|c: char| c.is_whitespace() || c == ',' || c == '、')
        .filter(|s| !s.is_empty())
}

/// One geocoder call merged into `found`; failures are logged and skipped
async fn run_step(
    geocoder: &dyn GeocodingService,
    query: &GeocodeQuery,
    found: &mut Vec<Place>,
    step: &str,
) {
    match geocoder.geocode(query).await {
        Ok(places) => {
            for place in places {
                if !found.iter().any(|p| p.place_id == place.place_id) {
                    found.push(place);
                }
            }
        }
        Err(e) => warn!("Geocoding step '{}' for '{}' failed: {}", step, query.text, e),
    }
}
