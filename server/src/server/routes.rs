//! HTTP route handlers for the map API

use std::time::Instant;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use metrics::histogram;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::error::ApiErrorResponse;
use super::state::AppState;
use crate::geometry::LatLng;
use crate::marker::{
    CategoryFilter, FilterEngine, FilterSummary, ImportReport, MarkerFields, MarkerId,
    MarkerRecord,
};
use crate::protocol::{
    ClearMarkersResponse, ClientEvent, CreateMarkerRequest, EventResponse, FilterRequest,
    IconEntry, SceneResponse, SearchParams, SelectPlaceRequest, SessionSnapshot,
    UpdateMarkerRequest, ViewResponse,
};
use crate::services::SearchResults;
use crate::session::{City, EventOutcome, MapEvent, RouteRequest};

/// Build the router with every API route
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/state", get(get_state))
        .route("/api/scene", get(get_scene))
        .route("/api/events", post(post_event))
        .route(
            "/api/markers",
            get(list_markers).post(create_marker).delete(clear_markers),
        )
        .route("/api/markers/export", get(export_markers))
        .route("/api/markers/import", post(import_markers))
        .route("/api/markers/:id", put(update_marker).delete(delete_marker))
        .route("/api/markers/:id/edit", post(edit_marker))
        .route("/api/markers/:id/focus", post(focus_marker))
        .route("/api/dialog/save", post(save_dialog))
        .route("/api/dialog/cancel", post(cancel_dialog))
        .route("/api/dialog/delete", post(delete_from_dialog))
        .route("/api/filter", put(set_filter))
        .route("/api/icons", get(list_icons))
        .route("/api/search", get(search))
        .route("/api/search/select", post(select_place))
        .route("/api/cities/:name", post(zoom_to_city))
        .route("/api/locate", post(locate))
        .with_state(state)
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub markers: usize,
}

/// GET /health
async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let markers = state.session.lock().await.markers().len();
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        markers,
    })
}

/// GET /api/state
async fn get_state(State(state): State<AppState>) -> Json<SessionSnapshot> {
    Json(state.session.lock().await.snapshot())
}

/// GET /api/scene - primitives and camera for the map widget
async fn get_scene(State(state): State<AppState>) -> Json<SceneResponse> {
    let session = state.session.lock().await;
    let scene = session.renderer();
    Json(SceneResponse {
        viewport: scene.viewport().clone(),
        primitives: scene.primitives().cloned().collect(),
    })
}

/// Send a dispatched route request upstream and feed the answer back.
///
/// The session lock is not held while waiting, so a newer request may
/// start meanwhile; the session then discards this response as stale.
pub async fn resolve_route(state: &AppState, request: RouteRequest) -> EventOutcome {
    let started = Instant::now();
    let result = state.routing.route(request.start, request.end).await;
    histogram!("webmap_route_latency_seconds").record(started.elapsed());

    state.session.lock().await.handle(MapEvent::RouteResolved {
        token: request.token,
        result,
    })
}

/// POST /api/events - one interaction event
async fn post_event(
    State(state): State<AppState>,
    Json(event): Json<ClientEvent>,
) -> Result<Json<EventResponse>, ApiErrorResponse> {
    let outcome = state.session.lock().await.handle(event.into());
    if let EventOutcome::Rejected { code, message } = &outcome {
        return Err(ApiErrorResponse::new(code, message.clone()));
    }

    let resolution = match outcome.dispatched() {
        Some(request) => Some(resolve_route(&state, request).await),
        None => None,
    };

    let snapshot = state.session.lock().await.snapshot();
    Ok(Json(EventResponse {
        outcome,
        resolution,
        state: snapshot,
    }))
}

/// GET /api/markers - every stored marker in record form
async fn list_markers(State(state): State<AppState>) -> Json<Vec<MarkerRecord>> {
    Json(state.session.lock().await.markers().export_all())
}

/// POST /api/markers
async fn create_marker(
    State(state): State<AppState>,
    Json(req): Json<CreateMarkerRequest>,
) -> Result<(StatusCode, Json<MarkerRecord>), ApiErrorResponse> {
    let marker = state
        .session
        .lock()
        .await
        .create_marker(req.position(), req.fields())
        .await?;
    Ok((StatusCode::CREATED, Json(marker.to_record())))
}

/// DELETE /api/markers - clear saved and temporary markers
async fn clear_markers(State(state): State<AppState>) -> Json<ClearMarkersResponse> {
    let removed = state.session.lock().await.clear_markers().await;
    Json(ClearMarkersResponse { removed })
}

/// PUT /api/markers/:id
async fn update_marker(
    State(state): State<AppState>,
    Path(id): Path<MarkerId>,
    Json(req): Json<UpdateMarkerRequest>,
) -> Result<Json<MarkerRecord>, ApiErrorResponse> {
    let position = req.position();
    let marker = state
        .session
        .lock()
        .await
        .update_marker(id, req.fields, position)
        .await?;
    Ok(Json(marker.to_record()))
}

/// DELETE /api/markers/:id
async fn delete_marker(
    State(state): State<AppState>,
    Path(id): Path<MarkerId>,
) -> Result<Json<MarkerRecord>, ApiErrorResponse> {
    let marker = state.session.lock().await.delete_marker(id).await?;
    Ok(Json(marker.to_record()))
}

/// POST /api/markers/:id/edit - open the dialog on an existing marker
async fn edit_marker(
    State(state): State<AppState>,
    Path(id): Path<MarkerId>,
) -> Result<Json<MarkerRecord>, ApiErrorResponse> {
    let mut session = state.session.lock().await;
    let marker = session.open_edit_dialog(id)?;
    Ok(Json(marker.to_record()))
}

/// POST /api/markers/:id/focus - center on a saved marker
async fn focus_marker(
    State(state): State<AppState>,
    Path(id): Path<MarkerId>,
) -> Result<Json<ViewResponse>, ApiErrorResponse> {
    let mut session = state.session.lock().await;
    let label = session.focus_marker(id)?.title.clone();
    Ok(Json(ViewResponse {
        label,
        viewport: session.renderer().viewport().clone(),
    }))
}

/// POST /api/dialog/save
async fn save_dialog(
    State(state): State<AppState>,
    Json(fields): Json<MarkerFields>,
) -> Result<Json<MarkerRecord>, ApiErrorResponse> {
    let marker = state.session.lock().await.save_dialog(fields).await?;
    Ok(Json(marker.to_record()))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CancelDialogResponse {
    pub closed: bool,
}

/// POST /api/dialog/cancel
async fn cancel_dialog(State(state): State<AppState>) -> Json<CancelDialogResponse> {
    let closed = state.session.lock().await.cancel_dialog();
    Json(CancelDialogResponse { closed })
}

/// POST /api/dialog/delete
async fn delete_from_dialog(
    State(state): State<AppState>,
) -> Result<Json<MarkerRecord>, ApiErrorResponse> {
    let marker = state.session.lock().await.delete_from_dialog().await?;
    Ok(Json(marker.to_record()))
}

/// GET /api/markers/export - pretty-printed download
async fn export_markers(State(state): State<AppState>) -> Result<Response, ApiErrorResponse> {
    let file = state
        .session
        .lock()
        .await
        .export_file(chrono::Local::now())
        .map_err(|e| {
            tracing::error!("Failed to serialize markers: {}", e);
            ApiErrorResponse::new("internal", e.to_string())
        })?;

    info!("Exporting markers as {}", file.file_name);
    Ok((
        [
            (header::CONTENT_TYPE, "application/json".to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.file_name),
            ),
        ],
        file.body,
    )
        .into_response())
}

/// POST /api/markers/import - body is the exported JSON array
async fn import_markers(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<ImportReport>, ApiErrorResponse> {
    let report = state
        .session
        .lock()
        .await
        .import_document(&body)
        .await
        .map_err(|e| {
            warn!("Rejected import: {}", e);
            ApiErrorResponse::from(e)
        })?;
    Ok(Json(report))
}

/// PUT /api/filter
async fn set_filter(
    State(state): State<AppState>,
    Json(req): Json<FilterRequest>,
) -> Json<FilterSummary> {
    let category = CategoryFilter::parse(&req.category);
    Json(state.session.lock().await.set_filter(category))
}

/// GET /api/icons - catalogue for the filter menu
async fn list_icons(State(state): State<AppState>) -> Json<Vec<IconEntry>> {
    let session = state.session.lock().await;
    let entries = FilterEngine::category_counts(session.markers())
        .into_iter()
        .map(|(icon, count)| IconEntry::new(icon, count))
        .collect();
    Json(entries)
}

/// GET /api/search?q=
async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResults> {
    Json(state.search.search(state.geocoder.as_ref(), &params.q).await)
}

/// POST /api/search/select - jump to a chosen result
async fn select_place(
    State(state): State<AppState>,
    Json(req): Json<SelectPlaceRequest>,
) -> Result<Json<ViewResponse>, ApiErrorResponse> {
    let mut session = state.session.lock().await;
    session.show_place(LatLng::new(req.lat, req.lng), &req.name)?;
    Ok(Json(ViewResponse {
        label: req.name,
        viewport: session.renderer().viewport().clone(),
    }))
}

/// POST /api/cities/:name
async fn zoom_to_city(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ViewResponse>, ApiErrorResponse> {
    let city = City::from_name(&name)
        .ok_or_else(|| ApiErrorResponse::new("not_found", format!("Unknown city: {}", name)))?;

    let mut session = state.session.lock().await;
    session.zoom_to_city(city);
    Ok(Json(ViewResponse {
        label: city.label().to_string(),
        viewport: session.renderer().viewport().clone(),
    }))
}

/// POST /api/locate - center on the device position
async fn locate(State(state): State<AppState>) -> Result<Json<ViewResponse>, ApiErrorResponse> {
    let fix = state.geolocator.locate().await.map_err(|e| {
        warn!("Locate failed: {}", e);
        ApiErrorResponse::from(e)
    })?;

    let mut session = state.session.lock().await;
    session.show_device_position(&fix);
    Ok(Json(ViewResponse {
        label: fix.position.readout(),
        viewport: session.renderer().viewport().clone(),
    }))
}
