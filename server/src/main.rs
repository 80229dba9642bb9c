use axum::{Router, response::IntoResponse, routing::get};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::compression::CompressionLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webmap_server::config::Config;
use webmap_server::marker::FileKeyValueStore;
use webmap_server::render::Scene;
use webmap_server::services::{
    FixedPositionProvider, Geolocator, NominatimGeocoder, OsrmRoutingService,
};
use webmap_server::{AppState, MapSession, api_routes};

/// Prometheus metrics handle for exposing metrics in Prometheus format
static PROMETHEUS_HANDLE: std::sync::OnceLock<PrometheusHandle> = std::sync::OnceLock::new();

/// Endpoint to expose metrics in Prometheus format
async fn prometheus_metrics() -> impl IntoResponse {
    match PROMETHEUS_HANDLE.get() {
        Some(handle) => handle.render(),
        None => String::new(),
    }
}

/// Bind the preferred port, falling back to the following ones when taken
async fn bind_with_fallback(config: &Config) -> anyhow::Result<TcpListener> {
    let mut last_error = None;
    for port in config.candidate_ports() {
        let addr: SocketAddr = format!("{}:{}", config.host, port).parse()?;
        match TcpListener::bind(addr).await {
            Ok(listener) => {
                if port != config.port {
                    warn!("Port {} is in use, using {} instead", config.port, port);
                }
                return Ok(listener);
            }
            Err(e) => {
                warn!("Could not bind {}: {}", addr, e);
                last_error = Some(e);
            }
        }
    }
    Err(anyhow::anyhow!(
        "no free port in {}..={}: {}",
        config.port,
        config.port.saturating_add(config.port_fallback_attempts),
        last_error.map(|e| e.to_string()).unwrap_or_default()
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize Prometheus metrics recorder (must be done before any metrics are recorded)
    let prometheus_handle = PrometheusBuilder::new().install_recorder()?;
    PROMETHEUS_HANDLE.set(prometheus_handle).ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webmap_server=debug,webmap=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration from environment
    let config = Config::from_env();
    info!(
        "Loaded configuration: host={}, port={}, data_dir={:?}",
        config.host, config.port, config.data_dir
    );

    // Marker persistence
    let backend = Arc::new(FileKeyValueStore::new(&config.data_dir)?);
    let scene = Scene::new(config.map.center, config.map.zoom);
    let session = MapSession::open(backend, scene).await;
    info!("Session ready with {} markers", session.markers().len());

    // Upstream collaborators
    info!("Routing via {} ({})", config.routing.url, config.routing.profile);
    let routing = Arc::new(OsrmRoutingService::new(
        &config.routing.url,
        &config.routing.profile,
        config.routing.timeout,
        &config.user_agent,
    )?);
    info!("Geocoding via {}", config.geocoder.url);
    let geocoder = Arc::new(NominatimGeocoder::new(
        &config.geocoder.url,
        &config.geocoder.language,
        config.geocoder.limit,
        config.geocoder.timeout,
        &config.user_agent,
    )?);
    if config.geolocation.device_position.is_none() {
        info!("No DEVICE_LAT/DEVICE_LNG set - locate requests will report unavailable");
    }
    let geolocator = Arc::new(Geolocator::new(
        Arc::new(FixedPositionProvider::new(config.geolocation.device_position)),
        config.geolocation.position_options(),
    ));

    let app_state = AppState::new(session, routing, geocoder, geolocator)
        .with_search_config(config.geocoder.search_config());

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let app = Router::new()
        .route("/metrics/prometheus", get(prometheus_metrics))
        .merge(api_routes(app_state))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    // Add static file serving if configured
    let app = if let Some(ref static_dir) = config.static_files.dir {
        if static_dir.exists() {
            info!("Serving static files from: {:?}", static_dir);

            // ServeDir with SPA fallback: serve index.html for any unmatched routes
            let index_path = static_dir.join("index.html");
            let serve_dir =
                ServeDir::new(static_dir).not_found_service(ServeFile::new(&index_path));

            // Add compression layer for static files (gzip)
            let static_service = ServiceBuilder::new()
                .layer(CompressionLayer::new())
                .service(serve_dir);

            app.fallback_service(static_service)
        } else {
            warn!(
                "Static files directory not found: {:?} - static file serving disabled",
                static_dir
            );
            app
        }
    } else {
        info!("Static file serving disabled (STATIC_FILES_DIR not set)");
        app
    };

    // Start the server
    let listener = bind_with_fallback(&config).await?;
    info!("Webmap server listening on {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}
