//! API Service - Read-only JSON over the offline CSV store
//!
//! Endpoints:
//! - GET /health - Health check and cache counters
//! - GET /countries - Countries with data
//! - GET /profile?name= - Country profile by name
//! - GET /countries/:iso3/{cities,unesco,leaders,migration,...} - Per-country datasets
//! - GET /olympics - Summer Olympics medal table
//!
//! Unknown ISO3 codes answer with empty lists; malformed codes with 400.

use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use store::migration::IndicatorView;
use store::schema::{is_iso3, normalize_iso3};
use store::{CacheStats, DataPaths, FrameCache, OfflineStore};
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

// ============================================================================
// Config & State
// ============================================================================

#[derive(Debug, Clone)]
struct Config {
    bind: String,
    paths: DataPaths,
    cache_capacity: usize,
    cache_ttl: Option<Duration>,
}

impl Config {
    fn from_env() -> Self {
        Self {
            bind: std::env::var("API_BIND").unwrap_or_else(|_| "127.0.0.1:8080".to_string()),
            paths: DataPaths::from_env(),
            cache_capacity: std::env::var("CACHE_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(FrameCache::DEFAULT_CAPACITY),
            cache_ttl: std::env::var("CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map(Duration::from_secs),
        }
    }

    fn store(&self) -> OfflineStore {
        let mut cache = FrameCache::new(self.cache_capacity);
        if let Some(ttl) = self.cache_ttl {
            cache = cache.with_ttl(ttl);
        }
        OfflineStore::with_cache(self.paths.clone(), cache)
    }
}

struct AppState {
    store: OfflineStore,
}

// ============================================================================
// Response types
// ============================================================================

#[derive(Serialize)]
struct HealthResponse {
    ok: bool,
    version: &'static str,
    cache: CacheStats,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

fn error_response(status: StatusCode, error: impl ToString) -> Response {
    (
        status,
        Json(ErrorResponse {
            error: error.to_string(),
        }),
    )
        .into_response()
}

// ============================================================================
// Query params
// ============================================================================

#[derive(Deserialize)]
struct ProfileQuery {
    name: String,
}

#[derive(Deserialize)]
struct IndicatorQuery {
    /// `latest` or `timeseries` (default)
    view: Option<String>,
}

impl IndicatorQuery {
    fn view(&self) -> IndicatorView {
        match self.view.as_deref().map(str::trim) {
            Some(v) if v.eq_ignore_ascii_case("latest") => IndicatorView::Latest,
            _ => IndicatorView::TimeSeries,
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn checked_iso3(raw: &str) -> Result<String, Response> {
    let code = normalize_iso3(raw);
    if is_iso3(&code) {
        Ok(code)
    } else {
        Err(error_response(
            StatusCode::BAD_REQUEST,
            format!("invalid ISO3 code: {:?}", raw),
        ))
    }
}

/// Run a store query on the blocking pool and wrap its result under `key`.
async fn query<T, F>(state: &Arc<AppState>, key: &'static str, f: F) -> Response
where
    F: FnOnce(&OfflineStore) -> T + Send + 'static,
    T: Serialize + Send + 'static,
{
    let state = Arc::clone(state);
    match tokio::task::spawn_blocking(move || f(&state.store)).await {
        Ok(value) => Json(serde_json::json!({ key: value })).into_response(),
        Err(e) => {
            error!(error = %e, "store query failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

/// Same as [`query`] for a per-country endpoint, echoing the code back.
async fn country_query<T, F>(state: &Arc<AppState>, raw_iso3: &str, key: &'static str, f: F) -> Response
where
    F: FnOnce(&OfflineStore, &str) -> T + Send + 'static,
    T: Serialize + Send + 'static,
{
    let iso3 = match checked_iso3(raw_iso3) {
        Ok(code) => code,
        Err(resp) => return resp,
    };
    let state = Arc::clone(state);
    let code = iso3.clone();
    match tokio::task::spawn_blocking(move || f(&state.store, &code)).await {
        Ok(value) => Json(serde_json::json!({ "iso3": iso3, key: value })).into_response(),
        Err(e) => {
            error!(error = %e, iso3 = %iso3, "store query failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, e)
        }
    }
}

// ============================================================================
// Handlers
// ============================================================================

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        ok: true,
        version: env!("CARGO_PKG_VERSION"),
        cache: state.store.cache_stats(),
    })
}

async fn countries_handler(State(state): State<Arc<AppState>>) -> Response {
    query(&state, "countries", |s| s.list_available_countries()).await
}

async fn profile_handler(State(state): State<Arc<AppState>>, Query(params): Query<ProfileQuery>) -> Response {
    query(&state, "profile", move |s| s.get_profile_by_name(&params.name)).await
}

async fn olympics_handler(State(state): State<Arc<AppState>>) -> Response {
    query(&state, "medals", |s| s.load_olympics_summer()).await
}

async fn cities_handler(State(state): State<Arc<AppState>>, Path(iso3): Path<String>) -> Response {
    country_query(&state, &iso3, "cities", |s, code| s.cities_for_iso3(code)).await
}

async fn unesco_handler(State(state): State<Arc<AppState>>, Path(iso3): Path<String>) -> Response {
    country_query(&state, &iso3, "sites", |s, code| s.unesco_for_iso3(code)).await
}

async fn leaders_handler(State(state): State<Arc<AppState>>, Path(iso3): Path<String>) -> Response {
    country_query(&state, &iso3, "leaders", |s, code| s.leaders_for_iso3(code)).await
}

async fn migration_handler(State(state): State<Arc<AppState>>, Path(iso3): Path<String>) -> Response {
    country_query(&state, &iso3, "migration", |s, code| s.migration_inout_for_iso3(code)).await
}

async fn migration_indicators_handler(
    State(state): State<Arc<AppState>>,
    Path(iso3): Path<String>,
    Query(params): Query<IndicatorQuery>,
) -> Response {
    let view = params.view();
    country_query(&state, &iso3, "indicators", move |s, code| {
        s.migration_indicators_for_iso3(code, view)
    })
    .await
}

async fn tourism_handler(State(state): State<Arc<AppState>>, Path(iso3): Path<String>) -> Response {
    country_query(&state, &iso3, "series", |s, code| s.tourism_series_for_iso3(code)).await
}

async fn tourism_latest_handler(State(state): State<Arc<AppState>>, Path(iso3): Path<String>) -> Response {
    country_query(&state, &iso3, "series", |s, code| s.tourism_latest_for_iso3(code)).await
}

async fn tourism_origin_handler(State(state): State<Arc<AppState>>, Path(iso3): Path<String>) -> Response {
    country_query(&state, &iso3, "origins", |s, code| s.tourism_origin_for_iso3(code)).await
}

async fn tourism_purpose_handler(State(state): State<Arc<AppState>>, Path(iso3): Path<String>) -> Response {
    country_query(&state, &iso3, "purposes", |s, code| s.tourism_purpose_for_iso3(code)).await
}

async fn worldbank_handler(State(state): State<Arc<AppState>>, Path(iso3): Path<String>) -> Response {
    country_query(&state, &iso3, "series", |s, code| s.wb_series_for_country(code)).await
}

async fn religion_handler(State(state): State<Arc<AppState>>, Path(iso3): Path<String>) -> Response {
    country_query(&state, &iso3, "religion", |s, code| s.religion_for_iso3(code)).await
}

fn router(state: Arc<AppState>) -> Router {
    // CORS for web frontend
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health_handler))
        .route("/countries", get(countries_handler))
        .route("/profile", get(profile_handler))
        .route("/olympics", get(olympics_handler))
        .route("/countries/:iso3/cities", get(cities_handler))
        .route("/countries/:iso3/unesco", get(unesco_handler))
        .route("/countries/:iso3/leaders", get(leaders_handler))
        .route("/countries/:iso3/migration", get(migration_handler))
        .route("/countries/:iso3/migration/indicators", get(migration_indicators_handler))
        .route("/countries/:iso3/tourism", get(tourism_handler))
        .route("/countries/:iso3/tourism/latest", get(tourism_latest_handler))
        .route("/countries/:iso3/tourism/origin", get(tourism_origin_handler))
        .route("/countries/:iso3/tourism/purpose", get(tourism_purpose_handler))
        .route("/countries/:iso3/worldbank", get(worldbank_handler))
        .route("/countries/:iso3/religion", get(religion_handler))
        .layer(cors)
        .with_state(state)
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .try_init()
        .ok();

    let config = Config::from_env();

    println!("=== Geodata API ===");
    println!("Data dir: {}", config.paths.data_dir().display());
    info!(
        capacity = config.cache_capacity,
        ttl = ?config.cache_ttl,
        "frame cache configured"
    );

    let state = Arc::new(AppState {
        store: config.store(),
    });
    let app = router(state);

    println!("API listening on http://{}", config.bind);
    println!("\nEndpoints:");
    println!("  GET /health");
    println!("  GET /countries");
    println!("  GET /profile?name=");
    println!("  GET /olympics");
    println!("  GET /countries/:iso3/{{cities,unesco,leaders,migration,worldbank,religion}}");
    println!("  GET /countries/:iso3/migration/indicators?view=timeseries|latest");
    println!("  GET /countries/:iso3/tourism[/latest|/origin|/purpose]");

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
