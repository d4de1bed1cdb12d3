use anyhow::Context;
use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use surfcast::charts::{ChartRenderer, SvgChartRenderer};
use surfcast::datasources::{ForecastStore, ForecastStoreHandle};
use surfcast::logic::RecommendationService;
use surfcast::models::{ErrorBody, RecommendationRequest, ServiceError};
use surfcast::Config;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::services::{ServeDir, ServeFile};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Clone)]
struct AppState {
    service: Arc<RecommendationService>,
}

#[derive(Serialize)]
struct MessageBody {
    message: String,
}

#[derive(Serialize)]
struct HealthBody {
    status: &'static str,
    stations: usize,
    records: usize,
}

fn error_response(err: &ServiceError) -> Response {
    let status =
        StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(ErrorBody::from(err))).into_response()
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorBody {
            error: "An unexpected error occurred. Please try again later.".into(),
        }),
    )
        .into_response()
}

async fn get_predictions(
    State(state): State<AppState>,
    body: Result<Json<RecommendationRequest>, JsonRejection>,
) -> Response {
    let request = match body {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected prediction request body: {}", rejection.body_text());
            return (
                StatusCode::BAD_REQUEST,
                Json(ErrorBody {
                    error: "Request body must be a JSON object.".into(),
                }),
            )
                .into_response();
        }
    };

    let service = state.service.clone();
    match tokio::task::spawn_blocking(move || service.recommend(&request)).await {
        Ok(Ok(response)) => Json(response).into_response(),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            error!("Recommendation task failed: {}", e);
            internal_error()
        }
    }
}

async fn clear_images(State(state): State<AppState>) -> Response {
    let service = state.service.clone();
    match tokio::task::spawn_blocking(move || service.clear_charts()).await {
        Ok(Ok(removed)) => Json(MessageBody {
            message: format!("Forecast images cleared successfully ({} removed).", removed),
        })
        .into_response(),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            error!("Chart cleanup task failed: {}", e);
            internal_error()
        }
    }
}

async fn reload(State(state): State<AppState>) -> Response {
    let service = state.service.clone();
    match tokio::task::spawn_blocking(move || service.reload()).await {
        Ok(Ok(records)) => Json(MessageBody {
            message: format!("Forecast store reloaded with {} records.", records),
        })
        .into_response(),
        Ok(Err(e)) => error_response(&e),
        Err(e) => {
            error!("Reload task failed: {}", e);
            internal_error()
        }
    }
}

async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    let store = state.service.store().snapshot();
    Json(HealthBody {
        status: if store.is_empty() { "empty" } else { "ok" },
        stations: store.station_ids().count(),
        records: store.len(),
    })
}

fn router(state: AppState, static_dir: &Path, max_body_bytes: usize) -> Router {
    Router::new()
        .route_service("/", ServeFile::new(static_dir.join("index.html")))
        .route("/get_predictions", post(get_predictions))
        .route("/clear_images", post(clear_images))
        .route("/reload", post(reload))
        .route("/health", get(health))
        .nest_service("/static", ServeDir::new(static_dir))
        .layer(RequestBodyLimitLayer::new(max_body_bytes))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Open the forecast store, starting empty if it has not been built yet.
fn open_store(path: &Path) -> ForecastStoreHandle {
    match ForecastStoreHandle::open(path) {
        Ok(handle) => {
            let store = handle.snapshot();
            info!(
                "Loaded {} forecast records for {} stations from {}",
                store.len(),
                store.station_ids().count(),
                path.display()
            );
            handle
        }
        Err(e) => {
            warn!(
                "Forecast store {} unavailable ({}), serving empty until reload",
                path.display(),
                e
            );
            ForecastStoreHandle::with_path(ForecastStore::new(), path)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let config_override = std::env::var_os("SURFCAST_CONFIG").map(Into::into);
    let config = Config::load_or_default(config_override).context("loading configuration")?;

    let store = open_store(&config.data.forecast_file);
    let charts: Arc<dyn ChartRenderer> = Arc::new(SvgChartRenderer::new(
        &config.data.chart_dir,
        config.data.chart_url_prefix.clone(),
    ));
    let state = AppState {
        service: Arc::new(RecommendationService::new(store, charts, &config)),
    };

    let app = router(
        state,
        &config.server.static_dir,
        config.server.max_body_bytes,
    );

    let listener = tokio::net::TcpListener::bind(&config.server.bind)
        .await
        .with_context(|| format!("binding {}", config.server.bind))?;
    info!("Listening on {}", config.server.bind);
    println!("surfcast backend listening on http://{}", config.server.bind);

    axum::serve(listener, app).await.context("server error")?;
    Ok(())
}
