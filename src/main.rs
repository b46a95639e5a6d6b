//! Ad Performance Importer - normalizes ad-platform exports into monthly
//! per-client performance reports.

mod aggregate;
mod column_mapper;
mod config;
mod error;
mod extractor;
mod header;
mod merge;
mod numeric;
mod pipeline;
mod schema;
mod shape;
mod sheet_parser;
mod store;
mod supabase;
mod synonyms;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use config::AppConfig;
use error::ImportError;
use pipeline::{ImportOutcome, ImportPipeline, ImportRequest, ImportSource};
use schema::PerformanceReport;
use serde_json::json;
use std::sync::Arc;
use store::{MemoryReportStore, ReportStore};
use supabase::SupabaseReportStore;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Application state shared across handlers.
#[derive(Clone)]
struct AppState {
    pipeline: Arc<ImportPipeline>,
    store: Arc<dyn ReportStore>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "ad_performance_importer=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::from_env()?;

    let store: Arc<dyn ReportStore> = match &config.supabase {
        Some(settings) => Arc::new(SupabaseReportStore::new(settings)),
        None => {
            warn!("SUPABASE_URL not set, reports are kept in memory only");
            Arc::new(MemoryReportStore::new())
        }
    };

    let pipeline = ImportPipeline::new(store.clone(), config.import.clone());
    info!("Import pipeline ready (store={})", pipeline.store_name());

    let state = AppState {
        pipeline: Arc::new(pipeline),
        store,
    };

    let app = Router::new()
        .route("/health", get(health))
        .route("/clients/:client_id/reports/:month", get(get_report))
        .route("/clients/:client_id/reports/:month/import", post(import_file))
        .route("/clients/:client_id/reports/:month/paste", post(import_pasted))
        .layer(DefaultBodyLimit::max(config.max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!("Server listening on http://{}", config.bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Errors
// ============================================================================

struct ApiError(StatusCode, String);

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        let status = match &err {
            ImportError::InvalidMonth(_) | ImportError::UnsupportedFormat(_) => StatusCode::BAD_REQUEST,
            ImportError::Store(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::UNPROCESSABLE_ENTITY,
        };
        if err.is_input_error() {
            warn!("Import rejected: {}", err);
        } else {
            error!("Import failed: {}", err);
        }
        ApiError(status, err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "error": self.1 }))).into_response()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint.
async fn health() -> &'static str {
    "ok"
}

/// Fetch the stored report for a client and month.
async fn get_report(
    State(state): State<AppState>,
    Path((client_id, month)): Path<(String, String)>,
) -> Result<Json<PerformanceReport>, ApiError> {
    let report = state
        .store
        .fetch_report(&client_id, &month)
        .await
        .map_err(ImportError::from)?;

    report
        .map(Json)
        .ok_or_else(|| ApiError(StatusCode::NOT_FOUND, format!("No report for {} / {}", client_id, month)))
}

/// Upload a spreadsheet/CSV export (multipart field `file`).
async fn import_file(
    State(state): State<AppState>,
    Path((client_id, month)): Path<(String, String)>,
    mut multipart: Multipart,
) -> Result<Json<ImportOutcome>, ApiError> {
    let mut filename = String::new();
    let mut file_data = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        ApiError(StatusCode::BAD_REQUEST, format!("Multipart error: {}", e))
    })? {
        if field.name() == Some("file") {
            filename = field.file_name().unwrap_or("upload.csv").to_string();
            file_data = field.bytes().await.map_err(|e| {
                ApiError(StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
            })?.to_vec();
            break;
        }
    }

    if file_data.is_empty() {
        return Err(ImportError::EmptySource.into());
    }

    info!("Received file: {} ({} bytes)", filename, file_data.len());

    let outcome = state
        .pipeline
        .import(ImportRequest {
            client_id,
            month,
            source: ImportSource::File {
                filename,
                data: file_data,
            },
            source_label: None,
        })
        .await?;

    Ok(Json(outcome))
}

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct PasteBody {
    text: String,
    #[serde(default)]
    source_label: Option<String>,
}

/// Import a block of text pasted from a spreadsheet.
async fn import_pasted(
    State(state): State<AppState>,
    Path((client_id, month)): Path<(String, String)>,
    Json(body): Json<PasteBody>,
) -> Result<Json<ImportOutcome>, ApiError> {
    let outcome = state
        .pipeline
        .import(ImportRequest {
            client_id,
            month,
            source: ImportSource::Pasted { text: body.text },
            source_label: body.source_label,
        })
        .await?;

    Ok(Json(outcome))
}
