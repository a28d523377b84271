//! linkgarden server — HTTP JSON API over the shared link graph.
//!
//! Thin axum layer wrapping the linkgarden_lib pipeline; every handler
//! delegates to the same library code the CLI uses.
//!
//! Usage:
//!   LINKGARDEN_DB=/path/to/links.db LINKGARDEN_BIND=0.0.0.0:3742 linkgarden-server
//!
//! Or with args:
//!   linkgarden-server --db /path/to/links.db --bind 0.0.0.0:3742

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tower_http::cors::CorsLayer;

use linkgarden_lib::db::{Database, Link, LinkSummary};
use linkgarden_lib::ingest::IngestOutcome;
use linkgarden_lib::ollama::OllamaClient;
use linkgarden_lib::{batch, canonical, export, ingest, settings};

// ============================================================================
// AppState
// ============================================================================

#[derive(Clone)]
struct AppState {
    db: Arc<Database>,
    ollama: Arc<OllamaClient>,
    start_time: Instant,
}

// ============================================================================
// Error type
// ============================================================================

struct AppError(StatusCode, String);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        (self.0, Json(serde_json::json!({"error": self.1}))).into_response()
    }
}

impl From<String> for AppError {
    fn from(s: String) -> Self {
        AppError(StatusCode::INTERNAL_SERVER_ERROR, s)
    }
}

fn not_found(msg: impl Into<String>) -> AppError {
    AppError(StatusCode::NOT_FOUND, msg.into())
}

fn bad_request(msg: impl Into<String>) -> AppError {
    AppError(StatusCode::BAD_REQUEST, msg.into())
}

// ============================================================================
// Request / Response types
// ============================================================================

#[derive(Deserialize)]
struct AddLinkRequest {
    url: String,
}

#[derive(Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
enum AddLinkResponse {
    Added { link: Link },
    Duplicate { url: String },
}

#[derive(Deserialize)]
struct UrlQuery {
    url: String,
}

#[derive(Deserialize)]
struct BatchRequest {
    /// Path to a CSV file readable by the server process
    path: String,
    limit: Option<usize>,
}

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    links: i64,
    categories: i64,
    keywords: i64,
    edges: i64,
    ollama_available: bool,
    uptime_secs: u64,
}

// ============================================================================
// Handlers
// ============================================================================

// GET /links
async fn list_links_handler(
    State(state): State<AppState>,
) -> Result<Json<Vec<LinkSummary>>, AppError> {
    let links = state
        .db
        .get_links_with_categories()
        .map_err(|e| AppError::from(e.to_string()))?;
    Ok(Json(links))
}

// POST /links
async fn add_link_handler(
    State(state): State<AppState>,
    Json(req): Json<AddLinkRequest>,
) -> Result<(StatusCode, Json<AddLinkResponse>), AppError> {
    if req.url.trim().is_empty() {
        return Err(bad_request("url must not be empty"));
    }

    match ingest::add_link(&state.db, &state.ollama, &req.url).await {
        Ok(IngestOutcome::Added(link)) => {
            println!("[POST /links] Added {}", link.url);
            Ok((StatusCode::CREATED, Json(AddLinkResponse::Added { link: *link })))
        }
        Ok(IngestOutcome::Duplicate(url)) => {
            Ok((StatusCode::OK, Json(AddLinkResponse::Duplicate { url })))
        }
        Err(ingest::IngestError::InvalidUrl(url)) => {
            Err(bad_request(format!("Invalid URL: {}", url)))
        }
        Err(e) => Err(AppError::from(e.to_string())),
    }
}

// DELETE /links?url=...
async fn delete_link_handler(
    State(state): State<AppState>,
    Query(query): Query<UrlQuery>,
) -> Result<StatusCode, AppError> {
    let url = canonical::canonicalize(&query.url)
        .map_err(|e| bad_request(e.to_string()))?;

    let deleted = state
        .db
        .delete_link(&url)
        .map_err(|e| AppError::from(e.to_string()))?;

    if deleted {
        println!("[DELETE /links] Removed {}", url);
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(not_found(format!("Link '{}' not found", url)))
    }
}

// POST /batch
async fn batch_handler(
    State(state): State<AppState>,
    Json(req): Json<BatchRequest>,
) -> Result<Json<batch::BatchResult>, AppError> {
    let limit = req.limit.unwrap_or(100);
    let result = batch::ingest_csv_file(&state.db, &state.ollama, &req.path, limit)
        .await
        .map_err(AppError::from)?;
    Ok(Json(result))
}

// GET /graph
async fn graph_handler(
    State(state): State<AppState>,
) -> Result<Json<export::GraphView>, AppError> {
    let view = export::export_graph(&state.db).map_err(|e| AppError::from(e.to_string()))?;
    Ok(Json(view))
}

// GET /health
async fn health_handler(
    State(state): State<AppState>,
) -> Result<Json<HealthResponse>, AppError> {
    let to_err = |e: rusqlite::Error| AppError::from(e.to_string());
    Ok(Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        links: state.db.count_links().map_err(to_err)?,
        categories: state.db.count_categories().map_err(to_err)?,
        keywords: state.db.count_keywords().map_err(to_err)?,
        edges: state.db.count_edges().map_err(to_err)?,
        ollama_available: state.ollama.probe().await,
        uptime_secs: state.start_time.elapsed().as_secs(),
    }))
}

// ============================================================================
// Database path resolution (matches CLI pattern)
// ============================================================================

fn find_database(db_arg: Option<&str>) -> PathBuf {
    if let Some(path) = db_arg {
        return PathBuf::from(path);
    }

    if let Ok(path) = std::env::var("LINKGARDEN_DB") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = settings::get_custom_db_path() {
        return PathBuf::from(path);
    }

    dirs::data_dir()
        .map(|p| p.join("linkgarden/linkgarden.db"))
        .unwrap_or_else(|| PathBuf::from("linkgarden.db"))
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() {
    // Parse simple args (no clap to keep binary small)
    let args: Vec<String> = std::env::args().collect();
    let mut db_arg: Option<&str> = None;
    let mut bind_arg: Option<&str> = None;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--db" if i + 1 < args.len() => {
                db_arg = Some(&args[i + 1]);
                i += 2;
            }
            "--bind" if i + 1 < args.len() => {
                bind_arg = Some(&args[i + 1]);
                i += 2;
            }
            "--help" | "-h" => {
                println!("linkgarden-server — link graph HTTP API");
                println!();
                println!("Usage: linkgarden-server [--db PATH] [--bind ADDR:PORT]");
                println!();
                println!("Environment variables:");
                println!("  LINKGARDEN_DB    Database path");
                println!("  LINKGARDEN_BIND  Bind address (default: 0.0.0.0:3742)");
                std::process::exit(0);
            }
            _ => {
                i += 1;
            }
        }
    }

    let bind_addr = bind_arg
        .map(|s| s.to_string())
        .or_else(|| std::env::var("LINKGARDEN_BIND").ok())
        .unwrap_or_else(|| "0.0.0.0:3742".to_string());

    // Initialize settings
    let app_data_dir = dirs::data_dir()
        .map(|p| p.join("linkgarden"))
        .unwrap_or_else(|| PathBuf::from("."));
    settings::init(app_data_dir);

    let db_path = find_database(db_arg);
    println!("[Server] Database: {}", db_path.display());
    println!("[Server] Binding to: {}", bind_addr);

    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent).ok();
    }

    // Open database
    let db = match Database::new(&db_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            eprintln!("[Server] Failed to open database: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = db.seed_if_empty() {
        eprintln!("[Server] Warning: failed to seed sample data: {}", e);
    }

    let ollama = Arc::new(OllamaClient::from_settings());
    if ollama.probe().await {
        println!("[Server] Ollama available ({})", ollama.model());
    } else {
        eprintln!("[Server] Warning: Ollama unreachable, links will land in Uncategorized");
    }

    // Build router
    let state = AppState {
        db,
        ollama,
        start_time: Instant::now(),
    };

    let app = Router::new()
        .route(
            "/links",
            get(list_links_handler)
                .post(add_link_handler)
                .delete(delete_link_handler),
        )
        .route("/batch", post(batch_handler))
        .route("/graph", get(graph_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(state);

    // Bind and serve
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) => {
            eprintln!("[Server] Failed to bind to {}: {}", bind_addr, e);
            std::process::exit(1);
        }
    };

    println!("[Server] Listening on {}", bind_addr);
    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("[Server] Server error: {}", e);
        std::process::exit(1);
    }
}
