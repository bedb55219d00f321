// Panel Quote Engine - Web Server
// REST API with Axum over one shared engine and the quote ledger

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use quote_engine::{
    get_quote, insert_quote, list_quotes, load_sources, open_ledger, EngineConfig,
    KnowledgeStore, QuoteEngine, QuoteError, QuoteRequest, SourceSpec,
};
use rusqlite::Connection;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Shared application state
#[derive(Clone)]
struct AppState {
    engine: Arc<QuoteEngine>,
    db: Arc<Mutex<Connection>>,
    /// Sources re-read on POST /api/reload
    sources: Arc<Vec<SourceSpec>>,
}

impl AppState {
    fn ledger(&self) -> MutexGuard<'_, Connection> {
        self.db.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// API Response wrapper
#[derive(Serialize)]
struct ApiResponse<T> {
    success: bool,
    data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    code: Option<&'static str>,
}

impl<T> ApiResponse<T> {
    fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
            error: None,
            code: None,
        }
    }
}

impl ApiResponse<serde_json::Value> {
    fn failure(code: &'static str, message: String, data: serde_json::Value) -> Self {
        Self {
            success: false,
            data,
            error: Some(message),
            code: Some(code),
        }
    }
}

/// Stored quote id + the quote itself
#[derive(Serialize)]
struct IssuedQuote {
    id: String,
    quote: quote_engine::Quote,
}

#[derive(Serialize)]
struct ReloadResponse {
    generation: u64,
    sources: Vec<String>,
}

// ============================================================================
// Error mapping
// ============================================================================

fn status_for(err: &QuoteError) -> StatusCode {
    match err {
        QuoteError::NotFound { .. } => StatusCode::NOT_FOUND,
        QuoteError::VerificationFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        QuoteError::AmbiguousMatch { .. }
        | QuoteError::UnknownStructuralLimit { .. }
        | QuoteError::SpanExceeded { .. }
        | QuoteError::InvalidDimension { .. }
        | QuoteError::UnitBasisUnknown { .. }
        | QuoteError::InvalidRecord { .. }
        | QuoteError::SourceLoad { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    }
}

fn quote_error_response(err: QuoteError) -> Response {
    let status = status_for(&err);

    // Discrepancies stay in the server log; clients only learn the quote was withheld
    let (message, data) = match &err {
        QuoteError::VerificationFailure { discrepancies } => {
            error!(discrepancies = discrepancies.len(), "quote withheld");
            ("quote could not be verified".to_string(), serde_json::Value::Null)
        }
        QuoteError::AmbiguousMatch { candidates, .. } => {
            (err.to_string(), serde_json::json!({ "candidates": candidates }))
        }
        _ => (err.to_string(), serde_json::Value::Null),
    };

    (status, Json(ApiResponse::failure(err.code(), message, data))).into_response()
}

fn internal_error(context: &str, err: anyhow::Error) -> Response {
    error!("{}: {:#}", context, err);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::failure(
            "internal",
            context.to_string(),
            serde_json::Value::Null,
        )),
    )
        .into_response()
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health - Health check
async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let snapshot = state.engine.store().snapshot();
    Json(ApiResponse::ok(serde_json::json!({
        "status": "OK",
        "version": quote_engine::VERSION,
        "generation": snapshot.generation,
        "sources": snapshot.sources().len(),
    })))
}

/// POST /api/quotes - Compute, verify and store a quote
async fn create_quote(
    State(state): State<AppState>,
    Json(request): Json<QuoteRequest>,
) -> Response {
    let quote = match state.engine.quote(&request) {
        Ok(quote) => quote,
        Err(e) => return quote_error_response(e),
    };

    let conn = state.ledger();
    match insert_quote(&conn, &quote, "api") {
        Ok(stored) => (
            StatusCode::CREATED,
            Json(ApiResponse::ok(IssuedQuote {
                id: stored.id,
                quote,
            })),
        )
            .into_response(),
        Err(e) => internal_error("failed to store quote", e),
    }
}

/// GET /api/quotes - Most recent stored quotes
async fn get_quotes(State(state): State<AppState>) -> Response {
    let conn = state.ledger();

    match list_quotes(&conn, 100) {
        Ok(quotes) => (StatusCode::OK, Json(ApiResponse::ok(quotes))).into_response(),
        Err(e) => internal_error("failed to list quotes", e),
    }
}

/// GET /api/quotes/:id - One stored quote
async fn get_stored_quote(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let conn = state.ledger();

    match get_quote(&conn, &id) {
        Ok(Some(stored)) => (StatusCode::OK, Json(ApiResponse::ok(stored))).into_response(),
        Ok(None) => quote_error_response(QuoteError::not_found(format!("quote {}", id))),
        Err(e) => internal_error("failed to load quote", e),
    }
}

/// GET /api/products/:sku - Resolve a SKU with provenance and conflicts
async fn get_product(State(state): State<AppState>, Path(sku): Path<String>) -> Response {
    // Decode URL-encoded SKU
    let decoded_sku = urlencoding::decode(&sku)
        .unwrap_or_else(|_| sku.clone().into())
        .into_owned();

    match state.engine.lookup_product(&decoded_sku) {
        Ok(resolved) => (StatusCode::OK, Json(ApiResponse::ok(resolved))).into_response(),
        Err(e) => quote_error_response(e),
    }
}

/// GET /api/conflicts - Every SKU conflict in the current snapshot
async fn get_conflicts(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.engine.conflict_report()))
}

/// POST /api/reload - Re-read all sources and swap the snapshot
async fn reload_sources(State(state): State<AppState>) -> Response {
    let result = load_sources(&state.sources).and_then(|sources| state.engine.reload(sources));

    match result {
        Ok(snapshot) => {
            let sources = snapshot.sources().iter().map(|s| s.id.clone()).collect();
            (
                StatusCode::OK,
                Json(ApiResponse::ok(ReloadResponse {
                    generation: snapshot.generation,
                    sources,
                })),
            )
                .into_response()
        }
        Err(e) => quote_error_response(e),
    }
}

// ============================================================================
// Main Server
// ============================================================================

struct ServerOptions {
    sources: Vec<SourceSpec>,
    db: PathBuf,
    config: Option<PathBuf>,
    addr: String,
}

fn parse_args() -> anyhow::Result<ServerOptions> {
    let mut options = ServerOptions {
        sources: Vec::new(),
        db: PathBuf::from("quotes.db"),
        config: None,
        addr: "0.0.0.0:3000".to_string(),
    };

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        let mut value = || {
            args.next()
                .ok_or_else(|| anyhow::anyhow!("{} needs a value", arg))
        };
        match arg.as_str() {
            "--source" => options.sources.push(SourceSpec::parse(&value()?)?),
            "--db" => options.db = PathBuf::from(value()?),
            "--config" => options.config = Some(PathBuf::from(value()?)),
            "--addr" => options.addr = value()?,
            other => anyhow::bail!("unknown argument {}", other),
        }
    }

    if options.sources.is_empty() {
        anyhow::bail!("usage: quote-server --source SPEC... [--db PATH] [--config PATH] [--addr HOST:PORT]");
    }
    Ok(options)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("🌐 Panel Quote Engine - Web Server");
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let options = parse_args()?;

    let config = EngineConfig::load_from(options.config.as_deref())?;
    let engine = QuoteEngine::new(config, KnowledgeStore::new());
    let snapshot = engine.reload(load_sources(&options.sources)?)?;
    println!(
        "✓ Knowledge loaded: {} sources, generation {}",
        snapshot.sources().len(),
        snapshot.generation
    );

    let conn = open_ledger(&options.db)?;
    println!("✓ Ledger opened: {:?}", options.db);

    // Create shared state
    let state = AppState {
        engine: Arc::new(engine),
        db: Arc::new(Mutex::new(conn)),
        sources: Arc::new(options.sources),
    };

    // Build API routes
    let api_routes = Router::new()
        .route("/health", get(health_check))
        .route("/quotes", post(create_quote).get(get_quotes))
        .route("/quotes/:id", get(get_stored_quote))
        .route("/products/:sku", get(get_product))
        .route("/conflicts", get(get_conflicts))
        .route("/reload", post(reload_sources))
        .with_state(state);

    // Build main router
    let app = Router::new().nest("/api", api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    );

    // Start server
    let listener = tokio::net::TcpListener::bind(&options.addr).await?;

    info!(addr = %options.addr, "server listening");
    println!("\n🚀 Server running on http://{}", options.addr);
    println!("   API: http://{}/api/quotes", options.addr);
    println!("\n   Press Ctrl+C to stop\n");

    axum::serve(listener, app).await?;

    Ok(())
}
