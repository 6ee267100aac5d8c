// =============================================================================
// REST API Endpoints - Axum 0.7
// =============================================================================
//
// All endpoints live under `/api/v1/`:
//
//   GET  /health               operational counters
//   GET  /forecast             full analysis report for one ticker
//   GET  /data/:ticker         historical bars with indicator columns
//   GET  /functions            tool schemas for the chat layer
//   POST /function             execute one tool call
//
// Failures are returned as `{"error": <kind>, "message": <text>}` with a
// status derived from the error kind.
//
// CORS is configured permissively; tighten it in front of a public
// deployment.
// =============================================================================

use std::sync::Arc;

use axum::{
    extract::{Json, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use crate::app_state::{AppState, StateSnapshot};
use crate::error::AnalysisError;
use crate::indicators::compute_indicators;
use crate::market_data::HistoryRange;
use crate::pipeline::{self, historical_records, AnalysisRequest, HistoricalRecord};
use crate::tools::{tool_definitions, ToolCall, TOOL_NAMES};
use crate::types::PriceColumn;

// =============================================================================
// Router construction
// =============================================================================

/// Build the full REST API router with CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/v1/health", get(health))
        .route("/api/v1/forecast", get(forecast))
        .route("/api/v1/data/:ticker", get(data))
        .route("/api/v1/functions", get(functions))
        .route("/api/v1/function", post(call_function))
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
        .with_state(state)
}

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug)]
pub enum ApiError {
    Analysis(AnalysisError),
    UnknownFunction(String),
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        Self::Analysis(err)
    }
}

pub fn status_for(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::NoDataFound { .. } => StatusCode::NOT_FOUND,
        AnalysisError::InsufficientHistory { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        AnalysisError::InvalidParameter { .. } => StatusCode::BAD_REQUEST,
        AnalysisError::ComputationFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        AnalysisError::Provider(_) => StatusCode::BAD_GATEWAY,
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            Self::Analysis(err) => (status_for(&err), err.kind(), err.to_string()),
            Self::UnknownFunction(name) => (
                StatusCode::NOT_FOUND,
                "unknown_function",
                format!("function '{name}' is not available"),
            ),
        };
        (status, Json(json!({ "error": kind, "message": message }))).into_response()
    }
}

/// Log and record a failed request before it becomes a response.
fn reject(state: &AppState, err: AnalysisError) -> ApiError {
    warn!(kind = err.kind(), error = %err, "request failed");
    state.push_error(&err);
    ApiError::Analysis(err)
}

fn parse_column(raw: Option<&str>, default: PriceColumn) -> Result<PriceColumn, AnalysisError> {
    raw.map_or(Ok(default), str::parse)
}

// =============================================================================
// Health
// =============================================================================

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    server_time: i64,
    #[serde(flatten)]
    state: StateSnapshot,
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(HealthResponse {
        status: "ok",
        server_time: chrono::Utc::now().timestamp_millis(),
        state: state.snapshot(),
    })
}

// =============================================================================
// Forecast
// =============================================================================

#[derive(Debug, Deserialize)]
struct ForecastParams {
    symbol: String,
    #[serde(default)]
    years: Option<u32>,
    #[serde(default)]
    column: Option<String>,
}

async fn forecast(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ForecastParams>,
) -> Result<Json<pipeline::AnalysisReport>, ApiError> {
    let analysis = &state.config.analysis;
    let mut request = AnalysisRequest::with_defaults(params.symbol.trim().to_uppercase(), analysis);
    request.price_column = parse_column(params.column.as_deref(), analysis.default_price_column)
        .map_err(|e| reject(&state, e))?;
    if let Some(years) = params.years {
        request.forecast_years = years;
    }

    let range = HistoryRange::Since(state.config.provider.history_start);
    let report = pipeline::run(state.provider.as_ref(), range, request, analysis.clone())
        .await
        .map_err(|e| reject(&state, e))?;

    let served = state.record_analysis();
    info!(
        analysis_id = %report.analysis_id,
        ticker = %report.ticker,
        served,
        "forecast served"
    );
    Ok(Json(report))
}

// =============================================================================
// Historical data with indicators
// =============================================================================

#[derive(Debug, Deserialize)]
struct DataParams {
    #[serde(default)]
    column: Option<String>,
}

#[derive(Serialize)]
struct DataResponse {
    ticker: String,
    price_column: PriceColumn,
    data: Vec<HistoricalRecord>,
}

async fn data(
    State(state): State<Arc<AppState>>,
    Path(ticker): Path<String>,
    Query(params): Query<DataParams>,
) -> Result<Json<DataResponse>, ApiError> {
    let ticker = ticker.trim().to_uppercase();
    let column = parse_column(params.column.as_deref(), state.config.analysis.default_price_column)
        .map_err(|e| reject(&state, e))?;

    let series = state
        .provider
        .fetch_history(&ticker, HistoryRange::Since(state.config.provider.history_start))
        .await
        .map_err(|e| reject(&state, e))?;
    let frame = compute_indicators(&series, column, &state.config.analysis.indicators)
        .map_err(|e| reject(&state, e))?;

    Ok(Json(DataResponse {
        ticker,
        price_column: frame.price_column(),
        data: historical_records(&frame, true),
    }))
}

// =============================================================================
// Tool calls
// =============================================================================

async fn functions() -> impl IntoResponse {
    Json(tool_definitions())
}

/// `arguments` may be an object or a JSON-encoded string; `params` is
/// accepted as an alias.
#[derive(Debug, Deserialize)]
struct FunctionRequest {
    name: String,
    #[serde(default, alias = "params")]
    arguments: Option<Value>,
}

async fn call_function(
    State(state): State<Arc<AppState>>,
    Json(req): Json<FunctionRequest>,
) -> Result<Json<Value>, ApiError> {
    if !TOOL_NAMES.contains(&req.name.as_str()) {
        warn!(name = %req.name, "unknown function requested");
        return Err(ApiError::UnknownFunction(req.name));
    }

    let call = match req.arguments {
        Some(Value::String(raw)) => ToolCall::from_function_call(&req.name, &raw),
        Some(args) => ToolCall::from_value(json!({ "name": req.name, "arguments": args })),
        None => ToolCall::from_function_call(&req.name, ""),
    }
    .map_err(|e| reject(&state, e))?;

    let output = call
        .execute(state.provider.as_ref(), &state.config.analysis.indicators)
        .await
        .map_err(|e| reject(&state, e))?;

    state.record_tool_call();
    Ok(Json(json!({ "result": output })))
}
