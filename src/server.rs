//! JSON HTTP API.
//!
//! The answer pipeline and stock analyst are built once at startup, before
//! the listener binds.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/ask` | Answer a finance question from the corpus |
//! | `POST` | `/stocks/compare` | Compare recent price action of tickers |
//! | `POST` | `/api/profile` | Create a user profile |
//! | `GET`/`PUT` | `/api/profile/{id}` | Fetch or replace a profile |
//! | `POST` | `/api/financial-goals` | Create a goal |
//! | `GET`  | `/api/financial-goals/{user_id}` | List a user's goals |
//! | `PUT`/`DELETE` | `/api/financial-goals/{goal_id}` | Update or delete a goal |
//!
//! # Error Contract
//!
//! ```json
//! { "error": { "code": "not_found", "message": "profile 7 not found" } }
//! ```
//!
//! Expected misses on `/ask` (empty question, no keywords, no match) are not
//! errors: they return 200 with a `status` field.
//!
//! Error codes: `bad_request` / `empty_query` (400), `not_found` (404),
//! `service_unavailable` (503), `internal` (500).

use axum::{
    extract::{
        rejection::{JsonRejection, PathRejection},
        Path, State,
    },
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use finsight_core::error::PipelineError;
use finsight_core::models::StockComparison;
use finsight_core::pipeline::AnswerPipeline;
use finsight_core::stocks::StockAnalyst;
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};

use crate::ask::{build_pipeline, to_response, AskResponse};
use crate::config::Config;
use crate::db::{self, RecordError};
use crate::goals::{self, FinancialGoal, GoalInput, GoalPatch};
use crate::migrate;
use crate::profiles::{self, ProfileInput, UserProfile};
use crate::stocks::build_analyst;

#[derive(Clone)]
struct AppState {
    pipeline: Arc<AnswerPipeline>,
    analyst: Arc<StockAnalyst>,
    pool: SqlitePool,
}

/// Build every collaborator, bind `[server].bind`, and serve until the
/// process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let pool = db::connect(config).await?;
    migrate::apply(&pool).await?;

    let pipeline = build_pipeline(config).await?;
    tracing::info!(
        mode = ?pipeline.mode(),
        corpus_entries = pipeline.corpus().map(|c| c.len()),
        "answer pipeline ready"
    );
    let analyst = build_analyst(config)?;

    let state = AppState {
        pipeline: Arc::new(pipeline),
        analyst: Arc::new(analyst),
        pool,
    };

    let app = Router::new()
        .route("/health", get(handle_health))
        .route("/ask", post(handle_ask))
        .route("/stocks/compare", post(handle_compare))
        .route("/api/profile", post(handle_create_profile))
        .route(
            "/api/profile/{id}",
            get(handle_get_profile).put(handle_update_profile),
        )
        .route("/api/financial-goals", post(handle_create_goal))
        .route(
            "/api/financial-goals/{id}",
            get(handle_list_goals)
                .put(handle_update_goal)
                .delete(handle_delete_goal),
        )
        .layer(cors_layer(&config.server.allowed_origins)?)
        .with_state(state);

    let listener = tokio::net::TcpListener::bind(&config.server.bind).await?;
    tracing::info!(addr = %config.server.bind, "server listening");
    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(allowed_origins: &[String]) -> anyhow::Result<CorsLayer> {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::from(Any)
    } else {
        let origins = allowed_origins
            .iter()
            .map(|o| {
                HeaderValue::from_str(o)
                    .map_err(|_| anyhow::anyhow!("invalid CORS origin: '{}'", o))
            })
            .collect::<anyhow::Result<Vec<_>>>()?;
        AllowOrigin::list(origins)
    };
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl AppError {
    fn new(status: StatusCode, code: &str, message: impl Into<String>) -> Self {
        Self {
            status,
            code: code.to_string(),
            message: message.into(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.status.is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, "request failed");
        }
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

impl From<PipelineError> for AppError {
    fn from(err: PipelineError) -> Self {
        let status = match &err {
            PipelineError::EmptyQuery | PipelineError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            PipelineError::NoKeywords | PipelineError::NoMatch => StatusCode::NOT_FOUND,
            PipelineError::ExternalService { .. } => StatusCode::SERVICE_UNAVAILABLE,
            PipelineError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        AppError::new(status, err.code(), err.to_string())
    }
}

impl From<RecordError> for AppError {
    fn from(err: RecordError) -> Self {
        match &err {
            RecordError::NotFound(_) => {
                AppError::new(StatusCode::NOT_FOUND, "not_found", err.to_string())
            }
            RecordError::Validation(_) => {
                AppError::new(StatusCode::BAD_REQUEST, "bad_request", err.to_string())
            }
            RecordError::Database(_) => AppError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal",
                err.to_string(),
            ),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::new(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::new(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text())
    }
}

/// Unwrap a JSON body, turning extractor rejections into the error contract.
fn body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload.map(|Json(v)| v).map_err(AppError::from)
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /ask ============

#[derive(Deserialize)]
struct AskRequest {
    question: String,
}

/// Expected misses (empty question, no keywords, no match) are 200s with a `status`.
async fn handle_ask(
    State(state): State<AppState>,
    payload: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, AppError> {
    let req = body(payload)?;
    let result = state.pipeline.answer(&req.question).await;
    Ok(Json(to_response(&req.question, result)?))
}

// ============ POST /stocks/compare ============

#[derive(Deserialize)]
struct CompareRequest {
    symbols: Vec<String>,
}

async fn handle_compare(
    State(state): State<AppState>,
    payload: Result<Json<CompareRequest>, JsonRejection>,
) -> Result<Json<StockComparison>, AppError> {
    let req = body(payload)?;
    Ok(Json(state.analyst.compare(&req.symbols).await?))
}

// ============ /api/profile ============

async fn handle_create_profile(
    State(state): State<AppState>,
    payload: Result<Json<ProfileInput>, JsonRejection>,
) -> Result<(StatusCode, Json<UserProfile>), AppError> {
    let input = body(payload)?;
    let profile = profiles::create_profile(&state.pool, &input).await?;
    Ok((StatusCode::CREATED, Json(profile)))
}

async fn handle_get_profile(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
) -> Result<Json<UserProfile>, AppError> {
    let Path(id) = id?;
    Ok(Json(profiles::get_profile(&state.pool, id).await?))
}

async fn handle_update_profile(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    payload: Result<Json<ProfileInput>, JsonRejection>,
) -> Result<Json<UserProfile>, AppError> {
    let Path(id) = id?;
    let input = body(payload)?;
    Ok(Json(profiles::update_profile(&state.pool, id, &input).await?))
}

// ============ /api/financial-goals ============

async fn handle_create_goal(
    State(state): State<AppState>,
    payload: Result<Json<GoalInput>, JsonRejection>,
) -> Result<(StatusCode, Json<FinancialGoal>), AppError> {
    let input = body(payload)?;
    let today = Utc::now().date_naive();
    let goal = goals::create_goal(&state.pool, &input, today).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

/// `{id}` is the owning user's profile id here, and a goal id on PUT/DELETE.
async fn handle_list_goals(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<FinancialGoal>>, AppError> {
    let user_id: i64 = id.parse().map_err(|_| {
        AppError::new(
            StatusCode::BAD_REQUEST,
            "bad_request",
            format!("user id must be an integer, got '{}'", id),
        )
    })?;
    Ok(Json(goals::list_goals(&state.pool, user_id).await?))
}

async fn handle_update_goal(
    State(state): State<AppState>,
    Path(goal_id): Path<String>,
    payload: Result<Json<GoalPatch>, JsonRejection>,
) -> Result<Json<FinancialGoal>, AppError> {
    let patch = body(payload)?;
    let today = Utc::now().date_naive();
    Ok(Json(
        goals::update_goal(&state.pool, &goal_id, &patch, today).await?,
    ))
}

async fn handle_delete_goal(
    State(state): State<AppState>,
    Path(goal_id): Path<String>,
) -> Result<StatusCode, AppError> {
    goals::delete_goal(&state.pool, &goal_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
