use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::Context;
use axum::{
    Json, Router,
    extract::{Path, Query, Request, State},
    http::{HeaderValue, StatusCode, header},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
};
use serde::{Deserialize, Serialize};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

use morsel_core::inference::{AnalysisResult, InferenceError, InferenceProvider};
use morsel_core::models::{
    AppStatus, Entry, EntryEdit, MacroEstimate, NumericInput, PortionUnit, Profile, TodaySummary,
    UserStats, WeeklyBucket, validate_meal_slot,
};
use morsel_core::tracker::{ReviewState, SubmitOutcome, Tracker};

const BODY_LIMIT: usize = 64 * 1024;

#[derive(Clone)]
struct AppState {
    tracker: Arc<Mutex<Tracker>>,
    provider: Arc<dyn InferenceProvider>,
    api_key: Option<String>,
}

impl AppState {
    fn tracker(&self) -> MutexGuard<'_, Tracker> {
        self.tracker.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run a blocking inference call off the async executor. The tracker lock
    /// is not held meanwhile.
    async fn infer(&self, text: String) -> Result<AnalysisResult, InferenceError> {
        let provider = Arc::clone(&self.provider);
        tokio::task::spawn_blocking(move || provider.infer(&text))
            .await
            .unwrap_or_else(|e| Err(InferenceError::Request(format!("inference task failed: {e}"))))
    }
}

// --- Request / Response types ---

#[derive(Deserialize)]
struct AnalyzeRequest {
    text: String,
    meal: Option<String>,
}

#[derive(Serialize)]
struct AnalyzeResponse {
    #[serde(flatten)]
    outcome: SubmitOutcome,
    status: AppStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    advice: Option<String>,
}

#[derive(Deserialize)]
struct RecalculateRequest {
    description: Option<String>,
    amount: Option<NumericInput>,
    unit: Option<PortionUnit>,
}

#[derive(Serialize)]
struct RecalculateResponse {
    estimate: MacroEstimate,
    review: ReviewState,
}

#[derive(Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

// --- Error handling ---

enum ApiError {
    NotFound(String),
    BadRequest(String),
    Conflict(String),
    BadGateway(String),
    Internal(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            Self::Conflict(msg) => (StatusCode::CONFLICT, msg),
            Self::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            Self::Internal(err) => {
                error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        match err.downcast::<InferenceError>() {
            Ok(inference) => Self::BadGateway(inference.to_string()),
            Err(other) => Self::Internal(other),
        }
    }
}

impl From<InferenceError> for ApiError {
    fn from(err: InferenceError) -> Self {
        Self::BadGateway(err.to_string())
    }
}

fn nothing_open() -> ApiError {
    ApiError::Conflict("No entry is open for review".to_string())
}

fn validate_stats(stats: &UserStats) -> Result<(), ApiError> {
    let positive = |v: f64| v.is_finite() && v > 0.0;
    if stats.age == 0 || !positive(stats.weight) || !positive(stats.height) {
        return Err(ApiError::BadRequest(
            "age, weight and height must be greater than 0".to_string(),
        ));
    }
    if !(1.0..=2.5).contains(&stats.activity_level) {
        return Err(ApiError::BadRequest(
            "activity_level must be between 1.0 and 2.5".to_string(),
        ));
    }
    if stats
        .weight_loss_per_month
        .is_some_and(|l| !l.is_finite() || l < 0.0)
    {
        return Err(ApiError::BadRequest(
            "weight_loss_per_month cannot be negative".to_string(),
        ));
    }
    Ok(())
}

// --- Middleware ---

async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    if let Some(ref expected_key) = state.api_key {
        let authorized = request
            .headers()
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.strip_prefix("Bearer "))
            .is_some_and(|token| token == expected_key);

        if !authorized {
            return (
                StatusCode::UNAUTHORIZED,
                Json(ErrorResponse {
                    error: "Invalid or missing API key".to_string(),
                }),
            )
                .into_response();
        }
    }
    next.run(request).await
}

async fn security_headers(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert(
        "x-content-type-options",
        HeaderValue::from_static("nosniff"),
    );
    headers.insert("x-frame-options", HeaderValue::from_static("DENY"));
    headers.insert(
        "content-security-policy",
        HeaderValue::from_static("default-src 'none'"),
    );
    response
}

// --- Handlers ---

async fn analyze(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> Result<Json<AnalyzeResponse>, ApiError> {
    let meal = req
        .meal
        .as_deref()
        .map(validate_meal_slot)
        .transpose()
        .map_err(|e| ApiError::BadRequest(format!("{e}")))?;

    let text = req.text.trim().to_string();
    if text.is_empty() {
        let tracker = state.tracker();
        return Ok(Json(AnalyzeResponse {
            outcome: SubmitOutcome::Ignored,
            status: tracker.status(),
            advice: None,
        }));
    }

    state.tracker().mark_loading();
    let result = state.infer(text).await;

    let mut tracker = state.tracker();
    match result {
        Ok(analysis) => {
            let outcome = tracker.apply_analysis(analysis, meal)?;
            Ok(Json(AnalyzeResponse {
                outcome,
                status: tracker.status(),
                advice: tracker.last_advice().map(str::to_string),
            }))
        }
        Err(err) => {
            tracker.record_failure(&err);
            Err(err.into())
        }
    }
}

async fn get_review(State(state): State<AppState>) -> Json<ReviewState> {
    Json(state.tracker().review_state())
}

async fn commit_review(
    State(state): State<AppState>,
    Json(edit): Json<EntryEdit>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let mut tracker = state.tracker();
    if tracker.current().is_none() {
        return Err(nothing_open());
    }
    let outcome = tracker.commit(&edit)?;
    let value = serde_json::to_value(outcome).context("failed to serialize commit")?;
    Ok(Json(value))
}

async fn skip_review(State(state): State<AppState>) -> Result<Json<ReviewState>, ApiError> {
    Ok(Json(state.tracker().skip()?))
}

async fn recalculate(
    State(state): State<AppState>,
    Json(req): Json<RecalculateRequest>,
) -> Result<Json<RecalculateResponse>, ApiError> {
    let request = {
        let tracker = state.tracker();
        if tracker.current().is_none() {
            return Err(nothing_open());
        }
        tracker
            .recalculation_request(
                req.description.as_deref(),
                req.amount.as_ref(),
                req.unit,
            )
            .map_err(|e| ApiError::BadRequest(format!("{e}")))?
    };

    let result = state.infer(request.query.clone()).await.inspect_err(|err| {
        warn!(error = %err, "recalculation failed");
    })?;

    let mut tracker = state.tracker();
    match tracker.apply_estimate(&request, &result)? {
        Some(estimate) => Ok(Json(RecalculateResponse {
            estimate,
            review: tracker.review_state(),
        })),
        None => Err(ApiError::Conflict(
            "The entry under review changed before the estimate arrived".to_string(),
        )),
    }
}

async fn edit_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ReviewState>, ApiError> {
    let mut tracker = state.tracker();
    if tracker.entries().iter().all(|e| e.id != id) {
        return Err(ApiError::NotFound(format!("Entry {id} not found")));
    }
    tracker
        .open_for_edit(&id)
        .map_err(|e| ApiError::Conflict(format!("{e}")))?;
    Ok(Json(tracker.review_state()))
}

async fn list_entries(
    State(state): State<AppState>,
    Query(params): Query<HistoryQuery>,
) -> Json<Vec<Entry>> {
    let tracker = state.tracker();
    Json(
        tracker
            .food_history(params.limit)
            .into_iter()
            .cloned()
            .collect(),
    )
}

/// Idempotent: deleting an unknown id is still a success.
async fn delete_entry(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.tracker().delete_entry(&id)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn today_summary(State(state): State<AppState>) -> Json<TodaySummary> {
    Json(state.tracker().today_summary())
}

async fn week_summary(State(state): State<AppState>) -> Json<Vec<WeeklyBucket>> {
    Json(state.tracker().weekly_breakdown())
}

async fn get_profile(State(state): State<AppState>) -> Result<Json<Profile>, ApiError> {
    state
        .tracker()
        .profile()
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("No profile set".to_string()))
}

async fn put_profile(
    State(state): State<AppState>,
    Json(stats): Json<UserStats>,
) -> Result<Json<Profile>, ApiError> {
    validate_stats(&stats)?;
    let profile = state.tracker().save_profile(stats)?;
    Ok(Json(profile))
}

// --- Router builder ---

fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/analyze", post(analyze))
        .route("/api/review", get(get_review))
        .route("/api/review/commit", post(commit_review))
        .route("/api/review/skip", post(skip_review))
        .route("/api/review/recalculate", post(recalculate))
        .route("/api/entries", get(list_entries))
        .route("/api/entries/{id}", delete(delete_entry))
        .route("/api/entries/{id}/edit", post(edit_entry))
        .route("/api/summary/today", get(today_summary))
        .route("/api/summary/week", get(week_summary))
        .route("/api/profile", get(get_profile).put(put_profile))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_auth))
        .layer(RequestBodyLimitLayer::new(BODY_LIMIT))
        .layer(middleware::from_fn(security_headers))
        .with_state(state)
}

// --- Server startup ---

pub async fn start_server<P: InferenceProvider + 'static>(
    tracker: Tracker,
    provider: P,
    port: u16,
    bind: &str,
    api_key: Option<String>,
) -> anyhow::Result<()> {
    if api_key.is_none() {
        warn!("Authentication disabled (--no-auth). API is open to anyone.");
        if bind != "127.0.0.1" && bind != "localhost" {
            eprintln!(
                "Warning: Listening on {bind} with no authentication. Any device on your network can access this API."
            );
        }
    }

    let state = AppState {
        tracker: Arc::new(Mutex::new(tracker)),
        provider: Arc::new(provider),
        api_key,
    };
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{bind}:{port}"))
        .await
        .with_context(|| format!("failed to bind {bind}:{port}"))?;
    info!("Listening on http://{bind}:{port}");
    eprintln!("Listening on http://{bind}:{port}");
    axum::serve(listener, app).await?;

    Ok(())
}
