//! API route definitions.

use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::error::ApiError;
use super::state::AppState;
use crate::analytics::{AnalyticsError, Report};
use crate::incident::{
    IncidentDraft, IncidentFilter, IncidentPatch, IncidentUpdate, NewIncident, Severity,
    SnapshotProvider, Status,
};

/// Response header carrying the number of records a result had to skip.
pub const SKIPPED_HEADER: &str = "x-skipped-records";

const DEFAULT_LIST_LIMIT: usize = 100;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/incidents", get(list_incidents).post(create_incident))
        .route("/incidents/{id}", put(update_incident))
        .route("/analytics/summary", get(summary))
        .route("/analytics/heatmap", get(heatmap))
        .route("/analytics/clusters", get(clusters))
        .route("/analytics/trends", get(trends))
        .route("/analysis/buffer/{distance}", get(buffers))
}

/// Run `f` on the blocking pool under the configured timeout.
async fn blocking<T, E, F>(state: &AppState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(AppState) -> Result<T, E> + Send + 'static,
    T: Send + 'static,
    E: Into<ApiError> + Send + 'static,
{
    let owned = state.clone();
    let task = tokio::task::spawn_blocking(move || f(owned));
    match tokio::time::timeout(state.compute_timeout, task).await {
        Ok(joined) => joined?.map_err(Into::into),
        Err(_) => Err(ApiError::Timeout),
    }
}

fn with_skipped<T: Serialize>(report: Report<T>) -> Response {
    (
        [(SKIPPED_HEADER, report.skipped.to_string())],
        Json(report.body),
    )
        .into_response()
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn heatmap(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = blocking(&state, |s| s.engine.heatmap()).await?;
    Ok(with_skipped(report))
}

async fn clusters(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = blocking(&state, |s| s.engine.clusters()).await?;
    Ok(with_skipped(report))
}

async fn trends(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = blocking(&state, |s| s.engine.trends()).await?;
    Ok(with_skipped(report))
}

async fn summary(State(state): State<AppState>) -> Result<Response, ApiError> {
    let report = blocking(&state, |s| s.engine.summary()).await?;
    Ok(with_skipped(report))
}

async fn buffers(
    State(state): State<AppState>,
    Path(distance): Path<String>,
) -> Result<Response, ApiError> {
    let distance: f64 = distance
        .parse()
        .map_err(|_| AnalyticsError::InvalidParameter {
            name: "distance",
            reason: format!("`{distance}` is not a number of meters"),
        })?;
    let report = blocking(&state, move |s| s.engine.buffers(distance)).await?;
    Ok(with_skipped(report))
}

#[derive(Debug, Default, Deserialize)]
struct ListParams {
    #[serde(rename = "type")]
    kind: Option<String>,
    status: Option<String>,
    severity: Option<String>,
    limit: Option<usize>,
}

impl TryFrom<ListParams> for IncidentFilter {
    type Error = ApiError;

    fn try_from(params: ListParams) -> Result<Self, Self::Error> {
        let mut filter = IncidentFilter::all().with_limit(params.limit.unwrap_or(DEFAULT_LIST_LIMIT));
        if let Some(kind) = params.kind.filter(|k| !k.is_empty()) {
            filter = filter.with_kind(kind);
        }
        if let Some(status) = params.status.filter(|s| !s.is_empty()) {
            filter = filter.with_status(status.parse::<Status>()?);
        }
        if let Some(severity) = params.severity.filter(|s| !s.is_empty()) {
            filter = filter.with_severity(severity.parse::<Severity>()?);
        }
        Ok(filter)
    }
}

async fn list_incidents(
    State(state): State<AppState>,
    params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Response, ApiError> {
    let Query(params) = params.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let filter = IncidentFilter::try_from(params)?;
    let snapshot = blocking(&state, move |s| s.store.fetch_incidents(&filter)).await?;
    Ok(with_skipped(Report::new(snapshot.incidents, snapshot.skipped)))
}

async fn create_incident(
    State(state): State<AppState>,
    body: Result<Json<IncidentDraft>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(draft) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let incident = NewIncident::try_from(draft)?;
    let id = blocking(&state, move |s| s.store.create(&incident)).await?;
    Ok((
        StatusCode::CREATED,
        Json(json!({ "id": id, "message": "Incident created successfully" })),
    )
        .into_response())
}

async fn update_incident(
    State(state): State<AppState>,
    id: Result<Path<i64>, PathRejection>,
    body: Result<Json<IncidentPatch>, JsonRejection>,
) -> Result<Json<Value>, ApiError> {
    let Path(id) = id.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let Json(patch) = body.map_err(|e| ApiError::BadRequest(e.body_text()))?;
    let update = IncidentUpdate::try_from(patch)?;
    blocking(&state, move |s| s.store.update(id, &update)).await?;
    Ok(Json(json!({ "message": "Incident updated successfully" })))
}
