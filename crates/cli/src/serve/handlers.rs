//! Route handlers: health, latest, rollup, dashboards.

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crm_core::{has_role, resolve_latest, Entity, Interaction};
use crm_eval::{
    dashboard, dashboards, evaluate, CalendarDate, DateFilter, MetricSet, RollupReport,
    RollupRequest, Schema,
};
use crm_storage::Paginator;

use super::error::ApiError;
use super::middleware::Caller;
use super::state::AppState;

/// `{"success": true, "data": ...}`
fn ok<T: Serialize>(data: T) -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({"success": true, "data": data})),
    )
        .into_response()
}

/// Decode a JSON body, reporting shape errors in the standard envelope.
fn decode<T: serde::de::DeserializeOwned>(body: Value) -> Result<T, ApiError> {
    serde_json::from_value(body).map_err(|e| ApiError::BadRequest(format!("invalid body: {}", e)))
}

fn log_diagnostics(report: &RollupReport) {
    for d in &report.diagnostics {
        tracing::warn!(
            entity_id = %d.entity_id,
            metric = %d.metric,
            cause = %d.cause,
            "entity excluded from metric"
        );
    }
}

/// Fallback handler for unmatched routes.
pub(crate) async fn handle_not_found() -> impl IntoResponse {
    ApiError::NotFound
}

/// GET /health
pub(crate) async fn handle_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let dataset = state.store.dataset();
    ok(serde_json::json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "entities": dataset.entities.len(),
        "interactions": dataset.interactions.len(),
    }))
}

#[derive(Deserialize)]
struct LatestBody {
    interactions: Vec<Interaction>,
}

/// POST /latest
pub(crate) async fn handle_latest(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let body: LatestBody = decode(body)?;
    let latest = resolve_latest(&body.interactions);
    Ok(ok(latest))
}

#[derive(Deserialize)]
struct RollupBody {
    #[serde(default)]
    entities: Vec<Entity>,
    #[serde(default)]
    interactions: Vec<Interaction>,
    metrics: MetricSet,
    #[serde(default)]
    date_filter: Option<DateFilter>,
    #[serde(default)]
    select: Vec<String>,
    #[serde(default)]
    schema: Option<Schema>,
}

/// POST /rollup
pub(crate) async fn handle_rollup(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let Json(body) = body?;
    let body: RollupBody = decode(body)?;
    let metrics = if body.select.is_empty() {
        body.metrics
    } else {
        body.metrics.restrict(&body.select)?
    };
    let report = evaluate(RollupRequest {
        entities: &body.entities,
        interactions: &body.interactions,
        metrics: &metrics,
        date_filter: body.date_filter.as_ref(),
        schema: body.schema.as_ref(),
    })?;
    log_diagnostics(&report);
    Ok(ok(report))
}

/// GET /dashboards
pub(crate) async fn handle_list_dashboards() -> impl IntoResponse {
    let list: Vec<Value> = dashboards()
        .iter()
        .map(|d| {
            serde_json::json!({
                "name": d.name,
                "min_role": d.min_role,
                "metrics": d.metrics.metrics.keys().collect::<Vec<_>>(),
            })
        })
        .collect();
    ok(serde_json::json!({ "dashboards": list }))
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct DashboardQuery {
    from: Option<String>,
    to: Option<String>,
    /// Comma-separated metric names.
    select: Option<String>,
}

impl DashboardQuery {
    fn date_filter(&self) -> Result<Option<DateFilter>, ApiError> {
        let (from, to) = match (&self.from, &self.to) {
            (None, None) => return Ok(None),
            (Some(f), Some(t)) => (f, t),
            _ => {
                return Err(ApiError::BadRequest(
                    "'from' and 'to' must be given together".to_string(),
                ))
            }
        };
        let parse = |raw: &str| raw.parse::<CalendarDate>().map_err(ApiError::BadRequest);
        Ok(Some(DateFilter::new(parse(from)?.0, parse(to)?.0)))
    }

    fn select(&self) -> Vec<String> {
        self.select
            .as_deref()
            .unwrap_or("")
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }
}

/// GET /dashboards/{name}
pub(crate) async fn handle_dashboard(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    query: Result<Query<DashboardQuery>, QueryRejection>,
    Caller(principal): Caller,
) -> Result<Response, ApiError> {
    let Query(query) = query?;
    let board = dashboard(&name)?;
    if !has_role(&principal, board.min_role) {
        return Err(ApiError::Forbidden {
            required: board.min_role.to_string(),
        });
    }
    let select = query.select();
    let metrics = if select.is_empty() {
        board.metrics
    } else {
        board.metrics.restrict(&select)?
    };
    let filter = query.date_filter()?;

    let scope = principal.scope();
    let entities = Paginator::<_, Entity>::new(&state.store, scope.clone(), state.page_size)?
        .collect_all()
        .await?;
    let interactions = Paginator::<_, Interaction>::new(&state.store, scope, state.page_size)?
        .collect_all()
        .await?;

    let report = evaluate(RollupRequest {
        entities: &entities,
        interactions: &interactions,
        metrics: &metrics,
        date_filter: filter.as_ref(),
        schema: None,
    })?;
    tracing::info!(
        dashboard = board.name,
        principal = %principal.id,
        entities = entities.len(),
        "dashboard served"
    );
    log_diagnostics(&report);
    Ok(ok(serde_json::json!({
        "dashboard": board.name,
        "report": report,
    })))
}
