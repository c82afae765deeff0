use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::errors::AppError;
use crate::models::crm::{EnrichedTask, Pipeline};
use crate::models::interpretation::QueryInterpretation;
use crate::{console, enrich, interpret, pipeline, AppState};

// ── Request / Response DTOs ──────────────────────────────────

#[derive(Deserialize)]
pub struct TenantParams {
    pub location_id: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
}

#[derive(Deserialize)]
pub struct TaskListParams {
    pub location_id: Option<String>,
    pub status: Option<String>,
    pub limit: Option<u32>,
}

#[derive(Deserialize)]
pub struct TaskQueryRequest {
    /// Free-text query, mapped through the configured interpreter.
    pub query: Option<String>,
    /// Pre-structured filters; takes precedence over `query`.
    pub interpretation: Option<QueryInterpretation>,
    pub location_id: Option<String>,
}

#[derive(Serialize)]
pub struct InitResponse {
    pub success: bool,
    pub auth_url: String,
    pub state: String,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub authenticated: bool,
    pub location_id: String,
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Serialize)]
pub struct PipelineSummary {
    pub id: String,
    pub name: String,
}

impl From<&Pipeline> for PipelineSummary {
    fn from(p: &Pipeline) -> Self {
        Self {
            id: p.id.clone(),
            name: p.name.clone(),
        }
    }
}

// ── Handlers ─────────────────────────────────────────────────

/// GET /oauth/init — start the authorization-code flow.
pub async fn oauth_init(
    State(state): State<Arc<AppState>>,
) -> Result<Json<InitResponse>, AppError> {
    let auth = state.oauth.begin_authorization()?;
    Ok(Json(InitResponse {
        success: true,
        auth_url: auth.authorization_url,
        state: auth.state,
    }))
}

/// GET /oauth/status — session view for a tenant. Never refreshes.
pub async fn oauth_status(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TenantParams>,
) -> Result<Json<StatusResponse>, AppError> {
    let tenant = resolve_tenant(&state, params.location_id)?;
    let status = state.oauth.get_status(&tenant).await?;
    Ok(Json(StatusResponse {
        authenticated: status.authenticated,
        location_id: status.tenant_id,
        expires_at: status.expires_at,
    }))
}

/// GET /oauth/callback — redeem the single-use code for a token record.
pub async fn oauth_callback(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CallbackParams>,
) -> Result<Json<Value>, AppError> {
    let code = params.code.as_deref().unwrap_or("");
    let record = state
        .oauth
        .complete_authorization(code, params.state.as_deref())
        .await?;
    Ok(Json(json!({
        "success": true,
        "location_id": record.tenant_id,
    })))
}

/// POST /oauth/refresh — exchange the stored refresh token.
pub async fn oauth_refresh(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TenantParams>,
) -> Result<Json<Value>, AppError> {
    let tenant = resolve_tenant(&state, params.location_id)?;
    let record = state.oauth.refresh(&tenant).await?;
    Ok(Json(json!({
        "success": true,
        "location_id": record.tenant_id,
        "expires_at": record.expires_at,
    })))
}

/// GET /pipelines — tenant's pipeline list, fetched fresh from the vendor.
pub async fn list_pipelines(
    State(state): State<Arc<AppState>>,
    Query(params): Query<TenantParams>,
) -> Result<Json<Value>, AppError> {
    let tenant = resolve_tenant(&state, params.location_id)?;
    let access_token = state.oauth.access_token(&tenant).await?;
    let pipelines = state.vendor.get_pipelines(&access_token, &tenant).await?;
    Ok(Json(json!({
        "success": true,
        "pipelines": pipelines,
    })))
}

/// GET /pipelines/:name/tasks — resolve the name, fetch, enrich.
pub async fn pipeline_tasks(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    Query(params): Query<TaskListParams>,
) -> Result<Json<Value>, AppError> {
    let tenant = resolve_tenant(&state, params.location_id)?;
    let access_token = state.oauth.access_token(&tenant).await?;

    let pipelines = state.vendor.get_pipelines(&access_token, &tenant).await?;
    let matched = pipeline::resolve(&name, &pipelines).map_err(|nf| {
        AppError::PipelineNotFound {
            query: nf.query,
            available: nf.available,
        }
    })?;

    let status = params.status.unwrap_or_else(|| "all".into());
    let outcome = state
        .fetcher
        .fetch_tasks_for_pipeline(
            &access_token,
            &tenant,
            &matched.id,
            &status,
            params.limit.unwrap_or(100),
        )
        .await?;

    Ok(Json(task_list_body(
        PipelineSummary::from(matched),
        outcome.opportunities.len(),
        outcome.tasks,
        outcome.source,
    )))
}

/// POST /tasks/query — interpreted task view: free text or a structured
/// interpretation, applied on top of the same fetch path.
pub async fn tasks_query(
    State(state): State<Arc<AppState>>,
    Json(req): Json<TaskQueryRequest>,
) -> Result<Json<Value>, AppError> {
    let interp = match (req.interpretation, req.query.as_deref()) {
        (Some(interp), _) => interp,
        (None, Some(query)) => state.interpreter.interpret(query).await?,
        (None, None) => {
            return Err(AppError::InvalidQuery(
                "provide either 'query' or 'interpretation'".into(),
            ))
        }
    };

    let tenant = resolve_tenant(&state, req.location_id)?;
    let access_token = state.oauth.access_token(&tenant).await?;

    let pipeline_name = interp
        .pipeline_name
        .clone()
        .unwrap_or_else(|| state.config.default_pipeline.clone());

    let pipelines = state.vendor.get_pipelines(&access_token, &tenant).await?;
    let matched = pipeline::resolve(&pipeline_name, &pipelines).map_err(|nf| {
        AppError::PipelineNotFound {
            query: nf.query,
            available: nf.available,
        }
    })?;

    let status = interp.status.map(|s| s.as_str()).unwrap_or("open");
    let outcome = state
        .fetcher
        .fetch_tasks_for_pipeline(&access_token, &tenant, &matched.id, status, 100)
        .await?;

    let filtered = interpret::apply_filters(&interp, outcome.opportunities);
    let tasks = console::dedupe_tasks(enrich::enrich(&filtered));

    let mut body = task_list_body(
        PipelineSummary::from(matched),
        filtered.len(),
        tasks,
        outcome.source,
    );
    body["interpretation"] = serde_json::to_value(&interp).map_err(anyhow::Error::from)?;
    Ok(Json(body))
}

// ── Helpers ──────────────────────────────────────────────────

fn resolve_tenant(state: &AppState, requested: Option<String>) -> Result<String, AppError> {
    requested
        .filter(|s| !s.is_empty())
        .or_else(|| state.config.default_location_id.clone())
        .ok_or_else(|| {
            AppError::InvalidQuery(
                "no location_id given and GHL_LOCATION_ID is not configured".into(),
            )
        })
}

fn task_list_body(
    pipeline: PipelineSummary,
    opportunities_count: usize,
    tasks: Vec<EnrichedTask>,
    source: &str,
) -> Value {
    let tasks_count = tasks.len();
    let mut body = json!({
        "success": true,
        "pipeline": pipeline,
        "opportunities_count": opportunities_count,
        "tasks_count": tasks_count,
        "tasks": tasks,
        "source": source,
    });
    if tasks_count == 0 {
        body["message"] = json!("No tasks found for the given criteria.");
    }
    body
}
