//! API route handlers for the gateway.
//!
//! Callers identify themselves with the `X-User-Id` header; every lookup is
//! scoped to that owner. Auth/token machinery lives in front of this service.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;

use chancast_core::ChanCastError;
use chancast_core::types::TaskKind;
use chancast_scheduler::schedules::ScheduleIn;
use chancast_scheduler::{AppContext, schedules, tasks};

use crate::server::ApiError;

type ApiResult = Result<Json<serde_json::Value>, ApiError>;

/// Pull the owner id out of the X-User-Id header.
fn owner_id(headers: &HeaderMap) -> Result<i64, ApiError> {
    headers
        .get("X-User-Id")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.parse().ok())
        .ok_or_else(|| {
            ApiError(ChanCastError::InvalidArgument(
                "missing or invalid X-User-Id header".into(),
            ))
        })
}

/// Health check endpoint.
pub async fn health(State(ctx): State<Arc<AppContext>>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "ok",
        "service": "chancast-gateway",
        "version": env!("CARGO_PKG_VERSION"),
        "sessions_online": ctx.registry.online_count().await,
    }))
}

// ─── Accounts ─────────────────────────────────────────────

#[derive(Deserialize)]
pub struct AccountIn {
    #[serde(default)]
    pub tid: i64,
    pub username: String,
    pub phone: String,
}

pub async fn create_account(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<AccountIn>,
) -> ApiResult {
    let user_id = owner_id(&headers)?;
    if body.phone.is_empty() || body.username.is_empty() {
        return Err(ApiError(ChanCastError::InvalidArgument(
            "username and phone are required".into(),
        )));
    }
    let account = ctx
        .db
        .create_account(user_id, body.tid, &body.username, &body.phone)?;
    Ok(Json(serde_json::json!({ "ok": true, "account": account })))
}

pub async fn list_accounts(State(ctx): State<Arc<AppContext>>, headers: HeaderMap) -> ApiResult {
    let user_id = owner_id(&headers)?;
    let accounts = ctx.db.list_accounts(user_id)?;
    Ok(Json(serde_json::json!({ "ok": true, "accounts": accounts })))
}

/// Connect an account's session. The outcome is a boolean, not an error —
/// an unauthorized session file is a state the caller must resolve.
pub async fn connect_account(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let user_id = owner_id(&headers)?;
    let account = ctx.db.get_account(id)?;
    if account.user_id != user_id {
        return Err(ApiError(ChanCastError::NotFound(format!("account {id}"))));
    }

    let connected = ctx.registry.connect(&account.session_name).await;
    if connected {
        ctx.db.set_account_authenticated(account.id, true)?;
        ctx.db.set_account_online(account.id, true)?;
    }
    Ok(Json(serde_json::json!({ "ok": true, "connected": connected })))
}

pub async fn disconnect_account(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let user_id = owner_id(&headers)?;
    let account = ctx.db.get_account(id)?;
    if account.user_id != user_id {
        return Err(ApiError(ChanCastError::NotFound(format!("account {id}"))));
    }

    ctx.registry.remove(&account.session_name).await;
    ctx.db.set_account_online(account.id, false)?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ─── Channels ─────────────────────────────────────────────

pub async fn list_channels(State(ctx): State<Arc<AppContext>>, headers: HeaderMap) -> ApiResult {
    let user_id = owner_id(&headers)?;
    let channels = ctx.db.list_channels(user_id)?;
    Ok(Json(serde_json::json!({ "ok": true, "channels": channels })))
}

// ─── Tasks ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct TaskIn {
    pub title: String,
    pub kind: String,
    pub args: serde_json::Value,
}

pub async fn create_task(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<TaskIn>,
) -> ApiResult {
    let user_id = owner_id(&headers)?;
    let kind = TaskKind::parse(&body.kind)?;
    let task = tasks::create_task(&ctx, user_id, &body.title, kind, body.args).await?;
    Ok(Json(serde_json::json!({ "ok": true, "task": task })))
}

pub async fn start_task(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let user_id = owner_id(&headers)?;
    let task = tasks::start_task(&ctx, user_id, id).await?;
    Ok(Json(serde_json::json!({ "ok": true, "task": task })))
}

pub async fn get_task(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let user_id = owner_id(&headers)?;
    let task = ctx.db.get_task_scoped(id, user_id)?;
    Ok(Json(serde_json::json!({ "ok": true, "task": task })))
}

pub async fn list_tasks(State(ctx): State<Arc<AppContext>>, headers: HeaderMap) -> ApiResult {
    let user_id = owner_id(&headers)?;
    let task_list = ctx.db.list_tasks(user_id)?;
    Ok(Json(serde_json::json!({ "ok": true, "tasks": task_list })))
}

pub async fn delete_task(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let user_id = owner_id(&headers)?;
    tasks::delete_task(&ctx, user_id, id).await?;
    Ok(Json(serde_json::json!({ "ok": true })))
}

// ─── Schedules ────────────────────────────────────────────

pub async fn create_schedule(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Json(body): Json<ScheduleIn>,
) -> ApiResult {
    let user_id = owner_id(&headers)?;
    let schedule = schedules::create_schedule(&ctx, user_id, body).await?;
    Ok(Json(serde_json::json!({ "ok": true, "schedule": schedule })))
}

pub async fn list_schedules(State(ctx): State<Arc<AppContext>>, headers: HeaderMap) -> ApiResult {
    let user_id = owner_id(&headers)?;
    let schedule_list = ctx.db.list_schedules(user_id)?;
    Ok(Json(serde_json::json!({ "ok": true, "schedules": schedule_list })))
}

pub async fn start_schedule(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let user_id = owner_id(&headers)?;
    schedules::start_schedule(&ctx, user_id, id).await?;
    Ok(Json(serde_json::json!({ "ok": true, "schedule_id": id })))
}

pub async fn stop_schedule(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let user_id = owner_id(&headers)?;
    schedules::stop_schedule(&ctx, user_id, id).await?;
    Ok(Json(serde_json::json!({ "ok": true, "schedule_id": id })))
}

/// Resume is start: the scheduler resumes an existing job by id.
pub async fn resume_schedule(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let user_id = owner_id(&headers)?;
    schedules::start_schedule(&ctx, user_id, id).await?;
    Ok(Json(serde_json::json!({ "ok": true, "schedule_id": id })))
}

pub async fn delete_schedule(
    State(ctx): State<Arc<AppContext>>,
    headers: HeaderMap,
    Path(id): Path<i64>,
) -> ApiResult {
    let user_id = owner_id(&headers)?;
    schedules::delete_schedule(&ctx, user_id, id).await?;
    Ok(Json(serde_json::json!({ "ok": true, "schedule_id": id })))
}
