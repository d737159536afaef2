use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use service::scheduler::ScheduledTask;
use service::tasks::{TaskError, MAIL_NOW, PROCESS_USER_REGISTRATION};
use tracing::{error, info};

use crate::extract::ValidJson;
use crate::state::ServerState;

const REGISTRATION_DELAY: Duration = Duration::from_secs(30);

fn queue_failure(e: TaskError) -> Response {
    error!(error = %e, "failed to queue task");
    let body = json!({
        "error": "Failed to queue task",
        "details": e.to_string(),
        "note": "Make sure the broker is reachable and a worker and scheduler are running",
    });
    (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
}

#[utoipa::path(
    get, path = "/api/v1/tasks/process-user-registration", tag = "tasks",
    responses(
        (status = 200, description = "Queued now and scheduled for 30s later"),
        (status = 500, description = "Failed to queue task")
    ),
    security(("bearer" = []))
)]
pub async fn process_user_registration(State(state): State<ServerState>) -> Response {
    let data = json!({ "user_id": 1, "email": "test@example.com" });
    let now = match state.invoker.invoke(PROCESS_USER_REGISTRATION, data.clone(), None).await {
        Ok(out) => out,
        Err(e) => return queue_failure(e),
    };
    let later = match state.invoker.invoke(PROCESS_USER_REGISTRATION, data, Some(REGISTRATION_DELAY)).await {
        Ok(out) => out,
        Err(e) => return queue_failure(e),
    };
    let schedule_id = match &later {
        service::tasks::InvokeOutcome::Scheduled { schedule_id, .. } => Some(schedule_id.clone()),
        service::tasks::InvokeOutcome::Queued { .. } => None,
    };
    Json(json!({
        "message": "Task queued immediately and scheduled for 30s later",
        "task_id": now.task_id(),
        "scheduled_task_id": later.task_id(),
        "schedule_id": schedule_id,
    }))
    .into_response()
}

#[utoipa::path(
    get, path = "/api/v1/tasks/add-schedule-task", tag = "tasks",
    responses((status = 200, description = "Add-schedule envelope", body = crate::openapi::AddScheduleDoc)),
    security(("bearer" = []))
)]
pub async fn add_schedule_task(State(state): State<ServerState>) -> Response {
    let task = ScheduledTask::new(MAIL_NOW).with_cron("*/1 * * * *").with_label("task-type", "schedule");
    let result = state.scheduler.add_scheduled_task(task).await;
    Json(result).into_response()
}

/// Body of `POST /api/v1/tasks/schedules`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewScheduleRequest {
    pub task_name: String,
    #[serde(default)]
    pub schedule_id: Option<String>,
    #[serde(default)]
    pub cron: Option<String>,
    #[serde(default)]
    pub time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub interval: Option<u64>,
    #[serde(default)]
    pub labels: Map<String, Value>,
    #[serde(default)]
    pub args: Vec<Value>,
    #[serde(default)]
    pub kwargs: Map<String, Value>,
    #[serde(default)]
    pub task_id: Option<String>,
}

impl From<NewScheduleRequest> for ScheduledTask {
    fn from(r: NewScheduleRequest) -> Self {
        let mut task = ScheduledTask::new(r.task_name).with_args(r.args).with_kwargs(r.kwargs);
        task.labels = r.labels;
        task.cron = r.cron.filter(|c| !c.trim().is_empty());
        task.time = r.time;
        task.interval = r.interval;
        task.task_id = r.task_id;
        if let Some(id) = r.schedule_id.filter(|s| !s.trim().is_empty()) {
            task = task.with_schedule_id(id);
        }
        task
    }
}

#[utoipa::path(
    post, path = "/api/v1/tasks/schedules", tag = "tasks",
    request_body = crate::openapi::ScheduleBody,
    responses(
        (status = 201, description = "Schedule registered", body = crate::openapi::AddScheduleDoc),
        (status = 400, description = "Schedule rejected", body = crate::openapi::AddScheduleDoc)
    ),
    security(("bearer" = []))
)]
pub async fn create_schedule(
    State(state): State<ServerState>,
    ValidJson(body): ValidJson<NewScheduleRequest>,
) -> Response {
    let result = state.scheduler.add_scheduled_task(body.into()).await;
    let status = if result.success { StatusCode::CREATED } else { StatusCode::BAD_REQUEST };
    (status, Json(result)).into_response()
}

#[utoipa::path(
    get, path = "/api/v1/tasks/schedule-list", tag = "tasks",
    responses((status = 200, description = "List envelope"), (status = 500, description = "Source unavailable")),
    security(("bearer" = []))
)]
pub async fn schedule_list(State(state): State<ServerState>) -> Response {
    let result = state.scheduler.list_scheduled_tasks().await;
    let status = if result.success { StatusCode::OK } else { StatusCode::INTERNAL_SERVER_ERROR };
    (status, Json(result)).into_response()
}

#[utoipa::path(
    get, path = "/api/v1/tasks/schedule-get/{schedule_id}", tag = "tasks",
    params(("schedule_id" = String, Path, description = "Schedule id")),
    responses((status = 200, description = "Get envelope; success is false when the id is unknown")),
    security(("bearer" = []))
)]
pub async fn schedule_get(State(state): State<ServerState>, Path(schedule_id): Path<String>) -> Response {
    Json(state.scheduler.get_scheduled_task(&schedule_id).await).into_response()
}

#[utoipa::path(
    delete, path = "/api/v1/tasks/schedule-remove/{schedule_id}", tag = "tasks",
    params(("schedule_id" = String, Path, description = "Schedule id")),
    responses((status = 200, description = "Remove envelope; success is false when the id is unknown")),
    security(("bearer" = []))
)]
pub async fn schedule_remove(State(state): State<ServerState>, Path(schedule_id): Path<String>) -> Response {
    let result = state.scheduler.remove_scheduled_task(&schedule_id).await;
    info!(schedule_id = %schedule_id, success = result.success, "schedule remove requested");
    Json(result).into_response()
}

#[utoipa::path(
    delete, path = "/api/v1/tasks/schedule-clear-all", tag = "tasks",
    responses((status = 200, description = "Clear envelope"), (status = 500, description = "Source unavailable")),
    security(("bearer" = []))
)]
pub async fn schedule_clear_all(State(state): State<ServerState>) -> Response {
    let result = state.scheduler.clear_all_scheduled_tasks().await;
    let status = if result.success { StatusCode::OK } else { StatusCode::INTERNAL_SERVER_ERROR };
    (status, Json(result)).into_response()
}

#[utoipa::path(
    get, path = "/api/v1/tasks/schedule-count", tag = "tasks",
    responses((status = 200, description = "Number of dynamic schedules"), (status = 500, description = "Source unavailable")),
    security(("bearer" = []))
)]
pub async fn schedule_count(State(state): State<ServerState>) -> Response {
    match state.scheduler.get_scheduled_task_count().await {
        Ok(count) => Json(json!({
            "success": true,
            "message": format!("Currently have {count} scheduled tasks"),
            "count": count,
        }))
        .into_response(),
        Err(e) => {
            error!(error = %e, "schedule count failed");
            let body = json!({
                "success": false,
                "message": format!("Failed to get scheduled task count: {e}"),
                "count": 0,
            });
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_schedule_request_maps_onto_task() {
        let req: NewScheduleRequest = serde_json::from_value(json!({
            "task_name": "heartbeat",
            "schedule_id": "hb",
            "interval": 15,
            "labels": {"owner": "ops"},
        }))
        .unwrap();
        let task = ScheduledTask::from(req);
        assert_eq!(task.schedule_id, "hb");
        assert_eq!(task.interval, Some(15));
        assert_eq!(task.labels["owner"], "ops");
        assert!(task.cron.is_none());
        assert!(task.validate().is_ok());
    }

    #[test]
    fn blank_schedule_id_gets_generated() {
        let req: NewScheduleRequest =
            serde_json::from_value(json!({"task_name": "mail_now", "schedule_id": " ", "cron": "* * * * *"})).unwrap();
        let task = ScheduledTask::from(req);
        assert_eq!(task.schedule_id.len(), 32);
    }
}
