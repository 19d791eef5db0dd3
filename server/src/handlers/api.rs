// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! JSON endpoints sharing the browser session cookie.
use crate::auth::ApiUser;
use crate::database::{StoreError, tasks};
use crate::state::AppState;

use axum::{
    extract::{Json, Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use chrono::Utc;
use common::{FormErrors, Task, TaskForm, TaskQuery};
use tracing::{debug, error, info};

/// Handler for listing the caller's tasks with the same filters as `/tasks`.
pub async fn list_tasks(
    State(state): State<AppState>,
    ApiUser(current): ApiUser,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let found =
        tasks::search_tasks_in_db(&state.pool, current.user.id, &query.search(), query.order())
            .await?;
    info!("Successfully retrieved {} tasks.", found.len());
    Ok(Json(found))
}

/// Handler for creating a new task.
pub async fn create_task(
    State(state): State<AppState>,
    ApiUser(current): ApiUser,
    payload: Result<Json<TaskForm>, JsonRejection>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    let Json(form) = payload.map_err(|rejection| {
        let mut errors = FormErrors::new();
        errors.add("base", rejection.body_text());
        ApiError::Invalid(errors)
    })?;
    debug!("Received request to create task: {}", form.title);

    match tasks::create_task_in_db(&state.pool, current.user.id, &form, Utc::now()).await {
        Ok(task) => {
            info!("Task created successfully with ID: {}", task.id);
            Ok((StatusCode::CREATED, Json(task)))
        }
        Err(StoreError::Invalid(errors)) => {
            error!("Validation failed: {}", errors);
            Err(ApiError::Invalid(errors))
        }
        Err(StoreError::Database(err)) => Err(err.into()),
    }
}

/// Handler for deleting a task by ID.
pub async fn delete_task(
    State(state): State<AppState>,
    ApiUser(current): ApiUser,
    Path(task_id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    debug!("Attempting to delete task with ID: {}", task_id);

    let visible = tasks::get_task_from_db(&state.pool, task_id)
        .await?
        .is_some_and(|task| task.is_visible_to(current.user.id) || current.is_admin());

    if visible && tasks::delete_task_from_db(&state.pool, task_id).await? {
        info!("Task with ID {} deleted successfully.", task_id);
        Ok(StatusCode::NO_CONTENT)
    } else {
        error!("Task with ID {} not found for deletion.", task_id);
        Err(ApiError::new(
            StatusCode::NOT_FOUND,
            &format!("Task with ID {task_id} not found for deletion."),
        ))
    }
}

/// Error returned by the JSON handlers.
#[derive(Debug)]
pub enum ApiError {
    Status { code: StatusCode, message: String },
    Invalid(FormErrors),
}

impl ApiError {
    fn new(code: StatusCode, message: &str) -> Self {
        Self::Status {
            code,
            message: message.to_string(),
        }
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal server error: {:?}", err);
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred.")
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            Self::Status { code, message } => {
                let body = Json(serde_json::json!({ "error": message }));
                (code, body).into_response()
            }
            Self::Invalid(errors) => {
                let body = Json(serde_json::json!({ "errors": errors.to_map() }));
                (StatusCode::UNPROCESSABLE_ENTITY, body).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_invalid_renders_errors_map() {
        let mut errors = FormErrors::new();
        errors.add("title", "can't be blank");
        let response = ApiError::Invalid(errors).into_response();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["errors"]["title"][0], "can't be blank");
    }

    #[test]
    fn test_internal_error_hides_details() {
        let response = ApiError::from(anyhow::anyhow!("disk full")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
