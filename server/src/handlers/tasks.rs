// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::auth::CurrentUser;
use crate::database::{StoreError, labels, tasks, users};
use crate::forms::{FormPairs, TaskFormInput};
use crate::handlers::{Action, AppError, message, redirect_to, unprocessable};
use crate::state::AppState;
use crate::views::{self, Choice, TaskView};

use axum::{
    extract::{Form, Path, Query, State},
    response::{Html, Response},
};
use chrono::Utc;
use common::{FormErrors, Task, TaskQuery};
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::{debug, info};

/// Search and sort values echoed back into the listing form.
#[derive(Serialize)]
struct SearchView {
    title: String,
    status: String,
    priority: String,
    sort: String,
    direction: String,
}

impl SearchView {
    fn new(query: &TaskQuery) -> Self {
        let search = query.search();
        let order = query.order();
        let explicit_sort = query.sort.as_deref().is_some_and(|s| !s.trim().is_empty());
        Self {
            title: search.title.unwrap_or_default(),
            status: search.status.map(|s| s.as_str().to_string()).unwrap_or_default(),
            priority: search
                .priority
                .map(|p| p.as_str().to_string())
                .unwrap_or_default(),
            sort: if explicit_sort { order.column.as_str().to_string() } else { String::new() },
            direction: if explicit_sort { order.direction.as_str().to_string() } else { String::new() },
        }
    }
}

/// Loads a task and checks that `current` may see it.
async fn find_visible_task(
    pool: &SqlitePool,
    current: &CurrentUser,
    task_id: i64,
) -> Result<Task, AppError> {
    match tasks::get_task_from_db(pool, task_id).await? {
        Some(task) if task.is_visible_to(current.user.id) || current.is_admin() => Ok(task),
        _ => Err(AppError::not_found(&format!("Task {task_id}"))),
    }
}

async fn render_form(
    state: &AppState,
    current: &CurrentUser,
    task_id: Option<i64>,
    form: &TaskFormInput,
    errors: &FormErrors,
) -> Result<Html<String>, AppError> {
    let assignees: Vec<Choice> = users::list_users_from_db(&state.pool)
        .await?
        .into_iter()
        .map(|u| Choice {
            value: u.id.to_string(),
            label: u.name,
        })
        .collect();

    let mut context = views::page_context(Some(current), None);
    context.insert("task_id", &task_id);
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("statuses", &views::status_choices());
    context.insert("priorities", &views::priority_choices());
    context.insert("users", &assignees);
    context.insert("labels", &labels::list_labels_from_db(&state.pool).await?);
    Ok(views::render("tasks/form.html", &context)?)
}

/// Handler for the task listing with search, sort and expiry alert.
pub async fn index(
    State(state): State<AppState>,
    current: CurrentUser,
    Query(query): Query<TaskQuery>,
) -> Result<Html<String>, AppError> {
    let now = Utc::now();
    let search = query.search();
    let order = query.order();

    let found = tasks::search_tasks_in_db(&state.pool, current.user.id, &search, order).await?;
    let expired = tasks::get_expired_tasks_from_db(&state.pool, current.user.id, now).await?;
    info!(
        "Retrieved {} tasks ({} expired) for user {}.",
        found.len(),
        expired.len(),
        current.user.id
    );

    let flash = state.sessions.take_flash(&current.token);
    let mut context = views::page_context(Some(&current), flash);
    context.insert("tasks", &TaskView::list(&found, now));
    context.insert("expired", &TaskView::list(&expired, now));
    context.insert("search", &SearchView::new(&query));
    context.insert("statuses", &views::status_choices());
    context.insert("priorities", &views::priority_choices());
    Ok(views::render("tasks/index.html", &context)?)
}

pub async fn show(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(task_id): Path<i64>,
) -> Result<Html<String>, AppError> {
    let task = find_visible_task(&state.pool, &current, task_id).await?;
    let assignee = match task.user_id {
        Some(user_id) => users::get_user_from_db(&state.pool, user_id)
            .await?
            .map(|u| u.name),
        None => None,
    };

    let flash = state.sessions.take_flash(&current.token);
    let mut context = views::page_context(Some(&current), flash);
    context.insert("task", &TaskView::new(&task, Utc::now()));
    context.insert("assignee", &assignee);
    Ok(views::render("tasks/show.html", &context)?)
}

pub async fn new(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Html<String>, AppError> {
    let form = TaskFormInput {
        status: "todo".to_string(),
        priority: "medium".to_string(),
        ..TaskFormInput::default()
    };
    render_form(&state, &current, None, &form, &FormErrors::new()).await
}

/// Handler for creating a new task owned by the signed-in user.
pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(pairs): Form<FormPairs>,
) -> Result<Response, AppError> {
    let input = TaskFormInput::from_pairs(&pairs);
    let (form, mut errors) = input.parse();
    debug!("Received request to create task: {}", form.title);

    if errors.is_empty() {
        match tasks::create_task_in_db(&state.pool, current.user.id, &form, Utc::now()).await {
            Ok(task) => {
                info!("Task created successfully with ID: {}", task.id);
                state
                    .sessions
                    .set_flash(&current.token, message("Task", Action::Create));
                return Ok(redirect_to("/tasks"));
            }
            Err(StoreError::Invalid(invalid)) => errors.merge(invalid),
            Err(StoreError::Database(err)) => return Err(err.into()),
        }
    } else {
        errors.merge_missing(form.check(Utc::now()));
    }

    debug!("Task form rejected: {}", errors);
    let page = render_form(&state, &current, None, &input, &errors).await?;
    Ok(unprocessable(page))
}

pub async fn edit(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(task_id): Path<i64>,
) -> Result<Html<String>, AppError> {
    let task = find_visible_task(&state.pool, &current, task_id).await?;
    let form = TaskFormInput::from_task(&task);
    render_form(&state, &current, Some(task_id), &form, &FormErrors::new()).await
}

/// Handler for updating a task. Validation, including the deadline rule,
/// runs again on every save.
pub async fn update(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(task_id): Path<i64>,
    Form(pairs): Form<FormPairs>,
) -> Result<Response, AppError> {
    find_visible_task(&state.pool, &current, task_id).await?;
    let input = TaskFormInput::from_pairs(&pairs);
    let (form, mut errors) = input.parse();

    if errors.is_empty() {
        match tasks::update_task_in_db(&state.pool, task_id, &form, Utc::now()).await {
            Ok(Some(task)) => {
                state
                    .sessions
                    .set_flash(&current.token, message("Task", Action::Update));
                return Ok(redirect_to(&format!("/tasks/{}", task.id)));
            }
            Ok(None) => return Err(AppError::not_found(&format!("Task {task_id}"))),
            Err(StoreError::Invalid(invalid)) => errors.merge(invalid),
            Err(StoreError::Database(err)) => return Err(err.into()),
        }
    } else {
        errors.merge_missing(form.check(Utc::now()));
    }

    let page = render_form(&state, &current, Some(task_id), &input, &errors).await?;
    Ok(unprocessable(page))
}

/// Handler for deleting a task by ID.
pub async fn delete(
    State(state): State<AppState>,
    current: CurrentUser,
    Path(task_id): Path<i64>,
) -> Result<Response, AppError> {
    find_visible_task(&state.pool, &current, task_id).await?;
    if !tasks::delete_task_from_db(&state.pool, task_id).await? {
        return Err(AppError::not_found(&format!("Task {task_id}")));
    }
    state
        .sessions
        .set_flash(&current.token, message("Task", Action::Delete));
    Ok(redirect_to("/tasks"))
}
