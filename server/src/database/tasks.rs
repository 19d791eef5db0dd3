// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::database::{StoreError, labels, timestamp, users};

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use common::{FormErrors, SortColumn, SortDirection, Task, TaskForm, TaskOrder, TaskSearch};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, info};

const TASK_COLUMNS: &str =
    "id, title, description, status, priority, deadline, user_id, owner_id, created_at, updated_at";

/// Escapes LIKE wildcards so user input matches literally.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

fn push_order(query: &mut QueryBuilder<'_, Sqlite>, order: TaskOrder) {
    let direction = match order.direction {
        SortDirection::Asc => "ASC",
        SortDirection::Desc => "DESC",
    };
    match order.column {
        SortColumn::Deadline => {
            query.push(format!(" ORDER BY deadline {direction} NULLS LAST, id ASC"));
        }
        SortColumn::Priority => {
            query.push(format!(" ORDER BY priority {direction}, id ASC"));
        }
        SortColumn::CreatedAt => {
            query.push(format!(" ORDER BY created_at {direction}, id {direction}"));
        }
    }
}

/// Fills in `labels` on each task.
async fn attach_labels(pool: &SqlitePool, tasks: &mut [Task]) -> Result<()> {
    let ids: Vec<i64> = tasks.iter().map(|t| t.id).collect();
    let mut by_task = labels::labels_for_tasks(pool, &ids).await?;
    for task in tasks.iter_mut() {
        task.labels = by_task.remove(&task.id).unwrap_or_default();
    }
    Ok(())
}

/// Tasks owned by or assigned to `viewer_id`, filtered and ordered.
///
/// The title filter is a substring match; status and priority are exact.
pub async fn search_tasks_in_db(
    pool: &SqlitePool,
    viewer_id: i64,
    search: &TaskSearch,
    order: TaskOrder,
) -> Result<Vec<Task>> {
    debug!("Searching tasks for user {}: {:?} {:?}", viewer_id, search, order);

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE (owner_id = "
    ));
    query.push_bind(viewer_id);
    query.push(" OR user_id = ");
    query.push_bind(viewer_id);
    query.push(")");

    if let Some(title) = &search.title {
        query.push(" AND title LIKE ");
        query.push_bind(like_pattern(title));
        query.push(" ESCAPE '\\'");
    }
    if let Some(status) = search.status {
        query.push(" AND status = ");
        query.push_bind(status);
    }
    if let Some(priority) = search.priority {
        query.push(" AND priority = ");
        query.push_bind(priority);
    }
    push_order(&mut query, order);

    let mut tasks: Vec<Task> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .context("Failed to search tasks in DB")?;
    attach_labels(pool, &mut tasks).await?;

    Ok(tasks)
}

/// Visible tasks whose deadline lies before `now`, most overdue first.
pub async fn get_expired_tasks_from_db(
    pool: &SqlitePool,
    viewer_id: i64,
    now: DateTime<Utc>,
) -> Result<Vec<Task>> {
    let mut tasks = sqlx::query_as::<_, Task>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE (owner_id = ? OR user_id = ?) AND deadline IS NOT NULL AND deadline < ? ORDER BY deadline ASC, id ASC"
    ))
    .bind(viewer_id)
    .bind(viewer_id)
    .bind(timestamp(now))
    .fetch_all(pool)
    .await
    .context("Failed to retrieve expired tasks from DB")?;
    attach_labels(pool, &mut tasks).await?;

    Ok(tasks)
}

/// Tasks created by `owner_id`, oldest first.
pub async fn get_owned_tasks_from_db(pool: &SqlitePool, owner_id: i64) -> Result<Vec<Task>> {
    let mut tasks = sqlx::query_as::<_, Task>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE owner_id = ? ORDER BY id ASC"
    ))
    .bind(owner_id)
    .fetch_all(pool)
    .await
    .with_context(|| format!("Failed to retrieve tasks of user {owner_id}"))?;
    attach_labels(pool, &mut tasks).await?;

    Ok(tasks)
}

pub async fn get_task_from_db(pool: &SqlitePool, task_id: i64) -> Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE id = ?"
    ))
    .bind(task_id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to retrieve task {task_id}"))?;

    match task {
        Some(task) => {
            let mut tasks = [task];
            attach_labels(pool, &mut tasks).await?;
            let [task] = tasks;
            Ok(Some(task))
        }
        None => Ok(None),
    }
}

/// Runs every task rule, including the ones that need the database:
/// the assignee and the labels must exist.
pub async fn validate_task_form(
    pool: &SqlitePool,
    form: &TaskForm,
    now: DateTime<Utc>,
) -> Result<FormErrors> {
    let mut errors = form.check(now);

    if let Some(user_id) = form.user_id {
        if users::get_user_from_db(pool, user_id).await?.is_none() {
            errors.add("user_id", "is not a valid user");
        }
    }
    let missing = labels::missing_label_ids(pool, &form.label_ids).await?;
    if !missing.is_empty() {
        errors.add("label_ids", format!("contains unknown labels: {missing:?}"));
    }

    Ok(errors)
}

/// Inserts a new task owned by `owner_id`.
pub async fn create_task_in_db(
    pool: &SqlitePool,
    owner_id: i64,
    form: &TaskForm,
    now: DateTime<Utc>,
) -> Result<Task, StoreError> {
    let errors = validate_task_form(pool, form, now).await?;
    let (Some(status), Some(priority), true) = (form.status, form.priority, errors.is_empty())
    else {
        return Err(StoreError::Invalid(errors));
    };

    let created_at = timestamp(now);
    let deadline = form.deadline.map(timestamp);
    debug!(
        "Insert values: title={}, status={:?}, priority={:?}, deadline={:?}, user_id={:?}, owner_id={}",
        form.title, status, priority, deadline, form.user_id, owner_id
    );

    let mut tx = pool.begin().await.context("Failed to open transaction")?;
    let id = sqlx::query(
        "INSERT INTO tasks (title, description, status, priority, deadline, user_id, owner_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(form.title.trim())
    .bind(form.description())
    .bind(status)
    .bind(priority)
    .bind(deadline)
    .bind(form.user_id)
    .bind(owner_id)
    .bind(created_at)
    .bind(created_at)
    .execute(&mut *tx)
    .await
    .context("Failed to insert task into DB")?
    .last_insert_rowid();

    labels::set_task_labels(&mut tx, id, &form.label_ids).await?;
    tx.commit().await.context("Failed to commit new task")?;

    info!("Task created successfully with ID: {}", id);
    get_task_from_db(pool, id)
        .await?
        .with_context(|| format!("Task {id} vanished after insert"))
        .map_err(StoreError::from)
}

/// Updates a task. The deadline rule is checked again against `now`.
/// Returns `Ok(None)` when no such task exists.
pub async fn update_task_in_db(
    pool: &SqlitePool,
    task_id: i64,
    form: &TaskForm,
    now: DateTime<Utc>,
) -> Result<Option<Task>, StoreError> {
    let errors = validate_task_form(pool, form, now).await?;
    let (Some(status), Some(priority), true) = (form.status, form.priority, errors.is_empty())
    else {
        return Err(StoreError::Invalid(errors));
    };

    let mut tx = pool.begin().await.context("Failed to open transaction")?;
    let result = sqlx::query(
        "UPDATE tasks SET title = ?, description = ?, status = ?, priority = ?, deadline = ?, user_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(form.title.trim())
    .bind(form.description())
    .bind(status)
    .bind(priority)
    .bind(form.deadline.map(timestamp))
    .bind(form.user_id)
    .bind(timestamp(now))
    .bind(task_id)
    .execute(&mut *tx)
    .await
    .with_context(|| format!("Failed to update task {task_id}"))?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }

    labels::set_task_labels(&mut tx, task_id, &form.label_ids).await?;
    tx.commit().await.context("Failed to commit task update")?;

    info!("Task with ID {} updated successfully.", task_id);
    Ok(get_task_from_db(pool, task_id).await?)
}

/// Deletes a task and its label links.
/// Returns true if a task was deleted, false if no task with the given ID was found.
pub async fn delete_task_from_db(pool: &SqlitePool, task_id: i64) -> Result<bool> {
    debug!("Attempting to delete task with ID: {}", task_id);
    let result = sqlx::query("DELETE FROM tasks WHERE id = ?")
        .bind(task_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete task with ID: {task_id}"))?;

    let rows_affected = result.rows_affected();
    info!("Deleted {} rows for task ID: {}", rows_affected, task_id);

    Ok(rows_affected > 0)
}
