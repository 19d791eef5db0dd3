// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::colors;
use crate::database::{StoreError, taken_or_failed};

use anyhow::{Context, Result};
use common::{Label, validate_name};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection, SqlitePool};
use std::collections::HashMap;
use tracing::{debug, info};

pub async fn list_labels_from_db(pool: &SqlitePool) -> Result<Vec<Label>> {
    sqlx::query_as::<_, Label>("SELECT id, name, color FROM labels ORDER BY name ASC")
        .fetch_all(pool)
        .await
        .context("Failed to retrieve labels from DB")
}

/// Creates a label, assigning it the next palette color.
pub async fn create_label_in_db(pool: &SqlitePool, name: &str) -> Result<Label, StoreError> {
    let mut errors = validate_name(name);
    let name = name.trim();

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM labels WHERE name = ?)")
        .bind(name)
        .fetch_one(pool)
        .await
        .context("Failed to check label name")?;
    if taken {
        errors.add("name", "has already been taken");
    }
    if !errors.is_empty() {
        return Err(StoreError::Invalid(errors));
    }

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM labels")
        .fetch_one(pool)
        .await
        .context("Failed to count labels")?;
    let color = colors::label_color(existing as usize);

    let id = sqlx::query("INSERT INTO labels (name, color) VALUES (?, ?)")
        .bind(name)
        .bind(color)
        .execute(pool)
        .await
        .map_err(|e| taken_or_failed(e, "name", "Failed to insert label into DB"))?
        .last_insert_rowid();

    info!("Label {} created with ID: {}", name, id);
    Ok(Label {
        id,
        name: name.to_string(),
        color: color.to_string(),
    })
}

/// Returns the ids among `ids` that match no label.
pub async fn missing_label_ids(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<i64>> {
    if ids.is_empty() {
        return Ok(Vec::new());
    }
    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new("SELECT id FROM labels WHERE id IN (");
    let mut separated = query.separated(", ");
    for id in ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(")");

    let found: Vec<i64> = query
        .build_query_scalar()
        .fetch_all(pool)
        .await
        .context("Failed to look up labels")?;

    Ok(ids.iter().copied().filter(|id| !found.contains(id)).collect())
}

/// Replaces the labels attached to a task.
pub async fn set_task_labels(
    conn: &mut SqliteConnection,
    task_id: i64,
    label_ids: &[i64],
) -> Result<()> {
    debug!("Setting labels {:?} on task {}", label_ids, task_id);
    sqlx::query("DELETE FROM task_labels WHERE task_id = ?")
        .bind(task_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear task labels")?;

    for label_id in label_ids {
        sqlx::query("INSERT OR IGNORE INTO task_labels (task_id, label_id) VALUES (?, ?)")
            .bind(task_id)
            .bind(label_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to attach label {label_id} to task {task_id}"))?;
    }
    Ok(())
}

#[derive(sqlx::FromRow)]
struct TaskLabelRow {
    task_id: i64,
    id: i64,
    name: String,
    color: String,
}

/// Loads the labels of several tasks at once, keyed by task id.
pub async fn labels_for_tasks(
    pool: &SqlitePool,
    task_ids: &[i64],
) -> Result<HashMap<i64, Vec<Label>>> {
    let mut by_task: HashMap<i64, Vec<Label>> = HashMap::new();
    if task_ids.is_empty() {
        return Ok(by_task);
    }

    let mut query: QueryBuilder<Sqlite> = QueryBuilder::new(
        "SELECT task_labels.task_id, labels.id, labels.name, labels.color \
         FROM task_labels JOIN labels ON labels.id = task_labels.label_id \
         WHERE task_labels.task_id IN (",
    );
    let mut separated = query.separated(", ");
    for id in task_ids {
        separated.push_bind(*id);
    }
    separated.push_unseparated(") ORDER BY labels.name ASC");

    let rows: Vec<TaskLabelRow> = query
        .build_query_as()
        .fetch_all(pool)
        .await
        .context("Failed to retrieve task labels from DB")?;

    for row in rows {
        by_task.entry(row.task_id).or_default().push(Label {
            id: row.id,
            name: row.name,
            color: row.color,
        });
    }
    Ok(by_task)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::in_memory_pool;

    #[tokio::test]
    async fn test_create_and_list_labels() {
        let pool = in_memory_pool().await.unwrap();
        let urgent = create_label_in_db(&pool, "urgent").await.unwrap();
        let backend = create_label_in_db(&pool, " backend ").await.unwrap();

        assert_eq!(urgent.color, colors::label_color(0));
        assert_eq!(backend.name, "backend");
        assert_eq!(backend.color, colors::label_color(1));

        let labels = list_labels_from_db(&pool).await.unwrap();
        let names: Vec<&str> = labels.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, ["backend", "urgent"]);
    }

    #[tokio::test]
    async fn test_duplicate_and_blank_names_are_rejected() {
        let pool = in_memory_pool().await.unwrap();
        create_label_in_db(&pool, "urgent").await.unwrap();

        match create_label_in_db(&pool, "urgent").await {
            Err(StoreError::Invalid(errors)) => {
                assert_eq!(errors.messages("name"), ["has already been taken"])
            }
            other => panic!("expected validation error, got {other:?}"),
        }
        assert!(matches!(
            create_label_in_db(&pool, "  ").await,
            Err(StoreError::Invalid(_))
        ));
    }

    #[tokio::test]
    async fn test_missing_label_ids() {
        let pool = in_memory_pool().await.unwrap();
        let label = create_label_in_db(&pool, "urgent").await.unwrap();
        let missing = missing_label_ids(&pool, &[label.id, 999]).await.unwrap();
        assert_eq!(missing, vec![999]);
        assert!(missing_label_ids(&pool, &[]).await.unwrap().is_empty());
    }
}
