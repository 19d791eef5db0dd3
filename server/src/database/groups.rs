// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::database::{StoreError, taken_or_failed};

use anyhow::{Context, Result};
use common::{Group, validate_name};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::info;

#[derive(serde::Serialize, Debug, Clone, sqlx::FromRow)]
pub struct GroupSummary {
    pub id: i64,
    pub name: String,
    pub member_count: i64,
}

pub async fn list_groups_from_db(pool: &SqlitePool) -> Result<Vec<GroupSummary>> {
    sqlx::query_as::<_, GroupSummary>(
        r#"
        SELECT groups.id, groups.name, COUNT(user_groups.id) AS member_count
        FROM groups
        LEFT JOIN user_groups ON user_groups.group_id = groups.id
        GROUP BY groups.id, groups.name
        ORDER BY groups.name ASC
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to retrieve groups from DB")
}

pub async fn get_group_from_db(pool: &SqlitePool, group_id: i64) -> Result<Option<Group>> {
    sqlx::query_as::<_, Group>("SELECT id, name FROM groups WHERE id = ?")
        .bind(group_id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to retrieve group {group_id}"))
}

pub async fn create_group_in_db(pool: &SqlitePool, name: &str) -> Result<Group, StoreError> {
    let mut errors = validate_name(name);
    let name = name.trim();

    let taken: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM groups WHERE name = ?)")
        .bind(name)
        .fetch_one(pool)
        .await
        .context("Failed to check group name")?;
    if taken {
        errors.add("name", "has already been taken");
    }
    if !errors.is_empty() {
        return Err(StoreError::Invalid(errors));
    }

    let id = sqlx::query("INSERT INTO groups (name) VALUES (?)")
        .bind(name)
        .execute(pool)
        .await
        .map_err(|e| taken_or_failed(e, "name", "Failed to insert group into DB"))?
        .last_insert_rowid();

    info!("Group {} created with ID: {}", name, id);
    Ok(Group {
        id,
        name: name.to_string(),
    })
}

/// The group a user belongs to, if any.
pub async fn get_user_group_from_db(pool: &SqlitePool, user_id: i64) -> Result<Option<Group>> {
    sqlx::query_as::<_, Group>(
        "SELECT groups.id, groups.name FROM groups JOIN user_groups ON user_groups.group_id = groups.id WHERE user_groups.user_id = ?",
    )
    .bind(user_id)
    .fetch_optional(pool)
    .await
    .with_context(|| format!("Failed to retrieve group of user {user_id}"))
}

/// Moves a user into `group_id`, or out of any group when `None`.
pub async fn set_user_group(
    conn: &mut SqliteConnection,
    user_id: i64,
    group_id: Option<i64>,
) -> Result<()> {
    sqlx::query("DELETE FROM user_groups WHERE user_id = ?")
        .bind(user_id)
        .execute(&mut *conn)
        .await
        .context("Failed to clear user group")?;

    if let Some(group_id) = group_id {
        sqlx::query("INSERT INTO user_groups (user_id, group_id) VALUES (?, ?)")
            .bind(user_id)
            .bind(group_id)
            .execute(&mut *conn)
            .await
            .with_context(|| format!("Failed to add user {user_id} to group {group_id}"))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::in_memory_pool;

    #[tokio::test]
    async fn test_create_group_rejects_duplicates() {
        let pool = in_memory_pool().await.unwrap();
        let group = create_group_in_db(&pool, "Ops").await.unwrap();
        assert_eq!(group.name, "Ops");
        assert!(matches!(
            create_group_in_db(&pool, "Ops").await,
            Err(StoreError::Invalid(_))
        ));

        let groups = list_groups_from_db(&pool).await.unwrap();
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].member_count, 0);
        assert_eq!(
            get_group_from_db(&pool, group.id).await.unwrap(),
            Some(group)
        );
    }
}
