// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::auth;
use crate::database::{StoreError, groups, taken_or_failed, timestamp};

use anyhow::{Context, Result};
use chrono::Utc;
use common::{FormErrors, Role, User, UserForm};
use sqlx::SqlitePool;
use tracing::{debug, info};

const USER_COLUMNS: &str = "id, email, name, password_digest, role_id, created_at, updated_at";

/// One row of the admin user table.
#[derive(serde::Serialize, Debug, Clone, sqlx::FromRow)]
pub struct UserSummary {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role_name: String,
    pub group_name: Option<String>,
    pub task_count: i64,
}

pub async fn get_user_from_db(pool: &SqlitePool, user_id: i64) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = ?"))
        .bind(user_id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to retrieve user {user_id}"))
}

pub async fn get_user_by_email_from_db(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = ? COLLATE NOCASE"
    ))
    .bind(email.trim())
    .fetch_optional(pool)
    .await
    .context("Failed to retrieve user by email")
}

/// Users that tasks can be assigned to, by name.
pub async fn list_users_from_db(pool: &SqlitePool) -> Result<Vec<User>> {
    sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users ORDER BY name ASC, id ASC"
    ))
    .fetch_all(pool)
    .await
    .context("Failed to retrieve users from DB")
}

pub async fn list_user_summaries_from_db(pool: &SqlitePool) -> Result<Vec<UserSummary>> {
    sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT users.id, users.email, users.name,
               roles.name AS role_name,
               groups.name AS group_name,
               (SELECT COUNT(*) FROM tasks WHERE tasks.owner_id = users.id) AS task_count
        FROM users
        JOIN roles ON roles.id = users.role_id
        LEFT JOIN user_groups ON user_groups.user_id = users.id
        LEFT JOIN groups ON groups.id = user_groups.group_id
        ORDER BY users.id ASC
        "#,
    )
    .fetch_all(pool)
    .await
    .context("Failed to retrieve user summaries from DB")
}

pub async fn count_users_in_db(pool: &SqlitePool) -> Result<i64> {
    sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(pool)
        .await
        .context("Failed to count users")
}

pub async fn get_role_from_db(pool: &SqlitePool, role_id: i64) -> Result<Option<Role>> {
    sqlx::query_as::<_, Role>("SELECT id, code, name, admin FROM roles WHERE id = ?")
        .bind(role_id)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to retrieve role {role_id}"))
}

pub async fn get_role_by_code_from_db(pool: &SqlitePool, code: &str) -> Result<Option<Role>> {
    sqlx::query_as::<_, Role>("SELECT id, code, name, admin FROM roles WHERE code = ?")
        .bind(code)
        .fetch_optional(pool)
        .await
        .with_context(|| format!("Failed to retrieve role {code}"))
}

pub async fn list_roles_from_db(pool: &SqlitePool) -> Result<Vec<Role>> {
    sqlx::query_as::<_, Role>("SELECT id, code, name, admin FROM roles ORDER BY id ASC")
        .fetch_all(pool)
        .await
        .context("Failed to retrieve roles from DB")
}

/// Runs every user rule, including the ones that need the database:
/// email uniqueness (ignoring `existing_id`), role and group existence.
pub async fn validate_user_form(
    pool: &SqlitePool,
    form: &UserForm,
    existing_id: Option<i64>,
) -> Result<FormErrors> {
    let mut errors = form.check(existing_id.is_none());

    if !errors.has("email") {
        if let Some(other) = get_user_by_email_from_db(pool, &form.email()).await? {
            if Some(other.id) != existing_id {
                errors.add("email", "has already been taken");
            }
        }
    }

    if let Some(role_id) = form.role_id {
        if get_role_from_db(pool, role_id).await?.is_none() {
            errors.add("role_id", "is not a valid role");
        }
    }

    if let Some(group_id) = form.group_id {
        if groups::get_group_from_db(pool, group_id).await?.is_none() {
            errors.add("group_id", "is not a valid group");
        }
    }

    Ok(errors)
}

/// Inserts a new user after validation.
pub async fn create_user_in_db(pool: &SqlitePool, form: &UserForm) -> Result<User, StoreError> {
    let errors = validate_user_form(pool, form, None).await?;
    let Some(role_id) = form.role_id.filter(|_| errors.is_empty()) else {
        return Err(StoreError::Invalid(errors));
    };

    let email = form.email();
    let name = form.name.trim().to_string();
    let password_digest = auth::hash_password_blocking(form.password.clone()).await?;
    let now = timestamp(Utc::now());
    debug!("Insert values: email={}, name={}, role_id={}", email, name, role_id);

    let mut tx = pool.begin().await.context("Failed to open transaction")?;
    let id = sqlx::query(
        "INSERT INTO users (email, name, password_digest, role_id, created_at, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
    )
    .bind(&email)
    .bind(&name)
    .bind(&password_digest)
    .bind(role_id)
    .bind(now)
    .bind(now)
    .execute(&mut *tx)
    .await
    .map_err(|e| taken_or_failed(e, "email", "Failed to insert user into DB"))?
    .last_insert_rowid();

    groups::set_user_group(&mut tx, id, form.group_id).await?;
    tx.commit().await.context("Failed to commit new user")?;

    info!("User created successfully with ID: {}", id);
    Ok(User {
        id,
        email,
        name,
        password_digest,
        role_id,
        created_at: now,
        updated_at: now,
    })
}

/// Updates a user. A blank password keeps the current one.
/// Returns `Ok(None)` when no such user exists.
pub async fn update_user_in_db(
    pool: &SqlitePool,
    user_id: i64,
    form: &UserForm,
) -> Result<Option<User>, StoreError> {
    let Some(existing) = get_user_from_db(pool, user_id).await? else {
        return Ok(None);
    };

    let errors = validate_user_form(pool, form, Some(user_id)).await?;
    let Some(role_id) = form.role_id.filter(|_| errors.is_empty()) else {
        return Err(StoreError::Invalid(errors));
    };

    let password_digest = if form.password.is_empty() {
        existing.password_digest
    } else {
        auth::hash_password_blocking(form.password.clone()).await?
    };
    let now = timestamp(Utc::now());

    let mut tx = pool.begin().await.context("Failed to open transaction")?;
    sqlx::query(
        "UPDATE users SET email = ?, name = ?, password_digest = ?, role_id = ?, updated_at = ? WHERE id = ?",
    )
    .bind(form.email())
    .bind(form.name.trim())
    .bind(&password_digest)
    .bind(role_id)
    .bind(now)
    .bind(user_id)
    .execute(&mut *tx)
    .await
    .map_err(|e| taken_or_failed(e, "email", "Failed to update user"))?;

    groups::set_user_group(&mut tx, user_id, form.group_id).await?;
    tx.commit().await.context("Failed to commit user update")?;

    info!("User with ID {} updated successfully.", user_id);
    Ok(get_user_from_db(pool, user_id).await?)
}

/// Deletes a user; their owned tasks go with them and assignments are
/// cleared by the foreign keys.
pub async fn delete_user_from_db(pool: &SqlitePool, user_id: i64) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(user_id)
        .execute(pool)
        .await
        .with_context(|| format!("Failed to delete user {user_id}"))?;

    info!("Deleted {} rows for user ID: {}", result.rows_affected(), user_id);
    Ok(result.rows_affected() > 0)
}

/// Looks up a user by email and checks the password.
pub async fn authenticate_user(
    pool: &SqlitePool,
    email: &str,
    password: &str,
) -> Result<Option<User>> {
    let Some(user) = get_user_by_email_from_db(pool, email).await? else {
        return Ok(None);
    };
    let matches =
        auth::verify_password_blocking(password.to_string(), user.password_digest.clone()).await?;
    Ok(matches.then_some(user))
}

/// Creates the configured admin account when the database has no users yet.
pub async fn bootstrap_admin(pool: &SqlitePool, email: &str, password: &str) -> Result<bool> {
    if count_users_in_db(pool).await? > 0 {
        return Ok(false);
    }
    let role = get_role_by_code_from_db(pool, "admin")
        .await?
        .context("The 'admin' role is missing")?;

    let form = UserForm {
        email: email.to_string(),
        name: "Administrator".to_string(),
        password: password.to_string(),
        role_id: Some(role.id),
        group_id: None,
    };
    match create_user_in_db(pool, &form).await {
        Ok(user) => {
            info!("Bootstrapped admin user {}", user.email);
            Ok(true)
        }
        Err(StoreError::Invalid(errors)) => {
            anyhow::bail!("Invalid bootstrap admin credentials: {errors}")
        }
        Err(StoreError::Database(err)) => Err(err),
    }
}
