// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod groups;
pub mod labels;
pub mod migrations;
pub mod tasks;
pub mod users;

use anyhow::{Context, Result};
use chrono::{DateTime, SubsecRound, Utc};
use common::FormErrors;
use sqlx::{
    Sqlite, SqlitePool,
    migrate::MigrateDatabase,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::str::FromStr;
use tracing::info;

/// Failure of a write: either the submitted data was rejected or the
/// database itself failed.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Invalid(FormErrors),
    #[error(transparent)]
    Database(#[from] anyhow::Error),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Database(err.into())
    }
}

/// Maps a UNIQUE constraint failure to a "has already been taken" error on
/// `field`. A concurrent writer can insert the same value between the
/// lookup and the insert; the constraint has the final say.
pub fn taken_or_failed(err: sqlx::Error, field: &str, context: &'static str) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            let mut errors = FormErrors::new();
            errors.add(field, "has already been taken");
            StoreError::Invalid(errors)
        }
        _ => StoreError::Database(anyhow::Error::new(err).context(context)),
    }
}

/// Timestamps are stored with whole seconds so that their text form sorts
/// chronologically in SQLite.
pub fn timestamp(at: DateTime<Utc>) -> DateTime<Utc> {
    at.trunc_subsecs(0)
}

/// Establishes the database connection pool.
/// If the database does not exist, it creates it, then brings the schema
/// up to date.
pub async fn establish_connection_pool(database_url: &str) -> Result<SqlitePool> {
    if database_url.contains(":memory:") {
        info!("Using an in-memory database.");
        return in_memory_pool().await;
    }

    if let Some(parent) = database_url
        .strip_prefix("sqlite://")
        .and_then(|path| std::path::Path::new(path).parent())
        .filter(|dir| !dir.as_os_str().is_empty())
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }

    if !Sqlite::database_exists(database_url).await.unwrap_or(false) {
        info!("Creating database {}", database_url);
        Sqlite::create_database(database_url)
            .await
            .context("Failed to create database")?;
    } else {
        info!("Database already exists.");
    }

    let options = SqliteConnectOptions::from_str(database_url)
        .context("Invalid database URL")?
        .foreign_keys(true);
    let pool = SqlitePool::connect_with(options)
        .await
        .context("Failed to connect to database")?;

    migrations::run_migrations(&pool).await?;

    Ok(pool)
}

/// A migrated in-memory database. A single connection that never expires
/// is kept, since every new connection would see an empty database.
pub async fn in_memory_pool() -> Result<SqlitePool> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .context("Invalid in-memory database URL")?
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .context("Failed to open in-memory database")?;

    migrations::run_migrations(&pool).await?;

    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unique_violation_becomes_field_error() {
        let pool = in_memory_pool().await.unwrap();
        sqlx::query("INSERT INTO groups (name) VALUES ('Ops')")
            .execute(&pool)
            .await
            .unwrap();
        let err = sqlx::query("INSERT INTO groups (name) VALUES ('Ops')")
            .execute(&pool)
            .await
            .unwrap_err();

        match taken_or_failed(err, "name", "Failed to insert group") {
            StoreError::Invalid(errors) => {
                assert_eq!(errors.messages("name"), ["has already been taken"]);
            }
            other => panic!("expected a field error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_other_errors_stay_database_errors() {
        let pool = in_memory_pool().await.unwrap();
        let err = sqlx::query("INSERT INTO no_such_table (name) VALUES ('x')")
            .execute(&pool)
            .await
            .unwrap_err();
        assert!(matches!(
            taken_or_failed(err, "name", "Failed to insert"),
            StoreError::Database(_)
        ));
    }
}
