// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

enum Step {
    Sql(&'static str),
    /// The column default depends on data (the `staff` role id), so the
    /// statement is built at migration time.
    AddRoleIdToUsers,
}

struct Migration {
    version: i64,
    name: &'static str,
    step: Step,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_roles",
        step: Step::Sql(
            r#"
            CREATE TABLE roles (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                code TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                admin BOOLEAN NOT NULL DEFAULT 0
            );
            INSERT INTO roles (code, name, admin) VALUES
                ('staff', 'Staff', 0),
                ('admin', 'Administrator', 1);
            "#,
        ),
    },
    Migration {
        version: 2,
        name: "create_users",
        step: Step::Sql(
            r#"
            CREATE TABLE users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                name TEXT NOT NULL,
                password_digest TEXT NOT NULL,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            "#,
        ),
    },
    Migration {
        version: 3,
        name: "add_role_id_to_users",
        step: Step::AddRoleIdToUsers,
    },
    Migration {
        version: 4,
        name: "create_groups",
        step: Step::Sql(
            r#"
            CREATE TABLE groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );
            CREATE TABLE user_groups (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL UNIQUE REFERENCES users (id) ON DELETE CASCADE,
                group_id INTEGER NOT NULL REFERENCES groups (id) ON DELETE CASCADE
            );
            CREATE INDEX index_user_groups_on_group_id ON user_groups (group_id);
            "#,
        ),
    },
    Migration {
        version: 5,
        name: "create_tasks",
        step: Step::Sql(
            r#"
            CREATE TABLE tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NULL,
                status INTEGER NOT NULL DEFAULT 1,
                priority INTEGER NOT NULL DEFAULT 2,
                deadline TIMESTAMP NULL,
                user_id INTEGER NULL REFERENCES users (id) ON DELETE SET NULL,
                owner_id INTEGER NOT NULL REFERENCES users (id) ON DELETE CASCADE,
                created_at TIMESTAMP NOT NULL,
                updated_at TIMESTAMP NOT NULL
            );
            CREATE INDEX index_tasks_on_user_id ON tasks (user_id);
            CREATE INDEX index_tasks_on_owner_id ON tasks (owner_id);
            "#,
        ),
    },
    Migration {
        version: 6,
        name: "create_labels",
        step: Step::Sql(
            r#"
            CREATE TABLE labels (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE,
                color TEXT NOT NULL
            );
            CREATE TABLE task_labels (
                task_id INTEGER NOT NULL REFERENCES tasks (id) ON DELETE CASCADE,
                label_id INTEGER NOT NULL REFERENCES labels (id) ON DELETE CASCADE,
                PRIMARY KEY (task_id, label_id)
            );
            "#,
        ),
    },
];

/// Applies every pending migration.
pub async fn run_migrations(pool: &SqlitePool) -> Result<usize> {
    migrate(pool, None).await
}

/// Applies pending migrations up to and including `target` (all of them
/// when `None`). Each migration runs in its own transaction and is
/// recorded in `schema_migrations`.
pub async fn migrate(pool: &SqlitePool, target: Option<i64>) -> Result<usize> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            applied_at TIMESTAMP NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await
    .context("Failed to create 'schema_migrations' table")?;

    let applied: Vec<i64> = sqlx::query_scalar("SELECT version FROM schema_migrations")
        .fetch_all(pool)
        .await
        .context("Failed to read applied migrations")?;

    let mut count = 0;
    for migration in MIGRATIONS {
        if applied.contains(&migration.version) {
            continue;
        }
        if target.is_some_and(|target| migration.version > target) {
            break;
        }

        debug!(
            "Applying migration {} ({})",
            migration.version, migration.name
        );
        let mut tx = pool.begin().await.context("Failed to open transaction")?;

        match migration.step {
            Step::Sql(sql) => {
                sqlx::raw_sql(sql)
                    .execute(&mut *tx)
                    .await
                    .with_context(|| format!("Migration {} failed", migration.name))?;
            }
            Step::AddRoleIdToUsers => add_role_id_to_users(&mut tx).await?,
        }

        sqlx::query("INSERT INTO schema_migrations (version, name, applied_at) VALUES (?, ?, ?)")
            .bind(migration.version)
            .bind(migration.name)
            .bind(Utc::now())
            .execute(&mut *tx)
            .await
            .context("Failed to record migration")?;

        tx.commit()
            .await
            .with_context(|| format!("Failed to commit migration {}", migration.name))?;
        info!("Applied migration {} ({})", migration.version, migration.name);
        count += 1;
    }

    Ok(count)
}

/// Adds `users.role_id`, defaulting existing and future rows to the
/// `staff` role. SQLite refuses a REFERENCES clause with a non-null
/// default on `ALTER TABLE`, so role existence is enforced on write.
async fn add_role_id_to_users(conn: &mut SqliteConnection) -> Result<()> {
    let staff_id: i64 = sqlx::query_scalar("SELECT id FROM roles WHERE code = 'staff'")
        .fetch_optional(&mut *conn)
        .await
        .context("Failed to look up the staff role")?
        .context("The 'staff' role must exist before adding users.role_id")?;

    let alter = format!("ALTER TABLE users ADD COLUMN role_id INTEGER NOT NULL DEFAULT {staff_id}");
    sqlx::query(&alter)
        .execute(&mut *conn)
        .await
        .context("Failed to add users.role_id")?;

    sqlx::query("CREATE INDEX index_users_on_role_id ON users (role_id)")
        .execute(&mut *conn)
        .await
        .context("Failed to index users.role_id")?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn empty_pool() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_migrations_are_applied_once() {
        let pool = empty_pool().await;
        assert_eq!(run_migrations(&pool).await.unwrap(), MIGRATIONS.len());
        assert_eq!(run_migrations(&pool).await.unwrap(), 0);

        let codes: Vec<String> = sqlx::query_scalar("SELECT code FROM roles ORDER BY id")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(codes, vec!["staff".to_string(), "admin".to_string()]);
    }

    #[tokio::test]
    async fn test_role_id_defaults_to_staff_for_existing_users() {
        let pool = empty_pool().await;
        migrate(&pool, Some(2)).await.unwrap();

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO users (email, name, password_digest, created_at, updated_at) VALUES ('old@example.com', 'Old', 'x', ?, ?)",
        )
        .bind(now)
        .bind(now)
        .execute(&pool)
        .await
        .unwrap();

        run_migrations(&pool).await.unwrap();

        let role_code: String = sqlx::query_scalar(
            "SELECT roles.code FROM users JOIN roles ON roles.id = users.role_id WHERE users.email = 'old@example.com'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(role_code, "staff");
    }
}
