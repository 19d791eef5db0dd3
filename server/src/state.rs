// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::auth::SessionStore;
use sqlx::SqlitePool;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub sessions: SessionStore,
}

impl AppState {
    pub fn new(pool: SqlitePool, sessions: SessionStore) -> Self {
        Self { pool, sessions }
    }
}
