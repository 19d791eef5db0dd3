// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::database::users;
use crate::state::AppState;

use anyhow::{Context, Result, anyhow};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{
    Json,
    extract::FromRequestParts,
    http::{HeaderMap, StatusCode, header, request::Parts},
    response::{IntoResponse, Redirect, Response},
};
use chrono::{DateTime, Duration, Utc};
use common::{Role, User};
use parking_lot::RwLock;
use rand::RngCore;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error};

pub const SESSION_COOKIE: &str = "task_session";

/// Hashes a password into an Argon2id PHC string.
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt_bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut salt_bytes);
    let salt = SaltString::encode_b64(&salt_bytes).map_err(|e| anyhow!(e.to_string()))?;

    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| anyhow!("Failed to hash password: {e}"))
}

/// Argon2 is CPU-bound, so request handlers hash on the blocking pool.
pub async fn hash_password_blocking(password: String) -> Result<String> {
    tokio::task::spawn_blocking(move || hash_password(&password))
        .await
        .context("Password hashing task failed")?
}

pub async fn verify_password_blocking(password: String, digest: String) -> Result<bool> {
    tokio::task::spawn_blocking(move || verify_password(&password, &digest))
        .await
        .context("Password verification task failed")
}

/// A malformed stored digest counts as a mismatch.
pub fn verify_password(password: &str, digest: &str) -> bool {
    match PasswordHash::new(digest) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            error!("Stored password digest is unreadable: {}", e);
            false
        }
    }
}

#[derive(Debug, Clone)]
struct Session {
    user_id: i64,
    expires_at: DateTime<Utc>,
    flash: Option<String>,
}

/// In-process session table keyed by the random cookie token.
///
/// Each access slides the expiry forward by the configured TTL.
#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<RwLock<HashMap<String, Session>>>,
    ttl: Duration,
}

impl SessionStore {
    pub fn new(ttl: Duration) -> Self {
        Self {
            sessions: Arc::new(RwLock::new(HashMap::new())),
            ttl,
        }
    }

    /// Opens a session for `user_id` and returns its token.
    pub fn create(&self, user_id: i64) -> String {
        let token = uuid::Uuid::new_v4().simple().to_string();
        let session = Session {
            user_id,
            expires_at: Utc::now() + self.ttl,
            flash: None,
        };
        self.sessions.write().insert(token.clone(), session);
        debug!("Opened session for user {}", user_id);
        token
    }

    /// Returns the user behind `token` if the session is still alive.
    pub fn user_id(&self, token: &str) -> Option<i64> {
        let now = Utc::now();
        let mut sessions = self.sessions.write();
        match sessions.get_mut(token) {
            Some(session) if session.expires_at > now => {
                session.expires_at = now + self.ttl;
                Some(session.user_id)
            }
            Some(_) => {
                sessions.remove(token);
                None
            }
            None => None,
        }
    }

    pub fn remove(&self, token: &str) -> bool {
        self.sessions.write().remove(token).is_some()
    }

    /// Drops every session belonging to `user_id`, e.g. after the user is deleted.
    pub fn remove_user(&self, user_id: i64) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.user_id != user_id);
        before - sessions.len()
    }

    pub fn set_flash(&self, token: &str, message: impl Into<String>) {
        if let Some(session) = self.sessions.write().get_mut(token) {
            session.flash = Some(message.into());
        }
    }

    /// Flash messages are shown once.
    pub fn take_flash(&self, token: &str) -> Option<String> {
        self.sessions
            .write()
            .get_mut(token)
            .and_then(|s| s.flash.take())
    }

    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut sessions = self.sessions.write();
        let before = sessions.len();
        sessions.retain(|_, s| s.expires_at > now);
        before - sessions.len()
    }

    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reads the session token out of the `Cookie` request header.
pub fn session_token(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.to_string())
}

pub fn session_cookie(token: &str) -> String {
    format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax")
}

pub fn expired_session_cookie() -> String {
    format!("{SESSION_COOKIE}=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0")
}

/// The signed-in user together with their role and session token.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user: User,
    pub role: Role,
    pub token: String,
}

impl CurrentUser {
    pub fn is_admin(&self) -> bool {
        self.role.admin
    }
}

async fn resolve_session(parts: &Parts, state: &AppState) -> Result<Option<CurrentUser>> {
    let Some(token) = session_token(&parts.headers) else {
        return Ok(None);
    };
    let Some(user_id) = state.sessions.user_id(&token) else {
        return Ok(None);
    };
    let Some(user) = users::get_user_from_db(&state.pool, user_id).await? else {
        state.sessions.remove(&token);
        return Ok(None);
    };
    let role = users::get_role_from_db(&state.pool, user.role_id)
        .await?
        .with_context(|| format!("User {} references missing role {}", user.id, user.role_id))?;

    Ok(Some(CurrentUser { user, role, token }))
}

fn internal_error(err: anyhow::Error) -> Response {
    error!("Failed to resolve session: {:?}", err);
    (StatusCode::INTERNAL_SERVER_ERROR, "An internal error occurred.").into_response()
}

/// Page extractor: anonymous visitors are sent to the login form.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve_session(parts, state).await {
            Ok(Some(current)) => Ok(current),
            Ok(None) => Err(Redirect::to("/login").into_response()),
            Err(err) => Err(internal_error(err)),
        }
    }
}

/// Like [`CurrentUser`], but only lets administrators through; everyone
/// else is sent back to the root page.
pub struct AdminUser(pub CurrentUser);

impl FromRequestParts<AppState> for AdminUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        if current.is_admin() {
            Ok(AdminUser(current))
        } else {
            debug!("User {} is not an admin, redirecting", current.user.id);
            Err(Redirect::to("/").into_response())
        }
    }
}

/// API extractor: answers 401 JSON instead of redirecting.
pub struct ApiUser(pub CurrentUser);

impl FromRequestParts<AppState> for ApiUser {
    type Rejection = Response;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match resolve_session(parts, state).await {
            Ok(Some(current)) => Ok(ApiUser(current)),
            Ok(None) => Err((
                StatusCode::UNAUTHORIZED,
                Json(serde_json::json!({ "error": "Authentication required." })),
            )
                .into_response()),
            Err(err) => Err(internal_error(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_hash_and_verify_password() {
        let digest = hash_password("password").unwrap();
        assert!(digest.starts_with("$argon2"));
        assert!(verify_password("password", &digest));
        assert!(!verify_password("wrong", &digest));
        assert!(!verify_password("password", "not-a-digest"));
    }

    #[tokio::test]
    async fn test_hash_and_verify_off_the_runtime() {
        let digest = hash_password_blocking("password".to_string())
            .await
            .unwrap();
        assert!(
            verify_password_blocking("password".to_string(), digest.clone())
                .await
                .unwrap()
        );
        assert!(
            !verify_password_blocking("wrong".to_string(), digest)
                .await
                .unwrap()
        );
    }

    #[test]
    fn test_session_lifecycle() {
        let store = SessionStore::new(Duration::minutes(5));
        let token = store.create(42);
        assert_eq!(store.user_id(&token), Some(42));
        assert_eq!(store.user_id("unknown"), None);

        store.set_flash(&token, "Task was successfully created.");
        assert_eq!(
            store.take_flash(&token).as_deref(),
            Some("Task was successfully created.")
        );
        assert_eq!(store.take_flash(&token), None);

        assert!(store.remove(&token));
        assert_eq!(store.user_id(&token), None);
    }

    #[test]
    fn test_expired_sessions_are_rejected_and_purged() {
        let store = SessionStore::new(Duration::minutes(5));
        let stale = store.create(1);
        let _fresh = store.create(2);

        assert_eq!(store.purge_expired(Utc::now() + Duration::minutes(10)), 2);
        assert!(store.is_empty());
        assert_eq!(store.user_id(&stale), None);

        let store = SessionStore::new(Duration::zero());
        let token = store.create(1);
        assert_eq!(store.user_id(&token), None);
        assert!(store.is_empty());
    }

    #[test]
    fn test_remove_user_drops_all_their_sessions() {
        let store = SessionStore::new(Duration::minutes(5));
        store.create(1);
        store.create(1);
        let other = store.create(2);
        assert_eq!(store.remove_user(1), 2);
        assert_eq!(store.user_id(&other), Some(2));
    }

    #[test]
    fn test_session_token_from_cookie_header() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::COOKIE,
            HeaderValue::from_static("theme=dark; task_session=abc123; lang=en"),
        );
        assert_eq!(session_token(&headers).as_deref(), Some("abc123"));
        assert_eq!(session_token(&HeaderMap::new()), None);
    }
}
