// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use anyhow::{Context, Result};
use chrono::Duration;
use std::net::SocketAddr;

const DEFAULT_DATABASE_URL: &str = "sqlite://database/sqlite.db";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3000";
const DEFAULT_SESSION_TTL_MINUTES: i64 = 120;

/// Runtime settings read from the environment (and `.env` if present).
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    pub session_ttl: Duration,
    /// Credentials of the admin created on first start, if any.
    pub bootstrap_admin: Option<(String, String)>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!("Loaded environment from {}", path.display());
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup, so tests don't have
    /// to touch the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address such as 0.0.0.0:3000")?;

        let ttl_minutes = match lookup("SESSION_TTL_MINUTES") {
            Some(raw) => raw
                .parse::<i64>()
                .context("SESSION_TTL_MINUTES must be an integer")?,
            None => DEFAULT_SESSION_TTL_MINUTES,
        };
        if ttl_minutes <= 0 {
            anyhow::bail!("SESSION_TTL_MINUTES must be positive, got {ttl_minutes}");
        }

        let bootstrap_admin = match (lookup("ADMIN_EMAIL"), lookup("ADMIN_PASSWORD")) {
            (Some(email), Some(password)) if !email.is_empty() && !password.is_empty() => {
                Some((email, password))
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            session_ttl: Duration::minutes(ttl_minutes),
            bootstrap_admin,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.bind_addr.port(), 3000);
        assert_eq!(config.session_ttl, Duration::minutes(120));
        assert!(config.bootstrap_admin.is_none());
    }

    #[test]
    fn test_overrides() {
        let config = Config::from_lookup(lookup_from(&[
            ("DATABASE_URL", "sqlite::memory:"),
            ("BIND_ADDR", "127.0.0.1:8080"),
            ("SESSION_TTL_MINUTES", "15"),
            ("ADMIN_EMAIL", "admin@example.com"),
            ("ADMIN_PASSWORD", "secret123"),
        ]))
        .unwrap();
        assert_eq!(config.database_url, "sqlite::memory:");
        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(config.session_ttl, Duration::minutes(15));
        assert_eq!(
            config.bootstrap_admin,
            Some(("admin@example.com".to_string(), "secret123".to_string()))
        );
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::from_lookup(lookup_from(&[("BIND_ADDR", "nowhere")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("SESSION_TTL_MINUTES", "soon")])).is_err());
        assert!(Config::from_lookup(lookup_from(&[("SESSION_TTL_MINUTES", "0")])).is_err());
    }
}
