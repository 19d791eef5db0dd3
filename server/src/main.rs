// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use chrono::Utc;
use server::auth::SessionStore;
use server::config::Config;
use server::database::{self, users};
use server::routes;
use server::state::AppState;
use tokio::time::{self, Duration};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    tracing::info!("Starting up the server...");

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            tracing::error!("Invalid configuration: {:?}", e);
            std::process::exit(1);
        }
    };

    let db_pool = match database::establish_connection_pool(&config.database_url).await {
        Ok(pool) => {
            tracing::info!("Database connection was made successfully.");
            pool
        }
        Err(e) => {
            tracing::error!("Failed to connect with the database: {:?}", e);
            std::process::exit(1);
        }
    };

    if let Some((email, password)) = &config.bootstrap_admin {
        match users::bootstrap_admin(&db_pool, email, password).await {
            Ok(true) => tracing::info!("Created bootstrap admin {}.", email),
            Ok(false) => tracing::debug!("Users already exist, skipping admin bootstrap."),
            Err(e) => {
                tracing::error!("Failed to create the bootstrap admin: {:?}", e);
                std::process::exit(1);
            }
        }
    }

    let sessions = SessionStore::new(config.session_ttl);
    let sweeper = sessions.clone();

    tokio::spawn(async move {
        let mut interval = time::interval(Duration::from_secs(5 * 60));

        // The first tick completes immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let purged = sweeper.purge_expired(Utc::now());
            if purged > 0 {
                tracing::info!("Purged {} expired sessions.", purged);
            } else {
                tracing::debug!("No expired sessions, {} active.", sweeper.len());
            }
        }
    });

    let app = routes::create_router(AppState::new(db_pool, sessions));

    tracing::info!("The server listens on http://{}", config.bind_addr);

    let listener = match tokio::net::TcpListener::bind(config.bind_addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!("Failed to bind {}: {:?}", config.bind_addr, e);
            std::process::exit(1);
        }
    };
    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("Server error: {:?}", e);
        std::process::exit(1);
    }
}
