// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::handlers::{admin, api, labels, sessions, tasks};
use crate::state::AppState;
use axum::{
    Router,
    http::HeaderName,
    routing::{delete, get, post},
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Creates and configures the application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(sessions::root))
        .route("/login", get(sessions::login_form).post(sessions::login))
        .route("/logout", post(sessions::logout))
        .route("/tasks", get(tasks::index).post(tasks::create))
        .route("/tasks/new", get(tasks::new))
        .route("/tasks/{id}", get(tasks::show).post(tasks::update))
        .route("/tasks/{id}/edit", get(tasks::edit))
        .route("/tasks/{id}/delete", post(tasks::delete))
        .route("/labels", get(labels::index).post(labels::create))
        .route(
            "/admin/users",
            get(admin::users_index).post(admin::create_user),
        )
        .route("/admin/users/new", get(admin::new_user))
        .route("/admin/users/{id}", post(admin::update_user))
        .route("/admin/users/{id}/edit", get(admin::edit_user))
        .route("/admin/users/{id}/delete", post(admin::delete_user))
        .route(
            "/admin/groups",
            get(admin::groups_index).post(admin::create_group),
        )
        .nest("/api", api_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// JSON routes, open to cross-origin callers.
fn api_router() -> Router<AppState> {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_headers([
            HeaderName::from_static("content-type"),
            HeaderName::from_static("accept"),
        ])
        .allow_origin(Any);

    Router::new()
        .route("/tasks", get(api::list_tasks).post(api::create_task))
        .route("/tasks/{id}", delete(api::delete_task))
        .layer(cors)
}
