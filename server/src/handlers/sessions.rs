// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::auth::{self, CurrentUser};
use crate::database::users;
use crate::forms::LoginForm;
use crate::handlers::{AppError, redirect_to};
use crate::state::AppState;
use crate::views;

use axum::{
    extract::{Form, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, info};

fn render_login(email: &str, error: Option<&str>) -> Result<axum::response::Html<String>, AppError> {
    let mut context = views::page_context(None, None);
    context.insert("email", email);
    context.insert("login_error", &error);
    Ok(views::render("login.html", &context)?)
}

/// `GET /` sends visitors to their task list.
pub async fn root() -> Response {
    redirect_to("/tasks")
}

pub async fn login_form(State(state): State<AppState>, headers: HeaderMap) -> Result<Response, AppError> {
    let signed_in = auth::session_token(&headers)
        .and_then(|token| state.sessions.user_id(&token))
        .is_some();
    if signed_in {
        return Ok(redirect_to("/tasks"));
    }
    Ok(render_login("", None)?.into_response())
}

pub async fn login(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> Result<Response, AppError> {
    debug!("Login attempt for {}", form.email);
    match users::authenticate_user(&state.pool, &form.email, &form.password).await? {
        Some(user) => {
            let token = state.sessions.create(user.id);
            state.sessions.set_flash(&token, "Logged in successfully.");
            info!("User {} logged in.", user.id);
            Ok((
                [(header::SET_COOKIE, auth::session_cookie(&token))],
                redirect_to("/tasks"),
            )
                .into_response())
        }
        None => {
            info!("Rejected login for {}", form.email);
            let page = render_login(&form.email, Some("Invalid email or password."))?;
            Ok((StatusCode::UNPROCESSABLE_ENTITY, page).into_response())
        }
    }
}

pub async fn logout(State(state): State<AppState>, current: CurrentUser) -> Response {
    state.sessions.remove(&current.token);
    info!("User {} logged out.", current.user.id);
    (
        [(header::SET_COOKIE, auth::expired_session_cookie())],
        redirect_to("/login"),
    )
        .into_response()
}
