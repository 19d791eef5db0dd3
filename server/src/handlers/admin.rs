// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! User and group management, reachable by administrators only.
use crate::auth::{AdminUser, CurrentUser};
use crate::database::{StoreError, groups, users};
use crate::forms::{FormPairs, NameForm, parse_user_form};
use crate::handlers::{Action, AppError, message, redirect_to, unprocessable};
use crate::state::AppState;
use crate::views;

use axum::{
    extract::{Form, Path, State},
    http::StatusCode,
    response::{Html, Response},
};
use common::{FormErrors, UserForm};
use tracing::info;

async fn render_user_form(
    state: &AppState,
    current: &CurrentUser,
    user_id: Option<i64>,
    form: &UserForm,
    errors: &FormErrors,
) -> Result<Html<String>, AppError> {
    let mut context = views::page_context(Some(current), None);
    context.insert("user_id", &user_id);
    context.insert("form", form);
    context.insert("errors", errors);
    context.insert("roles", &users::list_roles_from_db(&state.pool).await?);
    context.insert("groups", &groups::list_groups_from_db(&state.pool).await?);
    Ok(views::render("admin/users/form.html", &context)?)
}

pub async fn users_index(
    State(state): State<AppState>,
    AdminUser(current): AdminUser,
) -> Result<Html<String>, AppError> {
    let flash = state.sessions.take_flash(&current.token);
    let mut context = views::page_context(Some(&current), flash);
    context.insert(
        "users",
        &users::list_user_summaries_from_db(&state.pool).await?,
    );
    Ok(views::render("admin/users/index.html", &context)?)
}

pub async fn new_user(
    State(state): State<AppState>,
    AdminUser(current): AdminUser,
) -> Result<Html<String>, AppError> {
    let staff = users::get_role_by_code_from_db(&state.pool, "staff").await?;
    let form = UserForm {
        role_id: staff.map(|r| r.id),
        ..UserForm::default()
    };
    render_user_form(&state, &current, None, &form, &FormErrors::new()).await
}

pub async fn create_user(
    State(state): State<AppState>,
    AdminUser(current): AdminUser,
    Form(pairs): Form<FormPairs>,
) -> Result<Response, AppError> {
    let (form, mut errors) = parse_user_form(&pairs);
    if errors.is_empty() {
        match users::create_user_in_db(&state.pool, &form).await {
            Ok(user) => {
                info!("Admin {} created user {}", current.user.id, user.id);
                state
                    .sessions
                    .set_flash(&current.token, message("User", Action::Create));
                return Ok(redirect_to("/admin/users"));
            }
            Err(StoreError::Invalid(invalid)) => errors.merge(invalid),
            Err(StoreError::Database(err)) => return Err(err.into()),
        }
    } else {
        errors.merge_missing(form.check(true));
    }

    let page = render_user_form(&state, &current, None, &form, &errors).await?;
    Ok(unprocessable(page))
}

pub async fn edit_user(
    State(state): State<AppState>,
    AdminUser(current): AdminUser,
    Path(user_id): Path<i64>,
) -> Result<Html<String>, AppError> {
    let user = users::get_user_from_db(&state.pool, user_id)
        .await?
        .ok_or_else(|| AppError::not_found(&format!("User {user_id}")))?;
    let group = groups::get_user_group_from_db(&state.pool, user_id).await?;
    let form = UserForm::from_user(&user, group.map(|g| g.id));
    render_user_form(&state, &current, Some(user_id), &form, &FormErrors::new()).await
}

pub async fn update_user(
    State(state): State<AppState>,
    AdminUser(current): AdminUser,
    Path(user_id): Path<i64>,
    Form(pairs): Form<FormPairs>,
) -> Result<Response, AppError> {
    let (form, mut errors) = parse_user_form(&pairs);
    if errors.is_empty() {
        match users::update_user_in_db(&state.pool, user_id, &form).await {
            Ok(Some(_)) => {
                state
                    .sessions
                    .set_flash(&current.token, message("User", Action::Update));
                return Ok(redirect_to("/admin/users"));
            }
            Ok(None) => return Err(AppError::not_found(&format!("User {user_id}"))),
            Err(StoreError::Invalid(invalid)) => errors.merge(invalid),
            Err(StoreError::Database(err)) => return Err(err.into()),
        }
    } else {
        errors.merge_missing(form.check(false));
    }

    let page = render_user_form(&state, &current, Some(user_id), &form, &errors).await?;
    Ok(unprocessable(page))
}

/// Deletes a user and ends their sessions. Admins cannot delete themselves.
pub async fn delete_user(
    State(state): State<AppState>,
    AdminUser(current): AdminUser,
    Path(user_id): Path<i64>,
) -> Result<Response, AppError> {
    if user_id == current.user.id {
        return Err(AppError::new(
            StatusCode::UNPROCESSABLE_ENTITY,
            "You cannot delete your own account.",
        ));
    }
    if !users::delete_user_from_db(&state.pool, user_id).await? {
        return Err(AppError::not_found(&format!("User {user_id}")));
    }
    let ended = state.sessions.remove_user(user_id);
    info!(
        "Admin {} deleted user {} ({} sessions ended)",
        current.user.id, user_id, ended
    );
    state
        .sessions
        .set_flash(&current.token, message("User", Action::Delete));
    Ok(redirect_to("/admin/users"))
}

async fn render_groups(
    state: &AppState,
    current: &CurrentUser,
    flash: Option<String>,
    name: &str,
    errors: &FormErrors,
) -> Result<Html<String>, AppError> {
    let mut context = views::page_context(Some(current), flash);
    context.insert("groups", &groups::list_groups_from_db(&state.pool).await?);
    context.insert("name", name);
    context.insert("errors", errors);
    Ok(views::render("admin/groups/index.html", &context)?)
}

pub async fn groups_index(
    State(state): State<AppState>,
    AdminUser(current): AdminUser,
) -> Result<Html<String>, AppError> {
    let flash = state.sessions.take_flash(&current.token);
    render_groups(&state, &current, flash, "", &FormErrors::new()).await
}

pub async fn create_group(
    State(state): State<AppState>,
    AdminUser(current): AdminUser,
    Form(form): Form<NameForm>,
) -> Result<Response, AppError> {
    match groups::create_group_in_db(&state.pool, &form.name).await {
        Ok(_) => {
            state
                .sessions
                .set_flash(&current.token, message("Group", Action::Create));
            Ok(redirect_to("/admin/groups"))
        }
        Err(StoreError::Invalid(errors)) => {
            let page = render_groups(&state, &current, None, &form.name, &errors).await?;
            Ok(unprocessable(page))
        }
        Err(StoreError::Database(err)) => Err(err.into()),
    }
}
