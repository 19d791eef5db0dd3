// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::auth::CurrentUser;
use crate::database::{StoreError, labels};
use crate::forms::NameForm;
use crate::handlers::{Action, AppError, message, redirect_to, unprocessable};
use crate::state::AppState;
use crate::views;

use axum::{
    extract::{Form, State},
    response::{Html, Response},
};
use common::FormErrors;

async fn render_index(
    state: &AppState,
    current: &CurrentUser,
    flash: Option<String>,
    name: &str,
    errors: &FormErrors,
) -> Result<Html<String>, AppError> {
    let mut context = views::page_context(Some(current), flash);
    context.insert("labels", &labels::list_labels_from_db(&state.pool).await?);
    context.insert("name", name);
    context.insert("errors", errors);
    Ok(views::render("labels/index.html", &context)?)
}

pub async fn index(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Html<String>, AppError> {
    let flash = state.sessions.take_flash(&current.token);
    render_index(&state, &current, flash, "", &FormErrors::new()).await
}

pub async fn create(
    State(state): State<AppState>,
    current: CurrentUser,
    Form(form): Form<NameForm>,
) -> Result<Response, AppError> {
    match labels::create_label_in_db(&state.pool, &form.name).await {
        Ok(_) => {
            state
                .sessions
                .set_flash(&current.token, message("Label", Action::Create));
            Ok(redirect_to("/labels"))
        }
        Err(StoreError::Invalid(errors)) => {
            let page = render_index(&state, &current, None, &form.name, &errors).await?;
            Ok(unprocessable(page))
        }
        Err(StoreError::Database(err)) => Err(err.into()),
    }
}
