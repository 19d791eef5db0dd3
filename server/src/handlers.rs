// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
pub mod admin;
pub mod api;
pub mod labels;
pub mod sessions;
pub mod tasks;

use crate::views;
use axum::{
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
};

/// What was done to a record, for flash messages.
#[derive(Debug, Clone, Copy)]
pub enum Action {
    Create,
    Update,
    Delete,
}

/// Flash message such as "Task was successfully created.".
pub fn message(model: &str, action: Action) -> String {
    let verb = match action {
        Action::Create => "created",
        Action::Update => "updated",
        Action::Delete => "deleted",
    };
    format!("{model} was successfully {verb}.")
}

pub fn redirect_to(path: &str) -> Response {
    Redirect::to(path).into_response()
}

/// Re-renders a form that failed validation.
pub fn unprocessable(page: Html<String>) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, page).into_response()
}

/// Error returned by page handlers, shown as an HTML error page.
#[derive(Debug)]
pub struct AppError {
    code: StatusCode,
    message: String,
}

impl AppError {
    pub fn new(code: StatusCode, message: &str) -> Self {
        Self {
            code,
            message: message.to_string(),
        }
    }

    pub fn not_found(what: &str) -> Self {
        Self::new(StatusCode::NOT_FOUND, &format!("{what} not found."))
    }
}

/// Store and template failures become a generic 500 page; the cause is
/// only logged.
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Internal server error: {:?}", err);
        Self {
            code: StatusCode::INTERNAL_SERVER_ERROR,
            message: "An internal error occurred.".to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        tracing::error!(
            "Responding with error page: status_code={}, message={}",
            self.code.as_u16(),
            self.message
        );
        let mut context = views::page_context(None, None);
        context.insert("status", &self.code.as_u16());
        context.insert("message", &self.message);
        match views::render("error.html", &context) {
            Ok(page) => (self.code, page).into_response(),
            Err(err) => {
                tracing::error!("Failed to render error page: {:?}", err);
                (self.code, self.message).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message() {
        assert_eq!(
            message("Task", Action::Create),
            "Task was successfully created."
        );
        assert_eq!(
            message("User", Action::Delete),
            "User was successfully deleted."
        );
    }

    #[test]
    fn test_app_error_status() {
        let response = AppError::not_found("Task").into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);

        let response = AppError::from(anyhow::anyhow!("disk full")).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
