// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::auth::CurrentUser;

use anyhow::Context as _;
use axum::response::Html;
use chrono::{DateTime, Utc};
use common::{FormErrors, Label, Task, TaskPriority, TaskStatus};
use lazy_static::lazy_static;
use serde::Serialize;
use tera::{Context, Tera};

const TEMPLATE_SOURCES: [(&str, &str); 11] = [
    ("layout.html", include_str!("../templates/layout.html")),
    ("error.html", include_str!("../templates/error.html")),
    ("login.html", include_str!("../templates/login.html")),
    ("tasks/index.html", include_str!("../templates/tasks/index.html")),
    ("tasks/show.html", include_str!("../templates/tasks/show.html")),
    ("tasks/form.html", include_str!("../templates/tasks/form.html")),
    ("labels/index.html", include_str!("../templates/labels/index.html")),
    ("admin/users/index.html", include_str!("../templates/admin/users/index.html")),
    ("admin/users/form.html", include_str!("../templates/admin/users/form.html")),
    ("admin/groups/index.html", include_str!("../templates/admin/groups/index.html")),
    ("macros.html", include_str!("../templates/macros.html")),
];

lazy_static! {
    static ref TEMPLATES: Tera = {
        let mut tera = Tera::default();
        tera.add_raw_templates(TEMPLATE_SOURCES)
            .expect("built-in templates must parse");
        tera
    };
}

/// Renders one of the built-in templates.
pub fn render(name: &str, context: &Context) -> anyhow::Result<Html<String>> {
    TEMPLATES
        .render(name, context)
        .map(Html)
        .with_context(|| format!("Failed to render template {name}"))
}

#[derive(Serialize)]
struct NavUser<'a> {
    id: i64,
    name: &'a str,
    admin: bool,
}

/// Context shared by every page: the signed-in user and the pending flash.
pub fn page_context(current: Option<&CurrentUser>, flash: Option<String>) -> Context {
    let mut context = Context::new();
    if let Some(current) = current {
        context.insert(
            "current_user",
            &NavUser {
                id: current.user.id,
                name: &current.user.name,
                admin: current.is_admin(),
            },
        );
    }
    context.insert("flash", &flash);
    context.insert("errors", &FormErrors::new());
    context
}

#[derive(Serialize, Debug, Clone)]
pub struct Choice {
    pub value: String,
    pub label: String,
}

pub fn status_choices() -> Vec<Choice> {
    TaskStatus::ALL
        .iter()
        .map(|s| Choice {
            value: s.as_str().to_string(),
            label: s.label().to_string(),
        })
        .collect()
}

pub fn priority_choices() -> Vec<Choice> {
    TaskPriority::ALL
        .iter()
        .map(|p| Choice {
            value: p.as_str().to_string(),
            label: p.label().to_string(),
        })
        .collect()
}

/// A task as displayed in tables and on the detail page.
#[derive(Serialize, Debug, Clone)]
pub struct TaskView {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: &'static str,
    pub status_label: &'static str,
    pub priority: &'static str,
    pub priority_label: &'static str,
    pub deadline: Option<String>,
    pub expired: bool,
    pub labels: Vec<Label>,
}

impl TaskView {
    pub fn new(task: &Task, now: DateTime<Utc>) -> Self {
        Self {
            id: task.id,
            title: task.title.clone(),
            description: task.description.clone(),
            status: task.status.as_str(),
            status_label: task.status.label(),
            priority: task.priority.as_str(),
            priority_label: task.priority.label(),
            deadline: task.deadline.map(|d| d.format("%Y-%m-%d %H:%M").to_string()),
            expired: task.is_expired(now),
            labels: task.labels.clone(),
        }
    }

    pub fn list(tasks: &[Task], now: DateTime<Utc>) -> Vec<Self> {
        tasks.iter().map(|t| Self::new(t, now)).collect()
    }
}
