// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::errors::FormErrors;
use crate::user::not_blank;
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

const TASK_FIELDS: [&str; 3] = ["title", "status", "priority"];

/// Workflow state of a task, stored as a small integer.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum TaskStatus {
    Todo = 1,
    Doing = 2,
    Done = 3,
}

impl TaskStatus {
    pub const ALL: [TaskStatus; 3] = [TaskStatus::Todo, TaskStatus::Doing, TaskStatus::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
        }
    }

    /// Human-readable name shown in selects and tables.
    pub fn label(&self) -> &'static str {
        match self {
            TaskStatus::Todo => "To do",
            TaskStatus::Doing => "Doing",
            TaskStatus::Done => "Done",
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| format!("unknown status: {s}"))
    }
}

/// Importance of a task. Ordering follows the stored integer, so
/// `Low < Medium < High`.
#[derive(
    Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, sqlx::Type,
)]
#[serde(rename_all = "snake_case")]
#[repr(i32)]
pub enum TaskPriority {
    Low = 1,
    Medium = 2,
    High = 3,
}

impl TaskPriority {
    pub const ALL: [TaskPriority; 3] = [TaskPriority::Low, TaskPriority::Medium, TaskPriority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            TaskPriority::Low => "low",
            TaskPriority::Medium => "medium",
            TaskPriority::High => "high",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            TaskPriority::Low => "Low",
            TaskPriority::Medium => "Medium",
            TaskPriority::High => "High",
        }
    }
}

impl FromStr for TaskPriority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskPriority::ALL
            .into_iter()
            .find(|priority| priority.as_str() == s)
            .ok_or_else(|| format!("unknown priority: {s}"))
    }
}

/// A tag that can be attached to many tasks.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Label {
    pub id: i64,
    pub name: String,
    pub color: String,
}

/// Represents a task within the system.
///
/// `labels` is not a column: it is filled by a second query after the
/// task rows are loaded.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub deadline: Option<DateTime<Utc>>,
    /// Assigned user, if any.
    pub user_id: Option<i64>,
    /// User who created the task.
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,

    #[sqlx(skip)]
    #[serde(default)]
    pub labels: Vec<Label>,
}

impl Task {
    /// A task is expired once its deadline lies strictly before `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|deadline| deadline < now)
    }

    pub fn is_visible_to(&self, user_id: i64) -> bool {
        self.owner_id == user_id || self.user_id == Some(user_id)
    }
}

/// Midnight UTC of the day containing `now`.
pub fn start_of_day(now: DateTime<Utc>) -> DateTime<Utc> {
    now.date_naive().and_time(NaiveTime::MIN).and_utc()
}

/// Data submitted to create or update a task, from the HTML form or the
/// JSON API. Missing enum values stay `None` so validation can report them.
#[derive(Deserialize, Serialize, Debug, Clone, Default, Validate)]
pub struct TaskForm {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    #[validate(required(message = "can't be blank"))]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    #[validate(required(message = "can't be blank"))]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub label_ids: Vec<i64>,
}

impl TaskForm {
    /// Prefills the edit form from a stored task.
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            status: Some(task.status),
            priority: Some(task.priority),
            deadline: task.deadline,
            user_id: task.user_id,
            label_ids: task.labels.iter().map(|l| l.id).collect(),
        }
    }

    /// Checks the rules that need no database access. The deadline rule is
    /// evaluated against `now` on every save, not only on creation.
    pub fn check(&self, now: DateTime<Utc>) -> FormErrors {
        let mut errors = match self.validate() {
            Ok(()) => FormErrors::new(),
            Err(invalid) => FormErrors::from_validation(&invalid, &TASK_FIELDS),
        };

        if let Some(deadline) = self.deadline {
            if deadline < start_of_day(now) {
                errors.add("deadline", "must be today or later");
            }
        }

        errors
    }

    pub fn description(&self) -> Option<&str> {
        self.description
            .as_deref()
            .map(str::trim)
            .filter(|d| !d.is_empty())
    }
}

/// Raw query string of the task listing. Every value is kept as text so a
/// blank `<select>` does not reject the whole request.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct TaskQuery {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub priority: Option<String>,
    #[serde(default)]
    pub sort: Option<String>,
    #[serde(default)]
    pub direction: Option<String>,
}

/// Filters applied by a task search. `title` is a substring match, the
/// other fields are exact matches. `None` means "no filter".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskSearch {
    pub title: Option<String>,
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    Deadline,
    Priority,
    CreatedAt,
}

impl SortColumn {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortColumn::Deadline => "deadline",
            SortColumn::Priority => "priority",
            SortColumn::CreatedAt => "created_at",
        }
    }
}

impl FromStr for SortColumn {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "deadline" => Ok(SortColumn::Deadline),
            "priority" => Ok(SortColumn::Priority),
            "created_at" => Ok(SortColumn::CreatedAt),
            other => Err(format!("unknown sort column: {other}")),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            SortDirection::Asc => "asc",
            SortDirection::Desc => "desc",
        }
    }
}

impl FromStr for SortDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "asc" => Ok(SortDirection::Asc),
            "desc" => Ok(SortDirection::Desc),
            other => Err(format!("unknown sort direction: {other}")),
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOrder {
    pub column: SortColumn,
    pub direction: SortDirection,
}

impl Default for TaskOrder {
    fn default() -> Self {
        Self {
            column: SortColumn::CreatedAt,
            direction: SortDirection::Desc,
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl TaskQuery {
    /// Blank or unknown values are dropped instead of rejected. A title
    /// that is not blank is matched exactly as submitted, spaces included.
    pub fn search(&self) -> TaskSearch {
        TaskSearch {
            title: self
                .title
                .clone()
                .filter(|title| !title.trim().is_empty()),
            status: non_blank(&self.status).and_then(|s| s.parse().ok()),
            priority: non_blank(&self.priority).and_then(|p| p.parse().ok()),
        }
    }

    pub fn order(&self) -> TaskOrder {
        let column = non_blank(&self.sort).and_then(|s| s.parse().ok());
        let direction = non_blank(&self.direction).and_then(|d| d.parse().ok());
        match column {
            Some(column) => TaskOrder {
                column,
                direction: direction.unwrap_or(SortDirection::Asc),
            },
            None => TaskOrder::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn valid_form() -> TaskForm {
        TaskForm {
            title: "Write report".to_string(),
            status: Some(TaskStatus::Todo),
            priority: Some(TaskPriority::Medium),
            ..TaskForm::default()
        }
    }

    #[test]
    fn test_valid_form_has_no_errors() {
        assert!(valid_form().check(Utc::now()).is_empty());
    }

    #[test]
    fn test_blank_title_status_priority_are_rejected() {
        let form = TaskForm {
            title: "   ".to_string(),
            ..TaskForm::default()
        };
        let errors = form.check(Utc::now());
        assert_eq!(errors.messages("title"), ["can't be blank"]);
        assert_eq!(errors.messages("status"), ["can't be blank"]);
        assert_eq!(errors.messages("priority"), ["can't be blank"]);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["title", "status", "priority"]);
    }

    #[test]
    fn test_deadline_earlier_today_is_allowed() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 15, 0, 0).unwrap();
        let form = TaskForm {
            deadline: Some(Utc.with_ymd_and_hms(2026, 3, 10, 0, 0, 0).unwrap()),
            ..valid_form()
        };
        assert!(form.check(now).is_empty());
    }

    #[test]
    fn test_deadline_before_today_is_rejected() {
        let now = Utc.with_ymd_and_hms(2026, 3, 10, 0, 30, 0).unwrap();
        let form = TaskForm {
            deadline: Some(now - Duration::hours(1)),
            ..valid_form()
        };
        let errors = form.check(now);
        assert_eq!(errors.messages("deadline"), ["must be today or later"]);
    }

    #[test]
    fn test_is_expired() {
        let now = Utc::now();
        let mut task = Task {
            id: 1,
            title: "t".to_string(),
            description: None,
            status: TaskStatus::Todo,
            priority: TaskPriority::Low,
            deadline: None,
            user_id: None,
            owner_id: 1,
            created_at: now,
            updated_at: now,
            labels: vec![],
        };
        assert!(!task.is_expired(now));
        task.deadline = Some(now - Duration::seconds(1));
        assert!(task.is_expired(now));
        task.deadline = Some(now + Duration::days(1));
        assert!(!task.is_expired(now));
    }

    #[test]
    fn test_query_drops_blank_and_unknown_values() {
        let query = TaskQuery {
            title: Some("  ".to_string()),
            status: Some("done".to_string()),
            priority: Some("urgent".to_string()),
            ..TaskQuery::default()
        };
        let search = query.search();
        assert_eq!(search.title, None);
        assert_eq!(search.status, Some(TaskStatus::Done));
        assert_eq!(search.priority, None);
    }

    #[test]
    fn test_query_keeps_title_spaces() {
        let query = TaskQuery {
            title: Some(" 1".to_string()),
            ..TaskQuery::default()
        };
        assert_eq!(query.search().title.as_deref(), Some(" 1"));
    }

    #[test]
    fn test_query_order() {
        assert_eq!(TaskQuery::default().order(), TaskOrder::default());

        let query = TaskQuery {
            sort: Some("priority".to_string()),
            direction: Some("desc".to_string()),
            ..TaskQuery::default()
        };
        assert_eq!(
            query.order(),
            TaskOrder {
                column: SortColumn::Priority,
                direction: SortDirection::Desc
            }
        );

        let query = TaskQuery {
            sort: Some("deadline".to_string()),
            ..TaskQuery::default()
        };
        assert_eq!(query.order().direction, SortDirection::Asc);
    }
}
