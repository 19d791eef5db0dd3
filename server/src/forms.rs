// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Decoding of `application/x-www-form-urlencoded` bodies.
//!
//! Forms arrive as raw `(name, value)` pairs so that repeated keys
//! (label checkboxes) survive and a malformed value becomes a field error
//! instead of a rejected request.
use chrono::{DateTime, NaiveDateTime, Utc};
use common::{FormErrors, Task, TaskForm, TaskPriority, TaskStatus, UserForm};
use serde::{Deserialize, Serialize};

pub type FormPairs = Vec<(String, String)>;

/// Format of `<input type="datetime-local">`.
const DATETIME_LOCAL: &str = "%Y-%m-%dT%H:%M";

fn first<'a>(pairs: &'a FormPairs, name: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(key, _)| key == name)
        .map(|(_, value)| value.as_str())
}

fn text(pairs: &FormPairs, name: &str) -> String {
    first(pairs, name).unwrap_or_default().to_string()
}

/// Blank means "none"; anything else must be an integer id.
fn parse_id(raw: &str, field: &str, errors: &mut FormErrors) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match raw.parse() {
        Ok(id) => Some(id),
        Err(_) => {
            errors.add(field, "is invalid");
            None
        }
    }
}

fn optional_id(pairs: &FormPairs, name: &str, errors: &mut FormErrors) -> Option<i64> {
    parse_id(first(pairs, name).unwrap_or_default(), name, errors)
}

/// Accepts the browser's `datetime-local` value (with or without seconds)
/// or a full RFC 3339 timestamp. Local values are read as UTC.
pub fn parse_deadline(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(at) = DateTime::parse_from_rfc3339(raw) {
        return Some(at.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, DATETIME_LOCAL)
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S"))
        .ok()
        .map(|naive| naive.and_utc())
}

pub fn format_deadline(deadline: DateTime<Utc>) -> String {
    deadline.format(DATETIME_LOCAL).to_string()
}

/// Task form exactly as submitted, kept for re-rendering.
#[derive(Serialize, Debug, Clone, Default)]
pub struct TaskFormInput {
    pub title: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub deadline: String,
    pub user_id: String,
    pub label_ids: Vec<i64>,
    /// Submitted label values that are not ids.
    #[serde(skip)]
    pub rejected_label_ids: Vec<String>,
}

impl TaskFormInput {
    pub fn from_pairs(pairs: &FormPairs) -> Self {
        let mut label_ids = Vec::new();
        let mut rejected_label_ids = Vec::new();
        for (_, value) in pairs.iter().filter(|(key, _)| key == "label_ids") {
            match value.trim().parse::<i64>() {
                Ok(id) => label_ids.push(id),
                Err(_) => rejected_label_ids.push(value.clone()),
            }
        }

        Self {
            title: text(pairs, "title"),
            description: text(pairs, "description"),
            status: text(pairs, "status"),
            priority: text(pairs, "priority"),
            deadline: text(pairs, "deadline"),
            user_id: text(pairs, "user_id"),
            label_ids,
            rejected_label_ids,
        }
    }

    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone().unwrap_or_default(),
            status: task.status.as_str().to_string(),
            priority: task.priority.as_str().to_string(),
            deadline: task.deadline.map(format_deadline).unwrap_or_default(),
            user_id: task.user_id.map(|id| id.to_string()).unwrap_or_default(),
            label_ids: task.labels.iter().map(|l| l.id).collect(),
            rejected_label_ids: Vec::new(),
        }
    }

    /// Converts to a [`TaskForm`]; values that cannot be decoded are
    /// reported in the returned errors and left unset.
    pub fn parse(&self) -> (TaskForm, FormErrors) {
        let mut errors = FormErrors::new();

        let status = match self.status.trim() {
            "" => None,
            raw => raw
                .parse::<TaskStatus>()
                .map_err(|_| errors.add("status", "is invalid"))
                .ok(),
        };
        let priority = match self.priority.trim() {
            "" => None,
            raw => raw
                .parse::<TaskPriority>()
                .map_err(|_| errors.add("priority", "is invalid"))
                .ok(),
        };
        let deadline = match self.deadline.trim() {
            "" => None,
            raw => {
                let parsed = parse_deadline(raw);
                if parsed.is_none() {
                    errors.add("deadline", "is not a valid date and time");
                }
                parsed
            }
        };

        if !self.rejected_label_ids.is_empty() {
            errors.add("label_ids", "is invalid");
        }

        let form = TaskForm {
            title: self.title.clone(),
            description: Some(self.description.clone()),
            status,
            priority,
            deadline,
            user_id: parse_id(&self.user_id, "user_id", &mut errors),
            label_ids: self.label_ids.clone(),
        };
        (form, errors)
    }
}

/// Admin user form as submitted.
pub fn parse_user_form(pairs: &FormPairs) -> (UserForm, FormErrors) {
    let mut errors = FormErrors::new();
    let form = UserForm {
        email: text(pairs, "email"),
        name: text(pairs, "name"),
        password: text(pairs, "password"),
        role_id: optional_id(pairs, "role_id", &mut errors),
        group_id: optional_id(pairs, "group_id", &mut errors),
    };
    (form, errors)
}

#[derive(Deserialize, Debug)]
pub struct LoginForm {
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize, Debug)]
pub struct NameForm {
    #[serde(default)]
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn pairs(items: &[(&str, &str)]) -> FormPairs {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_parse_deadline_formats() {
        let expected = Utc.with_ymd_and_hms(2026, 10, 20, 9, 30, 0).unwrap();
        assert_eq!(parse_deadline("2026-10-20T09:30"), Some(expected));
        assert_eq!(parse_deadline("2026-10-20T09:30:00"), Some(expected));
        assert_eq!(parse_deadline("2026-10-20T09:30:00Z"), Some(expected));
        assert_eq!(parse_deadline("tomorrow"), None);
        assert_eq!(format_deadline(expected), "2026-10-20T09:30");
    }

    #[test]
    fn test_task_form_from_pairs() {
        let input = TaskFormInput::from_pairs(&pairs(&[
            ("title", "Write report"),
            ("status", "doing"),
            ("priority", "high"),
            ("deadline", "2026-10-20T09:30"),
            ("user_id", "3"),
            ("label_ids", "1"),
            ("label_ids", "4"),
        ]));
        let (form, errors) = input.parse();

        assert!(errors.is_empty());
        assert_eq!(form.status, Some(TaskStatus::Doing));
        assert_eq!(form.priority, Some(TaskPriority::High));
        assert_eq!(form.user_id, Some(3));
        assert_eq!(form.label_ids, vec![1, 4]);
        assert!(form.deadline.is_some());
    }

    #[test]
    fn test_task_form_reports_undecodable_values() {
        let input = TaskFormInput::from_pairs(&pairs(&[
            ("title", "x"),
            ("status", "finished"),
            ("priority", ""),
            ("deadline", "someday"),
            ("user_id", "abc"),
            ("label_ids", "2"),
            ("label_ids", "two"),
        ]));
        let (form, errors) = input.parse();

        assert!(errors.has("status"));
        assert!(errors.has("deadline"));
        assert!(errors.has("user_id"));
        assert_eq!(errors.messages("label_ids"), ["is invalid"]);
        assert_eq!(form.label_ids, vec![2]);
        assert!(!errors.has("priority"));
        assert_eq!(form.priority, None);
    }

    #[test]
    fn test_user_form_from_pairs() {
        let (form, errors) = parse_user_form(&pairs(&[
            ("email", "taro@example.com"),
            ("name", "Taro"),
            ("role_id", "999"),
            ("group_id", ""),
        ]));
        assert!(errors.is_empty());
        assert_eq!(form.role_id, Some(999));
        assert_eq!(form.group_id, None);
    }
}
