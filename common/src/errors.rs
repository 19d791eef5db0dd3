// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use validator::{ValidationErrors, ValidationErrorsKind};

/// Field-level validation errors collected while checking a form.
///
/// Fields keep the order in which their first error was added, so a
/// re-rendered form lists problems top to bottom like the inputs.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct FormErrors {
    fields: Vec<FieldError>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: String,
    pub messages: Vec<String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        let message = message.into();
        match self.fields.iter_mut().find(|f| f.field == field) {
            Some(entry) => entry.messages.push(message),
            None => self.fields.push(FieldError {
                field: field.to_string(),
                messages: vec![message],
            }),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.iter().any(|f| f.field == field)
    }

    pub fn messages(&self, field: &str) -> &[String] {
        self.fields
            .iter()
            .find(|f| f.field == field)
            .map(|f| f.messages.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldError> {
        self.fields.iter()
    }

    pub fn merge(&mut self, other: FormErrors) {
        for entry in other.fields {
            for message in entry.messages {
                self.add(&entry.field, message);
            }
        }
    }

    /// Adds the fields of `other` that have no error yet. A value that
    /// could not be decoded already explains itself, so later checks on
    /// the same field are dropped.
    pub fn merge_missing(&mut self, other: FormErrors) {
        for entry in other.fields {
            if !self.has(&entry.field) {
                self.fields.push(entry);
            }
        }
    }

    /// Converts `validator` output, listing fields in `order` first and any
    /// others after them by name.
    pub fn from_validation(errors: &ValidationErrors, order: &[&str]) -> Self {
        let mut by_field: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (field, kind) in errors.errors() {
            if let ValidationErrorsKind::Field(list) = kind {
                let messages = list.iter().map(|error| match &error.message {
                    Some(message) => message.to_string(),
                    None => error.code.to_string(),
                });
                by_field
                    .entry(field.to_string())
                    .or_default()
                    .extend(messages);
            }
        }

        let mut result = FormErrors::new();
        for field in order {
            if let Some(messages) = by_field.remove(*field) {
                for message in messages {
                    result.add(field, message);
                }
            }
        }
        for (field, messages) in by_field {
            for message in messages {
                result.add(&field, message);
            }
        }
        result
    }

    /// Turns an empty collection into `Ok(())`.
    pub fn into_result(self) -> Result<(), FormErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }

    /// `{field: [messages]}` shape used by the JSON API.
    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.fields
            .iter()
            .map(|f| (f.field.clone(), f.messages.clone()))
            .collect()
    }
}

impl fmt::Display for FormErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .fields
            .iter()
            .map(|e| format!("{} {}", e.field, e.messages.join(", ")))
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_groups_messages_by_field() {
        let mut errors = FormErrors::new();
        errors.add("email", "can't be blank");
        errors.add("name", "can't be blank");
        errors.add("email", "is invalid");

        assert!(errors.has("email"));
        assert_eq!(errors.messages("email").len(), 2);
        assert_eq!(errors.iter().next().unwrap().field, "email");
        assert!(errors.messages("role_id").is_empty());
    }

    #[test]
    fn test_merge_missing_keeps_existing_fields() {
        let mut errors = FormErrors::new();
        errors.add("status", "is invalid");

        let mut later = FormErrors::new();
        later.add("status", "can't be blank");
        later.add("title", "can't be blank");
        errors.merge_missing(later);

        assert_eq!(errors.messages("status"), ["is invalid"]);
        assert_eq!(errors.messages("title"), ["can't be blank"]);
    }

    #[test]
    fn test_from_validation_follows_field_order() {
        let mut raw = ValidationErrors::new();
        let mut blank = validator::ValidationError::new("blank");
        blank.message = Some("can't be blank".into());
        raw.add("name", blank);
        raw.add("email", validator::ValidationError::new("email"));

        let errors = FormErrors::from_validation(&raw, &["email", "name"]);
        let fields: Vec<&str> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(fields, ["email", "name"]);
        assert_eq!(errors.messages("email"), ["email"]);
        assert_eq!(errors.messages("name"), ["can't be blank"]);
    }

    #[test]
    fn test_into_result() {
        assert!(FormErrors::new().into_result().is_ok());

        let mut errors = FormErrors::new();
        errors.add("title", "can't be blank");
        let err = errors.into_result().unwrap_err();
        assert_eq!(err.to_string(), "title can't be blank");
    }
}
