// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.
use crate::errors::FormErrors;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

pub const EMAIL_MAX_LENGTH: u64 = 255;
pub const NAME_MAX_LENGTH: u64 = 255;
pub const PASSWORD_MIN_LENGTH: usize = 6;

const USER_FIELDS: [&str; 5] = ["email", "name", "password", "role_id", "group_id"];

/// Presence check shared by every text field. Surrounding spaces do not
/// count as content.
pub(crate) fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut error = ValidationError::new("blank");
        error.message = Some("can't be blank".into());
        return Err(error);
    }
    Ok(())
}

/// A blank password is allowed here: on update it keeps the current one,
/// and on create its presence is checked separately.
fn password_length(value: &str) -> Result<(), ValidationError> {
    if !value.is_empty() && value.chars().count() < PASSWORD_MIN_LENGTH {
        let mut error = ValidationError::new("too_short");
        error.message = Some(
            format!("is too short (minimum is {PASSWORD_MIN_LENGTH} characters)").into(),
        );
        return Err(error);
    }
    Ok(())
}

/// A registered user. The password digest never leaves the server.
#[derive(Serialize, Deserialize, Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    #[serde(skip)]
    pub password_digest: String,
    pub role_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Permission level of a user. `code` is the stable identifier
/// (`staff`, `admin`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Role {
    pub id: i64,
    pub code: String,
    pub name: String,
    pub admin: bool,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

/// Data submitted from the admin user form.
#[derive(Deserialize, Serialize, Debug, Clone, Default, Validate)]
pub struct UserForm {
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    #[validate(length(max = EMAIL_MAX_LENGTH, message = "is too long (maximum is 255 characters)"))]
    #[validate(email(message = "is invalid"))]
    pub email: String,
    #[serde(default)]
    #[validate(custom(function = "not_blank"))]
    #[validate(length(max = NAME_MAX_LENGTH, message = "is too long (maximum is 255 characters)"))]
    pub name: String,
    #[serde(default, skip_serializing)]
    #[validate(custom(function = "password_length"))]
    pub password: String,
    #[serde(default)]
    #[validate(required(message = "can't be blank"))]
    pub role_id: Option<i64>,
    #[serde(default)]
    pub group_id: Option<i64>,
}

impl UserForm {
    pub fn from_user(user: &User, group_id: Option<i64>) -> Self {
        Self {
            email: user.email.clone(),
            name: user.name.clone(),
            password: String::new(),
            role_id: Some(user.role_id),
            group_id,
        }
    }

    /// Normalized email used for storage and uniqueness checks.
    pub fn email(&self) -> String {
        self.email.trim().to_lowercase()
    }

    /// Presence, length and format rules, run on the trimmed values.
    /// Uniqueness and role existence need the database and are checked by
    /// the server.
    pub fn check(&self, password_required: bool) -> FormErrors {
        let normalized = UserForm {
            email: self.email(),
            name: self.name.trim().to_string(),
            ..self.clone()
        };
        let mut errors = match normalized.validate() {
            Ok(()) => FormErrors::new(),
            Err(invalid) => FormErrors::from_validation(&invalid, &USER_FIELDS),
        };

        if password_required && self.password.is_empty() {
            errors.add("password", "can't be blank");
        }
        errors
    }
}

#[derive(Validate)]
struct NamedRecord {
    #[validate(custom(function = "not_blank"))]
    #[validate(length(max = NAME_MAX_LENGTH, message = "is too long (maximum is 255 characters)"))]
    name: String,
}

/// Validates the name of a group or a label.
pub fn validate_name(name: &str) -> FormErrors {
    let record = NamedRecord {
        name: name.trim().to_string(),
    };
    match record.validate() {
        Ok(()) => FormErrors::new(),
        Err(invalid) => FormErrors::from_validation(&invalid, &["name"]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_form() -> UserForm {
        UserForm {
            email: "taro@example.com".to_string(),
            name: "Taro".to_string(),
            password: "password".to_string(),
            role_id: Some(1),
            group_id: None,
        }
    }

    #[test]
    fn test_valid_form() {
        assert!(valid_form().check(true).is_empty());
    }

    #[test]
    fn test_role_is_required() {
        let form = UserForm {
            role_id: None,
            ..valid_form()
        };
        assert_eq!(form.check(true).messages("role_id"), ["can't be blank"]);
    }

    #[test]
    fn test_email_rules() {
        let mut form = valid_form();
        form.email = String::new();
        let errors = form.check(true);
        assert!(errors.messages("email").iter().any(|m| m == "can't be blank"));

        form.email = "  taro@example.com ".to_string();
        assert!(!form.check(true).has("email"));

        form.email = format!("{}@test.com", "a".repeat(255));
        assert!(form.check(true).has("email"));

        form.email = "@test.com".to_string();
        assert!(form.check(true).has("email"));

        form.email = "aaaaaaa".to_string();
        assert!(form.check(true).has("email"));
    }

    #[test]
    fn test_name_rules() {
        let mut form = valid_form();
        form.name = String::new();
        assert!(form.check(true).has("name"));

        form.name = "a".repeat(256);
        assert!(form.check(true).has("name"));

        form.name = "a".repeat(255);
        assert!(!form.check(true).has("name"));
    }

    #[test]
    fn test_password_only_required_on_create() {
        let mut form = valid_form();
        form.password = String::new();
        assert!(form.check(true).has("password"));
        assert!(!form.check(false).has("password"));

        form.password = "abc".to_string();
        assert_eq!(
            form.check(false).messages("password"),
            ["is too short (minimum is 6 characters)"]
        );

        form.password = "abcdef".to_string();
        assert!(form.check(true).is_empty());
    }

    #[test]
    fn test_email_is_normalized() {
        let form = UserForm {
            email: "  Taro@Example.COM ".to_string(),
            ..valid_form()
        };
        assert_eq!(form.email(), "taro@example.com");
    }

    #[test]
    fn test_validate_name() {
        assert!(validate_name("ops").is_empty());
        assert_eq!(validate_name(" ").messages("name"), ["can't be blank"]);
        assert!(validate_name(&"a".repeat(256)).has("name"));
    }
}
