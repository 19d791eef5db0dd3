// Copyright (c) 2025 sbksba
//
// This software is licensed under the terms of the MIT License.
// See the LICENSE file in the project root for the full license text.

//! Domain types shared by the server and its tests.
//!
//! Database rows derive `sqlx::FromRow` so the server can load them
//! directly; form payloads are kept separate from the stored models and
//! carry their own validation.
pub mod errors;
pub mod task;
pub mod user;

pub use errors::{FieldError, FormErrors};
pub use task::{
    Label, SortColumn, SortDirection, Task, TaskForm, TaskOrder, TaskPriority, TaskQuery,
    TaskSearch, TaskStatus, start_of_day,
};
pub use user::{Group, Role, User, UserForm, validate_name};
