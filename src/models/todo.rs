//! Todo resource models.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum length of a todo title, in characters.
pub const MAX_TITLE_LEN: usize = 200;

/// A stored todo item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

/// Request body for creating a todo.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewTodo {
    pub title: Option<String>,
    #[serde(default)]
    pub completed: bool,
}

/// Request body for updating a todo. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TodoPatch {
    pub title: Option<String>,
    pub completed: Option<bool>,
}

/// Validate a title against the column constraints.
pub fn validate_title(title: &str) -> Result<(), String> {
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(format!("Title must be at most {} characters", MAX_TITLE_LEN));
    }
    Ok(())
}
