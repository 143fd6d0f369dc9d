use serde::{Deserialize, Serialize};

/// Document field holding the completion flag. Toggling writes only this field.
pub const FIELD_IS_COMPLETED: &str = "isCompleted";
/// Document field used as the sole sort key of the task list.
pub const FIELD_CREATED_AT: &str = "createdAt";

/// One to-do item as stored in the `tasks` collection.
///
/// Every field has a default so that partially written documents still
/// decode, the same way the backend hands back whatever it holds.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub description: String,
    /// `D/M/YYYY`, no zero padding.
    pub deadline: String,
    #[serde(rename = "isCompleted")]
    pub is_completed: bool,
    /// Milliseconds since the Unix epoch.
    #[serde(rename = "createdAt")]
    pub created_at: i64,
}

impl Task {
    pub fn new(
        id: String,
        title: String,
        description: String,
        deadline: String,
        created_at: i64,
    ) -> Self {
        Self {
            id,
            title,
            description,
            deadline,
            is_completed: false,
            created_at,
        }
    }

    /// Copy of this task with the user-editable fields replaced.
    /// `id`, `created_at` and `is_completed` carry over untouched.
    pub fn with_details(&self, title: String, description: String, deadline: String) -> Self {
        Self {
            title,
            description,
            deadline,
            ..self.clone()
        }
    }
}
