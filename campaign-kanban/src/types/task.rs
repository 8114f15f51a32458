//! Task types: Task, TaskStatus, TaskPayload

use super::ids::{ColumnId, TaskId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Submission/workflow state of a task.
///
/// Free-form and independent of the owning column. The well-known values are
/// exposed as constants; anything else round-trips unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskStatus(String);

impl TaskStatus {
    pub const NOT_STARTED: &'static str = "NOT_STARTED";
    pub const IN_PROGRESS: &'static str = "IN_PROGRESS";
    pub const DONE: &'static str = "DONE";

    pub fn new(status: impl Into<String>) -> Self {
        Self(status.into())
    }

    pub fn not_started() -> Self {
        Self::new(Self::NOT_STARTED)
    }

    pub fn in_progress() -> Self {
        Self::new(Self::IN_PROGRESS)
    }

    pub fn done() -> Self {
        Self::new(Self::DONE)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::in_progress()
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TaskStatus {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// A task/card on the board
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Owning column
    pub column_id: ColumnId,
    /// Status tag linked to the owning column's name
    #[serde(default)]
    pub stage: String,
    pub name: String,
    #[serde(default)]
    pub status: TaskStatus,
    /// Opaque payload (description, due dates, assignees, ...)
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Task {
    /// Create a new task with a fresh id in the given column
    pub fn new(name: impl Into<String>, column_id: impl Into<ColumnId>) -> Self {
        Self {
            id: TaskId::new(),
            column_id: column_id.into(),
            stage: String::new(),
            name: name.into(),
            status: TaskStatus::default(),
            fields: Map::new(),
        }
    }

    /// Build a task from a creation payload
    pub fn from_payload(
        payload: TaskPayload,
        column_id: ColumnId,
        stage: impl Into<String>,
    ) -> Self {
        Self {
            id: TaskId::new(),
            column_id,
            stage: stage.into(),
            name: payload.name,
            status: payload.status.unwrap_or_default(),
            fields: payload.fields,
        }
    }

    pub fn with_id(mut self, id: impl Into<TaskId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_status(mut self, status: impl Into<TaskStatus>) -> Self {
        self.status = status.into();
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }

    /// Look up an opaque payload field
    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}

/// Input for task creation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskPayload {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl TaskPayload {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: None,
            fields: Map::new(),
        }
    }

    pub fn with_status(mut self, status: impl Into<TaskStatus>) -> Self {
        self.status = Some(status.into());
        self
    }

    pub fn with_field(mut self, key: impl Into<String>, value: Value) -> Self {
        self.fields.insert(key.into(), value);
        self
    }
}
