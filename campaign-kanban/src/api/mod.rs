//! Persistence collaborator
//!
//! The controller talks to storage only through [`BoardApi`]. Two backends
//! ship with the crate: [`MemoryApi`] keeps a server-side board in memory and
//! can inject failures, [`FileApi`] stores the board in a `.kanban` directory.

mod file;
mod memory;

pub use file::FileApi;
pub use memory::MemoryApi;

use crate::error::KanbanError;
use crate::types::{Board, Column, ColumnId, Task, TaskId};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;

/// Result type for persistence calls
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Errors a persistence backend can report
#[derive(Debug, Error)]
pub enum ApiError {
    /// The call never reached the backend or the connection dropped
    #[error("transport error: {message}")]
    Transport { message: String },

    /// The backend refused the change
    #[error("rejected: {message}")]
    Rejected { message: String },

    /// The backend has no such entity
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// The call did not complete in time
    #[error("timed out after {elapsed_ms}ms")]
    Timeout { elapsed_ms: u64 },

    /// Another writer holds the storage lock
    #[error("lock busy - another operation in progress")]
    LockBusy,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ApiError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
        }
    }

    pub fn rejected(message: impl Into<String>) -> Self {
        Self::Rejected {
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.into(),
        }
    }

    /// Check if this is a retryable error
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport { .. } | Self::Timeout { .. } | Self::LockBusy
        )
    }
}

impl From<KanbanError> for ApiError {
    fn from(err: KanbanError) -> Self {
        match err {
            KanbanError::TaskNotFound { id } => Self::not_found("task", id),
            KanbanError::ColumnNotFound { id } => Self::not_found("column", id),
            KanbanError::Io(err) => Self::Io(err),
            KanbanError::Json(err) => Self::Json(err),
            KanbanError::Persistence { source, .. } => source,
            other => Self::rejected(other.to_string()),
        }
    }
}

/// Storage backend for a board
#[async_trait]
pub trait BoardApi: Send + Sync {
    /// Load the full board snapshot
    async fn fetch_board(&self) -> ApiResult<Board>;

    /// Persist a new task; returns the stored task
    async fn create_task(&self, column_id: &ColumnId, task: &Task) -> ApiResult<Task>;

    /// Replace a task's content
    async fn update_task(&self, task: &Task) -> ApiResult<()>;

    async fn delete_task(&self, column_id: &ColumnId, task_id: &TaskId) -> ApiResult<()>;

    /// Move a task to `dest_index` of `dest_column`
    async fn move_task(
        &self,
        task_id: &TaskId,
        dest_column: &ColumnId,
        dest_index: usize,
    ) -> ApiResult<()>;

    /// Persist a new column; returns the stored column
    async fn create_column(&self, column: &Column) -> ApiResult<Column>;

    /// Rename a column
    async fn update_column(&self, column_id: &ColumnId, name: &str) -> ApiResult<()>;

    /// Delete every task in a column
    async fn clear_column(&self, column_id: &ColumnId) -> ApiResult<()>;

    /// Delete a column and its tasks
    async fn delete_column(&self, column_id: &ColumnId) -> ApiResult<()>;

    /// Move a column to `dest_index` in the column order
    async fn move_column(&self, column_id: &ColumnId, dest_index: usize) -> ApiResult<()>;
}

/// An owned persistence call, ready to be sent from a spawned task
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    CreateTask { column_id: ColumnId, task: Task },
    UpdateTask { task: Task },
    DeleteTask { column_id: ColumnId, task_id: TaskId },
    MoveTask {
        task_id: TaskId,
        source_column: ColumnId,
        dest_column: ColumnId,
        dest_index: usize,
    },
    CreateColumn { column: Column },
    UpdateColumn { column_id: ColumnId, name: String },
    ClearColumn { column_id: ColumnId },
    DeleteColumn { column_id: ColumnId },
    MoveColumn { column_id: ColumnId, dest_index: usize },
}

/// What the backend handed back for a successful call
#[derive(Debug, Clone, PartialEq)]
pub enum Echo {
    None,
    Task(Task),
    Column(Column),
}

impl Request {
    /// Canonical op string (e.g. "move task")
    pub fn op(&self) -> &'static str {
        match self {
            Self::CreateTask { .. } => "create task",
            Self::UpdateTask { .. } => "update task",
            Self::DeleteTask { .. } => "delete task",
            Self::MoveTask { .. } => "move task",
            Self::CreateColumn { .. } => "create column",
            Self::UpdateColumn { .. } => "update column",
            Self::ClearColumn { .. } => "clear column",
            Self::DeleteColumn { .. } => "delete column",
            Self::MoveColumn { .. } => "move column",
        }
    }

    /// Columns whose persisted state this call changes
    pub fn columns(&self) -> Vec<ColumnId> {
        match self {
            Self::CreateTask { column_id, .. }
            | Self::DeleteTask { column_id, .. }
            | Self::UpdateColumn { column_id, .. }
            | Self::ClearColumn { column_id }
            | Self::DeleteColumn { column_id }
            | Self::MoveColumn { column_id, .. } => vec![column_id.clone()],
            Self::UpdateTask { task } => vec![task.column_id.clone()],
            Self::MoveTask {
                source_column,
                dest_column,
                ..
            } => {
                if source_column == dest_column {
                    vec![source_column.clone()]
                } else {
                    vec![source_column.clone(), dest_column.clone()]
                }
            }
            Self::CreateColumn { column } => vec![column.id.clone()],
        }
    }

    /// Point the call at a task's new id
    pub fn rekey_task(&mut self, from: &TaskId, to: &TaskId) {
        match self {
            Self::CreateTask { task, .. } | Self::UpdateTask { task } => task.id.retarget(from, to),
            Self::DeleteTask { task_id, .. } | Self::MoveTask { task_id, .. } => {
                task_id.retarget(from, to)
            }
            Self::CreateColumn { column } => {
                for id in &mut column.task_ids {
                    id.retarget(from, to);
                }
            }
            _ => {}
        }
    }

    /// Point the call at a column's new id
    pub fn rekey_column(&mut self, from: &ColumnId, to: &ColumnId) {
        match self {
            Self::CreateTask { column_id, task } => {
                column_id.retarget(from, to);
                task.column_id.retarget(from, to);
            }
            Self::UpdateTask { task } => task.column_id.retarget(from, to),
            Self::MoveTask {
                source_column,
                dest_column,
                ..
            } => {
                source_column.retarget(from, to);
                dest_column.retarget(from, to);
            }
            Self::CreateColumn { column } => column.id.retarget(from, to),
            Self::DeleteTask { column_id, .. }
            | Self::UpdateColumn { column_id, .. }
            | Self::ClearColumn { column_id }
            | Self::DeleteColumn { column_id }
            | Self::MoveColumn { column_id, .. } => column_id.retarget(from, to),
        }
    }

    /// JSON description of the call, used for activity logs
    pub fn to_json(&self) -> Value {
        match self {
            Self::CreateTask { column_id, task } => json!({ "column": column_id, "task": task }),
            Self::UpdateTask { task } => json!({ "task": task }),
            Self::DeleteTask { column_id, task_id } => {
                json!({ "column": column_id, "id": task_id })
            }
            Self::MoveTask {
                task_id,
                source_column,
                dest_column,
                dest_index,
            } => json!({
                "id": task_id,
                "from": source_column,
                "to": dest_column,
                "index": dest_index,
            }),
            Self::CreateColumn { column } => json!({ "column": column }),
            Self::UpdateColumn { column_id, name } => json!({ "id": column_id, "name": name }),
            Self::ClearColumn { column_id } | Self::DeleteColumn { column_id } => {
                json!({ "id": column_id })
            }
            Self::MoveColumn {
                column_id,
                dest_index,
            } => json!({ "id": column_id, "index": dest_index }),
        }
    }

    /// Send the call to a backend
    pub async fn send(self, api: Arc<dyn BoardApi>) -> ApiResult<Echo> {
        match self {
            Self::CreateTask { column_id, task } => {
                api.create_task(&column_id, &task).await.map(Echo::Task)
            }
            Self::UpdateTask { task } => api.update_task(&task).await.map(|_| Echo::None),
            Self::DeleteTask { column_id, task_id } => api
                .delete_task(&column_id, &task_id)
                .await
                .map(|_| Echo::None),
            Self::MoveTask {
                task_id,
                dest_column,
                dest_index,
                ..
            } => api
                .move_task(&task_id, &dest_column, dest_index)
                .await
                .map(|_| Echo::None),
            Self::CreateColumn { column } => api.create_column(&column).await.map(Echo::Column),
            Self::UpdateColumn { column_id, name } => api
                .update_column(&column_id, &name)
                .await
                .map(|_| Echo::None),
            Self::ClearColumn { column_id } => {
                api.clear_column(&column_id).await.map(|_| Echo::None)
            }
            Self::DeleteColumn { column_id } => {
                api.delete_column(&column_id).await.map(|_| Echo::None)
            }
            Self::MoveColumn {
                column_id,
                dest_index,
            } => api
                .move_column(&column_id, dest_index)
                .await
                .map(|_| Echo::None),
        }
    }
}
