//! Drag gesture payloads

use super::ids::{ColumnId, TaskId};
use serde::{Deserialize, Serialize};

/// The item picked up by a drag gesture
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DragItem {
    Task { id: TaskId },
    Column { id: ColumnId },
}

/// A completed drop: where the dragged item came from and where it landed.
///
/// Indices are storage positions within the column's `task_ids` (or within
/// the column list for column drags). Use [`crate::BoardView::task_drag`] to
/// translate positions taken from a filtered view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DragEvent {
    Task {
        task_id: TaskId,
        source_column: ColumnId,
        source_index: usize,
        dest_column: ColumnId,
        dest_index: usize,
    },
    Column {
        column_id: ColumnId,
        source_index: usize,
        dest_index: usize,
    },
}

impl DragEvent {
    /// Drag a task between (or within) columns
    pub fn task(
        task_id: impl Into<TaskId>,
        source_column: impl Into<ColumnId>,
        source_index: usize,
        dest_column: impl Into<ColumnId>,
        dest_index: usize,
    ) -> Self {
        Self::Task {
            task_id: task_id.into(),
            source_column: source_column.into(),
            source_index,
            dest_column: dest_column.into(),
            dest_index,
        }
    }

    /// Reorder a column
    pub fn column(column_id: impl Into<ColumnId>, source_index: usize, dest_index: usize) -> Self {
        Self::Column {
            column_id: column_id.into(),
            source_index,
            dest_index,
        }
    }

    /// The item this event moves
    pub fn item(&self) -> DragItem {
        match self {
            Self::Task { task_id, .. } => DragItem::Task { id: task_id.clone() },
            Self::Column { column_id, .. } => DragItem::Column {
                id: column_id.clone(),
            },
        }
    }

    /// True when the drop lands exactly where the drag started
    pub fn is_in_place(&self) -> bool {
        match self {
            Self::Task {
                source_column,
                source_index,
                dest_column,
                dest_index,
                ..
            } => source_column == dest_column && source_index == dest_index,
            Self::Column {
                source_index,
                dest_index,
                ..
            } => source_index == dest_index,
        }
    }
}
