//! Read-side filtered view of a board
//!
//! The board UI hides tasks whose status is in a configured set (by default
//! `NOT_STARTED` submissions). Drag gestures in such a UI report positions in
//! the filtered list; [`BoardView::task_drag`] maps them back to storage
//! positions before they reach the reducer.

use crate::error::{KanbanError, Result};
use crate::types::{Board, Column, ColumnId, DragEvent, Task, TaskId, TaskStatus};
use std::collections::HashSet;

/// Which tasks the board display suppresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskFilter {
    hidden: HashSet<String>,
}

impl TaskFilter {
    /// Hide tasks whose status is any of `statuses`
    pub fn hiding<I, S>(statuses: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            hidden: statuses.into_iter().map(Into::into).collect(),
        }
    }

    /// Show everything
    pub fn all() -> Self {
        Self {
            hidden: HashSet::new(),
        }
    }

    pub fn is_visible(&self, task: &Task) -> bool {
        !self.hidden.contains(task.status.as_str())
    }
}

impl Default for TaskFilter {
    fn default() -> Self {
        Self::hiding([TaskStatus::NOT_STARTED])
    }
}

/// One column as displayed
#[derive(Debug)]
pub struct ColumnView<'a> {
    pub column: &'a Column,
    pub tasks: Vec<&'a Task>,
}

/// The board as displayed: columns in order, visible tasks only
#[derive(Debug)]
pub struct BoardView<'a> {
    board: &'a Board,
    filter: &'a TaskFilter,
    pub columns: Vec<ColumnView<'a>>,
}

impl<'a> BoardView<'a> {
    pub fn new(board: &'a Board, filter: &'a TaskFilter) -> Self {
        let columns = board
            .columns
            .iter()
            .map(|column| ColumnView {
                column,
                tasks: column
                    .task_ids
                    .iter()
                    .filter_map(|id| board.task(id))
                    .filter(|task| filter.is_visible(task))
                    .collect(),
            })
            .collect();
        Self {
            board,
            filter,
            columns,
        }
    }

    pub fn column(&self, id: &ColumnId) -> Option<&ColumnView<'a>> {
        self.columns.iter().find(|c| &c.column.id == id)
    }

    /// Number of visible tasks on the board
    pub fn visible_count(&self) -> usize {
        self.columns.iter().map(|c| c.tasks.len()).sum()
    }

    /// Translate a drop expressed in visible positions into a storage drop
    pub fn task_drag(
        &self,
        task_id: &TaskId,
        source_column: &ColumnId,
        visible_source: usize,
        dest_column: &ColumnId,
        visible_dest: usize,
    ) -> Result<DragEvent> {
        let source = self.board.column(source_column).ok_or_else(|| {
            KanbanError::invalid_drag(format!("source column '{}' does not exist", source_column))
        })?;
        let dest = self.board.column(dest_column).ok_or_else(|| {
            KanbanError::invalid_drag(format!(
                "destination column '{}' does not exist",
                dest_column
            ))
        })?;

        let shown = self
            .column(source_column)
            .and_then(|c| c.tasks.get(visible_source))
            .map(|t| &t.id);
        if shown != Some(task_id) {
            return Err(KanbanError::invalid_drag(format!(
                "task '{}' is not shown at position {} of column '{}'",
                task_id, visible_source, source_column
            )));
        }
        let source_index = source.position_of(task_id).ok_or_else(|| {
            KanbanError::invalid_drag(format!(
                "task '{}' is not in column '{}'",
                task_id, source_column
            ))
        })?;

        // Destination list as the reducer sees it: dragged task already removed
        let remaining: Vec<&TaskId> = dest.task_ids.iter().filter(|id| *id != task_id).collect();
        let visible: Vec<usize> = remaining
            .iter()
            .enumerate()
            .filter(|(_, id)| self.board.task(id).is_some_and(|t| self.filter.is_visible(t)))
            .map(|(index, _)| index)
            .collect();
        let dest_index = visible.get(visible_dest).copied().unwrap_or(remaining.len());

        Ok(DragEvent::task(
            task_id.clone(),
            source_column.clone(),
            source_index,
            dest_column.clone(),
            dest_index,
        ))
    }
}
