//! Board mutations
//!
//! Every mutation is a small command struct. Applying it changes the board in
//! place and returns an [`Applied`] record: the value for the caller, the
//! [`Undo`] that reverses exactly this change, and the persistence
//! [`Request`] to send (or `None` when nothing changed).

pub mod column;
pub mod task;

pub use column::{ClearColumn, CreateColumn, DeleteColumn, MoveColumn, UpdateColumn};
pub use task::{CreateTask, DeleteTask, MoveTask, UpdateTask};

use crate::api::Request;
use crate::error::{KanbanError, Result};
use crate::types::{Board, Column, ColumnId, Task, TaskId};
use tracing::debug;

/// A change that can be applied to a board
pub trait Mutation {
    type Output;

    /// Canonical op string (e.g. "clear column")
    fn op(&self) -> &'static str;

    fn apply(&self, board: &mut Board) -> Result<Applied<Self::Output>>;
}

/// Outcome of applying a mutation locally
#[derive(Debug, Clone)]
pub struct Applied<T> {
    pub value: T,
    pub undo: Undo,
    /// `None` when the mutation was a no-op and nothing needs persisting
    pub request: Option<Request>,
}

impl<T> Applied<T> {
    fn changed(value: T, undo: Undo, request: Request) -> Self {
        Self {
            value,
            undo,
            request: Some(request),
        }
    }

    fn unchanged(value: T) -> Self {
        Self {
            value,
            undo: Undo::None,
            request: None,
        }
    }
}

/// Targeted inverse of one applied mutation.
///
/// Undo records are applied against whatever the board looks like when the
/// failure arrives, so each one touches only the entities its mutation
/// touched and leaves later changes alone.
#[derive(Debug, Clone, PartialEq)]
pub enum Undo {
    None,
    /// Reverse a task creation
    RemoveTask { task_id: TaskId },
    /// Reverse a task deletion
    RestoreTask { task: Task, index: usize },
    /// Reverse a task move
    MoveTaskBack {
        task_id: TaskId,
        column_id: ColumnId,
        index: usize,
    },
    /// Reverse a column clear; tasks are in their original order
    RestoreTasks { tasks: Vec<(Task, usize)> },
    /// Reverse a column creation
    RemoveColumn { column_id: ColumnId },
    /// Reverse a column deletion
    RestoreColumn {
        column: Column,
        index: usize,
        tasks: Vec<Task>,
    },
    /// Reverse a column move
    MoveColumnBack { column_id: ColumnId, index: usize },
}

impl Undo {
    /// Point the record at a task's new id
    pub fn rekey_task(&mut self, from: &TaskId, to: &TaskId) {
        match self {
            Self::None | Self::RemoveColumn { .. } | Self::MoveColumnBack { .. } => {}
            Self::RemoveTask { task_id } | Self::MoveTaskBack { task_id, .. } => {
                task_id.retarget(from, to)
            }
            Self::RestoreTask { task, .. } => task.id.retarget(from, to),
            Self::RestoreTasks { tasks } => {
                for (task, _) in tasks {
                    task.id.retarget(from, to);
                }
            }
            Self::RestoreColumn { column, tasks, .. } => {
                for id in &mut column.task_ids {
                    id.retarget(from, to);
                }
                for task in tasks {
                    task.id.retarget(from, to);
                }
            }
        }
    }

    /// Point the record at a column's new id
    pub fn rekey_column(&mut self, from: &ColumnId, to: &ColumnId) {
        match self {
            Self::None | Self::RemoveTask { .. } => {}
            Self::RestoreTask { task, .. } => task.column_id.retarget(from, to),
            Self::MoveTaskBack { column_id, .. }
            | Self::RemoveColumn { column_id }
            | Self::MoveColumnBack { column_id, .. } => column_id.retarget(from, to),
            Self::RestoreTasks { tasks } => {
                for (task, _) in tasks {
                    task.column_id.retarget(from, to);
                }
            }
            Self::RestoreColumn { column, tasks, .. } => {
                column.id.retarget(from, to);
                for task in tasks {
                    task.column_id.retarget(from, to);
                }
            }
        }
    }

    /// Apply the inverse to the current board.
    ///
    /// Entities that have since disappeared or reappeared are skipped; the
    /// board stays valid either way.
    pub fn apply(self, board: &mut Board) -> Result<()> {
        match self {
            Self::None => Ok(()),
            Self::RemoveTask { task_id } => {
                board.remove_task(&task_id);
                Ok(())
            }
            Self::RestoreTask { task, index } => restore_task(board, task, index),
            Self::MoveTaskBack {
                task_id,
                column_id,
                index,
            } => {
                if board.column(&column_id).is_none() {
                    debug!(task = %task_id, "origin column gone, leaving task in place");
                    return Ok(());
                }
                let Some((mut task, _)) = board.remove_task(&task_id) else {
                    debug!(task = %task_id, "task gone before move rollback");
                    return Ok(());
                };
                task.column_id = column_id;
                board.insert_task(task, Some(index))
            }
            Self::RestoreTasks { tasks } => {
                for (task, index) in tasks {
                    restore_task(board, task, index)?;
                }
                Ok(())
            }
            Self::RemoveColumn { column_id } => {
                if let Some(index) = board.column_index(&column_id) {
                    let column = board.columns.remove(index);
                    for id in &column.task_ids {
                        board.tasks.remove(id);
                    }
                }
                Ok(())
            }
            Self::RestoreColumn {
                mut column,
                index,
                tasks,
            } => {
                if board.column(&column.id).is_some() {
                    return Err(KanbanError::duplicate_id("column", column.id.to_string()));
                }
                column.task_ids.clear();
                let at = index.min(board.columns.len());
                board.columns.insert(at, column);
                for task in tasks {
                    if board.task(&task.id).is_some() {
                        debug!(task = %task.id, "task already back on the board, skipping");
                        continue;
                    }
                    board.insert_task(task, None)?;
                }
                Ok(())
            }
            Self::MoveColumnBack { column_id, index } => {
                if let Some(from) = board.column_index(&column_id) {
                    let column = board.columns.remove(from);
                    let at = index.min(board.columns.len());
                    board.columns.insert(at, column);
                }
                Ok(())
            }
        }
    }
}

fn restore_task(board: &mut Board, task: Task, index: usize) -> Result<()> {
    if board.task(&task.id).is_some() {
        debug!(task = %task.id, "task already present, skipping restore");
        return Ok(());
    }
    if board.column(&task.column_id).is_none() {
        debug!(task = %task.id, column = %task.column_id, "column gone, cannot restore task");
        return Ok(());
    }
    board.insert_task(task, Some(index))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn board() -> Board {
        let mut board = Board::new("Test");
        board.columns = Board::default_columns();
        for (id, col) in [("t1", "todo"), ("t2", "todo"), ("t3", "done")] {
            board
                .insert_task(Task::new(id, col).with_id(id), None)
                .unwrap();
        }
        board
    }

    #[test]
    fn test_restore_task_goes_back_to_index() {
        let mut board = board();
        let before = board.clone();
        let (task, index) = board.remove_task(&"t1".into()).unwrap();

        Undo::RestoreTask { task, index }.apply(&mut board).unwrap();
        assert_eq!(board, before);
    }

    #[test]
    fn test_restore_task_skips_missing_column() {
        let mut board = board();
        let (task, index) = board.remove_task(&"t3".into()).unwrap();
        board.columns.retain(|c| c.id.as_str() != "done");

        Undo::RestoreTask { task, index }.apply(&mut board).unwrap();
        assert!(board.task(&"t3".into()).is_none());
        board.validate().unwrap();
    }

    #[test]
    fn test_move_back_leaves_later_changes() {
        let mut board = board();
        // t1 was moved to done; meanwhile t2 got renamed
        let (mut t1, _) = board.remove_task(&"t1".into()).unwrap();
        t1.column_id = "done".into();
        board.insert_task(t1, Some(0)).unwrap();
        board.task_mut(&"t2".into()).unwrap().name = "renamed".into();

        Undo::MoveTaskBack {
            task_id: "t1".into(),
            column_id: "todo".into(),
            index: 0,
        }
        .apply(&mut board)
        .unwrap();

        let todo = board.column(&"todo".into()).unwrap();
        assert_eq!(todo.task_ids, vec![TaskId::from("t1"), TaskId::from("t2")]);
        assert_eq!(board.task(&"t1".into()).unwrap().stage, "To Do");
        assert_eq!(board.task(&"t2".into()).unwrap().name, "renamed");
    }

    #[test]
    fn test_rekeyed_restore_uses_new_ids() {
        let mut board = board();
        let (task, index) = board.remove_task(&"t3".into()).unwrap();
        let mut undo = Undo::RestoreTask { task, index };
        board.rekey_column(&"done".into(), &"shipped".into()).unwrap();

        undo.rekey_task(&"t3".into(), &"srv-3".into());
        undo.rekey_column(&"done".into(), &"shipped".into());
        undo.apply(&mut board).unwrap();

        let restored = board.task(&"srv-3".into()).unwrap();
        assert_eq!(restored.column_id.as_str(), "shipped");
        board.validate().unwrap();
    }

    #[test]
    fn test_remove_column_drops_its_tasks() {
        let mut board = board();
        Undo::RemoveColumn {
            column_id: "todo".into(),
        }
        .apply(&mut board)
        .unwrap();
        assert!(board.column(&"todo".into()).is_none());
        assert_eq!(board.tasks.len(), 1);
        board.validate().unwrap();
    }
}
