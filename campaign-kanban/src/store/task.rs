//! Task mutations

use super::{Applied, Mutation, Undo};
use crate::api::Request;
use crate::error::{KanbanError, Result};
use crate::reducer;
use crate::types::{Board, ColumnId, DragEvent, Task, TaskId, TaskPayload};

/// Create a task at the end of a column
#[derive(Debug, Clone)]
pub struct CreateTask {
    pub column_id: ColumnId,
    pub payload: TaskPayload,
}

impl CreateTask {
    pub fn new(column_id: impl Into<ColumnId>, payload: TaskPayload) -> Self {
        Self {
            column_id: column_id.into(),
            payload,
        }
    }
}

impl Mutation for CreateTask {
    type Output = Task;

    fn op(&self) -> &'static str {
        "create task"
    }

    fn apply(&self, board: &mut Board) -> Result<Applied<Task>> {
        let column = board.require_column(&self.column_id)?;
        let task = Task::from_payload(self.payload.clone(), column.id.clone(), column.name.clone());

        board.insert_task(task.clone(), None)?;

        Ok(Applied::changed(
            task.clone(),
            Undo::RemoveTask {
                task_id: task.id.clone(),
            },
            Request::CreateTask {
                column_id: self.column_id.clone(),
                task,
            },
        ))
    }
}

/// Replace a task's content.
///
/// Ordering and column membership are not touched; the stored `column_id`
/// and `stage` always win over whatever the caller passed.
#[derive(Debug, Clone)]
pub struct UpdateTask {
    pub task: Task,
}

impl UpdateTask {
    pub fn new(task: Task) -> Self {
        Self { task }
    }
}

impl Mutation for UpdateTask {
    type Output = Task;

    fn op(&self) -> &'static str {
        "update task"
    }

    fn apply(&self, board: &mut Board) -> Result<Applied<Task>> {
        let stored = board
            .task_mut(&self.task.id)
            .ok_or_else(|| KanbanError::TaskNotFound {
                id: self.task.id.to_string(),
            })?;

        let mut updated = self.task.clone();
        updated.column_id = stored.column_id.clone();
        updated.stage = stored.stage.clone();

        if *stored == updated {
            return Ok(Applied::unchanged(updated));
        }
        *stored = updated.clone();

        Ok(Applied::changed(
            updated.clone(),
            // last write wins: a failed update keeps the local content
            Undo::None,
            Request::UpdateTask { task: updated },
        ))
    }
}

/// Remove a task from its column and the board
#[derive(Debug, Clone)]
pub struct DeleteTask {
    pub column_id: ColumnId,
    pub task_id: TaskId,
}

impl DeleteTask {
    pub fn new(column_id: impl Into<ColumnId>, task_id: impl Into<TaskId>) -> Self {
        Self {
            column_id: column_id.into(),
            task_id: task_id.into(),
        }
    }
}

impl Mutation for DeleteTask {
    type Output = Task;

    fn op(&self) -> &'static str {
        "delete task"
    }

    fn apply(&self, board: &mut Board) -> Result<Applied<Task>> {
        board.require_column(&self.column_id)?;
        match board.task(&self.task_id) {
            Some(task) if task.column_id == self.column_id => {}
            Some(task) => {
                return Err(KanbanError::inconsistent(format!(
                    "task '{}' is in column '{}', not '{}'",
                    self.task_id, task.column_id, self.column_id
                )))
            }
            None => {
                return Err(KanbanError::TaskNotFound {
                    id: self.task_id.to_string(),
                })
            }
        }

        let (task, index) = board
            .remove_task(&self.task_id)
            .ok_or_else(|| KanbanError::TaskNotFound {
                id: self.task_id.to_string(),
            })?;

        Ok(Applied::changed(
            task.clone(),
            Undo::RestoreTask { task, index },
            Request::DeleteTask {
                column_id: self.column_id.clone(),
                task_id: self.task_id.clone(),
            },
        ))
    }
}

/// Move a task as described by a task drop
#[derive(Debug, Clone)]
pub struct MoveTask {
    pub event: DragEvent,
}

impl MoveTask {
    pub fn new(event: DragEvent) -> Self {
        Self { event }
    }

    /// Build the drop that moves a task from wherever it is now
    pub fn to(
        board: &Board,
        task_id: &TaskId,
        dest_column: &ColumnId,
        dest_index: usize,
    ) -> Result<Self> {
        let task = board.task(task_id).ok_or_else(|| KanbanError::TaskNotFound {
            id: task_id.to_string(),
        })?;
        let source_index = board
            .column(&task.column_id)
            .and_then(|c| c.position_of(task_id))
            .ok_or_else(|| {
                KanbanError::inconsistent(format!("task '{}' is not listed in its column", task_id))
            })?;
        Ok(Self::new(DragEvent::task(
            task_id.clone(),
            task.column_id.clone(),
            source_index,
            dest_column.clone(),
            dest_index,
        )))
    }
}

impl Mutation for MoveTask {
    type Output = ();

    fn op(&self) -> &'static str {
        "move task"
    }

    fn apply(&self, board: &mut Board) -> Result<Applied<()>> {
        let DragEvent::Task {
            task_id,
            source_column,
            source_index,
            dest_column,
            ..
        } = &self.event
        else {
            return Err(KanbanError::invalid_drag("expected a task drop"));
        };

        let next = reducer::apply(board, &self.event)?;
        if next == *board {
            return Ok(Applied::unchanged(()));
        }

        // Position actually taken after clamping
        let landed = next
            .column(dest_column)
            .and_then(|c| c.position_of(task_id))
            .unwrap_or(0);
        *board = next;

        Ok(Applied::changed(
            (),
            Undo::MoveTaskBack {
                task_id: task_id.clone(),
                column_id: source_column.clone(),
                index: *source_index,
            },
            Request::MoveTask {
                task_id: task_id.clone(),
                source_column: source_column.clone(),
                dest_column: dest_column.clone(),
                dest_index: landed,
            },
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;

    fn board() -> Board {
        let mut board = Board::new("Test");
        board.columns = Board::default_columns();
        board
            .insert_task(Task::new("Brief", "todo").with_id("t1"), None)
            .unwrap();
        board
            .insert_task(Task::new("Shoot", "todo").with_id("t2"), None)
            .unwrap();
        board
    }

    #[test]
    fn test_create_appends_and_undoes() {
        let mut board = board();
        let before = board.clone();

        let applied = CreateTask::new("todo", TaskPayload::new("Edit"))
            .apply(&mut board)
            .unwrap();

        let todo = board.column(&"todo".into()).unwrap();
        assert_eq!(todo.task_ids.last(), Some(&applied.value.id));
        assert_eq!(applied.value.stage, "To Do");
        assert!(matches!(applied.request, Some(Request::CreateTask { .. })));

        applied.undo.apply(&mut board).unwrap();
        assert_eq!(board, before);
    }

    #[test]
    fn test_create_in_missing_column() {
        let mut board = board();
        let result = CreateTask::new("nope", TaskPayload::new("X")).apply(&mut board);
        assert!(matches!(result, Err(KanbanError::ColumnNotFound { .. })));
    }

    #[test]
    fn test_update_keeps_membership() {
        let mut board = board();
        let mut edited = board.task(&"t1".into()).unwrap().clone();
        edited.name = "Brief v2".into();
        edited.status = TaskStatus::done();
        edited.column_id = "done".into();

        let applied = UpdateTask::new(edited).apply(&mut board).unwrap();
        assert_eq!(applied.undo, Undo::None);

        let stored = board.task(&"t1".into()).unwrap();
        assert_eq!(stored.name, "Brief v2");
        assert_eq!(stored.column_id.as_str(), "todo");
        board.validate().unwrap();
    }

    #[test]
    fn test_update_without_changes_is_noop() {
        let mut board = board();
        let same = board.task(&"t1".into()).unwrap().clone();
        let applied = UpdateTask::new(same).apply(&mut board).unwrap();
        assert!(applied.request.is_none());
    }

    #[test]
    fn test_delete_and_restore() {
        let mut board = board();
        let before = board.clone();

        let applied = DeleteTask::new("todo", "t1").apply(&mut board).unwrap();
        assert!(board.task(&"t1".into()).is_none());
        assert_eq!(board.column(&"todo".into()).unwrap().task_ids.len(), 1);

        applied.undo.apply(&mut board).unwrap();
        assert_eq!(board, before);
    }

    #[test]
    fn test_delete_from_wrong_column() {
        let mut board = board();
        let result = DeleteTask::new("done", "t1").apply(&mut board);
        assert!(matches!(result, Err(KanbanError::Inconsistent { .. })));
        assert!(board.task(&"t1".into()).is_some());
    }

    #[test]
    fn test_move_reports_clamped_index() {
        let mut board = board();
        let before = board.clone();
        let applied = MoveTask::to(&board, &"t1".into(), &"done".into(), 7)
            .unwrap()
            .apply(&mut board)
            .unwrap();

        match applied.request {
            Some(Request::MoveTask { dest_index, .. }) => assert_eq!(dest_index, 0),
            other => panic!("unexpected request {:?}", other),
        }

        applied.undo.apply(&mut board).unwrap();
        assert_eq!(board, before);
    }

    #[test]
    fn test_in_place_move_sends_nothing() {
        let mut board = board();
        let applied = MoveTask::to(&board, &"t2".into(), &"todo".into(), 1)
            .unwrap()
            .apply(&mut board)
            .unwrap();
        assert!(applied.request.is_none());
    }
}
