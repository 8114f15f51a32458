//! Drag-drop reducer
//!
//! `apply` is a pure transform from a board and a drop to the next board. It
//! never performs I/O and never mutates its input, so the controller can run
//! it optimistically and the same logic can be replayed by storage backends.

use crate::error::{KanbanError, Result};
use crate::types::{Board, ColumnId, DragEvent, TaskId};

/// Compute the board that results from a drop.
///
/// - in-place drops return a value-equal board
/// - same-column drops reorder the column's task list
/// - cross-column drops splice the task out of the source and into the
///   destination, then re-point the task's `column_id` and `stage`
///
/// Destination indices past the end of a list clamp to append. A drop that
/// does not match the board fails with [`KanbanError::InvalidDragState`].
pub fn apply(board: &Board, event: &DragEvent) -> Result<Board> {
    match event {
        DragEvent::Task {
            task_id,
            source_column,
            source_index,
            dest_column,
            dest_index,
        } => {
            let (source_pos, dest_pos) =
                locate_task(board, task_id, source_column, *source_index, dest_column)?;
            if event.is_in_place() {
                return Ok(board.clone());
            }
            Ok(move_task(
                board,
                task_id,
                (source_pos, *source_index),
                (dest_pos, *dest_index),
            ))
        }
        DragEvent::Column {
            column_id,
            source_index,
            dest_index,
        } => {
            locate_column(board, column_id, *source_index)?;
            if event.is_in_place() {
                return Ok(board.clone());
            }
            Ok(move_column(board, *source_index, *dest_index))
        }
    }
}

/// Check a task drop against the board; returns the source and destination
/// column positions
fn locate_task(
    board: &Board,
    task_id: &TaskId,
    source_column: &ColumnId,
    source_index: usize,
    dest_column: &ColumnId,
) -> Result<(usize, usize)> {
    let source_pos = board.column_index(source_column).ok_or_else(|| {
        KanbanError::invalid_drag(format!("source column '{}' does not exist", source_column))
    })?;
    let dest_pos = board.column_index(dest_column).ok_or_else(|| {
        KanbanError::invalid_drag(format!(
            "destination column '{}' does not exist",
            dest_column
        ))
    })?;

    let task = board
        .task(task_id)
        .ok_or_else(|| KanbanError::invalid_drag(format!("task '{}' does not exist", task_id)))?;
    if &task.column_id != source_column {
        return Err(KanbanError::invalid_drag(format!(
            "task '{}' belongs to column '{}', not '{}'",
            task_id, task.column_id, source_column
        )));
    }

    match board.columns[source_pos].task_ids.get(source_index) {
        Some(id) if id == task_id => Ok((source_pos, dest_pos)),
        _ => Err(KanbanError::invalid_drag(format!(
            "task '{}' is not at index {} of column '{}'",
            task_id, source_index, source_column
        ))),
    }
}

fn move_task(
    board: &Board,
    task_id: &TaskId,
    (source_pos, source_index): (usize, usize),
    (dest_pos, dest_index): (usize, usize),
) -> Board {
    let mut next = board.clone();
    next.columns[source_pos].task_ids.remove(source_index);

    let dest_id = next.columns[dest_pos].id.clone();
    let dest_name = next.columns[dest_pos].name.clone();
    let dest_ids = &mut next.columns[dest_pos].task_ids;
    let at = dest_index.min(dest_ids.len());
    dest_ids.insert(at, task_id.clone());

    if source_pos != dest_pos {
        if let Some(task) = next.task_mut(task_id) {
            task.column_id = dest_id;
            task.stage = dest_name;
        }
    }

    next
}

fn locate_column(board: &Board, column_id: &ColumnId, source_index: usize) -> Result<()> {
    match board.columns.get(source_index) {
        Some(column) if &column.id == column_id => Ok(()),
        _ => Err(KanbanError::invalid_drag(format!(
            "column '{}' is not at index {}",
            column_id, source_index
        ))),
    }
}

fn move_column(board: &Board, source_index: usize, dest_index: usize) -> Board {
    let mut next = board.clone();
    let column = next.columns.remove(source_index);
    let at = dest_index.min(next.columns.len());
    next.columns.insert(at, column);
    next
}
