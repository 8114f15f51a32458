//! Column mutations

use super::{Applied, Mutation, Undo};
use crate::api::Request;
use crate::error::{KanbanError, Result};
use crate::reducer;
use crate::types::{Board, Column, ColumnId, DragEvent};

/// Append a new column to the board
#[derive(Debug, Clone)]
pub struct CreateColumn {
    pub name: String,
    pub limit: Option<usize>,
}

impl CreateColumn {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

impl Mutation for CreateColumn {
    type Output = Column;

    fn op(&self) -> &'static str {
        "create column"
    }

    fn apply(&self, board: &mut Board) -> Result<Applied<Column>> {
        let mut column = Column::new(self.name.clone());
        column.limit = self.limit;
        if board.column(&column.id).is_some() {
            return Err(KanbanError::duplicate_id("column", column.id.to_string()));
        }
        board.columns.push(column.clone());

        Ok(Applied::changed(
            column.clone(),
            Undo::RemoveColumn {
                column_id: column.id.clone(),
            },
            Request::CreateColumn { column },
        ))
    }
}

/// Rename a column; renaming to the current name is a no-op
#[derive(Debug, Clone)]
pub struct UpdateColumn {
    pub column_id: ColumnId,
    pub name: String,
}

impl UpdateColumn {
    pub fn new(column_id: impl Into<ColumnId>, name: impl Into<String>) -> Self {
        Self {
            column_id: column_id.into(),
            name: name.into(),
        }
    }
}

impl Mutation for UpdateColumn {
    type Output = ();

    fn op(&self) -> &'static str {
        "update column"
    }

    fn apply(&self, board: &mut Board) -> Result<Applied<()>> {
        let column = board
            .column_mut(&self.column_id)
            .ok_or_else(|| KanbanError::ColumnNotFound {
                id: self.column_id.to_string(),
            })?;

        if column.name == self.name {
            return Ok(Applied::unchanged(()));
        }
        column.name = self.name.clone();

        let owned = column.task_ids.clone();
        for id in &owned {
            if let Some(task) = board.task_mut(id) {
                task.stage = self.name.clone();
            }
        }

        Ok(Applied::changed(
            (),
            // non-destructive: a failed rename keeps the local name
            Undo::None,
            Request::UpdateColumn {
                column_id: self.column_id.clone(),
                name: self.name.clone(),
            },
        ))
    }
}

/// Remove every task owned by a column
#[derive(Debug, Clone)]
pub struct ClearColumn {
    pub column_id: ColumnId,
}

impl ClearColumn {
    pub fn new(column_id: impl Into<ColumnId>) -> Self {
        Self {
            column_id: column_id.into(),
        }
    }
}

impl Mutation for ClearColumn {
    type Output = usize;

    fn op(&self) -> &'static str {
        "clear column"
    }

    fn apply(&self, board: &mut Board) -> Result<Applied<usize>> {
        let column = board
            .column_mut(&self.column_id)
            .ok_or_else(|| KanbanError::ColumnNotFound {
                id: self.column_id.to_string(),
            })?;

        let ids = std::mem::take(&mut column.task_ids);
        let removed: Vec<_> = ids
            .into_iter()
            .enumerate()
            .filter_map(|(index, id)| board.tasks.remove(&id).map(|task| (task, index)))
            .collect();

        Ok(Applied::changed(
            removed.len(),
            Undo::RestoreTasks { tasks: removed },
            Request::ClearColumn {
                column_id: self.column_id.clone(),
            },
        ))
    }
}

/// Remove a column together with its tasks
#[derive(Debug, Clone)]
pub struct DeleteColumn {
    pub column_id: ColumnId,
}

impl DeleteColumn {
    pub fn new(column_id: impl Into<ColumnId>) -> Self {
        Self {
            column_id: column_id.into(),
        }
    }
}

impl Mutation for DeleteColumn {
    type Output = Column;

    fn op(&self) -> &'static str {
        "delete column"
    }

    fn apply(&self, board: &mut Board) -> Result<Applied<Column>> {
        let index = board
            .column_index(&self.column_id)
            .ok_or_else(|| KanbanError::ColumnNotFound {
                id: self.column_id.to_string(),
            })?;

        let column = board.columns.remove(index);
        let tasks = column
            .task_ids
            .iter()
            .filter_map(|id| board.tasks.remove(id))
            .collect();
        // Anything else still pointing at the column goes too
        board.tasks.retain(|_, task| task.column_id != self.column_id);

        Ok(Applied::changed(
            column.clone(),
            Undo::RestoreColumn {
                column,
                index,
                tasks,
            },
            Request::DeleteColumn {
                column_id: self.column_id.clone(),
            },
        ))
    }
}

/// Reorder a column as described by a column drop
#[derive(Debug, Clone)]
pub struct MoveColumn {
    pub event: DragEvent,
}

impl MoveColumn {
    pub fn new(event: DragEvent) -> Self {
        Self { event }
    }

    /// Build the drop that moves a column from wherever it is now
    pub fn to(board: &Board, column_id: &ColumnId, dest_index: usize) -> Result<Self> {
        let source_index = board
            .column_index(column_id)
            .ok_or_else(|| KanbanError::ColumnNotFound {
                id: column_id.to_string(),
            })?;
        Ok(Self::new(DragEvent::column(
            column_id.clone(),
            source_index,
            dest_index,
        )))
    }
}

impl Mutation for MoveColumn {
    type Output = ();

    fn op(&self) -> &'static str {
        "move column"
    }

    fn apply(&self, board: &mut Board) -> Result<Applied<()>> {
        let DragEvent::Column {
            column_id,
            source_index,
            ..
        } = &self.event
        else {
            return Err(KanbanError::invalid_drag("expected a column drop"));
        };

        let next = reducer::apply(board, &self.event)?;
        if next == *board {
            return Ok(Applied::unchanged(()));
        }
        let landed = next.column_index(column_id).unwrap_or(0);
        *board = next;

        Ok(Applied::changed(
            (),
            Undo::MoveColumnBack {
                column_id: column_id.clone(),
                index: *source_index,
            },
            Request::MoveColumn {
                column_id: column_id.clone(),
                dest_index: landed,
            },
        ))
    }
}
