//! Board-level types: Board, Column

use super::ids::{ColumnId, TaskId};
use super::task::Task;
use crate::error::{KanbanError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A column defines a workflow stage and the order of its cards
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: ColumnId,
    pub name: String,
    /// Ordered task references; position in this list is card position
    #[serde(default)]
    pub task_ids: Vec<TaskId>,
    /// Optional WIP limit for tasks arriving from other columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Column {
    /// Create an empty column with a fresh id
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: ColumnId::new(),
            name: name.into(),
            task_ids: Vec::new(),
            limit: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<ColumnId>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether another task may be moved in from a different column
    pub fn accepts_tasks(&self) -> bool {
        self.limit.map_or(true, |limit| self.task_ids.len() < limit)
    }

    pub fn position_of(&self, task_id: &TaskId) -> Option<usize> {
        self.task_ids.iter().position(|id| id == task_id)
    }
}

/// The kanban board: ordered columns plus every task keyed by id.
///
/// Columns reference tasks by id; the task map is the only owner of task
/// content. Mutations go through the stores and the reducer, which keep the
/// two sides consistent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Board {
    pub name: String,
    pub columns: Vec<Column>,
    #[serde(default)]
    pub tasks: BTreeMap<TaskId, Task>,
}

impl Board {
    /// Create an empty board with the given name
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
            tasks: BTreeMap::new(),
        }
    }

    /// Assemble a board from a fetched snapshot, checking every invariant
    pub fn from_parts(
        name: impl Into<String>,
        columns: Vec<Column>,
        tasks: Vec<Task>,
    ) -> Result<Self> {
        let mut map = BTreeMap::new();
        for task in tasks {
            let id = task.id.clone();
            if map.insert(id.clone(), task).is_some() {
                return Err(KanbanError::duplicate_id("task", id.to_string()));
            }
        }

        let board = Self {
            name: name.into(),
            columns,
            tasks: map,
        };
        board.validate()?;
        Ok(board)
    }

    /// The default columns for a new campaign board
    pub fn default_columns() -> Vec<Column> {
        vec![
            Column::new("To Do").with_id("todo"),
            Column::new("In Progress").with_id("in-progress"),
            Column::new("Done").with_id("done"),
        ]
    }

    pub fn column(&self, id: &ColumnId) -> Option<&Column> {
        self.columns.iter().find(|c| &c.id == id)
    }

    pub fn column_mut(&mut self, id: &ColumnId) -> Option<&mut Column> {
        self.columns.iter_mut().find(|c| &c.id == id)
    }

    pub fn column_index(&self, id: &ColumnId) -> Option<usize> {
        self.columns.iter().position(|c| &c.id == id)
    }

    /// Get a column or fail with `ColumnNotFound`
    pub fn require_column(&self, id: &ColumnId) -> Result<&Column> {
        self.column(id).ok_or_else(|| KanbanError::ColumnNotFound { id: id.to_string() })
    }

    pub fn task(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn task_mut(&mut self, id: &TaskId) -> Option<&mut Task> {
        self.tasks.get_mut(id)
    }

    /// Tasks of a column in card order
    pub fn tasks_in(&self, column_id: &ColumnId) -> Vec<&Task> {
        self.column(column_id)
            .map(|c| c.task_ids.iter().filter_map(|id| self.tasks.get(id)).collect())
            .unwrap_or_default()
    }

    /// Total number of task references across all columns
    pub fn task_count(&self) -> usize {
        self.columns.iter().map(|c| c.task_ids.len()).sum()
    }

    /// Insert a task into its column at `index` (clamped), or at the end.
    ///
    /// The task's `stage` is stamped from the column name.
    pub fn insert_task(&mut self, mut task: Task, index: Option<usize>) -> Result<()> {
        if self.tasks.contains_key(&task.id) {
            return Err(KanbanError::duplicate_id("task", task.id.to_string()));
        }
        let column = self
            .column_mut(&task.column_id)
            .ok_or_else(|| KanbanError::ColumnNotFound {
                id: task.column_id.to_string(),
            })?;

        let at = index.map_or(column.task_ids.len(), |i| i.min(column.task_ids.len()));
        column.task_ids.insert(at, task.id.clone());
        task.stage = column.name.clone();
        self.tasks.insert(task.id.clone(), task);
        Ok(())
    }

    /// Remove a task from its column and from the task map.
    ///
    /// Returns the task and the index it occupied in its column.
    pub fn remove_task(&mut self, id: &TaskId) -> Option<(Task, usize)> {
        let task = self.tasks.remove(id)?;
        let index = self
            .column_mut(&task.column_id)
            .and_then(|column| {
                let index = column.position_of(id)?;
                column.task_ids.remove(index);
                Some(index)
            })
            .unwrap_or(0);
        Some((task, index))
    }

    /// Give a task a new id, keeping its column and position
    pub fn rekey_task(&mut self, from: &TaskId, to: &TaskId) -> Result<()> {
        if self.tasks.contains_key(to) {
            return Err(KanbanError::duplicate_id("task", to.to_string()));
        }
        let mut task = self
            .tasks
            .remove(from)
            .ok_or_else(|| KanbanError::TaskNotFound { id: from.to_string() })?;
        if let Some(column) = self.column_mut(&task.column_id) {
            for id in column.task_ids.iter_mut().filter(|id| *id == from) {
                *id = to.clone();
            }
        }
        task.id = to.clone();
        self.tasks.insert(to.clone(), task);
        Ok(())
    }

    /// Give a column a new id; its tasks follow
    pub fn rekey_column(&mut self, from: &ColumnId, to: &ColumnId) -> Result<()> {
        if self.column(to).is_some() {
            return Err(KanbanError::duplicate_id("column", to.to_string()));
        }
        let column = self
            .column_mut(from)
            .ok_or_else(|| KanbanError::ColumnNotFound { id: from.to_string() })?;
        column.id = to.clone();
        let owned = column.task_ids.clone();
        for task_id in &owned {
            if let Some(task) = self.tasks.get_mut(task_id) {
                task.column_id = to.clone();
            }
        }
        Ok(())
    }

    /// Check every structural invariant of the board
    pub fn validate(&self) -> Result<()> {
        let mut column_ids = HashSet::new();
        let mut seen = HashSet::new();

        for column in &self.columns {
            if !column_ids.insert(&column.id) {
                return Err(KanbanError::duplicate_id("column", column.id.to_string()));
            }
            for task_id in &column.task_ids {
                if !seen.insert(task_id) {
                    return Err(KanbanError::duplicate_id("task", task_id.to_string()));
                }
                let task = self.tasks.get(task_id).ok_or_else(|| {
                    KanbanError::inconsistent(format!(
                        "column '{}' references missing task '{}'",
                        column.id, task_id
                    ))
                })?;
                if task.column_id != column.id {
                    return Err(KanbanError::inconsistent(format!(
                        "task '{}' is listed in column '{}' but owned by '{}'",
                        task_id, column.id, task.column_id
                    )));
                }
            }
        }

        if let Some(orphan) = self.tasks.keys().find(|id| !seen.contains(id)) {
            return Err(KanbanError::inconsistent(format!(
                "task '{}' is not referenced by any column",
                orphan
            )));
        }

        Ok(())
    }
}
