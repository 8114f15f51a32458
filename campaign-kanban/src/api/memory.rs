//! In-process persistence backend
//!
//! Keeps its own copy of the board (the "server side") and applies every call
//! with the same mutations the controller uses. Failures and latency can be
//! injected per op, and every call is recorded, which makes it the backend of
//! choice for exercising rollback and reconciliation paths. Server-assigned
//! ids can be queued to exercise echo adoption.

use super::{ApiError, ApiResult, BoardApi};
use crate::store::{ClearColumn, DeleteColumn, MoveColumn, MoveTask, Mutation, UpdateColumn};
use crate::types::{Board, Column, ColumnId, Task, TaskId};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tracing::trace;

#[derive(Debug, Default)]
struct Faults {
    /// Remaining one-shot failures per op
    once: HashMap<String, usize>,
    always: HashSet<String>,
    delays: HashMap<String, Duration>,
    /// Ids the next creates store under instead of the client's
    assigned: VecDeque<String>,
}

/// In-memory [`BoardApi`] with failure injection
#[derive(Debug, Default)]
pub struct MemoryApi {
    board: Mutex<Board>,
    calls: Mutex<Vec<String>>,
    faults: Mutex<Faults>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MemoryApi {
    /// Serve the given board
    pub fn new(board: Board) -> Self {
        Self {
            board: Mutex::new(board),
            ..Self::default()
        }
    }

    /// Fail the next call of `op` (e.g. "create task")
    pub fn fail_next(&self, op: &str) -> &Self {
        *lock(&self.faults).once.entry(op.to_string()).or_default() += 1;
        self
    }

    /// Fail every call of `op` until [`MemoryApi::heal`]
    pub fn fail_always(&self, op: &str) -> &Self {
        lock(&self.faults).always.insert(op.to_string());
        self
    }

    /// Delay every call of `op` before it is applied
    pub fn delay(&self, op: &str, delay: Duration) -> &Self {
        lock(&self.faults).delays.insert(op.to_string(), delay);
        self
    }

    /// Store the next created task or column under `id`, as a server that
    /// assigns its own ids would
    pub fn assign_next_id(&self, id: impl Into<String>) -> &Self {
        lock(&self.faults).assigned.push_back(id.into());
        self
    }

    fn assigned_id(&self) -> Option<String> {
        lock(&self.faults).assigned.pop_front()
    }

    /// Clear all injected failures, delays and assigned ids
    pub fn heal(&self) {
        *lock(&self.faults) = Faults::default();
    }

    /// Ops received so far, in arrival order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self, op: &str) -> usize {
        lock(&self.calls).iter().filter(|c| c.as_str() == op).count()
    }

    /// Copy of the server-side board
    pub fn snapshot(&self) -> Board {
        lock(&self.board).clone()
    }

    /// Record the call, wait out any delay, then decide whether it fails
    async fn enter(&self, op: &str) -> ApiResult<()> {
        lock(&self.calls).push(op.to_string());

        let delay = lock(&self.faults).delays.get(op).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let mut faults = lock(&self.faults);
        if faults.always.contains(op) {
            return Err(ApiError::transport(format!("{} unavailable", op)));
        }
        if let Some(remaining) = faults.once.get_mut(op) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(ApiError::transport(format!("{} failed", op)));
            }
        }
        trace!(op, "memory api accepted call");
        Ok(())
    }

    fn mutate<M: Mutation>(&self, mutation: M) -> ApiResult<M::Output> {
        let mut board = lock(&self.board);
        Ok(mutation.apply(&mut board)?.value)
    }
}

#[async_trait]
impl BoardApi for MemoryApi {
    async fn fetch_board(&self) -> ApiResult<Board> {
        self.enter("fetch board").await?;
        Ok(self.snapshot())
    }

    async fn create_task(&self, column_id: &ColumnId, task: &Task) -> ApiResult<Task> {
        self.enter("create task").await?;
        let mut board = lock(&self.board);
        let mut stored = task.clone();
        stored.column_id = column_id.clone();
        if let Some(id) = self.assigned_id() {
            stored.id = id.into();
        }
        board.insert_task(stored.clone(), None)?;
        Ok(board.task(&stored.id).cloned().unwrap_or(stored))
    }

    async fn update_task(&self, task: &Task) -> ApiResult<()> {
        self.enter("update task").await?;
        let mut board = lock(&self.board);
        let stored = board
            .task_mut(&task.id)
            .ok_or_else(|| ApiError::not_found("task", task.id.to_string()))?;
        let column_id = stored.column_id.clone();
        let stage = stored.stage.clone();
        *stored = task.clone();
        stored.column_id = column_id;
        stored.stage = stage;
        Ok(())
    }

    async fn delete_task(&self, column_id: &ColumnId, task_id: &TaskId) -> ApiResult<()> {
        self.enter("delete task").await?;
        self.mutate(crate::store::DeleteTask::new(column_id, task_id))
            .map(|_| ())
    }

    async fn move_task(
        &self,
        task_id: &TaskId,
        dest_column: &ColumnId,
        dest_index: usize,
    ) -> ApiResult<()> {
        self.enter("move task").await?;
        let mut board = lock(&self.board);
        MoveTask::to(&board, task_id, dest_column, dest_index)?.apply(&mut board)?;
        Ok(())
    }

    async fn create_column(&self, column: &Column) -> ApiResult<Column> {
        self.enter("create column").await?;
        let mut stored = column.clone();
        stored.task_ids.clear();
        if let Some(id) = self.assigned_id() {
            stored.id = id.into();
        }
        let mut board = lock(&self.board);
        if board.column(&stored.id).is_some() {
            return Err(ApiError::rejected(format!(
                "column '{}' already exists",
                stored.id
            )));
        }
        board.columns.push(stored.clone());
        Ok(stored)
    }

    async fn update_column(&self, column_id: &ColumnId, name: &str) -> ApiResult<()> {
        self.enter("update column").await?;
        self.mutate(UpdateColumn::new(column_id, name))
    }

    async fn clear_column(&self, column_id: &ColumnId) -> ApiResult<()> {
        self.enter("clear column").await?;
        self.mutate(ClearColumn::new(column_id)).map(|_| ())
    }

    async fn delete_column(&self, column_id: &ColumnId) -> ApiResult<()> {
        self.enter("delete column").await?;
        self.mutate(DeleteColumn::new(column_id)).map(|_| ())
    }

    async fn move_column(&self, column_id: &ColumnId, dest_index: usize) -> ApiResult<()> {
        self.enter("move column").await?;
        let mut board = lock(&self.board);
        MoveColumn::to(&board, column_id, dest_index)?.apply(&mut board)?;
        Ok(())
    }
}
