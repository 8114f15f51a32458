//! Board controller: optimistic mutations with reconciled persistence
//!
//! The controller owns the board. Every change is applied locally first, then
//! the matching persistence call is spawned on the tokio runtime and tagged
//! with a [`MutationId`]. Completions come back over a channel and are
//! reconciled one by one against the board as it is *now*:
//!
//! - success adopts the server echo, if the call returned one
//! - failure of a non-destructive change (task update, column rename) only
//!   warns; the local edit stays
//! - any other failure applies the mutation's targeted [`Undo`] and reports
//!   an error
//!
//! ```rust,no_run
//! use campaign_kanban::{
//!     Board, BoardConfig, BoardController, MemoryApi, NotificationLog, TaskPayload,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> campaign_kanban::Result<()> {
//! let api = Arc::new(MemoryApi::new(Board::new("Launch")));
//! let notes = Arc::new(NotificationLog::new());
//! let mut controller = BoardController::connect(api, notes, BoardConfig::default()).await?;
//!
//! let todo = controller.create_column("To Do")?.value;
//! controller.create_task(&todo.id, TaskPayload::new("Write brief"))?;
//! for outcome in controller.settle().await {
//!     println!("{} -> {:?}", outcome.op, outcome.result);
//! }
//! # Ok(())
//! # }
//! ```

use crate::api::{ApiError, ApiResult, BoardApi, Echo, Request};
use crate::config::{BoardConfig, PersistenceOrdering};
use crate::error::{KanbanError, Result};
use crate::logging::Pretty;
use crate::notify::{Notifier, Severity};
use crate::store::{
    ClearColumn, CreateColumn, CreateTask, DeleteColumn, DeleteTask, MoveColumn, MoveTask,
    Mutation, Undo, UpdateColumn, UpdateTask,
};
use crate::types::{Board, Column, ColumnId, DragEvent, DragItem, Task, TaskId, TaskPayload};
use crate::view::{BoardView, TaskFilter};
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, trace, warn};

/// Correlates a local mutation with its persistence call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MutationId(u64);

impl MutationId {
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for MutationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Where the drag gesture is
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DragState {
    #[default]
    Idle,
    Dragging(DragItem),
}

/// Result of ending a drag with a drop
#[derive(Debug)]
pub enum DropOutcome {
    /// Cancelled, or dropped where it started
    Unchanged,
    /// Applied locally; persistence is in flight
    Applied(MutationId),
    /// Refused; the board is untouched
    Rejected(KanbanError),
}

/// A locally applied change and the id of its persistence call.
///
/// `mutation` is `None` when the change was a no-op and nothing was sent.
#[derive(Debug, Clone)]
pub struct Mutated<T> {
    pub value: T,
    pub mutation: Option<MutationId>,
}

/// How a persistence call ended, after reconciliation
#[derive(Debug)]
pub struct MutationOutcome {
    pub id: MutationId,
    pub op: &'static str,
    pub result: Result<()>,
}

/// What happens locally when a call fails
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FailurePolicy {
    /// Keep the local change, warn
    Keep,
    /// Apply the undo record, report an error
    RollBack,
}

impl FailurePolicy {
    fn for_request(request: &Request) -> Self {
        match request {
            Request::UpdateTask { .. } | Request::UpdateColumn { .. } => Self::Keep,
            _ => Self::RollBack,
        }
    }
}

#[derive(Debug)]
struct Pending {
    op: &'static str,
    request: Request,
    undo: Undo,
    policy: FailurePolicy,
    /// Columns reserved while the call is in flight (per-column ordering only)
    reserved: Vec<ColumnId>,
}

#[derive(Debug)]
struct Completion {
    id: MutationId,
    result: ApiResult<Echo>,
}

/// Owns a board and keeps it in step with a [`BoardApi`]
pub struct BoardController {
    board: Board,
    api: Arc<dyn BoardApi>,
    notifier: Arc<dyn Notifier>,
    config: BoardConfig,
    filter: TaskFilter,
    drag: DragState,
    next_id: u64,
    pending: BTreeMap<MutationId, Pending>,
    /// Mutations waiting for their columns to free up, in issue order
    queued: VecDeque<MutationId>,
    in_flight: HashSet<ColumnId>,
    tx: mpsc::UnboundedSender<Completion>,
    rx: mpsc::UnboundedReceiver<Completion>,
}

impl fmt::Debug for BoardController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoardController")
            .field("board", &self.board.name)
            .field("drag", &self.drag)
            .field("pending", &self.pending.len())
            .field("queued", &self.queued.len())
            .finish()
    }
}

impl BoardController {
    /// Fetch the board from `api` and take ownership of it
    pub async fn connect(
        api: Arc<dyn BoardApi>,
        notifier: Arc<dyn Notifier>,
        config: BoardConfig,
    ) -> Result<Self> {
        let board = api
            .fetch_board()
            .await
            .map_err(|source| KanbanError::persistence("fetch board", source))?;
        info!(
            board = %board.name,
            columns = board.columns.len(),
            tasks = board.task_count(),
            "board loaded"
        );
        Self::with_board(board, api, notifier, config)
    }

    /// Take ownership of an already loaded board
    pub fn with_board(
        board: Board,
        api: Arc<dyn BoardApi>,
        notifier: Arc<dyn Notifier>,
        config: BoardConfig,
    ) -> Result<Self> {
        board.validate()?;
        let (tx, rx) = mpsc::unbounded_channel();
        Ok(Self {
            board,
            api,
            notifier,
            filter: config.task_filter(),
            config,
            drag: DragState::Idle,
            next_id: 0,
            pending: BTreeMap::new(),
            queued: VecDeque::new(),
            in_flight: HashSet::new(),
            tx,
            rx,
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn board(&self) -> &Board {
        &self.board
    }

    /// The board as displayed, with hidden statuses filtered out
    pub fn view(&self) -> BoardView<'_> {
        BoardView::new(&self.board, &self.filter)
    }

    pub fn drag_state(&self) -> &DragState {
        &self.drag
    }

    /// Mutations whose persistence call has not completed yet
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    // =========================================================================
    // Drag gesture
    // =========================================================================

    /// Pick up a task or column
    pub fn drag_start(&mut self, item: DragItem) -> Result<()> {
        if let DragState::Dragging(current) = &self.drag {
            debug!(?current, ?item, "drag start refused, already dragging");
            return Err(KanbanError::DragInProgress);
        }
        trace!(?item, "drag started");
        self.drag = DragState::Dragging(item);
        Ok(())
    }

    /// Finish the gesture: `Some(event)` drops, `None` cancels.
    ///
    /// The controller is back to [`DragState::Idle`] afterwards, whatever the
    /// outcome.
    pub fn drag_end(&mut self, event: Option<DragEvent>) -> Result<DropOutcome> {
        let item = match std::mem::take(&mut self.drag) {
            DragState::Idle => return Err(KanbanError::NoDragInProgress),
            DragState::Dragging(item) => item,
        };

        let Some(event) = event else {
            debug!(?item, "drag cancelled");
            return Ok(DropOutcome::Unchanged);
        };

        match self.drop_item(&item, event) {
            Ok(Some(id)) => Ok(DropOutcome::Applied(id)),
            Ok(None) => Ok(DropOutcome::Unchanged),
            Err(err) => {
                warn!(?item, error = %err, "drop rejected");
                self.notifier.notify(&err.to_string(), Severity::Warning);
                Ok(DropOutcome::Rejected(err))
            }
        }
    }

    fn drop_item(&mut self, item: &DragItem, event: DragEvent) -> Result<Option<MutationId>> {
        if event.item() != *item {
            return Err(KanbanError::invalid_drag(format!(
                "dropped {:?} but dragged {:?}",
                event.item(),
                item
            )));
        }

        let mutated = match event {
            DragEvent::Task { .. } => {
                self.check_capacity(&event)?;
                self.apply(MoveTask::new(event))?
            }
            DragEvent::Column { .. } => self.apply(MoveColumn::new(event))?,
        };
        Ok(mutated.mutation)
    }

    /// A task arriving from another column must fit under the WIP limit
    fn check_capacity(&self, event: &DragEvent) -> Result<()> {
        let DragEvent::Task {
            source_column,
            dest_column,
            ..
        } = event
        else {
            return Ok(());
        };
        if source_column == dest_column {
            return Ok(());
        }
        let dest = self.board.column(dest_column).ok_or_else(|| {
            KanbanError::invalid_drag(format!(
                "destination column '{}' does not exist",
                dest_column
            ))
        })?;
        match dest.limit {
            Some(limit) if !dest.accepts_tasks() => Err(KanbanError::ColumnFull {
                id: dest.id.to_string(),
                limit,
            }),
            _ => Ok(()),
        }
    }

    // =========================================================================
    // Task and column operations
    // =========================================================================

    /// Apply any mutation optimistically and persist it.
    ///
    /// Local failures are reported through the notifier and returned; the
    /// board is untouched in that case.
    pub fn mutate<M: Mutation>(&mut self, mutation: M) -> Result<Mutated<M::Output>> {
        let op = mutation.op();
        self.apply(mutation).inspect_err(|err| {
            warn!(op, error = %err, "mutation refused");
            self.notifier.notify(&err.to_string(), err.severity());
        })
    }

    pub fn create_task(
        &mut self,
        column_id: &ColumnId,
        payload: TaskPayload,
    ) -> Result<Mutated<Task>> {
        self.mutate(CreateTask::new(column_id.clone(), payload))
    }

    pub fn update_task(&mut self, task: Task) -> Result<Mutated<Task>> {
        self.mutate(UpdateTask::new(task))
    }

    pub fn delete_task(&mut self, column_id: &ColumnId, task_id: &TaskId) -> Result<Mutated<Task>> {
        self.mutate(DeleteTask::new(column_id.clone(), task_id.clone()))
    }

    /// Move a task without a drag gesture; same rules as a drop
    pub fn move_task(
        &mut self,
        task_id: &TaskId,
        dest_column: &ColumnId,
        dest_index: usize,
    ) -> Result<Mutated<()>> {
        let result = MoveTask::to(&self.board, task_id, dest_column, dest_index).and_then(|m| {
            self.check_capacity(&m.event)?;
            Ok(m)
        });
        match result {
            Ok(mutation) => self.mutate(mutation),
            Err(err) => {
                self.notifier.notify(&err.to_string(), err.severity());
                Err(err)
            }
        }
    }

    pub fn create_column(&mut self, name: impl Into<String>) -> Result<Mutated<Column>> {
        self.mutate(CreateColumn::new(name))
    }

    /// Rename a column; the current name is a no-op and sends nothing
    pub fn update_column(
        &mut self,
        column_id: &ColumnId,
        name: impl Into<String>,
    ) -> Result<Mutated<()>> {
        self.mutate(UpdateColumn::new(column_id.clone(), name))
    }

    /// Remove every task in a column; returns how many were removed
    pub fn clear_column(&mut self, column_id: &ColumnId) -> Result<Mutated<usize>> {
        self.mutate(ClearColumn::new(column_id.clone()))
    }

    pub fn delete_column(&mut self, column_id: &ColumnId) -> Result<Mutated<Column>> {
        self.mutate(DeleteColumn::new(column_id.clone()))
    }

    pub fn move_column(&mut self, column_id: &ColumnId, dest_index: usize) -> Result<Mutated<()>> {
        match MoveColumn::to(&self.board, column_id, dest_index) {
            Ok(mutation) => self.mutate(mutation),
            Err(err) => {
                self.notifier.notify(&err.to_string(), err.severity());
                Err(err)
            }
        }
    }

    /// Apply locally and hand the request to the dispatcher
    fn apply<M: Mutation>(&mut self, mutation: M) -> Result<Mutated<M::Output>> {
        let op = mutation.op();
        let applied = mutation.apply(&mut self.board)?;

        let Some(request) = applied.request else {
            debug!(op, "no change, nothing to persist");
            return Ok(Mutated {
                value: applied.value,
                mutation: None,
            });
        };

        self.next_id += 1;
        let id = MutationId(self.next_id);
        debug!(%id, op, "applied optimistically");
        trace!("board after {}: {}", op, Pretty(&self.board));

        self.pending.insert(
            id,
            Pending {
                op,
                policy: FailurePolicy::for_request(&request),
                request,
                undo: applied.undo,
                reserved: Vec::new(),
            },
        );
        self.queued.push_back(id);
        self.pump();

        Ok(Mutated {
            value: applied.value,
            mutation: Some(id),
        })
    }

    // =========================================================================
    // Dispatch
    // =========================================================================

    /// Send every queued call whose columns are free, oldest first
    fn pump(&mut self) {
        let mut blocked: HashSet<ColumnId> = HashSet::new();
        let mut waiting = VecDeque::new();

        while let Some(id) = self.queued.pop_front() {
            let columns = match self.pending.get(&id) {
                Some(pending) => pending.request.columns(),
                None => continue,
            };
            let free = match self.config.ordering {
                PersistenceOrdering::Concurrent => true,
                PersistenceOrdering::PerColumn => columns
                    .iter()
                    .all(|c| !self.in_flight.contains(c) && !blocked.contains(c)),
            };
            if free {
                self.dispatch(id, columns);
            } else {
                trace!(%id, "queued behind in-flight call");
                blocked.extend(columns);
                waiting.push_back(id);
            }
        }

        self.queued = waiting;
    }

    fn dispatch(&mut self, id: MutationId, columns: Vec<ColumnId>) {
        let Some(pending) = self.pending.get_mut(&id) else {
            return;
        };
        if self.config.ordering == PersistenceOrdering::PerColumn {
            self.in_flight.extend(columns.iter().cloned());
            pending.reserved = columns;
        }

        let request = pending.request.clone();
        let api = Arc::clone(&self.api);
        let tx = self.tx.clone();
        let limit = self.config.persistence_timeout();
        debug!(%id, op = pending.op, "dispatching persistence call");

        tokio::spawn(async move {
            let result = match limit {
                Some(limit) => match tokio::time::timeout(limit, request.send(api)).await {
                    Ok(result) => result,
                    Err(_) => Err(ApiError::Timeout {
                        elapsed_ms: limit.as_millis() as u64,
                    }),
                },
                None => request.send(api).await,
            };
            // Receiver gone means the controller was dropped
            let _ = tx.send(Completion { id, result });
        });
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Reconcile every completion that has already arrived, without waiting
    pub fn process_completions(&mut self) -> Vec<MutationOutcome> {
        let mut outcomes = Vec::new();
        while let Ok(completion) = self.rx.try_recv() {
            outcomes.extend(self.reconcile(completion));
        }
        outcomes
    }

    /// Wait for the next completion and reconcile it.
    ///
    /// Returns `None` immediately when nothing is pending.
    pub async fn next_completion(&mut self) -> Option<MutationOutcome> {
        while !self.pending.is_empty() {
            let completion = self.rx.recv().await?;
            if let Some(outcome) = self.reconcile(completion) {
                return Some(outcome);
            }
        }
        None
    }

    /// Wait until no mutation is pending
    pub async fn settle(&mut self) -> Vec<MutationOutcome> {
        let mut outcomes = Vec::new();
        while let Some(outcome) = self.next_completion().await {
            outcomes.push(outcome);
        }
        outcomes
    }

    fn reconcile(&mut self, completion: Completion) -> Option<MutationOutcome> {
        let Completion { id, result } = completion;
        let Some(pending) = self.pending.remove(&id) else {
            warn!(%id, "completion for unknown mutation");
            return None;
        };
        for column in &pending.reserved {
            self.in_flight.remove(column);
        }

        let result = match result {
            Ok(echo) => self.adopt(&pending.request, echo),
            Err(source) => Err(KanbanError::persistence(pending.op, source)),
        };
        let op = pending.op;

        match &result {
            Ok(()) => {
                debug!(%id, op, "persisted");
                self.notify_success(op);
            }
            Err(err) => self.fail(id, pending, err),
        }

        self.pump();
        Some(MutationOutcome { id, op, result })
    }

    fn fail(&mut self, id: MutationId, pending: Pending, err: &KanbanError) {
        match pending.policy {
            FailurePolicy::Keep => {
                warn!(
                    %id,
                    op = pending.op,
                    error = %err,
                    "persistence failed, keeping local change"
                );
                self.notifier.notify(&err.to_string(), Severity::Warning);
            }
            FailurePolicy::RollBack => {
                warn!(%id, op = pending.op, error = %err, "persistence failed, rolling back");
                if let Err(undo_err) = pending.undo.apply(&mut self.board) {
                    error!(
                        %id,
                        op = pending.op,
                        error = %undo_err,
                        "rollback could not be applied"
                    );
                }
                self.notifier.notify(&err.to_string(), Severity::Error);
            }
        }
    }

    fn notify_success(&self, op: &str) {
        if !self.config.notify_success {
            return;
        }
        let message = match op {
            "update column" => "Update success!",
            "delete column" | "delete task" => "Delete success!",
            _ => return,
        };
        self.notifier.notify(message, Severity::Success);
    }

    /// Take over what the server owns from a create echo.
    ///
    /// The server owns ids and column limits. Names, statuses and payload stay
    /// local, since later edits may already be in flight.
    fn adopt(&mut self, request: &Request, echo: Echo) -> Result<()> {
        match (request, echo) {
            (Request::CreateTask { task, .. }, Echo::Task(stored)) => {
                self.adopt_task(&task.id, &stored.id)
            }
            (Request::CreateColumn { column }, Echo::Column(stored)) => {
                self.adopt_column(&column.id, stored)
            }
            _ => Ok(()),
        }
    }

    fn adopt_task(&mut self, local_id: &TaskId, stored_id: &TaskId) -> Result<()> {
        if stored_id == local_id {
            return Ok(());
        }
        if self.board.task(stored_id).is_some() {
            return Err(KanbanError::duplicate_id("task", stored_id.to_string()));
        }
        debug!(local = %local_id, stored = %stored_id, "server assigned a new task id");

        for pending in self.pending.values_mut() {
            pending.request.rekey_task(local_id, stored_id);
            pending.undo.rekey_task(local_id, stored_id);
        }
        if self.board.task(local_id).is_none() {
            debug!(task = %local_id, "task removed before its create completed");
            return Ok(());
        }
        self.board.rekey_task(local_id, stored_id)
    }

    fn adopt_column(&mut self, local_id: &ColumnId, stored: Column) -> Result<()> {
        if stored.id != *local_id && self.board.column(&stored.id).is_some() {
            return Err(KanbanError::duplicate_id("column", stored.id.to_string()));
        }
        if stored.id != *local_id {
            debug!(local = %local_id, stored = %stored.id, "server assigned a new column id");
            if self.in_flight.remove(local_id) {
                self.in_flight.insert(stored.id.clone());
            }
            for pending in self.pending.values_mut() {
                pending.request.rekey_column(local_id, &stored.id);
                pending.undo.rekey_column(local_id, &stored.id);
                for column in &mut pending.reserved {
                    column.retarget(local_id, &stored.id);
                }
            }
        }

        let Some(column) = self.board.column_mut(local_id) else {
            debug!(column = %local_id, "column removed before its create completed");
            return Ok(());
        };
        column.limit = stored.limit;
        if stored.id != *local_id {
            self.board.rekey_column(local_id, &stored.id)?;
        }
        Ok(())
    }
}
