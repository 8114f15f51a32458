//! Kanban board engine with optimistic drag-and-drop
//!
//! This crate holds the state of a campaign deliverables board: ordered
//! columns, the tasks in them, and the drag gestures that move both. Every
//! change is applied to the local board immediately and persisted in the
//! background; when persistence fails the change is reverted or kept
//! depending on how destructive it was.
//!
//! ## Overview
//!
//! - **Pure reducer** - [`reducer::apply`] turns a board and a [`DragEvent`] into the next board
//! - **Mutations** - create / update / delete / move commands in [`store`], each with its
//!   own undo
//! - **Controller** - [`BoardController`] drives the drag gesture and reconciles persistence
//! - **Pluggable storage** - anything implementing [`BoardApi`]; [`MemoryApi`] and
//!   [`FileApi`] ship here
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use campaign_kanban::{
//!     Board, BoardConfig, BoardController, DragEvent, DragItem, FileApi, TracingNotifier,
//! };
//! use std::sync::Arc;
//!
//! # async fn example() -> campaign_kanban::Result<()> {
//! let api = FileApi::new(".kanban");
//! if !api.is_initialized() {
//!     api.init("Spring Launch", Board::default_columns()).await.map_err(|e| {
//!         campaign_kanban::KanbanError::persistence("init board", e)
//!     })?;
//! }
//!
//! let config = BoardConfig::load()?;
//! let mut controller =
//!     BoardController::connect(Arc::new(api), Arc::new(TracingNotifier), config).await?;
//!
//! // A card dragged from the top of "To Do" into "Done"
//! let todo = controller.board().columns[0].clone();
//! if let Some(first) = todo.task_ids.first() {
//!     controller.drag_start(DragItem::Task { id: first.clone() })?;
//!     controller.drag_end(Some(DragEvent::task(first.clone(), todo.id.clone(), 0, "done", 0)))?;
//! }
//! controller.settle().await;
//! # Ok(())
//! # }
//! ```
//!
//! ## Storage Structure
//!
//! ```text
//! .kanban/
//! ├── board.json              # Board name and ordered columns
//! ├── tasks/
//! │   └── {id}.json           # One file per task
//! ├── activity/
//! │   └── current.jsonl       # Operation log
//! └── .lock                   # Held while a write is in progress
//! ```

pub mod api;
pub mod config;
pub mod controller;
mod error;
pub mod logging;
pub mod notify;
pub mod reducer;
pub mod store;
pub mod types;
pub mod view;

pub use api::{ApiError, ApiResult, BoardApi, Echo, FileApi, MemoryApi, Request};
pub use config::{BoardConfig, PersistenceOrdering};
pub use controller::{BoardController, DragState, DropOutcome, Mutated, MutationId, MutationOutcome};
pub use error::{KanbanError, Result};
pub use notify::{Notification, NotificationLog, Notifier, Severity, TracingNotifier};
pub use store::{Mutation, Undo};
pub use view::{BoardView, ColumnView, TaskFilter};

// Re-export commonly used types
pub use types::{
    Board, Column, ColumnId, DragEvent, DragItem, LogEntry, LogEntryId, Task, TaskId, TaskPayload,
    TaskStatus,
};
