//! Core types for the board engine

mod board;
mod drag;
mod ids;
mod log;
mod task;

pub use board::{Board, Column};
pub use drag::{DragEvent, DragItem};
pub use ids::{ColumnId, LogEntryId, TaskId};
pub use log::LogEntry;
pub use task::{Task, TaskPayload, TaskStatus};
