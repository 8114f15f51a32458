//! FileApi - board storage in a `.kanban` directory
//!
//! ```text
//! .kanban/
//! ├── board.json              # board name + ordered columns
//! ├── tasks/{id}.json         # one file per task
//! ├── activity/current.jsonl  # one LogEntry per persisted operation
//! └── .lock                   # held while a write is in progress
//! ```
//!
//! Writers in this process queue on an async mutex; other processes are kept
//! out by the `.lock` file. Every write call then loads the board, applies the
//! change with the same mutations the controller uses, writes back what
//! changed and appends an activity entry.

use super::{ApiError, ApiResult, BoardApi, Request};
use crate::config::BoardConfig;
use crate::store::{
    ClearColumn, DeleteColumn, DeleteTask, MoveColumn, MoveTask, Mutation, UpdateColumn,
};
use crate::types::{Board, Column, ColumnId, LogEntry, Task, TaskId};
use async_trait::async_trait;
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument};

/// Contents of board.json; tasks live in their own files
#[derive(Debug, Serialize, Deserialize)]
struct BoardFile {
    name: String,
    columns: Vec<Column>,
}

/// File-backed [`BoardApi`]
#[derive(Debug, Clone)]
pub struct FileApi {
    /// Path to the .kanban directory
    root: PathBuf,
    writes: Arc<tokio::sync::Mutex<()>>,
}

impl FileApi {
    /// Create a backend for the given .kanban directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            writes: Arc::default(),
        }
    }

    /// Backend rooted at the configured `storage_dir`
    pub fn from_config(config: &BoardConfig) -> Self {
        Self::new(&config.storage_dir)
    }

    // =========================================================================
    // Path helpers
    // =========================================================================

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn board_path(&self) -> PathBuf {
        self.root.join("board.json")
    }

    pub fn tasks_dir(&self) -> PathBuf {
        self.root.join("tasks")
    }

    pub fn task_path(&self, id: &TaskId) -> PathBuf {
        self.tasks_dir().join(format!("{}.json", id))
    }

    pub fn activity_path(&self) -> PathBuf {
        self.root.join("activity").join("current.jsonl")
    }

    pub fn lock_path(&self) -> PathBuf {
        self.root.join(".lock")
    }

    pub fn is_initialized(&self) -> bool {
        self.board_path().exists()
    }

    /// Create the directory structure and an empty board with `columns`
    pub async fn init(&self, name: &str, columns: Vec<Column>) -> ApiResult<()> {
        if self.is_initialized() {
            return Err(ApiError::rejected(format!(
                "board already exists at {}",
                self.root.display()
            )));
        }
        fs::create_dir_all(self.tasks_dir()).await?;
        if let Some(parent) = self.activity_path().parent() {
            fs::create_dir_all(parent).await?;
        }

        let columns = columns
            .into_iter()
            .map(|mut c| {
                c.task_ids.clear();
                c
            })
            .collect();
        let file = BoardFile {
            name: name.to_string(),
            columns,
        };
        atomic_write(&self.board_path(), &serde_json::to_vec_pretty(&file)?).await?;
        debug!(root = %self.root.display(), "initialized board storage");
        Ok(())
    }

    // =========================================================================
    // Board I/O
    // =========================================================================

    /// Read board.json and every task file
    pub async fn read_board(&self) -> ApiResult<Board> {
        let path = self.board_path();
        if !path.exists() {
            return Err(ApiError::not_found("board", self.root.display().to_string()));
        }
        let content = fs::read_to_string(&path).await?;
        let file: BoardFile = serde_json::from_str(&content)?;

        let mut tasks = Vec::new();
        let tasks_dir = self.tasks_dir();
        if tasks_dir.exists() {
            let mut entries = fs::read_dir(&tasks_dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.extension().and_then(|s| s.to_str()) == Some("json") {
                    let content = fs::read_to_string(&path).await?;
                    tasks.push(serde_json::from_str::<Task>(&content)?);
                }
            }
        }

        Ok(Board::from_parts(file.name, file.columns, tasks)?)
    }

    /// Write the parts of `next` that differ from `previous`
    async fn write_board(&self, previous: &Board, next: &Board) -> ApiResult<()> {
        let file = BoardFile {
            name: next.name.clone(),
            columns: next.columns.clone(),
        };
        atomic_write(&self.board_path(), &serde_json::to_vec_pretty(&file)?).await?;

        for (id, task) in &next.tasks {
            if previous.task(id) != Some(task) {
                atomic_write(&self.task_path(id), &serde_json::to_vec_pretty(task)?).await?;
            }
        }
        for id in previous.tasks.keys() {
            if !next.tasks.contains_key(id) {
                let path = self.task_path(id);
                if path.exists() {
                    fs::remove_file(&path).await?;
                }
            }
        }
        Ok(())
    }

    /// Lock, load, change, write back, log.
    ///
    /// `change` returns the call it performed; `None` means nothing changed
    /// and nothing is written.
    async fn write_op<T, F>(&self, change: F) -> ApiResult<T>
    where
        F: FnOnce(&mut Board) -> ApiResult<(T, Option<Request>)> + Send,
        T: Send,
    {
        let _writer = self.writes.lock().await;
        let start = std::time::Instant::now();
        let _lock = self.lock().await?;

        let previous = self.read_board().await?;
        let mut next = previous.clone();
        let (value, request) = change(&mut next)?;
        let Some(request) = request else {
            debug!("no change, nothing written");
            return Ok(value);
        };
        self.write_board(&previous, &next).await?;

        let entry = LogEntry::new(
            request.op(),
            request.to_json(),
            start.elapsed().as_millis() as u64,
        );
        self.append_activity(&entry).await?;
        Ok(value)
    }

    /// Apply a store mutation to the stored board
    async fn write_mutation<M>(&self, mutation: M) -> ApiResult<M::Output>
    where
        M: Mutation + Send,
        M::Output: Send,
    {
        self.write_op(move |board| {
            let applied = mutation.apply(board)?;
            Ok((applied.value, applied.request))
        })
        .await
    }

    // =========================================================================
    // Activity logging
    // =========================================================================

    async fn append_activity(&self, entry: &LogEntry) -> ApiResult<()> {
        let path = self.activity_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let mut line = serde_json::to_string(entry)?;
        line.push('\n');

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }

    /// Read activity entries, newest first
    pub async fn read_activity(&self, limit: Option<usize>) -> ApiResult<Vec<LogEntry>> {
        let path = self.activity_path();
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content = fs::read_to_string(&path).await?;
        let mut entries: Vec<LogEntry> = content
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();
        entries.reverse();

        if let Some(limit) = limit {
            entries.truncate(limit);
        }
        Ok(entries)
    }

    // =========================================================================
    // Locking
    // =========================================================================

    /// Try to acquire an exclusive lock (non-blocking)
    pub async fn lock(&self) -> ApiResult<StorageLock> {
        let lock_path = self.lock_path();
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).await?;
        }

        let file = std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&lock_path)?;

        match file.try_lock_exclusive() {
            Ok(()) => Ok(StorageLock { file }),
            Err(_) => Err(ApiError::LockBusy),
        }
    }
}

/// RAII lock guard - releases on drop
#[derive(Debug)]
pub struct StorageLock {
    file: std::fs::File,
}

impl Drop for StorageLock {
    fn drop(&mut self) {
        let _ = self.file.unlock();
    }
}

/// Atomic write via temp file and rename
async fn atomic_write(path: &Path, content: &[u8]) -> ApiResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }
    let temp_path = path.with_extension("tmp");
    fs::write(&temp_path, content).await?;
    fs::rename(&temp_path, path).await?;
    Ok(())
}

#[async_trait]
impl BoardApi for FileApi {
    #[instrument(skip(self), fields(root = %self.root.display()))]
    async fn fetch_board(&self) -> ApiResult<Board> {
        self.read_board().await
    }

    #[instrument(skip(self, task), fields(task = %task.id))]
    async fn create_task(&self, column_id: &ColumnId, task: &Task) -> ApiResult<Task> {
        let mut stored = task.clone();
        stored.column_id = column_id.clone();
        self.write_op(move |board| {
            let id = stored.id.clone();
            board.insert_task(stored, None)?;
            let stored = board
                .task(&id)
                .cloned()
                .ok_or_else(|| ApiError::not_found("task", id.to_string()))?;
            let request = Request::CreateTask {
                column_id: stored.column_id.clone(),
                task: stored.clone(),
            };
            Ok((stored, Some(request)))
        })
        .await
    }

    #[instrument(skip(self, task), fields(task = %task.id))]
    async fn update_task(&self, task: &Task) -> ApiResult<()> {
        let task = task.clone();
        self.write_op(move |board| {
            let stored = board
                .task_mut(&task.id)
                .ok_or_else(|| ApiError::not_found("task", task.id.to_string()))?;
            let column_id = stored.column_id.clone();
            let stage = stored.stage.clone();
            *stored = task;
            stored.column_id = column_id;
            stored.stage = stage;
            let request = Request::UpdateTask {
                task: stored.clone(),
            };
            Ok(((), Some(request)))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn delete_task(&self, column_id: &ColumnId, task_id: &TaskId) -> ApiResult<()> {
        self.write_mutation(DeleteTask::new(column_id, task_id))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn move_task(
        &self,
        task_id: &TaskId,
        dest_column: &ColumnId,
        dest_index: usize,
    ) -> ApiResult<()> {
        let (task_id, dest_column) = (task_id.clone(), dest_column.clone());
        self.write_op(move |board| {
            let applied = MoveTask::to(board, &task_id, &dest_column, dest_index)?.apply(board)?;
            Ok(((), applied.request))
        })
        .await
    }

    #[instrument(skip(self, column), fields(column = %column.id))]
    async fn create_column(&self, column: &Column) -> ApiResult<Column> {
        let mut stored = column.clone();
        stored.task_ids.clear();
        self.write_op(move |board| {
            if board.column(&stored.id).is_some() {
                return Err(ApiError::rejected(format!(
                    "column '{}' already exists",
                    stored.id
                )));
            }
            board.columns.push(stored.clone());
            let request = Request::CreateColumn {
                column: stored.clone(),
            };
            Ok((stored, Some(request)))
        })
        .await
    }

    #[instrument(skip(self))]
    async fn update_column(&self, column_id: &ColumnId, name: &str) -> ApiResult<()> {
        self.write_mutation(UpdateColumn::new(column_id, name)).await
    }

    #[instrument(skip(self))]
    async fn clear_column(&self, column_id: &ColumnId) -> ApiResult<()> {
        self.write_mutation(ClearColumn::new(column_id))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn delete_column(&self, column_id: &ColumnId) -> ApiResult<()> {
        self.write_mutation(DeleteColumn::new(column_id))
            .await
            .map(|_| ())
    }

    #[instrument(skip(self))]
    async fn move_column(&self, column_id: &ColumnId, dest_index: usize) -> ApiResult<()> {
        let column_id = column_id.clone();
        self.write_op(move |board| {
            let applied = MoveColumn::to(board, &column_id, dest_index)?.apply(board)?;
            Ok(((), applied.request))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TaskStatus;
    use tempfile::TempDir;

    async fn setup() -> (TempDir, FileApi) {
        let temp = TempDir::new().unwrap();
        let api = FileApi::new(temp.path().join(".kanban"));
        api.init("Test", Board::default_columns()).await.unwrap();
        (temp, api)
    }

    #[tokio::test]
    async fn test_paths() {
        let (temp, api) = setup().await;
        let root = temp.path().join(".kanban");

        assert_eq!(api.root(), root);
        assert_eq!(api.board_path(), root.join("board.json"));
        assert_eq!(api.tasks_dir(), root.join("tasks"));
    }

    #[test]
    fn test_from_config() {
        let config = BoardConfig {
            storage_dir: PathBuf::from("/tmp/board/.kanban"),
            ..BoardConfig::default()
        };
        let api = FileApi::from_config(&config);
        assert_eq!(api.board_path(), PathBuf::from("/tmp/board/.kanban/board.json"));
    }

    #[tokio::test]
    async fn test_init_twice_rejected() {
        let (_temp, api) = setup().await;
        let result = api.init("Again", Vec::new()).await;
        assert!(matches!(result, Err(ApiError::Rejected { .. })));
    }

    #[tokio::test]
    async fn test_task_round_trip() {
        let (_temp, api) = setup().await;
        let task = Task::new("Brief", "todo")
            .with_id("t1")
            .with_status(TaskStatus::NOT_STARTED);

        let stored = api.create_task(&"todo".into(), &task).await.unwrap();
        assert_eq!(stored.stage, "To Do");
        assert!(api.task_path(&"t1".into()).exists());

        let board = api.fetch_board().await.unwrap();
        assert_eq!(board.task(&"t1".into()).unwrap().status.as_str(), "NOT_STARTED");

        api.delete_task(&"todo".into(), &"t1".into()).await.unwrap();
        assert!(!api.task_path(&"t1".into()).exists());
        assert!(api.fetch_board().await.unwrap().tasks.is_empty());
    }

    #[tokio::test]
    async fn test_move_and_activity_log() {
        let (_temp, api) = setup().await;
        api.create_task(&"todo".into(), &Task::new("A", "todo").with_id("t1"))
            .await
            .unwrap();
        api.move_task(&"t1".into(), &"done".into(), 0).await.unwrap();

        let board = api.fetch_board().await.unwrap();
        assert_eq!(board.task(&"t1".into()).unwrap().column_id.as_str(), "done");
        board.validate().unwrap();

        let entries = api.read_activity(None).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].op, "move task"); // Newest first
        assert_eq!(entries[1].op, "create task");
    }

    #[tokio::test]
    async fn test_delete_column_removes_task_files() {
        let (_temp, api) = setup().await;
        api.create_task(&"todo".into(), &Task::new("A", "todo").with_id("t1"))
            .await
            .unwrap();
        api.delete_column(&"todo".into()).await.unwrap();

        assert!(!api.task_path(&"t1".into()).exists());
        let board = api.fetch_board().await.unwrap();
        assert!(board.column(&"todo".into()).is_none());
    }

    #[tokio::test]
    async fn test_locking() {
        let (_temp, api) = setup().await;

        let lock1 = api.lock().await.unwrap();
        let result = api.lock().await;
        assert!(matches!(result, Err(ApiError::LockBusy)));

        // Writes fail while the lock is held
        let result = api.clear_column(&"todo".into()).await;
        assert!(matches!(result, Err(ApiError::LockBusy)));

        drop(lock1);
        let _lock2 = api.lock().await.unwrap();
    }

    #[tokio::test]
    async fn test_fetch_uninitialized() {
        let temp = TempDir::new().unwrap();
        let api = FileApi::new(temp.path().join(".kanban"));
        let result = api.fetch_board().await;
        assert!(matches!(result, Err(ApiError::NotFound { .. })));
    }
}
