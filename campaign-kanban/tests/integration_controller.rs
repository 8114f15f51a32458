//! Integration tests for optimistic mutations and reconciliation

use campaign_kanban::{
    ApiError, Board, BoardConfig, BoardController, DragEvent, DragItem, DropOutcome, KanbanError,
    MemoryApi, NotificationLog, PersistenceOrdering, Severity, Task, TaskId, TaskPayload,
    TaskStatus,
};
use std::sync::Arc;
use std::time::Duration;

/// To Do: [t1, t2], In Progress: [], Done: []
fn seeded() -> Board {
    let mut board = Board::new("Spring Launch");
    board.columns = Board::default_columns();
    board
        .insert_task(Task::new("Write brief", "todo").with_id("t1"), None)
        .unwrap();
    board
        .insert_task(Task::new("Book shoot", "todo").with_id("t2"), None)
        .unwrap();
    board
}

async fn connect(config: BoardConfig) -> (Arc<MemoryApi>, NotificationLog, BoardController) {
    let api = Arc::new(MemoryApi::new(seeded()));
    let log = NotificationLog::new();
    let controller = BoardController::connect(api.clone(), Arc::new(log.clone()), config)
        .await
        .unwrap();
    (api, log, controller)
}

fn ids(board: &Board, column: &str) -> Vec<TaskId> {
    board.column(&column.into()).unwrap().task_ids.clone()
}

#[test_log::test(tokio::test)]
async fn test_drag_between_columns_persists() {
    let (api, log, mut controller) = connect(BoardConfig::default()).await;

    controller.drag_start(DragItem::Task { id: "t1".into() }).unwrap();
    let outcome = controller
        .drag_end(Some(DragEvent::task("t1", "todo", 0, "done", 0)))
        .unwrap();
    assert!(matches!(outcome, DropOutcome::Applied(_)));

    // Optimistic state is visible before persistence completes
    assert_eq!(ids(controller.board(), "todo"), vec![TaskId::from("t2")]);
    assert_eq!(ids(controller.board(), "done"), vec![TaskId::from("t1")]);
    let moved = controller.board().task(&"t1".into()).unwrap();
    assert_eq!(moved.column_id.as_str(), "done");
    assert_eq!(moved.stage, "Done");
    assert_eq!(controller.pending_count(), 1);

    let outcomes = controller.settle().await;
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].op, "move task");
    assert!(outcomes[0].result.is_ok());

    assert_eq!(api.snapshot(), *controller.board());
    assert!(log.snapshot().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_failed_move_goes_back() {
    let (api, log, mut controller) = connect(BoardConfig::default()).await;
    let before = controller.board().clone();
    api.fail_next("move task");

    controller.drag_start(DragItem::Task { id: "t2".into() }).unwrap();
    controller
        .drag_end(Some(DragEvent::task("t2", "todo", 1, "in-progress", 0)))
        .unwrap();
    let outcomes = controller.settle().await;

    assert!(matches!(
        outcomes[0].result,
        Err(KanbanError::Persistence {
            source: ApiError::Transport { .. },
            ..
        })
    ));
    assert_eq!(*controller.board(), before);
    assert_eq!(log.count(Severity::Error), 1);
}

#[test_log::test(tokio::test)]
async fn test_create_then_reject_rolls_back() {
    let (api, log, mut controller) = connect(BoardConfig::default()).await;
    let before = controller.board().clone();
    api.fail_next("create task");

    let created = controller
        .create_task(&"todo".into(), TaskPayload::new("Edit video"))
        .unwrap();
    assert!(controller.board().task(&created.value.id).is_some());

    let outcome = controller.next_completion().await.unwrap();
    assert_eq!(Some(outcome.id), created.mutation);
    assert!(outcome.result.is_err());

    assert!(controller.board().task(&created.value.id).is_none());
    assert_eq!(*controller.board(), before);

    let notes = log.drain();
    assert_eq!(notes.len(), 1);
    assert_eq!(notes[0].severity, Severity::Error);
    assert!(notes[0].message.starts_with("create task failed"));
}

#[test_log::test(tokio::test)]
async fn test_rename_to_same_name_sends_nothing() {
    let (api, log, mut controller) = connect(BoardConfig::default()).await;

    let renamed = controller.update_column(&"todo".into(), "To Do").unwrap();
    assert!(renamed.mutation.is_none());
    assert_eq!(controller.pending_count(), 0);
    assert!(controller.settle().await.is_empty());
    assert_eq!(api.call_count("update column"), 0);
    assert!(log.snapshot().is_empty());
}

#[test_log::test(tokio::test)]
async fn test_rename_success_notifies() {
    let (api, log, mut controller) = connect(BoardConfig::default()).await;

    controller.update_column(&"todo".into(), "Backlog").unwrap();
    controller.settle().await;

    assert_eq!(api.snapshot().column(&"todo".into()).unwrap().name, "Backlog");
    assert_eq!(controller.board().task(&"t1".into()).unwrap().stage, "Backlog");
    let notes = log.drain();
    assert_eq!(notes[0].message, "Update success!");
    assert_eq!(notes[0].severity, Severity::Success);
}

#[test_log::test(tokio::test)]
async fn test_failed_rename_keeps_local_name() {
    let (api, log, mut controller) = connect(BoardConfig::default()).await;
    api.fail_next("update column");

    controller.update_column(&"todo".into(), "Backlog").unwrap();
    controller.settle().await;

    assert_eq!(controller.board().column(&"todo".into()).unwrap().name, "Backlog");
    assert_eq!(log.count(Severity::Warning), 1);
    assert_eq!(log.count(Severity::Error), 0);
}

#[test_log::test(tokio::test)]
async fn test_delete_column_cascades_and_restores_on_failure() {
    let (api, log, mut controller) = connect(BoardConfig::default()).await;
    let before = controller.board().clone();

    controller.delete_column(&"todo".into()).unwrap();
    assert!(controller
        .board()
        .tasks
        .values()
        .all(|t| t.column_id.as_str() != "todo"));
    controller.settle().await;
    assert_eq!(api.snapshot(), *controller.board());
    assert_eq!(log.drain()[0].message, "Delete success!");

    // Same delete against a failing backend comes back whole
    let (api, log, mut controller) = connect(BoardConfig::default()).await;
    api.fail_next("delete column");
    controller.delete_column(&"todo".into()).unwrap();
    controller.settle().await;
    assert_eq!(*controller.board(), before);
    assert_eq!(log.count(Severity::Error), 1);
}

#[test_log::test(tokio::test)]
async fn test_clear_column_twice() {
    let (api, _log, mut controller) = connect(BoardConfig::default()).await;

    let first = controller.clear_column(&"todo".into()).unwrap();
    let second = controller.clear_column(&"todo".into()).unwrap();
    assert_eq!(first.value, 2);
    assert_eq!(second.value, 0);

    let outcomes = controller.settle().await;
    assert!(outcomes.iter().all(|o| o.result.is_ok()));
    assert!(controller.board().tasks.is_empty());
    assert_eq!(api.snapshot(), *controller.board());
}

#[test_log::test(tokio::test)]
async fn test_out_of_order_failure_keeps_later_changes() {
    let (api, _log, mut controller) = connect(BoardConfig::default()).await;
    // The first call fails only after the second has completed
    api.delay("delete task", Duration::from_millis(50));
    api.fail_next("delete task");

    controller.delete_task(&"todo".into(), &"t1".into()).unwrap();
    controller.move_task(&"t2".into(), &"done".into(), 0).unwrap();

    let outcomes = controller.settle().await;
    assert_eq!(outcomes.len(), 2);
    assert_eq!(outcomes[0].op, "move task");
    assert!(outcomes[0].result.is_ok());
    assert_eq!(outcomes[1].op, "delete task");
    assert!(outcomes[1].result.is_err());

    // t1 is back, t2 stays where it was moved
    assert_eq!(ids(controller.board(), "todo"), vec![TaskId::from("t1")]);
    assert_eq!(ids(controller.board(), "done"), vec![TaskId::from("t2")]);
    controller.board().validate().unwrap();
}

#[test_log::test(tokio::test)]
async fn test_per_column_ordering_serializes_calls() {
    let config = BoardConfig {
        ordering: PersistenceOrdering::PerColumn,
        ..BoardConfig::default()
    };
    let (api, _log, mut controller) = connect(config).await;
    api.delay("update column", Duration::from_millis(30));

    controller.update_column(&"todo".into(), "Backlog").unwrap();
    controller.clear_column(&"todo".into()).unwrap();
    // Touches a different column, so it is not held back
    controller.update_column(&"done".into(), "Shipped").unwrap();

    let outcomes = controller.settle().await;
    let ops: Vec<_> = outcomes.iter().map(|o| o.op).collect();
    assert_eq!(ops.len(), 3);

    let calls = api.calls();
    let rename = calls.iter().position(|c| c == "update column").unwrap();
    let clear = calls.iter().position(|c| c == "clear column").unwrap();
    assert!(rename < clear);

    let server = api.snapshot();
    assert_eq!(server.column(&"todo".into()).unwrap().name, "Backlog");
    assert_eq!(server.column(&"done".into()).unwrap().name, "Shipped");
    assert!(server.tasks.is_empty());
}

#[test_log::test(tokio::test)]
async fn test_process_completions_does_not_block() {
    let (api, _log, mut controller) = connect(BoardConfig::default()).await;
    api.delay("delete task", Duration::from_millis(200));

    controller.delete_task(&"todo".into(), &"t1".into()).unwrap();
    assert!(controller.process_completions().is_empty());
    assert_eq!(controller.pending_count(), 1);

    controller.settle().await;
    assert_eq!(controller.pending_count(), 0);
}

#[test_log::test(tokio::test)]
async fn test_column_drag_reorders() {
    let (api, _log, mut controller) = connect(BoardConfig::default()).await;

    controller.drag_start(DragItem::Column { id: "done".into() }).unwrap();
    let outcome = controller
        .drag_end(Some(DragEvent::column("done", 2, 0)))
        .unwrap();
    assert!(matches!(outcome, DropOutcome::Applied(_)));
    controller.settle().await;

    let order: Vec<_> = api
        .snapshot()
        .columns
        .iter()
        .map(|c| c.id.to_string())
        .collect();
    assert_eq!(order, vec!["done", "todo", "in-progress"]);
}

#[test_log::test(tokio::test)]
async fn test_drop_from_filtered_view() {
    let (_api, _log, mut controller) = connect(BoardConfig::default()).await;

    // A submission that has not started yet sits between the visible cards
    let hidden = controller
        .create_task(
            &"todo".into(),
            TaskPayload::new("Draft caption").with_status(TaskStatus::NOT_STARTED),
        )
        .unwrap()
        .value;
    controller.move_task(&hidden.id, &"todo".into(), 1).unwrap();
    controller.settle().await;
    assert_eq!(
        ids(controller.board(), "todo"),
        vec![TaskId::from("t1"), hidden.id.clone(), TaskId::from("t2")]
    );

    let view = controller.view();
    let todo = view.column(&"todo".into()).unwrap();
    assert_eq!(todo.tasks.len(), 2);

    // Visible t2 (position 1) dropped at visible position 0
    let event = view
        .task_drag(&"t2".into(), &"todo".into(), 1, &"todo".into(), 0)
        .unwrap();

    controller.drag_start(DragItem::Task { id: "t2".into() }).unwrap();
    controller.drag_end(Some(event)).unwrap();
    assert_eq!(
        ids(controller.board(), "todo"),
        vec![TaskId::from("t2"), TaskId::from("t1"), hidden.id]
    );
}

#[test_log::test(tokio::test)]
async fn test_connect_failure() {
    let api = Arc::new(MemoryApi::new(seeded()));
    api.fail_next("fetch board");

    let notes = Arc::new(NotificationLog::new());
    let result = BoardController::connect(api, notes, BoardConfig::default()).await;
    assert!(matches!(result, Err(KanbanError::Persistence { .. })));
}

#[test_log::test(tokio::test)]
async fn test_edit_during_create_survives_success() {
    let (api, _log, mut controller) = connect(BoardConfig::default()).await;

    let mut task = controller
        .create_task(&"todo".into(), TaskPayload::new("Draft"))
        .unwrap()
        .value;
    task.name = "Final".into();
    controller.update_task(task.clone()).unwrap();

    let outcomes = controller.settle().await;
    assert!(outcomes.iter().all(|o| o.result.is_ok()), "{:?}", outcomes);
    assert_eq!(controller.board().task(&task.id).unwrap().name, "Final");
    assert_eq!(api.snapshot(), *controller.board());
}

#[test_log::test(tokio::test)]
async fn test_rename_during_column_create_survives_success() {
    let (api, log, mut controller) = connect(BoardConfig::default()).await;

    let column = controller.create_column("Review").unwrap().value;
    controller.update_column(&column.id, "QA").unwrap();

    let outcomes = controller.settle().await;
    assert!(outcomes.iter().all(|o| o.result.is_ok()), "{:?}", outcomes);
    assert_eq!(controller.board().column(&column.id).unwrap().name, "QA");
    assert_eq!(api.snapshot(), *controller.board());
    assert_eq!(api.call_count("update column"), 1);
    assert_eq!(log.count(Severity::Error), 0);
}

#[test_log::test(tokio::test)]
async fn test_server_assigned_task_id_rekeys() {
    let config = BoardConfig {
        ordering: PersistenceOrdering::PerColumn,
        ..BoardConfig::default()
    };
    let (api, _log, mut controller) = connect(config).await;
    api.assign_next_id("srv-1");

    let mut task = controller
        .create_task(&"todo".into(), TaskPayload::new("Draft"))
        .unwrap()
        .value;
    task.name = "Final".into();
    // Held back until the create lands, then sent under the new id
    controller.update_task(task.clone()).unwrap();

    let outcomes = controller.settle().await;
    assert!(outcomes.iter().all(|o| o.result.is_ok()), "{:?}", outcomes);

    assert!(controller.board().task(&task.id).is_none());
    let stored = controller.board().task(&"srv-1".into()).unwrap();
    assert_eq!(stored.name, "Final");
    assert_eq!(
        ids(controller.board(), "todo"),
        vec![TaskId::from("t1"), TaskId::from("t2"), TaskId::from("srv-1")]
    );
    assert_eq!(api.snapshot(), *controller.board());
}

#[test_log::test(tokio::test)]
async fn test_server_assigned_column_id_rekeys() {
    let config = BoardConfig {
        ordering: PersistenceOrdering::PerColumn,
        ..BoardConfig::default()
    };
    let (api, _log, mut controller) = connect(config).await;
    api.assign_next_id("col-qa");

    let column = controller.create_column("QA").unwrap().value;
    let task = controller
        .create_task(&column.id, TaskPayload::new("Check captions"))
        .unwrap()
        .value;

    let outcomes = controller.settle().await;
    assert!(outcomes.iter().all(|o| o.result.is_ok()), "{:?}", outcomes);

    assert!(controller.board().column(&column.id).is_none());
    let stored = controller.board().task(&task.id).unwrap();
    assert_eq!(stored.column_id.as_str(), "col-qa");
    assert_eq!(ids(controller.board(), "col-qa"), vec![task.id.clone()]);
    assert_eq!(api.snapshot(), *controller.board());
}

#[test_log::test(tokio::test)]
async fn test_colliding_echo_rolls_back() {
    // The local board knows a task the server has not seen yet
    let api = Arc::new(MemoryApi::new(seeded()));
    let mut local = seeded();
    local
        .insert_task(Task::new("Offline note", "done").with_id("t9"), None)
        .unwrap();
    let log = NotificationLog::new();
    let mut controller = BoardController::with_board(
        local.clone(),
        api.clone(),
        Arc::new(log.clone()),
        BoardConfig::default(),
    )
    .unwrap();
    api.assign_next_id("t9");

    let created = controller
        .create_task(&"todo".into(), TaskPayload::new("Edit video"))
        .unwrap()
        .value;
    let outcome = controller.next_completion().await.unwrap();

    assert!(matches!(
        outcome.result,
        Err(KanbanError::DuplicateIdentifier { .. })
    ));
    assert!(controller.board().task(&created.id).is_none());
    assert_eq!(*controller.board(), local);
    assert_eq!(log.count(Severity::Error), 1);
}

#[test_log::test(tokio::test)]
async fn test_echo_after_delete_is_ignored() {
    let config = BoardConfig {
        ordering: PersistenceOrdering::PerColumn,
        ..BoardConfig::default()
    };
    let (api, log, mut controller) = connect(config).await;
    let before = controller.board().clone();

    // Each delete is held back behind its create
    api.assign_next_id("srv-1");
    let task = controller
        .create_task(&"todo".into(), TaskPayload::new("Scrapped"))
        .unwrap()
        .value;
    controller.delete_task(&"todo".into(), &task.id).unwrap();
    let outcomes = controller.settle().await;
    assert!(outcomes.iter().all(|o| o.result.is_ok()), "{:?}", outcomes);

    api.assign_next_id("col-qa");
    let column = controller.create_column("QA").unwrap().value;
    controller.delete_column(&column.id).unwrap();
    let outcomes = controller.settle().await;
    assert!(outcomes.iter().all(|o| o.result.is_ok()), "{:?}", outcomes);

    // The deletes reached the server under the ids it assigned
    assert_eq!(*controller.board(), before);
    assert_eq!(api.snapshot(), before);
    assert_eq!(log.count(Severity::Error), 0);
}
