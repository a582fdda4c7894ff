//! State machine tests for the TUI App.
//!
//! Each test runs the mock backend on its own thread (the blocking client owns
//! a tokio runtime, so the server cannot share the test's), builds an App and
//! drives it with key events.

use std::sync::Arc;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use taski_client::{BlockingApiClient, MemoryTokenStore};
use taski_core::task::{Priority, Status};
use taski_core::{Session, Task, User};
use taski_mock_server::MockServer;
use taski_tui::app::{App, Mode, Section};
use taski_tui::state::{DetailPhase, EditingTarget};

/// Spawn the mock server on a separate thread and hand back its handle.
fn spawn_server() -> MockServer {
    let (tx, rx) = std::sync::mpsc::sync_channel(1);
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let server = taski_mock_server::spawn_test_server().await;
            tx.send(server).unwrap();
            std::future::pending::<()>().await;
        });
    });
    rx.recv().unwrap()
}

fn key(code: KeyCode) -> KeyEvent {
    KeyEvent::new(code, KeyModifiers::NONE)
}

fn char_key(c: char) -> KeyEvent {
    key(KeyCode::Char(c))
}

fn type_text(app: &mut App, text: &str) {
    for c in text.chars() {
        app.handle_key(char_key(c));
    }
}

fn client_for(server: &MockServer, session: Option<Session>) -> BlockingApiClient {
    let store = match session {
        Some(s) => MemoryTokenStore::with_session(&s),
        None => MemoryTokenStore::new(),
    };
    BlockingApiClient::new(&server.base_url, Arc::new(store)).unwrap()
}

fn session_for(server: &MockServer, user: &User) -> Session {
    let tokens = server.issue_tokens(user.id);
    Session {
        access_token: tokens.access,
        refresh_token: tokens.refresh,
        user: Some(user.clone()),
    }
}

/// Logged-in app over a server with one task, returning (server, app, task).
fn make_app_with_task() -> (MockServer, App, Task) {
    let server = spawn_server();
    let user = server.seed_user("alice", "secret");
    let task = server.insert_task(user.id, "Write report", Status::Todo, Priority::High);
    let client = client_for(&server, Some(session_for(&server, &user)));
    let app = App::new(client).unwrap();
    (server, app, task)
}

fn open_detail(app: &mut App) {
    app.handle_key(key(KeyCode::Enter));
    assert!(app.has_pending_load());
    app.load_pending();
    assert_eq!(app.detail().unwrap().phase, DetailPhase::Ready);
}

fn checklist_ids(app: &App) -> Vec<i64> {
    app.detail()
        .unwrap()
        .checklist
        .iter()
        .map(|i| i.id)
        .collect()
}

// ---- Auth ----

#[test]
fn starts_at_login_without_session() {
    let server = spawn_server();
    let app = App::new(client_for(&server, None)).unwrap();
    assert!(matches!(app.mode(), Mode::Login { .. }));
    assert!(app.is_input_mode());
    assert!(server.requests().is_empty());
}

#[test]
fn login_with_missing_fields_sends_nothing() {
    let server = spawn_server();
    let mut app = App::new(client_for(&server, None)).unwrap();

    type_text(&mut app, "alice");
    app.handle_key(key(KeyCode::Enter));

    match app.mode() {
        Mode::Login { form } => {
            assert_eq!(form.error.as_deref(), Some("Username and password are required"))
        }
        other => panic!("expected Login, got {other:?}"),
    }
    assert_eq!(server.request_count("POST", "/auth/login/"), 0);
}

#[test]
fn login_then_list_loads() {
    let server = spawn_server();
    let user = server.seed_user("alice", "secret");
    server.insert_task(user.id, "Buy milk", Status::Todo, Priority::Low);
    let mut app = App::new(client_for(&server, None)).unwrap();

    type_text(&mut app, "alice");
    app.handle_key(key(KeyCode::Tab));
    type_text(&mut app, "secret");
    app.handle_key(key(KeyCode::Enter));

    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(app.tasks().len(), 1);
    assert_eq!(app.tasks()[0].title, "Buy milk");
    assert_eq!(app.status_message(), Some("Signed in as alice"));
}

#[test]
fn bad_login_shows_server_message() {
    let server = spawn_server();
    server.seed_user("alice", "secret");
    let mut app = App::new(client_for(&server, None)).unwrap();

    type_text(&mut app, "alice");
    app.handle_key(key(KeyCode::Tab));
    type_text(&mut app, "wrong");
    app.handle_key(key(KeyCode::Enter));

    match app.mode() {
        Mode::Login { form } => {
            assert_eq!(
                form.error.as_deref(),
                Some("No active account found with the given credentials")
            );
            assert!(form.password.is_empty());
            assert_eq!(form.username, "alice");
        }
        other => panic!("expected Login, got {other:?}"),
    }
}

#[test]
fn register_from_login_screen() {
    let server = spawn_server();
    let mut app = App::new(client_for(&server, None)).unwrap();

    app.handle_key(key(KeyCode::F(2)));
    assert!(matches!(app.mode(), Mode::Register { .. }));

    type_text(&mut app, "carol");
    app.handle_key(key(KeyCode::Tab));
    type_text(&mut app, "carol@example.com");
    app.handle_key(key(KeyCode::Tab));
    type_text(&mut app, "pw");
    app.handle_key(key(KeyCode::Enter));

    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(server.request_count("POST", "/auth/register/"), 1);
}

#[test]
fn rejected_session_forces_login() {
    let (server, mut app, _task) = make_app_with_task();
    server.expire_access_tokens();
    server.revoke_refresh_tokens();

    app.handle_key(char_key('r'));

    match app.mode() {
        Mode::Login { form } => assert_eq!(
            form.error.as_deref(),
            Some("Your session has expired. Please log in again.")
        ),
        other => panic!("expected Login, got {other:?}"),
    }
    assert!(app.tasks().is_empty());
}

#[test]
fn expired_access_token_is_refreshed_transparently() {
    let (server, mut app, _task) = make_app_with_task();
    server.expire_access_tokens();

    app.handle_key(char_key('r'));

    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(app.tasks().len(), 1);
    assert_eq!(server.request_count("POST", "/auth/refresh/"), 1);
}

#[test]
fn logout_returns_to_login() {
    let (_server, mut app, _task) = make_app_with_task();
    app.handle_key(char_key('L'));
    assert!(matches!(app.mode(), Mode::Login { .. }));
    assert!(app.tasks().is_empty());
}

// ---- Task list and filters ----

#[test]
fn status_filter_cycles_and_refetches() {
    let (server, mut app, _task) = make_app_with_task();

    app.handle_key(char_key('s'));
    assert_eq!(app.filter().status, Some(Status::Todo));
    assert_eq!(server.request_count("GET", "/tasks/?status=TODO"), 1);

    app.handle_key(char_key('s'));
    app.handle_key(char_key('s'));
    assert_eq!(app.filter().status, Some(Status::Done));
    assert!(app.tasks().is_empty());

    app.handle_key(char_key('s'));
    assert_eq!(app.filter().status, None);
    assert_eq!(app.tasks().len(), 1);
}

#[test]
fn search_input_applies_on_enter() {
    let (server, mut app, _task) = make_app_with_task();

    app.handle_key(char_key('/'));
    assert!(app.is_input_mode());
    type_text(&mut app, "report");
    app.handle_key(key(KeyCode::Enter));

    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(app.filter().search.as_deref(), Some("report"));
    assert_eq!(server.request_count("GET", "/tasks/?search=report"), 1);
    assert_eq!(app.tasks().len(), 1);

    app.handle_key(char_key('c'));
    assert!(app.filter().is_empty());
}

#[test]
fn search_input_esc_keeps_filter() {
    let (_server, mut app, _task) = make_app_with_task();
    app.handle_key(char_key('/'));
    type_text(&mut app, "zzz");
    app.handle_key(key(KeyCode::Esc));
    assert!(matches!(app.mode(), Mode::Normal));
    assert!(app.filter().search.is_none());
}

// ---- Task form ----

#[test]
fn empty_title_is_rejected_locally() {
    let (server, mut app, _task) = make_app_with_task();

    app.handle_key(char_key('n'));
    app.handle_key(key(KeyCode::Enter));

    match app.mode() {
        Mode::TaskForm { form } => {
            assert_eq!(form.error.as_deref(), Some("task title is required"))
        }
        other => panic!("expected TaskForm, got {other:?}"),
    }
    assert_eq!(server.request_count("POST", "/tasks/"), 0);
}

#[test]
fn new_task_is_created_and_listed() {
    let (server, mut app, _task) = make_app_with_task();

    app.handle_key(char_key('n'));
    type_text(&mut app, "Call plumber");
    app.handle_key(key(KeyCode::Enter));

    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(server.request_count("POST", "/tasks/"), 1);
    assert!(app.tasks().iter().any(|t| t.title == "Call plumber"));
    assert_eq!(app.status_message(), Some("Task created"));
}

#[test]
fn edit_task_changes_priority() {
    let (server, mut app, task) = make_app_with_task();

    app.handle_key(char_key('e'));
    // Title, Description, DueDate, Status, Priority
    for _ in 0..4 {
        app.handle_key(key(KeyCode::Tab));
    }
    app.handle_key(key(KeyCode::Right));
    app.handle_key(key(KeyCode::Enter));

    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(
        server.request_count("PATCH", &format!("/tasks/{}/", task.id)),
        1
    );
    assert_eq!(app.tasks()[0].priority, Priority::Low);
}

#[test]
fn task_form_esc_discards() {
    let (server, mut app, _task) = make_app_with_task();
    app.handle_key(char_key('n'));
    type_text(&mut app, "never saved");
    app.handle_key(key(KeyCode::Esc));
    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(server.request_count("POST", "/tasks/"), 0);
}

// ---- Delete ----

#[test]
fn cancelled_delete_sends_nothing() {
    let (server, mut app, task) = make_app_with_task();

    app.handle_key(char_key('d'));
    assert!(matches!(app.mode(), Mode::ConfirmDelete { .. }));
    app.handle_key(char_key('n'));

    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(
        server.request_count("DELETE", &format!("/tasks/{}/", task.id)),
        0
    );
    assert_eq!(app.tasks().len(), 1);
}

#[test]
fn confirmed_delete_removes_task() {
    let (server, mut app, task) = make_app_with_task();

    app.handle_key(char_key('d'));
    app.handle_key(char_key('y'));

    assert!(matches!(app.mode(), Mode::Normal));
    assert_eq!(
        server.request_count("DELETE", &format!("/tasks/{}/", task.id)),
        1
    );
    assert!(app.tasks().is_empty());
}

#[test]
fn delete_from_detail_cancel_returns_to_detail() {
    let (_server, mut app, _task) = make_app_with_task();
    open_detail(&mut app);

    app.handle_key(char_key('d'));
    assert!(matches!(app.mode(), Mode::ConfirmDelete { .. }));
    app.handle_key(key(KeyCode::Esc));
    assert!(matches!(app.mode(), Mode::Detail { .. }));
}

// ---- Detail ----

#[test]
fn detail_loads_after_loading_phase() {
    let (server, mut app, task) = make_app_with_task();
    server.insert_checklist_item(task.id, "outline");

    app.handle_key(key(KeyCode::Enter));
    assert_eq!(app.detail().unwrap().phase, DetailPhase::Loading);
    // Keys other than Esc are ignored while loading.
    app.handle_key(char_key('a'));
    assert!(app.detail().unwrap().compose.is_none());

    app.load_pending();
    let view = app.detail().unwrap();
    assert_eq!(view.phase, DetailPhase::Ready);
    assert_eq!(view.checklist.len(), 1);
    assert!(!app.has_pending_load());

    app.handle_key(key(KeyCode::Esc));
    assert!(matches!(app.mode(), Mode::Normal));
}

#[test]
fn add_comment_from_detail() {
    let (_server, mut app, _task) = make_app_with_task();
    open_detail(&mut app);

    app.handle_key(key(KeyCode::Tab));
    assert_eq!(app.detail().unwrap().section, Section::Comments);
    app.handle_key(char_key('a'));
    assert!(app.is_input_mode());
    type_text(&mut app, "first draft done");
    app.handle_key(key(KeyCode::Enter));

    let view = app.detail().unwrap();
    assert!(view.compose.is_none());
    assert_eq!(view.comments.len(), 1);
    assert_eq!(view.comments[0].content, "first draft done");
}

#[test]
fn new_edit_replaces_previous_edit_target() {
    let (server, mut app, task) = make_app_with_task();
    server.insert_checklist_item(task.id, "outline");
    open_detail(&mut app);

    // Comment first, then start editing it.
    app.handle_key(key(KeyCode::Tab));
    app.handle_key(char_key('a'));
    type_text(&mut app, "note");
    app.handle_key(key(KeyCode::Enter));
    app.handle_key(key(KeyCode::Enter));
    let comment_id = app.detail().unwrap().comments[0].id;
    assert_eq!(app.detail().unwrap().editing, EditingTarget::Comment(comment_id));

    app.handle_key(key(KeyCode::Esc));
    app.handle_key(key(KeyCode::BackTab));
    app.handle_key(key(KeyCode::Enter));
    let item_id = app.detail().unwrap().checklist[0].id;
    assert_eq!(app.detail().unwrap().editing, EditingTarget::ChecklistItem(item_id));
    assert_eq!(app.detail().unwrap().edit_buffer, "outline");
}

#[test]
fn inline_edit_updates_checklist_item() {
    let (server, mut app, task) = make_app_with_task();
    let item = server.insert_checklist_item(task.id, "outline");
    open_detail(&mut app);

    app.handle_key(key(KeyCode::Enter));
    app.handle_key(key(KeyCode::Backspace));
    type_text(&mut app, "s");
    app.handle_key(key(KeyCode::Enter));

    let view = app.detail().unwrap();
    assert_eq!(view.editing, EditingTarget::None);
    assert_eq!(view.checklist[0].text, "outlins");
    assert!(server
        .requests()
        .iter()
        .any(|r| r.path == format!("/tasks/{}/checklist/{}/", task.id, item.id)));
}

#[test]
fn checklist_toggle_updates_completion() {
    let (server, mut app, task) = make_app_with_task();
    server.insert_checklist_item(task.id, "outline");
    server.insert_checklist_item(task.id, "draft");
    open_detail(&mut app);

    app.handle_key(char_key(' '));

    let view = app.detail().unwrap();
    assert!(view.checklist[0].is_completed);
    assert_eq!(view.task.checklist_completion, Some(50.0));
    assert_eq!(app.tasks()[0].checklist_completion, Some(50.0));
}

#[test]
fn failed_toggle_reverts() {
    let (server, mut app, task) = make_app_with_task();
    let item = server.insert_checklist_item(task.id, "outline");
    open_detail(&mut app);

    server.fail_next(
        "POST",
        &format!("/tasks/{}/checklist/{}/complete/", task.id, item.id),
        500,
    );
    app.handle_key(char_key(' '));

    let view = app.detail().unwrap();
    assert!(!view.checklist[0].is_completed);
    assert_eq!(app.status_message(), Some("Injected failure"));
}

#[test]
fn reorder_commit_shows_server_order() {
    let (server, mut app, task) = make_app_with_task();
    let a = server.insert_checklist_item(task.id, "a");
    let b = server.insert_checklist_item(task.id, "b");
    let c = server.insert_checklist_item(task.id, "c");
    open_detail(&mut app);

    // Move "c" to the top.
    app.handle_key(char_key('j'));
    app.handle_key(char_key('j'));
    app.handle_key(char_key('o'));
    app.handle_key(char_key('K'));
    app.handle_key(char_key('K'));
    // Not sent until committed.
    assert_eq!(checklist_ids(&app), vec![a.id, b.id, c.id]);
    app.handle_key(key(KeyCode::Enter));

    assert!(app.detail().unwrap().reorder.is_none());
    assert_eq!(checklist_ids(&app), vec![c.id, a.id, b.id]);
    let positions: Vec<i64> = app
        .detail()
        .unwrap()
        .checklist
        .iter()
        .map(|i| i.position)
        .collect();
    assert!(positions.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn reorder_cancel_sends_nothing() {
    let (server, mut app, task) = make_app_with_task();
    let a = server.insert_checklist_item(task.id, "a");
    let b = server.insert_checklist_item(task.id, "b");
    open_detail(&mut app);

    app.handle_key(char_key('o'));
    app.handle_key(char_key('J'));
    app.handle_key(key(KeyCode::Esc));

    assert!(app.detail().unwrap().reorder.is_none());
    assert_eq!(checklist_ids(&app), vec![a.id, b.id]);
    assert_eq!(
        server.request_count("POST", &format!("/tasks/{}/checklist/reorder/", task.id)),
        0
    );
}

#[test]
fn failed_reorder_restores_snapshot() {
    let (server, mut app, task) = make_app_with_task();
    let a = server.insert_checklist_item(task.id, "a");
    let b = server.insert_checklist_item(task.id, "b");
    open_detail(&mut app);

    server.fail_next(
        "POST",
        &format!("/tasks/{}/checklist/reorder/", task.id),
        500,
    );
    app.handle_key(char_key('o'));
    app.handle_key(char_key('J'));
    app.handle_key(key(KeyCode::Enter));

    assert!(app.detail().unwrap().reorder.is_none());
    assert_eq!(checklist_ids(&app), vec![a.id, b.id]);
    assert_eq!(app.status_message(), Some("Injected failure"));
}

#[test]
fn add_dependency_updates_blockers() {
    let (server, mut app, task) = make_app_with_task();
    let user_id = task.owner;
    let other = server.insert_task(user_id, "Gather data", Status::Todo, Priority::Low);
    app.handle_key(char_key('r'));
    assert!(app.tasks().iter().any(|t| t.id == other.id));
    app.handle_key(char_key('G'));
    // Select "Write report" whichever row it is on.
    let row = app.tasks().iter().position(|t| t.id == task.id).unwrap();
    app.handle_key(char_key('g'));
    for _ in 0..row {
        app.handle_key(char_key('j'));
    }
    open_detail(&mut app);
    assert_eq!(app.detail().unwrap().task.id, task.id);

    app.handle_key(key(KeyCode::BackTab));
    assert_eq!(app.detail().unwrap().section, Section::Dependencies);
    app.handle_key(char_key('a'));
    type_text(&mut app, &format!("#{} needs numbers", other.id));
    app.handle_key(key(KeyCode::Enter));

    let view = app.detail().unwrap();
    assert_eq!(view.dependencies.len(), 1);
    assert_eq!(view.dependencies[0].notes, "needs numbers");
    assert_eq!(view.blockers.len(), 1);
    assert_eq!(view.blockers[0].id, other.id);

    // Deactivating the dependency clears the blocker list.
    app.handle_key(char_key(' '));
    let view = app.detail().unwrap();
    assert!(!view.dependencies[0].active);
    assert!(view.blockers.is_empty());
}

#[test]
fn self_dependency_error_keeps_composer_open() {
    let (_server, mut app, task) = make_app_with_task();
    open_detail(&mut app);

    app.handle_key(key(KeyCode::BackTab));
    app.handle_key(char_key('a'));
    type_text(&mut app, &task.id.to_string());
    app.handle_key(key(KeyCode::Enter));

    assert!(app.detail().unwrap().compose.is_some());
    assert_eq!(
        app.status_message(),
        Some("depends_on: A task cannot depend on itself.")
    );
}

#[test]
fn status_advances_from_detail() {
    let (server, mut app, task) = make_app_with_task();
    open_detail(&mut app);

    app.handle_key(char_key('m'));

    assert_eq!(app.detail().unwrap().task.status, Status::InProgress);
    assert_eq!(app.tasks()[0].status, Status::InProgress);
    assert_eq!(
        server.request_count("PATCH", &format!("/tasks/{}/", task.id)),
        1
    );
}

#[test]
fn assignee_advancing_status_keeps_owner() {
    let server = spawn_server();
    let alice = server.seed_user("alice", "secret");
    let bob = server.seed_user("bob", "secret");
    let task = server.insert_assigned_task(alice.id, bob.id, "Review budget");
    let client = client_for(&server, Some(session_for(&server, &bob)));
    let mut app = App::new(client).unwrap();
    open_detail(&mut app);

    app.handle_key(char_key('m'));

    let stored = server.task(task.id).unwrap();
    assert_eq!(stored.status, Status::InProgress);
    assert_eq!(stored.owner, alice.id);
    assert_eq!(stored.assigned_to, bob.id);
    assert_eq!(app.detail().unwrap().task.owner, alice.id);
}

#[test]
fn editing_title_leaves_due_date_untouched() {
    let (server, mut app, task) = make_app_with_task();

    app.handle_key(char_key('e'));
    type_text(&mut app, "!");
    app.handle_key(key(KeyCode::Enter));

    assert!(matches!(app.mode(), Mode::Normal));
    let stored = server.task(task.id).unwrap();
    assert_eq!(stored.title, "Write report!");
    assert_eq!(stored.due_date, task.due_date);
    assert_eq!(stored.owner, task.owner);
}
