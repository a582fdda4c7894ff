//! End-to-end tests of `ApiClient` against the in-memory mock backend.

use std::sync::Arc;

use chrono::{Duration, Utc};
use taski_client::token_store::{ACCESS_TOKEN_KEY, REFRESH_TOKEN_KEY, USER_KEY};
use taski_client::{
    ApiClient, BlockingApiClient, ClientError, FileTokenStore, MemoryTokenStore, TaskApi,
    TokenStore,
};
use taski_core::dependency::{CreateDependency, UpdateDependency};
use taski_core::task::{Priority, Status, TaskFilter, TaskInput};
use taski_core::Session;
use taski_mock_server::{spawn_test_server, MockServer};

/// A server with one user and a client already holding that user's tokens.
async fn logged_in() -> (MockServer, ApiClient, Arc<MemoryTokenStore>, i64) {
    let server = spawn_test_server().await;
    let user = server.seed_user("alice", "secret");
    let tokens = server.issue_tokens(user.id);
    let store = Arc::new(MemoryTokenStore::with_session(&Session {
        access_token: tokens.access,
        refresh_token: tokens.refresh,
        user: Some(user.clone()),
    }));
    let client = ApiClient::new(&server.base_url, store.clone()).unwrap();
    (server, client, store, user.id)
}

fn input(title: &str, assignee: i64) -> TaskInput {
    TaskInput {
        title: title.into(),
        description: String::new(),
        due_date: Utc::now() + Duration::days(3),
        status: Status::Todo,
        priority: Priority::Medium,
        assigned_to: assignee,
        owner: Some(assignee),
        tags: "home, errands".into(),
        duration: Some(1.5),
    }
}

// ---- Auth ----

#[tokio::test]
async fn login_persists_tokens_and_user() {
    let server = spawn_test_server().await;
    server.seed_user("bob", "hunter2");
    let store = Arc::new(MemoryTokenStore::new());
    let client = ApiClient::new(&server.base_url, store.clone()).unwrap();

    let session = client.login("bob", "hunter2").await.unwrap();
    assert!(!session.access_token.is_empty());
    assert_eq!(session.user.as_ref().map(|u| u.username.as_str()), Some("bob"));

    assert_eq!(store.get(ACCESS_TOKEN_KEY), Some(session.access_token.clone()));
    assert_eq!(store.get(REFRESH_TOKEN_KEY), Some(session.refresh_token.clone()));
    assert!(store.get(USER_KEY).unwrap().contains("bob"));

    let login = server
        .requests()
        .into_iter()
        .find(|r| r.path == "/auth/login/")
        .unwrap();
    assert!(login.authorization.is_none());
}

#[tokio::test]
async fn login_with_bad_credentials_surfaces_detail() {
    let server = spawn_test_server().await;
    server.seed_user("bob", "hunter2");
    let store = Arc::new(MemoryTokenStore::new());
    let client = ApiClient::new(&server.base_url, store.clone()).unwrap();

    let err = client.login("bob", "wrong").await.unwrap_err();
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 401);
            assert_eq!(message, "No active account found with the given credentials");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(store.load().unwrap().is_none());
    assert_eq!(server.request_count("POST", "/auth/refresh/"), 0);
}

#[tokio::test]
async fn register_stores_session_with_user() {
    let server = spawn_test_server().await;
    let store = Arc::new(MemoryTokenStore::new());
    let client = ApiClient::new(&server.base_url, store.clone()).unwrap();

    let session = client
        .register("carol", "carol@example.com", "pw")
        .await
        .unwrap();
    assert_eq!(session.user.unwrap().username, "carol");
    assert!(store.load().unwrap().is_some());
}

#[tokio::test]
async fn register_duplicate_uses_error_field() {
    let server = spawn_test_server().await;
    server.seed_user("carol", "pw");
    let client = ApiClient::new(&server.base_url, Arc::new(MemoryTokenStore::new())).unwrap();

    let err = client
        .register("carol", "new@example.com", "pw")
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "Username already exists");
}

#[tokio::test]
async fn logout_clears_store() {
    let (_server, client, store, _) = logged_in().await;
    client.logout().unwrap();
    assert!(store.load().unwrap().is_none());
    assert!(client.session().is_none());
}

// ---- Refresh and retry ----

#[tokio::test]
async fn expired_access_token_refreshes_once_and_retries() {
    let (server, client, store, uid) = logged_in().await;
    server.insert_task(uid, "Water plants", Status::Todo, Priority::Low);
    let before = store.get(ACCESS_TOKEN_KEY).unwrap();
    server.expire_access_tokens();

    let tasks = client.list_tasks(&TaskFilter::default()).await.unwrap();
    assert_eq!(tasks.len(), 1);

    assert_eq!(server.request_count("GET", "/tasks/"), 2);
    assert_eq!(server.request_count("POST", "/auth/refresh/"), 1);

    let after = store.get(ACCESS_TOKEN_KEY).unwrap();
    assert_ne!(before, after);
    let retried = server.requests().into_iter().rev().find(|r| r.path == "/tasks/").unwrap();
    assert_eq!(retried.authorization, Some(format!("Bearer {after}")));
}

#[tokio::test]
async fn second_401_is_returned_without_another_refresh() {
    let (server, client, _store, _) = logged_in().await;
    server.fail_next("GET", "/tasks/", 401);
    server.fail_next("GET", "/tasks/", 401);

    let err = client.list_tasks(&TaskFilter::default()).await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 401, .. }));
    assert_eq!(server.request_count("POST", "/auth/refresh/"), 1);
    assert_eq!(server.request_count("GET", "/tasks/"), 2);
}

#[tokio::test]
async fn failed_refresh_clears_session_and_stops() {
    let (server, client, store, _) = logged_in().await;
    server.expire_access_tokens();
    server.revoke_refresh_tokens();

    let err = client.list_tasks(&TaskFilter::default()).await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(err.user_message(), "Authentication failed. Please log in again.");
    assert!(store.load().unwrap().is_none());
    assert_eq!(store.get(ACCESS_TOKEN_KEY), None);
    assert_eq!(store.get(USER_KEY), None);

    // One attempt, one refresh, no retry.
    let paths: Vec<String> = server.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec!["/tasks/".to_string(), "/auth/refresh/".to_string()]);
}

#[tokio::test]
async fn unauthenticated_client_gets_auth_error_without_refresh_call() {
    let server = spawn_test_server().await;
    let client = ApiClient::new(&server.base_url, Arc::new(MemoryTokenStore::new())).unwrap();

    let err = client.get_task(1).await.unwrap_err();
    assert!(err.is_auth());
    assert_eq!(server.request_count("POST", "/auth/refresh/"), 0);
}

#[tokio::test]
async fn session_survives_restart_with_file_store() {
    let dir = tempfile::tempdir().unwrap();
    let server = spawn_test_server().await;
    server.seed_user("dave", "pw");

    let store = Arc::new(FileTokenStore::new(dir.path()));
    let client = ApiClient::new(&server.base_url, store).unwrap();
    client.login("dave", "pw").await.unwrap();
    drop(client);

    let reopened = ApiClient::new(&server.base_url, Arc::new(FileTokenStore::new(dir.path()))).unwrap();
    assert!(reopened.session().is_some());
    let user = reopened.current_user().await.unwrap();
    assert_eq!(user.username, "dave");
}

// ---- Tasks ----

#[tokio::test]
async fn status_filter_is_sent_as_query() {
    let (server, client, _store, uid) = logged_in().await;
    server.insert_task(uid, "open", Status::Todo, Priority::Low);
    server.insert_task(uid, "closed", Status::Done, Priority::Low);

    let filter = TaskFilter {
        status: Some(Status::Done),
        ..Default::default()
    };
    let tasks = client.list_tasks(&filter).await.unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "closed");
    assert_eq!(server.request_count("GET", "/tasks/?status=DONE"), 1);
}

#[tokio::test]
async fn search_and_tag_filters() {
    let (_server, client, _store, uid) = logged_in().await;
    client.create_task(&input("Buy milk", uid)).await.unwrap();
    let mut other = input("Write report", uid);
    other.tags = "work".into();
    client.create_task(&other).await.unwrap();

    let by_search = client
        .list_tasks(&TaskFilter {
            search: Some("MILK".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_search.len(), 1);

    let by_tag = client
        .list_tasks(&TaskFilter {
            tag: Some("work".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(by_tag.len(), 1);
    assert_eq!(by_tag[0].title, "Write report");
}

#[tokio::test]
async fn task_crud_round_trip() {
    let (server, client, _store, uid) = logged_in().await;

    let created = client.create_task(&input("Plan trip", uid)).await.unwrap();
    assert_eq!(created.owner, uid);
    assert_eq!(created.tag_list(), vec!["home", "errands"]);
    assert_eq!(created.duration, Some(1.5));

    let mut change = input("Plan trip to Lisbon", uid);
    change.status = Status::InProgress;
    let updated = client.update_task(created.id, &change).await.unwrap();
    assert_eq!(updated.title, "Plan trip to Lisbon");
    assert_eq!(updated.status, Status::InProgress);
    assert_eq!(
        server.request_count("PATCH", &format!("/tasks/{}/", created.id)),
        1
    );

    client.delete_task(created.id).await.unwrap();
    let err = client.get_task(created.id).await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));
}

#[tokio::test]
async fn blank_title_from_server_is_reported_per_field() {
    let (_server, client, _store, uid) = logged_in().await;
    let err = client.create_task(&input("   ", uid)).await.unwrap_err();
    assert_eq!(err.user_message(), "title: This field may not be blank.");
}

#[tokio::test]
async fn server_error_detail_is_surfaced() {
    let (server, client, _store, _) = logged_in().await;
    server.fail_next("GET", "/tasks/", 500);
    let err = client.list_tasks(&TaskFilter::default()).await.unwrap_err();
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 500);
            assert_eq!(message, "Injected failure");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

// ---- Comments ----

#[tokio::test]
async fn comments_create_edit_delete() {
    let (server, client, _store, uid) = logged_in().await;
    let task = server.insert_task(uid, "t", Status::Todo, Priority::Low);

    let first = client.create_comment(task.id, "first").await.unwrap();
    let second = client.create_comment(task.id, "second").await.unwrap();
    assert_eq!(first.author, uid);

    let edited = client
        .update_comment(task.id, first.id, "first, edited")
        .await
        .unwrap();
    assert_eq!(edited.content, "first, edited");
    assert_eq!(
        server.request_count("PUT", &format!("/tasks/{}/comments/{}/", task.id, first.id)),
        1
    );

    let listed = client.list_comments(task.id).await.unwrap();
    let ids: Vec<i64> = listed.iter().map(|c| c.id).collect();
    assert_eq!(ids, vec![first.id, second.id]);

    client.delete_comment(task.id, second.id).await.unwrap();
    assert_eq!(client.list_comments(task.id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn editing_someone_elses_comment_is_forbidden() {
    let (server, client, _store, uid) = logged_in().await;
    let task = server.insert_task(uid, "shared", Status::Todo, Priority::Low);
    let comment = client.create_comment(task.id, "mine").await.unwrap();

    let intruder = server.seed_user("mallory", "pw");
    let tokens = server.issue_tokens(intruder.id);
    let other = ApiClient::new(
        &server.base_url,
        Arc::new(MemoryTokenStore::with_session(&Session {
            access_token: tokens.access,
            refresh_token: tokens.refresh,
            user: Some(intruder),
        })),
    )
    .unwrap();

    // Not visible to mallory at all.
    let err = other
        .update_comment(task.id, comment.id, "hijack")
        .await
        .unwrap_err();
    assert!(matches!(err, ClientError::NotFound(_)));
}

// ---- Checklist ----

#[tokio::test]
async fn checklist_lifecycle() {
    let (server, client, _store, uid) = logged_in().await;
    let task = server.insert_task(uid, "t", Status::Todo, Priority::Low);

    let a = client.create_checklist_item(task.id, "a").await.unwrap();
    let b = client.create_checklist_item(task.id, "b").await.unwrap();
    let c = client.create_checklist_item(task.id, "c").await.unwrap();
    assert_eq!((a.position, b.position, c.position), (0, 1, 2));

    let done = client.complete_checklist_item(task.id, b.id).await.unwrap();
    assert!(done.is_completed);
    let fetched = client.get_task(task.id).await.unwrap();
    let pct = fetched.checklist_completion.unwrap();
    assert!((pct - 100.0 / 3.0).abs() < 0.01);

    let undone = client.incomplete_checklist_item(task.id, b.id).await.unwrap();
    assert!(!undone.is_completed);

    let renamed = client
        .update_checklist_item(task.id, a.id, "a2")
        .await
        .unwrap();
    assert_eq!(renamed.text, "a2");

    let reordered = client
        .reorder_checklist(task.id, &[c.id, a.id, b.id])
        .await
        .unwrap();
    let order: Vec<i64> = reordered.iter().map(|i| i.id).collect();
    assert_eq!(order, vec![c.id, a.id, b.id]);
    assert_eq!(
        server.request_count("POST", &format!("/tasks/{}/checklist/reorder/", task.id)),
        1
    );

    client.delete_checklist_item(task.id, a.id).await.unwrap();
    let remaining = client.list_checklist(task.id).await.unwrap();
    assert_eq!(remaining.len(), 2);
}

#[tokio::test]
async fn partial_reorder_is_rejected() {
    let (server, client, _store, uid) = logged_in().await;
    let task = server.insert_task(uid, "t", Status::Todo, Priority::Low);
    let a = server.insert_checklist_item(task.id, "a");
    server.insert_checklist_item(task.id, "b");

    let err = client.reorder_checklist(task.id, &[a.id]).await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 400, .. }));
    assert!(err.user_message().starts_with("order: "));
}

// ---- Dependencies ----

#[tokio::test]
async fn dependencies_and_blockers() {
    let (server, client, _store, uid) = logged_in().await;
    let build = server.insert_task(uid, "build", Status::Todo, Priority::High);
    let design = server.insert_task(uid, "design", Status::InProgress, Priority::High);

    let dep = client
        .create_dependency(
            build.id,
            &CreateDependency {
                depends_on: design.id,
                notes: "needs mockups".into(),
                active: true,
            },
        )
        .await
        .unwrap();
    assert!(dep.is_blocking());
    assert_eq!(dep.target_label(), format!("#{} design", design.id));

    let blockers = client.list_blockers(build.id).await.unwrap();
    assert_eq!(blockers.len(), 1);
    assert_eq!(blockers[0].id, design.id);
    let blocked = client.list_blocked(design.id).await.unwrap();
    assert_eq!(blocked[0].id, build.id);

    let toggled = client.toggle_dependency(build.id, dep.id).await.unwrap();
    assert!(!toggled.active);
    assert!(client.list_blockers(build.id).await.unwrap().is_empty());

    let updated = client
        .update_dependency(
            build.id,
            dep.id,
            &UpdateDependency {
                notes: Some("mockups approved".into()),
                active: Some(true),
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.notes, "mockups approved");
    assert!(updated.active);

    client.delete_dependency(build.id, dep.id).await.unwrap();
    assert!(client.list_dependencies(build.id).await.unwrap().is_empty());
}

#[tokio::test]
async fn self_dependency_is_rejected() {
    let (server, client, _store, uid) = logged_in().await;
    let task = server.insert_task(uid, "t", Status::Todo, Priority::Low);
    let err = client
        .create_dependency(
            task.id,
            &CreateDependency {
                depends_on: task.id,
                notes: String::new(),
                active: true,
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.user_message(), "depends_on: A task cannot depend on itself.");
}

// ---- Blocking wrapper ----

#[test]
fn blocking_client_lists_tasks() {
    // The blocking client owns a runtime, so the server needs its own thread.
    let (tx, rx) = std::sync::mpsc::sync_channel(1);
    std::thread::spawn(move || {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let server = spawn_test_server().await;
            let user = server.seed_user("erin", "pw");
            server.insert_task(user.id, "from thread", Status::Todo, Priority::Medium);
            tx.send(server.base_url.clone()).unwrap();
            let _keep = server;
            std::future::pending::<()>().await;
        });
    });
    let url = rx.recv().unwrap();

    let client = BlockingApiClient::new(&url, Arc::new(MemoryTokenStore::new())).unwrap();
    assert!(!client.is_authenticated());
    client.login("erin", "pw").unwrap();
    assert_eq!(client.cached_user().unwrap().username, "erin");
    let tasks = client.list_tasks(&TaskFilter::default()).unwrap();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].title, "from thread");
}
