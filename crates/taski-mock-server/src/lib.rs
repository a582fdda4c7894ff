//! A small in-memory stand-in for the Taski REST backend.
//!
//! Used as a local development server (`taski-mock-server`) and, through
//! [`spawn_test_server`], as the target of client and TUI integration tests.

pub mod auth;
pub mod error;
mod routes;
pub mod store;

use std::sync::{Arc, Mutex};

use anyhow::Result;
use axum::http::StatusCode;
use taski_core::task::{Priority, Status};
use taski_core::user::TokenPair;
use taski_core::{ChecklistItem, Task, User};
use tokio::net::TcpListener;

pub use routes::{AppState, CurrentUser, InnerAppState};
use store::{MockData, RecordedRequest};

pub async fn serve(listener: TcpListener, state: AppState) -> Result<()> {
    let app = routes::build_router(state);
    axum::serve(listener, app).await?;
    Ok(())
}

/// A running mock backend plus handles for seeding and inspecting it.
pub struct MockServer {
    /// Including the `/api` prefix, e.g. `http://127.0.0.1:41234/api`.
    pub base_url: String,
    state: AppState,
    _handle: tokio::task::JoinHandle<()>,
}

/// Spawn the mock backend on a random local port.
pub async fn spawn_test_server() -> MockServer {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(l) => l,
        Err(e) => panic!("bind test listener: {e}"),
    };
    let addr = match listener.local_addr() {
        Ok(a) => a,
        Err(e) => panic!("test listener address: {e}"),
    };
    let state = new_state();
    let app_state = state.clone();
    let handle = tokio::spawn(async move {
        if let Err(e) = serve(listener, app_state).await {
            tracing::error!("mock server stopped: {e}");
        }
    });
    MockServer {
        base_url: format!("http://{addr}/api"),
        state,
        _handle: handle,
    }
}

pub fn new_state() -> AppState {
    Arc::new(InnerAppState {
        data: Mutex::new(MockData::default()),
    })
}

impl MockServer {
    pub fn seed_user(&self, username: &str, password: &str) -> User {
        let email = format!("{username}@example.com");
        match self.state.data().create_user(username, &email, password) {
            Ok(user) => user,
            Err(e) => panic!("seed user {username}: {e:?}"),
        }
    }

    /// Issue a token pair for `user_id` without going through login.
    pub fn issue_tokens(&self, user_id: i64) -> TokenPair {
        self.state.data().issue_tokens(user_id)
    }

    pub fn insert_task(&self, owner: i64, title: &str, status: Status, priority: Priority) -> Task {
        self.state.data().seed_task(owner, title, status, priority)
    }

    /// Insert a task owned by `owner` and assigned to `assignee`.
    pub fn insert_assigned_task(&self, owner: i64, assignee: i64, title: &str) -> Task {
        let mut data = self.state.data();
        let task = data.seed_task(owner, title, Status::Todo, Priority::Medium);
        match data.reassign_task(task.id, assignee) {
            Some(task) => task,
            None => panic!("seeded task {} vanished", task.id),
        }
    }

    /// The task as stored, whoever can see it.
    pub fn task(&self, id: i64) -> Option<Task> {
        self.state.data().task_record(id)
    }

    pub fn insert_checklist_item(&self, task_id: i64, text: &str) -> ChecklistItem {
        self.state.data().seed_checklist_item(task_id, text)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.data().requests().to_vec()
    }

    /// Number of recorded requests with this method and path (query included).
    pub fn request_count(&self, method: &str, path: &str) -> usize {
        self.state
            .data()
            .requests()
            .iter()
            .filter(|r| r.method == method && r.path == path)
            .count()
    }

    /// Invalidate every issued access token; refresh tokens still work.
    pub fn expire_access_tokens(&self) {
        self.state.data().expire_access_tokens();
    }

    pub fn revoke_refresh_tokens(&self) {
        self.state.data().revoke_refresh_tokens();
    }

    /// Answer the next `method path` (query ignored) with `status`.
    pub fn fail_next(&self, method: &str, path: &str, status: u16) {
        let status = StatusCode::from_u16(status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        self.state.data().inject_failure(method, path, status);
    }
}
