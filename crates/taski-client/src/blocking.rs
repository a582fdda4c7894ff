use std::sync::Arc;

use taski_core::checklist::ChecklistItem;
use taski_core::comment::Comment;
use taski_core::dependency::{CreateDependency, Dependency, UpdateDependency};
use taski_core::task::{Task, TaskFilter, TaskInput};
use taski_core::{Session, User};
use tokio::runtime::Runtime;

use crate::token_store::TokenStore;
use crate::{ApiClient, ClientError, TaskApi};

/// Blocking wrapper around the async `ApiClient`.
///
/// Creates an internal tokio runtime and uses `block_on()` for each call.
/// Designed for sync callers like the TUI.
pub struct BlockingApiClient {
    inner: ApiClient,
    rt: Runtime,
}

impl BlockingApiClient {
    pub fn new(base_url: &str, store: Arc<dyn TokenStore>) -> Result<Self, ClientError> {
        let rt = Runtime::new()
            .map_err(|e| ClientError::Internal(format!("failed to create tokio runtime: {e}")))?;
        Ok(Self {
            inner: ApiClient::new(base_url, store)?,
            rt,
        })
    }

    pub fn session(&self) -> Option<Session> {
        self.inner.session()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.http().is_authenticated()
    }

    /// The user stored with the session, without a network call.
    pub fn cached_user(&self) -> Option<User> {
        self.inner.http().current_user()
    }

    pub fn base_url(&self) -> &str {
        self.inner.http().base_url()
    }

    // -- Trait method delegates --

    pub fn login(&self, username: &str, password: &str) -> Result<Session, ClientError> {
        self.rt.block_on(self.inner.login(username, password))
    }

    pub fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, ClientError> {
        self.rt
            .block_on(self.inner.register(username, email, password))
    }

    pub fn current_user(&self) -> Result<User, ClientError> {
        self.rt.block_on(self.inner.current_user())
    }

    pub fn logout(&self) -> Result<(), ClientError> {
        self.inner.logout()
    }

    pub fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>, ClientError> {
        self.rt.block_on(self.inner.list_tasks(filter))
    }

    pub fn get_task(&self, id: i64) -> Result<Task, ClientError> {
        self.rt.block_on(self.inner.get_task(id))
    }

    pub fn create_task(&self, input: &TaskInput) -> Result<Task, ClientError> {
        self.rt.block_on(self.inner.create_task(input))
    }

    pub fn update_task(&self, id: i64, input: &TaskInput) -> Result<Task, ClientError> {
        self.rt.block_on(self.inner.update_task(id, input))
    }

    pub fn delete_task(&self, id: i64) -> Result<(), ClientError> {
        self.rt.block_on(self.inner.delete_task(id))
    }

    pub fn list_comments(&self, task_id: i64) -> Result<Vec<Comment>, ClientError> {
        self.rt.block_on(self.inner.list_comments(task_id))
    }

    pub fn create_comment(&self, task_id: i64, content: &str) -> Result<Comment, ClientError> {
        self.rt
            .block_on(self.inner.create_comment(task_id, content))
    }

    pub fn update_comment(
        &self,
        task_id: i64,
        id: i64,
        content: &str,
    ) -> Result<Comment, ClientError> {
        self.rt
            .block_on(self.inner.update_comment(task_id, id, content))
    }

    pub fn delete_comment(&self, task_id: i64, id: i64) -> Result<(), ClientError> {
        self.rt.block_on(self.inner.delete_comment(task_id, id))
    }

    pub fn list_checklist(&self, task_id: i64) -> Result<Vec<ChecklistItem>, ClientError> {
        self.rt.block_on(self.inner.list_checklist(task_id))
    }

    pub fn create_checklist_item(
        &self,
        task_id: i64,
        text: &str,
    ) -> Result<ChecklistItem, ClientError> {
        self.rt
            .block_on(self.inner.create_checklist_item(task_id, text))
    }

    pub fn update_checklist_item(
        &self,
        task_id: i64,
        id: i64,
        text: &str,
    ) -> Result<ChecklistItem, ClientError> {
        self.rt
            .block_on(self.inner.update_checklist_item(task_id, id, text))
    }

    pub fn delete_checklist_item(&self, task_id: i64, id: i64) -> Result<(), ClientError> {
        self.rt
            .block_on(self.inner.delete_checklist_item(task_id, id))
    }

    pub fn complete_checklist_item(
        &self,
        task_id: i64,
        id: i64,
    ) -> Result<ChecklistItem, ClientError> {
        self.rt
            .block_on(self.inner.complete_checklist_item(task_id, id))
    }

    pub fn incomplete_checklist_item(
        &self,
        task_id: i64,
        id: i64,
    ) -> Result<ChecklistItem, ClientError> {
        self.rt
            .block_on(self.inner.incomplete_checklist_item(task_id, id))
    }

    pub fn reorder_checklist(
        &self,
        task_id: i64,
        order: &[i64],
    ) -> Result<Vec<ChecklistItem>, ClientError> {
        self.rt
            .block_on(self.inner.reorder_checklist(task_id, order))
    }

    pub fn list_dependencies(&self, task_id: i64) -> Result<Vec<Dependency>, ClientError> {
        self.rt.block_on(self.inner.list_dependencies(task_id))
    }

    pub fn create_dependency(
        &self,
        task_id: i64,
        input: &CreateDependency,
    ) -> Result<Dependency, ClientError> {
        self.rt
            .block_on(self.inner.create_dependency(task_id, input))
    }

    pub fn update_dependency(
        &self,
        task_id: i64,
        id: i64,
        update: &UpdateDependency,
    ) -> Result<Dependency, ClientError> {
        self.rt
            .block_on(self.inner.update_dependency(task_id, id, update))
    }

    pub fn delete_dependency(&self, task_id: i64, id: i64) -> Result<(), ClientError> {
        self.rt
            .block_on(self.inner.delete_dependency(task_id, id))
    }

    pub fn toggle_dependency(&self, task_id: i64, id: i64) -> Result<Dependency, ClientError> {
        self.rt
            .block_on(self.inner.toggle_dependency(task_id, id))
    }

    pub fn list_blockers(&self, task_id: i64) -> Result<Vec<Task>, ClientError> {
        self.rt.block_on(self.inner.list_blockers(task_id))
    }

    pub fn list_blocked(&self, task_id: i64) -> Result<Vec<Task>, ClientError> {
        self.rt.block_on(self.inner.list_blocked(task_id))
    }
}
