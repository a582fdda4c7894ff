//! In-memory backing data for the mock backend.
//!
//! Mirrors the observable behavior of the real API closely enough for client
//! tests: per-user task visibility, DRF-style validation errors, token
//! issuance and refresh, checklist ordering and dependency edges.

use std::collections::HashMap;

use axum::http::StatusCode;
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use taski_core::checklist::{self, ChecklistItem};
use taski_core::comment::{self, Comment};
use taski_core::dependency::{Dependency, TaskRef};
use taski_core::task::{Priority, Status, Task};
use taski_core::user::TokenPair;
use taski_core::User;

use crate::error::ApiError;

/// One request as seen by the server, path relative to `/api`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
}

#[derive(Debug, Clone)]
struct InjectedFailure {
    method: String,
    path: String,
    status: StatusCode,
}

struct UserRecord {
    user: User,
    password: String,
}

#[derive(Default)]
pub struct MockData {
    users: Vec<UserRecord>,
    access_tokens: HashMap<String, i64>,
    refresh_tokens: HashMap<String, i64>,
    tasks: Vec<Task>,
    comments: Vec<Comment>,
    checklist: Vec<ChecklistItem>,
    dependencies: Vec<Dependency>,
    requests: Vec<RecordedRequest>,
    failures: Vec<InjectedFailure>,
    seq: i64,
    clock: Option<DateTime<Utc>>,
}

/// Body accepted on task create/update. Every field optional so PATCH works.
#[derive(Debug, Default, Deserialize)]
pub struct TaskBody {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub assigned_to: Option<i64>,
    /// Writable on update; create always uses the caller.
    pub owner: Option<i64>,
    pub tags: Option<String>,
    pub duration: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    pub status: Option<String>,
    pub priority: Option<String>,
    pub search: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DependencyBody {
    pub depends_on: Option<i64>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl MockData {
    fn next_id(&mut self) -> i64 {
        self.seq += 1;
        self.seq
    }

    /// Strictly increasing timestamps so ordering by time is deterministic.
    fn tick(&mut self) -> DateTime<Utc> {
        let now = Utc::now();
        let t = match self.clock {
            Some(last) if now <= last => last + Duration::milliseconds(1),
            _ => now,
        };
        self.clock = Some(t);
        t
    }

    // -- Request log and failure injection --

    pub fn record(&mut self, req: RecordedRequest) {
        self.requests.push(req);
    }

    pub fn requests(&self) -> &[RecordedRequest] {
        &self.requests
    }

    pub fn inject_failure(&mut self, method: &str, path: &str, status: StatusCode) {
        self.failures.push(InjectedFailure {
            method: method.to_string(),
            path: path.to_string(),
            status,
        });
    }

    /// Consume a matching injected failure, if any.
    pub fn take_failure(&mut self, method: &str, path: &str) -> Option<StatusCode> {
        let idx = self
            .failures
            .iter()
            .position(|f| f.method == method && f.path == path)?;
        Some(self.failures.remove(idx).status)
    }

    // -- Users and tokens --

    pub fn create_user(
        &mut self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<User, ApiError> {
        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(ApiError::Plain("Please provide all required fields".into()));
        }
        if self.users.iter().any(|u| u.user.username == username) {
            return Err(ApiError::Plain("Username already exists".into()));
        }
        if self
            .users
            .iter()
            .any(|u| u.user.email.as_deref() == Some(email))
        {
            return Err(ApiError::Plain("Email already exists".into()));
        }
        let user = User {
            id: self.next_id(),
            username: username.to_string(),
            email: Some(email.to_string()),
        };
        self.users.push(UserRecord {
            user: user.clone(),
            password: password.to_string(),
        });
        Ok(user)
    }

    pub fn authenticate(&self, username: &str, password: &str) -> Option<i64> {
        self.users
            .iter()
            .find(|u| u.user.username == username && u.password == password)
            .map(|u| u.user.id)
    }

    pub fn user(&self, id: i64) -> Option<User> {
        self.users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.clone())
    }

    pub fn issue_tokens(&mut self, user_id: i64) -> TokenPair {
        let n = self.next_id();
        let pair = TokenPair {
            access: format!("access-{user_id}-{n}"),
            refresh: format!("refresh-{user_id}-{n}"),
        };
        self.access_tokens.insert(pair.access.clone(), user_id);
        self.refresh_tokens.insert(pair.refresh.clone(), user_id);
        pair
    }

    pub fn refresh(&mut self, refresh: &str) -> Option<String> {
        let user_id = *self.refresh_tokens.get(refresh)?;
        let n = self.next_id();
        let access = format!("access-{user_id}-{n}");
        self.access_tokens.insert(access.clone(), user_id);
        Some(access)
    }

    pub fn user_for_access_token(&self, token: &str) -> Option<i64> {
        self.access_tokens.get(token).copied()
    }

    pub fn expire_access_tokens(&mut self) {
        self.access_tokens.clear();
    }

    pub fn revoke_refresh_tokens(&mut self) {
        self.refresh_tokens.clear();
    }

    // -- Tasks --

    fn visible(task: &Task, user_id: i64) -> bool {
        task.owner == user_id || task.assigned_to == user_id
    }

    fn task_index(&self, id: i64, user_id: i64) -> Result<usize, ApiError> {
        self.tasks
            .iter()
            .position(|t| t.id == id && Self::visible(t, user_id))
            .ok_or_else(ApiError::not_found)
    }

    /// Fill in the derived fields the real serializer adds.
    fn present(&self, task: &Task) -> Task {
        let mut out = task.clone();
        out.owner_details = self.user(task.owner);
        out.assigned_to_details = self.user(task.assigned_to);
        let items: Vec<ChecklistItem> = self
            .checklist
            .iter()
            .filter(|i| i.task == task.id)
            .cloned()
            .collect();
        out.checklist_completion = checklist::completion(&items);
        out
    }

    pub fn list_tasks(&self, user_id: i64, q: &TaskQuery) -> Result<Vec<Task>, ApiError> {
        let status = match q.status.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => Some(Status::parse_str(raw).ok_or_else(|| invalid_filter("status", raw))?),
            None => None,
        };
        let priority = match q.priority.as_deref().filter(|s| !s.is_empty()) {
            Some(raw) => {
                Some(Priority::parse_str(raw).ok_or_else(|| invalid_filter("priority", raw))?)
            }
            None => None,
        };
        let search = q.search.as_deref().map(str::to_lowercase);
        let tag = q.tag.as_deref().map(str::to_lowercase);

        let mut tasks: Vec<Task> = self
            .tasks
            .iter()
            .filter(|t| Self::visible(t, user_id))
            .filter(|t| status.map_or(true, |s| t.status == s))
            .filter(|t| priority.map_or(true, |p| t.priority == p))
            .filter(|t| {
                search.as_deref().map_or(true, |s| {
                    t.title.to_lowercase().contains(s) || t.description.to_lowercase().contains(s)
                })
            })
            .filter(|t| {
                tag.as_deref().map_or(true, |needle| {
                    t.tags
                        .as_deref()
                        .unwrap_or_default()
                        .to_lowercase()
                        .contains(needle)
                })
            })
            .map(|t| self.present(t))
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(tasks)
    }

    pub fn get_task(&self, user_id: i64, id: i64) -> Result<Task, ApiError> {
        let idx = self.task_index(id, user_id)?;
        Ok(self.present(&self.tasks[idx]))
    }

    pub fn create_task(&mut self, user_id: i64, body: TaskBody) -> Result<Task, ApiError> {
        let title = body.title.clone().unwrap_or_default();
        if title.trim().is_empty() {
            return Err(ApiError::Field("title", "This field may not be blank.".into()));
        }
        let due_date = match body.due_date.as_deref() {
            Some(raw) => parse_datetime(raw)?,
            None => return Err(ApiError::required("due_date")),
        };
        let assigned_to = body.assigned_to.ok_or_else(|| ApiError::required("assigned_to"))?;
        let now = self.tick();
        let mut task = Task {
            id: self.next_id(),
            title,
            description: String::new(),
            created_at: now,
            due_date,
            status: Status::Todo,
            priority: Priority::Medium,
            owner: user_id,
            assigned_to,
            owner_details: None,
            assigned_to_details: None,
            tags: None,
            duration: None,
            checklist_completion: None,
        };
        self.apply_task_body(&mut task, body)?;
        task.owner = user_id;
        self.tasks.push(task.clone());
        Ok(self.present(&task))
    }

    pub fn update_task(&mut self, user_id: i64, id: i64, body: TaskBody) -> Result<Task, ApiError> {
        let idx = self.task_index(id, user_id)?;
        let mut task = self.tasks[idx].clone();
        if let Some(title) = body.title.as_deref() {
            if title.trim().is_empty() {
                return Err(ApiError::Field("title", "This field may not be blank.".into()));
            }
        }
        self.apply_task_body(&mut task, body)?;
        self.tasks[idx] = task.clone();
        Ok(self.present(&task))
    }

    fn apply_task_body(&self, task: &mut Task, body: TaskBody) -> Result<(), ApiError> {
        if let Some(title) = body.title {
            task.title = title;
        }
        if let Some(description) = body.description {
            task.description = description;
        }
        if let Some(raw) = body.due_date.as_deref() {
            task.due_date = parse_datetime(raw)?;
        }
        if let Some(raw) = body.status.as_deref() {
            task.status = Status::parse_str(raw).ok_or_else(|| invalid_choice("status", raw))?;
        }
        if let Some(raw) = body.priority.as_deref() {
            task.priority =
                Priority::parse_str(raw).ok_or_else(|| invalid_choice("priority", raw))?;
        }
        if let Some(assignee) = body.assigned_to {
            if self.user(assignee).is_none() {
                return Err(ApiError::Field(
                    "assigned_to",
                    format!("Invalid pk \"{assignee}\" - object does not exist."),
                ));
            }
            task.assigned_to = assignee;
        }
        if let Some(owner) = body.owner {
            if self.user(owner).is_none() {
                return Err(ApiError::Field(
                    "owner",
                    format!("Invalid pk \"{owner}\" - object does not exist."),
                ));
            }
            task.owner = owner;
        }
        if let Some(tags) = body.tags {
            task.tags = Some(tags);
        }
        if let Some(duration) = body.duration {
            task.duration = Some(duration);
        }
        Ok(())
    }

    pub fn delete_task(&mut self, user_id: i64, id: i64) -> Result<(), ApiError> {
        let idx = self.task_index(id, user_id)?;
        self.tasks.remove(idx);
        self.comments.retain(|c| c.task != id);
        self.checklist.retain(|i| i.task != id);
        self.dependencies
            .retain(|d| d.task != id && d.depends_on != id);
        Ok(())
    }

    /// Raw stored task, ignoring visibility. For test assertions.
    pub fn task_record(&self, id: i64) -> Option<Task> {
        self.tasks.iter().find(|t| t.id == id).cloned()
    }

    /// Change a task's assignee directly. For test setup.
    pub fn reassign_task(&mut self, id: i64, assignee: i64) -> Option<Task> {
        let task = self.tasks.iter_mut().find(|t| t.id == id)?;
        task.assigned_to = assignee;
        Some(task.clone())
    }

    /// Insert a task directly, bypassing HTTP. For test setup.
    pub fn seed_task(&mut self, owner: i64, title: &str, status: Status, priority: Priority) -> Task {
        let now = self.tick();
        let task = Task {
            id: self.next_id(),
            title: title.to_string(),
            description: String::new(),
            created_at: now,
            due_date: now + Duration::days(7),
            status,
            priority,
            owner,
            assigned_to: owner,
            owner_details: None,
            assigned_to_details: None,
            tags: None,
            duration: None,
            checklist_completion: None,
        };
        self.tasks.push(task.clone());
        self.present(&task)
    }

    // -- Comments --

    fn present_comment(&self, c: &Comment) -> Comment {
        let mut out = c.clone();
        out.author_details = self.user(c.author);
        out
    }

    pub fn list_comments(&self, user_id: i64, task_id: i64) -> Result<Vec<Comment>, ApiError> {
        self.task_index(task_id, user_id)?;
        let mut out: Vec<Comment> = self
            .comments
            .iter()
            .filter(|c| c.task == task_id)
            .map(|c| self.present_comment(c))
            .collect();
        comment::sort_for_display(&mut out);
        Ok(out)
    }

    pub fn create_comment(
        &mut self,
        user_id: i64,
        task_id: i64,
        content: Option<String>,
    ) -> Result<Comment, ApiError> {
        self.task_index(task_id, user_id)?;
        let content = content.unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ApiError::Field("content", "This field may not be blank.".into()));
        }
        let now = self.tick();
        let c = Comment {
            id: self.next_id(),
            task: task_id,
            author: user_id,
            author_details: None,
            content,
            created_at: now,
            updated_at: Some(now),
        };
        self.comments.push(c.clone());
        Ok(self.present_comment(&c))
    }

    pub fn update_comment(
        &mut self,
        user_id: i64,
        task_id: i64,
        id: i64,
        content: Option<String>,
    ) -> Result<Comment, ApiError> {
        self.task_index(task_id, user_id)?;
        let content = content.unwrap_or_default();
        if content.trim().is_empty() {
            return Err(ApiError::Field("content", "This field may not be blank.".into()));
        }
        let now = self.tick();
        let c = self
            .comments
            .iter_mut()
            .find(|c| c.id == id && c.task == task_id)
            .ok_or_else(ApiError::not_found)?;
        if c.author != user_id {
            return Err(ApiError::forbidden());
        }
        c.content = content;
        c.updated_at = Some(now);
        let c = c.clone();
        Ok(self.present_comment(&c))
    }

    pub fn delete_comment(&mut self, user_id: i64, task_id: i64, id: i64) -> Result<(), ApiError> {
        self.task_index(task_id, user_id)?;
        let idx = self
            .comments
            .iter()
            .position(|c| c.id == id && c.task == task_id)
            .ok_or_else(ApiError::not_found)?;
        if self.comments[idx].author != user_id {
            return Err(ApiError::forbidden());
        }
        self.comments.remove(idx);
        Ok(())
    }

    // -- Checklist --

    fn items_for(&self, task_id: i64) -> Vec<ChecklistItem> {
        let mut items: Vec<ChecklistItem> = self
            .checklist
            .iter()
            .filter(|i| i.task == task_id)
            .cloned()
            .collect();
        checklist::sort_by_position(&mut items);
        items
    }

    pub fn list_checklist(&self, user_id: i64, task_id: i64) -> Result<Vec<ChecklistItem>, ApiError> {
        self.task_index(task_id, user_id)?;
        Ok(self.items_for(task_id))
    }

    pub fn create_checklist_item(
        &mut self,
        user_id: i64,
        task_id: i64,
        text: Option<String>,
    ) -> Result<ChecklistItem, ApiError> {
        self.task_index(task_id, user_id)?;
        let text = text.unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ApiError::Field("text", "This field may not be blank.".into()));
        }
        let position = self
            .items_for(task_id)
            .last()
            .map_or(0, |i| i.position + 1);
        let now = self.tick();
        let item = ChecklistItem {
            id: self.next_id(),
            task: task_id,
            text,
            is_completed: false,
            position,
            created_at: Some(now),
        };
        self.checklist.push(item.clone());
        Ok(item)
    }

    fn item_mut(
        &mut self,
        user_id: i64,
        task_id: i64,
        id: i64,
    ) -> Result<&mut ChecklistItem, ApiError> {
        self.task_index(task_id, user_id)?;
        self.checklist
            .iter_mut()
            .find(|i| i.id == id && i.task == task_id)
            .ok_or_else(ApiError::not_found)
    }

    pub fn update_checklist_item(
        &mut self,
        user_id: i64,
        task_id: i64,
        id: i64,
        text: Option<String>,
    ) -> Result<ChecklistItem, ApiError> {
        let item = self.item_mut(user_id, task_id, id)?;
        if let Some(text) = text {
            if text.trim().is_empty() {
                return Err(ApiError::Field("text", "This field may not be blank.".into()));
            }
            item.text = text;
        }
        Ok(item.clone())
    }

    pub fn set_checklist_completed(
        &mut self,
        user_id: i64,
        task_id: i64,
        id: i64,
        done: bool,
    ) -> Result<ChecklistItem, ApiError> {
        let item = self.item_mut(user_id, task_id, id)?;
        item.is_completed = done;
        Ok(item.clone())
    }

    pub fn delete_checklist_item(
        &mut self,
        user_id: i64,
        task_id: i64,
        id: i64,
    ) -> Result<(), ApiError> {
        self.item_mut(user_id, task_id, id)?;
        self.checklist.retain(|i| !(i.id == id && i.task == task_id));
        Ok(())
    }

    /// `order` must name every item of the task exactly once.
    pub fn reorder_checklist(
        &mut self,
        user_id: i64,
        task_id: i64,
        order: Option<Vec<i64>>,
    ) -> Result<Vec<ChecklistItem>, ApiError> {
        self.task_index(task_id, user_id)?;
        let order = order.ok_or_else(|| ApiError::required("order"))?;
        let mut expected: Vec<i64> = self.items_for(task_id).iter().map(|i| i.id).collect();
        let mut given = order.clone();
        expected.sort_unstable();
        given.sort_unstable();
        if expected != given {
            return Err(ApiError::Field(
                "order",
                "Order must list every checklist item exactly once.".into(),
            ));
        }
        for (position, id) in order.iter().enumerate() {
            if let Some(item) = self
                .checklist
                .iter_mut()
                .find(|i| i.id == *id && i.task == task_id)
            {
                item.position = position as i64;
            }
        }
        Ok(self.items_for(task_id))
    }

    pub fn seed_checklist_item(&mut self, task_id: i64, text: &str) -> ChecklistItem {
        let position = self
            .items_for(task_id)
            .last()
            .map_or(0, |i| i.position + 1);
        let item = ChecklistItem {
            id: self.next_id(),
            task: task_id,
            text: text.to_string(),
            is_completed: false,
            position,
            created_at: Some(self.tick()),
        };
        self.checklist.push(item.clone());
        item
    }

    // -- Dependencies --

    fn present_dependency(&self, d: &Dependency) -> Dependency {
        let mut out = d.clone();
        out.depends_on_details = self
            .tasks
            .iter()
            .find(|t| t.id == d.depends_on)
            .map(|t| TaskRef {
                id: t.id,
                title: t.title.clone(),
                status: Some(t.status),
            });
        out
    }

    pub fn list_dependencies(&self, user_id: i64, task_id: i64) -> Result<Vec<Dependency>, ApiError> {
        self.task_index(task_id, user_id)?;
        Ok(self
            .dependencies
            .iter()
            .filter(|d| d.task == task_id)
            .map(|d| self.present_dependency(d))
            .collect())
    }

    /// True if `from` already reaches `to` by following dependency edges.
    fn reaches(&self, from: i64, to: i64) -> bool {
        let mut stack = vec![from];
        let mut seen = Vec::new();
        while let Some(node) = stack.pop() {
            if node == to {
                return true;
            }
            if seen.contains(&node) {
                continue;
            }
            seen.push(node);
            stack.extend(
                self.dependencies
                    .iter()
                    .filter(|d| d.task == node)
                    .map(|d| d.depends_on),
            );
        }
        false
    }

    pub fn create_dependency(
        &mut self,
        user_id: i64,
        task_id: i64,
        body: DependencyBody,
    ) -> Result<Dependency, ApiError> {
        self.task_index(task_id, user_id)?;
        let target = body.depends_on.ok_or_else(|| ApiError::required("depends_on"))?;
        if target == task_id {
            return Err(ApiError::Field(
                "depends_on",
                "A task cannot depend on itself.".into(),
            ));
        }
        if self.task_index(target, user_id).is_err() {
            return Err(ApiError::Field(
                "depends_on",
                format!("Invalid pk \"{target}\" - object does not exist."),
            ));
        }
        if self
            .dependencies
            .iter()
            .any(|d| d.task == task_id && d.depends_on == target)
        {
            return Err(ApiError::Field(
                "non_field_errors",
                "This dependency already exists.".into(),
            ));
        }
        if self.reaches(target, task_id) {
            return Err(ApiError::Field(
                "non_field_errors",
                "This dependency would create a cycle.".into(),
            ));
        }
        let now = self.tick();
        let dep = Dependency {
            id: self.next_id(),
            task: task_id,
            depends_on: target,
            depends_on_details: None,
            active: body.active.unwrap_or(true),
            notes: body.notes.unwrap_or_default(),
            created_at: now,
        };
        self.dependencies.push(dep.clone());
        Ok(self.present_dependency(&dep))
    }

    fn dependency_mut(
        &mut self,
        user_id: i64,
        task_id: i64,
        id: i64,
    ) -> Result<&mut Dependency, ApiError> {
        self.task_index(task_id, user_id)?;
        self.dependencies
            .iter_mut()
            .find(|d| d.id == id && d.task == task_id)
            .ok_or_else(ApiError::not_found)
    }

    pub fn update_dependency(
        &mut self,
        user_id: i64,
        task_id: i64,
        id: i64,
        notes: Option<String>,
        active: Option<bool>,
    ) -> Result<Dependency, ApiError> {
        let dep = self.dependency_mut(user_id, task_id, id)?;
        if let Some(notes) = notes {
            dep.notes = notes;
        }
        if let Some(active) = active {
            dep.active = active;
        }
        let dep = dep.clone();
        Ok(self.present_dependency(&dep))
    }

    pub fn toggle_dependency(
        &mut self,
        user_id: i64,
        task_id: i64,
        id: i64,
    ) -> Result<Dependency, ApiError> {
        let dep = self.dependency_mut(user_id, task_id, id)?;
        dep.active = !dep.active;
        let dep = dep.clone();
        Ok(self.present_dependency(&dep))
    }

    pub fn delete_dependency(
        &mut self,
        user_id: i64,
        task_id: i64,
        id: i64,
    ) -> Result<(), ApiError> {
        self.dependency_mut(user_id, task_id, id)?;
        self.dependencies
            .retain(|d| !(d.id == id && d.task == task_id));
        Ok(())
    }

    /// Tasks that `task_id` waits on through active edges.
    pub fn blockers(&self, user_id: i64, task_id: i64) -> Result<Vec<Task>, ApiError> {
        self.task_index(task_id, user_id)?;
        Ok(self.related(|d| (d.task == task_id && d.active).then_some(d.depends_on)))
    }

    /// Tasks waiting on `task_id` through active edges.
    pub fn blocked(&self, user_id: i64, task_id: i64) -> Result<Vec<Task>, ApiError> {
        self.task_index(task_id, user_id)?;
        Ok(self.related(|d| (d.depends_on == task_id && d.active).then_some(d.task)))
    }

    fn related(&self, pick: impl Fn(&Dependency) -> Option<i64>) -> Vec<Task> {
        let ids: Vec<i64> = self.dependencies.iter().filter_map(pick).collect();
        self.tasks
            .iter()
            .filter(|t| ids.contains(&t.id))
            .map(|t| self.present(t))
            .collect()
    }
}

fn parse_datetime(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            ApiError::Field(
                "due_date",
                "Datetime has wrong format. Use one of these formats instead: YYYY-MM-DDThh:mm[:ss[.uuuuuu]][+HH:MM|-HH:MM|Z].".into(),
            )
        })
}

fn invalid_choice(field: &'static str, raw: &str) -> ApiError {
    ApiError::Field(field, format!("\"{raw}\" is not a valid choice."))
}

fn invalid_filter(field: &'static str, raw: &str) -> ApiError {
    ApiError::Field(
        field,
        format!("Select a valid choice. {raw} is not one of the available choices."),
    )
}
