use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::user::User;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
    Todo,
    InProgress,
    Done,
}

impl Status {
    pub const ALL: &[Status] = &[Status::Todo, Status::InProgress, Status::Done];

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Todo => "TODO",
            Status::InProgress => "IN_PROGRESS",
            Status::Done => "DONE",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Status::Todo => "Todo",
            Status::InProgress => "In Progress",
            Status::Done => "Done",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "TODO" => Some(Status::Todo),
            "IN_PROGRESS" => Some(Status::InProgress),
            "DONE" => Some(Status::Done),
            _ => None,
        }
    }

    /// Next status in `ALL`, wrapping around.
    pub fn cycle(&self) -> Self {
        match self {
            Status::Todo => Status::InProgress,
            Status::InProgress => Status::Done,
            Status::Done => Status::Todo,
        }
    }
}

impl Default for Status {
    fn default() -> Self {
        Status::Todo
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    Medium,
    High,
}

impl Priority {
    pub const ALL: &[Priority] = &[Priority::Low, Priority::Medium, Priority::High];

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Medium => "MEDIUM",
            Priority::High => "HIGH",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Priority::Low => "Low",
            Priority::Medium => "Medium",
            Priority::High => "High",
        }
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Priority::High => "!!",
            Priority::Medium => "!",
            Priority::Low => "-",
        }
    }

    pub fn parse_str(s: &str) -> Option<Self> {
        match s {
            "LOW" => Some(Priority::Low),
            "MEDIUM" => Some(Priority::Medium),
            "HIGH" => Some(Priority::High),
            _ => None,
        }
    }

    pub fn cycle(&self) -> Self {
        match self {
            Priority::Low => Priority::Medium,
            Priority::Medium => Priority::High,
            Priority::High => Priority::Low,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Medium
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub status: Status,
    pub priority: Priority,
    pub owner: i64,
    pub assigned_to: i64,
    #[serde(default)]
    pub owner_details: Option<User>,
    #[serde(default)]
    pub assigned_to_details: Option<User>,
    /// Comma-separated, as stored by the backend.
    #[serde(default)]
    pub tags: Option<String>,
    /// Estimated duration in hours.
    #[serde(default)]
    pub duration: Option<f64>,
    /// Percentage of completed checklist items, computed server-side.
    #[serde(default)]
    pub checklist_completion: Option<f64>,
}

impl Task {
    pub fn tag_list(&self) -> Vec<String> {
        split_tags(self.tags.as_deref().unwrap_or_default())
    }

    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.status != Status::Done && self.due_date < now
    }

    pub fn assignee_name(&self) -> String {
        match &self.assigned_to_details {
            Some(user) => user.username.clone(),
            None => format!("user #{}", self.assigned_to),
        }
    }
}

/// Split a comma-delimited tags field, trimming and dropping empties.
pub fn split_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Body sent on create (POST) and update (PATCH).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInput {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub status: Status,
    pub priority: Priority,
    pub assigned_to: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner: Option<i64>,
    #[serde(default)]
    pub tags: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub status: Option<Status>,
    pub priority: Option<Priority>,
    /// Substring match against title and description.
    pub search: Option<String>,
    /// Substring match against the tags field.
    pub tag: Option<String>,
}

impl TaskFilter {
    pub fn is_empty(&self) -> bool {
        self.status.is_none()
            && self.priority.is_none()
            && self.search.as_deref().map_or(true, str::is_empty)
            && self.tag.as_deref().map_or(true, str::is_empty)
    }

    /// Query parameters in a stable order, skipping unset and empty values.
    pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
        let mut pairs = Vec::new();
        if let Some(status) = self.status {
            pairs.push(("status", status.as_str().to_string()));
        }
        if let Some(priority) = self.priority {
            pairs.push(("priority", priority.as_str().to_string()));
        }
        if let Some(search) = self.search.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("search", search.to_string()));
        }
        if let Some(tag) = self.tag.as_deref().filter(|s| !s.is_empty()) {
            pairs.push(("tag", tag.to_string()));
        }
        pairs
    }
}

/// Raw form contents for the task editor, before validation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskDraft {
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub status: Status,
    pub priority: Priority,
    /// Blank means "assign to me".
    pub assigned_to: String,
    pub tags: String,
    pub duration: String,
    /// Due date as stored on the server when editing an existing task.
    /// `None` for a new task.
    pub stored_due: Option<DateTime<Utc>>,
}

/// How due dates are shown in the editor.
pub const DRAFT_DUE_FORMAT: &str = "%Y-%m-%d %H:%M";

impl TaskDraft {
    pub fn from_task(task: &Task) -> Self {
        Self {
            title: task.title.clone(),
            description: task.description.clone(),
            due_date: task.due_date.format(DRAFT_DUE_FORMAT).to_string(),
            status: task.status,
            priority: task.priority,
            assigned_to: task.assigned_to.to_string(),
            tags: task.tags.clone().unwrap_or_default(),
            duration: task.duration.map(|d| d.to_string()).unwrap_or_default(),
            stored_due: Some(task.due_date),
        }
    }

    pub fn is_new(&self) -> bool {
        self.stored_due.is_none()
    }

    /// Check required fields and convert to a request body.
    /// `current_user` fills in a blank assignee, and the owner of a new task.
    /// Edits never send an owner.
    pub fn validate(&self, current_user: Option<i64>) -> Result<TaskInput, ValidationError> {
        let title = self.title.trim();
        if title.is_empty() {
            return Err(ValidationError::EmptyTitle);
        }
        let due = self.due_date.trim();
        if due.is_empty() {
            return Err(ValidationError::EmptyDueDate);
        }
        // An untouched due date keeps its stored precision.
        let due_date = match self.stored_due {
            Some(stored) if stored.format(DRAFT_DUE_FORMAT).to_string() == due => stored,
            _ => parse_due_date(due)
                .ok_or_else(|| ValidationError::InvalidDueDate(due.to_string()))?,
        };

        let duration = match self.duration.trim() {
            "" => None,
            raw => match raw.parse::<f64>() {
                Ok(d) if d.is_finite() && d >= 0.0 => Some(d),
                _ => return Err(ValidationError::InvalidDuration(raw.to_string())),
            },
        };

        let assigned_to = match self.assigned_to.trim() {
            "" => current_user.ok_or(ValidationError::MissingField("assignee"))?,
            raw => raw
                .parse::<i64>()
                .map_err(|_| ValidationError::InvalidAssignee(raw.to_string()))?,
        };

        Ok(TaskInput {
            title: title.to_string(),
            description: self.description.trim().to_string(),
            due_date,
            status: self.status,
            priority: self.priority,
            assigned_to,
            owner: if self.is_new() { current_user } else { None },
            tags: split_tags(&self.tags).join(","),
            duration,
        })
    }
}

/// Accepts RFC 3339, `YYYY-MM-DD HH:MM`, `YYYY-MM-DDTHH:MM` or a bare date
/// (midnight UTC).
pub fn parse_due_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%d %H:%M", "%Y-%m-%dT%H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Some(naive.and_utc());
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}
