use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::Status;

/// Minimal view of the task on the other end of a dependency edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskRef {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub status: Option<Status>,
}

/// Directed edge: `task` depends on `depends_on`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependency {
    pub id: i64,
    pub task: i64,
    pub depends_on: i64,
    #[serde(default)]
    pub depends_on_details: Option<TaskRef>,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub notes: String,
    pub created_at: DateTime<Utc>,
}

impl Dependency {
    /// An inactive edge is kept for reference but does not block.
    pub fn is_blocking(&self) -> bool {
        self.active
            && self
                .depends_on_details
                .as_ref()
                .and_then(|d| d.status)
                .map_or(true, |s| s != Status::Done)
    }

    pub fn target_label(&self) -> String {
        match &self.depends_on_details {
            Some(t) => format!("#{} {}", t.id, t.title),
            None => format!("#{}", self.depends_on),
        }
    }
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDependency {
    pub depends_on: i64,
    #[serde(default)]
    pub notes: String,
    #[serde(default = "default_active")]
    pub active: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateDependency {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dep(active: bool, target_status: Option<Status>) -> Dependency {
        Dependency {
            id: 1,
            task: 10,
            depends_on: 20,
            depends_on_details: target_status.map(|s| TaskRef {
                id: 20,
                title: "Upstream".into(),
                status: Some(s),
            }),
            active,
            notes: String::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn inactive_edge_does_not_block() {
        assert!(!dep(false, Some(Status::Todo)).is_blocking());
    }

    #[test]
    fn done_target_does_not_block() {
        assert!(!dep(true, Some(Status::Done)).is_blocking());
        assert!(dep(true, Some(Status::InProgress)).is_blocking());
    }

    #[test]
    fn unknown_target_status_blocks_when_active() {
        assert!(dep(true, None).is_blocking());
        assert_eq!(dep(true, None).target_label(), "#20");
    }

    #[test]
    fn active_defaults_to_true() {
        let d: Dependency = serde_json::from_value(serde_json::json!({
            "id": 1, "task": 2, "depends_on": 3,
            "created_at": "2025-01-01T00:00:00Z"
        }))
        .unwrap();
        assert!(d.active);
    }
}
