use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: i64,
    pub task: i64,
    pub text: String,
    #[serde(default)]
    pub is_completed: bool,
    pub position: i64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChecklistItem {
    pub text: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateChecklistItem {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

/// Body of `POST /tasks/{id}/checklist/reorder/`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderChecklist {
    pub order: Vec<i64>,
}

/// Percentage of completed items, `None` for an empty checklist.
pub fn completion(items: &[ChecklistItem]) -> Option<f64> {
    if items.is_empty() {
        return None;
    }
    let done = items.iter().filter(|i| i.is_completed).count();
    Some(done as f64 * 100.0 / items.len() as f64)
}

pub fn sort_by_position(items: &mut [ChecklistItem]) {
    items.sort_by(|a, b| a.position.cmp(&b.position).then(a.id.cmp(&b.id)));
}
