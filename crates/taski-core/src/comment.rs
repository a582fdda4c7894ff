use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::user::User;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub task: i64,
    pub author: i64,
    #[serde(default)]
    pub author_details: Option<User>,
    pub content: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn author_name(&self) -> String {
        match &self.author_details {
            Some(user) => user.username.clone(),
            None => format!("user #{}", self.author),
        }
    }

    pub fn is_edited(&self) -> bool {
        self.updated_at.is_some_and(|u| u > self.created_at)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentInput {
    pub content: String,
}

/// Sort comments for display: oldest first, ties broken by id.
pub fn sort_for_display(comments: &mut [Comment]) {
    comments.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
}
