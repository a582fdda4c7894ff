use thiserror::Error;

/// Input rejected on the client before any request is sent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("task title is required")]
    EmptyTitle,

    #[error("due date is required")]
    EmptyDueDate,

    #[error("invalid due date: {0}")]
    InvalidDueDate(String),

    #[error("invalid duration: {0}")]
    InvalidDuration(String),

    #[error("invalid assignee: {0}")]
    InvalidAssignee(String),

    #[error("{0} is required")]
    MissingField(&'static str),
}
