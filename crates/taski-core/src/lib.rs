pub mod checklist;
pub mod comment;
pub mod dependency;
pub mod error;
pub mod task;
pub mod user;

pub use checklist::ChecklistItem;
pub use comment::Comment;
pub use dependency::Dependency;
pub use error::ValidationError;
pub use task::{Priority, Status, Task, TaskFilter, TaskInput};
pub use user::{Session, User};
