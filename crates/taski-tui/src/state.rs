//! Client-side cache reconciliation.
//!
//! Every function here takes the cached collection and a server response and
//! produces the next collection. Nothing in this module talks to the network
//! or the terminal.

use taski_core::checklist::{self, ChecklistItem};
use taski_core::comment::{self, Comment};
use taski_core::{Dependency, Task};

/// Replace the task with the same id, else append.
pub fn upsert_task(tasks: &mut Vec<Task>, task: Task) {
    match tasks.iter_mut().find(|t| t.id == task.id) {
        Some(slot) => *slot = task,
        None => tasks.push(task),
    }
}

pub fn remove_task(tasks: &mut Vec<Task>, id: i64) {
    tasks.retain(|t| t.id != id);
}

/// Insert or replace a comment, keeping oldest-first order.
pub fn upsert_comment(comments: &mut Vec<Comment>, c: Comment) {
    match comments.iter_mut().find(|x| x.id == c.id) {
        Some(slot) => *slot = c,
        None => comments.push(c),
    }
    comment::sort_for_display(comments);
}

pub fn remove_comment(comments: &mut Vec<Comment>, id: i64) {
    comments.retain(|c| c.id != id);
}

/// Insert or replace a checklist item, keeping position order.
pub fn upsert_item(items: &mut Vec<ChecklistItem>, item: ChecklistItem) {
    match items.iter_mut().find(|x| x.id == item.id) {
        Some(slot) => *slot = item,
        None => items.push(item),
    }
    checklist::sort_by_position(items);
}

pub fn remove_item(items: &mut Vec<ChecklistItem>, id: i64) {
    items.retain(|i| i.id != id);
}

/// Set the completion flag locally. Returns the previous value so the caller
/// can revert if the server rejects the change.
pub fn set_item_completed(items: &mut [ChecklistItem], id: i64, done: bool) -> Option<bool> {
    let item = items.iter_mut().find(|i| i.id == id)?;
    let previous = item.is_completed;
    item.is_completed = done;
    Some(previous)
}

pub fn upsert_dependency(deps: &mut Vec<Dependency>, dep: Dependency) {
    match deps.iter_mut().find(|d| d.id == dep.id) {
        Some(slot) => *slot = dep,
        None => deps.push(dep),
    }
}

pub fn remove_dependency(deps: &mut Vec<Dependency>, id: i64) {
    deps.retain(|d| d.id != id);
}

/// Which record, if any, is being edited inline in the detail view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EditingTarget {
    #[default]
    None,
    Comment(i64),
    ChecklistItem(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailPhase {
    Loading,
    Ready,
}

/// A reorder in progress: the user rearranges `working`; `snapshot` is the
/// last server-confirmed order.
#[derive(Debug, Clone)]
pub struct ReorderState {
    snapshot: Vec<ChecklistItem>,
    working: Vec<ChecklistItem>,
    cursor: usize,
}

impl ReorderState {
    pub fn begin(items: &[ChecklistItem], cursor: usize) -> Self {
        let cursor = cursor.min(items.len().saturating_sub(1));
        Self {
            snapshot: items.to_vec(),
            working: items.to_vec(),
            cursor,
        }
    }

    pub fn working(&self) -> &[ChecklistItem] {
        &self.working
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn select_next(&mut self) {
        if self.cursor + 1 < self.working.len() {
            self.cursor += 1;
        }
    }

    pub fn select_prev(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    /// Move the selected item one slot up, following it with the cursor.
    pub fn move_up(&mut self) {
        if self.cursor > 0 && self.cursor < self.working.len() {
            self.working.swap(self.cursor, self.cursor - 1);
            self.cursor -= 1;
        }
    }

    pub fn move_down(&mut self) {
        if self.cursor + 1 < self.working.len() {
            self.working.swap(self.cursor, self.cursor + 1);
            self.cursor += 1;
        }
    }

    pub fn order(&self) -> Vec<i64> {
        self.working.iter().map(|i| i.id).collect()
    }

    pub fn is_changed(&self) -> bool {
        self.order() != self.snapshot.iter().map(|i| i.id).collect::<Vec<_>>()
    }

    /// Abandon the reorder (cancel or failed commit).
    pub fn restore(self) -> Vec<ChecklistItem> {
        self.snapshot
    }
}

/// The server's answer to a reorder is authoritative, whatever was sent.
pub fn apply_reorder(mut confirmed: Vec<ChecklistItem>) -> Vec<ChecklistItem> {
    checklist::sort_by_position(&mut confirmed);
    confirmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use taski_core::task::{Priority, Status};

    fn task(id: i64, title: &str) -> Task {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        Task {
            id,
            title: title.into(),
            description: String::new(),
            created_at: now,
            due_date: now + Duration::days(1),
            status: Status::Todo,
            priority: Priority::Medium,
            owner: 1,
            assigned_to: 1,
            owner_details: None,
            assigned_to_details: None,
            tags: None,
            duration: None,
            checklist_completion: None,
        }
    }

    fn comment(id: i64, minute: u32) -> Comment {
        Comment {
            id,
            task: 1,
            author: 1,
            author_details: None,
            content: format!("c{id}"),
            created_at: Utc.with_ymd_and_hms(2025, 1, 1, 9, minute, 0).unwrap(),
            updated_at: None,
        }
    }

    fn item(id: i64, position: i64) -> ChecklistItem {
        ChecklistItem {
            id,
            task: 1,
            text: format!("item {id}"),
            is_completed: false,
            position,
            created_at: None,
        }
    }

    #[test]
    fn upsert_replaces_existing_task() {
        let mut tasks = vec![task(1, "a"), task(2, "b")];
        upsert_task(&mut tasks, task(2, "b2"));
        assert_eq!(tasks.len(), 2);
        assert_eq!(tasks[1].title, "b2");
    }

    #[test]
    fn upsert_appends_new_task() {
        let mut tasks = vec![task(1, "a")];
        upsert_task(&mut tasks, task(5, "e"));
        assert_eq!(tasks.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 5]);
    }

    #[test]
    fn remove_task_by_id() {
        let mut tasks = vec![task(1, "a"), task(2, "b")];
        remove_task(&mut tasks, 1);
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].id, 2);
    }

    #[test]
    fn comments_stay_sorted_oldest_first() {
        let mut comments = vec![comment(1, 5), comment(2, 10)];
        upsert_comment(&mut comments, comment(3, 1));
        let ids: Vec<i64> = comments.iter().map(|c| c.id).collect();
        assert_eq!(ids, vec![3, 1, 2]);

        let mut edited = comment(1, 5);
        edited.content = "changed".into();
        upsert_comment(&mut comments, edited);
        assert_eq!(comments.len(), 3);
        assert_eq!(comments[1].content, "changed");
    }

    #[test]
    fn toggle_returns_previous_value_for_revert() {
        let mut items = vec![item(1, 0), item(2, 1)];
        let previous = set_item_completed(&mut items, 2, true);
        assert_eq!(previous, Some(false));
        assert!(items[1].is_completed);

        set_item_completed(&mut items, 2, previous.unwrap());
        assert!(!items[1].is_completed);
        assert_eq!(set_item_completed(&mut items, 99, true), None);
    }

    #[test]
    fn new_item_sorted_by_position() {
        let mut items = vec![item(1, 0), item(2, 2)];
        upsert_item(&mut items, item(3, 1));
        let ids: Vec<i64> = items.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![1, 3, 2]);
    }

    #[test]
    fn reorder_moves_and_restores() {
        let items = vec![item(1, 0), item(2, 1), item(3, 2)];
        let mut reorder = ReorderState::begin(&items, 2);
        reorder.move_up();
        reorder.move_up();
        assert_eq!(reorder.order(), vec![3, 1, 2]);
        assert_eq!(reorder.cursor(), 0);
        assert!(reorder.is_changed());

        // Moving past the top is a no-op.
        reorder.move_up();
        assert_eq!(reorder.order(), vec![3, 1, 2]);

        let restored = reorder.restore();
        assert_eq!(restored.iter().map(|i| i.id).collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn reorder_on_empty_checklist_is_inert() {
        let mut reorder = ReorderState::begin(&[], 0);
        reorder.move_down();
        reorder.move_up();
        assert!(reorder.order().is_empty());
        assert!(!reorder.is_changed());
    }

    #[test]
    fn server_order_wins_after_reorder() {
        // Server answered with positions that differ from the array order.
        let confirmed = vec![item(1, 2), item(2, 0), item(3, 1)];
        let applied = apply_reorder(confirmed);
        assert_eq!(applied.iter().map(|i| i.id).collect::<Vec<_>>(), vec![2, 3, 1]);
    }

    #[test]
    fn editing_target_defaults_to_none() {
        assert_eq!(EditingTarget::default(), EditingTarget::None);
    }
}
