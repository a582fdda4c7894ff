use chrono::{DateTime, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, List, ListItem, ListState};
use taski_core::task::{Priority, Status, Task};

use crate::state;

pub struct TaskList {
    tasks: Vec<Task>,
    list_state: ListState,
}

impl TaskList {
    pub fn new(tasks: Vec<Task>) -> Self {
        let mut list_state = ListState::default();
        if !tasks.is_empty() {
            list_state.select(Some(0));
        }
        Self { tasks, list_state }
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Returns the currently highlighted task, if any.
    pub fn selected_task(&self) -> Option<&Task> {
        let idx = self.list_state.selected()?;
        self.tasks.get(idx)
    }

    /// Select the task with the given id. Returns `false` and leaves the
    /// cursor alone if it is not in the list.
    pub fn select_task_by_id(&mut self, task_id: i64) -> bool {
        match self.tasks.iter().position(|t| t.id == task_id) {
            Some(idx) => {
                self.list_state.select(Some(idx));
                true
            }
            None => false,
        }
    }

    /// Swap in a freshly fetched list, keeping the cursor on the same task
    /// when it is still present.
    pub fn replace(&mut self, tasks: Vec<Task>) {
        let selected = self.selected_task().map(|t| t.id);
        self.tasks = tasks;
        self.clamp_selection();
        if let Some(id) = selected {
            self.select_task_by_id(id);
        }
    }

    pub fn upsert(&mut self, task: Task) {
        let id = task.id;
        state::upsert_task(&mut self.tasks, task);
        self.select_task_by_id(id);
    }

    /// Replace a task only if it is already listed. The cursor does not move.
    pub fn patch(&mut self, task: Task) {
        if let Some(slot) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            *slot = task;
        }
    }

    pub fn remove(&mut self, task_id: i64) {
        state::remove_task(&mut self.tasks, task_id);
        self.clamp_selection();
    }

    fn clamp_selection(&mut self) {
        if self.tasks.is_empty() {
            self.list_state.select(None);
        } else {
            let idx = self.list_state.selected().unwrap_or(0);
            self.list_state.select(Some(idx.min(self.tasks.len() - 1)));
        }
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => {
                let current = self.list_state.selected().unwrap_or(0);
                if current + 1 < self.tasks.len() {
                    self.list_state.select(Some(current + 1));
                }
            }
            KeyCode::Char('k') | KeyCode::Up => {
                let current = self.list_state.selected().unwrap_or(0);
                if current > 0 {
                    self.list_state.select(Some(current - 1));
                }
            }
            KeyCode::Char('g') => {
                if !self.tasks.is_empty() {
                    self.list_state.select(Some(0));
                }
            }
            KeyCode::Char('G') => {
                if !self.tasks.is_empty() {
                    self.list_state.select(Some(self.tasks.len() - 1));
                }
            }
            _ => {}
        }
    }

    pub fn render(&self, frame: &mut Frame, area: Rect, title: &str) {
        let now = Utc::now();
        let block = Block::default()
            .title(format!(" {title} ({}) ", self.tasks.len()))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        let items: Vec<ListItem> = self.tasks.iter().map(|t| task_row(t, now)).collect();

        let list = List::new(items)
            .block(block)
            .highlight_style(
                Style::default()
                    .fg(Color::Black)
                    .bg(Color::Cyan)
                    .bold(),
            )
            .highlight_symbol("> ");

        let mut state = self.list_state.clone();
        frame.render_stateful_widget(list, area, &mut state);
    }
}

fn task_row(task: &Task, now: DateTime<Utc>) -> ListItem<'_> {
    let due_style = if task.is_overdue(now) {
        Style::default().fg(Color::Red)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let mut spans = vec![
        Span::styled(
            format!("{:<3}", task.priority.symbol()),
            priority_color(task.priority),
        ),
        Span::styled(
            format!("{:<12}", task.status.display_name()),
            status_color(task.status),
        ),
        Span::raw(task.title.as_str()),
        Span::styled(
            format!("  due {}", task.due_date.format("%Y-%m-%d %H:%M")),
            due_style,
        ),
        Span::styled(
            format!("  @{}", task.assignee_name()),
            Style::default().fg(Color::Magenta),
        ),
    ];
    if let Some(pct) = task.checklist_completion {
        spans.push(Span::styled(
            format!("  [{pct:.0}%]"),
            Style::default().fg(Color::Green),
        ));
    }
    let tags = task.tag_list();
    if !tags.is_empty() {
        spans.push(Span::styled(
            format!("  #{}", tags.join(" #")),
            Style::default().fg(Color::Blue),
        ));
    }
    ListItem::new(Line::from(spans))
}

pub fn priority_color(priority: Priority) -> Style {
    match priority {
        Priority::High => Style::default().fg(Color::Red).bold(),
        Priority::Medium => Style::default().fg(Color::Yellow),
        Priority::Low => Style::default().fg(Color::Blue),
    }
}

pub fn status_color(status: Status) -> Style {
    match status {
        Status::Todo => Style::default().fg(Color::White),
        Status::InProgress => Style::default().fg(Color::Yellow),
        Status::Done => Style::default().fg(Color::Green),
    }
}
