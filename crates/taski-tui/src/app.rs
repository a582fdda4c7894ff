use anyhow::Result;
use chrono::{Duration, Utc};
use crossterm::event::{KeyCode, KeyEvent};
use ratatui::prelude::*;
use ratatui::widgets::{Block, Borders, Clear, List, ListItem, ListState, Paragraph, Wrap};
use taski_client::{BlockingApiClient, ClientError};
use taski_core::checklist::{self, ChecklistItem};
use taski_core::comment::{self, Comment};
use taski_core::dependency::{CreateDependency, Dependency};
use taski_core::task::{Priority, Status, Task, TaskDraft, TaskFilter};
use tracing::{debug, info, warn};

use crate::components::task_list::{priority_color, status_color, TaskList};
use crate::state::{self, DetailPhase, EditingTarget, ReorderState};

/// What the app is currently doing
#[derive(Debug, Clone)]
pub enum Mode {
    /// Login form
    Login { form: AuthForm },
    /// Registration form
    Register { form: AuthForm },
    /// Task list navigation
    Normal,
    /// Typing a search or tag filter
    FilterInput { kind: FilterKind, input: String },
    /// Creating (`task_id: None`) or editing a task
    TaskForm { form: Box<TaskForm> },
    /// Confirm delete task. `detail` is where cancel returns to.
    ConfirmDelete {
        task: Task,
        detail: Option<Box<DetailView>>,
    },
    /// Task detail modal
    Detail { view: Box<DetailView> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    Search,
    Tag,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthField {
    #[default]
    Username,
    Email,
    Password,
}

#[derive(Debug, Clone, Default)]
pub struct AuthForm {
    pub username: String,
    pub email: String,
    pub password: String,
    pub field: AuthField,
    pub error: Option<String>,
}

impl AuthForm {
    fn with_error(msg: &str) -> Self {
        Self {
            error: Some(msg.to_string()),
            ..Default::default()
        }
    }

    fn fields(register: bool) -> &'static [AuthField] {
        if register {
            &[AuthField::Username, AuthField::Email, AuthField::Password]
        } else {
            &[AuthField::Username, AuthField::Password]
        }
    }

    fn step(&mut self, register: bool, forward: bool) {
        let fields = Self::fields(register);
        let idx = fields.iter().position(|f| *f == self.field).unwrap_or(0);
        let next = if forward {
            (idx + 1) % fields.len()
        } else {
            (idx + fields.len() - 1) % fields.len()
        };
        self.field = fields[next];
    }

    fn active_input(&mut self) -> &mut String {
        match self.field {
            AuthField::Username => &mut self.username,
            AuthField::Email => &mut self.email,
            AuthField::Password => &mut self.password,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormField {
    Title,
    Description,
    DueDate,
    Status,
    Priority,
    Assignee,
    Tags,
    Duration,
}

impl FormField {
    const ALL: [FormField; 8] = [
        FormField::Title,
        FormField::Description,
        FormField::DueDate,
        FormField::Status,
        FormField::Priority,
        FormField::Assignee,
        FormField::Tags,
        FormField::Duration,
    ];

    fn label(self) -> &'static str {
        match self {
            FormField::Title => "Title",
            FormField::Description => "Description",
            FormField::DueDate => "Due (YYYY-MM-DD [HH:MM])",
            FormField::Status => "Status",
            FormField::Priority => "Priority",
            FormField::Assignee => "Assignee id (blank = me)",
            FormField::Tags => "Tags (comma separated)",
            FormField::Duration => "Duration (hours)",
        }
    }

    fn next(self) -> Self {
        let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(idx + 1) % Self::ALL.len()]
    }

    fn prev(self) -> Self {
        let idx = Self::ALL.iter().position(|f| *f == self).unwrap_or(0);
        Self::ALL[(idx + Self::ALL.len() - 1) % Self::ALL.len()]
    }

    fn is_choice(self) -> bool {
        matches!(self, FormField::Status | FormField::Priority)
    }
}

#[derive(Debug, Clone)]
pub struct TaskForm {
    pub task_id: Option<i64>,
    pub draft: TaskDraft,
    pub field: FormField,
    pub error: Option<String>,
    /// Detail view to return to after save or cancel.
    pub origin: Option<Box<DetailView>>,
}

impl TaskForm {
    fn new_task() -> Self {
        let tomorrow = Utc::now() + Duration::days(1);
        Self {
            task_id: None,
            draft: TaskDraft {
                due_date: tomorrow.format("%Y-%m-%d").to_string(),
                ..Default::default()
            },
            field: FormField::Title,
            error: None,
            origin: None,
        }
    }

    fn edit(task: &Task, origin: Option<Box<DetailView>>) -> Self {
        Self {
            task_id: Some(task.id),
            draft: TaskDraft::from_task(task),
            field: FormField::Title,
            error: None,
            origin,
        }
    }

    fn text_mut(&mut self) -> Option<&mut String> {
        match self.field {
            FormField::Title => Some(&mut self.draft.title),
            FormField::Description => Some(&mut self.draft.description),
            FormField::DueDate => Some(&mut self.draft.due_date),
            FormField::Assignee => Some(&mut self.draft.assigned_to),
            FormField::Tags => Some(&mut self.draft.tags),
            FormField::Duration => Some(&mut self.draft.duration),
            FormField::Status | FormField::Priority => None,
        }
    }

    fn cycle_choice(&mut self, back: bool) {
        // Three choices each, so going back is two steps forward.
        let steps = if back { 2 } else { 1 };
        for _ in 0..steps {
            match self.field {
                FormField::Status => self.draft.status = self.draft.status.cycle(),
                FormField::Priority => self.draft.priority = self.draft.priority.cycle(),
                _ => {}
            }
        }
    }

    fn value(&self, field: FormField) -> String {
        match field {
            FormField::Title => self.draft.title.clone(),
            FormField::Description => self.draft.description.clone(),
            FormField::DueDate => self.draft.due_date.clone(),
            FormField::Status => format!("< {} >", self.draft.status),
            FormField::Priority => format!("< {} >", self.draft.priority),
            FormField::Assignee => self.draft.assigned_to.clone(),
            FormField::Tags => self.draft.tags.clone(),
            FormField::Duration => self.draft.duration.clone(),
        }
    }
}

/// Panel of the detail view that has keyboard focus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Section {
    Checklist,
    Comments,
    Dependencies,
}

impl Section {
    fn next(self) -> Self {
        match self {
            Section::Checklist => Section::Comments,
            Section::Comments => Section::Dependencies,
            Section::Dependencies => Section::Checklist,
        }
    }

    fn prev(self) -> Self {
        match self {
            Section::Checklist => Section::Dependencies,
            Section::Comments => Section::Checklist,
            Section::Dependencies => Section::Comments,
        }
    }

    fn empty_compose(self) -> Compose {
        match self {
            Section::Checklist => Compose::ChecklistItem(String::new()),
            Section::Comments => Compose::Comment(String::new()),
            Section::Dependencies => Compose::Dependency(String::new()),
        }
    }
}

/// Text being typed for a new record in the detail view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Compose {
    Comment(String),
    ChecklistItem(String),
    /// `<task id> [notes]`
    Dependency(String),
}

impl Compose {
    fn text(&self) -> &str {
        match self {
            Compose::Comment(s) | Compose::ChecklistItem(s) | Compose::Dependency(s) => s,
        }
    }

    fn text_mut(&mut self) -> &mut String {
        match self {
            Compose::Comment(s) | Compose::ChecklistItem(s) | Compose::Dependency(s) => s,
        }
    }

    fn label(&self) -> &'static str {
        match self {
            Compose::Comment(_) => "New comment: ",
            Compose::ChecklistItem(_) => "New checklist item: ",
            Compose::Dependency(_) => "Depends on (task id [notes]): ",
        }
    }
}

/// Everything shown in the task detail modal.
#[derive(Debug, Clone)]
pub struct DetailView {
    pub task: Task,
    pub phase: DetailPhase,
    pub section: Section,
    pub cursor: usize,
    pub comments: Vec<Comment>,
    pub checklist: Vec<ChecklistItem>,
    pub dependencies: Vec<Dependency>,
    pub blockers: Vec<Task>,
    pub blocked: Vec<Task>,
    pub editing: EditingTarget,
    pub edit_buffer: String,
    pub compose: Option<Compose>,
    pub reorder: Option<ReorderState>,
}

impl DetailView {
    fn loading(task: Task) -> Self {
        Self {
            task,
            phase: DetailPhase::Loading,
            section: Section::Checklist,
            cursor: 0,
            comments: Vec::new(),
            checklist: Vec::new(),
            dependencies: Vec::new(),
            blockers: Vec::new(),
            blocked: Vec::new(),
            editing: EditingTarget::None,
            edit_buffer: String::new(),
            compose: None,
            reorder: None,
        }
    }

    fn section_len(&self) -> usize {
        match self.section {
            Section::Checklist => self.checklist.len(),
            Section::Comments => self.comments.len(),
            Section::Dependencies => self.dependencies.len(),
        }
    }

    fn select_next(&mut self) {
        if self.cursor + 1 < self.section_len() {
            self.cursor += 1;
        }
    }

    fn select_prev(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn clamp_cursor(&mut self) {
        self.cursor = self.cursor.min(self.section_len().saturating_sub(1));
    }

    fn select_last(&mut self) {
        self.cursor = self.section_len().saturating_sub(1);
    }

    pub fn is_typing(&self) -> bool {
        self.compose.is_some() || self.editing != EditingTarget::None
    }

    /// Start editing `target`, replacing any edit or compose in progress.
    pub fn start_editing(&mut self, target: EditingTarget, text: String) {
        self.compose = None;
        self.editing = target;
        self.edit_buffer = text;
    }

    fn begin_edit_focused(&mut self) {
        let focused = match self.section {
            Section::Comments => self
                .comments
                .get(self.cursor)
                .map(|c| (EditingTarget::Comment(c.id), c.content.clone())),
            Section::Checklist => self
                .checklist
                .get(self.cursor)
                .map(|i| (EditingTarget::ChecklistItem(i.id), i.text.clone())),
            Section::Dependencies => None,
        };
        if let Some((target, text)) = focused {
            self.start_editing(target, text);
        }
    }

    fn stop_editing(&mut self) {
        self.editing = EditingTarget::None;
        self.edit_buffer.clear();
    }
}

pub struct App {
    client: BlockingApiClient,
    tasks: TaskList,
    filter: TaskFilter,
    mode: Mode,
    status_message: Option<String>,
}

impl App {
    pub fn new(client: BlockingApiClient) -> Result<Self> {
        let mut app = Self {
            client,
            tasks: TaskList::new(Vec::new()),
            filter: TaskFilter::default(),
            mode: Mode::Login {
                form: AuthForm::default(),
            },
            status_message: None,
        };
        if app.client.is_authenticated() {
            debug!("stored session found");
            app.mode = Mode::Normal;
            app.reload_tasks();
        }
        Ok(app)
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn status_message(&self) -> Option<&str> {
        self.status_message.as_deref()
    }

    pub fn tasks(&self) -> &[Task] {
        self.tasks.tasks()
    }

    pub fn filter(&self) -> &TaskFilter {
        &self.filter
    }

    pub fn detail(&self) -> Option<&DetailView> {
        match &self.mode {
            Mode::Detail { view } => Some(view),
            _ => None,
        }
    }

    pub fn is_input_mode(&self) -> bool {
        match &self.mode {
            Mode::Login { .. }
            | Mode::Register { .. }
            | Mode::FilterInput { .. }
            | Mode::TaskForm { .. } => true,
            Mode::Detail { view } => view.is_typing(),
            Mode::Normal | Mode::ConfirmDelete { .. } => false,
        }
    }

    /// True while the detail modal is waiting for its data. The event loop
    /// draws the loading state once, then calls `load_pending`.
    pub fn has_pending_load(&self) -> bool {
        matches!(&self.mode, Mode::Detail { view } if view.phase == DetailPhase::Loading)
    }

    pub fn load_pending(&mut self) {
        let (task_id, section) = match &self.mode {
            Mode::Detail { view } if view.phase == DetailPhase::Loading => {
                (view.task.id, view.section)
            }
            _ => return,
        };
        match self.fetch_detail(task_id) {
            Ok(mut view) => {
                view.section = section;
                view.clamp_cursor();
                self.tasks.patch(view.task.clone());
                self.mode = Mode::Detail {
                    view: Box::new(view),
                };
            }
            Err(e) => {
                if matches!(e, ClientError::NotFound(_)) {
                    self.tasks.remove(task_id);
                }
                self.mode = Mode::Normal;
                self.report(e);
            }
        }
    }

    fn fetch_detail(&self, task_id: i64) -> Result<DetailView, ClientError> {
        let task = self.client.get_task(task_id)?;
        let mut comments = self.client.list_comments(task_id)?;
        comment::sort_for_display(&mut comments);
        let mut items = self.client.list_checklist(task_id)?;
        checklist::sort_by_position(&mut items);
        let dependencies = self.client.list_dependencies(task_id)?;
        let blockers = self.client.list_blockers(task_id)?;
        let blocked = self.client.list_blocked(task_id)?;

        let mut view = DetailView::loading(task);
        view.phase = DetailPhase::Ready;
        view.comments = comments;
        view.checklist = items;
        view.dependencies = dependencies;
        view.blockers = blockers;
        view.blocked = blocked;
        Ok(view)
    }

    fn reload_tasks(&mut self) {
        match self.client.list_tasks(&self.filter) {
            Ok(tasks) => {
                debug!("loaded {} tasks", tasks.len());
                self.tasks.replace(tasks);
            }
            Err(e) => self.report(e),
        }
    }

    /// Turn a failed call into a status line, or a forced logout for auth
    /// failures.
    fn report(&mut self, e: ClientError) {
        if e.is_auth() {
            self.force_logout();
            return;
        }
        warn!("request failed: {e}");
        self.status_message = Some(e.user_message());
    }

    fn force_logout(&mut self) {
        warn!("session rejected, returning to login");
        self.tasks = TaskList::new(Vec::new());
        self.filter = TaskFilter::default();
        self.mode = Mode::Login {
            form: AuthForm::with_error("Your session has expired. Please log in again."),
        };
    }

    fn logout(&mut self) {
        if let Err(e) = self.client.logout() {
            warn!("logout: {e}");
        }
        info!("logged out");
        self.tasks = TaskList::new(Vec::new());
        self.filter = TaskFilter::default();
        self.mode = Mode::Login {
            form: AuthForm::default(),
        };
        self.status_message = Some("Logged out".into());
    }

    /// Set the mode unless a forced logout already replaced it.
    fn set_mode(&mut self, mode: Mode) {
        if !matches!(self.mode, Mode::Login { .. }) {
            self.mode = mode;
        }
    }

    fn current_user_id(&self) -> Option<i64> {
        self.client.session().and_then(|s| s.user_id())
    }

    pub fn handle_key(&mut self, key: KeyEvent) {
        self.status_message = None;

        match self.mode.clone() {
            Mode::Login { form } => self.handle_auth(key, form, false),
            Mode::Register { form } => self.handle_auth(key, form, true),
            Mode::Normal => self.handle_normal(key),
            Mode::FilterInput { kind, input } => self.handle_filter_input(key, kind, input),
            Mode::TaskForm { form } => self.handle_task_form(key, form),
            Mode::ConfirmDelete { task, detail } => self.handle_confirm_delete(key, task, detail),
            Mode::Detail { view } => self.handle_detail(key, view),
        }
    }

    // -- Auth --

    fn handle_auth(&mut self, key: KeyEvent, mut form: AuthForm, register: bool) {
        match key.code {
            KeyCode::F(2) => {
                form.error = None;
                form.field = AuthField::Username;
                self.mode = auth_mode(form, !register);
                return;
            }
            KeyCode::Enter => {
                self.submit_auth(form, register);
                return;
            }
            KeyCode::Tab | KeyCode::Down => form.step(register, true),
            KeyCode::BackTab | KeyCode::Up => form.step(register, false),
            KeyCode::Backspace => {
                form.active_input().pop();
            }
            KeyCode::Char(c) => form.active_input().push(c),
            _ => {}
        }
        self.mode = auth_mode(form, register);
    }

    fn submit_auth(&mut self, mut form: AuthForm, register: bool) {
        let username = form.username.trim().to_string();
        let email = form.email.trim().to_string();
        if username.is_empty() || form.password.is_empty() || (register && email.is_empty()) {
            form.error = Some(if register {
                "Username, email and password are required".into()
            } else {
                "Username and password are required".into()
            });
            self.mode = auth_mode(form, register);
            return;
        }

        let result = if register {
            self.client.register(&username, &email, &form.password)
        } else {
            self.client.login(&username, &form.password)
        };
        match result {
            Ok(session) => {
                let name = session.user.map(|u| u.username).unwrap_or(username);
                info!("signed in as {name}");
                self.filter = TaskFilter::default();
                self.mode = Mode::Normal;
                self.status_message = Some(format!("Signed in as {name}"));
                self.reload_tasks();
            }
            Err(e) => {
                warn!("sign-in failed: {e}");
                form.password.clear();
                form.error = Some(e.user_message());
                self.mode = auth_mode(form, register);
            }
        }
    }

    // -- Task list --

    fn handle_normal(&mut self, key: KeyEvent) {
        match key.code {
            KeyCode::Char('n') => {
                self.mode = Mode::TaskForm {
                    form: Box::new(TaskForm::new_task()),
                };
            }
            KeyCode::Enter => {
                if let Some(task) = self.tasks.selected_task() {
                    self.mode = Mode::Detail {
                        view: Box::new(DetailView::loading(task.clone())),
                    };
                }
            }
            KeyCode::Char('e') => {
                if let Some(task) = self.tasks.selected_task() {
                    self.mode = Mode::TaskForm {
                        form: Box::new(TaskForm::edit(task, None)),
                    };
                }
            }
            KeyCode::Char('d') => {
                if let Some(task) = self.tasks.selected_task() {
                    self.mode = Mode::ConfirmDelete {
                        task: task.clone(),
                        detail: None,
                    };
                }
            }
            KeyCode::Char('s') => {
                self.filter.status = match self.filter.status {
                    None => Some(Status::Todo),
                    Some(Status::Done) => None,
                    Some(s) => Some(s.cycle()),
                };
                self.reload_tasks();
            }
            KeyCode::Char('p') => {
                self.filter.priority = match self.filter.priority {
                    None => Some(Priority::Low),
                    Some(Priority::High) => None,
                    Some(p) => Some(p.cycle()),
                };
                self.reload_tasks();
            }
            KeyCode::Char('/') => {
                self.mode = Mode::FilterInput {
                    kind: FilterKind::Search,
                    input: self.filter.search.clone().unwrap_or_default(),
                };
            }
            KeyCode::Char('t') => {
                self.mode = Mode::FilterInput {
                    kind: FilterKind::Tag,
                    input: self.filter.tag.clone().unwrap_or_default(),
                };
            }
            KeyCode::Char('c') => {
                if !self.filter.is_empty() {
                    self.filter = TaskFilter::default();
                    self.reload_tasks();
                    if self.status_message.is_none() {
                        self.status_message = Some("Filters cleared".into());
                    }
                }
            }
            KeyCode::Char('r') => self.reload_tasks(),
            KeyCode::Char('L') => self.logout(),
            _ => self.tasks.handle_key(key),
        }
    }

    fn handle_filter_input(&mut self, key: KeyEvent, kind: FilterKind, mut input: String) {
        match key.code {
            KeyCode::Enter => {
                let value = Some(input.trim().to_string()).filter(|s| !s.is_empty());
                match kind {
                    FilterKind::Search => self.filter.search = value,
                    FilterKind::Tag => self.filter.tag = value,
                }
                self.mode = Mode::Normal;
                self.reload_tasks();
            }
            KeyCode::Esc => self.mode = Mode::Normal,
            KeyCode::Backspace => {
                input.pop();
                self.mode = Mode::FilterInput { kind, input };
            }
            KeyCode::Char(c) => {
                input.push(c);
                self.mode = Mode::FilterInput { kind, input };
            }
            _ => {}
        }
    }

    // -- Task form --

    fn handle_task_form(&mut self, key: KeyEvent, mut form: Box<TaskForm>) {
        match key.code {
            KeyCode::Esc => {
                self.mode = match form.origin {
                    Some(view) => Mode::Detail { view },
                    None => Mode::Normal,
                };
                return;
            }
            KeyCode::Enter => {
                self.submit_task_form(form);
                return;
            }
            KeyCode::Tab | KeyCode::Down => form.field = form.field.next(),
            KeyCode::BackTab | KeyCode::Up => form.field = form.field.prev(),
            KeyCode::Left if form.field.is_choice() => form.cycle_choice(true),
            KeyCode::Right | KeyCode::Char(' ') if form.field.is_choice() => {
                form.cycle_choice(false)
            }
            KeyCode::Backspace => {
                if let Some(text) = form.text_mut() {
                    text.pop();
                }
            }
            KeyCode::Char(c) => {
                if let Some(text) = form.text_mut() {
                    text.push(c);
                }
            }
            _ => {}
        }
        self.mode = Mode::TaskForm { form };
    }

    fn submit_task_form(&mut self, mut form: Box<TaskForm>) {
        let input = match form.draft.validate(self.current_user_id()) {
            Ok(input) => input,
            Err(e) => {
                debug!("task form rejected: {e}");
                form.error = Some(e.to_string());
                self.mode = Mode::TaskForm { form };
                return;
            }
        };

        let result = match form.task_id {
            Some(id) => self.client.update_task(id, &input),
            None => self.client.create_task(&input),
        };
        match result {
            Ok(task) => {
                info!("saved task {}", task.id);
                self.status_message = Some(match form.task_id {
                    Some(_) => "Task updated".into(),
                    None => "Task created".into(),
                });
                self.tasks.upsert(task.clone());
                self.mode = match form.origin.take() {
                    Some(mut view) => {
                        view.task = task;
                        Mode::Detail { view }
                    }
                    None => Mode::Normal,
                };
            }
            Err(e) if e.is_auth() => self.force_logout(),
            Err(e) => {
                warn!("saving task failed: {e}");
                form.error = Some(e.user_message());
                self.mode = Mode::TaskForm { form };
            }
        }
    }

    fn handle_confirm_delete(
        &mut self,
        key: KeyEvent,
        task: Task,
        detail: Option<Box<DetailView>>,
    ) {
        let back = |detail: Option<Box<DetailView>>| match detail {
            Some(view) => Mode::Detail { view },
            None => Mode::Normal,
        };
        match key.code {
            KeyCode::Char('y') | KeyCode::Char('Y') => match self.client.delete_task(task.id) {
                Ok(()) => {
                    info!("deleted task {}", task.id);
                    self.tasks.remove(task.id);
                    self.mode = Mode::Normal;
                    self.status_message = Some(format!("Deleted: {}", task.title));
                    self.reload_tasks();
                }
                Err(e) => {
                    self.mode = back(detail);
                    self.report(e);
                }
            },
            _ => self.mode = back(detail),
        }
    }

    // -- Detail --

    fn handle_detail(&mut self, key: KeyEvent, mut view: Box<DetailView>) {
        if view.phase == DetailPhase::Loading {
            if key.code == KeyCode::Esc {
                self.mode = Mode::Normal;
            }
            return;
        }
        if let Some(reorder) = view.reorder.take() {
            self.handle_reorder(key, view, reorder);
            return;
        }
        if let Some(compose) = view.compose.take() {
            self.handle_compose(key, view, compose);
            return;
        }
        if view.editing != EditingTarget::None {
            self.handle_inline_edit(key, view);
            return;
        }

        match key.code {
            KeyCode::Esc => {
                self.mode = Mode::Normal;
                return;
            }
            KeyCode::Tab => {
                view.section = view.section.next();
                view.cursor = 0;
            }
            KeyCode::BackTab => {
                view.section = view.section.prev();
                view.cursor = 0;
            }
            KeyCode::Char('j') | KeyCode::Down => view.select_next(),
            KeyCode::Char('k') | KeyCode::Up => view.select_prev(),
            KeyCode::Char('a') => {
                view.stop_editing();
                view.compose = Some(view.section.empty_compose());
            }
            KeyCode::Enter | KeyCode::Char('E') => view.begin_edit_focused(),
            KeyCode::Char(' ') => match view.section {
                Section::Checklist => self.toggle_item(&mut view),
                Section::Dependencies => self.toggle_dependency(&mut view),
                Section::Comments => {}
            },
            KeyCode::Char('x') => self.delete_focused(&mut view),
            KeyCode::Char('o') => {
                if view.section == Section::Checklist && !view.checklist.is_empty() {
                    view.reorder = Some(ReorderState::begin(&view.checklist, view.cursor));
                }
            }
            KeyCode::Char('m') => self.advance_status(&mut view),
            KeyCode::Char('r') => {
                let section = view.section;
                view = Box::new(DetailView::loading(view.task.clone()));
                view.section = section;
            }
            KeyCode::Char('e') => {
                let task = view.task.clone();
                self.mode = Mode::TaskForm {
                    form: Box::new(TaskForm::edit(&task, Some(view))),
                };
                return;
            }
            KeyCode::Char('d') => {
                let task = view.task.clone();
                self.mode = Mode::ConfirmDelete {
                    task,
                    detail: Some(view),
                };
                return;
            }
            _ => {}
        }
        self.set_mode(Mode::Detail { view });
    }

    fn handle_reorder(
        &mut self,
        key: KeyEvent,
        mut view: Box<DetailView>,
        mut reorder: ReorderState,
    ) {
        match key.code {
            KeyCode::Char('j') | KeyCode::Down => reorder.select_next(),
            KeyCode::Char('k') | KeyCode::Up => reorder.select_prev(),
            KeyCode::Char('J') => reorder.move_down(),
            KeyCode::Char('K') => reorder.move_up(),
            KeyCode::Esc => {
                view.checklist = reorder.restore();
                self.mode = Mode::Detail { view };
                return;
            }
            KeyCode::Enter => {
                self.commit_reorder(&mut view, reorder);
                self.set_mode(Mode::Detail { view });
                return;
            }
            _ => {}
        }
        view.reorder = Some(reorder);
        self.mode = Mode::Detail { view };
    }

    fn commit_reorder(&mut self, view: &mut DetailView, reorder: ReorderState) {
        if !reorder.is_changed() {
            return;
        }
        let order = reorder.order();
        let cursor = reorder.cursor();
        match self.client.reorder_checklist(view.task.id, &order) {
            Ok(items) => {
                view.checklist = state::apply_reorder(items);
                view.cursor = cursor;
                view.clamp_cursor();
                self.status_message = Some("Checklist reordered".into());
            }
            Err(e) => {
                view.checklist = reorder.restore();
                self.report(e);
            }
        }
    }

    fn handle_compose(&mut self, key: KeyEvent, mut view: Box<DetailView>, mut compose: Compose) {
        match key.code {
            KeyCode::Esc => {}
            KeyCode::Enter => self.submit_compose(&mut view, compose),
            KeyCode::Backspace => {
                compose.text_mut().pop();
                view.compose = Some(compose);
            }
            KeyCode::Char(c) => {
                compose.text_mut().push(c);
                view.compose = Some(compose);
            }
            _ => view.compose = Some(compose),
        }
        self.set_mode(Mode::Detail { view });
    }

    fn submit_compose(&mut self, view: &mut DetailView, compose: Compose) {
        let task_id = view.task.id;
        let text = compose.text().trim().to_string();
        if text.is_empty() {
            self.status_message = Some("Nothing to add".into());
            view.compose = Some(compose);
            return;
        }

        let result = match &compose {
            Compose::Comment(_) => self
                .client
                .create_comment(task_id, &text)
                .map(|c| state::upsert_comment(&mut view.comments, c)),
            Compose::ChecklistItem(_) => self
                .client
                .create_checklist_item(task_id, &text)
                .map(|item| state::upsert_item(&mut view.checklist, item)),
            Compose::Dependency(_) => match parse_dependency(&text) {
                Some(input) => self
                    .client
                    .create_dependency(task_id, &input)
                    .map(|d| state::upsert_dependency(&mut view.dependencies, d)),
                None => {
                    self.status_message =
                        Some("Enter a task id, optionally followed by notes".into());
                    view.compose = Some(compose.clone());
                    return;
                }
            },
        };

        match result {
            Ok(()) => {
                match compose {
                    Compose::Comment(_) => {
                        // Comments sort by time; a new one is last.
                        if view.section == Section::Comments {
                            view.select_last();
                        }
                    }
                    Compose::ChecklistItem(_) => {
                        self.sync_completion(view);
                        if view.section == Section::Checklist {
                            view.select_last();
                        }
                    }
                    Compose::Dependency(_) => self.refresh_dependency_lists(view),
                }
            }
            Err(e) => {
                view.compose = Some(compose);
                self.report(e);
            }
        }
    }

    fn handle_inline_edit(&mut self, key: KeyEvent, mut view: Box<DetailView>) {
        match key.code {
            KeyCode::Esc => view.stop_editing(),
            KeyCode::Enter => self.submit_inline_edit(&mut view),
            KeyCode::Backspace => {
                view.edit_buffer.pop();
            }
            KeyCode::Char(c) => view.edit_buffer.push(c),
            _ => {}
        }
        self.set_mode(Mode::Detail { view });
    }

    fn submit_inline_edit(&mut self, view: &mut DetailView) {
        let text = view.edit_buffer.trim().to_string();
        if text.is_empty() {
            self.status_message = Some("Text cannot be empty".into());
            return;
        }
        let task_id = view.task.id;
        let target = view.editing;
        let result = match target {
            EditingTarget::Comment(id) => self
                .client
                .update_comment(task_id, id, &text)
                .map(|c| state::upsert_comment(&mut view.comments, c)),
            EditingTarget::ChecklistItem(id) => self
                .client
                .update_checklist_item(task_id, id, &text)
                .map(|item| state::upsert_item(&mut view.checklist, item)),
            EditingTarget::None => return,
        };
        match result {
            Ok(()) => view.stop_editing(),
            Err(e) => self.report(e),
        }
    }

    /// Flip the focused checklist item locally, then confirm with the server.
    /// The flip is undone if the server call fails.
    fn toggle_item(&mut self, view: &mut DetailView) {
        let Some(item) = view.checklist.get(view.cursor) else {
            return;
        };
        let (id, done) = (item.id, !item.is_completed);
        let previous = state::set_item_completed(&mut view.checklist, id, done);

        let task_id = view.task.id;
        let result = if done {
            self.client.complete_checklist_item(task_id, id)
        } else {
            self.client.incomplete_checklist_item(task_id, id)
        };
        match result {
            Ok(item) => {
                state::upsert_item(&mut view.checklist, item);
                self.sync_completion(view);
            }
            Err(e) => {
                if let Some(previous) = previous {
                    state::set_item_completed(&mut view.checklist, id, previous);
                }
                self.report(e);
            }
        }
    }

    fn toggle_dependency(&mut self, view: &mut DetailView) {
        let Some(id) = view.dependencies.get(view.cursor).map(|d| d.id) else {
            return;
        };
        match self.client.toggle_dependency(view.task.id, id) {
            Ok(dep) => {
                state::upsert_dependency(&mut view.dependencies, dep);
                self.refresh_dependency_lists(view);
            }
            Err(e) => self.report(e),
        }
    }

    fn delete_focused(&mut self, view: &mut DetailView) {
        let task_id = view.task.id;
        let cursor = view.cursor;
        let result = match view.section {
            Section::Comments => {
                let Some(id) = view.comments.get(cursor).map(|c| c.id) else {
                    return;
                };
                self.client
                    .delete_comment(task_id, id)
                    .map(|()| state::remove_comment(&mut view.comments, id))
            }
            Section::Checklist => {
                let Some(id) = view.checklist.get(cursor).map(|i| i.id) else {
                    return;
                };
                self.client
                    .delete_checklist_item(task_id, id)
                    .map(|()| state::remove_item(&mut view.checklist, id))
            }
            Section::Dependencies => {
                let Some(id) = view.dependencies.get(cursor).map(|d| d.id) else {
                    return;
                };
                self.client
                    .delete_dependency(task_id, id)
                    .map(|()| state::remove_dependency(&mut view.dependencies, id))
            }
        };
        match result {
            Ok(()) => {
                view.clamp_cursor();
                match view.section {
                    Section::Checklist => self.sync_completion(view),
                    Section::Dependencies => self.refresh_dependency_lists(view),
                    Section::Comments => {}
                }
            }
            Err(e) => self.report(e),
        }
    }

    fn advance_status(&mut self, view: &mut DetailView) {
        let mut draft = TaskDraft::from_task(&view.task);
        draft.status = view.task.status.cycle();
        let input = match draft.validate(self.current_user_id()) {
            Ok(input) => input,
            Err(e) => {
                self.status_message = Some(e.to_string());
                return;
            }
        };
        match self.client.update_task(view.task.id, &input) {
            Ok(task) => {
                self.status_message = Some(format!("Status: {}", task.status));
                self.tasks.patch(task.clone());
                view.task = task;
            }
            Err(e) => self.report(e),
        }
    }

    /// Keep the task's completion percentage in step with the local checklist.
    fn sync_completion(&mut self, view: &mut DetailView) {
        view.task.checklist_completion = checklist::completion(&view.checklist);
        self.tasks.patch(view.task.clone());
    }

    fn refresh_dependency_lists(&mut self, view: &mut DetailView) {
        let task_id = view.task.id;
        let lists = self.client.list_blockers(task_id).and_then(|blockers| {
            self.client
                .list_blocked(task_id)
                .map(|blocked| (blockers, blocked))
        });
        match lists {
            Ok((blockers, blocked)) => {
                view.blockers = blockers;
                view.blocked = blocked;
            }
            Err(e) => self.report(e),
        }
    }

    // -- Rendering --

    pub fn render(&self, frame: &mut Frame) {
        let area = frame.area();

        match &self.mode {
            Mode::Login { form } => return self.render_auth(frame, form, false, area),
            Mode::Register { form } => return self.render_auth(frame, form, true, area),
            _ => {}
        }

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(0),
                Constraint::Length(1),
            ])
            .split(area);

        self.render_title_bar(frame, layout[0]);
        self.tasks.render(frame, layout[1], "Tasks");
        self.render_status_bar(frame, layout[2]);

        // Overlays
        match &self.mode {
            Mode::Login { .. } | Mode::Register { .. } | Mode::Normal => {}
            Mode::FilterInput { kind, input } => {
                let label = match kind {
                    FilterKind::Search => "Search: ",
                    FilterKind::Tag => "Tag: ",
                };
                self.render_input_bar(frame, label, input, area)
            }
            Mode::TaskForm { form } => self.render_task_form(frame, form, area),
            Mode::ConfirmDelete { task, .. } => {
                self.render_confirm_delete_dialog(frame, task, area)
            }
            Mode::Detail { view } => self.render_detail(frame, view, area),
        }
    }

    fn render_title_bar(&self, frame: &mut Frame, area: Rect) {
        let mut spans = vec![Span::styled(
            " taski ",
            Style::default().bold().fg(Color::Cyan),
        )];
        if let Some(user) = self.client.cached_user() {
            spans.push(Span::raw("| "));
            spans.push(Span::styled(user.username, Style::default().fg(Color::Yellow)));
        }
        let mut filters = Vec::new();
        if let Some(s) = self.filter.status {
            filters.push(format!("status={}", s.display_name()));
        }
        if let Some(p) = self.filter.priority {
            filters.push(format!("priority={}", p.display_name()));
        }
        if let Some(q) = self.filter.search.as_deref() {
            filters.push(format!("search=\"{q}\""));
        }
        if let Some(t) = self.filter.tag.as_deref() {
            filters.push(format!("tag={t}"));
        }
        if !filters.is_empty() {
            spans.push(Span::raw(" | "));
            spans.push(Span::styled(
                filters.join(" "),
                Style::default().fg(Color::Magenta),
            ));
        }
        frame.render_widget(Line::from(spans), area);
    }

    fn render_status_bar(&self, frame: &mut Frame, area: Rect) {
        if let Some(ref msg) = self.status_message {
            let line = Line::from(Span::styled(
                format!(" {msg}"),
                Style::default().fg(Color::Green),
            ));
            frame.render_widget(line, area);
            return;
        }

        let hints = match &self.mode {
            Mode::Login { .. } | Mode::Register { .. } => vec![],
            Mode::Normal => vec![
                ("q", "quit"),
                ("j/k", "tasks"),
                ("n", "new"),
                ("Enter", "detail"),
                ("e", "edit"),
                ("d", "del"),
                ("s", "status"),
                ("p", "priority"),
                ("/", "search"),
                ("t", "tag"),
                ("c", "clear"),
                ("r", "reload"),
                ("L", "logout"),
            ],
            Mode::FilterInput { .. } => vec![("Enter", "apply"), ("Esc", "cancel")],
            Mode::TaskForm { .. } => vec![
                ("Tab", "next field"),
                ("←/→", "change"),
                ("Enter", "save"),
                ("Esc", "cancel"),
            ],
            Mode::ConfirmDelete { .. } => vec![("y", "confirm"), ("any", "cancel")],
            Mode::Detail { view } if view.reorder.is_some() => vec![
                ("j/k", "select"),
                ("J/K", "move"),
                ("Enter", "save order"),
                ("Esc", "cancel"),
            ],
            Mode::Detail { view } if view.is_typing() => {
                vec![("Enter", "save"), ("Esc", "cancel")]
            }
            Mode::Detail { .. } => vec![
                ("Tab", "section"),
                ("j/k", "nav"),
                ("a", "add"),
                ("Enter", "edit"),
                ("Space", "toggle"),
                ("x", "remove"),
                ("o", "reorder"),
                ("m", "status"),
                ("e", "edit task"),
                ("d", "del task"),
                ("Esc", "back"),
            ],
        };

        let spans: Vec<Span> = hints
            .into_iter()
            .flat_map(|(key, desc)| {
                vec![
                    Span::styled(
                        format!(" {key}"),
                        Style::default().fg(Color::Yellow).bold(),
                    ),
                    Span::raw(format!(" {desc} ")),
                ]
            })
            .collect();

        frame.render_widget(Line::from(spans), area);
    }

    fn render_auth(&self, frame: &mut Frame, form: &AuthForm, register: bool, area: Rect) {
        let popup = centered_rect(50, 50, area);
        frame.render_widget(Clear, popup);

        let title = if register { " Create account " } else { " Sign in " };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        let masked = "*".repeat(form.password.chars().count());
        let mut lines = vec![Line::from(Span::styled(
            format!("Server: {}", self.client.base_url()),
            Style::default().fg(Color::DarkGray),
        ))];
        lines.push(Line::raw(""));
        for field in AuthForm::fields(register) {
            let (label, value) = match field {
                AuthField::Username => ("Username", form.username.as_str()),
                AuthField::Email => ("Email", form.email.as_str()),
                AuthField::Password => ("Password", masked.as_str()),
            };
            let active = *field == form.field;
            let marker = if active { "> " } else { "  " };
            let style = if active {
                Style::default().fg(Color::Yellow).bold()
            } else {
                Style::default()
            };
            lines.push(Line::from(vec![
                Span::raw(marker),
                Span::styled(format!("{label:<10}"), style),
                Span::raw(value.to_string()),
            ]));
        }
        lines.push(Line::raw(""));
        if let Some(err) = &form.error {
            lines.push(Line::from(Span::styled(
                err.clone(),
                Style::default().fg(Color::Red),
            )));
            lines.push(Line::raw(""));
        }
        let switch = if register {
            "F2: back to sign in"
        } else {
            "F2: create an account"
        };
        lines.push(Line::from(Span::styled(
            format!("Tab: next field  Enter: submit  {switch}  Ctrl+C: quit"),
            Style::default().fg(Color::DarkGray),
        )));

        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup);
    }

    fn render_input_bar(&self, frame: &mut Frame, label: &str, input: &str, area: Rect) {
        let input_area = Rect {
            x: area.x,
            y: area.y + area.height.saturating_sub(3),
            width: area.width,
            height: 3.min(area.height),
        };
        frame.render_widget(Clear, input_area);
        let block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(label.to_string());
        let paragraph = Paragraph::new(input.to_string()).block(block);
        frame.render_widget(paragraph, input_area);
    }

    fn render_task_form(&self, frame: &mut Frame, form: &TaskForm, area: Rect) {
        let popup = centered_rect(70, 60, area);
        frame.render_widget(Clear, popup);

        let title = match form.task_id {
            Some(id) => format!(" Edit task #{id} "),
            None => " New task ".to_string(),
        };
        let block = Block::default()
            .title(title)
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));

        let mut lines: Vec<Line> = FormField::ALL
            .iter()
            .map(|field| {
                let active = *field == form.field;
                let marker = if active { "> " } else { "  " };
                let label_style = if active {
                    Style::default().fg(Color::Yellow).bold()
                } else {
                    Style::default().fg(Color::DarkGray)
                };
                Line::from(vec![
                    Span::raw(marker),
                    Span::styled(format!("{:<26}", field.label()), label_style),
                    Span::raw(form.value(*field)),
                ])
            })
            .collect();
        if let Some(err) = &form.error {
            lines.push(Line::raw(""));
            lines.push(Line::from(Span::styled(
                err.clone(),
                Style::default().fg(Color::Red),
            )));
        }

        let paragraph = Paragraph::new(lines)
            .block(block)
            .wrap(Wrap { trim: false });
        frame.render_widget(paragraph, popup);
    }

    fn render_confirm_delete_dialog(&self, frame: &mut Frame, task: &Task, area: Rect) {
        let popup = centered_rect(50, 20, area);
        frame.render_widget(Clear, popup);

        let block = Block::default()
            .title(" Confirm Delete ")
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Red));

        let text = format!("Delete \"{}\"?\n\n(y)es / (any key) cancel", task.title);
        let paragraph = Paragraph::new(text)
            .block(block)
            .wrap(Wrap { trim: false })
            .alignment(Alignment::Center);
        frame.render_widget(paragraph, popup);
    }

    fn render_detail(&self, frame: &mut Frame, view: &DetailView, area: Rect) {
        let popup = centered_rect(85, 85, area);
        frame.render_widget(Clear, popup);

        let task = &view.task;
        let block = Block::default()
            .title(format!(" #{} {} ", task.id, task.title))
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan));
        let inner = block.inner(popup);
        frame.render_widget(block, popup);

        if view.phase == DetailPhase::Loading {
            frame.render_widget(
                Paragraph::new("Loading…").alignment(Alignment::Center),
                inner,
            );
            return;
        }

        let input_height = if view.is_typing() { 3 } else { 0 };
        let rows = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(5),
                Constraint::Min(0),
                Constraint::Length(input_height),
            ])
            .split(inner);

        self.render_detail_header(frame, task, rows[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
                Constraint::Ratio(1, 3),
            ])
            .split(rows[1]);
        render_checklist(frame, view, columns[0]);
        render_comments(frame, view, columns[1]);
        render_dependencies(frame, view, columns[2]);

        if let Some(compose) = &view.compose {
            self.render_input_bar(frame, compose.label(), compose.text(), rows[2]);
        } else if view.editing != EditingTarget::None {
            let label = match view.editing {
                EditingTarget::Comment(_) => "Edit comment: ",
                _ => "Edit item: ",
            };
            self.render_input_bar(frame, label, &view.edit_buffer, rows[2]);
        }
    }

    fn render_detail_header(&self, frame: &mut Frame, task: &Task, area: Rect) {
        let now = Utc::now();
        let due_style = if task.is_overdue(now) {
            Style::default().fg(Color::Red).bold()
        } else {
            Style::default()
        };
        let owner = task
            .owner_details
            .as_ref()
            .map(|u| u.username.clone())
            .unwrap_or_else(|| format!("user #{}", task.owner));
        let mut meta = vec![
            Span::styled(task.status.display_name(), status_color(task.status)),
            Span::raw("  "),
            Span::styled(
                format!("{} priority", task.priority.display_name()),
                priority_color(task.priority),
            ),
            Span::raw("  due "),
            Span::styled(task.due_date.format("%Y-%m-%d %H:%M").to_string(), due_style),
        ];
        if let Some(hours) = task.duration {
            meta.push(Span::raw(format!("  {hours}h")));
        }
        if let Some(pct) = task.checklist_completion {
            meta.push(Span::styled(
                format!("  {pct:.0}% done"),
                Style::default().fg(Color::Green),
            ));
        }
        let tags = task.tag_list();
        let lines = vec![
            Line::from(meta),
            Line::from(vec![
                Span::styled("Owner: ", Style::default().fg(Color::DarkGray)),
                Span::raw(owner),
                Span::styled("  Assignee: ", Style::default().fg(Color::DarkGray)),
                Span::raw(task.assignee_name()),
                Span::styled("  Tags: ", Style::default().fg(Color::DarkGray)),
                Span::styled(
                    if tags.is_empty() { "-".to_string() } else { tags.join(", ") },
                    Style::default().fg(Color::Blue),
                ),
            ]),
            Line::raw(""),
            Line::raw(if task.description.is_empty() {
                "(no description)".to_string()
            } else {
                task.description.clone()
            }),
        ];
        frame.render_widget(Paragraph::new(lines).wrap(Wrap { trim: true }), area);
    }
}

fn auth_mode(form: AuthForm, register: bool) -> Mode {
    if register {
        Mode::Register { form }
    } else {
        Mode::Login { form }
    }
}

/// `12`, `#12` or `#12 waiting on design` → dependency on task 12.
fn parse_dependency(text: &str) -> Option<CreateDependency> {
    let mut parts = text.trim().splitn(2, char::is_whitespace);
    let id = parts.next()?.trim_start_matches('#').parse::<i64>().ok()?;
    let notes = parts.next().unwrap_or("").trim().to_string();
    Some(CreateDependency {
        depends_on: id,
        notes,
        active: true,
    })
}

fn section_block(title: String, focused: bool) -> Block<'static> {
    let border = if focused {
        Style::default().fg(Color::Cyan)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(border)
}

fn highlight() -> Style {
    Style::default().fg(Color::Black).bg(Color::Cyan).bold()
}

fn render_checklist(frame: &mut Frame, view: &DetailView, area: Rect) {
    let focused = view.section == Section::Checklist;
    let (items, cursor, title) = match &view.reorder {
        Some(reorder) => (
            reorder.working(),
            reorder.cursor(),
            " Checklist (reordering) ".to_string(),
        ),
        None => (
            view.checklist.as_slice(),
            view.cursor,
            format!(" Checklist ({}) ", view.checklist.len()),
        ),
    };
    let rows: Vec<ListItem> = items
        .iter()
        .map(|item| {
            let (mark, style) = if item.is_completed {
                ("[x] ", Style::default().fg(Color::DarkGray).crossed_out())
            } else {
                ("[ ] ", Style::default())
            };
            let text = if view.editing == EditingTarget::ChecklistItem(item.id) {
                format!("{} ✎", item.text)
            } else {
                item.text.clone()
            };
            ListItem::new(Line::from(vec![Span::raw(mark), Span::styled(text, style)]))
        })
        .collect();
    let mut state = ListState::default();
    if focused && !items.is_empty() {
        state.select(Some(cursor));
    }
    let list = List::new(rows)
        .block(section_block(title, focused))
        .highlight_style(highlight());
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_comments(frame: &mut Frame, view: &DetailView, area: Rect) {
    let focused = view.section == Section::Comments;
    let rows: Vec<ListItem> = view
        .comments
        .iter()
        .map(|c| {
            let mut header = vec![
                Span::styled(c.author_name(), Style::default().fg(Color::Yellow)),
                Span::styled(
                    format!(" {}", c.created_at.format("%Y-%m-%d %H:%M")),
                    Style::default().fg(Color::DarkGray),
                ),
            ];
            if c.is_edited() {
                header.push(Span::styled(" (edited)", Style::default().fg(Color::DarkGray)));
            }
            if view.editing == EditingTarget::Comment(c.id) {
                header.push(Span::raw(" ✎"));
            }
            ListItem::new(vec![Line::from(header), Line::raw(c.content.clone())])
        })
        .collect();
    let mut state = ListState::default();
    if focused && !view.comments.is_empty() {
        state.select(Some(view.cursor));
    }
    let list = List::new(rows)
        .block(section_block(
            format!(" Comments ({}) ", view.comments.len()),
            focused,
        ))
        .highlight_style(highlight());
    frame.render_stateful_widget(list, area, &mut state);
}

fn render_dependencies(frame: &mut Frame, view: &DetailView, area: Rect) {
    let focused = view.section == Section::Dependencies;
    let parts = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(3), Constraint::Length(6)])
        .split(area);

    let rows: Vec<ListItem> = view
        .dependencies
        .iter()
        .map(|d| {
            let (dot, style) = if d.is_blocking() {
                ("● ", Style::default().fg(Color::Red))
            } else if d.active {
                ("● ", Style::default().fg(Color::Green))
            } else {
                ("○ ", Style::default().fg(Color::DarkGray))
            };
            let mut lines = vec![Line::from(vec![
                Span::styled(dot, style),
                Span::raw(d.target_label()),
            ])];
            if !d.notes.is_empty() {
                lines.push(Line::from(Span::styled(
                    format!("  {}", d.notes),
                    Style::default().fg(Color::DarkGray),
                )));
            }
            ListItem::new(lines)
        })
        .collect();
    let mut state = ListState::default();
    if focused && !view.dependencies.is_empty() {
        state.select(Some(view.cursor));
    }
    let list = List::new(rows)
        .block(section_block(
            format!(" Depends on ({}) ", view.dependencies.len()),
            focused,
        ))
        .highlight_style(highlight());
    frame.render_stateful_widget(list, parts[0], &mut state);

    let names = |tasks: &[Task]| {
        if tasks.is_empty() {
            "-".to_string()
        } else {
            tasks
                .iter()
                .map(|t| format!("#{} {}", t.id, t.title))
                .collect::<Vec<_>>()
                .join(", ")
        }
    };
    let summary = vec![
        Line::from(vec![
            Span::styled("Blocked by: ", Style::default().fg(Color::Red)),
            Span::raw(names(&view.blockers)),
        ]),
        Line::from(vec![
            Span::styled("Blocking: ", Style::default().fg(Color::Yellow)),
            Span::raw(names(&view.blocked)),
        ]),
    ];
    frame.render_widget(
        Paragraph::new(summary)
            .block(section_block(" Blockers ".to_string(), false))
            .wrap(Wrap { trim: true }),
        parts[1],
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_dependency_variants() {
        let dep = parse_dependency("12").unwrap();
        assert_eq!(dep.depends_on, 12);
        assert!(dep.notes.is_empty());

        let dep = parse_dependency("#7 waiting on design").unwrap();
        assert_eq!(dep.depends_on, 7);
        assert_eq!(dep.notes, "waiting on design");

        assert!(parse_dependency("soon").is_none());
    }

    #[test]
    fn form_field_cycle_wraps() {
        assert_eq!(FormField::Duration.next(), FormField::Title);
        assert_eq!(FormField::Title.prev(), FormField::Duration);
    }

    #[test]
    fn auth_fields_skip_email_on_login() {
        let mut form = AuthForm::default();
        form.step(false, true);
        assert_eq!(form.field, AuthField::Password);
        form.step(false, true);
        assert_eq!(form.field, AuthField::Username);
        form.step(true, true);
        assert_eq!(form.field, AuthField::Email);
    }

    #[test]
    fn choice_cycles_backwards() {
        let mut form = TaskForm::new_task();
        form.field = FormField::Priority;
        form.cycle_choice(true);
        assert_eq!(form.draft.priority, Priority::Low);
        form.cycle_choice(false);
        assert_eq!(form.draft.priority, Priority::Medium);
    }
}
