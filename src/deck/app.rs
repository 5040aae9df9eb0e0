use anyhow::Result;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use ratatui::backend::Backend;
use ratatui::Terminal;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::sync::mpsc;

use crate::config::Config;
use crate::git::{self, WorktreeManager};
use crate::keymap::{Action, Dispatch, DispatchContext, FocusArea, ShortcutDispatcher};
use crate::models::{BackendId, ProjectKind, Worktree, WorktreeId};
use crate::navigation;
use crate::store::{ProjectState, ProjectStore};
use crate::terminal::{RegistryError, SessionRegistry, TerminalExit, TerminalManager};

use super::ui::UI;
use super::widgets::{
    sidebar_rows, ChangesPanel, HelpModal, Prompt, PromptKind, Sidebar, SidebarRow, TerminalView,
};

const INPUT_PAUSE_DURATION: Duration = Duration::from_millis(500);
const SCROLL_PAGE: u16 = 10;

/// One tab in the strip above the terminal pane.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionTab {
    pub name: String,
    pub active: bool,
    pub exited: bool,
}

pub struct DeckApp {
    config: Config,
    store: ProjectStore,
    projects: ProjectState,
    registry: SessionRegistry,
    terminals: TerminalManager,
    exit_events: Option<mpsc::UnboundedReceiver<TerminalExit>>,
    attached: Option<(BackendId, broadcast::Receiver<Vec<u8>>)>,

    sidebar: Sidebar,
    terminal_view: TerminalView,
    changes_panel: ChangesPanel,
    help_modal: HelpModal,
    prompt: Option<Prompt>,

    focus: FocusArea,
    running: bool,
    message: Option<String>,
    last_status_poll: Option<Instant>,
    last_input_time: Instant,
    pty_size: (u16, u16),
}

impl DeckApp {
    pub fn new(
        config: Config,
        store: ProjectStore,
        projects: ProjectState,
        mut terminals: TerminalManager,
    ) -> Self {
        let exit_events = terminals.take_exit_events();
        let settings = &config.settings;

        Self {
            store,
            projects,
            registry: SessionRegistry::new(),
            exit_events,
            attached: None,

            sidebar: Sidebar::new(),
            terminal_view: TerminalView::new(settings.scrollback_bytes),
            changes_panel: ChangesPanel::new(settings.show_changes_panel),
            help_modal: HelpModal::new(),
            prompt: None,

            focus: FocusArea::Sidebar,
            running: true,
            message: None,
            last_status_poll: None,
            last_input_time: Instant::now(),
            pty_size: (settings.initial_rows, settings.initial_cols),

            terminals,
            config,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn quit(&mut self) {
        self.running = false;
    }

    pub fn set_message(&mut self, msg: String) {
        self.message = Some(msg);
    }

    pub fn clear_message(&mut self) {
        self.message = None;
    }

    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    pub fn focus(&self) -> FocusArea {
        self.focus
    }

    pub fn set_focus(&mut self, focus: FocusArea) {
        self.focus = focus;
        self.sidebar.set_focused(focus == FocusArea::Sidebar);
        self.terminal_view.set_focused(focus == FocusArea::Terminal);
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn projects(&self) -> &ProjectState {
        &self.projects
    }

    pub fn sidebar(&mut self) -> &mut Sidebar {
        &mut self.sidebar
    }

    pub fn terminal_view(&mut self) -> &mut TerminalView {
        &mut self.terminal_view
    }

    pub fn changes_panel(&self) -> &ChangesPanel {
        &self.changes_panel
    }

    pub fn help_modal(&self) -> &HelpModal {
        &self.help_modal
    }

    pub fn prompt(&self) -> Option<&Prompt> {
        self.prompt.as_ref()
    }

    pub fn terminal_count(&self) -> usize {
        self.terminals.count()
    }

    pub fn sidebar_rows(&self) -> Vec<SidebarRow> {
        sidebar_rows(&self.projects, |wt| self.registry.sessions_for(wt).len())
    }

    pub fn session_tabs(&self) -> Vec<SessionTab> {
        let Some(wt) = self.projects.selected_worktree_id.as_deref() else {
            return Vec::new();
        };
        self.registry
            .sessions_for(wt)
            .iter()
            .map(|s| SessionTab {
                name: s.name.clone(),
                active: s.is_active,
                exited: s.exited,
            })
            .collect()
    }

    fn selected_worktree(&self) -> Option<Worktree> {
        self.projects.selected_worktree().cloned()
    }

    async fn save_projects(&self) {
        if let Err(e) = self.store.save(&self.projects).await {
            tracing::warn!("Failed to save projects: {}", e);
        }
    }

    /// Provision, attach and optionally focus the worktree that just became
    /// selected.
    async fn on_worktree_selected(&mut self, worktree_id: Option<WorktreeId>) {
        tracing::debug!("Worktree selected: {:?}", worktree_id);
        self.changes_panel.clear();
        self.last_status_poll = None;

        if let (Some(worktree), Some(project)) =
            (self.selected_worktree(), self.projects.selected_project())
        {
            if self.registry.is_provisioned(&worktree.id) {
                self.attach_active();
                self.after_selection().await;
                return;
            }
            let templates = self
                .projects
                .terminal_templates(&project.id, &self.config.default_terminals);
            let (rows, cols) = self.pty_size;
            self.registry
                .provision_defaults(
                    &worktree.id,
                    worktree.path.clone(),
                    &templates,
                    &mut self.terminals,
                    rows,
                    cols,
                )
                .await;
        }

        self.attach_active();
        self.after_selection().await;
    }

    async fn after_selection(&mut self) {
        if self.config.settings.auto_focus_terminal_on_navigation {
            let focusable = self
                .projects
                .selected_worktree_id
                .as_deref()
                .map(|wt| self.registry.focus_target(wt).map(|_| ()));
            match focusable {
                Some(Ok(_)) => self.set_focus(FocusArea::Terminal),
                Some(Err(e)) => tracing::debug!("Not focusing terminal: {}", e),
                None => {}
            }
        }
        self.save_projects().await;
    }

    /// Point the terminal pane at the selected worktree's active session.
    fn attach_active(&mut self) {
        let active = self
            .projects
            .selected_worktree_id
            .as_deref()
            .and_then(|wt| self.registry.active_for(wt))
            .cloned();

        let Some(session) = active else {
            self.terminal_view.set_session(None, "");
            self.attached = None;
            return;
        };

        self.terminal_view.set_session(Some(&session.id), &session.name);
        self.terminal_view.set_exited(session.exited);

        let Some(backend_id) = session.backend_id else {
            self.attached = None;
            return;
        };
        if self.attached.as_ref().map(|(id, _)| id) == Some(&backend_id) {
            return;
        }

        match self.terminals.attach(&backend_id) {
            Ok(attachment) => {
                if let Some(info) = self.terminals.info(&backend_id) {
                    tracing::debug!(
                        "Attached to terminal {} ({}, pid {:?})",
                        info.id,
                        info.name,
                        info.pid
                    );
                }
                self.terminal_view.clear();
                self.terminal_view.set_exited(session.exited);
                self.terminal_view.push_bytes(&attachment.replay);
                let (rows, cols) = self.pty_size;
                if let Err(e) = self.terminals.resize(&backend_id, rows, cols) {
                    tracing::debug!("Failed to resize terminal {}: {}", backend_id, e);
                }
                self.attached = Some((backend_id, attachment.rx));
            }
            Err(e) => {
                tracing::debug!("Terminal {} not attachable: {}", backend_id, e);
                self.attached = None;
            }
        }
    }

    pub async fn apply_action(&mut self, action: Action) -> Result<()> {
        tracing::debug!("apply_action: {}", action);
        match action {
            Action::NextWorktree => {
                if let Some(wt) = navigation::next_worktree(&mut self.projects) {
                    self.on_worktree_selected(Some(wt)).await;
                }
            }
            Action::PreviousWorktree => {
                if let Some(wt) = navigation::previous_worktree(&mut self.projects) {
                    self.on_worktree_selected(Some(wt)).await;
                }
            }
            Action::NextProject => {
                if !self.projects.projects.is_empty() {
                    let wt = navigation::next_project(&mut self.projects);
                    self.on_worktree_selected(wt).await;
                }
            }
            Action::PreviousProject => {
                if !self.projects.projects.is_empty() {
                    let wt = navigation::previous_project(&mut self.projects);
                    self.on_worktree_selected(wt).await;
                }
            }
            Action::WorktreeByNumber(n) => {
                if let Some(wt) = navigation::worktree_by_number(&mut self.projects, n as usize) {
                    self.on_worktree_selected(Some(wt)).await;
                }
            }
            Action::ShowHelp => self.help_modal.show(),
            Action::NewTerminal => self.new_terminal().await,
            Action::CloseTerminal => self.close_terminal(),
            Action::NextTerminal | Action::PreviousTerminal => {
                if let Some(wt) = self.projects.selected_worktree_id.clone() {
                    if action == Action::NextTerminal {
                        self.registry.next_in_worktree(&wt);
                    } else {
                        self.registry.previous_in_worktree(&wt);
                    }
                    self.attach_active();
                }
            }
            Action::ToggleChanges => {
                if self.changes_panel.toggle() {
                    self.refresh_status().await;
                }
            }
            Action::ToggleFocus => self.set_focus(self.focus.toggle()),
            Action::Quit => self.quit(),
        }
        Ok(())
    }

    async fn new_terminal(&mut self) {
        let Some(worktree) = self.selected_worktree() else {
            self.set_message("Select a worktree first".to_string());
            return;
        };
        let session_id = self
            .registry
            .create(&worktree.id, None, worktree.path.clone(), None)
            .id
            .clone();

        let (rows, cols) = self.pty_size;
        match self
            .registry
            .start(&session_id, &mut self.terminals, rows, cols)
            .await
        {
            Ok(_) => {
                self.attach_active();
                self.set_focus(FocusArea::Terminal);
            }
            Err(e) => {
                self.registry.close(&session_id);
                self.attach_active();
                self.set_message(format!("Error: {}", e));
            }
        }
    }

    fn close_terminal(&mut self) {
        let Some(wt) = self.projects.selected_worktree_id.clone() else {
            return;
        };
        let Some(session_id) = self.registry.active_for(&wt).map(|s| s.id.clone()) else {
            self.set_message("No terminal to close".to_string());
            return;
        };
        if let Some(removed) = self.registry.close(&session_id) {
            if let Some(backend_id) = removed.backend_id {
                if self.terminals.has(&backend_id) {
                    if let Err(e) = self.terminals.close(&backend_id) {
                        tracing::warn!("Failed to close terminal {}: {}", backend_id, e);
                    }
                }
            }
        }
        self.attach_active();
        if self.terminal_view.session_id().is_none() {
            self.set_focus(FocusArea::Sidebar);
        }
    }

    async fn forward_input(&mut self, bytes: Vec<u8>) {
        let Some(wt) = self.projects.selected_worktree_id.clone() else {
            return;
        };
        let (session_id, exited, backend_id) = match self.registry.focus_target(&wt) {
            Ok(s) => (s.id.clone(), s.exited, s.backend_id.clone()),
            Err(RegistryError::NoActiveTerminal(_)) => {
                self.set_message("No terminal open (Alt+T to open one)".to_string());
                return;
            }
            Err(RegistryError::NotStarted(session_id)) => {
                if bytes == b"\r" {
                    self.restart_session(&session_id).await;
                } else {
                    self.set_message("Terminal not started (Enter starts it)".to_string());
                }
                return;
            }
            Err(e) => {
                self.set_message(format!("Error: {}", e));
                return;
            }
        };

        if exited {
            if bytes == b"\r" {
                self.restart_session(&session_id).await;
            } else {
                self.set_message("Terminal exited (Enter restarts it)".to_string());
            }
            return;
        }

        if let Some(backend_id) = backend_id {
            if let Err(e) = self.terminals.send_input(&backend_id, &bytes) {
                tracing::warn!("Failed to write to terminal {}: {}", backend_id, e);
                self.set_message(format!("Error: {}", e));
            }
        }
    }

    async fn restart_session(&mut self, session_id: &str) {
        let (rows, cols) = self.pty_size;
        if let Err(e) = self
            .registry
            .start(session_id, &mut self.terminals, rows, cols)
            .await
        {
            tracing::warn!("Failed to start terminal for session {}: {}", session_id, e);
            if let Err(e) = self.registry.clear_backend_id(session_id) {
                tracing::debug!("Session {} vanished: {}", session_id, e);
            }
            self.set_message(format!("Error: {}", e));
        }
        self.attach_active();
    }

    /// Make the `number`-th (1-based) tab of the selected worktree active.
    fn select_tab(&mut self, number: usize) {
        let Some(wt) = self.projects.selected_worktree_id.clone() else {
            return;
        };
        let sessions = self.registry.sessions_for(&wt);
        let target = number
            .checked_sub(1)
            .and_then(|i| sessions.get(i))
            .map(|s| s.id.clone());
        if let Some(id) = target {
            if let Err(e) = self.registry.set_active(&wt, Some(&id)) {
                self.set_message(format!("Error: {}", e));
            }
            self.attach_active();
        }
    }

    async fn handle_sidebar_key(&mut self, key: KeyEvent) -> Result<()> {
        match key.code {
            KeyCode::Up | KeyCode::Char('k') => self.apply_action(Action::PreviousWorktree).await?,
            KeyCode::Down | KeyCode::Char('j') => self.apply_action(Action::NextWorktree).await?,
            KeyCode::Enter => {
                if self.terminal_view.session_id().is_some() {
                    self.set_focus(FocusArea::Terminal);
                }
            }
            KeyCode::PageUp => self.terminal_view.scroll_up(SCROLL_PAGE),
            KeyCode::PageDown => self.terminal_view.scroll_down(SCROLL_PAGE),
            KeyCode::End => self.terminal_view.scroll_to_bottom(),
            KeyCode::Char(c @ '1'..='9') => self.select_tab(c as usize - '0' as usize),
            KeyCode::Char('n') => {
                if self.projects.selected_project().is_some() {
                    self.prompt = Some(Prompt::new(PromptKind::CreateWorktree));
                } else {
                    self.set_message("Select a project first".to_string());
                }
            }
            KeyCode::Char('r') => {
                let active = self
                    .projects
                    .selected_worktree_id
                    .as_deref()
                    .and_then(|wt| self.registry.active_for(wt))
                    .map(|s| (s.id.clone(), s.name.clone()));
                match active {
                    Some((id, name)) => {
                        self.prompt =
                            Some(Prompt::with_content(PromptKind::RenameTerminal(id), &name));
                    }
                    None => self.set_message("No terminal to rename".to_string()),
                }
            }
            KeyCode::Char('c') => {
                if self.selected_worktree().is_some() {
                    self.prompt = Some(Prompt::new(PromptKind::Commit));
                } else {
                    self.set_message("Select a worktree first".to_string());
                }
            }
            KeyCode::Char('a') => {
                if let Some(worktree) = self.selected_worktree() {
                    match git::stage(&worktree.path, ".").await {
                        Ok(()) => self.set_message("Staged all changes".to_string()),
                        Err(e) => self.set_message(format!("Error: {}", e)),
                    }
                    self.refresh_status().await;
                }
            }
            _ => {}
        }
        Ok(())
    }

    async fn handle_prompt_key(&mut self, key: KeyEvent) -> Result<()> {
        let Some(prompt) = self.prompt.as_mut() else {
            return Ok(());
        };
        match key.code {
            KeyCode::Esc => self.prompt = None,
            KeyCode::Enter => self.submit_prompt().await?,
            KeyCode::Backspace => prompt.delete_char(),
            KeyCode::Delete => prompt.delete_forward(),
            KeyCode::Left => prompt.move_cursor_left(),
            KeyCode::Right => prompt.move_cursor_right(),
            KeyCode::Home => prompt.move_cursor_start(),
            KeyCode::End => prompt.move_cursor_end(),
            KeyCode::Char(c) if !key.modifiers.contains(KeyModifiers::CONTROL) => {
                prompt.insert_char(c)
            }
            _ => {}
        }
        Ok(())
    }

    async fn submit_prompt(&mut self) -> Result<()> {
        let Some(prompt) = self.prompt.take() else {
            return Ok(());
        };
        let value = prompt.content().trim().to_string();

        match prompt.kind().clone() {
            PromptKind::CreateWorktree => {
                if value.is_empty() {
                    self.set_message("Branch name cannot be empty".to_string());
                    return Ok(());
                }
                self.create_worktree(&value).await;
            }
            PromptKind::RenameTerminal(session_id) => {
                if value.is_empty() {
                    self.set_message("Terminal name cannot be empty".to_string());
                    return Ok(());
                }
                match self.registry.rename(&session_id, &value) {
                    Ok(()) => self.attach_active(),
                    Err(e) => self.set_message(format!("Error: {}", e)),
                }
            }
            PromptKind::Commit => {
                let Some(worktree) = self.selected_worktree() else {
                    return Ok(());
                };
                match git::commit(&worktree.path, &value).await {
                    Ok(()) => self.set_message("Committed".to_string()),
                    Err(e) => self.set_message(format!("Error: {}", e)),
                }
                self.refresh_status().await;
            }
        }
        Ok(())
    }

    async fn create_worktree(&mut self, branch: &str) {
        let Some(project) = self.projects.selected_project().cloned() else {
            return;
        };
        if project.kind == ProjectKind::Workspace {
            self.set_message("Error: worktrees need a repository project".to_string());
            return;
        }

        let existing = match git::available_branches(&project.path).await {
            Ok(branches) => branches,
            Err(e) => {
                tracing::warn!("Failed to list branches of {:?}: {}", project.path, e);
                Vec::new()
            }
        };
        let new_branch = !existing.iter().any(|b| b == branch);

        let manager = WorktreeManager::new(project.path.clone(), self.config.worktree_base.clone());
        match manager.create(branch, None, new_branch).await {
            Ok(worktree) => {
                let id = worktree.id.clone();
                if let Err(e) = self.projects.add_worktree(&project.id, worktree) {
                    self.set_message(format!("Error: {}", e));
                    return;
                }
                self.projects.select_worktree(Some(&id));
                self.on_worktree_selected(Some(id)).await;
                self.set_message(format!("Created worktree for {}", branch));
            }
            Err(e) => self.set_message(format!("Error: {}", e)),
        }
    }

    pub async fn handle_key(&mut self, key: KeyEvent) -> Result<()> {
        self.last_input_time = Instant::now();
        tracing::trace!("Key pressed: {:?}", key.code);

        let ctx = DispatchContext {
            focus: self.focus,
            prompt_open: self.prompt.is_some(),
            help_visible: self.help_modal.is_visible(),
        };
        let dispatch = ShortcutDispatcher::new(&self.config.shortcuts).dispatch(&key, ctx);

        if !matches!(dispatch, Dispatch::Forward(_)) {
            self.clear_message();
        }

        match dispatch {
            Dispatch::Prompt => self.handle_prompt_key(key).await?,
            Dispatch::CloseHelp => self.help_modal.hide(),
            Dispatch::Action(action) => self.apply_action(action).await?,
            Dispatch::Forward(bytes) => {
                self.terminal_view.scroll_to_bottom();
                self.forward_input(bytes).await;
            }
            Dispatch::Unhandled => self.handle_sidebar_key(key).await?,
            Dispatch::Ignored => {}
        }
        Ok(())
    }

    pub async fn handle_events(&mut self) -> Result<()> {
        if event::poll(Duration::from_millis(5))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => self.handle_key(key).await?,
                Event::Paste(text) if self.focus == FocusArea::Terminal => {
                    self.forward_input(text.into_bytes()).await;
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn poll_output(&mut self) {
        let mut lagged = false;
        if let Some((backend_id, rx)) = self.attached.as_mut() {
            loop {
                match rx.try_recv() {
                    Ok(chunk) => self.terminal_view.push_bytes(&chunk),
                    Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
                    Err(TryRecvError::Lagged(n)) => {
                        tracing::debug!("poll_output: {} lagged by {} chunks", backend_id, n);
                        lagged = true;
                        break;
                    }
                }
            }
        }
        if lagged {
            // replay the scrollback instead of showing a gap
            self.attached = None;
            self.attach_active();
        }
        self.terminal_view.refresh();
    }

    fn poll_exits(&mut self) {
        let Some(rx) = self.exit_events.as_mut() else {
            return;
        };
        let mut exited = Vec::new();
        while let Ok(event) = rx.try_recv() {
            exited.push(event.backend_id);
        }
        if exited.is_empty() {
            return;
        }

        for backend_id in exited {
            if let Some(name) = self.registry.find_by_backend(&backend_id).map(|s| s.name.clone()) {
                self.set_message(format!("{} exited", name));
            }
            if let Some(session_id) = self.registry.mark_exited(&backend_id) {
                tracing::info!("Terminal session {} exited", session_id);
                if self.terminal_view.session_id() == Some(session_id.as_str()) {
                    self.terminal_view.set_exited(true);
                }
            }
            if self.attached.as_ref().map(|(id, _)| id) == Some(&backend_id) {
                self.attached = None;
            }
        }
        self.terminals.cleanup_completed();
    }

    async fn refresh_status(&mut self) {
        self.last_status_poll = Some(Instant::now());
        let Some(worktree) = self.selected_worktree() else {
            self.changes_panel.clear();
            return;
        };
        match git::status(&worktree.path).await {
            Ok(status) => self.changes_panel.set_status(status),
            Err(e) => self.changes_panel.set_error(e.to_string()),
        }
    }

    async fn poll_status(&mut self) {
        if !self.changes_panel.is_visible() {
            return;
        }
        if self.last_input_time.elapsed() < INPUT_PAUSE_DURATION {
            tracing::trace!("poll_status: skipped (input debounce)");
            return;
        }
        let interval = Duration::from_secs(self.config.settings.status_poll_secs.max(1));
        if self
            .last_status_poll
            .is_some_and(|last| last.elapsed() < interval)
        {
            tracing::trace!("poll_status: skipped (interval)");
            return;
        }
        tracing::debug!("poll_status: executing refresh_status");
        self.refresh_status().await;
    }

    fn sync_pty_size(&mut self) {
        let (cols, rows) = self.terminal_view.last_render_size();
        if cols == 0 || rows == 0 || (rows, cols) == self.pty_size {
            return;
        }
        self.pty_size = (rows, cols);
        if let Some((backend_id, _)) = &self.attached {
            if let Err(e) = self.terminals.resize(backend_id, rows, cols) {
                tracing::debug!("Failed to resize terminal {}: {}", backend_id, e);
            }
        }
    }

    /// Restore the persisted selection, or fall back to the first project.
    pub async fn initialize(&mut self) {
        if self.projects.selected_project().is_none() {
            navigation::next_project(&mut self.projects);
        } else if self.projects.selected_worktree().is_none() {
            navigation::worktree_by_number(&mut self.projects, 1);
        }
        let selected = self.projects.selected_worktree().map(|w| w.id.clone());
        self.on_worktree_selected(selected).await;
        self.set_focus(self.focus);
    }

    async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        while self.is_running() {
            let loop_start = Instant::now();

            let draw_start = Instant::now();
            terminal.draw(|frame| UI::render(frame, self))?;
            let draw_elapsed = draw_start.elapsed();
            self.sync_pty_size();

            let events_start = Instant::now();
            self.handle_events().await?;
            let events_elapsed = events_start.elapsed();

            self.poll_output();
            self.poll_exits();

            let poll_status_start = Instant::now();
            self.poll_status().await;
            let poll_status_elapsed = poll_status_start.elapsed();

            let loop_elapsed = loop_start.elapsed();
            if loop_elapsed.as_millis() > 30 {
                tracing::debug!(
                    "Loop: {}ms (draw: {}ms, events: {}ms, poll_status: {}ms)",
                    loop_elapsed.as_millis(),
                    draw_elapsed.as_millis(),
                    events_elapsed.as_millis(),
                    poll_status_elapsed.as_millis()
                );
            }
        }
        Ok(())
    }

    pub async fn run(&mut self) -> Result<()> {
        let mut terminal = UI::setup_terminal()?;
        self.initialize().await;

        let result = self.event_loop(&mut terminal).await;

        UI::restore_terminal()?;
        self.shutdown().await;
        result
    }

    async fn shutdown(&mut self) {
        for session in self.registry.clear_all() {
            tracing::trace!("Dropping session {}", session.id);
        }
        for info in self.terminals.list() {
            tracing::debug!("Closing terminal {} in {:?}", info.id, info.working_directory);
        }
        self.terminals.close_all();
        self.save_projects().await;
    }

    pub fn worktree_path(&self) -> Option<PathBuf> {
        self.projects.selected_worktree().map(|w| w.path.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppSettings;
    use crate::models::{DefaultTerminal, Project, ProjectKind};
    use crate::terminal::EnvironmentInfo;
    use tempfile::TempDir;

    struct Fixture {
        _tmp: TempDir,
        app: DeckApp,
    }

    /// Two projects; the first with two worktrees. Templates are empty so
    /// navigation never spawns shells unless a test asks for one.
    fn fixture() -> Fixture {
        fixture_with(Vec::new(), true)
    }

    fn fixture_with(templates: Vec<DefaultTerminal>, auto_focus: bool) -> Fixture {
        let tmp = tempfile::tempdir().unwrap();
        let wt_a = tmp.path().join("alpha-main");
        let wt_b = tmp.path().join("alpha-feature");
        std::fs::create_dir_all(&wt_a).unwrap();
        std::fs::create_dir_all(&wt_b).unwrap();

        let mut alpha = Project::new(
            "p1".to_string(),
            "alpha".to_string(),
            wt_a.clone(),
            ProjectKind::Repository,
        );
        alpha.worktrees = vec![Worktree::new("main", wt_a), Worktree::new("feature", wt_b)];
        alpha.default_terminals = Some(templates);
        let mut beta = Project::new(
            "p2".to_string(),
            "beta".to_string(),
            tmp.path().join("beta"),
            ProjectKind::Repository,
        );
        beta.default_terminals = Some(Vec::new());

        let projects = ProjectState {
            projects: vec![alpha, beta],
            ..Default::default()
        };
        let mut config = Config::default()
            .with_data_dir(tmp.path().join("data"))
            .with_worktree_base(tmp.path().join("worktrees"));
        config.settings.auto_focus_terminal_on_navigation = auto_focus;
        let store = ProjectStore::new(config.projects_file());
        let terminals = TerminalManager::new(&AppSettings::default())
            .with_environment(EnvironmentInfo::from_process(Some("/bin/sh")));

        Fixture {
            _tmp: tmp,
            app: DeckApp::new(config, store, projects, terminals),
        }
    }

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn deck_app_starts_running() {
        let f = fixture();
        assert!(f.app.is_running());
        assert_eq!(f.app.focus(), FocusArea::Sidebar);
    }

    #[test]
    fn deck_app_message_management() {
        let mut f = fixture();
        f.app.set_message("hello".to_string());
        assert_eq!(f.app.message(), Some("hello"));
        f.app.clear_message();
        assert!(f.app.message().is_none());
    }

    #[tokio::test]
    async fn initialize_selects_first_project_and_worktree() {
        let mut f = fixture();
        f.app.initialize().await;
        assert_eq!(f.app.projects().selected_project_id.as_deref(), Some("p1"));
        assert_eq!(
            f.app.projects().selected_worktree().map(|w| w.branch.as_str()),
            Some("main")
        );
        assert!(
            f.app.config().projects_file().exists(),
            "initialize: selection should be persisted"
        );
    }

    #[tokio::test]
    async fn shortcut_keys_navigate_worktrees() {
        let mut f = fixture();
        f.app.initialize().await;

        f.app
            .handle_key(key(KeyCode::Right, KeyModifiers::CONTROL))
            .await
            .unwrap();
        assert_eq!(f.app.worktree_path().unwrap().file_name().unwrap(), "alpha-feature");

        f.app
            .handle_key(key(KeyCode::Char('1'), KeyModifiers::ALT))
            .await
            .unwrap();
        assert_eq!(f.app.worktree_path().unwrap().file_name().unwrap(), "alpha-main");
    }

    #[tokio::test]
    async fn project_navigation_without_worktrees_clears_selection() {
        let mut f = fixture();
        f.app.initialize().await;
        f.app.apply_action(Action::NextProject).await.unwrap();
        assert_eq!(f.app.projects().selected_project_id.as_deref(), Some("p2"));
        assert!(f.app.projects().selected_worktree_id.is_none());
        assert!(f.app.session_tabs().is_empty());
    }

    #[tokio::test]
    async fn help_opens_with_shortcut_and_closes_with_escape() {
        let mut f = fixture();
        f.app.handle_key(key(KeyCode::F(1), KeyModifiers::NONE)).await.unwrap();
        assert!(f.app.help_modal().is_visible());
        f.app.handle_key(key(KeyCode::Esc, KeyModifiers::NONE)).await.unwrap();
        assert!(!f.app.help_modal().is_visible());
    }

    #[tokio::test]
    async fn toggle_focus_and_quit() {
        let mut f = fixture();
        f.app.apply_action(Action::ToggleFocus).await.unwrap();
        assert_eq!(f.app.focus(), FocusArea::Terminal);
        f.app
            .handle_key(key(KeyCode::Char('q'), KeyModifiers::CONTROL))
            .await
            .unwrap();
        assert!(!f.app.is_running());
    }

    #[tokio::test]
    async fn prompt_blocks_shortcuts() {
        let mut f = fixture();
        f.app.initialize().await;
        f.app.handle_key(key(KeyCode::Char('c'), KeyModifiers::NONE)).await.unwrap();
        assert!(f.app.prompt().is_some());

        f.app
            .handle_key(key(KeyCode::Char('q'), KeyModifiers::CONTROL))
            .await
            .unwrap();
        assert!(f.app.is_running(), "handle_key: shortcuts should be blocked while a prompt is open");

        f.app.handle_key(key(KeyCode::Esc, KeyModifiers::NONE)).await.unwrap();
        assert!(f.app.prompt().is_none());
    }

    #[tokio::test]
    async fn empty_prompt_submission_is_rejected() {
        let mut f = fixture();
        f.app.initialize().await;
        f.app.handle_key(key(KeyCode::Char('n'), KeyModifiers::NONE)).await.unwrap();
        f.app.handle_key(key(KeyCode::Enter, KeyModifiers::NONE)).await.unwrap();
        assert!(f.app.prompt().is_none());
        assert_eq!(f.app.message(), Some("Branch name cannot be empty"));
    }

    #[tokio::test]
    async fn rename_without_terminal_reports_message() {
        let mut f = fixture();
        f.app.initialize().await;
        f.app.handle_key(key(KeyCode::Char('r'), KeyModifiers::NONE)).await.unwrap();
        assert!(f.app.prompt().is_none());
        assert_eq!(f.app.message(), Some("No terminal to rename"));
    }

    #[tokio::test]
    async fn new_terminal_opens_tab_and_focuses_it() {
        let mut f = fixture();
        f.app.initialize().await;
        f.app.apply_action(Action::NewTerminal).await.unwrap();

        let tabs = f.app.session_tabs();
        assert_eq!(tabs.len(), 1);
        assert_eq!(tabs[0].name, "Terminal 1");
        assert!(tabs[0].active);
        assert_eq!(f.app.focus(), FocusArea::Terminal);

        f.app.apply_action(Action::CloseTerminal).await.unwrap();
        assert!(f.app.session_tabs().is_empty());
        assert_eq!(f.app.focus(), FocusArea::Sidebar);
        f.app.shutdown().await;
    }

    #[tokio::test]
    async fn navigation_provisions_templates_and_focuses_terminal() {
        let mut f = fixture_with(vec![DefaultTerminal::new("t1", "shell", "")], true);
        f.app.initialize().await;
        f.app.set_focus(FocusArea::Sidebar);

        f.app.apply_action(Action::NextWorktree).await.unwrap();
        let tabs = f.app.session_tabs();
        assert_eq!(tabs.len(), 1, "on_worktree_selected: template should be provisioned");
        assert_eq!(tabs[0].name, "shell");
        assert!(tabs[0].active);
        assert_eq!(
            f.app.focus(),
            FocusArea::Terminal,
            "after_selection: started terminal should take focus"
        );
        f.app.shutdown().await;
    }

    #[tokio::test]
    async fn navigation_keeps_sidebar_focus_when_auto_focus_is_off() {
        let mut f = fixture_with(vec![DefaultTerminal::new("t1", "shell", "")], false);
        f.app.initialize().await;
        assert_eq!(f.app.focus(), FocusArea::Sidebar);

        f.app.apply_action(Action::NextWorktree).await.unwrap();
        assert_eq!(f.app.session_tabs().len(), 1);
        assert_eq!(
            f.app.focus(),
            FocusArea::Sidebar,
            "after_selection: focus should stay put with auto-focus off"
        );
        f.app.shutdown().await;
    }

    #[tokio::test]
    async fn navigation_to_worktree_without_terminals_keeps_sidebar_focus() {
        let mut f = fixture();
        f.app.initialize().await;
        f.app.apply_action(Action::NextWorktree).await.unwrap();
        assert!(f.app.session_tabs().is_empty());
        assert_eq!(
            f.app.focus(),
            FocusArea::Sidebar,
            "after_selection: no active terminal means nothing to focus"
        );
    }

    #[tokio::test]
    async fn new_terminal_without_worktree_reports_message() {
        let mut f = fixture();
        f.app.apply_action(Action::NewTerminal).await.unwrap();
        assert_eq!(f.app.message(), Some("Select a worktree first"));
    }

    #[tokio::test]
    async fn digit_in_sidebar_selects_terminal_tab() {
        let mut f = fixture();
        f.app.initialize().await;
        f.app.apply_action(Action::NewTerminal).await.unwrap();
        f.app.apply_action(Action::NewTerminal).await.unwrap();
        assert!(f.app.session_tabs()[1].active);

        f.app.set_focus(FocusArea::Sidebar);
        f.app.handle_key(key(KeyCode::Char('1'), KeyModifiers::NONE)).await.unwrap();
        let tabs = f.app.session_tabs();
        assert!(tabs[0].active, "select_tab: first tab should become active");
        assert!(!tabs[1].active);
        f.app.shutdown().await;
    }
}
