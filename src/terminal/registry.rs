use std::collections::HashSet;
use std::path::PathBuf;

use thiserror::Error;

use super::manager::{CreateTerminalRequest, TerminalBackend, TerminalError};
use crate::models::{BackendId, DefaultTerminal, SessionId, TerminalSession, WorktreeId};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("Terminal session not found: {0}")]
    NotFound(SessionId),

    #[error("No active terminal in worktree {0}")]
    NoActiveTerminal(WorktreeId),

    #[error("Terminal {0} has not been started")]
    NotStarted(SessionId),

    #[error(transparent)]
    Terminal(#[from] TerminalError),
}

/// Named terminal sessions per worktree, with one active session each.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Vec<TerminalSession>,
    provisioned: HashSet<WorktreeId>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all(&self) -> &[TerminalSession] {
        &self.sessions
    }

    /// Append a session and make it the worktree's active one.
    /// A missing name becomes the next free `Terminal N`.
    pub fn create(
        &mut self,
        worktree_id: &str,
        name: Option<&str>,
        working_directory: PathBuf,
        auto_command: Option<String>,
    ) -> &TerminalSession {
        let name = match name.map(str::trim).filter(|n| !n.is_empty()) {
            Some(n) => n.to_string(),
            None => self.unique_name(worktree_id),
        };
        let id = uuid::Uuid::new_v4().to_string();
        let session = TerminalSession::new(
            id.clone(),
            worktree_id.to_string(),
            name,
            working_directory,
            auto_command,
        );
        self.sessions.push(session);
        self.activate(worktree_id, Some(&id));
        tracing::debug!("Created session {} in worktree {}", id, worktree_id);

        let idx = self.sessions.len() - 1;
        &self.sessions[idx]
    }

    /// Remove a session. Unknown ids are ignored.
    pub fn close(&mut self, session_id: &str) -> Option<TerminalSession> {
        let idx = self.sessions.iter().position(|s| s.id == session_id)?;
        let removed = self.sessions.remove(idx);

        if removed.is_active {
            let next = self
                .sessions
                .iter()
                .find(|s| s.worktree_id == removed.worktree_id)
                .map(|s| s.id.clone());
            self.activate(&removed.worktree_id, next.as_deref());
        }
        Some(removed)
    }

    pub fn rename(&mut self, session_id: &str, name: &str) -> Result<(), RegistryError> {
        let session = self.get_mut(session_id)?;
        session.name = name.trim().to_string();
        session.touch();
        Ok(())
    }

    pub fn set_active(
        &mut self,
        worktree_id: &str,
        session_id: Option<&str>,
    ) -> Result<(), RegistryError> {
        if let Some(id) = session_id {
            if !self
                .sessions
                .iter()
                .any(|s| s.id == id && s.worktree_id == worktree_id)
            {
                return Err(RegistryError::NotFound(id.to_string()));
            }
        }
        self.activate(worktree_id, session_id);
        Ok(())
    }

    fn activate(&mut self, worktree_id: &str, session_id: Option<&str>) {
        for session in self
            .sessions
            .iter_mut()
            .filter(|s| s.worktree_id == worktree_id)
        {
            let active = Some(session.id.as_str()) == session_id;
            if active {
                session.touch();
            }
            session.is_active = active;
        }
    }

    pub fn set_backend_id(&mut self, session_id: &str, backend_id: BackendId) -> Result<(), RegistryError> {
        let session = self.get_mut(session_id)?;
        session.backend_id = Some(backend_id);
        session.exited = false;
        Ok(())
    }

    pub fn clear_backend_id(&mut self, session_id: &str) -> Result<(), RegistryError> {
        self.get_mut(session_id)?.backend_id = None;
        Ok(())
    }

    /// Flag the session behind `backend_id` as ended. Returns its id.
    pub fn mark_exited(&mut self, backend_id: &str) -> Option<SessionId> {
        let session = self
            .sessions
            .iter_mut()
            .find(|s| s.backend_id.as_deref() == Some(backend_id))?;
        session.exited = true;
        Some(session.id.clone())
    }

    pub fn sessions_for(&self, worktree_id: &str) -> Vec<&TerminalSession> {
        self.sessions
            .iter()
            .filter(|s| s.worktree_id == worktree_id)
            .collect()
    }

    pub fn active_for(&self, worktree_id: &str) -> Option<&TerminalSession> {
        self.sessions
            .iter()
            .find(|s| s.worktree_id == worktree_id && s.is_active)
    }

    pub fn get(&self, session_id: &str) -> Option<&TerminalSession> {
        self.sessions.iter().find(|s| s.id == session_id)
    }

    fn get_mut(&mut self, session_id: &str) -> Result<&mut TerminalSession, RegistryError> {
        self.sessions
            .iter_mut()
            .find(|s| s.id == session_id)
            .ok_or_else(|| RegistryError::NotFound(session_id.to_string()))
    }

    pub fn find_by_backend(&self, backend_id: &str) -> Option<&TerminalSession> {
        self.sessions
            .iter()
            .find(|s| s.backend_id.as_deref() == Some(backend_id))
    }

    /// Drop every session. Returns them so their backends can be closed.
    pub fn clear_all(&mut self) -> Vec<TerminalSession> {
        self.provisioned.clear();
        std::mem::take(&mut self.sessions)
    }

    fn cycle(&mut self, worktree_id: &str, forward: bool) -> Option<SessionId> {
        let ids: Vec<SessionId> = self
            .sessions_for(worktree_id)
            .iter()
            .map(|s| s.id.clone())
            .collect();
        if ids.is_empty() {
            return None;
        }
        let current = ids
            .iter()
            .position(|id| self.active_for(worktree_id).map(|s| &s.id) == Some(id));
        let next = match (current, forward) {
            (Some(i), true) => (i + 1) % ids.len(),
            (Some(i), false) => (i + ids.len() - 1) % ids.len(),
            (None, true) => 0,
            (None, false) => ids.len() - 1,
        };
        self.activate(worktree_id, Some(&ids[next]));
        Some(ids[next].clone())
    }

    pub fn next_in_worktree(&mut self, worktree_id: &str) -> Option<SessionId> {
        self.cycle(worktree_id, true)
    }

    pub fn previous_in_worktree(&mut self, worktree_id: &str) -> Option<SessionId> {
        self.cycle(worktree_id, false)
    }

    /// `Terminal N` with N one past the session count, bumped until unused.
    pub fn unique_name(&self, worktree_id: &str) -> String {
        let sessions = self.sessions_for(worktree_id);
        let names: HashSet<&str> = sessions.iter().map(|s| s.name.as_str()).collect();
        let mut n = sessions.len() + 1;
        loop {
            let candidate = format!("Terminal {}", n);
            if !names.contains(candidate.as_str()) {
                return candidate;
            }
            n += 1;
        }
    }

    /// The session keyboard input should go to.
    pub fn focus_target(&self, worktree_id: &str) -> Result<&TerminalSession, RegistryError> {
        let session = self
            .active_for(worktree_id)
            .ok_or_else(|| RegistryError::NoActiveTerminal(worktree_id.to_string()))?;
        if session.backend_id.is_none() {
            return Err(RegistryError::NotStarted(session.id.clone()));
        }
        Ok(session)
    }

    /// Spawn a backend terminal for a session that has none.
    pub async fn start<B>(
        &mut self,
        session_id: &str,
        backend: &mut B,
        rows: u16,
        cols: u16,
    ) -> Result<BackendId, RegistryError>
    where
        B: TerminalBackend + ?Sized,
    {
        let session = self
            .get(session_id)
            .ok_or_else(|| RegistryError::NotFound(session_id.to_string()))?;
        if let Some(id) = &session.backend_id {
            if !session.exited {
                return Ok(id.clone());
            }
        }
        let request = CreateTerminalRequest {
            worktree_id: session.worktree_id.clone(),
            name: session.name.clone(),
            working_directory: session.working_directory.clone(),
            auto_command: session.auto_command.clone(),
            rows,
            cols,
        };
        let backend_id = backend.spawn(request).await?;
        self.set_backend_id(session_id, backend_id.clone())?;
        Ok(backend_id)
    }

    pub fn is_provisioned(&self, worktree_id: &str) -> bool {
        self.provisioned.contains(worktree_id)
    }

    /// Create and start a session per enabled template, once per worktree.
    /// Returns the number of sessions started.
    pub async fn provision_defaults<B>(
        &mut self,
        worktree_id: &str,
        working_directory: PathBuf,
        templates: &[DefaultTerminal],
        backend: &mut B,
        rows: u16,
        cols: u16,
    ) -> usize
    where
        B: TerminalBackend + ?Sized,
    {
        if !self.provisioned.insert(worktree_id.to_string()) {
            tracing::trace!("provision_defaults: skipped (already provisioned)");
            return 0;
        }
        if !self.sessions_for(worktree_id).is_empty() {
            tracing::trace!("provision_defaults: skipped (worktree has sessions)");
            return 0;
        }

        let mut started: Vec<SessionId> = Vec::new();
        for template in templates.iter().filter(|t| t.enabled) {
            if self
                .sessions_for(worktree_id)
                .iter()
                .any(|s| s.name == template.name)
            {
                continue;
            }
            let session_id = self
                .create(
                    worktree_id,
                    Some(&template.name),
                    working_directory.clone(),
                    template.auto_command(),
                )
                .id
                .clone();

            match self.start(&session_id, backend, rows, cols).await {
                Ok(_) => started.push(session_id),
                Err(e) => {
                    tracing::warn!("Failed to start default terminal {}: {}", template.name, e);
                    self.close(&session_id);
                }
            }
        }

        if let Some(first) = started.first() {
            self.activate(worktree_id, Some(first));
        }
        tracing::info!(
            "Provisioned {} default terminals for worktree {}",
            started.len(),
            worktree_id
        );
        started.len()
    }
}
