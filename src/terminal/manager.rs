use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use super::environment::EnvironmentInfo;
use super::output::{spawn_output_reader, ScrollbackBuffer, TerminalExit};
use super::pty::PtyProcess;
use crate::config::AppSettings;
use crate::models::{BackendId, WorktreeId};

const BROADCAST_CAPACITY: usize = 256;

#[derive(Debug, Error)]
pub enum TerminalError {
    #[error("Working directory does not exist: {0}")]
    DirectoryNotFound(PathBuf),

    #[error("Terminal not found: {0}")]
    NotFound(BackendId),

    #[error("PTY error: {0}")]
    Pty(String),
}

#[derive(Debug, Clone)]
pub struct CreateTerminalRequest {
    pub worktree_id: WorktreeId,
    pub name: String,
    pub working_directory: PathBuf,
    pub auto_command: Option<String>,
    pub rows: u16,
    pub cols: u16,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TerminalInfo {
    pub id: BackendId,
    pub worktree_id: WorktreeId,
    pub name: String,
    pub working_directory: PathBuf,
    pub created_at: DateTime<Utc>,
    pub rows: u16,
    pub cols: u16,
    pub pid: Option<u32>,
}

/// Scrollback replay plus a live receiver for everything after it.
pub struct Attachment {
    pub replay: Vec<u8>,
    pub rx: broadcast::Receiver<Vec<u8>>,
}

/// Spawns terminals on behalf of the session registry.
#[async_trait]
pub trait TerminalBackend: Send {
    async fn spawn(&mut self, request: CreateTerminalRequest) -> Result<BackendId, TerminalError>;
}

struct ManagedTerminal {
    info: TerminalInfo,
    pty: PtyProcess,
    output_tx: broadcast::Sender<Vec<u8>>,
    scrollback: Arc<Mutex<ScrollbackBuffer>>,
    reader: JoinHandle<()>,
}

pub struct TerminalManager {
    terminals: HashMap<BackendId, ManagedTerminal>,
    environment: Option<EnvironmentInfo>,
    shell_override: Option<String>,
    scrollback_bytes: usize,
    exit_tx: mpsc::UnboundedSender<TerminalExit>,
    exit_rx: Option<mpsc::UnboundedReceiver<TerminalExit>>,
}

impl TerminalManager {
    pub fn new(settings: &AppSettings) -> Self {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        Self {
            terminals: HashMap::new(),
            environment: None,
            shell_override: settings.shell().map(str::to_string),
            scrollback_bytes: settings.scrollback_bytes,
            exit_tx,
            exit_rx: Some(exit_rx),
        }
    }

    /// Use a fixed environment instead of detecting one on first spawn.
    #[cfg(test)]
    pub fn with_environment(mut self, environment: EnvironmentInfo) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Exit notifications; can be taken once.
    pub fn take_exit_events(&mut self) -> Option<mpsc::UnboundedReceiver<TerminalExit>> {
        self.exit_rx.take()
    }

    async fn environment(&mut self) -> &EnvironmentInfo {
        if self.environment.is_none() {
            let detected = EnvironmentInfo::detect(self.shell_override.as_deref()).await;
            self.environment = Some(detected);
        }
        self.environment.get_or_insert_with(|| EnvironmentInfo::from_process(None))
    }

    pub async fn create(&mut self, request: CreateTerminalRequest) -> Result<BackendId, TerminalError> {
        if !request.working_directory.is_dir() {
            return Err(TerminalError::DirectoryNotFound(request.working_directory));
        }

        let (shell, vars) = {
            let env = self.environment().await;
            (env.shell.clone(), env.vars.clone())
        };

        let (pty, reader) = PtyProcess::spawn(
            &shell,
            &request.working_directory,
            &vars,
            request.rows,
            request.cols,
        )?;

        let id = uuid::Uuid::new_v4().to_string();
        let (output_tx, _) = broadcast::channel(BROADCAST_CAPACITY);
        let scrollback = Arc::new(Mutex::new(ScrollbackBuffer::new(self.scrollback_bytes)));
        let reader = spawn_output_reader(
            id.clone(),
            reader,
            output_tx.clone(),
            scrollback.clone(),
            self.exit_tx.clone(),
        );

        let (rows, cols) = pty.size();
        let info = TerminalInfo {
            id: id.clone(),
            worktree_id: request.worktree_id,
            name: request.name,
            working_directory: request.working_directory,
            created_at: Utc::now(),
            rows,
            cols,
            pid: pty.process_id(),
        };

        tracing::info!(
            "Created terminal {} ({}) in {:?} pid={:?}",
            id,
            info.name,
            info.working_directory,
            info.pid
        );

        if let Some(command) = request.auto_command.as_deref().map(str::trim) {
            if !command.is_empty() {
                pty.write(format!("{}\n", command).as_bytes())?;
                tracing::debug!("Sent auto command to terminal {}: {}", id, command);
            }
        }

        self.terminals.insert(
            id.clone(),
            ManagedTerminal {
                info,
                pty,
                output_tx,
                scrollback,
                reader,
            },
        );
        Ok(id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut ManagedTerminal, TerminalError> {
        self.terminals
            .get_mut(id)
            .ok_or_else(|| TerminalError::NotFound(id.to_string()))
    }

    pub fn send_input(&mut self, id: &str, data: &[u8]) -> Result<(), TerminalError> {
        self.get_mut(id)?.pty.write(data)
    }

    pub fn resize(&mut self, id: &str, rows: u16, cols: u16) -> Result<(), TerminalError> {
        let terminal = self.get_mut(id)?;
        terminal.pty.resize(rows, cols)?;
        let (rows, cols) = terminal.pty.size();
        terminal.info.rows = rows;
        terminal.info.cols = cols;
        Ok(())
    }

    pub fn close(&mut self, id: &str) -> Result<(), TerminalError> {
        let mut terminal = self
            .terminals
            .remove(id)
            .ok_or_else(|| TerminalError::NotFound(id.to_string()))?;
        terminal.pty.kill()?;
        tracing::info!("Closed terminal {}", id);
        Ok(())
    }

    pub fn list(&self) -> Vec<TerminalInfo> {
        let mut infos: Vec<TerminalInfo> = self.terminals.values().map(|t| t.info.clone()).collect();
        infos.sort_by_key(|i| i.created_at);
        infos
    }

    pub fn info(&self, id: &str) -> Option<TerminalInfo> {
        self.terminals.get(id).map(|t| t.info.clone())
    }

    pub fn has(&self, id: &str) -> bool {
        self.terminals.contains_key(id)
    }

    pub fn count(&self) -> usize {
        self.terminals.len()
    }

    /// Drop terminals whose output stream has ended.
    pub fn cleanup_completed(&mut self) -> usize {
        let finished: Vec<BackendId> = self
            .terminals
            .iter()
            .filter(|(_, t)| t.reader.is_finished())
            .map(|(id, _)| id.clone())
            .collect();
        for id in &finished {
            self.terminals.remove(id);
        }
        if !finished.is_empty() {
            tracing::debug!("Cleaned up {} finished terminals", finished.len());
        }
        finished.len()
    }

    pub fn attach(&self, id: &str) -> Result<Attachment, TerminalError> {
        let terminal = self
            .terminals
            .get(id)
            .ok_or_else(|| TerminalError::NotFound(id.to_string()))?;
        let sb = terminal
            .scrollback
            .lock()
            .map_err(|e| TerminalError::Pty(format!("lock scrollback: {}", e)))?;
        let rx = terminal.output_tx.subscribe();
        Ok(Attachment {
            replay: sb.contents(),
            rx,
        })
    }

    pub fn close_all(&mut self) {
        let ids: Vec<BackendId> = self.terminals.keys().cloned().collect();
        for id in ids {
            if let Err(e) = self.close(&id) {
                tracing::warn!("Failed to close terminal {}: {}", id, e);
            }
        }
    }
}

#[async_trait]
impl TerminalBackend for TerminalManager {
    async fn spawn(&mut self, request: CreateTerminalRequest) -> Result<BackendId, TerminalError> {
        self.create(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn test_environment() -> EnvironmentInfo {
        let mut env = EnvironmentInfo::from_process(Some("/bin/sh"));
        env.vars.insert("PS1".to_string(), "$ ".to_string());
        env
    }

    fn manager() -> TerminalManager {
        TerminalManager::new(&AppSettings::default()).with_environment(test_environment())
    }

    fn request(dir: &std::path::Path, auto_command: Option<&str>) -> CreateTerminalRequest {
        CreateTerminalRequest {
            worktree_id: "wt-1".to_string(),
            name: "Terminal 1".to_string(),
            working_directory: dir.to_path_buf(),
            auto_command: auto_command.map(str::to_string),
            rows: 24,
            cols: 80,
        }
    }

    async fn wait_for_output(manager: &TerminalManager, id: &str, needle: &str) -> bool {
        for _ in 0..50 {
            let replay = manager.attach(id).unwrap().replay;
            if String::from_utf8_lossy(&replay).contains(needle) {
                return true;
            }
            tokio::time::sleep(Duration::from_millis(100)).await;
        }
        false
    }

    #[tokio::test]
    async fn create_rejects_missing_directory() {
        let mut m = manager();
        let err = m
            .create(request(std::path::Path::new("/definitely/not/here"), None))
            .await
            .unwrap_err();
        assert!(matches!(err, TerminalError::DirectoryNotFound(_)));
        assert_eq!(m.count(), 0);
    }

    #[tokio::test]
    async fn auto_command_output_reaches_scrollback() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = manager();
        let id = m
            .create(request(tmp.path(), Some("echo wtdeck-auto-$((40+2))")))
            .await
            .unwrap();

        assert!(
            wait_for_output(&m, &id, "wtdeck-auto-42").await,
            "create: auto command should run in the new shell"
        );
        m.close(&id).unwrap();
    }

    #[tokio::test]
    async fn send_input_and_attach_live() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = manager();
        let id = m.create(request(tmp.path(), None)).await.unwrap();

        let mut attachment = m.attach(&id).unwrap();
        m.send_input(&id, b"echo live-$((1+1))\n").unwrap();

        let mut seen = String::from_utf8_lossy(&attachment.replay).to_string();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while !seen.contains("live-2") && tokio::time::Instant::now() < deadline {
            if let Ok(Ok(chunk)) =
                tokio::time::timeout(Duration::from_millis(200), attachment.rx.recv()).await
            {
                seen.push_str(&String::from_utf8_lossy(&chunk));
            }
        }
        assert!(seen.contains("live-2"));
        m.close(&id).unwrap();
    }

    #[tokio::test]
    async fn list_info_resize_and_close() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = manager();
        let id = m.create(request(tmp.path(), None)).await.unwrap();

        assert!(m.has(&id));
        assert_eq!(m.list().len(), 1);
        m.resize(&id, 40, 120).unwrap();
        let info = m.info(&id).unwrap();
        assert_eq!((info.rows, info.cols), (40, 120));
        assert_eq!(info.worktree_id, "wt-1");

        m.close(&id).unwrap();
        assert!(!m.has(&id));
        assert!(matches!(m.close(&id), Err(TerminalError::NotFound(_))));
        assert!(matches!(m.send_input(&id, b"x"), Err(TerminalError::NotFound(_))));
    }

    #[tokio::test]
    async fn exit_is_reported_and_cleaned_up() {
        let tmp = tempfile::tempdir().unwrap();
        let mut m = manager();
        let mut exits = m.take_exit_events().unwrap();
        assert!(m.take_exit_events().is_none());

        let id = m.create(request(tmp.path(), Some("exit"))).await.unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(5), exits.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(exit.backend_id, id);

        // the reader task finishes right after publishing
        for _ in 0..20 {
            if m.cleanup_completed() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
        assert_eq!(m.count(), 0, "cleanup_completed: should drop exited terminals");
    }
}
