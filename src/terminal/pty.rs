use std::collections::HashMap;
use std::io::{Read, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use super::manager::TerminalError;

fn pty_size(rows: u16, cols: u16) -> PtySize {
    PtySize {
        rows: rows.max(1),
        cols: cols.max(1),
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// A shell running behind a pseudo terminal.
pub struct PtyProcess {
    master: Box<dyn MasterPty + Send>,
    child: Box<dyn Child + Send + Sync>,
    // take_writer() may only be called once per master
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
    size: PtySize,
}

impl PtyProcess {
    /// Spawn `shell` in `cwd` and return the process plus its output reader.
    pub fn spawn(
        shell: &str,
        cwd: &Path,
        env: &HashMap<String, String>,
        rows: u16,
        cols: u16,
    ) -> Result<(Self, Box<dyn Read + Send>), TerminalError> {
        let size = pty_size(rows, cols);
        let pair = native_pty_system()
            .openpty(size)
            .map_err(|e| TerminalError::Pty(format!("openpty: {}", e)))?;

        let mut cmd = CommandBuilder::new(shell);
        cmd.cwd(cwd);
        cmd.env_clear();
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd.env("TERM", "xterm-256color");

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| TerminalError::Pty(format!("spawn {}: {}", shell, e)))?;
        // the slave must be dropped or the reader never sees EOF
        drop(pair.slave);

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| TerminalError::Pty(format!("clone reader: {}", e)))?;
        let writer = pair
            .master
            .take_writer()
            .map_err(|e| TerminalError::Pty(format!("take writer: {}", e)))?;

        Ok((
            Self {
                master: pair.master,
                child,
                writer: Arc::new(Mutex::new(writer)),
                size,
            },
            reader,
        ))
    }

    pub fn write(&self, data: &[u8]) -> Result<(), TerminalError> {
        let mut writer = self
            .writer
            .lock()
            .map_err(|e| TerminalError::Pty(format!("lock writer: {}", e)))?;
        writer
            .write_all(data)
            .map_err(|e| TerminalError::Pty(format!("write: {}", e)))?;
        writer
            .flush()
            .map_err(|e| TerminalError::Pty(format!("flush: {}", e)))
    }

    pub fn resize(&mut self, rows: u16, cols: u16) -> Result<(), TerminalError> {
        let size = pty_size(rows, cols);
        if size == self.size {
            return Ok(());
        }
        self.master
            .resize(size)
            .map_err(|e| TerminalError::Pty(format!("resize: {}", e)))?;
        self.size = size;
        Ok(())
    }

    pub fn size(&self) -> (u16, u16) {
        (self.size.rows, self.size.cols)
    }

    pub fn process_id(&self) -> Option<u32> {
        self.child.process_id()
    }

    pub fn has_exited(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(Some(_)))
    }

    pub fn kill(&mut self) -> Result<(), TerminalError> {
        if self.has_exited() {
            return Ok(());
        }
        self.child
            .kill()
            .map_err(|e| TerminalError::Pty(format!("kill: {}", e)))?;
        // reap, or the child lingers as a zombie until the deck exits
        self.child
            .wait()
            .map_err(|e| TerminalError::Pty(format!("wait: {}", e)))?;
        Ok(())
    }
}

impl Drop for PtyProcess {
    fn drop(&mut self) {
        if let Err(e) = self.kill() {
            tracing::debug!("Failed to kill pty child on drop: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(target_os = "linux")]
    #[test]
    fn kill_reaps_child() {
        let dir = tempfile::tempdir().unwrap();
        let env: HashMap<String, String> = std::env::var("PATH")
            .map(|p| HashMap::from([("PATH".to_string(), p)]))
            .unwrap_or_default();
        let (mut pty, _reader) = PtyProcess::spawn("/bin/sh", dir.path(), &env, 24, 80).unwrap();
        let pid = pty.process_id().unwrap();
        let proc_entry = std::path::PathBuf::from(format!("/proc/{}", pid));
        assert!(proc_entry.exists());

        pty.kill().unwrap();
        assert!(pty.has_exited());
        assert!(
            !proc_entry.exists(),
            "kill: child should be reaped, not left as a zombie"
        );
    }
}
