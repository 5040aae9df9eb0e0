use anyhow::{Context, Result};
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenApp {
    VsCode,
    Cursor,
    FileManager,
}

impl OpenApp {
    fn program(&self) -> &'static str {
        match self {
            OpenApp::VsCode => "code",
            OpenApp::Cursor => "cursor",
            OpenApp::FileManager => {
                if cfg!(target_os = "macos") {
                    "open"
                } else if cfg!(target_os = "windows") {
                    "explorer"
                } else {
                    "xdg-open"
                }
            }
        }
    }
}

impl FromStr for OpenApp {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "vscode" | "code" => Ok(OpenApp::VsCode),
            "cursor" => Ok(OpenApp::Cursor),
            "finder" | "files" | "explorer" => Ok(OpenApp::FileManager),
            other => anyhow::bail!("Unsupported app: {} (expected vscode, cursor or finder)", other),
        }
    }
}

/// Launch `app` on `path` without waiting for it.
pub fn open_in(path: &Path, app: OpenApp) -> Result<()> {
    let program = app.program();
    Command::new(program)
        .arg(path)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to open {:?} in {}", path, program))?;
    tracing::info!("Opened {:?} with {}", path, program);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_app_names() {
        assert_eq!("vscode".parse::<OpenApp>().unwrap(), OpenApp::VsCode);
        assert_eq!("Cursor".parse::<OpenApp>().unwrap(), OpenApp::Cursor);
        assert_eq!("finder".parse::<OpenApp>().unwrap(), OpenApp::FileManager);
        assert!("emacs".parse::<OpenApp>().is_err());
    }

    #[test]
    fn file_manager_program_is_platform_specific() {
        let program = OpenApp::FileManager.program();
        assert!(["open", "explorer", "xdg-open"].contains(&program));
    }
}
