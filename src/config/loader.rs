use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::keymap::ShortcutSet;
use crate::models::{DefaultTerminal, DefaultTerminalUpdate};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppSettings {
    pub auto_focus_terminal_on_navigation: bool,
    pub show_changes_panel: bool,
    /// Shell for new terminals; `$SHELL` when unset.
    pub default_shell: Option<String>,
    pub scrollback_bytes: usize,
    pub initial_rows: u16,
    pub initial_cols: u16,
    pub status_poll_secs: u64,
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            auto_focus_terminal_on_navigation: true,
            show_changes_panel: false,
            default_shell: None,
            scrollback_bytes: 256 * 1024,
            initial_rows: 24,
            initial_cols: 80,
            status_poll_secs: 3,
        }
    }
}

impl AppSettings {
    /// Configured shell, ignoring a blank value.
    pub fn shell(&self) -> Option<&str> {
        self.default_shell
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: AppSettings,
    #[serde(default = "DefaultTerminal::builtin_defaults")]
    pub default_terminals: Vec<DefaultTerminal>,
    #[serde(default)]
    pub shortcuts: ShortcutSet,
    #[serde(skip)]
    pub data_dir: PathBuf,
    #[serde(skip)]
    pub worktree_base: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            settings: AppSettings::default(),
            default_terminals: DefaultTerminal::builtin_defaults(),
            shortcuts: ShortcutSet::default(),
            data_dir: Self::default_data_dir(),
            worktree_base: Self::default_worktree_base(),
        }
    }
}

impl Config {
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let path = config_path.unwrap_or_else(Self::default_config_path);

        if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            let mut config: Config = serde_yaml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?;
            config.data_dir = Self::default_data_dir();
            config.worktree_base = Self::default_worktree_base();
            Ok(config)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> Result<PathBuf> {
        let path = config_path.unwrap_or_else(Self::default_config_path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(path)
    }

    pub fn default_config_path() -> PathBuf {
        if let Some(config_path) = std::env::var_os("WTDECK_CONFIG") {
            PathBuf::from(config_path)
        } else {
            dirs::config_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("wtdeck")
                .join("config.yaml")
        }
    }

    pub fn default_data_dir() -> PathBuf {
        if let Some(dir) = std::env::var_os("WTDECK_DATA_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::data_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join("wtdeck")
        }
    }

    pub fn default_worktree_base() -> PathBuf {
        if let Some(dir) = std::env::var_os("WTDECK_WORKTREE_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".wtdeck")
        }
    }

    #[cfg(test)]
    pub fn with_data_dir(mut self, data_dir: PathBuf) -> Self {
        self.data_dir = data_dir;
        self
    }

    #[cfg(test)]
    pub fn with_worktree_base(mut self, worktree_base: PathBuf) -> Self {
        self.worktree_base = worktree_base;
        self
    }

    pub fn projects_file(&self) -> PathBuf {
        self.data_dir.join("projects.yaml")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// Settings and templates as pretty JSON. Paths are not exported.
    pub fn export_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Replace settings from exported JSON. Missing fields take their defaults.
    pub fn import_json(&mut self, json: &str) -> Result<()> {
        let value: serde_json::Value =
            serde_json::from_str(json).context("Settings are not valid JSON")?;
        if !value.is_object() {
            anyhow::bail!("Settings must be a JSON object");
        }
        let imported: Config =
            serde_json::from_value(value).context("Settings do not match the expected format")?;

        self.settings = imported.settings;
        self.default_terminals = imported.default_terminals;
        self.shortcuts = imported.shortcuts;
        Ok(())
    }

    /// Restore defaults, keeping resolved paths.
    pub fn reset(&mut self) {
        self.settings = AppSettings::default();
        self.default_terminals = DefaultTerminal::builtin_defaults();
        self.shortcuts = ShortcutSet::default();
    }

    pub fn add_default_terminal(&mut self) -> &DefaultTerminal {
        let template = DefaultTerminal::next_for(&self.default_terminals);
        self.default_terminals.push(template);
        &self.default_terminals[self.default_terminals.len() - 1]
    }

    pub fn remove_default_terminal(&mut self, id: &str) -> bool {
        let before = self.default_terminals.len();
        self.default_terminals.retain(|t| t.id != id);
        self.default_terminals.len() != before
    }

    pub fn update_default_terminal(&mut self, id: &str, update: DefaultTerminalUpdate) -> bool {
        match self.default_terminals.iter_mut().find(|t| t.id == id) {
            Some(template) => {
                update.apply(template);
                true
            }
            None => false,
        }
    }

    pub fn reset_default_terminals(&mut self) {
        self.default_terminals = DefaultTerminal::builtin_defaults();
    }
}

pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path).with_context(|| format!("Failed to create directory: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn config_default_settings() {
        let config = Config::default();
        assert!(config.settings.auto_focus_terminal_on_navigation);
        assert!(!config.settings.show_changes_panel);
        assert_eq!(config.default_terminals.len(), 1);
        assert_eq!(config.default_terminals[0].name, "Claude code");
        assert_eq!(config.default_terminals[0].command, "claude");
        assert!(config.shortcuts.enabled);
    }

    #[test]
    fn config_loads_from_yaml_file() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");

        let yaml = r#"
settings:
  auto_focus_terminal_on_navigation: false
  default_shell: /bin/bash
default_terminals:
  - id: dev
    name: Dev server
    command: npm run dev
shortcuts:
  enabled: false
"#;
        std::fs::write(&config_path, yaml).unwrap();

        let config = Config::load(Some(config_path)).unwrap();
        assert!(!config.settings.auto_focus_terminal_on_navigation);
        assert_eq!(config.settings.shell(), Some("/bin/bash"));
        assert_eq!(config.settings.initial_cols, 80, "load: unset fields should default");
        assert_eq!(config.default_terminals[0].name, "Dev server");
        assert!(config.default_terminals[0].enabled);
        assert!(!config.shortcuts.enabled);
        assert_eq!(
            config.shortcuts.shortcuts.len(),
            ShortcutSet::default().shortcuts.len()
        );
    }

    #[test]
    fn config_load_returns_default_when_file_missing() {
        let config = Config::load(Some(PathBuf::from("/nonexistent/config.yaml"))).unwrap();
        assert_eq!(config.default_terminals, DefaultTerminal::builtin_defaults());
    }

    #[test]
    fn config_load_rejects_invalid_yaml() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("config.yaml");
        std::fs::write(&config_path, "settings: [unclosed").unwrap();
        assert!(Config::load(Some(config_path)).is_err());
    }

    #[test]
    fn config_save_then_load() {
        let temp_dir = TempDir::new().unwrap();
        let config_path = temp_dir.path().join("nested").join("config.yaml");

        let mut config = Config::default();
        config.settings.status_poll_secs = 10;
        config.add_default_terminal();
        config.save(Some(config_path.clone())).unwrap();

        let loaded = Config::load(Some(config_path)).unwrap();
        assert_eq!(loaded.settings.status_poll_secs, 10);
        assert_eq!(loaded.default_terminals.len(), 2);
    }

    #[test]
    fn import_json_merges_with_defaults() {
        let mut config = Config::default();
        config
            .import_json(r#"{"settings": {"show_changes_panel": true}}"#)
            .unwrap();
        assert!(config.settings.show_changes_panel);
        assert!(
            config.settings.auto_focus_terminal_on_navigation,
            "import_json: missing settings should take defaults"
        );
        assert_eq!(config.default_terminals, DefaultTerminal::builtin_defaults());
    }

    #[test]
    fn import_json_rejects_non_object() {
        let mut config = Config::default();
        config.settings.status_poll_secs = 7;
        assert!(config.import_json("[1, 2]").is_err());
        assert!(config.import_json("not json").is_err());
        assert_eq!(config.settings.status_poll_secs, 7, "import_json: failure should not modify");
    }

    #[test]
    fn import_json_keeps_paths() {
        let mut config = Config::default().with_data_dir(PathBuf::from("/data"));
        config.import_json("{}").unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/data"));
    }

    #[test]
    fn export_then_import_preserves_shortcuts() {
        let mut config = Config::default();
        config
            .shortcuts
            .update("quit", "Ctrl+x".parse().unwrap())
            .unwrap();
        let json = config.export_json().unwrap();

        let mut other = Config::default();
        other.import_json(&json).unwrap();
        assert_eq!(other.shortcuts, config.shortcuts);
    }

    #[test]
    fn reset_restores_defaults() {
        let mut config = Config::default().with_worktree_base(PathBuf::from("/wt"));
        config.settings.auto_focus_terminal_on_navigation = false;
        config.default_terminals.clear();
        config.reset();
        assert!(config.settings.auto_focus_terminal_on_navigation);
        assert_eq!(config.default_terminals.len(), 1);
        assert_eq!(config.worktree_base, PathBuf::from("/wt"));
    }

    #[test]
    fn default_terminal_crud() {
        let mut config = Config::default();
        let id = config.add_default_terminal().id.clone();
        assert!(config.update_default_terminal(
            &id,
            DefaultTerminalUpdate {
                command: Some("htop".to_string()),
                ..Default::default()
            }
        ));
        assert_eq!(config.default_terminals[1].command, "htop");
        assert!(config.remove_default_terminal(&id));
        assert!(!config.remove_default_terminal(&id));
        assert!(!config.update_default_terminal("missing", DefaultTerminalUpdate::default()));
    }

    #[test]
    fn shell_ignores_blank_setting() {
        let mut config = Config::default();
        config.settings.default_shell = Some("  ".to_string());
        assert_eq!(config.settings.shell(), None);
    }

    #[test]
    fn derived_paths_live_under_data_dir() {
        let config = Config::default().with_data_dir(PathBuf::from("/d"));
        assert_eq!(config.projects_file(), PathBuf::from("/d/projects.yaml"));
        assert_eq!(config.log_dir(), PathBuf::from("/d/logs"));
    }
}
