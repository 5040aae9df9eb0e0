use regex::Regex;
use std::collections::HashMap;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tokio::process::Command;

const LOGIN_SHELL_TIMEOUT: Duration = Duration::from_secs(3);
const MAX_RESOLVE_PASSES: usize = 10;

const IMPORTANT_PREFIXES: &[&str] = &[
    "ANTHROPIC_", "CLAUDE_", "SSH_", "GIT_", "GITHUB_", "OPENAI_", "GOOGLE_", "AWS_", "AZURE_",
    "DOCKER_", "NODE_", "NPM_", "YARN_", "PNPM_", "BUN_", "PYTHON_", "PIP_", "CARGO_", "RUST_",
    "GO_",
];
const IMPORTANT_SUFFIXES: &[&str] = &["_API_KEY", "_TOKEN", "_SECRET", "_AUTH", "_CREDENTIALS"];
const IMPORTANT_EXACT: &[&str] = &[
    "EDITOR", "VISUAL", "BROWSER", "TERM", "SHELL", "LANG", "LC_ALL", "HOME", "USER", "LOGNAME",
];

fn var_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}|\$([A-Za-z_][A-Za-z0-9_]*)")
            .expect("variable reference pattern is valid")
    })
}

/// Variables a login shell may legitimately override.
pub fn is_important_var(key: &str) -> bool {
    IMPORTANT_PREFIXES.iter().any(|p| key.starts_with(p))
        || IMPORTANT_SUFFIXES.iter().any(|s| key.ends_with(s))
        || IMPORTANT_EXACT.contains(&key)
}

/// Replace `$VAR` and `${VAR}` with known values; unknown references stay.
pub fn expand_references(value: &str, vars: &HashMap<String, String>) -> String {
    var_pattern()
        .replace_all(value, |caps: &regex::Captures| {
            let name = caps
                .get(1)
                .or_else(|| caps.get(2))
                .map(|m| m.as_str())
                .unwrap_or_default();
            match vars.get(name) {
                Some(v) => v.clone(),
                None => caps[0].to_string(),
            }
        })
        .into_owned()
}

/// Expand references across all values until stable, at most ten passes.
/// Returns the number of passes run.
pub fn resolve_references(vars: &mut HashMap<String, String>) -> usize {
    let mut passes = 0;
    while passes < MAX_RESOLVE_PASSES {
        passes += 1;
        let snapshot = vars.clone();
        let mut changed = false;
        for value in vars.values_mut() {
            if !value.contains('$') {
                continue;
            }
            let expanded = expand_references(value, &snapshot);
            if expanded != *value {
                *value = expanded;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }
    passes
}

fn unquote(value: &str) -> &str {
    value.trim().trim_matches('"').trim_matches('\'')
}

fn expand_tilde(path: &str, home: &Path) -> String {
    match path.strip_prefix('~') {
        Some(rest) => format!("{}{}", home.display(), rest),
        None => path.to_string(),
    }
}

/// Exports found in a shell rc file.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct RcExports {
    pub path_entries: Vec<String>,
    pub vars: Vec<(String, String)>,
}

pub fn parse_rc_content(content: &str, home: &Path) -> RcExports {
    let mut exports = RcExports::default();

    for line in content.lines().map(str::trim) {
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let assignment = match line.strip_prefix("export ") {
            Some(rest) => rest.trim(),
            None if line.starts_with("PATH=") => line,
            None => continue,
        };
        let Some((name, value)) = assignment.split_once('=') else {
            continue;
        };
        let name = name.trim();
        let value = unquote(value);

        if name == "PATH" {
            for entry in value.split(':').map(str::trim) {
                if entry.is_empty() || entry == "$PATH" || entry == "${PATH}" {
                    continue;
                }
                exports.path_entries.push(expand_tilde(entry, home));
            }
        } else if !name.is_empty() && !name.contains(char::is_whitespace) {
            exports.vars.push((name.to_string(), value.to_string()));
        }
    }

    exports
}

/// Parse `env` output into key/value pairs.
pub fn parse_env_output(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| {
            let (key, value) = line.split_once('=')?;
            let key = key.trim();
            if key.is_empty() || key.contains(char::is_whitespace) {
                return None;
            }
            Some((key.to_string(), value.to_string()))
        })
        .collect()
}

fn rc_files(shell_name: &str) -> &'static [&'static str] {
    match shell_name {
        "zsh" => &[".zshrc", ".zprofile", ".zshenv"],
        "bash" => &[".bashrc", ".bash_profile", ".profile"],
        "fish" => &[".config/fish/config.fish"],
        _ => &[".profile"],
    }
}

fn dev_paths(home: &Path) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = [
        "/opt/homebrew/bin",
        "/opt/homebrew/sbin",
        "/usr/local/bin",
        "/usr/local/sbin",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    for rel in [
        ".npm/bin",
        "node_modules/.bin",
        ".local/share/pnpm",
        ".yarn/bin",
        ".bun/bin",
        ".cargo/bin",
        "go/bin",
        ".local/bin",
    ] {
        paths.push(home.join(rel));
    }
    paths.extend(["/usr/bin", "/bin", "/usr/sbin", "/sbin"].iter().map(PathBuf::from));
    paths
}

/// Shell and environment handed to every spawned terminal.
/// Variables whose name or value is not UTF-8 are skipped.
fn utf8_vars<I>(vars: I) -> HashMap<String, String>
where
    I: IntoIterator<Item = (OsString, OsString)>,
{
    vars.into_iter()
        .filter_map(|(key, value)| Some((key.to_str()?.to_string(), value.to_str()?.to_string())))
        .collect()
}

#[derive(Debug, Clone)]
pub struct EnvironmentInfo {
    pub shell: String,
    pub path_dirs: Vec<String>,
    pub vars: HashMap<String, String>,
}

impl EnvironmentInfo {
    /// Environment of this process without rc files or login shell.
    pub fn from_process(shell_override: Option<&str>) -> Self {
        let shell = shell_override
            .map(str::to_string)
            .or_else(|| std::env::var("SHELL").ok().filter(|s| !s.is_empty()))
            .unwrap_or_else(|| "sh".to_string());
        let vars = utf8_vars(std::env::vars_os());
        let path_dirs = vars
            .get("PATH")
            .map(|p| p.split(':').filter(|s| !s.is_empty()).map(str::to_string).collect())
            .unwrap_or_default();

        Self {
            shell,
            path_dirs,
            vars,
        }
    }

    pub async fn detect(shell_override: Option<&str>) -> Self {
        let mut env = Self::from_process(shell_override);
        let home = dirs::home_dir().unwrap_or_default();

        for dir in dev_paths(&home) {
            if dir.exists() {
                env.add_path(dir.to_string_lossy().to_string());
            }
        }

        for file in rc_files(env.shell_name()) {
            if let Ok(content) = tokio::fs::read_to_string(home.join(file)).await {
                env.apply_rc(parse_rc_content(&content, &home));
            }
        }

        env.apply_login_shell().await;
        let passes = resolve_references(&mut env.vars);
        env.vars.insert("PATH".to_string(), env.path());

        tracing::info!(
            "Terminal environment: shell={} path_entries={} vars={} resolve_passes={}",
            env.shell,
            env.path_dirs.len(),
            env.vars.len(),
            passes
        );
        env
    }

    pub fn shell_name(&self) -> &str {
        Path::new(&self.shell)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("sh")
    }

    fn add_path(&mut self, dir: String) {
        if !self.path_dirs.contains(&dir) {
            self.path_dirs.push(dir);
        }
    }

    fn apply_rc(&mut self, exports: RcExports) {
        for entry in exports.path_entries {
            if Path::new(&entry).exists() {
                self.add_path(entry);
            }
        }
        for (key, value) in exports.vars {
            self.vars.insert(key, value);
        }
    }

    fn apply_env_pairs(&mut self, pairs: Vec<(String, String)>) {
        for (key, value) in pairs {
            if key == "PATH" {
                for dir in value.split(':').filter(|d| !d.is_empty()) {
                    self.add_path(dir.to_string());
                }
            } else if is_important_var(&key) || !self.vars.contains_key(&key) {
                self.vars.insert(key, value);
            }
        }
    }

    async fn apply_login_shell(&mut self) {
        let login_flag = match self.shell_name() {
            "bash" => "--login",
            _ => "-l",
        };
        let mut cmd = Command::new(&self.shell);
        cmd.args([login_flag, "-c", "env"]).kill_on_drop(true);

        match tokio::time::timeout(LOGIN_SHELL_TIMEOUT, cmd.output()).await {
            Ok(Ok(output)) if output.status.success() => {
                let pairs = parse_env_output(&String::from_utf8_lossy(&output.stdout));
                self.apply_env_pairs(pairs);
            }
            Ok(Ok(output)) => {
                tracing::debug!("Login shell exited with {}", output.status);
            }
            Ok(Err(e)) => tracing::warn!("Failed to run login shell {}: {}", self.shell, e),
            Err(_) => tracing::warn!(
                "Login shell {} timed out after {:?}",
                self.shell,
                LOGIN_SHELL_TIMEOUT
            ),
        }
    }

    pub fn path(&self) -> String {
        self.path_dirs.join(":")
    }
}
