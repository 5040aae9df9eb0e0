use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use super::repo::default_branch;
use crate::models::WorkspaceRepo;

fn resolve_folder(workspace_file: &Path, folder: &str) -> PathBuf {
    let candidate = Path::new(folder);
    if candidate.is_absolute() {
        return candidate.to_path_buf();
    }
    let base = workspace_file.parent().unwrap_or(workspace_file);
    let joined = base.join(candidate);
    joined.canonicalize().unwrap_or(joined)
}

/// Read the `folders` of a `.code-workspace` file. Folders that do not exist
/// are skipped.
pub async fn parse_workspace_file(path: &Path) -> Result<Vec<WorkspaceRepo>> {
    if !path.exists() {
        anyhow::bail!("Workspace file does not exist: {:?}", path);
    }

    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read workspace file: {:?}", path))?;
    let data: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse workspace file: {:?}", path))?;

    let mut repos = Vec::new();
    let Some(folders) = data.get("folders").and_then(|f| f.as_array()) else {
        return Ok(repos);
    };

    for folder in folders {
        let Some(folder_path) = folder.get("path").and_then(|p| p.as_str()) else {
            continue;
        };
        let resolved = resolve_folder(path, folder_path);
        if !resolved.exists() {
            tracing::debug!("Skipping missing workspace folder {:?}", resolved);
            continue;
        }

        let name = folder
            .get("name")
            .and_then(|n| n.as_str())
            .map(str::to_string)
            .or_else(|| {
                resolved
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
            })
            .unwrap_or_else(|| "Unknown".to_string());

        let is_git_repo = resolved.join(".git").exists();
        let branch = if is_git_repo {
            default_branch(&resolved).await
        } else {
            "main".to_string()
        };

        repos.push(WorkspaceRepo {
            name,
            path: resolved,
            default_branch: branch,
            is_git_repo,
        });
    }

    Ok(repos)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::git::test_support::init_repo;

    #[tokio::test]
    async fn parses_relative_and_named_folders() {
        let tmp = tempfile::tempdir().unwrap();
        let api = tmp.path().join("api");
        let web = tmp.path().join("web");
        std::fs::create_dir(&api).unwrap();
        std::fs::create_dir(&web).unwrap();
        init_repo(&api);

        let ws = tmp.path().join("team.code-workspace");
        std::fs::write(
            &ws,
            r#"{"folders": [
                {"path": "./api"},
                {"path": "web", "name": "Frontend"},
                {"path": "missing"}
            ]}"#,
        )
        .unwrap();

        let repos = parse_workspace_file(&ws).await.unwrap();
        assert_eq!(repos.len(), 2, "parse_workspace_file: missing folders should be skipped");
        assert_eq!(repos[0].name, "api");
        assert!(repos[0].is_git_repo);
        assert_eq!(repos[0].default_branch, "main");
        assert_eq!(repos[1].name, "Frontend");
        assert!(!repos[1].is_git_repo);
    }

    #[tokio::test]
    async fn absolute_folder_paths_are_kept() {
        let tmp = tempfile::tempdir().unwrap();
        let elsewhere = tempfile::tempdir().unwrap();
        let ws = tmp.path().join("x.code-workspace");
        let json = serde_json::json!({"folders": [{"path": elsewhere.path()}]});
        std::fs::write(&ws, json.to_string()).unwrap();

        let repos = parse_workspace_file(&ws).await.unwrap();
        assert_eq!(repos[0].path, elsewhere.path());
    }

    #[tokio::test]
    async fn no_folders_key_gives_empty_list() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = tmp.path().join("x.code-workspace");
        std::fs::write(&ws, r#"{"settings": {}}"#).unwrap();
        assert!(parse_workspace_file(&ws).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn invalid_json_fails() {
        let tmp = tempfile::tempdir().unwrap();
        let ws = tmp.path().join("x.code-workspace");
        std::fs::write(&ws, "{folders:").unwrap();
        assert!(parse_workspace_file(&ws).await.is_err());
        assert!(parse_workspace_file(&tmp.path().join("none.code-workspace"))
            .await
            .is_err());
    }
}
