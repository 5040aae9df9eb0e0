use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::fs;

use super::projects::ProjectState;

/// YAML persistence for the project list and selection.
#[derive(Clone)]
pub struct ProjectStore {
    path: PathBuf,
}

impl ProjectStore {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }

    pub async fn load(&self) -> Result<ProjectState> {
        if !self.path.exists() {
            return Ok(ProjectState::default());
        }

        let content = fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read project file: {:?}", self.path))?;
        let state: ProjectState = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse project file: {:?}", self.path))?;
        Ok(state)
    }

    pub async fn save(&self, state: &ProjectState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // atomic replace
        let tmp = self.path.with_extension("yaml.tmp");
        let content = serde_yaml::to_string(state)?;
        fs::write(&tmp, content).await?;
        fs::rename(&tmp, &self.path)
            .await
            .with_context(|| format!("Failed to write project file: {:?}", self.path))?;
        Ok(())
    }
}
