//! File-backed roadmap store.
//!
//! One pretty-printed JSON document per project at `<dir>/<project_id>.json`.
//! Writes go to a temp file in the same directory that is then renamed over
//! the target, so a reader sees either the old or the new document.

use async_trait::async_trait;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::backend::RoadmapStore;
use crate::models::RoadmapDocument;
use crate::{Error, Result};

/// Roadmap store rooted at a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create a store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory of the store
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the document for `project_id`.
    pub fn path_for(&self, project_id: &str) -> Result<PathBuf> {
        validate_project_id(project_id)?;
        Ok(self.dir.join(format!("{}.json", project_id)))
    }
}

/// Project ids become file names, so they are restricted to a safe set.
fn validate_project_id(project_id: &str) -> Result<()> {
    let valid = !project_id.is_empty()
        && !project_id.starts_with('.')
        && project_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(Error::Validation(format!(
            "invalid project id '{}'",
            project_id
        )))
    }
}

fn write_atomic(dir: &Path, path: &Path, contents: &str) -> Result<()> {
    fs::create_dir_all(dir)?;
    let mut temp = tempfile::NamedTempFile::new_in(dir)?;
    temp.write_all(contents.as_bytes())?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl RoadmapStore for FileStore {
    async fn persist(&self, project_id: &str, document: &RoadmapDocument) -> Result<()> {
        let path = self.path_for(project_id)?;
        let contents = document.to_json_pretty()?;
        let dir = self.dir.clone();

        tokio::task::spawn_blocking(move || write_atomic(&dir, &path, &contents))
            .await
            .map_err(|e| Error::Other(format!("write task failed: {}", e)))??;

        tracing::debug!(project_id, dir = %self.dir.display(), "persisted roadmap");
        Ok(())
    }

    async fn load(&self, project_id: &str) -> Result<RoadmapDocument> {
        let path = self.path_for(project_id)?;
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "roadmap for project {} at {}",
                    project_id,
                    path.display()
                )));
            }
            Err(e) => return Err(e.into()),
        };
        RoadmapDocument::from_json(&contents)?.normalized()
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }

    fn backend_type(&self) -> &'static str {
        "file"
    }
}
