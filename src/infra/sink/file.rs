//! File-system result sink.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::core::error::SinkError;
use crate::core::executor::{JobProfile, ResultSink};
use crate::core::task::TaskExecution;

/// Writes each payload to `<output_path>/<job name>_<task id>.bin`.
///
/// Relative output paths are resolved against `base_dir`.
#[derive(Debug, Clone)]
pub struct FileResultSink {
    base_dir: PathBuf,
}

impl FileResultSink {
    /// Create a sink rooted at `base_dir`.
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// File path a task's payload is written to.
    #[must_use]
    pub fn path_for(&self, profile: &JobProfile, task: &TaskExecution) -> PathBuf {
        let dir = self.base_dir.join(&profile.output_path);
        dir.join(format!("{}_{}.bin", file_stem(&task.job_name), task.task_id))
    }
}

fn file_stem(name: &str) -> String {
    let stem: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect();
    if stem.is_empty() {
        "job".to_owned()
    } else {
        stem
    }
}

#[async_trait]
impl ResultSink for FileResultSink {
    async fn persist(
        &self,
        profile: &JobProfile,
        task: &TaskExecution,
        payload: &[u8],
    ) -> Result<String, SinkError> {
        let path = self.path_for(profile, task);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, payload).await?;
        tracing::debug!(path = %path.display(), bytes = payload.len(), "result written");
        Ok(path.display().to_string())
    }
}
