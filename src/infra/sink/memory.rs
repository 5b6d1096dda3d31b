//! In-memory result sink.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Local};
use parking_lot::RwLock;

use crate::core::error::SinkError;
use crate::core::executor::{JobProfile, ResultSink};
use crate::core::task::TaskExecution;
use crate::util::serde::TaskId;

/// Payload stored by [`InMemoryResultSink`].
#[derive(Debug, Clone)]
pub struct StoredResult {
    /// Job that produced the payload.
    pub job_name: String,
    /// Raw result bytes.
    pub payload: Vec<u8>,
    /// When it was stored.
    pub stored_at: DateTime<Local>,
}

/// Simple in-memory sink for development and testing.
#[derive(Debug, Default)]
pub struct InMemoryResultSink {
    results: RwLock<HashMap<TaskId, StoredResult>>,
}

impl InMemoryResultSink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fetch the stored result of a task.
    pub fn fetch(&self, task_id: TaskId) -> Option<StoredResult> {
        self.results.read().get(&task_id).cloned()
    }

    /// Number of stored results.
    pub fn len(&self) -> usize {
        self.results.read().len()
    }

    /// Whether nothing has been stored.
    pub fn is_empty(&self) -> bool {
        self.results.read().is_empty()
    }
}

#[async_trait]
impl ResultSink for InMemoryResultSink {
    async fn persist(
        &self,
        _profile: &JobProfile,
        task: &TaskExecution,
        payload: &[u8],
    ) -> Result<String, SinkError> {
        self.results.write().insert(
            task.task_id,
            StoredResult {
                job_name: task.job_name.clone(),
                payload: payload.to_vec(),
                stored_at: Local::now(),
            },
        );
        Ok(format!("memory://{}", task.task_id))
    }
}
