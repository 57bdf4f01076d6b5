//! Errors - エラー型と分類
//!
//! - [`TrackerError`]: tracker の公開操作が返すエラー
//! - [`JobError`]: ジョブ実行が生成し、結果に保存されるエラー

use thiserror::Error;

use super::ids::TaskId;

#[derive(Debug, Error)]
pub enum TrackerError {
    /// Another admitted task has the same conflict key.
    #[error("task {submitted} conflicts with admitted task {conflicting}")]
    Conflict {
        submitted: TaskId,
        conflicting: TaskId,
    },

    /// The task id is already known to the registry.
    #[error("task {0} was already submitted")]
    DuplicateTask(TaskId),

    #[error("no such task {0}; maybe it finished already")]
    UnknownTask(TaskId),

    /// The job failed; surfaced when its result is retrieved.
    #[error("task {task_id} failed: {source}")]
    Execution {
        task_id: TaskId,
        #[source]
        source: JobError,
    },

    /// A cancelled worker never reported done.
    #[error("task {0} is still running despite apparent cancellation")]
    Consistency(TaskId),
}

impl TrackerError {
    /// Short stable label for logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            TrackerError::Conflict { .. } => "conflict",
            TrackerError::DuplicateTask(_) => "duplicate_task",
            TrackerError::UnknownTask(_) => "unknown_task",
            TrackerError::Execution { .. } => "execution",
            TrackerError::Consistency(_) => "consistency",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum JobError {
    /// The job observed its cancellation token.
    #[error("interrupted")]
    Interrupted,

    #[error("{0}")]
    Failed(String),

    #[error("job panicked: {0}")]
    Panicked(String),
}

impl JobError {
    pub fn failed(message: impl Into<String>) -> Self {
        JobError::Failed(message.into())
    }

    pub fn is_interruption(&self) -> bool {
        matches!(self, JobError::Interrupted)
    }
}
