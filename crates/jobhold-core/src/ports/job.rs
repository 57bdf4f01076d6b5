//! Job port - 呼び出し側が投入する作業単位
//!
//! キャンセルは協調的。tracker はジョブのトークンをキャンセルするだけで、
//! トークンを見ない (`checkpoint`、`cancelled`、await のいずれも使わない) ジョブは
//! 自分で return するまで走り続ける。

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::domain::{Answer, Command, JobError, TaskId};
use crate::ports::ProgressReporter;

/// A submitted unit of work.
///
/// # Example
/// ```ignore
/// struct DiffEx { command: Command }
///
/// #[async_trait]
/// impl Job for DiffEx {
///     fn command(&self) -> &Command { &self.command }
///
///     async fn run(&self, ctx: JobContext) -> Result<Answer, JobError> {
///         for probe in probes() {
///             ctx.checkpoint()?;
///             analyse(probe).await;
///         }
///         Ok(serde_json::json!({"done": true}))
///     }
/// }
/// ```
#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn command(&self) -> &Command;

    async fn run(&self, ctx: JobContext) -> Result<Answer, JobError>;
}

/// Handed to [`Job::run`].
#[derive(Clone)]
pub struct JobContext {
    task_id: TaskId,
    token: CancellationToken,
    progress: Arc<dyn ProgressReporter>,
}

impl JobContext {
    pub fn new(
        task_id: TaskId,
        token: CancellationToken,
        progress: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            task_id,
            token,
            progress,
        }
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Resolves once the task has been cancelled.
    pub async fn cancelled(&self) {
        self.token.cancelled().await
    }

    /// `Err(JobError::Interrupted)` once the task has been cancelled.
    pub fn checkpoint(&self) -> Result<(), JobError> {
        if self.token.is_cancelled() {
            Err(JobError::Interrupted)
        } else {
            Ok(())
        }
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Post a progress line for this task.
    pub fn report(&self, message: impl AsRef<str>) {
        self.progress.update_job(self.task_id, message.as_ref());
    }
}

impl std::fmt::Debug for JobContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JobContext")
            .field("task_id", &self.task_id)
            .field("cancelled", &self.token.is_cancelled())
            .finish()
    }
}
