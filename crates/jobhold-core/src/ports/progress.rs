//! ProgressReporter port - タスクの進捗追跡
//!
//! 呼び出しは fire-and-forget で tracker のホットパス上で行われるため、
//! トレイトは同期的。実装はブロックしてはならない。

use crate::domain::{Command, JobError, TaskId};

pub trait ProgressReporter: Send + Sync {
    /// A task was admitted.
    fn create_progress_job(&self, command: &Command);

    /// Free-form progress line, from the job itself or from the sweeper.
    fn update_job(&self, task_id: TaskId, message: &str);

    fn signal_done(&self, task_id: TaskId);

    fn signal_failed(&self, task_id: TaskId, error: &JobError);

    fn signal_cancelled(&self, task_id: TaskId);

    /// Event log for the task, quoted in completion notifications.
    fn messages(&self, _task_id: TaskId) -> Vec<String> {
        Vec::new()
    }

    /// タスクのレコードが tracker から消えた (取得済みまたは破棄)。ログを解放する。
    fn forget(&self, _task_id: TaskId) {}
}

/// Discards everything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopProgress;

impl ProgressReporter for NoopProgress {
    fn create_progress_job(&self, _command: &Command) {}

    fn update_job(&self, _task_id: TaskId, _message: &str) {}

    fn signal_done(&self, _task_id: TaskId) {}

    fn signal_failed(&self, _task_id: TaskId, _error: &JobError) {}

    fn signal_cancelled(&self, _task_id: TaskId) {}

    fn forget(&self, _task_id: TaskId) {}
}
