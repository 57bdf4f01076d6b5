//! InMemoryProgress - メモリ上に保持する進捗レポーター
//!
//! 単一プロセスとテストにはこれで十分。ログは完了通知に引用される。

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::domain::{Command, JobError, TaskId};
use crate::ports::ProgressReporter;

/// Final signal recorded for a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressSignal {
    Done,
    Failed(String),
    Cancelled,
}

#[derive(Debug, Default)]
struct ProgressLog {
    messages: Vec<String>,
    signal: Option<ProgressSignal>,
}

#[derive(Debug, Default)]
pub struct InMemoryProgress {
    logs: Mutex<HashMap<TaskId, ProgressLog>>,
}

impl InMemoryProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signal_of(&self, task_id: TaskId) -> Option<ProgressSignal> {
        self.lock().get(&task_id).and_then(|log| log.signal.clone())
    }

    pub fn is_tracked(&self, task_id: TaskId) -> bool {
        self.lock().contains_key(&task_id)
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<TaskId, ProgressLog>> {
        self.logs.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn record(&self, task_id: TaskId, message: String, signal: Option<ProgressSignal>) {
        let mut logs = self.lock();
        let log = logs.entry(task_id).or_default();
        log.messages.push(message);
        if signal.is_some() {
            log.signal = signal;
        }
    }
}

impl ProgressReporter for InMemoryProgress {
    fn create_progress_job(&self, command: &Command) {
        self.record(
            command.task_id(),
            format!("Submitted {} for {}", command.operation(), command.submitter()),
            None,
        );
    }

    fn update_job(&self, task_id: TaskId, message: &str) {
        self.record(task_id, message.to_string(), None);
    }

    fn signal_done(&self, task_id: TaskId) {
        self.record(task_id, "Job finished".to_string(), Some(ProgressSignal::Done));
    }

    fn signal_failed(&self, task_id: TaskId, error: &JobError) {
        self.record(
            task_id,
            format!("Job failed: {error}"),
            Some(ProgressSignal::Failed(error.to_string())),
        );
    }

    fn signal_cancelled(&self, task_id: TaskId) {
        self.record(
            task_id,
            "Job cancelled".to_string(),
            Some(ProgressSignal::Cancelled),
        );
    }

    fn messages(&self, task_id: TaskId) -> Vec<String> {
        self.lock()
            .get(&task_id)
            .map(|log| log.messages.clone())
            .unwrap_or_default()
    }

    fn forget(&self, task_id: TaskId) {
        self.lock().remove(&task_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_messages_in_order_with_final_signal() {
        let progress = InMemoryProgress::new();
        let command = Command::builder(TaskId::random(), "u1", "op").build();
        let task_id = command.task_id();

        progress.create_progress_job(&command);
        progress.update_job(task_id, "halfway");
        progress.signal_failed(task_id, &JobError::failed("bad input"));

        let messages = progress.messages(task_id);
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[1], "halfway");
        assert_eq!(
            progress.signal_of(task_id),
            Some(ProgressSignal::Failed("bad input".to_string()))
        );
    }

    #[test]
    fn forget_drops_the_log() {
        let progress = InMemoryProgress::new();
        let task_id = TaskId::random();
        progress.update_job(task_id, "started");
        progress.signal_done(task_id);
        assert!(progress.is_tracked(task_id));

        progress.forget(task_id);
        assert!(!progress.is_tracked(task_id));
        assert!(progress.messages(task_id).is_empty());
        assert_eq!(progress.signal_of(task_id), None);
    }

    #[test]
    fn unknown_task_has_empty_log() {
        let progress = InMemoryProgress::new();
        let task_id = TaskId::random();
        assert!(progress.messages(task_id).is_empty());
        assert!(!progress.is_tracked(task_id));
        assert_eq!(progress.signal_of(task_id), None);
    }
}
