//! Outcome - タスクの結果と、取得時に呼び出し側へ返すもの

use chrono::{DateTime, Utc};

use super::command::{Command, OperationKind};
use super::errors::JobError;
use super::ids::TaskId;

/// Opaque payload produced by a job.
pub type Answer = serde_json::Value;

/// Outcome of a job that reached `Finished` or `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskResult {
    pub task_id: TaskId,
    pub submitter: String,
    pub operation: OperationKind,
    pub answer: Option<Answer>,
    pub error: Option<JobError>,
    pub failed: bool,
    pub finish_time: DateTime<Utc>,
    pub notify_if_unretrieved: bool,
}

impl TaskResult {
    pub fn finished(command: &Command, answer: Answer, at: DateTime<Utc>) -> Self {
        Self {
            task_id: command.task_id(),
            submitter: command.submitter().to_string(),
            operation: command.operation().clone(),
            answer: Some(answer),
            error: None,
            failed: false,
            finish_time: at,
            notify_if_unretrieved: command.notify_if_unretrieved(),
        }
    }

    pub fn failed(command: &Command, error: JobError, at: DateTime<Utc>) -> Self {
        Self {
            task_id: command.task_id(),
            submitter: command.submitter().to_string(),
            operation: command.operation().clone(),
            answer: None,
            error: Some(error),
            failed: true,
            finish_time: at,
            notify_if_unretrieved: command.notify_if_unretrieved(),
        }
    }
}

/// What `check_result` hands back for a task that did not fail.
///
/// A failed task is reported as `TrackerError::Execution` instead.
#[derive(Debug, Clone, PartialEq)]
pub enum Retrieval {
    /// Finished; the result has now been released.
    Ready(TaskResult),
    /// Was cancelled; the record has now been released.
    Cancelled,
    /// Still queued or running.
    StillRunning,
    /// Never submitted, already retrieved, or evicted.
    Unknown,
}

impl Retrieval {
    pub fn into_result(self) -> Option<TaskResult> {
        match self {
            Retrieval::Ready(result) => Some(result),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn results_copy_command_fields() {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let command = Command::builder(TaskId::random(), "u1", "diffExAnalysis")
            .notify_if_unretrieved(true)
            .build();

        let ok = TaskResult::finished(&command, serde_json::json!({"genes": 12}), at);
        assert!(!ok.failed);
        assert!(ok.notify_if_unretrieved);
        assert_eq!(ok.operation.as_str(), "diffExAnalysis");

        let bad = TaskResult::failed(&command, JobError::failed("boom"), at);
        assert!(bad.failed);
        assert!(bad.answer.is_none());
        assert_eq!(bad.error, Some(JobError::failed("boom")));
    }
}
