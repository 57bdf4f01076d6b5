//! Completion notices - NotificationGateway 経由の完了通知
//!
//! 配信失敗はログに出して捨てる。タスクの状態には影響しない。

use tracing::{debug, warn};

use crate::app::shared::Shared;
use crate::domain::{Command, JobError, TaskId, TaskResult};

/// What happened to the task, as told to the submitter.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Notice<'a> {
    Finished,
    Failed(&'a JobError),
    Cancelled,
    Discarded,
}

impl Notice<'_> {
    fn headline(&self) -> String {
        match self {
            Notice::Finished => "finished successfully".to_string(),
            Notice::Failed(error) => format!("failed: {error}"),
            Notice::Cancelled => "was cancelled".to_string(),
            Notice::Discarded => {
                "ended, but its result was never retrieved and has been discarded".to_string()
            }
        }
    }
}

pub(crate) async fn notify_command(shared: &Shared, command: &Command, notice: Notice<'_>) {
    send(
        shared,
        command.task_id(),
        command.submitter(),
        command.operation().as_str(),
        notice,
    )
    .await;
}

pub(crate) async fn notify_result(shared: &Shared, result: &TaskResult, notice: Notice<'_>) {
    send(
        shared,
        result.task_id,
        &result.submitter,
        result.operation.as_str(),
        notice,
    )
    .await;
}

async fn send(shared: &Shared, task_id: TaskId, recipient: &str, operation: &str, notice: Notice<'_>) {
    if recipient.trim().is_empty() {
        debug!(%task_id, "no submitter to notify");
        return;
    }
    let body = render_body(task_id, operation, notice, &shared.progress.messages(task_id));
    let subject = &shared.config.notification_subject;
    match shared.notifier.send(recipient, subject, &body).await {
        Ok(()) => debug!(%task_id, recipient, "notification sent"),
        Err(e) => warn!(%task_id, recipient, error = %e, "failed to send notification"),
    }
}

fn render_body(task_id: TaskId, operation: &str, notice: Notice<'_>, events: &[String]) -> String {
    let mut body = format!("Task {task_id} ({operation}) {}.\n", notice.headline());
    if !events.is_empty() {
        body.push_str("\nEvent logs:\n");
        for line in events {
            body.push_str(line);
            body.push('\n');
        }
    }
    body
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_operation_and_event_log() {
        let task_id = TaskId::random();
        let events = vec!["loading".to_string(), "fitting".to_string()];
        let body = render_body(task_id, "diffExAnalysis", Notice::Finished, &events);

        assert!(body.starts_with(&format!("Task {task_id} (diffExAnalysis) finished")));
        assert!(body.contains("Event logs:\nloading\nfitting\n"));
    }

    #[test]
    fn failure_body_includes_error_and_skips_empty_log() {
        let error = JobError::failed("boom");
        let body = render_body(TaskId::random(), "op", Notice::Failed(&error), &[]);
        assert!(body.contains("failed: "));
        assert!(body.contains("boom"));
        assert!(!body.contains("Event logs"));
    }
}
