//! Command - 投入されたジョブの記述
//!
//! 受け付け、衝突判定、タイムアウト計算に使われる。
//! `start_time`、`submission_time`、`email_on_completion` 以外はビルダーが
//! 生成した時点で固定される。

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TaskId;

/// How long a task may wait for a worker slot before the sweeper gives up on it.
pub const DEFAULT_MAX_QUEUE_MINUTES: u32 = 60 * 2;

/// How long a started task may run before the sweeper cancels it.
pub const DEFAULT_MAX_RUNTIME_MINUTES: u32 = 60 * 12;

/// Which operation a job performs, e.g. `diffExAnalysis`.
///
/// Compared structurally during conflict matching.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationKind(String);

impl OperationKind {
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<&str> for OperationKind {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Exact interface + method a job invokes, when the caller knows it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskSignature {
    pub interface: String,
    pub method: String,
}

impl TaskSignature {
    pub fn new(interface: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            interface: interface.into(),
            method: method.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    task_id: TaskId,
    submitter: String,
    operation: OperationKind,
    signature: Option<TaskSignature>,
    target_entity: Option<String>,
    submission_time: Option<DateTime<Utc>>,
    start_time: Option<DateTime<Utc>>,
    max_queue_minutes: u32,
    max_runtime_minutes: u32,
    will_run_remotely: bool,
    email_on_completion: bool,
    notify_if_unretrieved: bool,
}

impl Command {
    pub fn builder(
        task_id: TaskId,
        submitter: impl Into<String>,
        operation: impl Into<OperationKind>,
    ) -> CommandBuilder {
        CommandBuilder::new(task_id, submitter, operation)
    }

    pub fn task_id(&self) -> TaskId {
        self.task_id
    }

    pub fn submitter(&self) -> &str {
        &self.submitter
    }

    pub fn operation(&self) -> &OperationKind {
        &self.operation
    }

    pub fn signature(&self) -> Option<&TaskSignature> {
        self.signature.as_ref()
    }

    pub fn target_entity(&self) -> Option<&str> {
        self.target_entity.as_deref()
    }

    /// Set when the tracker admits the command.
    pub fn submission_time(&self) -> Option<DateTime<Utc>> {
        self.submission_time
    }

    /// `None` while queued; set once the job actually begins.
    pub fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    pub fn is_queued(&self) -> bool {
        self.start_time.is_none()
    }

    pub fn max_queue_minutes(&self) -> u32 {
        self.max_queue_minutes
    }

    pub fn max_runtime_minutes(&self) -> u32 {
        self.max_runtime_minutes
    }

    pub fn will_run_remotely(&self) -> bool {
        self.will_run_remotely
    }

    pub fn email_on_completion(&self) -> bool {
        self.email_on_completion
    }

    pub fn notify_if_unretrieved(&self) -> bool {
        self.notify_if_unretrieved
    }

    /// Conflict key match against an already admitted command.
    ///
    /// Same submitter and operation are required. When both sides carry a
    /// signature, the signatures decide. Otherwise the targets must match,
    /// and a missing target on either side counts as a match.
    pub fn conflicts_with(&self, admitted: &Command) -> bool {
        if self.submitter != admitted.submitter || self.operation != admitted.operation {
            return false;
        }
        match (&self.signature, &admitted.signature) {
            (Some(mine), Some(theirs)) => mine == theirs,
            _ => match (&self.target_entity, &admitted.target_entity) {
                (Some(mine), Some(theirs)) => mine == theirs,
                _ => true,
            },
        }
    }

    pub(crate) fn mark_submitted(&mut self, at: DateTime<Utc>) {
        self.submission_time = Some(at);
        self.start_time = None;
    }

    /// Records the start time. Returns false if it was already set.
    ///
    /// The start always lands strictly after the submission; a clock that
    /// has not moved yields `submission_time + 1ns`.
    pub(crate) fn mark_started(&mut self, at: DateTime<Utc>) -> bool {
        if self.start_time.is_some() {
            return false;
        }
        let at = match self.submission_time {
            Some(submitted) if at <= submitted => submitted + chrono::Duration::nanoseconds(1),
            _ => at,
        };
        self.start_time = Some(at);
        true
    }

    pub(crate) fn set_email_on_completion(&mut self) {
        self.email_on_completion = true;
    }
}

/// Builder for [`Command`].
///
/// # Example
/// ```ignore
/// let command = Command::builder(task_id, "u1", "diffExAnalysis")
///     .target_entity("ee42")
///     .max_runtime_minutes(30)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct CommandBuilder {
    command: Command,
}

impl CommandBuilder {
    pub fn new(
        task_id: TaskId,
        submitter: impl Into<String>,
        operation: impl Into<OperationKind>,
    ) -> Self {
        Self {
            command: Command {
                task_id,
                submitter: submitter.into(),
                operation: operation.into(),
                signature: None,
                target_entity: None,
                submission_time: None,
                start_time: None,
                max_queue_minutes: DEFAULT_MAX_QUEUE_MINUTES,
                max_runtime_minutes: DEFAULT_MAX_RUNTIME_MINUTES,
                will_run_remotely: false,
                email_on_completion: false,
                notify_if_unretrieved: false,
            },
        }
    }

    pub fn signature(mut self, signature: TaskSignature) -> Self {
        self.command.signature = Some(signature);
        self
    }

    pub fn target_entity(mut self, target: impl Into<String>) -> Self {
        self.command.target_entity = Some(target.into());
        self
    }

    pub fn max_queue_minutes(mut self, minutes: u32) -> Self {
        self.command.max_queue_minutes = minutes;
        self
    }

    pub fn max_runtime_minutes(mut self, minutes: u32) -> Self {
        self.command.max_runtime_minutes = minutes;
        self
    }

    pub fn run_remotely(mut self, remote: bool) -> Self {
        self.command.will_run_remotely = remote;
        self
    }

    pub fn email_on_completion(mut self, email: bool) -> Self {
        self.command.email_on_completion = email;
        self
    }

    pub fn notify_if_unretrieved(mut self, notify: bool) -> Self {
        self.command.notify_if_unretrieved = notify;
        self
    }

    pub fn build(self) -> Command {
        self.command
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use rstest::rstest;

    fn command(submitter: &str, op: &str, target: Option<&str>) -> Command {
        let builder = Command::builder(TaskId::random(), submitter, op);
        match target {
            Some(t) => builder.target_entity(t).build(),
            None => builder.build(),
        }
    }

    #[rstest]
    #[case::same_target(Some("ee42"), Some("ee42"), true)]
    #[case::different_target(Some("ee42"), Some("ee43"), false)]
    #[case::new_without_target(None, Some("ee42"), true)]
    #[case::admitted_without_target(Some("ee42"), None, true)]
    #[case::neither_has_target(None, None, true)]
    fn target_matching(
        #[case] new_target: Option<&str>,
        #[case] admitted_target: Option<&str>,
        #[case] expected: bool,
    ) {
        let new = command("u1", "diffExAnalysis", new_target);
        let admitted = command("u1", "diffExAnalysis", admitted_target);
        assert_eq!(new.conflicts_with(&admitted), expected);
    }

    #[test]
    fn different_submitter_never_conflicts() {
        let new = command("u1", "diffExAnalysis", Some("ee42"));
        let admitted = command("u2", "diffExAnalysis", Some("ee42"));
        assert!(!new.conflicts_with(&admitted));
    }

    #[test]
    fn different_operation_never_conflicts() {
        let new = command("u1", "diffExAnalysis", Some("ee42"));
        let admitted = command("u1", "ontologySearch", Some("ee42"));
        assert!(!new.conflicts_with(&admitted));
    }

    #[test]
    fn known_signatures_decide_over_targets() {
        let sig_a = TaskSignature::new("DiffEx", "run");
        let sig_b = TaskSignature::new("DiffEx", "redo");
        let new = Command::builder(TaskId::random(), "u1", "diffExAnalysis")
            .signature(sig_a.clone())
            .target_entity("ee42")
            .build();
        let same_sig = Command::builder(TaskId::random(), "u1", "diffExAnalysis")
            .signature(sig_a)
            .target_entity("ee99")
            .build();
        let other_sig = Command::builder(TaskId::random(), "u1", "diffExAnalysis")
            .signature(sig_b)
            .target_entity("ee42")
            .build();

        assert!(new.conflicts_with(&same_sig));
        assert!(!new.conflicts_with(&other_sig));
    }

    #[test]
    fn unknown_signature_falls_back_to_target() {
        let new = Command::builder(TaskId::random(), "u1", "diffExAnalysis")
            .target_entity("ee42")
            .build();
        let admitted = Command::builder(TaskId::random(), "u1", "diffExAnalysis")
            .signature(TaskSignature::new("DiffEx", "run"))
            .target_entity("ee42")
            .build();
        assert!(new.conflicts_with(&admitted));
    }

    #[test]
    fn start_time_is_set_once_and_strictly_after_submission() {
        let submitted = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut cmd = command("u1", "op", None);
        cmd.mark_submitted(submitted);

        assert!(cmd.is_queued());
        assert!(cmd.mark_started(submitted - Duration::seconds(5)));
        let started = cmd.start_time().unwrap();
        assert!(started > submitted);
        assert_eq!(started, submitted + Duration::nanoseconds(1));
        assert!(!cmd.mark_started(submitted + Duration::minutes(1)));
        assert_eq!(cmd.start_time(), Some(started));
    }

    #[test]
    fn start_at_submission_instant_is_nudged_forward() {
        let submitted = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        let mut cmd = command("u1", "op", None);
        cmd.mark_submitted(submitted);

        assert!(cmd.mark_started(submitted));
        assert!(cmd.start_time().unwrap() > submitted);
    }

    #[test]
    fn builder_defaults() {
        let cmd = command("u1", "op", None);
        assert_eq!(cmd.max_queue_minutes(), DEFAULT_MAX_QUEUE_MINUTES);
        assert_eq!(cmd.max_runtime_minutes(), DEFAULT_MAX_RUNTIME_MINUTES);
        assert!(!cmd.will_run_remotely());
        assert!(!cmd.email_on_completion());
        assert!(cmd.submission_time().is_none());
    }
}
