//! In-memory task registry - インメモリのタスクレジストリ
//!
//! 4つのバケットを1つの async mutex の背後に置く。各操作はロックを1回だけ取るので、
//! どの呼び出しも他の呼び出しに対してアトミック。ロック保持中に await はしない。

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::warn;

use super::entry::{
    AdmittedTask, CancelledTask, ExecutionHandle, InterruptSettlement, Lookup, TerminalRecord,
};
use crate::app::status::RegistryCounts;
use crate::domain::{Answer, Command, JobError, TaskId, TaskResult, TaskState};

struct RegistryState {
    admitted: HashMap<TaskId, AdmittedTask>,
    finished: HashMap<TaskId, TaskResult>,
    failed: HashMap<TaskId, TaskResult>,
    cancelled: HashMap<TaskId, CancelledTask>,
}

impl RegistryState {
    fn new() -> Self {
        Self {
            admitted: HashMap::new(),
            finished: HashMap::new(),
            failed: HashMap::new(),
            cancelled: HashMap::new(),
        }
    }

    fn state_of(&self, task_id: TaskId) -> Option<TaskState> {
        if self.admitted.contains_key(&task_id) {
            Some(TaskState::Admitted)
        } else if self.finished.contains_key(&task_id) {
            Some(TaskState::Finished)
        } else if self.failed.contains_key(&task_id) {
            Some(TaskState::Failed)
        } else if self.cancelled.contains_key(&task_id) {
            Some(TaskState::Cancelled)
        } else {
            None
        }
    }

    /// Removes from admitted. A miss is logged and reported as `None`.
    fn take_admitted(&mut self, task_id: TaskId, transition: &str) -> Option<AdmittedTask> {
        let entry = self.admitted.remove(&task_id);
        if entry.is_none() {
            warn!(%task_id, transition, "task is not admitted; ignoring transition");
        }
        entry
    }

    fn counts(&self) -> RegistryCounts {
        let mut counts = RegistryCounts::default();
        for entry in self.admitted.values() {
            if entry.command.is_queued() {
                counts.queued += 1;
            } else {
                counts.running += 1;
            }
        }
        counts.finished = self.finished.len();
        counts.failed = self.failed.len();
        counts.cancelled = self.cancelled.len();
        counts
    }
}

/// Single source of truth for task lifecycle.
pub(crate) struct TaskRegistry {
    state: Mutex<RegistryState>,
}

impl TaskRegistry {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(RegistryState::new()),
        }
    }

    /// Inserts into admitted. Returns false if the id is known in any bucket.
    ///
    /// Conflict arbitration happens before this, under the admission lock.
    pub(crate) async fn admit(&self, command: Command, handle: ExecutionHandle) -> bool {
        let mut state = self.state.lock().await;
        let task_id = command.task_id();
        if state.state_of(task_id).is_some() {
            return false;
        }
        state
            .admitted
            .insert(task_id, AdmittedTask::new(command, handle));
        true
    }

    pub(crate) async fn state_of(&self, task_id: TaskId) -> Option<TaskState> {
        self.state.lock().await.state_of(task_id)
    }

    /// Command plus whether a cancel was requested and has not completed yet.
    pub(crate) async fn admitted_entry(&self, task_id: TaskId) -> Option<(Command, bool)> {
        let state = self.state.lock().await;
        state
            .admitted
            .get(&task_id)
            .map(|e| (e.command.clone(), e.cancel_requested))
    }

    pub(crate) async fn admitted_commands(&self) -> Vec<Command> {
        let state = self.state.lock().await;
        let mut commands: Vec<Command> =
            state.admitted.values().map(|e| e.command.clone()).collect();
        commands.sort_by_key(|c| c.task_id());
        commands
    }

    pub(crate) async fn admitted_ids(&self) -> Vec<TaskId> {
        let state = self.state.lock().await;
        let mut ids: Vec<TaskId> = state.admitted.keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Records the start of execution.
    ///
    /// Refused when the task is gone or a cancel is already under way, so a
    /// task cancelled while queued never gets a start time.
    pub(crate) async fn mark_started(&self, task_id: TaskId, at: DateTime<Utc>) -> bool {
        let mut state = self.state.lock().await;
        match state.admitted.get_mut(&task_id) {
            Some(entry) if !entry.cancel_requested => entry.command.mark_started(at),
            _ => false,
        }
    }

    pub(crate) async fn set_email_alert(&self, task_id: TaskId) -> bool {
        let mut state = self.state.lock().await;
        match state.admitted.get_mut(&task_id) {
            Some(entry) => {
                entry.command.set_email_on_completion();
                true
            }
            None => false,
        }
    }

    /// Flags the task as being cancelled and hands back what `cancel` needs.
    pub(crate) async fn request_cancel(&self, task_id: TaskId) -> Option<(Command, ExecutionHandle)> {
        let mut state = self.state.lock().await;
        let entry = state.admitted.get_mut(&task_id)?;
        entry.cancel_requested = true;
        Some((entry.command.clone(), entry.handle.clone()))
    }

    pub(crate) async fn transition_to_finished(
        &self,
        task_id: TaskId,
        answer: Answer,
        at: DateTime<Utc>,
    ) -> Option<Command> {
        let mut state = self.state.lock().await;
        let entry = state.take_admitted(task_id, "finished")?;
        let result = TaskResult::finished(&entry.command, answer, at);
        state.finished.insert(task_id, result);
        Some(entry.command)
    }

    pub(crate) async fn transition_to_failed(
        &self,
        task_id: TaskId,
        error: JobError,
        at: DateTime<Utc>,
    ) -> Option<Command> {
        let mut state = self.state.lock().await;
        let entry = state.take_admitted(task_id, "failed")?;
        let result = TaskResult::failed(&entry.command, error, at);
        state.failed.insert(task_id, result);
        Some(entry.command)
    }

    pub(crate) async fn transition_to_cancelled(
        &self,
        task_id: TaskId,
        at: DateTime<Utc>,
    ) -> Option<Command> {
        let mut state = self.state.lock().await;
        let entry = state.take_admitted(task_id, "cancelled")?;
        state.cancelled.insert(
            task_id,
            CancelledTask {
                command: entry.command.clone(),
                cancelled_at: at,
            },
        );
        Some(entry.command)
    }

    /// Watcher side of an interrupted worker, decided under one lock.
    pub(crate) async fn settle_interruption(
        &self,
        task_id: TaskId,
        at: DateTime<Utc>,
    ) -> InterruptSettlement {
        let mut state = self.state.lock().await;
        if state.cancelled.contains_key(&task_id) {
            return InterruptSettlement::Explicit;
        }
        let cancel_requested = state.admitted.get(&task_id).map(|e| e.cancel_requested);
        match cancel_requested {
            None => InterruptSettlement::Gone,
            Some(true) => InterruptSettlement::Explicit,
            Some(false) => {
                let Some(entry) = state.admitted.remove(&task_id) else {
                    return InterruptSettlement::Gone;
                };
                state.cancelled.insert(
                    task_id,
                    CancelledTask {
                        command: entry.command.clone(),
                        cancelled_at: at,
                    },
                );
                InterruptSettlement::Implicit(entry.command)
            }
        }
    }

    /// Removes a terminal record. Admitted tasks are left alone.
    pub(crate) async fn retrieve(&self, task_id: TaskId) -> Lookup {
        let mut state = self.state.lock().await;
        if let Some(record) = Self::take_terminal(&mut state, task_id) {
            return Lookup::Terminal(record);
        }
        if state.admitted.contains_key(&task_id) {
            Lookup::Admitted
        } else {
            Lookup::Missing
        }
    }

    /// Ids of terminal records last touched at or before `cutoff`.
    ///
    /// Finished and failed age from their finish time, cancelled from the
    /// moment of cancellation.
    pub(crate) async fn expired(&self, cutoff: DateTime<Utc>) -> Vec<TaskId> {
        let state = self.state.lock().await;
        let finished = state
            .finished
            .values()
            .chain(state.failed.values())
            .filter(|r| r.finish_time <= cutoff)
            .map(|r| r.task_id);
        let cancelled = state
            .cancelled
            .values()
            .filter(|c| c.cancelled_at <= cutoff)
            .map(|c| c.command.task_id());
        let mut ids: Vec<TaskId> = finished.chain(cancelled).collect();
        ids.sort_unstable();
        ids
    }

    pub(crate) async fn evict(&self, task_id: TaskId) -> Option<TerminalRecord> {
        let mut state = self.state.lock().await;
        Self::take_terminal(&mut state, task_id)
    }

    pub(crate) async fn finished_results(&self) -> Vec<TaskResult> {
        let state = self.state.lock().await;
        sorted_results(state.finished.values())
    }

    pub(crate) async fn failed_results(&self) -> Vec<TaskResult> {
        let state = self.state.lock().await;
        sorted_results(state.failed.values())
    }

    pub(crate) async fn cancelled_commands(&self) -> Vec<Command> {
        let state = self.state.lock().await;
        let mut commands: Vec<Command> =
            state.cancelled.values().map(|c| c.command.clone()).collect();
        commands.sort_by_key(|c| c.task_id());
        commands
    }

    pub(crate) async fn counts(&self) -> RegistryCounts {
        self.state.lock().await.counts()
    }

    fn take_terminal(state: &mut RegistryState, task_id: TaskId) -> Option<TerminalRecord> {
        if let Some(result) = state.finished.remove(&task_id) {
            Some(TerminalRecord::Finished(result))
        } else if let Some(result) = state.failed.remove(&task_id) {
            Some(TerminalRecord::Failed(result))
        } else {
            state
                .cancelled
                .remove(&task_id)
                .map(TerminalRecord::Cancelled)
        }
    }
}

fn sorted_results<'a>(results: impl Iterator<Item = &'a TaskResult>) -> Vec<TaskResult> {
    let mut results: Vec<TaskResult> = results.cloned().collect();
    results.sort_by_key(|r| r.task_id);
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use tokio::sync::watch;
    use tokio_util::sync::CancellationToken;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    fn handle() -> ExecutionHandle {
        let (_tx, rx) = watch::channel(false);
        ExecutionHandle::new(CancellationToken::new(), rx)
    }

    fn submitted(submitter: &str) -> Command {
        let mut command = Command::builder(TaskId::random(), submitter, "diffExAnalysis").build();
        command.mark_submitted(t0());
        command
    }

    async fn admitted(registry: &TaskRegistry) -> TaskId {
        let command = submitted("u1");
        let task_id = command.task_id();
        assert!(registry.admit(command, handle()).await);
        task_id
    }

    #[tokio::test]
    async fn admit_rejects_known_ids() {
        let registry = TaskRegistry::new();
        let command = submitted("u1");
        assert!(registry.admit(command.clone(), handle()).await);
        assert!(!registry.admit(command, handle()).await);
    }

    #[tokio::test]
    async fn task_sits_in_exactly_one_bucket() {
        let registry = TaskRegistry::new();
        let task_id = admitted(&registry).await;
        assert_eq!(registry.state_of(task_id).await, Some(TaskState::Admitted));

        registry
            .transition_to_finished(task_id, serde_json::json!(1), t0())
            .await
            .unwrap();
        assert_eq!(registry.state_of(task_id).await, Some(TaskState::Finished));
        assert!(registry.admitted_ids().await.is_empty());

        let counts = registry.counts().await;
        assert_eq!(counts.finished, 1);
        assert_eq!(counts.queued + counts.running + counts.failed + counts.cancelled, 0);
    }

    #[tokio::test]
    async fn second_transition_is_a_no_op() {
        let registry = TaskRegistry::new();
        let task_id = admitted(&registry).await;

        assert!(registry.transition_to_cancelled(task_id, t0()).await.is_some());
        assert!(
            registry
                .transition_to_failed(task_id, JobError::failed("late"), t0())
                .await
                .is_none()
        );
        assert_eq!(registry.state_of(task_id).await, Some(TaskState::Cancelled));
        assert!(registry.failed_results().await.is_empty());
    }

    #[tokio::test]
    async fn retrieve_releases_terminal_records_once() {
        let registry = TaskRegistry::new();
        let task_id = admitted(&registry).await;

        assert!(matches!(registry.retrieve(task_id).await, Lookup::Admitted));

        registry
            .transition_to_finished(task_id, serde_json::json!("ok"), t0())
            .await;
        assert!(matches!(
            registry.retrieve(task_id).await,
            Lookup::Terminal(TerminalRecord::Finished(_))
        ));
        assert!(matches!(registry.retrieve(task_id).await, Lookup::Missing));
    }

    #[tokio::test]
    async fn mark_started_is_refused_after_cancel_request() {
        let registry = TaskRegistry::new();
        let task_id = admitted(&registry).await;

        assert!(registry.request_cancel(task_id).await.is_some());
        assert!(!registry.mark_started(task_id, t0()).await);

        let (command, _) = registry.admitted_entry(task_id).await.unwrap();
        assert!(command.start_time().is_none());
    }

    #[tokio::test]
    async fn admitted_entry_reports_pending_cancel() {
        let registry = TaskRegistry::new();
        let task_id = admitted(&registry).await;
        assert!(matches!(registry.admitted_entry(task_id).await, Some((_, false))));

        registry.request_cancel(task_id).await;
        assert!(matches!(registry.admitted_entry(task_id).await, Some((_, true))));

        registry.transition_to_cancelled(task_id, t0()).await;
        assert!(registry.admitted_entry(task_id).await.is_none());
    }

    #[tokio::test]
    async fn counts_split_queued_and_running() {
        let registry = TaskRegistry::new();
        let queued = admitted(&registry).await;
        let running = admitted(&registry).await;
        assert!(registry.mark_started(running, t0()).await);

        let counts = registry.counts().await;
        assert_eq!(counts.queued, 1);
        assert_eq!(counts.running, 1);
        assert_ne!(queued, running);
    }

    #[tokio::test]
    async fn interruption_without_cancel_request_is_implicit() {
        let registry = TaskRegistry::new();
        let task_id = admitted(&registry).await;

        assert!(matches!(
            registry.settle_interruption(task_id, t0()).await,
            InterruptSettlement::Implicit(_)
        ));
        assert_eq!(registry.state_of(task_id).await, Some(TaskState::Cancelled));
        assert!(matches!(
            registry.settle_interruption(task_id, t0()).await,
            InterruptSettlement::Explicit
        ));
    }

    #[tokio::test]
    async fn interruption_during_explicit_cancel_is_left_alone() {
        let registry = TaskRegistry::new();
        let task_id = admitted(&registry).await;
        registry.request_cancel(task_id).await;

        assert!(matches!(
            registry.settle_interruption(task_id, t0()).await,
            InterruptSettlement::Explicit
        ));
        assert_eq!(registry.state_of(task_id).await, Some(TaskState::Admitted));
    }

    #[tokio::test]
    async fn expired_uses_finish_and_cancel_times() {
        let registry = TaskRegistry::new();
        let old = admitted(&registry).await;
        let fresh = admitted(&registry).await;
        let dropped = admitted(&registry).await;

        registry
            .transition_to_finished(old, serde_json::json!(null), t0())
            .await;
        registry
            .transition_to_failed(fresh, JobError::failed("x"), t0() + Duration::minutes(30))
            .await;
        registry.transition_to_cancelled(dropped, t0()).await;

        let cutoff = t0() + Duration::minutes(10);
        let mut expected = vec![old, dropped];
        expected.sort_unstable();
        assert_eq!(registry.expired(cutoff).await, expected);

        assert!(matches!(
            registry.evict(old).await,
            Some(TerminalRecord::Finished(_))
        ));
        assert!(registry.evict(old).await.is_none());
    }

    #[tokio::test]
    async fn email_alert_only_while_admitted() {
        let registry = TaskRegistry::new();
        let task_id = admitted(&registry).await;

        assert!(registry.set_email_alert(task_id).await);
        let command = registry
            .transition_to_finished(task_id, serde_json::json!(null), t0())
            .await
            .unwrap();
        assert!(command.email_on_completion());
        assert!(!registry.set_email_alert(task_id).await);
    }
}
