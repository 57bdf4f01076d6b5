//! Sweeper - 定期的なタイムアウト処理と結果の破棄
//!
//! # 1回のパス
//! 1. バケットのサイズをログに出す
//! 2. admitted な各タスクについて admission ロック下で、期限切れならキャンセルし、
//!    完了しなかったキャンセルがあれば再試行する ([`Expiry`] 参照)
//! 3. 保持期間を過ぎた終端レコードを破棄し、未取得の結果の通知を希望した
//!    投入者に知らせる
//!
//! 失敗したタスクはログに出してカウントし、パスは続行する。

use std::sync::Arc;

use serde::Serialize;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, info_span, Instrument};

use crate::app::notification::{Notice, notify_result};
use crate::app::shared::Shared;
use crate::app::supervisor;
use crate::domain::{Command, TaskId, TrackerError};
use crate::registry::TerminalRecord;

/// Why the sweeper gave up on an admitted task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Expiry {
    /// Remote backend is down and the task is not running there.
    RemoteUnavailable,
    QueuedTooLong,
    RanTooLong,
    /// An earlier cancel timed out waiting for the worker.
    StalledCancel,
}

impl Expiry {
    fn message(self) -> &'static str {
        match self {
            Expiry::RemoteUnavailable => {
                "Remote compute backend is unavailable; the task has been cancelled"
            }
            Expiry::QueuedTooLong => "Task was queued for too long and has been cancelled",
            Expiry::RanTooLong => "Task ran for too long and has been cancelled",
            Expiry::StalledCancel => "An earlier cancellation never completed; cancelling again",
        }
    }
}

/// Outcome of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// Admitted tasks cancelled for timing out or on a retried cancel.
    pub cancelled: Vec<TaskId>,
    /// Terminal records dropped for not being retrieved.
    pub evicted: Vec<TaskId>,
    /// Tasks whose maintenance failed this pass.
    pub errors: usize,
}

pub(crate) struct Sweeper {
    shared: Arc<Shared>,
}

impl Sweeper {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Runs passes until the tracker shuts down.
    pub(crate) async fn run(self) {
        let mut interval = tokio::time::interval(self.shared.config.sweep_interval());
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        // first tick fires immediately
        interval.tick().await;

        info!(every = ?self.shared.config.sweep_interval(), "sweeper started");
        loop {
            tokio::select! {
                _ = self.shared.shutdown.cancelled() => break,
                _ = interval.tick() => {
                    let report = sweep_once(&self.shared)
                        .instrument(info_span!("sweep"))
                        .await;
                    if report.errors > 0 {
                        error!(errors = report.errors, "sweep finished with errors");
                    }
                }
            }
        }
        info!("sweeper stopped");
    }
}

pub(crate) async fn sweep_once(shared: &Shared) -> SweepReport {
    let mut report = SweepReport::default();

    let counts = shared.registry.counts().await;
    if !counts.is_empty() {
        info!(
            queued = counts.queued,
            running = counts.running,
            finished = counts.finished,
            failed = counts.failed,
            cancelled = counts.cancelled,
            "registry sizes"
        );
    }

    for task_id in shared.registry.admitted_ids().await {
        let _admission = shared.admission.lock().await;
        match check_admitted(shared, task_id).await {
            Ok(Some(expiry)) => {
                info!(%task_id, ?expiry, "task cancelled by sweeper");
                report.cancelled.push(task_id);
            }
            Ok(None) => {}
            Err(e) => {
                error!(%task_id, error = %e, "failed to enforce timeout");
                report.errors += 1;
            }
        }
    }

    let cutoff = shared.clock.now() - shared.config.retention();
    for task_id in shared.registry.expired(cutoff).await {
        let Some(record) = shared.registry.evict(task_id).await else {
            continue;
        };
        debug!(%task_id, "evicted unretrieved record");
        report.evicted.push(task_id);
        match record {
            TerminalRecord::Finished(result) | TerminalRecord::Failed(result)
                if result.notify_if_unretrieved =>
            {
                notify_result(shared, &result, Notice::Discarded).await;
            }
            _ => {}
        }
        shared.progress.forget(task_id);
    }

    report
}

/// Single-task timeout check. The caller holds the admission lock.
///
/// Returns the reason if the task was cancelled here.
pub(crate) async fn check_admitted(
    shared: &Shared,
    task_id: TaskId,
) -> Result<Option<Expiry>, TrackerError> {
    let Some((command, cancel_pending)) = shared.registry.admitted_entry(task_id).await else {
        return Ok(None);
    };
    if cancel_pending {
        debug!(%task_id, "retrying unfinished cancel");
        let cancelled = supervisor::cancel(shared, task_id).await?;
        return Ok(cancelled.then_some(Expiry::StalledCancel));
    }
    let Some(expiry) = expiry_of(shared, &command).await else {
        return Ok(None);
    };

    shared.progress.update_job(task_id, expiry.message());
    shared.registry.set_email_alert(task_id).await;
    if supervisor::cancel(shared, task_id).await? {
        Ok(Some(expiry))
    } else {
        Ok(None)
    }
}

async fn expiry_of(shared: &Shared, command: &Command) -> Option<Expiry> {
    let now = shared.clock.now();

    if command.will_run_remotely()
        && !shared.remote.healthy().await
        && (command.start_time().is_none() || !shared.remote.is_running(command.task_id()).await)
    {
        return Some(Expiry::RemoteUnavailable);
    }

    match (command.submission_time(), command.start_time()) {
        (_, Some(started)) => {
            let limit = chrono::Duration::minutes(i64::from(command.max_runtime_minutes()));
            (now > started + limit).then_some(Expiry::RanTooLong)
        }
        (Some(submitted), None) => {
            let limit = chrono::Duration::minutes(i64::from(command.max_queue_minutes()));
            (now > submitted + limit).then_some(Expiry::QueuedTooLong)
        }
        (None, None) => None,
    }
}
