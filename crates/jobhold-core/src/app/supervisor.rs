//! Execution supervisor - ジョブ実行の監督
//!
//! admitted なジョブ1つにつき worker と watcher を1つずつ起動する。
//!
//! # フロー
//! 1. worker はプールの空き (またはトークン) を待つ
//! 2. レジストリが開始時刻を記録する。先にキャンセルされていれば拒否
//! 3. ジョブ本体は別タスクで走る。トークンが発火した時点で worker は待つのをやめる
//! 4. worker は `done` を立て、結果を watcher に渡す
//! 5. watcher が唯一の終端遷移を行う

use std::any::Any;
use std::sync::Arc;

use tokio::sync::{oneshot, watch};
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, error, info, info_span, warn};

use crate::app::notification::{Notice, notify_command};
use crate::app::shared::Shared;
use crate::domain::{Answer, JobError, TaskId, TrackerError};
use crate::ports::{Job, JobContext};
use crate::registry::{ExecutionHandle, InterruptSettlement};

/// What the worker saw, handed to the watcher.
#[derive(Debug)]
enum WorkerOutcome {
    Success(Answer),
    Interrupted,
    Failure(JobError),
}

/// Everything needed to start a job once it is admitted.
pub(crate) struct PreparedLaunch {
    job: Arc<dyn Job>,
    token: CancellationToken,
    done_tx: watch::Sender<bool>,
}

impl PreparedLaunch {
    /// Creates the execution handle before admission so the registry entry
    /// can carry it from the start.
    pub(crate) fn new(shared: &Shared, job: Arc<dyn Job>) -> (Self, ExecutionHandle) {
        let token = shared.shutdown.child_token();
        let (done_tx, done_rx) = watch::channel(false);
        let handle = ExecutionHandle::new(token.clone(), done_rx);
        (
            Self {
                job,
                token,
                done_tx,
            },
            handle,
        )
    }

    /// Spawns the worker and its watcher. Returns immediately.
    pub(crate) fn launch(self, shared: &Arc<Shared>, task_id: TaskId) {
        let (outcome_tx, outcome_rx) = oneshot::channel();

        let worker_span = info_span!("worker", %task_id);
        tokio::spawn(
            run_worker(Arc::clone(shared), task_id, self, outcome_tx).instrument(worker_span),
        );

        let watcher_span = info_span!("watcher", %task_id);
        tokio::spawn(watch_worker(Arc::clone(shared), task_id, outcome_rx).instrument(watcher_span));
    }
}

async fn run_worker(
    shared: Arc<Shared>,
    task_id: TaskId,
    launch: PreparedLaunch,
    outcome_tx: oneshot::Sender<WorkerOutcome>,
) {
    let PreparedLaunch {
        job,
        token,
        done_tx,
    } = launch;

    let outcome = execute(&shared, task_id, job, &token).await;

    // ignore send errors: nobody waiting is fine
    let _ = done_tx.send(true);
    if outcome_tx.send(outcome).is_err() {
        warn!("watcher is gone; outcome dropped");
    }
}

async fn execute(
    shared: &Shared,
    task_id: TaskId,
    job: Arc<dyn Job>,
    token: &CancellationToken,
) -> WorkerOutcome {
    let permit = tokio::select! {
        biased;
        _ = token.cancelled() => {
            debug!("cancelled while queued");
            return WorkerOutcome::Interrupted;
        }
        permit = Arc::clone(&shared.workers).acquire_owned() => permit,
    };
    let Ok(_permit) = permit else {
        // pool closed: treated like shutdown
        return WorkerOutcome::Interrupted;
    };

    if !shared
        .registry
        .mark_started(task_id, shared.clock.now())
        .await
    {
        debug!("start refused; task is being cancelled");
        return WorkerOutcome::Interrupted;
    }
    info!("job started");

    let ctx = JobContext::new(task_id, token.clone(), Arc::clone(&shared.progress));
    let mut body = tokio::spawn(async move { job.run(ctx).await });

    tokio::select! {
        biased;
        _ = token.cancelled() => {
            // The body is left to notice the token on its own.
            WorkerOutcome::Interrupted
        }
        joined = &mut body => match joined {
            Ok(Ok(answer)) => WorkerOutcome::Success(answer),
            Ok(Err(e)) if e.is_interruption() => WorkerOutcome::Interrupted,
            Ok(Err(e)) => WorkerOutcome::Failure(e),
            Err(join_err) if join_err.is_panic() => {
                WorkerOutcome::Failure(JobError::Panicked(panic_message(join_err.into_panic())))
            }
            Err(_) => WorkerOutcome::Interrupted,
        },
    }
}

async fn watch_worker(
    shared: Arc<Shared>,
    task_id: TaskId,
    outcome_rx: oneshot::Receiver<WorkerOutcome>,
) {
    let outcome = outcome_rx
        .await
        .unwrap_or_else(|_| WorkerOutcome::Failure(JobError::failed("worker exited without an outcome")));
    let now = shared.clock.now();

    match outcome {
        WorkerOutcome::Success(answer) => {
            let Some(command) = shared
                .registry
                .transition_to_finished(task_id, answer, now)
                .await
            else {
                return;
            };
            info!(submitter = command.submitter(), operation = %command.operation(), "task finished");
            shared.progress.signal_done(task_id);
            if command.email_on_completion() {
                notify_command(&shared, &command, Notice::Finished).await;
            }
        }
        WorkerOutcome::Failure(err) => {
            let Some(command) = shared
                .registry
                .transition_to_failed(task_id, err.clone(), now)
                .await
            else {
                return;
            };
            warn!(submitter = command.submitter(), operation = %command.operation(), error = %err, "task failed");
            shared.progress.signal_failed(task_id, &err);
            if command.email_on_completion() {
                notify_command(&shared, &command, Notice::Failed(&err)).await;
            }
        }
        WorkerOutcome::Interrupted => {
            match shared.registry.settle_interruption(task_id, now).await {
                InterruptSettlement::Explicit => debug!("interruption owned by cancel"),
                InterruptSettlement::Gone => debug!("task already settled"),
                InterruptSettlement::Implicit(command) => {
                    info!(submitter = command.submitter(), "task cancelled without a cancel request");
                    shared.progress.signal_cancelled(task_id);
                    if command.email_on_completion() {
                        notify_command(&shared, &command, Notice::Cancelled).await;
                    }
                }
            }
        }
    }
}

/// admitted なタスクをキャンセルし、終端遷移を行う
///
/// この呼び出しでタスクが cancelled に移ったかどうかを返す。
pub(crate) async fn cancel(shared: &Shared, task_id: TaskId) -> Result<bool, TrackerError> {
    let Some((command, mut handle)) = shared.registry.request_cancel(task_id).await else {
        warn!(%task_id, "cannot cancel: no such task; maybe it finished already");
        return Ok(false);
    };

    if command.will_run_remotely() {
        let gone = shared.remote.cancel(task_id).await;
        info!(%task_id, gone, "remote backend answered cancel");
    }

    handle.interrupt();
    if !handle.wait_done(shared.config.cancel_grace()).await {
        let err = TrackerError::Consistency(task_id);
        error!(%task_id, error = %err, "worker did not stop within the grace period");
        return Err(err);
    }

    let Some(command) = shared
        .registry
        .transition_to_cancelled(task_id, shared.clock.now())
        .await
    else {
        return Ok(false);
    };
    info!(%task_id, submitter = command.submitter(), "task cancelled");
    shared.progress.signal_cancelled(task_id);
    if command.email_on_completion() {
        notify_command(shared, &command, Notice::Cancelled).await;
    }
    Ok(true)
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
