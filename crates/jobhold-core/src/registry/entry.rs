//! Registry entries - 各バケットがタスクごとに保持するもの

use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::domain::{Command, TaskResult};

/// 実行中 (またはキュー待ち) のジョブを制御する側のハンドル
///
/// - `token`: worker を割り込ませる
/// - `done`: worker がジョブを待つのをやめた時点で true になる
#[derive(Debug, Clone)]
pub(crate) struct ExecutionHandle {
    token: CancellationToken,
    done: watch::Receiver<bool>,
}

impl ExecutionHandle {
    pub(crate) fn new(token: CancellationToken, done: watch::Receiver<bool>) -> Self {
        Self { token, done }
    }

    pub(crate) fn interrupt(&self) {
        self.token.cancel();
    }

    /// worker が done を報告するまで最大 `grace` 待つ
    pub(crate) async fn wait_done(&mut self, grace: Duration) -> bool {
        let done = &mut self.done;
        let wait = async {
            loop {
                if *done.borrow_and_update() {
                    return true;
                }
                // Sender gone means the worker task is gone too.
                if done.changed().await.is_err() {
                    return true;
                }
            }
        };
        tokio::time::timeout(grace, wait).await.unwrap_or(false)
    }
}

/// Entry in the admitted bucket.
#[derive(Debug)]
pub(crate) struct AdmittedTask {
    pub(crate) command: Command,
    pub(crate) handle: ExecutionHandle,
    /// Set by `cancel` before it interrupts the worker. The cancel path then
    /// owns the transition and the watcher stays out of it.
    pub(crate) cancel_requested: bool,
}

impl AdmittedTask {
    pub(crate) fn new(command: Command, handle: ExecutionHandle) -> Self {
        Self {
            command,
            handle,
            cancel_requested: false,
        }
    }
}

/// Entry in the cancelled bucket.
#[derive(Debug, Clone)]
pub(crate) struct CancelledTask {
    pub(crate) command: Command,
    pub(crate) cancelled_at: DateTime<Utc>,
}

/// A record removed from one of the terminal buckets.
#[derive(Debug, Clone)]
pub(crate) enum TerminalRecord {
    Finished(TaskResult),
    Failed(TaskResult),
    Cancelled(CancelledTask),
}

/// What the registry knows about a task id, for retrieval.
#[derive(Debug)]
pub(crate) enum Lookup {
    Terminal(TerminalRecord),
    Admitted,
    Missing,
}

/// How an interrupted worker was settled by the watcher.
#[derive(Debug)]
pub(crate) enum InterruptSettlement {
    /// An explicit cancel owns (or already made) the transition.
    Explicit,
    /// No cancel was in flight; the task was moved to cancelled here.
    Implicit(Command),
    /// The task already left the admitted bucket some other way.
    Gone,
}
