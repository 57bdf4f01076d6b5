//! RemoteBackend port - 外部計算基盤
//!
//! `will_run_remotely` が立っているコマンドでのみ参照される。

use async_trait::async_trait;

use crate::domain::TaskId;

#[async_trait]
pub trait RemoteBackend: Send + Sync {
    /// Ask the backend to stop the task. `true` if it reports the task gone.
    async fn cancel(&self, task_id: TaskId) -> bool;

    async fn is_running(&self, task_id: TaskId) -> bool;

    async fn healthy(&self) -> bool;
}
