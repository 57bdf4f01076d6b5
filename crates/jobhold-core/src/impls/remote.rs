//! Remote backends - 実際の計算基盤を持たないリモートバックエンド

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::domain::TaskId;
use crate::ports::RemoteBackend;

/// For deployments where nothing runs remotely. Always healthy.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalOnly;

#[async_trait]
impl RemoteBackend for LocalOnly {
    async fn cancel(&self, _task_id: TaskId) -> bool {
        false
    }

    async fn is_running(&self, _task_id: TaskId) -> bool {
        false
    }

    async fn healthy(&self) -> bool {
        true
    }
}

/// Backend whose health can be flipped at runtime, for drills and tests.
#[derive(Debug)]
pub struct SwitchableRemote {
    healthy: AtomicBool,
    running: AtomicBool,
}

impl SwitchableRemote {
    pub fn new(healthy: bool) -> Self {
        Self {
            healthy: AtomicBool::new(healthy),
            running: AtomicBool::new(false),
        }
    }

    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// What `is_running` reports for every task.
    pub fn set_running(&self, running: bool) {
        self.running.store(running, Ordering::SeqCst);
    }
}

#[async_trait]
impl RemoteBackend for SwitchableRemote {
    async fn cancel(&self, _task_id: TaskId) -> bool {
        true
    }

    async fn is_running(&self, _task_id: TaskId) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    async fn healthy(&self) -> bool {
        self.healthy.load(Ordering::SeqCst)
    }
}
