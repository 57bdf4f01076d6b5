//! Shared state - tracker ハンドル、worker、watcher、sweeper が共有する状態

use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::app::config::TrackerConfig;
use crate::ports::{Clock, IdGenerator, NotificationGateway, ProgressReporter, RemoteBackend};
use crate::registry::TaskRegistry;

pub(crate) struct Shared {
    pub(crate) registry: TaskRegistry,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) ids: Arc<dyn IdGenerator>,
    pub(crate) progress: Arc<dyn ProgressReporter>,
    pub(crate) notifier: Arc<dyn NotificationGateway>,
    pub(crate) remote: Arc<dyn RemoteBackend>,
    pub(crate) config: TrackerConfig,
    /// Serializes arbitration + insertion, and the sweeper's per-task checks.
    pub(crate) admission: Mutex<()>,
    pub(crate) workers: Arc<Semaphore>,
    /// Parent of every task token and of the sweeper loop.
    pub(crate) shutdown: CancellationToken,
}
