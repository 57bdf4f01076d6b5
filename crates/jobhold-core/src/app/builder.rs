//! TrackerBuilder - 依存の組み立てと起動時検証
//!
//! 明示的に渡されなかったコラボレータはインプロセスのデフォルト実装になる。
//! `build()` は設定を検証し、不正な値なら即座に失敗する (fail-fast)。

use std::sync::Arc;

use tokio::sync::{Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::app::config::{ConfigError, TrackerConfig};
use crate::app::shared::Shared;
use crate::app::tracker::Tracker;
use crate::impls::{InMemoryProgress, LocalOnly, LogNotifier};
use crate::ports::{
    Clock, IdGenerator, NotificationGateway, ProgressReporter, RemoteBackend, SystemClock,
    UlidGenerator,
};
use crate::registry::TaskRegistry;

/// # Example
/// ```ignore
/// let tracker = TrackerBuilder::new()
///     .with_config(TrackerConfig::from_toml_str(&text)?)
///     .with_notifier(Arc::new(SmtpGateway::new(...)))
///     .build()?;
/// ```
pub struct TrackerBuilder {
    config: TrackerConfig,
    clock: Arc<dyn Clock>,
    ids: Option<Arc<dyn IdGenerator>>,
    progress: Arc<dyn ProgressReporter>,
    notifier: Arc<dyn NotificationGateway>,
    remote: Arc<dyn RemoteBackend>,
}

#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl TrackerBuilder {
    pub fn new() -> Self {
        Self {
            config: TrackerConfig::default(),
            clock: Arc::new(SystemClock),
            ids: None,
            progress: Arc::new(InMemoryProgress::new()),
            notifier: Arc::new(LogNotifier),
            remote: Arc::new(LocalOnly),
        }
    }

    pub fn with_config(mut self, config: TrackerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Defaults to a ULID generator on the builder's clock.
    pub fn with_id_generator(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = Some(ids);
        self
    }

    pub fn with_progress(mut self, progress: Arc<dyn ProgressReporter>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn NotificationGateway>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_remote(mut self, remote: Arc<dyn RemoteBackend>) -> Self {
        self.remote = remote;
        self
    }

    /// # Errors
    /// - `BuildError::Config` if the config does not validate
    pub fn build(self) -> Result<Tracker, BuildError> {
        self.config.validate()?;

        let ids = self
            .ids
            .unwrap_or_else(|| Arc::new(UlidGenerator::new(Arc::clone(&self.clock))));
        let shared = Shared {
            registry: TaskRegistry::new(),
            clock: self.clock,
            ids,
            progress: self.progress,
            notifier: self.notifier,
            remote: self.remote,
            admission: Mutex::new(()),
            workers: Arc::new(Semaphore::new(self.config.max_concurrent_jobs)),
            shutdown: CancellationToken::new(),
            config: self.config,
        };
        Ok(Tracker::from_shared(Arc::new(shared)))
    }
}

impl Default for TrackerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
