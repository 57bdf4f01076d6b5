//! Tracker - コーディネータの公開インターフェース
//!
//! clone は安価。どの clone も同じレジストリ、ワーカープール、sweeper を操作する。

use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::{Instrument, info, info_span};

use crate::app::arbiter;
use crate::app::config::TrackerConfig;
use crate::app::shared::Shared;
use crate::app::status::RegistryCounts;
use crate::app::supervisor::{self, PreparedLaunch};
use crate::app::sweeper::{self, SweepReport, Sweeper};
use crate::domain::{
    Command, CommandBuilder, JobError, OperationKind, Retrieval, TaskId, TaskResult, TaskState,
    TrackerError,
};
use crate::ports::Job;
use crate::registry::{Lookup, TerminalRecord};

/// # Example
/// ```ignore
/// let tracker = TrackerBuilder::new().build()?;
/// tracker.spawn_sweeper();
///
/// let command = tracker.new_command("u1", "diffExAnalysis").target_entity("ee42").build();
/// let task_id = tracker.submit(JobFn::new(command, |_ctx| async { Ok(json!(1)) })).await?;
///
/// match tracker.check_result(task_id).await? {
///     Retrieval::Ready(result) => println!("{:?}", result.answer),
///     other => println!("{other:?}"),
/// }
/// ```
#[derive(Clone)]
pub struct Tracker {
    shared: Arc<Shared>,
}

impl Tracker {
    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.shared.config
    }

    /// Starts a command with a fresh task id and the configured time limits.
    pub fn new_command(
        &self,
        submitter: impl Into<String>,
        operation: impl Into<OperationKind>,
    ) -> CommandBuilder {
        let config = &self.shared.config;
        Command::builder(self.shared.ids.generate_task_id(), submitter, operation)
            .max_queue_minutes(config.default_max_queue_minutes)
            .max_runtime_minutes(config.default_max_runtime_minutes)
    }

    pub async fn submit<J: Job>(&self, job: J) -> Result<TaskId, TrackerError> {
        self.submit_arc(Arc::new(job)).await
    }

    /// Admits the job and schedules it. Returns without waiting for it to run.
    ///
    /// # Errors
    /// - `DuplicateTask` if the task id is already known
    /// - `Conflict` if an admitted task shares the conflict key
    pub async fn submit_arc(&self, job: Arc<dyn Job>) -> Result<TaskId, TrackerError> {
        let shared = &self.shared;
        let mut command = job.command().clone();
        let task_id = command.task_id();

        let _admission = shared.admission.lock().await;
        if shared.registry.state_of(task_id).await.is_some() {
            return Err(TrackerError::DuplicateTask(task_id));
        }
        arbiter::arbitrate(shared, &command).await?;

        command.mark_submitted(shared.clock.now());
        let (launch, handle) = PreparedLaunch::new(shared, job);
        if !shared.registry.admit(command.clone(), handle).await {
            return Err(TrackerError::DuplicateTask(task_id));
        }
        shared.progress.create_progress_job(&command);
        launch.launch(shared, task_id);

        info!(
            %task_id,
            submitter = command.submitter(),
            operation = %command.operation(),
            "task admitted"
        );
        Ok(task_id)
    }

    /// Cancels an admitted task.
    ///
    /// `Ok(false)` if the task is unknown or settled some other way first.
    pub async fn cancel(&self, task_id: TaskId) -> Result<bool, TrackerError> {
        supervisor::cancel(&self.shared, task_id).await
    }

    /// Retrieves and releases a terminal result.
    ///
    /// # Errors
    /// - `Execution` carrying the job's error if the task failed
    pub async fn check_result(&self, task_id: TaskId) -> Result<Retrieval, TrackerError> {
        let record = match self.shared.registry.retrieve(task_id).await {
            Lookup::Terminal(record) => record,
            Lookup::Admitted => return Ok(Retrieval::StillRunning),
            Lookup::Missing => return Ok(Retrieval::Unknown),
        };
        self.shared.progress.forget(task_id);

        match record {
            TerminalRecord::Finished(result) => Ok(Retrieval::Ready(result)),
            TerminalRecord::Failed(result) => Err(TrackerError::Execution {
                task_id,
                source: result
                    .error
                    .unwrap_or_else(|| JobError::failed("task failed without an error")),
            }),
            TerminalRecord::Cancelled(_) => Ok(Retrieval::Cancelled),
        }
    }

    /// Asks for a notification when the task ends. Only while admitted.
    pub async fn set_email_alert(&self, task_id: TaskId) -> Result<(), TrackerError> {
        if self.shared.registry.set_email_alert(task_id).await {
            Ok(())
        } else {
            Err(TrackerError::UnknownTask(task_id))
        }
    }

    pub async fn list_admitted(&self) -> Vec<Command> {
        self.shared.registry.admitted_commands().await
    }

    pub async fn list_finished(&self) -> Vec<TaskResult> {
        self.shared.registry.finished_results().await
    }

    pub async fn list_failed(&self) -> Vec<TaskResult> {
        self.shared.registry.failed_results().await
    }

    pub async fn list_cancelled(&self) -> Vec<Command> {
        self.shared.registry.cancelled_commands().await
    }

    pub async fn state_of(&self, task_id: TaskId) -> Option<TaskState> {
        self.shared.registry.state_of(task_id).await
    }

    pub async fn counts(&self) -> RegistryCounts {
        self.shared.registry.counts().await
    }

    /// Starts the periodic sweeper. It stops on [`Tracker::shutdown`].
    pub fn spawn_sweeper(&self) -> JoinHandle<()> {
        let sweeper = Sweeper::new(Arc::clone(&self.shared));
        tokio::spawn(sweeper.run().instrument(info_span!("sweeper")))
    }

    /// One sweeper pass, right now.
    pub async fn sweep_now(&self) -> SweepReport {
        sweeper::sweep_once(&self.shared).await
    }

    /// Interrupts every job and stops the sweeper.
    ///
    /// Interrupted jobs end up cancelled.
    pub fn shutdown(&self) {
        info!("tracker shutting down");
        self.shared.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shared.shutdown.is_cancelled()
    }
}
