use std::error::Error;
use std::sync::Arc;

use async_trait::async_trait;
use jobhold_core::impls::InMemoryProgress;
use jobhold_core::ports::ProgressReporter;
use jobhold_core::{
    Answer, Command, Job, JobContext, JobError, Retrieval, TaskId, Tracker, TrackerBuilder,
    TrackerConfig, TrackerError,
};
use serde::Deserialize;
use tokio::time::{Duration, sleep};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Deserialize)]
struct DiffExPayload {
    experiment: String,
    probes: Vec<String>,
    /// Pause per probe, to make cancellation observable.
    #[serde(default)]
    millis_per_probe: u64,
}

/// Pretend differential expression: counts probes, one checkpoint each.
struct DiffExJob {
    command: Command,
    payload: DiffExPayload,
}

impl DiffExJob {
    fn new(command: Command, payload: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            command,
            payload: serde_json::from_str(payload)?,
        })
    }
}

#[async_trait]
impl Job for DiffExJob {
    fn command(&self) -> &Command {
        &self.command
    }

    async fn run(&self, ctx: JobContext) -> Result<Answer, JobError> {
        if self.payload.probes.is_empty() {
            return Err(JobError::failed(format!(
                "experiment {} has no probes",
                self.payload.experiment
            )));
        }
        for (i, probe) in self.payload.probes.iter().enumerate() {
            ctx.checkpoint()?;
            ctx.report(format!("analysing probe {probe} ({}/{})", i + 1, self.payload.probes.len()));
            sleep(Duration::from_millis(self.payload.millis_per_probe)).await;
        }
        Ok(serde_json::json!({
            "experiment": self.payload.experiment,
            "analysed": self.payload.probes.len(),
        }))
    }
}

fn load_config() -> Result<TrackerConfig, Box<dyn Error>> {
    match std::env::args().nth(1) {
        Some(path) => {
            let text = std::fs::read_to_string(&path)?;
            let config = TrackerConfig::from_toml_str(&text)?;
            info!(%path, "loaded tracker config");
            Ok(config)
        }
        None => Ok(TrackerConfig::default()),
    }
}

/// Polls until the task leaves the admitted bucket.
async fn await_result(tracker: &Tracker, task_id: TaskId) -> Result<Retrieval, TrackerError> {
    loop {
        match tracker.check_result(task_id).await? {
            Retrieval::StillRunning => sleep(Duration::from_millis(20)).await,
            other => return Ok(other),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // (A) tracker + sweeper
    let progress = Arc::new(InMemoryProgress::new());
    let tracker = TrackerBuilder::new()
        .with_config(load_config()?)
        .with_progress(progress.clone())
        .build()?;
    let sweeper = tracker.spawn_sweeper();

    // (B) a job that succeeds
    let command = tracker
        .new_command("u1", "diffExAnalysis")
        .target_entity("ee42")
        .max_runtime_minutes(30)
        .build();
    let j1 = DiffExJob::new(
        command,
        r#"{"experiment": "ee42", "probes": ["p1", "p2", "p3"], "millis_per_probe": 50}"#,
    )?;
    let t1 = tracker.submit(j1).await?;
    println!("submitted {t1}");

    // (C) same submitter, operation and target while t1 is admitted
    let command = tracker
        .new_command("u1", "diffExAnalysis")
        .target_entity("ee42")
        .build();
    let j2 = DiffExJob::new(command, r#"{"experiment": "ee42", "probes": ["p1"]}"#)?;
    match tracker.submit(j2).await {
        Err(TrackerError::Conflict { conflicting, .. }) => {
            println!("rejected duplicate: conflicts with {conflicting}")
        }
        other => println!("unexpected admission outcome: {other:?}"),
    }

    match await_result(&tracker, t1).await? {
        Retrieval::Ready(result) => println!("{t1} finished: {:?}", result.answer),
        other => println!("{t1}: {other:?}"),
    }
    println!("{t1} again: {:?}", tracker.check_result(t1).await?);

    // (D) a job that fails
    let command = tracker.new_command("u2", "diffExAnalysis").build();
    let j3 = DiffExJob::new(command, r#"{"experiment": "ee7", "probes": []}"#)?;
    let t3 = tracker.submit(j3).await?;
    match await_result(&tracker, t3).await {
        Err(e) => println!("{t3} failed: {e}"),
        Ok(other) => println!("{t3}: {other:?}"),
    }

    // (E) a job that gets cancelled halfway
    let command = tracker.new_command("u3", "diffExAnalysis").build();
    let j4 = DiffExJob::new(
        command,
        r#"{"experiment": "ee9", "probes": ["a", "b", "c", "d", "e", "f"], "millis_per_probe": 200}"#,
    )?;
    let t4 = tracker.submit(j4).await?;
    sleep(Duration::from_millis(300)).await;
    println!("cancel {t4}: {}", tracker.cancel(t4).await?);
    println!("{t4}: {:?}", tracker.check_result(t4).await?);
    for line in progress.messages(t4) {
        println!("  {t4} | {line}");
    }

    println!("counts: {:?}", tracker.counts().await);

    // (F) stop
    tracker.shutdown();
    sweeper.await?;
    Ok(())
}
