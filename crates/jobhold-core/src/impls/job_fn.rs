//! JobFn - コマンドと async クロージャから作る Job

use std::future::Future;

use async_trait::async_trait;

use crate::domain::{Answer, Command, JobError};
use crate::ports::{Job, JobContext};

/// # Example
/// ```ignore
/// let job = JobFn::new(command, |ctx| async move {
///     ctx.report("crunching");
///     ctx.checkpoint()?;
///     Ok(serde_json::json!(42))
/// });
/// tracker.submit(job).await?;
/// ```
pub struct JobFn<F> {
    command: Command,
    body: F,
}

impl<F, Fut> JobFn<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Answer, JobError>> + Send + 'static,
{
    pub fn new(command: Command, body: F) -> Self {
        Self { command, body }
    }
}

#[async_trait]
impl<F, Fut> Job for JobFn<F>
where
    F: Fn(JobContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Answer, JobError>> + Send + 'static,
{
    fn command(&self) -> &Command {
        &self.command
    }

    async fn run(&self, ctx: JobContext) -> Result<Answer, JobError> {
        (self.body)(ctx).await
    }
}
