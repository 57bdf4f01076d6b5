//! Conflict arbiter - 衝突キーの調停
//!
//! 同じ衝突キーを持つ admitted タスクは常に高々1つ。
//! `submit` の中で admission ロックを保持したまま呼ばれる。

use tracing::{info, warn};

use crate::app::shared::Shared;
use crate::app::sweeper;
use crate::domain::{Command, TaskState, TrackerError};

/// Rejects `submitted` if an admitted task shares its conflict key.
///
/// A matching task gets a timeout check first, so a stale duplicate is
/// cancelled instead of blocking the new one.
pub(crate) async fn arbitrate(shared: &Shared, submitted: &Command) -> Result<(), TrackerError> {
    for admitted in shared.registry.admitted_commands().await {
        if !submitted.conflicts_with(&admitted) {
            continue;
        }
        let conflicting = admitted.task_id();

        if let Err(e) = sweeper::check_admitted(shared, conflicting).await {
            warn!(task_id = %conflicting, error = %e, "timeout check on conflicting task failed");
        }

        if shared.registry.state_of(conflicting).await == Some(TaskState::Admitted) {
            info!(
                task_id = %submitted.task_id(),
                %conflicting,
                submitter = submitted.submitter(),
                operation = %submitted.operation(),
                "submission rejected: conflicting task is still admitted"
            );
            return Err(TrackerError::Conflict {
                submitted: submitted.task_id(),
                conflicting,
            });
        }
    }
    Ok(())
}
