//! State - タスクが属するレジストリのバケット

use serde::{Deserialize, Serialize};

/// Lifecycle state of a task.
///
/// # Transitions
/// - Admitted -> Finished
/// - Admitted -> Failed
/// - Admitted -> Cancelled
///
/// All transitions are one-way. `Admitted` covers both queued and running;
/// the command's `start_time` tells them apart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    Admitted,
    Finished,
    Failed,
    Cancelled,
}

impl TaskState {
    /// Is this a terminal state (no further transitions)?
    pub fn is_terminal(self) -> bool {
        !matches!(self, TaskState::Admitted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_serializes_snake_case() {
        let s = serde_json::to_string(&TaskState::Cancelled).unwrap();
        assert_eq!(s, "\"cancelled\"");
    }

    #[test]
    fn only_admitted_is_non_terminal() {
        assert!(!TaskState::Admitted.is_terminal());
        assert!(TaskState::Finished.is_terminal());
        assert!(TaskState::Failed.is_terminal());
        assert!(TaskState::Cancelled.is_terminal());
    }
}
