//! Domain identifiers
//!
//! タスク ID は ULID。生成時刻でソート可能で、協調なしに生成できる。
//! 表示形式は `task-<ULID>` で、その形式からパースし直せる。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ulid::Ulid;

const TASK_PREFIX: &str = "task-";

/// Identifier of a submitted task. Assigned when the Command is created and
/// never changed afterwards.
#[repr(transparent)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Ulid);

impl TaskId {
    pub fn from_ulid(ulid: Ulid) -> Self {
        Self(ulid)
    }

    /// Fresh id from the system clock. Prefer an `IdGenerator` inside the tracker.
    pub fn random() -> Self {
        Self(Ulid::new())
    }

    pub fn as_ulid(&self) -> Ulid {
        self.0
    }
}

impl From<Ulid> for TaskId {
    fn from(ulid: Ulid) -> Self {
        Self::from_ulid(ulid)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{TASK_PREFIX}{}", self.0)
    }
}

/// Error returned when a string is not a `task-<ULID>` id.
#[derive(Debug, thiserror::Error)]
#[error("invalid task id {input:?}")]
pub struct ParseTaskIdError {
    input: String,
}

impl FromStr for TaskId {
    type Err = ParseTaskIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.strip_prefix(TASK_PREFIX).unwrap_or(s);
        Ulid::from_string(raw)
            .map(TaskId)
            .map_err(|_| ParseTaskIdError {
                input: s.to_string(),
            })
    }
}
