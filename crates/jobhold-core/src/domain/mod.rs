//! Domain - ドメインモデル (ID、コマンド、結果、状態、エラー)
//!
//! 純粋なデータのみ。ここではタスクの spawn、ロック、外部との通信を行わない。

pub mod command;
pub mod errors;
pub mod ids;
pub mod outcome;
pub mod state;

pub use self::command::{
    Command, CommandBuilder, DEFAULT_MAX_QUEUE_MINUTES, DEFAULT_MAX_RUNTIME_MINUTES, OperationKind,
    TaskSignature,
};
pub use self::errors::{JobError, TrackerError};
pub use self::ids::{ParseTaskIdError, TaskId};
pub use self::outcome::{Answer, Retrieval, TaskResult};
pub use self::state::TaskState;
