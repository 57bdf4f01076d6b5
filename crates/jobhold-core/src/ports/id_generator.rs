//! IdGenerator port - タスク ID 生成
//!
//! # 実装
//! - **UlidGenerator**: タイムスタンプ部分を注入された Clock から取る ULID

use crate::domain::TaskId;
use crate::ports::Clock;
use ulid::Ulid;

pub trait IdGenerator: Send + Sync {
    fn generate_task_id(&self) -> TaskId;
}

/// ULID-based generator.
///
/// The timestamp half is taken from the clock, so a [`FixedClock`](crate::ports::FixedClock)
/// yields ids with a deterministic time prefix (the random half still differs).
pub struct UlidGenerator<C> {
    clock: C,
}

impl<C: Clock> UlidGenerator<C> {
    pub fn new(clock: C) -> Self {
        Self { clock }
    }
}

impl<C: Clock> IdGenerator for UlidGenerator<C> {
    fn generate_task_id(&self) -> TaskId {
        let timestamp_ms = self.clock.now().timestamp_millis().max(0) as u64;
        TaskId::from(Ulid::from_parts(timestamp_ms, rand::random()))
    }
}
