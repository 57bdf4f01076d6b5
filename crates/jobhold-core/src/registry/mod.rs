//! Registry - 受け付けから取得までタスクが置かれる場所
//!
//! - **entry**: バケットごとのレコードと実行ハンドル
//! - **memory**: `TaskRegistry`、1つのロックの背後にある4つのバケット

pub(crate) mod entry;
pub(crate) mod memory;

pub(crate) use self::entry::{ExecutionHandle, InterruptSettlement, Lookup, TerminalRecord};
pub(crate) use self::memory::TaskRegistry;
