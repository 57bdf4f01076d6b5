//! Impls - インプロセスのコラボレータ実装
//!
//! # 含まれる実装
//! - **InMemoryProgress**: メモリ上の進捗ログ
//! - **LogNotifier** / **MemoryNotifier**: 通知ゲートウェイ
//! - **LocalOnly** / **SwitchableRemote**: リモートバックエンド
//! - **JobFn**: クロージャベースのジョブ
//!
//! 実際のメール配信やグリッドバックエンドは別クレートで実装する。

pub mod inmem_progress;
pub mod job_fn;
pub mod notifiers;
pub mod remote;

pub use self::inmem_progress::{InMemoryProgress, ProgressSignal};
pub use self::job_fn::JobFn;
pub use self::notifiers::{LogNotifier, MemoryNotifier, SentNotice};
pub use self::remote::{LocalOnly, SwitchableRemote};
