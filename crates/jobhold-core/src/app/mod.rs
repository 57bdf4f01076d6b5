//! App - ポートから組み立てられるコーディネータ本体
//!
//! # 主要コンポーネント
//! - **TrackerBuilder**: 依存の注入と起動時検証
//! - **Tracker**: submit / cancel / check_result などの公開 API
//! - **arbiter**: 受け付け時の衝突検出
//! - **supervisor**: ジョブごとの worker + watcher、キャンセル
//! - **sweeper**: タイムアウト処理と結果の破棄
//! - **notification**: 完了通知

pub mod builder;
pub mod config;
pub mod status;
pub mod sweeper;
pub mod tracker;

mod arbiter;
mod notification;
mod shared;
mod supervisor;

pub use self::builder::{BuildError, TrackerBuilder};
pub use self::config::{ConfigError, TrackerConfig};
pub use self::status::RegistryCounts;
pub use self::sweeper::SweepReport;
pub use self::tracker::Tracker;
