//! jobhold-core
//!
//! 長時間実行のバックグラウンドジョブ向けインプロセス・コーディネータ。
//! 衝突調停付きの受け付け、並行数の上限付き実行、協調的キャンセル、
//! タイムアウト処理、一度だけ取得できる結果を提供する。
//!
//! # Modules
//! - **domain**: コマンド、結果、ID、状態、エラー
//! - **ports**: ジョブと外部コラボレータのトレイト
//! - **app**: tracker、ビルダー、設定、sweeper
//! - **impls**: インプロセスのコラボレータ実装

pub mod app;
pub mod domain;
pub mod impls;
pub mod ports;

mod registry;

pub use crate::app::{
    BuildError, ConfigError, RegistryCounts, SweepReport, Tracker, TrackerBuilder, TrackerConfig,
};
pub use crate::domain::{
    Answer, Command, CommandBuilder, JobError, OperationKind, Retrieval, TaskId, TaskResult,
    TaskSignature, TaskState, TrackerError,
};
pub use crate::ports::{Job, JobContext};
