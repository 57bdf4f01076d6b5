//! Ports - 抽象化レイヤー
//!
//! このモジュールは Hexagonal Architecture の「ポート」を定義します。
//! 各トレイトは `Arc<dyn _>` として tracker に注入され、本番の配線とテストで
//! 実装を自由に差し替えられる。
//!
//! - **Job**: 作業本体
//! - **ProgressReporter**: ユーザーに見える進捗ログ
//! - **NotificationGateway**: 完了通知
//! - **RemoteBackend**: 任意の外部計算基盤
//! - **Clock** / **IdGenerator**: 時刻と ID

pub mod clock;
pub mod id_generator;
pub mod job;
pub mod notifier;
pub mod progress;
pub mod remote;

pub use self::clock::{Clock, FixedClock, SystemClock};
pub use self::id_generator::{IdGenerator, UlidGenerator};
pub use self::job::{Job, JobContext};
pub use self::notifier::{NotificationGateway, NotifyError};
pub use self::progress::{NoopProgress, ProgressReporter};
pub use self::remote::RemoteBackend;
