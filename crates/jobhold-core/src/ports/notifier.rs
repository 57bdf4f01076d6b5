//! NotificationGateway port - 完了通知の送信 (メールなど)
//!
//! 配信エラーは tracker がログに出して処理を続ける。`submit`、`cancel`、
//! `check_result` の呼び出し側には届かない。

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no address known for recipient {0}")]
    UnknownRecipient(String),

    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// `recipient` is the task's submitter id; resolving it to an address is the
/// gateway's job.
#[async_trait]
pub trait NotificationGateway: Send + Sync {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError>;
}
