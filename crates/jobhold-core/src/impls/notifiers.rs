//! Notifiers - プロセス外に出ない通知ゲートウェイ
//!
//! - **LogNotifier**: 通知を tracing ログに書き出す
//! - **MemoryNotifier**: 検査用に通知を保持する (失敗させることも可能)

use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use tracing::info;

use crate::ports::{NotificationGateway, NotifyError};

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl NotificationGateway for LogNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        info!(recipient, subject, body, "notification");
        Ok(())
    }
}

/// One delivered notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotice {
    pub recipient: String,
    pub subject: String,
    pub body: String,
}

#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<SentNotice>>,
    fail: bool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentNotice> {
        self.lock().clone()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<SentNotice>> {
        self.sent.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl NotificationGateway for MemoryNotifier {
    async fn send(&self, recipient: &str, subject: &str, body: &str) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Delivery("gateway configured to fail".to_string()));
        }
        self.lock().push(SentNotice {
            recipient: recipient.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_notifier_keeps_notices() {
        let notifier = MemoryNotifier::new();
        notifier.send("u1", "subject", "body").await.unwrap();

        let sent = notifier.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, "u1");
    }

    #[tokio::test]
    async fn failing_notifier_errors_and_records_nothing() {
        let notifier = MemoryNotifier::failing();
        assert!(matches!(
            notifier.send("u1", "s", "b").await,
            Err(NotifyError::Delivery(_))
        ));
        assert!(notifier.sent().is_empty());
    }

    #[tokio::test]
    async fn log_notifier_always_succeeds() {
        assert!(LogNotifier.send("u1", "s", "b").await.is_ok());
    }
}
