//! Status - ダッシュボード/ログ向けのレジストリスナップショット

use serde::{Deserialize, Serialize};

/// Bucket sizes at one instant. `queued + running` is the admitted bucket.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCounts {
    pub queued: usize,
    pub running: usize,
    pub finished: usize,
    pub failed: usize,
    pub cancelled: usize,
}

impl RegistryCounts {
    pub fn admitted(&self) -> usize {
        self.queued + self.running
    }

    pub fn is_empty(&self) -> bool {
        self.admitted() + self.finished + self.failed + self.cancelled == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn admitted_is_queued_plus_running() {
        let counts = RegistryCounts {
            queued: 2,
            running: 3,
            ..Default::default()
        };
        assert_eq!(counts.admitted(), 5);
        assert!(!counts.is_empty());
        assert!(RegistryCounts::default().is_empty());
    }
}
