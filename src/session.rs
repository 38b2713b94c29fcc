//! Process-lifetime log of outbound side effects.

use std::sync::Arc;

use tokio::sync::RwLock;

use crate::backend::messaging::SmsReceipt;

/// Append-only record of messages sent in demo mode.
///
/// Cloning yields another handle onto the same log. The log is unbounded and
/// lives as long as the process.
#[derive(Debug, Clone, Default)]
pub struct SessionState {
    sent: Arc<RwLock<Vec<SmsReceipt>>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_sent(&self, receipt: SmsReceipt) {
        self.sent.write().await.push(receipt);
    }

    /// Snapshot of the log in append order
    pub async fn sent_messages(&self) -> Vec<SmsReceipt> {
        self.sent.read().await.clone()
    }

    pub async fn sent_count(&self) -> usize {
        self.sent.read().await.len()
    }
}
