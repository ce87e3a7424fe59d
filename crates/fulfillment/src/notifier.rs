//! Outbound notifications.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::messages::Message;

/// Fire-and-forget message delivery (email in production).
///
/// Implementations report failure through the return value and never error;
/// the engine decides what a failed send means.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, to: &str, subject: &str, text: &str, html: &str) -> bool;
}

/// Writes every message to the log and reports success.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, to: &str, subject: &str, text: &str, _html: &str) -> bool {
        tracing::info!(to, subject, body = text, "notification sent");
        true
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub to: String,
    pub subject: String,
    pub text: String,
    pub html: String,
}

/// Keeps every delivered message in memory. Can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<SentMessage>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// While set, every send fails and nothing is recorded.
    pub fn set_fail(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub async fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub async fn sent_to(&self, to: &str) -> Vec<SentMessage> {
        self.sent
            .lock()
            .await
            .iter()
            .filter(|m| m.to == to)
            .cloned()
            .collect()
    }

    pub async fn clear(&self) {
        self.sent.lock().await.clear();
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, to: &str, subject: &str, text: &str, html: &str) -> bool {
        if self.fail.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.lock().await.push(SentMessage {
            to: to.to_string(),
            subject: subject.to_string(),
            text: text.to_string(),
            html: html.to_string(),
        });
        true
    }
}

/// Sends `message`, counting and logging a failure instead of propagating it.
pub(crate) async fn deliver(notifier: &dyn Notifier, to: &str, message: &Message) -> bool {
    let delivered = notifier
        .send(to, &message.subject, &message.text, &message.html)
        .await;
    if !delivered {
        metrics::counter!("notifications_failed_total").increment(1);
        tracing::warn!(to, subject = %message.subject, "notification not delivered");
    }
    delivered
}
