//! Fire-and-forget webhook notifications to counterparty agents.
//!
//! Callers only ever hand a [`Notification`] to a [`NotificationPublisher`];
//! delivery happens later on a background worker that runs the
//! [`NotificationDispatcher`] retry loop. Delivery outcomes never flow back to
//! the operation that produced the event.

mod dispatcher;
mod transport;

pub use dispatcher::{EndpointResolver, NotificationDispatcher, OrchestratorEndpoints};
pub use transport::{HttpTransport, TransportError, WebhookTransport};

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::tasks::{BackgroundQueue, QueueError};

pub const APPLICATION_RECEIVED: &str = "application.received";
pub const APPLICATION_STATUS_CHANGED: &str = "application.status_changed";
pub const MESSAGE_RECEIVED: &str = "message.received";

/// Event addressed to one marketplace participant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Notification {
    pub target_id: String,
    pub event_type: String,
    pub payload: Value,
}

impl Notification {
    pub fn new(target_id: impl Into<String>, event_type: &str, payload: Value) -> Self {
        Self {
            target_id: target_id.into(),
            event_type: event_type.to_string(),
            payload,
        }
    }
}

/// Outbound hook used by the admission service. Implementations must not block.
pub trait NotificationPublisher: Send + Sync {
    fn publish(&self, notification: Notification) -> Result<(), NotifyError>;
}

#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification not queued: {0}")]
    Queue(#[from] QueueError),
}

impl NotificationPublisher for BackgroundQueue<Notification> {
    fn publish(&self, notification: Notification) -> Result<(), NotifyError> {
        self.submit(notification)?;
        Ok(())
    }
}

/// Retry budget and wait times for webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub unavailable_cooldown: Duration,
    pub backoff_base: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            unavailable_cooldown: Duration::from_secs(30),
            backoff_base: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Wait after the failed attempt `attempt` (zero based): base, 2x base, 4x base.
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_base.saturating_mul(1u32 << attempt.min(16))
    }
}
