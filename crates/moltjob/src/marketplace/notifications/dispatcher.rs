use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::transport::{TransportError, WebhookTransport};
use super::{Notification, RetryPolicy};

const ACCEPTED: u16 = 202;
const NOT_FOUND: u16 = 404;
const GONE: u16 = 410;
const SERVICE_UNAVAILABLE: u16 = 503;

/// Maps a marketplace participant to the webhook URL of their agent.
pub trait EndpointResolver: Send + Sync {
    fn resolve(&self, target_id: &str) -> Option<String>;
}

/// Hosted agents reachable through the orchestrator at `{base}/agents/{agent_id}/wake`.
pub struct OrchestratorEndpoints {
    base_url: String,
    agents: RwLock<HashMap<String, String>>,
}

impl OrchestratorEndpoints {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            agents: RwLock::new(HashMap::new()),
        }
    }

    /// Record which hosted agent acts for `participant_id`.
    pub fn register(&self, participant_id: impl Into<String>, agent_id: impl Into<String>) {
        let mut agents = match self.agents.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        agents.insert(participant_id.into(), agent_id.into());
    }
}

impl EndpointResolver for OrchestratorEndpoints {
    fn resolve(&self, target_id: &str) -> Option<String> {
        let agents = match self.agents.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        agents
            .get(target_id)
            .map(|agent_id| format!("{}/agents/{}/wake", self.base_url, agent_id))
    }
}

enum Verdict {
    Delivered,
    Permanent,
    Retry(Duration),
    Unexpected,
}

/// Delivers event envelopes with a bounded retry budget.
pub struct NotificationDispatcher {
    resolver: Arc<dyn EndpointResolver>,
    transport: Arc<dyn WebhookTransport>,
    policy: RetryPolicy,
}

impl NotificationDispatcher {
    pub fn new(
        resolver: Arc<dyn EndpointResolver>,
        transport: Arc<dyn WebhookTransport>,
        policy: RetryPolicy,
    ) -> Self {
        Self {
            resolver,
            transport,
            policy,
        }
    }

    pub async fn dispatch(&self, notification: Notification) -> bool {
        self.deliver(
            &notification.target_id,
            &notification.event_type,
            &notification.payload,
        )
        .await
    }

    /// Best effort. Every failure is logged here and reported as `false`.
    pub async fn deliver(&self, target_id: &str, event_type: &str, payload: &Value) -> bool {
        let Some(url) = self.resolver.resolve(target_id) else {
            debug!(target_id, event_type, "no webhook endpoint registered; skipping");
            return false;
        };
        let envelope = json!({ "event_type": event_type, "payload": payload });

        for attempt in 0..=self.policy.max_retries {
            let result = self.transport.post(&url, &envelope).await;
            match self.classify(&result, attempt) {
                Verdict::Delivered => {
                    info!(target_id, event_type, attempt, "webhook delivered");
                    return true;
                }
                Verdict::Permanent => {
                    warn!(
                        target_id,
                        event_type,
                        status = ?result.ok(),
                        "webhook target gone; not retrying"
                    );
                    return false;
                }
                Verdict::Unexpected => {
                    error!(
                        target_id,
                        event_type,
                        status = ?result.ok(),
                        "unexpected webhook status"
                    );
                    return false;
                }
                Verdict::Retry(wait) => {
                    if attempt == self.policy.max_retries {
                        break;
                    }
                    match &result {
                        Ok(status) => warn!(
                            target_id,
                            event_type,
                            attempt,
                            status,
                            wait_ms = wait.as_millis() as u64,
                            "webhook attempt failed; retrying"
                        ),
                        Err(err) => warn!(
                            target_id,
                            event_type,
                            attempt,
                            error = %err,
                            wait_ms = wait.as_millis() as u64,
                            "webhook attempt failed; retrying"
                        ),
                    }
                    tokio::time::sleep(wait).await;
                }
            }
        }

        error!(
            target_id,
            event_type,
            retries = self.policy.max_retries,
            "webhook retry budget exhausted"
        );
        false
    }

    fn classify(&self, result: &Result<u16, TransportError>, attempt: u32) -> Verdict {
        match result {
            Ok(ACCEPTED) => Verdict::Delivered,
            Ok(NOT_FOUND | GONE) => Verdict::Permanent,
            Ok(SERVICE_UNAVAILABLE) => Verdict::Retry(self.policy.unavailable_cooldown),
            Ok(status) if (500..600).contains(status) => {
                Verdict::Retry(self.policy.backoff(attempt))
            }
            Ok(_) => Verdict::Unexpected,
            Err(_) => Verdict::Retry(self.policy.backoff(attempt)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<u16, TransportError>>>,
        calls: Mutex<Vec<(String, Value)>>,
    }

    impl ScriptedTransport {
        fn new(responses: Vec<Result<u16, TransportError>>) -> Arc<Self> {
            Arc::new(Self {
                responses: Mutex::new(responses.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<(String, Value)> {
            self.calls.lock().expect("calls mutex poisoned").clone()
        }
    }

    #[async_trait]
    impl WebhookTransport for ScriptedTransport {
        async fn post(&self, url: &str, body: &Value) -> Result<u16, TransportError> {
            self.calls
                .lock()
                .expect("calls mutex poisoned")
                .push((url.to_string(), body.clone()));
            self.responses
                .lock()
                .expect("responses mutex poisoned")
                .pop_front()
                .unwrap_or(Ok(ACCEPTED))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_retries: 2,
            unavailable_cooldown: Duration::from_millis(1),
            backoff_base: Duration::from_millis(1),
        }
    }

    fn dispatcher(transport: Arc<ScriptedTransport>) -> NotificationDispatcher {
        let endpoints = OrchestratorEndpoints::new("http://orchestrator.test/");
        endpoints.register("user-1", "agent-1");
        NotificationDispatcher::new(Arc::new(endpoints), transport, fast_policy())
    }

    #[tokio::test]
    async fn accepted_status_delivers_envelope() {
        let transport = ScriptedTransport::new(vec![Ok(202)]);
        let delivered = dispatcher(transport.clone())
            .deliver("user-1", "message.received", &json!({ "id": "m-1" }))
            .await;

        assert!(delivered);
        let calls = transport.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "http://orchestrator.test/agents/agent-1/wake");
        assert_eq!(
            calls[0].1,
            json!({ "event_type": "message.received", "payload": { "id": "m-1" } })
        );
    }

    #[tokio::test]
    async fn gone_targets_fail_without_retry() {
        for status in [404, 410] {
            let transport = ScriptedTransport::new(vec![Ok(status)]);
            let delivered = dispatcher(transport.clone())
                .deliver("user-1", "message.received", &json!({}))
                .await;
            assert!(!delivered);
            assert_eq!(transport.calls().len(), 1);
        }
    }

    #[tokio::test]
    async fn transient_failures_retry_until_accepted() {
        let transport = ScriptedTransport::new(vec![
            Ok(503),
            Err(TransportError::Unreachable("connection reset".to_string())),
            Ok(202),
        ]);
        let delivered = dispatcher(transport.clone())
            .deliver("user-1", "application.received", &json!({}))
            .await;
        assert!(delivered);
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn budget_exhaustion_stops_after_three_attempts() {
        let transport = ScriptedTransport::new(vec![Ok(500), Ok(502), Ok(500), Ok(202)]);
        let delivered = dispatcher(transport.clone())
            .deliver("user-1", "application.received", &json!({}))
            .await;
        assert!(!delivered);
        assert_eq!(transport.calls().len(), 3);
    }

    #[tokio::test]
    async fn unexpected_status_is_not_retried() {
        let transport = ScriptedTransport::new(vec![Ok(400)]);
        let delivered = dispatcher(transport.clone())
            .deliver("user-1", "application.received", &json!({}))
            .await;
        assert!(!delivered);
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn unregistered_targets_are_skipped() {
        let transport = ScriptedTransport::new(Vec::new());
        let delivered = dispatcher(transport.clone())
            .dispatch(Notification::new("stranger", "message.received", json!({})))
            .await;
        assert!(!delivered);
        assert!(transport.calls().is_empty());
    }

    #[tokio::test]
    async fn cooldown_applies_to_unavailable_responses() {
        let transport = ScriptedTransport::new(vec![Ok(503), Ok(202)]);
        let policy = RetryPolicy {
            max_retries: 2,
            unavailable_cooldown: Duration::from_millis(40),
            backoff_base: Duration::from_millis(1),
        };
        let endpoints = OrchestratorEndpoints::new("http://orchestrator.test");
        endpoints.register("user-1", "agent-1");
        let dispatcher = NotificationDispatcher::new(Arc::new(endpoints), transport, policy);

        let started = std::time::Instant::now();
        assert!(dispatcher.deliver("user-1", "x", &json!({})).await);
        assert!(started.elapsed() >= Duration::from_millis(40));
    }
}
