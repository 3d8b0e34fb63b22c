use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;

/// Sends one webhook request and reports the HTTP status it came back with.
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn post(&self, url: &str, body: &Value) -> Result<u16, TransportError>;
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("webhook request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("webhook endpoint unreachable: {0}")]
    Unreachable(String),
}

/// reqwest-backed transport with a per-request timeout.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let http = Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn post(&self, url: &str, body: &Value) -> Result<u16, TransportError> {
        let response = self
            .http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|err| {
                if err.is_connect() || err.is_timeout() {
                    TransportError::Unreachable(err.to_string())
                } else {
                    TransportError::Request(err)
                }
            })?;
        Ok(response.status().as_u16())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn posts_json_and_returns_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/agents/agent-7/wake"))
            .and(body_json(json!({ "event_type": "message.received", "payload": {} })))
            .respond_with(ResponseTemplate::new(202))
            .expect(1)
            .mount(&server)
            .await;

        let transport = HttpTransport::new(Duration::from_secs(2)).expect("client builds");
        let status = transport
            .post(
                &format!("{}/agents/agent-7/wake", server.uri()),
                &json!({ "event_type": "message.received", "payload": {} }),
            )
            .await
            .expect("request succeeds");
        assert_eq!(status, 202);
    }

    #[tokio::test]
    async fn refused_connections_are_unreachable() {
        let transport = HttpTransport::new(Duration::from_millis(200)).expect("client builds");
        let result = transport
            .post("http://127.0.0.1:9/agents/a/wake", &json!({}))
            .await;
        assert!(matches!(result, Err(TransportError::Unreachable(_))));
    }
}
