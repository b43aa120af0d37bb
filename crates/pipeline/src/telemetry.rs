//! Out-of-band decision logging. §1 Non-goals list the webhook as out of
//! scope for the core's *behavior*, but SPEC_FULL.md keeps the ambient sink
//! the teacher always carries: a trait with a no-op default and an optional
//! `reqwest`-backed implementation, gated on `telemetry.webhook_url`.

use async_trait::async_trait;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct TelemetryEvent {
    pub session_id: String,
    pub hook_event_name: String,
    pub tool_name: Option<String>,
    pub decision: String,
    pub reason: Option<String>,
    pub latency_ms: u64,
}

#[async_trait]
pub trait WebhookSink: Send + Sync {
    async fn send(&self, event: &TelemetryEvent);
}

pub struct NoopWebhookSink;

#[async_trait]
impl WebhookSink for NoopWebhookSink {
    async fn send(&self, _event: &TelemetryEvent) {}
}

pub struct ReqwestWebhookSink {
    client: reqwest::Client,
    url: String,
}

impl ReqwestWebhookSink {
    pub fn new(url: impl Into<String>) -> Self {
        Self { client: reqwest::Client::new(), url: url.into() }
    }
}

#[async_trait]
impl WebhookSink for ReqwestWebhookSink {
    async fn send(&self, event: &TelemetryEvent) {
        if let Err(err) = self.client.post(&self.url).json(event).send().await {
            tracing::warn!(error = %err, "webhook delivery failed");
        }
    }
}

/// Build the configured sink: `Noop` when `webhook_url` is empty, a real
/// `reqwest`-backed sink otherwise.
pub fn sink_for(webhook_url: &str) -> Box<dyn WebhookSink> {
    if webhook_url.is_empty() {
        Box::new(NoopWebhookSink)
    } else {
        Box::new(ReqwestWebhookSink::new(webhook_url.to_string()))
    }
}
