use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info, instrument};

use engine::sink::SinkError;

/// One retained-or-not message for a topic-addressed broker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TopicMessage {
    pub topic: String,
    pub payload: String,
    pub retain: bool,
}

#[async_trait]
pub trait TopicTransport: Send + Sync {
    async fn send(&self, message: TopicMessage) -> Result<(), SinkError>;
}

/// Dry-run transport: logs every message instead of sending it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTransport;

#[async_trait]
impl TopicTransport for LogTransport {
    async fn send(&self, message: TopicMessage) -> Result<(), SinkError> {
        info!(
            topic = %message.topic,
            retain = message.retain,
            bytes = message.payload.len(),
            "publish (dry run)"
        );
        debug!(payload = %message.payload, "dry run payload");
        Ok(())
    }
}

/// POSTs each message as JSON `{topic, payload, retain}` to a broker bridge.
#[derive(Clone)]
pub struct HttpTransport {
    http: Client,
    url: String,
}

impl HttpTransport {
    pub fn new(url: String) -> Result<Self, SinkError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(5))
            .pool_idle_timeout(Duration::from_secs(30))
            .tcp_keepalive(Duration::from_secs(30))
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        Ok(Self { http, url })
    }
}

#[async_trait]
impl TopicTransport for HttpTransport {
    #[instrument(skip(self, message), fields(topic = %message.topic), level = "debug")]
    async fn send(&self, message: TopicMessage) -> Result<(), SinkError> {
        let resp = self
            .http
            .post(&self.url)
            .json(&message)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(SinkError::Rejected {
                entity: message.topic,
                reason: format!("bridge returned {status}"),
            });
        }
        Ok(())
    }
}
