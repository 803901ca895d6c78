use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc::Sender;

/// What a feed client reports to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum FeedEvent {
    /// One raw spot message, undecoded.
    Message(String),
    Connected { topics: Vec<String> },
    Disconnected { reason: String },
}

#[derive(Debug, Error)]
pub enum FeedError {
    #[error("feed connect failed: {0}")]
    Connect(String),

    #[error("feed subscribe failed: {0}")]
    Subscribe(String),

    #[error("feed stream failed: {0}")]
    Stream(String),

    #[error("event receiver dropped")]
    ReceiverGone,
}

/// Source of spot messages. `run` only returns once the receiving side is
/// gone; connection failures are reported as events and retried.
#[async_trait]
pub trait SpotFeed: Send + Sync {
    async fn run(&self, events: Sender<FeedEvent>) -> Result<(), FeedError>;
}
