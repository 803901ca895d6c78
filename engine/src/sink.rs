use async_trait::async_trait;
use thiserror::Error;

use crate::entity::{EntityId, EntityShape, Payload};

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("sink transport failed: {0}")]
    Transport(String),

    #[error("sink rejected `{entity}`: {reason}")]
    Rejected { entity: String, reason: String },

    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Consumer of published metrics.
#[async_trait]
pub trait MetricSink: Send + Sync {
    /// Announces an entity. Calling it again for the same id is harmless.
    async fn register(&self, id: &EntityId, shape: &EntityShape) -> Result<(), SinkError>;

    async fn publish(&self, id: &EntityId, payload: &Payload) -> Result<(), SinkError>;

    /// Bumped every time the sink's link comes back after an outage. A new
    /// value means the consumer may have lost what it was told, so every
    /// entity is announced again.
    fn link_epoch(&self) -> u64 {
        0
    }
}
