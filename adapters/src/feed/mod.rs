//! PSKReporter feed over a WebSocket JSON relay.

pub mod backoff;
pub mod topics;
pub mod ws;

pub use backoff::Backoff;
pub use topics::subscription_topics;
pub use ws::WsSpotFeed;
