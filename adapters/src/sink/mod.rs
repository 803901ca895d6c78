pub mod discovery;
pub mod transport;

pub use discovery::{DiscoveryConfig, DiscoverySink};
pub use transport::{HttpTransport, LogTransport, TopicMessage, TopicTransport};
