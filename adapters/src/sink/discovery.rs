//! Home-Assistant-style MQTT discovery mapping.
//!
//! `register` becomes a retained config message at
//! `{discovery_prefix}/{component}/{unique_id}/config`; `publish` becomes a
//! state message at `{entity_base}/{path}/state` plus, when the payload has
//! attributes, a JSON message at `{entity_base}/{path}/attributes`.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use engine::entity::{DeviceGroup, EntityId, EntityKind, EntityShape, Payload};
use engine::normalize::sanitize_identifier;
use engine::sink::{MetricSink, SinkError};

use super::transport::{TopicMessage, TopicTransport};

#[derive(Debug, Clone, PartialEq)]
pub struct DiscoveryConfig {
    pub discovery_prefix: String,
    pub entity_base: String,
    /// Display name of the monitored station, or `global`.
    pub station: String,
}

pub struct DiscoverySink<T> {
    config: DiscoveryConfig,
    transport: T,
    link_down: AtomicBool,
    link_epoch: AtomicU64,
}

impl<T: TopicTransport> DiscoverySink<T> {
    pub fn new(config: DiscoveryConfig, transport: T) -> Self {
        Self {
            config,
            transport,
            link_down: AtomicBool::new(false),
            link_epoch: AtomicU64::new(0),
        }
    }

    /// Sends one message and tracks link state: a transport failure marks
    /// the link down, the next delivered (or answered) message after that
    /// starts a new link epoch.
    async fn send(&self, message: TopicMessage) -> Result<(), SinkError> {
        let result = self.transport.send(message).await;
        match &result {
            Err(SinkError::Transport(_)) => {
                if !self.link_down.swap(true, Ordering::SeqCst) {
                    tracing::warn!("sink link down");
                }
            }
            _ => {
                if self.link_down.swap(false, Ordering::SeqCst) {
                    let epoch = self.link_epoch.fetch_add(1, Ordering::SeqCst) + 1;
                    tracing::info!(epoch, "sink link restored");
                }
            }
        }
        result
    }

    fn unique_id(&self, id: &EntityId) -> String {
        format!("{}_{}", self.config.entity_base, id.unique_id())
    }

    fn topic(&self, id: &EntityId, leaf: &str) -> String {
        format!("{}/{}/{leaf}", self.config.entity_base, id.path())
    }

    fn device(&self, group: DeviceGroup) -> Value {
        let base = &self.config.entity_base;
        let station = &self.config.station;
        let station_id = sanitize_identifier(station);

        let (identifier, name, model) = match group {
            DeviceGroup::Spots => (
                format!("{base}_spots_{station_id}"),
                format!("PSKr Spots ({station})"),
                "Spot Listener",
            ),
            DeviceGroup::Stats(scope) => (
                format!("{base}_stats_{}_{station_id}", scope.as_str()),
                format!(
                    "PSKr Stats {} ({station})",
                    scope.as_str().to_ascii_uppercase()
                ),
                "Spot Statistics",
            ),
            DeviceGroup::Health => (
                format!("{base}_health_{station_id}"),
                format!("PSKr Feed Health ({station})"),
                "Feed Monitor",
            ),
        };

        json!({
            "identifiers": [identifier],
            "name": name,
            "manufacturer": "PSKReporter",
            "model": model,
            "sw_version": env!("CARGO_PKG_VERSION"),
        })
    }

    /// Discovery config document for one entity.
    pub fn config_payload(&self, id: &EntityId, shape: &EntityShape) -> Value {
        let unique_id = self.unique_id(id);
        let mut doc = Map::new();
        doc.insert("name".into(), json!(shape.name));
        doc.insert("unique_id".into(), json!(unique_id));
        doc.insert("object_id".into(), json!(unique_id));
        doc.insert("state_topic".into(), json!(self.topic(id, "state")));
        if shape.has_attributes {
            doc.insert(
                "json_attributes_topic".into(),
                json!(self.topic(id, "attributes")),
            );
        }
        let optional = [
            ("unit_of_measurement", shape.unit),
            ("icon", shape.icon),
            ("device_class", shape.device_class),
            ("state_class", shape.state_class),
        ];
        for (key, value) in optional {
            if let Some(v) = value {
                doc.insert(key.into(), json!(v));
            }
        }
        if shape.kind == EntityKind::BinarySensor {
            doc.insert("payload_on".into(), json!("ON"));
            doc.insert("payload_off".into(), json!("OFF"));
        }
        doc.insert("device".into(), self.device(shape.group));
        Value::Object(doc)
    }

    fn component(kind: EntityKind) -> &'static str {
        match kind {
            EntityKind::Sensor => "sensor",
            EntityKind::BinarySensor => "binary_sensor",
        }
    }
}

#[async_trait]
impl<T: TopicTransport> MetricSink for DiscoverySink<T> {
    async fn register(&self, id: &EntityId, shape: &EntityShape) -> Result<(), SinkError> {
        let topic = format!(
            "{}/{}/{}/config",
            self.config.discovery_prefix,
            Self::component(shape.kind),
            self.unique_id(id)
        );
        let payload = serde_json::to_string(&self.config_payload(id, shape))?;
        self.send(TopicMessage {
            topic,
            payload,
            retain: true,
        })
        .await
    }

    async fn publish(&self, id: &EntityId, payload: &Payload) -> Result<(), SinkError> {
        // Retained: unchanged values are not re-sent, so a consumer that
        // restarts must be able to pick up the last state from the broker.
        self.send(TopicMessage {
            topic: self.topic(id, "state"),
            payload: payload.value.render(),
            retain: true,
        })
        .await?;

        if !payload.attributes.is_empty() {
            self.send(TopicMessage {
                topic: self.topic(id, "attributes"),
                payload: serde_json::to_string(&payload.attributes)?,
                retain: true,
            })
            .await?;
        }
        Ok(())
    }

    fn link_epoch(&self) -> u64 {
        self.link_epoch.load(Ordering::SeqCst)
    }
}
