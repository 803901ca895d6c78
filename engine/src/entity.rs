use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::Value;

use crate::aggregate::StatsScope;
use crate::normalize::sanitize_identifier;

/// Stable identity of one published metric.
///
/// Segments are sanitized on construction; the sink decides how to join
/// them (topic path, unique id).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId {
    segments: Vec<String>,
}

impl EntityId {
    pub fn new<I, S>(segments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            segments: segments
                .into_iter()
                .map(|s| sanitize_identifier(s.as_ref()))
                .filter(|s| !s.is_empty())
                .collect(),
        }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// `stats/rx/dl1abc/20m/ft8/count`
    pub fn path(&self) -> String {
        self.segments.join("/")
    }

    /// `stats_rx_dl1abc_20m_ft8_count`
    pub fn unique_id(&self) -> String {
        self.segments.join("_")
    }

    /// Last segment, the metric name.
    pub fn metric(&self) -> &str {
        self.segments.last().map(String::as_str).unwrap_or_default()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Sensor,
    BinarySensor,
}

/// Which device an entity is grouped under by the consumer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceGroup {
    Spots,
    Stats(StatsScope),
    Health,
}

/// Everything the consumer needs to register an entity.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityShape {
    pub kind: EntityKind,
    pub name: String,
    pub group: DeviceGroup,
    pub unit: Option<&'static str>,
    pub icon: Option<&'static str>,
    pub device_class: Option<&'static str>,
    pub state_class: Option<&'static str>,
    /// Whether payloads for this entity carry attributes.
    pub has_attributes: bool,
}

impl EntityShape {
    pub fn sensor(name: impl Into<String>, group: DeviceGroup) -> Self {
        Self {
            kind: EntityKind::Sensor,
            name: name.into(),
            group,
            unit: None,
            icon: None,
            device_class: None,
            state_class: None,
            has_attributes: false,
        }
    }

    pub fn binary_sensor(name: impl Into<String>, group: DeviceGroup) -> Self {
        Self {
            kind: EntityKind::BinarySensor,
            ..Self::sensor(name, group)
        }
    }

    pub fn unit(mut self, unit: &'static str) -> Self {
        self.unit = Some(unit);
        self
    }

    pub fn icon(mut self, icon: &'static str) -> Self {
        self.icon = Some(icon);
        self
    }

    pub fn device_class(mut self, class: &'static str) -> Self {
        self.device_class = Some(class);
        self
    }

    pub fn measurement(mut self) -> Self {
        self.state_class = Some("measurement");
        self
    }

    pub fn total_increasing(mut self) -> Self {
        self.state_class = Some("total_increasing");
        self
    }

    pub fn with_attributes(mut self) -> Self {
        self.has_attributes = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetricValue {
    Int(i64),
    Float(f64),
    Text(String),
    Bool(bool),
}

impl MetricValue {
    /// One decimal place, the precision every float metric is published at.
    pub fn rounded(v: f64) -> Self {
        MetricValue::Float((v * 10.0).round() / 10.0)
    }

    /// Plain-text state as the consumer expects it.
    pub fn render(&self) -> String {
        match self {
            MetricValue::Int(v) => v.to_string(),
            MetricValue::Float(v) => v.to_string(),
            MetricValue::Text(v) => v.clone(),
            MetricValue::Bool(true) => "ON".to_string(),
            MetricValue::Bool(false) => "OFF".to_string(),
        }
    }
}

/// Value plus attributes; compared as a whole for change suppression.
#[derive(Debug, Clone, PartialEq)]
pub struct Payload {
    pub value: MetricValue,
    pub attributes: BTreeMap<String, Value>,
}

impl Payload {
    pub fn value(value: MetricValue) -> Self {
        Self {
            value,
            attributes: BTreeMap::new(),
        }
    }

    pub fn attr(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }

    /// Adds the attribute only when a value is present.
    pub fn attr_opt<V: Into<Value>>(self, key: &str, value: Option<V>) -> Self {
        match value {
            Some(v) => self.attr(key, v),
            None => self,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emission {
    /// Re-sent only when value or attributes changed.
    OnChange,
    /// Sent every time it is produced.
    Always,
}

/// One computed entity value, ready for the publication state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct EntityUpdate {
    pub id: EntityId,
    pub shape: EntityShape,
    pub payload: Payload,
    pub emission: Emission,
}
