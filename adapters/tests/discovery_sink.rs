
use serde_json::Value;

use adapters::sink::{DiscoveryConfig, DiscoverySink};
use engine::aggregate::StatsScope;
use engine::entity::{DeviceGroup, EntityId, EntityShape, MetricValue, Payload};
use engine::sink::{MetricSink, SinkError};
use mock_transport::MockTransport;

fn sink() -> (DiscoverySink<MockTransport>, MockTransport) {
    let transport = MockTransport::default();
    let sink = DiscoverySink::new(
        DiscoveryConfig {
            discovery_prefix: "homeassistant".into(),
            entity_base: "pskr".into(),
            station: "DL1ABC".into(),
        },
        transport.clone(),
    );
    (sink, transport)
}

fn parse(payload: &str) -> Value {
    serde_json::from_str(payload).unwrap()
}

#[tokio::test]
async fn register_sends_retained_sensor_config() {
    let (sink, transport) = sink();
    let id = EntityId::new(["stats", "rx", "DL1ABC", "total_spots"]);
    let shape = EntityShape::sensor("RX Total Spots", DeviceGroup::Stats(StatsScope::Rx))
        .unit("spots")
        .icon("mdi:counter")
        .measurement();

    sink.register(&id, &shape).await.unwrap();

    let msg = transport
        .message("homeassistant/sensor/pskr_stats_rx_dl1abc_total_spots/config")
        .expect("config message");
    assert!(msg.retain);

    let doc = parse(&msg.payload);
    assert_eq!(doc["name"], "RX Total Spots");
    assert_eq!(doc["unique_id"], "pskr_stats_rx_dl1abc_total_spots");
    assert_eq!(doc["state_topic"], "pskr/stats/rx/dl1abc/total_spots/state");
    assert_eq!(doc["unit_of_measurement"], "spots");
    assert_eq!(doc["state_class"], "measurement");
    assert!(doc.get("json_attributes_topic").is_none());
    assert!(doc.get("device_class").is_none());
    assert_eq!(doc["device"]["identifiers"][0], "pskr_stats_rx_dl1abc");
    assert_eq!(doc["device"]["name"], "PSKr Stats RX (DL1ABC)");
}

#[tokio::test]
async fn binary_sensor_config_carries_on_off_payloads() {
    let (sink, transport) = sink();
    let id = EntityId::new(["health", "DL1ABC", "feed_health"]);
    let shape = EntityShape::binary_sensor("Feed Health", DeviceGroup::Health)
        .device_class("connectivity")
        .with_attributes();

    sink.register(&id, &shape).await.unwrap();

    let msg = transport
        .message("homeassistant/binary_sensor/pskr_health_dl1abc_feed_health/config")
        .expect("config message");
    let doc = parse(&msg.payload);
    assert_eq!(doc["payload_on"], "ON");
    assert_eq!(doc["payload_off"], "OFF");
    assert_eq!(
        doc["json_attributes_topic"],
        "pskr/health/dl1abc/feed_health/attributes"
    );
    assert_eq!(doc["device"]["model"], "Feed Monitor");
}

#[tokio::test]
async fn publish_sends_state_and_attributes() {
    let (sink, transport) = sink();
    let id = EntityId::new(["spots", "K1ABC", "DL1ABC"]);
    let payload = Payload::value(MetricValue::Int(-12))
        .attr("band", "20m")
        .attr("distance_km", 6190.4);

    sink.publish(&id, &payload).await.unwrap();

    assert_eq!(
        transport.topics(),
        vec![
            "pskr/spots/k1abc/dl1abc/state".to_string(),
            "pskr/spots/k1abc/dl1abc/attributes".to_string(),
        ]
    );
    let state = transport.message("pskr/spots/k1abc/dl1abc/state").unwrap();
    assert_eq!(state.payload, "-12");
    assert!(state.retain);

    let attrs = parse(
        &transport
            .message("pskr/spots/k1abc/dl1abc/attributes")
            .unwrap()
            .payload,
    );
    assert_eq!(attrs["band"], "20m");
    assert_eq!(attrs["distance_km"], 6190.4);
}

#[tokio::test]
async fn publish_without_attributes_sends_state_only() {
    let (sink, transport) = sink();
    let id = EntityId::new(["health", "DL1ABC", "feed_health"]);

    sink.publish(&id, &Payload::value(MetricValue::Bool(false)))
        .await
        .unwrap();

    assert_eq!(transport.topics().len(), 1);
    assert_eq!(
        transport
            .message("pskr/health/dl1abc/feed_health/state")
            .unwrap()
            .payload,
        "OFF"
    );
}

#[tokio::test]
async fn transport_failure_surfaces_as_sink_error() {
    let (sink, transport) = sink();
    transport.set_failing(true);
    let id = EntityId::new(["health", "DL1ABC", "parse_errors"]);

    let err = sink
        .publish(&id, &Payload::value(MetricValue::Int(3)))
        .await
        .unwrap_err();
    assert!(matches!(err, SinkError::Transport(_)));
}

#[tokio::test]
async fn link_epoch_advances_once_per_recovered_outage() {
    let (sink, transport) = sink();
    let id = EntityId::new(["health", "DL1ABC", "parse_errors"]);
    let value = Payload::value(MetricValue::Int(1));

    sink.publish(&id, &value).await.unwrap();
    assert_eq!(sink.link_epoch(), 0);

    transport.set_failing(true);
    sink.publish(&id, &value).await.unwrap_err();
    sink.publish(&id, &value).await.unwrap_err();
    assert_eq!(sink.link_epoch(), 0);

    transport.set_failing(false);
    sink.publish(&id, &value).await.unwrap();
    assert_eq!(sink.link_epoch(), 1);
    sink.publish(&id, &value).await.unwrap();
    assert_eq!(sink.link_epoch(), 1);

    transport.set_failing(true);
    sink.publish(&id, &value).await.unwrap_err();
    transport.set_failing(false);
    sink.publish(&id, &value).await.unwrap();
    assert_eq!(sink.link_epoch(), 2);
}

#[tokio::test]
#[tracing_test::traced_test]
async fn log_transport_reports_topic_without_sending() {
    use adapters::sink::LogTransport;

    let sink = DiscoverySink::new(
        DiscoveryConfig {
            discovery_prefix: "homeassistant".into(),
            entity_base: "pskr".into(),
            station: "global".into(),
        },
        LogTransport,
    );
    let id = EntityId::new(["health", "global", "reconnect_count"]);

    sink.publish(&id, &Payload::value(MetricValue::Int(2)))
        .await
        .unwrap();

    assert!(logs_contain("publish (dry run)"));
    assert!(logs_contain("pskr/health/global/reconnect_count/state"));
}
