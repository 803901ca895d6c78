use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

pub const DEFAULT_STALE_AFTER_MS: u64 = 60_000;
pub const DEFAULT_RATE_WINDOW_MS: u64 = 60_000;

/// Bound on arrival timestamps kept for the rate estimate.
const MAX_RATE_SAMPLES: usize = 100_000;

/// Monotonic counters; cheap to clone and bump from any task.
#[derive(Clone, Default, Debug)]
pub struct Counters {
    pub messages: Arc<AtomicU64>,
    pub parse_errors: Arc<AtomicU64>,
    pub enrichment_failures: Arc<AtomicU64>,
    pub sink_failures: Arc<AtomicU64>,
    pub reconnects: Arc<AtomicU64>,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn read(counter: &AtomicU64) -> u64 {
        counter.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Default)]
struct FeedState {
    connected: bool,
    connected_at_ms: Option<u64>,
    last_disconnect_reason: Option<String>,
    subscribed_topics: Vec<String>,

    last_record_ms: Option<u64>,
    last_feed_ts_ms: Option<u64>,
    arrivals: VecDeque<u64>,

    last_sequence: Option<u64>,
    sequence_gaps: u64,
    total_gap_size: u64,
    out_of_order: u64,
}

/// Point-in-time view of feed health.
#[derive(Debug, Clone, PartialEq)]
pub struct HealthSnapshot {
    pub healthy: bool,
    pub reason: String,
    pub connected: bool,
    pub connection_uptime_ms: Option<u64>,
    pub last_disconnect_reason: Option<String>,
    pub subscribed_topics: Vec<String>,

    pub last_record_age_ms: Option<u64>,
    /// Arrival time minus feed timestamp of the latest record.
    pub feed_latency_ms: Option<u64>,
    pub messages_in_rate_window: u64,
    pub messages_per_minute: f64,

    pub total_messages: u64,
    pub parse_errors: u64,
    pub enrichment_failures: u64,
    pub sink_failures: u64,
    pub reconnects: u64,

    pub sequence_gaps: u64,
    pub total_gap_size: u64,
    pub out_of_order: u64,

    pub stale_after_ms: u64,
}

#[derive(Debug)]
pub struct HealthMonitor {
    counters: Counters,
    state: Mutex<FeedState>,
    stale_after_ms: u64,
    rate_window_ms: u64,
}

impl Default for HealthMonitor {
    fn default() -> Self {
        Self::new(DEFAULT_STALE_AFTER_MS, DEFAULT_RATE_WINDOW_MS)
    }
}

impl HealthMonitor {
    pub fn new(stale_after_ms: u64, rate_window_ms: u64) -> Self {
        Self {
            counters: Counters::default(),
            state: Mutex::new(FeedState::default()),
            stale_after_ms,
            rate_window_ms: rate_window_ms.max(1),
        }
    }

    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Any inbound message, parseable or not.
    pub fn record_message(&self, now_ms: u64) {
        Counters::bump(&self.counters.messages, 1);
        let mut st = self.state.lock();
        st.arrivals.push_back(now_ms);
        if st.arrivals.len() > MAX_RATE_SAMPLES {
            st.arrivals.pop_front();
        }
        prune_arrivals(&mut st.arrivals, now_ms, self.rate_window_ms);
    }

    /// A record that passed normalization.
    pub fn record_spot(&self, now_ms: u64, reported_at_ms: u64, sequence: Option<u64>) {
        let mut st = self.state.lock();
        st.last_record_ms = Some(now_ms);
        st.last_feed_ts_ms = Some(reported_at_ms);

        let Some(seq) = sequence else { return };
        let last = st.last_sequence;
        match last {
            Some(prev) if seq > prev.saturating_add(1) => {
                st.sequence_gaps += 1;
                st.total_gap_size += seq - prev - 1;
                st.last_sequence = Some(seq);
            }
            Some(prev) if seq <= prev => st.out_of_order += 1,
            _ => st.last_sequence = Some(seq),
        }
    }

    pub fn record_parse_error(&self) {
        Counters::bump(&self.counters.parse_errors, 1);
    }

    pub fn record_enrichment_misses(&self, misses: u32) {
        if misses > 0 {
            Counters::bump(&self.counters.enrichment_failures, misses as u64);
        }
    }

    pub fn record_sink_failures(&self, failures: u64) {
        if failures > 0 {
            Counters::bump(&self.counters.sink_failures, failures);
        }
    }

    pub fn on_connected(&self, now_ms: u64, topics: Vec<String>) {
        let mut st = self.state.lock();
        st.connected = true;
        st.connected_at_ms = Some(now_ms);
        st.subscribed_topics = topics;
    }

    pub fn on_disconnected(&self, reason: impl Into<String>) {
        Counters::bump(&self.counters.reconnects, 1);
        let mut st = self.state.lock();
        st.connected = false;
        st.connected_at_ms = None;
        st.last_disconnect_reason = Some(reason.into());
    }

    pub fn is_healthy(&self, now_ms: u64) -> bool {
        let st = self.state.lock();
        is_fresh(st.last_record_ms, now_ms, self.stale_after_ms)
    }

    pub fn snapshot(&self, now_ms: u64) -> HealthSnapshot {
        let mut st = self.state.lock();
        prune_arrivals(&mut st.arrivals, now_ms, self.rate_window_ms);

        let healthy = is_fresh(st.last_record_ms, now_ms, self.stale_after_ms);
        let last_record_age_ms = st.last_record_ms.map(|t| now_ms.saturating_sub(t));
        let reason = match (healthy, st.connected, last_record_age_ms) {
            (true, _, _) => "Feed is healthy - data flowing normally".to_string(),
            (false, false, _) => "Not connected to feed".to_string(),
            (false, true, None) => "No messages received yet".to_string(),
            (false, true, Some(age)) => format!(
                "No messages for {} seconds (feed may be down)",
                age / 1000
            ),
        };

        let in_window = st.arrivals.len() as u64;
        let minutes = self.rate_window_ms as f64 / 60_000.0;

        HealthSnapshot {
            healthy,
            reason,
            connected: st.connected,
            connection_uptime_ms: st.connected_at_ms.map(|t| now_ms.saturating_sub(t)),
            last_disconnect_reason: st.last_disconnect_reason.clone(),
            subscribed_topics: st.subscribed_topics.clone(),
            last_record_age_ms,
            feed_latency_ms: st
                .last_record_ms
                .zip(st.last_feed_ts_ms)
                .map(|(arrived, reported)| arrived.saturating_sub(reported)),
            messages_in_rate_window: in_window,
            messages_per_minute: in_window as f64 / minutes,
            total_messages: Counters::read(&self.counters.messages),
            parse_errors: Counters::read(&self.counters.parse_errors),
            enrichment_failures: Counters::read(&self.counters.enrichment_failures),
            sink_failures: Counters::read(&self.counters.sink_failures),
            reconnects: Counters::read(&self.counters.reconnects),
            sequence_gaps: st.sequence_gaps,
            total_gap_size: st.total_gap_size,
            out_of_order: st.out_of_order,
            stale_after_ms: self.stale_after_ms,
        }
    }
}

fn is_fresh(last_record_ms: Option<u64>, now_ms: u64, stale_after_ms: u64) -> bool {
    last_record_ms.is_some_and(|t| now_ms.saturating_sub(t) < stale_after_ms)
}

fn prune_arrivals(arrivals: &mut VecDeque<u64>, now_ms: u64, window_ms: u64) {
    while let Some(&t) = arrivals.front() {
        if now_ms.saturating_sub(t) > window_ms {
            arrivals.pop_front();
        } else {
            break;
        }
    }
}
