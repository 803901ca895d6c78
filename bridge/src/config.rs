use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use engine::EngineConfig;
use engine::band::Band;
use engine::filter::{Direction, FilterPolicy, MonitorMode};
use engine::spot::{Callsign, Mode};

const PLACEHOLDER_CALLSIGN: &str = "YOUR_CALLSIGN";

/// Upper bound for any duration setting: one year.
const MAX_SECONDS: i64 = 365 * 24 * 3600;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkKind {
    /// Log every message instead of delivering it.
    Log,
    /// POST messages to a broker bridge at `SINK_URL`.
    Http,
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// JSON logs when `APP_ENV=production`.
    pub production: bool,

    pub engine: EngineConfig,

    /// How often statistics are recomputed and published.
    pub stats_every: Duration,

    // =========================
    // Feed
    // =========================
    /// WebSocket relay carrying the PSKReporter topics.
    pub feed_url: String,
    /// Subscription-level mode filter, in configured order. Empty means all.
    pub modes: Vec<Mode>,
    /// Subscription-level band filter, in configured order. Empty means all.
    pub bands: Vec<Band>,

    // =========================
    // Sink
    // =========================
    pub sink: SinkKind,
    pub sink_url: Option<String>,
    pub discovery_prefix: String,
    pub entity_base: String,

    /// Replaces the built-in callsign prefix table when set.
    pub prefix_table_path: Option<PathBuf>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup, collecting every
    /// problem before failing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string());
        let text = |key: &str, default: &str| {
            get(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let int = |key: &str, default: i64| str_to_int(get(key).as_deref(), default);
        let mut problems = Vec::new();

        let window_s = int("STATS_INTERVAL_WINDOW_SECONDS", 900);
        if window_s < 60 {
            problems.push(format!(
                "STATS_INTERVAL_WINDOW_SECONDS should be at least 60 seconds. Got: {window_s}"
            ));
        }
        if window_s > MAX_SECONDS {
            problems.push(format!(
                "STATS_INTERVAL_WINDOW_SECONDS must be at most {MAX_SECONDS}. Got: {window_s}"
            ));
        }
        let every_s = int("STATS_UPDATE_INTERVAL_SECONDS", 300);
        if every_s < 30 {
            problems.push(format!(
                "STATS_UPDATE_INTERVAL_SECONDS should be at least 30 seconds. Got: {every_s}"
            ));
        }
        if every_s > MAX_SECONDS {
            problems.push(format!(
                "STATS_UPDATE_INTERVAL_SECONDS must be at most {MAX_SECONDS}. Got: {every_s}"
            ));
        }
        let max_history = int("MAX_SPOT_HISTORY", engine::config::DEFAULT_MAX_HISTORY as i64);
        if max_history < 1 {
            problems.push(format!("MAX_SPOT_HISTORY must be at least 1. Got: {max_history}"));
        }
        let pair_ttl_s = int(
            "PAIR_IDLE_TTL_SECONDS",
            (engine::config::DEFAULT_PAIR_IDLE_TTL_MS / 1000) as i64,
        );
        if pair_ttl_s < 0 {
            problems.push(format!("PAIR_IDLE_TTL_SECONDS must not be negative. Got: {pair_ttl_s}"));
        }
        if pair_ttl_s > MAX_SECONDS {
            problems.push(format!(
                "PAIR_IDLE_TTL_SECONDS must be at most {MAX_SECONDS}. Got: {pair_ttl_s}"
            ));
        }

        let min_distance_km = int("SPOT_FILTER_MIN_DISTANCE_KM", 0).max(0);
        let max_distance_km = int("SPOT_FILTER_MAX_DISTANCE_KM", 0).max(0);
        if max_distance_km > 0 && max_distance_km < min_distance_km {
            problems.push(format!(
                "SPOT_FILTER_MAX_DISTANCE_KM ({max_distance_km}) is below \
                 SPOT_FILTER_MIN_DISTANCE_KM ({min_distance_km})"
            ));
        }

        let mode = match text("MONITOR_MODE", "detailed").to_ascii_lowercase().as_str() {
            "detailed" => detailed_mode(&get, &mut problems),
            "summary" => summary_mode(&get, &mut problems),
            other => {
                problems.push(format!(
                    "MONITOR_MODE must be one of [detailed, summary]. Got: '{other}'"
                ));
                None
            }
        };

        let modes = parse_modes(&text("MODES_FILTER", "+"), &mut problems);
        let bands = parse_bands(&text("BANDS_FILTER", "+"), &mut problems);

        let filter = FilterPolicy {
            spot_sensors_enabled: str_to_bool(&text("ENABLE_SPOT_SENSORS", "true")),
            min_distance_km: min_distance_km as f64,
            max_distance_km: max_distance_km as f64,
            allow_callsigns: upper_set(get("SPOT_ALLOW_CALLSIGNS").as_deref()),
            deny_callsigns: upper_set(get("SPOT_FILTERED_CALLSIGNS").as_deref()),
            allow_regions: upper_set(get("SPOT_ALLOW_COUNTRIES").as_deref()),
            deny_regions: upper_set(get("SPOT_FILTERED_COUNTRIES").as_deref()),
            modes: modes.iter().cloned().collect(),
            bands: bands.iter().copied().collect(),
        };

        let sink = match text("SINK_KIND", "log").to_ascii_lowercase().as_str() {
            "log" => SinkKind::Log,
            "http" => SinkKind::Http,
            other => {
                problems.push(format!("SINK_KIND must be one of [log, http]. Got: '{other}'"));
                SinkKind::Log
            }
        };
        let sink_url = get("SINK_URL").filter(|v| !v.is_empty());
        if sink == SinkKind::Http && sink_url.is_none() {
            problems.push("SINK_URL is required when SINK_KIND=http".to_string());
        }

        let Some(mode) = mode else {
            return Err(ConfigError::Invalid(problems));
        };
        if !problems.is_empty() {
            return Err(ConfigError::Invalid(problems));
        }

        let mut engine = EngineConfig::new(mode, filter);
        engine.window_ms = (window_s as u64).saturating_mul(1000);
        engine.max_history = max_history as usize;
        engine.pair_idle_ttl_ms = (pair_ttl_s as u64).saturating_mul(1000);

        Ok(Self {
            production: text("APP_ENV", "development") == "production",
            engine,
            stats_every: Duration::from_secs(every_s as u64),
            feed_url: text("FEED_URL", "ws://127.0.0.1:8765/pskr"),
            modes,
            bands,
            sink,
            sink_url,
            discovery_prefix: text("HA_DISCOVERY_PREFIX", "homeassistant"),
            entity_base: text("HA_ENTITY_BASE", "pskr"),
            prefix_table_path: get("PREFIX_TABLE_PATH")
                .filter(|v| !v.is_empty())
                .map(PathBuf::from),
        })
    }

    /// Monitored station, if any.
    pub fn callsign(&self) -> Option<&Callsign> {
        match &self.engine.mode {
            MonitorMode::Detailed { callsign, .. } => Some(callsign),
            MonitorMode::Summary { .. } => None,
        }
    }
}

fn detailed_mode<G>(get: &G, problems: &mut Vec<String>) -> Option<MonitorMode>
where
    G: Fn(&str) -> Option<String>,
{
    let raw_call = get("MY_CALLSIGN").unwrap_or_default();
    let callsign = if raw_call.eq_ignore_ascii_case(PLACEHOLDER_CALLSIGN) {
        None
    } else {
        Callsign::new(&raw_call)
    };
    if callsign.is_none() {
        problems.push(
            "MY_CALLSIGN is required in detailed mode. Set it to your amateur radio callsign."
                .to_string(),
        );
    }

    let raw_direction = get("SCRIPT_DIRECTION")
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| "rx".to_string());
    let direction = match raw_direction.parse::<Direction>() {
        Ok(d) => Some(d),
        Err(_) => {
            problems.push(format!(
                "SCRIPT_DIRECTION must be one of [rx, tx, dual]. Got: '{raw_direction}'"
            ));
            None
        }
    };

    Some(MonitorMode::Detailed {
        callsign: callsign?,
        direction: direction?,
    })
}

fn summary_mode<G>(get: &G, problems: &mut Vec<String>) -> Option<MonitorMode>
where
    G: Fn(&str) -> Option<String>,
{
    let sample_fraction = get("GLOBAL_SAMPLE_FRACTION")
        .and_then(|v| v.parse::<f64>().ok())
        .unwrap_or(1.0);
    if !(sample_fraction > 0.0 && sample_fraction <= 1.0) {
        problems.push(format!(
            "GLOBAL_SAMPLE_FRACTION must be in (0, 1]. Got: {sample_fraction}"
        ));
        return None;
    }
    Some(MonitorMode::Summary { sample_fraction })
}

/// `true`, `1`, `yes`, `on`, `t`, `y` (any case); everything else is false.
pub fn str_to_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "true" | "1" | "yes" | "on" | "t" | "y"
    )
}

/// Missing, empty or unparsable values fall back to `default`.
pub fn str_to_int(value: Option<&str>, default: i64) -> i64 {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Comma-separated list, entries trimmed, empty entries dropped.
pub fn parse_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn upper_set(value: Option<&str>) -> HashSet<String> {
    parse_list(value.unwrap_or_default())
        .into_iter()
        .map(|s| s.to_ascii_uppercase())
        .collect()
}

fn is_wildcard(items: &[String]) -> bool {
    items.is_empty() || items.iter().any(|s| s == "+")
}

fn parse_modes(value: &str, problems: &mut Vec<String>) -> Vec<Mode> {
    let items = parse_list(value);
    if is_wildcard(&items) {
        return Vec::new();
    }
    let mut modes: Vec<Mode> = Vec::new();
    for item in items {
        match Mode::new(&item) {
            Some(m) if !modes.contains(&m) => modes.push(m),
            Some(_) => {}
            None => problems.push(format!("MODES_FILTER has an invalid mode: '{item}'")),
        }
    }
    modes
}

fn parse_bands(value: &str, problems: &mut Vec<String>) -> Vec<Band> {
    let items = parse_list(value);
    if is_wildcard(&items) {
        return Vec::new();
    }
    let mut bands: Vec<Band> = Vec::new();
    for item in items {
        match item.parse::<Band>() {
            Ok(b) if !bands.contains(&b) => bands.push(b),
            Ok(_) => {}
            Err(e) => problems.push(format!("BANDS_FILTER: {e}")),
        }
    }
    bands
}
