use chrono::{DateTime, TimeZone, Utc};

/// Wall-clock milliseconds since the unix epoch.
pub fn now_ms() -> u64 {
    Utc::now().timestamp_millis().max(0) as u64
}

/// Renders an epoch-millisecond timestamp as RFC 3339 (UTC).
pub fn iso_utc(ts_ms: u64) -> Option<String> {
    let dt: DateTime<Utc> = Utc.timestamp_millis_opt(ts_ms as i64).single()?;
    Some(dt.to_rfc3339())
}
