use std::time::Duration;

use crate::filter::{FilterPolicy, MonitorMode};
use crate::health::{DEFAULT_RATE_WINDOW_MS, DEFAULT_STALE_AFTER_MS};

pub const DEFAULT_WINDOW_MS: u64 = 900_000;
pub const DEFAULT_MAX_HISTORY: usize = 5_000;
pub const DEFAULT_PAIR_IDLE_TTL_MS: u64 = 3_600_000;
pub const DEFAULT_TICK_EVERY: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub mode: MonitorMode,
    pub filter: FilterPolicy,

    /// Length of the statistics window.
    pub window_ms: u64,
    /// Hard cap on spots kept in the window.
    pub max_history: usize,
    /// Pairs idle for longer are forgotten; 0 keeps them forever.
    pub pair_idle_ttl_ms: u64,

    pub stale_after_ms: u64,
    pub rate_window_ms: u64,
}

impl EngineConfig {
    pub fn new(mode: MonitorMode, filter: FilterPolicy) -> Self {
        Self {
            mode,
            filter,
            window_ms: DEFAULT_WINDOW_MS,
            max_history: DEFAULT_MAX_HISTORY,
            pair_idle_ttl_ms: DEFAULT_PAIR_IDLE_TTL_MS,
            stale_after_ms: DEFAULT_STALE_AFTER_MS,
            rate_window_ms: DEFAULT_RATE_WINDOW_MS,
        }
    }
}
