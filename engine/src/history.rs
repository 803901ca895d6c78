use std::collections::VecDeque;
use std::sync::Arc;

use crate::spot::Spot;

/// Bounded, arrival-ordered buffer of recent spots.
///
/// Holds at most `max_history` entries and nothing older than `window_ms`
/// relative to the latest append or snapshot.
#[derive(Debug)]
pub struct HistoryStore {
    entries: VecDeque<Arc<Spot>>,
    window_ms: u64,
    max_history: usize,
    /// Whether arrival stamps are non-decreasing front to back.
    ordered: bool,
}

impl HistoryStore {
    pub fn new(window_ms: u64, max_history: usize) -> Self {
        let max_history = max_history.max(1);
        Self {
            entries: VecDeque::with_capacity(max_history.min(1024)),
            window_ms,
            max_history,
            ordered: true,
        }
    }

    pub fn append(&mut self, spot: Arc<Spot>) {
        let now_ms = spot.received_at_ms;
        if self
            .entries
            .back()
            .is_some_and(|last| last.received_at_ms > now_ms)
        {
            self.ordered = false;
        }
        self.entries.push_back(spot);
        self.evict_old(now_ms);
        while self.entries.len() > self.max_history {
            self.entries.pop_front();
        }
    }

    /// Evicts by age relative to `now_ms` and returns what is left.
    pub fn snapshot(&mut self, now_ms: u64) -> Vec<Arc<Spot>> {
        self.evict_old(now_ms);
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn window_ms(&self) -> u64 {
        self.window_ms
    }

    fn evict_old(&mut self, now_ms: u64) {
        let window_ms = self.window_ms;
        let stale = |s: &Arc<Spot>| now_ms.saturating_sub(s.received_at_ms) > window_ms;

        if self.ordered {
            while self.entries.front().is_some_and(stale) {
                self.entries.pop_front();
            }
            return;
        }

        // The wall clock stepped back at some point, so the front is not
        // necessarily the oldest entry.
        self.entries.retain(|s| !stale(s));
        self.ordered = self
            .entries
            .iter()
            .zip(self.entries.iter().skip(1))
            .all(|(a, b)| a.received_at_ms <= b.received_at_ms);
    }
}


#[cfg(test)]
mod proptests {
    use super::tests::spot_at;
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn never_exceeds_capacity(
            cap in 1usize..50,
            gaps in proptest::collection::vec(0u64..5_000, 1..300),
        ) {
            let mut h = HistoryStore::new(10_000, cap);
            let mut t = 0;
            for g in gaps {
                t += g;
                h.append(spot_at(t));
                prop_assert!(h.len() <= cap);
            }
        }

        #[test]
        fn snapshot_never_older_than_window(
            window in 1u64..20_000,
            gaps in proptest::collection::vec(1u64..3_000, 1..200),
            idle in 0u64..30_000,
        ) {
            let mut h = HistoryStore::new(window, 10_000);
            let mut t = 0;
            for g in gaps {
                t += g;
                h.append(spot_at(t));
            }
            let now = t + idle;
            for s in h.snapshot(now) {
                prop_assert!(now - s.received_at_ms <= window);
            }
        }
    }
}
