// =============================================================================
// Running windows — per-symbol trailing 15-second trade rings
// =============================================================================

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use chrono::{DateTime, Utc};

/// Trailing window horizon for the running averages.
pub const WINDOW_HORIZON: Duration = Duration::from_secs(15);

#[derive(Debug, Clone)]
struct WindowEntry {
    price: f64,
    volume: f64,
    ts: DateTime<Utc>,
}

/// Per-symbol rings of recent trades.  Only the consumer loop touches this,
/// so no locking is needed.
pub struct RunningWindows {
    windows: HashMap<String, VecDeque<WindowEntry>>,
    horizon: chrono::Duration,
}

impl RunningWindows {
    pub fn new() -> Self {
        Self::with_horizon(WINDOW_HORIZON)
    }

    pub fn with_horizon(horizon: Duration) -> Self {
        Self {
            windows: HashMap::new(),
            horizon: chrono::Duration::from_std(horizon).expect("window horizon fits"),
        }
    }

    /// Append a trade to its symbol's ring and prune entries that have aged
    /// past the horizon relative to `now`.
    pub fn push(&mut self, symbol: &str, price: f64, volume: f64, ts: DateTime<Utc>, now: DateTime<Utc>) {
        let ring = self.windows.entry(symbol.to_string()).or_default();
        ring.push_back(WindowEntry { price, volume, ts });
        let cutoff = now - self.horizon;
        while ring.front().is_some_and(|e| e.ts < cutoff) {
            ring.pop_front();
        }
    }

    /// Mean of `price * volume` per symbol over entries still inside the
    /// horizon at `now`.  Symbols whose ring is empty are omitted.
    pub fn averages(&mut self, now: DateTime<Utc>) -> Vec<(String, f64)> {
        let cutoff = now - self.horizon;
        let mut result = Vec::new();

        for (symbol, ring) in &mut self.windows {
            while ring.front().is_some_and(|e| e.ts < cutoff) {
                ring.pop_front();
            }
            if ring.is_empty() {
                continue;
            }
            let sum: f64 = ring.iter().map(|e| e.price * e.volume).sum();
            result.push((symbol.clone(), sum / ring.len() as f64));
        }

        result.sort_by(|a, b| a.0.cmp(&b.0));
        result
    }

    /// Oldest entry age in seconds for a symbol, if any.  Used by tests to
    /// check the pruning invariant.
    #[cfg(test)]
    fn oldest_age_secs(&self, symbol: &str, now: DateTime<Utc>) -> Option<i64> {
        self.windows
            .get(symbol)
            .and_then(|ring| ring.front())
            .map(|e| (now - e.ts).num_seconds())
    }
}

impl Default for RunningWindows {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn base_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 2, 14, 30, 0).unwrap()
    }

    #[test]
    fn mean_of_price_volume_over_window() {
        let t0 = base_time();
        let mut windows = RunningWindows::new();
        windows.push("X", 10.0, 2.0, t0, t0);
        windows.push("X", 20.0, 3.0, t0 + chrono::Duration::seconds(2), t0 + chrono::Duration::seconds(2));
        windows.push("X", 30.0, 1.0, t0 + chrono::Duration::seconds(4), t0 + chrono::Duration::seconds(4));

        let averages = windows.averages(t0 + chrono::Duration::seconds(5));
        assert_eq!(averages.len(), 1);
        assert_eq!(averages[0].0, "X");
        // (20 + 60 + 30) / 3
        assert!((averages[0].1 - 36.666_666_666_666_664).abs() < 1e-9);
    }

    #[test]
    fn entries_older_than_horizon_are_pruned_on_push() {
        let t0 = base_time();
        let mut windows = RunningWindows::new();
        windows.push("X", 1.0, 1.0, t0, t0);
        windows.push("X", 2.0, 1.0, t0 + chrono::Duration::seconds(20), t0 + chrono::Duration::seconds(20));

        let age = windows.oldest_age_secs("X", t0 + chrono::Duration::seconds(20)).unwrap();
        assert!(age <= 15, "oldest entry is {age}s old");
    }

    #[test]
    fn averages_prune_stale_symbols() {
        let t0 = base_time();
        let mut windows = RunningWindows::new();
        windows.push("X", 10.0, 1.0, t0, t0);

        // 16 seconds later the only entry has aged out.
        let averages = windows.averages(t0 + chrono::Duration::seconds(16));
        assert!(averages.is_empty());
    }

    #[test]
    fn symbols_are_independent() {
        let t0 = base_time();
        let mut windows = RunningWindows::new();
        windows.push("A", 10.0, 1.0, t0, t0);
        windows.push("B", 20.0, 2.0, t0, t0);

        let averages = windows.averages(t0 + chrono::Duration::seconds(1));
        assert_eq!(averages.len(), 2);
        assert_eq!(averages[0], ("A".to_string(), 10.0));
        assert_eq!(averages[1], ("B".to_string(), 40.0));
    }
}
