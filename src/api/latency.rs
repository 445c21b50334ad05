//! Timings of upstream stats requests.
//!
//! `Fetcher::get_json` records one sample per candidate URL it tries, so a
//! fallback from primary to secondary shows up as two samples. Timeouts land
//! near the configured fetch timeout and dominate the upper percentiles.

use std::sync::Mutex;
use std::time::Duration;

use hdrhistogram::Histogram;
use serde::Serialize;

/// Ceiling for a single sample. Anything slower is clamped.
const MAX_MS: u64 = 600_000;

struct Inner {
    histogram: Histogram<u64>,
    failed: u64,
}

/// Shared by the fetcher (writer) and `/stats/latency` (reader).
pub struct UpstreamLatency {
    inner: Mutex<Inner>,
}

/// What `/stats/latency` returns. Percentiles are `None` until the first request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LatencySnapshot {
    pub samples: u64,
    pub failed: u64,
    pub p50_ms: Option<u64>,
    pub p95_ms: Option<u64>,
    pub p99_ms: Option<u64>,
    pub max_ms: Option<u64>,
}

impl UpstreamLatency {
    pub fn new() -> Self {
        // 1ms..10min at 3 significant figures.
        let histogram = Histogram::new_with_bounds(1, MAX_MS, 3)
            .expect("1..MAX_MS is a valid histogram range");
        Self {
            inner: Mutex::new(Inner {
                histogram,
                failed: 0,
            }),
        }
    }

    /// One request attempt. Sub-millisecond attempts count as 1ms.
    pub fn record(&self, elapsed: Duration, ok: bool) {
        let ms = elapsed.as_millis().clamp(1, MAX_MS as u128) as u64;
        if let Ok(mut inner) = self.inner.lock() {
            let _ = inner.histogram.record(ms);
            if !ok {
                inner.failed += 1;
            }
        }
    }

    pub fn snapshot(&self) -> LatencySnapshot {
        let Ok(inner) = self.inner.lock() else {
            return LatencySnapshot::default();
        };
        let h = &inner.histogram;
        let empty = h.len() == 0;
        let at = |q: f64| (!empty).then(|| h.value_at_quantile(q));
        LatencySnapshot {
            samples: h.len(),
            failed: inner.failed,
            p50_ms: at(0.5),
            p95_ms: at(0.95),
            p99_ms: at(0.99),
            max_ms: (!empty).then(|| h.max()),
        }
    }
}

impl Default for UpstreamLatency {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_requests_no_percentiles() {
        let snap = UpstreamLatency::new().snapshot();
        assert_eq!(snap, LatencySnapshot::default());
    }

    #[test]
    fn fast_attempts_round_up_and_failures_are_counted() {
        let latency = UpstreamLatency::new();
        latency.record(Duration::from_micros(200), true);
        latency.record(Duration::from_millis(40), true);
        latency.record(Duration::from_secs(12), false);

        let snap = latency.snapshot();
        assert_eq!(snap.samples, 3);
        assert_eq!(snap.failed, 1);
        assert_eq!(snap.p50_ms.map(|p| (39..=41).contains(&p)), Some(true));
        assert!(snap.max_ms.unwrap() >= 11_990);
    }

    #[test]
    fn absurd_durations_are_clamped() {
        let latency = UpstreamLatency::new();
        latency.record(Duration::from_secs(86_400), false);
        assert!(latency.snapshot().max_ms.unwrap() <= MAX_MS + MAX_MS / 1000);
    }
}
