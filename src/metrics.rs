//! Per-worker results and run-level aggregation.
//!
//! Run throughput is computed over the makespan of the parallel phase, the
//! wall-clock span from before the first worker starts to after the last
//! one is joined, never over the sum of worker durations.

use std::time::Duration;

/// Outcome of one successful shard write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunResult {
    /// Shard index.
    pub shard: usize,
    /// Rows acknowledged by the store.
    pub rows_written: usize,
    /// Submit-to-acknowledge duration of the shard's batch.
    pub elapsed: Duration,
}

impl RunResult {
    /// Elapsed time in seconds.
    pub fn elapsed_seconds(&self) -> f64 {
        self.elapsed.as_secs_f64()
    }

    /// Rows per second for this shard; 0.0 when no time elapsed.
    pub fn rows_per_second(&self) -> f64 {
        rate(self.rows_written, self.elapsed)
    }
}

/// Simple latency summary over worker durations.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct LatencySnapshot {
    /// Number of durations recorded.
    pub count: u64,
    /// Total across all durations (microseconds).
    pub total_us: u128,
    /// Longest duration (microseconds).
    pub max_us: u64,
    /// Shortest duration (microseconds).
    pub min_us: u64,
}

impl LatencySnapshot {
    fn record(&mut self, elapsed: Duration) {
        let us = u64::try_from(elapsed.as_micros()).unwrap_or(u64::MAX);
        if self.count == 0 {
            self.min_us = us;
            self.max_us = us;
        } else {
            self.min_us = self.min_us.min(us);
            self.max_us = self.max_us.max(us);
        }
        self.count += 1;
        self.total_us += u128::from(us);
    }

    /// Mean duration in microseconds.
    pub fn mean_us(&self) -> Option<f64> {
        if self.count == 0 {
            return None;
        }
        Some(self.total_us as f64 / self.count as f64)
    }
}

/// Aggregate over the workers of one run.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub struct RunSummary {
    /// Sum of `rows_written` across aggregated workers.
    pub total_rows: usize,
    /// Makespan of the parallel phase.
    pub total_elapsed: Duration,
    /// Number of aggregated workers.
    pub workers: usize,
    /// Spread of the individual worker durations.
    pub latency: LatencySnapshot,
}

impl RunSummary {
    /// Fold `results` into a summary over the measured `makespan`.
    pub fn aggregate(results: &[RunResult], makespan: Duration) -> Self {
        let mut latency = LatencySnapshot::default();
        for result in results {
            latency.record(result.elapsed);
        }
        Self {
            total_rows: results.iter().map(|r| r.rows_written).sum(),
            total_elapsed: makespan,
            workers: results.len(),
            latency,
        }
    }

    /// Makespan in seconds.
    pub fn elapsed_seconds(&self) -> f64 {
        self.total_elapsed.as_secs_f64()
    }

    /// Rows per second over the makespan; 0.0 when no time elapsed.
    pub fn throughput(&self) -> f64 {
        rate(self.total_rows, self.total_elapsed)
    }
}

fn rate(rows: usize, elapsed: Duration) -> f64 {
    let secs = elapsed.as_secs_f64();
    if secs <= 0.0 {
        return 0.0;
    }
    rows as f64 / secs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(shard: usize, rows_written: usize, millis: u64) -> RunResult {
        RunResult {
            shard,
            rows_written,
            elapsed: Duration::from_millis(millis),
        }
    }

    #[test]
    fn aggregates_rows_over_makespan() {
        let results = [
            result(0, 100, 1500),
            result(1, 250, 1800),
            result(2, 0, 0),
            result(3, 400, 2000),
        ];
        let summary = RunSummary::aggregate(&results, Duration::from_secs(2));
        assert_eq!(summary.total_rows, 750);
        assert_eq!(summary.workers, 4);
        assert!((summary.throughput() - 375.0).abs() < f64::EPSILON);
        // Not the sum of worker durations.
        assert_eq!(summary.elapsed_seconds(), 2.0);
    }

    #[test]
    fn zero_elapsed_reports_zero_rate() {
        let summary = RunSummary::aggregate(&[result(0, 0, 0)], Duration::ZERO);
        assert_eq!(summary.throughput(), 0.0);
        assert_eq!(result(0, 10, 0).rows_per_second(), 0.0);
    }

    #[test]
    fn latency_tracks_spread() {
        let summary = RunSummary::aggregate(
            &[result(0, 1, 10), result(1, 1, 30), result(2, 1, 20)],
            Duration::from_millis(30),
        );
        assert_eq!(summary.latency.count, 3);
        assert_eq!(summary.latency.min_us, 10_000);
        assert_eq!(summary.latency.max_us, 30_000);
        assert_eq!(summary.latency.mean_us(), Some(20_000.0));
        assert!(RunSummary::default().latency.mean_us().is_none());
    }
}
