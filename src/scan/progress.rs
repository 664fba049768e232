use std::time::Instant;

use tracing::info;

/// How many files between progress log lines.
pub const DEFAULT_LOG_INTERVAL: u64 = 100;

/// Tracks throughput while the writer drains the results queue. The total
/// is unknown until discovery finishes, so the ETA appears midway through
/// fast scans.
#[derive(Debug)]
pub struct ProgressTracker {
    started: Instant,
    log_interval: u64,
    files_processed: u64,
    errors: u64,
    bytes_processed: u64,
    total_files: Option<u64>,
}

impl ProgressTracker {
    pub fn new(log_interval: u64) -> Self {
        Self {
            started: Instant::now(),
            log_interval: log_interval.max(1),
            files_processed: 0,
            errors: 0,
            bytes_processed: 0,
            total_files: None,
        }
    }

    pub fn set_total(&mut self, total: u64) {
        self.total_files = Some(total);
    }

    pub fn record_file(&mut self, bytes: u64) {
        self.files_processed += 1;
        self.bytes_processed += bytes;
        if self.files_processed % self.log_interval == 0 {
            self.log_line();
        }
    }

    pub fn record_error(&mut self) {
        self.errors += 1;
    }

    pub fn files_processed(&self) -> u64 {
        self.files_processed
    }

    pub fn errors(&self) -> u64 {
        self.errors
    }

    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.started.elapsed().as_secs_f64()
    }

    /// Files per second since the scan started.
    pub fn rate(&self) -> f64 {
        let elapsed = self.elapsed_seconds();
        if elapsed > 0.0 {
            self.files_processed as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Projected seconds until completion, when the total is known and some
    /// throughput has been observed.
    pub fn eta_seconds(&self) -> Option<f64> {
        let total = self.total_files?;
        let remaining = total.saturating_sub(self.files_processed);
        let rate = self.rate();
        (rate > 0.0).then(|| remaining as f64 / rate)
    }

    fn log_line(&self) {
        match (self.total_files, self.eta_seconds()) {
            (Some(total), Some(eta)) => info!(
                "processed {}/{} files ({:.1}/s, eta {:.0}s, {} errors)",
                self.files_processed,
                total,
                self.rate(),
                eta,
                self.errors
            ),
            _ => info!(
                "processed {} files ({:.1}/s, {} errors)",
                self.files_processed,
                self.rate(),
                self.errors
            ),
        }
    }

    pub fn log_summary(&self) {
        info!(
            "scan finished: {} files, {} bytes, {} errors in {:.1}s ({:.1} files/s)",
            self.files_processed,
            self.bytes_processed,
            self.errors,
            self.elapsed_seconds(),
            self.rate()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate() {
        let mut tracker = ProgressTracker::new(10);
        tracker.record_file(100);
        tracker.record_file(50);
        tracker.record_error();

        assert_eq!(tracker.files_processed(), 2);
        assert_eq!(tracker.bytes_processed(), 150);
        assert_eq!(tracker.errors(), 1);
    }

    #[test]
    fn eta_requires_a_known_total() {
        let mut tracker = ProgressTracker::new(10);
        tracker.record_file(1);
        assert!(tracker.eta_seconds().is_none());

        tracker.set_total(100);
        // some nonzero time has elapsed, so a rate exists
        assert!(tracker.eta_seconds().is_some());
    }

    #[test]
    fn eta_shrinks_to_zero_at_completion() {
        let mut tracker = ProgressTracker::new(10);
        tracker.set_total(2);
        tracker.record_file(1);
        tracker.record_file(1);
        let eta = tracker.eta_seconds().unwrap();
        assert!(eta <= f64::EPSILON);
    }

    #[test]
    fn zero_log_interval_is_clamped() {
        // must not panic with a modulo by zero
        let mut tracker = ProgressTracker::new(0);
        tracker.record_file(1);
    }
}
