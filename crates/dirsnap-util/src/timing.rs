//! RAII-based timing for listings and transfers.
//!
//! # Example
//!
//! ```rust,ignore
//! use dirsnap_util::timing::TimingGuard;
//!
//! async fn list_directory(path: &str) {
//!     let _timing = TimingGuard::listing(path);
//!     // ... transport listing ...
//!     // Duration is logged when _timing is dropped
//! }
//! ```

use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// RAII guard that logs how long an operation took when it is dropped.
///
/// Short operations are logged at debug level, slower ones at info, and
/// anything past the warn threshold at warn.
pub struct TimingGuard {
    operation_type: &'static str,
    /// Usually the path the operation works on.
    operation_name: String,
    start: Instant,
    info_threshold: Duration,
    warn_threshold: Duration,
}

impl TimingGuard {
    /// Start timing an operation.
    pub fn new(operation_type: &'static str, operation_name: impl Into<String>) -> Self {
        let operation_name = operation_name.into();
        debug!(
            operation_type = operation_type,
            operation_name = %operation_name,
            "Starting operation"
        );
        Self {
            operation_type,
            operation_name,
            start: Instant::now(),
            info_threshold: Duration::from_millis(250),
            warn_threshold: Duration::from_secs(10),
        }
    }

    /// Time a directory listing.
    pub fn listing(path: impl Into<String>) -> Self {
        Self::new("listing", path)
    }

    /// Time a file transfer.
    ///
    /// Transfers are expected to take longer than listings, so the info
    /// threshold is raised.
    pub fn transfer(path: impl Into<String>) -> Self {
        Self::new("transfer", path).with_info_threshold(Duration::from_secs(1))
    }

    /// Set the duration from which completion is logged at info level.
    pub fn with_info_threshold(mut self, threshold: Duration) -> Self {
        self.info_threshold = threshold;
        self
    }

    /// Set the duration from which completion is logged at warn level.
    pub fn with_warn_threshold(mut self, threshold: Duration) -> Self {
        self.warn_threshold = threshold;
        self
    }

    /// Elapsed time so far.
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for TimingGuard {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let duration_ms = elapsed.as_millis() as u64;

        if elapsed >= self.warn_threshold {
            warn!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms,
                "Slow operation completed"
            );
        } else if elapsed >= self.info_threshold {
            info!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms,
                "Operation completed"
            );
        } else {
            debug!(
                operation_type = self.operation_type,
                operation_name = %self.operation_name,
                duration_ms,
                "Operation completed"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_timing_guard_elapsed() {
        let guard = TimingGuard::listing("/data/in");
        sleep(Duration::from_millis(10));
        assert!(guard.elapsed() >= Duration::from_millis(10));
    }

    #[test]
    fn test_transfer_raises_info_threshold() {
        let guard = TimingGuard::transfer("/data/in/a.csv");
        assert_eq!(guard.operation_type, "transfer");
        assert_eq!(guard.info_threshold, Duration::from_secs(1));
    }

    #[test]
    fn test_custom_thresholds() {
        let guard = TimingGuard::new("listing", "/data")
            .with_info_threshold(Duration::from_millis(1))
            .with_warn_threshold(Duration::from_millis(2));
        sleep(Duration::from_millis(3));
        assert!(guard.elapsed() >= guard.warn_threshold);
    }
}
