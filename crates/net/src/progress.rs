//! Transfer progress reporting

use std::time::{Duration, Instant};
use updkit_events::{AppEvent, DownloadEvent, EventEmitter, EventSender};
use updkit_types::UpdateVersion;

/// Batch-wide progress snapshot
#[derive(Debug, Clone, PartialEq)]
pub struct TransferProgress {
    /// Package currently being transferred
    pub version: UpdateVersion,
    pub bytes_received: u64,
    /// Sum of the known package sizes in the batch
    pub total_bytes: u64,
    pub percentage: f32,
    /// Rate since the previous report
    pub bytes_per_second: f64,
}

/// Receiver of throttled progress reports
pub trait ProgressSink: Send + Sync {
    fn report(&self, progress: &TransferProgress);
}

/// Sink that drops every report
#[derive(Debug, Clone, Copy, Default)]
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn report(&self, _progress: &TransferProgress) {}
}

/// Adapts a closure into a sink
pub struct ProgressCallback<F>(pub F);

impl<F> ProgressSink for ProgressCallback<F>
where
    F: Fn(&TransferProgress) + Send + Sync,
{
    fn report(&self, progress: &TransferProgress) {
        (self.0)(progress);
    }
}

impl ProgressSink for EventSender {
    fn report(&self, progress: &TransferProgress) {
        self.emit(AppEvent::Download(DownloadEvent::Progress {
            version: progress.version.clone(),
            bytes_received: progress.bytes_received,
            total_bytes: progress.total_bytes,
            percentage: progress.percentage,
            bytes_per_second: progress.bytes_per_second,
        }));
    }
}

/// Decides when to report and computes the rate between reports
#[derive(Debug)]
pub(crate) struct ProgressThrottle {
    interval: Duration,
    last_report: Option<Instant>,
    bytes_at_last_report: u64,
}

impl ProgressThrottle {
    pub(crate) fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_report: None,
            bytes_at_last_report: 0,
        }
    }

    /// Returns the rate to report, or `None` when the interval has not elapsed
    pub(crate) fn tick(&mut self, bytes_received: u64, force: bool) -> Option<f64> {
        let now = Instant::now();
        let elapsed = match self.last_report {
            Some(last) => now.duration_since(last),
            None => {
                self.last_report = Some(now);
                self.bytes_at_last_report = bytes_received;
                return Some(0.0);
            }
        };

        if !force && elapsed < self.interval {
            return None;
        }

        let delta = bytes_received.saturating_sub(self.bytes_at_last_report);
        let seconds = elapsed.as_secs_f64();
        #[allow(clippy::cast_precision_loss)]
        let rate = if seconds > 0.0 {
            delta as f64 / seconds
        } else {
            0.0
        };

        self.last_report = Some(now);
        self.bytes_at_last_report = bytes_received;
        Some(rate)
    }
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub(crate) fn percentage(received: u64, total: u64) -> f32 {
    if total == 0 {
        return 0.0;
    }
    ((received as f64 / total as f64) * 100.0).min(100.0) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_throttle_reports_first_then_waits() {
        let mut throttle = ProgressThrottle::new(Duration::from_secs(60));
        assert_eq!(throttle.tick(10, false), Some(0.0));
        assert_eq!(throttle.tick(20, false), None);
        assert!(throttle.tick(30, true).is_some());
    }

    #[test]
    fn test_zero_interval_always_reports() {
        let mut throttle = ProgressThrottle::new(Duration::ZERO);
        assert!(throttle.tick(1, false).is_some());
        assert!(throttle.tick(2, false).is_some());
    }

    #[test]
    fn test_percentage_bounds() {
        assert!((percentage(50, 200) - 25.0).abs() < f32::EPSILON);
        assert!((percentage(10, 0)).abs() < f32::EPSILON);
        assert!((percentage(300, 200) - 100.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_callback_sink() {
        let seen = Mutex::new(Vec::new());
        let sink = ProgressCallback(|p: &TransferProgress| {
            seen.lock().unwrap().push(p.bytes_received);
        });
        sink.report(&TransferProgress {
            version: UpdateVersion::new(1, 0, 0),
            bytes_received: 5,
            total_bytes: 10,
            percentage: 50.0,
            bytes_per_second: 1.0,
        });
        assert_eq!(*seen.lock().unwrap(), vec![5]);
    }
}
