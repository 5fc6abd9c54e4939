//! Wall-clock performance tracking for ingestion runs.
//!
//! The monitor keeps counters and per-document timings, derives throughput and ETA,
//! and renders an in-place progress bar. The bar goes to stderr so it never mixes
//! with structured output or stdio protocol frames.

use std::io::Write;
use std::time::Instant;

/// Statistics snapshot derived from the monitor's counters.
#[derive(Debug, Clone, Default)]
pub struct PerformanceStats {
    /// Seconds since `start` was called.
    pub elapsed_seconds: f64,
    /// Human-readable elapsed time.
    pub elapsed_formatted: String,
    /// Successfully processed documents.
    pub documents_processed: u64,
    /// Failed documents.
    pub documents_failed: u64,
    /// Processed plus failed.
    pub total_processed: u64,
    /// Percentage of successes among finished documents.
    pub success_rate: f64,
    /// Documents finished per minute.
    pub throughput_per_minute: f64,
    /// Mean per-document time, when timings were recorded.
    pub avg_processing_time_ms: Option<f64>,
    /// Documents left, when a total was supplied.
    pub remaining_documents: Option<u64>,
    /// Estimated seconds to completion, when a total was supplied.
    pub eta_seconds: Option<f64>,
    /// Human-readable ETA, when a total was supplied.
    pub eta_formatted: Option<String>,
    /// Progress percentage, when a total was supplied.
    pub completion_percentage: Option<f64>,
}

/// Tracks elapsed time, counters, and per-document timings during a run.
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    start_time: Option<Instant>,
    documents_processed: u64,
    documents_failed: u64,
    processing_times_ms: Vec<f64>,
}

impl PerformanceMonitor {
    /// Create an idle monitor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start (or restart) the clock.
    pub fn start(&mut self) {
        self.start_time = Some(Instant::now());
    }

    /// Record one finished document, optionally with its processing time.
    pub fn record_document(&mut self, processing_time_ms: Option<f64>, failed: bool) {
        if failed {
            self.documents_failed += 1;
        } else {
            self.documents_processed += 1;
        }
        if let Some(ms) = processing_time_ms {
            self.processing_times_ms.push(ms);
        }
    }

    /// Compute current statistics; ETA fields require `total_documents`.
    pub fn get_statistics(&self, total_documents: Option<u64>) -> PerformanceStats {
        let Some(start) = self.start_time else {
            return PerformanceStats::default();
        };

        let elapsed = start.elapsed().as_secs_f64();
        let total_processed = self.documents_processed + self.documents_failed;

        let mut stats = PerformanceStats {
            elapsed_seconds: elapsed,
            elapsed_formatted: format_duration(elapsed),
            documents_processed: self.documents_processed,
            documents_failed: self.documents_failed,
            total_processed,
            success_rate: if total_processed > 0 {
                self.documents_processed as f64 / total_processed as f64 * 100.0
            } else {
                0.0
            },
            throughput_per_minute: if elapsed > 0.0 {
                total_processed as f64 / elapsed * 60.0
            } else {
                0.0
            },
            ..PerformanceStats::default()
        };

        if !self.processing_times_ms.is_empty() {
            stats.avg_processing_time_ms = Some(
                self.processing_times_ms.iter().sum::<f64>()
                    / self.processing_times_ms.len() as f64,
            );
        }

        if let Some(total) = total_documents {
            if total_processed > 0 && elapsed > 0.0 {
                let remaining = total.saturating_sub(total_processed);
                let rate = total_processed as f64 / elapsed;
                let eta = remaining as f64 / rate;
                stats.remaining_documents = Some(remaining);
                stats.eta_seconds = Some(eta);
                stats.eta_formatted = Some(format_duration(eta));
                stats.completion_percentage = Some(total_processed as f64 / total as f64 * 100.0);
            }
        }

        stats
    }

    /// Render an in-place progress bar with percentage and ETA.
    pub fn print_progress(&self, current: u64, total: u64, prefix: &str) {
        if total == 0 {
            return;
        }

        let percent = current as f64 / total as f64 * 100.0;
        let bar_length = 50u64;
        let filled = (bar_length * current / total) as usize;
        let bar: String = "█".repeat(filled) + &"░".repeat(bar_length as usize - filled);

        let eta = self
            .get_statistics(Some(total))
            .eta_formatted
            .unwrap_or_else(|| "calculating...".to_string());

        let mut stderr = std::io::stderr().lock();
        let _ = write!(
            stderr,
            "\r{prefix}: |{bar}| {percent:.1}% ({current}/{total}) ETA: {eta}"
        );
        if current >= total {
            let _ = writeln!(stderr);
        }
        let _ = stderr.flush();
    }
}

/// Format a duration as `X.Xs`, `Mm Ss`, or `Hh Mm` depending on magnitude.
pub fn format_duration(seconds: f64) -> String {
    if seconds < 60.0 {
        format!("{seconds:.1}s")
    } else if seconds < 3600.0 {
        let minutes = (seconds / 60.0) as u64;
        let secs = (seconds % 60.0) as u64;
        format!("{minutes}m {secs}s")
    } else {
        let hours = (seconds / 3600.0) as u64;
        let minutes = ((seconds % 3600.0) / 60.0) as u64;
        format!("{hours}h {minutes}m")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_formatting_switches_units() {
        assert_eq!(format_duration(42.66), "42.7s");
        assert_eq!(format_duration(185.0), "3m 5s");
        assert_eq!(format_duration(7890.0), "2h 11m");
    }

    #[test]
    fn statistics_track_counts_and_success_rate() {
        let mut monitor = PerformanceMonitor::new();
        monitor.start();
        monitor.record_document(Some(120.0), false);
        monitor.record_document(Some(80.0), false);
        monitor.record_document(None, true);

        let stats = monitor.get_statistics(Some(10));
        assert_eq!(stats.documents_processed, 2);
        assert_eq!(stats.documents_failed, 1);
        assert_eq!(stats.total_processed, 3);
        assert!((stats.success_rate - 66.666).abs() < 0.1);
        assert_eq!(stats.avg_processing_time_ms, Some(100.0));
        assert_eq!(stats.remaining_documents, Some(7));
        assert!(stats.eta_formatted.is_some());
    }

    #[test]
    fn unstarted_monitor_yields_empty_stats() {
        let monitor = PerformanceMonitor::new();
        let stats = monitor.get_statistics(Some(5));
        assert_eq!(stats.total_processed, 0);
        assert!(stats.eta_seconds.is_none());
    }
}
