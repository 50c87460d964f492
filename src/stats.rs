//! Roundtrip statistics aggregation and formatted output.
//!
//! Keeps a running count, mean and worst roundtrip without storing samples, throttles
//! the human-readable summary, and prints final snapshots as text, JSON or CSV.

use std::{
    sync::{Mutex, MutexGuard},
    time::{Duration, Instant},
};

use chrono::{DateTime, Utc};

use crate::wire::Tag;

/// Samples whose ping was sent earlier than this after start are discarded.
pub const WARMUP_WINDOW: Duration = Duration::from_secs(5);

/// Minimum spacing between two roundtrip summaries in the log.
pub const REPORT_INTERVAL: Duration = Duration::from_secs(1);

/// Output format for statistics reporting.
#[derive(Debug, Clone, Copy, Default, clap::ValueEnum, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text output.
    #[default]
    Text,
    /// JSON output for machine consumption.
    Json,
    /// CSV output for spreadsheet import.
    Csv,
}

/// What `record` did with a sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordOutcome {
    /// Sent inside the warm-up window; aggregates untouched.
    Discarded,
    /// Aggregates updated, summary suppressed by the throttle.
    Recorded,
    /// Aggregates updated and a summary was logged.
    Reported,
}

struct MetricsState {
    total_roundtrips: u64,
    avg_roundtrip_ms: f64,
    worst_roundtrip_ms: f64,
    last_report_at: Instant,
    started_at: Instant,
}

/// Running roundtrip statistics shared by the dispatcher and the ack handlers.
pub struct MetricsAggregator {
    state: Mutex<MetricsState>,
    started_wall: DateTime<Utc>,
}

impl MetricsAggregator {
    /// Creates an aggregator whose warm-up window starts now.
    pub fn new() -> Self {
        Self::starting_at(Instant::now())
    }

    /// Creates an aggregator as if the process had started at `started_at`.
    pub fn starting_at(started_at: Instant) -> Self {
        let since_start = chrono::Duration::from_std(started_at.elapsed())
            .unwrap_or_else(|_| chrono::Duration::zero());
        let started_wall = Utc::now() - since_start;

        MetricsAggregator {
            state: Mutex::new(MetricsState {
                total_roundtrips: 0,
                avg_roundtrip_ms: 0.0,
                worst_roundtrip_ms: 0.0,
                last_report_at: started_at,
                started_at,
            }),
            started_wall,
        }
    }

    /// Folds one roundtrip into the aggregates.
    pub fn record(&self, tag: Tag, elapsed_ms: f64, sent_at: Instant) -> RecordOutcome {
        self.record_at(tag, elapsed_ms, sent_at, Instant::now())
    }

    fn record_at(
        &self,
        tag: Tag,
        elapsed_ms: f64,
        sent_at: Instant,
        now: Instant,
    ) -> RecordOutcome {
        let mut state = self.lock();

        if sent_at.saturating_duration_since(state.started_at) < WARMUP_WINDOW {
            return RecordOutcome::Discarded;
        }

        state.total_roundtrips += 1;
        let total = state.total_roundtrips as f64;
        state.avg_roundtrip_ms = (state.avg_roundtrip_ms * (total - 1.0) + elapsed_ms) / total;
        if elapsed_ms > state.worst_roundtrip_ms {
            state.worst_roundtrip_ms = elapsed_ms;
        }

        if now.saturating_duration_since(state.last_report_at) < REPORT_INTERVAL {
            return RecordOutcome::Recorded;
        }

        state.last_report_at = now;
        log::info!(
            "Roundtrip {} time: {:.4} ms, Total: {}, Avg: {:.4} ms, Worst: {:.4} ms",
            tag,
            elapsed_ms,
            state.total_roundtrips,
            state.avg_roundtrip_ms,
            state.worst_roundtrip_ms
        );
        RecordOutcome::Reported
    }

    pub fn total_roundtrips(&self) -> u64 {
        self.lock().total_roundtrips
    }

    pub fn avg_roundtrip_ms(&self) -> f64 {
        self.lock().avg_roundtrip_ms
    }

    pub fn worst_roundtrip_ms(&self) -> f64 {
        self.lock().worst_roundtrip_ms
    }

    /// Builds a consistent snapshot of current statistics.
    pub fn snapshot(&self, pending_pings: usize) -> StatsSnapshot {
        let state = self.lock();
        StatsSnapshot {
            total_roundtrips: state.total_roundtrips,
            avg_roundtrip_ms: state.avg_roundtrip_ms,
            worst_roundtrip_ms: state.worst_roundtrip_ms,
            pending_pings,
            started_at: self.started_wall,
            uptime_seconds: state.started_at.elapsed().as_secs_f64(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for MetricsAggregator {
    fn default() -> Self {
        Self::new()
    }
}

/// Serializable roundtrip statistics snapshot.
#[derive(serde::Serialize)]
pub struct StatsSnapshot {
    pub total_roundtrips: u64,
    pub avg_roundtrip_ms: f64,
    pub worst_roundtrip_ms: f64,
    pub pending_pings: usize,
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: f64,
}

impl StatsSnapshot {
    /// Prints the summary in the given format. Nothing is printed if it cannot be rendered.
    pub fn print(&self, format: OutputFormat) {
        if let Some(out) = self.render(format) {
            println!("{}", out);
        }
    }

    pub fn render(&self, format: OutputFormat) -> Option<String> {
        match format {
            OutputFormat::Text => Some(self.render_text()),
            OutputFormat::Json => self.render_json(),
            OutputFormat::Csv => Some(self.render_csv()),
        }
    }

    fn render_text(&self) -> String {
        format!(
            "\n--- Roundtrip Statistics ---\n\
             Started: {}\n\
             Uptime: {:.1} seconds\n\
             Total roundtrips: {}\n\
             Avg roundtrip: {:.4} ms\n\
             Worst roundtrip: {:.4} ms\n\
             Pending pings: {}",
            self.started_at.to_rfc3339(),
            self.uptime_seconds,
            self.total_roundtrips,
            self.avg_roundtrip_ms,
            self.worst_roundtrip_ms,
            self.pending_pings,
        )
    }

    fn render_json(&self) -> Option<String> {
        match serde_json::to_string(self) {
            Ok(json) => Some(json),
            Err(e) => {
                log::error!("Cannot serialize statistics: {}", e);
                None
            }
        }
    }

    fn render_csv(&self) -> String {
        format!(
            "total_roundtrips,avg_roundtrip_ms,worst_roundtrip_ms,pending_pings,started_at,uptime_seconds\n\
             {},{:.4},{:.4},{},{},{:.1}",
            self.total_roundtrips,
            self.avg_roundtrip_ms,
            self.worst_roundtrip_ms,
            self.pending_pings,
            self.started_at.to_rfc3339(),
            self.uptime_seconds,
        )
    }
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, thread};

    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    #[test]
    fn test_empty_aggregator() {
        let m = MetricsAggregator::new();
        assert_eq!(m.total_roundtrips(), 0);
        assert_eq!(m.avg_roundtrip_ms(), 0.0);
        assert_eq!(m.worst_roundtrip_ms(), 0.0);
    }

    #[test]
    fn test_warmup_scenario() {
        let t0 = Instant::now();
        let m = MetricsAggregator::starting_at(t0);

        assert_eq!(
            m.record_at(1, 50.0, t0 + secs(2), t0 + secs(2)),
            RecordOutcome::Discarded
        );
        assert_eq!(m.total_roundtrips(), 0);
        assert_eq!(m.avg_roundtrip_ms(), 0.0);
        assert_eq!(m.worst_roundtrip_ms(), 0.0);

        m.record_at(2, 100.0, t0 + secs(6), t0 + secs(6));
        assert_eq!(m.total_roundtrips(), 1);
        assert!((m.avg_roundtrip_ms() - 100.0).abs() < 1e-9);
        assert!((m.worst_roundtrip_ms() - 100.0).abs() < 1e-9);

        m.record_at(3, 300.0, t0 + secs(7), t0 + secs(7));
        assert_eq!(m.total_roundtrips(), 2);
        assert!((m.avg_roundtrip_ms() - 200.0).abs() < 1e-9);
        assert!((m.worst_roundtrip_ms() - 300.0).abs() < 1e-9);
    }

    #[test]
    fn test_warmup_uses_send_time() {
        let t0 = Instant::now();
        let m = MetricsAggregator::starting_at(t0);

        // Acked well after warm-up, but sent inside it.
        assert_eq!(
            m.record_at(1, 4000.0, t0 + secs(1), t0 + secs(5)),
            RecordOutcome::Discarded
        );
        assert_eq!(m.total_roundtrips(), 0);
    }

    #[test]
    fn test_mean_and_worst() {
        let t0 = Instant::now();
        let m = MetricsAggregator::starting_at(t0);
        let samples = [12.5, 3.0, 47.25, 8.0, 19.75, 0.5];

        for (i, e) in samples.iter().enumerate() {
            m.record_at(i as Tag, *e, t0 + secs(10), t0 + secs(10));
        }

        let mean = samples.iter().sum::<f64>() / samples.len() as f64;
        assert_eq!(m.total_roundtrips(), samples.len() as u64);
        assert!((m.avg_roundtrip_ms() - mean).abs() < 1e-9);
        assert_eq!(m.worst_roundtrip_ms(), 47.25);
    }

    #[test]
    fn test_report_throttled() {
        let t0 = Instant::now();
        let m = MetricsAggregator::starting_at(t0);
        let sent = t0 + secs(6);

        assert_eq!(m.record_at(1, 1.0, sent, t0 + secs(6)), RecordOutcome::Reported);
        assert_eq!(
            m.record_at(2, 1.0, sent, t0 + secs(6) + Duration::from_millis(400)),
            RecordOutcome::Recorded
        );
        assert_eq!(
            m.record_at(3, 9.0, sent, t0 + secs(6) + Duration::from_millis(999)),
            RecordOutcome::Recorded
        );
        assert_eq!(m.record_at(4, 1.0, sent, t0 + secs(7)), RecordOutcome::Reported);

        // Suppressed samples still count.
        assert_eq!(m.total_roundtrips(), 4);
        assert_eq!(m.worst_roundtrip_ms(), 9.0);
    }

    #[test]
    fn test_concurrent_record_no_lost_updates() {
        let t0 = Instant::now();
        let m = Arc::new(MetricsAggregator::starting_at(t0));
        let sent = t0 + secs(10);

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let m = m.clone();
                thread::spawn(move || {
                    for i in 0..1000 {
                        m.record(i, 10.0, sent);
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(m.total_roundtrips(), 8000);
        assert!((m.avg_roundtrip_ms() - 10.0).abs() < 1e-9);
        assert_eq!(m.worst_roundtrip_ms(), 10.0);
    }

    #[test]
    fn test_snapshot_matches_accessors() {
        let t0 = Instant::now();
        let m = MetricsAggregator::starting_at(t0);
        m.record_at(1, 20.0, t0 + secs(6), t0 + secs(6));
        m.record_at(2, 40.0, t0 + secs(6), t0 + secs(6));

        let snap = m.snapshot(3);
        assert_eq!(snap.total_roundtrips, 2);
        assert!((snap.avg_roundtrip_ms - 30.0).abs() < 1e-9);
        assert_eq!(snap.worst_roundtrip_ms, 40.0);
        assert_eq!(snap.pending_pings, 3);
    }

    fn sample_snapshot() -> StatsSnapshot {
        StatsSnapshot {
            total_roundtrips: 10,
            avg_roundtrip_ms: 1.5,
            worst_roundtrip_ms: 4.25,
            pending_pings: 1,
            started_at: DateTime::<Utc>::from_timestamp(1_700_000_000, 0).unwrap(),
            uptime_seconds: 60.0,
        }
    }

    #[test]
    fn test_stats_text_format() {
        let text = sample_snapshot().render(OutputFormat::Text).unwrap();
        assert!(text.contains("Total roundtrips: 10"));
        assert!(text.contains("Worst roundtrip: 4.2500 ms"));
    }

    #[test]
    fn test_stats_json_format() {
        let json = sample_snapshot().render(OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["total_roundtrips"], 10);
        assert_eq!(value["pending_pings"], 1);
        assert_eq!(value["started_at"], "2023-11-14T22:13:20Z");
    }

    #[test]
    fn test_stats_csv_format() {
        let csv = sample_snapshot().render(OutputFormat::Csv).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("total_roundtrips,"));
        assert!(lines[1].starts_with("10,1.5000,4.2500,1,"));
    }

    #[test]
    fn test_stats_json_non_finite_values() {
        let snap = StatsSnapshot {
            avg_roundtrip_ms: f64::NAN,
            worst_roundtrip_ms: f64::INFINITY,
            ..sample_snapshot()
        };
        let json = snap.render(OutputFormat::Json).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert!(value["avg_roundtrip_ms"].is_null());
        assert!(value["worst_roundtrip_ms"].is_null());
        assert_eq!(value["total_roundtrips"], 10);
    }
}
