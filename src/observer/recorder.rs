//! In-memory metrics aggregation.

use crate::core::{AttemptRecord, ErrorKind};
use crate::observer::events::{CallSummary, StateTransitionEvent};
use crate::observer::EventObserver;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

/// Aggregated counters for one protected endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointMetrics {
    /// Calls that returned a value.
    pub success: u64,
    /// Calls that ended in any failure kind other than cancellation.
    pub failure: u64,
    /// Failed calls the breaker rejected without an attempt.
    pub rejected: u64,
    /// Calls the caller cancelled.
    pub cancelled: u64,
    /// Attempts made across all calls.
    pub attempts: u64,
    /// Attempts beyond the first within a call.
    pub retries: u64,
    /// Transport time of each successful attempt, in milliseconds.
    pub response_times_ms: Vec<u64>,
    /// Messages of failed calls, in order.
    pub errors: Vec<String>,
}

impl EndpointMetrics {
    /// Returns the fraction of finished calls that succeeded.
    pub fn success_rate(&self) -> f64 {
        let total = self.success + self.failure;
        if total == 0 {
            return 1.0;
        }
        self.success as f64 / total as f64
    }

    /// Returns the mean successful response time in milliseconds.
    pub fn mean_response_time_ms(&self) -> Option<f64> {
        if self.response_times_ms.is_empty() {
            return None;
        }
        let sum: u64 = self.response_times_ms.iter().sum();
        Some(sum as f64 / self.response_times_ms.len() as f64)
    }
}

/// A point-in-time copy of everything a [`MetricsRecorder`] has seen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsReport {
    /// When the report was taken.
    pub generated_at: DateTime<Utc>,
    /// Counters keyed by endpoint.
    pub endpoints: BTreeMap<String, EndpointMetrics>,
    /// Every breaker transition, oldest first.
    pub state_transitions: Vec<StateTransitionEvent>,
}

#[derive(Debug, Default)]
struct RecorderState {
    endpoints: BTreeMap<String, EndpointMetrics>,
    transitions: Vec<StateTransitionEvent>,
}

/// An observer that aggregates call outcomes per endpoint and keeps the
/// full breaker transition history.
///
/// The recorder lives as long as the caller keeps it; it can be shared by
/// several executors and persisted with [`MetricsRecorder::write_json`].
#[derive(Debug, Default)]
pub struct MetricsRecorder {
    state: Mutex<RecorderState>,
}

impl MetricsRecorder {
    /// Creates an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    fn with_state<R>(&self, f: impl FnOnce(&mut RecorderState) -> R) -> R {
        let mut state = self
            .state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        f(&mut state)
    }

    /// Returns the counters for one endpoint.
    pub fn endpoint(&self, endpoint: &str) -> Option<EndpointMetrics> {
        self.with_state(|s| s.endpoints.get(endpoint).cloned())
    }

    /// Returns the transition history.
    pub fn transitions(&self) -> Vec<StateTransitionEvent> {
        self.with_state(|s| s.transitions.clone())
    }

    /// Takes a snapshot of all collected metrics.
    pub fn report(&self) -> MetricsReport {
        self.with_state(|s| MetricsReport {
            generated_at: Utc::now(),
            endpoints: s.endpoints.clone(),
            state_transitions: s.transitions.clone(),
        })
    }

    /// Discards everything collected so far.
    pub fn clear(&self) {
        self.with_state(|s| *s = RecorderState::default());
    }

    /// Writes a report to `writer` as pretty-printed JSON.
    pub fn write_json_to<W: Write>(&self, writer: W) -> io::Result<()> {
        serde_json::to_writer_pretty(writer, &self.report())?;
        Ok(())
    }

    /// Writes a report to the file at `path`, replacing it if it exists.
    pub fn write_json(&self, path: impl AsRef<Path>) -> io::Result<()> {
        let path = path.as_ref();
        let mut writer = BufWriter::new(File::create(path)?);
        self.write_json_to(&mut writer)?;
        writer.flush()?;

        tracing::info!(path = %path.display(), "Metrics saved");
        Ok(())
    }
}

impl EventObserver for MetricsRecorder {
    fn on_state_transition(&self, event: &StateTransitionEvent) {
        self.with_state(|s| {
            let at = s
                .transitions
                .partition_point(|seen| seen.timestamp <= event.timestamp);
            s.transitions.insert(at, event.clone());
        });
    }

    fn on_attempt(&self, record: &AttemptRecord, endpoint: &str) {
        self.with_state(|s| {
            let metrics = s.endpoints.entry(endpoint.to_string()).or_default();
            metrics.attempts += 1;
            if record.attempt > 1 {
                metrics.retries += 1;
            }
            if record.outcome.is_success() {
                metrics
                    .response_times_ms
                    .push(record.elapsed.as_millis() as u64);
            }
        });
    }

    fn on_call_complete(&self, summary: &CallSummary) {
        self.with_state(|s| {
            let metrics = s.endpoints.entry(summary.endpoint.clone()).or_default();
            match summary.error_kind {
                None => metrics.success += 1,
                Some(ErrorKind::Cancelled) => metrics.cancelled += 1,
                Some(kind) => {
                    metrics.failure += 1;
                    if kind == ErrorKind::CircuitOpen {
                        metrics.rejected += 1;
                    }
                    if let Some(error) = &summary.error {
                        metrics.errors.push(error.clone());
                    }
                }
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit_breaker::CircuitState;
    use crate::core::Outcome;
    use std::time::Duration;
    use uuid::Uuid;

    fn summary(endpoint: &str, error_kind: Option<ErrorKind>, attempts: u32) -> CallSummary {
        CallSummary {
            call_id: Uuid::new_v4(),
            endpoint: endpoint.to_string(),
            error_kind,
            error: error_kind.map(|k| format!("failed: {k}")),
            attempts,
            permitted: error_kind != Some(ErrorKind::CircuitOpen),
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn test_recorder_aggregates_per_endpoint() {
        let recorder = MetricsRecorder::new();

        recorder.on_attempt(
            &AttemptRecord::new(
                1,
                Outcome::TransientFailure,
                Duration::from_millis(7),
                Duration::ZERO,
            ),
            "/slow",
        );
        recorder.on_attempt(
            &AttemptRecord::new(
                2,
                Outcome::Success,
                Duration::from_millis(12),
                Duration::from_secs(1),
            ),
            "/slow",
        );
        recorder.on_call_complete(&summary("/slow", None, 2));
        recorder.on_call_complete(&summary("/unreliable", Some(ErrorKind::CircuitOpen), 0));
        recorder.on_call_complete(&summary("/unreliable", Some(ErrorKind::Cancelled), 0));

        let slow = recorder.endpoint("/slow").unwrap();
        assert_eq!(slow.success, 1);
        assert_eq!(slow.attempts, 2);
        assert_eq!(slow.retries, 1);
        assert_eq!(slow.response_times_ms, vec![12]);
        assert_eq!(slow.mean_response_time_ms(), Some(12.0));

        let unreliable = recorder.endpoint("/unreliable").unwrap();
        assert_eq!(unreliable.failure, 1);
        assert_eq!(unreliable.rejected, 1);
        assert_eq!(unreliable.cancelled, 1);
        assert_eq!(unreliable.errors.len(), 1);
        assert_eq!(unreliable.success_rate(), 0.0);
    }

    #[test]
    fn test_recorder_keeps_transition_history() {
        let recorder = MetricsRecorder::new();
        recorder.on_state_transition(&StateTransitionEvent::new(
            "/unreliable",
            CircuitState::Closed,
            CircuitState::Open,
            3,
        ));
        recorder.on_state_transition(&StateTransitionEvent::new(
            "/unreliable",
            CircuitState::Open,
            CircuitState::HalfOpen,
            0,
        ));

        let history = recorder.transitions();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1].to, CircuitState::HalfOpen);

        recorder.clear();
        assert!(recorder.transitions().is_empty());
    }

    #[test]
    fn test_late_transition_is_placed_by_timestamp() {
        let recorder = MetricsRecorder::new();
        let opened =
            StateTransitionEvent::new("/unreliable", CircuitState::Closed, CircuitState::Open, 3);
        let mut half_open = StateTransitionEvent::new(
            "/unreliable",
            CircuitState::Open,
            CircuitState::HalfOpen,
            0,
        );
        half_open.timestamp = opened.timestamp + chrono::Duration::seconds(30);
        let mut reopened = half_open.clone();
        reopened.from = CircuitState::HalfOpen;
        reopened.to = CircuitState::Open;
        reopened.timestamp = half_open.timestamp + chrono::Duration::milliseconds(5);

        // Delivered after the event that followed it.
        recorder.on_state_transition(&opened);
        recorder.on_state_transition(&reopened);
        recorder.on_state_transition(&half_open);

        let order: Vec<_> = recorder.transitions().iter().map(|e| e.to).collect();
        assert_eq!(
            order,
            vec![CircuitState::Open, CircuitState::HalfOpen, CircuitState::Open]
        );
    }

    #[test]
    fn test_write_json_round_trips_report() {
        let recorder = MetricsRecorder::new();
        recorder.on_call_complete(&summary("/slow", None, 1));

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.json");
        recorder.write_json(&path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let report: MetricsReport = serde_json::from_str(&text).unwrap();
        assert_eq!(report.endpoints["/slow"].success, 1);
        assert!(report.state_transitions.is_empty());
    }
}
