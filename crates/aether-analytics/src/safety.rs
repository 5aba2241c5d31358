// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Safety classification of the energy level with rate-limited alerting.
//!
//! Thresholds are fractions of the hard cap: warning at 80%, emergency at
//! 95% by default. Crossings emit at most one event per rate-limit window
//! and invoke the safety-override callback; every emitted event lands in a
//! bounded log and is offered to the persistence sink best-effort.

use aether_core::clock::Clock;
use aether_core::config::SafetyConfig;
use aether_core::error::ConfigError;
use aether_core::event::{EventLog, SafetyEvent, SafetyEventKind, SafetyStatus};
use aether_core::sink::{CorrectiveSink, Record, TieredSink};
use std::fmt;
use std::sync::Arc;

/// Result of [`SafetyMonitor::time_to_limit`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TimeToLimit {
    /// Growth is zero or negative; the cap is never approached.
    Infinite,
    /// Estimated time until the cap is reached, in seconds.
    Seconds(f64),
}

impl fmt::Display for TimeToLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeToLimit::Infinite => write!(f, "infinite"),
            TimeToLimit::Seconds(s) => write!(f, "{s:.1}s"),
        }
    }
}

/// Classifies the energy level and emits rate-limited safety events.
pub struct SafetyMonitor {
    config: SafetyConfig,
    clock: Arc<dyn Clock>,
    corrective: Arc<dyn CorrectiveSink>,
    persistence: Arc<TieredSink>,
    log: EventLog,
    last_event_ms: Option<u64>,
}

impl SafetyMonitor {
    /// Creates a monitor, rejecting invalid threshold ordering up front.
    pub fn new(
        config: SafetyConfig,
        clock: Arc<dyn Clock>,
        corrective: Arc<dyn CorrectiveSink>,
        persistence: Arc<TieredSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let log = EventLog::new(config.event_log_cap);
        Ok(Self {
            config,
            clock,
            corrective,
            persistence,
            log,
            last_event_ms: None,
        })
    }

    /// The warning threshold for the given cap.
    pub fn warning_threshold(&self, max_e_t: f64) -> f64 {
        self.config.warning_fraction * max_e_t
    }

    /// The emergency threshold for the given cap.
    pub fn emergency_threshold(&self, max_e_t: f64) -> f64 {
        self.config.emergency_fraction * max_e_t
    }

    /// Classifies `e_t` against the thresholds derived from `max_e_t`.
    pub fn classify(&self, e_t: f64, max_e_t: f64) -> SafetyStatus {
        if e_t >= self.emergency_threshold(max_e_t) {
            SafetyStatus::Emergency
        } else if e_t >= self.warning_threshold(max_e_t) {
            SafetyStatus::Warning
        } else {
            SafetyStatus::Safe
        }
    }

    /// Classifies `e_t` against the configured cap.
    pub fn evaluate(&self, e_t: f64) -> SafetyStatus {
        self.classify(e_t, self.config.max_e_t)
    }

    /// Samples the current energy level, possibly emitting one event.
    ///
    /// No-op inside the rate-limit window. Otherwise the checks run in
    /// priority order (emergency, warning, cap) and at most one event is
    /// emitted; the override callback fires with the same kind. A
    /// non-finite sample is skipped entirely.
    pub fn sample(&mut self, e_t: f64) -> Option<SafetyEventKind> {
        if !e_t.is_finite() {
            log::warn!("Safety: skipping non-finite e_t sample");
            return None;
        }

        let now = self.clock.now_ms();
        if let Some(last) = self.last_event_ms {
            if now.saturating_sub(last) < self.config.min_event_interval_ms {
                return None;
            }
        }

        let max_e_t = self.config.max_e_t;
        let emergency = self.emergency_threshold(max_e_t);
        let warning = self.warning_threshold(max_e_t);

        let (kind, message) = if e_t >= emergency {
            (
                SafetyEventKind::Emergency,
                format!("e_t {e_t:.3} at or above emergency threshold {emergency:.3}"),
            )
        } else if e_t >= warning {
            (
                SafetyEventKind::Warning,
                format!("e_t {e_t:.3} at or above warning threshold {warning:.3}"),
            )
        } else if e_t >= max_e_t {
            (
                SafetyEventKind::Cap,
                format!("e_t {e_t:.3} at or above cap {max_e_t:.3}"),
            )
        } else {
            return None;
        };

        log::warn!("Safety: {message}");
        let event = SafetyEvent::new(kind, message, e_t, now);
        self.persistence.record(Record::SafetyEvent(event.clone()));
        self.log.record(event);
        self.last_event_ms = Some(now);
        self.corrective.on_safety_override(kind);
        Some(kind)
    }

    /// Estimates the time until `e_t` reaches `max_e_t` at the given raw
    /// growth rate per sample.
    ///
    /// The 0.001 scaling constant matches the predictor's growth-rate
    /// scaling; the two must stay consistent.
    pub fn time_to_limit(
        &self,
        e_t: f64,
        growth_rate_per_sample: f64,
        max_e_t: f64,
    ) -> TimeToLimit {
        if growth_rate_per_sample <= 0.0 {
            return TimeToLimit::Infinite;
        }
        let seconds = (max_e_t - e_t) / (0.001 * growth_rate_per_sample);
        TimeToLimit::Seconds(seconds.max(0.0))
    }

    /// The bounded event log, newest first.
    pub fn events(&self) -> &EventLog {
        &self.log
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_core::clock::ManualClock;
    use aether_core::sink::NullCorrectiveSink;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingSink {
        overrides: AtomicUsize,
    }

    impl CountingSink {
        fn new() -> Self {
            Self {
                overrides: AtomicUsize::new(0),
            }
        }
    }

    impl CorrectiveSink for CountingSink {
        fn on_memory_cleanup(&self) {}
        fn on_regenerate_cycle(&self) {}
        fn on_reduce_quality(&self) {}
        fn on_safety_override(&self, _kind: SafetyEventKind) {
            self.overrides.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn monitor(clock: Arc<ManualClock>) -> SafetyMonitor {
        SafetyMonitor::new(
            SafetyConfig::default(),
            clock,
            Arc::new(NullCorrectiveSink),
            Arc::new(TieredSink::new(None)),
        )
        .unwrap()
    }

    #[test]
    fn test_classification_bands() {
        let m = monitor(Arc::new(ManualClock::new()));
        // Default cap 2.5: warning at 2.0, emergency at 2.375.
        assert_eq!(m.evaluate(1.9), SafetyStatus::Safe);
        assert_eq!(m.evaluate(2.0), SafetyStatus::Warning);
        assert_eq!(m.evaluate(2.374), SafetyStatus::Warning);
        assert_eq!(m.evaluate(2.375), SafetyStatus::Emergency);
        assert_eq!(m.evaluate(3.0), SafetyStatus::Emergency);
    }

    #[test]
    fn test_warning_scenario_appends_one_event() {
        let clock = Arc::new(ManualClock::new());
        let mut m = monitor(clock);
        // e_t = 2.0 with max 2.5 sits exactly on the warning threshold.
        assert_eq!(m.evaluate(2.0), SafetyStatus::Warning);
        assert_eq!(m.sample(2.0), Some(SafetyEventKind::Warning));
        assert_eq!(m.events().len(), 1);
        assert_eq!(m.events().latest().unwrap().kind, SafetyEventKind::Warning);
    }

    #[test]
    fn test_rate_limit_suppresses_second_event() {
        let clock = Arc::new(ManualClock::new());
        let mut m = monitor(clock.clone());

        assert!(m.sample(2.4).is_some());
        clock.advance(4_999);
        assert!(m.sample(2.4).is_none());
        assert_eq!(m.events().len(), 1);

        clock.advance(1);
        assert!(m.sample(2.4).is_some());
        assert_eq!(m.events().len(), 2);
    }

    #[test]
    fn test_log_holds_most_recent_ten() {
        let clock = Arc::new(ManualClock::new());
        let mut m = monitor(clock.clone());
        for _ in 0..15 {
            clock.advance(5_000);
            assert!(m.sample(2.4).is_some());
        }
        assert_eq!(m.events().len(), 10);
        // Newest first; the first five events were evicted.
        let stamps: Vec<u64> = m.events().iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(stamps[0], 15 * 5_000);
        assert_eq!(*stamps.last().unwrap(), 6 * 5_000);
    }

    #[test]
    fn test_emergency_takes_priority_and_fires_override() {
        let clock = Arc::new(ManualClock::new());
        let sink = Arc::new(CountingSink::new());
        let mut m = SafetyMonitor::new(
            SafetyConfig::default(),
            clock,
            sink.clone(),
            Arc::new(TieredSink::new(None)),
        )
        .unwrap();

        // Above the cap, but emergency is checked first.
        assert_eq!(m.sample(2.6), Some(SafetyEventKind::Emergency));
        assert_eq!(sink.overrides.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_safe_sample_emits_nothing() {
        let mut m = monitor(Arc::new(ManualClock::new()));
        assert!(m.sample(1.0).is_none());
        assert!(m.events().is_empty());
    }

    #[test]
    fn test_non_finite_sample_is_skipped() {
        let mut m = monitor(Arc::new(ManualClock::new()));
        assert!(m.sample(f64::NAN).is_none());
        assert!(m.events().is_empty());
    }

    #[test]
    fn test_time_to_limit() {
        let m = monitor(Arc::new(ManualClock::new()));
        assert_eq!(m.time_to_limit(1.0, 0.0, 2.5), TimeToLimit::Infinite);
        assert_eq!(m.time_to_limit(1.0, -3.0, 2.5), TimeToLimit::Infinite);

        // (2.5 - 1.5) / (0.001 * 10) = 100.
        match m.time_to_limit(1.5, 10.0, 2.5) {
            TimeToLimit::Seconds(s) => assert!((s - 100.0).abs() < 1e-9),
            other => panic!("expected finite time, got {other:?}"),
        }

        // Already past the cap clamps to zero.
        assert_eq!(m.time_to_limit(3.0, 10.0, 2.5), TimeToLimit::Seconds(0.0));
    }

    #[test]
    fn test_events_are_journaled() {
        let clock = Arc::new(ManualClock::new());
        let persistence = Arc::new(TieredSink::new(None));
        let mut m = SafetyMonitor::new(
            SafetyConfig::default(),
            clock,
            Arc::new(NullCorrectiveSink),
            persistence.clone(),
        )
        .unwrap();

        m.sample(2.4);
        assert_eq!(persistence.journal_len(), 1);
    }
}
