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

//! Long-horizon stability diagnostics: leak, stuck-value and performance
//! degradation detection.
//!
//! The leak and stuck-value checks run on a 60 s cadence so that normal
//! GC/jitter noise does not trip them; the degradation check runs on every
//! sample with a 20 fps hysteresis gap between trip and recovery. The
//! three checks are decoupled and may fire in the same tick.

use aether_core::clock::Clock;
use aether_core::config::StabilityConfig;
use aether_core::error::ConfigError;
use aether_core::sink::CorrectiveSink;
use std::sync::{Arc, Mutex};
use sysinfo::{Pid, ProcessesToUpdate, System};

/// Source of the process memory footprint.
pub trait MemoryProbe: Send + 'static {
    /// Current memory usage in bytes.
    fn current_memory_bytes(&self) -> u64;
}

/// A memory probe backed by the `sysinfo` crate.
///
/// Reads the current process's resident memory; falls back to system-wide
/// used memory when the pid cannot be resolved.
pub struct SysinfoProbe {
    system: Mutex<System>,
    pid: Option<Pid>,
}

impl SysinfoProbe {
    /// Creates a probe for the current process.
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new_all()),
            pid: sysinfo::get_current_pid().ok(),
        }
    }
}

impl Default for SysinfoProbe {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryProbe for SysinfoProbe {
    fn current_memory_bytes(&self) -> u64 {
        let mut system = match self.system.lock() {
            Ok(guard) => guard,
            Err(_) => return 0,
        };
        match self.pid {
            Some(pid) => {
                system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);
                system.process(pid).map(|p| p.memory()).unwrap_or(0)
            }
            None => {
                system.refresh_memory();
                system.used_memory()
            }
        }
    }
}

/// Snapshot of the stability monitor's detection state.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct StabilityFlags {
    /// Memory grew faster than the leak threshold over a check window.
    pub memory_leak_detected: bool,
    /// The characteristic value has not changed for longer than the window.
    pub value_stuck: bool,
    /// Frame rate is below the degradation threshold (with hysteresis).
    pub performance_degraded: bool,
}

/// Watches memory, the characteristic value and frame rate; triggers
/// corrective callbacks when a check fires.
pub struct StabilityMonitor {
    config: StabilityConfig,
    clock: Arc<dyn Clock>,
    probe: Box<dyn MemoryProbe>,
    corrective: Arc<dyn CorrectiveSink>,

    last_memory_sample_bytes: u64,
    last_characteristic_value: f64,
    last_characteristic_change_ms: u64,
    last_check_ms: u64,
    flags: StabilityFlags,
}

impl StabilityMonitor {
    /// Creates a monitor and takes an initial memory baseline.
    pub fn new(
        config: StabilityConfig,
        clock: Arc<dyn Clock>,
        probe: Box<dyn MemoryProbe>,
        corrective: Arc<dyn CorrectiveSink>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let now = clock.now_ms();
        let baseline = probe.current_memory_bytes();
        Ok(Self {
            config,
            clock,
            probe,
            corrective,
            last_memory_sample_bytes: baseline,
            last_characteristic_value: f64::NAN,
            last_characteristic_change_ms: now,
            last_check_ms: now,
            flags: StabilityFlags::default(),
        })
    }

    /// Current detection flags.
    pub fn flags(&self) -> StabilityFlags {
        self.flags
    }

    /// Feeds one sample of the characteristic value and the instantaneous
    /// frame rate.
    ///
    /// Change tracking and the degradation check run here, on every sample;
    /// only the windowed checks wait for [`tick`](Self::tick). Non-finite
    /// inputs skip the affected check for this sample.
    pub fn sample(&mut self, characteristic_value: f64, frame_rate: f64) {
        if characteristic_value.is_finite() {
            // Bit equality on purpose: any observed change, however small,
            // resets the stuck timer.
            if characteristic_value != self.last_characteristic_value {
                self.last_characteristic_value = characteristic_value;
                self.last_characteristic_change_ms = self.clock.now_ms();
                if self.flags.value_stuck {
                    log::info!("Stability: characteristic value moving again");
                    self.flags.value_stuck = false;
                }
            }
        }

        if frame_rate.is_finite() {
            self.check_degradation(frame_rate);
            self.check_pressure(frame_rate);
        }
    }

    /// Runs the windowed checks if the check interval has elapsed.
    /// Returns `true` when the checks ran.
    pub fn tick(&mut self) -> bool {
        let now = self.clock.now_ms();
        if now.saturating_sub(self.last_check_ms) < self.config.check_interval_ms {
            return false;
        }
        self.last_check_ms = now;
        self.check_leak();
        self.check_stuck();
        true
    }

    /// Compares the current memory footprint against the last window's
    /// sample. The baseline is always advanced, leak or not.
    pub fn check_leak(&mut self) {
        let current = self.probe.current_memory_bytes();
        let delta_mb = (current as f64 - self.last_memory_sample_bytes as f64) / 1e6;
        if delta_mb > self.config.leak_threshold_mb {
            log::warn!(
                "Stability: memory grew {delta_mb:.1} MB over the last window, \
                 triggering cleanup"
            );
            self.flags.memory_leak_detected = true;
            self.corrective.on_memory_cleanup();
        }
        self.last_memory_sample_bytes = current;
    }

    /// Flags the characteristic value as stuck when it has not changed for
    /// longer than the configured window. Fires the regenerate callback
    /// once per stuck episode.
    pub fn check_stuck(&mut self) {
        if self.flags.value_stuck {
            return;
        }
        let now = self.clock.now_ms();
        let unchanged_ms = now.saturating_sub(self.last_characteristic_change_ms);
        if unchanged_ms > self.config.stuck_window_ms {
            log::warn!(
                "Stability: characteristic value unchanged for {}s, regenerating cycle",
                unchanged_ms / 1_000
            );
            self.flags.value_stuck = true;
            self.corrective.on_regenerate_cycle();
        }
    }

    fn check_degradation(&mut self, frame_rate: f64) {
        if frame_rate < self.config.degraded_fps && !self.flags.performance_degraded {
            log::warn!(
                "Stability: frame rate {frame_rate:.0} below {:.0}, reducing quality",
                self.config.degraded_fps
            );
            self.flags.performance_degraded = true;
            self.corrective.on_reduce_quality();
        } else if self.flags.performance_degraded && frame_rate >= self.config.recovered_fps {
            log::info!("Stability: frame rate recovered to {frame_rate:.0}");
            self.flags.performance_degraded = false;
        }
    }

    fn check_pressure(&mut self, frame_rate: f64) {
        let memory_mb = self.probe.current_memory_bytes() as f64 / 1e6;
        if memory_mb > self.config.pressure_mb && frame_rate < self.config.pressure_fps {
            log::debug!(
                "Stability: memory pressure {memory_mb:.0} MB at {frame_rate:.0} fps, \
                 triggering cleanup"
            );
            self.corrective.on_memory_cleanup();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_core::clock::ManualClock;
    use aether_core::event::SafetyEventKind;
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    /// Probe returning a scripted value.
    struct FakeProbe {
        bytes: Arc<AtomicU64>,
    }

    impl MemoryProbe for FakeProbe {
        fn current_memory_bytes(&self) -> u64 {
            self.bytes.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct CountingSink {
        cleanups: AtomicUsize,
        regenerations: AtomicUsize,
        reductions: AtomicUsize,
    }

    impl CorrectiveSink for CountingSink {
        fn on_memory_cleanup(&self) {
            self.cleanups.fetch_add(1, Ordering::SeqCst);
        }
        fn on_regenerate_cycle(&self) {
            self.regenerations.fetch_add(1, Ordering::SeqCst);
        }
        fn on_reduce_quality(&self) {
            self.reductions.fetch_add(1, Ordering::SeqCst);
        }
        fn on_safety_override(&self, _kind: SafetyEventKind) {}
    }

    fn fixture(
        initial_bytes: u64,
    ) -> (
        StabilityMonitor,
        Arc<ManualClock>,
        Arc<AtomicU64>,
        Arc<CountingSink>,
    ) {
        let clock = Arc::new(ManualClock::new());
        let bytes = Arc::new(AtomicU64::new(initial_bytes));
        let sink = Arc::new(CountingSink::default());
        let monitor = StabilityMonitor::new(
            StabilityConfig::default(),
            clock.clone(),
            Box::new(FakeProbe {
                bytes: bytes.clone(),
            }),
            sink.clone(),
        )
        .unwrap();
        (monitor, clock, bytes, sink)
    }

    #[test]
    fn test_leak_detection_and_baseline_advance() {
        let (mut m, _clock, bytes, sink) = fixture(10_000_000);

        // +25 MB over one window: leak.
        bytes.store(35_000_000, Ordering::SeqCst);
        m.check_leak();
        assert!(m.flags().memory_leak_detected);
        assert_eq!(sink.cleanups.load(Ordering::SeqCst), 1);

        // Baseline advanced: the same footprint next window is no growth.
        m.check_leak();
        assert_eq!(sink.cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_small_growth_is_not_a_leak() {
        let (mut m, _clock, bytes, sink) = fixture(10_000_000);
        bytes.store(25_000_000, Ordering::SeqCst); // +15 MB < 20 MB
        m.check_leak();
        assert!(!m.flags().memory_leak_detected);
        assert_eq!(sink.cleanups.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_stuck_value_fires_exactly_once() {
        let (mut m, clock, _bytes, sink) = fixture(0);

        m.sample(3.7, 60.0);
        clock.advance(61_000);
        m.check_stuck();
        assert!(m.flags().value_stuck);
        assert_eq!(sink.regenerations.load(Ordering::SeqCst), 1);

        // Still stuck on the next window: no second trigger.
        clock.advance(60_000);
        m.check_stuck();
        assert_eq!(sink.regenerations.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_value_change_resets_stuck_timer() {
        let (mut m, clock, _bytes, sink) = fixture(0);

        m.sample(3.7, 60.0);
        clock.advance(59_000);
        m.sample(3.8, 60.0); // change just before the window elapses
        clock.advance(2_000);
        m.check_stuck();
        assert!(!m.flags().value_stuck);
        assert_eq!(sink.regenerations.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_change_clears_stuck_flag() {
        let (mut m, clock, _bytes, _sink) = fixture(0);

        m.sample(3.7, 60.0);
        clock.advance(61_000);
        m.check_stuck();
        assert!(m.flags().value_stuck);

        m.sample(4.0, 60.0);
        assert!(!m.flags().value_stuck);
    }

    #[test]
    fn test_degradation_hysteresis() {
        let (mut m, _clock, _bytes, sink) = fixture(0);

        // Trips at the first 25 fps sample.
        m.sample(1.0, 25.0);
        assert!(m.flags().performance_degraded);
        assert_eq!(sink.reductions.load(Ordering::SeqCst), 1);

        // Stays degraded below the recovery threshold.
        m.sample(1.0, 25.0);
        assert!(m.flags().performance_degraded);
        assert_eq!(sink.reductions.load(Ordering::SeqCst), 1);
        m.sample(1.0, 45.0);
        assert!(m.flags().performance_degraded);

        // Clears only at >= 50 fps.
        m.sample(1.0, 55.0);
        assert!(!m.flags().performance_degraded);
    }

    #[test]
    fn test_pressure_cleanup_is_independent_of_degradation() {
        let (mut m, _clock, bytes, sink) = fixture(90_000_000);

        // 90 MB at 55 fps: pressure cleanup without a degradation trip.
        bytes.store(90_000_000, Ordering::SeqCst);
        m.sample(1.0, 55.0);
        assert!(!m.flags().performance_degraded);
        assert_eq!(sink.cleanups.load(Ordering::SeqCst), 1);

        // Same footprint at 60 fps: no cleanup.
        m.sample(1.0, 60.0);
        assert_eq!(sink.cleanups.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_tick_honors_check_interval() {
        let (mut m, clock, _bytes, _sink) = fixture(0);

        clock.advance(59_999);
        assert!(!m.tick());
        clock.advance(1);
        assert!(m.tick());
        // Interval restarts after a run.
        assert!(!m.tick());
    }

    #[test]
    fn test_non_finite_inputs_are_skipped() {
        let (mut m, clock, _bytes, sink) = fixture(0);

        m.sample(3.7, 60.0);
        clock.advance(61_000);
        // A NaN characteristic sample must not count as a change.
        m.sample(f64::NAN, f64::NAN);
        m.check_stuck();
        assert!(m.flags().value_stuck);
        assert_eq!(sink.reductions.load(Ordering::SeqCst), 0);
    }
}
