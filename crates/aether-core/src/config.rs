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

//! Configuration for the monitors and the sync channel.
//!
//! Every config carries the defaults the system was tuned with and a
//! `validate()` that fails fast on ordering violations, so a misconfigured
//! component is rejected before its first tick. The stability thresholds
//! are deliberately tunables rather than hard invariants.

use crate::error::ConfigError;

/// Safety monitor configuration.
#[derive(Debug, Clone)]
pub struct SafetyConfig {
    /// Hard cap on the energy level.
    pub max_e_t: f64,
    /// Fraction of `max_e_t` at which the warning threshold sits.
    pub warning_fraction: f64,
    /// Fraction of `max_e_t` at which the emergency threshold sits.
    pub emergency_fraction: f64,
    /// Minimum time between emitted events; crossings inside the window
    /// are dropped to prevent alert storms on a fast-ticking producer.
    pub min_event_interval_ms: u64,
    /// Capacity of the bounded safety event log.
    pub event_log_cap: usize,
}

impl Default for SafetyConfig {
    fn default() -> Self {
        Self {
            max_e_t: 2.5,
            warning_fraction: 0.8,
            emergency_fraction: 0.95,
            min_event_interval_ms: 5_000,
            event_log_cap: 10,
        }
    }
}

impl SafetyConfig {
    /// Validates threshold ordering: `0 < warning < emergency < 1` and a
    /// positive cap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.max_e_t.is_finite() && self.max_e_t > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "max_e_t",
                value: self.max_e_t,
            });
        }
        if !(self.warning_fraction > 0.0
            && self.warning_fraction < self.emergency_fraction
            && self.emergency_fraction < 1.0)
        {
            return Err(ConfigError::ThresholdOrdering {
                warning: self.warning_fraction,
                emergency: self.emergency_fraction,
            });
        }
        if self.event_log_cap == 0 {
            return Err(ConfigError::Zero {
                name: "event_log_cap",
            });
        }
        Ok(())
    }
}

/// Stability monitor configuration.
///
/// The leak delta, pressure threshold and the 30/50 fps hysteresis pair are
/// magic constants inherited from the original tuning; they are exposed
/// here as tunables.
#[derive(Debug, Clone)]
pub struct StabilityConfig {
    /// Cadence of the leak and stuck-value checks. 60 s tolerates normal
    /// GC/jitter noise without false positives.
    pub check_interval_ms: u64,
    /// Memory growth per check window that counts as a leak, in MB.
    pub leak_threshold_mb: f64,
    /// How long the characteristic value may stay unchanged before it is
    /// considered stuck.
    pub stuck_window_ms: u64,
    /// Frame rate below which degradation trips.
    pub degraded_fps: f64,
    /// Frame rate at or above which degradation clears. Must sit above
    /// `degraded_fps`; the gap prevents oscillation.
    pub recovered_fps: f64,
    /// Memory footprint above which pressure cleanup may fire, in MB.
    pub pressure_mb: f64,
    /// Frame rate below which pressure cleanup may fire.
    pub pressure_fps: f64,
}

impl Default for StabilityConfig {
    fn default() -> Self {
        Self {
            check_interval_ms: 60_000,
            leak_threshold_mb: 20.0,
            stuck_window_ms: 60_000,
            degraded_fps: 30.0,
            recovered_fps: 50.0,
            pressure_mb: 85.0,
            pressure_fps: 60.0,
        }
    }
}

impl StabilityConfig {
    /// Validates intervals and the hysteresis gap.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_interval_ms == 0 {
            return Err(ConfigError::Zero {
                name: "check_interval_ms",
            });
        }
        if self.stuck_window_ms == 0 {
            return Err(ConfigError::Zero {
                name: "stuck_window_ms",
            });
        }
        if !(self.leak_threshold_mb > 0.0) {
            return Err(ConfigError::NonPositive {
                name: "leak_threshold_mb",
                value: self.leak_threshold_mb,
            });
        }
        if !(self.recovered_fps > self.degraded_fps) {
            return Err(ConfigError::HysteresisGap {
                trip: self.degraded_fps,
                recover: self.recovered_fps,
            });
        }
        Ok(())
    }
}

/// Transport predictor configuration.
#[derive(Debug, Clone)]
pub struct PredictorConfig {
    /// The producer's update interval; scales growth-per-sample into
    /// growth-per-second.
    pub update_interval_ms: u64,
}

impl Default for PredictorConfig {
    fn default() -> Self {
        Self {
            update_interval_ms: 1_000,
        }
    }
}

impl PredictorConfig {
    /// Validates the update interval is nonzero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.update_interval_ms == 0 {
            return Err(ConfigError::Zero {
                name: "update_interval_ms",
            });
        }
        Ok(())
    }
}

/// Analytics service scheduling configuration.
///
/// The cadence constants are load-bearing design values, not incidental
/// ones: safety sampling at 1 s, predictor/advisor recompute at 5 s,
/// stability checks at 60 s.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Frequency of the service loop in Hz.
    pub tick_rate: u32,
    /// Cadence of safety sampling.
    pub safety_interval_ms: u64,
    /// Cadence of predictor and advisor recomputation.
    pub recompute_interval_ms: u64,
    /// Maximum number of pending state updates buffered; beyond this,
    /// producers block on send.
    pub channel_capacity: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            tick_rate: 20,
            safety_interval_ms: 1_000,
            recompute_interval_ms: 5_000,
            channel_capacity: 256,
        }
    }
}

impl ServiceConfig {
    /// Validates tick rate and intervals are nonzero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_rate == 0 {
            return Err(ConfigError::Zero { name: "tick_rate" });
        }
        if self.safety_interval_ms == 0 {
            return Err(ConfigError::Zero {
                name: "safety_interval_ms",
            });
        }
        if self.recompute_interval_ms == 0 {
            return Err(ConfigError::Zero {
                name: "recompute_interval_ms",
            });
        }
        if self.channel_capacity == 0 {
            return Err(ConfigError::Zero {
                name: "channel_capacity",
            });
        }
        Ok(())
    }
}

/// Sync channel configuration.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Minimum interval between broadcasts. The default of 100 ms bounds
    /// updates to at most 10/s regardless of the producer tick rate.
    pub min_broadcast_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            min_broadcast_interval_ms: 100,
        }
    }
}

impl SyncConfig {
    /// Validates the throttle interval is nonzero.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.min_broadcast_interval_ms == 0 {
            return Err(ConfigError::Zero {
                name: "min_broadcast_interval_ms",
            });
        }
        Ok(())
    }
}
