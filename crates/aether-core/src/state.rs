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

//! The upstream simulation snapshot consumed by every monitor.
//!
//! The producer refreshes this once per tick; the analytics core treats it
//! as read-only and computes over a clone, never holding a lock across a
//! computation.

use serde::{Deserialize, Serialize};

/// Maximum number of recent `e_t` samples carried in a snapshot.
pub const RECENT_HISTORY_CAP: usize = 64;

/// Direction of the energy level over the recent window, as classified by
/// the upstream simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnergyTrend {
    /// Energy is rising.
    Increasing,
    /// Energy is falling.
    Decreasing,
    /// Energy is flat within the producer's tolerance.
    Stable,
}

/// One tick's worth of simulation state.
///
/// All numeric fields are raw producer outputs. `phase_coherence` and
/// `neural_sync` are percentages in `0..=100`; `adaptive_threshold` is
/// expected to be strictly positive.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationState {
    /// Current energy level.
    pub e_t: f64,
    /// Energy level the transport sequence is driving towards.
    pub target_e_t: f64,
    /// Raw energy growth rate per sample.
    pub energy_growth_rate: f64,
    /// Momentum term applied on top of the boosts.
    pub energy_momentum: f64,
    /// Neural enhancement multiplier contribution.
    pub neural_boost: f64,
    /// Spectrum enhancement multiplier contribution.
    pub spectrum_boost: f64,
    /// Fractal bonus multiplier contribution (zero when inactive).
    pub fractal_bonus: f64,
    /// Phase coherence percentage (0-100).
    pub phase_coherence: f64,
    /// Neural synchronization percentage (0-100).
    pub neural_sync: f64,
    /// The characteristic transport factor produced by the simulation.
    pub tptt_value: f64,
    /// Threshold the characteristic factor must reach for full readiness.
    pub adaptive_threshold: f64,
    /// Producer-classified trend of the energy level.
    pub energy_trend: EnergyTrend,
    /// Bounded recent history of `e_t` samples, oldest first.
    pub recent_e_t: Vec<f64>,
}

impl SimulationState {
    /// Returns `true` when every numeric field (including the history) is
    /// finite. Non-finite snapshots are skipped by consumers rather than
    /// propagated into classifications or events.
    pub fn is_finite(&self) -> bool {
        let fields = [
            self.e_t,
            self.target_e_t,
            self.energy_growth_rate,
            self.energy_momentum,
            self.neural_boost,
            self.spectrum_boost,
            self.fractal_bonus,
            self.phase_coherence,
            self.neural_sync,
            self.tptt_value,
            self.adaptive_threshold,
        ];
        fields.iter().all(|v| v.is_finite()) && self.recent_e_t.iter().all(|v| v.is_finite())
    }

    /// Appends an `e_t` sample to the recent history, evicting the oldest
    /// once the cap is reached.
    pub fn push_recent(&mut self, sample: f64) {
        self.recent_e_t.push(sample);
        if self.recent_e_t.len() > RECENT_HISTORY_CAP {
            self.recent_e_t.remove(0);
        }
    }
}

impl Default for SimulationState {
    fn default() -> Self {
        Self {
            e_t: 0.0,
            target_e_t: 1.0,
            energy_growth_rate: 0.0,
            energy_momentum: 0.0,
            neural_boost: 0.0,
            spectrum_boost: 0.0,
            fractal_bonus: 0.0,
            phase_coherence: 0.0,
            neural_sync: 0.0,
            tptt_value: 0.0,
            adaptive_threshold: 1.0,
            energy_trend: EnergyTrend::Stable,
            recent_e_t: Vec::new(),
        }
    }
}
