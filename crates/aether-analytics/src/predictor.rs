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

//! Transport readiness prediction.
//!
//! A pure function of the simulation snapshot: identical inputs produce
//! bit-identical output. The evaluation order of the heuristics below is
//! part of the contract (risk factors are reported in this order).

use aether_core::config::PredictorConfig;
use aether_core::state::{EnergyTrend, SimulationState};
use serde::Serialize;

/// Readiness score at or above which the transport window is open.
const READY_SCORE: f64 = 80.0;
/// Lead-in before the readiness point, in seconds.
const WINDOW_LEAD_SEC: f64 = 30.0;
/// Trailing buffer after the readiness point, in seconds.
const WINDOW_TRAIL_SEC: f64 = 120.0;
/// Base confidence before penalties.
const BASE_CONFIDENCE: f64 = 95.0;
/// Confidence floor after penalties.
const MIN_CONFIDENCE: f64 = 50.0;

/// Derived transport-readiness metrics.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionMetrics {
    /// Estimated seconds until the readiness score reaches 80.
    pub eta_to_ready_sec: f64,
    /// Estimated seconds until `e_t` reaches the target.
    pub eta_to_target_sec: f64,
    /// Estimated probability of a successful transport, 0-100.
    pub success_probability_pct: f64,
    /// Start of the optimal transport window, seconds from now.
    pub optimal_window_start_sec: f64,
    /// End of the optimal transport window, seconds from now.
    pub optimal_window_end_sec: f64,
    /// Risk factors in evaluation order.
    pub risk_factors: Vec<String>,
    /// Confidence in these estimates, 50-95.
    pub confidence_pct: f64,
    /// Projected transport efficiency, 0-100.
    pub projected_efficiency_pct: f64,
}

/// The combined enhancement multiplier applied to the raw growth rate.
pub fn total_multiplier(state: &SimulationState) -> f64 {
    1.0 + state.neural_boost
        + state.spectrum_boost
        + state.fractal_bonus
        + 0.1 * state.energy_momentum
}

/// The 0-100 readiness score: 100 once the characteristic factor reaches
/// the adaptive threshold, otherwise a log-scaled approach curve that
/// never goes negative.
pub fn current_readiness(tptt_value: f64, adaptive_threshold: f64) -> f64 {
    if tptt_value >= adaptive_threshold {
        return 100.0;
    }
    let approach = (tptt_value.max(1.0).log10() - adaptive_threshold.log10()) * 20.0 + 50.0;
    approach.max(0.0)
}

/// Computes the full metric set from one snapshot.
pub fn predict(state: &SimulationState, config: &PredictorConfig) -> PredictionMetrics {
    let multiplier = total_multiplier(state);

    // Growth per second: per-sample rate, scaled by the enhancement
    // multiplier and normalized by the producer's update interval. The
    // 0.001 constant matches the safety monitor's time-to-limit scaling.
    let growth_per_sec = 0.001
        * state.energy_growth_rate
        * multiplier
        * (1_000.0 / config.update_interval_ms as f64);

    let eta_to_target_sec = if state.target_e_t > state.e_t {
        ((state.target_e_t - state.e_t) / growth_per_sec).max(0.0)
    } else {
        0.0
    };

    let readiness = current_readiness(state.tptt_value, state.adaptive_threshold);

    let eta_to_ready_sec = if readiness >= READY_SCORE {
        0.0
    } else {
        ((READY_SCORE - readiness) / (growth_per_sec * 10.0)).max(0.0)
    };

    let energy_score = (state.e_t / state.target_e_t).min(1.0) * 30.0;
    let tptt_score = (readiness / 100.0).min(1.0) * 25.0;
    let phase_score = (state.phase_coherence / 100.0) * 20.0;
    let neural_score = (state.neural_sync / 100.0) * 15.0;
    let optimization_score = (multiplier - 1.0) * 10.0;
    let success_probability_pct = (energy_score
        + tptt_score
        + phase_score
        + neural_score
        + optimization_score)
        .min(100.0)
        .max(0.0);

    let optimal_window_start_sec = (eta_to_ready_sec - WINDOW_LEAD_SEC).max(0.0);
    let optimal_window_end_sec = eta_to_ready_sec + WINDOW_TRAIL_SEC;

    let mut risk_factors = Vec::new();
    if state.energy_trend == EnergyTrend::Decreasing {
        risk_factors.push("Energy trend is decreasing".to_string());
    }
    if state.phase_coherence < 70.0 {
        risk_factors.push("Phase coherence below 70%".to_string());
    }
    if state.neural_sync < 70.0 {
        risk_factors.push("Neural sync below 70%".to_string());
    }
    if state.energy_growth_rate < 2.0 {
        risk_factors.push("Energy growth rate is low".to_string());
    }
    if state.fractal_bonus <= 0.0 {
        risk_factors.push("Fractal bonus inactive".to_string());
    }
    if state.e_t > 0.9 * state.target_e_t {
        risk_factors.push("Energy near target saturation".to_string());
    }
    if multiplier < 2.0 {
        risk_factors.push("Total multiplier below 2x".to_string());
    }

    let mut confidence_pct = BASE_CONFIDENCE;
    if state.recent_e_t.len() < 5 {
        confidence_pct -= 20.0;
    }
    if state.energy_trend == EnergyTrend::Stable && growth_per_sec < 1e-4 {
        confidence_pct -= 15.0;
    }
    if risk_factors.len() > 3 {
        confidence_pct -= 10.0;
    }
    confidence_pct = confidence_pct.max(MIN_CONFIDENCE);

    let projected_efficiency_pct = (success_probability_pct / 100.0
        + if state.fractal_bonus > 0.0 { 0.1 } else { 0.0 }
        + (multiplier - 1.0) * 0.05)
        .min(1.0)
        .max(0.0)
        * 100.0;

    PredictionMetrics {
        eta_to_ready_sec,
        eta_to_target_sec,
        success_probability_pct,
        optimal_window_start_sec,
        optimal_window_end_sec,
        risk_factors,
        confidence_pct,
        projected_efficiency_pct,
    }
}
