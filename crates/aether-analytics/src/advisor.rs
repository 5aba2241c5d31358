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

//! The optimization advisor: a stateless rule set over the current state.
//!
//! Each rule appends at most one suggestion with a fixed id, so the same
//! situation always regenerates the same identity and dismissal survives
//! recomputation. The dismissed-set is the advisor's only persistent
//! mutable state: it grows through explicit dismissal (or acceptance of an
//! implementable suggestion) and shrinks only through an explicit clear.

use aether_core::clock::Clock;
use aether_core::sink::{Record, TieredSink};
use aether_core::state::SimulationState;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// Suggestion priority, highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Priority {
    /// Act now.
    High,
    /// Worth doing soon.
    Medium,
    /// Nice to have.
    Low,
}

impl Priority {
    fn rank(self) -> u8 {
        match self {
            Priority::High => 0,
            Priority::Medium => 1,
            Priority::Low => 2,
        }
    }
}

/// Broad category of a suggestion, used by the dashboard for grouping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SuggestionKind {
    /// Energy level or growth related.
    Energy,
    /// Simulation mode toggles.
    Mode,
    /// Boost and multiplier tuning.
    Boost,
    /// Requires manual recalibration.
    Calibration,
    /// Transport timing.
    Timing,
}

/// One actionable optimization suggestion.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    /// Fixed per-rule slug; stable across recomputation.
    pub id: &'static str,
    /// Category for grouping.
    pub kind: SuggestionKind,
    /// Priority bucket.
    pub priority: Priority,
    /// Short headline.
    pub title: &'static str,
    /// What was observed.
    pub description: String,
    /// What improves when acted on.
    pub impact: &'static str,
    /// Host-side action identifier.
    pub action: &'static str,
    /// Rough estimated improvement when applied, in percent.
    pub estimated_improvement_pct: f64,
    /// Whether the host can apply this automatically.
    pub implementable: bool,
}

/// Inputs for one advisor recomputation.
///
/// The mode toggles live outside `SimulationState` (the producer owns
/// numbers only) and are supplied by the host alongside the snapshot.
#[derive(Debug, Clone, Copy)]
pub struct AdvisorInputs<'a> {
    /// The current simulation snapshot.
    pub state: &'a SimulationState,
    /// The predictor's 0-100 readiness score for this snapshot.
    pub readiness: f64,
    /// Whether realtime mode is enabled in the host.
    pub realtime_enabled: bool,
    /// Whether fractal mode is enabled in the host.
    pub fractal_enabled: bool,
}

/// Aggregate counts over the current suggestion list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AdvisorStats {
    /// Number of suggestions currently surfaced.
    pub total: usize,
    /// How many of them the host can apply automatically.
    pub implementable: usize,
    /// Largest estimated improvement among them, in percent.
    pub max_estimated_improvement_pct: f64,
}

/// Rule engine producing a deduplicated, dismissible, prioritized list of
/// suggestions.
pub struct OptimizationAdvisor {
    dismissed: HashSet<String>,
    suggestions: Vec<Suggestion>,
    persistence: Arc<TieredSink>,
    clock: Arc<dyn Clock>,
}

impl OptimizationAdvisor {
    /// Creates an advisor with an empty dismissed-set.
    pub fn new(persistence: Arc<TieredSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            dismissed: HashSet::new(),
            suggestions: Vec::new(),
            persistence,
            clock,
        }
    }

    /// Regenerates the suggestion list from the current inputs, filters
    /// out dismissed ids, and orders by priority (rule order within a
    /// priority bucket).
    pub fn recompute(&mut self, inputs: &AdvisorInputs<'_>) -> &[Suggestion] {
        let mut list = generate(inputs);
        list.retain(|s| !self.dismissed.contains(s.id));
        list.sort_by_key(|s| s.priority.rank());
        self.suggestions = list;
        &self.suggestions
    }

    /// The current suggestion list.
    pub fn suggestions(&self) -> &[Suggestion] {
        &self.suggestions
    }

    /// The high-priority subset of the current list.
    pub fn high_priority(&self) -> impl Iterator<Item = &Suggestion> {
        self.suggestions
            .iter()
            .filter(|s| s.priority == Priority::High)
    }

    /// Aggregate counts over the current list.
    pub fn stats(&self) -> AdvisorStats {
        AdvisorStats {
            total: self.suggestions.len(),
            implementable: self.suggestions.iter().filter(|s| s.implementable).count(),
            max_estimated_improvement_pct: self
                .suggestions
                .iter()
                .map(|s| s.estimated_improvement_pct)
                .fold(0.0, f64::max),
        }
    }

    /// Dismisses a suggestion id, suppressing it from every future
    /// regeneration until the set is cleared.
    pub fn dismiss(&mut self, id: &str) {
        self.dismissed.insert(id.to_string());
        self.suggestions.retain(|s| s.id != id);
    }

    /// Accepts an implementable suggestion: returns its action identifier
    /// and dismisses it as a side effect. Returns `None` for unknown ids
    /// and for non-implementable suggestions, which cannot be accepted.
    pub fn apply(&mut self, id: &str) -> Option<&'static str> {
        let suggestion = self.suggestions.iter().find(|s| s.id == id)?;
        if !suggestion.implementable {
            log::debug!("Advisor: '{id}' requires manual action, not applying");
            return None;
        }
        let action = suggestion.action;
        self.persistence.record(Record::SuggestionApplied {
            id: id.to_string(),
            timestamp_ms: self.clock.now_ms(),
        });
        self.dismiss(id);
        Some(action)
    }

    /// Clears the dismissed-set; previously suppressed suggestions may
    /// resurface on the next recomputation.
    pub fn clear_dismissed(&mut self) {
        self.dismissed.clear();
    }

    /// Number of ids currently dismissed.
    pub fn dismissed_count(&self) -> usize {
        self.dismissed.len()
    }
}

/// Evaluates every rule against the inputs, in fixed order.
fn generate(inputs: &AdvisorInputs<'_>) -> Vec<Suggestion> {
    let state = inputs.state;
    let mut out = Vec::new();

    if state.e_t < 0.5 * state.target_e_t {
        out.push(Suggestion {
            id: "increase-growth-rate",
            kind: SuggestionKind::Energy,
            priority: Priority::High,
            title: "Increase energy growth rate",
            description: format!(
                "Energy {:.2} is below half of the {:.2} target",
                state.e_t, state.target_e_t
            ),
            impact: "Reaches the transport target sooner",
            action: "raise_growth_rate",
            estimated_improvement_pct: 25.0,
            implementable: state.energy_growth_rate < 8.0,
        });
    }

    if !inputs.realtime_enabled && inputs.readiness < 60.0 {
        out.push(Suggestion {
            id: "enable-realtime",
            kind: SuggestionKind::Mode,
            priority: Priority::High,
            title: "Enable realtime mode",
            description: format!(
                "Readiness is only {:.0} with realtime mode off",
                inputs.readiness
            ),
            impact: "Faster convergence towards readiness",
            action: "enable_realtime_mode",
            estimated_improvement_pct: 20.0,
            implementable: true,
        });
    }

    if !inputs.fractal_enabled {
        out.push(Suggestion {
            id: "enable-fractal",
            kind: SuggestionKind::Mode,
            priority: Priority::Medium,
            title: "Enable fractal mode",
            description: "Fractal mode is off, leaving its bonus unused".to_string(),
            impact: "Adds the fractal bonus to the multiplier",
            action: "enable_fractal_mode",
            estimated_improvement_pct: 15.0,
            implementable: true,
        });
    }

    if state.spectrum_boost < 0.3 {
        out.push(Suggestion {
            id: "raise-spectrum-boost",
            kind: SuggestionKind::Boost,
            priority: Priority::High,
            title: "Raise spectrum boost",
            description: format!("Spectrum boost {:.2} is below 0.3", state.spectrum_boost),
            impact: "Directly raises the growth multiplier",
            action: "raise_spectrum_boost",
            estimated_improvement_pct: 18.0,
            implementable: true,
        });
    }

    if state.neural_sync < 70.0 {
        out.push(Suggestion {
            id: "recalibrate-neural-sync",
            kind: SuggestionKind::Calibration,
            priority: Priority::Medium,
            title: "Recalibrate neural sync",
            description: format!("Neural sync {:.0}% is below 70%", state.neural_sync),
            impact: "Improves success probability",
            action: "recalibrate_neural_sync",
            estimated_improvement_pct: 12.0,
            implementable: false,
        });
    }

    if state.phase_coherence < 60.0 {
        out.push(Suggestion {
            id: "stabilize-phase",
            kind: SuggestionKind::Calibration,
            priority: Priority::Medium,
            title: "Stabilize phase coherence",
            description: format!(
                "Phase coherence {:.0}% is below 60%",
                state.phase_coherence
            ),
            impact: "Reduces transport risk",
            action: "stabilize_phase",
            estimated_improvement_pct: 10.0,
            implementable: false,
        });
    }

    if inputs.readiness > 95.0 && state.e_t > 0.9 * state.target_e_t {
        out.push(Suggestion {
            id: "transport-window-open",
            kind: SuggestionKind::Timing,
            priority: Priority::Low,
            title: "Transport window open",
            description: "Readiness and energy are both near optimal".to_string(),
            impact: "Transport now for the best odds",
            action: "open_transport_dialog",
            estimated_improvement_pct: 5.0,
            implementable: true,
        });
    }

    if inputs.readiness > 80.0 && state.energy_growth_rate > 5.0 {
        out.push(Suggestion {
            id: "fine-tune-growth",
            kind: SuggestionKind::Energy,
            priority: Priority::Low,
            title: "Fine-tune growth rate",
            description: "High readiness with a fast growth rate may overshoot".to_string(),
            impact: "Smoother approach to the target",
            action: "fine_tune_growth",
            estimated_improvement_pct: 3.0,
            implementable: false,
        });
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use aether_core::clock::ManualClock;
    use aether_core::state::EnergyTrend;

    fn low_energy_state() -> SimulationState {
        SimulationState {
            e_t: 0.2,
            target_e_t: 1.0,
            energy_growth_rate: 3.0,
            spectrum_boost: 0.1,
            neural_sync: 50.0,
            phase_coherence: 50.0,
            energy_trend: EnergyTrend::Stable,
            ..SimulationState::default()
        }
    }

    fn advisor() -> OptimizationAdvisor {
        OptimizationAdvisor::new(
            Arc::new(TieredSink::new(None)),
            Arc::new(ManualClock::new()),
        )
    }

    fn low_energy_inputs(state: &SimulationState) -> AdvisorInputs<'_> {
        AdvisorInputs {
            state,
            readiness: 40.0,
            realtime_enabled: false,
            fractal_enabled: false,
        }
    }

    #[test]
    fn test_rules_fire_with_stable_ids() {
        let state = low_energy_state();
        let mut advisor = advisor();
        let ids: Vec<&str> = advisor
            .recompute(&low_energy_inputs(&state))
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(
            ids,
            vec![
                "increase-growth-rate",
                "enable-realtime",
                "raise-spectrum-boost",
                "enable-fractal",
                "recalibrate-neural-sync",
                "stabilize-phase",
            ]
        );

        // Same situation, same identities.
        let again: Vec<&str> = advisor
            .recompute(&low_energy_inputs(&state))
            .iter()
            .map(|s| s.id)
            .collect();
        assert_eq!(ids, again);
    }

    #[test]
    fn test_high_priority_sorts_first() {
        let state = low_energy_state();
        let mut advisor = advisor();
        advisor.recompute(&low_energy_inputs(&state));
        let priorities: Vec<Priority> = advisor
            .suggestions()
            .iter()
            .map(|s| s.priority)
            .collect();
        let ranks: Vec<u8> = priorities.iter().map(|p| p.rank()).collect();
        let mut sorted = ranks.clone();
        sorted.sort();
        assert_eq!(ranks, sorted);
        assert_eq!(advisor.high_priority().count(), 3);
    }

    #[test]
    fn test_dismissal_survives_recomputation() {
        let state = low_energy_state();
        let mut advisor = advisor();
        advisor.recompute(&low_energy_inputs(&state));
        advisor.dismiss("enable-fractal");
        assert!(!advisor.suggestions().iter().any(|s| s.id == "enable-fractal"));

        // The triggering condition persists, but the id stays suppressed.
        advisor.recompute(&low_energy_inputs(&state));
        assert!(!advisor.suggestions().iter().any(|s| s.id == "enable-fractal"));

        advisor.clear_dismissed();
        advisor.recompute(&low_energy_inputs(&state));
        assert!(advisor.suggestions().iter().any(|s| s.id == "enable-fractal"));
    }

    #[test]
    fn test_apply_dismisses_and_returns_action() {
        let state = low_energy_state();
        let persistence = Arc::new(TieredSink::new(None));
        let mut advisor =
            OptimizationAdvisor::new(persistence.clone(), Arc::new(ManualClock::new()));
        advisor.recompute(&low_energy_inputs(&state));

        assert_eq!(advisor.apply("enable-fractal"), Some("enable_fractal_mode"));
        assert_eq!(persistence.journal_len(), 1);

        advisor.recompute(&low_energy_inputs(&state));
        assert!(!advisor.suggestions().iter().any(|s| s.id == "enable-fractal"));
    }

    #[test]
    fn test_apply_refuses_non_implementable() {
        let state = low_energy_state();
        let mut advisor = advisor();
        advisor.recompute(&low_energy_inputs(&state));

        assert_eq!(advisor.apply("recalibrate-neural-sync"), None);
        // Still surfaced: acceptance cannot auto-dismiss it.
        assert!(advisor
            .suggestions()
            .iter()
            .any(|s| s.id == "recalibrate-neural-sync"));
    }

    #[test]
    fn test_growth_rule_implementable_gate() {
        let mut state = low_energy_state();
        let mut advisor = advisor();

        advisor.recompute(&low_energy_inputs(&state));
        let growth = advisor
            .suggestions()
            .iter()
            .find(|s| s.id == "increase-growth-rate")
            .unwrap();
        assert!(growth.implementable);

        state.energy_growth_rate = 9.0;
        advisor.recompute(&low_energy_inputs(&state));
        let growth = advisor
            .suggestions()
            .iter()
            .find(|s| s.id == "increase-growth-rate")
            .unwrap();
        assert!(!growth.implementable);
    }

    #[test]
    fn test_optimal_window_rules() {
        let state = SimulationState {
            e_t: 0.95,
            target_e_t: 1.0,
            energy_growth_rate: 6.0,
            spectrum_boost: 0.5,
            neural_sync: 90.0,
            phase_coherence: 90.0,
            ..SimulationState::default()
        };
        let inputs = AdvisorInputs {
            state: &state,
            readiness: 98.0,
            realtime_enabled: true,
            fractal_enabled: true,
        };
        let mut advisor = advisor();
        advisor.recompute(&inputs);
        let ids: Vec<&str> = advisor.suggestions().iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["transport-window-open", "fine-tune-growth"]);
    }

    #[test]
    fn test_healthy_state_yields_no_suggestions() {
        let state = SimulationState {
            e_t: 0.8,
            target_e_t: 1.0,
            energy_growth_rate: 4.0,
            spectrum_boost: 0.5,
            neural_sync: 90.0,
            phase_coherence: 90.0,
            ..SimulationState::default()
        };
        let inputs = AdvisorInputs {
            state: &state,
            readiness: 85.0,
            realtime_enabled: true,
            fractal_enabled: true,
        };
        let mut advisor = advisor();
        advisor.recompute(&inputs);
        assert!(advisor.suggestions().is_empty());
        let stats = advisor.stats();
        assert_eq!(stats.total, 0);
        assert_eq!(stats.implementable, 0);
        assert_eq!(stats.max_estimated_improvement_pct, 0.0);
    }

    #[test]
    fn test_stats_aggregate() {
        let state = low_energy_state();
        let mut advisor = advisor();
        advisor.recompute(&low_energy_inputs(&state));
        let stats = advisor.stats();
        assert_eq!(stats.total, 6);
        assert_eq!(stats.implementable, 4);
        assert_eq!(stats.max_estimated_improvement_pct, 25.0);
    }
}
