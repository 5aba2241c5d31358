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

//! # Aether Analytics
//!
//! The stateful monitors of the analytics core: safety classification with
//! rate-limited alerting, long-horizon stability diagnostics, the pure
//! transport predictor, the optimization advisor, and the background
//! service loop that schedules them.

pub mod advisor;
pub mod predictor;
pub mod safety;
pub mod service;
pub mod stability;

pub use advisor::{
    AdvisorInputs, AdvisorStats, OptimizationAdvisor, Priority, Suggestion, SuggestionKind,
};
pub use predictor::{current_readiness, predict, PredictionMetrics};
pub use safety::{SafetyMonitor, TimeToLimit};
pub use service::{AnalyticsConfig, AnalyticsOutputs, AnalyticsService, AnalyticsUpdate};
pub use stability::{MemoryProbe, StabilityFlags, StabilityMonitor, SysinfoProbe};
