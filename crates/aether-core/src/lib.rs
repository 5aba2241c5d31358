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

//! # Aether Core
//!
//! Foundational crate containing traits, core types, and interface contracts
//! shared by the analytics monitors and the realtime sync channel.

#![warn(missing_docs)]

pub mod clock;
pub mod config;
pub mod error;
pub mod event;
pub mod sink;
pub mod snapshot;
pub mod state;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::ConfigError;
pub use event::{EventLog, SafetyEvent, SafetyEventKind, SafetyStatus};
pub use sink::{CorrectiveSink, PersistenceSink, Record, TieredSink};
pub use snapshot::SyncSnapshot;
pub use state::{EnergyTrend, SimulationState};
