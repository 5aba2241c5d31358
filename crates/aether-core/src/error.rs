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

//! Configuration error types. Validation runs at construction time, before
//! the first tick, so a misconfigured monitor never starts.

use std::fmt;

/// An error produced by configuration validation.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Threshold fractions are not strictly ordered
    /// (`0 < warning < emergency < 1` is required).
    ThresholdOrdering {
        /// The configured warning fraction.
        warning: f64,
        /// The configured emergency fraction.
        emergency: f64,
    },
    /// A value that must be strictly positive was zero or negative.
    NonPositive {
        /// Name of the offending field.
        name: &'static str,
        /// The rejected value.
        value: f64,
    },
    /// An interval or capacity that must be nonzero was zero.
    Zero {
        /// Name of the offending field.
        name: &'static str,
    },
    /// The degradation recovery threshold does not sit above the trip
    /// threshold, which would remove the hysteresis gap.
    HysteresisGap {
        /// Frame rate below which degradation trips.
        trip: f64,
        /// Frame rate at or above which degradation clears.
        recover: f64,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::ThresholdOrdering { warning, emergency } => {
                write!(
                    f,
                    "safety thresholds must satisfy 0 < warning < emergency < 1, \
                     got warning={warning}, emergency={emergency}"
                )
            }
            ConfigError::NonPositive { name, value } => {
                write!(f, "'{name}' must be strictly positive, got {value}")
            }
            ConfigError::Zero { name } => {
                write!(f, "'{name}' must be nonzero")
            }
            ConfigError::HysteresisGap { trip, recover } => {
                write!(
                    f,
                    "degradation recovery threshold ({recover}) must be above \
                     the trip threshold ({trip})"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}
