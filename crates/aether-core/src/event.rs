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

//! Safety classification and event types.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use uuid::Uuid;

/// Classification of the current energy level against the safety thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyStatus {
    /// Below the warning threshold.
    Safe,
    /// At or above the warning threshold but below emergency.
    Warning,
    /// At or above the emergency threshold.
    Emergency,
}

/// The kind of a recorded safety event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SafetyEventKind {
    /// Energy crossed the warning threshold.
    Warning,
    /// Energy crossed the configured hard cap.
    Cap,
    /// Energy crossed the emergency threshold.
    Emergency,
}

impl fmt::Display for SafetyEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyEventKind::Warning => write!(f, "warning"),
            SafetyEventKind::Cap => write!(f, "cap"),
            SafetyEventKind::Emergency => write!(f, "emergency"),
        }
    }
}

/// An immutable record of a threshold crossing.
///
/// Created once by the safety monitor when the rate-limit window has
/// elapsed; never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SafetyEvent {
    /// Unique identifier for this event instance.
    pub id: Uuid,
    /// Millisecond timestamp at which the crossing was observed.
    pub timestamp_ms: u64,
    /// The kind of crossing.
    pub kind: SafetyEventKind,
    /// Human-readable description.
    pub message: String,
    /// The energy value that triggered the event.
    pub e_t_value: f64,
}

impl SafetyEvent {
    /// Creates a new event with a fresh id.
    pub fn new(
        kind: SafetyEventKind,
        message: impl Into<String>,
        e_t_value: f64,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp_ms,
            kind,
            message: message.into(),
            e_t_value,
        }
    }
}

/// An insertion-ordered, size-bounded log of safety events.
///
/// New events are prepended; once the cap is reached the oldest entry is
/// evicted. The log never exceeds its cap.
#[derive(Debug, Clone)]
pub struct EventLog {
    entries: VecDeque<SafetyEvent>,
    cap: usize,
}

impl EventLog {
    /// Creates an empty log holding at most `cap` events.
    pub fn new(cap: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(cap),
            cap,
        }
    }

    /// Prepends an event, evicting the oldest if the log is full.
    pub fn record(&mut self, event: SafetyEvent) {
        if self.entries.len() == self.cap {
            self.entries.pop_back();
        }
        self.entries.push_front(event);
    }

    /// The most recent event, if any.
    pub fn latest(&self) -> Option<&SafetyEvent> {
        self.entries.front()
    }

    /// Iterates events newest first.
    pub fn iter(&self) -> impl Iterator<Item = &SafetyEvent> {
        self.entries.iter()
    }

    /// Number of events currently held.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` when no events have been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(kind: SafetyEventKind, ts: u64) -> SafetyEvent {
        SafetyEvent::new(kind, "test", 1.0, ts)
    }

    #[test]
    fn log_prepends_newest_first() {
        let mut log = EventLog::new(10);
        log.record(event(SafetyEventKind::Warning, 1));
        log.record(event(SafetyEventKind::Emergency, 2));

        assert_eq!(log.len(), 2);
        assert_eq!(log.latest().unwrap().timestamp_ms, 2);
        let stamps: Vec<u64> = log.iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(stamps, vec![2, 1]);
    }

    #[test]
    fn log_evicts_oldest_beyond_cap() {
        let mut log = EventLog::new(10);
        for ts in 0..15 {
            log.record(event(SafetyEventKind::Warning, ts));
        }
        assert_eq!(log.len(), 10);
        // Holds exactly the most recent 10, newest first.
        let stamps: Vec<u64> = log.iter().map(|e| e.timestamp_ms).collect();
        assert_eq!(stamps, (5..15).rev().collect::<Vec<u64>>());
    }

    #[test]
    fn event_ids_are_unique() {
        let a = event(SafetyEventKind::Cap, 0);
        let b = event(SafetyEventKind::Cap, 0);
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn kind_display_is_lowercase() {
        assert_eq!(SafetyEventKind::Emergency.to_string(), "emergency");
        assert_eq!(SafetyEventKind::Cap.to_string(), "cap");
    }
}
