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

//! Side-effect boundaries of the analytics core.
//!
//! `CorrectiveSink` receives the corrective-action callbacks fired by the
//! monitors. `PersistenceSink` accepts append-only records and may fail;
//! `TieredSink` wraps one so that a failed write degrades to a bounded
//! in-memory journal instead of blocking or crashing a monitor.

use crate::event::{SafetyEvent, SafetyEventKind};
use crate::snapshot::SyncSnapshot;
use serde::Serialize;
use std::collections::VecDeque;
use std::fmt::Debug;
use std::sync::Mutex;

/// Default capacity of the local fallback journal.
pub const FALLBACK_JOURNAL_CAP: usize = 256;

/// Receiver of corrective-action callbacks.
///
/// Every hook may be invoked repeatedly with the same condition and from a
/// background thread; implementations must be idempotent-safe.
pub trait CorrectiveSink: Send + Sync + 'static {
    /// The stability monitor detected memory growth or pressure.
    fn on_memory_cleanup(&self);
    /// The stability monitor detected a stuck characteristic value.
    fn on_regenerate_cycle(&self);
    /// The stability monitor detected degraded frame rates.
    fn on_reduce_quality(&self);
    /// The safety monitor requests an override of the given kind.
    fn on_safety_override(&self, kind: SafetyEventKind);
}

/// A corrective sink that ignores every callback.
#[derive(Debug, Default)]
pub struct NullCorrectiveSink;

impl CorrectiveSink for NullCorrectiveSink {
    fn on_memory_cleanup(&self) {}
    fn on_regenerate_cycle(&self) {}
    fn on_reduce_quality(&self) {}
    fn on_safety_override(&self, _kind: SafetyEventKind) {}
}

/// An append-only record offered to the persistence collaborator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Record {
    /// A safety event emitted by the safety monitor.
    SafetyEvent(SafetyEvent),
    /// An implementable suggestion was accepted.
    SuggestionApplied {
        /// The fixed rule id of the applied suggestion.
        id: String,
        /// Millisecond timestamp of acceptance.
        timestamp_ms: u64,
    },
    /// A snapshot that was broadcast over the sync channel.
    SyncSnapshot(SyncSnapshot),
}

/// The persistence collaborator boundary.
///
/// Implementations may fail; callers treat writes as best-effort and never
/// block on them.
pub trait PersistenceSink: Send + Sync + Debug + 'static {
    /// Appends a record. Failure is reported, never panicked.
    fn append(&self, record: Record) -> anyhow::Result<()>;
}

/// A persistence sink that drops every record.
#[derive(Debug, Default)]
pub struct NullPersistence;

impl PersistenceSink for NullPersistence {
    fn append(&self, _record: Record) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Two-tier persistence: a primary collaborator plus a bounded local
/// fallback journal.
///
/// A record that fails to reach the primary is retained in the journal
/// (oldest evicted at capacity) and the failure is logged; the caller's
/// in-memory state stays authoritative either way.
#[derive(Debug)]
pub struct TieredSink {
    primary: Option<Box<dyn PersistenceSink>>,
    journal: Mutex<VecDeque<Record>>,
    journal_cap: usize,
}

impl TieredSink {
    /// Creates a sink over an optional primary collaborator with the
    /// default journal capacity.
    pub fn new(primary: Option<Box<dyn PersistenceSink>>) -> Self {
        Self::with_journal_cap(primary, FALLBACK_JOURNAL_CAP)
    }

    /// Creates a sink with an explicit journal capacity.
    pub fn with_journal_cap(primary: Option<Box<dyn PersistenceSink>>, cap: usize) -> Self {
        Self {
            primary,
            journal: Mutex::new(VecDeque::new()),
            journal_cap: cap.max(1),
        }
    }

    /// Offers a record to the primary, journaling it locally on failure.
    /// Never fails from the caller's point of view.
    pub fn record(&self, record: Record) {
        match &self.primary {
            Some(sink) => {
                if let Err(e) = sink.append(record.clone()) {
                    log::warn!("Persistence write failed, journaling locally: {e}");
                    self.journal_locally(record);
                }
            }
            None => self.journal_locally(record),
        }
    }

    fn journal_locally(&self, record: Record) {
        let mut journal = self.journal.lock().unwrap();
        if journal.len() == self.journal_cap {
            journal.pop_front();
        }
        journal.push_back(record);
    }

    /// Number of records currently held in the fallback journal.
    pub fn journal_len(&self) -> usize {
        self.journal.lock().unwrap().len()
    }

    /// Drains the fallback journal, oldest first, for replay by the host.
    pub fn drain_journal(&self) -> Vec<Record> {
        self.journal.lock().unwrap().drain(..).collect()
    }
}
