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

//! The derived-state snapshot shared between peers over the sync channel.

use serde::{Deserialize, Serialize};

/// A snapshot of derived state broadcast to peers in the same session.
///
/// Ephemeral by design: each send is a fire instance and the core never
/// persists received snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncSnapshot {
    /// The session this snapshot belongs to.
    pub session_id: String,
    /// Arbitrary derived-state fields chosen by the sender.
    pub payload: serde_json::Map<String, serde_json::Value>,
    /// Millisecond timestamp stamped at send time.
    pub timestamp_ms: u64,
}

impl SyncSnapshot {
    /// Creates a snapshot stamped with the given session and time.
    pub fn new(
        session_id: impl Into<String>,
        payload: serde_json::Map<String, serde_json::Value>,
        timestamp_ms: u64,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            payload,
            timestamp_ms,
        }
    }
}
