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

//! The publish/subscribe transport boundary of the sync channel.
//!
//! Messages travel as raw JSON values so a channel can reject malformed
//! payloads at the edge, exactly as it would over a real wire.

use aether_core::snapshot::SyncSnapshot;
use anyhow::Context;
use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Mutex;
use uuid::Uuid;

/// An event delivered to a session subscriber.
#[derive(Debug, Clone)]
pub enum TransportEvent {
    /// A broadcast payload from some other peer, not yet deserialized.
    Message(serde_json::Value),
    /// The session's membership changed; carries the new peer count.
    MembershipChanged(usize),
}

/// A publish/subscribe channel keyed by session id, with presence
/// membership notifications.
pub trait SyncTransport: Send + Sync + Debug + 'static {
    /// Joins a session, returning the receiver for inbound events.
    fn subscribe(
        &self,
        session_id: &str,
        peer_id: Uuid,
    ) -> anyhow::Result<flume::Receiver<TransportEvent>>;

    /// Broadcasts a snapshot to every other peer in the session.
    fn publish(&self, session_id: &str, from: Uuid, snapshot: SyncSnapshot) -> anyhow::Result<()>;

    /// Updates this peer's presence metadata within the session.
    fn track_presence(
        &self,
        session_id: &str,
        peer_id: Uuid,
        metadata: serde_json::Value,
    ) -> anyhow::Result<()>;

    /// Leaves a session, dropping the peer's subscription and presence.
    fn unsubscribe(&self, session_id: &str, peer_id: Uuid);
}

#[derive(Debug, Default)]
struct SessionHub {
    subscribers: HashMap<Uuid, flume::Sender<TransportEvent>>,
    presence: HashMap<Uuid, serde_json::Value>,
}

impl SessionHub {
    fn notify_membership(&self) {
        let count = self.subscribers.len();
        for sender in self.subscribers.values() {
            if sender.send(TransportEvent::MembershipChanged(count)).is_err() {
                log::error!("Failed to notify membership change. Receiver likely disconnected.");
            }
        }
    }
}

/// An in-process transport hub, used in tests and single-host deployments.
///
/// Each session keeps a subscriber map over unbounded flume channels; a
/// dropped receiver is logged and skipped rather than treated as fatal.
#[derive(Debug, Default)]
pub struct LocalTransport {
    sessions: Mutex<HashMap<String, SessionHub>>,
}

impl LocalTransport {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of peers currently subscribed to a session.
    pub fn peer_count(&self, session_id: &str) -> usize {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .map(|hub| hub.subscribers.len())
            .unwrap_or(0)
    }

    /// The presence metadata tracked for a peer, if any.
    pub fn presence_of(&self, session_id: &str, peer_id: Uuid) -> Option<serde_json::Value> {
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .and_then(|hub| hub.presence.get(&peer_id).cloned())
    }

    /// Forwards an already-encoded payload to every other peer in the
    /// session. Receivers are responsible for rejecting values that do
    /// not decode into a snapshot.
    pub fn publish_raw(
        &self,
        session_id: &str,
        from: Uuid,
        value: serde_json::Value,
    ) -> anyhow::Result<()> {
        let sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow::anyhow!("transport hub poisoned"))?;
        let hub = sessions
            .get(session_id)
            .with_context(|| format!("unknown session '{session_id}'"))?;
        for (peer, sender) in &hub.subscribers {
            if *peer == from {
                continue;
            }
            if sender.send(TransportEvent::Message(value.clone())).is_err() {
                log::error!("Failed to deliver to peer {peer}. Receiver likely disconnected.");
            }
        }
        Ok(())
    }
}

impl SyncTransport for LocalTransport {
    fn subscribe(
        &self,
        session_id: &str,
        peer_id: Uuid,
    ) -> anyhow::Result<flume::Receiver<TransportEvent>> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow::anyhow!("transport hub poisoned"))?;
        let hub = sessions.entry(session_id.to_string()).or_default();
        let (tx, rx) = flume::unbounded();
        hub.subscribers.insert(peer_id, tx);
        hub.notify_membership();
        log::info!("Peer {peer_id} joined session '{session_id}'");
        Ok(rx)
    }

    fn publish(&self, session_id: &str, from: Uuid, snapshot: SyncSnapshot) -> anyhow::Result<()> {
        let value = serde_json::to_value(&snapshot)?;
        self.publish_raw(session_id, from, value)
    }

    fn track_presence(
        &self,
        session_id: &str,
        peer_id: Uuid,
        metadata: serde_json::Value,
    ) -> anyhow::Result<()> {
        let mut sessions = self
            .sessions
            .lock()
            .map_err(|_| anyhow::anyhow!("transport hub poisoned"))?;
        let hub = sessions
            .get_mut(session_id)
            .with_context(|| format!("unknown session '{session_id}'"))?;
        hub.presence.insert(peer_id, metadata);
        hub.notify_membership();
        Ok(())
    }

    fn unsubscribe(&self, session_id: &str, peer_id: Uuid) {
        let Ok(mut sessions) = self.sessions.lock() else {
            return;
        };
        if let Some(hub) = sessions.get_mut(session_id) {
            hub.subscribers.remove(&peer_id);
            hub.presence.remove(&peer_id);
            hub.notify_membership();
            log::info!("Peer {peer_id} left session '{session_id}'");
            if hub.subscribers.is_empty() {
                sessions.remove(session_id);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(session: &str) -> SyncSnapshot {
        SyncSnapshot::new(session, serde_json::Map::new(), 1)
    }

    #[test]
    fn publish_skips_the_sender() {
        let hub = LocalTransport::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let alice_rx = hub.subscribe("s", alice).unwrap();
        let bob_rx = hub.subscribe("s", bob).unwrap();

        // Drain the join notifications.
        while alice_rx.try_recv().is_ok() {}
        while bob_rx.try_recv().is_ok() {}

        hub.publish("s", alice, snapshot("s")).unwrap();

        assert!(matches!(
            bob_rx.try_recv(),
            Ok(TransportEvent::Message(_))
        ));
        assert!(alice_rx.try_recv().is_err());
    }

    #[test]
    fn membership_notifications_carry_counts() {
        let hub = LocalTransport::new();
        let alice = Uuid::new_v4();
        let alice_rx = hub.subscribe("s", alice).unwrap();
        assert!(matches!(
            alice_rx.try_recv(),
            Ok(TransportEvent::MembershipChanged(1))
        ));

        let bob = Uuid::new_v4();
        let _bob_rx = hub.subscribe("s", bob).unwrap();
        assert!(matches!(
            alice_rx.try_recv(),
            Ok(TransportEvent::MembershipChanged(2))
        ));

        hub.unsubscribe("s", bob);
        assert!(matches!(
            alice_rx.try_recv(),
            Ok(TransportEvent::MembershipChanged(1))
        ));
    }

    #[test]
    fn unsubscribe_drops_empty_sessions() {
        let hub = LocalTransport::new();
        let peer = Uuid::new_v4();
        let _rx = hub.subscribe("s", peer).unwrap();
        assert_eq!(hub.peer_count("s"), 1);
        hub.unsubscribe("s", peer);
        assert_eq!(hub.peer_count("s"), 0);
    }

    #[test]
    fn publish_to_unknown_session_fails() {
        let hub = LocalTransport::new();
        assert!(hub
            .publish("nope", Uuid::new_v4(), snapshot("nope"))
            .is_err());
    }

    #[test]
    fn presence_is_tracked_per_peer() {
        let hub = LocalTransport::new();
        let peer = Uuid::new_v4();
        let _rx = hub.subscribe("s", peer).unwrap();
        hub.track_presence("s", peer, serde_json::json!({"name": "operator"}))
            .unwrap();
        assert_eq!(
            hub.presence_of("s", peer),
            Some(serde_json::json!({"name": "operator"}))
        );
    }
}
