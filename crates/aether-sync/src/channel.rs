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

//! The throttled per-session sync channel.
//!
//! Broadcasts are gated by a minimum interval: a call inside the window is
//! silently dropped, never queued or retried, which bounds the update rate
//! regardless of how fast the producer ticks. Received snapshots surface
//! through a caller-supplied callback and are never applied automatically.

use crate::transport::{SyncTransport, TransportEvent};
use aether_core::clock::Clock;
use aether_core::config::SyncConfig;
use aether_core::error::ConfigError;
use aether_core::snapshot::SyncSnapshot;
use std::sync::Arc;
use uuid::Uuid;

/// Observable connection state of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not subscribed; broadcasts and presence updates are dropped.
    Disconnected,
    /// Subscribed to the session.
    Connected,
}

type MessageCallback = Box<dyn FnMut(SyncSnapshot) + Send>;

/// One logical channel onto a session, owned by a single client.
pub struct SyncChannel {
    session_id: String,
    peer_id: Uuid,
    config: SyncConfig,
    clock: Arc<dyn Clock>,
    transport: Arc<dyn SyncTransport>,
    state: ConnectionState,
    inbound: Option<flume::Receiver<TransportEvent>>,
    last_sent_ms: Option<u64>,
    peer_count: usize,
    on_message: Option<MessageCallback>,
}

impl SyncChannel {
    /// Creates a disconnected channel for the given session.
    pub fn new(
        session_id: impl Into<String>,
        transport: Arc<dyn SyncTransport>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            session_id: session_id.into(),
            peer_id: Uuid::new_v4(),
            config,
            clock,
            transport,
            state: ConnectionState::Disconnected,
            inbound: None,
            last_sent_ms: None,
            peer_count: 0,
            on_message: None,
        })
    }

    /// This peer's identity within the session.
    pub fn peer_id(&self) -> Uuid {
        self.peer_id
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns `true` when connected.
    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// Latest membership count reported by the transport.
    pub fn peer_count(&self) -> usize {
        self.peer_count
    }

    /// Installs the callback invoked for each received snapshot.
    pub fn on_message(&mut self, callback: impl FnMut(SyncSnapshot) + Send + 'static) {
        self.on_message = Some(Box::new(callback));
    }

    /// Subscribes to the session. No-op when already connected.
    pub fn connect(&mut self) -> anyhow::Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        let rx = self.transport.subscribe(&self.session_id, self.peer_id)?;
        self.inbound = Some(rx);
        self.state = ConnectionState::Connected;
        log::info!(
            "Sync channel connected to session '{}' as {}",
            self.session_id,
            self.peer_id
        );
        Ok(())
    }

    /// Unsubscribes and tears down the connection synchronously.
    pub fn shutdown(&mut self) {
        if self.is_connected() {
            self.transport.unsubscribe(&self.session_id, self.peer_id);
            log::info!("Sync channel left session '{}'", self.session_id);
        }
        self.inbound = None;
        self.state = ConnectionState::Disconnected;
        self.peer_count = 0;
    }

    /// Broadcasts a derived-state snapshot to the session's other peers.
    ///
    /// Disconnected: logged and dropped. Inside the throttle window:
    /// silently dropped. Otherwise the payload is stamped with the session
    /// id and current time; a transport failure is logged and the channel
    /// state is unaffected. The last-sent timestamp advances on every send
    /// that passes the throttle gate.
    pub fn broadcast(&mut self, payload: serde_json::Map<String, serde_json::Value>) {
        if !self.is_connected() {
            log::debug!("Sync: not connected, dropping broadcast");
            return;
        }
        let now = self.clock.now_ms();
        if let Some(last) = self.last_sent_ms {
            if now.saturating_sub(last) < self.config.min_broadcast_interval_ms {
                return;
            }
        }
        self.last_sent_ms = Some(now);

        let snapshot = SyncSnapshot::new(self.session_id.clone(), payload, now);
        if let Err(e) = self
            .transport
            .publish(&self.session_id, self.peer_id, snapshot)
        {
            log::warn!("Sync: broadcast failed: {e}");
        }
    }

    /// Updates this peer's presence metadata. No-op when disconnected.
    pub fn track_presence(&self, metadata: serde_json::Value) {
        if !self.is_connected() {
            log::debug!("Sync: not connected, dropping presence update");
            return;
        }
        if let Err(e) = self
            .transport
            .track_presence(&self.session_id, self.peer_id, metadata)
        {
            log::warn!("Sync: presence update failed: {e}");
        }
    }

    /// Drains pending inbound events, invoking the message callback for
    /// each well-formed snapshot and refreshing the peer count on
    /// membership changes. Malformed payloads are dropped silently.
    /// Returns the number of snapshots delivered.
    pub fn pump(&mut self) -> usize {
        let Some(rx) = &self.inbound else {
            return 0;
        };
        let mut delivered = 0;
        let events: Vec<TransportEvent> = rx.try_iter().collect();
        for event in events {
            match event {
                TransportEvent::Message(value) => {
                    match serde_json::from_value::<SyncSnapshot>(value) {
                        Ok(snapshot) => {
                            if let Some(callback) = &mut self.on_message {
                                callback(snapshot);
                            }
                            delivered += 1;
                        }
                        Err(e) => {
                            log::trace!("Sync: dropping malformed payload: {e}");
                        }
                    }
                }
                TransportEvent::MembershipChanged(count) => {
                    self.peer_count = count;
                }
            }
        }
        delivered
    }
}

impl Drop for SyncChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}
