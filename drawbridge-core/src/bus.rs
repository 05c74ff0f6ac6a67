//! Broadcast fan-out to WebSocket peers.
//!
//! The bus owns the peer registry. Each attached peer gets an unbounded
//! channel of pre-serialized frames; the transport task drains it into the
//! socket. A frame is serialized once per broadcast, and peers whose channel
//! is gone are pruned silently - a slow or dead peer never blocks a caller.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ServerFrame;

/// Identity of an attached peer. Echo suppression compares these, never
/// anything carried in a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PeerId(Uuid);

impl PeerId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl std::fmt::Display for PeerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry of connected WebSocket peers with broadcast fan-out.
#[derive(Debug, Clone, Default)]
pub struct BroadcastBus {
    peers: Arc<RwLock<HashMap<PeerId, mpsc::UnboundedSender<String>>>>,
}

impl BroadcastBus {
    /// Create an empty bus.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn peers_read(
        &self,
    ) -> std::sync::RwLockReadGuard<'_, HashMap<PeerId, mpsc::UnboundedSender<String>>> {
        self.peers
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn peers_write(
        &self,
    ) -> std::sync::RwLockWriteGuard<'_, HashMap<PeerId, mpsc::UnboundedSender<String>>> {
        self.peers
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Register a peer. Returns its identity and the frame stream the
    /// transport task must drain into the socket.
    pub fn attach(&self) -> (PeerId, mpsc::UnboundedReceiver<String>) {
        let peer = PeerId::new();
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers_write().insert(peer, tx);
        tracing::info!(%peer, "peer attached");
        (peer, rx)
    }

    /// Remove a peer on close or transport error.
    pub fn detach(&self, peer: PeerId) {
        if self.peers_write().remove(&peer).is_some() {
            tracing::info!(%peer, "peer detached");
        }
    }

    /// Number of attached peers.
    #[must_use]
    pub fn count(&self) -> usize {
        self.peers_read().len()
    }

    /// Send a frame to one peer. Returns whether it was queued.
    pub fn send_to(&self, peer: PeerId, frame: &ServerFrame) -> bool {
        let Ok(text) = serde_json::to_string(frame) else {
            return false;
        };
        match self.peers_read().get(&peer) {
            Some(tx) => tx.send(text).is_ok(),
            None => false,
        }
    }

    /// Serialize a frame once and fan it out to every peer, optionally
    /// excluding one (the mutation's sender). Dead peers are pruned.
    pub fn broadcast(&self, frame: &ServerFrame, exclude: Option<PeerId>) {
        let text = match serde_json::to_string(frame) {
            Ok(text) => text,
            Err(e) => {
                tracing::error!("failed to serialize broadcast frame: {e}");
                return;
            }
        };

        let mut dead = Vec::new();
        {
            let peers = self.peers_read();
            for (peer, tx) in peers.iter() {
                if Some(*peer) == exclude {
                    continue;
                }
                if tx.send(text.clone()).is_err() {
                    dead.push(*peer);
                }
            }
        }

        if !dead.is_empty() {
            let mut peers = self.peers_write();
            for peer in dead {
                peers.remove(&peer);
                tracing::debug!(%peer, "pruned dead peer during broadcast");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> ServerFrame {
        ServerFrame::CanvasCleared { count: 0 }
    }

    #[tokio::test]
    async fn broadcast_reaches_all_peers() {
        let bus = BroadcastBus::new();
        let (_a, mut rx_a) = bus.attach();
        let (_b, mut rx_b) = bus.attach();

        bus.broadcast(&frame(), None);

        assert!(rx_a.recv().await.is_some());
        assert!(rx_b.recv().await.is_some());
    }

    #[tokio::test]
    async fn broadcast_excludes_sender() {
        let bus = BroadcastBus::new();
        let (a, mut rx_a) = bus.attach();
        let (_b, mut rx_b) = bus.attach();

        bus.broadcast(&frame(), Some(a));

        assert!(rx_b.recv().await.is_some());
        assert!(rx_a.try_recv().is_err());
    }

    #[tokio::test]
    async fn dead_peers_are_pruned() {
        let bus = BroadcastBus::new();
        let (_a, rx_a) = bus.attach();
        let (_b, _rx_b) = bus.attach();
        drop(rx_a);

        bus.broadcast(&frame(), None);
        assert_eq!(bus.count(), 1);
    }

    #[tokio::test]
    async fn detach_removes_peer() {
        let bus = BroadcastBus::new();
        let (a, _rx) = bus.attach();
        assert_eq!(bus.count(), 1);
        bus.detach(a);
        assert_eq!(bus.count(), 0);
    }

    #[tokio::test]
    async fn send_to_unknown_peer_is_false() {
        let bus = BroadcastBus::new();
        let (a, rx) = bus.attach();
        drop(rx);
        bus.detach(a);
        assert!(!bus.send_to(a, &frame()));
    }
}
