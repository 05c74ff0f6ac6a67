//! Request/response correlation between blocking HTTP calls and
//! out-of-band WebSocket peers.
//!
//! A correlated call registers a pending entry keyed by a fresh request id,
//! broadcasts an instruction to peers, and parks on a [`Waiter`]. The peer
//! answers through a REST result endpoint, which resolves or fails the
//! entry. First success wins; a result for an id that is no longer pending
//! is reported back as "late" and the HTTP layer still answers 200 - that
//! is a protocol contract, not an error.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::sync::oneshot;
use uuid::Uuid;

/// The kinds of correlated requests, each with its own deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestKind {
    /// Mermaid-to-elements conversion.
    Mermaid,
    /// Canvas image export.
    ExportImage,
    /// Viewport control.
    Viewport,
}

impl RequestKind {
    /// How long a waiter parks before timing out.
    #[must_use]
    pub fn deadline(self) -> Duration {
        match self {
            Self::Mermaid | Self::ExportImage => Duration::from_secs(30),
            Self::Viewport => Duration::from_secs(10),
        }
    }

    /// Human-readable kind label used in timeout messages.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Mermaid => "mermaid conversion",
            Self::ExportImage => "image export",
            Self::Viewport => "viewport",
        }
    }
}

/// Failure modes of a correlated wait.
#[derive(Debug, Error)]
pub enum CorrelateError {
    /// No result arrived before the kind deadline.
    #[error("{0} request timed out")]
    Timeout(&'static str),
    /// A peer reported an error and no successful result arrived.
    #[error("{0}")]
    Peer(String),
    /// The pending entry vanished without settling (shutdown).
    #[error("request channel closed")]
    Closed,
}

#[derive(Debug)]
struct Pending {
    tx: Option<oneshot::Sender<Result<Value, String>>>,
    /// Peers that may still answer. Errors only settle the waiter once
    /// every responder has reported one.
    responders: usize,
    last_error: Option<String>,
}

type PendingMap = Arc<Mutex<HashMap<String, Pending>>>;

/// Issues request ids and parks blocking callers on pending-result entries.
#[derive(Debug, Clone, Default)]
pub struct Correlator {
    pending: PendingMap,
}

/// Handle a correlated caller parks on; resolves when the entry settles or
/// the kind deadline elapses.
#[derive(Debug)]
pub struct Waiter {
    id: String,
    kind: RequestKind,
    deadline: Duration,
    rx: oneshot::Receiver<Result<Value, String>>,
    pending: PendingMap,
}

impl Correlator {
    /// Create an empty correlator.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Pending>> {
        self.pending
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Allocate a request id and register a pending entry.
    ///
    /// `responders` is the number of peers the instruction is broadcast to;
    /// per-peer errors only fail the waiter once none of them can still
    /// succeed.
    pub fn issue(&self, kind: RequestKind, responders: usize) -> (String, Waiter) {
        let id = Uuid::new_v4().to_string();
        let (tx, rx) = oneshot::channel();
        self.lock().insert(
            id.clone(),
            Pending {
                tx: Some(tx),
                responders: responders.max(1),
                last_error: None,
            },
        );
        tracing::debug!(request_id = %id, ?kind, "issued correlated request");
        let waiter = Waiter {
            id: id.clone(),
            kind,
            deadline: kind.deadline(),
            rx,
            pending: Arc::clone(&self.pending),
        };
        (id, waiter)
    }

    /// Deliver a successful result. The first success wins and removes the
    /// entry. Returns `false` when the id is not pending (late result).
    pub fn resolve(&self, id: &str, payload: Value) -> bool {
        let entry = self.lock().remove(id);
        match entry {
            Some(mut pending) => {
                if let Some(tx) = pending.tx.take() {
                    let _ = tx.send(Ok(payload));
                }
                true
            }
            None => {
                tracing::debug!(request_id = %id, "late result discarded");
                false
            }
        }
    }

    /// Record a peer-reported error. The waiter fails immediately only when
    /// no responder can still succeed; otherwise the error is retained and
    /// surfaces at the deadline if nothing better arrives. Returns `false`
    /// when the id is not pending.
    pub fn fail(&self, id: &str, error: impl Into<String>) -> bool {
        let error = error.into();
        let mut pending = self.lock();
        let Some(entry) = pending.get_mut(id) else {
            tracing::debug!(request_id = %id, "late error discarded");
            return false;
        };
        entry.responders = entry.responders.saturating_sub(1);
        entry.last_error = Some(error);
        if entry.responders == 0 {
            if let Some(mut entry) = pending.remove(id) {
                if let (Some(tx), Some(err)) = (entry.tx.take(), entry.last_error.take()) {
                    let _ = tx.send(Err(err));
                }
            }
        }
        true
    }

    /// Number of pending entries.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.lock().len()
    }
}

impl Waiter {
    /// Park until the entry settles or the deadline elapses.
    ///
    /// # Errors
    ///
    /// [`CorrelateError::Timeout`] on deadline, [`CorrelateError::Peer`]
    /// when peers reported only errors, [`CorrelateError::Closed`] if the
    /// entry vanished without settling.
    pub async fn wait(self) -> Result<Value, CorrelateError> {
        match tokio::time::timeout(self.deadline, self.rx).await {
            Ok(Ok(Ok(payload))) => Ok(payload),
            Ok(Ok(Err(error))) => Err(CorrelateError::Peer(error)),
            Ok(Err(_)) => Err(CorrelateError::Closed),
            Err(_) => {
                let entry = self
                    .pending
                    .lock()
                    .unwrap_or_else(std::sync::PoisonError::into_inner)
                    .remove(&self.id);
                match entry.and_then(|p| p.last_error) {
                    Some(error) => Err(CorrelateError::Peer(error)),
                    None => Err(CorrelateError::Timeout(self.kind.label())),
                }
            }
        }
    }
}
