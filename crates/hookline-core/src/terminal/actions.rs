//! Pending actions: events that wait for a human reply.
//!
//! The flow for one action:
//!
//! ```text
//! register(id)  ->  emit(event with id)  ->  UI shows it
//!                                              |
//! wait() <------------- respond({actionId}) <--+
//! ```
//!
//! Registration happens before the event is broadcast, so a reply can never
//! arrive for an id nobody is waiting on yet. Each action settles once:
//! by a response, by an abort signal, or by cancellation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::{oneshot, watch};

use crate::event_bus::{ActionOutcome, EventBus, UiMessage};
use crate::events::AgentEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Permission,
    Question,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionDecision {
    Allow,
    Deny,
}

/// A reply from a UI surface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionResponse {
    pub action_id: String,
    #[serde(rename = "type")]
    pub kind: ActionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub decision: Option<ActionDecision>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answers: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionResponse {
    pub fn allow(action_id: impl Into<String>) -> Self {
        Self::decide(action_id, ActionDecision::Allow, None)
    }

    pub fn deny(action_id: impl Into<String>, message: Option<String>) -> Self {
        Self::decide(action_id, ActionDecision::Deny, message)
    }

    pub fn answer(action_id: impl Into<String>, answers: serde_json::Value) -> Self {
        Self {
            action_id: action_id.into(),
            kind: ActionKind::Question,
            decision: None,
            answers: Some(answers),
            message: None,
        }
    }

    fn decide(action_id: impl Into<String>, decision: ActionDecision, message: Option<String>) -> Self {
        Self {
            action_id: action_id.into(),
            kind: ActionKind::Permission,
            decision: Some(decision),
            answers: None,
            message,
        }
    }
}

/// Result of [`ActionBridge::respond`]. Failure is reported, never raised.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RespondResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl RespondResult {
    fn ok() -> Self {
        Self {
            success: true,
            error: None,
        }
    }

    fn failed(error: String) -> Self {
        Self {
            success: false,
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("Action {0} was aborted")]
    Aborted(String),
    #[error("Action {0} was cancelled")]
    Cancelled(String),
}

// ============================================================================
// ABORT SIGNAL
// ============================================================================

/// Fires an [`AbortSignal`].
#[derive(Debug, Clone)]
pub struct AbortController {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once aborted; never if the controller is dropped first.
    async fn aborted(mut self) {
        let dropped = self.rx.wait_for(|aborted| *aborted).await.is_err();
        if dropped {
            std::future::pending::<()>().await;
        }
    }
}

// ============================================================================
// BRIDGE
// ============================================================================

struct Pending {
    tx: oneshot::Sender<ActionResponse>,
    terminal_id: Option<String>,
    token: u64,
}

type PendingMap = Arc<Mutex<HashMap<String, Pending>>>;

/// Rendezvous between detected events and UI replies.
///
/// Cloning shares the pending map and the bus.
#[derive(Clone)]
pub struct ActionBridge {
    bus: Arc<EventBus>,
    pending: PendingMap,
    next_token: Arc<AtomicU64>,
}

impl ActionBridge {
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            bus,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_token: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    /// Broadcast an event to every UI surface.
    pub fn emit(&self, event: &AgentEvent) -> usize {
        self.bus.emit_event(event)
    }

    /// Start waiting for `action_id`. Call before the event is broadcast.
    ///
    /// Registering an id that is already pending cancels the older waiter.
    pub fn register(&self, action_id: &str, terminal_id: Option<&str>) -> PendingResponse {
        let (tx, rx) = oneshot::channel();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let previous = self.pending.lock().unwrap().insert(
            action_id.to_string(),
            Pending {
                tx,
                terminal_id: terminal_id.map(str::to_string),
                token,
            },
        );
        if previous.is_some() {
            log::warn!("Action {action_id} registered twice; dropping the first waiter");
        }
        PendingResponse {
            action_id: action_id.to_string(),
            token,
            rx: Some(rx),
            bridge: self.clone(),
        }
    }

    /// Register and wait in one step.
    pub async fn await_response(
        &self,
        action_id: &str,
        terminal_id: Option<&str>,
        abort: Option<AbortSignal>,
    ) -> Result<ActionResponse, ActionError> {
        self.register(action_id, terminal_id).wait(abort).await
    }

    /// Deliver a reply. Unknown or already-settled ids are a soft failure.
    pub fn respond(&self, response: ActionResponse) -> RespondResult {
        let action_id = response.action_id.clone();
        let Some(pending) = self.pending.lock().unwrap().remove(&action_id) else {
            log::warn!("No pending action {action_id}");
            return RespondResult::failed(format!("No pending action with id {action_id}"));
        };
        if pending.tx.send(response).is_err() {
            return RespondResult::failed(format!("Action {action_id} is no longer awaited"));
        }
        self.settled(&action_id, ActionOutcome::Resolved);
        RespondResult::ok()
    }

    /// Withdraw one pending action. Its waiter gets [`ActionError::Cancelled`].
    pub fn cancel(&self, action_id: &str) -> bool {
        let removed = self.pending.lock().unwrap().remove(action_id).is_some();
        if removed {
            self.settled(action_id, ActionOutcome::Cancelled);
        }
        removed
    }

    /// Withdraw every action waiting on `terminal_id`.
    pub fn cancel_terminal(&self, terminal_id: &str) -> usize {
        let ids: Vec<String> = {
            let mut pending = self.pending.lock().unwrap();
            let ids: Vec<String> = pending
                .iter()
                .filter(|(_, p)| p.terminal_id.as_deref() == Some(terminal_id))
                .map(|(id, _)| id.clone())
                .collect();
            for id in &ids {
                pending.remove(id);
            }
            ids
        };
        for id in &ids {
            self.settled(id, ActionOutcome::Cancelled);
        }
        ids.len()
    }

    pub fn cancel_all(&self) -> usize {
        let ids: Vec<String> = self.pending.lock().unwrap().drain().map(|(id, _)| id).collect();
        for id in &ids {
            self.settled(id, ActionOutcome::Cancelled);
        }
        ids.len()
    }

    pub fn is_pending(&self, action_id: &str) -> bool {
        self.pending.lock().unwrap().contains_key(action_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().unwrap().len()
    }

    /// Ids waiting on `terminal_id`.
    pub fn pending_for_terminal(&self, terminal_id: &str) -> Vec<String> {
        self.pending
            .lock()
            .unwrap()
            .iter()
            .filter(|(_, p)| p.terminal_id.as_deref() == Some(terminal_id))
            .map(|(id, _)| id.clone())
            .collect()
    }

    fn settled(&self, action_id: &str, outcome: ActionOutcome) {
        self.bus.emit(UiMessage::ActionSettled {
            action_id: action_id.to_string(),
            outcome,
        });
    }
}

/// A registered action, not yet settled.
///
/// Dropping it unanswered deregisters the action.
pub struct PendingResponse {
    action_id: String,
    token: u64,
    rx: Option<oneshot::Receiver<ActionResponse>>,
    bridge: ActionBridge,
}

impl PendingResponse {
    pub fn action_id(&self) -> &str {
        &self.action_id
    }

    pub async fn wait(mut self, abort: Option<AbortSignal>) -> Result<ActionResponse, ActionError> {
        let Some(rx) = self.rx.take() else {
            return Err(ActionError::Cancelled(self.action_id.clone()));
        };
        if abort.as_ref().is_some_and(AbortSignal::is_aborted) {
            self.bridge.cancel(&self.action_id);
            return Err(ActionError::Aborted(self.action_id.clone()));
        }

        let aborted = async move {
            match abort {
                Some(signal) => signal.aborted().await,
                None => std::future::pending().await,
            }
        };
        tokio::select! {
            reply = rx => reply.map_err(|_| ActionError::Cancelled(self.action_id.clone())),
            _ = aborted => {
                self.bridge.cancel(&self.action_id);
                Err(ActionError::Aborted(self.action_id.clone()))
            }
        }
    }
}

impl Drop for PendingResponse {
    fn drop(&mut self) {
        // A newer registration under the same id is left alone.
        let mut pending = self.bridge.pending.lock().unwrap();
        if pending.get(&self.action_id).is_some_and(|p| p.token == self.token) {
            pending.remove(&self.action_id);
        }
    }
}
