//! Permission prompts detected in live terminal output.
//!
//! Each attached terminal gets its vendor's adapter. Output chunks are
//! cleaned, scanned, and every detected event is emitted on the registry.
//! A `permission:request` is then decided by, in order:
//!
//! 1. a registry handler returning deny (writes `n`)
//! 2. the workspace's permission policy (`allow` writes `y`, `deny` writes `n`)
//! 3. a human, via the [`ActionBridge`] round trip
//!
//! A prompt split across chunks is carried over until its confirmation line
//! arrives, so a half-received prompt is never answered.
//!
//! Events from a terminal attached with a workspace carry that path, which
//! selects the project's policy in step 2.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::agents::terminal::clean_terminal_text;
use crate::agents::{AdapterRegistry, AgentType};
use crate::events::{AgentEvent, EventPayload, EventRegistry, EventType};
use crate::permission::{Decision, PolicyStore};

use super::actions::{ActionBridge, ActionDecision};

/// Carried text beyond this is dropped; no real prompt is this long.
const MAX_CARRY: usize = 8 * 1024;

/// Sends keystrokes to a terminal.
pub type TerminalWriter = Arc<dyn Fn(&str) + Send + Sync>;

struct Attached {
    agent: AgentType,
    workspace: Option<String>,
    writer: TerminalWriter,
    carry: String,
    generation: u64,
}

struct Inner {
    registry: EventRegistry,
    adapters: Arc<AdapterRegistry>,
    actions: ActionBridge,
    policies: Arc<PolicyStore>,
    terminals: Mutex<HashMap<String, Attached>>,
    next_generation: AtomicU64,
}

/// What `take_scannable` hands back for one chunk.
struct Scan {
    agent: AgentType,
    workspace: Option<String>,
    writer: TerminalWriter,
    generation: u64,
    text: String,
}

/// Connects terminals to the registry, the policy and the UI.
///
/// Cloning shares state.
#[derive(Clone)]
pub struct TerminalBridge {
    inner: Arc<Inner>,
}

impl TerminalBridge {
    pub fn new(
        registry: EventRegistry,
        adapters: Arc<AdapterRegistry>,
        actions: ActionBridge,
        policies: Arc<PolicyStore>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                registry,
                adapters,
                actions,
                policies,
                terminals: Mutex::new(HashMap::new()),
                next_generation: AtomicU64::new(1),
            }),
        }
    }

    /// Start detecting on `terminal_id`. Attaching again replaces the
    /// previous detector and cancels whatever it was waiting on.
    ///
    /// `workspace` is the directory the agent runs in, if known.
    pub fn attach(
        &self,
        terminal_id: &str,
        agent: AgentType,
        workspace: Option<&str>,
        writer: TerminalWriter,
    ) {
        let generation = self.inner.next_generation.fetch_add(1, Ordering::Relaxed);
        let previous = self.inner.terminals.lock().unwrap().insert(
            terminal_id.to_string(),
            Attached {
                agent,
                workspace: workspace.map(str::to_string),
                writer,
                carry: String::new(),
                generation,
            },
        );
        if previous.is_some() {
            let cancelled = self.inner.actions.cancel_terminal(terminal_id);
            log::info!("Re-attached terminal {terminal_id} as {agent}; cancelled {cancelled} pending action(s)");
        } else {
            log::info!("Attached terminal {terminal_id} as {agent}");
        }
    }

    /// Stop detecting on `terminal_id` and cancel only its pending actions.
    /// Detaching an unknown terminal does nothing.
    pub fn detach(&self, terminal_id: &str) {
        if self.inner.terminals.lock().unwrap().remove(terminal_id).is_none() {
            return;
        }
        let cancelled = self.inner.actions.cancel_terminal(terminal_id);
        log::info!("Detached terminal {terminal_id}; cancelled {cancelled} pending action(s)");
    }

    pub fn is_attached(&self, terminal_id: &str) -> bool {
        self.inner.terminals.lock().unwrap().contains_key(terminal_id)
    }

    pub fn attached_count(&self) -> usize {
        self.inner.terminals.lock().unwrap().len()
    }

    /// Feed one chunk of terminal output. Returns the events detected in it.
    ///
    /// Resolves once every permission prompt in the chunk is settled.
    pub async fn process_output(&self, terminal_id: &str, chunk: &str) -> Vec<AgentEvent> {
        let Some(Scan {
            agent,
            workspace,
            writer,
            generation,
            text,
        }) = self.take_scannable(terminal_id, chunk)
        else {
            return Vec::new();
        };
        if text.is_empty() {
            return Vec::new();
        }

        let events: Vec<AgentEvent> = self
            .inner
            .adapters
            .parse_terminal_output(agent, &text)
            .into_iter()
            .map(|e| {
                let e = e.with_terminal(terminal_id);
                if e.workspace_path.is_none() {
                    e.with_workspace(workspace.clone())
                } else {
                    e
                }
            })
            .collect();

        let mut detected = Vec::with_capacity(events.len());
        for event in events {
            let result = self.inner.registry.emit(&event).await;
            if event.event_type() == EventType::PermissionRequest {
                let event = self
                    .decide(terminal_id, generation, &writer, event, result.is_continue())
                    .await;
                detected.push(event);
            } else {
                self.inner.actions.emit(&event);
                detected.push(event);
            }
        }
        detected
    }

    /// Prepend the carry, clean, and split off an unconfirmed prompt.
    fn take_scannable(&self, terminal_id: &str, chunk: &str) -> Option<Scan> {
        let mut terminals = self.inner.terminals.lock().unwrap();
        let attached = terminals.get_mut(terminal_id)?;

        let mut text = std::mem::take(&mut attached.carry);
        text.push_str(&clean_terminal_text(chunk));

        let partial = self
            .inner
            .adapters
            .get(attached.agent)
            .and_then(|adapter| adapter.partial_prompt_start(&text));
        if let Some(start) = partial {
            let carry = text.split_off(start);
            if carry.len() > MAX_CARRY {
                log::debug!("Dropping {} bytes of unconfirmed prompt on {terminal_id}", carry.len());
            } else {
                attached.carry = carry;
            }
        }
        Some(Scan {
            agent: attached.agent,
            workspace: attached.workspace.clone(),
            writer: attached.writer.clone(),
            generation: attached.generation,
            text,
        })
    }

    async fn decide(
        &self,
        terminal_id: &str,
        generation: u64,
        writer: &TerminalWriter,
        mut event: AgentEvent,
        registry_allows: bool,
    ) -> AgentEvent {
        if !registry_allows {
            log::info!("Registry denied permission request on {terminal_id}");
            self.write_if_current(terminal_id, generation, writer, "n");
            return event;
        }

        let policy = self
            .inner
            .policies
            .for_workspace(event.workspace_path.as_deref());
        match policy.evaluate_event(&event) {
            Some(Decision::Allow) => {
                log::info!("Policy allowed permission request on {terminal_id}");
                self.write_if_current(terminal_id, generation, writer, "y");
                return event;
            }
            Some(Decision::Deny) => {
                log::info!("Policy denied permission request on {terminal_id}");
                self.write_if_current(terminal_id, generation, writer, "n");
                return event;
            }
            Some(Decision::Ask) | None => {}
        }

        let action_id = Uuid::new_v4().to_string();
        if let EventPayload::PermissionRequest(ref mut payload) = event.payload {
            payload.action_id = Some(action_id.clone());
        }
        let pending = self.inner.actions.register(&action_id, Some(terminal_id));
        // A detach between scanning and registering has already cancelled
        // this terminal's actions; this one would never be answered.
        if !self.is_current(terminal_id, generation) {
            self.inner.actions.cancel(&action_id);
            log::debug!("Terminal {terminal_id} detached before {action_id} was sent");
            return event;
        }
        self.inner.actions.emit(&event);

        match pending.wait(None).await {
            Ok(response) => match response.decision {
                Some(ActionDecision::Allow) => {
                    self.write_if_current(terminal_id, generation, writer, "y")
                }
                Some(ActionDecision::Deny) => {
                    self.write_if_current(terminal_id, generation, writer, "n")
                }
                None => log::warn!("Action {action_id} answered without a decision"),
            },
            Err(e) => log::debug!("{e}; nothing written to {terminal_id}"),
        }
        event
    }

    /// Write only if `terminal_id` is still attached by the same detector.
    fn write_if_current(&self, terminal_id: &str, generation: u64, writer: &TerminalWriter, keys: &str) {
        if self.is_current(terminal_id, generation) {
            writer(keys);
        } else {
            log::debug!("Terminal {terminal_id} detached; not writing {keys:?}");
        }
    }

    fn is_current(&self, terminal_id: &str, generation: u64) -> bool {
        self.inner
            .terminals
            .lock()
            .unwrap()
            .get(terminal_id)
            .is_some_and(|a| a.generation == generation)
    }
}
