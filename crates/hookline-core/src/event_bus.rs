//! Outbound broadcast to UI surfaces.
//!
//! Every surface (desktop window, CLI printer, test harness) subscribes to the
//! same bus and sees the same messages. Slow subscribers lag and miss
//! messages rather than blocking the core.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::events::AgentEvent;

/// Default channel capacity for the bus.
const DEFAULT_CAPACITY: usize = 1024;

/// How a pending action ended, from the UI's point of view.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ActionOutcome {
    Resolved,
    Cancelled,
}

/// A message delivered to every UI surface.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum UiMessage {
    /// A normalized agent event (may carry an action id awaiting a reply).
    #[serde(rename_all = "camelCase")]
    AgentEvent { event: Box<AgentEvent> },

    /// A pending action was answered or withdrawn; surfaces should drop it.
    #[serde(rename_all = "camelCase")]
    ActionSettled {
        action_id: String,
        outcome: ActionOutcome,
    },

    /// Raw bytes read from an interactive terminal.
    #[serde(rename_all = "camelCase")]
    TerminalData { terminal_id: String, data: String },

    /// An interactive terminal's child exited.
    #[serde(rename_all = "camelCase")]
    TerminalExit {
        terminal_id: String,
        code: Option<u32>,
    },
}

/// Framework-agnostic broadcast bus.
pub struct EventBus {
    sender: broadcast::Sender<UiMessage>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Broadcast a message. Returns how many subscribers received it.
    pub fn emit(&self, message: UiMessage) -> usize {
        self.sender.send(message).unwrap_or(0)
    }

    /// Broadcast an agent event.
    pub fn emit_event(&self, event: &AgentEvent) -> usize {
        self.emit(UiMessage::AgentEvent {
            event: Box::new(event.clone()),
        })
    }

    /// Receive all future messages. Past messages are not replayed.
    pub fn subscribe(&self) -> broadcast::Receiver<UiMessage> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::AgentType;
    use crate::events::{EventPayload, OutputDeltaPayload};

    fn delta(text: &str) -> AgentEvent {
        AgentEvent::new(
            AgentType::Codex,
            EventPayload::AgentOutputDelta(OutputDeltaPayload {
                text: text.to_string(),
            }),
        )
    }

    #[test]
    fn emit_without_subscribers_returns_zero() {
        let bus = EventBus::new();
        assert_eq!(bus.emit_event(&delta("hi")), 0);
    }

    #[test]
    fn subscriber_count_tracks_receivers() {
        let bus = EventBus::with_capacity(8);
        let rx = bus.subscribe();
        let _rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);
        drop(rx);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn every_subscriber_sees_the_event() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        assert_eq!(bus.emit_event(&delta("hello")), 2);

        for rx in [&mut rx1, &mut rx2] {
            match rx.recv().await.unwrap() {
                UiMessage::AgentEvent { event } => match event.payload {
                    EventPayload::AgentOutputDelta(p) => assert_eq!(p.text, "hello"),
                    other => panic!("unexpected payload {other:?}"),
                },
                other => panic!("unexpected message {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn late_subscriber_misses_earlier_messages() {
        let bus = EventBus::new();
        let mut early = bus.subscribe();
        bus.emit(UiMessage::TerminalExit {
            terminal_id: "t1".to_string(),
            code: Some(0),
        });
        let mut late = bus.subscribe();
        bus.emit(UiMessage::ActionSettled {
            action_id: "a1".to_string(),
            outcome: ActionOutcome::Cancelled,
        });

        assert!(matches!(early.recv().await.unwrap(), UiMessage::TerminalExit { .. }));
        assert!(matches!(early.recv().await.unwrap(), UiMessage::ActionSettled { .. }));
        assert!(matches!(late.recv().await.unwrap(), UiMessage::ActionSettled { .. }));
    }

    #[test]
    fn messages_serialize_with_kind_tag() {
        let json = serde_json::to_value(UiMessage::ActionSettled {
            action_id: "a1".to_string(),
            outcome: ActionOutcome::Resolved,
        })
        .unwrap();
        assert_eq!(json["kind"], "actionSettled");
        assert_eq!(json["actionId"], "a1");
        assert_eq!(json["outcome"], "resolved");

        let json = serde_json::to_value(UiMessage::AgentEvent {
            event: Box::new(delta("x")),
        })
        .unwrap();
        assert_eq!(json["kind"], "agentEvent");
        assert_eq!(json["event"]["type"], "agent_output:delta");
    }
}
