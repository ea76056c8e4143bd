//! Ordered pub/sub dispatch with short-circuiting results.
//!
//! Handlers are registered per event type, per category, or globally. An
//! emit awaits them one at a time in that order (registration order within
//! each group) and stops at the first handler that does not return
//! [`EventResult::Continue`].
//!
//! # Example
//!
//! ```rust
//! use hookline_core::events::{EventRegistry, EventResult, EventType};
//!
//! let registry = EventRegistry::new();
//! let sub = registry.on(EventType::ToolBegin, |event| async move {
//!     log::info!("tool starting: {}", event.id);
//!     EventResult::Continue
//! });
//! sub.unsubscribe();
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, Weak};

use futures::future::BoxFuture;
use futures::FutureExt;
use serde::{Deserialize, Serialize};

use super::event::{AgentEvent, EventCategory, EventType};

/// Outcome of a single handler, and of a whole dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "lowercase")]
pub enum EventResult {
    #[default]
    Continue,
    Deny {
        message: String,
    },
}

impl EventResult {
    pub fn deny(message: impl Into<String>) -> Self {
        EventResult::Deny {
            message: message.into(),
        }
    }

    pub fn is_continue(&self) -> bool {
        matches!(self, EventResult::Continue)
    }
}

/// A type-erased async handler.
pub type EventHandler =
    Arc<dyn Fn(Arc<AgentEvent>) -> BoxFuture<'static, EventResult> + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Slot {
    Type(EventType),
    Category(EventCategory),
    Global,
}

type HandlerList = Vec<(u64, EventHandler)>;

#[derive(Default)]
struct HandlerTable {
    next_id: u64,
    by_type: HashMap<EventType, HandlerList>,
    by_category: HashMap<EventCategory, HandlerList>,
    global: HandlerList,
}

impl HandlerTable {
    fn list_mut(&mut self, slot: Slot) -> &mut HandlerList {
        match slot {
            Slot::Type(t) => self.by_type.entry(t).or_default(),
            Slot::Category(c) => self.by_category.entry(c).or_default(),
            Slot::Global => &mut self.global,
        }
    }

    /// Handlers for one dispatch, in dispatch order.
    fn snapshot(&self, event_type: EventType) -> Vec<EventHandler> {
        let typed = self.by_type.get(&event_type).into_iter().flatten();
        let categorized = self
            .by_category
            .get(&event_type.category())
            .into_iter()
            .flatten();
        typed
            .chain(categorized)
            .chain(self.global.iter())
            .map(|(_, handler)| Arc::clone(handler))
            .collect()
    }

    fn len(&self) -> usize {
        self.by_type.values().map(Vec::len).sum::<usize>()
            + self.by_category.values().map(Vec::len).sum::<usize>()
            + self.global.len()
    }
}

/// Handle returned by every registration.
///
/// Calling [`Subscription::unsubscribe`] more than once, or after the
/// registry is gone, is a no-op. Dropping the handle does not unsubscribe.
pub struct Subscription {
    table: Weak<Mutex<HandlerTable>>,
    slot: Slot,
    id: u64,
}

impl Subscription {
    pub fn unsubscribe(&self) {
        let Some(table) = self.table.upgrade() else {
            return;
        };
        let mut table = table.lock().unwrap();
        table.list_mut(self.slot).retain(|(id, _)| *id != self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("slot", &self.slot)
            .field("id", &self.id)
            .finish()
    }
}

/// The shared event registry.
///
/// Cloning is cheap and clones share the same handler table.
#[derive(Clone, Default)]
pub struct EventRegistry {
    table: Arc<Mutex<HandlerTable>>,
}

impl EventRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for one event type.
    pub fn on<F, Fut>(&self, event_type: EventType, handler: F) -> Subscription
    where
        F: Fn(Arc<AgentEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EventResult> + Send + 'static,
    {
        self.insert(Slot::Type(event_type), boxed(handler))
    }

    /// Register a handler for every type in a category.
    pub fn on_category<F, Fut>(&self, category: EventCategory, handler: F) -> Subscription
    where
        F: Fn(Arc<AgentEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EventResult> + Send + 'static,
    {
        self.insert(Slot::Category(category), boxed(handler))
    }

    /// Register a handler for every event.
    pub fn on_all<F, Fut>(&self, handler: F) -> Subscription
    where
        F: Fn(Arc<AgentEvent>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = EventResult> + Send + 'static,
    {
        self.insert(Slot::Global, boxed(handler))
    }

    fn insert(&self, slot: Slot, handler: EventHandler) -> Subscription {
        let mut table = self.table.lock().unwrap();
        table.next_id += 1;
        let id = table.next_id;
        table.list_mut(slot).push((id, handler));
        Subscription {
            table: Arc::downgrade(&self.table),
            slot,
            id,
        }
    }

    /// Dispatch an event and return the first non-continue result.
    ///
    /// The handler list is captured before the first handler runs, so
    /// (un)registrations made during dispatch apply to later emits only.
    pub async fn emit(&self, event: &AgentEvent) -> EventResult {
        let event_type = event.event_type();
        let handlers = self.table.lock().unwrap().snapshot(event_type);
        if handlers.is_empty() {
            return EventResult::Continue;
        }

        let event = Arc::new(event.clone());
        for handler in handlers {
            let result = handler(Arc::clone(&event)).await;
            if !result.is_continue() {
                log::debug!("{} dispatch for {} stopped: {:?}", event_type, event.id, result);
                return result;
            }
        }
        EventResult::Continue
    }

    /// Total number of registered handlers across all groups.
    pub fn handler_count(&self) -> usize {
        self.table.lock().unwrap().len()
    }

    /// Drop every handler.
    pub fn clear(&self) {
        let mut table = self.table.lock().unwrap();
        table.by_type.clear();
        table.by_category.clear();
        table.global.clear();
    }
}

fn boxed<F, Fut>(handler: F) -> EventHandler
where
    F: Fn(Arc<AgentEvent>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = EventResult> + Send + 'static,
{
    Arc::new(move |event| handler(event).boxed())
}
