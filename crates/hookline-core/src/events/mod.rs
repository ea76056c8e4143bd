//! The normalized event model and the registry that dispatches it.

pub mod event;
pub mod registry;

pub use event::{
    AgentEvent, ContextCompactPayload, DelegationStartPayload, DelegationStopPayload,
    EventCategory, EventPayload, EventType, OutputCompletePayload, OutputDeltaPayload,
    PermissionDecisionPayload, PermissionRequestPayload, SessionEndPayload, SessionStartPayload,
    SystemInfoPayload, ToolBeginPayload, ToolCompletePayload, ToolErrorPayload, UserInputPayload,
};
pub use registry::{EventHandler, EventRegistry, EventResult, Subscription};
