//! Claude: the SDK-integrated vendor.
//!
//! Besides the stream-json and terminal paths every vendor has, Claude
//! exposes structured hook callbacks; [`hooks`] answers those.

pub mod adapter;
pub mod driver;
pub mod hooks;

pub use adapter::ClaudeAdapter;
pub use driver::ClaudeDriver;
pub use hooks::{HookBridge, HookInput, HookOutput, HookPoint};
