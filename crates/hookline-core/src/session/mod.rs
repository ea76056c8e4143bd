//! Session tracking.

pub mod provider;

pub use provider::{ActiveSession, SessionCallback, SessionProvider};
