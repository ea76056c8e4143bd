//! Codex: JSON event stream (`codex exec --json`) and terminal scraping.

pub mod adapter;
pub mod driver;

pub use adapter::CodexAdapter;
pub use driver::CodexDriver;
