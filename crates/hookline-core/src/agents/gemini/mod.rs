//! Gemini: stream-json events and terminal scraping.

pub mod adapter;
pub mod driver;

pub use adapter::GeminiAdapter;
pub use driver::GeminiDriver;
