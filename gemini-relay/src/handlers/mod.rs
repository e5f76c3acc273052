//! HTTP handlers for the relay.

pub mod ask;
pub mod health;
pub mod metrics;

pub use ask::ask_gemini;
pub use health::health_check;
