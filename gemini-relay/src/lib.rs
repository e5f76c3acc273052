//! gemini-relay: forwards browser prompts to Gemini and returns the text as JSON.

pub mod config;
pub mod handlers;
pub mod services;
pub mod startup;

pub use startup::{build_router, AppState, Application};
