// ABOUTME: Model module - the client abstraction consumed by the orchestrator.
// ABOUTME: Provider wire protocols live outside this crate.

mod client;
mod types;

pub use client::*;
pub use types::*;
