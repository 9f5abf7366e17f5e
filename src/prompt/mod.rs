// ABOUTME: Prompt module - deterministic composition of a subagent's prompt.
// ABOUTME: Context snapshots carry discovered project rules and templates.

mod builder;
mod context;

pub use builder::*;
pub use context::*;
