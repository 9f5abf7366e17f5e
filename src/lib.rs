// ABOUTME: Root module for delegate - dynamic subagent orchestration.
// ABOUTME: Re-exports the public surface of every submodule.

pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod orchestrator;
pub mod prelude;
pub mod prompt;
pub mod resolve;
pub mod tool;

pub use error::DelegateError;
