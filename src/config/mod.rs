// ABOUTME: Config module - layered agent definitions and orchestrator settings.
// ABOUTME: Parses, discovers, and merges layers into frozen agent specs.

mod loader;
mod merge;
mod partial;
mod settings;

pub use loader::*;
pub use merge::*;
pub use partial::*;
pub use settings::*;

#[cfg(test)]
mod merge_test;
