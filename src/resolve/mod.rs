// ABOUTME: Resolve module - computes a child's effective model, tools, and
// ABOUTME: budgets from its spec and an immutable snapshot of its parent.

mod resolution;

pub use resolution::*;
