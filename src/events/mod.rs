// ABOUTME: Events module - lifecycle events and the scoped, non-blocking bus
// ABOUTME: that delivers them to parent sessions and UI observers.

mod bus;
mod event;

pub use bus::*;
pub use event::*;
