// ABOUTME: Tool module - the capability interface, registry, and tool sets.
// ABOUTME: Tools are shared read-only by every run that may use them.

mod registry;
mod result;
mod set;
mod traits;

pub use registry::*;
pub use result::*;
pub use set::*;
pub use traits::*;
