//! Domain models for delivery challans.

mod challan;
mod checklist;
mod procedure;

pub use challan::*;
pub use checklist::*;
pub use procedure::*;
