//! Domain models for the bed queue.

mod identity;
mod interest;
mod patient;
mod unit;

pub use identity::*;
pub use interest::*;
pub use patient::*;
pub use unit::*;
