//! Platform hooks
//!
//! The heap never reads machine state directly. Everything it needs from
//! the target goes through the traits in this module:
//! - [`StackProbe`]: where the stack currently ends

pub mod stack;

pub use stack::{CurrentStack, StackProbe};
