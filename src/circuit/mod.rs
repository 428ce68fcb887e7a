//! Circuit graph representation and validation.
//!
//! This module provides the internal representation of a circuit after parsing.
//! The [`Circuit`] struct holds all components, nodes and parameters, and
//! assembles them into symbolic equations with [`Circuit::analyze`].

mod graph;
mod types;
mod validate;

pub use graph::{Circuit, DEFAULT_INPUT_NAME};
pub use types::*;
pub use validate::validate_circuit;
