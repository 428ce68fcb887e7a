//! # Tubesim Core
//!
//! A symbolic transient circuit simulator for real-time audio.
//!
//! This library provides:
//! - A custom DSL for describing circuit topologies
//! - A small symbolic algebra for circuit equations
//! - Modified Nodal Analysis (MNA) assembled symbolically
//! - Trapezoidal discretization with symbolic elimination of the linear part
//! - A compiler from the discretized system to a register program
//! - Audio processing pipeline for running circuits over sample buffers
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`dsl`] - Parser for the circuit description language
//! - [`circuit`] - Circuit graph representation and validation
//! - [`components`] - Component models (resistors, capacitors, diodes, etc.)
//! - [`expr`] - Symbolic expressions, differentiation and evaluation
//! - [`solver`] - MNA assembly, transient solution and the simulation driver
//! - [`compiler`] - Lowering of a transient solution to a step program
//! - [`audio`] - Block processing and raw audio I/O
//!
//! ## Usage
//!
//! ### Native CLI
//!
//! ```bash
//! ffmpeg -i input.wav -f f32le -ac 1 -ar 48000 - | tubesim circuit.tsim | ffmpeg -f f32le -ac 1 -ar 48000 -i - output.wav
//! ```
//!
//! ### Library
//!
//! ```no_run
//! use tubesim_core::{Circuit, Simulation, SimulatorConfig};
//!
//! # fn main() -> tubesim_core::Result<()> {
//! let circuit = Circuit::from_dsl(".input in\n.output out\nR1 in out 10k\nC1 out 0 10n")?;
//! let mut sim = Simulation::from_circuit(&circuit, SimulatorConfig::default())?;
//! let input = vec![1.0; 480];
//! let mut output = vec![0.0; 480];
//! sim.process(&input, &mut output)?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Circuit Simulation Method
//!
//! Every component states its terminal currents and branch equations as
//! expressions. From those the simulator:
//!
//! 1. Assembles the MNA system: KCL at each node plus element equations
//! 2. Replaces derivatives using the trapezoidal rule at the internal rate
//! 3. Solves the linear unknowns symbolically, leaving a nonlinear residual
//! 4. Compiles the result; nonlinear blocks are solved by Newton's method
//!
//! Each output sample runs `oversample` internal steps with linearly
//! interpolated inputs.

pub mod circuit;
pub mod compiler;
pub mod components;
pub mod dsl;
pub mod error;
pub mod expr;
pub mod solver;
pub mod audio;

// Re-export main types for convenience
pub use circuit::Circuit;
pub use error::{Result, TubesimError};
pub use solver::{Simulation, SimulatorConfig};

// WASM bindings
#[cfg(feature = "wasm")]
mod wasm;

#[cfg(feature = "wasm")]
pub use wasm::WasmCircuitSim;

/// Default sample rate in Hz
pub const DEFAULT_SAMPLE_RATE: f64 = 48000.0;

/// Thermal voltage at room temperature (approximately 26mV)
pub const THERMAL_VOLTAGE: f64 = 0.0258;
