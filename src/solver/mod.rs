//! Transient solver pipeline.
//!
//! ## Modified Nodal Analysis
//!
//! [`ModifiedNodalAnalysis`] assembles a symbolic system from the circuit:
//! every element states its terminal currents and any branch equations, then
//! Kirchhoff's current law is added at each non-ground node. Unknowns are
//! node voltages `V[node]` and branch currents `i[element]`.
//!
//! ## Transient solution
//!
//! [`TransientSolution::solve`] discretizes the system with the trapezoidal
//! rule, eliminates the linear unknowns symbolically and leaves a (usually
//! small) nonlinear residual for Newton's method.
//!
//! ## Simulation
//!
//! [`Simulation`] compiles the solution and runs it over sample buffers,
//! oversampling internally and detecting divergence.

mod linear;
mod mna;
mod newton;
mod simulator;
mod transient;

pub use mna::{Analyze, CircuitEquations, ModifiedNodalAnalysis, Parameter, Terminal};
pub use newton::NewtonIteration;
pub use simulator::{Simulation, SimulationState, SimulatorConfig};
pub use transient::{Assignment, SolutionSet, TransientSolution};

/// Convergence tolerance for Newton iteration.
pub const CONVERGENCE_TOLERANCE: f64 = 1e-9;

/// Default Newton iteration budget per internal step.
pub const DEFAULT_ITERATIONS: usize = 8;

/// Default internal steps per output sample.
pub const DEFAULT_OVERSAMPLE: usize = 8;
