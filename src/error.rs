//! Error types for the tubesim circuit simulator.
//!
//! This module provides a unified error type [`TubesimError`] that covers
//! every failure of the pipeline: netlist parsing, circuit validation,
//! equation assembly, discretization, compilation and simulation.

use thiserror::Error;

/// Result type alias using [`TubesimError`].
pub type Result<T> = std::result::Result<T, TubesimError>;

/// Unified error type for all tubesim operations.
#[derive(Error, Debug)]
pub enum TubesimError {
    // ============ DSL Parsing Errors ============
    /// Error during lexical analysis
    #[error("Lexer error at line {line}, column {column}: {message}")]
    LexerError {
        line: usize,
        column: usize,
        message: String,
    },

    /// Error during parsing
    #[error("Parse error at line {line}: {message}")]
    ParseError { line: usize, message: String },

    /// Malformed expression text
    #[error("Expression error at offset {offset}: {message}")]
    ExpressionSyntax { offset: usize, message: String },

    /// Invalid component definition
    #[error("Invalid component '{name}' at line {line}: {message}")]
    InvalidComponent {
        name: String,
        line: usize,
        message: String,
    },

    /// Unknown component type
    #[error("Unknown component type '{component_type}' at line {line}")]
    UnknownComponentType { component_type: String, line: usize },

    /// Undefined model reference
    #[error("Undefined model '{model}' referenced by component '{component}'")]
    UndefinedModel { model: String, component: String },

    // ============ Circuit Validation Errors ============
    /// Missing ground node
    #[error("Circuit has no ground node (use '0' or 'GND')")]
    MissingGround,

    /// Node referenced by a directive but not by any component
    #[error("Node '{node}' not found")]
    NodeNotFound { node: String },

    /// Missing output node
    #[error("No output node specified (use '.output <node>')")]
    MissingOutput,

    /// Duplicate component name
    #[error("Duplicate component name '{name}'")]
    DuplicateComponent { name: String },

    /// Duplicate model or parameter name
    #[error("Duplicate definition '{name}'")]
    DuplicateDefinition { name: String },

    /// Invalid circuit topology
    #[error("Invalid circuit topology: {message}")]
    InvalidTopology { message: String },

    // ============ Structural Errors ============
    /// Fewer independent equations than unknowns
    #[error("System is underdetermined: {equations} equations for {unknowns} unknowns")]
    Underdetermined { equations: usize, unknowns: usize },

    /// More equations than unknowns
    #[error("System is overdetermined: {equations} equations for {unknowns} unknowns")]
    Overdetermined { equations: usize, unknowns: usize },

    /// An unknown was introduced twice
    #[error("Unknown '{name}' is already defined")]
    DuplicateUnknown { name: String },

    /// A terminal current was assigned more than once
    #[error("Current of terminal '{terminal}' assigned more than once")]
    TerminalCurrentReassigned { terminal: String },

    /// A terminal current was never assigned
    #[error("Current of terminal '{terminal}' was never assigned")]
    TerminalCurrentUnassigned { terminal: String },

    /// An equation references a symbol that is neither an unknown, an input,
    /// a parameter nor time
    #[error("Equation references undefined symbol '{symbol}'")]
    UndefinedSymbol { symbol: String },

    /// The linear subsystem has no unique solution
    #[error("Singular system: {message}")]
    SingularSystem { message: String },

    // ============ Compilation Errors ============
    /// A function the compiler does not implement
    #[error("Unsupported function '{name}'")]
    UnsupportedFunction { name: String },

    /// An operator that cannot be compiled (derivative or integral left over)
    #[error("Unsupported operator in '{expression}'")]
    UnsupportedOperator { expression: String },

    /// A function called with the wrong number of arguments
    #[error("Function '{name}' expects {expected} arguments, got {found}")]
    ArityMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    // ============ Simulation Errors ============
    /// Output went non-finite
    #[error("Simulation diverged after t={time}s (output '{output}')")]
    Diverged { time: f64, output: String },

    /// Newton Jacobian could not be factored
    #[error("Matrix is singular")]
    SingularMatrix,

    /// Invalid simulation parameter
    #[error("Invalid simulation parameter: {message}")]
    InvalidSimulationParam { message: String },

    // ============ Caller Contract Errors ============
    /// A buffer does not hold exactly the requested number of samples
    #[error("Buffer '{name}' has {found} samples, expected {expected}")]
    BufferLengthMismatch {
        name: String,
        expected: usize,
        found: usize,
    },

    /// Buffer name that is not an input or unknown of the simulation
    #[error("No input or unknown named '{name}'")]
    UnknownBuffer { name: String },

    /// Parameter name that was not declared
    #[error("No parameter named '{name}'")]
    UnknownParameter { name: String },

    /// Iteration budget must be at least one
    #[error("Iteration budget must be positive")]
    InvalidIterationBudget,

    /// Run requested after divergence without a reset
    #[error("Simulation has diverged; reset before running again")]
    AlreadyDiverged,

    // ============ I/O Errors ============
    /// Error reading circuit file
    #[error("Failed to read circuit file '{path}': {source}")]
    FileReadError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Error reading audio input
    #[error("Audio input error: {message}")]
    AudioInputError { message: String },

    /// Error writing audio output
    #[error("Audio output error: {message}")]
    AudioOutputError { message: String },
}

impl TubesimError {
    /// Create a lexer error
    pub fn lexer(line: usize, column: usize, message: impl Into<String>) -> Self {
        Self::LexerError {
            line,
            column,
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(line: usize, message: impl Into<String>) -> Self {
        Self::ParseError {
            line,
            message: message.into(),
        }
    }

    /// Create an expression syntax error
    pub fn expression(offset: usize, message: impl Into<String>) -> Self {
        Self::ExpressionSyntax {
            offset,
            message: message.into(),
        }
    }

    /// Create an invalid component error
    pub fn invalid_component(name: impl Into<String>, line: usize, message: impl Into<String>) -> Self {
        Self::InvalidComponent {
            name: name.into(),
            line,
            message: message.into(),
        }
    }

    /// Create a singular system error
    pub fn singular(message: impl Into<String>) -> Self {
        Self::SingularSystem {
            message: message.into(),
        }
    }

    /// Create a divergence error
    pub fn diverged(time: f64, output: impl Into<String>) -> Self {
        Self::Diverged {
            time,
            output: output.into(),
        }
    }

    /// Whether this error was raised while building the solution (before any
    /// sample is produced).
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::Underdetermined { .. }
                | Self::Overdetermined { .. }
                | Self::DuplicateUnknown { .. }
                | Self::TerminalCurrentReassigned { .. }
                | Self::TerminalCurrentUnassigned { .. }
                | Self::UndefinedSymbol { .. }
                | Self::SingularSystem { .. }
        )
    }
}
