//! Main simulation interface.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info, warn};

use super::transient::TransientSolution;
use super::{CONVERGENCE_TOLERANCE, DEFAULT_ITERATIONS, DEFAULT_OVERSAMPLE};
use crate::circuit::Circuit;
use crate::compiler::{CompiledStep, Workspace};
use crate::error::{Result, TubesimError};
use crate::DEFAULT_SAMPLE_RATE;

/// Configuration for a simulation.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Output sample rate in Hz.
    pub sample_rate: f64,
    /// Internal steps per output sample.
    pub oversample: usize,
    /// Newton iteration budget per internal step.
    pub iterations: usize,
    /// Newton convergence tolerance.
    pub tolerance: f64,
}

impl Default for SimulatorConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            oversample: DEFAULT_OVERSAMPLE,
            iterations: DEFAULT_ITERATIONS,
            tolerance: CONVERGENCE_TOLERANCE,
        }
    }
}

impl SimulatorConfig {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_sample_rate(mut self, sample_rate: f64) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    /// Set the oversampling factor.
    ///
    /// Higher oversampling reduces the trapezoidal rule's frequency warping
    /// and helps Newton converge on stiff nonlinearities, at a proportional
    /// cost per output sample.
    pub fn with_oversample(mut self, oversample: usize) -> Self {
        self.oversample = oversample;
        self
    }

    /// Set the Newton iteration budget.
    pub fn with_iterations(mut self, iterations: usize) -> Self {
        self.iterations = iterations;
        self
    }

    /// Set the Newton convergence tolerance.
    pub fn with_tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(self.sample_rate.is_finite() && self.sample_rate > 0.0) {
            return Err(TubesimError::InvalidSimulationParam {
                message: format!("sample rate must be positive, got {}", self.sample_rate),
            });
        }
        if self.oversample == 0 {
            return Err(TubesimError::InvalidSimulationParam {
                message: "oversample must be at least 1".to_string(),
            });
        }
        if self.iterations == 0 {
            return Err(TubesimError::InvalidIterationBudget);
        }
        Ok(())
    }
}

/// Lifecycle of a [`Simulation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimulationState {
    /// No samples produced since construction or the last reset.
    Fresh,
    Running,
    /// An output went non-finite; only [`Simulation::reset`] recovers.
    Diverged,
}

/// Runs a compiled transient solution over sample buffers.
#[derive(Debug)]
pub struct Simulation {
    solution: Arc<TransientSolution>,
    step: CompiledStep,
    workspace: Workspace,
    oversample: usize,
    iterations: usize,
    unknown_index: HashMap<String, usize>,
    input_index: HashMap<String, usize>,
    parameter_index: HashMap<String, usize>,
    parameters: Vec<f64>,
    /// Input values at the last output sample, start of interpolation.
    last_inputs: Vec<f64>,
    at: u64,
    state: SimulationState,
    default_input: Option<String>,
    default_output: Option<String>,
}

impl Simulation {
    /// Build a simulation of `circuit`: assemble, discretize at the
    /// oversampled rate and compile.
    pub fn from_circuit(circuit: &Circuit, config: SimulatorConfig) -> Result<Self> {
        config.validate()?;
        let equations = circuit.analyze()?;
        let rate = config.sample_rate * config.oversample as f64;
        let solution = TransientSolution::solve(&equations, rate)?;
        let mut sim = Self::new(Arc::new(solution), &config)?;
        sim.default_input = circuit.input_name().map(str::to_string);
        sim.default_output = Some(circuit.output_unknown());
        Ok(sim)
    }

    /// Build a simulation of an existing solution. The solution's sample
    /// rate is the internal (oversampled) rate; `config.sample_rate` is
    /// ignored.
    pub fn new(solution: Arc<TransientSolution>, config: &SimulatorConfig) -> Result<Self> {
        config.validate()?;
        let step = CompiledStep::compile(&solution, config.tolerance)?;
        let mut workspace = step.workspace();

        let unknown_index = index_by_name(solution.unknowns().iter().map(|s| s.name()));
        let input_index = index_by_name(solution.inputs().iter().map(|s| s.name()));
        let parameter_index =
            index_by_name(solution.parameters().iter().map(|p| p.symbol.name()));
        let parameters: Vec<f64> = solution.parameters().iter().map(|p| p.default).collect();
        for (i, &value) in parameters.iter().enumerate() {
            workspace.set_parameter(i, value);
        }

        info!(
            "simulation at {} Hz x{} oversample ({} unknowns, {} inputs, {} parameters)",
            solution.sample_rate() / config.oversample as f64,
            config.oversample,
            unknown_index.len(),
            input_index.len(),
            parameters.len()
        );

        Ok(Self {
            last_inputs: vec![0.0; input_index.len()],
            solution,
            step,
            workspace,
            oversample: config.oversample,
            iterations: config.iterations,
            unknown_index,
            input_index,
            parameter_index,
            parameters,
            at: 0,
            state: SimulationState::Fresh,
            default_input: None,
            default_output: None,
        })
    }

    /// Advance `n` output samples.
    ///
    /// `inputs` supplies `n` samples per named input; inputs not listed are
    /// held at zero. Each `outputs` buffer receives `n` samples of the named
    /// unknown. `parameters` are rebound before the first sample and keep
    /// their values for later calls. Newton blocks run at most `iterations`
    /// corrections per internal step.
    pub fn run(
        &mut self,
        n: usize,
        inputs: &[(&str, &[f64])],
        outputs: &mut [(&str, &mut [f64])],
        parameters: &[(&str, f64)],
        iterations: usize,
    ) -> Result<()> {
        if self.state == SimulationState::Diverged {
            return Err(TubesimError::AlreadyDiverged);
        }
        if iterations == 0 {
            return Err(TubesimError::InvalidIterationBudget);
        }

        let mut sources: Vec<Option<&[f64]>> = vec![None; self.input_index.len()];
        for &(name, buffer) in inputs {
            let &i = self
                .input_index
                .get(name)
                .ok_or_else(|| TubesimError::UnknownBuffer {
                    name: name.to_string(),
                })?;
            check_length(name, buffer.len(), n)?;
            sources[i] = Some(buffer);
        }

        let mut sinks = Vec::with_capacity(outputs.len());
        for (name, buffer) in outputs.iter() {
            let &i = self
                .unknown_index
                .get(*name)
                .ok_or_else(|| TubesimError::UnknownBuffer {
                    name: name.to_string(),
                })?;
            check_length(name, buffer.len(), n)?;
            sinks.push(i);
        }

        // Resolve every binding before applying any
        let bindings = parameters
            .iter()
            .map(|&(name, value)| self.parameter_slot(name).map(|i| (i, value)))
            .collect::<Result<Vec<_>>>()?;
        for (i, value) in bindings {
            self.bind(i, value);
        }

        let os = self.oversample;
        let h = self.solution.timestep();
        for k in 0..n {
            let sample = self.at + k as u64;
            for s in 0..os {
                let frac = (s + 1) as f64 / os as f64;
                for (i, source) in sources.iter().enumerate() {
                    let target = source.map_or(0.0, |b| b[k]);
                    let start = self.last_inputs[i];
                    self.workspace.set_input(i, start + (target - start) * frac);
                }
                let step_index = sample * os as u64 + s as u64;
                self.workspace.set_prev_time(step_index as f64 * h);
                self.step.step(&mut self.workspace, iterations);
                self.workspace.advance();
            }
            for (i, source) in sources.iter().enumerate() {
                self.last_inputs[i] = source.map_or(0.0, |b| b[k]);
            }
            for ((_, buffer), &u) in outputs.iter_mut().zip(&sinks) {
                buffer[k] = self.workspace.previous_unknown(u);
            }
        }

        if n > 0 {
            for (name, buffer) in outputs.iter() {
                if buffer[n - 1].is_finite() {
                    continue;
                }
                let first = buffer.iter().position(|v| !v.is_finite()).unwrap_or(n - 1);
                let time = (self.at + first as u64) as f64 * self.timestep();
                warn!("simulation diverged at t={}s on '{}'", time, name);
                self.state = SimulationState::Diverged;
                return Err(TubesimError::diverged(time, *name));
            }
            self.state = SimulationState::Running;
        }
        self.at += n as u64;
        Ok(())
    }

    /// Single input, single output shorthand for [`run`](Self::run).
    pub fn run_mono(
        &mut self,
        input_name: &str,
        input: &[f64],
        output_name: &str,
        output: &mut [f64],
        iterations: usize,
    ) -> Result<()> {
        let n = input.len();
        self.run(n, &[(input_name, input)], &mut [(output_name, output)], &[], iterations)
    }

    /// Run with the configured iteration budget, the circuit's `.input` and
    /// the circuit's `.output`.
    pub fn process(&mut self, input: &[f64], output: &mut [f64]) -> Result<()> {
        let output_name = self
            .default_output
            .clone()
            .ok_or(TubesimError::MissingOutput)?;
        let n = output.len();
        let iterations = self.iterations;
        match self.default_input.clone() {
            Some(input_name) => self.run(
                n,
                &[(input_name.as_str(), input)],
                &mut [(output_name.as_str(), output)],
                &[],
                iterations,
            ),
            None => self.run(n, &[], &mut [(output_name.as_str(), output)], &[], iterations),
        }
    }

    /// Bind a parameter until it is rebound or reset.
    pub fn set_parameter(&mut self, name: &str, value: f64) -> Result<()> {
        let i = self.parameter_slot(name)?;
        self.bind(i, value);
        Ok(())
    }

    fn parameter_slot(&self, name: &str) -> Result<usize> {
        self.parameter_index
            .get(name)
            .copied()
            .ok_or_else(|| TubesimError::UnknownParameter {
                name: name.to_string(),
            })
    }

    fn bind(&mut self, i: usize, value: f64) {
        self.parameters[i] = value;
        self.workspace.set_parameter(i, value);
    }

    /// Current value of a parameter.
    pub fn parameter(&self, name: &str) -> Option<f64> {
        self.parameter_index.get(name).map(|&i| self.parameters[i])
    }

    /// Restore every parameter to its declared default.
    pub fn reset_parameters(&mut self) {
        for (i, p) in self.solution.parameters().iter().enumerate() {
            self.parameters[i] = p.default;
            self.workspace.set_parameter(i, p.default);
        }
    }

    /// Zero the history and return to sample 0. Parameters are kept.
    pub fn reset(&mut self) {
        self.workspace.clear_history();
        self.last_inputs.fill(0.0);
        self.at = 0;
        self.state = SimulationState::Fresh;
        debug!("simulation reset");
    }

    /// Latest value of an unknown or input.
    pub fn value(&self, name: &str) -> Option<f64> {
        if let Some(&i) = self.unknown_index.get(name) {
            return Some(self.workspace.previous_unknown(i));
        }
        self.input_index.get(name).map(|&i| self.workspace.input(i))
    }

    /// Output samples produced since the last reset.
    pub fn at(&self) -> u64 {
        self.at
    }

    /// Simulated time of the next output sample.
    pub fn time(&self) -> f64 {
        self.at as f64 * self.timestep()
    }

    /// Output sample rate.
    pub fn sample_rate(&self) -> f64 {
        self.solution.sample_rate() / self.oversample as f64
    }

    /// Output sample period.
    pub fn timestep(&self) -> f64 {
        1.0 / self.sample_rate()
    }

    pub fn oversample(&self) -> usize {
        self.oversample
    }

    /// Configured default iteration budget.
    pub fn iterations(&self) -> usize {
        self.iterations
    }

    pub fn state(&self) -> SimulationState {
        self.state
    }

    pub fn solution(&self) -> &Arc<TransientSolution> {
        &self.solution
    }

    pub fn compiled(&self) -> &CompiledStep {
        &self.step
    }

    /// Name of the circuit's `.input`, when built from a circuit.
    pub fn default_input(&self) -> Option<&str> {
        self.default_input.as_deref()
    }

    /// Unknown observed by the circuit's `.output`, when built from a circuit.
    pub fn default_output(&self) -> Option<&str> {
        self.default_output.as_deref()
    }
}

fn index_by_name<'a>(names: impl Iterator<Item = &'a str>) -> HashMap<String, usize> {
    names.enumerate().map(|(i, n)| (n.to_string(), i)).collect()
}

fn check_length(name: &str, found: usize, expected: usize) -> Result<()> {
    if found != expected {
        return Err(TubesimError::BufferLengthMismatch {
            name: name.to_string(),
            expected,
            found,
        });
    }
    Ok(())
}
