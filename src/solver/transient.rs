//! Transient discretization.
//!
//! Turns the continuous-time system produced by the assembler into a
//! per-sample update law:
//!
//! 1. every `D(x, t)` becomes a new unknown `D[x]` tied to `x` by the
//!    trapezoidal rule `x - x[t0] = h/2 (D[x] + D[x][t0])`, and every running
//!    integral `I(x, t)` becomes an unknown `I[x]` with
//!    `I[x] = I[x][t0] + h/2 (x + x[t0])`;
//! 2. `t` is replaced by `t0 + h`;
//! 3. the now algebraic system is split into a linear part, solved once
//!    symbolically, and a nonlinear residual solved by Newton's method at run
//!    time (see [`linear`](super::linear) and [`newton`](super::newton)).
//!
//! The trapezoidal rule has local truncation error `O(h³)` and is A-stable,
//! so stable circuits stay stable at any sample rate.

use std::collections::{HashMap, HashSet};
use std::fmt;

use log::{debug, info};

use super::linear;
use super::mna::{CircuitEquations, Parameter};
use super::newton::NewtonIteration;
use crate::error::{Result, TubesimError};
use crate::expr::{Equation, Expr, Symbol, PREV_TIME, TIME};

/// `unknown = value`, evaluated once per sample.
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    pub unknown: Symbol,
    pub value: Expr,
}

/// One step of the per-sample update law.
#[derive(Debug, Clone)]
pub enum SolutionSet {
    /// Unknowns refined iteratively by Newton's method.
    Newton(NewtonIteration),
    /// Direct assignments, evaluated in order.
    Linear(Vec<Assignment>),
}

/// The finalized discrete-time update law of a circuit.
///
/// Immutable once built; expressions refer to the current value of each
/// unknown, its previous value (`x[t0]`), the current and previous input
/// values, parameters and `t0`.
#[derive(Debug, Clone)]
pub struct TransientSolution {
    time: Symbol,
    prev_time: Symbol,
    sample_rate: f64,
    unknowns: Vec<Symbol>,
    inputs: Vec<Symbol>,
    parameters: Vec<Parameter>,
    solutions: Vec<SolutionSet>,
}

impl TransientSolution {
    /// Discretize `system` at `sample_rate` and derive the update law.
    pub fn solve(system: &CircuitEquations, sample_rate: f64) -> Result<Self> {
        if !(sample_rate.is_finite() && sample_rate > 0.0) {
            return Err(TubesimError::InvalidSimulationParam {
                message: format!("sample rate must be positive, got {}", sample_rate),
            });
        }
        let h = 1.0 / sample_rate;

        let mut discretizer = Discretizer::new(system, h);
        let equations = discretizer.run();
        let unknowns = discretizer.unknowns;
        debug!(
            "discretized to {} equations in {} unknowns (h = {:e})",
            equations.len(),
            unknowns.len(),
            h
        );

        let defaults: HashMap<&Symbol, f64> = system
            .parameters
            .iter()
            .map(|p| (&p.symbol, p.default))
            .collect();
        let nominal = |s: &Symbol| Some(defaults.get(s).copied().unwrap_or(0.0));
        let residuals = equations.iter().map(Equation::residual).collect();
        let partition = linear::partition(&unknowns, residuals, &nominal)?;

        info!(
            "transient solution: {} linear unknowns, {} solved by Newton iteration",
            partition.assignments.len(),
            partition.nonlinear.len()
        );

        let mut solutions = Vec::new();
        if !partition.nonlinear.is_empty() {
            solutions.push(SolutionSet::Newton(NewtonIteration::new(
                partition.nonlinear,
                partition.residuals,
            )));
        }
        if !partition.assignments.is_empty() {
            solutions.push(SolutionSet::Linear(partition.assignments));
        }

        Ok(Self {
            time: TIME.clone(),
            prev_time: PREV_TIME.clone(),
            sample_rate,
            unknowns,
            inputs: system.inputs.clone(),
            parameters: system.parameters.clone(),
            solutions,
        })
    }

    /// The continuous time variable `t`.
    pub fn time(&self) -> &Symbol {
        &self.time
    }

    /// The previous-sample time `t0`.
    pub fn prev_time(&self) -> &Symbol {
        &self.prev_time
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    pub fn timestep(&self) -> f64 {
        1.0 / self.sample_rate
    }

    /// Every unknown with history, including the derivative and integral
    /// unknowns added by discretization.
    pub fn unknowns(&self) -> &[Symbol] {
        &self.unknowns
    }

    pub fn inputs(&self) -> &[Symbol] {
        &self.inputs
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn solutions(&self) -> &[SolutionSet] {
        &self.solutions
    }

    /// Unknowns solved by Newton's method.
    pub fn nonlinear_unknowns(&self) -> impl Iterator<Item = &Symbol> {
        self.solutions.iter().flat_map(|s| match s {
            SolutionSet::Newton(n) => n.unknowns().iter().collect::<Vec<_>>(),
            SolutionSet::Linear(_) => Vec::new(),
        })
    }

    /// Unknowns assigned directly.
    pub fn linear_unknowns(&self) -> impl Iterator<Item = &Symbol> {
        self.solutions.iter().flat_map(|s| match s {
            SolutionSet::Linear(a) => a.iter().map(|a| &a.unknown).collect::<Vec<_>>(),
            SolutionSet::Newton(_) => Vec::new(),
        })
    }
}

impl fmt::Display for TransientSolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "sample rate {} Hz", self.sample_rate)?;
        for set in &self.solutions {
            match set {
                SolutionSet::Newton(newton) => {
                    writeln!(f, "newton {{")?;
                    for (u, r) in newton.unknowns().iter().zip(newton.residuals()) {
                        writeln!(f, "  {}: {} == 0", u, r)?;
                    }
                    writeln!(f, "}}")?;
                }
                SolutionSet::Linear(assignments) => {
                    for a in assignments {
                        writeln!(f, "{} = {}", a.unknown, a.value)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Replaces derivatives and integrals by new unknowns tied to their history.
struct Discretizer<'a> {
    system: &'a CircuitEquations,
    h: f64,
    unknowns: Vec<Symbol>,
    names: HashSet<String>,
    replaced: HashMap<(bool, Expr), Symbol>,
    extra: Vec<Equation>,
}

impl<'a> Discretizer<'a> {
    fn new(system: &'a CircuitEquations, h: f64) -> Self {
        let names = system
            .unknowns
            .iter()
            .chain(&system.inputs)
            .chain(system.parameters.iter().map(|p| &p.symbol))
            .map(|s| s.name().to_string())
            .collect();
        Self {
            system,
            h,
            unknowns: system.unknowns.clone(),
            names,
            replaced: HashMap::new(),
            extra: Vec::new(),
        }
    }

    fn run(&mut self) -> Vec<Equation> {
        let system = self.system;
        let mut equations: Vec<Equation> = system
            .equations
            .iter()
            .map(|eq| Equation::new(self.eliminate(&eq.lhs), self.eliminate(&eq.rhs)))
            .collect();
        equations.append(&mut self.extra);

        let mut at_step = HashMap::new();
        at_step.insert(TIME.clone(), Expr::symbol(PREV_TIME.clone()) + self.h);
        equations
            .into_iter()
            .map(|eq| Equation::new(eq.lhs.substitute(&at_step), eq.rhs.substitute(&at_step)))
            .collect()
    }

    /// The value of `e` one sample earlier. Parameters have no history.
    fn previous(&self, e: &Expr) -> Expr {
        e.map_symbols(&mut |s| {
            if self.system.is_parameter(s) {
                Expr::symbol(s.clone())
            } else {
                Expr::symbol(s.previous())
            }
        })
    }

    fn eliminate(&mut self, e: &Expr) -> Expr {
        e.rewrite(&mut |sub| match sub {
            Expr::Derivative(x, t) if *t == *TIME => {
                let x = self.eliminate(x);
                Some(Expr::symbol(self.state_unknown(false, x)))
            }
            Expr::Integral(x, t) if *t == *TIME => {
                let x = self.eliminate(x);
                Some(Expr::symbol(self.state_unknown(true, x)))
            }
            _ => None,
        })
    }

    fn state_unknown(&mut self, integral: bool, x: Expr) -> Symbol {
        let key = (integral, x);
        if let Some(symbol) = self.replaced.get(&key) {
            return symbol.clone();
        }
        let (_, x) = &key;

        let mut name = format!("{}[{}]", if integral { "I" } else { "D" }, x);
        while self.names.contains(&name) {
            name.push('\'');
        }
        self.names.insert(name.clone());
        let u = Symbol::new(&name);
        self.unknowns.push(u.clone());

        let half_h = self.h / 2.0;
        let value = Expr::symbol(u.clone());
        let value0 = Expr::symbol(u.previous());
        let x0 = self.previous(x);
        let equation = if integral {
            Equation::new(value, value0 + half_h * (x.clone() + x0))
        } else {
            Equation::new(x - &x0, half_h * (value + value0))
        };
        debug!("discretized {}", equation);
        self.extra.push(equation);

        self.replaced.insert(key, u.clone());
        u
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn rc_system() -> CircuitEquations {
        // V[out] driven by Vin through R, capacitor C to ground:
        //   (Vin - V)/R = C dV/dt
        let v = Expr::variable("V[out]");
        let vin = Expr::variable("Vin");
        let r = 1e3;
        let c = 1e-6;
        CircuitEquations {
            unknowns: vec![Symbol::new("V[out]")],
            equations: vec![Equation::new(
                (vin - v.clone()) / r,
                c * Expr::derivative(v, &TIME),
            )],
            inputs: vec![Symbol::new("Vin")],
            parameters: Vec::new(),
        }
    }

    #[test]
    fn test_derivative_becomes_unknown() {
        let solution = TransientSolution::solve(&rc_system(), 48_000.0).unwrap();
        assert_eq!(solution.unknowns().len(), 2);
        assert_eq!(solution.unknowns()[1].name(), "D[V[out]]");
        // Both are linear: one assignment each, no Newton block.
        assert_eq!(solution.linear_unknowns().count(), 2);
        assert_eq!(solution.nonlinear_unknowns().count(), 0);
    }

    #[test]
    fn test_time_is_shifted() {
        let v = Expr::variable("x");
        let system = CircuitEquations {
            unknowns: vec![Symbol::new("x")],
            equations: vec![Equation::new(v, Expr::symbol(TIME.clone()))],
            inputs: Vec::new(),
            parameters: Vec::new(),
        };
        let solution = TransientSolution::solve(&system, 10.0).unwrap();
        match &solution.solutions()[0] {
            SolutionSet::Linear(a) => {
                let at = |s: &Symbol| (s == &*PREV_TIME).then_some(2.0);
                assert_relative_eq!(a[0].value.evaluate(&at).unwrap(), 2.1, epsilon = 1e-12);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_integral_is_accumulated() {
        // y = ∫ 1 dt
        let system = CircuitEquations {
            unknowns: vec![Symbol::new("y")],
            equations: vec![Equation::new(
                Expr::variable("y"),
                Expr::integral(Expr::ONE, &TIME),
            )],
            inputs: Vec::new(),
            parameters: Vec::new(),
        };
        let solution = TransientSolution::solve(&system, 4.0).unwrap();
        assert!(solution.unknowns().iter().any(|u| u.name() == "I[1]"));
    }

    #[test]
    fn test_rejects_bad_sample_rate() {
        assert!(TransientSolution::solve(&rc_system(), 0.0).is_err());
        assert!(TransientSolution::solve(&rc_system(), f64::NAN).is_err());
    }
}
