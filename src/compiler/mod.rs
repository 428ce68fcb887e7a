//! Native step compiler.
//!
//! Lowers a [`TransientSolution`] into a flat register program that advances
//! the circuit by one sample. The program is interpreted over a [`Workspace`]
//! of `f64` registers laid out as:
//!
//! ```text
//! | unknowns[t0] | inputs | inputs[t0] | parameters | t0 | unknowns | constants | temporaries |
//! ```
//!
//! The caller fills in inputs, parameters and `t0`, calls
//! [`CompiledStep::step`], reads the current unknowns and then
//! [`Workspace::advance`]s the history.
//!
//! Nonlinear unknowns are solved inside a [`Block::Newton`]: operations that
//! do not depend on the iterated unknowns are hoisted out of the loop.

mod codegen;
mod lu;

pub use lu::DenseLu;

use std::collections::HashMap;

use log::debug;

use crate::error::Result;
use crate::expr::{Comparison, Function, Symbol};
use crate::solver::{SolutionSet, TransientSolution};
use codegen::CodeGen;

/// Register index.
pub type Reg = usize;

/// One register operation; the first register is the destination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Op {
    Add(Reg, Reg, Reg),
    Sub(Reg, Reg, Reg),
    Mul(Reg, Reg, Reg),
    Div(Reg, Reg, Reg),
    Neg(Reg, Reg),
    Powi(Reg, Reg, i32),
    Powf(Reg, Reg, Reg),
    Call1(Function, Reg, Reg),
    Call2(Function, Reg, Reg, Reg),
    Cmp(Comparison, Reg, Reg, Reg),
    /// `dst = if cond != 0 { a } else { b }`
    Select(Reg, Reg, Reg, Reg),
    Copy(Reg, Reg),
}

impl Op {
    #[inline]
    fn execute(&self, r: &mut [f64]) {
        match *self {
            Op::Add(d, a, b) => r[d] = r[a] + r[b],
            Op::Sub(d, a, b) => r[d] = r[a] - r[b],
            Op::Mul(d, a, b) => r[d] = r[a] * r[b],
            Op::Div(d, a, b) => r[d] = r[a] / r[b],
            Op::Neg(d, a) => r[d] = -r[a],
            Op::Powi(d, a, n) => r[d] = r[a].powi(n),
            Op::Powf(d, a, b) => r[d] = r[a].powf(r[b]),
            Op::Call1(f, d, a) => r[d] = f.apply(&[r[a]]),
            Op::Call2(f, d, a, b) => r[d] = f.apply(&[r[a], r[b]]),
            Op::Cmp(op, d, a, b) => r[d] = if op.apply(r[a], r[b]) { 1.0 } else { 0.0 },
            Op::Select(d, c, a, b) => r[d] = if r[c] != 0.0 { r[a] } else { r[b] },
            Op::Copy(d, a) => r[d] = r[a],
        }
    }
}

/// A segment of the step program.
#[derive(Debug, Clone)]
pub enum Block {
    Straight(Vec<Op>),
    Newton {
        /// `(current, previous)` register of each iterated unknown.
        unknowns: Vec<(Reg, Reg)>,
        body: Vec<Op>,
        residuals: Vec<Reg>,
        /// `(row, column, register)` of each nonzero Jacobian entry.
        jacobian: Vec<(usize, usize, Reg)>,
    },
}

/// Offsets of the fixed register groups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Layout {
    unknowns: usize,
    inputs: usize,
    parameters: usize,
}

impl Layout {
    pub fn previous_unknown(&self, i: usize) -> Reg {
        i
    }

    pub fn input(&self, i: usize) -> Reg {
        self.unknowns + i
    }

    pub fn previous_input(&self, i: usize) -> Reg {
        self.unknowns + self.inputs + i
    }

    pub fn parameter(&self, i: usize) -> Reg {
        self.unknowns + 2 * self.inputs + i
    }

    pub fn prev_time(&self) -> Reg {
        self.unknowns + 2 * self.inputs + self.parameters
    }

    pub fn unknown(&self, i: usize) -> Reg {
        self.prev_time() + 1 + i
    }

    /// First register after the fixed groups.
    fn end(&self) -> Reg {
        self.unknown(self.unknowns)
    }
}

/// Register state of one simulation.
#[derive(Debug, Clone)]
pub struct Workspace {
    layout: Layout,
    regs: Vec<f64>,
    jacobian: Vec<f64>,
    residual: Vec<f64>,
    delta: Vec<f64>,
    lu: DenseLu,
}

impl Workspace {
    pub fn set_input(&mut self, i: usize, value: f64) {
        self.regs[self.layout.input(i)] = value;
    }

    pub fn set_previous_input(&mut self, i: usize, value: f64) {
        self.regs[self.layout.previous_input(i)] = value;
    }

    pub fn set_parameter(&mut self, i: usize, value: f64) {
        self.regs[self.layout.parameter(i)] = value;
    }

    pub fn set_prev_time(&mut self, t0: f64) {
        self.regs[self.layout.prev_time()] = t0;
    }

    /// Current value of unknown `i`.
    pub fn unknown(&self, i: usize) -> f64 {
        self.regs[self.layout.unknown(i)]
    }

    pub fn previous_unknown(&self, i: usize) -> f64 {
        self.regs[self.layout.previous_unknown(i)]
    }

    pub fn input(&self, i: usize) -> f64 {
        self.regs[self.layout.input(i)]
    }

    /// Shift current unknowns and inputs into history.
    pub fn advance(&mut self) {
        let l = self.layout;
        self.regs
            .copy_within(l.unknown(0)..l.unknown(l.unknowns), l.previous_unknown(0));
        self.regs
            .copy_within(l.input(0)..l.input(l.inputs), l.previous_input(0));
    }

    /// Zero all unknowns and input history.
    pub fn clear_history(&mut self) {
        let l = self.layout;
        self.regs[..l.parameter(0)].fill(0.0);
        self.regs[l.unknown(0)..l.end()].fill(0.0);
    }
}

/// Executable per-sample program of a transient solution.
#[derive(Debug, Clone)]
pub struct CompiledStep {
    layout: Layout,
    unknowns: Vec<Symbol>,
    inputs: Vec<Symbol>,
    parameters: Vec<Symbol>,
    blocks: Vec<Block>,
    constants: Vec<(Reg, f64)>,
    register_count: usize,
    newton_size: usize,
    tolerance: f64,
}

impl CompiledStep {
    /// Compile `solution`. Newton iteration stops once every correction is
    /// below `tolerance`.
    pub fn compile(solution: &TransientSolution, tolerance: f64) -> Result<Self> {
        let unknowns = solution.unknowns().to_vec();
        let inputs = solution.inputs().to_vec();
        let parameters: Vec<Symbol> = solution
            .parameters()
            .iter()
            .map(|p| p.symbol.clone())
            .collect();
        let layout = Layout {
            unknowns: unknowns.len(),
            inputs: inputs.len(),
            parameters: parameters.len(),
        };

        let mut symbols: HashMap<Symbol, Reg> = HashMap::new();
        for (i, u) in unknowns.iter().enumerate() {
            symbols.insert(u.current(), layout.unknown(i));
            symbols.insert(u.previous(), layout.previous_unknown(i));
        }
        for (i, x) in inputs.iter().enumerate() {
            symbols.insert(x.current(), layout.input(i));
            symbols.insert(x.previous(), layout.previous_input(i));
        }
        for (i, p) in parameters.iter().enumerate() {
            symbols.insert(p.clone(), layout.parameter(i));
        }
        symbols.insert(solution.prev_time().clone(), layout.prev_time());

        let index: HashMap<&Symbol, usize> =
            unknowns.iter().enumerate().map(|(i, u)| (u, i)).collect();
        let reg_of = |u: &Symbol| index.get(u).map(|&i| layout.unknown(i));

        let mut cg = CodeGen::new(symbols, layout.end());
        let mut newton_size = 0;
        for set in solution.solutions() {
            match set {
                SolutionSet::Newton(newton) => {
                    let regs: Vec<(Reg, Reg)> = newton
                        .unknowns()
                        .iter()
                        .filter_map(|u| index.get(u).copied())
                        .map(|i| (layout.unknown(i), layout.previous_unknown(i)))
                        .collect();
                    let current: Vec<Reg> = regs.iter().map(|&(c, _)| c).collect();

                    cg.open_newton(&current);
                    let residuals = newton
                        .residuals()
                        .iter()
                        .map(|r| cg.emit(r))
                        .collect::<Result<Vec<_>>>()?;
                    let mut jacobian = Vec::new();
                    for (i, row) in newton.jacobian().iter().enumerate() {
                        for (j, entry) in row.iter().enumerate() {
                            if !entry.is_zero() {
                                jacobian.push((i, j, cg.emit(entry)?));
                            }
                        }
                    }
                    let body = cg.close_newton();

                    newton_size = newton_size.max(regs.len());
                    cg.blocks.push(Block::Newton {
                        unknowns: regs,
                        body,
                        residuals,
                        jacobian,
                    });
                }
                SolutionSet::Linear(assignments) => {
                    for a in assignments {
                        let value = cg.emit(&a.value)?;
                        if let Some(dst) = reg_of(&a.unknown) {
                            cg.copy(dst, value);
                        }
                    }
                    cg.flush();
                }
            }
        }
        cg.flush();

        let step = Self {
            layout,
            unknowns,
            inputs,
            parameters,
            constants: cg.constants().to_vec(),
            register_count: cg.register_count(),
            blocks: cg.blocks,
            newton_size,
            tolerance,
        };
        debug!(
            "compiled step: {} registers, {} operations, newton size {}",
            step.register_count,
            step.op_count(),
            step.newton_size
        );
        Ok(step)
    }

    /// A fresh workspace: zero history and inputs, parameters unset.
    pub fn workspace(&self) -> Workspace {
        let mut regs = vec![0.0; self.register_count];
        for &(reg, value) in &self.constants {
            regs[reg] = value;
        }
        let n = self.newton_size;
        Workspace {
            layout: self.layout,
            regs,
            jacobian: vec![0.0; n * n],
            residual: vec![0.0; n],
            delta: vec![0.0; n],
            lu: DenseLu::new(n),
        }
    }

    /// Advance `ws` by one sample. Newton blocks run at most `iterations`
    /// corrections; a singular Jacobian ends the iteration early with the
    /// best estimate so far.
    pub fn step(&self, ws: &mut Workspace, iterations: usize) {
        for block in &self.blocks {
            match block {
                Block::Straight(ops) => {
                    for op in ops {
                        op.execute(&mut ws.regs);
                    }
                }
                Block::Newton {
                    unknowns,
                    body,
                    residuals,
                    jacobian,
                } => self.newton(ws, iterations, unknowns, body, residuals, jacobian),
            }
        }
    }

    fn newton(
        &self,
        ws: &mut Workspace,
        iterations: usize,
        unknowns: &[(Reg, Reg)],
        body: &[Op],
        residuals: &[Reg],
        jacobian: &[(usize, usize, Reg)],
    ) {
        let n = unknowns.len();
        for &(current, previous) in unknowns {
            ws.regs[current] = ws.regs[previous];
        }
        let jac = &mut ws.jacobian[..n * n];
        jac.fill(0.0);
        if ws.lu.size() != n {
            ws.lu = DenseLu::new(n);
        }

        for _ in 0..iterations {
            for op in body {
                op.execute(&mut ws.regs);
            }
            for (i, &r) in residuals.iter().enumerate() {
                ws.residual[i] = ws.regs[r];
            }
            for &(i, j, r) in jacobian {
                jac[i * n + j] = ws.regs[r];
            }
            if ws.lu.factor(jac).is_err() {
                break;
            }
            ws.lu.solve(&ws.residual[..n], &mut ws.delta[..n]);

            let mut max_delta = 0.0f64;
            for (&(current, _), &d) in unknowns.iter().zip(&ws.delta[..n]) {
                ws.regs[current] -= d;
                max_delta = max_delta.max(d.abs());
            }
            if max_delta < self.tolerance {
                break;
            }
        }
    }

    pub fn layout(&self) -> Layout {
        self.layout
    }

    pub fn unknowns(&self) -> &[Symbol] {
        &self.unknowns
    }

    pub fn inputs(&self) -> &[Symbol] {
        &self.inputs
    }

    pub fn parameters(&self) -> &[Symbol] {
        &self.parameters
    }

    pub fn blocks(&self) -> &[Block] {
        &self.blocks
    }

    pub fn has_newton(&self) -> bool {
        self.newton_size > 0
    }

    /// Total number of operations in the program.
    pub fn op_count(&self) -> usize {
        self.blocks
            .iter()
            .map(|b| match b {
                Block::Straight(ops) => ops.len(),
                Block::Newton { body, .. } => body.len(),
            })
            .sum()
    }
}
