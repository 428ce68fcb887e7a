//! Symbolic partition of the discretized system.
//!
//! Unknowns whose residual partials are all free of unknowns are eliminated
//! by Gaussian elimination on expressions; pivots are chosen by magnitude at
//! nominal parameter values. What remains is the nonlinear residual for
//! Newton's method, with every eliminated unknown substituted away.

use std::collections::{HashMap, HashSet};

use log::{debug, trace};

use super::transient::Assignment;
use crate::error::{Result, TubesimError};
use crate::expr::{Expr, Symbol};

/// Result of [`partition`].
pub(crate) struct Partition {
    /// Direct assignments in evaluation order.
    pub assignments: Vec<Assignment>,
    /// Unknowns left for Newton's method.
    pub nonlinear: Vec<Symbol>,
    /// Residuals (`== 0`) in `nonlinear` only, one per unknown.
    pub residuals: Vec<Expr>,
}

/// Split `residuals` (each `== 0`) in `unknowns` into direct assignments and
/// a nonlinear residual system.
///
/// `nominal` gives values used to rank pivot candidates; symbols it does not
/// know make a coefficient unrankable, not unusable.
pub(crate) fn partition<F>(unknowns: &[Symbol], residuals: Vec<Expr>, nominal: &F) -> Result<Partition>
where
    F: Fn(&Symbol) -> Option<f64>,
{
    if residuals.len() != unknowns.len() {
        return Err(TubesimError::singular(format!(
            "{} equations for {} unknowns after discretization",
            residuals.len(),
            unknowns.len()
        )));
    }

    let is_unknown = |s: &Symbol| unknowns.contains(s);

    // An unknown is nonlinear when some partial derivative with respect to
    // it still depends on an unknown.
    let mut nonlinear: HashSet<&Symbol> = HashSet::new();
    let mut linear_rows = Vec::new();
    let mut nonlinear_rows = Vec::new();
    for r in residuals {
        let mut row_linear = true;
        for u in unknowns.iter().filter(|u| r.contains(u)) {
            if r.diff(u).depends_on(&is_unknown) {
                nonlinear.insert(u);
                row_linear = false;
            }
        }
        if row_linear {
            linear_rows.push(r);
        } else {
            nonlinear_rows.push(r);
        }
    }

    let mut pivoted: Vec<(Symbol, Expr)> = Vec::new();
    let mut unpivoted: HashSet<&Symbol> = HashSet::new();
    for u in unknowns.iter().filter(|u| !nonlinear.contains(u)) {
        let Some(row) = select_pivot(&linear_rows, u, nominal) else {
            unpivoted.insert(u);
            continue;
        };
        let row = linear_rows.remove(row);
        let a = row.diff(u);
        let rest = row.substitute(&[(u.clone(), Expr::ZERO)].into());
        let value = -rest / a;
        trace!("{} = {}", u, value);

        let binding: HashMap<Symbol, Expr> = [(u.clone(), value.clone())].into();
        for r in linear_rows.iter_mut().filter(|r| r.contains(u)) {
            *r = r.substitute(&binding);
        }
        pivoted.push((u.clone(), value));
    }

    // Whatever linear rows are left constrain unpivoted unknowns only.
    for r in linear_rows {
        if unknowns.iter().all(|u| r.diff(u).is_zero()) {
            return Err(TubesimError::singular(format!(
                "equation reduces to {} == 0",
                r
            )));
        }
        nonlinear_rows.push(r);
    }

    let residuals: Vec<Expr> = nonlinear_rows
        .into_iter()
        .map(|mut r| {
            for (u, value) in &pivoted {
                if r.contains(u) {
                    r = r.substitute(&[(u.clone(), value.clone())].into());
                }
            }
            r
        })
        .collect();

    let nonlinear: Vec<Symbol> = unknowns
        .iter()
        .filter(|u| nonlinear.contains(u) || unpivoted.contains(u))
        .cloned()
        .collect();
    if residuals.len() != nonlinear.len() {
        return Err(TubesimError::singular(format!(
            "{} residual equations for {} iterated unknowns",
            residuals.len(),
            nonlinear.len()
        )));
    }
    debug!(
        "eliminated {} unknowns, {} left for Newton iteration",
        pivoted.len(),
        nonlinear.len()
    );

    let assignments = pivoted
        .into_iter()
        .rev()
        .map(|(unknown, value)| Assignment { unknown, value })
        .collect();
    Ok(Partition {
        assignments,
        nonlinear,
        residuals,
    })
}

/// Row with the largest nominal coefficient of `u`.
fn select_pivot<F>(rows: &[Expr], u: &Symbol, nominal: &F) -> Option<usize>
where
    F: Fn(&Symbol) -> Option<f64>,
{
    let mut best: Option<(usize, f64)> = None;
    for (i, r) in rows.iter().enumerate().filter(|(_, r)| r.contains(u)) {
        let a = r.diff(u);
        if a.is_zero() {
            continue;
        }
        let score = match a.evaluate(nominal) {
            Some(v) if v == 0.0 => continue,
            Some(v) if v.is_finite() => v.abs(),
            _ => 0.0,
        };
        if best.map_or(true, |(_, s)| score > s) {
            best = Some((i, score));
        }
    }
    best.map(|(i, _)| i)
}
