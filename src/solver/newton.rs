//! Newton-Raphson iteration for the nonlinear part of a transient solution.
//!
//! The residual `F(x) = 0` and its Jacobian `J = ∂F/∂x` are derived here
//! symbolically, once. Each sample the compiled step then iterates
//!
//! ```text
//! x ← x[t0]
//! repeat up to the iteration budget:
//!     solve J(x) Δ = F(x)
//!     x ← x - Δ
//!     stop when max |Δ| < tolerance
//! ```

use crate::expr::{Expr, Symbol};

/// A nonlinear system in some of the unknowns, with its Jacobian.
#[derive(Debug, Clone)]
pub struct NewtonIteration {
    unknowns: Vec<Symbol>,
    residuals: Vec<Expr>,
    jacobian: Vec<Vec<Expr>>,
}

impl NewtonIteration {
    /// Build the iteration for `residuals == 0` in `unknowns`.
    pub fn new(unknowns: Vec<Symbol>, residuals: Vec<Expr>) -> Self {
        let jacobian = residuals
            .iter()
            .map(|r| unknowns.iter().map(|u| r.diff(u)).collect())
            .collect();
        Self {
            unknowns,
            residuals,
            jacobian,
        }
    }

    pub fn unknowns(&self) -> &[Symbol] {
        &self.unknowns
    }

    pub fn residuals(&self) -> &[Expr] {
        &self.residuals
    }

    /// `jacobian()[i][j] = ∂residuals[i] / ∂unknowns[j]`.
    pub fn jacobian(&self) -> &[Vec<Expr>] {
        &self.jacobian
    }

    /// Number of structurally nonzero Jacobian entries.
    pub fn nonzeros(&self) -> usize {
        self.jacobian
            .iter()
            .flatten()
            .filter(|e| !e.is_zero())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_jacobian_entries() {
        // F = [x*y - 2, x + y^2]
        let (x, y) = (Expr::variable("x"), Expr::variable("y"));
        let residuals = vec![
            x.clone() * y.clone() - 2.0,
            x.clone() + Expr::pow(y.clone(), Expr::constant(2.0)),
        ];
        let newton = NewtonIteration::new(vec![Symbol::new("x"), Symbol::new("y")], residuals);
        let j = newton.jacobian();
        assert_eq!(j[0][0], y.clone());
        assert_eq!(j[0][1], x);
        assert_eq!(j[1][0], Expr::ONE);
        assert_eq!(j[1][1], 2.0 * y);
        assert_eq!(newton.nonzeros(), 4);
    }

    #[test]
    fn test_iteration_converges_on_scalar_residual() {
        // exp(x) = 2 solved with the scheme the compiled step runs.
        let x = Expr::variable("x");
        let newton = NewtonIteration::new(vec![Symbol::new("x")], vec![Expr::exp(x) - 2.0]);
        let mut value = 0.0;
        for _ in 0..20 {
            let at = |_: &Symbol| Some(value);
            let f = newton.residuals()[0].evaluate(&at).unwrap();
            let df = newton.jacobian()[0][0].evaluate(&at).unwrap();
            value -= f / df;
        }
        assert_relative_eq!(value, 2f64.ln(), epsilon = 1e-12);
    }
}
