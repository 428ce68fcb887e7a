//! Direct numeric evaluation of expression trees.
//!
//! This walks the tree and is only used off the audio path: pivot selection
//! during solving, tests, and diagnostics. Per-sample evaluation goes through
//! the compiler.

use super::{Expr, Symbol};

impl Expr {
    /// Evaluate with symbol values supplied by `lookup`.
    ///
    /// Returns `None` if a symbol is unbound or the tree contains an unknown
    /// function, derivative or integral.
    pub fn evaluate<F: Fn(&Symbol) -> Option<f64>>(&self, lookup: &F) -> Option<f64> {
        let value = match self {
            Expr::Constant(v) => *v,
            Expr::Symbol(s) => lookup(s)?,
            Expr::Sum(terms) => {
                let mut acc = 0.0;
                for term in terms.iter() {
                    acc += term.evaluate(lookup)?;
                }
                acc
            }
            Expr::Product(factors) => {
                let mut acc = 1.0;
                for factor in factors.iter() {
                    acc *= factor.evaluate(lookup)?;
                }
                acc
            }
            Expr::Power(base, exponent) => base.evaluate(lookup)?.powf(exponent.evaluate(lookup)?),
            Expr::Call(function, args) => {
                let values = args
                    .iter()
                    .map(|a| a.evaluate(lookup))
                    .collect::<Option<Vec<f64>>>()?;
                if values.len() != function.arity() {
                    return None;
                }
                function.apply(&values)
            }
            Expr::Compare(op, a, b) => {
                if op.apply(a.evaluate(lookup)?, b.evaluate(lookup)?) {
                    1.0
                } else {
                    0.0
                }
            }
            Expr::If(c, a, b) => {
                if c.evaluate(lookup)? != 0.0 {
                    a.evaluate(lookup)?
                } else {
                    b.evaluate(lookup)?
                }
            }
            Expr::Apply(..) | Expr::Derivative(..) | Expr::Integral(..) => return None,
        };
        Some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Comparison;

    #[test]
    fn test_evaluate_with_bindings() {
        let e = Expr::variable("a") * 2.0 + Expr::exp(Expr::ZERO);
        let value = e.evaluate(&|s: &Symbol| (s.name() == "a").then_some(3.0));
        assert_eq!(value, Some(7.0));
    }

    #[test]
    fn test_unbound_symbol_is_none() {
        let e = Expr::variable("a") + 1.0;
        assert_eq!(e.evaluate(&|_: &Symbol| None), None);
    }

    #[test]
    fn test_select_takes_one_branch() {
        let x = Expr::variable("x");
        let e = Expr::select(
            Expr::compare(Comparison::Ge, x.clone(), Expr::ZERO),
            x.clone(),
            -x,
        );
        assert_eq!(e.evaluate(&|_: &Symbol| Some(-4.0)), Some(4.0));
    }
}
