//! Algebraic domains of expression values.

use super::{Expr, Function};

/// The set an expression's value is known to belong to.
///
/// Domains are ordered by inclusion: booleans are integers are reals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Domain {
    Boolean,
    Integer,
    Real,
}

impl Domain {
    /// The narrowest domain known to contain `expr`.
    pub fn of(expr: &Expr) -> Domain {
        match expr {
            Expr::Compare(..) => Domain::Boolean,
            Expr::Constant(v) if *v == 0.0 || *v == 1.0 => Domain::Boolean,
            Expr::Constant(v) if v.fract() == 0.0 => Domain::Integer,
            Expr::Call(Function::Floor | Function::Ceiling | Function::Round | Function::Sign, _) => {
                Domain::Integer
            }
            Expr::If(_, a, b) => Domain::of(a).max(Domain::of(b)),
            _ => Domain::Real,
        }
    }

    pub fn contains(self, expr: &Expr) -> bool {
        Domain::of(expr) <= self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Comparison;

    #[test]
    fn test_domain_inclusion() {
        let cmp = Expr::compare(Comparison::Lt, Expr::variable("x"), Expr::ONE);
        assert_eq!(Domain::of(&cmp), Domain::Boolean);
        assert!(Domain::Integer.contains(&cmp));
        assert!(Domain::Integer.contains(&Expr::constant(-3.0)));
        assert!(!Domain::Integer.contains(&Expr::constant(0.5)));
        assert!(Domain::Real.contains(&Expr::variable("x")));
        assert!(!Domain::Boolean.contains(&Expr::variable("x")));
    }
}
