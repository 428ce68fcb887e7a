//! Canonicalizing constructors and arithmetic operators.

use std::collections::BTreeMap;
use std::ops::{Add, Div, Mul, Neg, Sub};
use std::sync::Arc;

use super::{Comparison, Expr, Function, Symbol};

impl Expr {
    pub fn constant(value: f64) -> Expr {
        // Normalize -0.0 so that structural equality matches numeric equality.
        Expr::Constant(if value == 0.0 { 0.0 } else { value })
    }

    pub fn symbol(symbol: Symbol) -> Expr {
        Expr::Symbol(symbol)
    }

    /// Shorthand for a current-sample symbol.
    pub fn variable(name: &str) -> Expr {
        Expr::Symbol(Symbol::new(name))
    }

    /// Sum of terms, flattened, with constants folded and like terms collected.
    pub fn sum<I: IntoIterator<Item = Expr>>(terms: I) -> Expr {
        let mut constant = 0.0;
        let mut like: BTreeMap<Expr, f64> = BTreeMap::new();
        let mut pending: Vec<Expr> = terms.into_iter().collect();
        pending.reverse();

        while let Some(term) = pending.pop() {
            match term {
                Expr::Constant(c) => constant += c,
                Expr::Sum(inner) => pending.extend(inner.iter().rev().cloned()),
                other => {
                    let (c, rest) = other.split_coefficient();
                    *like.entry(rest).or_insert(0.0) += c;
                }
            }
        }

        let mut out: Vec<Expr> = like
            .into_iter()
            .filter(|(_, c)| *c != 0.0)
            .map(|(rest, c)| Expr::scale(c, rest))
            .collect();
        if constant != 0.0 {
            out.push(Expr::constant(constant));
        }
        out.sort();

        match out.len() {
            0 => Expr::ZERO,
            1 => out.swap_remove(0),
            _ => Expr::Sum(out.into()),
        }
    }

    /// Product of factors, flattened, with constants folded and powers of a
    /// common base merged.
    pub fn product<I: IntoIterator<Item = Expr>>(factors: I) -> Expr {
        let mut coefficient = 1.0;
        let mut powers: BTreeMap<Expr, Vec<Expr>> = BTreeMap::new();
        let mut pending: Vec<Expr> = factors.into_iter().collect();
        pending.reverse();

        while let Some(factor) = pending.pop() {
            match factor {
                Expr::Constant(c) => coefficient *= c,
                Expr::Product(inner) => pending.extend(inner.iter().rev().cloned()),
                Expr::Power(base, exponent) => powers
                    .entry(base.as_ref().clone())
                    .or_default()
                    .push(exponent.as_ref().clone()),
                other => powers.entry(other).or_default().push(Expr::ONE),
            }
        }
        if coefficient == 0.0 {
            return Expr::ZERO;
        }

        let mut out = Vec::with_capacity(powers.len() + 1);
        for (base, exponents) in powers {
            match Expr::pow(base, Expr::sum(exponents)) {
                Expr::Constant(c) => coefficient *= c,
                Expr::Product(inner) => {
                    for f in inner.iter() {
                        match f.as_constant() {
                            Some(c) => coefficient *= c,
                            None => out.push(f.clone()),
                        }
                    }
                }
                other => out.push(other),
            }
        }
        if coefficient == 0.0 {
            return Expr::ZERO;
        }
        out.sort();
        if coefficient != 1.0 {
            out.insert(0, Expr::constant(coefficient));
        }

        match out.len() {
            0 => Expr::ONE,
            1 => out.swap_remove(0),
            _ => Expr::Product(out.into()),
        }
    }

    /// `base ^ exponent`.
    pub fn pow(base: Expr, exponent: Expr) -> Expr {
        match (base.as_constant(), exponent.as_constant()) {
            (Some(b), Some(e)) => return Expr::constant(b.powf(e)),
            (_, Some(e)) if e == 0.0 => return Expr::ONE,
            (_, Some(e)) if e == 1.0 => return base,
            (Some(b), _) if b == 1.0 => return Expr::ONE,
            _ => {}
        }

        if exponent.as_constant().is_some_and(|e| e.fract() == 0.0) {
            match &base {
                Expr::Power(inner, inner_exponent) => {
                    return Expr::pow(
                        inner.as_ref().clone(),
                        Expr::product([inner_exponent.as_ref().clone(), exponent]),
                    );
                }
                Expr::Product(factors) => {
                    return Expr::product(
                        factors
                            .iter()
                            .map(|f| Expr::pow(f.clone(), exponent.clone())),
                    );
                }
                _ => {}
            }
        }

        Expr::Power(Arc::new(base), Arc::new(exponent))
    }

    pub fn sqrt(x: Expr) -> Expr {
        Expr::call(Function::Sqrt, vec![x])
    }

    pub fn exp(x: Expr) -> Expr {
        Expr::call(Function::Exp, vec![x])
    }

    /// Apply a built-in function; folds when every argument is constant.
    pub fn call(function: Function, args: Vec<Expr>) -> Expr {
        if function == Function::Pow && args.len() == 2 {
            let mut args = args;
            let exponent = args.swap_remove(1);
            let base = args.swap_remove(0);
            return Expr::pow(base, exponent);
        }
        if args.len() == function.arity() {
            let values: Option<Vec<f64>> = args.iter().map(Expr::as_constant).collect();
            if let Some(values) = values {
                return Expr::constant(function.apply(&values));
            }
        }
        Expr::Call(function, args.into())
    }

    /// Application of a function that is not built in. Kept symbolic; the
    /// compiler rejects it.
    pub fn apply(name: &str, args: Vec<Expr>) -> Expr {
        Expr::Apply(Arc::from(name), args.into())
    }

    pub fn compare(op: Comparison, a: Expr, b: Expr) -> Expr {
        if let (Some(x), Some(y)) = (a.as_constant(), b.as_constant()) {
            return Expr::constant(if op.apply(x, y) { 1.0 } else { 0.0 });
        }
        Expr::Compare(op, Arc::new(a), Arc::new(b))
    }

    /// `if(condition, then, otherwise)`.
    pub fn select(condition: Expr, then: Expr, otherwise: Expr) -> Expr {
        if let Some(c) = condition.as_constant() {
            return if c != 0.0 { then } else { otherwise };
        }
        if then == otherwise {
            return then;
        }
        Expr::If(Arc::new(condition), Arc::new(then), Arc::new(otherwise))
    }

    /// Time derivative `D(x, t)`.
    pub fn derivative(x: Expr, t: &Symbol) -> Expr {
        if x.as_constant().is_some() {
            return Expr::ZERO;
        }
        Expr::Derivative(Arc::new(x), t.clone())
    }

    /// Running integral of `x` over `t`.
    pub fn integral(x: Expr, t: &Symbol) -> Expr {
        Expr::Integral(Arc::new(x), t.clone())
    }

    /// Split a leading numeric coefficient: `3*x*y` → `(3, x*y)`.
    pub(crate) fn split_coefficient(self) -> (f64, Expr) {
        if let Expr::Product(factors) = &self {
            if let Some(c) = factors.first().and_then(Expr::as_constant) {
                let rest = &factors[1..];
                let rest = if rest.len() == 1 {
                    rest[0].clone()
                } else {
                    Expr::Product(rest.into())
                };
                return (c, rest);
            }
        }
        if let Expr::Constant(c) = self {
            return (c, Expr::ONE);
        }
        (1.0, self)
    }

    /// `c * rest` without re-canonicalizing `rest`.
    pub(crate) fn scale(c: f64, rest: Expr) -> Expr {
        if c == 1.0 {
            return rest;
        }
        match rest {
            Expr::Constant(v) => Expr::constant(c * v),
            Expr::Product(factors) => {
                let mut out = Vec::with_capacity(factors.len() + 1);
                out.push(Expr::constant(c));
                out.extend(factors.iter().cloned());
                Expr::Product(out.into())
            }
            other => Expr::Product(vec![Expr::constant(c), other].into()),
        }
    }
}

impl Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::product([Expr::constant(-1.0), self])
    }
}

impl Neg for &Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        -self.clone()
    }
}

macro_rules! binary_op {
    ($trait:ident, $method:ident, |$a:ident, $b:ident| $body:expr) => {
        impl $trait<Expr> for Expr {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                let ($a, $b) = (self, rhs);
                $body
            }
        }

        impl $trait<&Expr> for &Expr {
            type Output = Expr;
            fn $method(self, rhs: &Expr) -> Expr {
                let ($a, $b) = (self.clone(), rhs.clone());
                $body
            }
        }

        impl $trait<f64> for Expr {
            type Output = Expr;
            fn $method(self, rhs: f64) -> Expr {
                let ($a, $b) = (self, Expr::constant(rhs));
                $body
            }
        }

        impl $trait<Expr> for f64 {
            type Output = Expr;
            fn $method(self, rhs: Expr) -> Expr {
                let ($a, $b) = (Expr::constant(self), rhs);
                $body
            }
        }
    };
}

binary_op!(Add, add, |a, b| Expr::sum([a, b]));
binary_op!(Sub, sub, |a, b| Expr::sum([a, -b]));
binary_op!(Mul, mul, |a, b| Expr::product([a, b]));
binary_op!(Div, div, |a, b| Expr::product([a, Expr::pow(b, Expr::constant(-1.0))]));

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::variable("x")
    }

    fn y() -> Expr {
        Expr::variable("y")
    }

    #[test]
    fn test_constant_folding() {
        assert_eq!(Expr::constant(2.0) + 3.0, Expr::constant(5.0));
        assert_eq!(Expr::constant(2.0) * 3.0, Expr::constant(6.0));
        assert_eq!(Expr::constant(-0.0), Expr::ZERO);
        assert_eq!(
            Expr::call(Function::Exp, vec![Expr::ZERO]),
            Expr::ONE
        );
    }

    #[test]
    fn test_like_terms_collect() {
        assert_eq!(2.0 * x() + 3.0 * x(), 5.0 * x());
        assert_eq!(x() - x(), Expr::ZERO);
        assert_eq!((x() + y()) - y(), x());
    }

    #[test]
    fn test_like_factors_collect() {
        assert_eq!(x() * x(), Expr::pow(x(), Expr::constant(2.0)));
        assert_eq!(x() / x(), Expr::ONE);
        assert_eq!((2.0 * x()) / 4.0, 0.5 * x());
    }

    #[test]
    fn test_integer_power_distributes_over_product() {
        let e = Expr::pow(2.0 * x(), Expr::constant(-1.0));
        assert_eq!(e, 0.5 * Expr::pow(x(), Expr::constant(-1.0)));
    }

    #[test]
    fn test_select_folds_constant_condition() {
        assert_eq!(Expr::select(Expr::ONE, x(), y()), x());
        assert_eq!(Expr::select(Expr::ZERO, x(), y()), y());
        assert_eq!(Expr::select(x(), y(), y()), y());
    }

    #[test]
    fn test_compare_folds() {
        assert_eq!(
            Expr::compare(Comparison::Lt, Expr::ONE, Expr::constant(2.0)),
            Expr::ONE
        );
    }
}
