//! Traversal, substitution and differentiation.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::{Comparison, Expr, Function, Symbol};

impl Expr {
    /// Rebuild this expression with each child replaced by `f(child)`.
    ///
    /// The result goes through the canonicalizing constructors again.
    pub fn map_children<F: FnMut(&Expr) -> Expr>(&self, mut f: F) -> Expr {
        match self {
            Expr::Constant(_) | Expr::Symbol(_) => self.clone(),
            Expr::Sum(terms) => Expr::sum(terms.iter().map(&mut f)),
            Expr::Product(factors) => Expr::product(factors.iter().map(&mut f)),
            Expr::Power(base, exponent) => Expr::pow(f(base.as_ref()), f(exponent.as_ref())),
            Expr::Call(function, args) => Expr::call(*function, args.iter().map(f).collect()),
            Expr::Apply(name, args) => Expr::apply(name.as_ref(), args.iter().map(f).collect()),
            Expr::Compare(op, a, b) => Expr::compare(*op, f(a.as_ref()), f(b.as_ref())),
            Expr::If(c, a, b) => Expr::select(f(c.as_ref()), f(a.as_ref()), f(b.as_ref())),
            Expr::Derivative(x, t) => Expr::derivative(f(x.as_ref()), t),
            Expr::Integral(x, t) => Expr::integral(f(x.as_ref()), t),
        }
    }

    /// Top-down rewrite: where `f` returns `Some`, that replaces the whole
    /// subtree; elsewhere children are rewritten recursively.
    pub fn rewrite<F: FnMut(&Expr) -> Option<Expr>>(&self, f: &mut F) -> Expr {
        if let Some(replacement) = f(self) {
            return replacement;
        }
        match self {
            Expr::Constant(_) | Expr::Symbol(_) => self.clone(),
            _ => self.map_children(|child| child.rewrite(&mut *f)),
        }
    }

    /// Replace symbols according to `map`.
    pub fn substitute(&self, map: &HashMap<Symbol, Expr>) -> Expr {
        if map.is_empty() {
            return self.clone();
        }
        self.rewrite(&mut |e| match e {
            Expr::Symbol(s) => map.get(s).cloned(),
            _ => None,
        })
    }

    /// Replace every symbol by `f(symbol)`.
    pub fn map_symbols<F: FnMut(&Symbol) -> Expr>(&self, f: &mut F) -> Expr {
        self.rewrite(&mut |e| match e {
            Expr::Symbol(s) => Some(f(s)),
            _ => None,
        })
    }

    /// Visit every node, parents before children.
    pub fn visit<'a, F: FnMut(&'a Expr)>(&'a self, f: &mut F) {
        f(self);
        for child in self.children() {
            child.visit(&mut *f);
        }
    }

    /// All symbols referenced, in order.
    pub fn symbols(&self) -> BTreeSet<Symbol> {
        let mut out = BTreeSet::new();
        self.visit(&mut |e| {
            if let Expr::Symbol(s) = e {
                out.insert(s.clone());
            }
        });
        out
    }

    /// Whether any symbol satisfying `pred` occurs in this expression.
    pub fn depends_on<P: Fn(&Symbol) -> bool>(&self, pred: &P) -> bool {
        match self {
            Expr::Constant(_) => false,
            Expr::Symbol(s) => pred(s),
            _ => self.children().into_iter().any(|c| c.depends_on(pred)),
        }
    }

    /// Whether `symbol` occurs in this expression.
    pub fn contains(&self, symbol: &Symbol) -> bool {
        self.depends_on(&|s| s == symbol)
    }

    /// Whether any sub-expression satisfies `pred`.
    pub fn any<P: Fn(&Expr) -> bool>(&self, pred: &P) -> bool {
        pred(self) || self.children().into_iter().any(|c| c.any(pred))
    }

    /// Number of nodes in the tree.
    pub fn size(&self) -> usize {
        1 + self.children().into_iter().map(Expr::size).sum::<usize>()
    }

    /// Partial derivative with respect to `x`.
    pub fn diff(&self, x: &Symbol) -> Expr {
        if !self.contains(x) {
            return Expr::ZERO;
        }
        match self {
            Expr::Constant(_) => Expr::ZERO,
            Expr::Symbol(s) => {
                if s == x {
                    Expr::ONE
                } else {
                    Expr::ZERO
                }
            }
            Expr::Sum(terms) => Expr::sum(terms.iter().map(|t| t.diff(x))),
            Expr::Product(factors) => Expr::sum((0..factors.len()).map(|i| {
                let df = factors[i].diff(x);
                if df.is_zero() {
                    return Expr::ZERO;
                }
                Expr::product(
                    factors
                        .iter()
                        .enumerate()
                        .map(|(j, f)| if i == j { df.clone() } else { f.clone() }),
                )
            })),
            Expr::Power(base, exponent) => {
                let base = base.as_ref();
                let exponent = exponent.as_ref();
                let db = base.diff(x);
                if !exponent.contains(x) {
                    let reduced = Expr::pow(base.clone(), exponent - &Expr::ONE);
                    return Expr::product([exponent.clone(), reduced, db]);
                }
                let de = exponent.diff(x);
                let ln_base = Expr::call(Function::Ln, vec![base.clone()]);
                Expr::product([
                    self.clone(),
                    de * ln_base + exponent * &db / base.clone(),
                ])
            }
            Expr::Call(function, args) => match (function, args.as_ref()) {
                (Function::Min | Function::Max, [a, b]) => {
                    let op = if *function == Function::Min {
                        Comparison::Lt
                    } else {
                        Comparison::Gt
                    };
                    Expr::select(
                        Expr::compare(op, a.clone(), b.clone()),
                        a.diff(x),
                        b.diff(x),
                    )
                }
                (Function::Log, [a, b]) => {
                    let ln = |e: &Expr| Expr::call(Function::Ln, vec![e.clone()]);
                    (ln(a) / ln(b)).diff(x)
                }
                (Function::Pow, [a, b]) => Expr::pow(a.clone(), b.clone()).diff(x),
                (f, [a]) => match f.derivative(a) {
                    Some(outer) => outer * a.diff(x),
                    None => Expr::Derivative(Arc::new(self.clone()), x.clone()),
                },
                _ => Expr::Derivative(Arc::new(self.clone()), x.clone()),
            },
            Expr::Apply(..) => Expr::Derivative(Arc::new(self.clone()), x.clone()),
            Expr::Compare(..) => Expr::ZERO,
            Expr::If(c, a, b) => Expr::select(c.as_ref().clone(), a.diff(x), b.diff(x)),
            Expr::Derivative(inner, t) => Expr::derivative(inner.diff(x), t),
            Expr::Integral(inner, t) => Expr::integral(inner.diff(x), t),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn sym(name: &str) -> Symbol {
        Symbol::new(name)
    }

    #[test]
    fn test_diff_polynomial() {
        let x = Expr::variable("x");
        let e = 3.0 * Expr::pow(x.clone(), Expr::constant(2.0)) + 2.0 * x.clone() + 1.0;
        assert_eq!(e.diff(&sym("x")), 6.0 * x + 2.0);
    }

    #[test]
    fn test_diff_independent_is_zero() {
        let e = Expr::exp(Expr::variable("y"));
        assert!(e.diff(&sym("x")).is_zero());
    }

    #[test]
    fn test_diff_chain_rule_numeric() {
        let x = Expr::variable("x");
        let e = Expr::call(Function::Sin, vec![2.0 * x.clone()]) * Expr::exp(x);
        let d = e.diff(&sym("x"));
        let at = |v: f64| move |s: &Symbol| (s.name() == "x").then_some(v);
        let value = d.evaluate(&at(0.3)).unwrap();
        let expected = 2.0 * (0.6f64).cos() * 0.3f64.exp() + (0.6f64).sin() * 0.3f64.exp();
        assert_relative_eq!(value, expected, epsilon = 1e-12);
    }

    #[test]
    fn test_diff_piecewise() {
        let x = Expr::variable("x");
        let e = Expr::select(
            Expr::compare(Comparison::Gt, x.clone(), Expr::ONE),
            2.0 * x.clone(),
            Expr::pow(x.clone(), Expr::constant(3.0)),
        );
        let d = e.diff(&sym("x"));
        let at = |v: f64| move |s: &Symbol| (s.name() == "x").then_some(v);
        assert_relative_eq!(d.evaluate(&at(2.0)).unwrap(), 2.0);
        assert_relative_eq!(d.evaluate(&at(0.5)).unwrap(), 0.75);
    }

    #[test]
    fn test_substitute() {
        let x = Expr::variable("x");
        let y = Expr::variable("y");
        let mut map = HashMap::new();
        map.insert(sym("x"), 2.0 * y.clone());
        assert_eq!((x + y.clone()).substitute(&map), 3.0 * y);
    }

    #[test]
    fn test_symbols_and_depends_on() {
        let e = Expr::variable("a") * Expr::symbol(sym("b").previous());
        let symbols = e.symbols();
        assert_eq!(symbols.len(), 2);
        assert!(e.depends_on(&|s: &Symbol| s.is_previous()));
        assert!(!e.contains(&sym("b")));
    }
}
