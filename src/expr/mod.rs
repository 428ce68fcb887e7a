//! Symbolic expression model.
//!
//! A deliberately small algebra: enough to state circuit equations, discretize
//! them, differentiate them for Newton's method and hand them to the
//! [`compiler`](crate::compiler).
//!
//! [`Expr`] values are immutable and share their children through [`Arc`], so
//! cloning is cheap. Equality, ordering and hashing are structural, which lets
//! expressions be used as map keys for like-term collection and common
//! subexpression elimination.
//!
//! The constructors in this module perform a light canonicalization:
//!
//! - sums and products are flattened and sorted,
//! - constants are folded,
//! - like terms (`2x + 3x`) and like factors (`x * x^-1`) are collected.
//!
//! No expansion of products over sums is attempted.

mod build;
mod calculus;
mod domain;
mod eval;
mod function;
mod parse;
mod symbol;

pub use domain::Domain;
pub use function::Function;
pub use parse::parse;
pub use symbol::{Sample, Symbol, PREV_TIME, TIME};

use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Relational operators. A comparison evaluates to `1.0` or `0.0`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Comparison {
    pub fn apply(self, a: f64, b: f64) -> bool {
        match self {
            Comparison::Eq => a == b,
            Comparison::Ne => a != b,
            Comparison::Lt => a < b,
            Comparison::Le => a <= b,
            Comparison::Gt => a > b,
            Comparison::Ge => a >= b,
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "==",
            Comparison::Ne => "!=",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
        }
    }
}

/// An immutable symbolic term.
#[derive(Debug, Clone)]
pub enum Expr {
    Constant(f64),
    Symbol(Symbol),
    Sum(Arc<[Expr]>),
    Product(Arc<[Expr]>),
    Power(Arc<Expr>, Arc<Expr>),
    Call(Function, Arc<[Expr]>),
    /// Application of a function the model does not know.
    Apply(Arc<str>, Arc<[Expr]>),
    Compare(Comparison, Arc<Expr>, Arc<Expr>),
    /// `if(condition, then, else)`; the condition is true when non-zero.
    If(Arc<Expr>, Arc<Expr>, Arc<Expr>),
    /// Time derivative `D(x, t)`.
    Derivative(Arc<Expr>, Symbol),
    /// Running integral `∫x dt`.
    Integral(Arc<Expr>, Symbol),
}

/// An equality between two expressions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Equation {
    pub lhs: Expr,
    pub rhs: Expr,
}

impl Equation {
    pub fn new(lhs: Expr, rhs: Expr) -> Self {
        Self { lhs, rhs }
    }

    /// `lhs - rhs`, the form solvers work with.
    pub fn residual(&self) -> Expr {
        &self.lhs - &self.rhs
    }
}

impl fmt::Display for Equation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} == {}", self.lhs, self.rhs)
    }
}

impl Expr {
    pub const ZERO: Expr = Expr::Constant(0.0);
    pub const ONE: Expr = Expr::Constant(1.0);

    pub fn as_constant(&self) -> Option<f64> {
        match self {
            Expr::Constant(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&Symbol> {
        match self {
            Expr::Symbol(s) => Some(s),
            _ => None,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.as_constant() == Some(0.0)
    }

    pub fn is_one(&self) -> bool {
        self.as_constant() == Some(1.0)
    }

    /// Direct sub-expressions.
    pub fn children(&self) -> Vec<&Expr> {
        match self {
            Expr::Constant(_) | Expr::Symbol(_) => Vec::new(),
            Expr::Sum(terms) | Expr::Product(terms) => terms.iter().collect(),
            Expr::Call(_, args) | Expr::Apply(_, args) => args.iter().collect(),
            Expr::Power(a, b) | Expr::Compare(_, a, b) => vec![a.as_ref(), b.as_ref()],
            Expr::If(c, a, b) => vec![c.as_ref(), a.as_ref(), b.as_ref()],
            Expr::Derivative(x, _) | Expr::Integral(x, _) => vec![x.as_ref()],
        }
    }

    fn rank(&self) -> u8 {
        match self {
            Expr::Constant(_) => 0,
            Expr::Symbol(_) => 1,
            Expr::Sum(_) => 2,
            Expr::Product(_) => 3,
            Expr::Power(..) => 4,
            Expr::Call(..) => 5,
            Expr::Apply(..) => 6,
            Expr::Compare(..) => 7,
            Expr::If(..) => 8,
            Expr::Derivative(..) => 9,
            Expr::Integral(..) => 10,
        }
    }
}

impl Ord for Expr {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Expr::Constant(a), Expr::Constant(b)) => a.total_cmp(b),
            (Expr::Symbol(a), Expr::Symbol(b)) => a.cmp(b),
            (Expr::Sum(a), Expr::Sum(b)) | (Expr::Product(a), Expr::Product(b)) => {
                a.iter().cmp(b.iter())
            }
            (Expr::Power(a, b), Expr::Power(c, d)) => a.cmp(c).then_with(|| b.cmp(d)),
            (Expr::Call(f, a), Expr::Call(g, b)) => f.cmp(g).then_with(|| a.iter().cmp(b.iter())),
            (Expr::Apply(f, a), Expr::Apply(g, b)) => {
                f.cmp(g).then_with(|| a.iter().cmp(b.iter()))
            }
            (Expr::Compare(o, a, b), Expr::Compare(p, c, d)) => o
                .cmp(p)
                .then_with(|| a.cmp(c))
                .then_with(|| b.cmp(d)),
            (Expr::If(a, b, c), Expr::If(d, e, f)) => a
                .cmp(d)
                .then_with(|| b.cmp(e))
                .then_with(|| c.cmp(f)),
            (Expr::Derivative(a, x), Expr::Derivative(b, y))
            | (Expr::Integral(a, x), Expr::Integral(b, y)) => a.cmp(b).then_with(|| x.cmp(y)),
            _ => self.rank().cmp(&other.rank()),
        }
    }
}

impl PartialOrd for Expr {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Expr {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Expr {}

impl Hash for Expr {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.rank().hash(state);
        match self {
            Expr::Constant(v) => v.to_bits().hash(state),
            Expr::Symbol(s) => s.hash(state),
            Expr::Sum(terms) | Expr::Product(terms) => terms.hash(state),
            Expr::Power(a, b) => {
                a.hash(state);
                b.hash(state);
            }
            Expr::Call(f, args) => {
                f.hash(state);
                args.hash(state);
            }
            Expr::Apply(f, args) => {
                f.hash(state);
                args.hash(state);
            }
            Expr::Compare(op, a, b) => {
                op.hash(state);
                a.hash(state);
                b.hash(state);
            }
            Expr::If(c, a, b) => {
                c.hash(state);
                a.hash(state);
                b.hash(state);
            }
            Expr::Derivative(x, t) | Expr::Integral(x, t) => {
                x.hash(state);
                t.hash(state);
            }
        }
    }
}

// Precedence levels used when printing.
const PREC_COMPARE: u8 = 1;
const PREC_SUM: u8 = 2;
const PREC_PRODUCT: u8 = 3;
const PREC_POWER: u8 = 4;

impl Expr {
    fn fmt_prec(&self, f: &mut fmt::Formatter<'_>, parent: u8) -> fmt::Result {
        let own = match self {
            Expr::Compare(..) => PREC_COMPARE,
            Expr::Sum(_) => PREC_SUM,
            Expr::Product(_) => PREC_PRODUCT,
            Expr::Constant(v) if *v < 0.0 => PREC_PRODUCT,
            Expr::Power(..) => PREC_POWER,
            _ => u8::MAX,
        };
        if own < parent {
            f.write_str("(")?;
        }
        match self {
            Expr::Constant(v) => write!(f, "{}", v)?,
            Expr::Symbol(s) => write!(f, "{}", s)?,
            Expr::Sum(terms) => {
                for (i, term) in terms.iter().enumerate() {
                    let (c, rest) = term.clone().split_coefficient();
                    if i == 0 {
                        term.fmt_prec(f, PREC_SUM)?;
                    } else if c < 0.0 {
                        f.write_str(" - ")?;
                        Expr::scale(-c, rest).fmt_prec(f, PREC_PRODUCT)?;
                    } else {
                        f.write_str(" + ")?;
                        term.fmt_prec(f, PREC_SUM)?;
                    }
                }
            }
            Expr::Product(factors) => {
                let mut first = true;
                for factor in factors.iter() {
                    if first && factor.as_constant() == Some(-1.0) {
                        f.write_str("-")?;
                        continue;
                    }
                    if !first {
                        f.write_str("*")?;
                    }
                    factor.fmt_prec(f, PREC_PRODUCT + 1)?;
                    first = false;
                }
            }
            Expr::Power(base, exponent) => {
                base.fmt_prec(f, PREC_POWER + 1)?;
                f.write_str("^")?;
                exponent.fmt_prec(f, PREC_POWER + 1)?;
            }
            Expr::Call(func, args) => fmt_call(f, func.name(), args)?,
            Expr::Apply(name, args) => fmt_call(f, name, args)?,
            Expr::Compare(op, a, b) => {
                a.fmt_prec(f, PREC_SUM)?;
                write!(f, " {} ", op.symbol())?;
                b.fmt_prec(f, PREC_SUM)?;
            }
            Expr::If(c, a, b) => write!(f, "if({}, {}, {})", c, a, b)?,
            Expr::Derivative(x, t) => write!(f, "D({}, {})", x, t)?,
            Expr::Integral(x, t) => write!(f, "I({}, {})", x, t)?,
        }
        if own < parent {
            f.write_str(")")?;
        }
        Ok(())
    }
}

fn fmt_call(f: &mut fmt::Formatter<'_>, name: &str, args: &[Expr]) -> fmt::Result {
    write!(f, "{}(", name)?;
    for (i, arg) in args.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        write!(f, "{}", arg)?;
    }
    f.write_str(")")
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.fmt_prec(f, 0)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::constant(value)
    }
}

impl From<Symbol> for Expr {
    fn from(symbol: Symbol) -> Self {
        Expr::Symbol(symbol)
    }
}

impl From<&Symbol> for Expr {
    fn from(symbol: &Symbol) -> Self {
        Expr::Symbol(symbol.clone())
    }
}

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
    fn test_structural_equality_is_order_independent() {
        assert_eq!(x() + y(), y() + x());
        assert_eq!(x() * y(), y() * x());
        assert_ne!(x() - y(), y() - x());
    }

    #[test]
    fn test_display_reads_naturally() {
        assert_eq!((x() - y()).to_string(), "x - y");
        assert_eq!((2.0 * x() + 1.0).to_string(), "1 + 2*x");
        assert_eq!(Expr::pow(x() + y(), Expr::constant(2.0)).to_string(), "(x + y)^2");
        assert_eq!((-x()).to_string(), "-x");
    }

    #[test]
    fn test_equation_residual() {
        let eq = Equation::new(x(), 3.0 * y());
        assert_eq!(eq.residual(), x() - 3.0 * y());
    }
}
