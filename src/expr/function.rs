//! Elementary functions understood by the expression model and the compiler.

use std::fmt;

use super::Expr;

/// Built-in elementary functions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Function {
    Abs,
    Sign,
    Min,
    Max,
    Sin,
    Cos,
    Tan,
    Sec,
    Csc,
    Cot,
    Asin,
    Acos,
    Atan,
    Asec,
    Acsc,
    Acot,
    Sinh,
    Cosh,
    Tanh,
    Sech,
    Csch,
    Coth,
    Asinh,
    Acosh,
    Atanh,
    Asech,
    Acsch,
    Acoth,
    Sqrt,
    Exp,
    Ln,
    /// `log(x, base)`
    Log,
    /// `pow(x, y)`; folded into a power expression on construction.
    Pow,
    Floor,
    Ceiling,
    Round,
}

impl Function {
    pub const ALL: [Function; 36] = [
        Function::Abs,
        Function::Sign,
        Function::Min,
        Function::Max,
        Function::Sin,
        Function::Cos,
        Function::Tan,
        Function::Sec,
        Function::Csc,
        Function::Cot,
        Function::Asin,
        Function::Acos,
        Function::Atan,
        Function::Asec,
        Function::Acsc,
        Function::Acot,
        Function::Sinh,
        Function::Cosh,
        Function::Tanh,
        Function::Sech,
        Function::Csch,
        Function::Coth,
        Function::Asinh,
        Function::Acosh,
        Function::Atanh,
        Function::Asech,
        Function::Acsch,
        Function::Acoth,
        Function::Sqrt,
        Function::Exp,
        Function::Ln,
        Function::Log,
        Function::Pow,
        Function::Floor,
        Function::Ceiling,
        Function::Round,
    ];

    /// Canonical lowercase name.
    pub fn name(self) -> &'static str {
        match self {
            Function::Abs => "abs",
            Function::Sign => "sign",
            Function::Min => "min",
            Function::Max => "max",
            Function::Sin => "sin",
            Function::Cos => "cos",
            Function::Tan => "tan",
            Function::Sec => "sec",
            Function::Csc => "csc",
            Function::Cot => "cot",
            Function::Asin => "asin",
            Function::Acos => "acos",
            Function::Atan => "atan",
            Function::Asec => "asec",
            Function::Acsc => "acsc",
            Function::Acot => "acot",
            Function::Sinh => "sinh",
            Function::Cosh => "cosh",
            Function::Tanh => "tanh",
            Function::Sech => "sech",
            Function::Csch => "csch",
            Function::Coth => "coth",
            Function::Asinh => "asinh",
            Function::Acosh => "acosh",
            Function::Atanh => "atanh",
            Function::Asech => "asech",
            Function::Acsch => "acsch",
            Function::Acoth => "acoth",
            Function::Sqrt => "sqrt",
            Function::Exp => "exp",
            Function::Ln => "ln",
            Function::Log => "log",
            Function::Pow => "pow",
            Function::Floor => "floor",
            Function::Ceiling => "ceiling",
            Function::Round => "round",
        }
    }

    /// Look up a function by name. Accepts the `arc*` spellings and `ceil`.
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.to_ascii_lowercase();
        let canonical = match lower.strip_prefix("arc") {
            Some(rest) if !rest.is_empty() => format!("a{}", rest),
            _ => lower,
        };
        let canonical = if canonical == "ceil" {
            "ceiling".to_string()
        } else {
            canonical
        };
        Self::ALL.iter().copied().find(|f| f.name() == canonical)
    }

    pub fn arity(self) -> usize {
        match self {
            Function::Min | Function::Max | Function::Log | Function::Pow => 2,
            _ => 1,
        }
    }

    /// Numeric evaluation. `args` must hold exactly `arity()` values.
    pub fn apply(self, args: &[f64]) -> f64 {
        let x = args[0];
        match self {
            Function::Abs => x.abs(),
            Function::Sign => {
                if x > 0.0 {
                    1.0
                } else if x < 0.0 {
                    -1.0
                } else {
                    x
                }
            }
            Function::Min => x.min(args[1]),
            Function::Max => x.max(args[1]),
            Function::Sin => x.sin(),
            Function::Cos => x.cos(),
            Function::Tan => x.tan(),
            Function::Sec => 1.0 / x.cos(),
            Function::Csc => 1.0 / x.sin(),
            Function::Cot => 1.0 / x.tan(),
            Function::Asin => x.asin(),
            Function::Acos => x.acos(),
            Function::Atan => x.atan(),
            Function::Asec => (1.0 / x).acos(),
            Function::Acsc => (1.0 / x).asin(),
            Function::Acot => (1.0 / x).atan(),
            Function::Sinh => x.sinh(),
            Function::Cosh => x.cosh(),
            Function::Tanh => x.tanh(),
            Function::Sech => 1.0 / x.cosh(),
            Function::Csch => 1.0 / x.sinh(),
            Function::Coth => 1.0 / x.tanh(),
            Function::Asinh => x.asinh(),
            Function::Acosh => x.acosh(),
            Function::Atanh => x.atanh(),
            Function::Asech => (1.0 / x).acosh(),
            Function::Acsch => (1.0 / x).asinh(),
            Function::Acoth => (1.0 / x).atanh(),
            Function::Sqrt => x.sqrt(),
            Function::Exp => x.exp(),
            Function::Ln => x.ln(),
            Function::Log => x.ln() / args[1].ln(),
            Function::Pow => x.powf(args[1]),
            Function::Floor => x.floor(),
            Function::Ceiling => x.ceil(),
            Function::Round => x.round_ties_even(),
        }
    }

    /// Derivative of a unary function with respect to its argument,
    /// evaluated at `x`. Returns `None` for functions of two arguments.
    pub fn derivative(self, x: &Expr) -> Option<Expr> {
        let one = || Expr::ONE;
        let sq = |e: &Expr| Expr::pow(e.clone(), Expr::constant(2.0));
        let call = |f: Function| Expr::call(f, vec![x.clone()]);
        let d = match self {
            Function::Abs => call(Function::Sign),
            Function::Sign | Function::Floor | Function::Ceiling | Function::Round => Expr::ZERO,
            Function::Sin => call(Function::Cos),
            Function::Cos => -call(Function::Sin),
            Function::Tan => one() + sq(&call(Function::Tan)),
            Function::Sec => call(Function::Sec) * call(Function::Tan),
            Function::Csc => -(call(Function::Csc) * call(Function::Cot)),
            Function::Cot => -sq(&call(Function::Csc)),
            Function::Asin => Expr::pow(one() - sq(x), Expr::constant(-0.5)),
            Function::Acos => -Expr::pow(one() - sq(x), Expr::constant(-0.5)),
            Function::Atan => one() / (one() + sq(x)),
            Function::Asec => one() / (call(Function::Abs) * Expr::sqrt(sq(x) - one())),
            Function::Acsc => -(one() / (call(Function::Abs) * Expr::sqrt(sq(x) - one()))),
            Function::Acot => -(one() / (one() + sq(x))),
            Function::Sinh => call(Function::Cosh),
            Function::Cosh => call(Function::Sinh),
            Function::Tanh => one() - sq(&call(Function::Tanh)),
            Function::Sech => -(call(Function::Sech) * call(Function::Tanh)),
            Function::Csch => -(call(Function::Csch) * call(Function::Coth)),
            Function::Coth => one() - sq(&call(Function::Coth)),
            Function::Asinh => Expr::pow(sq(x) + one(), Expr::constant(-0.5)),
            Function::Acosh => Expr::pow(sq(x) - one(), Expr::constant(-0.5)),
            Function::Atanh | Function::Acoth => one() / (one() - sq(x)),
            Function::Asech => -(one() / (x.clone() * Expr::sqrt(one() - sq(x)))),
            Function::Acsch => -(one() / (call(Function::Abs) * Expr::sqrt(one() + sq(x)))),
            Function::Sqrt => Expr::constant(0.5) / call(Function::Sqrt),
            Function::Exp => call(Function::Exp),
            Function::Ln => one() / x.clone(),
            Function::Min | Function::Max | Function::Log | Function::Pow => return None,
        };
        Some(d)
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_name_aliases() {
        assert_eq!(Function::from_name("ArcTan"), Some(Function::Atan));
        assert_eq!(Function::from_name("ceil"), Some(Function::Ceiling));
        assert_eq!(Function::from_name("EXP"), Some(Function::Exp));
        assert_eq!(Function::from_name("arc"), None);
        assert_eq!(Function::from_name("foo"), None);
    }

    #[test]
    fn test_apply_matches_std() {
        assert_eq!(Function::Sign.apply(&[-3.0]), -1.0);
        assert_eq!(Function::Sign.apply(&[0.0]), 0.0);
        assert_eq!(Function::Max.apply(&[1.0, 2.0]), 2.0);
        assert!((Function::Log.apply(&[8.0, 2.0]) - 3.0).abs() < 1e-12);
        assert_eq!(Function::Round.apply(&[2.5]), 2.0);
        assert!((Function::Atanh.apply(&[0.5]) - 0.5f64.atanh()).abs() < 1e-15);
    }

    #[test]
    fn test_every_function_has_a_name_round_trip() {
        for f in Function::ALL {
            assert_eq!(Function::from_name(f.name()), Some(f));
        }
    }
}
