//! Lowering of expressions to register operations.

use std::collections::{HashMap, HashSet};

use log::trace;

use super::{Block, Op, Reg};
use crate::error::{Result, TubesimError};
use crate::expr::{Domain, Expr, Function, Symbol};

/// Largest exponent lowered to `powi`.
const MAX_POWI: f64 = 64.0;

/// Emits operations for expressions, sharing identical subexpressions.
///
/// While a Newton block is open, operations whose operands do not depend on
/// the iterated unknowns are hoisted in front of the block.
pub(crate) struct CodeGen {
    symbols: HashMap<Symbol, Reg>,
    constants: Vec<(Reg, f64)>,
    constant_regs: HashMap<u64, Reg>,
    cache: HashMap<Expr, Reg>,
    varying: HashSet<Reg>,
    next: Reg,
    /// Operations outside any Newton body.
    straight: Vec<Op>,
    /// Body of the open Newton block, if any.
    body: Option<Vec<Op>>,
    pub(crate) blocks: Vec<Block>,
}

impl CodeGen {
    /// `symbols` maps every readable symbol to its register; new registers
    /// are allocated from `first_free`.
    pub(crate) fn new(symbols: HashMap<Symbol, Reg>, first_free: Reg) -> Self {
        Self {
            symbols,
            constants: Vec::new(),
            constant_regs: HashMap::new(),
            cache: HashMap::new(),
            varying: HashSet::new(),
            next: first_free,
            straight: Vec::new(),
            body: None,
            blocks: Vec::new(),
        }
    }

    pub(crate) fn register_count(&self) -> usize {
        self.next
    }

    pub(crate) fn constants(&self) -> &[(Reg, f64)] {
        &self.constants
    }

    /// Start a Newton block iterating on the registers in `varying`.
    pub(crate) fn open_newton(&mut self, varying: &[Reg]) {
        self.varying = varying.iter().copied().collect();
        self.body = Some(Vec::new());
    }

    /// Close the open Newton block. Values computed inside it are stale after
    /// the final correction and are dropped from the cache.
    pub(crate) fn close_newton(&mut self) -> Vec<Op> {
        let varying = std::mem::take(&mut self.varying);
        self.cache.retain(|_, reg| !varying.contains(reg));
        self.flush();
        self.body.take().unwrap_or_default()
    }

    /// Move pending straight-line operations into a block.
    pub(crate) fn flush(&mut self) {
        if !self.straight.is_empty() {
            self.blocks.push(Block::Straight(std::mem::take(&mut self.straight)));
        }
    }

    /// Emit `dst = src`.
    pub(crate) fn copy(&mut self, dst: Reg, src: Reg) {
        if dst != src {
            self.straight.push(Op::Copy(dst, src));
        }
    }

    fn alloc(&mut self) -> Reg {
        let reg = self.next;
        self.next += 1;
        reg
    }

    fn constant(&mut self, value: f64) -> Reg {
        if let Some(&reg) = self.constant_regs.get(&value.to_bits()) {
            return reg;
        }
        let reg = self.alloc();
        self.constants.push((reg, value));
        self.constant_regs.insert(value.to_bits(), reg);
        reg
    }

    /// Append an operation writing a fresh register reading `operands`.
    fn push(&mut self, operands: &[Reg], make: impl FnOnce(Reg) -> Op) -> Reg {
        let dst = self.alloc();
        let op = make(dst);
        let in_body = self.body.is_some() && operands.iter().any(|r| self.varying.contains(r));
        match (&mut self.body, in_body) {
            (Some(body), true) => {
                self.varying.insert(dst);
                body.push(op);
            }
            _ => self.straight.push(op),
        }
        dst
    }

    /// Register holding the value of `expr`.
    pub(crate) fn emit(&mut self, expr: &Expr) -> Result<Reg> {
        if let Some(&reg) = self.cache.get(expr) {
            return Ok(reg);
        }
        let reg = match expr {
            Expr::Constant(v) => return Ok(self.constant(*v)),
            Expr::Symbol(s) => {
                return self
                    .symbols
                    .get(s)
                    .copied()
                    .ok_or_else(|| TubesimError::UndefinedSymbol {
                        symbol: s.to_string(),
                    })
            }
            Expr::Sum(terms) => self.sum(terms)?,
            Expr::Product(factors) => self.product(factors)?,
            Expr::Power(base, exponent) => self.power(base, exponent)?,
            Expr::Call(function, args) => self.call(*function, args)?,
            Expr::Apply(name, _) => {
                return Err(TubesimError::UnsupportedFunction {
                    name: name.to_string(),
                })
            }
            Expr::Compare(op, a, b) => {
                let (a, b) = (self.emit(a)?, self.emit(b)?);
                let op = *op;
                self.push(&[a, b], |d| Op::Cmp(op, d, a, b))
            }
            Expr::If(c, a, b) => {
                let (c, a, b) = (self.emit(c)?, self.emit(a)?, self.emit(b)?);
                self.push(&[c, a, b], |d| Op::Select(d, c, a, b))
            }
            Expr::Derivative(..) | Expr::Integral(..) => {
                return Err(TubesimError::UnsupportedOperator {
                    expression: expr.to_string(),
                })
            }
        };
        trace!("r{} = {}", reg, expr);
        self.cache.insert(expr.clone(), reg);
        Ok(reg)
    }

    fn sum(&mut self, terms: &[Expr]) -> Result<Reg> {
        let mut acc: Option<Reg> = None;
        for term in terms {
            let (c, rest) = term.clone().split_coefficient();
            let (negate, term) = if c < 0.0 {
                (true, Expr::scale(-c, rest))
            } else {
                (false, term.clone())
            };
            let r = self.emit(&term)?;
            acc = Some(match (acc, negate) {
                (None, false) => r,
                (None, true) => self.push(&[r], |d| Op::Neg(d, r)),
                (Some(a), false) => self.push(&[a, r], |d| Op::Add(d, a, r)),
                (Some(a), true) => self.push(&[a, r], |d| Op::Sub(d, a, r)),
            });
        }
        Ok(match acc {
            Some(r) => r,
            None => self.constant(0.0),
        })
    }

    fn product(&mut self, factors: &[Expr]) -> Result<Reg> {
        let mut numerator = Vec::new();
        let mut denominator = Vec::new();
        for factor in factors {
            match factor {
                Expr::Power(base, exponent) if exponent.as_constant().is_some_and(|e| e < 0.0) => {
                    denominator.push(Expr::pow(base.as_ref().clone(), -exponent.as_ref()))
                }
                _ => numerator.push(factor.clone()),
            }
        }
        let num = self.chain(&numerator, |d, a, b| Op::Mul(d, a, b))?;
        if denominator.is_empty() {
            return Ok(num);
        }
        let den = self.chain(&denominator, |d, a, b| Op::Mul(d, a, b))?;
        Ok(self.push(&[num, den], |d| Op::Div(d, num, den)))
    }

    fn chain(&mut self, items: &[Expr], op: fn(Reg, Reg, Reg) -> Op) -> Result<Reg> {
        let mut acc: Option<Reg> = None;
        for item in items {
            let r = self.emit(item)?;
            acc = Some(match acc {
                None => r,
                Some(a) => self.push(&[a, r], |d| op(d, a, r)),
            });
        }
        Ok(match acc {
            Some(r) => r,
            None => self.constant(1.0),
        })
    }

    fn power(&mut self, base: &Expr, exponent: &Expr) -> Result<Reg> {
        let b = self.emit(base)?;
        if let Some(e) = exponent.as_constant() {
            if Domain::Integer.contains(exponent) && e.abs() <= MAX_POWI {
                let n = e as i32;
                return Ok(self.push(&[b], |d| Op::Powi(d, b, n)));
            }
            if e == 0.5 {
                return Ok(self.push(&[b], |d| Op::Call1(Function::Sqrt, d, b)));
            }
        }
        let e = self.emit(exponent)?;
        Ok(self.push(&[b, e], |d| Op::Powf(d, b, e)))
    }

    fn call(&mut self, function: Function, args: &[Expr]) -> Result<Reg> {
        if args.len() != function.arity() {
            return Err(TubesimError::ArityMismatch {
                name: function.name().to_string(),
                expected: function.arity(),
                found: args.len(),
            });
        }
        match args {
            [a] => {
                let a = self.emit(a)?;
                Ok(self.push(&[a], |d| Op::Call1(function, d, a)))
            }
            [a, b] => {
                let (a, b) = (self.emit(a)?, self.emit(b)?);
                Ok(self.push(&[a, b], |d| Op::Call2(function, d, a, b)))
            }
            _ => Err(TubesimError::UnsupportedFunction {
                name: function.name().to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codegen() -> CodeGen {
        let symbols = [(Symbol::new("x"), 0), (Symbol::new("y"), 1)].into();
        CodeGen::new(symbols, 2)
    }

    fn op_count(cg: &CodeGen) -> usize {
        cg.straight.len()
    }

    #[test]
    fn test_common_subexpressions_are_shared() {
        let mut cg = codegen();
        let x = Expr::variable("x");
        let s = Expr::exp(x.clone());
        let a = cg.emit(&(s.clone() + 1.0)).unwrap();
        let count = op_count(&cg);
        let b = cg.emit(&(s.clone() + 1.0)).unwrap();
        assert_eq!(a, b);
        assert_eq!(op_count(&cg), count);
        cg.emit(&(s * 2.0)).unwrap();
        // exp(x) is reused, only the multiply is new.
        assert_eq!(op_count(&cg), count + 1);
    }

    #[test]
    fn test_integer_powers_use_powi() {
        let mut cg = codegen();
        cg.emit(&Expr::pow(Expr::variable("x"), Expr::constant(3.0))).unwrap();
        assert!(matches!(cg.straight[..], [Op::Powi(_, 0, 3)]));
    }

    #[test]
    fn test_negative_terms_subtract() {
        let mut cg = codegen();
        cg.emit(&(Expr::variable("x") - Expr::variable("y"))).unwrap();
        assert!(matches!(cg.straight[..], [Op::Sub(_, 0, 1)]));
    }

    #[test]
    fn test_invariant_operations_are_hoisted() {
        let mut cg = codegen();
        cg.open_newton(&[0]);
        let y2 = Expr::pow(Expr::variable("y"), Expr::constant(2.0));
        cg.emit(&(Expr::variable("x") * y2)).unwrap();
        let body = cg.close_newton();
        assert_eq!(body.len(), 1);
        assert!(matches!(cg.blocks[..], [Block::Straight(ref ops)] if ops.len() == 1));
    }

    #[test]
    fn test_errors() {
        let mut cg = codegen();
        let err = cg.emit(&Expr::apply("foo", vec![Expr::variable("x")])).unwrap_err();
        assert!(matches!(err, TubesimError::UnsupportedFunction { .. }));

        let err = cg.emit(&Expr::variable("z")).unwrap_err();
        assert!(matches!(err, TubesimError::UndefinedSymbol { .. }));

        let d = Expr::derivative(Expr::variable("x"), &crate::expr::TIME);
        let err = cg.emit(&d).unwrap_err();
        assert!(matches!(err, TubesimError::UnsupportedOperator { .. }));

        let bad = Expr::Call(Function::Sin, vec![Expr::variable("x"), Expr::variable("y")].into());
        let err = cg.emit(&bad).unwrap_err();
        assert!(matches!(err, TubesimError::ArityMismatch { expected: 1, found: 2, .. }));
    }
}
