//! Infix text syntax for expressions.
//!
//! ```text
//! expr    = additive [ cmp additive ]
//! additive= term { ('+' | '-') term }
//! term    = unary { ('*' | '/') unary }
//! unary   = ('-' | '+') unary | power
//! power   = primary [ '^' unary ]
//! primary = number | name [ '[' text ']' ] [ '(' args ')' ] | '(' expr ')'
//! ```
//!
//! `pi` and `e` are constants, `t` is time, `x[t0]` is the previous sample of
//! `x`. Calls to names that are not built-in functions stay symbolic.

use super::{Comparison, Expr, Function, Symbol, PREV_TIME, TIME};
use crate::error::{Result, TubesimError};

/// Parse an expression from text.
pub fn parse(text: &str) -> Result<Expr> {
    let mut parser = ExprParser {
        src: text.as_bytes(),
        text,
        pos: 0,
    };
    let expr = parser.expression()?;
    parser.skip_space();
    if parser.pos < parser.src.len() {
        return Err(parser.error("unexpected trailing input"));
    }
    Ok(expr)
}

struct ExprParser<'a> {
    src: &'a [u8],
    text: &'a str,
    pos: usize,
}

impl<'a> ExprParser<'a> {
    fn error(&self, message: &str) -> TubesimError {
        TubesimError::expression(self.pos, message)
    }

    fn skip_space(&mut self) {
        while self.pos < self.src.len() && self.src[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_space();
        self.src.get(self.pos).copied()
    }

    fn eat(&mut self, token: &str) -> bool {
        self.skip_space();
        if self.text[self.pos..].starts_with(token) {
            self.pos += token.len();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: &str) -> Result<()> {
        if self.eat(token) {
            Ok(())
        } else {
            Err(self.error(&format!("expected '{}'", token)))
        }
    }

    fn expression(&mut self) -> Result<Expr> {
        let lhs = self.additive()?;
        let op = if self.eat("==") {
            Comparison::Eq
        } else if self.eat("!=") {
            Comparison::Ne
        } else if self.eat("<=") {
            Comparison::Le
        } else if self.eat(">=") {
            Comparison::Ge
        } else if self.eat("<") {
            Comparison::Lt
        } else if self.eat(">") {
            Comparison::Gt
        } else {
            return Ok(lhs);
        };
        let rhs = self.additive()?;
        Ok(Expr::compare(op, lhs, rhs))
    }

    fn additive(&mut self) -> Result<Expr> {
        let mut terms = vec![self.term()?];
        loop {
            if self.eat("+") {
                terms.push(self.term()?);
            } else if self.eat("-") {
                terms.push(-self.term()?);
            } else {
                return Ok(Expr::sum(terms));
            }
        }
    }

    fn term(&mut self) -> Result<Expr> {
        let mut acc = self.unary()?;
        loop {
            if self.eat("*") {
                acc = acc * self.unary()?;
            } else if self.eat("/") {
                acc = acc / self.unary()?;
            } else {
                return Ok(acc);
            }
        }
    }

    fn unary(&mut self) -> Result<Expr> {
        if self.eat("-") {
            Ok(-self.unary()?)
        } else if self.eat("+") {
            self.unary()
        } else {
            self.power()
        }
    }

    fn power(&mut self) -> Result<Expr> {
        let base = self.primary()?;
        if self.eat("^") {
            let exponent = self.unary()?;
            return Ok(Expr::pow(base, exponent));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr> {
        match self.peek() {
            Some(b'(') => {
                self.pos += 1;
                let inner = self.expression()?;
                self.expect(")")?;
                Ok(inner)
            }
            Some(c) if c.is_ascii_digit() || c == b'.' => self.number(),
            Some(c) if c.is_ascii_alphabetic() || c == b'_' => self.name(),
            Some(_) => Err(self.error("unexpected character")),
            None => Err(self.error("unexpected end of expression")),
        }
    }

    fn number(&mut self) -> Result<Expr> {
        let start = self.pos;
        let digits = |p: &mut Self| {
            while p.pos < p.src.len() && p.src[p.pos].is_ascii_digit() {
                p.pos += 1;
            }
        };
        digits(self);
        if self.src.get(self.pos) == Some(&b'.') {
            self.pos += 1;
            digits(self);
        }
        if matches!(self.src.get(self.pos), Some(b'e' | b'E'))
            && self
                .src
                .get(self.pos + 1)
                .is_some_and(|c| c.is_ascii_digit() || *c == b'-' || *c == b'+')
        {
            self.pos += 2;
            digits(self);
        }
        let mut value: f64 = self.text[start..self.pos]
            .parse()
            .map_err(|_| TubesimError::expression(start, "malformed number"))?;

        // SI suffix, only when it is not the start of a name.
        if let Some(&c) = self.src.get(self.pos) {
            let next_is_name = self
                .src
                .get(self.pos + 1)
                .is_some_and(|n| n.is_ascii_alphanumeric() || *n == b'_');
            let multiplier = match c {
                b'p' => 1e-12,
                b'n' => 1e-9,
                b'u' => 1e-6,
                b'm' => 1e-3,
                b'k' | b'K' => 1e3,
                b'M' => 1e6,
                b'G' => 1e9,
                _ => 1.0,
            };
            if multiplier != 1.0 && !next_is_name {
                value *= multiplier;
                self.pos += 1;
            }
        }
        Ok(Expr::constant(value))
    }

    fn name(&mut self) -> Result<Expr> {
        let start = self.pos;
        while self.pos < self.src.len()
            && (self.src[self.pos].is_ascii_alphanumeric() || self.src[self.pos] == b'_')
        {
            self.pos += 1;
        }
        let mut name = self.text[start..self.pos].to_string();
        let mut previous = false;

        if self.src.get(self.pos) == Some(&b'[') {
            let close = self.text[self.pos..]
                .find(']')
                .ok_or_else(|| self.error("unterminated '['"))?;
            let inside = &self.text[self.pos + 1..self.pos + close];
            if inside.trim() == PREV_TIME.to_string() {
                previous = true;
            } else {
                name.push_str(&self.text[self.pos..=self.pos + close]);
            }
            self.pos += close + 1;
        }

        if self.peek() == Some(b'(') {
            self.pos += 1;
            let args = self.arguments()?;
            return self.call(&name, args, start);
        }

        let expr = match name.as_str() {
            "pi" => Expr::constant(std::f64::consts::PI),
            "e" => Expr::constant(std::f64::consts::E),
            _ if name == TIME.name() && previous => Expr::symbol(PREV_TIME.clone()),
            _ if previous => Expr::symbol(Symbol::new(&name).previous()),
            _ => Expr::symbol(Symbol::new(&name)),
        };
        Ok(expr)
    }

    fn arguments(&mut self) -> Result<Vec<Expr>> {
        let mut args = Vec::new();
        if self.eat(")") {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(",") {
                continue;
            }
            self.expect(")")?;
            return Ok(args);
        }
    }

    fn call(&self, name: &str, mut args: Vec<Expr>, at: usize) -> Result<Expr> {
        if name == "if" {
            if args.len() != 3 {
                return Err(TubesimError::expression(at, "if takes three arguments"));
            }
            let otherwise = args.pop();
            let then = args.pop();
            let condition = args.pop();
            if let (Some(c), Some(a), Some(b)) = (condition, then, otherwise) {
                return Ok(Expr::select(c, a, b));
            }
        }
        if name == "D" && args.len() == 2 {
            if let Some(Expr::Symbol(t)) = args.pop() {
                if let Some(x) = args.pop() {
                    return Ok(Expr::derivative(x, &t));
                }
            }
            return Err(TubesimError::expression(at, "D(x, t) needs a variable"));
        }
        match Function::from_name(name) {
            Some(function) if function.arity() != args.len() => Err(TubesimError::expression(
                at,
                format!("{} takes {} arguments", function, function.arity()),
            )),
            Some(function) => Ok(Expr::call(function, args)),
            None => Ok(Expr::apply(name, args)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn x() -> Expr {
        Expr::variable("x")
    }

    #[test]
    fn test_precedence() {
        assert_eq!(parse("1 + 2*x").unwrap(), 1.0 + 2.0 * x());
        assert_eq!(parse("-x^2").unwrap(), -Expr::pow(x(), Expr::constant(2.0)));
        assert_eq!(parse("(1 + x)/2").unwrap(), (1.0 + x()) / 2.0);
        assert_eq!(parse("2^-1").unwrap(), Expr::constant(0.5));
    }

    #[test]
    fn test_names_and_history() {
        assert_eq!(parse("V[out]").unwrap(), Expr::variable("V[out]"));
        assert_eq!(
            parse("x[t0]").unwrap(),
            Expr::symbol(Symbol::new("x").previous())
        );
        assert_eq!(parse("t").unwrap(), Expr::symbol(TIME.clone()));
        assert_eq!(parse("t[t0]").unwrap(), Expr::symbol(PREV_TIME.clone()));
    }

    #[test]
    fn test_calls() {
        assert_eq!(
            parse("sin(2*pi*t)").unwrap(),
            Expr::call(
                Function::Sin,
                vec![2.0 * std::f64::consts::PI * Expr::symbol(TIME.clone())]
            )
        );
        assert_eq!(parse("max(1, 3)").unwrap(), Expr::constant(3.0));
        assert!(matches!(parse("foo(x)").unwrap(), Expr::Apply(..)));
        assert!(matches!(parse("if(x > 0, x, 0)").unwrap(), Expr::If(..)));
    }

    #[test]
    fn test_si_suffix() {
        assert_eq!(parse("10k").unwrap(), Expr::constant(10e3));
        assert_eq!(parse("2u*x").unwrap(), 2e-6 * x());
    }

    #[test]
    fn test_errors() {
        assert!(parse("1 +").is_err());
        assert!(parse("(x").is_err());
        assert!(parse("sin(x, 2)").is_err());
        assert!(parse("x y").is_err());
    }
}
