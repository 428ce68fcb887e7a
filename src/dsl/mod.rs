//! Netlist language.
//!
//! A netlist is line oriented and SPICE flavoured: one element or directive
//! per line, `#` or `;` starts a comment, and node `0` (or `GND`) is ground.
//! Any value may be a number with a scale suffix (`f p n u m k M meg G T`,
//! trailing unit letters ignored) or a braced expression over `.param`
//! names and the time `t`.
//!
//! ```text
//! # tone control
//! .input in guitar          ; node, then the input signal's name
//! .output out
//! .param tone 0.5
//! .model 1N914 D (is=2.52n n=1.752)
//!
//! R1   in   out  {1000 + 9000 * tone}
//! C1   out  0    100n
//! D1   out  0    1N914
//! ```
//!
//! Elements, by leading letter or keyword, with their terminals:
//!
//! ```text
//! R C L        n+ n-                 value
//! V            n+ n-                 [value] [DC value] [AC gain]
//! I            n+ n-                 value
//! D            anode cathode         [model]
//! Q            collector base emitter [model]
//! X, XFMR      pa pc sa sc           [turns]
//! OP, OPAMP    out in+ in-           [model]
//! POT          n1 wiper n2           value [position]
//! ```
//!
//! A voltage source with an `AC` gain is driven by the simulation input.
//! Directives are `.input`, `.output`, `.node`, `.param` and `.model`.

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{Lexer, Token, TokenKind};
pub use parser::Parser;

use crate::error::Result;

/// Parse a circuit DSL string into an AST.
pub fn parse(input: &str) -> Result<CircuitAst> {
    let lexer = Lexer::new(input);
    let mut parser = Parser::new(lexer);
    parser.parse()
}

/// Parse a circuit DSL file.
#[cfg(feature = "cli")]
pub fn parse_file(path: &std::path::Path) -> Result<CircuitAst> {
    let content =
        std::fs::read_to_string(path).map_err(|source| crate::error::TubesimError::FileReadError {
            path: path.display().to_string(),
            source,
        })?;
    parse(&content)
}
