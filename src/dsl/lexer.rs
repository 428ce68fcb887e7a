//! Lexer (tokenizer) for the circuit DSL.

use crate::error::{Result, TubesimError};

/// A token produced by the lexer.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    /// Source text; for [`TokenKind::Expression`] the braces are stripped.
    pub text: String,
    /// Line number (1-indexed)
    pub line: usize,
    /// Column number (1-indexed)
    pub column: usize,
}

/// Token types in the DSL.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// Element, node, model or parameter name
    Identifier,
    /// A number with an optional scale suffix, e.g. `4.7u` or `10kohm`
    Number,
    /// A word starting with '.'
    Directive,
    OpenParen,
    CloseParen,
    Equals,
    /// A braced expression `{...}`
    Expression,
    Newline,
    Eof,
}

/// Splits a netlist into tokens, one line at a time.
pub struct Lexer<'a> {
    src: &'a str,
    pos: usize,
    line: usize,
    column: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            pos: 0,
            line: 1,
            column: 1,
        }
    }

    /// Get the next token.
    pub fn next_token(&mut self) -> Result<Token> {
        self.skip_trivia();

        let (line, column, start) = (self.line, self.column, self.pos);
        let Some(ch) = self.bump() else {
            return Ok(Token {
                kind: TokenKind::Eof,
                text: String::new(),
                line,
                column,
            });
        };

        let kind = match ch {
            '\n' => TokenKind::Newline,
            '(' => TokenKind::OpenParen,
            ')' => TokenKind::CloseParen,
            '=' => TokenKind::Equals,
            '{' => {
                let text = self
                    .braced()
                    .ok_or_else(|| TubesimError::lexer(line, column, "unterminated '{'"))?;
                return Ok(Token {
                    kind: TokenKind::Expression,
                    text: text.to_string(),
                    line,
                    column,
                });
            }
            '.' if self.peek().is_some_and(|c| c.is_ascii_digit()) => self.number(start),
            '.' => {
                self.eat_while(is_word_char);
                TokenKind::Directive
            }
            '+' | '-' if self.peek().is_some_and(|c| c.is_ascii_digit() || c == '.') => {
                self.number(start)
            }
            c if c.is_ascii_digit() => self.number(start),
            c if c.is_alphabetic() || c == '_' => {
                self.eat_while(is_word_char);
                TokenKind::Identifier
            }
            c => {
                return Err(TubesimError::lexer(
                    line,
                    column,
                    format!("unexpected character '{}'", c),
                ))
            }
        };

        let text = &self.src[start..self.pos];
        if kind == TokenKind::Number && parse_value(text).is_none() {
            if !text.starts_with(|c: char| c.is_ascii_digit()) {
                return Err(TubesimError::lexer(
                    line,
                    column,
                    format!("malformed number '{}'", text),
                ));
            }
            // Digit-led names such as `1N4148`
            return Ok(Token {
                kind: TokenKind::Identifier,
                text: text.to_string(),
                line,
                column,
            });
        }

        Ok(Token {
            kind,
            text: text.to_string(),
            line,
            column,
        })
    }

    fn peek(&self) -> Option<char> {
        self.src[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.peek()?;
        self.pos += ch.len_utf8();
        if ch == '\n' {
            self.line += 1;
            self.column = 1;
        } else {
            self.column += 1;
        }
        Some(ch)
    }

    fn eat_while(&mut self, pred: impl Fn(char) -> bool) {
        while self.peek().is_some_and(&pred) {
            self.bump();
        }
    }

    /// Spaces, tabs, carriage returns and `#`/`;` comments. Newlines are
    /// tokens.
    fn skip_trivia(&mut self) {
        loop {
            match self.peek() {
                Some(' ' | '\t' | '\r') => {
                    self.bump();
                }
                Some('#' | ';') => self.eat_while(|c| c != '\n'),
                _ => break,
            }
        }
    }

    /// Scan the rest of a number whose first character is already consumed.
    /// Anything word-like directly after the mantissa is kept as its suffix.
    fn number(&mut self, start: usize) -> TokenKind {
        let (mantissa, _) = split_mantissa(&self.src[start..]);
        while self.pos < start + mantissa.len() {
            self.bump();
        }
        self.eat_while(is_word_char);
        TokenKind::Number
    }

    /// Body of a `{...}` whose opening brace is consumed. Braces nest and the
    /// body may not cross a line break.
    fn braced(&mut self) -> Option<&'a str> {
        let start = self.pos;
        let mut depth = 1usize;
        loop {
            match self.peek()? {
                '\n' => return None,
                '{' => depth += 1,
                '}' => {
                    depth -= 1;
                    if depth == 0 {
                        let body = &self.src[start..self.pos];
                        self.bump();
                        return Some(body);
                    }
                }
                _ => {}
            }
            self.bump();
        }
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Split `text` into a leading decimal literal and whatever follows it.
fn split_mantissa(text: &str) -> (&str, &str) {
    let bytes = text.as_bytes();
    let digits = |mut i: usize| {
        while i < bytes.len() && bytes[i].is_ascii_digit() {
            i += 1;
        }
        i
    };

    let mut end = 0;
    if matches!(bytes.first(), Some(b'+' | b'-')) {
        end = 1;
    }
    end = digits(end);
    if bytes.get(end) == Some(&b'.') {
        end = digits(end + 1);
    }
    if matches!(bytes.get(end), Some(b'e' | b'E')) {
        let mut exp = end + 1;
        if matches!(bytes.get(exp), Some(b'+' | b'-')) {
            exp += 1;
        }
        if bytes.get(exp).is_some_and(u8::is_ascii_digit) {
            end = digits(exp);
        }
    }
    text.split_at(end)
}

/// Scale factor for the suffix after a number, and the length of the prefix
/// consumed. `M` is mega and `m` milli; `meg` in any case is also mega.
fn scale(suffix: &str) -> (f64, usize) {
    if suffix.len() >= 3 && suffix[..3].eq_ignore_ascii_case("meg") {
        return (1e6, 3);
    }
    let factor = match suffix.chars().next() {
        Some('f') => 1e-15,
        Some('p') => 1e-12,
        Some('n') => 1e-9,
        Some('u' | 'µ') => 1e-6,
        Some('m') => 1e-3,
        Some('k' | 'K') => 1e3,
        Some('M') => 1e6,
        Some('G') => 1e9,
        Some('T') => 1e12,
        _ => return (1.0, 0),
    };
    (factor, suffix.chars().next().map_or(0, char::len_utf8))
}

/// Parse a number with an optional scale suffix and unit letters, as in
/// `10k`, `4.7uF` or `1meg`.
pub fn parse_value(text: &str) -> Option<f64> {
    let text = text.trim();
    if !text.starts_with(|c: char| c.is_ascii_digit() || matches!(c, '.' | '+' | '-')) {
        return None;
    }

    let (mantissa, suffix) = split_mantissa(text);
    let value: f64 = mantissa.parse().ok()?;
    let (factor, used) = scale(suffix);
    let unit = &suffix[used..];
    unit.chars()
        .all(char::is_alphabetic)
        .then_some(value * factor)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut lexer = Lexer::new(src);
        let mut out = Vec::new();
        loop {
            let tok = lexer.next_token().unwrap();
            if tok.kind == TokenKind::Eof {
                return out;
            }
            out.push(tok.kind);
        }
    }

    #[test]
    fn test_parse_value() {
        assert_relative_eq!(parse_value("10k").unwrap(), 10_000.0);
        assert_relative_eq!(parse_value("100n").unwrap(), 100e-9);
        assert_relative_eq!(parse_value("4.7uF").unwrap(), 4.7e-6);
        assert_relative_eq!(parse_value("1M").unwrap(), 1e6);
        assert_relative_eq!(parse_value("2.2meg").unwrap(), 2.2e6);
        assert_relative_eq!(parse_value("10kohm").unwrap(), 1e4);
        assert_relative_eq!(parse_value("1e-9").unwrap(), 1e-9);
        assert_relative_eq!(parse_value("-.5m").unwrap(), -0.5e-3);
        assert_eq!(parse_value("1N4148"), None);
        assert_eq!(parse_value("inf"), None);
        assert_eq!(parse_value("out"), None);
    }

    #[test]
    fn test_lexer_basic() {
        let mut lexer = Lexer::new("R1 in out 10k");

        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Identifier);
        assert_eq!(tok.text, "R1");

        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Identifier);
        assert_eq!((tok.text.as_str(), tok.column), ("in", 4));

        lexer.next_token().unwrap();
        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Number);
        assert_eq!(tok.text, "10k");
    }

    #[test]
    fn test_lexer_expression() {
        let mut lexer = Lexer::new("R1 a b {10e3 * (1 + drive)} ; comment");
        for _ in 0..3 {
            lexer.next_token().unwrap();
        }
        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Expression);
        assert_eq!(tok.text, "10e3 * (1 + drive)");
        assert_eq!(lexer.next_token().unwrap().kind, TokenKind::Eof);

        let mut lexer = Lexer::new("{1 +\n2}");
        assert!(matches!(lexer.next_token(), Err(TubesimError::LexerError { .. })));
    }

    #[test]
    fn test_lexer_directive() {
        let mut lexer = Lexer::new(".model D1 D (is=1e-14)");
        let tok = lexer.next_token().unwrap();
        assert_eq!(tok.kind, TokenKind::Directive);
        assert_eq!(tok.text, ".model");

        assert_eq!(
            kinds(".model D1 D (is=1e-14)\n"),
            vec![
                TokenKind::Directive,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::OpenParen,
                TokenKind::Identifier,
                TokenKind::Equals,
                TokenKind::Number,
                TokenKind::CloseParen,
                TokenKind::Newline,
            ]
        );
    }

    #[test]
    fn test_lexer_numbers_and_names() {
        assert_eq!(
            kinds("-5 .5 1N4148 0"),
            vec![
                TokenKind::Number,
                TokenKind::Number,
                TokenKind::Identifier,
                TokenKind::Number,
            ]
        );
    }

    #[test]
    fn test_lexer_reports_position() {
        let mut lexer = Lexer::new("R1 a b 1k\nC1 a @ 1u");
        let err = loop {
            match lexer.next_token() {
                Ok(_) => continue,
                Err(e) => break e,
            }
        };
        assert!(matches!(err, TubesimError::LexerError { line: 2, column: 6, .. }));
    }
}
