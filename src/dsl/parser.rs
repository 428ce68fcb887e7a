//! Parser for the circuit DSL.

use std::collections::{HashMap, HashSet};

use super::ast::*;
use super::lexer::{parse_value, Lexer, Token, TokenKind};
use crate::error::{Result, TubesimError};
use crate::expr::{self, Expr};

/// Parser for circuit DSL.
pub struct Parser<'a> {
    lexer: Lexer<'a>,
    current: Token,
}

impl<'a> Parser<'a> {
    /// Create a new parser with the given lexer.
    pub fn new(lexer: Lexer<'a>) -> Self {
        Self {
            lexer,
            current: Token {
                kind: TokenKind::Newline,
                text: String::new(),
                line: 1,
                column: 1,
            },
        }
    }

    /// Parse the entire circuit description.
    pub fn parse(&mut self) -> Result<CircuitAst> {
        let mut ast = CircuitAst::new();
        let mut node_set = HashSet::new();
        self.advance()?;

        while self.current.kind != TokenKind::Eof {
            // Skip empty lines
            if self.current.kind == TokenKind::Newline {
                self.advance()?;
                continue;
            }

            match &self.current.kind {
                TokenKind::Directive => {
                    self.parse_directive(&mut ast)?;
                }
                TokenKind::Identifier => {
                    let component = self.parse_component()?;
                    node_set.extend(component.nodes.iter().cloned());
                    ast.components.push(component);
                }
                _ => {
                    return Err(TubesimError::parse(
                        self.current.line,
                        format!("unexpected token: {:?}", self.current.text),
                    ));
                }
            }

            match self.current.kind {
                TokenKind::Newline => self.advance()?,
                TokenKind::Eof => {}
                _ => {
                    return Err(TubesimError::parse(
                        self.current.line,
                        format!("unexpected trailing token: {:?}", self.current.text),
                    ));
                }
            }
        }

        // Explicit `.node`s first, then the rest in sorted order so node
        // numbering does not depend on hashing.
        let mut implicit: Vec<String> = node_set
            .into_iter()
            .filter(|n| n != "0" && !ast.nodes.contains(n))
            .collect();
        implicit.sort();
        ast.nodes.extend(implicit);

        Ok(ast)
    }

    fn advance(&mut self) -> Result<()> {
        self.current = self.lexer.next_token()?;
        Ok(())
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.current.kind == kind {
            let tok = self.current.clone();
            self.advance()?;
            Ok(tok)
        } else {
            Err(TubesimError::parse(
                self.current.line,
                format!("expected {:?}, got {:?}", kind, self.current.kind),
            ))
        }
    }

    /// A node name: an identifier, or an integer such as `0`.
    fn expect_node(&mut self) -> Result<String> {
        match self.current.kind {
            TokenKind::Identifier => Ok(normalize_node(self.expect(TokenKind::Identifier)?.text)),
            TokenKind::Number if is_node_number(&self.current.text) => {
                Ok(normalize_node(self.expect(TokenKind::Number)?.text))
            }
            _ => Err(TubesimError::parse(
                self.current.line,
                format!("expected node name, got {:?}", self.current.text),
            )),
        }
    }

    /// A plain number with optional unit suffix.
    fn expect_number(&mut self) -> Result<f64> {
        let line = self.current.line;
        let text = match self.current.kind {
            TokenKind::Number | TokenKind::Identifier => self.current.text.clone(),
            _ => return Err(TubesimError::parse(line, "expected a number")),
        };
        self.advance()?;
        parse_value(&text)
            .ok_or_else(|| TubesimError::parse(line, format!("invalid number: {}", text)))
    }

    /// A number or a braced expression.
    fn expect_value(&mut self) -> Result<Expr> {
        if self.current.kind == TokenKind::Expression {
            let tok = self.expect(TokenKind::Expression)?;
            return parse_expression(&tok);
        }
        self.expect_number().map(Expr::constant)
    }

    fn at_line_end(&self) -> bool {
        matches!(self.current.kind, TokenKind::Newline | TokenKind::Eof)
    }

    fn parse_directive(&mut self, ast: &mut CircuitAst) -> Result<()> {
        let directive = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        match directive.to_lowercase().as_str() {
            ".input" => {
                ast.input_node = Some(self.expect_node()?);
                if self.current.kind == TokenKind::Identifier {
                    ast.input_name = Some(self.expect(TokenKind::Identifier)?.text);
                }
            }
            ".output" => {
                ast.output_node = Some(self.expect_node()?);
            }
            ".node" => {
                let node = self.expect_node()?;
                if node != "0" && !ast.nodes.contains(&node) {
                    ast.nodes.push(node);
                }
            }
            ".param" => {
                let name = self.expect(TokenKind::Identifier)?.text;
                if self.current.kind == TokenKind::Equals {
                    self.advance()?;
                }
                let default = self.expect_number()?;
                if ast.params.iter().any(|p| p.name == name) {
                    return Err(TubesimError::DuplicateDefinition { name });
                }
                ast.params.push(ParamDef {
                    name,
                    default,
                    line,
                });
            }
            ".model" => {
                let model = self.parse_model_def(line)?;
                if ast.models.contains_key(&model.name) {
                    return Err(TubesimError::DuplicateDefinition { name: model.name });
                }
                ast.models.insert(model.name.clone(), model);
            }
            _ => {
                return Err(TubesimError::parse(
                    line,
                    format!("unknown directive: {}", directive),
                ));
            }
        }

        Ok(())
    }

    fn parse_model_def(&mut self, line: usize) -> Result<ModelDef> {
        let name = self.expect(TokenKind::Identifier)?.text;
        let type_str = self.expect(TokenKind::Identifier)?.text;

        let model_type: ModelType = type_str
            .parse()
            .map_err(|message: String| TubesimError::parse(line, message))?;

        let mut params = HashMap::new();

        // Parse parameters in parentheses: (param=value param2=value2)
        if self.current.kind == TokenKind::OpenParen {
            self.advance()?;

            while self.current.kind != TokenKind::CloseParen && !self.at_line_end() {
                let param_name = self.expect(TokenKind::Identifier)?.text;
                self.expect(TokenKind::Equals)?;
                let value = self.expect_number()?;
                params.insert(param_name.to_lowercase(), value);
            }

            self.expect(TokenKind::CloseParen)?;
        }

        Ok(ModelDef {
            name,
            model_type,
            params,
            line,
        })
    }

    fn parse_component(&mut self) -> Result<ComponentDef> {
        let first_token = self.current.text.clone();
        let line = self.current.line;
        self.advance()?;

        // Keywords first; their element name follows
        let (component_type, name) = match ComponentType::from_keyword(&first_token) {
            Some(ct) => (ct, self.expect(TokenKind::Identifier)?.text),
            None => {
                let ct = ComponentType::from_name(&first_token).ok_or_else(|| {
                    TubesimError::UnknownComponentType {
                        component_type: first_token.clone(),
                        line,
                    }
                })?;
                (ct, first_token)
            }
        };

        let terminals = component_type.terminals();
        let expected_nodes = terminals.len();
        let mut nodes = Vec::with_capacity(expected_nodes);
        while nodes.len() < expected_nodes && !self.at_line_end() {
            nodes.push(self.expect_node()?);
        }
        if nodes.len() < expected_nodes {
            return Err(TubesimError::invalid_component(
                &name,
                line,
                format!("expected nodes ({}), got {}", terminals.join(" "), nodes.len()),
            ));
        }

        let mut value = None;
        let mut model_ref = None;
        let mut params = HashMap::new();

        // Values, models and key=value parameters until end of line
        while !self.at_line_end() {
            match self.current.kind {
                TokenKind::Identifier => {
                    let text = self.current.text.clone();
                    self.advance()?;

                    if self.current.kind == TokenKind::Equals {
                        self.advance()?;
                        params.insert(text.to_lowercase(), self.expect_value()?);
                    } else if matches!(text.to_uppercase().as_str(), "DC" | "AC") {
                        // Source keyword followed by its value
                        params.insert(text.to_lowercase(), self.expect_value()?);
                    } else if let Some(v) = parse_value(&text) {
                        set_value(&mut value, &mut params, Expr::constant(v));
                    } else {
                        model_ref = Some(text);
                    }
                }
                TokenKind::Number | TokenKind::Expression => {
                    let v = self.expect_value()?;
                    set_value(&mut value, &mut params, v);
                }
                _ => {
                    return Err(TubesimError::parse(
                        line,
                        format!("unexpected {:?} in component '{}'", self.current.text, name),
                    ));
                }
            }
        }

        Ok(ComponentDef {
            component_type,
            name,
            nodes,
            value,
            model_ref,
            params,
            line,
        })
    }
}

/// The first bare value is the component value; a second one is the
/// potentiometer position.
fn set_value(value: &mut Option<Expr>, params: &mut HashMap<String, Expr>, v: Expr) {
    if value.is_none() {
        *value = Some(v);
    } else {
        params.insert("position".to_string(), v);
    }
}

fn parse_expression(tok: &Token) -> Result<Expr> {
    expr::parse(&tok.text).map_err(|e| {
        TubesimError::parse(tok.line, format!("in expression {{{}}}: {}", tok.text, e))
    })
}

fn is_node_number(text: &str) -> bool {
    !text.is_empty() && text.chars().all(|c| c.is_ascii_digit())
}

fn normalize_node(name: String) -> String {
    if name.eq_ignore_ascii_case("GND") {
        "0".to_string()
    } else {
        name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dsl::parse;

    #[test]
    fn test_parse_resistor() {
        let input = "R1 in out 10k";
        let ast = parse(input).unwrap();
        assert_eq!(ast.components.len(), 1);
        assert_eq!(ast.components[0].component_type, ComponentType::Resistor);
        assert_eq!(ast.components[0].name, "R1");
        assert_eq!(ast.components[0].nodes, vec!["in", "out"]);
        assert_eq!(ast.components[0].value, Some(Expr::constant(10_000.0)));
    }

    #[test]
    fn test_parse_input_output() {
        let input = ".input in guitar\n.output out\nR1 in out 1k";
        let ast = parse(input).unwrap();
        assert_eq!(ast.input_node, Some("in".to_string()));
        assert_eq!(ast.input_name, Some("guitar".to_string()));
        assert_eq!(ast.output_node, Some("out".to_string()));
    }

    #[test]
    fn test_parse_model() {
        let input = ".model DCLIP D (is=1e-14 n=1.8)";
        let ast = parse(input).unwrap();
        assert!(ast.models.contains_key("DCLIP"));
        let model = &ast.models["DCLIP"];
        assert_eq!(model.model_type, ModelType::Diode);
        assert!((model.params["is"] - 1e-14).abs() < 1e-20);

        let ast = parse(".model 1N4148 D (is=2.52n)\nD1 a 0 1N4148").unwrap();
        assert!((ast.models["1N4148"].params["is"] - 2.52e-9).abs() < 1e-20);
        assert_eq!(ast.components[0].model_ref.as_deref(), Some("1N4148"));
    }

    #[test]
    fn test_parse_with_comments() {
        let input = "# This is a comment\nR1 in out 1k ; inline comment style\n";
        let ast = parse(input).unwrap();
        assert_eq!(ast.components.len(), 1);
    }

    #[test]
    fn test_parse_param_and_expression_value() {
        let input = ".param drive 0.5\nPOT1 a w 0 100k {drive}\nV1 vcc GND DC 9\nVS s 0 AC 0.5";
        let ast = parse(input).unwrap();
        assert_eq!(
            ast.params,
            vec![ParamDef {
                name: "drive".into(),
                default: 0.5,
                line: 1
            }]
        );
        let pot = &ast.components[0];
        assert_eq!(pot.component_type, ComponentType::Potentiometer);
        assert_eq!(pot.nodes, vec!["a", "w", "0"]);
        assert_eq!(pot.params["position"], Expr::variable("drive"));

        let v1 = &ast.components[1];
        assert_eq!(v1.nodes, vec!["vcc", "0"]);
        assert_eq!(v1.params["dc"], Expr::constant(9.0));
        assert_eq!(ast.components[2].params["ac"], Expr::constant(0.5));

        let mut nodes = ast.nodes.clone();
        nodes.sort();
        assert_eq!(nodes, vec!["a", "s", "vcc", "w"]);
    }

    #[test]
    fn test_parse_transformer() {
        let ast = parse("X1 pa 0 sa 0 {1/2}").unwrap();
        let x = &ast.components[0];
        assert_eq!(x.component_type, ComponentType::Transformer);
        assert_eq!(x.nodes.len(), 4);
        assert_eq!(x.value, Some(Expr::constant(0.5)));
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            parse("Z1 a b 1k"),
            Err(TubesimError::UnknownComponentType { .. })
        ));
        assert!(matches!(
            parse("R1 a"),
            Err(TubesimError::InvalidComponent { .. })
        ));
        assert!(matches!(
            parse(".param x 1\n.param x 2"),
            Err(TubesimError::DuplicateDefinition { .. })
        ));
        assert!(matches!(
            parse("R1 a b {1 +}"),
            Err(TubesimError::ParseError { line: 1, .. })
        ));
        assert!(matches!(parse(".bogus"), Err(TubesimError::ParseError { .. })));
    }
}
