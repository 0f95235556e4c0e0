//! Calculator tool

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use crate::error::{Result, ToolServerError};
use crate::tool::{Tool, ToolDefinition};

/// Evaluates arithmetic expressions
pub struct CalculatorTool;

#[async_trait]
impl Tool for CalculatorTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "calculate".into(),
            description: "Evaluate a mathematical expression with + - * / ^ and parentheses".into(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "expression": {
                        "type": "string",
                        "description": "Expression to evaluate (e.g., '2 + 2', '(10 - 4) * 5')"
                    }
                },
                "required": ["expression"]
            }),
        }
    }

    async fn execute(&self, arguments: &Map<String, Value>) -> Result<String> {
        let expr = arguments
            .get("expression")
            .and_then(Value::as_str)
            .unwrap_or_default();

        let value = evaluate_expression(expr).map_err(ToolServerError::Execution)?;
        Ok(format!("{} = {}", expr.trim(), format_number(value)))
    }
}

/// Deepest nesting of parentheses, signs and exponents accepted
const MAX_DEPTH: usize = 256;

/// Whole numbers print without a fractional part
fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{:.0}", value)
    } else {
        value.to_string()
    }
}

/// Recursive-descent evaluator.
///
/// ```text
/// expr   := term (('+' | '-') term)*
/// term   := power (('*' | '/') power)*
/// power  := unary ('^' power)?
/// unary  := '-' unary | atom
/// atom   := number | '(' expr ')'
/// ```
pub fn evaluate_expression(expr: &str) -> std::result::Result<f64, String> {
    let tokens: Vec<char> = expr.chars().filter(|c| !c.is_whitespace()).collect();
    if tokens.is_empty() {
        return Err("Empty expression".into());
    }

    let mut parser = Parser { tokens: &tokens, pos: 0, depth: 0 };
    let value = parser.expr()?;
    if let Some(c) = parser.peek() {
        return Err(format!("Unexpected '{}' at position {}", c, parser.pos));
    }
    if !value.is_finite() {
        return Err("Result is not a finite number".into());
    }
    Ok(value)
}

struct Parser<'a> {
    tokens: &'a [char],
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.tokens.get(self.pos).copied()
    }

    fn eat(&mut self, c: char) -> bool {
        if self.peek() == Some(c) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    /// Run `f` one nesting level deeper
    fn nested<F>(&mut self, f: F) -> std::result::Result<f64, String>
    where
        F: FnOnce(&mut Self) -> std::result::Result<f64, String>,
    {
        if self.depth >= MAX_DEPTH {
            return Err("Expression nested too deeply".into());
        }
        self.depth += 1;
        let value = f(self);
        self.depth -= 1;
        value
    }

    fn expr(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.term()?;
        loop {
            if self.eat('+') {
                value += self.term()?;
            } else if self.eat('-') {
                value -= self.term()?;
            } else {
                return Ok(value);
            }
        }
    }

    fn term(&mut self) -> std::result::Result<f64, String> {
        let mut value = self.power()?;
        loop {
            if self.eat('*') {
                value *= self.power()?;
            } else if self.eat('/') {
                let divisor = self.power()?;
                if divisor == 0.0 {
                    return Err("Division by zero".into());
                }
                value /= divisor;
            } else {
                return Ok(value);
            }
        }
    }

    fn power(&mut self) -> std::result::Result<f64, String> {
        let base = self.unary()?;
        if self.eat('^') {
            // Right associative
            let exponent = self.nested(Self::power)?;
            return Ok(base.powf(exponent));
        }
        Ok(base)
    }

    fn unary(&mut self) -> std::result::Result<f64, String> {
        if self.eat('-') {
            return Ok(-self.nested(Self::unary)?);
        }
        if self.eat('+') {
            return self.nested(Self::unary);
        }
        self.atom()
    }

    fn atom(&mut self) -> std::result::Result<f64, String> {
        if self.eat('(') {
            let value = self.nested(Self::expr)?;
            if !self.eat(')') {
                return Err("Missing closing parenthesis".into());
            }
            return Ok(value);
        }

        let start = self.pos;
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_digit() || c == '.')
        {
            self.pos += 1;
        }

        if start == self.pos {
            return match self.peek() {
                Some(c) => Err(format!("Unexpected '{}' at position {}", c, self.pos)),
                None => Err("Unexpected end of expression".into()),
            };
        }

        let literal: String = self.tokens[start..self.pos].iter().collect();
        literal
            .parse::<f64>()
            .map_err(|e| format!("Parse error: {}", e))
    }
}
