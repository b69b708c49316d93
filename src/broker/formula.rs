//! Sandboxed arithmetic formulas
//!
//! Supports exact decimal literals, scope variables, `+ - * /`, unary minus,
//! parentheses and a fixed set of functions:
//!
//! | function          | arity | result                               |
//! |-------------------|-------|--------------------------------------|
//! | `max(a, b, ...)`  | 1+    | largest argument                     |
//! | `min(a, b, ...)`  | 1+    | smallest argument                    |
//! | `abs(x)`          | 1     | absolute value                       |
//! | `round(x, dp)`    | 2     | banker's rounding to `dp` places     |
//! | `ceil(x)`         | 1     | smallest integer not below `x`       |
//! | `floor(x)`        | 1     | largest integer not above `x`        |
//!
//! `dp` must be a whole number literal between 0 and 28. Nothing outside the
//! evaluation scope is reachable from a formula. Formulas are limited to
//! 1024 bytes and 64 levels of nesting.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::expression::{checked_add, checked_div, checked_mul, checked_sub, Scope};
use crate::common::errors::{CalculatorError, Result};

const MAX_ROUND_DP: u32 = 28;
const MAX_SOURCE_LEN: usize = 1024;
const MAX_NESTING_DEPTH: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BinaryOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Function {
    Max,
    Min,
    Abs,
    Ceil,
    Floor,
}

impl Function {
    fn lookup(name: &str) -> Option<(Function, usize, Option<usize>)> {
        // (function, min args, max args)
        match name {
            "max" => Some((Function::Max, 1, None)),
            "min" => Some((Function::Min, 1, None)),
            "abs" => Some((Function::Abs, 1, Some(1))),
            "ceil" => Some((Function::Ceil, 1, Some(1))),
            "floor" => Some((Function::Floor, 1, Some(1))),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Number(Decimal),
    Variable(String),
    Negate(Box<Node>),
    Binary {
        op: BinaryOp,
        left: Box<Node>,
        right: Box<Node>,
    },
    Call {
        function: Function,
        args: Vec<Node>,
    },
    Round {
        value: Box<Node>,
        dp: u32,
    },
}

impl Node {
    fn evaluate(&self, scope: &Scope) -> Result<Decimal> {
        match self {
            Node::Number(value) => Ok(*value),
            Node::Variable(name) => scope.get(name),
            Node::Negate(inner) => Ok(-inner.evaluate(scope)?),
            Node::Binary { op, left, right } => {
                let l = left.evaluate(scope)?;
                let r = right.evaluate(scope)?;
                match op {
                    BinaryOp::Add => checked_add(l, r, "formula"),
                    BinaryOp::Subtract => checked_sub(l, r, "formula"),
                    BinaryOp::Multiply => checked_mul(l, r, "formula"),
                    BinaryOp::Divide => checked_div(l, r, "formula"),
                }
            }
            Node::Call { function, args } => {
                let mut values = args.iter().map(|arg| arg.evaluate(scope));
                // Arity was checked at parse time, so there is always a first argument
                let first = values.next().unwrap_or(Ok(Decimal::ZERO))?;
                match function {
                    Function::Max => {
                        values.try_fold(first, |acc, v: Result<Decimal>| -> Result<Decimal> {
                            Ok(acc.max(v?))
                        })
                    }
                    Function::Min => {
                        values.try_fold(first, |acc, v: Result<Decimal>| -> Result<Decimal> {
                            Ok(acc.min(v?))
                        })
                    }
                    Function::Abs => Ok(first.abs()),
                    Function::Ceil => Ok(first.ceil()),
                    Function::Floor => Ok(first.floor()),
                }
            }
            Node::Round { value, dp } => Ok(value.evaluate(scope)?.round_dp(*dp)),
        }
    }

    fn collect_variables(&self, out: &mut Vec<String>) {
        match self {
            Node::Number(_) => {}
            Node::Variable(name) => {
                if !out.contains(name) {
                    out.push(name.clone());
                }
            }
            Node::Negate(inner) => inner.collect_variables(out),
            Node::Binary { left, right, .. } => {
                left.collect_variables(out);
                right.collect_variables(out);
            }
            Node::Call { args, .. } => args.iter().for_each(|arg| arg.collect_variables(out)),
            Node::Round { value, .. } => value.collect_variables(out),
        }
    }
}

/// A parsed formula, kept together with its source text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Formula {
    source: String,
    root: Node,
}

impl Formula {
    pub fn parse(source: &str) -> Result<Self> {
        if source.len() > MAX_SOURCE_LEN {
            return Err(parse_error(MAX_SOURCE_LEN, "formula too long"));
        }
        let tokens = tokenize(source)?;
        let mut parser = Parser {
            tokens: &tokens,
            pos: 0,
            end: source.len(),
            depth: 0,
        };
        let root = parser.expression()?;
        if let Some(token) = parser.peek() {
            return Err(parse_error(token.position, "unexpected trailing input"));
        }
        Ok(Self {
            source: source.to_string(),
            root,
        })
    }

    pub fn evaluate(&self, scope: &Scope) -> Result<Decimal> {
        self.root.evaluate(scope)
    }

    /// Distinct variable names in order of first appearance
    pub fn variables(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.root.collect_variables(&mut out);
        out
    }
}

impl FromStr for Formula {
    type Err = CalculatorError;

    fn from_str(s: &str) -> Result<Self> {
        Formula::parse(s)
    }
}

impl TryFrom<String> for Formula {
    type Error = CalculatorError;

    fn try_from(value: String) -> Result<Self> {
        Formula::parse(&value)
    }
}

impl From<Formula> for String {
    fn from(formula: Formula) -> Self {
        formula.source
    }
}

impl std::fmt::Display for Formula {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.source)
    }
}

fn parse_error(position: usize, message: impl Into<String>) -> CalculatorError {
    CalculatorError::FormulaParse {
        position,
        message: message.into(),
    }
}

#[derive(Debug, Clone, PartialEq)]
enum TokenKind {
    Number(Decimal),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    LParen,
    RParen,
    Comma,
}

#[derive(Debug, Clone)]
struct Token {
    kind: TokenKind,
    position: usize,
}

fn tokenize(source: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some(&(position, c)) = chars.peek() {
        let kind = match c {
            c if c.is_whitespace() => {
                chars.next();
                continue;
            }
            '0'..='9' | '.' => {
                let mut end = position;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                let literal = &source[position..end];
                let value = Decimal::from_str(literal)
                    .map_err(|e| parse_error(position, format!("invalid number '{literal}': {e}")))?;
                TokenKind::Number(value)
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = position;
                while let Some(&(i, d)) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        end = i + d.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                TokenKind::Ident(source[position..end].to_string())
            }
            _ => {
                chars.next();
                match c {
                    '+' => TokenKind::Plus,
                    '-' => TokenKind::Minus,
                    '*' => TokenKind::Star,
                    '/' => TokenKind::Slash,
                    '(' => TokenKind::LParen,
                    ')' => TokenKind::RParen,
                    ',' => TokenKind::Comma,
                    other => {
                        return Err(parse_error(position, format!("unexpected character '{other}'")))
                    }
                }
            }
        };
        tokens.push(Token { kind, position });
    }

    Ok(tokens)
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    end: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<&'a Token> {
        self.tokens.get(self.pos)
    }

    fn advance(&mut self) -> Option<&'a Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn position(&self) -> usize {
        self.peek().map(|t| t.position).unwrap_or(self.end)
    }

    fn eat(&mut self, kind: &TokenKind) -> bool {
        match self.peek() {
            Some(token) if &token.kind == kind => {
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    fn expect(&mut self, kind: TokenKind, what: &str) -> Result<()> {
        if self.eat(&kind) {
            Ok(())
        } else {
            Err(parse_error(self.position(), format!("expected {what}")))
        }
    }

    fn expression(&mut self) -> Result<Node> {
        let mut node = self.term()?;
        loop {
            let op = if self.eat(&TokenKind::Plus) {
                BinaryOp::Add
            } else if self.eat(&TokenKind::Minus) {
                BinaryOp::Subtract
            } else {
                return Ok(node);
            };
            let right = self.term()?;
            node = Node::Binary {
                op,
                left: Box::new(node),
                right: Box::new(right),
            };
        }
    }

    fn term(&mut self) -> Result<Node> {
        let mut node = self.unary()?;
        loop {
            let op = if self.eat(&TokenKind::Star) {
                BinaryOp::Multiply
            } else if self.eat(&TokenKind::Slash) {
                BinaryOp::Divide
            } else {
                return Ok(node);
            };
            let right = self.unary()?;
            node = Node::Binary {
                op,
                left: Box::new(node),
                right: Box::new(right),
            };
        }
    }

    // Every recursive path (negation, parentheses, call arguments) passes
    // through here, so this is where nesting is bounded.
    fn unary(&mut self) -> Result<Node> {
        self.depth += 1;
        if self.depth > MAX_NESTING_DEPTH {
            return Err(parse_error(self.position(), "formula nested too deeply"));
        }
        let node = self.signed();
        self.depth -= 1;
        node
    }

    fn signed(&mut self) -> Result<Node> {
        if self.eat(&TokenKind::Minus) {
            return Ok(Node::Negate(Box::new(self.unary()?)));
        }
        if self.eat(&TokenKind::Plus) {
            return self.unary();
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Node> {
        let position = self.position();
        let token = self
            .advance()
            .ok_or_else(|| parse_error(position, "unexpected end of formula"))?;

        match &token.kind {
            TokenKind::Number(value) => Ok(Node::Number(*value)),
            TokenKind::LParen => {
                let inner = self.expression()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            TokenKind::Ident(name) => {
                if self.eat(&TokenKind::LParen) {
                    self.call(name, token.position)
                } else {
                    Ok(Node::Variable(name.clone()))
                }
            }
            other => Err(parse_error(token.position, format!("unexpected token {other:?}"))),
        }
    }

    fn arguments(&mut self) -> Result<Vec<Node>> {
        let mut args = Vec::new();
        if self.eat(&TokenKind::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.expression()?);
            if self.eat(&TokenKind::Comma) {
                continue;
            }
            self.expect(TokenKind::RParen, "',' or ')'")?;
            return Ok(args);
        }
    }

    fn call(&mut self, name: &str, position: usize) -> Result<Node> {
        let mut args = self.arguments()?;

        if name == "round" {
            if args.len() != 2 {
                return Err(parse_error(position, "round() takes exactly 2 arguments"));
            }
            let dp = match args.pop() {
                Some(Node::Number(dp)) if dp.fract().is_zero() => dp
                    .to_u32()
                    .filter(|dp| *dp <= MAX_ROUND_DP)
                    .ok_or_else(|| parse_error(position, "round() precision out of range"))?,
                _ => {
                    return Err(parse_error(
                        position,
                        "round() precision must be a whole number literal",
                    ))
                }
            };
            let value = args.pop().map(Box::new).ok_or_else(|| {
                parse_error(position, "round() takes exactly 2 arguments")
            })?;
            return Ok(Node::Round { value, dp });
        }

        let (function, min, max) = Function::lookup(name)
            .ok_or_else(|| parse_error(position, format!("unknown function '{name}'")))?;
        if args.len() < min || max.is_some_and(|max| args.len() > max) {
            return Err(parse_error(
                position,
                format!("wrong number of arguments to {name}(): {}", args.len()),
            ));
        }
        Ok(Node::Call { function, args })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn eval(source: &str, scope: &Scope) -> Result<Decimal> {
        Formula::parse(source)?.evaluate(scope)
    }

    #[test]
    fn test_commission_formula() {
        let scope = Scope::new(dec!(10800));
        assert_eq!(eval("max(0.0025 * grossTradeAmt, 20)", &scope).unwrap(), dec!(27));
        let small = Scope::new(dec!(1000));
        assert_eq!(eval("max(0.0025 * grossTradeAmt, 20)", &small).unwrap(), dec!(20));
    }

    #[test]
    fn test_precedence_and_parentheses() {
        let scope = Scope::new(dec!(10));
        assert_eq!(eval("1 + 2 * 3", &scope).unwrap(), dec!(7));
        assert_eq!(eval("(1 + 2) * 3", &scope).unwrap(), dec!(9));
        assert_eq!(eval("grossTradeAmt - 4 / 2", &scope).unwrap(), dec!(8));
        assert_eq!(eval("-grossTradeAmt + 1", &scope).unwrap(), dec!(-9));
    }

    #[test]
    fn test_functions() {
        let scope = Scope::new(dec!(3.14159));
        assert_eq!(eval("min(grossTradeAmt, 2, 5)", &scope).unwrap(), dec!(2));
        assert_eq!(eval("abs(0 - grossTradeAmt)", &scope).unwrap(), dec!(3.14159));
        assert_eq!(eval("round(grossTradeAmt, 2)", &scope).unwrap(), dec!(3.14));
        assert_eq!(eval("ceil(grossTradeAmt)", &scope).unwrap(), dec!(4));
        assert_eq!(eval("floor(grossTradeAmt)", &scope).unwrap(), dec!(3));
    }

    #[test]
    fn test_round_is_bankers() {
        let scope = Scope::new(dec!(2.345));
        assert_eq!(eval("round(grossTradeAmt, 2)", &scope).unwrap(), dec!(2.34));
    }

    #[test]
    fn test_unknown_variable_at_evaluation() {
        let scope = Scope::new(dec!(100));
        assert_eq!(
            eval("0.12 * commission", &scope),
            Err(CalculatorError::UnknownVariable("commission".to_string()))
        );
    }

    #[test]
    fn test_division_by_zero() {
        let scope = Scope::new(Decimal::ZERO);
        assert!(matches!(
            eval("1 / grossTradeAmt", &scope),
            Err(CalculatorError::DivisionByZero(_))
        ));
    }

    #[test]
    fn test_parse_errors() {
        for bad in ["", "1 +", "max(1, 2", "pow(2, 3)", "abs()", "round(1)", "round(1, x)", "1 $ 2", "(1))"] {
            assert!(
                matches!(Formula::parse(bad), Err(CalculatorError::FormulaParse { .. })),
                "expected parse error for {bad:?}"
            );
        }
    }

    #[test]
    fn test_parse_error_position() {
        match Formula::parse("1 + $") {
            Err(CalculatorError::FormulaParse { position, .. }) => assert_eq!(position, 4),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_nesting_limit() {
        let scope = Scope::new(dec!(1));
        assert_eq!(eval(&format!("{}1", "-".repeat(10)), &scope).unwrap(), dec!(1));
        assert_eq!(eval("((((grossTradeAmt))))", &scope).unwrap(), dec!(1));

        for deep in [
            format!("{}1", "-".repeat(65)),
            format!("{}1{}", "(".repeat(100), ")".repeat(100)),
            format!("{}1{}", "abs(".repeat(100), ")".repeat(100)),
        ] {
            match Formula::parse(&deep) {
                Err(CalculatorError::FormulaParse { message, .. }) => {
                    assert_eq!(message, "formula nested too deeply")
                }
                other => panic!("unexpected result: {other:?}"),
            }
        }
    }

    #[test]
    fn test_oversized_formula_rejected() {
        // Well past the length limit; must fail cleanly instead of recursing
        let long = format!("{}1", "-".repeat(20000));
        assert!(matches!(
            Formula::parse(&long),
            Err(CalculatorError::FormulaParse { .. })
        ));

        let chain = vec!["1"; 600].join("+");
        assert!(matches!(
            Formula::parse(&chain),
            Err(CalculatorError::FormulaParse { .. })
        ));
    }

    #[test]
    fn test_variables() {
        let formula = Formula::parse("0.12 * commission + commission / grossTradeAmt").unwrap();
        assert_eq!(formula.variables(), vec!["commission", "grossTradeAmt"]);
    }

    #[test]
    fn test_serde_as_source_string() {
        let formula = Formula::parse("0.005 * grossTradeAmt").unwrap();
        assert_eq!(serde_json::to_string(&formula).unwrap(), "\"0.005 * grossTradeAmt\"");
        assert!(serde_json::from_str::<Formula>("\"0.005 *\"").is_err());
    }
}
