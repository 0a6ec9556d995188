//! Arithmetic formula engine.
//!
//! Grammar, lowest precedence first:
//!
//! ```text
//! expr    = term (("+" | "-") term)*
//! term    = unary (("*" | "/") unary)*
//! unary   = ("-" | "+") unary | power
//! power   = primary ("^" unary)?
//! primary = number | ident | ident "(" expr ("," expr)* ")" | "(" expr ")"
//! ```
//!
//! `^` is right associative and binds tighter than unary minus, so `-2^2` is
//! `-4`. Division by zero follows IEEE semantics; callers decide what to do
//! with non-finite results.

use std::collections::HashMap;

use super::lexer::{tokenize, Token, TokenKind};
use super::{ExpressionEngine, ExpressionError, MATH_E};

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Number(f64),
    Variable(String),
    Negate(Box<Expr>),
    Binary(BinaryOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Expr>),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Pow,
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Token {
        // tokenize always ends with Eof, and `advance` never moves past it.
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }
        token
    }

    fn error_at(token: &Token, expected: &str) -> ExpressionError {
        ExpressionError::parse(
            format!("expected {}, found {}", expected, token.kind.describe()),
            token.line,
            token.column,
        )
    }

    fn expect(&mut self, kind: TokenKind, expected: &str) -> Result<(), ExpressionError> {
        if self.peek().kind == kind {
            self.advance();
            Ok(())
        } else {
            Err(Self::error_at(self.peek(), expected))
        }
    }

    fn parse(mut self) -> Result<Expr, ExpressionError> {
        let expr = self.expr()?;
        if self.peek().kind != TokenKind::Eof {
            return Err(Self::error_at(self.peek(), "an operator or end of input"));
        }
        Ok(expr)
    }

    fn expr(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Plus => BinaryOp::Add,
                TokenKind::Minus => BinaryOp::Sub,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Expr, ExpressionError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek().kind {
                TokenKind::Star => BinaryOp::Mul,
                TokenKind::Slash => BinaryOp::Div,
                _ => return Ok(left),
            };
            self.advance();
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, ExpressionError> {
        match self.peek().kind {
            TokenKind::Minus => {
                self.advance();
                Ok(Expr::Negate(Box::new(self.unary()?)))
            }
            TokenKind::Plus => {
                self.advance();
                self.unary()
            }
            _ => self.power(),
        }
    }

    fn power(&mut self) -> Result<Expr, ExpressionError> {
        let base = self.primary()?;
        if self.peek().kind == TokenKind::Caret {
            self.advance();
            let exponent = self.unary()?;
            return Ok(Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)));
        }
        Ok(base)
    }

    fn primary(&mut self) -> Result<Expr, ExpressionError> {
        let token = self.advance();
        match token.kind {
            TokenKind::Number(n) => Ok(Expr::Number(n)),
            TokenKind::Ident(name) => {
                if self.peek().kind != TokenKind::LParen {
                    return Ok(Expr::Variable(name));
                }
                self.advance();
                let mut args = vec![self.expr()?];
                while self.peek().kind == TokenKind::Comma {
                    self.advance();
                    args.push(self.expr()?);
                }
                self.expect(TokenKind::RParen, "')'")?;
                Ok(Expr::Call(name, args))
            }
            TokenKind::LParen => {
                let inner = self.expr()?;
                self.expect(TokenKind::RParen, "')'")?;
                Ok(inner)
            }
            _ => Err(Self::error_at(&token, "a number, variable or '('")),
        }
    }
}

fn parse(formula: &str) -> Result<Expr, ExpressionError> {
    Parser {
        tokens: tokenize(formula)?,
        pos: 0,
    }
    .parse()
}

fn collect_names(expr: &Expr, names: &mut Vec<String>) {
    match expr {
        Expr::Number(_) => {}
        Expr::Variable(name) => {
            if name != MATH_E && !names.contains(name) {
                names.push(name.clone());
            }
        }
        Expr::Negate(inner) => collect_names(inner, names),
        Expr::Binary(_, left, right) => {
            collect_names(left, names);
            collect_names(right, names);
        }
        Expr::Call(_, args) => {
            for arg in args {
                collect_names(arg, names);
            }
        }
    }
}

fn eval(expr: &Expr, context: &HashMap<String, f64>) -> Result<f64, ExpressionError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Variable(name) if name == MATH_E => Ok(std::f64::consts::E),
        Expr::Variable(name) => context
            .get(name)
            .copied()
            .ok_or_else(|| ExpressionError::UnknownVariable(name.clone())),
        Expr::Negate(inner) => Ok(-eval(inner, context)?),
        Expr::Binary(op, left, right) => {
            let (l, r) = (eval(left, context)?, eval(right, context)?);
            Ok(match op {
                BinaryOp::Add => l + r,
                BinaryOp::Sub => l - r,
                BinaryOp::Mul => l * r,
                BinaryOp::Div => l / r,
                BinaryOp::Pow => l.powf(r),
            })
        }
        Expr::Call(name, args) => {
            let values = args
                .iter()
                .map(|arg| eval(arg, context))
                .collect::<Result<Vec<_>, _>>()?;
            call(name, &values)
        }
    }
}

fn call(name: &str, args: &[f64]) -> Result<f64, ExpressionError> {
    let unary = |f: fn(f64) -> f64| -> Result<f64, ExpressionError> {
        match args {
            [x] => Ok(f(*x)),
            _ => Err(ExpressionError::Arity {
                function: name.to_string(),
                expected: 1,
                found: args.len(),
            }),
        }
    };

    match name {
        "abs" => unary(f64::abs),
        "sqrt" => unary(f64::sqrt),
        "exp" => unary(f64::exp),
        "ln" | "log" => unary(f64::ln),
        "log10" => unary(f64::log10),
        // Halves round toward positive infinity.
        "round" => unary(|x| (x + 0.5).floor()),
        "floor" => unary(f64::floor),
        "ceil" => unary(f64::ceil),
        "min" | "max" if args.is_empty() => Err(ExpressionError::Arity {
            function: name.to_string(),
            expected: 1,
            found: 0,
        }),
        "min" => Ok(args.iter().copied().fold(f64::INFINITY, f64::min)),
        "max" => Ok(args.iter().copied().fold(f64::NEG_INFINITY, f64::max)),
        _ => Err(ExpressionError::UnknownFunction(name.to_string())),
    }
}

/// The built-in [`ExpressionEngine`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ArithmeticEngine;

impl ArithmeticEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ExpressionEngine for ArithmeticEngine {
    fn names(&self, formula: &str) -> Result<Vec<String>, ExpressionError> {
        let expr = parse(formula)?;
        let mut names = Vec::new();
        collect_names(&expr, &mut names);
        Ok(names)
    }

    fn evaluate(&self, formula: &str, context: &HashMap<String, f64>) -> Result<f64, ExpressionError> {
        eval(&parse(formula)?, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval_str(formula: &str, vars: &[(&str, f64)]) -> Result<f64, ExpressionError> {
        let context = vars.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        ArithmeticEngine.evaluate(formula, &context)
    }

    #[test]
    fn test_precedence() {
        assert_eq!(eval_str("1 + 2 * 3", &[]).unwrap(), 7.0);
        assert_eq!(eval_str("(1 + 2) * 3", &[]).unwrap(), 9.0);
        assert_eq!(eval_str("10 - 4 - 3", &[]).unwrap(), 3.0);
        assert_eq!(eval_str("2 ^ 3 ^ 2", &[]).unwrap(), 512.0);
        assert_eq!(eval_str("-2 ^ 2", &[]).unwrap(), -4.0);
        assert_eq!(eval_str("2 ^ -1", &[]).unwrap(), 0.5);
    }

    #[test]
    fn test_variables_and_functions() {
        let result = eval_str("max(MAT, MAP / 100) + abs(-1)", &[("MAT", 12.5), ("MAP", 800.0)]).unwrap();
        assert_eq!(result, 13.5);
        assert_eq!(eval_str("round(2.5) + floor(1.9) + ceil(0.1)", &[]).unwrap(), 5.0);
        assert!((eval_str("ln(math_e)", &[]).unwrap() - 1.0).abs() < 1e-12);
        assert_eq!(eval_str("log10(1000)", &[]).unwrap(), 3.0);
    }

    #[test]
    fn test_division_by_zero_is_not_an_error() {
        assert!(eval_str("1 / 0", &[]).unwrap().is_infinite());
    }

    #[test]
    fn test_unknown_variable() {
        assert_eq!(
            eval_str("MAT + 1", &[]),
            Err(ExpressionError::UnknownVariable("MAT".to_string()))
        );
    }

    #[test]
    fn test_function_errors() {
        assert_eq!(
            eval_str("sqrt(1, 2)", &[]),
            Err(ExpressionError::Arity {
                function: "sqrt".to_string(),
                expected: 1,
                found: 2,
            })
        );
        assert_eq!(
            eval_str("cube(2)", &[]),
            Err(ExpressionError::UnknownFunction("cube".to_string()))
        );
    }

    #[test]
    fn test_names_deduplicated_in_order() {
        let names = ArithmeticEngine.names("MAP + MAT * MAP + math_e + max(LAT, 1)").unwrap();
        assert_eq!(names, ["MAP", "MAT", "LAT"]);
    }

    #[test]
    fn test_parse_error_position() {
        let err = ArithmeticEngine.names("MAT +\n  * 2").unwrap_err();
        assert_eq!(
            err,
            ExpressionError::Parse {
                message: "expected a number, variable or '(', found '*'".to_string(),
                line: 2,
                column: 3,
            }
        );
    }

    #[test]
    fn test_trailing_tokens_rejected() {
        assert!(matches!(
            ArithmeticEngine.names("MAT MAP"),
            Err(ExpressionError::Parse { column: 5, .. })
        ));
        assert!(matches!(
            ArithmeticEngine.names("(MAT"),
            Err(ExpressionError::Parse { .. })
        ));
    }
}
