//! Numeric expression evaluator
//!
//! A closed expression sublanguage for the `compute` tool: arithmetic,
//! scalar math functions, and aggregates over tables extracted into the
//! current `RunContext`. Model-supplied input is interpreted against
//! this grammar only; nothing here reaches a host interpreter.
//!
//! Grammar:
//!
//! ```text
//! expr    := term (('+' | '-') term)*
//! term    := unary (('*' | '/' | '%') unary)*
//! unary   := '-' unary | primary
//! primary := NUMBER | call | '(' expr ')'
//! call    := IDENT '(' arg (',' arg)* ')'
//! arg     := IDENT ('.' IDENT)? | expr
//! ```
//!
//! Aggregates (`sum`, `avg`, `min`, `max`, `count`) take a
//! `table.column` reference (`count` also accepts a bare table name);
//! scalar functions (`abs`, `sqrt`, `floor`, `ceil`, `round`) take
//! numeric expressions.

use serde_json::Value;
use thiserror::Error;

use crate::context::RunContext;

#[derive(Error, Debug, PartialEq)]
pub enum EvalError {
    #[error("syntax error: {0}")]
    Syntax(String),

    #[error("unknown function '{0}'")]
    UnknownFunction(String),

    #[error("invalid argument for '{function}': {reason}")]
    InvalidArgument { function: String, reason: String },

    #[error("no table named '{0}' has been extracted into this run")]
    UnknownTable(String),

    #[error("table '{table}' has no column '{column}'")]
    UnknownColumn { table: String, column: String },

    #[error("column '{table}.{column}' holds non-numeric values")]
    NonNumeric { table: String, column: String },

    #[error("aggregate over empty column '{table}.{column}'")]
    EmptyColumn { table: String, column: String },

    #[error("division by zero")]
    DivisionByZero,
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f64),
    Ident(String),
    Plus,
    Minus,
    Star,
    Slash,
    Percent,
    LParen,
    RParen,
    Comma,
    Dot,
}

fn tokenize(input: &str) -> Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            ' ' | '\t' | '\n' | '\r' => {
                chars.next();
            }
            '0'..='9' => {
                let mut text = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_digit() || d == '.' {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                let value = text
                    .parse::<f64>()
                    .map_err(|_| EvalError::Syntax(format!("bad number '{}'", text)))?;
                tokens.push(Token::Number(value));
            }
            'a'..='z' | 'A'..='Z' | '_' => {
                let mut text = String::new();
                while let Some(&d) = chars.peek() {
                    if d.is_ascii_alphanumeric() || d == '_' {
                        text.push(d);
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(text));
            }
            '+' => {
                chars.next();
                tokens.push(Token::Plus);
            }
            '-' => {
                chars.next();
                tokens.push(Token::Minus);
            }
            '*' => {
                chars.next();
                tokens.push(Token::Star);
            }
            '/' => {
                chars.next();
                tokens.push(Token::Slash);
            }
            '%' => {
                chars.next();
                tokens.push(Token::Percent);
            }
            '(' => {
                chars.next();
                tokens.push(Token::LParen);
            }
            ')' => {
                chars.next();
                tokens.push(Token::RParen);
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '.' => {
                chars.next();
                tokens.push(Token::Dot);
            }
            other => {
                return Err(EvalError::Syntax(format!(
                    "unexpected character '{}'",
                    other
                )));
            }
        }
    }

    Ok(tokens)
}

#[derive(Debug, Clone, Copy)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

#[derive(Debug, Clone)]
enum Expr {
    Number(f64),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
    Call(String, Vec<Arg>),
}

#[derive(Debug, Clone)]
enum Arg {
    /// `table` or `table.column` reference
    Ref(String, Option<String>),
    Expr(Expr),
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_ahead(&self, n: usize) -> Option<&Token> {
        self.tokens.get(self.pos + n)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token, what: &str) -> Result<(), EvalError> {
        match self.advance() {
            Some(token) if token == expected => Ok(()),
            Some(token) => Err(EvalError::Syntax(format!(
                "expected {}, found {:?}",
                what, token
            ))),
            None => Err(EvalError::Syntax(format!(
                "expected {}, found end of input",
                what
            ))),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_term()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_term(&mut self) -> Result<Expr, EvalError> {
        let mut lhs = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                Some(Token::Percent) => BinOp::Rem,
                _ => break,
            };
            self.advance();
            let rhs = self.parse_unary()?;
            lhs = Expr::Binary(op, Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Expr, EvalError> {
        if matches!(self.peek(), Some(Token::Minus)) {
            self.advance();
            return Ok(Expr::Neg(Box::new(self.parse_unary()?)));
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Expr, EvalError> {
        match self.advance() {
            Some(Token::Number(n)) => Ok(Expr::Number(n)),
            Some(Token::LParen) => {
                let inner = self.parse_expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                if matches!(self.peek(), Some(Token::LParen)) {
                    self.advance();
                    let args = self.parse_args()?;
                    Ok(Expr::Call(name, args))
                } else {
                    Err(EvalError::Syntax(format!(
                        "bare identifier '{}'; table references are only valid inside aggregate calls",
                        name
                    )))
                }
            }
            Some(token) => Err(EvalError::Syntax(format!(
                "unexpected token {:?}",
                token
            ))),
            None => Err(EvalError::Syntax("unexpected end of input".to_string())),
        }
    }

    fn parse_args(&mut self) -> Result<Vec<Arg>, EvalError> {
        let mut args = Vec::new();

        if matches!(self.peek(), Some(Token::RParen)) {
            return Err(EvalError::Syntax("empty argument list".to_string()));
        }

        loop {
            args.push(self.parse_arg()?);
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                Some(token) => {
                    return Err(EvalError::Syntax(format!(
                        "expected ',' or ')', found {:?}",
                        token
                    )))
                }
                None => {
                    return Err(EvalError::Syntax(
                        "expected ',' or ')', found end of input".to_string(),
                    ))
                }
            }
        }

        Ok(args)
    }

    fn parse_arg(&mut self) -> Result<Arg, EvalError> {
        if let Some(Token::Ident(table)) = self.peek().cloned() {
            match self.peek_ahead(1) {
                Some(Token::Dot) => {
                    self.advance();
                    self.advance();
                    match self.advance() {
                        Some(Token::Ident(column)) => {
                            return Ok(Arg::Ref(table, Some(column)));
                        }
                        _ => {
                            return Err(EvalError::Syntax(format!(
                                "expected column name after '{}.'",
                                table
                            )))
                        }
                    }
                }
                Some(Token::Comma) | Some(Token::RParen) => {
                    self.advance();
                    return Ok(Arg::Ref(table, None));
                }
                _ => {}
            }
        }
        Ok(Arg::Expr(self.parse_expr()?))
    }
}

/// Evaluate an expression against the tables in `ctx`.
pub fn evaluate(input: &str, ctx: &RunContext) -> Result<f64, EvalError> {
    let tokens = tokenize(input)?;
    if tokens.is_empty() {
        return Err(EvalError::Syntax("empty expression".to_string()));
    }

    let mut parser = Parser { tokens, pos: 0 };
    let expr = parser.parse_expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(EvalError::Syntax(format!(
            "trailing input after expression: {:?}",
            parser.tokens[parser.pos]
        )));
    }

    eval_expr(&expr, ctx)
}

fn eval_expr(expr: &Expr, ctx: &RunContext) -> Result<f64, EvalError> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Neg(inner) => Ok(-eval_expr(inner, ctx)?),
        Expr::Binary(op, lhs, rhs) => {
            let l = eval_expr(lhs, ctx)?;
            let r = eval_expr(rhs, ctx)?;
            match op {
                BinOp::Add => Ok(l + r),
                BinOp::Sub => Ok(l - r),
                BinOp::Mul => Ok(l * r),
                BinOp::Div => {
                    if r == 0.0 {
                        Err(EvalError::DivisionByZero)
                    } else {
                        Ok(l / r)
                    }
                }
                BinOp::Rem => {
                    if r == 0.0 {
                        Err(EvalError::DivisionByZero)
                    } else {
                        Ok(l % r)
                    }
                }
            }
        }
        Expr::Call(name, args) => eval_call(name, args, ctx),
    }
}

fn eval_call(name: &str, args: &[Arg], ctx: &RunContext) -> Result<f64, EvalError> {
    match name {
        "sum" | "avg" | "min" | "max" => {
            let (table, column) = aggregate_ref(name, args)?;
            let values = column_values(ctx, &table, &column)?;
            if values.is_empty() {
                if name == "sum" {
                    return Ok(0.0);
                }
                return Err(EvalError::EmptyColumn { table, column });
            }
            Ok(match name {
                "sum" => values.iter().sum(),
                "avg" => values.iter().sum::<f64>() / values.len() as f64,
                "min" => values.iter().cloned().fold(f64::INFINITY, f64::min),
                _ => values.iter().cloned().fold(f64::NEG_INFINITY, f64::max),
            })
        }
        "count" => match args {
            [Arg::Ref(table, None)] => {
                let rows = ctx
                    .table(table)
                    .ok_or_else(|| EvalError::UnknownTable(table.clone()))?;
                Ok(rows.len() as f64)
            }
            [Arg::Ref(table, Some(column))] => {
                Ok(column_values(ctx, table, column)?.len() as f64)
            }
            _ => Err(EvalError::InvalidArgument {
                function: "count".to_string(),
                reason: "expects a table or table.column reference".to_string(),
            }),
        },
        "abs" | "sqrt" | "floor" | "ceil" => {
            let value = scalar_arg(name, args, ctx)?;
            Ok(match name {
                "abs" => value.abs(),
                "sqrt" => value.sqrt(),
                "floor" => value.floor(),
                _ => value.ceil(),
            })
        }
        "round" => match args {
            [a] => Ok(scalar_value(name, a, ctx)?.round()),
            [a, b] => {
                let value = scalar_value(name, a, ctx)?;
                let digits = scalar_value(name, b, ctx)?;
                let factor = 10f64.powi(digits as i32);
                Ok((value * factor).round() / factor)
            }
            _ => Err(EvalError::InvalidArgument {
                function: "round".to_string(),
                reason: format!("expects 1 or 2 arguments, got {}", args.len()),
            }),
        },
        other => Err(EvalError::UnknownFunction(other.to_string())),
    }
}

fn aggregate_ref(name: &str, args: &[Arg]) -> Result<(String, String), EvalError> {
    match args {
        [Arg::Ref(table, Some(column))] => Ok((table.clone(), column.clone())),
        _ => Err(EvalError::InvalidArgument {
            function: name.to_string(),
            reason: "expects a single table.column reference".to_string(),
        }),
    }
}

fn scalar_arg(name: &str, args: &[Arg], ctx: &RunContext) -> Result<f64, EvalError> {
    match args {
        [arg] => scalar_value(name, arg, ctx),
        _ => Err(EvalError::InvalidArgument {
            function: name.to_string(),
            reason: format!("expects 1 argument, got {}", args.len()),
        }),
    }
}

fn scalar_value(name: &str, arg: &Arg, ctx: &RunContext) -> Result<f64, EvalError> {
    match arg {
        Arg::Expr(expr) => eval_expr(expr, ctx),
        Arg::Ref(..) => Err(EvalError::InvalidArgument {
            function: name.to_string(),
            reason: "expects a numeric expression, not a column reference".to_string(),
        }),
    }
}

/// Non-null numeric values of a column. Nulls are skipped; any other
/// non-numeric value fails the whole evaluation.
fn column_values(ctx: &RunContext, table: &str, column: &str) -> Result<Vec<f64>, EvalError> {
    let rows = ctx
        .table(table)
        .ok_or_else(|| EvalError::UnknownTable(table.to_string()))?;

    if !rows.is_empty() && !rows.iter().any(|row| row.contains_key(column)) {
        return Err(EvalError::UnknownColumn {
            table: table.to_string(),
            column: column.to_string(),
        });
    }

    let mut values = Vec::with_capacity(rows.len());
    for row in &rows {
        match row.get(column) {
            None | Some(Value::Null) => continue,
            Some(Value::Number(n)) => {
                values.push(n.as_f64().ok_or_else(|| EvalError::NonNumeric {
                    table: table.to_string(),
                    column: column.to_string(),
                })?);
            }
            Some(Value::String(s)) => {
                // SQLite TEXT affinity can hand back numeric strings
                values.push(s.trim().parse::<f64>().map_err(|_| EvalError::NonNumeric {
                    table: table.to_string(),
                    column: column.to_string(),
                })?);
            }
            Some(_) => {
                return Err(EvalError::NonNumeric {
                    table: table.to_string(),
                    column: column.to_string(),
                });
            }
        }
    }

    Ok(values)
}

/// Format an evaluation result, dropping a trailing ".0" on integers.
pub fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}
