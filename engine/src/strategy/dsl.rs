//! Restricted condition language for user-defined strategies
//!
//! A condition is a boolean expression over price series and indicator
//! terms, e.g.
//!
//! ```text
//! sma(10) crosses_above sma(20) and rsi(14) < 65
//! close <= bb_lower(20, 2.0) or macd_hist(12, 26, 9) > 0
//! ```
//!
//! Grammar (lowest precedence first):
//!
//! ```text
//! expr       := and_expr ( "or" and_expr )*
//! and_expr   := term ( "and" term )*
//! term       := "(" expr ")" | operand cmp operand
//! cmp        := ">" | ">=" | "<" | "<=" | "==" | "crosses_above" | "crosses_below"
//! operand    := number | "close" | "open" | "high" | "low" | "volume"
//!             | name "(" number ( "," number )* ")"
//! ```
//!
//! Rows where any referenced series is NaN evaluate to false.

use crate::data::BarFrame;
use crate::error::EngineError;
use crate::indicators::{
    calculate_adx, calculate_bollinger, calculate_ema, calculate_macd, calculate_rsi,
    calculate_sma,
};
use crate::Result;

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Number(f64),
    Close,
    Open,
    High,
    Low,
    Volume,
    Sma(usize),
    Ema(usize),
    Rsi(usize),
    Adx(usize),
    BbUpper(usize, f64),
    BbMiddle(usize, f64),
    BbLower(usize, f64),
    MacdLine(usize, usize, usize),
    MacdSignal(usize, usize, usize),
    MacdHist(usize, usize, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    CrossesAbove,
    CrossesBelow,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Compare {
        lhs: Operand,
        op: CmpOp,
        rhs: Operand,
    },
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Op(CmpOp),
    LParen,
    RParen,
    Comma,
    And,
    Or,
}

fn parse_err(message: impl Into<String>, position: usize) -> EngineError {
    EngineError::StrategyParse {
        message: message.into(),
        position,
    }
}

fn tokenize(source: &str) -> Result<Vec<(Token, usize)>> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let start = i;
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push((Token::LParen, start));
                i += 1;
            }
            ')' => {
                tokens.push((Token::RParen, start));
                i += 1;
            }
            ',' => {
                tokens.push((Token::Comma, start));
                i += 1;
            }
            '>' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push((Token::Op(CmpOp::Ge), start));
                    i += 2;
                } else {
                    tokens.push((Token::Op(CmpOp::Gt), start));
                    i += 1;
                }
            }
            '<' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push((Token::Op(CmpOp::Le), start));
                    i += 2;
                } else {
                    tokens.push((Token::Op(CmpOp::Lt), start));
                    i += 1;
                }
            }
            '=' => {
                if chars.get(i + 1) == Some(&'=') {
                    tokens.push((Token::Op(CmpOp::Eq), start));
                    i += 2;
                } else {
                    return Err(parse_err("expected '=='", start));
                }
            }
            c if c.is_ascii_digit() || c == '.' => {
                let mut end = i;
                while end < chars.len() && (chars[end].is_ascii_digit() || chars[end] == '.') {
                    end += 1;
                }
                let text: String = chars[i..end].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| parse_err(format!("bad number '{}'", text), start))?;
                tokens.push((Token::Number(value), start));
                i = end;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let mut end = i;
                while end < chars.len() && (chars[end].is_ascii_alphanumeric() || chars[end] == '_')
                {
                    end += 1;
                }
                let word: String = chars[i..end].iter().collect();
                let token = match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "crosses_above" => Token::Op(CmpOp::CrossesAbove),
                    "crosses_below" => Token::Op(CmpOp::CrossesBelow),
                    _ => Token::Ident(word),
                };
                tokens.push((token, start));
                i = end;
            }
            other => return Err(parse_err(format!("unexpected character '{}'", other), start)),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(Token, usize)>,
    pos: usize,
    source_len: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn position(&self) -> usize {
        self.tokens
            .get(self.pos)
            .map(|(_, p)| *p)
            .unwrap_or(self.source_len)
    }

    fn advance(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(t, _)| t.clone());
        self.pos += 1;
        token
    }

    fn expect(&mut self, wanted: Token, what: &str) -> Result<()> {
        let position = self.position();
        match self.advance() {
            Some(t) if t == wanted => Ok(()),
            _ => Err(parse_err(format!("expected {}", what), position)),
        }
    }

    fn expr(&mut self) -> Result<Expr> {
        let mut left = self.and_expr()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.and_expr()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and_expr(&mut self) -> Result<Expr> {
        let mut left = self.term()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.term()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn term(&mut self) -> Result<Expr> {
        if self.peek() == Some(&Token::LParen) {
            // lookahead: "(" starts a grouped expression only if it is not
            // a bare comparison; groups always contain and/or or nested parens,
            // so try the group first and fall back on failure
            let checkpoint = self.pos;
            self.advance();
            if let Ok(inner) = self.expr() {
                if self.peek() == Some(&Token::RParen) {
                    self.advance();
                    return Ok(inner);
                }
            }
            self.pos = checkpoint;
        }
        let lhs = self.operand()?;
        let position = self.position();
        let op = match self.advance() {
            Some(Token::Op(op)) => op,
            _ => return Err(parse_err("expected a comparison operator", position)),
        };
        let rhs = self.operand()?;
        Ok(Expr::Compare { lhs, op, rhs })
    }

    fn operand(&mut self) -> Result<Operand> {
        let position = self.position();
        match self.advance() {
            Some(Token::Number(n)) => Ok(Operand::Number(n)),
            Some(Token::Ident(name)) => match name.as_str() {
                "close" => Ok(Operand::Close),
                "open" => Ok(Operand::Open),
                "high" => Ok(Operand::High),
                "low" => Ok(Operand::Low),
                "volume" => Ok(Operand::Volume),
                _ => self.indicator(&name, position),
            },
            _ => Err(parse_err("expected a value or series", position)),
        }
    }

    fn indicator(&mut self, name: &str, position: usize) -> Result<Operand> {
        self.expect(Token::LParen, "'(' after indicator name")?;
        let mut args = Vec::new();
        loop {
            let arg_pos = self.position();
            match self.advance() {
                Some(Token::Number(n)) => args.push(n),
                _ => return Err(parse_err("expected a numeric argument", arg_pos)),
            }
            match self.advance() {
                Some(Token::Comma) => continue,
                Some(Token::RParen) => break,
                _ => return Err(parse_err("expected ',' or ')'", self.position())),
            }
        }
        let arity = |n: usize| -> Result<()> {
            if args.len() == n {
                Ok(())
            } else {
                Err(parse_err(
                    format!("{} takes {} argument(s), got {}", name, n, args.len()),
                    position,
                ))
            }
        };
        let p = |i: usize| args[i] as usize;
        match name {
            "sma" => arity(1).map(|_| Operand::Sma(p(0))),
            "ema" => arity(1).map(|_| Operand::Ema(p(0))),
            "rsi" => arity(1).map(|_| Operand::Rsi(p(0))),
            "adx" => arity(1).map(|_| Operand::Adx(p(0))),
            "bb_upper" => arity(2).map(|_| Operand::BbUpper(p(0), args[1])),
            "bb_middle" => arity(2).map(|_| Operand::BbMiddle(p(0), args[1])),
            "bb_lower" => arity(2).map(|_| Operand::BbLower(p(0), args[1])),
            "macd_line" => arity(3).map(|_| Operand::MacdLine(p(0), p(1), p(2))),
            "macd_signal" => arity(3).map(|_| Operand::MacdSignal(p(0), p(1), p(2))),
            "macd_hist" => arity(3).map(|_| Operand::MacdHist(p(0), p(1), p(2))),
            _ => Err(parse_err(format!("unknown indicator '{}'", name), position)),
        }
    }
}

/// Parse a condition expression.
pub fn parse(source: &str) -> Result<Expr> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(parse_err("empty condition", 0));
    }
    let mut parser = Parser {
        tokens,
        pos: 0,
        source_len: source.len(),
    };
    let expr = parser.expr()?;
    if parser.pos != parser.tokens.len() {
        return Err(parse_err("trailing input after condition", parser.position()));
    }
    Ok(expr)
}

/// Evaluate an expression over a frame to a per-row boolean mask.
pub fn evaluate(expr: &Expr, frame: &BarFrame) -> Vec<bool> {
    match expr {
        Expr::And(a, b) => {
            let left = evaluate(a, frame);
            let right = evaluate(b, frame);
            left.iter().zip(right.iter()).map(|(&x, &y)| x && y).collect()
        }
        Expr::Or(a, b) => {
            let left = evaluate(a, frame);
            let right = evaluate(b, frame);
            left.iter().zip(right.iter()).map(|(&x, &y)| x || y).collect()
        }
        Expr::Compare { lhs, op, rhs } => {
            let a = materialize(lhs, frame);
            let b = materialize(rhs, frame);
            (0..frame.len())
                .map(|i| {
                    if !a[i].is_finite() || !b[i].is_finite() {
                        return false;
                    }
                    match op {
                        CmpOp::Lt => a[i] < b[i],
                        CmpOp::Le => a[i] <= b[i],
                        CmpOp::Gt => a[i] > b[i],
                        CmpOp::Ge => a[i] >= b[i],
                        CmpOp::Eq => a[i] == b[i],
                        CmpOp::CrossesAbove => {
                            i > 0
                                && a[i - 1].is_finite()
                                && b[i - 1].is_finite()
                                && a[i - 1] <= b[i - 1]
                                && a[i] > b[i]
                        }
                        CmpOp::CrossesBelow => {
                            i > 0
                                && a[i - 1].is_finite()
                                && b[i - 1].is_finite()
                                && a[i - 1] >= b[i - 1]
                                && a[i] < b[i]
                        }
                    }
                })
                .collect()
        }
    }
}

fn materialize(operand: &Operand, frame: &BarFrame) -> Vec<f64> {
    match operand {
        Operand::Number(n) => vec![*n; frame.len()],
        Operand::Close => frame.closes(),
        Operand::Open => frame.opens(),
        Operand::High => frame.highs(),
        Operand::Low => frame.lows(),
        Operand::Volume => frame.volumes(),
        Operand::Sma(p) => calculate_sma(&frame.closes(), *p),
        Operand::Ema(p) => calculate_ema(&frame.closes(), *p),
        Operand::Rsi(p) => calculate_rsi(&frame.closes(), *p),
        Operand::Adx(p) => calculate_adx(&frame.highs(), &frame.lows(), &frame.closes(), *p),
        Operand::BbUpper(p, sd) => calculate_bollinger(&frame.closes(), *p, *sd).0,
        Operand::BbMiddle(p, sd) => calculate_bollinger(&frame.closes(), *p, *sd).1,
        Operand::BbLower(p, sd) => calculate_bollinger(&frame.closes(), *p, *sd).2,
        Operand::MacdLine(f, s, g) => calculate_macd(&frame.closes(), *f, *s, *g).0,
        Operand::MacdSignal(f, s, g) => calculate_macd(&frame.closes(), *f, *s, *g).1,
        Operand::MacdHist(f, s, g) => calculate_macd(&frame.closes(), *f, *s, *g).2,
    }
}
