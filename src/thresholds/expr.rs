//! Boolean predicates over a slide's class-fraction vector.
//!
//! Grammar:
//!
//! ```text
//! expr     := and ("||" and)*
//! and      := unary ("&&" unary)*
//! unary    := "!" unary | "(" expr ")" | "true" | "false" | cmp
//! cmp      := "frac(" selector ")" op number ["%"]
//! selector := class | ">=" class | "<=" class | class ".." class | class ("+" class)*
//! op       := ">=" | ">" | "<=" | "<" | "==" | "!="
//! ```

use std::fmt;

use crate::schema::v1::N_STAGES;
use crate::scores::ClassFractions;

/// Comparison slack for fractions that are exact ratios of small counts.
const EPS: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    Class(u8),
    AtLeast(u8),
    AtMost(u8),
    Range(u8, u8),
    Set(Vec<u8>),
}

impl Selector {
    pub fn fraction(&self, f: &ClassFractions) -> f64 {
        match self {
            Selector::Class(c) => f.frac(*c),
            Selector::AtLeast(c) => f.frac_at_least(*c),
            Selector::AtMost(c) => f.frac_at_most(*c),
            Selector::Range(lo, hi) => {
                let stages: Vec<u8> = (*lo..=*hi).collect();
                f.frac_of(&stages)
            }
            Selector::Set(stages) => f.frac_of(stages),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmpOp {
    Ge,
    Gt,
    Le,
    Lt,
    Eq,
    Ne,
}

impl CmpOp {
    fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CmpOp::Ge => lhs >= rhs - EPS,
            CmpOp::Gt => lhs > rhs + EPS,
            CmpOp::Le => lhs <= rhs + EPS,
            CmpOp::Lt => lhs < rhs - EPS,
            CmpOp::Eq => (lhs - rhs).abs() <= EPS,
            CmpOp::Ne => (lhs - rhs).abs() > EPS,
        }
    }

    fn symbol(self) -> &'static str {
        match self {
            CmpOp::Ge => ">=",
            CmpOp::Gt => ">",
            CmpOp::Le => "<=",
            CmpOp::Lt => "<",
            CmpOp::Eq => "==",
            CmpOp::Ne => "!=",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    Const(bool),
    Compare {
        selector: Selector,
        op: CmpOp,
        value: f64,
    },
    Not(Box<Predicate>),
    All(Vec<Predicate>),
    Any(Vec<Predicate>),
}

impl Predicate {
    pub fn parse(input: &str) -> Result<Self, String> {
        let tokens = tokenize(input)?;
        let mut parser = Parser { tokens, pos: 0 };
        let pred = parser.parse_or()?;
        if let Some(tok) = parser.peek() {
            return Err(format!("unexpected {} after expression", tok));
        }
        Ok(pred)
    }

    pub fn eval(&self, f: &ClassFractions) -> bool {
        match self {
            Predicate::Const(b) => *b,
            Predicate::Compare {
                selector,
                op,
                value,
            } => op.apply(selector.fraction(f), *value),
            Predicate::Not(inner) => !inner.eval(f),
            Predicate::All(items) => items.iter().all(|p| p.eval(f)),
            Predicate::Any(items) => items.iter().any(|p| p.eval(f)),
        }
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Class(c) => write!(f, "{}", c),
            Selector::AtLeast(c) => write!(f, ">={}", c),
            Selector::AtMost(c) => write!(f, "<={}", c),
            Selector::Range(lo, hi) => write!(f, "{}..{}", lo, hi),
            Selector::Set(stages) => {
                let parts: Vec<String> = stages.iter().map(|s| s.to_string()).collect();
                f.write_str(&parts.join("+"))
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Const(b) => write!(f, "{}", b),
            Predicate::Compare {
                selector,
                op,
                value,
            } => write!(f, "frac({}) {} {}", selector, op.symbol(), value),
            Predicate::Not(inner) => write!(f, "!({})", inner),
            Predicate::All(items) => write_joined(f, items, " && "),
            Predicate::Any(items) => write_joined(f, items, " || "),
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, items: &[Predicate], sep: &str) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        match item {
            Predicate::All(_) | Predicate::Any(_) => write!(f, "({})", item)?,
            _ => write!(f, "{}", item)?,
        }
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(f64),
    Percent,
    LParen,
    RParen,
    Op(CmpOp),
    And,
    Or,
    Bang,
    Plus,
    DotDot,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "'{}'", s),
            Token::Number(n) => write!(f, "number {}", n),
            Token::Percent => f.write_str("'%'"),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Op(op) => write!(f, "'{}'", op.symbol()),
            Token::And => f.write_str("'&&'"),
            Token::Or => f.write_str("'||'"),
            Token::Bang => f.write_str("'!'"),
            Token::Plus => f.write_str("'+'"),
            Token::DotDot => f.write_str("'..'"),
        }
    }
}

fn tokenize(input: &str) -> Result<Vec<Token>, String> {
    let chars: Vec<char> = input.chars().collect();
    let mut out = Vec::new();
    let mut i = 0usize;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                out.push(Token::LParen);
                i += 1;
            }
            ')' => {
                out.push(Token::RParen);
                i += 1;
            }
            '%' => {
                out.push(Token::Percent);
                i += 1;
            }
            '+' => {
                out.push(Token::Plus);
                i += 1;
            }
            '&' if next == Some('&') => {
                out.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                out.push(Token::Or);
                i += 2;
            }
            '.' if next == Some('.') => {
                out.push(Token::DotDot);
                i += 2;
            }
            '>' | '<' | '=' | '!' => {
                let (tok, len) = match (c, next) {
                    ('>', Some('=')) => (Token::Op(CmpOp::Ge), 2),
                    ('>', _) => (Token::Op(CmpOp::Gt), 1),
                    ('<', Some('=')) => (Token::Op(CmpOp::Le), 2),
                    ('<', _) => (Token::Op(CmpOp::Lt), 1),
                    ('=', Some('=')) => (Token::Op(CmpOp::Eq), 2),
                    ('!', Some('=')) => (Token::Op(CmpOp::Ne), 2),
                    ('!', _) => (Token::Bang, 1),
                    _ => return Err(format!("unexpected '{}' at offset {}", c, i)),
                };
                out.push(tok);
                i += len;
            }
            d if d.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                // "0.4" is a number, "0..4" is a range.
                if i + 1 < chars.len() && chars[i] == '.' && chars[i + 1].is_ascii_digit() {
                    i += 1;
                    while i < chars.len() && chars[i].is_ascii_digit() {
                        i += 1;
                    }
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f64>()
                    .map_err(|_| format!("invalid number '{}' at offset {}", text, start))?;
                out.push(Token::Number(value));
            }
            a if a.is_ascii_alphabetic() || a == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                out.push(Token::Ident(chars[start..i].iter().collect()));
            }
            other => return Err(format!("unexpected '{}' at offset {}", other, i)),
        }
    }
    Ok(out)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self) -> Option<Token> {
        let tok = self.tokens.get(self.pos).cloned();
        if tok.is_some() {
            self.pos += 1;
        }
        tok
    }

    fn expect(&mut self, want: Token) -> Result<(), String> {
        match self.next() {
            Some(tok) if tok == want => Ok(()),
            Some(tok) => Err(format!("expected {}, found {}", want, tok)),
            None => Err(format!("expected {}, found end of expression", want)),
        }
    }

    fn parse_or(&mut self) -> Result<Predicate, String> {
        let mut items = vec![self.parse_and()?];
        while self.peek() == Some(&Token::Or) {
            self.pos += 1;
            items.push(self.parse_and()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Predicate::Any(items)
        })
    }

    fn parse_and(&mut self) -> Result<Predicate, String> {
        let mut items = vec![self.parse_unary()?];
        while self.peek() == Some(&Token::And) {
            self.pos += 1;
            items.push(self.parse_unary()?);
        }
        Ok(if items.len() == 1 {
            items.remove(0)
        } else {
            Predicate::All(items)
        })
    }

    fn parse_unary(&mut self) -> Result<Predicate, String> {
        match self.next() {
            Some(Token::Bang) => Ok(Predicate::Not(Box::new(self.parse_unary()?))),
            Some(Token::LParen) => {
                let inner = self.parse_or()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => match name.as_str() {
                "true" => Ok(Predicate::Const(true)),
                "false" => Ok(Predicate::Const(false)),
                "frac" => self.parse_compare(),
                other => Err(format!("unknown identifier '{}'", other)),
            },
            Some(tok) => Err(format!("unexpected {}", tok)),
            None => Err("unexpected end of expression".to_string()),
        }
    }

    fn parse_compare(&mut self) -> Result<Predicate, String> {
        self.expect(Token::LParen)?;
        let selector = self.parse_selector()?;
        self.expect(Token::RParen)?;
        let op = match self.next() {
            Some(Token::Op(op)) => op,
            Some(tok) => return Err(format!("expected comparison operator, found {}", tok)),
            None => return Err("expected comparison operator".to_string()),
        };
        let mut value = match self.next() {
            Some(Token::Number(n)) => n,
            Some(tok) => return Err(format!("expected threshold value, found {}", tok)),
            None => return Err("expected threshold value".to_string()),
        };
        if self.peek() == Some(&Token::Percent) {
            self.pos += 1;
            value /= 100.0;
        }
        if !(0.0..=1.0).contains(&value) {
            return Err(format!("threshold {} outside [0, 1]", value));
        }
        Ok(Predicate::Compare {
            selector,
            op,
            value,
        })
    }

    fn parse_selector(&mut self) -> Result<Selector, String> {
        match self.peek() {
            Some(Token::Op(CmpOp::Ge)) => {
                self.pos += 1;
                Ok(Selector::AtLeast(self.parse_class()?))
            }
            Some(Token::Op(CmpOp::Le)) => {
                self.pos += 1;
                Ok(Selector::AtMost(self.parse_class()?))
            }
            _ => {
                let first = self.parse_class()?;
                match self.peek() {
                    Some(Token::DotDot) => {
                        self.pos += 1;
                        let last = self.parse_class()?;
                        if last < first {
                            return Err(format!("empty class range {}..{}", first, last));
                        }
                        Ok(Selector::Range(first, last))
                    }
                    Some(Token::Plus) => {
                        let mut stages = vec![first];
                        while self.peek() == Some(&Token::Plus) {
                            self.pos += 1;
                            stages.push(self.parse_class()?);
                        }
                        Ok(Selector::Set(stages))
                    }
                    _ => Ok(Selector::Class(first)),
                }
            }
        }
    }

    fn parse_class(&mut self) -> Result<u8, String> {
        match self.next() {
            Some(Token::Number(n)) if n.fract() == 0.0 && n >= 0.0 && (n as usize) < N_STAGES => {
                Ok(n as u8)
            }
            Some(Token::Number(n)) => Err(format!("class {} is not a stage 0..{}", n, N_STAGES - 1)),
            Some(Token::Ident(name)) if name == "ignore" => {
                Err("'ignore' tiles are excluded from fractions".to_string())
            }
            Some(tok) => Err(format!("expected class, found {}", tok)),
            None => Err("expected class, found end of expression".to_string()),
        }
    }
}
