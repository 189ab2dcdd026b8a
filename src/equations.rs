//! Stat equations
//!
//! Named formulas (DAMAGE, HIT, AVOID, ...) evaluated over a unit's stat
//! block. Content packs override the defaults via TOML; formula-selector
//! hooks pick which named equation a combat computation uses. Parameters
//! are stat ids only; unknown names are authoring errors at parse or eval
//! time, never silent zeros.

use ahash::AHashMap;
use thiserror::Error;

use crate::core::error::{EngineError, Result};
use crate::core::types::StatId;
use crate::unit::Unit;

#[derive(Error, Debug, PartialEq)]
pub enum EvalError {
    #[error("Unknown parameter: {0}")]
    UnknownParam(String),
    #[error("Unknown function: {0}")]
    UnknownFunction(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("{0} expects {1} arguments")]
    InvalidArgCount(String, usize),
    #[error("Parse error: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Gt,
    Le,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Literal(f32),
    Param(String),
    BinOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },
    Neg(Box<Expr>),
    Conditional {
        cond: Box<Expr>,
        then: Box<Expr>,
        otherwise: Box<Expr>,
    },
    Function {
        name: String,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn parse(src: &str) -> std::result::Result<Expr, EvalError> {
        let tokens = tokenize(src)?;
        let mut parser = Parser { tokens, pos: 0 };
        let expr = parser.expr()?;
        if parser.pos != parser.tokens.len() {
            return Err(EvalError::Parse(format!(
                "trailing input at token {}",
                parser.pos
            )));
        }
        Ok(expr)
    }

    pub fn evaluate<F>(&self, params: &F) -> std::result::Result<f32, EvalError>
    where
        F: Fn(&str) -> Option<f32>,
    {
        match self {
            Expr::Literal(v) => Ok(*v),
            Expr::Param(name) => params(name).ok_or_else(|| EvalError::UnknownParam(name.clone())),
            Expr::Neg(inner) => Ok(-inner.evaluate(params)?),
            Expr::BinOp { op, left, right } => {
                let l = left.evaluate(params)?;
                let r = right.evaluate(params)?;
                Ok(match op {
                    BinOp::Add => l + r,
                    BinOp::Sub => l - r,
                    BinOp::Mul => l * r,
                    BinOp::Div => {
                        if r == 0.0 {
                            return Err(EvalError::DivisionByZero);
                        }
                        l / r
                    }
                    BinOp::Mod => {
                        if r == 0.0 {
                            return Err(EvalError::DivisionByZero);
                        }
                        l % r
                    }
                    BinOp::Lt => bool_f32(l < r),
                    BinOp::Gt => bool_f32(l > r),
                    BinOp::Le => bool_f32(l <= r),
                    BinOp::Ge => bool_f32(l >= r),
                    BinOp::Eq => bool_f32(l == r),
                    BinOp::Ne => bool_f32(l != r),
                    BinOp::And => bool_f32(l != 0.0 && r != 0.0),
                    BinOp::Or => bool_f32(l != 0.0 || r != 0.0),
                })
            }
            Expr::Conditional {
                cond,
                then,
                otherwise,
            } => {
                if cond.evaluate(params)? != 0.0 {
                    then.evaluate(params)
                } else {
                    otherwise.evaluate(params)
                }
            }
            Expr::Function { name, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(arg.evaluate(params)?);
                }
                match (name.as_str(), values.as_slice()) {
                    ("min", [a, b]) => Ok(a.min(*b)),
                    ("max", [a, b]) => Ok(a.max(*b)),
                    ("abs", [a]) => Ok(a.abs()),
                    ("clamp", [x, lo, hi]) => Ok(x.max(*lo).min(*hi)),
                    ("min", _) | ("max", _) => Err(EvalError::InvalidArgCount(name.clone(), 2)),
                    ("abs", _) => Err(EvalError::InvalidArgCount(name.clone(), 1)),
                    ("clamp", _) => Err(EvalError::InvalidArgCount(name.clone(), 3)),
                    _ => Err(EvalError::UnknownFunction(name.clone())),
                }
            }
        }
    }
}

fn bool_f32(b: bool) -> f32 {
    if b {
        1.0
    } else {
        0.0
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Number(f32),
    Ident(String),
    Op(BinOp),
    LParen,
    RParen,
    Comma,
    If,
    Then,
    Else,
    Minus,
    Not,
}

fn tokenize(src: &str) -> std::result::Result<Vec<Token>, EvalError> {
    let mut tokens = Vec::new();
    let chars: Vec<char> = src.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        match c {
            ' ' | '\t' | '\n' | '\r' => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            ',' => {
                tokens.push(Token::Comma);
                i += 1;
            }
            '+' => {
                tokens.push(Token::Op(BinOp::Add));
                i += 1;
            }
            '-' => {
                tokens.push(Token::Minus);
                i += 1;
            }
            '*' => {
                tokens.push(Token::Op(BinOp::Mul));
                i += 1;
            }
            '/' => {
                tokens.push(Token::Op(BinOp::Div));
                i += 1;
            }
            '%' => {
                tokens.push(Token::Op(BinOp::Mod));
                i += 1;
            }
            '<' | '>' | '=' | '!' => {
                let eq = chars.get(i + 1) == Some(&'=');
                let op = match (c, eq) {
                    ('<', true) => BinOp::Le,
                    ('<', false) => BinOp::Lt,
                    ('>', true) => BinOp::Ge,
                    ('>', false) => BinOp::Gt,
                    ('=', true) => BinOp::Eq,
                    ('!', true) => BinOp::Ne,
                    _ => return Err(EvalError::Parse(format!("unexpected '{c}'"))),
                };
                tokens.push(Token::Op(op));
                i += if eq { 2 } else { 1 };
            }
            _ if c.is_ascii_digit() => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_digit() || chars[i] == '.') {
                    i += 1;
                }
                let text: String = chars[start..i].iter().collect();
                let value = text
                    .parse::<f32>()
                    .map_err(|_| EvalError::Parse(format!("bad number '{text}'")))?;
                tokens.push(Token::Number(value));
            }
            _ if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].is_ascii_alphanumeric() || chars[i] == '_') {
                    i += 1;
                }
                let word: String = chars[start..i].iter().collect();
                tokens.push(match word.as_str() {
                    "if" => Token::If,
                    "then" => Token::Then,
                    "else" => Token::Else,
                    "and" => Token::Op(BinOp::And),
                    "or" => Token::Op(BinOp::Or),
                    "not" => Token::Not,
                    _ => Token::Ident(word),
                });
            }
            _ => return Err(EvalError::Parse(format!("unexpected character '{c}'"))),
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<Token>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn eat(&mut self, expected: &Token) -> std::result::Result<(), EvalError> {
        if self.peek() == Some(expected) {
            self.pos += 1;
            Ok(())
        } else {
            Err(EvalError::Parse(format!(
                "expected {expected:?}, found {:?}",
                self.peek()
            )))
        }
    }

    fn expr(&mut self) -> std::result::Result<Expr, EvalError> {
        if self.peek() == Some(&Token::If) {
            self.pos += 1;
            let cond = self.expr()?;
            self.eat(&Token::Then)?;
            let then = self.expr()?;
            self.eat(&Token::Else)?;
            let otherwise = self.expr()?;
            return Ok(Expr::Conditional {
                cond: Box::new(cond),
                then: Box::new(then),
                otherwise: Box::new(otherwise),
            });
        }
        self.binary(0)
    }

    /// Precedence climbing over the binary operator tiers
    fn binary(&mut self, min_level: u8) -> std::result::Result<Expr, EvalError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Op(op)) if level(*op) >= min_level => *op,
                Some(Token::Minus) if level(BinOp::Sub) >= min_level => BinOp::Sub,
                _ => break,
            };
            self.pos += 1;
            let right = self.binary(level(op) + 1)?;
            left = Expr::BinOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn unary(&mut self) -> std::result::Result<Expr, EvalError> {
        match self.peek() {
            Some(Token::Minus) => {
                self.pos += 1;
                Ok(Expr::Neg(Box::new(self.unary()?)))
            }
            Some(Token::Not) => {
                self.pos += 1;
                let inner = self.unary()?;
                Ok(Expr::BinOp {
                    op: BinOp::Eq,
                    left: Box::new(inner),
                    right: Box::new(Expr::Literal(0.0)),
                })
            }
            _ => self.primary(),
        }
    }

    fn primary(&mut self) -> std::result::Result<Expr, EvalError> {
        match self.peek().cloned() {
            Some(Token::Number(v)) => {
                self.pos += 1;
                Ok(Expr::Literal(v))
            }
            Some(Token::LParen) => {
                self.pos += 1;
                let inner = self.expr()?;
                self.eat(&Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) => {
                self.pos += 1;
                if self.peek() == Some(&Token::LParen) {
                    self.pos += 1;
                    let mut args = Vec::new();
                    if self.peek() != Some(&Token::RParen) {
                        loop {
                            args.push(self.expr()?);
                            if self.peek() == Some(&Token::Comma) {
                                self.pos += 1;
                            } else {
                                break;
                            }
                        }
                    }
                    self.eat(&Token::RParen)?;
                    Ok(Expr::Function { name, args })
                } else {
                    Ok(Expr::Param(name))
                }
            }
            other => Err(EvalError::Parse(format!("unexpected token {other:?}"))),
        }
    }
}

fn level(op: BinOp) -> u8 {
    match op {
        BinOp::Or => 0,
        BinOp::And => 1,
        BinOp::Lt | BinOp::Gt | BinOp::Le | BinOp::Ge | BinOp::Eq | BinOp::Ne => 2,
        BinOp::Add | BinOp::Sub => 3,
        BinOp::Mul | BinOp::Div | BinOp::Mod => 4,
    }
}

/// Named, pre-parsed equations
#[derive(Debug, Clone)]
pub struct EquationRegistry {
    equations: AHashMap<String, Expr>,
}

impl Default for EquationRegistry {
    fn default() -> Self {
        let mut registry = Self {
            equations: AHashMap::new(),
        };
        for (name, src) in [
            ("DAMAGE", "STR"),
            ("MAGIC_DAMAGE", "MAG"),
            ("DEFENSE", "DEF"),
            ("RESIST", "RES"),
            ("HIT", "SKL * 2 + LCK / 2"),
            ("AVOID", "SPD * 2 + LCK"),
            ("CRIT_HIT", "SKL / 2"),
            ("CRIT_AVOID", "LCK"),
            ("ATTACK_SPEED", "SPD"),
            ("DEFENSE_SPEED", "SPD"),
            ("HITPOINTS", "HP"),
            ("MOVEMENT", "MOV"),
        ] {
            // Defaults are static and known-good
            if let Ok(expr) = Expr::parse(src) {
                registry.equations.insert(name.to_string(), expr);
            }
        }
        registry
    }
}

impl EquationRegistry {
    pub fn add(&mut self, name: &str, src: &str) -> Result<()> {
        let expr = Expr::parse(src).map_err(|e| EngineError::EquationParse {
            name: name.to_string(),
            message: e.to_string(),
        })?;
        self.equations.insert(name.to_string(), expr);
        Ok(())
    }

    /// Override defaults from a TOML `name = "expression"` table
    pub fn load_toml(&mut self, text: &str) -> Result<()> {
        let table: AHashMap<String, String> =
            toml::from_str(text).map_err(|e| EngineError::Config(e.to_string()))?;
        for (name, src) in &table {
            self.add(name, src)?;
        }
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.equations.contains_key(name)
    }

    /// Evaluate a named equation over a unit's stat block, floored
    pub fn evaluate(&self, name: &str, unit: &Unit) -> Result<i32> {
        let expr = self
            .equations
            .get(name)
            .ok_or_else(|| EngineError::UnknownEquation(name.to_string()))?;
        let value = expr
            .evaluate(&|param: &str| StatId::from_name(param).map(|id| unit.stat(id) as f32))
            .map_err(|e| EngineError::EquationEval {
                name: name.to_string(),
                message: e.to_string(),
            })?;
        Ok(value.floor() as i32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Team;

    fn params<'a>(pairs: &'a [(&'a str, f32)]) -> impl Fn(&str) -> Option<f32> + 'a {
        move |name| pairs.iter().find(|(n, _)| *n == name).map(|(_, v)| *v)
    }

    #[test]
    fn test_arithmetic_precedence() {
        let expr = Expr::parse("2 + 3 * 4").unwrap();
        assert_eq!(expr.evaluate(&params(&[])), Ok(14.0));
        let expr = Expr::parse("(2 + 3) * 4").unwrap();
        assert_eq!(expr.evaluate(&params(&[])), Ok(20.0));
    }

    #[test]
    fn test_params_and_functions() {
        let expr = Expr::parse("max(STR, MAG) + min(2, SKL)").unwrap();
        let value = expr
            .evaluate(&params(&[("STR", 8.0), ("MAG", 12.0), ("SKL", 5.0)]))
            .unwrap();
        assert_eq!(value, 14.0);
    }

    #[test]
    fn test_conditional() {
        let expr = Expr::parse("if SPD >= 10 then 2 else 1").unwrap();
        assert_eq!(expr.evaluate(&params(&[("SPD", 12.0)])), Ok(2.0));
        assert_eq!(expr.evaluate(&params(&[("SPD", 4.0)])), Ok(1.0));
    }

    #[test]
    fn test_unknown_param_is_an_error() {
        let expr = Expr::parse("BOGUS + 1").unwrap();
        assert_eq!(
            expr.evaluate(&params(&[])),
            Err(EvalError::UnknownParam("BOGUS".to_string()))
        );
    }

    #[test]
    fn test_division_by_zero() {
        let expr = Expr::parse("1 / 0").unwrap();
        assert_eq!(expr.evaluate(&params(&[])), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Expr::parse("1 + ").is_err());
        assert!(Expr::parse("@#$").is_err());
        assert!(Expr::parse("1 2").is_err());
    }

    #[test]
    fn test_registry_default_hit_equation() {
        use crate::core::types::StatId;
        let registry = EquationRegistry::default();
        let unit = Unit::new("u", Team::Player)
            .with_stat(StatId::Skl, 10)
            .with_stat(StatId::Lck, 6);
        assert_eq!(registry.evaluate("HIT", &unit).unwrap(), 23);
    }

    #[test]
    fn test_registry_unknown_name_fails_loudly() {
        let registry = EquationRegistry::default();
        let unit = Unit::new("u", Team::Player);
        assert!(registry.evaluate("NOT_AN_EQUATION", &unit).is_err());
    }

    #[test]
    fn test_registry_toml_override() {
        let mut registry = EquationRegistry::default();
        registry
            .load_toml("DAMAGE = \"STR + STR / 2\"\n")
            .unwrap();
        use crate::core::types::StatId;
        let unit = Unit::new("u", Team::Player).with_stat(StatId::Str, 10);
        assert_eq!(registry.evaluate("DAMAGE", &unit).unwrap(), 15);
    }
}
