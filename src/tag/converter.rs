//! Tag Parameter Converter
//!
//! A small assignment language for rewriting the parameters extracted from
//! a tag. Only two bindings exist, `paramList` and `paramDict`; a program
//! is a list of assignments separated by newlines or `;`:
//!
//! ```text
//! paramDict['particle'] = 'e+'
//! paramDict['momentum'] = float(paramDict['momentum']) * 1000
//! paramList[1] = str(int(paramList[1]) + 1)
//! ```
//!
//! Expressions support string and number literals, reads of either
//! binding, `+ - * /`, parentheses, unary minus and the functions
//! `float`, `int`, `str`, `lower` and `upper`. Programs are parsed once up
//! front; evaluation errors are reported per tag.

use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

/// Failure to parse or evaluate a converter program.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConvertError {
    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("{0}")]
    Eval(String),
}

/// A runtime value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Float(f64),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{}", i),
            Self::Float(x) if x.is_finite() && x.fract() == 0.0 && x.abs() < 1e16 => {
                write!(f, "{:.1}", x)
            }
            Self::Float(x) => write!(f, "{}", x),
        }
    }
}

impl Value {
    fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "str",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
        }
    }

    fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(x) => Some(*x),
            Self::Str(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Str(String),
    Int(i64),
    Float(f64),
    LBracket,
    RBracket,
    LParen,
    RParen,
    Assign,
    Plus,
    Minus,
    Star,
    Slash,
    Separator,
}

#[derive(Debug, Clone, PartialEq)]
enum Target {
    Dict(String),
    List(usize),
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Func {
    Float,
    Int,
    Str,
    Lower,
    Upper,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
}

#[derive(Debug, Clone, PartialEq)]
enum Expr {
    Literal(Value),
    Read(Target),
    Call(Func, Box<Expr>),
    Neg(Box<Expr>),
    Binary(BinOp, Box<Expr>, Box<Expr>),
}

#[derive(Debug, Clone, PartialEq)]
struct Statement {
    target: Target,
    value: Expr,
}

/// A parsed converter program.
#[derive(Debug, Clone, PartialEq)]
pub struct Converter {
    statements: Vec<Statement>,
}

impl Converter {
    /// Parses a converter program.
    pub fn parse(source: &str) -> Result<Self, ConvertError> {
        let tokens = tokenize(source)?;
        let mut parser = Parser { tokens, pos: 0 };
        let statements = parser.program()?;
        Ok(Self { statements })
    }

    /// Number of assignments in the program.
    pub fn len(&self) -> usize {
        self.statements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.statements.is_empty()
    }

    /// Runs the program against the two bindings, rewriting them in place.
    ///
    /// The bindings are only updated if every statement succeeds.
    pub fn apply(
        &self,
        list: &mut Vec<String>,
        dict: &mut BTreeMap<String, String>,
    ) -> Result<(), ConvertError> {
        let mut scope = Scope {
            list: list.iter().cloned().map(Value::Str).collect(),
            dict: dict
                .iter()
                .map(|(k, v)| (k.clone(), Value::Str(v.clone())))
                .collect(),
        };

        for statement in &self.statements {
            let value = scope.eval(&statement.value)?;
            scope.assign(&statement.target, value)?;
        }

        *list = scope.list.iter().map(Value::to_string).collect();
        *dict = scope
            .dict
            .iter()
            .map(|(k, v)| (k.clone(), v.to_string()))
            .collect();
        Ok(())
    }
}

fn tokenize(source: &str) -> Result<Vec<(usize, Token)>, ConvertError> {
    let mut tokens = Vec::new();
    let chars: Vec<(usize, char)> = source.char_indices().collect();
    let mut i = 0;

    while i < chars.len() {
        let (offset, ch) = chars[i];
        match ch {
            '\n' | ';' => {
                tokens.push((offset, Token::Separator));
                i += 1;
            }
            c if c.is_whitespace() => i += 1,
            '[' => {
                tokens.push((offset, Token::LBracket));
                i += 1;
            }
            ']' => {
                tokens.push((offset, Token::RBracket));
                i += 1;
            }
            '(' => {
                tokens.push((offset, Token::LParen));
                i += 1;
            }
            ')' => {
                tokens.push((offset, Token::RParen));
                i += 1;
            }
            '=' => {
                tokens.push((offset, Token::Assign));
                i += 1;
            }
            '+' => {
                tokens.push((offset, Token::Plus));
                i += 1;
            }
            '-' => {
                tokens.push((offset, Token::Minus));
                i += 1;
            }
            '*' => {
                tokens.push((offset, Token::Star));
                i += 1;
            }
            '/' => {
                tokens.push((offset, Token::Slash));
                i += 1;
            }
            '\'' | '"' => {
                let quote = ch;
                let mut text = String::new();
                let mut closed = false;
                i += 1;
                while i < chars.len() {
                    let (_, c) = chars[i];
                    i += 1;
                    match c {
                        '\\' if i < chars.len() => {
                            text.push(chars[i].1);
                            i += 1;
                        }
                        c if c == quote => {
                            closed = true;
                            break;
                        }
                        c => text.push(c),
                    }
                }
                if !closed {
                    return Err(ConvertError::Syntax {
                        offset,
                        message: "unterminated string literal".to_string(),
                    });
                }
                tokens.push((offset, Token::Str(text)));
            }
            c if c.is_ascii_digit() || c == '.' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_digit() || chars[i].1 == '.') {
                    i += 1;
                }
                let literal: String = chars[start..i].iter().map(|(_, c)| c).collect();
                let token = if literal.contains('.') {
                    literal.parse().map(Token::Float).ok()
                } else {
                    literal.parse().map(Token::Int).ok()
                };
                let token = token.ok_or_else(|| ConvertError::Syntax {
                    offset,
                    message: format!("invalid number '{}'", literal),
                })?;
                tokens.push((offset, token));
            }
            c if c.is_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_alphanumeric() || chars[i].1 == '_') {
                    i += 1;
                }
                let ident: String = chars[start..i].iter().map(|(_, c)| c).collect();
                tokens.push((offset, Token::Ident(ident)));
            }
            other => {
                return Err(ConvertError::Syntax {
                    offset,
                    message: format!("unexpected character '{}'", other),
                })
            }
        }
    }

    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(_, t)| t)
    }

    fn offset(&self) -> usize {
        self.tokens
            .get(self.pos)
            .or_else(|| self.tokens.last())
            .map_or(0, |(o, _)| *o)
    }

    fn error<T>(&self, message: impl Into<String>) -> Result<T, ConvertError> {
        Err(ConvertError::Syntax {
            offset: self.offset(),
            message: message.into(),
        })
    }

    fn next(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).map(|(_, t)| t.clone());
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn expect(&mut self, expected: Token) -> Result<(), ConvertError> {
        match self.peek() {
            Some(t) if *t == expected => {
                self.pos += 1;
                Ok(())
            }
            Some(t) => self.error(format!("expected {:?}, found {:?}", expected, t)),
            None => self.error(format!("expected {:?}, found end of input", expected)),
        }
    }

    fn program(&mut self) -> Result<Vec<Statement>, ConvertError> {
        let mut statements = Vec::new();
        loop {
            while self.peek() == Some(&Token::Separator) {
                self.pos += 1;
            }
            if self.peek().is_none() {
                break;
            }
            statements.push(self.statement()?);
            match self.peek() {
                None | Some(Token::Separator) => {}
                Some(t) => return self.error(format!("unexpected {:?} after statement", t)),
            }
        }
        Ok(statements)
    }

    fn statement(&mut self) -> Result<Statement, ConvertError> {
        let target = match self.next() {
            Some(Token::Ident(name)) => self.subscript(&name)?,
            _ => return self.error("statement must assign to paramDict[...] or paramList[...]"),
        };
        self.expect(Token::Assign)?;
        let value = self.expr()?;
        Ok(Statement { target, value })
    }

    /// Parses `[key]` after a binding name.
    fn subscript(&mut self, binding: &str) -> Result<Target, ConvertError> {
        self.expect(Token::LBracket)?;
        let target = match (binding, self.next()) {
            ("paramDict", Some(Token::Str(key))) => Target::Dict(key),
            ("paramList", Some(Token::Int(index))) if index >= 0 => Target::List(index as usize),
            ("paramDict", _) => return self.error("paramDict index must be a string literal"),
            ("paramList", _) => return self.error("paramList index must be a non-negative integer"),
            (other, _) => return self.error(format!("unknown binding '{}'", other)),
        };
        self.expect(Token::RBracket)?;
        Ok(target)
    }

    fn expr(&mut self) -> Result<Expr, ConvertError> {
        let mut left = self.term()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinOp::Add,
                Some(Token::Minus) => BinOp::Sub,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.term()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn term(&mut self) -> Result<Expr, ConvertError> {
        let mut left = self.unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinOp::Mul,
                Some(Token::Slash) => BinOp::Div,
                _ => return Ok(left),
            };
            self.pos += 1;
            let right = self.unary()?;
            left = Expr::Binary(op, Box::new(left), Box::new(right));
        }
    }

    fn unary(&mut self) -> Result<Expr, ConvertError> {
        if self.peek() == Some(&Token::Minus) {
            self.pos += 1;
            return Ok(Expr::Neg(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> Result<Expr, ConvertError> {
        match self.next() {
            Some(Token::Str(s)) => Ok(Expr::Literal(Value::Str(s))),
            Some(Token::Int(i)) => Ok(Expr::Literal(Value::Int(i))),
            Some(Token::Float(x)) => Ok(Expr::Literal(Value::Float(x))),
            Some(Token::LParen) => {
                let inner = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(inner)
            }
            Some(Token::Ident(name)) if name == "paramDict" || name == "paramList" => {
                Ok(Expr::Read(self.subscript(&name)?))
            }
            Some(Token::Ident(name)) => {
                let func = match name.as_str() {
                    "float" => Func::Float,
                    "int" => Func::Int,
                    "str" => Func::Str,
                    "lower" => Func::Lower,
                    "upper" => Func::Upper,
                    _ => {
                        self.pos -= 1;
                        return self.error(format!("unknown name '{}'", name));
                    }
                };
                self.expect(Token::LParen)?;
                let arg = self.expr()?;
                self.expect(Token::RParen)?;
                Ok(Expr::Call(func, Box::new(arg)))
            }
            Some(t) => {
                self.pos -= 1;
                self.error(format!("unexpected {:?}", t))
            }
            None => self.error("unexpected end of input"),
        }
    }
}

struct Scope {
    list: Vec<Value>,
    dict: BTreeMap<String, Value>,
}

impl Scope {
    fn read(&self, target: &Target) -> Result<Value, ConvertError> {
        match target {
            Target::Dict(key) => self
                .dict
                .get(key)
                .cloned()
                .ok_or_else(|| ConvertError::Eval(format!("paramDict has no key '{}'", key))),
            Target::List(index) => self.list.get(*index).cloned().ok_or_else(|| {
                ConvertError::Eval(format!(
                    "paramList index {} out of range (length {})",
                    index,
                    self.list.len()
                ))
            }),
        }
    }

    fn assign(&mut self, target: &Target, value: Value) -> Result<(), ConvertError> {
        match target {
            Target::Dict(key) => {
                self.dict.insert(key.clone(), value);
                Ok(())
            }
            Target::List(index) => {
                let len = self.list.len();
                let slot = self.list.get_mut(*index).ok_or_else(|| {
                    ConvertError::Eval(format!(
                        "paramList assignment index {} out of range (length {})",
                        index, len
                    ))
                })?;
                *slot = value;
                Ok(())
            }
        }
    }

    fn eval(&self, expr: &Expr) -> Result<Value, ConvertError> {
        match expr {
            Expr::Literal(v) => Ok(v.clone()),
            Expr::Read(target) => self.read(target),
            Expr::Neg(inner) => match self.eval(inner)? {
                Value::Int(i) => i
                    .checked_neg()
                    .map(Value::Int)
                    .ok_or_else(|| ConvertError::Eval("integer overflow".to_string())),
                Value::Float(x) => Ok(Value::Float(-x)),
                Value::Str(_) => Err(ConvertError::Eval("bad operand type for unary -: 'str'".to_string())),
            },
            Expr::Call(func, arg) => call(*func, self.eval(arg)?),
            Expr::Binary(op, left, right) => binary(*op, self.eval(left)?, self.eval(right)?),
        }
    }
}

fn call(func: Func, arg: Value) -> Result<Value, ConvertError> {
    match func {
        Func::Float => match arg {
            Value::Str(s) => s
                .trim()
                .parse()
                .map(Value::Float)
                .map_err(|_| ConvertError::Eval(format!("could not convert string to float: '{}'", s))),
            Value::Int(i) => Ok(Value::Float(i as f64)),
            Value::Float(x) => Ok(Value::Float(x)),
        },
        Func::Int => match arg {
            Value::Str(s) => s
                .trim()
                .parse()
                .map(Value::Int)
                .map_err(|_| ConvertError::Eval(format!("invalid literal for int(): '{}'", s))),
            Value::Int(i) => Ok(Value::Int(i)),
            Value::Float(x) if x.is_finite() => Ok(Value::Int(x.trunc() as i64)),
            Value::Float(x) => Err(ConvertError::Eval(format!("cannot convert {} to integer", x))),
        },
        Func::Str => Ok(Value::Str(arg.to_string())),
        Func::Lower => Ok(Value::Str(arg.to_string().to_lowercase())),
        Func::Upper => Ok(Value::Str(arg.to_string().to_uppercase())),
    }
}

fn binary(op: BinOp, left: Value, right: Value) -> Result<Value, ConvertError> {
    if let (BinOp::Add, Value::Str(a), Value::Str(b)) = (op, &left, &right) {
        return Ok(Value::Str(format!("{}{}", a, b)));
    }

    let unsupported = || {
        ConvertError::Eval(format!(
            "unsupported operand types for {:?}: '{}' and '{}'",
            op,
            left.type_name(),
            right.type_name()
        ))
    };

    if let (Value::Int(a), Value::Int(b)) = (&left, &right) {
        let overflow = || ConvertError::Eval("integer overflow".to_string());
        return match op {
            BinOp::Add => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
            BinOp::Sub => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
            BinOp::Mul => a.checked_mul(*b).map(Value::Int).ok_or_else(overflow),
            BinOp::Div if *b == 0 => Err(ConvertError::Eval("division by zero".to_string())),
            BinOp::Div => Ok(Value::Float(*a as f64 / *b as f64)),
        };
    }

    let a = left.as_f64().ok_or_else(unsupported)?;
    let b = right.as_f64().ok_or_else(unsupported)?;
    match op {
        BinOp::Add => Ok(Value::Float(a + b)),
        BinOp::Sub => Ok(Value::Float(a - b)),
        BinOp::Mul => Ok(Value::Float(a * b)),
        BinOp::Div if b == 0.0 => Err(ConvertError::Eval("float division by zero".to_string())),
        BinOp::Div => Ok(Value::Float(a / b)),
    }
}
