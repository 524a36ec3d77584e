//! Error taxonomy. Every error carries its source position, source name and
//! the call stack captured at raise time; the renderer in `diagnostics`
//! turns them into the full report.

use std::fmt;

use smol_str::SmolStr;

use crate::compiler::span::Position;
use crate::vm::value::{LuaValue, float_to_display, integer_to_display};

pub type LuaResult<T> = Result<T, LuaError>;

/// One line of a captured stack trace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameTrace {
    pub source: SmolStr,
    pub line: u32,
    /// Callee name when knowable at the call site; `None` for the main
    /// chunk or anonymous functions.
    pub name: Option<SmolStr>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LexErrorKind {
    UnclosedString,
    UnclosedLongString,
    UnclosedComment,
    InvalidNumber,
    InvalidHexNumber,
    UnexpectedCharacter(char),
}

impl LexErrorKind {
    pub fn message(&self) -> String {
        match self {
            LexErrorKind::UnclosedString => "unclosed string".to_string(),
            LexErrorKind::UnclosedLongString => "unclosed long string".to_string(),
            LexErrorKind::UnclosedComment => "unclosed comment".to_string(),
            LexErrorKind::InvalidNumber => "malformed number".to_string(),
            LexErrorKind::InvalidHexNumber => "malformed hexadecimal number".to_string(),
            LexErrorKind::UnexpectedCharacter(ch) => {
                format!("unexpected character '{}'", ch)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A specific keyword or delimiter was required.
    MissingKeyword(&'static str),
    MissingName,
    UnexpectedToken,
    /// An opening bracket was never matched.
    UnclosedGroup(&'static str),
    InvalidExpression,
}

/// Grammar violation with the expected set and the token actually seen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseDetail {
    pub kind: ParseErrorKind,
    pub expected: Vec<String>,
    pub found: String,
}

/// Structured stdlib argument error, rendered in the canonical
/// `bad argument #n to 'f' (...)` shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgumentDetail {
    pub function: SmolStr,
    pub arg: usize,
    pub expected: String,
    pub got: String,
    pub details: Option<String>,
}

#[derive(Debug, Clone)]
pub enum ErrorKind {
    Lex(LexErrorKind),
    Parse(ParseDetail),
    Compile(String),
    /// Wrong-typed operand at runtime.
    Type(String),
    /// `error()`, divide by zero, and other host-originated failures.
    /// Carries an arbitrary Lua value as payload.
    Runtime(LuaValue),
    /// `assert()` failure with the provided message value.
    Assertion(LuaValue),
    Argument(ArgumentDetail),
    /// VM invariant violation; should never escape a correct build.
    Internal(String),
}

#[derive(Debug, Clone)]
pub struct LuaError {
    pub kind: ErrorKind,
    pub position: Position,
    pub source: SmolStr,
    pub traceback: Vec<FrameTrace>,
}

impl LuaError {
    pub fn new(kind: ErrorKind, position: Position, source: SmolStr) -> Self {
        LuaError {
            kind,
            position,
            source,
            traceback: Vec::new(),
        }
    }

    pub fn with_traceback(mut self, traceback: Vec<FrameTrace>) -> Self {
        self.traceback = traceback;
        self
    }

    /// Header text for the report, by kind.
    pub fn header(&self) -> &'static str {
        match &self.kind {
            ErrorKind::Lex(_) => "Lex Error",
            ErrorKind::Parse(_) => "Parse Error",
            ErrorKind::Compile(_) => "Compile Error",
            ErrorKind::Type(_) => "Runtime Type Error",
            ErrorKind::Runtime(_) => "Runtime Error",
            ErrorKind::Assertion(_) => "Assertion Error",
            ErrorKind::Argument(_) => "Argument Error",
            ErrorKind::Internal(_) => "Internal Error",
        }
    }

    /// The bare message, without location or traceback.
    pub fn message(&self) -> String {
        match &self.kind {
            ErrorKind::Lex(kind) => kind.message(),
            ErrorKind::Parse(detail) => match &detail.kind {
                ParseErrorKind::MissingKeyword(k) => {
                    format!("'{}' expected near {}", k, detail.found)
                }
                ParseErrorKind::MissingName => {
                    format!("name expected near {}", detail.found)
                }
                ParseErrorKind::UnclosedGroup(open) => {
                    format!("unclosed '{}' near {}", open, detail.found)
                }
                ParseErrorKind::UnexpectedToken | ParseErrorKind::InvalidExpression => {
                    format!("unexpected symbol near {}", detail.found)
                }
            },
            ErrorKind::Compile(msg) => msg.clone(),
            ErrorKind::Type(msg) => msg.clone(),
            ErrorKind::Runtime(value) | ErrorKind::Assertion(value) => {
                error_value_message(value)
            }
            ErrorKind::Argument(detail) => {
                let mut msg = format!(
                    "bad argument #{} to '{}' ({} expected, got {})",
                    detail.arg, detail.function, detail.expected, detail.got
                );
                if let Some(extra) = &detail.details {
                    msg.push_str(": ");
                    msg.push_str(extra);
                }
                msg
            }
            ErrorKind::Internal(msg) => msg.clone(),
        }
    }

    /// The payload `pcall` hands back: the raised value for value-carrying
    /// errors, the formatted message string for everything else.
    pub fn to_lua_value(&self) -> LuaValue {
        match &self.kind {
            ErrorKind::Runtime(value) | ErrorKind::Assertion(value) => value.clone(),
            _ => LuaValue::str_from(&self.message()),
        }
    }
}

/// Render an error payload for a message context. Strings pass through;
/// non-string payloads are described rather than stringified.
pub fn error_value_message(value: &LuaValue) -> String {
    match value {
        LuaValue::Str(s) => s.to_string_lossy(),
        LuaValue::Integer(i) => integer_to_display(*i),
        LuaValue::Float(f) => float_to_display(*f),
        LuaValue::Boolean(b) => b.to_string(),
        LuaValue::Nil => "nil".to_string(),
        other => format!("(error object is a {} value)", other.type_name()),
    }
}

impl fmt::Display for LuaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {}:{}: {}",
            self.header(),
            self.source,
            self.position.line,
            self.message()
        )
    }
}

impl std::error::Error for LuaError {}
