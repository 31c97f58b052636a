use crate::token::Token;
use thiserror::Error;

/// A lexical error: the scanner hit input it cannot tokenize.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {message}")]
pub struct ScanError {
    pub line: usize,
    pub message: String,
}

/// A grammar violation. Carries the token the parser choked on so the
/// driver can report the source line.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {}: syntax error at {}: {}", .token.line, .token, .message)]
pub struct SyntaxError {
    pub token: Token,
    pub message: String,
}

impl SyntaxError {
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        SyntaxError {
            token: token.clone(),
            message: message.into(),
        }
    }
}

/// An evaluation failure: type errors, arity mismatches, undefined names,
/// division by zero. Aborts the current top-level execution.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("line {line}: {message}")]
pub struct RuntimeError {
    pub line: usize,
    pub message: String,
}

impl RuntimeError {
    pub fn new(token: &Token, message: impl Into<String>) -> Self {
        RuntimeError {
            line: token.line,
            message: message.into(),
        }
    }
}
