use thiserror::Error;
use std::fmt;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum KsError {
    #[error("Lexer error at line {line}, column {column}: {message}")]
    Lexer { line: usize, column: usize, message: String },

    #[error("Parser error at line {line}, column {column}: {message}")]
    Parser { line: usize, column: usize, message: String },

    #[error("Type error at line {line}, column {column}: {message}")]
    Type { line: usize, column: usize, message: String },

    #[error("Code generation error at line {line}, column {column}: {message}")]
    CodeGen { line: usize, column: usize, message: String },

    #[error("Runtime error: {0}")]
    Runtime(String),

    #[error("IO error: {0}")]
    Io(String),
}

pub type KsResult<T> = Result<T, KsError>;

impl KsError {
    /// 错误所在的源码位置（运行时与 IO 错误没有位置）
    pub fn location(&self) -> Option<SourceLocation> {
        match self {
            KsError::Lexer { line, column, .. }
            | KsError::Parser { line, column, .. }
            | KsError::Type { line, column, .. }
            | KsError::CodeGen { line, column, .. } => Some(SourceLocation {
                line: *line,
                column: *column,
            }),
            KsError::Runtime(_) | KsError::Io(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            KsError::Lexer { message, .. }
            | KsError::Parser { message, .. }
            | KsError::Type { message, .. }
            | KsError::CodeGen { message, .. } => message,
            KsError::Runtime(message) | KsError::Io(message) => message,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SourceLocation {
    pub line: usize,
    pub column: usize,
}

impl SourceLocation {
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for SourceLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

pub fn lexer_error(line: usize, column: usize, message: impl Into<String>) -> KsError {
    KsError::Lexer {
        line,
        column,
        message: message.into(),
    }
}

pub fn parser_error(loc: SourceLocation, message: impl Into<String>) -> KsError {
    KsError::Parser {
        line: loc.line,
        column: loc.column,
        message: message.into(),
    }
}

pub fn type_error(loc: SourceLocation, message: impl Into<String>) -> KsError {
    KsError::Type {
        line: loc.line,
        column: loc.column,
        message: message.into(),
    }
}

pub fn codegen_error(loc: SourceLocation, message: impl Into<String>) -> KsError {
    KsError::CodeGen {
        line: loc.line,
        column: loc.column,
        message: message.into(),
    }
}

pub fn runtime_error(message: impl Into<String>) -> KsError {
    KsError::Runtime(message.into())
}
