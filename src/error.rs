// ABOUTME: Error types for evaluation failures in the Smoosh interpreter

use thiserror::Error;

#[derive(Error, Debug)]
pub enum EvalError {
    #[error("type mismatch: {left} {op} {right}")]
    TypeMismatch { left: String, op: String, right: String },

    #[error("unknown operator: {op} {operand_types}")]
    UnknownOperator { op: String, operand_types: String },

    #[error("identifier not found: {name}")]
    UndefinedIdentifier { name: String },

    #[error("{function}: wrong number of arguments. got={actual}, want={expected}")]
    ArityMismatch { function: String, expected: String, actual: usize },

    #[error("not a function: {got}")]
    NotCallable { got: String },

    #[error("unusable as hash key: {got}")]
    NotHashable { got: String },

    #[error("index out of range")]
    IndexOutOfRange,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{message}")]
    FlagError { message: String },

    #[error("{0}")]
    Custom(String),
}

impl EvalError {
    pub fn arity(function: &str, expected: impl Into<String>, actual: usize) -> Self {
        EvalError::ArityMismatch { function: function.to_string(), expected: expected.into(), actual }
    }

    pub fn custom(message: impl Into<String>) -> Self {
        EvalError::Custom(message.into())
    }
}
