// ABOUTME: Value types representing Smoosh's runtime data model

use crate::ast::{Node, Param};
use crate::env::Environment;
use crate::error::EvalError;
use crate::pipes::{Pipes, Scope};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// The type a flag's argument is parsed as (spec.md §3's FLAG tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamType {
    Bool,
    Int,
    String,
}

/// What a two-phase builtin call produces once all flags/args are bound: a
/// thunk the evaluator runs either inline (no downstream pipe) or on a
/// spawned thread (piped), mirroring the original `(Operation, error)`
/// return from `prepare`. Bounded `Send` because a piped call always runs it
/// on a spawned thread regardless of whether a given call site happens to be
/// piped — the one `Operation` type has to satisfy both call shapes. A
/// `prepare` closure may freely use `&Scope`'s `Rc<Environment>` while
/// building the `Operation`, but the `Operation` itself must only capture
/// `Send` data (e.g. a cloned `Arc<Streams>`, owned `String`/`Vec<u8>`, or a
/// `pipes::ChannelReader`/`ChannelWriter`), never the `Rc<Environment>`.
pub type Operation = Box<dyn FnOnce() -> Value + Send>;

pub type PrepareFn = Rc<dyn Fn(&Scope, &[Value]) -> Result<Operation, EvalError>>;

/// A flag a builtin declares it accepts, e.g. `head`'s `n` (INTEGER). Purely
/// descriptive — no runtime value lives here; see `Flag` for a bound
/// instance.
#[derive(Debug, Clone)]
pub struct FlagSpec {
    pub name: String,
    pub param_type: ParamType,
}

#[derive(Clone)]
pub struct Builtin {
    pub name: &'static str,
    pub flags: Vec<FlagSpec>,
    pub prepare: PrepareFn,
}

impl fmt::Debug for Builtin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Builtin({})", self.name)
    }
}

/// A bound flag instance produced by calling a builtin's declared flag name
/// as part of the call's argument list, e.g. `n(5)` in `head(n(5), "file")`.
/// For an INTEGER/STRING flag, the call protocol binds the flag's name to a
/// tiny builtin in the call's enclosed environment that, when invoked with
/// one argument, produces this value; a BOOLEAN flag is instead bound
/// directly as a `Flag` with `value: true`, used bare (no call needed).
#[derive(Debug, Clone)]
pub struct Flag {
    pub name: String,
    pub param_type: ParamType,
    pub value: Box<Value>,
}

/// The key half of a HASH entry. Only hashable scalars are allowed as keys
/// (spec.md §3), matching `object.Hashable` in the original implementation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HashKey {
    Integer(i64),
    Boolean(bool),
    String(String),
}

impl fmt::Display for HashKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HashKey::Integer(n) => write!(f, "{}", n),
            HashKey::Boolean(b) => write!(f, "{}", b),
            HashKey::String(s) => write!(f, "{}", s),
        }
    }
}

#[derive(Debug, Clone)]
pub struct HashPair {
    pub key: Value,
    pub value: Value,
}

#[derive(Debug, Clone)]
pub enum Value {
    Integer(i64),
    Boolean(bool),
    String(String),
    Null,

    Array(Vec<Value>),
    Hash(HashMap<HashKey, HashPair>),

    Function {
        params: Vec<Param>,
        body: Box<Node>,
        env: Rc<Environment>,
    },
    Builtin(Rc<Builtin>),
    Flag(Rc<Flag>),

    Error(String),
    Return(Box<Value>),

    /// A backtick literal, e.g. `` `ls -l` ``: a shell command string that
    /// has not yet been parsed/executed as a sub-pipeline.
    Backtick(String),

    /// A running or completed pipeline stage handed back to the caller
    /// (e.g. when a call's result is piped to another call rather than
    /// drained immediately).
    Pipes(Rc<Pipes>),

    Quote(Box<Node>),
    Macro {
        params: Vec<Param>,
        body: Box<Node>,
        env: Rc<Environment>,
    },
}

impl Value {
    /// Smoosh's truthiness law (spec.md §4.1): everything is truthy except
    /// `null` and `false`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Null | Value::Boolean(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Integer(_) => "INTEGER",
            Value::Boolean(_) => "BOOLEAN",
            Value::String(_) => "STRING",
            Value::Null => "NULL",
            Value::Array(_) => "ARRAY",
            Value::Hash(_) => "HASH",
            Value::Function { .. } => "FUNCTION",
            Value::Builtin(_) => "BUILTIN",
            Value::Flag(_) => "FLAG",
            Value::Error(_) => "ERROR",
            Value::Return(_) => "RETURN",
            Value::Backtick(_) => "BACKTICK",
            Value::Pipes(_) => "PIPES",
            Value::Quote(_) => "QUOTE",
            Value::Macro { .. } => "MACRO",
        }
    }

    pub fn hash_key(&self) -> Result<HashKey, EvalError> {
        match self {
            Value::Integer(n) => Ok(HashKey::Integer(*n)),
            Value::Boolean(b) => Ok(HashKey::Boolean(*b)),
            Value::String(s) => Ok(HashKey::String(s.clone())),
            other => Err(EvalError::NotHashable { got: other.type_name().to_string() }),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Integer(n) => write!(f, "{}", n),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::String(s) => write!(f, "{}", s),
            Value::Null => write!(f, "null"),
            Value::Array(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            Value::Hash(map) => {
                write!(f, "{{")?;
                for (i, pair) in map.values().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", pair.key, pair.value)?;
                }
                write!(f, "}}")
            }
            Value::Function { params, .. } => {
                write!(f, "fn(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p.name)?;
                }
                write!(f, ") {{ ... }}")
            }
            Value::Builtin(b) => write!(f, "builtin {}", b.name),
            Value::Flag(flag) => write!(f, "-{}", flag.name),
            Value::Error(msg) => write!(f, "ERROR: {}", msg),
            Value::Return(v) => write!(f, "{}", v),
            Value::Backtick(cmd) => write!(f, "`{}`", cmd),
            Value::Pipes(_) => write!(f, "<pipes>"),
            Value::Quote(node) => write!(f, "QUOTE({:?})", node),
            Value::Macro { params, .. } => {
                write!(f, "macro(")?;
                for (i, p) in params.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", p.name)?;
                }
                write!(f, ") {{ ... }}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_null_and_false_are_falsy() {
        assert!(!Value::Null.is_truthy());
        assert!(!Value::Boolean(false).is_truthy());
        assert!(Value::Boolean(true).is_truthy());
        assert!(Value::Integer(0).is_truthy());
        assert!(Value::String(String::new()).is_truthy());
        assert!(Value::Array(vec![]).is_truthy());
    }

    #[test]
    fn integer_display_has_no_decoration() {
        assert_eq!(format!("{}", Value::Integer(42)), "42");
        assert_eq!(format!("{}", Value::Integer(-7)), "-7");
    }

    #[test]
    fn array_display_is_bracketed_comma_list() {
        let arr = Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)]);
        assert_eq!(format!("{}", arr), "[1, 2, 3]");
    }

    #[test]
    fn null_displays_as_null() {
        assert_eq!(format!("{}", Value::Null), "null");
    }

    #[test]
    fn hash_key_rejects_non_hashable_values() {
        let err = Value::Array(vec![]).hash_key().unwrap_err();
        assert!(matches!(err, EvalError::NotHashable { .. }));
    }

    #[test]
    fn hash_key_accepts_scalars() {
        assert_eq!(Value::Integer(5).hash_key().unwrap(), HashKey::Integer(5));
        assert_eq!(Value::Boolean(true).hash_key().unwrap(), HashKey::Boolean(true));
        assert_eq!(
            Value::String("k".into()).hash_key().unwrap(),
            HashKey::String("k".into())
        );
    }

    #[test]
    fn error_display_is_prefixed() {
        assert_eq!(format!("{}", Value::Error("boom".into())), "ERROR: boom");
    }
}
