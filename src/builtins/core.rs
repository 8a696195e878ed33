//! Data-structure built-ins: `len`, `first`, `last`, `rest`, `push`.
//!
//! Grounded on `stdlib/builtins.go`'s ARRAY/STRING/HASH helpers. None of
//! these touch I/O or the pipeline, so each `prepare` just validates its
//! argument and returns an `Operation` that immediately produces the result
//! — there's nothing to defer.

use super::def;
use crate::env::Environment;
use crate::error::EvalError;
use crate::value::Value;
use std::rc::Rc;

pub fn register(env: &Rc<Environment>) {
    env.define("len".to_string(), len());
    env.define("first".to_string(), first());
    env.define("last".to_string(), last());
    env.define("rest".to_string(), rest());
    env.define("push".to_string(), push());
}

fn len() -> Value {
    def("len", vec![], |_scope, args| {
        if args.len() != 1 {
            return Err(EvalError::arity("len", "1", args.len()));
        }
        let n = match &args[0] {
            Value::String(s) => s.chars().count() as i64,
            Value::Array(items) => items.len() as i64,
            Value::Hash(map) => map.len() as i64,
            other => {
                return Err(EvalError::custom(format!(
                    "argument to `len` not supported, got {}",
                    other.type_name()
                )))
            }
        };
        Ok(Box::new(move || Value::Integer(n)))
    })
}

fn first() -> Value {
    def("first", vec![], |_scope, args| {
        if args.len() != 1 {
            return Err(EvalError::arity("first", "1", args.len()));
        }
        match &args[0] {
            Value::Array(items) => {
                let value = items.first().cloned().unwrap_or(Value::Null);
                Ok(Box::new(move || value))
            }
            other => Err(EvalError::custom(format!(
                "argument to `first` must be ARRAY, got {}",
                other.type_name()
            ))),
        }
    })
}

fn last() -> Value {
    def("last", vec![], |_scope, args| {
        if args.len() != 1 {
            return Err(EvalError::arity("last", "1", args.len()));
        }
        match &args[0] {
            Value::Array(items) => {
                let value = items.last().cloned().unwrap_or(Value::Null);
                Ok(Box::new(move || value))
            }
            other => Err(EvalError::custom(format!(
                "argument to `last` must be ARRAY, got {}",
                other.type_name()
            ))),
        }
    })
}

fn rest() -> Value {
    def("rest", vec![], |_scope, args| {
        if args.len() != 1 {
            return Err(EvalError::arity("rest", "1", args.len()));
        }
        match &args[0] {
            Value::Array(items) => {
                let value = if items.is_empty() {
                    Value::Null
                } else {
                    Value::Array(items[1..].to_vec())
                };
                Ok(Box::new(move || value))
            }
            other => Err(EvalError::custom(format!(
                "argument to `rest` must be ARRAY, got {}",
                other.type_name()
            ))),
        }
    })
}

fn push() -> Value {
    def("push", vec![], |_scope, args| {
        if args.len() != 2 {
            return Err(EvalError::arity("push", "2", args.len()));
        }
        match &args[0] {
            Value::Array(items) => {
                let mut out = items.clone();
                out.push(args[1].clone());
                Ok(Box::new(move || Value::Array(out)))
            }
            other => Err(EvalError::custom(format!(
                "argument to `push` must be ARRAY, got {}",
                other.type_name()
            ))),
        }
    })
}
