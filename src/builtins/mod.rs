//! Built-in functions for Smoosh, registered into the top-level environment.
//!
//! Each sub-module groups a handful of built-ins from the original `stdlib`
//! package and exposes a `register(env)` function. Every built-in is bound
//! through the two-phase call protocol (`value::Builtin`'s `prepare`): given
//! a `Scope` and the call's already-evaluated arguments, `prepare` validates
//! them and returns a `Value`-producing `Operation` that the evaluator runs
//! either inline or on a pipeline thread.

use crate::env::Environment;
use crate::error::EvalError;
use crate::pipes::Scope;
use crate::sandbox::Sandbox;
use crate::value::{Builtin, Flag, FlagSpec, Operation, ParamType, PrepareFn, Value};
use std::rc::Rc;
use std::sync::{Arc, OnceLock};

pub mod archive;
pub mod core;
pub mod fs;
pub mod grep;
pub mod help;
pub mod io;
pub mod net;
pub mod process;
pub mod rw;

/// The process-wide sandbox, set once at startup by `main`. Stored behind a
/// `OnceLock<Arc<..>>` rather than a thread-local: a piped builtin's
/// `Operation` runs on a spawned thread (see `eval::apply_builtin_piped`),
/// and a thread-local set on the main thread would be invisible there.
static SANDBOX: OnceLock<Arc<Sandbox>> = OnceLock::new();

pub fn set_sandbox(sandbox: Sandbox) {
    let _ = SANDBOX.set(Arc::new(sandbox));
}

pub fn sandbox() -> Arc<Sandbox> {
    SANDBOX.get().cloned().expect("sandbox not initialized")
}

/// Builds a `Value::Builtin` from its name, declared flags, and `prepare`
/// closure — the one constructor every builtin module calls.
pub fn def(
    name: &'static str,
    flags: Vec<FlagSpec>,
    prepare: impl Fn(&Scope, &[Value]) -> Result<Operation, EvalError> + 'static,
) -> Value {
    let prepare: PrepareFn = Rc::new(prepare);
    Value::Builtin(Rc::new(Builtin { name, flags, prepare }))
}

pub fn flag_spec(name: &str, param_type: ParamType) -> FlagSpec {
    FlagSpec { name: name.to_string(), param_type }
}

/// Splits a call's evaluated arguments into bound flags and positional
/// values, the shape every builtin's `prepare` needs to work with.
pub fn split_args(args: &[Value]) -> (Vec<Rc<Flag>>, Vec<Value>) {
    let mut flags = Vec::new();
    let mut positional = Vec::new();
    for arg in args {
        match arg {
            Value::Flag(flag) => flags.push(Rc::clone(flag)),
            other => positional.push(other.clone()),
        }
    }
    (flags, positional)
}

pub fn find_flag<'a>(flags: &'a [Rc<Flag>], name: &str) -> Option<&'a Flag> {
    flags.iter().find(|f| f.name == name).map(|f| f.as_ref())
}

pub fn flag_int(flags: &[Rc<Flag>], name: &str, default: i64) -> Result<i64, EvalError> {
    match find_flag(flags, name) {
        Some(flag) => match flag.value.as_ref() {
            Value::Integer(n) => Ok(*n),
            other => Err(EvalError::custom(format!(
                "{}: flag -{} expected INTEGER, got {}",
                name,
                flag.name,
                other.type_name()
            ))),
        },
        None => Ok(default),
    }
}

pub fn flag_string<'a>(flags: &'a [Rc<Flag>], name: &str) -> Result<Option<&'a str>, EvalError> {
    match find_flag(flags, name) {
        Some(flag) => match flag.value.as_ref() {
            Value::String(s) => Ok(Some(s.as_str())),
            other => Err(EvalError::custom(format!(
                "{}: flag -{} expected STRING, got {}",
                name,
                flag.name,
                other.type_name()
            ))),
        },
        None => Ok(None),
    }
}

pub fn string_arg(value: &Value, function: &str) -> Result<String, EvalError> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Backtick(s) => Ok(s.clone()),
        other => Err(EvalError::custom(format!(
            "{}: expected STRING argument, got {}",
            function,
            other.type_name()
        ))),
    }
}

/// Registers every built-in into `env`, the top-level scope a fresh
/// interpreter or REPL session starts from.
pub fn register_builtins(env: &Rc<Environment>) {
    core::register(env);
    io::register(env);
    fs::register(env);
    archive::register(env);
    process::register(env);
    rw::register(env);
    net::register(env);
    grep::register(env);
    help::register(env);
}
