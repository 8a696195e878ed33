// ABOUTME: Environment module for managing variable bindings, scopes, and I/O streams

use crate::error::EvalError;
use crate::value::{HashKey, Value};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::rc::Rc;
use std::sync::{Arc, Mutex};

/// The program's top-level stdin/stdout/stderr, shared by every scope in the
/// tree so a deeply nested builtin call can still write to the same stream
/// the REPL or file runner is reading/writing from.
///
/// Each handle is independently `Arc<Mutex<..>>`-wrapped (rather than one
/// `Rc<RefCell<..>>` bundle) for two reasons: a builtin's prepared
/// `Operation` can carry a clone across the OS thread a piped call runs on
/// (see `eval::apply_piped`) while `Environment` itself stays `Rc`-based and
/// main-thread-only; and a pipeline stage that only needs to redirect stdin
/// can share the surrounding scope's stdout/stderr handles unchanged rather
/// than rebuilding the whole bundle.
#[derive(Clone)]
pub struct Streams {
    pub stdin: Arc<Mutex<Box<dyn Read + Send>>>,
    pub stdout: Arc<Mutex<Box<dyn Write + Send>>>,
    pub stderr: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl Streams {
    pub fn stdio() -> Streams {
        Streams {
            stdin: Arc::new(Mutex::new(Box::new(io::stdin()))),
            stdout: Arc::new(Mutex::new(Box::new(io::stdout()))),
            stderr: Arc::new(Mutex::new(Box::new(io::stderr()))),
        }
    }

    pub fn write_stdout(&self, bytes: &[u8]) -> io::Result<()> {
        self.stdout.lock().unwrap().write_all(bytes)
    }

    pub fn write_stderr(&self, bytes: &[u8]) -> io::Result<()> {
        self.stderr.lock().unwrap().write_all(bytes)
    }
}

/// A depth-limited, plain-data projection of a `Value`, used as the
/// substitution source for `{{ .NAME }}` string interpolation. Functions,
/// builtins, flags, and pipes have no plain-data form and export as `Opaque`.
#[derive(Debug, Clone)]
pub enum ExportValue {
    Integer(i64),
    Boolean(bool),
    String(String),
    Null,
    Array(Vec<ExportValue>),
    Hash(HashMap<String, ExportValue>),
    Opaque(String),
}

impl fmt::Display for ExportValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportValue::Integer(n) => write!(f, "{}", n),
            ExportValue::Boolean(b) => write!(f, "{}", b),
            ExportValue::String(s) => write!(f, "{}", s),
            ExportValue::Null => write!(f, ""),
            ExportValue::Array(items) => {
                let rendered: Vec<String> = items.iter().map(|v| v.to_string()).collect();
                write!(f, "[{}]", rendered.join(" "))
            }
            ExportValue::Hash(_) => write!(f, "<hash>"),
            ExportValue::Opaque(label) => write!(f, "{}", label),
        }
    }
}

/// The maximum recursion depth `Export` will descend into nested
/// arrays/hashes before bottoming out, guarding against runaway interpolation
/// of self-referential structures.
const EXPORT_MAX_DEPTH: usize = 16;

fn export_value(value: &Value, depth: usize) -> ExportValue {
    if depth > EXPORT_MAX_DEPTH {
        return ExportValue::Opaque("<max depth exceeded>".to_string());
    }
    match value {
        Value::Integer(n) => ExportValue::Integer(*n),
        Value::Boolean(b) => ExportValue::Boolean(*b),
        Value::String(s) => ExportValue::String(s.clone()),
        Value::Backtick(s) => ExportValue::String(s.clone()),
        Value::Null => ExportValue::Null,
        Value::Array(items) => {
            ExportValue::Array(items.iter().map(|v| export_value(v, depth + 1)).collect())
        }
        Value::Hash(map) => {
            let mut out = HashMap::new();
            for pair in map.values() {
                out.insert(pair.key.to_string(), export_value(&pair.value, depth + 1));
            }
            ExportValue::Hash(out)
        }
        other => ExportValue::Opaque(format!("<{}>", other.type_name().to_lowercase())),
    }
}

#[derive(Debug)]
pub struct Environment {
    bindings: RefCell<HashMap<String, Value>>,
    parent: Option<Rc<Environment>>,
    streams: Streams,
}

impl fmt::Debug for Streams {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Streams")
    }
}

impl Environment {
    pub fn new() -> Rc<Self> {
        Self::with_streams(Streams::stdio())
    }

    pub fn with_streams(streams: Streams) -> Rc<Self> {
        Rc::new(Environment { bindings: RefCell::new(HashMap::new()), parent: None, streams })
    }

    /// Creates a new child scope sharing the parent's `Streams`.
    pub fn child(parent: &Rc<Environment>) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
            streams: parent.streams.clone(),
        })
    }

    /// Creates a child scope preserving `parent`'s lexical bindings but
    /// redirecting I/O to `streams` — used when wiring a pipeline stage's
    /// stdin/stdout to its neighboring stages instead of the ambient process
    /// streams.
    pub fn child_with_streams(parent: &Rc<Environment>, streams: Streams) -> Rc<Self> {
        Rc::new(Environment {
            bindings: RefCell::new(HashMap::new()),
            parent: Some(Rc::clone(parent)),
            streams,
        })
    }

    pub fn streams(&self) -> &Streams {
        &self.streams
    }

    /// Binds `name` in this scope, shadowing any outer binding of the same
    /// name regardless of its tag. Used for `var`, function parameters, and
    /// `for`/`range` loop variables.
    pub fn define(&self, name: String, value: Value) {
        self.bindings.borrow_mut().insert(name, value);
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.bindings.borrow().get(name) {
            return Some(value.clone());
        }
        self.parent.as_ref().and_then(|parent| parent.get(name))
    }

    /// Reassigns an existing binding in place. If `name` is already bound in
    /// *this* scope, the new value's tag must match the existing one's tag —
    /// this is Smoosh's same-scope reassignment rule. If `name` is bound only
    /// in an outer scope, the reassignment walks up to that scope (matching
    /// the same tag rule there). If `name` is unbound anywhere, it is defined
    /// fresh in this scope.
    pub fn set(&self, name: &str, value: Value) -> Result<(), EvalError> {
        if let Some(existing) = self.bindings.borrow().get(name) {
            if existing.type_name() != value.type_name() {
                return Err(EvalError::custom(format!(
                    "cannot reassign {}: type {} but expected {}",
                    name,
                    value.type_name(),
                    existing.type_name()
                )));
            }
        } else if let Some(parent) = &self.parent {
            if parent.get(name).is_some() {
                return parent.set(name, value);
            }
        }
        self.bindings.borrow_mut().insert(name.to_string(), value);
        Ok(())
    }

    /// Produces the plain-data snapshot of this scope's visible bindings,
    /// used by `interpolate::render` to resolve `{{ .NAME }}` placeholders.
    /// Outer bindings are visible but inner ones take precedence, matching
    /// normal lexical shadowing.
    pub fn export(&self) -> HashMap<String, ExportValue> {
        let mut out = if let Some(parent) = &self.parent { parent.export() } else { HashMap::new() };
        for (name, value) in self.bindings.borrow().iter() {
            out.insert(name.clone(), export_value(value, 0));
        }
        out
    }
}

/// Builds a `HashKey` for a `Value`, used by builtins constructing literal
/// hashes at runtime (e.g. from `http.Get`'s response headers).
pub fn hash_key_of(value: &Value) -> Result<HashKey, EvalError> {
    value.hash_key()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn define_and_get_roundtrip() {
        let env = Environment::new();
        env.define("x".to_string(), Value::Integer(42));
        assert!(matches!(env.get("x"), Some(Value::Integer(42))));
    }

    #[test]
    fn undefined_identifier_is_none() {
        let env = Environment::new();
        assert!(env.get("missing").is_none());
    }

    #[test]
    fn child_scope_shadows_parent_freely() {
        let parent = Environment::new();
        parent.define("x".to_string(), Value::Integer(1));
        let child = Environment::child(&parent);
        child.define("x".to_string(), Value::String("shadowed".into()));
        assert!(matches!(child.get("x"), Some(Value::String(ref s)) if s == "shadowed"));
        assert!(matches!(parent.get("x"), Some(Value::Integer(1))));
    }

    #[test]
    fn set_in_same_scope_with_matching_tag_succeeds() {
        let env = Environment::new();
        env.define("x".to_string(), Value::Integer(1));
        env.set("x", Value::Integer(2)).unwrap();
        assert!(matches!(env.get("x"), Some(Value::Integer(2))));
    }

    #[test]
    fn set_in_same_scope_with_mismatched_tag_fails() {
        let env = Environment::new();
        env.define("x".to_string(), Value::Integer(1));
        let err = env.set("x", Value::String("oops".into())).unwrap_err();
        assert_eq!(err.to_string(), "cannot reassign x: type STRING but expected INTEGER");
    }

    #[test]
    fn set_walks_up_to_outer_scope_binding() {
        let parent = Environment::new();
        parent.define("x".to_string(), Value::Integer(1));
        let child = Environment::child(&parent);
        child.set("x", Value::Integer(99)).unwrap();
        assert!(matches!(parent.get("x"), Some(Value::Integer(99))));
    }

    #[test]
    fn set_on_unbound_name_defines_it_fresh() {
        let env = Environment::new();
        env.set("y", Value::Integer(5)).unwrap();
        assert!(matches!(env.get("y"), Some(Value::Integer(5))));
    }

    #[test]
    fn export_converts_scalars_and_arrays() {
        let env = Environment::new();
        env.define("name".to_string(), Value::String("smoosh".into()));
        env.define("count".to_string(), Value::Integer(3));
        let exported = env.export();
        assert_eq!(exported.get("name").unwrap().to_string(), "smoosh");
        assert_eq!(exported.get("count").unwrap().to_string(), "3");
    }

    #[test]
    fn export_sees_outer_bindings_through_child_scope() {
        let parent = Environment::new();
        parent.define("a".to_string(), Value::Integer(1));
        let child = Environment::child(&parent);
        child.define("b".to_string(), Value::Integer(2));
        let exported = child.export();
        assert!(exported.contains_key("a"));
        assert!(exported.contains_key("b"));
    }
}
