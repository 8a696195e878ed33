//! Network built-in: `http.Get`, grounded on `stdlib/http.go`.
//!
//! The only built-in that routes through `sandbox::Sandbox` — network access
//! is gated behind `--allow-network`/`--net-allow` (wired up by `main.rs`
//! into the process-wide sandbox at startup), unlike the filesystem
//! built-ins in `fs.rs`, which talk to `std::fs` directly.

use super::{def, split_args, string_arg};
use crate::env::Environment;
use crate::error::EvalError;
use crate::value::Value;
use std::io::Write as _;
use std::rc::Rc;
use std::sync::Arc;

pub fn register(env: &Rc<Environment>) {
    env.define("http.Get".to_string(), http_get());
}

/// Outside a pipeline, `http.Get` returns the response body as a string.
/// Piped into a downstream stage, the body goes to stdout (so it can flow
/// on) while the status and headers go to stderr instead, since a `Hash`
/// return value would have nowhere useful to go.
fn http_get() -> Value {
    def("http.Get", vec![], |scope, args| {
        let (_, positional) = split_args(args);
        if positional.len() != 1 {
            return Err(EvalError::arity("http.Get", "1", positional.len()));
        }
        let url = string_arg(&positional[0], "http.Get")?;
        let piped = scope.output.is_some();
        let stdout = Arc::clone(&scope.env.streams().stdout);
        let stderr = Arc::clone(&scope.env.streams().stderr);
        Ok(Box::new(move || {
            let sandbox = super::sandbox();
            match sandbox.http_request(&url, "GET", None, None, None) {
                Ok(response) => {
                    if piped {
                        let _ = stdout.lock().unwrap().write_all(response.body.as_bytes());
                        let _ = writeln!(
                            stderr.lock().unwrap(),
                            "{} {:?}",
                            response.status,
                            response.headers
                        );
                        Value::Null
                    } else {
                        Value::String(response.body)
                    }
                }
                Err(e) => Value::Error(e.to_string()),
            }
        }))
    })
}
