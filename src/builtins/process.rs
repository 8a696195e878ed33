//! Process built-ins: `$` (run an external program), `sleep`, `exit`.
//!
//! Grounded on `stdlib/dollar.go`, `sleep.go`, `exit.go`.

use super::{def, split_args, string_arg};
use crate::env::Environment;
use crate::error::EvalError;
use crate::interpolate;
use crate::value::Value;
use std::io::Write as _;
use std::process::{Command, Stdio};
use std::rc::Rc;
use std::sync::Arc;
use std::time::Duration;

pub fn register(env: &Rc<Environment>) {
    env.define("$".to_string(), dollar());
    env.define("sleep".to_string(), sleep());
    env.define("exit".to_string(), exit());
}

/// Splits `p` on whitespace, honoring `'`/`"`-quoted tokens, the way
/// `dollar.go`'s `parseArgv` splits on any Unicode quotation mark.
fn parse_argv(p: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut in_token = false;
    for c in p.chars() {
        match quote {
            Some(q) if c == q => quote = None,
            Some(_) => current.push(c),
            None if c == '\'' || c == '"' => {
                quote = Some(c);
                in_token = true;
            }
            None if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            None => {
                current.push(c);
                in_token = true;
            }
        }
    }
    if in_token {
        tokens.push(current);
    }
    tokens
}

/// `$("ls", "-la {{ .dir }}")` shell-splits its string arguments (each token
/// interpolated against the environment's exported bindings) and execs the
/// resulting program. stdin/stdout/stderr are wired through `scope.env`'s
/// streams, which `eval::apply_builtin_sync`/`apply_builtin_piped` have
/// already redirected to the current scope or to the pipeline's channels —
/// so `$` behaves correctly piped or unpiped without branching on it here,
/// matching the rest of this module's builtins.
fn dollar() -> Value {
    def("$", vec![], |scope, args| {
        let (_, positional) = split_args(args);
        if positional.is_empty() {
            return Err(EvalError::arity("$", "1+", 0));
        }
        let bindings = scope.env.export();
        let mut argv = Vec::new();
        for arg in &positional {
            let s = string_arg(arg, "$")?;
            for token in parse_argv(&s) {
                argv.push(interpolate::render(&token, &bindings));
            }
        }
        if argv.is_empty() {
            return Err(EvalError::custom("$: no command given"));
        }

        let mut command = Command::new(&argv[0]);
        command.args(&argv[1..]);
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let stdin_src = Arc::clone(&scope.env.streams().stdin);
        let stdout_dst = Arc::clone(&scope.env.streams().stdout);
        let stderr_dst = Arc::clone(&scope.env.streams().stderr);

        Ok(Box::new(move || {
            let mut child = match command.spawn() {
                Ok(child) => child,
                Err(e) => return Value::Error(format!("$: {}", e)),
            };
            let mut child_stdin = child.stdin.take().expect("stdin was piped");
            let mut child_stdout = child.stdout.take().expect("stdout was piped");
            let mut child_stderr = child.stderr.take().expect("stderr was piped");

            let writer = std::thread::spawn(move || {
                let mut guard = stdin_src.lock().unwrap();
                let _ = std::io::copy(&mut *guard, &mut child_stdin);
                let _ = child_stdin.flush();
            });
            let stdout_copier = std::thread::spawn(move || {
                let mut guard = stdout_dst.lock().unwrap();
                let _ = std::io::copy(&mut child_stdout, &mut *guard);
            });
            let stderr_copier = std::thread::spawn(move || {
                let mut guard = stderr_dst.lock().unwrap();
                let _ = std::io::copy(&mut child_stderr, &mut *guard);
            });

            let status = child.wait();
            let _ = writer.join();
            let _ = stdout_copier.join();
            let _ = stderr_copier.join();

            match status {
                Ok(status) if status.success() => Value::Null,
                Ok(status) => Value::Error(format!(
                    "$: exited with status {}",
                    status.code().unwrap_or(-1)
                )),
                Err(e) => Value::Error(format!("$: {}", e)),
            }
        }))
    })
}

/// Parses a `sleep` duration: a bare integer means seconds; a string carries
/// a trailing `s`/`m`/`h`/`d` unit suffix over its leading integer, per
/// `stdlib/sleep.go`.
fn parse_sleep_duration(value: &Value) -> Result<Duration, EvalError> {
    match value {
        Value::Integer(n) if *n >= 0 => Ok(Duration::from_secs(*n as u64)),
        Value::Integer(_) => Err(EvalError::custom("sleep: duration must not be negative")),
        Value::String(s) => {
            let s = s.trim();
            let (digits, unit) = match s.chars().last() {
                Some(c) if c.is_ascii_alphabetic() => (&s[..s.len() - c.len_utf8()], c),
                _ => (s, 's'),
            };
            let n: u64 = digits
                .parse()
                .map_err(|_| EvalError::custom(format!("sleep: invalid duration {:?}", s)))?;
            let duration = match unit {
                's' => Duration::from_secs(n),
                'm' => Duration::from_secs(n * 60),
                'h' => Duration::from_secs(n * 60 * 60),
                'd' => Duration::from_secs(n * 60 * 60 * 24),
                other => {
                    return Err(EvalError::custom(format!("sleep: unknown unit suffix {:?}", other)))
                }
            };
            Ok(duration)
        }
        other => Err(EvalError::custom(format!(
            "sleep: expected INTEGER seconds or a duration string, got {}",
            other.type_name()
        ))),
    }
}

/// `sleep(5)` or `sleep("5m")` blocks the calling stage for the given
/// duration.
fn sleep() -> Value {
    def("sleep", vec![], |_scope, args| {
        let (_, positional) = split_args(args);
        if positional.len() != 1 {
            return Err(EvalError::arity("sleep", "1", positional.len()));
        }
        let duration = parse_sleep_duration(&positional[0])?;
        Ok(Box::new(move || {
            std::thread::sleep(duration);
            Value::Null
        }))
    })
}

/// `exit(code?)` terminates the process immediately — it never returns a
/// `Value` to the caller, matching a shell's `exit` builtin.
fn exit() -> Value {
    def("exit", vec![], |_scope, args| {
        let (_, positional) = split_args(args);
        let code = match positional.first() {
            Some(Value::Integer(n)) => *n as i32,
            Some(other) => {
                return Err(EvalError::custom(format!(
                    "exit: expected INTEGER status code, got {}",
                    other.type_name()
                )))
            }
            None => 0,
        };
        Ok(Box::new(move || {
            std::process::exit(code);
        }))
    })
}
