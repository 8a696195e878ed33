//! Console I/O built-ins: `echo`, `cat`, `head`, `tail`, `wc`, `tee`.
//!
//! Grounded on `stdlib/echo.go`, `cat.go`, `head.go`, `tail.go`, `wc.go`,
//! `tee.go`. Every builtin here reads/writes through `scope.env.streams()`
//! uniformly — `eval::apply_builtin_sync`/`apply_builtin_piped` already
//! redirect those streams to the right place (ambient process I/O, an
//! upstream pipe's reader, or a downstream pipe's writer) before `prepare`
//! ever runs, so none of these need to know whether they're piped.

use super::{def, find_flag, flag_int, flag_spec, split_args};
use crate::env::Environment;
use crate::error::EvalError;
use crate::value::{ParamType, Value};
use std::fs;
use std::io::{Read, Write};
use std::rc::Rc;
use std::sync::Arc;

pub fn register(env: &Rc<Environment>) {
    env.define("echo".to_string(), echo());
    env.define("cat".to_string(), cat());
    env.define("head".to_string(), head());
    env.define("tail".to_string(), tail());
    env.define("wc".to_string(), wc());
    env.define("tee".to_string(), tee());
}

fn echo() -> Value {
    def("echo", vec![], |scope, args| {
        let text: String = args.iter().map(|v| v.to_string()).collect::<Vec<_>>().join(" ");
        let stdout = Arc::clone(&scope.env.streams().stdout);
        Ok(Box::new(move || {
            let mut out = stdout.lock().unwrap();
            let _ = out.write_all(text.as_bytes());
            let _ = out.write_all(b"\n");
            Value::Null
        }))
    })
}

/// Reads input either from the named files, in order, or from stdin when no
/// filename arguments are given.
fn read_sources(args: &[Value], stdin: &mut dyn Read) -> Result<Vec<u8>, EvalError> {
    if args.is_empty() {
        let mut buf = Vec::new();
        stdin.read_to_end(&mut buf)?;
        return Ok(buf);
    }
    let mut buf = Vec::new();
    for arg in args {
        let path = super::string_arg(arg, "cat")?;
        buf.extend(fs::read(&path)?);
    }
    Ok(buf)
}

fn cat() -> Value {
    def(
        "cat",
        vec![
            flag_spec("E", ParamType::Bool),
            flag_spec("n", ParamType::Bool),
            flag_spec("s", ParamType::Bool),
        ],
        |scope, args| {
            let (flags, positional) = split_args(args);
            let show_ends = find_flag(&flags, "E").is_some();
            let number = find_flag(&flags, "n").is_some();
            let squeeze_blank = find_flag(&flags, "s").is_some();
            let stdin = Arc::clone(&scope.env.streams().stdin);
            let stdout = Arc::clone(&scope.env.streams().stdout);
            let bytes = {
                let mut guard = stdin.lock().unwrap();
                read_sources(&positional, &mut *guard)?
            };
            Ok(Box::new(move || {
                let mut out = stdout.lock().unwrap();
                if !show_ends && !number && !squeeze_blank {
                    let _ = out.write_all(&bytes);
                } else {
                    let text = String::from_utf8_lossy(&bytes);
                    let mut line_no = 1;
                    for line in text.lines() {
                        if !squeeze_blank || !line.trim().is_empty() {
                            if number {
                                let _ = write!(out, "{} ", line_no);
                            }
                            let _ = out.write_all(line.as_bytes());
                            if show_ends {
                                let _ = out.write_all(b"$");
                            }
                            let _ = out.write_all(b"\n");
                        }
                        line_no += 1;
                    }
                }
                Value::Null
            }))
        },
    )
}

fn head() -> Value {
    def("head", vec![flag_spec("n", ParamType::Int)], |scope, args| {
        let (flags, positional) = split_args(args);
        let n = flag_int(&flags, "n", 10)?;
        let stdin = Arc::clone(&scope.env.streams().stdin);
        let stdout = Arc::clone(&scope.env.streams().stdout);
        let bytes = {
            let mut guard = stdin.lock().unwrap();
            read_sources(&positional, &mut *guard)?
        };
        Ok(Box::new(move || {
            let text = String::from_utf8_lossy(&bytes);
            let mut out = stdout.lock().unwrap();
            for line in text.lines().take(n.max(0) as usize) {
                let _ = writeln!(out, "{}", line);
            }
            Value::Null
        }))
    })
}

fn tail() -> Value {
    def("tail", vec![flag_spec("n", ParamType::Int)], |scope, args| {
        let (flags, positional) = split_args(args);
        let n = flag_int(&flags, "n", 10)?;
        let stdin = Arc::clone(&scope.env.streams().stdin);
        let stdout = Arc::clone(&scope.env.streams().stdout);
        let bytes = {
            let mut guard = stdin.lock().unwrap();
            read_sources(&positional, &mut *guard)?
        };
        Ok(Box::new(move || {
            let text = String::from_utf8_lossy(&bytes);
            let lines: Vec<&str> = text.lines().collect();
            let n = n.max(0) as usize;
            let start = lines.len().saturating_sub(n);
            let mut out = stdout.lock().unwrap();
            for line in &lines[start..] {
                let _ = writeln!(out, "{}", line);
            }
            Value::Null
        }))
    })
}

/// With no selective flag, reports lines/words/bytes (spec.md's default).
/// `-l`/`-w`/`-c` narrow the report (and the returned array) to the chosen
/// counts, in that order, mirroring `wc.go`'s `do`.
fn wc() -> Value {
    def(
        "wc",
        vec![
            flag_spec("l", ParamType::Bool),
            flag_spec("w", ParamType::Bool),
            flag_spec("c", ParamType::Bool),
        ],
        |scope, args| {
            let (flags, positional) = split_args(args);
            let mut show_lines = find_flag(&flags, "l").is_some();
            let mut show_words = find_flag(&flags, "w").is_some();
            let mut show_bytes = find_flag(&flags, "c").is_some();
            if !show_lines && !show_words && !show_bytes {
                show_lines = true;
                show_words = true;
                show_bytes = true;
            }
            let stdin = Arc::clone(&scope.env.streams().stdin);
            let stdout = Arc::clone(&scope.env.streams().stdout);
            let bytes = {
                let mut guard = stdin.lock().unwrap();
                read_sources(&positional, &mut *guard)?
            };
            Ok(Box::new(move || {
                let text = String::from_utf8_lossy(&bytes);
                let lines = text.lines().count() as i64;
                let words = text.split_whitespace().count() as i64;
                let byte_count = bytes.len() as i64;
                let mut counts = Vec::new();
                let mut parts = Vec::new();
                if show_lines {
                    counts.push(Value::Integer(lines));
                    parts.push(lines.to_string());
                }
                if show_words {
                    counts.push(Value::Integer(words));
                    parts.push(words.to_string());
                }
                if show_bytes {
                    counts.push(Value::Integer(byte_count));
                    parts.push(byte_count.to_string());
                }
                let _ = writeln!(stdout.lock().unwrap(), "{}", parts.join(" "));
                Value::Array(counts)
            }))
        },
    )
}

/// `-a` opens destinations for append instead of truncating, matching
/// `tee.go`'s `O_APPEND` branch.
fn tee() -> Value {
    def("tee", vec![flag_spec("a", ParamType::Bool)], |scope, args| {
        let (flags, positional) = split_args(args);
        let append = find_flag(&flags, "a").is_some();
        let mut paths = Vec::new();
        for arg in &positional {
            paths.push(super::string_arg(arg, "tee")?);
        }
        let stdin = Arc::clone(&scope.env.streams().stdin);
        let stdout = Arc::clone(&scope.env.streams().stdout);
        let mut bytes = Vec::new();
        stdin.lock().unwrap().read_to_end(&mut bytes)?;
        Ok(Box::new(move || {
            let _ = stdout.lock().unwrap().write_all(&bytes);
            for path in &paths {
                let written = if append {
                    fs::OpenOptions::new()
                        .create(true)
                        .append(true)
                        .open(path)
                        .and_then(|mut f| f.write_all(&bytes))
                } else {
                    fs::write(path, &bytes)
                };
                let _ = written;
            }
            Value::Null
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Streams;
    use crate::pipes::Scope;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    fn scope_with_stdin(input: &str) -> (Scope, Arc<Mutex<Vec<u8>>>) {
        let sink: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let stdin: Box<dyn Read + Send> = Box::new(Cursor::new(input.as_bytes().to_vec()));
        let stdout_sink = sink.clone();
        let streams = Streams {
            stdin: Arc::new(Mutex::new(stdin)),
            stdout: Arc::new(Mutex::new(Box::new(VecSink(stdout_sink)) as Box<dyn Write + Send>)),
            stderr: Arc::new(Mutex::new(Box::new(Vec::new()) as Box<dyn Write + Send>)),
        };
        let env = Environment::with_streams(streams);
        (Scope::new(env), sink)
    }

    struct VecSink(Arc<Mutex<Vec<u8>>>);
    impl Write for VecSink {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn cat_with_no_args_echoes_stdin() {
        let (scope, sink) = scope_with_stdin("hello\n");
        let Value::Builtin(b) = cat() else { panic!() };
        (b.prepare)(&scope, &[]).unwrap()();
        assert_eq!(sink.lock().unwrap().as_slice(), b"hello\n");
    }

    #[test]
    fn head_limits_to_n_lines() {
        let (scope, sink) = scope_with_stdin("a\nb\nc\nd\n");
        let Value::Builtin(b) = head() else { panic!() };
        let flag = Value::Flag(Rc::new(crate::value::Flag {
            name: "n".to_string(),
            param_type: ParamType::Int,
            value: Box::new(Value::Integer(2)),
        }));
        (b.prepare)(&scope, &[flag]).unwrap()();
        assert_eq!(String::from_utf8(sink.lock().unwrap().clone()).unwrap(), "a\nb\n");
    }

    #[test]
    fn tail_keeps_last_n_lines() {
        let (scope, sink) = scope_with_stdin("a\nb\nc\nd\n");
        let Value::Builtin(b) = tail() else { panic!() };
        let flag = Value::Flag(Rc::new(crate::value::Flag {
            name: "n".to_string(),
            param_type: ParamType::Int,
            value: Box::new(Value::Integer(1)),
        }));
        (b.prepare)(&scope, &[flag]).unwrap()();
        assert_eq!(String::from_utf8(sink.lock().unwrap().clone()).unwrap(), "d\n");
    }

    #[test]
    fn wc_counts_lines_words_bytes() {
        let (scope, _sink) = scope_with_stdin("one two\nthree\n");
        let Value::Builtin(b) = wc() else { panic!() };
        let result = (b.prepare)(&scope, &[]).unwrap()();
        match result {
            Value::Array(items) => {
                assert!(matches!(items[0], Value::Integer(2)));
                assert!(matches!(items[1], Value::Integer(3)));
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    fn bool_flag(name: &str) -> Value {
        Value::Flag(Rc::new(crate::value::Flag {
            name: name.to_string(),
            param_type: ParamType::Bool,
            value: Box::new(Value::Boolean(true)),
        }))
    }

    #[test]
    fn wc_l_flag_selects_only_the_line_count() {
        let (scope, _sink) = scope_with_stdin("one two\nthree\n");
        let Value::Builtin(b) = wc() else { panic!() };
        let result = (b.prepare)(&scope, &[bool_flag("l")]).unwrap()();
        match result {
            Value::Array(items) => {
                assert_eq!(items.len(), 1);
                assert!(matches!(items[0], Value::Integer(2)));
            }
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn cat_n_flag_numbers_each_line() {
        let (scope, sink) = scope_with_stdin("a\nb\n");
        let Value::Builtin(b) = cat() else { panic!() };
        (b.prepare)(&scope, &[bool_flag("n")]).unwrap()();
        assert_eq!(String::from_utf8(sink.lock().unwrap().clone()).unwrap(), "1 a\n2 b\n");
    }

    #[test]
    fn cat_e_flag_marks_line_ends_with_a_dollar_sign() {
        let (scope, sink) = scope_with_stdin("a\nb\n");
        let Value::Builtin(b) = cat() else { panic!() };
        (b.prepare)(&scope, &[bool_flag("E")]).unwrap()();
        assert_eq!(String::from_utf8(sink.lock().unwrap().clone()).unwrap(), "a$\nb$\n");
    }

    #[test]
    fn cat_s_flag_drops_blank_lines() {
        let (scope, sink) = scope_with_stdin("a\n\n\nb\n");
        let Value::Builtin(b) = cat() else { panic!() };
        (b.prepare)(&scope, &[bool_flag("s")]).unwrap()();
        assert_eq!(String::from_utf8(sink.lock().unwrap().clone()).unwrap(), "a\nb\n");
    }

    #[test]
    fn tee_a_flag_appends_instead_of_truncating() {
        let dir = std::env::temp_dir().join("smoosh_tee_append_test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("log.txt");
        std::fs::write(&file, "first\n").unwrap();

        let (scope, _sink) = scope_with_stdin("second\n");
        let Value::Builtin(b) = tee() else { panic!() };
        let args = [bool_flag("a"), Value::String(file.to_string_lossy().into_owned())];
        (b.prepare)(&scope, &args).unwrap()();
        let contents = std::fs::read_to_string(&file).unwrap();
        assert_eq!(contents, "first\nsecond\n");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn tee_without_a_flag_truncates_the_destination() {
        let dir = std::env::temp_dir().join("smoosh_tee_truncate_test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("log.txt");
        std::fs::write(&file, "stale contents that should be gone\n").unwrap();

        let (scope, _sink) = scope_with_stdin("fresh\n");
        let Value::Builtin(b) = tee() else { panic!() };
        let args = [Value::String(file.to_string_lossy().into_owned())];
        (b.prepare)(&scope, &args).unwrap()();
        let contents = std::fs::read_to_string(&file).unwrap();
        assert_eq!(contents, "fresh\n");
        let _ = std::fs::remove_dir_all(&dir);
    }
}
