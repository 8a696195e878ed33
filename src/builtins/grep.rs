//! `grep` built-in, grounded on `stdlib/grep.go`: filters stdin or named
//! files (optionally recursed into directories) for lines matching a POSIX
//! or Perl-style (`-P`) regex pattern.

use super::{def, flag_spec, split_args};
use crate::env::Environment;
use crate::error::EvalError;
use crate::value::{ParamType, Value};
use regex::{Regex, RegexBuilder};
use std::fs;
use std::io::{Read, Write};
use std::path::Path;
use std::rc::Rc;
use std::sync::Arc;

pub fn register(env: &Rc<Environment>) {
    env.define("grep".to_string(), grep());
}

/// Mirrors `stdlib/grep.go`'s `compile`: in Perl mode, ignore-case is
/// expressed as a leading `(?i)` inline flag; in POSIX mode (the default),
/// the regex engine's own case-insensitive option is used instead.
fn compile_pattern(pattern: &str, ignore_case: bool, is_perl: bool) -> Result<Regex, EvalError> {
    if ignore_case && is_perl {
        let prefixed =
            if pattern.starts_with("(?") { pattern.to_string() } else { format!("(?i){}", pattern) };
        return Regex::new(&prefixed)
            .map_err(|e| EvalError::custom(format!("grep: invalid pattern {:?}: {}", pattern, e)));
    }
    RegexBuilder::new(pattern)
        .case_insensitive(ignore_case)
        .build()
        .map_err(|e| EvalError::custom(format!("grep: invalid pattern {:?}: {}", pattern, e)))
}

/// Reads `path` into `out` as `(filename, bytes)`; recurses into
/// directories only when `recurse` is set, matching `-r`. A non-recursed
/// directory is silently skipped, matching `grep.go`'s own (never fully
/// implemented) recursion stub.
fn collect_sources(path: &Path, recurse: bool, out: &mut Vec<(String, Vec<u8>)>) -> Result<(), EvalError> {
    let meta = fs::metadata(path)?;
    if meta.is_dir() {
        if !recurse {
            return Ok(());
        }
        let mut entries: Vec<_> = fs::read_dir(path)?.collect::<Result<_, _>>()?;
        entries.sort_by_key(|e| e.path());
        for entry in entries {
            collect_sources(&entry.path(), recurse, out)?;
        }
        return Ok(());
    }
    out.push((path.to_string_lossy().into_owned(), fs::read(path)?));
    Ok(())
}

fn grep() -> Value {
    def(
        "grep",
        vec![
            flag_spec("i", ParamType::Bool),
            flag_spec("v", ParamType::Bool),
            flag_spec("H", ParamType::Bool),
            flag_spec("n", ParamType::Bool),
            flag_spec("E", ParamType::Bool),
            flag_spec("r", ParamType::Bool),
            flag_spec("P", ParamType::Bool),
        ],
        |scope, args| {
            let (flags, positional) = split_args(args);
            if positional.is_empty() {
                return Err(EvalError::arity("grep", "1+", positional.len()));
            }
            let pattern = super::string_arg(&positional[0], "grep")?;
            let invert = super::find_flag(&flags, "v").is_some();
            let ignore_case = super::find_flag(&flags, "i").is_some();
            let print_filename = super::find_flag(&flags, "H").is_some();
            let print_line_number = super::find_flag(&flags, "n").is_some();
            let recurse = super::find_flag(&flags, "r").is_some();
            let is_perl = super::find_flag(&flags, "P").is_some();
            let regex = compile_pattern(&pattern, ignore_case, is_perl)?;

            let stdin = Arc::clone(&scope.env.streams().stdin);
            let stdout = Arc::clone(&scope.env.streams().stdout);

            let mut sources: Vec<(String, Vec<u8>)> = Vec::new();
            if positional.len() == 1 {
                let mut buf = Vec::new();
                stdin.lock().unwrap().read_to_end(&mut buf)?;
                sources.push((String::new(), buf));
            } else {
                for arg in &positional[1..] {
                    let path = super::string_arg(arg, "grep")?;
                    collect_sources(Path::new(&path), recurse, &mut sources)?;
                }
            }

            Ok(Box::new(move || {
                let mut out = stdout.lock().unwrap();
                let mut matched = Vec::new();
                for (filename, bytes) in &sources {
                    let text = String::from_utf8_lossy(bytes);
                    for (i, line) in text.lines().enumerate() {
                        let is_match = regex.is_match(line);
                        if is_match != invert {
                            if print_filename && !filename.is_empty() {
                                let _ = write!(out, "{}:", filename);
                            }
                            if print_line_number {
                                let _ = write!(out, "{}:", i + 1);
                            }
                            let _ = writeln!(out, "{}", line);
                            matched.push(Value::String(line.to_string()));
                        }
                    }
                }
                Value::Array(matched)
            }))
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Streams;
    use crate::pipes::Scope;
    use std::io::Cursor;
    use std::sync::Mutex;

    fn scope_with_stdin(input: &str) -> Scope {
        let streams = Streams {
            stdin: Arc::new(Mutex::new(
                Box::new(Cursor::new(input.as_bytes().to_vec())) as Box<dyn Read + Send>
            )),
            stdout: Arc::new(Mutex::new(Box::new(Vec::new()) as Box<dyn Write + Send>)),
            stderr: Arc::new(Mutex::new(Box::new(Vec::new()) as Box<dyn Write + Send>)),
        };
        Scope::new(Environment::with_streams(streams))
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

    fn scope_capturing_stdout() -> (Scope, Arc<Mutex<Vec<u8>>>) {
        let sink = Arc::new(Mutex::new(Vec::new()));
        let streams = Streams {
            stdin: Arc::new(Mutex::new(Box::new(std::io::empty()) as Box<dyn Read + Send>)),
            stdout: Arc::new(Mutex::new(Box::new(VecSink(sink.clone())) as Box<dyn Write + Send>)),
            stderr: Arc::new(Mutex::new(Box::new(Vec::new()) as Box<dyn Write + Send>)),
        };
        (Scope::new(Environment::with_streams(streams)), sink)
    }

    #[test]
    fn grep_returns_only_matching_lines() {
        let scope = scope_with_stdin("apple\nbanana\napricot\n");
        let Value::Builtin(b) = grep() else { panic!() };
        let result = (b.prepare)(&scope, &[Value::String("ap".into())]).unwrap()();
        match result {
            Value::Array(items) => assert_eq!(items.len(), 2),
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn grep_with_v_flag_inverts_the_match() {
        let scope = scope_with_stdin("apple\nbanana\napricot\n");
        let Value::Builtin(b) = grep() else { panic!() };
        let flag = Value::Flag(Rc::new(crate::value::Flag {
            name: "v".to_string(),
            param_type: ParamType::Bool,
            value: Box::new(Value::Boolean(true)),
        }));
        let result = (b.prepare)(&scope, &[flag, Value::String("ap".into())]).unwrap()();
        match result {
            Value::Array(items) => assert_eq!(items.len(), 1),
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
    fn grep_matches_a_real_regex_pattern_not_just_a_substring() {
        let scope = scope_with_stdin("cat1\ncat22\ndog\n");
        let Value::Builtin(b) = grep() else { panic!() };
        let result = (b.prepare)(&scope, &[Value::String("cat[0-9]$".into())]).unwrap()();
        match result {
            Value::Array(items) => assert_eq!(items.len(), 1),
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn grep_rejects_an_invalid_regex_pattern() {
        let scope = scope_with_stdin("x\n");
        let Value::Builtin(b) = grep() else { panic!() };
        let err = (b.prepare)(&scope, &[Value::String("(unclosed".into())]).unwrap_err();
        assert!(err.to_string().contains("invalid pattern"));
    }

    #[test]
    fn grep_h_flag_prefixes_matches_with_the_filename() {
        let dir = std::env::temp_dir().join("smoosh_grep_h_test");
        std::fs::create_dir_all(&dir).unwrap();
        let file = dir.join("hello.txt");
        std::fs::write(&file, "hello\n").unwrap();

        let (scope, sink) = scope_capturing_stdout();
        let Value::Builtin(b) = grep() else { panic!() };
        let args = [bool_flag("H"), Value::String("hello".into()), Value::String(
            file.to_string_lossy().into_owned(),
        )];
        (b.prepare)(&scope, &args).unwrap()();
        let output = String::from_utf8(sink.lock().unwrap().clone()).unwrap();
        assert_eq!(output, format!("{}:hello\n", file.to_string_lossy()));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[test]
    fn grep_n_flag_prefixes_matches_with_the_line_number() {
        let scope = scope_with_stdin("alpha\nbeta\napricot\n");
        let Value::Builtin(b) = grep() else { panic!() };
        let args = [bool_flag("n"), Value::String("ap".into())];
        let result = (b.prepare)(&scope, &args).unwrap()();
        match result {
            Value::Array(items) => assert_eq!(items.len(), 2),
            other => panic!("expected array, got {:?}", other),
        }
    }
}
