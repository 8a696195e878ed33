//! Redirection built-ins: `r` (read a file as a pipeline source) and `w`
//! (write a pipeline's stdout to a file), grounded on `stdlib/rw.go`.
//!
//! `r("path")` produces the file's bytes as if they'd come from stdin — the
//! usual way to start a pipeline from a file instead of a literal/command:
//! `r("input.txt") | grep("error")`. `w("path")` is the tail of a pipeline:
//! it drains its own stdin to the named file instead of forwarding to the
//! ambient stdout.

use super::{def, split_args, string_arg};
use crate::env::Environment;
use crate::value::Value;
use std::fs;
use std::io::{Read, Write};
use std::rc::Rc;
use std::sync::Arc;

pub fn register(env: &Rc<Environment>) {
    env.define("r".to_string(), r());
    env.define("w".to_string(), w());
}

fn r() -> Value {
    def("r", vec![], |scope, args| {
        let (_, positional) = split_args(args);
        if positional.len() != 1 {
            return Err(crate::error::EvalError::arity("r", "1", positional.len()));
        }
        let path = string_arg(&positional[0], "r")?;
        let bytes = fs::read(&path)?;
        let stdout = Arc::clone(&scope.env.streams().stdout);
        Ok(Box::new(move || {
            let _ = stdout.lock().unwrap().write_all(&bytes);
            Value::Null
        }))
    })
}

fn w() -> Value {
    def("w", vec![], |scope, args| {
        let (_, positional) = split_args(args);
        if positional.len() != 1 {
            return Err(crate::error::EvalError::arity("w", "1", positional.len()));
        }
        let path = string_arg(&positional[0], "w")?;
        let stdin = Arc::clone(&scope.env.streams().stdin);
        let mut bytes = Vec::new();
        stdin.lock().unwrap().read_to_end(&mut bytes)?;
        Ok(Box::new(move || match fs::write(&path, &bytes) {
            Ok(()) => Value::Null,
            Err(e) => Value::Error(e.to_string()),
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::Streams;
    use crate::pipes::Scope;
    use std::io::Cursor;
    use std::sync::Mutex;

    #[test]
    fn r_emits_file_contents_to_stdout() {
        let dir = std::env::temp_dir().join("smoosh_rw_test_r.txt");
        fs::write(&dir, "contents").unwrap();
        let sink: Arc<Mutex<Vec<u8>>> = Arc::new(Mutex::new(Vec::new()));
        let sink_clone = sink.clone();
        let streams = Streams {
            stdin: Arc::new(Mutex::new(Box::new(Cursor::new(Vec::new())) as Box<dyn Read + Send>)),
            stdout: Arc::new(Mutex::new(Box::new(SinkWriter(sink_clone)) as Box<dyn Write + Send>)),
            stderr: Arc::new(Mutex::new(Box::new(Vec::new()) as Box<dyn Write + Send>)),
        };
        let env = Environment::with_streams(streams);
        let scope = Scope::new(env);
        let Value::Builtin(b) = r() else { panic!() };
        let path = dir.to_string_lossy().into_owned();
        (b.prepare)(&scope, &[Value::String(path)]).unwrap()();
        assert_eq!(sink.lock().unwrap().as_slice(), b"contents");
        let _ = fs::remove_file(&dir);
    }

    struct SinkWriter(Arc<Mutex<Vec<u8>>>);
    impl Write for SinkWriter {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn w_writes_stdin_to_the_named_file() {
        let dir = std::env::temp_dir().join("smoosh_rw_test_w.txt");
        let _ = fs::remove_file(&dir);
        let streams = Streams {
            stdin: Arc::new(Mutex::new(
                Box::new(Cursor::new(b"piped bytes".to_vec())) as Box<dyn Read + Send>
            )),
            stdout: Arc::new(Mutex::new(Box::new(Vec::new()) as Box<dyn Write + Send>)),
            stderr: Arc::new(Mutex::new(Box::new(Vec::new()) as Box<dyn Write + Send>)),
        };
        let env = Environment::with_streams(streams);
        let scope = Scope::new(env);
        let Value::Builtin(b) = w() else { panic!() };
        let path = dir.to_string_lossy().into_owned();
        (b.prepare)(&scope, &[Value::String(path.clone())]).unwrap()();
        assert_eq!(fs::read_to_string(&path).unwrap(), "piped bytes");
        let _ = fs::remove_file(&dir);
    }
}
