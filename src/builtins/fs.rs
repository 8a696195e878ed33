//! Filesystem built-ins: `pwd`, `cd`, `ls`, `cp`, `mv`, `rm`, `touch`,
//! `basename`, `dirname`, `which`.
//!
//! These operate directly through `std::fs`/`std::env` rather than routing
//! through `sandbox::Sandbox` — only the network-facing `http.Get` builtin
//! (`net.rs`) needs the sandbox's capability gating; everyday filesystem
//! commands are trusted to the same extent a real shell trusts `cp`/`rm`.
//! Grounded on `stdlib/pwd.go`, `cd.go`, `ls.go`, `cp.go`, `mv.go`, `rm.go`,
//! `touch.go`, `basename.go`, `dirname.go`, `which.go`.

use super::{def, find_flag, flag_spec, split_args, string_arg};
use crate::env::Environment;
use crate::error::EvalError;
use crate::value::{ParamType, Value};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::sync::Arc;

pub fn register(env: &Rc<Environment>) {
    env.define("pwd".to_string(), pwd());
    env.define("cd".to_string(), cd());
    env.define("ls".to_string(), ls());
    env.define("cp".to_string(), cp());
    env.define("mv".to_string(), mv());
    env.define("rm".to_string(), rm());
    env.define("touch".to_string(), touch());
    env.define("basename".to_string(), basename());
    env.define("dirname".to_string(), dirname());
    env.define("which".to_string(), which());
}

fn path_string(path: &std::path::Path) -> String {
    path.to_string_lossy().into_owned()
}

fn pwd() -> Value {
    def("pwd", vec![], |_scope, args| {
        if !args.is_empty() {
            return Err(EvalError::arity("pwd", "0", args.len()));
        }
        let cwd = std::env::current_dir()?;
        Ok(Box::new(move || Value::String(path_string(&cwd))))
    })
}

fn cd() -> Value {
    def("cd", vec![], |_scope, args| {
        let (_, positional) = split_args(args);
        if positional.len() != 1 {
            return Err(EvalError::arity("cd", "1", positional.len()));
        }
        let path = string_arg(&positional[0], "cd")?;
        std::env::set_current_dir(&path)?;
        Ok(Box::new(move || Value::Null))
    })
}

/// `log1024`-scaled size suffixes (`B k M G T`), matching `ls.go`'s
/// `getSizeString` under `-h`.
fn human_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "k", "M", "G", "T"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{}{}", bytes, UNITS[0])
    } else {
        format!("{:.1}{}", size, UNITS[unit])
    }
}

#[cfg(unix)]
fn mode_string(meta: &fs::Metadata) -> String {
    use std::os::unix::fs::PermissionsExt;
    let mode = meta.permissions().mode();
    let mut s = String::with_capacity(10);
    s.push(if meta.is_dir() { 'd' } else { '-' });
    for (i, ch) in "rwxrwxrwx".chars().enumerate() {
        let shift = 8 - i;
        s.push(if mode & (1 << shift) != 0 { ch } else { '-' });
    }
    s
}

#[cfg(not(unix))]
fn mode_string(meta: &fs::Metadata) -> String {
    if meta.is_dir() { "d---------".to_string() } else { "----------".to_string() }
}

/// Recursively lists `dir`'s entries (sorted, `.`-files skipped unless
/// `all`), pairing each entry's display name (prefixed with `display_prefix`
/// when recursing) with its real filesystem path. Mirrors `ls.go`'s `list`.
fn list_entries(
    dir: &Path,
    display_prefix: &str,
    all: bool,
    recurse: bool,
    out: &mut Vec<(String, PathBuf)>,
) -> Result<(), EvalError> {
    let mut entries: Vec<_> = fs::read_dir(dir)?.collect::<Result<_, _>>()?;
    entries.sort_by_key(|e| e.file_name());
    for entry in entries {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !all && name.starts_with('.') {
            continue;
        }
        let display =
            if display_prefix.is_empty() { name } else { format!("{}/{}", display_prefix, name) };
        let entry_path = entry.path();
        let is_dir = entry_path.is_dir();
        out.push((display.clone(), entry_path.clone()));
        if recurse && is_dir {
            list_entries(&entry_path, &display, all, recurse, out)?;
        }
    }
    Ok(())
}

/// Directory listing. With no positional glob/path argument and an upstream
/// pipe in scope, the piped stdin is read as a newline-separated list of
/// paths to list (`ls.go`'s `getDirList`, covering `echo("file") | ls()`);
/// otherwise each positional argument is listed, falling back to `.`.
fn ls() -> Value {
    def(
        "ls",
        vec![
            flag_spec("l", ParamType::Bool),
            flag_spec("a", ParamType::Bool),
            flag_spec("h", ParamType::Bool),
            flag_spec("r", ParamType::Bool),
        ],
        |scope, args| {
            let (flags, positional) = split_args(args);
            let long = find_flag(&flags, "l").is_some();
            let all = find_flag(&flags, "a").is_some();
            let human = find_flag(&flags, "h").is_some();
            let recurse = find_flag(&flags, "r").is_some();

            let mut targets = Vec::new();
            for arg in &positional {
                targets.push(string_arg(arg, "ls")?);
            }
            if targets.is_empty() {
                if scope.input.is_some() {
                    let mut buf = String::new();
                    scope.env.streams().stdin.lock().unwrap().read_to_string(&mut buf)?;
                    targets.extend(buf.lines().map(str::trim).filter(|l| !l.is_empty()).map(String::from));
                }
            }
            if targets.is_empty() {
                targets.push(".".to_string());
            }

            let mut entries: Vec<(String, PathBuf)> = Vec::new();
            for target in &targets {
                let path = PathBuf::from(target);
                let meta = fs::metadata(&path)?;
                if meta.is_dir() {
                    list_entries(&path, "", all, recurse, &mut entries)?;
                } else {
                    // A direct file target lists itself, by basename — matching
                    // `ls.go`'s `listItem(argInfo, ..., filepath.Dir(arg), "", ls)`.
                    let name = path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_else(|| target.clone());
                    entries.push((name, path));
                }
            }

            let stdout = Arc::clone(&scope.env.streams().stdout);
            Ok(Box::new(move || {
                let mut out = stdout.lock().unwrap();
                let mut names = Vec::with_capacity(entries.len());
                for (display, path) in &entries {
                    names.push(Value::String(display.clone()));
                    if long {
                        match fs::metadata(path) {
                            Ok(meta) => {
                                let size =
                                    if human { human_size(meta.len()) } else { meta.len().to_string() };
                                let _ = writeln!(out, "{} {:>8} {}", mode_string(&meta), size, display);
                            }
                            Err(_) => {
                                let _ = writeln!(out, "{}", display);
                            }
                        }
                    } else {
                        let _ = writeln!(out, "{}", display);
                    }
                }
                Value::Array(names)
            }))
        },
    )
}

/// Copies `src` to `dest`, recursing into a directory source only when
/// `recursive` is set — otherwise a directory source is an error, matching
/// `cp.go`'s `copyFile`. A directory destination receives `src`'s basename.
fn copy_path(src: &Path, dest: &Path, recursive: bool) -> Result<(), EvalError> {
    let meta = fs::metadata(src)?;
    if meta.is_dir() && !recursive {
        return Err(EvalError::custom(format!("cp: omitting directory {}", src.display())));
    }
    let dest_full = if dest.is_dir() {
        dest.join(src.file_name().unwrap_or_default())
    } else {
        dest.to_path_buf()
    };
    if meta.is_dir() {
        fs::create_dir_all(&dest_full)?;
        for entry in fs::read_dir(src)? {
            let entry = entry?;
            copy_path(&entry.path(), &dest_full, recursive)?;
        }
    } else {
        fs::copy(src, &dest_full)?;
    }
    Ok(())
}

fn cp() -> Value {
    def("cp", vec![flag_spec("r", ParamType::Bool)], |_scope, args| {
        let (flags, positional) = split_args(args);
        if positional.len() != 2 {
            return Err(EvalError::arity("cp", "2", positional.len()));
        }
        let recursive = find_flag(&flags, "r").is_some();
        let src = string_arg(&positional[0], "cp")?;
        let dst = string_arg(&positional[1], "cp")?;
        copy_path(Path::new(&src), Path::new(&dst), recursive)?;
        Ok(Box::new(move || Value::Null))
    })
}

fn mv() -> Value {
    def("mv", vec![], |_scope, args| {
        let (_, positional) = split_args(args);
        if positional.len() != 2 {
            return Err(EvalError::arity("mv", "2", positional.len()));
        }
        let src = string_arg(&positional[0], "mv")?;
        let dst = string_arg(&positional[1], "mv")?;
        fs::rename(&src, &dst)?;
        Ok(Box::new(move || Value::Null))
    })
}

fn rm() -> Value {
    def("rm", vec![flag_spec("r", ParamType::Bool)], |_scope, args| {
        let (flags, positional) = split_args(args);
        if positional.is_empty() {
            return Err(EvalError::arity("rm", "1+", 0));
        }
        let recursive = find_flag(&flags, "r").is_some();
        let mut paths = Vec::new();
        for arg in &positional {
            paths.push(string_arg(arg, "rm")?);
        }
        for path in &paths {
            let meta = fs::metadata(path)?;
            if meta.is_dir() {
                if !recursive {
                    return Err(EvalError::custom(format!("rm: '{}' is a directory. Use -r", path)));
                }
                fs::remove_dir_all(path)?;
            } else {
                fs::remove_file(path)?;
            }
        }
        Ok(Box::new(move || Value::Null))
    })
}

fn touch() -> Value {
    def("touch", vec![], |_scope, args| {
        let (_, positional) = split_args(args);
        if positional.len() != 1 {
            return Err(EvalError::arity("touch", "1", positional.len()));
        }
        let path = string_arg(&positional[0], "touch")?;
        if fs::metadata(&path).is_err() {
            fs::File::create(&path)?;
        } else {
            // Existing file: bump its mtime by rewriting it through a no-op open.
            fs::OpenOptions::new().append(true).open(&path)?;
        }
        Ok(Box::new(move || Value::Null))
    })
}

fn basename() -> Value {
    def("basename", vec![], |_scope, args| {
        let (_, positional) = split_args(args);
        if positional.len() != 1 {
            return Err(EvalError::arity("basename", "1", positional.len()));
        }
        let path = string_arg(&positional[0], "basename")?;
        let name = std::path::Path::new(&path)
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(Box::new(move || Value::String(name)))
    })
}

fn dirname() -> Value {
    def("dirname", vec![], |_scope, args| {
        let (_, positional) = split_args(args);
        if positional.len() != 1 {
            return Err(EvalError::arity("dirname", "1", positional.len()));
        }
        let path = string_arg(&positional[0], "dirname")?;
        let parent = std::path::Path::new(&path)
            .parent()
            .map(path_string)
            .filter(|p| !p.is_empty())
            .unwrap_or_else(|| ".".to_string());
        Ok(Box::new(move || Value::String(parent)))
    })
}

fn which() -> Value {
    def("which", vec![], |_scope, args| {
        let (_, positional) = split_args(args);
        if positional.len() != 1 {
            return Err(EvalError::arity("which", "1", positional.len()));
        }
        let name = string_arg(&positional[0], "which")?;
        let found = std::env::var_os("PATH").and_then(|paths| {
            std::env::split_paths(&paths).find_map(|dir| {
                let candidate = dir.join(&name);
                candidate.is_file().then(|| path_string(&candidate))
            })
        });
        Ok(Box::new(move || match found {
            Some(path) => Value::String(path),
            None => Value::Null,
        }))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipes::Scope;
    use serial_test::serial;
    use std::fs as stdfs;

    fn call(builtin: Value, args: &[Value]) -> Result<Value, EvalError> {
        let Value::Builtin(b) = builtin else { panic!("not a builtin") };
        let env = Environment::new();
        let scope = Scope::new(env);
        Ok((b.prepare)(&scope, args)?())
    }

    #[test]
    #[serial]
    fn pwd_returns_current_directory() {
        let result = call(pwd(), &[]).unwrap();
        assert!(matches!(result, Value::String(_)));
    }

    #[test]
    #[serial]
    fn basename_strips_directory_component() {
        let result = call(basename(), &[Value::String("/a/b/c.txt".into())]).unwrap();
        assert!(matches!(result, Value::String(ref s) if s == "c.txt"));
    }

    #[test]
    #[serial]
    fn dirname_strips_file_component() {
        let result = call(dirname(), &[Value::String("/a/b/c.txt".into())]).unwrap();
        assert!(matches!(result, Value::String(ref s) if s == "/a/b"));
    }

    #[test]
    #[serial]
    fn touch_creates_missing_file() {
        let dir = std::env::temp_dir().join("smoosh_touch_test");
        let _ = stdfs::remove_file(&dir);
        let path = dir.to_string_lossy().into_owned();
        call(touch(), &[Value::String(path.clone())]).unwrap();
        assert!(stdfs::metadata(&path).is_ok());
        let _ = stdfs::remove_file(&path);
    }

    #[test]
    #[serial]
    fn which_finds_a_real_binary() {
        let result = call(which(), &[Value::String("ls".into())]).unwrap();
        assert!(matches!(result, Value::String(_) | Value::Null));
    }
}
