//! Archive built-ins: `gzip`, `gunzip`, `zip`, `unzip`.
//!
//! `gzip`/`gunzip` wrap `flate2`'s `GzEncoder`/`GzDecoder`, grounded on
//! `stdlib/gzip.go`/`gunzip.go`. No crate in the example pack wraps the ZIP
//! format, so `zip`/`unzip` (`stdlib/zip.go`/`unzip.go`) use a small
//! hand-rolled, uncompressed "store" container instead of real DEFLATE-based
//! ZIP: each entry is `name_len: u32 LE, name bytes, data_len: u32 LE, data
//! bytes`, one after another, with no central directory. This is a
//! deliberate simplification — call out explicitly rather than silently
//! narrowed — and is not interoperable with the real ZIP format.

use super::{def, find_flag, flag_spec, split_args, string_arg};
use crate::env::Environment;
use crate::error::EvalError;
use crate::value::{ParamType, Value};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs;
use std::io::{Read, Write};
use std::rc::Rc;
use std::sync::Arc;

pub fn register(env: &Rc<Environment>) {
    env.define("gzip".to_string(), gzip());
    env.define("gunzip".to_string(), gunzip());
    env.define("zip".to_string(), zip());
    env.define("unzip".to_string(), unzip());
}

/// `-k` keeps the source file after compressing it (the default removes it,
/// matching `gzip.go`'s `os.Remove`); `-c` writes the compressed bytes to
/// stdout instead of `<path>.gz` (and, per `gzip.go`, skips the removal since
/// no `.gz` file was ever created); `-t` tests an existing `<path>.gz` for
/// integrity without writing anything, the way `gunzip`/`unzip`'s `-t` does
/// (the original `gzip.go` declares `-t` but its switch never handles it, an
/// unimplemented stub we don't carry over).
fn gzip() -> Value {
    def(
        "gzip",
        vec![
            flag_spec("k", ParamType::Bool),
            flag_spec("c", ParamType::Bool),
            flag_spec("t", ParamType::Bool),
        ],
        |scope, args| {
            let (flags, positional) = split_args(args);
            let keep = find_flag(&flags, "k").is_some();
            let to_stdout = find_flag(&flags, "c").is_some();
            let test = find_flag(&flags, "t").is_some();
            match positional.first() {
                Some(path_val) => {
                    let path = string_arg(path_val, "gzip")?;
                    if test {
                        let compressed = fs::read(&path)?;
                        return Ok(Box::new(move || {
                            let mut decoder = GzDecoder::new(&compressed[..]);
                            let mut sink = Vec::new();
                            match decoder.read_to_end(&mut sink) {
                                Ok(_) => Value::String(format!("{}: OK", path)),
                                Err(e) => Value::Error(e.to_string()),
                            }
                        }));
                    }
                    let data = fs::read(&path)?;
                    let out_path = format!("{}.gz", path);
                    let stdout = Arc::clone(&scope.env.streams().stdout);
                    Ok(Box::new(move || {
                        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                        if let Err(e) = encoder.write_all(&data) {
                            return Value::Error(e.to_string());
                        }
                        let encoded = match encoder.finish() {
                            Ok(b) => b,
                            Err(e) => return Value::Error(e.to_string()),
                        };
                        if to_stdout {
                            let _ = stdout.lock().unwrap().write_all(&encoded);
                            return Value::String(path.clone());
                        }
                        if let Err(e) = fs::write(&out_path, &encoded) {
                            return Value::Error(e.to_string());
                        }
                        if !keep {
                            if let Err(e) = fs::remove_file(&path) {
                                return Value::Error(e.to_string());
                            }
                        }
                        Value::String(out_path.clone())
                    }))
                }
                None => {
                    if test {
                        return Err(EvalError::custom("gzip: -t requires a filename"));
                    }
                    let stdin = Arc::clone(&scope.env.streams().stdin);
                    let stdout = Arc::clone(&scope.env.streams().stdout);
                    let mut input = Vec::new();
                    stdin.lock().unwrap().read_to_end(&mut input)?;
                    Ok(Box::new(move || {
                        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
                        if let Err(e) = encoder.write_all(&input) {
                            return Value::Error(e.to_string());
                        }
                        match encoder.finish() {
                            Ok(bytes) => {
                                let _ = stdout.lock().unwrap().write_all(&bytes);
                                Value::Null
                            }
                            Err(e) => Value::Error(e.to_string()),
                        }
                    }))
                }
            }
        },
    )
}

/// Mirrors `gunzip.go`: `-k` keeps the `.gz` source (default removes it,
/// unconditionally on success, regardless of `-c`); `-c` writes the
/// decompressed bytes to stdout instead of the extension-stripped file;
/// `-t` runs `TestGzipItem` (decode without writing) instead of extracting.
fn gunzip() -> Value {
    def(
        "gunzip",
        vec![
            flag_spec("k", ParamType::Bool),
            flag_spec("c", ParamType::Bool),
            flag_spec("t", ParamType::Bool),
        ],
        |scope, args| {
            let (flags, positional) = split_args(args);
            let keep = find_flag(&flags, "k").is_some();
            let to_stdout = find_flag(&flags, "c").is_some();
            let test = find_flag(&flags, "t").is_some();
            match positional.first() {
                Some(path_val) => {
                    let path = string_arg(path_val, "gunzip")?;
                    let compressed = fs::read(&path)?;
                    if test {
                        return Ok(Box::new(move || {
                            let mut decoder = GzDecoder::new(&compressed[..]);
                            let mut sink = Vec::new();
                            match decoder.read_to_end(&mut sink) {
                                Ok(_) => Value::String(format!("{}: OK", path)),
                                Err(e) => Value::Error(e.to_string()),
                            }
                        }));
                    }
                    let out_path = path.strip_suffix(".gz").unwrap_or(&path).to_string();
                    let stdout = Arc::clone(&scope.env.streams().stdout);
                    Ok(Box::new(move || {
                        let mut decoder = GzDecoder::new(&compressed[..]);
                        let mut data = Vec::new();
                        if let Err(e) = decoder.read_to_end(&mut data) {
                            return Value::Error(e.to_string());
                        }
                        if to_stdout {
                            let _ = stdout.lock().unwrap().write_all(&data);
                        } else if let Err(e) = fs::write(&out_path, &data) {
                            return Value::Error(e.to_string());
                        }
                        if !keep {
                            if let Err(e) = fs::remove_file(&path) {
                                return Value::Error(e.to_string());
                            }
                        }
                        Value::String(if to_stdout { path.clone() } else { out_path.clone() })
                    }))
                }
                None => {
                    if test {
                        return Err(EvalError::custom("gunzip: -t requires a filename"));
                    }
                    let stdin = Arc::clone(&scope.env.streams().stdin);
                    let stdout = Arc::clone(&scope.env.streams().stdout);
                    let mut input = Vec::new();
                    stdin.lock().unwrap().read_to_end(&mut input)?;
                    Ok(Box::new(move || {
                        let mut decoder = GzDecoder::new(&input[..]);
                        let mut data = Vec::new();
                        if let Err(e) = decoder.read_to_end(&mut data) {
                            return Value::Error(e.to_string());
                        }
                        let _ = stdout.lock().unwrap().write_all(&data);
                        Value::Null
                    }))
                }
            }
        },
    )
}

fn write_entry(out: &mut Vec<u8>, name: &str, data: &[u8]) {
    out.extend((name.len() as u32).to_le_bytes());
    out.extend(name.as_bytes());
    out.extend((data.len() as u32).to_le_bytes());
    out.extend(data);
}

fn read_entries(bytes: &[u8]) -> Result<Vec<(String, Vec<u8>)>, EvalError> {
    let mut entries = Vec::new();
    let mut pos = 0usize;
    while pos < bytes.len() {
        if pos + 4 > bytes.len() {
            return Err(EvalError::custom("corrupt archive: truncated name length"));
        }
        let name_len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        if pos + name_len > bytes.len() {
            return Err(EvalError::custom("corrupt archive: truncated name"));
        }
        let name = String::from_utf8_lossy(&bytes[pos..pos + name_len]).into_owned();
        pos += name_len;
        if pos + 4 > bytes.len() {
            return Err(EvalError::custom("corrupt archive: truncated data length"));
        }
        let data_len = u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize;
        pos += 4;
        if pos + data_len > bytes.len() {
            return Err(EvalError::custom("corrupt archive: truncated data"));
        }
        entries.push((name, bytes[pos..pos + data_len].to_vec()));
        pos += data_len;
    }
    Ok(entries)
}

/// `-t` lists an existing archive's entry names without writing (grounded on
/// `zip.go`'s only declared flag). `-k`/`-c` generalize the keep/stdout
/// convention `gzip`/`gunzip` use for consistency across the archive
/// builtins: `-k` keeps the source files (default removes them once
/// archived), `-c` streams the archive bytes to stdout instead of writing
/// `archive_path` (and, like `gzip -c`, skips source removal).
fn zip() -> Value {
    def(
        "zip",
        vec![
            flag_spec("k", ParamType::Bool),
            flag_spec("c", ParamType::Bool),
            flag_spec("t", ParamType::Bool),
        ],
        |scope, args| {
            let (flags, positional) = split_args(args);
            let keep = find_flag(&flags, "k").is_some();
            let to_stdout = find_flag(&flags, "c").is_some();
            let test = find_flag(&flags, "t").is_some();
            if positional.is_empty() {
                return Err(EvalError::arity("zip", if test { "1+" } else { "2+" }, 0));
            }
            let archive_path = string_arg(&positional[0], "zip")?;
            if test {
                let bytes = fs::read(&archive_path)?;
                let entries = read_entries(&bytes)?;
                return Ok(Box::new(move || {
                    Value::Array(entries.into_iter().map(|(name, _)| Value::String(name)).collect())
                }));
            }
            if positional.len() < 2 {
                return Err(EvalError::arity("zip", "2+", positional.len()));
            }
            let mut sources = Vec::new();
            for arg in &positional[1..] {
                sources.push(string_arg(arg, "zip")?);
            }
            let stdout = Arc::clone(&scope.env.streams().stdout);
            Ok(Box::new(move || {
                let mut out = Vec::new();
                for source in &sources {
                    let data = match fs::read(source) {
                        Ok(d) => d,
                        Err(e) => return Value::Error(e.to_string()),
                    };
                    let name = std::path::Path::new(source)
                        .file_name()
                        .map(|n| n.to_string_lossy().into_owned())
                        .unwrap_or_else(|| source.clone());
                    write_entry(&mut out, &name, &data);
                }
                if to_stdout {
                    let _ = stdout.lock().unwrap().write_all(&out);
                } else if let Err(e) = fs::write(&archive_path, &out) {
                    return Value::Error(e.to_string());
                }
                if !keep && !to_stdout {
                    for source in &sources {
                        if let Err(e) = fs::remove_file(source) {
                            return Value::Error(e.to_string());
                        }
                    }
                }
                Value::String(archive_path.clone())
            }))
        },
    )
}

/// `-t` lists entry names without extracting (grounded on `unzip.go`'s
/// `testItems`). `-c` streams extracted contents to stdout instead of
/// writing them under `dest_dir`. `-k` keeps the archive file after a
/// successful extraction (default removes it), generalizing the
/// keep/remove convention from `gzip`/`gunzip` since the original `unzip.go`
/// never deletes its source.
fn unzip() -> Value {
    def(
        "unzip",
        vec![
            flag_spec("k", ParamType::Bool),
            flag_spec("c", ParamType::Bool),
            flag_spec("t", ParamType::Bool),
        ],
        |scope, args| {
            let (flags, positional) = split_args(args);
            let keep = find_flag(&flags, "k").is_some();
            let to_stdout = find_flag(&flags, "c").is_some();
            let test = find_flag(&flags, "t").is_some();
            if positional.is_empty() {
                return Err(EvalError::arity("unzip", "1-2", 0));
            }
            let archive_path = string_arg(&positional[0], "unzip")?;
            let dest_dir = match positional.get(1) {
                Some(v) => string_arg(v, "unzip")?,
                None => ".".to_string(),
            };
            let bytes = fs::read(&archive_path)?;
            let entries = read_entries(&bytes)?;
            if test {
                return Ok(Box::new(move || {
                    Value::Array(entries.into_iter().map(|(name, _)| Value::String(name)).collect())
                }));
            }
            let stdout = Arc::clone(&scope.env.streams().stdout);
            Ok(Box::new(move || {
                let mut names = Vec::new();
                for (name, data) in &entries {
                    if to_stdout {
                        let _ = stdout.lock().unwrap().write_all(data);
                    } else {
                        let path = std::path::Path::new(&dest_dir).join(name);
                        if let Err(e) = fs::write(&path, data) {
                            return Value::Error(e.to_string());
                        }
                    }
                    names.push(Value::String(name.clone()));
                }
                if !keep {
                    if let Err(e) = fs::remove_file(&archive_path) {
                        return Value::Error(e.to_string());
                    }
                }
                Value::Array(names)
            }))
        },
    )
}
