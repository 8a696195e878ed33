//! End-to-end tests driving the interpreter the way the REPL and file runner
//! do: parse a full program, expand any macros, evaluate it, and (for
//! pipeline-shaped programs) inspect what landed on stdout.

use smoosh::builtins::register_builtins;
use smoosh::env::{Environment, Streams};
use smoosh::eval::eval;
use smoosh::macros::{define_macros, expand_macros, MacroRegistry};
use smoosh::parser::parse;
use smoosh::value::Value;
use std::io::{self, Read, Write};
use std::sync::{Arc, Mutex};

/// A `Write` sink backed by a `Vec<u8>` that can still be read after the
/// `Streams` bundle it was installed into has been moved into an `Environment`.
#[derive(Clone)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().write(buf)
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn env_capturing_stdout() -> (std::rc::Rc<Environment>, Arc<Mutex<Vec<u8>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let streams = Streams {
        stdin: Arc::new(Mutex::new(Box::new(io::empty()) as Box<dyn Read + Send>)),
        stdout: Arc::new(Mutex::new(Box::new(SharedBuf(captured.clone())) as Box<dyn Write + Send>)),
        stderr: Arc::new(Mutex::new(Box::new(Vec::new()) as Box<dyn Write + Send>)),
    };
    let env = Environment::with_streams(streams);
    register_builtins(&env);
    (env, captured)
}

fn env_with_stdin(input: &str) -> std::rc::Rc<Environment> {
    let streams = Streams {
        stdin: Arc::new(Mutex::new(
            Box::new(io::Cursor::new(input.as_bytes().to_vec())) as Box<dyn Read + Send>
        )),
        stdout: Arc::new(Mutex::new(Box::new(Vec::new()) as Box<dyn Write + Send>)),
        stderr: Arc::new(Mutex::new(Box::new(Vec::new()) as Box<dyn Write + Send>)),
    };
    let env = Environment::with_streams(streams);
    register_builtins(&env);
    env
}

/// Parses, expands macros, and evaluates `source` in `env`, returning the
/// last statement's value — mirrors what `main.rs`'s `run_source` does.
fn run(source: &str, env: &std::rc::Rc<Environment>) -> Value {
    let node = parse(source).expect("parse should succeed");
    let statements = match node {
        smoosh::ast::Node::Program(stmts) => stmts,
        other => return eval(&other, env).unwrap(),
    };
    let mut registry = MacroRegistry::new();
    let remaining = define_macros(statements, &mut registry);
    let mut result = Value::Null;
    for stmt in remaining {
        let expanded = expand_macros(stmt, &registry, env).unwrap();
        result = eval(&expanded, env).unwrap();
    }
    result
}

#[test]
fn arithmetic_and_variable_binding_round_trip() {
    let (env, _) = env_capturing_stdout();
    let result = run("var x = 3; var y = 4; x * x + y * y;", &env);
    assert!(matches!(result, Value::Integer(25)));
}

#[test]
fn function_literal_closes_over_its_defining_scope() {
    let (env, _) = env_capturing_stdout();
    let result = run(
        "
        var make_adder = fn(n) { fn(x) { x + n } };
        var add5 = make_adder(5);
        add5(10);
        ",
        &env,
    );
    assert!(matches!(result, Value::Integer(15)));
}

#[test]
fn if_else_selects_the_matching_branch() {
    let (env, _) = env_capturing_stdout();
    let result = run(r#"if (1 < 2) { "yes" } else { "no" }"#, &env);
    assert!(matches!(result, Value::String(ref s) if s == "yes"));
}

#[test]
fn for_loop_accumulates_across_iterations() {
    let (env, _) = env_capturing_stdout();
    let result = run(
        "
        var total = 0;
        for (var i = 0; i < 5; i = i + 1) {
            total = total + i;
        }
        total;
        ",
        &env,
    );
    assert!(matches!(result, Value::Integer(10)));
}

#[test]
fn array_and_hash_literals_index_correctly() {
    let (env, _) = env_capturing_stdout();
    let result = run(r#"var arr = [1, 2, 3]; arr[1];"#, &env);
    assert!(matches!(result, Value::Integer(2)));
}

#[test]
fn reassignment_with_mismatched_type_is_an_error_value() {
    let (env, _) = env_capturing_stdout();
    let result = run(r#"var x = 1; x = "oops"; x;"#, &env);
    assert!(matches!(result, Value::Error(_)));
}

#[test]
fn quote_unquote_macro_rewrites_the_call_site() {
    let (env, _) = env_capturing_stdout();
    let result = run(
        "
        var unless = macro(condition, consequence, alternative) {
            quote(if (!(unquote(condition))) { unquote(consequence) } else { unquote(alternative) })
        };
        unless(10 > 5, 1, 2);
        ",
        &env,
    );
    assert!(matches!(result, Value::Integer(2)));
}

#[test]
fn pipeline_streams_upstream_output_into_downstream_stdin() {
    let (env, captured) = env_capturing_stdout();
    run(r#"echo("hello pipeline") | cat()"#, &env);
    let out = String::from_utf8(captured.lock().unwrap().clone()).unwrap();
    assert!(out.contains("hello pipeline"));
}

#[test]
fn grep_filters_lines_from_stdin_through_a_pipe() {
    let env = env_with_stdin("alpha\nbeta\napricot\n");
    let result = run(r#"grep("ap")"#, &env);
    match result {
        Value::Array(items) => assert_eq!(items.len(), 2),
        other => panic!("expected array, got {:?}", other),
    }
}

#[test]
fn wc_counts_lines_words_and_bytes_of_stdin() {
    let env = env_with_stdin("one two\nthree\n");
    let result = run("wc()", &env);
    match result {
        Value::Array(items) => {
            assert!(matches!(items[0], Value::Integer(2)));
            assert!(matches!(items[1], Value::Integer(3)));
        }
        other => panic!("expected array, got {:?}", other),
    }
}

#[test]
fn ls_lists_a_filename_piped_in_from_stdin() {
    let dir = std::env::temp_dir().join("smoosh_ls_pipe_test");
    std::fs::create_dir_all(&dir).unwrap();
    let file = dir.join("hello.txt");
    std::fs::write(&file, "hello\n").unwrap();

    let (env, captured) = env_capturing_stdout();
    let path = file.to_string_lossy().into_owned();
    run(&format!(r#"echo("{}") | ls()"#, path.replace('\\', "\\\\")), &env);
    let out = String::from_utf8(captured.lock().unwrap().clone()).unwrap();
    assert_eq!(out, "hello.txt\n");
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn cp_r_copies_a_directory_tree() {
    let root = std::env::temp_dir().join("smoosh_cp_r_test");
    let _ = std::fs::remove_dir_all(&root);
    let src = root.join("src");
    let dst = root.join("dst");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("a.txt"), "a").unwrap();

    let (env, _) = env_capturing_stdout();
    run(
        &format!(r#"cp(r, "{}", "{}")"#, src.to_string_lossy(), dst.to_string_lossy()),
        &env,
    );
    assert!(dst.join("a.txt").exists());
    let _ = std::fs::remove_dir_all(&root);
}

#[test]
fn rm_without_r_flag_refuses_to_delete_a_directory() {
    let dir = std::env::temp_dir().join("smoosh_rm_no_r_test");
    std::fs::create_dir_all(&dir).unwrap();

    let (env, _) = env_capturing_stdout();
    let result = run(&format!(r#"rm("{}")"#, dir.to_string_lossy()), &env);
    assert!(matches!(result, Value::Error(_)));
    assert!(dir.exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn division_by_zero_surfaces_as_an_error_value_not_a_panic() {
    let (env, _) = env_capturing_stdout();
    let result = run("1 / 0;", &env);
    assert!(matches!(result, Value::Error(_)));
}

#[test]
fn undefined_identifier_surfaces_as_an_error_value() {
    let (env, _) = env_capturing_stdout();
    let result = run("totally_undefined_name;", &env);
    assert!(matches!(result, Value::Error(_)));
}

#[test]
fn type_checker_flags_a_mismatched_infix_expression() {
    use smoosh::checker::{check, CheckEnv, CheckError};
    use smoosh::parser::Parser;

    let mut parser = Parser::new(r#"5 + "oops""#);
    let program = parser.parse_program();
    assert!(parser.errors().is_empty());
    let check_env = CheckEnv::new();
    let err = check(&program, &check_env).unwrap_err();
    assert!(matches!(err, CheckError::TypeMismatch { .. }));
}

#[test]
fn type_checker_accepts_a_well_typed_program() {
    use smoosh::checker::{check, CheckEnv};
    use smoosh::parser::Parser;

    let mut parser = Parser::new("var x = 1; var y = 2; x + y;");
    let program = parser.parse_program();
    assert!(parser.errors().is_empty());
    let check_env = CheckEnv::new();
    assert_eq!(check(&program, &check_env).unwrap(), "INTEGER");
}
