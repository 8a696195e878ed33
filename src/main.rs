mod ast;
mod builtins;
mod checker;
mod config;
mod env;
mod error;
mod eval;
mod help;
mod highlighter;
mod interpolate;
mod lexer;
mod macros;
mod parser;
mod pipes;
mod sandbox;
mod token;
mod value;

use ast::Node;
use builtins::{register_builtins, set_sandbox};
use clap::Parser as ClapParser;
use config::{FsConfig, NetConfig, WELCOME_FOOTER, WELCOME_MESSAGE, WELCOME_SUBTITLE};
use env::Environment;
use highlighter::SmooshHelper;
use macros::{define_macros, expand_macros, MacroRegistry};
use rustyline::error::ReadlineError;
use rustyline::{Config, Editor};
use sandbox::Sandbox;
use std::path::PathBuf;
use std::rc::Rc;
use value::Value;

/// An expression-oriented shell language with concurrent pipelines
#[derive(ClapParser, Debug)]
#[command(name = "smoosh")]
#[command(version = config::VERSION)]
#[command(about = "Smoosh: an interpreted shell language with a macro system")]
#[command(long_about = "An interpreter with capability-based I/O sandboxing")]
struct CliArgs {
    /// Script file to execute (optional - if not provided, starts REPL)
    #[arg(value_name = "FILE")]
    script: Option<PathBuf>,

    /// Evaluate SOURCE directly instead of reading a file or starting the REPL
    #[arg(long = "eval", value_name = "SOURCE")]
    eval: Option<String>,

    /// Type-check FILE without evaluating it
    #[arg(long = "parse", value_name = "FILE")]
    parse_only: Option<PathBuf>,

    /// Format FILE rather than running it, printing the canonical rendering
    #[arg(long = "fmt", value_name = "FILE")]
    fmt_only: Option<PathBuf>,

    /// Add allowed filesystem path (can be repeated)
    #[arg(long = "fs-sandbox", value_name = "PATH", action = clap::ArgAction::Append)]
    fs_paths: Vec<PathBuf>,

    /// Maximum file size in bytes
    #[arg(long = "max-file-size", value_name = "BYTES", default_value = "10485760")]
    max_file_size: usize,

    /// Enable network I/O
    #[arg(long = "allow-network")]
    allow_network: bool,

    /// Add allowed network address (can be repeated)
    #[arg(long = "net-allow", value_name = "ADDR", action = clap::ArgAction::Append)]
    net_addresses: Vec<String>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let fs_config = build_fs_config(&args);
    let net_config = build_net_config(&args);
    let sandbox = Sandbox::new(fs_config, net_config)?;
    set_sandbox(sandbox);

    let env = Environment::new();
    register_builtins(&env);
    help::populate_builtin_help();
    let mut macro_reg = MacroRegistry::new();

    if let Some(path) = &args.fmt_only {
        return format_file(path);
    }

    if let Some(path) = &args.parse_only {
        return type_check_file(path);
    }

    if let Some(source) = &args.eval {
        return run_source(source, &env, &mut macro_reg).map(|_| ()).map_err(Into::into);
    }

    if let Some(script_path) = &args.script {
        return run_script(script_path, &env, &mut macro_reg).map_err(Into::into);
    }

    run_repl(&env, &mut macro_reg)
}

/// Build filesystem configuration from CLI arguments
fn build_fs_config(args: &CliArgs) -> FsConfig {
    let allowed_paths = if args.fs_paths.is_empty() {
        vec![PathBuf::from(".")]
    } else {
        args.fs_paths.clone()
    };

    FsConfig { allowed_paths, max_file_size: args.max_file_size }
}

/// Build network configuration from CLI arguments
fn build_net_config(args: &CliArgs) -> NetConfig {
    NetConfig { enabled: args.allow_network, allowed_addresses: args.net_addresses.clone() }
}

/// Parses `source`, pulls out `macro` definitions, expands any macro calls
/// in the remaining statements against `macro_reg`, then evaluates them in
/// order, returning the last statement's value.
fn run_source(
    source: &str,
    env: &Rc<Environment>,
    macro_reg: &mut MacroRegistry,
) -> Result<Value, String> {
    let node = parser::parse(source)?;
    let Node::Program(statements) = node else {
        return eval::eval(&node, env).map_err(|e| e.to_string());
    };

    let remaining = define_macros(statements, macro_reg);
    let mut result = Value::Null;
    for stmt in remaining {
        let expanded = expand_macros(stmt, macro_reg, env).map_err(|e| e.to_string())?;
        result = eval::eval(&expanded, env).map_err(|e| e.to_string())?;
        if let Value::Error(msg) = &result {
            return Err(msg.clone());
        }
    }
    Ok(result)
}

/// Execute a script file and exit.
fn run_script(
    path: &PathBuf,
    env: &Rc<Environment>,
    macro_reg: &mut MacroRegistry,
) -> Result<(), Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read script file {}: {}", path.display(), e))?;
    run_source(&contents, env, macro_reg)?;
    Ok(())
}

/// Formats a file's canonical rendering to stdout instead of running it.
fn format_file(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read file {}: {}", path.display(), e))?;
    let node = parser::parse(&contents)?;
    print!("{}", node);
    Ok(())
}

/// Type-check a file without evaluating it, printing the inferred top-level
/// type tag on success.
fn type_check_file(path: &PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let contents = std::fs::read_to_string(path)
        .map_err(|e| format!("cannot read file {}: {}", path.display(), e))?;
    let node = parser::parse(&contents)?;
    let check_env = checker::CheckEnv::new();
    match checker::check(&node, &check_env) {
        Ok(tag) => {
            println!("{}", tag);
            Ok(())
        }
        Err(e) => Err(format!("type error: {}", e).into()),
    }
}

/// Interactive REPL loop with history and syntax highlighting.
fn run_repl(
    env: &Rc<Environment>,
    macro_reg: &mut MacroRegistry,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::builder().auto_add_history(true).build();
    let mut rl =
        Editor::with_config(config).map_err(|e| format!("failed to initialize REPL: {}", e))?;
    rl.set_helper(Some(SmooshHelper::new()));

    let history_file = ".smoosh_history";
    let _ = rl.load_history(history_file);

    println!("{}", WELCOME_MESSAGE);
    println!("{}", WELCOME_SUBTITLE);
    println!("{}", WELCOME_FOOTER);

    loop {
        let readline = rl.readline("smoosh> ");

        match readline {
            Ok(line) => {
                if line.trim().is_empty() {
                    continue;
                }

                match line.trim() {
                    "exit()" | "quit()" => {
                        println!("Goodbye!");
                        break;
                    }
                    "clear()" => {
                        print!("\x1B[2J\x1B[H");
                        continue;
                    }
                    _ => {}
                }

                match run_source(&line, env, macro_reg) {
                    Ok(result) => println!("=> {}", result),
                    Err(e) => eprintln!("Error: {}", e),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("^C");
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                eprintln!("Error: {}", err);
                break;
            }
        }
    }

    let _ = rl.save_history(history_file);
    Ok(())
}
