// ABOUTME: Configuration and constants for the Smoosh interpreter
// This module contains version info, welcome messages, and I/O sandbox configuration

use std::path::PathBuf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const WELCOME_MESSAGE: &str = "Smoosh";
pub const WELCOME_SUBTITLE: &str = "An expression-oriented shell language with concurrent pipelines";
pub const WELCOME_FOOTER: &str = "Type an expression to evaluate it. Ctrl-D or exit() to quit.";

// ============================================================================
// I/O Sandboxing Configuration
// ============================================================================

/// Filesystem sandbox configuration
#[derive(Debug, Clone)]
pub struct FsConfig {
    pub allowed_paths: Vec<PathBuf>,
    pub max_file_size: usize,
}

impl Default for FsConfig {
    fn default() -> Self {
        Self {
            // Default allowed paths for file I/O
            allowed_paths: vec![PathBuf::from(".")],
            // Default max file size: 10MB
            max_file_size: 10 * 1024 * 1024,
        }
    }
}

/// Network sandbox configuration
#[derive(Debug, Clone, Default)]
pub struct NetConfig {
    /// Whether network I/O is enabled
    pub enabled: bool,
    /// Allowed network addresses (host:port format)
    /// Empty = no restrictions (if enabled=true)
    pub allowed_addresses: Vec<String>,
}

/// Combined I/O sandbox configuration
#[allow(dead_code)]
#[derive(Debug, Clone, Default)]
pub struct IoConfig {
    pub filesystem: FsConfig,
    pub network: NetConfig,
}

pub const HELP_TEXT: &str = r#"
Available REPL commands:
  exit()               - Exit the REPL
  help()               - Show builtin reference
  clear()              - Clear the screen

Type any Smoosh expression to evaluate it. Use Ctrl-D or exit() to quit.
"#;

pub const BUILTINS_SUMMARY: &str = r#"
Built-in Functions:

Data:           len first last rest push
Shell:          pwd cd exit
I/O:            echo cat head tail wc grep tee
Filesystem:     ls cp mv rm touch basename dirname which
Archives:       gzip gunzip zip unzip
Process:        sleep
Network:        http.Get
Redirection:    r w
Help:           help

Type help("name") for details on a specific builtin.
"#;
