// ABOUTME: Syntax highlighter for REPL with color support
// Implements rustyline's Highlighter trait to provide ANSI color codes
// for Smoosh syntax elements while preserving display width

use rustyline::completion::Completer;
use rustyline::highlight::{CmdKind, Highlighter};
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::Helper;
use std::borrow::Cow;
use std::collections::HashSet;

const COLOR_RESET: &str = "\x1b[0m";
const COLOR_PAREN: &str = "\x1b[1;34m"; // Bold blue
const COLOR_KEYWORD: &str = "\x1b[1;35m"; // Bold magenta
const COLOR_BUILTIN: &str = "\x1b[36m"; // Cyan
const COLOR_NUMBER: &str = "\x1b[33m"; // Yellow
const COLOR_STRING: &str = "\x1b[32m"; // Green
const COLOR_BOOLEAN: &str = "\x1b[33m"; // Yellow
const COLOR_COMMENT: &str = "\x1b[90m"; // Bright black (gray)
const COLOR_BACKTICK: &str = "\x1b[1;33m"; // Bold yellow

/// REPL helper providing syntax-aware color highlighting for Smoosh source.
pub struct SmooshHelper;

impl SmooshHelper {
    pub fn new() -> Self {
        SmooshHelper
    }
}

impl Default for SmooshHelper {
    fn default() -> Self {
        Self::new()
    }
}

impl Helper for SmooshHelper {}

impl Completer for SmooshHelper {
    type Candidate = String;
}

impl Hinter for SmooshHelper {
    type Hint = String;
}

impl Validator for SmooshHelper {}

impl Highlighter for SmooshHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        let keywords = get_keywords();
        let builtins = get_builtins();
        let highlighted = highlight_line(line, &keywords, &builtins);
        if highlighted == line {
            Cow::Borrowed(line)
        } else {
            Cow::Owned(highlighted)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _kind: CmdKind) -> bool {
        true
    }
}

fn is_symbol_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '.' || c == '$'
}

/// Tokenize a line and apply syntax highlighting. Mirrors the lexer's own
/// rules for comments (`#` to end of line), strings, backticks, and
/// identifiers closely enough for display purposes without needing a real
/// `Lexer` pass.
fn highlight_line(line: &str, keywords: &HashSet<&'static str>, builtins: &HashSet<&'static str>) -> String {
    let mut result = String::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0;

    while i < chars.len() {
        match chars[i] {
            '#' => {
                result.push_str(COLOR_COMMENT);
                while i < chars.len() && chars[i] != '\n' {
                    result.push(chars[i]);
                    i += 1;
                }
                result.push_str(COLOR_RESET);
            }

            '"' => {
                result.push_str(COLOR_STRING);
                result.push('"');
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        result.push(chars[i]);
                        result.push(chars[i + 1]);
                        i += 2;
                    } else {
                        result.push(chars[i]);
                        i += 1;
                    }
                }
                if i < chars.len() {
                    result.push('"');
                    i += 1;
                }
                result.push_str(COLOR_RESET);
            }

            '`' => {
                result.push_str(COLOR_BACKTICK);
                result.push('`');
                i += 1;
                while i < chars.len() && chars[i] != '`' {
                    result.push(chars[i]);
                    i += 1;
                }
                if i < chars.len() {
                    result.push('`');
                    i += 1;
                }
                result.push_str(COLOR_RESET);
            }

            '0'..='9' => {
                let start = i;
                while i < chars.len() && chars[i].is_ascii_digit() {
                    i += 1;
                }
                let num: String = chars[start..i].iter().collect();
                result.push_str(COLOR_NUMBER);
                result.push_str(&num);
                result.push_str(COLOR_RESET);
            }

            '(' | ')' | '{' | '}' | '[' | ']' => {
                result.push_str(COLOR_PAREN);
                result.push(chars[i]);
                result.push_str(COLOR_RESET);
                i += 1;
            }

            c if c.is_whitespace() => {
                result.push(c);
                i += 1;
            }

            c if is_symbol_char(c) => {
                let start = i;
                while i < chars.len() && is_symbol_char(chars[i]) {
                    i += 1;
                }
                let symbol: String = chars[start..i].iter().collect();
                if symbol == "true" || symbol == "false" {
                    result.push_str(COLOR_BOOLEAN);
                    result.push_str(&symbol);
                    result.push_str(COLOR_RESET);
                } else if keywords.contains(symbol.as_str()) {
                    result.push_str(COLOR_KEYWORD);
                    result.push_str(&symbol);
                    result.push_str(COLOR_RESET);
                } else if builtins.contains(symbol.as_str()) {
                    result.push_str(COLOR_BUILTIN);
                    result.push_str(&symbol);
                    result.push_str(COLOR_RESET);
                } else {
                    result.push_str(&symbol);
                }
            }

            other => {
                result.push(other);
                i += 1;
            }
        }
    }

    result
}

fn get_keywords() -> HashSet<&'static str> {
    ["var", "fn", "macro", "if", "else", "return", "for", "range"].iter().copied().collect()
}

fn get_builtins() -> HashSet<&'static str> {
    [
        "len", "first", "last", "rest", "push", "pwd", "cd", "exit", "echo", "cat", "head", "tail",
        "wc", "grep", "ls", "cp", "mv", "rm", "touch", "tee", "gzip", "gunzip", "zip", "unzip",
        "basename", "dirname", "which", "sleep", "$", "r", "w", "help", "http.Get",
    ]
    .iter()
    .copied()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn number_literal_is_colorized() {
        let highlighted = highlight_line("42", &get_keywords(), &get_builtins());
        assert!(highlighted.contains(COLOR_NUMBER));
    }

    #[test]
    fn string_literal_is_colorized() {
        let highlighted = highlight_line(r#""hello""#, &get_keywords(), &get_builtins());
        assert!(highlighted.contains(COLOR_STRING));
    }

    #[test]
    fn comment_runs_to_end_of_line() {
        let highlighted = highlight_line("5 # a comment", &get_keywords(), &get_builtins());
        assert!(highlighted.contains(COLOR_COMMENT));
    }

    #[test]
    fn keyword_is_colorized() {
        let highlighted = highlight_line("var x = 5", &get_keywords(), &get_builtins());
        assert!(highlighted.contains(COLOR_KEYWORD));
    }

    #[test]
    fn builtin_call_is_colorized() {
        let highlighted = highlight_line(r#"echo("hi")"#, &get_keywords(), &get_builtins());
        assert!(highlighted.contains(COLOR_BUILTIN));
        assert!(highlighted.contains(COLOR_PAREN));
    }

    #[test]
    fn boolean_literal_is_colorized() {
        let highlighted = highlight_line("true false", &get_keywords(), &get_builtins());
        assert!(highlighted.contains(COLOR_BOOLEAN));
    }

    #[test]
    fn backtick_literal_is_colorized() {
        let highlighted = highlight_line("`ls -l`", &get_keywords(), &get_builtins());
        assert!(highlighted.contains(COLOR_BACKTICK));
    }
}
