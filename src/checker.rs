// ABOUTME: Shallow static type-checker — infers Value type tags without evaluating a program

use crate::ast::Node;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;
use thiserror::Error;

/// Mirrors `Value::type_name()`'s tag strings, plus `"UNKNOWN"` for anything
/// whose type can't be determined without running the program — a function
/// call's return type, an indexed element, a quoted node's eventual shape.
/// This is a shallow pass: it mirrors `eval_node`'s dispatch shape closely
/// enough to catch obvious mismatches (adding a STRING to an INTEGER, calling
/// a non-function) but never runs user code or resolves a builtin's actual
/// return type.
pub const UNKNOWN: &str = "UNKNOWN";

#[derive(Error, Debug, PartialEq, Eq)]
pub enum CheckError {
    #[error("identifier not found: {name}")]
    UndefinedIdentifier { name: String },

    #[error("type mismatch: {left} {op} {right}")]
    TypeMismatch { left: String, op: String, right: String },

    #[error("not callable: {got}")]
    NotCallable { got: String },
}

/// A lexically-scoped type environment, separate from the runtime
/// `Environment`: it only ever holds type tags, never values.
pub struct CheckEnv {
    bindings: RefCell<HashMap<String, String>>,
    parent: Option<Rc<CheckEnv>>,
}

impl CheckEnv {
    pub fn new() -> Rc<Self> {
        Rc::new(CheckEnv { bindings: RefCell::new(HashMap::new()), parent: None })
    }

    pub fn child(parent: &Rc<CheckEnv>) -> Rc<Self> {
        Rc::new(CheckEnv { bindings: RefCell::new(HashMap::new()), parent: Some(Rc::clone(parent)) })
    }

    fn define(&self, name: &str, tag: &str) {
        self.bindings.borrow_mut().insert(name.to_string(), tag.to_string());
    }

    fn get(&self, name: &str) -> Option<String> {
        if let Some(tag) = self.bindings.borrow().get(name) {
            return Some(tag.clone());
        }
        self.parent.as_ref().and_then(|p| p.get(name))
    }
}

/// Infers `node`'s type tag in `env` without evaluating it.
pub fn check(node: &Node, env: &Rc<CheckEnv>) -> Result<String, CheckError> {
    match node {
        Node::Program(stmts) | Node::Block(stmts) => check_statements(stmts, env),
        Node::ExpressionStatement(expr) => check(expr, env),

        Node::ReturnStatement(expr) => check(expr, env),

        Node::AssignStatement { name, value, .. } => {
            let tag = check(value, env)?;
            env.define(name, &tag);
            Ok("NULL".to_string())
        }

        Node::Identifier(name) => {
            env.get(name).ok_or_else(|| CheckError::UndefinedIdentifier { name: name.clone() })
        }
        Node::IntegerLiteral(_) => Ok("INTEGER".to_string()),
        Node::StringLiteral(_) => Ok("STRING".to_string()),
        Node::BacktickLiteral(_) => Ok("BACKTICK".to_string()),
        Node::Boolean(_) => Ok("BOOLEAN".to_string()),

        Node::Prefix { op, right } => {
            let right_tag = check(right, env)?;
            match op.as_str() {
                "!" => Ok("BOOLEAN".to_string()),
                "-" if right_tag == "INTEGER" => Ok("INTEGER".to_string()),
                "-" => Err(CheckError::TypeMismatch {
                    left: op.clone(),
                    op: String::new(),
                    right: right_tag,
                }),
                _ => Ok(UNKNOWN.to_string()),
            }
        }

        Node::Infix { op, left, right } => {
            let left_tag = check(left, env)?;
            let right_tag = check(right, env)?;
            check_infix(op, &left_tag, &right_tag)
        }

        Node::If { condition, consequence, alternative } => {
            check(condition, env)?;
            let then_tag = check(consequence, env)?;
            match alternative {
                Some(alt) => {
                    let else_tag = check(alt, env)?;
                    if then_tag == else_tag {
                        Ok(then_tag)
                    } else {
                        Ok(UNKNOWN.to_string())
                    }
                }
                None => Ok("NULL".to_string()),
            }
        }

        Node::FunctionLiteral { .. } => Ok("FUNCTION".to_string()),
        Node::MacroLiteral { .. } => Ok("MACRO".to_string()),

        Node::Call { function, .. } => {
            let function_tag = check(function, env).unwrap_or_else(|_| UNKNOWN.to_string());
            if function_tag == "FUNCTION" || function_tag == "BUILTIN" || function_tag == UNKNOWN {
                Ok(UNKNOWN.to_string())
            } else {
                Err(CheckError::NotCallable { got: function_tag })
            }
        }
        Node::Pipe { destination } => check(destination, env),

        Node::ArrayLiteral(items) => {
            for item in items {
                check(item, env)?;
            }
            Ok("ARRAY".to_string())
        }
        Node::HashLiteral(pairs) => {
            for (key, value) in pairs {
                check(key, env)?;
                check(value, env)?;
            }
            Ok("HASH".to_string())
        }
        Node::Index { left, index } => {
            check(left, env)?;
            check(index, env)?;
            Ok(UNKNOWN.to_string())
        }

        Node::Range { value_name, array, body, .. } => {
            check(array, env)?;
            let loop_env = CheckEnv::child(env);
            loop_env.define(value_name, UNKNOWN);
            check(body, &loop_env)?;
            Ok("NULL".to_string())
        }
        Node::For { init, condition, after, body } => {
            let loop_env = CheckEnv::child(env);
            if let Some(init) = init {
                check(init, &loop_env)?;
            }
            check(condition, &loop_env)?;
            if let Some(after) = after {
                check(after, &loop_env)?;
            }
            check(body, &loop_env)?;
            Ok("NULL".to_string())
        }

        Node::Quote(_) => Ok("QUOTE".to_string()),
        Node::Unquote(inner) => check(inner, env),
    }
}

fn check_statements(stmts: &[Node], env: &Rc<CheckEnv>) -> Result<String, CheckError> {
    let mut last = "NULL".to_string();
    for stmt in stmts {
        last = check(stmt, env)?;
    }
    Ok(last)
}

fn check_infix(op: &str, left: &str, right: &str) -> Result<String, CheckError> {
    match (left, right) {
        ("INTEGER", "INTEGER") => match op {
            "+" | "-" | "*" | "/" => Ok("INTEGER".to_string()),
            "<" | ">" | "==" | "!=" => Ok("BOOLEAN".to_string()),
            _ => Ok(UNKNOWN.to_string()),
        },
        ("STRING", "STRING") => match op {
            "+" => Ok("STRING".to_string()),
            "==" | "!=" => Ok("BOOLEAN".to_string()),
            _ => Ok(UNKNOWN.to_string()),
        },
        (l, r) if op == "==" || op == "!=" => {
            let _ = (l, r);
            Ok("BOOLEAN".to_string())
        }
        (l, r) if l == UNKNOWN || r == UNKNOWN => Ok(UNKNOWN.to_string()),
        (l, r) if l != r => {
            Err(CheckError::TypeMismatch { left: l.to_string(), op: op.to_string(), right: r.to_string() })
        }
        _ => Ok(UNKNOWN.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn check_source(src: &str) -> Result<String, CheckError> {
        let mut parser = Parser::new(src);
        let program = parser.parse_program();
        assert!(parser.errors().is_empty(), "parse errors: {:?}", parser.errors());
        let env = CheckEnv::new();
        check(&program, &env)
    }

    #[test]
    fn integer_literal_checks_as_integer() {
        assert_eq!(check_source("5").unwrap(), "INTEGER");
    }

    #[test]
    fn string_concatenation_checks_as_string() {
        assert_eq!(check_source(r#""a" + "b""#).unwrap(), "STRING");
    }

    #[test]
    fn integer_plus_string_is_a_type_mismatch() {
        let err = check_source(r#"5 + "a""#).unwrap_err();
        assert!(matches!(err, CheckError::TypeMismatch { .. }));
    }

    #[test]
    fn undefined_identifier_is_reported() {
        let err = check_source("missing").unwrap_err();
        assert!(matches!(err, CheckError::UndefinedIdentifier { .. }));
    }

    #[test]
    fn var_binding_flows_into_later_use() {
        assert_eq!(check_source("var x = 5; x + 1").unwrap(), "INTEGER");
    }

    #[test]
    fn if_with_matching_branch_types_checks_as_that_type() {
        assert_eq!(check_source("if (true) { 1 } else { 2 }").unwrap(), "INTEGER");
    }

    #[test]
    fn comparison_checks_as_boolean() {
        assert_eq!(check_source("1 < 2").unwrap(), "BOOLEAN");
    }
}
