// ABOUTME: Macro system — DefineMacros excision, ExpandMacros rewrite, quote/unquote conversion

use crate::ast::{Node, Param};
use crate::env::Environment;
use crate::error::EvalError;
use crate::eval;
use crate::value::Value;
use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct MacroDef {
    pub params: Vec<Param>,
    pub body: Node,
}

#[derive(Debug, Clone, Default)]
pub struct MacroRegistry {
    macros: HashMap<String, MacroDef>,
}

impl MacroRegistry {
    pub fn new() -> Self {
        MacroRegistry { macros: HashMap::new() }
    }

    pub fn define(&mut self, name: String, params: Vec<Param>, body: Node) {
        self.macros.insert(name, MacroDef { params, body });
    }

    pub fn get(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }
}

/// Scans a statement list for `var NAME = macro(params) { body }` and
/// excises each one into `registry`, leaving the remaining statements in
/// place. Only runs at the top level of a program, matching the original
/// implementation's single define-phase pass.
pub fn define_macros(statements: Vec<Node>, registry: &mut MacroRegistry) -> Vec<Node> {
    statements
        .into_iter()
        .filter(|stmt| {
            if let Node::AssignStatement { name, value, declare: true } = stmt {
                if let Node::MacroLiteral { params, body } = value.as_ref() {
                    registry.define(name.clone(), params.clone(), (**body).clone());
                    return false;
                }
            }
            true
        })
        .collect()
}

/// Post-order rewrite: expand every macro-invoking call in `node`, recursing
/// into all sub-expressions first so a macro call nested anywhere (inside a
/// function body, an `if` branch, an array literal, …) still gets expanded.
/// Running this twice on an already-expanded tree is a no-op, since expanded
/// output never reintroduces a call whose callee names a macro.
pub fn expand_macros(node: Node, registry: &MacroRegistry, env: &Rc<Environment>) -> Result<Node, EvalError> {
    let node = expand_children(node, registry, env)?;
    if let Node::Call { function, args, .. } = &node {
        if let Node::Identifier(name) = function.as_ref() {
            if let Some(macro_def) = registry.get(name) {
                return expand_macro_call(macro_def, args, env);
            }
        }
    }
    Ok(node)
}

fn expand_macro_call(macro_def: &MacroDef, args: &[Node], env: &Rc<Environment>) -> Result<Node, EvalError> {
    let macro_env = Environment::child(env);
    for (param, arg) in macro_def.params.iter().zip(args.iter()) {
        macro_env.define(param.name.clone(), Value::Quote(Box::new(arg.clone())));
    }
    let result = eval::eval(&macro_def.body, &macro_env)?;
    match result {
        Value::Quote(payload) => Ok(*payload),
        other => Err(EvalError::custom(format!(
            "macro did not return a quoted expression, got {}",
            other.type_name()
        ))),
    }
}

fn expand_list(nodes: Vec<Node>, registry: &MacroRegistry, env: &Rc<Environment>) -> Result<Vec<Node>, EvalError> {
    nodes.into_iter().map(|n| expand_macros(n, registry, env)).collect()
}

fn expand_box(node: Box<Node>, registry: &MacroRegistry, env: &Rc<Environment>) -> Result<Box<Node>, EvalError> {
    Ok(Box::new(expand_macros(*node, registry, env)?))
}

fn expand_children(node: Node, registry: &MacroRegistry, env: &Rc<Environment>) -> Result<Node, EvalError> {
    Ok(match node {
        Node::Program(stmts) => Node::Program(expand_list(stmts, registry, env)?),
        Node::Block(stmts) => Node::Block(expand_list(stmts, registry, env)?),
        Node::ExpressionStatement(e) => Node::ExpressionStatement(expand_box(e, registry, env)?),
        Node::ReturnStatement(e) => Node::ReturnStatement(expand_box(e, registry, env)?),
        Node::AssignStatement { name, value, declare } => {
            Node::AssignStatement { name, value: expand_box(value, registry, env)?, declare }
        }
        Node::Prefix { op, right } => Node::Prefix { op, right: expand_box(right, registry, env)? },
        Node::Infix { op, left, right } => Node::Infix {
            op,
            left: expand_box(left, registry, env)?,
            right: expand_box(right, registry, env)?,
        },
        Node::If { condition, consequence, alternative } => Node::If {
            condition: expand_box(condition, registry, env)?,
            consequence: expand_box(consequence, registry, env)?,
            alternative: alternative.map(|a| expand_box(a, registry, env)).transpose()?,
        },
        Node::FunctionLiteral { params, body, name } => {
            Node::FunctionLiteral { params, body: expand_box(body, registry, env)?, name }
        }
        Node::MacroLiteral { params, body } => Node::MacroLiteral { params, body: expand_box(body, registry, env)? },
        Node::Call { function, args, in_pipe, out_pipe } => Node::Call {
            function: expand_box(function, registry, env)?,
            args: expand_list(args, registry, env)?,
            in_pipe,
            out_pipe,
        },
        Node::Pipe { destination } => Node::Pipe { destination: expand_box(destination, registry, env)? },
        Node::ArrayLiteral(items) => Node::ArrayLiteral(expand_list(items, registry, env)?),
        Node::HashLiteral(pairs) => {
            let mut out = Vec::with_capacity(pairs.len());
            for (k, v) in pairs {
                out.push((expand_macros(k, registry, env)?, expand_macros(v, registry, env)?));
            }
            Node::HashLiteral(out)
        }
        Node::Index { left, index } => {
            Node::Index { left: expand_box(left, registry, env)?, index: expand_box(index, registry, env)? }
        }
        Node::Range { index_name, value_name, array, body } => Node::Range {
            index_name,
            value_name,
            array: expand_box(array, registry, env)?,
            body: expand_box(body, registry, env)?,
        },
        Node::For { init, condition, after, body } => Node::For {
            init: init.map(|n| expand_box(n, registry, env)).transpose()?,
            condition: expand_box(condition, registry, env)?,
            after: after.map(|n| expand_box(n, registry, env)).transpose()?,
            body: expand_box(body, registry, env)?,
        },
        Node::Quote(inner) => Node::Quote(inner),
        Node::Unquote(inner) => Node::Unquote(inner),
        leaf @ (Node::Identifier(_)
        | Node::IntegerLiteral(_)
        | Node::StringLiteral(_)
        | Node::BacktickLiteral(_)
        | Node::Boolean(_)) => leaf,
    })
}

/// Walks a quoted AST fragment looking for `unquote(expr)` calls, evaluating
/// `expr` in `env` and splicing the result back in as an AST node. This is
/// what gives `quote(...)` its quasiquote behavior: called both for a
/// top-level `quote(...)` expression and for `quote(...)` appearing inside a
/// macro body, since both go through the evaluator's same special case.
pub fn eval_unquote(node: &Node, env: &Rc<Environment>) -> Result<Node, EvalError> {
    if let Node::Call { function, args, .. } = node {
        if let Node::Identifier(name) = function.as_ref() {
            if name == "unquote" && args.len() == 1 {
                let value = eval::eval(&args[0], env)?;
                return value_to_node(value);
            }
        }
    }
    walk_unquote_children(node, env)
}

fn walk_unquote_children(node: &Node, env: &Rc<Environment>) -> Result<Node, EvalError> {
    Ok(match node {
        Node::Program(stmts) => Node::Program(unquote_list(stmts, env)?),
        Node::Block(stmts) => Node::Block(unquote_list(stmts, env)?),
        Node::ExpressionStatement(e) => Node::ExpressionStatement(Box::new(eval_unquote(e, env)?)),
        Node::ReturnStatement(e) => Node::ReturnStatement(Box::new(eval_unquote(e, env)?)),
        Node::AssignStatement { name, value, declare } => Node::AssignStatement {
            name: name.clone(),
            value: Box::new(eval_unquote(value, env)?),
            declare: *declare,
        },
        Node::Prefix { op, right } => {
            Node::Prefix { op: op.clone(), right: Box::new(eval_unquote(right, env)?) }
        }
        Node::Infix { op, left, right } => Node::Infix {
            op: op.clone(),
            left: Box::new(eval_unquote(left, env)?),
            right: Box::new(eval_unquote(right, env)?),
        },
        Node::If { condition, consequence, alternative } => Node::If {
            condition: Box::new(eval_unquote(condition, env)?),
            consequence: Box::new(eval_unquote(consequence, env)?),
            alternative: match alternative {
                Some(a) => Some(Box::new(eval_unquote(a, env)?)),
                None => None,
            },
        },
        Node::Call { function, args, in_pipe, out_pipe } => Node::Call {
            function: Box::new(eval_unquote(function, env)?),
            args: unquote_list(args, env)?,
            in_pipe: in_pipe.clone(),
            out_pipe: out_pipe.clone(),
        },
        Node::Pipe { destination } => Node::Pipe { destination: Box::new(eval_unquote(destination, env)?) },
        Node::ArrayLiteral(items) => Node::ArrayLiteral(unquote_list(items, env)?),
        Node::HashLiteral(pairs) => {
            let mut out = Vec::with_capacity(pairs.len());
            for (k, v) in pairs {
                out.push((eval_unquote(k, env)?, eval_unquote(v, env)?));
            }
            Node::HashLiteral(out)
        }
        Node::Index { left, index } => {
            Node::Index { left: Box::new(eval_unquote(left, env)?), index: Box::new(eval_unquote(index, env)?) }
        }
        Node::Range { index_name, value_name, array, body } => Node::Range {
            index_name: index_name.clone(),
            value_name: value_name.clone(),
            array: Box::new(eval_unquote(array, env)?),
            body: Box::new(eval_unquote(body, env)?),
        },
        Node::For { init, condition, after, body } => Node::For {
            init: match init {
                Some(n) => Some(Box::new(eval_unquote(n, env)?)),
                None => None,
            },
            condition: Box::new(eval_unquote(condition, env)?),
            after: match after {
                Some(n) => Some(Box::new(eval_unquote(n, env)?)),
                None => None,
            },
            body: Box::new(eval_unquote(body, env)?),
        },
        other => other.clone(),
    })
}

fn unquote_list(nodes: &[Node], env: &Rc<Environment>) -> Result<Vec<Node>, EvalError> {
    nodes.iter().map(|n| eval_unquote(n, env)).collect()
}

fn value_to_node(value: Value) -> Result<Node, EvalError> {
    match value {
        Value::Integer(n) => Ok(Node::IntegerLiteral(n)),
        Value::Boolean(b) => Ok(Node::Boolean(b)),
        Value::Quote(node) => Ok(*node),
        other => Err(EvalError::custom(format!(
            "unquote does not support returning a value of type {}",
            other.type_name()
        ))),
    }
}
