// ABOUTME: AST node types produced by the parser and walked by the evaluator

use crate::pipes::Pipes;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

#[derive(Debug, Clone)]
pub struct Param {
    pub name: String,
    pub default: Option<Box<Node>>,
}

#[derive(Debug, Clone)]
pub enum Node {
    Program(Vec<Node>),
    Block(Vec<Node>),

    ExpressionStatement(Box<Node>),
    ReturnStatement(Box<Node>),
    /// `declare: true` is `var NAME = EXPR` (fresh binding in this scope);
    /// `declare: false` is plain reassignment `NAME = EXPR` (walks up to the
    /// nearest existing binding, enforcing the same-tag rule).
    AssignStatement { name: String, value: Box<Node>, declare: bool },

    Identifier(String),
    IntegerLiteral(i64),
    StringLiteral(String),
    BacktickLiteral(String),
    Boolean(bool),

    Prefix {
        op: String,
        right: Box<Node>,
    },
    Infix {
        op: String,
        left: Box<Node>,
        right: Box<Node>,
    },
    If {
        condition: Box<Node>,
        consequence: Box<Node>,
        alternative: Option<Box<Node>>,
    },
    FunctionLiteral {
        params: Vec<Param>,
        body: Box<Node>,
        name: Option<String>,
    },
    MacroLiteral {
        params: Vec<Param>,
        body: Box<Node>,
    },

    /// A call expression. `In`/`Out` are pipe slots filled in by the
    /// pipe-wiring pre-pass and shared with adjacent statements in the same
    /// list, hence the `Rc<RefCell<..>>` rather than a plain field.
    Call {
        function: Box<Node>,
        args: Vec<Node>,
        in_pipe: Rc<RefCell<Option<Pipes>>>,
        out_pipe: Rc<RefCell<Option<Pipes>>>,
    },
    Pipe {
        destination: Box<Node>,
    },

    ArrayLiteral(Vec<Node>),
    HashLiteral(Vec<(Node, Node)>),
    Index {
        left: Box<Node>,
        index: Box<Node>,
    },

    Range {
        index_name: String,
        value_name: String,
        array: Box<Node>,
        body: Box<Node>,
    },
    For {
        init: Option<Box<Node>>,
        condition: Box<Node>,
        after: Option<Box<Node>>,
        body: Box<Node>,
    },

    /// `quote(expr)` — produced directly by the parser/evaluator's special
    /// casing of the `quote` callee (spec.md §4.2 step 1) and by macro
    /// expansion when splicing `unquote` results back into the tree.
    Quote(Box<Node>),
    Unquote(Box<Node>),
}

impl Node {
    pub fn new_call(function: Node, args: Vec<Node>) -> Node {
        Node::Call {
            function: Box::new(function),
            args,
            in_pipe: Rc::new(RefCell::new(None)),
            out_pipe: Rc::new(RefCell::new(None)),
        }
    }
}

/// Reconstructs Smoosh source text from a parsed tree — backs the CLI's
/// `-fmt` mode. Not a pretty-printer in the line-width-aware sense: it emits
/// one canonical, re-parseable rendering rather than preserving the input's
/// original layout or comments.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Program(stmts) => {
                for stmt in stmts {
                    writeln!(f, "{};", stmt)?;
                }
                Ok(())
            }
            Node::Block(stmts) => {
                writeln!(f, "{{")?;
                for stmt in stmts {
                    writeln!(f, "    {};", stmt)?;
                }
                write!(f, "}}")
            }
            Node::ExpressionStatement(expr) => write!(f, "{}", expr),
            Node::ReturnStatement(expr) => write!(f, "return {}", expr),
            Node::AssignStatement { name, value, declare } => {
                if *declare {
                    write!(f, "var {} = {}", name, value)
                } else {
                    write!(f, "{} = {}", name, value)
                }
            }
            Node::Identifier(name) => write!(f, "{}", name),
            Node::IntegerLiteral(n) => write!(f, "{}", n),
            Node::StringLiteral(s) => write!(f, "{:?}", s),
            Node::BacktickLiteral(s) => write!(f, "`{}`", s),
            Node::Boolean(b) => write!(f, "{}", b),
            Node::Prefix { op, right } => write!(f, "({}{})", op, right),
            Node::Infix { op, left, right } => write!(f, "({} {} {})", left, op, right),
            Node::If { condition, consequence, alternative } => {
                write!(f, "if ({}) {}", condition, consequence)?;
                if let Some(alt) = alternative {
                    write!(f, " else {}", alt)?;
                }
                Ok(())
            }
            Node::FunctionLiteral { params, body, name } => {
                write!(f, "fn")?;
                if let Some(name) = name {
                    write!(f, " {}", name)?;
                }
                write!(f, "({}) {}", format_params(params), body)
            }
            Node::MacroLiteral { params, body } => write!(f, "macro({}) {}", format_params(params), body),
            Node::Call { function, args, .. } => {
                let rendered: Vec<String> = args.iter().map(|a| a.to_string()).collect();
                write!(f, "{}({})", function, rendered.join(", "))
            }
            Node::Pipe { destination } => write!(f, "| {}", destination),
            Node::ArrayLiteral(items) => {
                let rendered: Vec<String> = items.iter().map(|i| i.to_string()).collect();
                write!(f, "[{}]", rendered.join(", "))
            }
            Node::HashLiteral(pairs) => {
                let rendered: Vec<String> =
                    pairs.iter().map(|(k, v)| format!("{}: {}", k, v)).collect();
                write!(f, "{{{}}}", rendered.join(", "))
            }
            Node::Index { left, index } => write!(f, "{}[{}]", left, index),
            Node::Range { index_name, value_name, array, body } => {
                write!(f, "range ({}, {}) in {} {}", index_name, value_name, array, body)
            }
            Node::For { init, condition, after, body } => {
                write!(f, "for (")?;
                if let Some(init) = init {
                    write!(f, "{}", init)?;
                }
                write!(f, "; {}; ", condition)?;
                if let Some(after) = after {
                    write!(f, "{}", after)?;
                }
                write!(f, ") {}", body)
            }
            Node::Quote(inner) => write!(f, "quote({})", inner),
            Node::Unquote(inner) => write!(f, "unquote({})", inner),
        }
    }
}

fn format_params(params: &[Param]) -> String {
    params
        .iter()
        .map(|p| match &p.default {
            Some(default) => format!("{} = {}", p.name, default),
            None => p.name.clone(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn call_starts_with_no_pipes_wired() {
        let call = Node::new_call(Node::Identifier("echo".into()), vec![]);
        if let Node::Call { in_pipe, out_pipe, .. } = call {
            assert!(in_pipe.borrow().is_none());
            assert!(out_pipe.borrow().is_none());
        } else {
            panic!("expected Call node");
        }
    }

    #[test]
    fn display_renders_a_call_with_its_arguments() {
        let call = Node::new_call(
            Node::Identifier("echo".into()),
            vec![Node::StringLiteral("hi".into())],
        );
        assert_eq!(call.to_string(), r#"echo("hi")"#);
    }

    #[test]
    fn display_renders_an_infix_expression_parenthesized() {
        let node = Node::Infix {
            op: "+".into(),
            left: Box::new(Node::IntegerLiteral(1)),
            right: Box::new(Node::IntegerLiteral(2)),
        };
        assert_eq!(node.to_string(), "(1 + 2)");
    }
}
