// ABOUTME: Hand-written recursive-descent / Pratt parser turning tokens into an AST

use crate::ast::{Node, Param};
use crate::lexer::Lexer;
use crate::token::Token;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Precedence {
    Lowest,
    Equals,
    LessGreater,
    Sum,
    Product,
    Prefix,
    Call,
}

fn precedence_of(tok: &Token) -> Precedence {
    match tok {
        Token::Eq | Token::NotEq => Precedence::Equals,
        Token::Lt | Token::Gt | Token::Le | Token::Ge => Precedence::LessGreater,
        Token::Plus | Token::Minus => Precedence::Sum,
        Token::Asterisk | Token::Slash | Token::Percent => Precedence::Product,
        Token::Lparen | Token::Lbracket => Precedence::Call,
        _ => Precedence::Lowest,
    }
}

/// Parses a complete program, returning the joined parser errors as a single
/// string on failure (used by the REPL and file runner, which only need a
/// pass/fail report rather than per-error spans).
pub fn parse(input: &str) -> Result<Node, String> {
    let mut parser = Parser::new(input);
    let program = parser.parse_program();
    if parser.errors().is_empty() {
        Ok(program)
    } else {
        Err(parser.errors().join("; "))
    }
}

#[derive(Clone)]
pub struct Parser {
    lexer: Lexer,
    cur: Token,
    cur_line: usize,
    peek: Token,
    peek_line: usize,
    errors: Vec<String>,
}

impl Parser {
    pub fn new(input: &str) -> Self {
        let mut lexer = Lexer::new(input);
        let (cur, cur_line) = lexer.next_token();
        let (peek, peek_line) = lexer.next_token();
        Parser { lexer, cur, cur_line, peek, peek_line, errors: Vec::new() }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    fn advance(&mut self) {
        std::mem::swap(&mut self.cur, &mut self.peek);
        self.cur_line = self.peek_line;
        let (tok, line) = self.lexer.next_token();
        self.peek = tok;
        self.peek_line = line;
    }

    fn skip_statement_separators(&mut self) {
        while self.cur == Token::Semicolon {
            self.advance();
        }
    }

    fn expect_peek(&mut self, expected: &Token) -> bool {
        if std::mem::discriminant(&self.peek) == std::mem::discriminant(expected) {
            self.advance();
            true
        } else {
            self.errors.push(format!(
                "line {}: expected next token to be {}, got {} instead",
                self.peek_line, expected, self.peek
            ));
            false
        }
    }

    pub fn parse_program(&mut self) -> Node {
        let mut statements = Vec::new();
        self.skip_statement_separators();
        while self.cur != Token::Eof {
            self.parse_statement_into(&mut statements);
            self.advance();
            self.skip_statement_separators();
        }
        Node::Program(statements)
    }

    fn parse_block_statement(&mut self) -> Node {
        let mut statements = Vec::new();
        self.advance(); // consume `{`
        self.skip_statement_separators();
        while self.cur != Token::Rbrace && self.cur != Token::Eof {
            self.parse_statement_into(&mut statements);
            self.advance();
            self.skip_statement_separators();
        }
        Node::Block(statements)
    }

    /// Parses one logical statement, appending it (and any pipe-destination
    /// siblings from a `a | b | c` chain) to `out` as separate statements —
    /// the shape the pipe-wiring pre-pass expects.
    fn parse_statement_into(&mut self, out: &mut Vec<Node>) {
        let stmt = match &self.cur {
            Token::Var => self.parse_var_statement(),
            Token::Return => self.parse_return_statement(),
            Token::For => self.parse_for_statement(),
            Token::Ident(_) if matches!(self.peek, Token::Assign) => self.parse_reassign_statement(),
            _ => Node::ExpressionStatement(Box::new(self.parse_expression(Precedence::Lowest))),
        };
        out.push(stmt);

        while self.peek == Token::Pipe {
            self.advance(); // move onto `|`
            self.advance(); // move onto the next call's first token
            let destination = self.parse_expression(Precedence::Lowest);
            out.push(Node::Pipe { destination: Box::new(destination) });
        }
    }

    fn parse_var_statement(&mut self) -> Node {
        if !self.expect_peek(&Token::Ident(String::new())) {
            return Node::StringLiteral(String::new());
        }
        let name = match &self.cur {
            Token::Ident(s) => s.clone(),
            _ => unreachable!(),
        };
        if !self.expect_peek(&Token::Assign) {
            return Node::StringLiteral(String::new());
        }
        self.advance();
        let value = self.parse_expression(Precedence::Lowest);
        Node::AssignStatement { name, value: Box::new(value), declare: true }
    }

    fn parse_reassign_statement(&mut self) -> Node {
        let name = match &self.cur {
            Token::Ident(s) => s.clone(),
            _ => unreachable!(),
        };
        self.advance(); // consume ident, now on `=`
        self.advance(); // move onto the value
        let value = self.parse_expression(Precedence::Lowest);
        Node::AssignStatement { name, value: Box::new(value), declare: false }
    }

    fn parse_return_statement(&mut self) -> Node {
        self.advance();
        if self.cur == Token::Semicolon {
            return Node::ReturnStatement(Box::new(Node::Boolean(false)));
        }
        let value = self.parse_expression(Precedence::Lowest);
        Node::ReturnStatement(Box::new(value))
    }

    /// Disambiguates `for i, v := range arr { body }` from
    /// `for init; cond; after { body }` by checking whether a comma follows
    /// the first identifier after `for`.
    fn parse_for_statement(&mut self) -> Node {
        if matches!(self.peek, Token::Ident(_)) {
            let mut lookahead = self.clone();
            lookahead.advance(); // consume `for`, cur = first ident
            if lookahead.peek == Token::Comma {
                return self.parse_range_for();
            }
        }
        self.parse_c_style_for()
    }

    fn parse_range_for(&mut self) -> Node {
        self.advance(); // `for` -> index ident
        let index_name = match &self.cur {
            Token::Ident(s) => s.clone(),
            _ => String::new(),
        };
        if !self.expect_peek(&Token::Comma) {
            return Node::Boolean(false);
        }
        if !self.expect_peek(&Token::Ident(String::new())) {
            return Node::Boolean(false);
        }
        let value_name = match &self.cur {
            Token::Ident(s) => s.clone(),
            _ => String::new(),
        };
        if !self.expect_peek(&Token::ColonAssign) {
            return Node::Boolean(false);
        }
        if !self.expect_peek(&Token::Range) {
            return Node::Boolean(false);
        }
        self.advance();
        let array = self.parse_expression(Precedence::Lowest);
        if !self.expect_peek(&Token::Lbrace) {
            return Node::Boolean(false);
        }
        let body = self.parse_block_statement();
        Node::Range {
            index_name,
            value_name,
            array: Box::new(array),
            body: Box::new(body),
        }
    }

    fn parse_c_style_for(&mut self) -> Node {
        self.advance(); // `for` -> first token of init (or `;`)
        let init = if self.cur == Token::Semicolon {
            None
        } else {
            let mut stmts = Vec::new();
            self.parse_statement_into(&mut stmts);
            Some(Box::new(stmts.into_iter().next().unwrap_or(Node::Boolean(false))))
        };
        if self.cur != Token::Semicolon && !self.expect_peek(&Token::Semicolon) {
            return Node::Boolean(false);
        }
        self.advance();
        let condition = self.parse_expression(Precedence::Lowest);
        if !self.expect_peek(&Token::Semicolon) {
            return Node::Boolean(false);
        }
        self.advance();
        let after = if self.cur == Token::Lbrace {
            None
        } else {
            let mut stmts = Vec::new();
            self.parse_statement_into(&mut stmts);
            Some(Box::new(stmts.into_iter().next().unwrap_or(Node::Boolean(false))))
        };
        if self.cur != Token::Lbrace && !self.expect_peek(&Token::Lbrace) {
            return Node::Boolean(false);
        }
        let body = self.parse_block_statement();
        Node::For { init, condition: Box::new(condition), after, body: Box::new(body) }
    }

    fn parse_expression(&mut self, precedence: Precedence) -> Node {
        let mut left = match self.parse_prefix() {
            Some(node) => node,
            None => {
                self.errors.push(format!(
                    "line {}: no prefix parse function for {}",
                    self.cur_line, self.cur
                ));
                Node::Boolean(false)
            }
        };

        while self.peek != Token::Semicolon && precedence < precedence_of(&self.peek) {
            left = match &self.peek {
                Token::Lparen => {
                    self.advance();
                    self.parse_call_expression(left)
                }
                Token::Lbracket => {
                    self.advance();
                    self.parse_index_expression(left)
                }
                Token::Plus
                | Token::Minus
                | Token::Asterisk
                | Token::Slash
                | Token::Percent
                | Token::Eq
                | Token::NotEq
                | Token::Lt
                | Token::Gt
                | Token::Le
                | Token::Ge => {
                    self.advance();
                    self.parse_infix_expression(left)
                }
                _ => return left,
            };
        }
        left
    }

    fn parse_prefix(&mut self) -> Option<Node> {
        match self.cur.clone() {
            Token::Ident(name) => Some(Node::Identifier(name)),
            Token::Int(n) => Some(Node::IntegerLiteral(n)),
            Token::Str(s) => Some(Node::StringLiteral(s)),
            Token::Backtick(s) => Some(Node::BacktickLiteral(s)),
            Token::True => Some(Node::Boolean(true)),
            Token::False => Some(Node::Boolean(false)),
            Token::Bang | Token::Minus => {
                let op = self.cur.to_string();
                self.advance();
                let right = self.parse_expression(Precedence::Prefix);
                Some(Node::Prefix { op, right: Box::new(right) })
            }
            Token::Lparen => {
                self.advance();
                let expr = self.parse_expression(Precedence::Lowest);
                if !self.expect_peek(&Token::Rparen) {
                    return Some(Node::Boolean(false));
                }
                Some(expr)
            }
            Token::Lbracket => Some(self.parse_array_literal()),
            Token::Lbrace => Some(self.parse_hash_literal()),
            Token::If => Some(self.parse_if_expression()),
            Token::Function => Some(self.parse_function_literal()),
            Token::Macro => Some(self.parse_macro_literal()),
            _ => None,
        }
    }

    fn parse_infix_expression(&mut self, left: Node) -> Node {
        let op = self.cur.to_string();
        let precedence = precedence_of(&self.cur);
        self.advance();
        let right = self.parse_expression(precedence);
        Node::Infix { op, left: Box::new(left), right: Box::new(right) }
    }

    fn parse_if_expression(&mut self) -> Node {
        self.advance();
        let condition = self.parse_expression(Precedence::Lowest);
        if !self.expect_peek(&Token::Lbrace) {
            return Node::Boolean(false);
        }
        let consequence = self.parse_block_statement();
        let alternative = if self.peek == Token::Else {
            self.advance();
            if !self.expect_peek(&Token::Lbrace) {
                return Node::Boolean(false);
            }
            Some(Box::new(self.parse_block_statement()))
        } else {
            None
        };
        Node::If {
            condition: Box::new(condition),
            consequence: Box::new(consequence),
            alternative,
        }
    }

    fn parse_function_literal(&mut self) -> Node {
        if !self.expect_peek(&Token::Lparen) {
            return Node::Boolean(false);
        }
        let params = self.parse_params();
        if !self.expect_peek(&Token::Lbrace) {
            return Node::Boolean(false);
        }
        let body = self.parse_block_statement();
        Node::FunctionLiteral { params, body: Box::new(body), name: None }
    }

    fn parse_macro_literal(&mut self) -> Node {
        if !self.expect_peek(&Token::Lparen) {
            return Node::Boolean(false);
        }
        let params = self.parse_params();
        if !self.expect_peek(&Token::Lbrace) {
            return Node::Boolean(false);
        }
        let body = self.parse_block_statement();
        Node::MacroLiteral { params, body: Box::new(body) }
    }

    fn parse_params(&mut self) -> Vec<Param> {
        let mut params = Vec::new();
        if self.peek == Token::Rparen {
            self.advance();
            return params;
        }
        self.advance();
        params.push(self.parse_one_param());
        while self.peek == Token::Comma {
            self.advance();
            self.advance();
            params.push(self.parse_one_param());
        }
        self.expect_peek(&Token::Rparen);
        params
    }

    fn parse_one_param(&mut self) -> Param {
        let name = match &self.cur {
            Token::Ident(s) => s.clone(),
            other => other.to_string(),
        };
        let default = if self.peek == Token::Assign {
            self.advance();
            self.advance();
            Some(Box::new(self.parse_expression(Precedence::Lowest)))
        } else {
            None
        };
        Param { name, default }
    }

    fn parse_call_expression(&mut self, function: Node) -> Node {
        let args = self.parse_expression_list(Token::Rparen);
        Node::new_call(function, args)
    }

    fn parse_index_expression(&mut self, left: Node) -> Node {
        self.advance();
        let index = self.parse_expression(Precedence::Lowest);
        if !self.expect_peek(&Token::Rbracket) {
            return Node::Boolean(false);
        }
        Node::Index { left: Box::new(left), index: Box::new(index) }
    }

    fn parse_array_literal(&mut self) -> Node {
        let items = self.parse_expression_list(Token::Rbracket);
        Node::ArrayLiteral(items)
    }

    fn parse_hash_literal(&mut self) -> Node {
        let mut pairs = Vec::new();
        while self.peek != Token::Rbrace {
            self.advance();
            let key = self.parse_expression(Precedence::Lowest);
            if !self.expect_peek(&Token::Colon) {
                break;
            }
            self.advance();
            let value = self.parse_expression(Precedence::Lowest);
            pairs.push((key, value));
            if self.peek != Token::Rbrace && !self.expect_peek(&Token::Comma) {
                break;
            }
        }
        if !self.expect_peek(&Token::Rbrace) {
            return Node::Boolean(false);
        }
        Node::HashLiteral(pairs)
    }

    fn parse_expression_list(&mut self, end: Token) -> Vec<Node> {
        let mut list = Vec::new();
        if self.peek == end {
            self.advance();
            return list;
        }
        self.advance();
        list.push(self.parse_expression(Precedence::Lowest));
        while self.peek == Token::Comma {
            self.advance();
            self.advance();
            list.push(self.parse_expression(Precedence::Lowest));
        }
        self.expect_peek(&end);
        list
    }
}
