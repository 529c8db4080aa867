//! Recursive-descent parser for behavior scripts
//!
//! The whole submission is parsed as the body of an async function, so a
//! top-level `return` is allowed. `await` and `new` are accepted and dropped.

use super::ast::*;
use super::error::SyntaxError;
use super::lexer::{tokenize, Token, TokenKind};
use std::sync::Arc;

type PResult<T> = Result<T, SyntaxError>;

/// Deepest statement/expression nesting a script may use; keeps both the
/// parser and the evaluator well inside the worker's stack
pub const MAX_NESTING: usize = 128;

/// Parse a script into its statements
pub fn parse(source: &str) -> PResult<Vec<Stmt>> {
    let tokens = tokenize(source)?;
    let mut parser = Parser {
        tokens,
        idx: 0,
        depth: 0,
    };
    let mut body = Vec::new();
    while !parser.at_eof() {
        body.push(parser.statement()?);
    }
    Ok(body)
}

struct Parser {
    tokens: Vec<Token>,
    idx: usize,
    depth: usize,
}

impl Parser {
    // ========================================================================
    // Token helpers
    // ========================================================================

    fn peek(&self) -> &Token {
        // the token list always ends with Eof
        &self.tokens[self.idx.min(self.tokens.len() - 1)]
    }

    fn peek_at(&self, offset: usize) -> &Token {
        &self.tokens[(self.idx + offset).min(self.tokens.len() - 1)]
    }

    fn advance(&mut self) -> Token {
        let token = self.peek().clone();
        if self.idx < self.tokens.len() - 1 {
            self.idx += 1;
        }
        token
    }

    fn at_eof(&self) -> bool {
        matches!(self.peek().kind, TokenKind::Eof)
    }

    fn is_punct(&self, p: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Punct(q) if *q == p)
    }

    fn is_keyword(&self, word: &str) -> bool {
        matches!(&self.peek().kind, TokenKind::Ident(w) if w == word)
    }

    fn eat_punct(&mut self, p: &str) -> bool {
        if self.is_punct(p) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn eat_keyword(&mut self, word: &str) -> bool {
        if self.is_keyword(word) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect_punct(&mut self, p: &str) -> PResult<Token> {
        if self.is_punct(p) {
            Ok(self.advance())
        } else {
            Err(self.unexpected())
        }
    }

    fn expect_ident(&mut self) -> PResult<(String, Pos)> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Ident(name) if !is_reserved(&name) => {
                self.advance();
                Ok((name, token.pos))
            }
            _ => Err(self.unexpected()),
        }
    }

    fn unexpected(&self) -> SyntaxError {
        let token = self.peek();
        let message = match &token.kind {
            TokenKind::Eof => "Unexpected end of input".to_string(),
            TokenKind::Number(n) => format!("Unexpected number '{}'", n),
            TokenKind::Str(_) => "Unexpected string".to_string(),
            TokenKind::Ident(name) => format!("Unexpected token '{}'", name),
            TokenKind::Punct(p) => format!("Unexpected token '{}'", p),
        };
        SyntaxError::new(message, token.pos)
    }

    fn end_statement(&mut self) {
        self.eat_punct(";");
    }

    // ========================================================================
    // Nesting
    // ========================================================================

    /// One level deeper; left-associative chains call this once per link
    fn enter(&mut self) -> PResult<()> {
        self.depth += 1;
        if self.depth > MAX_NESTING {
            return Err(SyntaxError::new(
                format!("Nesting exceeds {} levels", MAX_NESTING),
                self.peek().pos,
            ));
        }
        Ok(())
    }

    fn nested<T>(&mut self, parse: fn(&mut Self) -> PResult<T>) -> PResult<T> {
        self.enter()?;
        let result = parse(self);
        self.depth -= 1;
        result
    }

    // ========================================================================
    // Statements
    // ========================================================================

    fn statement(&mut self) -> PResult<Stmt> {
        self.nested(Self::bare_statement)
    }

    fn bare_statement(&mut self) -> PResult<Stmt> {
        let token = self.peek().clone();
        let TokenKind::Ident(word) = &token.kind else {
            if self.eat_punct(";") {
                return Ok(Stmt::Empty);
            }
            if self.is_punct("{") {
                return Ok(Stmt::Block(self.block()?));
            }
            return self.expression_statement();
        };

        match word.as_str() {
            "let" | "const" | "var" => {
                let stmt = self.declaration()?;
                self.end_statement();
                Ok(stmt)
            }
            "if" => self.if_statement(),
            "while" => {
                self.advance();
                self.expect_punct("(")?;
                let cond = self.expression()?;
                self.expect_punct(")")?;
                let body = Box::new(self.statement()?);
                Ok(Stmt::While { cond, body })
            }
            "for" => self.for_statement(),
            "break" => {
                self.advance();
                self.end_statement();
                Ok(Stmt::Break)
            }
            "continue" => {
                self.advance();
                self.end_statement();
                Ok(Stmt::Continue)
            }
            "return" => {
                self.advance();
                let ends = self.is_punct(";")
                    || self.is_punct("}")
                    || self.at_eof()
                    || self.peek().newline_before;
                let value = if ends { None } else { Some(self.expression()?) };
                self.end_statement();
                Ok(Stmt::Return(value))
            }
            "throw" => {
                self.advance();
                let value = self.expression()?;
                self.end_statement();
                Ok(Stmt::Throw(value, token.pos))
            }
            "try" => self.try_statement(),
            "function" => Ok(Stmt::Function(self.function()?)),
            "async" if matches!(&self.peek_at(1).kind, TokenKind::Ident(w) if w == "function") => {
                self.advance();
                Ok(Stmt::Function(self.function()?))
            }
            _ => self.expression_statement(),
        }
    }

    fn expression_statement(&mut self) -> PResult<Stmt> {
        let expr = self.expression()?;
        if !(self.is_punct(";")
            || self.is_punct("}")
            || self.at_eof()
            || self.peek().newline_before)
        {
            return Err(self.unexpected());
        }
        self.end_statement();
        Ok(Stmt::Expr(expr))
    }

    fn block(&mut self) -> PResult<Vec<Stmt>> {
        self.expect_punct("{")?;
        let mut body = Vec::new();
        while !self.is_punct("}") {
            if self.at_eof() {
                return Err(self.unexpected());
            }
            body.push(self.statement()?);
        }
        self.advance();
        Ok(body)
    }

    fn decl_kind(&mut self) -> PResult<DeclKind> {
        let kind = match &self.peek().kind {
            TokenKind::Ident(w) if w == "let" => DeclKind::Let,
            TokenKind::Ident(w) if w == "const" => DeclKind::Const,
            TokenKind::Ident(w) if w == "var" => DeclKind::Var,
            _ => return Err(self.unexpected()),
        };
        self.advance();
        Ok(kind)
    }

    /// `let a = 1, b` becomes a sequence of single declarations
    fn declaration(&mut self) -> PResult<Stmt> {
        let kind = self.decl_kind()?;
        let mut decls = Vec::new();
        loop {
            let (name, pos) = self.expect_ident()?;
            let init = if self.eat_punct("=") {
                Some(self.assignment()?)
            } else {
                None
            };
            decls.push(Stmt::Decl {
                kind,
                name,
                init,
                pos,
            });
            if !self.eat_punct(",") {
                break;
            }
        }

        if decls.len() == 1 {
            Ok(decls.remove(0))
        } else {
            Ok(Stmt::Sequence(decls))
        }
    }

    fn if_statement(&mut self) -> PResult<Stmt> {
        self.advance();
        self.expect_punct("(")?;
        let cond = self.expression()?;
        self.expect_punct(")")?;
        let then = Box::new(self.statement()?);
        let otherwise = if self.eat_keyword("else") {
            Some(Box::new(self.statement()?))
        } else {
            None
        };
        Ok(Stmt::If {
            cond,
            then,
            otherwise,
        })
    }

    fn for_statement(&mut self) -> PResult<Stmt> {
        self.advance();
        self.eat_keyword("await");
        self.expect_punct("(")?;

        // for (const x of xs)
        let is_decl = self.is_keyword("let") || self.is_keyword("const") || self.is_keyword("var");
        if is_decl && matches!(&self.peek_at(2).kind, TokenKind::Ident(w) if w == "of") {
            let kind = self.decl_kind()?;
            let (name, pos) = self.expect_ident()?;
            self.advance(); // of
            let iterable = self.expression()?;
            self.expect_punct(")")?;
            let body = Box::new(self.statement()?);
            return Ok(Stmt::ForOf {
                kind,
                name,
                iterable,
                body,
                pos,
            });
        }

        let init = if self.is_punct(";") {
            None
        } else if is_decl {
            Some(Box::new(self.declaration()?))
        } else {
            Some(Box::new(Stmt::Expr(self.expression()?)))
        };
        self.expect_punct(";")?;

        let cond = if self.is_punct(";") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(";")?;

        let update = if self.is_punct(")") {
            None
        } else {
            Some(self.expression()?)
        };
        self.expect_punct(")")?;

        let body = Box::new(self.statement()?);
        Ok(Stmt::For {
            init,
            cond,
            update,
            body,
        })
    }

    fn try_statement(&mut self) -> PResult<Stmt> {
        self.advance();
        let body = self.block()?;

        let mut param = None;
        let mut handler = None;
        if self.eat_keyword("catch") {
            if self.eat_punct("(") {
                param = Some(self.expect_ident()?.0);
                self.expect_punct(")")?;
            }
            handler = Some(self.block()?);
        }

        let finalizer = if self.eat_keyword("finally") {
            Some(self.block()?)
        } else {
            None
        };

        if handler.is_none() && finalizer.is_none() {
            return Err(SyntaxError::new("Missing catch or finally after try", self.peek().pos));
        }

        Ok(Stmt::Try {
            body,
            param,
            handler,
            finalizer,
        })
    }

    /// `function name(a, b) { ... }` (name optional in expressions)
    fn function(&mut self) -> PResult<Arc<FunctionDecl>> {
        let pos = self.peek().pos;
        if !self.eat_keyword("function") {
            return Err(self.unexpected());
        }

        let name = match &self.peek().kind {
            TokenKind::Ident(_) => Some(self.expect_ident()?.0),
            _ => None,
        };

        self.expect_punct("(")?;
        let mut params = Vec::new();
        while !self.is_punct(")") {
            params.push(self.expect_ident()?.0);
            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct(")")?;
        let body = self.block()?;

        Ok(Arc::new(FunctionDecl {
            name,
            params,
            body,
            pos,
        }))
    }

    // ========================================================================
    // Expressions
    // ========================================================================

    fn expression(&mut self) -> PResult<Expr> {
        self.assignment()
    }

    fn assignment(&mut self) -> PResult<Expr> {
        self.nested(Self::bare_assignment)
    }

    fn bare_assignment(&mut self) -> PResult<Expr> {
        let target = self.conditional()?;

        let op = match &self.peek().kind {
            TokenKind::Punct("=") => AssignOp::Assign,
            TokenKind::Punct("+=") => AssignOp::Add,
            TokenKind::Punct("-=") => AssignOp::Sub,
            TokenKind::Punct("*=") => AssignOp::Mul,
            TokenKind::Punct("/=") => AssignOp::Div,
            _ => return Ok(target),
        };
        let pos = self.advance().pos;

        if !matches!(
            target,
            Expr::Ident(..) | Expr::Member { .. } | Expr::Index { .. }
        ) {
            return Err(SyntaxError::new("Invalid left-hand side in assignment", pos));
        }

        let value = self.assignment()?;
        Ok(Expr::Assign {
            op,
            target: Box::new(target),
            value: Box::new(value),
            pos,
        })
    }

    fn conditional(&mut self) -> PResult<Expr> {
        let cond = self.logical_or()?;
        if !self.eat_punct("?") {
            return Ok(cond);
        }
        let then = self.assignment()?;
        self.expect_punct(":")?;
        let otherwise = self.assignment()?;
        Ok(Expr::Conditional {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        })
    }

    fn logical_or(&mut self) -> PResult<Expr> {
        let mut left = self.logical_and()?;
        let mut links = 0;
        while self.eat_punct("||") {
            self.enter()?;
            links += 1;
            let right = self.logical_and()?;
            left = Expr::Logical {
                op: LogicalOp::Or,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth -= links;
        Ok(left)
    }

    fn logical_and(&mut self) -> PResult<Expr> {
        let mut left = self.equality()?;
        let mut links = 0;
        while self.eat_punct("&&") {
            self.enter()?;
            links += 1;
            let right = self.equality()?;
            left = Expr::Logical {
                op: LogicalOp::And,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        self.depth -= links;
        Ok(left)
    }

    fn binary_level(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Self) -> PResult<Expr>,
    ) -> PResult<Expr> {
        let mut left = next(self)?;
        let mut links = 0;
        'outer: loop {
            for (p, op) in ops {
                if self.is_punct(p) {
                    let pos = self.advance().pos;
                    self.enter()?;
                    links += 1;
                    let right = next(self)?;
                    left = Expr::Binary {
                        op: *op,
                        left: Box::new(left),
                        right: Box::new(right),
                        pos,
                    };
                    continue 'outer;
                }
            }
            self.depth -= links;
            return Ok(left);
        }
    }

    fn equality(&mut self) -> PResult<Expr> {
        self.binary_level(
            &[
                ("===", BinaryOp::Eq),
                ("!==", BinaryOp::NotEq),
                ("==", BinaryOp::Eq),
                ("!=", BinaryOp::NotEq),
            ],
            Self::relational,
        )
    }

    fn relational(&mut self) -> PResult<Expr> {
        self.binary_level(
            &[
                ("<=", BinaryOp::LtEq),
                (">=", BinaryOp::GtEq),
                ("<", BinaryOp::Lt),
                (">", BinaryOp::Gt),
            ],
            Self::additive,
        )
    }

    fn additive(&mut self) -> PResult<Expr> {
        self.binary_level(
            &[("+", BinaryOp::Add), ("-", BinaryOp::Sub)],
            Self::multiplicative,
        )
    }

    fn multiplicative(&mut self) -> PResult<Expr> {
        self.binary_level(
            &[
                ("*", BinaryOp::Mul),
                ("/", BinaryOp::Div),
                ("%", BinaryOp::Rem),
            ],
            Self::unary,
        )
    }

    fn unary(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        let op = match &token.kind {
            TokenKind::Punct("!") => Some(UnaryOp::Not),
            TokenKind::Punct("-") => Some(UnaryOp::Neg),
            TokenKind::Punct("+") => Some(UnaryOp::Plus),
            TokenKind::Ident(w) if w == "typeof" => Some(UnaryOp::TypeOf),
            TokenKind::Ident(w) if w == "await" || w == "new" => {
                self.advance();
                return self.nested(Self::unary);
            }
            TokenKind::Punct(p @ ("++" | "--")) => {
                let delta = if *p == "++" { 1.0 } else { -1.0 };
                self.advance();
                let (name, pos) = self.expect_ident()?;
                return Ok(Expr::Update {
                    name,
                    delta,
                    prefix: true,
                    pos,
                });
            }
            _ => None,
        };

        match op {
            Some(op) => {
                self.advance();
                let expr = self.nested(Self::unary)?;
                Ok(Expr::Unary {
                    op,
                    expr: Box::new(expr),
                })
            }
            None => self.postfix(),
        }
    }

    fn postfix(&mut self) -> PResult<Expr> {
        let expr = self.call()?;
        let token = self.peek().clone();
        let delta = match token.kind {
            TokenKind::Punct("++") if !token.newline_before => 1.0,
            TokenKind::Punct("--") if !token.newline_before => -1.0,
            _ => return Ok(expr),
        };

        let Expr::Ident(name, pos) = expr else {
            return Err(SyntaxError::new(
                "Invalid left-hand side expression in postfix operation",
                token.pos,
            ));
        };
        self.advance();
        Ok(Expr::Update {
            name,
            delta,
            prefix: false,
            pos,
        })
    }

    fn call(&mut self) -> PResult<Expr> {
        let mut expr = self.primary()?;
        let mut links = 0;
        loop {
            if matches!(self.peek().kind, TokenKind::Punct("." | "[" | "(")) {
                self.enter()?;
                links += 1;
            }
            if self.is_punct(".") {
                let pos = self.advance().pos;
                let property = match self.advance().kind {
                    // reserved words are fine as property names
                    TokenKind::Ident(name) => name,
                    _ => return Err(SyntaxError::new("Unexpected token after '.'", pos)),
                };
                expr = Expr::Member {
                    object: Box::new(expr),
                    property,
                    pos,
                };
            } else if self.is_punct("[") {
                let pos = self.advance().pos;
                let index = self.expression()?;
                self.expect_punct("]")?;
                expr = Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(index),
                    pos,
                };
            } else if self.is_punct("(") {
                let pos = self.advance().pos;
                let mut args = Vec::new();
                while !self.is_punct(")") {
                    args.push(self.assignment()?);
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct(")")?;
                expr = Expr::Call {
                    callee: Box::new(expr),
                    args,
                    pos,
                };
            } else {
                self.depth -= links;
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> PResult<Expr> {
        let token = self.peek().clone();
        match token.kind {
            TokenKind::Number(n) => {
                self.advance();
                Ok(Expr::Number(n))
            }
            TokenKind::Str(s) => {
                self.advance();
                Ok(Expr::Str(s))
            }
            TokenKind::Punct("(") => {
                self.advance();
                let expr = self.expression()?;
                self.expect_punct(")")?;
                Ok(expr)
            }
            TokenKind::Punct("[") => {
                self.advance();
                let mut items = Vec::new();
                while !self.is_punct("]") {
                    items.push(self.assignment()?);
                    if !self.eat_punct(",") {
                        break;
                    }
                }
                self.expect_punct("]")?;
                Ok(Expr::Array(items))
            }
            TokenKind::Punct("{") => self.object_literal(),
            TokenKind::Ident(ref word) => match word.as_str() {
                "true" => {
                    self.advance();
                    Ok(Expr::Bool(true))
                }
                "false" => {
                    self.advance();
                    Ok(Expr::Bool(false))
                }
                "null" => {
                    self.advance();
                    Ok(Expr::Null)
                }
                "undefined" => {
                    self.advance();
                    Ok(Expr::Undefined)
                }
                "function" => Ok(Expr::Function(self.function()?)),
                "async" if matches!(&self.peek_at(1).kind, TokenKind::Ident(w) if w == "function") => {
                    self.advance();
                    Ok(Expr::Function(self.function()?))
                }
                _ => {
                    let (name, pos) = self.expect_ident()?;
                    Ok(Expr::Ident(name, pos))
                }
            },
            _ => Err(self.unexpected()),
        }
    }

    fn object_literal(&mut self) -> PResult<Expr> {
        self.expect_punct("{")?;
        let mut entries = Vec::new();
        while !self.is_punct("}") {
            let token = self.advance();
            let key = match token.kind {
                TokenKind::Ident(name) => name,
                TokenKind::Str(s) => s,
                TokenKind::Number(n) => super::value::format_number(n),
                _ => return Err(SyntaxError::new("Unexpected token in object literal", token.pos)),
            };

            let value = if self.eat_punct(":") {
                self.assignment()?
            } else {
                // shorthand `{ x }`
                Expr::Ident(key.clone(), token.pos)
            };
            entries.push((key, value));

            if !self.eat_punct(",") {
                break;
            }
        }
        self.expect_punct("}")?;
        Ok(Expr::Object(entries))
    }
}

fn is_reserved(word: &str) -> bool {
    matches!(
        word,
        "let"
            | "const"
            | "var"
            | "if"
            | "else"
            | "while"
            | "for"
            | "break"
            | "continue"
            | "return"
            | "throw"
            | "try"
            | "catch"
            | "finally"
            | "function"
            | "typeof"
            | "new"
            | "await"
            | "true"
            | "false"
            | "null"
            | "undefined"
    )
}
