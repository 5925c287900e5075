/// Recursive-descent parser for `OpenSCAD`.
///
/// Consumes a token stream from the lexer and produces an AST in a single
/// pass. Expression parsing uses precedence climbing with one function per
/// level; every ordered choice is resolved with bounded lookahead, so no
/// backtracking (and no memo table) is needed. Parser state lives in a
/// [`Parser`] value created per invocation, making successive parses
/// independent.
///
/// All node positions are resolved through the [`SourceMap`] at construction
/// time, so nodes parsed from spliced `include` content report the included
/// file as their origin.
use crate::ast::{
    Argument, Assignment, BinaryOp, Expr, ExprKind, Instantiation, InstantiationKind,
    ListCompElement, ListCompElementKind, Parameter, Position, SourceFile, Statement,
    StatementKind, UnaryOp,
};
use crate::error::{ParseError, ParseResult};
use crate::lexer::{self, CommentToken, SpannedToken};
use crate::source_map::SourceMap;
use crate::span::Span;
use crate::token::Token;

/// Parse a standalone `OpenSCAD` source string into an AST.
///
/// The origin is reported as `"<string>"` and includes are not expanded;
/// use the file-level API in [`crate::files`] for that.
///
/// # Errors
/// Returns a `ParseError` if the source contains syntax errors.
pub fn parse(source: &str) -> ParseResult<SourceFile> {
    let mut map = SourceMap::new();
    map.add_origin("<string>", source, None);
    parse_source_map(&map, false)
}

/// Parse the combined buffer of a source map.
///
/// With `include_comments` set, comment spans are interleaved into the
/// top-level statement list in source order.
///
/// # Errors
/// Returns a `ParseError` if the combined source contains syntax errors.
pub fn parse_source_map(map: &SourceMap, include_comments: bool) -> ParseResult<SourceFile> {
    let source = map.combined();
    let (tokens, comments) = if include_comments {
        lexer::lex_with_comments(source)
    } else {
        (lexer::lex(source), Vec::new())
    };
    let mut parser = Parser::new(source, map, tokens);
    parser.parse_file(&comments)
}

struct Parser<'src> {
    source: &'src str,
    map: &'src SourceMap,
    tokens: Vec<SpannedToken>,
    pos: usize,
    depth: usize,
}

const MAX_DEPTH: usize = 256;

impl<'src> Parser<'src> {
    const fn new(source: &'src str, map: &'src SourceMap, tokens: Vec<SpannedToken>) -> Self {
        Self {
            source,
            map,
            tokens,
            pos: 0,
            depth: 0,
        }
    }

    fn enter_recursion(&mut self) -> ParseResult<()> {
        self.depth += 1;
        if self.depth > MAX_DEPTH {
            let span = self.peek_span();
            Err(ParseError::custom(
                "maximum nesting depth exceeded",
                self.position(span),
                span,
            ))
        } else {
            Ok(())
        }
    }

    const fn leave_recursion(&mut self) {
        self.depth = self.depth.saturating_sub(1);
    }

    // ── Helpers ──────────────────────────────────────────────

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset).map(|(t, _)| t)
    }

    fn peek_span(&self) -> Span {
        self.tokens.get(self.pos).map_or_else(
            || Span::new(self.source.len(), self.source.len()),
            |(_, s)| *s,
        )
    }

    /// Resolve a combined-buffer span to its origin position.
    fn position(&self, span: Span) -> Position {
        self.map.location(span.start).unwrap_or_default()
    }

    fn advance(&mut self) -> Option<SpannedToken> {
        if self.pos < self.tokens.len() {
            let tok = self.tokens[self.pos].clone();
            self.pos += 1;
            Some(tok)
        } else {
            None
        }
    }

    const fn at_end(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn slice(&self, span: Span) -> &'src str {
        &self.source[span.start..span.end]
    }

    fn eof_error(&self, expected: &str) -> ParseError {
        let offset = self.source.len();
        let position = self
            .map
            .location(offset.saturating_sub(1))
            .unwrap_or_default();
        ParseError::unexpected_eof(expected, position, offset)
    }

    fn unexpected(&self, expected: &str) -> ParseError {
        match self.tokens.get(self.pos) {
            Some((tok, span)) => ParseError::unexpected_token(
                &tok.to_string(),
                expected,
                self.position(*span),
                *span,
            ),
            None => self.eof_error(expected),
        }
    }

    fn expect(&mut self, expected: &Token) -> ParseResult<Span> {
        match self.peek() {
            Some(tok) if std::mem::discriminant(tok) == std::mem::discriminant(expected) => {
                let (_, span) = self.advance().unwrap();
                Ok(span)
            }
            Some(_) => Err(self.unexpected(&format!("`{expected}`"))),
            None => Err(self.eof_error(&format!("`{expected}`"))),
        }
    }

    fn expect_identifier(&mut self) -> ParseResult<(String, Span)> {
        match self.peek() {
            Some(Token::Identifier) => {
                let (_, span) = self.advance().unwrap();
                Ok((self.slice(span).to_string(), span))
            }
            Some(_) => Err(self.unexpected("identifier")),
            None => Err(self.eof_error("identifier")),
        }
    }

    fn eat(&mut self, expected: &Token) -> Option<Span> {
        if self
            .peek()
            .is_some_and(|t| std::mem::discriminant(t) == std::mem::discriminant(expected))
        {
            Some(self.advance().unwrap().1)
        } else {
            None
        }
    }

    // ── File-level ───────────────────────────────────────────

    fn parse_file(&mut self, comments: &[CommentToken]) -> ParseResult<SourceFile> {
        // Statements keep their combined start offset until the comment
        // merge, then the offsets are dropped.
        let mut entries: Vec<(usize, Statement)> = Vec::new();
        while !self.at_end() {
            self.parse_toplevel_into(&mut entries)?;
        }

        for comment in comments {
            let raw = self.slice(comment.span);
            let kind = if comment.line {
                let text = raw.strip_prefix("//").unwrap_or(raw);
                StatementKind::CommentLine {
                    text: text.to_string(),
                }
            } else {
                let text = raw
                    .strip_prefix("/*")
                    .and_then(|s| s.strip_suffix("*/"))
                    .unwrap_or(raw);
                StatementKind::CommentBlock {
                    text: text.to_string(),
                }
            };
            entries.push((
                comment.span.start,
                Statement::new(kind, self.position(comment.span)),
            ));
        }
        entries.sort_by_key(|(offset, _)| *offset);

        let position = self.map.location(0).unwrap_or_default();
        Ok(SourceFile {
            statements: entries.into_iter().map(|(_, s)| s).collect(),
            position,
        })
    }

    /// Parse one top-level item into `out`: empty statements vanish and bare
    /// blocks splice their contents.
    fn parse_toplevel_into(&mut self, out: &mut Vec<(usize, Statement)>) -> ParseResult<()> {
        match self.peek() {
            Some(Token::Semicolon) => {
                self.advance();
                Ok(())
            }
            Some(Token::LBrace) => {
                self.advance();
                while self.peek() != Some(&Token::RBrace) && !self.at_end() {
                    self.parse_toplevel_into(out)?;
                }
                self.expect(&Token::RBrace)?;
                Ok(())
            }
            _ => {
                let start = self.peek_span().start;
                let stmt = self.parse_statement()?;
                out.push((start, stmt));
                Ok(())
            }
        }
    }

    // ── Statements ───────────────────────────────────────────

    fn parse_statement(&mut self) -> ParseResult<Statement> {
        self.enter_recursion()?;
        let result = self.parse_statement_inner();
        self.leave_recursion();
        result
    }

    fn parse_statement_inner(&mut self) -> ParseResult<Statement> {
        match self.peek() {
            Some(Token::Include) => self.parse_include(),
            Some(Token::Use) => self.parse_use(),
            Some(Token::Module) => self.parse_module_decl(),
            Some(Token::Function) => self.parse_function_decl(),
            // Assignment: identifier followed by `=` (but not `==`)
            Some(Token::Identifier) if self.is_assignment_ahead() => self.parse_assignment_stmt(),
            Some(
                Token::Identifier
                | Token::If
                | Token::For
                | Token::IntersectionFor
                | Token::Let
                | Token::Assert
                | Token::Echo
                | Token::Bang
                | Token::Hash
                | Token::Percent
                | Token::Star,
            ) => {
                let instantiation = self.parse_instantiation()?;
                let position = instantiation.position.clone();
                Ok(Statement::new(
                    StatementKind::Instantiation { instantiation },
                    position,
                ))
            }
            Some(_) => Err(self.unexpected("statement")),
            None => Err(self.eof_error("statement")),
        }
    }

    fn is_assignment_ahead(&self) -> bool {
        // Look for `identifier =` where `=` is not `==`
        if self.pos + 1 < self.tokens.len() {
            matches!(self.tokens[self.pos + 1].0, Token::Assign)
        } else {
            false
        }
    }

    #[allow(clippy::unnecessary_wraps)]
    fn parse_include(&mut self) -> ParseResult<Statement> {
        let (_, span) = self.advance().unwrap(); // consume Include token
        let path = lexer::extract_include_path(self.slice(span)).to_string();
        Ok(Statement::new(
            StatementKind::Include { path },
            self.position(span),
        ))
    }

    #[allow(clippy::unnecessary_wraps)]
    fn parse_use(&mut self) -> ParseResult<Statement> {
        let (_, span) = self.advance().unwrap(); // consume Use token
        let path = lexer::extract_include_path(self.slice(span)).to_string();
        Ok(Statement::new(
            StatementKind::Use { path },
            self.position(span),
        ))
    }

    fn parse_assignment_stmt(&mut self) -> ParseResult<Statement> {
        let (name, span) = self.expect_identifier()?;
        self.expect(&Token::Assign)?;
        let value = self.parse_expr()?;
        self.expect(&Token::Semicolon)?;
        Ok(Statement::new(
            StatementKind::Assignment { name, value },
            self.position(span),
        ))
    }

    fn parse_module_decl(&mut self) -> ParseResult<Statement> {
        let start = self.expect(&Token::Module)?;
        let (name, _) = self.expect_identifier()?;
        self.expect(&Token::LParen)?;
        let parameters = self.parse_parameters()?;
        self.expect(&Token::RParen)?;
        let body = self.parse_children()?;
        Ok(Statement::new(
            StatementKind::ModuleDeclaration {
                name,
                parameters,
                body,
            },
            self.position(start),
        ))
    }

    fn parse_function_decl(&mut self) -> ParseResult<Statement> {
        let start = self.expect(&Token::Function)?;
        let (name, _) = self.expect_identifier()?;
        self.expect(&Token::LParen)?;
        let parameters = self.parse_parameters()?;
        self.expect(&Token::RParen)?;
        self.expect(&Token::Assign)?;
        let body = self.parse_expr()?;
        self.expect(&Token::Semicolon)?;
        Ok(Statement::new(
            StatementKind::FunctionDeclaration {
                name,
                parameters,
                body,
            },
            self.position(start),
        ))
    }

    // ── Modular instantiations ───────────────────────────────

    fn parse_instantiation(&mut self) -> ParseResult<Instantiation> {
        self.enter_recursion()?;
        let result = self.parse_instantiation_inner();
        self.leave_recursion();
        result
    }

    fn parse_instantiation_inner(&mut self) -> ParseResult<Instantiation> {
        let span = self.peek_span();
        match self.peek() {
            // Modifier prefixes wrap the following instantiation; stacked
            // modifiers nest outer-over-inner in textual order.
            Some(Token::Bang) => self.parse_modifier(span, |child| InstantiationKind::ShowOnly {
                child,
            }),
            Some(Token::Hash) => self.parse_modifier(span, |child| InstantiationKind::Highlight {
                child,
            }),
            Some(Token::Percent) => {
                self.parse_modifier(span, |child| InstantiationKind::Background { child })
            }
            Some(Token::Star) => {
                self.parse_modifier(span, |child| InstantiationKind::Disable { child })
            }
            Some(Token::If) => self.parse_modular_if(),
            Some(Token::For) => self.parse_modular_for(false),
            Some(Token::IntersectionFor) => self.parse_modular_for(true),
            Some(Token::Let) => {
                let start = self.advance().unwrap().1;
                self.expect(&Token::LParen)?;
                let assignments = self.parse_assignments()?;
                self.expect(&Token::RParen)?;
                let children = self.parse_children()?;
                Ok(Instantiation::new(
                    InstantiationKind::Let {
                        assignments,
                        children,
                    },
                    self.position(start),
                ))
            }
            Some(Token::Echo) => {
                let start = self.advance().unwrap().1;
                self.expect(&Token::LParen)?;
                let arguments = self.parse_arguments()?;
                self.expect(&Token::RParen)?;
                let children = self.parse_children()?;
                Ok(Instantiation::new(
                    InstantiationKind::Echo {
                        arguments,
                        children,
                    },
                    self.position(start),
                ))
            }
            Some(Token::Assert) => {
                let start = self.advance().unwrap().1;
                self.expect(&Token::LParen)?;
                let arguments = self.parse_arguments()?;
                self.expect(&Token::RParen)?;
                let children = self.parse_children()?;
                Ok(Instantiation::new(
                    InstantiationKind::Assert {
                        arguments,
                        children,
                    },
                    self.position(start),
                ))
            }
            Some(Token::Identifier) => self.parse_modular_call(),
            Some(_) => Err(self.unexpected("module instantiation")),
            None => Err(self.eof_error("module instantiation")),
        }
    }

    fn parse_modifier(
        &mut self,
        span: Span,
        wrap: impl FnOnce(Box<Instantiation>) -> InstantiationKind,
    ) -> ParseResult<Instantiation> {
        self.advance();
        let child = self.parse_instantiation()?;
        Ok(Instantiation::new(
            wrap(Box::new(child)),
            self.position(span),
        ))
    }

    fn parse_modular_if(&mut self) -> ParseResult<Instantiation> {
        let start = self.expect(&Token::If)?;
        self.expect(&Token::LParen)?;
        let condition = self.parse_expr()?;
        self.expect(&Token::RParen)?;
        let then_children = self.parse_children()?;
        let kind = if self.eat(&Token::Else).is_some() {
            let else_children = self.parse_children()?;
            InstantiationKind::IfElse {
                condition,
                then_children,
                else_children,
            }
        } else {
            InstantiationKind::If {
                condition,
                children: then_children,
            }
        };
        Ok(Instantiation::new(kind, self.position(start)))
    }

    fn parse_modular_for(&mut self, intersection: bool) -> ParseResult<Instantiation> {
        let start = self.advance().unwrap().1; // consume `for` / `intersection_for`
        self.expect(&Token::LParen)?;
        let assignments = self.parse_assignments()?;

        // `for (init; cond; update)` is the C-style form
        let kind = if self.eat(&Token::Semicolon).is_some() {
            let condition = self.parse_expr()?;
            self.expect(&Token::Semicolon)?;
            let update = self.parse_assignments()?;
            self.expect(&Token::RParen)?;
            let children = self.parse_children()?;
            if intersection {
                InstantiationKind::IntersectionCFor {
                    init: assignments,
                    condition,
                    update,
                    children,
                }
            } else {
                InstantiationKind::CFor {
                    init: assignments,
                    condition,
                    update,
                    children,
                }
            }
        } else {
            self.expect(&Token::RParen)?;
            let children = self.parse_children()?;
            if intersection {
                InstantiationKind::IntersectionFor {
                    assignments,
                    children,
                }
            } else {
                InstantiationKind::For {
                    assignments,
                    children,
                }
            }
        };
        Ok(Instantiation::new(kind, self.position(start)))
    }

    fn parse_modular_call(&mut self) -> ParseResult<Instantiation> {
        let (name, span) = self.expect_identifier()?;
        self.expect(&Token::LParen)?;
        let arguments = self.parse_arguments()?;
        self.expect(&Token::RParen)?;
        let children = self.parse_children()?;
        Ok(Instantiation::new(
            InstantiationKind::Call {
                name,
                arguments,
                children,
            },
            self.position(span),
        ))
    }

    /// Parse a child body: `;` (no children), a single statement, or a
    /// `{ ... }` block. Blocks splice; only modular instantiations are
    /// retained (assignments and nested declarations parse but have no
    /// statement-level counterpart inside a body).
    fn parse_children(&mut self) -> ParseResult<Vec<Instantiation>> {
        let mut children = Vec::new();
        self.parse_body_statement_into(&mut children)?;
        Ok(children)
    }

    fn parse_body_statement_into(&mut self, out: &mut Vec<Instantiation>) -> ParseResult<()> {
        self.enter_recursion()?;
        let result = self.parse_body_statement_inner(out);
        self.leave_recursion();
        result
    }

    fn parse_body_statement_inner(&mut self, out: &mut Vec<Instantiation>) -> ParseResult<()> {
        match self.peek() {
            Some(Token::Semicolon) => {
                self.advance();
                Ok(())
            }
            Some(Token::LBrace) => {
                self.advance();
                while self.peek() != Some(&Token::RBrace) && !self.at_end() {
                    self.parse_body_statement_into(out)?;
                }
                self.expect(&Token::RBrace)?;
                Ok(())
            }
            Some(Token::Module) => {
                self.parse_module_decl()?;
                Ok(())
            }
            Some(Token::Function) => {
                self.parse_function_decl()?;
                Ok(())
            }
            Some(Token::Identifier) if self.is_assignment_ahead() => {
                self.parse_assignment_stmt()?;
                Ok(())
            }
            _ => {
                out.push(self.parse_instantiation()?);
                Ok(())
            }
        }
    }

    // ── Parameters, arguments, bindings ──────────────────────

    fn parse_parameters(&mut self) -> ParseResult<Vec<Parameter>> {
        let mut params = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            return Ok(params);
        }
        loop {
            params.push(self.parse_parameter()?);
            if self.eat(&Token::Comma).is_none() {
                break;
            }
            // Allow trailing comma
            if self.peek() == Some(&Token::RParen) {
                break;
            }
        }
        Ok(params)
    }

    fn parse_parameter(&mut self) -> ParseResult<Parameter> {
        let (name, span) = self.expect_identifier()?;
        let default = if self.eat(&Token::Assign).is_some() {
            Some(self.parse_expr()?)
        } else {
            None
        };
        Ok(Parameter {
            name,
            default,
            position: self.position(span),
        })
    }

    fn parse_arguments(&mut self) -> ParseResult<Vec<Argument>> {
        let mut args = Vec::new();
        if self.peek() == Some(&Token::RParen) {
            return Ok(args);
        }
        loop {
            args.push(self.parse_argument()?);
            if self.eat(&Token::Comma).is_none() {
                break;
            }
            // Allow trailing comma
            if self.peek() == Some(&Token::RParen) {
                break;
            }
        }
        Ok(args)
    }

    fn parse_argument(&mut self) -> ParseResult<Argument> {
        // Named argument: `name = expr`
        if matches!(self.peek(), Some(Token::Identifier)) && self.is_assignment_ahead() {
            let (name, span) = self.expect_identifier()?;
            self.expect(&Token::Assign)?;
            let value = self.parse_expr()?;
            return Ok(Argument {
                name: Some(name),
                value,
                position: self.position(span),
            });
        }
        let value = self.parse_expr()?;
        let position = value.position.clone();
        Ok(Argument {
            name: None,
            value,
            position,
        })
    }

    /// Comma-separated `name = expr` bindings, as in `let (...)` and `for
    /// (...)` heads. May be empty; trailing comma allowed.
    fn parse_assignments(&mut self) -> ParseResult<Vec<Assignment>> {
        let mut assignments = Vec::new();
        if matches!(self.peek(), Some(Token::RParen | Token::Semicolon)) {
            return Ok(assignments);
        }
        loop {
            let (name, span) = self.expect_identifier()?;
            self.expect(&Token::Assign)?;
            let value = self.parse_expr()?;
            assignments.push(Assignment {
                name,
                value,
                position: self.position(span),
            });
            if self.eat(&Token::Comma).is_none() {
                break;
            }
            if matches!(self.peek(), Some(Token::RParen | Token::Semicolon)) {
                break;
            }
        }
        Ok(assignments)
    }

    // ── Expressions (precedence climbing) ────────────────────

    fn parse_expr(&mut self) -> ParseResult<Expr> {
        self.enter_recursion()?;
        let result = self.parse_expr_inner();
        self.leave_recursion();
        result
    }

    fn parse_expr_inner(&mut self) -> ParseResult<Expr> {
        // Special expression forms
        match self.peek() {
            Some(Token::Function) => return self.parse_function_literal(),
            Some(Token::Let) => return self.parse_let_expr(),
            Some(Token::Assert) => return self.parse_assert_expr(),
            Some(Token::Echo) => return self.parse_echo_expr(),
            _ => {}
        }

        let expr = self.parse_logical_or()?;

        // Ternary is right-associative: the else branch recurses into the
        // full expression rule.
        if self.peek() == Some(&Token::Question) {
            self.advance();
            let then_expr = self.parse_expr()?;
            self.expect(&Token::Colon)?;
            let else_expr = self.parse_expr()?;
            let position = expr.position.clone();
            return Ok(Expr::new(
                ExprKind::Ternary {
                    condition: Box::new(expr),
                    then_expr: Box::new(then_expr),
                    else_expr: Box::new(else_expr),
                },
                position,
            ));
        }

        Ok(expr)
    }

    fn parse_function_literal(&mut self) -> ParseResult<Expr> {
        let start = self.expect(&Token::Function)?;
        self.expect(&Token::LParen)?;
        let parameters = self.parse_parameters()?;
        self.expect(&Token::RParen)?;
        let body = self.parse_expr()?;
        Ok(Expr::new(
            ExprKind::FunctionLiteral {
                parameters,
                body: Box::new(body),
            },
            self.position(start),
        ))
    }

    fn parse_let_expr(&mut self) -> ParseResult<Expr> {
        let start = self.expect(&Token::Let)?;
        self.expect(&Token::LParen)?;
        let assignments = self.parse_assignments()?;
        self.expect(&Token::RParen)?;
        let body = self.parse_expr()?;
        Ok(Expr::new(
            ExprKind::Let {
                assignments,
                body: Box::new(body),
            },
            self.position(start),
        ))
    }

    /// `assert(...)` and `echo(...)` take an optional trailing expression;
    /// the body is absent when the next token cannot start one.
    fn body_follows(&self) -> bool {
        !self.at_end()
            && !matches!(
                self.peek(),
                Some(
                    Token::Semicolon
                        | Token::RParen
                        | Token::RBracket
                        | Token::RBrace
                        | Token::Comma
                        | Token::Colon
                        | Token::Else
                )
            )
    }

    fn parse_assert_expr(&mut self) -> ParseResult<Expr> {
        let start = self.expect(&Token::Assert)?;
        self.expect(&Token::LParen)?;
        let arguments = self.parse_arguments()?;
        self.expect(&Token::RParen)?;
        let body = if self.body_follows() {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::Assert { arguments, body },
            self.position(start),
        ))
    }

    fn parse_echo_expr(&mut self) -> ParseResult<Expr> {
        let start = self.expect(&Token::Echo)?;
        self.expect(&Token::LParen)?;
        let arguments = self.parse_arguments()?;
        self.expect(&Token::RParen)?;
        let body = if self.body_follows() {
            Some(Box::new(self.parse_expr()?))
        } else {
            None
        };
        Ok(Expr::new(
            ExprKind::Echo { arguments, body },
            self.position(start),
        ))
    }

    // Precedence levels (lowest to highest):
    // 1. ternary (handled in parse_expr)
    // 2. logical or
    // 3. logical and
    // 4. equality
    // 5. comparison
    // 6. bitwise or
    // 7. bitwise and
    // 8. shift
    // 9. addition
    // 10. multiplication
    // 11. unary
    // 12. exponent (right-associative)
    // 13. postfix (call, index, member)
    // 14. primary

    fn binary(left: Expr, op: BinaryOp, right: Expr) -> Expr {
        let position = left.position.clone();
        Expr::new(
            ExprKind::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            },
            position,
        )
    }

    fn parse_logical_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_logical_and()?;
        while self.peek() == Some(&Token::Or) {
            self.advance();
            let right = self.parse_logical_and()?;
            left = Self::binary(left, BinaryOp::LogicalOr, right);
        }
        Ok(left)
    }

    fn parse_logical_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_equality()?;
        while self.peek() == Some(&Token::And) {
            self.advance();
            let right = self.parse_equality()?;
            left = Self::binary(left, BinaryOp::LogicalAnd, right);
        }
        Ok(left)
    }

    fn parse_equality(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_comparison()?;
        loop {
            let op = match self.peek() {
                Some(Token::EqualEqual) => BinaryOp::Equal,
                Some(Token::NotEqual) => BinaryOp::NotEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_comparison()?;
            left = Self::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_comparison(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_bitwise_or()?;
        loop {
            let op = match self.peek() {
                Some(Token::Less) => BinaryOp::Less,
                Some(Token::LessEqual) => BinaryOp::LessEqual,
                Some(Token::Greater) => BinaryOp::Greater,
                Some(Token::GreaterEqual) => BinaryOp::GreaterEqual,
                _ => break,
            };
            self.advance();
            let right = self.parse_bitwise_or()?;
            left = Self::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_bitwise_or(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_bitwise_and()?;
        while self.peek() == Some(&Token::Pipe) {
            self.advance();
            let right = self.parse_bitwise_and()?;
            left = Self::binary(left, BinaryOp::BitwiseOr, right);
        }
        Ok(left)
    }

    fn parse_bitwise_and(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_shift()?;
        while self.peek() == Some(&Token::Ampersand) {
            self.advance();
            let right = self.parse_shift()?;
            left = Self::binary(left, BinaryOp::BitwiseAnd, right);
        }
        Ok(left)
    }

    fn parse_shift(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_addition()?;
        loop {
            let op = match self.peek() {
                Some(Token::ShiftLeft) => BinaryOp::ShiftLeft,
                Some(Token::ShiftRight) => BinaryOp::ShiftRight,
                _ => break,
            };
            self.advance();
            let right = self.parse_addition()?;
            left = Self::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_addition(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_multiplication()?;
        loop {
            let op = match self.peek() {
                Some(Token::Plus) => BinaryOp::Add,
                Some(Token::Minus) => BinaryOp::Subtract,
                _ => break,
            };
            self.advance();
            let right = self.parse_multiplication()?;
            left = Self::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_multiplication(&mut self) -> ParseResult<Expr> {
        let mut left = self.parse_unary()?;
        loop {
            let op = match self.peek() {
                Some(Token::Star) => BinaryOp::Multiply,
                Some(Token::Slash) => BinaryOp::Divide,
                Some(Token::Percent) => BinaryOp::Modulo,
                _ => break,
            };
            self.advance();
            let right = self.parse_unary()?;
            left = Self::binary(left, op, right);
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ParseResult<Expr> {
        match self.peek() {
            Some(Token::Minus) => {
                let start = self.advance().unwrap().1;
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    ExprKind::UnaryOp {
                        op: UnaryOp::Negate,
                        operand: Box::new(operand),
                    },
                    self.position(start),
                ))
            }
            // Unary plus produces no node
            Some(Token::Plus) => {
                self.advance();
                self.parse_unary()
            }
            Some(Token::Bang) => {
                let start = self.advance().unwrap().1;
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    ExprKind::UnaryOp {
                        op: UnaryOp::Not,
                        operand: Box::new(operand),
                    },
                    self.position(start),
                ))
            }
            Some(Token::Tilde) => {
                let start = self.advance().unwrap().1;
                let operand = self.parse_unary()?;
                Ok(Expr::new(
                    ExprKind::UnaryOp {
                        op: UnaryOp::BitwiseNot,
                        operand: Box::new(operand),
                    },
                    self.position(start),
                ))
            }
            _ => self.parse_exponent(),
        }
    }

    fn parse_exponent(&mut self) -> ParseResult<Expr> {
        let left = self.parse_postfix()?;
        if self.peek() == Some(&Token::Caret) {
            self.advance();
            // Right-associative: recurse into unary (not exponent)
            let right = self.parse_unary()?;
            Ok(Self::binary(left, BinaryOp::Exponent, right))
        } else {
            Ok(left)
        }
    }

    fn parse_postfix(&mut self) -> ParseResult<Expr> {
        let mut expr = self.parse_primary()?;
        loop {
            match self.peek() {
                Some(Token::LParen) => {
                    self.advance();
                    let arguments = self.parse_arguments()?;
                    self.expect(&Token::RParen)?;
                    let position = expr.position.clone();
                    expr = Expr::new(
                        ExprKind::Call {
                            callee: Box::new(expr),
                            arguments,
                        },
                        position,
                    );
                }
                Some(Token::LBracket) => {
                    self.advance();
                    let index = self.parse_expr()?;
                    self.expect(&Token::RBracket)?;
                    let position = expr.position.clone();
                    expr = Expr::new(
                        ExprKind::Index {
                            object: Box::new(expr),
                            index: Box::new(index),
                        },
                        position,
                    );
                }
                Some(Token::Dot) => {
                    self.advance();
                    let (member, _) = self.expect_identifier()?;
                    let position = expr.position.clone();
                    expr = Expr::new(
                        ExprKind::Member {
                            object: Box::new(expr),
                            member,
                        },
                        position,
                    );
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> ParseResult<Expr> {
        match self.peek() {
            Some(Token::Number(_)) => {
                let (tok, span) = self.advance().unwrap();
                if let Token::Number(value) = tok {
                    Ok(Expr::new(ExprKind::Number { value }, self.position(span)))
                } else {
                    unreachable!()
                }
            }
            Some(Token::String(_)) => {
                let (tok, span) = self.advance().unwrap();
                if let Token::String(value) = tok {
                    Ok(Expr::new(ExprKind::String { value }, self.position(span)))
                } else {
                    unreachable!()
                }
            }
            Some(Token::True) => {
                let span = self.advance().unwrap().1;
                Ok(Expr::new(
                    ExprKind::Boolean { value: true },
                    self.position(span),
                ))
            }
            Some(Token::False) => {
                let span = self.advance().unwrap().1;
                Ok(Expr::new(
                    ExprKind::Boolean { value: false },
                    self.position(span),
                ))
            }
            Some(Token::Undef) => {
                let span = self.advance().unwrap().1;
                Ok(Expr::new(ExprKind::Undef, self.position(span)))
            }
            Some(Token::Identifier) => {
                let (_, span) = self.advance().unwrap();
                let name = self.slice(span).to_string();
                Ok(Expr::new(
                    ExprKind::Identifier { name },
                    self.position(span),
                ))
            }
            Some(Token::LParen) => {
                self.advance();
                let expr = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Some(Token::LBracket) => self.parse_vector_or_range(),
            Some(_) => Err(self.unexpected("expression")),
            None => Err(self.eof_error("expression")),
        }
    }

    // ── Vectors, ranges, list comprehensions ─────────────────

    fn is_fragment_start(&self) -> bool {
        matches!(
            self.peek(),
            Some(Token::For | Token::Let | Token::If | Token::Each)
        )
    }

    /// A comprehension fragment ahead, possibly parenthesized: `for (...)`,
    /// `(let (...) ...)`, …
    fn is_fragment_ahead(&self) -> bool {
        self.is_fragment_start()
            || (self.peek() == Some(&Token::LParen)
                && matches!(
                    self.peek_at(1),
                    Some(Token::For | Token::Let | Token::If | Token::Each)
                ))
    }

    fn parse_vector_or_range(&mut self) -> ParseResult<Expr> {
        let start = self.expect(&Token::LBracket)?;
        let position = self.position(start);

        // Empty vector
        if self.peek() == Some(&Token::RBracket) {
            self.advance();
            return Ok(Expr::new(ExprKind::Vector { elements: vec![] }, position));
        }

        let mut elements: Vec<ListCompElement> = Vec::new();
        let mut has_fragment = false;

        if self.is_fragment_ahead() {
            elements.push(self.parse_lc_body()?);
            has_fragment = true;
        } else {
            let first = self.parse_expr()?;

            // Range syntax: [start : end] or [start : step : end]
            if self.peek() == Some(&Token::Colon) {
                self.advance();
                let second = self.parse_expr()?;
                if self.eat(&Token::Colon).is_some() {
                    let third = self.parse_expr()?;
                    self.expect(&Token::RBracket)?;
                    return Ok(Expr::new(
                        ExprKind::Range {
                            start: Box::new(first),
                            step: Some(Box::new(second)),
                            end: Box::new(third),
                        },
                        position,
                    ));
                }
                self.expect(&Token::RBracket)?;
                return Ok(Expr::new(
                    ExprKind::Range {
                        start: Box::new(first),
                        step: None,
                        end: Box::new(second),
                    },
                    position,
                ));
            }

            let pos = first.position.clone();
            elements.push(ListCompElement::new(
                ListCompElementKind::Expr { expr: first },
                pos,
            ));
        }

        while self.eat(&Token::Comma).is_some() {
            // Trailing comma
            if self.peek() == Some(&Token::RBracket) {
                break;
            }
            let element = self.parse_lc_body()?;
            if !matches!(element.kind, ListCompElementKind::Expr { .. }) {
                has_fragment = true;
            }
            elements.push(element);
        }
        self.expect(&Token::RBracket)?;

        if has_fragment {
            Ok(Expr::new(ExprKind::ListComprehension { elements }, position))
        } else {
            // No fragments at the top level: a plain vector
            let elements = elements
                .into_iter()
                .map(|element| match element.kind {
                    ListCompElementKind::Expr { expr } => expr,
                    _ => unreachable!(),
                })
                .collect();
            Ok(Expr::new(ExprKind::Vector { elements }, position))
        }
    }

    fn parse_list_comp_element(&mut self) -> ParseResult<ListCompElement> {
        self.enter_recursion()?;
        let result = self.parse_list_comp_element_inner();
        self.leave_recursion();
        result
    }

    fn parse_list_comp_element_inner(&mut self) -> ParseResult<ListCompElement> {
        match self.peek() {
            Some(Token::For) => {
                let start = self.advance().unwrap().1;
                let position = self.position(start);
                self.expect(&Token::LParen)?;
                let assignments = self.parse_assignments()?;

                // C-style: `for (init; cond; update)`
                if self.eat(&Token::Semicolon).is_some() {
                    let condition = self.parse_expr()?;
                    self.expect(&Token::Semicolon)?;
                    let update = self.parse_assignments()?;
                    self.expect(&Token::RParen)?;
                    let body = self.parse_lc_body()?;
                    return Ok(ListCompElement::new(
                        ListCompElementKind::CFor {
                            init: assignments,
                            condition,
                            update,
                            body: Box::new(body),
                        },
                        position,
                    ));
                }

                self.expect(&Token::RParen)?;
                let body = self.parse_lc_body()?;
                Ok(ListCompElement::new(
                    ListCompElementKind::For {
                        assignments,
                        body: Box::new(body),
                    },
                    position,
                ))
            }
            Some(Token::Let) => {
                let start = self.advance().unwrap().1;
                let position = self.position(start);
                self.expect(&Token::LParen)?;
                let assignments = self.parse_assignments()?;
                self.expect(&Token::RParen)?;
                let body = self.parse_lc_body()?;
                Ok(ListCompElement::new(
                    ListCompElementKind::Let {
                        assignments,
                        body: Box::new(body),
                    },
                    position,
                ))
            }
            Some(Token::If) => {
                let start = self.advance().unwrap().1;
                let position = self.position(start);
                self.expect(&Token::LParen)?;
                let condition = self.parse_expr()?;
                self.expect(&Token::RParen)?;
                let then_body = self.parse_lc_body()?;
                if self.eat(&Token::Else).is_some() {
                    let else_body = self.parse_lc_body()?;
                    Ok(ListCompElement::new(
                        ListCompElementKind::IfElse {
                            condition,
                            then_body: Box::new(then_body),
                            else_body: Box::new(else_body),
                        },
                        position,
                    ))
                } else {
                    Ok(ListCompElement::new(
                        ListCompElementKind::If {
                            condition,
                            body: Box::new(then_body),
                        },
                        position,
                    ))
                }
            }
            Some(Token::Each) => {
                let start = self.advance().unwrap().1;
                let position = self.position(start);
                let body = self.parse_lc_body()?;
                Ok(ListCompElement::new(
                    ListCompElementKind::Each {
                        body: Box::new(body),
                    },
                    position,
                ))
            }
            _ => {
                let expr = self.parse_expr()?;
                let position = expr.position.clone();
                Ok(ListCompElement::new(
                    ListCompElementKind::Expr { expr },
                    position,
                ))
            }
        }
    }

    /// Body of a comprehension fragment: another fragment, a parenthesized
    /// fragment, or a plain expression.
    fn parse_lc_body(&mut self) -> ParseResult<ListCompElement> {
        if self.is_fragment_start() {
            self.parse_list_comp_element()
        } else if self.peek() == Some(&Token::LParen)
            && matches!(
                self.peek_at(1),
                Some(Token::For | Token::Let | Token::If | Token::Each)
            )
        {
            // Parenthesized fragment: ( for(...) ... )
            self.advance();
            let inner = self.parse_list_comp_element()?;
            self.expect(&Token::RParen)?;
            Ok(inner)
        } else {
            let expr = self.parse_expr()?;
            let position = expr.position.clone();
            Ok(ListCompElement::new(
                ListCompElementKind::Expr { expr },
                position,
            ))
        }
    }
}
