use crate::{
    ast::{
        ASSIGNMENT_PRECEDENCE, AssignOp, BinOp, CallArg, Expr, Fragment, InterpolationPart,
        Program, Span, Stmt, Token, TokenType, UNARY_PRECEDENCE, UnaryOp,
    },
    error::{LexError, ScriptError, ScriptResult, SyntaxError},
    plugins::{self, Context, Node},
    value::Value,
};

/// Expression and block nesting allowed before parsing fails.
pub const DEFAULT_MAX_NESTING_DEPTH: usize = 128;

/// Precedence-climbing parser over a token stream.
///
/// Keyword-led forms (`if`, `for`, `function`, `new`, ...) are delegated to the
/// plugin table in [`crate::plugins`]; everything else is parsed here. The
/// first syntax error aborts the parse.
pub struct Parser {
    tokens: Vec<Token>,
    position: usize,
    previous_line: usize,
    loop_depth: usize,
    nesting: usize,
    max_nesting: usize,
}

impl Parser {
    /// Comments are dropped; a missing trailing `Eof` is added.
    pub fn new(tokens: Vec<Token>) -> Self {
        let mut tokens: Vec<Token> = tokens
            .into_iter()
            .filter(|t| !t.is(TokenType::Comment))
            .collect();
        if !tokens.last().is_some_and(|t| t.is(TokenType::Eof)) {
            let span = tokens.last().map(|t| t.span).unwrap_or_default();
            tokens.push(Token::new(TokenType::Eof, "", span));
        }
        Parser {
            tokens,
            position: 0,
            previous_line: 1,
            loop_depth: 0,
            nesting: 0,
            max_nesting: DEFAULT_MAX_NESTING_DEPTH,
        }
    }

    pub fn with_max_nesting(mut self, limit: usize) -> Self {
        self.max_nesting = limit;
        self
    }

    pub(crate) fn current(&self) -> &Token {
        self.peek(0)
    }

    /// Token `offset` positions ahead; the final `Eof` repeats past the end.
    pub(crate) fn peek(&self, offset: usize) -> &Token {
        let index = (self.position + offset).min(self.tokens.len() - 1);
        &self.tokens[index]
    }

    pub(crate) fn advance(&mut self) -> Token {
        let token = self.current().clone();
        self.previous_line = token.span.line;
        if self.position < self.tokens.len() - 1 {
            self.position += 1;
        }
        token
    }

    pub(crate) fn check(&self, ty: TokenType) -> bool {
        self.current().is(ty)
    }

    /// Consume the current token if it has type `ty`.
    pub(crate) fn eat(&mut self, ty: TokenType) -> bool {
        if self.check(ty) {
            self.advance();
            true
        } else {
            false
        }
    }

    pub(crate) fn expect(&mut self, ty: TokenType) -> ScriptResult<Token> {
        if self.check(ty) {
            Ok(self.advance())
        } else {
            Err(self.expected(ty.describe()))
        }
    }

    pub(crate) fn expect_identifier(&mut self) -> ScriptResult<String> {
        if self.check(TokenType::Identifier) {
            Ok(self.advance().text)
        } else {
            Err(self.expected("identifier"))
        }
    }

    /// Error describing what was expected at the current token.
    pub(crate) fn expected(&self, what: &str) -> ScriptError {
        let token = self.current();
        if token.is(TokenType::Unknown) {
            return lex_error(token);
        }
        SyntaxError::Expected {
            expected: what.to_string(),
            found: found_text(token),
            span: token.span,
        }
        .into()
    }

    pub(crate) fn unexpected(&self) -> ScriptError {
        let token = self.current();
        if token.is(TokenType::Unknown) {
            return lex_error(token);
        }
        SyntaxError::Unexpected {
            found: found_text(token),
            span: token.span,
        }
        .into()
    }

    /// Whether the current token may end a statement: `;`, `}`, `else`, end
    /// of input, or a token on a later line than the previous one.
    pub(crate) fn at_terminator(&self) -> bool {
        matches!(
            self.current().ty,
            TokenType::Semicolon | TokenType::RBrace | TokenType::Else | TokenType::Eof
        ) || self.current().span.line > self.previous_line
    }

    pub(crate) fn expect_terminator(&mut self) -> ScriptResult<()> {
        if self.eat(TokenType::Semicolon) || self.at_terminator() {
            Ok(())
        } else {
            Err(self.expected(";"))
        }
    }

    /// A line break before `(`, `[` or `++` ends the statement instead of
    /// continuing it.
    fn on_same_line(&self) -> bool {
        self.current().span.line == self.previous_line
    }

    /// Run `body` one nesting level deeper. Levels taken with `descend`
    /// inside `body` are given back when it returns.
    fn nested<T>(&mut self, body: impl FnOnce(&mut Self) -> ScriptResult<T>) -> ScriptResult<T> {
        let entry = self.nesting;
        let result = self.descend().and_then(|()| body(self));
        self.nesting = entry;
        result
    }

    fn descend(&mut self) -> ScriptResult<()> {
        self.nesting += 1;
        if self.nesting > self.max_nesting {
            return Err(SyntaxError::TooDeep {
                limit: self.max_nesting,
                span: self.current().span,
            }
            .into());
        }
        Ok(())
    }

    pub(crate) fn loop_depth(&self) -> usize {
        self.loop_depth
    }

    /// Parse `body` with `break`/`continue` allowed.
    pub(crate) fn in_loop<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> ScriptResult<T>,
    ) -> ScriptResult<T> {
        self.loop_depth += 1;
        let result = body(self);
        self.loop_depth -= 1;
        result
    }

    /// Parse a function body: loops outside it do not enclose it.
    pub(crate) fn in_function<T>(
        &mut self,
        body: impl FnOnce(&mut Self) -> ScriptResult<T>,
    ) -> ScriptResult<T> {
        let saved_loops = std::mem::replace(&mut self.loop_depth, 0);
        let result = body(self);
        self.loop_depth = saved_loops;
        result
    }

    /// Parse a complete script
    pub fn parse_program(&mut self) -> ScriptResult<Program> {
        let mut statements = Vec::new();
        while !self.check(TokenType::Eof) {
            statements.push(self.parse_statement()?);
        }
        Ok(Program { statements })
    }

    /// Parse a single expression spanning the whole input
    pub fn parse(&mut self) -> ScriptResult<Expr> {
        let expr = self.parse_expression()?;
        self.eat(TokenType::Semicolon);
        if !self.check(TokenType::Eof) {
            return Err(self.expected("end of input"));
        }
        Ok(expr)
    }

    pub fn parse_statement(&mut self) -> ScriptResult<Stmt> {
        self.nested(Self::parse_statement_inner)
    }

    fn parse_statement_inner(&mut self) -> ScriptResult<Stmt> {
        match self.current().ty {
            TokenType::Semicolon => {
                self.advance();
                return Ok(Stmt::Empty);
            }
            TokenType::LBrace => return Ok(Stmt::Block(self.parse_block()?)),
            _ => {}
        }

        if let Some(node) = self.parse_with_plugin(Context::Statement)? {
            return match node {
                Node::Stmt(stmt) => Ok(stmt),
                Node::Expr(expr) => Ok(Stmt::Expr(expr)),
            };
        }

        let expr = self.parse_expression()?;
        self.expect_terminator()?;
        Ok(Stmt::Expr(expr))
    }

    /// Dispatch to the plugin registered for the current token, if any.
    fn parse_with_plugin(&mut self, context: Context) -> ScriptResult<Option<Node>> {
        let Some(plugin) = plugins::find(self, context) else {
            return Ok(None);
        };
        let span = self.current().span;
        let node = (plugin.parse)(self)?;
        (plugin.on_parse_complete)(self, &node, span)?;
        if plugin.requires_terminator {
            self.expect_terminator()?;
        }
        Ok(Some(node))
    }

    /// `{ statement* }`
    pub(crate) fn parse_block(&mut self) -> ScriptResult<Vec<Stmt>> {
        self.expect(TokenType::LBrace)?;
        let mut statements = Vec::new();
        while !self.check(TokenType::RBrace) {
            if self.check(TokenType::Eof) {
                return Err(self.expected("}"));
            }
            statements.push(self.parse_statement()?);
        }
        self.advance();
        Ok(statements)
    }

    /// A braced block or a single statement.
    pub(crate) fn parse_body(&mut self) -> ScriptResult<Stmt> {
        if self.check(TokenType::LBrace) {
            Ok(Stmt::Block(self.parse_block()?))
        } else {
            self.parse_statement()
        }
    }

    pub fn parse_expression(&mut self) -> ScriptResult<Expr> {
        self.parse_binary(ASSIGNMENT_PRECEDENCE)
    }

    /// Precedence climbing: keep folding operators whose binding power is at
    /// least `min_precedence`. Every fold deepens the tree, so it counts
    /// against the nesting limit too.
    fn parse_binary(&mut self, min_precedence: u8) -> ScriptResult<Expr> {
        self.nested(|this| this.parse_binary_chain(min_precedence))
    }

    fn parse_binary_chain(&mut self, min_precedence: u8) -> ScriptResult<Expr> {
        let mut left = self.parse_unary()?;

        loop {
            let ty = self.current().ty;

            if let Some(op) = AssignOp::from_token(ty) {
                if min_precedence > ASSIGNMENT_PRECEDENCE {
                    break;
                }
                if !left.is_assignable() {
                    return Err(SyntaxError::InvalidTarget {
                        span: self.current().span,
                    }
                    .into());
                }
                self.advance();
                self.descend()?;
                // Right-associative
                let value = self.parse_binary(ASSIGNMENT_PRECEDENCE)?;
                left = Expr::Assign {
                    target: Box::new(left),
                    op,
                    value: Box::new(value),
                };
                continue;
            }

            let Some(op) = BinOp::from_token(ty) else {
                break;
            };
            let precedence = op.precedence();
            if precedence < min_precedence {
                break;
            }
            self.advance();
            self.descend()?;
            let right = self.parse_binary(precedence + 1)?;
            left = Expr::BinaryOp {
                op,
                left: Box::new(left),
                right: Box::new(right),
            };
        }
        Ok(left)
    }

    fn parse_unary(&mut self) -> ScriptResult<Expr> {
        let op = match self.current().ty {
            TokenType::Not => UnaryOp::Not,
            TokenType::Minus => UnaryOp::Negate,
            TokenType::Increment | TokenType::Decrement => {
                let delta = if self.advance().is(TokenType::Increment) { 1 } else { -1 };
                let span = self.current().span;
                self.descend()?;
                let target = self.parse_unary()?;
                if !target.is_assignable() {
                    return Err(SyntaxError::InvalidTarget { span }.into());
                }
                return Ok(Expr::Step {
                    target: Box::new(target),
                    delta,
                    prefix: true,
                });
            }
            _ => return self.parse_postfix(),
        };
        self.advance();
        let operand = self.parse_binary(UNARY_PRECEDENCE)?;
        Ok(Expr::Unary {
            op,
            operand: Box::new(operand),
        })
    }

    /// Member access, indexing, calls and postfix `++`/`--`
    fn parse_postfix(&mut self) -> ScriptResult<Expr> {
        let mut expr = self.parse_primary()?;

        loop {
            if matches!(
                self.current().ty,
                TokenType::Dot
                    | TokenType::LBracket
                    | TokenType::LParen
                    | TokenType::Increment
                    | TokenType::Decrement
            ) {
                self.descend()?;
            }
            match self.current().ty {
                TokenType::Dot => {
                    self.advance();
                    let name = self.expect_identifier()?;
                    if self.check(TokenType::LParen) {
                        let args = self.parse_call_args()?;
                        expr = Expr::MethodCall {
                            object: Box::new(expr),
                            method: name,
                            args,
                        };
                    } else {
                        expr = Expr::Member {
                            object: Box::new(expr),
                            name,
                        };
                    }
                }
                TokenType::LBracket if self.on_same_line() => {
                    self.advance();
                    let index = self.parse_expression()?;
                    self.expect(TokenType::RBracket)?;
                    expr = Expr::Index {
                        object: Box::new(expr),
                        index: Box::new(index),
                    };
                }
                TokenType::LParen if self.on_same_line() => {
                    let span = self.current().span;
                    let args = self.parse_call_args()?;
                    expr = Expr::Call {
                        callee: Box::new(expr),
                        args,
                        span,
                    };
                }
                TokenType::Increment | TokenType::Decrement if self.on_same_line() => {
                    if !expr.is_assignable() {
                        return Err(SyntaxError::InvalidTarget {
                            span: self.current().span,
                        }
                        .into());
                    }
                    let delta = if self.advance().is(TokenType::Increment) { 1 } else { -1 };
                    expr = Expr::Step {
                        target: Box::new(expr),
                        delta,
                        prefix: false,
                    };
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    /// Parse primary expressions (atoms): literals, names, groups, collection
    /// literals and keyword-led expressions.
    fn parse_primary(&mut self) -> ScriptResult<Expr> {
        match self.current().ty {
            TokenType::LiteralNumber => {
                let token = self.advance();
                let value = match token.literal {
                    Some(Value::Float(n)) => Expr::Float(n),
                    Some(Value::Integer(n)) => Expr::Integer(n),
                    _ => return Err(lex_error(&token)),
                };
                self.parse_suffix(value)
            }
            TokenType::LiteralString => {
                let token = self.advance();
                match token.literal {
                    Some(Value::String(s)) => Ok(Expr::String(s)),
                    _ => Err(lex_error(&token)),
                }
            }
            TokenType::LiteralDate | TokenType::LiteralTime => {
                let token = self.advance();
                match token.literal {
                    Some(Value::Date(d)) => Ok(Expr::Date(d)),
                    Some(Value::Time(t)) => Ok(Expr::Time(t)),
                    _ => Err(lex_error(&token)),
                }
            }
            TokenType::True => {
                self.advance();
                Ok(Expr::Boolean(true))
            }
            TokenType::False => {
                self.advance();
                Ok(Expr::Boolean(false))
            }
            TokenType::Null => {
                self.advance();
                Ok(Expr::Null)
            }
            TokenType::Word => {
                let token = self.advance();
                Ok(Expr::Word {
                    name: token.text,
                    value: token.literal.unwrap_or_default(),
                })
            }
            TokenType::Interpolated => {
                let token = self.advance();
                self.parse_interpolation(token.fragments)
            }
            TokenType::Identifier => {
                let token = self.advance();
                Ok(Expr::Identifier {
                    name: token.text,
                    span: token.span,
                })
            }
            TokenType::LParen => {
                self.advance();
                let expr = self.parse_expression()?;
                self.expect(TokenType::RParen)?;
                Ok(expr)
            }
            TokenType::LBracket => {
                self.advance();
                self.parse_array_literal()
            }
            TokenType::LBrace => {
                self.advance();
                self.parse_map_literal()
            }
            _ => match self.parse_with_plugin(Context::Expression)? {
                Some(Node::Expr(expr)) => Ok(expr),
                _ => Err(self.unexpected()),
            },
        }
    }

    /// `30 minutes`: a number directly followed by a name on the same line.
    fn parse_suffix(&mut self, value: Expr) -> ScriptResult<Expr> {
        let token = self.current();
        if token.is(TokenType::Identifier) && self.on_same_line() {
            let token = self.advance();
            return Ok(Expr::Suffix {
                value: Box::new(value),
                function: token.text,
                span: token.span,
            });
        }
        Ok(value)
    }

    fn parse_interpolation(&mut self, fragments: Vec<Fragment>) -> ScriptResult<Expr> {
        let mut parts = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            match fragment {
                Fragment::Text(text) => parts.push(InterpolationPart::Text(text)),
                Fragment::Code(tokens) => {
                    let mut parser = Parser::new(tokens).with_max_nesting(self.max_nesting);
                    parser.nesting = self.nesting;
                    parts.push(InterpolationPart::Expr(parser.parse()?));
                }
            }
        }
        Ok(Expr::Interpolated(parts))
    }

    fn parse_array_literal(&mut self) -> ScriptResult<Expr> {
        let mut elements = vec![];

        while !self.check(TokenType::RBracket) {
            elements.push(self.parse_expression()?);

            if !self.check(TokenType::RBracket) {
                self.expect(TokenType::Comma)?;
            }
        }

        self.expect(TokenType::RBracket)?;
        Ok(Expr::Array(elements))
    }

    fn parse_map_literal(&mut self) -> ScriptResult<Expr> {
        let mut pairs = vec![];

        while !self.check(TokenType::RBrace) {
            let key = match self.current().ty {
                TokenType::LiteralString | TokenType::Identifier => {
                    let token = self.advance();
                    match token.literal {
                        Some(Value::String(s)) => s,
                        _ => token.text,
                    }
                }
                _ => return Err(self.expected("string or identifier as map key")),
            };

            self.expect(TokenType::Colon)?;

            let value = self.parse_expression()?;
            pairs.push((key, value));

            if !self.check(TokenType::RBrace) {
                self.expect(TokenType::Comma)?;
            }
        }

        self.expect(TokenType::RBrace)?;
        Ok(Expr::Map(pairs))
    }

    /// `( [name:] expr, ... )`
    pub(crate) fn parse_call_args(&mut self) -> ScriptResult<Vec<CallArg>> {
        self.expect(TokenType::LParen)?;
        let mut args = vec![];

        while !self.check(TokenType::RParen) {
            let name = if self.check(TokenType::Identifier) && self.peek(1).is(TokenType::Colon)
            {
                let name = self.advance().text;
                self.advance();
                Some(name)
            } else {
                None
            };
            let value = self.parse_expression()?;
            args.push(CallArg { name, value });

            if !self.check(TokenType::RParen) {
                self.expect(TokenType::Comma)?;
            }
        }

        self.expect(TokenType::RParen)?;
        Ok(args)
    }
}

fn found_text(token: &Token) -> String {
    if token.is(TokenType::Eof) {
        TokenType::Eof.describe().to_string()
    } else {
        token.text.clone()
    }
}

/// Classify an `Unknown` token into the lex error it stands for.
pub(crate) fn lex_error(token: &Token) -> ScriptError {
    let span: Span = token.span;
    let text = token.text.clone();
    let error = match text.chars().next() {
        Some('"') | Some('\'') => LexError::UnterminatedString { span },
        Some('#') => LexError::InvalidLiteral {
            kind: "date/time",
            text,
            span,
        },
        Some(c) if c.is_ascii_digit() => LexError::InvalidLiteral {
            kind: "number",
            text,
            span,
        },
        _ => LexError::UnexpectedCharacter { text, span },
    };
    error.into()
}
