//! Keyword-led syntax, one table entry per construct.
//!
//! The parser looks up the current token here before falling back to plain
//! expression parsing. Entries are matched on their trigger token, filtered by
//! context (statement plugins are only tried at the start of a statement,
//! expression plugins only in operand position) and by a lookahead predicate.
//! When several entries still match, the highest `precedence` wins.

use std::collections::HashSet;
use std::sync::Arc;

use crate::{
    ast::{CallArg, Expr, FunctionDecl, Param, Span, Stmt, TokenType},
    error::{ScriptResult, SyntaxError},
    parser::Parser,
};

/// Output of a plugin.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Stmt(Stmt),
    Expr(Expr),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Context {
    Statement,
    Expression,
}

/// A syntax extension triggered by a keyword.
pub struct Plugin {
    pub name: &'static str,
    pub trigger: TokenType,
    pub is_statement: bool,
    pub requires_terminator: bool,
    pub precedence: u8,
    /// Lookahead test run with the trigger as the current token
    pub accepts: fn(&Parser) -> bool,
    /// Parse the construct, starting at the trigger token
    pub parse: fn(&mut Parser) -> ScriptResult<Node>,
    /// Validation hook run on the finished node; receives the trigger's span
    pub on_parse_complete: fn(&Parser, &Node, Span) -> ScriptResult<()>,
}

impl std::fmt::Debug for Plugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Plugin")
            .field("name", &self.name)
            .field("trigger", &self.trigger)
            .field("is_statement", &self.is_statement)
            .finish()
    }
}

pub static PLUGINS: &[Plugin] = &[
    Plugin {
        name: "var",
        trigger: TokenType::Var,
        is_statement: true,
        requires_terminator: true,
        precedence: 1,
        accepts: always,
        parse: parse_var,
        on_parse_complete: no_check,
    },
    Plugin {
        name: "if",
        trigger: TokenType::If,
        is_statement: true,
        requires_terminator: false,
        precedence: 1,
        accepts: always,
        parse: parse_if,
        on_parse_complete: no_check,
    },
    Plugin {
        name: "while",
        trigger: TokenType::While,
        is_statement: true,
        requires_terminator: false,
        precedence: 1,
        accepts: always,
        parse: parse_while,
        on_parse_complete: no_check,
    },
    Plugin {
        name: "for",
        trigger: TokenType::For,
        is_statement: true,
        requires_terminator: false,
        precedence: 1,
        accepts: always,
        parse: parse_for,
        on_parse_complete: no_check,
    },
    Plugin {
        name: "for-in",
        trigger: TokenType::For,
        is_statement: true,
        requires_terminator: false,
        precedence: 2,
        accepts: is_for_in,
        parse: parse_for_in,
        on_parse_complete: no_check,
    },
    Plugin {
        name: "function",
        trigger: TokenType::Function,
        is_statement: true,
        requires_terminator: false,
        precedence: 2,
        accepts: is_named_function,
        parse: parse_function_declaration,
        on_parse_complete: check_parameters,
    },
    Plugin {
        name: "lambda",
        trigger: TokenType::Function,
        is_statement: false,
        requires_terminator: false,
        precedence: 1,
        accepts: always,
        parse: parse_lambda,
        on_parse_complete: check_parameters,
    },
    Plugin {
        name: "return",
        trigger: TokenType::Return,
        is_statement: true,
        requires_terminator: true,
        precedence: 1,
        accepts: always,
        parse: parse_return,
        on_parse_complete: no_check,
    },
    Plugin {
        name: "break",
        trigger: TokenType::Break,
        is_statement: true,
        requires_terminator: true,
        precedence: 1,
        accepts: always,
        parse: parse_break,
        on_parse_complete: check_inside_loop,
    },
    Plugin {
        name: "continue",
        trigger: TokenType::Continue,
        is_statement: true,
        requires_terminator: true,
        precedence: 1,
        accepts: always,
        parse: parse_continue,
        on_parse_complete: check_inside_loop,
    },
    Plugin {
        name: "throw",
        trigger: TokenType::Throw,
        is_statement: true,
        requires_terminator: true,
        precedence: 1,
        accepts: always,
        parse: parse_throw,
        on_parse_complete: check_throw_value,
    },
    Plugin {
        name: "try",
        trigger: TokenType::Try,
        is_statement: true,
        requires_terminator: false,
        precedence: 1,
        accepts: always,
        parse: parse_try,
        on_parse_complete: no_check,
    },
    Plugin {
        name: "run",
        trigger: TokenType::Run,
        is_statement: true,
        requires_terminator: true,
        precedence: 1,
        accepts: always,
        parse: parse_run,
        on_parse_complete: no_check,
    },
    Plugin {
        name: "new",
        trigger: TokenType::New,
        is_statement: false,
        requires_terminator: false,
        precedence: 1,
        accepts: always,
        parse: parse_new,
        on_parse_complete: no_check,
    },
];

/// Select the plugin for the parser's current token in `context`.
pub fn find(parser: &Parser, context: Context) -> Option<&'static Plugin> {
    let trigger = parser.current().ty;
    PLUGINS
        .iter()
        .filter(|p| p.trigger == trigger)
        .filter(|p| p.is_statement == (context == Context::Statement))
        .filter(|p| (p.accepts)(parser))
        .max_by_key(|p| p.precedence)
}

fn always(_: &Parser) -> bool {
    true
}

fn no_check(_: &Parser, _: &Node, _: Span) -> ScriptResult<()> {
    Ok(())
}

/// `for (x in ...)`, `for (var x in ...)` or `for x in ...`
fn is_for_in(parser: &Parser) -> bool {
    let at = |offset: usize, ty: TokenType| parser.peek(offset).is(ty);
    if at(1, TokenType::LParen) {
        (at(2, TokenType::Identifier) && at(3, TokenType::In))
            || (at(2, TokenType::Var) && at(3, TokenType::Identifier) && at(4, TokenType::In))
    } else {
        at(1, TokenType::Identifier) && at(2, TokenType::In)
    }
}

fn is_named_function(parser: &Parser) -> bool {
    parser.peek(1).is(TokenType::Identifier)
}

fn parse_var(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::Var)?;
    let mut declarations = Vec::new();
    loop {
        let name = parser.expect_identifier()?;
        let init = if parser.eat(TokenType::Assignment) {
            Some(parser.parse_expression()?)
        } else {
            None
        };
        declarations.push((name, init));
        if !parser.eat(TokenType::Comma) {
            break;
        }
    }
    Ok(Node::Stmt(Stmt::Var(declarations)))
}

fn parse_if(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::If)?;
    let condition = parser.parse_expression()?;
    parser.eat(TokenType::Then);
    let then_branch = Box::new(parser.parse_body()?);
    let else_branch = if parser.eat(TokenType::Else) {
        Some(Box::new(parser.parse_body()?))
    } else {
        None
    };
    Ok(Node::Stmt(Stmt::If {
        condition,
        then_branch,
        else_branch,
    }))
}

fn parse_while(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::While)?;
    let condition = parser.parse_expression()?;
    let body = Box::new(parser.in_loop(Parser::parse_body)?);
    Ok(Node::Stmt(Stmt::While { condition, body }))
}

/// `for ( [init] ; [condition] ; [step] ) body`
fn parse_for(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::For)?;
    parser.expect(TokenType::LParen)?;

    let init = if parser.check(TokenType::Semicolon) {
        None
    } else if parser.check(TokenType::Var) {
        match parse_var(parser)? {
            Node::Stmt(stmt) => Some(Box::new(stmt)),
            Node::Expr(expr) => Some(Box::new(Stmt::Expr(expr))),
        }
    } else {
        Some(Box::new(Stmt::Expr(parser.parse_expression()?)))
    };
    parser.expect(TokenType::Semicolon)?;

    let condition = if parser.check(TokenType::Semicolon) {
        None
    } else {
        Some(parser.parse_expression()?)
    };
    parser.expect(TokenType::Semicolon)?;

    let step = if parser.check(TokenType::RParen) {
        None
    } else {
        Some(parser.parse_expression()?)
    };
    parser.expect(TokenType::RParen)?;

    let body = Box::new(parser.in_loop(Parser::parse_body)?);
    Ok(Node::Stmt(Stmt::For {
        init,
        condition,
        step,
        body,
    }))
}

fn parse_for_in(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::For)?;
    let parenthesized = parser.eat(TokenType::LParen);
    parser.eat(TokenType::Var);
    let variable = parser.expect_identifier()?;
    parser.expect(TokenType::In)?;
    let iterable = parser.parse_expression()?;
    if parenthesized {
        parser.expect(TokenType::RParen)?;
    }
    let body = Box::new(parser.in_loop(Parser::parse_body)?);
    Ok(Node::Stmt(Stmt::ForEach {
        variable,
        iterable,
        body,
    }))
}

/// `( name [= default], ... ) { body }`
fn parse_function_rest(parser: &mut Parser, name: Option<String>) -> ScriptResult<FunctionDecl> {
    parser.expect(TokenType::LParen)?;
    let mut params = Vec::new();
    while !parser.check(TokenType::RParen) {
        let name = parser.expect_identifier()?;
        let default = if parser.eat(TokenType::Assignment) {
            Some(parser.parse_expression()?)
        } else {
            None
        };
        params.push(Param { name, default });
        if !parser.check(TokenType::RParen) {
            parser.expect(TokenType::Comma)?;
        }
    }
    parser.expect(TokenType::RParen)?;
    let body = parser.in_function(Parser::parse_block)?;
    Ok(FunctionDecl { name, params, body })
}

fn parse_function_declaration(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::Function)?;
    let name = parser.expect_identifier()?;
    let decl = parse_function_rest(parser, Some(name))?;
    Ok(Node::Stmt(Stmt::Function(Arc::new(decl))))
}

fn parse_lambda(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::Function)?;
    let decl = parse_function_rest(parser, None)?;
    Ok(Node::Expr(Expr::Lambda(Arc::new(decl))))
}

fn check_parameters(_: &Parser, node: &Node, _: Span) -> ScriptResult<()> {
    let decl = match node {
        Node::Stmt(Stmt::Function(decl)) | Node::Expr(Expr::Lambda(decl)) => decl,
        _ => return Ok(()),
    };
    let mut seen = HashSet::new();
    for param in &decl.params {
        if !seen.insert(param.name.as_str()) {
            return Err(SyntaxError::DuplicateParameter {
                function: decl.display_name().to_string(),
                name: param.name.clone(),
            }
            .into());
        }
    }
    Ok(())
}

fn parse_return(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::Return)?;
    let value = if parser.at_terminator() {
        None
    } else {
        Some(parser.parse_expression()?)
    };
    Ok(Node::Stmt(Stmt::Return(value)))
}

fn parse_break(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::Break)?;
    Ok(Node::Stmt(Stmt::Break))
}

fn parse_continue(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::Continue)?;
    Ok(Node::Stmt(Stmt::Continue))
}

fn check_inside_loop(parser: &Parser, node: &Node, span: Span) -> ScriptResult<()> {
    if parser.loop_depth() > 0 {
        return Ok(());
    }
    let keyword = match node {
        Node::Stmt(Stmt::Continue) => "continue",
        _ => "break",
    };
    Err(SyntaxError::OutsideLoop { keyword, span }.into())
}

fn parse_throw(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::Throw)?;
    let value = if parser.at_terminator() {
        None
    } else {
        Some(parser.parse_expression()?)
    };
    Ok(Node::Stmt(Stmt::Throw(value)))
}

fn check_throw_value(_: &Parser, node: &Node, span: Span) -> ScriptResult<()> {
    match node {
        Node::Stmt(Stmt::Throw(None)) => Err(SyntaxError::MissingThrowValue { span }.into()),
        _ => Ok(()),
    }
}

/// `try { ... } catch [(e)] { ... }`
fn parse_try(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::Try)?;
    let body = parser.parse_block()?;
    parser.expect(TokenType::Catch)?;
    let catch_variable = if parser.eat(TokenType::LParen) {
        let name = parser.expect_identifier()?;
        parser.expect(TokenType::RParen)?;
        Some(name)
    } else {
        None
    };
    let handler = parser.parse_block()?;
    Ok(Node::Stmt(Stmt::Try {
        body,
        catch_variable,
        handler,
    }))
}

/// `run name` or `run name(args)`
fn parse_run(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::Run)?;
    let span = parser.current().span;
    let name = parser.expect_identifier()?;
    let args = if parser.check(TokenType::LParen) {
        parser.parse_call_args()?
    } else {
        Vec::new()
    };
    Ok(Node::Stmt(Stmt::Run(Expr::Call {
        callee: Box::new(Expr::Identifier { name, span }),
        args,
        span,
    })))
}

/// `new Type(args)`, parentheses optional
fn parse_new(parser: &mut Parser) -> ScriptResult<Node> {
    parser.expect(TokenType::New)?;
    let span = parser.current().span;
    let type_name = parser.expect_identifier()?;
    let args: Vec<CallArg> = if parser.check(TokenType::LParen) {
        parser.parse_call_args()?
    } else {
        Vec::new()
    };
    Ok(Node::Expr(Expr::New {
        type_name,
        args,
        span,
    }))
}
