use std::sync::Arc;

use crate::ast::{Expr, FunctionDecl};

/// Statement node.
///
/// Control-flow statements own their bodies; the evaluator pushes a fresh
/// scope frame for every body it runs.
#[derive(Debug, Clone, PartialEq)]
pub enum Stmt {
    /// Expression evaluated for its value or side effects
    Expr(Expr),

    /// Variable declaration in the current scope
    ///
    /// # Example
    /// ```text
    /// var total = 0, count;
    /// ```
    Var(Vec<(String, Option<Expr>)>),

    /// Conditional
    ///
    /// # Examples
    /// ```text
    /// if (total > 100) { discount = 10; } else { discount = 0; }
    /// if total > 100 then discount = 10
    /// ```
    If {
        condition: Expr,
        then_branch: Box<Stmt>,
        else_branch: Option<Box<Stmt>>,
    },

    /// Pre-tested loop
    While { condition: Expr, body: Box<Stmt> },

    /// Counting loop
    ///
    /// # Example
    /// ```text
    /// for (var i = 0; i < 3; i++) { ... }
    /// ```
    For {
        init: Option<Box<Stmt>>,
        condition: Option<Expr>,
        step: Option<Expr>,
        body: Box<Stmt>,
    },

    /// Iteration over an array, a map's keys or a string's characters
    ///
    /// # Example
    /// ```text
    /// for (item in Ticket.Items) { ... }
    /// ```
    ForEach {
        variable: String,
        iterable: Expr,
        body: Box<Stmt>,
    },

    /// Named function declaration
    Function(Arc<FunctionDecl>),

    Return(Option<Expr>),
    Break,
    Continue,

    /// Raise a script-level exception; the parser rejects a missing operand
    Throw(Option<Expr>),

    /// Exception handler
    ///
    /// # Example
    /// ```text
    /// try { risky(); } catch (e) { log(e); }
    /// ```
    Try {
        body: Vec<Stmt>,
        catch_variable: Option<String>,
        handler: Vec<Stmt>,
    },

    /// Call a function by name, parentheses optional
    ///
    /// # Example
    /// ```text
    /// run applyDiscounts
    /// ```
    Run(Expr),

    /// Braced block with its own scope
    Block(Vec<Stmt>),

    /// Stray `;`
    Empty,
}

/// A parsed script: the top-level statement sequence.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Program {
    pub statements: Vec<Stmt>,
}
