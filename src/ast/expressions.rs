use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use crate::ast::{AssignOp, BinOp, FunctionDecl, Span, UnaryOp};
use crate::value::Value;

/// Abstract Syntax Tree node representing a parsed expression.
///
/// Nodes are immutable once built; a parsed script can be evaluated any number
/// of times, from any number of threads.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    // Literals
    /// Literal floating point number
    ///
    /// # Example
    /// ```text
    /// 2.5
    /// ```
    Float(f64),

    /// Literal integer
    Integer(i64),

    /// String literal
    String(String),

    /// Boolean literal
    Boolean(bool),

    /// Null literal
    Null,

    /// Date literal
    ///
    /// # Example
    /// ```text
    /// #2024-03-01#
    /// ```
    Date(NaiveDate),

    /// Time literal
    ///
    /// # Example
    /// ```text
    /// #14:30#
    /// ```
    Time(NaiveTime),

    /// Host-registered word, resolved to its value at lex time
    Word { name: String, value: Value },

    /// Interpolated string
    ///
    /// # Example
    /// ```text
    /// "Table ${table} owes ${total}"
    /// ```
    Interpolated(Vec<InterpolationPart>),

    // References
    /// Variable, function or accessor name
    Identifier { name: String, span: Span },

    // Access
    /// Member access
    ///
    /// # Examples
    /// ```text
    /// Order.Quantity
    /// ticket.Items
    /// ```
    Member { object: Box<Expr>, name: String },

    /// Index access
    ///
    /// # Examples
    /// ```text
    /// items[0]
    /// prices["coffee"]
    /// ```
    Index { object: Box<Expr>, index: Box<Expr> },

    // Operations
    /// Prefix operation (`-x`, `!x`)
    Unary { op: UnaryOp, operand: Box<Expr> },

    /// Binary operation (arithmetic, comparison, logical)
    BinaryOp {
        op: BinOp,
        left: Box<Expr>,
        right: Box<Expr>,
    },

    /// Assignment to a variable, member or index path
    ///
    /// # Examples
    /// ```text
    /// total = 0
    /// Order.Price *= 1.1
    /// counts[name] += 1
    /// ```
    Assign {
        target: Box<Expr>,
        op: AssignOp,
        value: Box<Expr>,
    },

    /// `++`/`--`, prefix or postfix
    Step {
        target: Box<Expr>,
        delta: i64,
        prefix: bool,
    },

    /// Function call
    ///
    /// # Examples
    /// ```text
    /// Round(total, 2)
    /// Round(value: total, digits: 2)
    /// ```
    Call {
        callee: Box<Expr>,
        args: Vec<CallArg>,
        span: Span,
    },

    /// Suffix call: a number followed by a suffixable function name
    ///
    /// # Example
    /// ```text
    /// 30 minutes
    /// ```
    Suffix {
        value: Box<Expr>,
        function: String,
        span: Span,
    },

    /// Method call
    ///
    /// # Examples
    /// ```text
    /// items.count()
    /// name.upper()
    /// ```
    MethodCall {
        object: Box<Expr>,
        method: String,
        args: Vec<CallArg>,
    },

    /// Host type construction
    ///
    /// # Example
    /// ```text
    /// new Discount(10, "percent")
    /// ```
    New {
        type_name: String,
        args: Vec<CallArg>,
        span: Span,
    },

    /// Anonymous function capturing the enclosing scope
    ///
    /// # Example
    /// ```text
    /// function(x) { return x * 2; }
    /// ```
    Lambda(Arc<FunctionDecl>),

    // Collection literals
    /// Array literal
    ///
    /// # Example
    /// ```text
    /// [1, 2, Order.Quantity]
    /// ```
    Array(Vec<Expr>),

    /// Map literal
    ///
    /// # Example
    /// ```text
    /// { name: "Coffee", price: 2.5 }
    /// ```
    Map(Vec<(String, Expr)>),
}

/// An actual argument at a call site, optionally named (`digits: 2`).
#[derive(Debug, Clone, PartialEq)]
pub struct CallArg {
    pub name: Option<String>,
    pub value: Expr,
}

impl CallArg {
    pub fn positional(value: Expr) -> Self {
        CallArg { name: None, value }
    }
}

/// One piece of an interpolated string.
#[derive(Debug, Clone, PartialEq)]
pub enum InterpolationPart {
    Text(String),
    Expr(Expr),
}

impl Expr {
    /// Whether the expression can appear on the left of `=`.
    pub fn is_assignable(&self) -> bool {
        matches!(
            self,
            Expr::Identifier { .. } | Expr::Member { .. } | Expr::Index { .. }
        )
    }
}
