//! # Tillscript - Abstract Syntax Tree
//!
//! This module defines the tokens and syntax tree of the tillscript formula
//! language: the small scripting language a point-of-sale host uses for ticket
//! templates, conditional pricing and automation-rule predicates.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Token kinds and types produced by the lexer
//! - **[expressions]** - Expression nodes (literals, access, calls, operators)
//! - **[operators]** - Binary, unary and assignment operators with binding powers
//! - **[statements]** - Statement nodes and the top-level [`Program`]
//! - **[function]** - Script function declarations and lambdas
//!
//! ## Quick Start
//!
//! ```text
//! var total = 0;
//! for (item in Ticket.Items) {
//!     if (item.Gift) continue;
//!     total += item.Quantity * item.Price;
//! }
//! result = Round(total, 2);
//! ```
//!
//! ## Core Concepts
//!
//! ### Expressions and statements
//!
//! A host usually evaluates a single expression (`Order.Quantity * Order.Price`);
//! rule scripts are statement sequences. Both parse into the same tree.
//!
//! ### Scoping
//!
//! Blocks, loop bodies and function calls get their own scope frame. Assigning
//! to a name that no frame declares creates it in the innermost frame.
//!
//! ### Host names
//!
//! Identifiers may resolve to host accessors, registered functions, registered
//! types (`new Type(...)`) or registered words; none of these are known to the
//! tree itself.
pub mod expressions;
pub mod function;
pub mod operators;
pub mod statements;
pub mod tokens;

pub use expressions::{CallArg, Expr, InterpolationPart};
pub use function::{FunctionDecl, Param};
pub use operators::{ASSIGNMENT_PRECEDENCE, AssignOp, BinOp, UNARY_PRECEDENCE, UnaryOp};
pub use statements::{Program, Stmt};
pub use tokens::{Fragment, Span, Token, TokenKind, TokenType};
