//! tillscript: an embeddable formula and automation-rule language for
//! point-of-sale hosts.
//!
//! Hosts register functions, types and words on an [`Engine`], then evaluate
//! expressions against order data, run statement scripts, or render text
//! templates.

pub mod ast;
pub mod builtins;
pub mod cli;
pub mod config;
pub mod engine;
pub mod error;
pub mod evaluator;
pub mod lexer;
pub mod memory;
pub mod methods;
pub mod output;
pub mod parser;
pub mod path;
pub mod plugins;
pub mod registry;
pub mod value;

pub use ast::{BinOp, Expr, Program, Span, Stmt, Token, TokenType};
pub use config::EngineConfig;
pub use engine::{Engine, EvalResult};
pub use error::{BindError, HostError, LexError, RuntimeError, ScriptError, ScriptResult, SyntaxError};
pub use evaluator::{Flow, Interpreter};
pub use lexer::{LexMode, Lexer};
pub use memory::Memory;
pub use output::{to_json, to_json_pretty};
pub use parser::Parser;
pub use registry::{Arg, ArgType, FunctionMetaData, NativeType};
pub use value::{FromValue, Instance, Value};
