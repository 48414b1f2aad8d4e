//! Error types for lexing, parsing, binding and running scripts.
//!
//! Only [`RuntimeError`] and [`HostError`] can be intercepted by a script's
//! `try`/`catch`; the other kinds abort the whole call.

use thiserror::Error;

use crate::ast::Span;
use crate::value::Value;

/// Unrecognised input, reported when the parser reaches an `Unknown` token.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LexError {
    #[error("unexpected character '{text}' at {span}")]
    UnexpectedCharacter { text: String, span: Span },

    #[error("unterminated string starting at {span}")]
    UnterminatedString { span: Span },

    #[error("invalid {kind} literal '{text}' at {span}")]
    InvalidLiteral {
        kind: &'static str,
        text: String,
        span: Span,
    },
}

/// The token sequence does not form a valid statement or expression.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SyntaxError {
    #[error("expected {expected}, found '{found}' at {span}")]
    Expected {
        expected: String,
        found: String,
        span: Span,
    },

    #[error("unexpected '{found}' at {span}")]
    Unexpected { found: String, span: Span },

    #[error("'{keyword}' outside of a loop at {span}")]
    OutsideLoop { keyword: &'static str, span: Span },

    #[error("'throw' requires a value at {span}")]
    MissingThrowValue { span: Span },

    #[error("invalid assignment target at {span}")]
    InvalidTarget { span: Span },

    #[error("nesting deeper than {limit} levels at {span}")]
    TooDeep { limit: usize, span: Span },

    #[error("duplicate parameter '{name}' in function '{function}'")]
    DuplicateParameter { function: String, name: String },
}

/// A name could not be resolved or a call's arguments do not fit its signature.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BindError {
    #[error("unknown identifier '{name}'")]
    UnknownIdentifier { name: String },

    #[error("unknown function '{name}'")]
    UnknownFunction { name: String },

    #[error("unknown type '{name}'")]
    UnknownType { name: String },

    #[error("function '{function}' has no argument named '{name}'")]
    UnknownArgument { function: String, name: String },

    #[error("function '{function}' is missing required argument '{name}'")]
    MissingArgument { function: String, name: String },

    #[error("argument '{name}' of '{function}' given more than once")]
    DuplicateArgument { function: String, name: String },

    #[error("function '{function}' takes at most {max} arguments, got {given}")]
    TooManyArguments {
        function: String,
        max: usize,
        given: usize,
    },

    #[error("positional argument after named arguments in call to '{function}'")]
    PositionalAfterNamed { function: String },

    #[error("function '{function}' cannot be used as a suffix")]
    NotSuffixable { function: String },

    #[error("invalid metadata for function '{function}': {message}")]
    InvalidMetadata { function: String, message: String },
}

/// Failure while evaluating a well-formed script.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("type error: {0}")]
    Type(String),

    #[error("division by zero")]
    DivisionByZero,

    #[error("cannot convert {value} to {target}")]
    Coercion { value: String, target: &'static str },

    #[error("'{name}' is not callable")]
    NotCallable { name: String },

    #[error("unknown member '{member}' on {type_name}")]
    UnknownMember { type_name: String, member: String },

    #[error("index {index} out of bounds for length {length}")]
    IndexOutOfBounds { index: i64, length: usize },

    #[error("maximum call depth of {limit} exceeded")]
    StackOverflow { limit: usize },

    #[error("uncaught exception: {}", .0.as_string())]
    Thrown(Value),
}

/// Error raised by a host-registered function, constructor, property or method.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("{source_name}: {message}")]
pub struct HostError {
    pub source_name: String,
    pub message: String,
}

impl HostError {
    pub fn new(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        HostError {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

/// Any error the engine can report.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScriptError {
    #[error("lex error: {0}")]
    Lex(#[from] LexError),

    #[error("syntax error: {0}")]
    Syntax(#[from] SyntaxError),

    #[error("bind error: {0}")]
    Bind(#[from] BindError),

    #[error("runtime error: {0}")]
    Runtime(#[from] RuntimeError),

    #[error("host error: {0}")]
    Host(#[from] HostError),
}

impl ScriptError {
    /// Whether a script `catch` block may intercept this error.
    pub fn is_catchable(&self) -> bool {
        matches!(self, ScriptError::Runtime(_) | ScriptError::Host(_))
    }

    /// The value bound to a `catch (e)` variable: the thrown value itself,
    /// or the message of an engine error.
    pub fn into_thrown_value(self) -> Value {
        match self {
            ScriptError::Runtime(RuntimeError::Thrown(value)) => value,
            ScriptError::Runtime(e) => Value::String(e.to_string()),
            ScriptError::Host(e) => Value::String(e.to_string()),
            other => Value::String(other.to_string()),
        }
    }
}

/// Result type alias
pub type ScriptResult<T> = Result<T, ScriptError>;
