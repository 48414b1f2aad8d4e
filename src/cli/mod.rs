//! CLI support for tillscript
//!
//! Provides programmatic access to the `till` commands so other tools can
//! embed them.

mod check;
mod docs;

pub use check::{CheckOptions, CommandOutput, check_syntax, eval_expression, render_template, run_script};
pub use docs::{DocCategory, get_doc_category, get_docs_overview, get_function_docs};

use std::io;

use thiserror::Error;

use crate::error::ScriptError;

/// Errors that can occur during CLI operations
#[derive(Error, Debug)]
pub enum CliError {
    /// Script failed to lex or parse
    #[error("{0}")]
    Script(#[from] ScriptError),

    /// Evaluation failed; carries the engine's message
    #[error("evaluation failed: {0}")]
    Eval(String),

    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("unknown function: '{0}'\nRun 'till functions' to list registered functions.")]
    UnknownFunction(String),

    #[error("unknown category: '{0}'\nRun 'till docs' to see available categories.")]
    UnknownCategory(String),
}
