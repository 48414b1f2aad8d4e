use serde::Deserialize;

use crate::{evaluator::DEFAULT_MAX_CALL_DEPTH, parser::DEFAULT_MAX_NESTING_DEPTH};

/// Template delimiter: `[=expression]`.
pub const DEFAULT_TEMPLATE_PATTERN: &str = r"\[=([^\]]+)\]";

pub const DEFAULT_CACHE_CAPACITY: usize = 1024;

/// Engine settings. Every field has a default, so a partial JSON document
/// such as `{"max_call_depth": 32}` is a valid configuration.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Keep comments as `Comment` tokens when lexing
    pub retain_comments: bool,
    /// Nested script function calls allowed before a stack overflow error
    pub max_call_depth: usize,
    /// Nested brackets, operators and blocks allowed before a syntax error
    pub max_nesting_depth: usize,
    /// Reuse parsed programs for identical source text
    pub cache_scripts: bool,
    /// Parsed programs kept before the cache is emptied
    pub cache_capacity: usize,
    /// Regex for `replace_expression_values`; capture group 1 is the expression
    pub template_pattern: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            retain_comments: false,
            max_call_depth: DEFAULT_MAX_CALL_DEPTH,
            max_nesting_depth: DEFAULT_MAX_NESTING_DEPTH,
            cache_scripts: true,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            template_pattern: DEFAULT_TEMPLATE_PATTERN.to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }
}
