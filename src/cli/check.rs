//! Run tillscript commands against an engine

use std::path::Path;

use super::CliError;
use crate::{Engine, EvalResult, Value};

/// Options shared by the evaluating commands
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// Expression, script or template text
    pub source: String,
    /// JSON data whose fields become globals
    pub data: Option<String>,
    /// Pretty-print JSON output
    pub pretty: bool,
}

/// What a command produced
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutput {
    /// Syntax validation passed
    SyntaxValid,
    /// A computed value
    Value(Value),
    /// Rendered text
    Text(String),
    /// The script ran but assigned no `result`
    Nothing,
}

impl CommandOutput {
    pub fn render(&self, pretty: bool) -> String {
        match self {
            CommandOutput::SyntaxValid => "Syntax is valid".to_string(),
            CommandOutput::Value(value) if pretty => crate::to_json_pretty(value),
            CommandOutput::Value(value) => crate::to_json(value),
            CommandOutput::Text(text) => text.clone(),
            CommandOutput::Nothing => String::new(),
        }
    }
}

fn parse_data(data: Option<&str>) -> Result<Option<Value>, CliError> {
    data.map(|text| {
        let json: serde_json::Value = serde_json::from_str(text)?;
        Ok(Value::from(json))
    })
    .transpose()
}

fn into_output(result: EvalResult) -> Result<Value, CliError> {
    if result.success {
        Ok(result.value)
    } else {
        Err(CliError::Eval(result.error_message.unwrap_or_default()))
    }
}

/// Evaluate a single expression with optional JSON data.
pub fn eval_expression(engine: &Engine, options: &CheckOptions) -> Result<CommandOutput, CliError> {
    let data = parse_data(options.data.as_deref())?;
    let value = into_output(engine.evaluate(&options.source, data.as_ref()))?;
    Ok(CommandOutput::Value(value))
}

/// Execute statements; `source` is a script or the path of a script file.
///
/// Prints the script's `result` variable when it assigns one.
pub fn run_script(engine: &mut Engine, options: &CheckOptions) -> Result<CommandOutput, CliError> {
    let path = Path::new(&options.source);
    let script = if path.is_file() {
        std::fs::read_to_string(path)?
    } else {
        options.source.clone()
    };

    if let Some(data) = parse_data(options.data.as_deref())? {
        if let Value::Object(fields) = data {
            for (name, value) in fields {
                engine.memory_mut().set_global(&name, value);
            }
        } else {
            engine.memory_mut().set_global("data", data);
        }
    }

    into_output(engine.execute(&script))?;
    Ok(match engine.memory().get("result") {
        Some(value) => CommandOutput::Value(value.clone()),
        None => CommandOutput::Nothing,
    })
}

/// Render `[=expression]` placeholders (or a custom pattern) in a template.
pub fn render_template(
    engine: &Engine,
    options: &CheckOptions,
    pattern: Option<&str>,
) -> Result<CommandOutput, CliError> {
    let data = parse_data(options.data.as_deref())?;
    Ok(CommandOutput::Text(engine.replace_expression_values_with(
        &options.source,
        pattern,
        data.as_ref(),
    )))
}

/// Parse without executing.
pub fn check_syntax(engine: &Engine, source: &str) -> Result<CommandOutput, CliError> {
    engine.parse(source)?;
    Ok(CommandOutput::SyntaxValid)
}
