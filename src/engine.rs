use std::{collections::HashMap, sync::Arc};

use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::{Captures, Regex};
use tracing::{debug, warn};

use crate::{
    ast::{Program, Token},
    builtins::register_builtins,
    config::{DEFAULT_TEMPLATE_PATTERN, EngineConfig},
    error::{BindError, HostError, ScriptResult},
    evaluator::Interpreter,
    lexer::{LexMode, Lexer},
    memory::Memory,
    parser::Parser,
    registry::{FunctionMetaData, FunctionRegistry, NativeType, TypeRegistry, WordRegistry},
    value::{FromValue, Value},
};

static DEFAULT_TEMPLATE: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(DEFAULT_TEMPLATE_PATTERN).ok());

/// Outcome of a host-facing call. Failures never escape as errors: the
/// message is recorded and `value` is null.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EvalResult {
    pub success: bool,
    pub error_message: Option<String>,
    pub value: Value,
}

impl EvalResult {
    pub fn ok(value: Value) -> Self {
        EvalResult {
            success: true,
            error_message: None,
            value,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        EvalResult {
            success: false,
            error_message: Some(message.into()),
            value: Value::Null,
        }
    }
}

impl From<ScriptResult<Value>> for EvalResult {
    fn from(result: ScriptResult<Value>) -> Self {
        match result {
            Ok(value) => EvalResult::ok(value),
            Err(e) => EvalResult::failed(e.to_string()),
        }
    }
}

/// The scripting engine: registries, persistent global memory and a cache
/// of parsed scripts.
///
/// Registration takes `&mut self`; evaluation takes `&self` and may run from
/// several threads at once.
///
/// # Examples
///
/// ```
/// use std::collections::HashMap;
/// use tillscript::{Engine, Value};
///
/// let engine = Engine::new();
/// let order = Value::Object(HashMap::from([
///     ("Quantity".to_string(), Value::Integer(3)),
///     ("Price".to_string(), Value::Float(2.5)),
/// ]));
/// let data = Value::Object(HashMap::from([("Order".to_string(), order)]));
///
/// let result = engine.evaluate("Order.Quantity * Order.Price", Some(&data));
/// assert!(result.success);
/// assert_eq!(result.value, Value::Float(7.5));
/// ```
pub struct Engine {
    config: EngineConfig,
    functions: FunctionRegistry,
    types: TypeRegistry,
    words: WordRegistry,
    replacements: HashMap<String, String>,
    memory: Memory,
    cache: RwLock<HashMap<String, Arc<Program>>>,
    template: Option<Regex>,
}

impl Default for Engine {
    fn default() -> Self {
        Engine::new()
    }
}

impl Engine {
    pub fn new() -> Self {
        Engine::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let template = if config.template_pattern == DEFAULT_TEMPLATE_PATTERN {
            DEFAULT_TEMPLATE.clone()
        } else {
            match Regex::new(&config.template_pattern) {
                Ok(regex) => Some(regex),
                Err(e) => {
                    warn!(pattern = %config.template_pattern, error = %e, "invalid template pattern, using default");
                    DEFAULT_TEMPLATE.clone()
                }
            }
        };

        let mut functions = FunctionRegistry::default();
        if let Err(e) = register_builtins(&mut functions) {
            warn!(error = %e, "standard library registration failed");
        }

        Engine {
            config,
            functions,
            types: TypeRegistry::default(),
            words: WordRegistry::default(),
            replacements: HashMap::new(),
            memory: Memory::new(),
            cache: RwLock::new(HashMap::new()),
            template,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn functions(&self) -> &FunctionRegistry {
        &self.functions
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn memory_mut(&mut self) -> &mut Memory {
        &mut self.memory
    }

    fn invalidate_cache(&mut self) {
        self.cache.get_mut().clear();
    }

    /// Expose a native function to scripts. Lookup is case-insensitive by
    /// name or any alias.
    ///
    /// # Examples
    ///
    /// ```
    /// use tillscript::{Engine, Value};
    /// use tillscript::registry::{Arg, ArgType, FunctionMetaData};
    ///
    /// let mut engine = Engine::new();
    /// engine
    ///     .register_function(
    ///         FunctionMetaData::new("Tax")
    ///             .arg(Arg::required("amount", ArgType::Number))
    ///             .arg(Arg::optional("rate", ArgType::Number, 0.2).alias("r")),
    ///         |args| {
    ///             let amount = args[0].as_float().unwrap_or_default();
    ///             let rate = args[1].as_float().unwrap_or_default();
    ///             Ok(Value::Float(amount * rate))
    ///         },
    ///     )
    ///     .unwrap();
    ///
    /// assert_eq!(engine.evaluate("tax(10, r: 0.5)", None).value, Value::Float(5.0));
    /// ```
    pub fn register_function<F>(&mut self, meta: FunctionMetaData, callback: F) -> Result<(), BindError>
    where
        F: Fn(&[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        debug!(function = %meta.name, "registering function");
        self.functions.register(meta, callback)?;
        self.invalidate_cache();
        Ok(())
    }

    /// Expose a host type to `new`, under `alias` when given.
    pub fn register_type(&mut self, ty: NativeType, alias: Option<&str>) {
        debug!(type_name = ty.name(), alias, "registering type");
        self.types.register(ty, alias);
        self.invalidate_cache();
    }

    /// Make `word` lex as a constant with `value`.
    pub fn register_word(&mut self, word: &str, value: Value) {
        debug!(word, "registering word");
        self.words.register(word, value);
        self.invalidate_cache();
    }

    /// Make identifiers spelled `original` lex as `replacement`.
    pub fn lex_replace(&mut self, original: &str, replacement: &str) {
        debug!(original, replacement, "registering lexical replacement");
        self.replacements
            .insert(original.to_string(), replacement.to_string());
        self.invalidate_cache();
    }

    pub fn tokenize(&self, text: &str) -> Vec<Token> {
        let mode = if self.config.retain_comments {
            LexMode::RetainComments
        } else {
            LexMode::SkipComments
        };
        Lexer::new(text)
            .with_mode(mode)
            .with_words(&self.words)
            .with_replacements(&self.replacements)
            .tokenize()
    }

    /// Parse `text` as a script, reusing a cached parse of identical text.
    pub fn parse(&self, text: &str) -> ScriptResult<Arc<Program>> {
        if self.config.cache_scripts
            && let Some(program) = self.cache.read().get(text)
        {
            debug!("script cache hit");
            return Ok(program.clone());
        }

        let program = Arc::new(
            Parser::new(self.tokenize(text))
                .with_max_nesting(self.config.max_nesting_depth)
                .parse_program()?,
        );
        if self.config.cache_scripts {
            let mut cache = self.cache.write();
            if cache.len() >= self.config.cache_capacity {
                debug!(entries = cache.len(), "script cache full, clearing");
                cache.clear();
            }
            cache.insert(text.to_string(), program.clone());
        }
        Ok(program)
    }

    fn run(&self, program: &Program, memory: &mut Memory) -> ScriptResult<Value> {
        Interpreter::new(&self.functions, &self.types, memory)
            .with_max_call_depth(self.config.max_call_depth)
            .run(program)
    }

    /// Run statements against the engine's global memory.
    ///
    /// The result carries the value of the last statement.
    pub fn execute(&mut self, text: &str) -> EvalResult {
        debug!(script = text, "executing");
        let result = self.parse(text).and_then(|program| {
            let mut memory = std::mem::take(&mut self.memory);
            let result = self.run(&program, &mut memory);
            self.memory = memory;
            result
        });
        if let Err(e) = &result {
            warn!(error = %e, "script execution failed");
        }
        result.into()
    }

    /// Evaluate an expression, with the fields of `data` bound as globals.
    ///
    /// The expression runs as `result = <expression>` on a private scope
    /// stack seeded with the engine's globals, so nothing it assigns is kept.
    /// Map fields and instance fields of `data` are bound under their names
    /// after lexical replacement; any other value is bound as `data`.
    pub fn evaluate(&self, expression: &str, data: Option<&Value>) -> EvalResult {
        let mut memory = Memory::with_globals(self.memory.globals().clone());
        if let Some(data) = data {
            self.bind_data(&mut memory, data);
        }

        let source = format!("result = {}", expression);
        let result = self
            .parse(&source)
            .and_then(|program| self.run(&program, &mut memory))
            .map(|_| memory.get("result").cloned().unwrap_or_default());
        if let Err(e) = &result {
            warn!(expression, error = %e, "evaluation failed");
        }
        result.into()
    }

    /// Evaluate and convert, falling back to `default` on failure or when the
    /// result does not convert.
    pub fn evaluate_as<T: FromValue>(&self, expression: &str, data: Option<&Value>, default: T) -> T {
        let result = self.evaluate(expression, data);
        if !result.success {
            return default;
        }
        T::from_value(&result.value).unwrap_or(default)
    }

    fn bind_data(&self, memory: &mut Memory, data: &Value) {
        let fields: Vec<(String, Value)> = match data {
            Value::Object(map) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
            Value::Instance(instance) => instance
                .fields
                .read()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            other => vec![("data".to_string(), other.clone())],
        };
        for (name, value) in fields {
            let name = self.replacements.get(&name).unwrap_or(&name);
            memory.set_global(name, value);
        }
    }

    /// Replace every `[=expression]` in `template` (or matches of `pattern`,
    /// whose first capture group is the expression) with the expression's
    /// text. Expressions that fail render as empty text.
    pub fn replace_expression_values(&self, template: &str, pattern: Option<&str>) -> String {
        self.replace_expression_values_with(template, pattern, None)
    }

    /// [`Engine::replace_expression_values`] with `data` bound as in
    /// [`Engine::evaluate`].
    pub fn replace_expression_values_with(
        &self,
        template: &str,
        pattern: Option<&str>,
        data: Option<&Value>,
    ) -> String {
        let custom;
        let regex = match pattern {
            Some(pattern) => match Regex::new(pattern) {
                Ok(regex) => {
                    custom = regex;
                    &custom
                }
                Err(e) => {
                    warn!(pattern, error = %e, "invalid template pattern");
                    return template.to_string();
                }
            },
            None => match &self.template {
                Some(regex) => regex,
                None => return template.to_string(),
            },
        };

        regex
            .replace_all(template, |caps: &Captures| {
                let expression = caps
                    .get(1)
                    .or_else(|| caps.get(0))
                    .map_or("", |m| m.as_str());
                let result = self.evaluate(expression, data);
                if result.success {
                    result.value.as_string()
                } else {
                    warn!(expression, "template expression rendered as empty text");
                    String::new()
                }
            })
            .into_owned()
    }
}
