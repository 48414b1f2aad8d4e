//! Host interop: registered functions, types and words.
//!
//! These registries are the only bridge between scripts and host objects.
//! They are filled while the host sets up its [`Engine`](crate::Engine) and
//! only read during evaluation. Every lookup is case-insensitive; the name a
//! host registers stays the canonical spelling.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime};

use crate::error::{BindError, HostError, RuntimeError, ScriptError};
use crate::value::{FromValue, Instance, Value};

/// Native function callback. Receives arguments bound in declared order, with
/// defaults applied and wildcard extras appended.
pub type NativeFn = Arc<dyn Fn(&[Value]) -> Result<Value, HostError> + Send + Sync>;

/// Builds the initial field map of a host instance.
pub type Constructor =
    Arc<dyn Fn(&[Value]) -> Result<HashMap<String, Value>, HostError> + Send + Sync>;

pub type Getter = Arc<dyn Fn(&Instance) -> Result<Value, HostError> + Send + Sync>;
pub type Setter = Arc<dyn Fn(&Instance, Value) -> Result<(), HostError> + Send + Sync>;
pub type Method = Arc<dyn Fn(&Instance, &[Value]) -> Result<Value, HostError> + Send + Sync>;

/// Map keyed by canonical name with a lower-case secondary index.
#[derive(Debug, Clone)]
struct NameIndex<T> {
    entries: HashMap<String, T>,
    lookup: HashMap<String, String>,
}

impl<T> Default for NameIndex<T> {
    fn default() -> Self {
        NameIndex {
            entries: HashMap::new(),
            lookup: HashMap::new(),
        }
    }
}

impl<T> NameIndex<T> {
    fn insert(&mut self, name: &str, aliases: &[String], value: T) {
        self.lookup.insert(name.to_lowercase(), name.to_string());
        for alias in aliases {
            self.lookup.insert(alias.to_lowercase(), name.to_string());
        }
        self.entries.insert(name.to_string(), value);
    }

    fn canonical(&self, name: &str) -> Option<&str> {
        if self.entries.contains_key(name) {
            return self.entries.get_key_value(name).map(|(k, _)| k.as_str());
        }
        self.lookup.get(&name.to_lowercase()).map(String::as_str)
    }

    fn get(&self, name: &str) -> Option<&T> {
        self.canonical(name).and_then(|canonical| self.entries.get(canonical))
    }

    fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.entries.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Declared type of an argument, used to coerce values at bind time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArgType {
    #[default]
    Any,
    Number,
    Text,
    Boolean,
    Date,
    Time,
    List,
    Map,
}

impl ArgType {
    pub fn name(self) -> &'static str {
        match self {
            ArgType::Any => "any",
            ArgType::Number => "number",
            ArgType::Text => "text",
            ArgType::Boolean => "boolean",
            ArgType::Date => "date",
            ArgType::Time => "time",
            ArgType::List => "list",
            ArgType::Map => "map",
        }
    }

    /// Convert `value` to this type. Null passes through unchanged.
    pub fn coerce(self, value: Value) -> Result<Value, RuntimeError> {
        let fail = |value: &Value| RuntimeError::Coercion {
            value: value.type_name().to_string(),
            target: self.name(),
        };
        if value == Value::Null {
            return Ok(value);
        }
        match self {
            ArgType::Any => Ok(value),
            ArgType::Number => value.coerce_number().ok_or_else(|| fail(&value)),
            ArgType::Text => Ok(Value::String(value.as_string())),
            ArgType::Boolean => bool::from_value(&value)
                .map(Value::Boolean)
                .ok_or_else(|| fail(&value)),
            ArgType::Date => NaiveDate::from_value(&value)
                .map(Value::Date)
                .ok_or_else(|| fail(&value)),
            ArgType::Time => NaiveTime::from_value(&value)
                .map(Value::Time)
                .ok_or_else(|| fail(&value)),
            ArgType::List => match value {
                Value::Array(_) => Ok(value),
                _ => Err(fail(&value)),
            },
            ArgType::Map => match value {
                Value::Object(_) | Value::Instance(_) => Ok(value),
                _ => Err(fail(&value)),
            },
        }
    }
}

/// One formal argument of a callable.
#[derive(Debug, Clone, PartialEq)]
pub struct Arg {
    pub name: String,
    pub alias: Option<String>,
    /// Position in the argument list, assigned on registration
    pub index: usize,
    pub ty: ArgType,
    pub required: bool,
    pub default: Option<Value>,
    pub examples: Vec<String>,
}

impl Arg {
    pub fn required(name: &str, ty: ArgType) -> Self {
        Arg {
            name: name.to_string(),
            alias: None,
            index: 0,
            ty,
            required: true,
            default: None,
            examples: Vec::new(),
        }
    }

    pub fn optional(name: &str, ty: ArgType, default: impl Into<Value>) -> Self {
        Arg {
            required: false,
            default: Some(default.into()),
            ..Arg::required(name, ty)
        }
    }

    pub fn any(name: &str) -> Self {
        Arg::required(name, ArgType::Any)
    }

    /// Optional argument without a stored default (the callee supplies one).
    pub fn optional_any(name: &str) -> Self {
        Arg {
            required: false,
            ..Arg::any(name)
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.alias = Some(alias.to_string());
        self
    }

    pub fn example(mut self, example: &str) -> Self {
        self.examples.push(example.to_string());
        self
    }
}

/// Describes a callable's name, aliases and arguments for call-site binding.
///
/// # Example
///
/// ```
/// use tillscript::registry::{Arg, ArgType, FunctionMetaData};
///
/// let meta = FunctionMetaData::new("Round")
///     .arg(Arg::required("value", ArgType::Number).alias("v"))
///     .arg(Arg::optional("digits", ArgType::Number, 0).alias("d"));
/// assert_eq!(meta.arguments_lookup("D").map(|a| a.index), Some(1));
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FunctionMetaData {
    pub name: String,
    pub aliases: Vec<String>,
    pub arguments: Vec<Arg>,
    lookup: HashMap<String, usize>,
    /// Callable as `<number> name`, e.g. `30 minutes`
    pub is_suffixable: bool,
    /// Accepts positional arguments beyond the declared ones
    pub has_wildcard: bool,
    /// Called when named without parentheses, e.g. `Today`
    pub is_bare: bool,
    pub return_type: ArgType,
    pub description: Option<String>,
}

/// Arguments matched to their slots, before defaults are applied.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BoundArgs {
    pub slots: Vec<Option<Value>>,
    pub extras: Vec<Value>,
}

impl FunctionMetaData {
    pub fn new(name: &str) -> Self {
        FunctionMetaData {
            name: name.to_string(),
            ..Default::default()
        }
    }

    pub fn alias(mut self, alias: &str) -> Self {
        self.aliases.push(alias.to_string());
        self
    }

    pub fn arg(mut self, mut arg: Arg) -> Self {
        arg.index = self.arguments.len();
        self.lookup.insert(arg.name.to_lowercase(), arg.index);
        if let Some(alias) = &arg.alias {
            self.lookup.insert(alias.to_lowercase(), arg.index);
        }
        self.arguments.push(arg);
        self
    }

    pub fn suffixable(mut self) -> Self {
        self.is_suffixable = true;
        self
    }

    pub fn wildcard(mut self) -> Self {
        self.has_wildcard = true;
        self
    }

    pub fn bare(mut self) -> Self {
        self.is_bare = true;
        self
    }

    pub fn returns(mut self, ty: ArgType) -> Self {
        self.return_type = ty;
        self
    }

    pub fn describe(mut self, description: &str) -> Self {
        self.description = Some(description.to_string());
        self
    }

    /// Find an argument by canonical name or alias, ignoring case.
    pub fn arguments_lookup(&self, name: &str) -> Option<&Arg> {
        self.lookup
            .get(&name.to_lowercase())
            .and_then(|&index| self.arguments.get(index))
    }

    /// Check that argument names and aliases are unique and indexes contiguous.
    pub fn validate(&self) -> Result<(), BindError> {
        let invalid = |message: String| BindError::InvalidMetadata {
            function: self.name.clone(),
            message,
        };
        let mut seen = HashSet::new();
        for (position, arg) in self.arguments.iter().enumerate() {
            if arg.index != position {
                return Err(invalid(format!("argument '{}' has index {}", arg.name, arg.index)));
            }
            for name in std::iter::once(&arg.name).chain(arg.alias.iter()) {
                if !seen.insert(name.to_lowercase()) {
                    return Err(invalid(format!("argument name '{}' is used twice", name)));
                }
            }
        }
        Ok(())
    }

    /// Match actual arguments to slots by position, name or alias, coercing
    /// each to its declared type.
    pub fn bind(&self, args: Vec<(Option<String>, Value)>) -> Result<BoundArgs, ScriptError> {
        let given = args.len();
        let mut bound = BoundArgs {
            slots: vec![None; self.arguments.len()],
            extras: Vec::new(),
        };
        let mut next_position = 0;
        let mut seen_named = false;

        for (name, value) in args {
            let arg = match name {
                Some(name) => {
                    seen_named = true;
                    self.arguments_lookup(&name).ok_or_else(|| BindError::UnknownArgument {
                        function: self.name.clone(),
                        name: name.clone(),
                    })?
                }
                None if seen_named => {
                    return Err(BindError::PositionalAfterNamed {
                        function: self.name.clone(),
                    }
                    .into());
                }
                None => match self.arguments.get(next_position) {
                    Some(arg) => {
                        next_position += 1;
                        arg
                    }
                    None if self.has_wildcard => {
                        bound.extras.push(value);
                        continue;
                    }
                    None => {
                        return Err(BindError::TooManyArguments {
                            function: self.name.clone(),
                            max: self.arguments.len(),
                            given,
                        }
                        .into());
                    }
                },
            };

            let slot = &mut bound.slots[arg.index];
            if slot.is_some() {
                return Err(BindError::DuplicateArgument {
                    function: self.name.clone(),
                    name: arg.name.clone(),
                }
                .into());
            }
            *slot = Some(arg.ty.coerce(value)?);
        }

        for (arg, slot) in self.arguments.iter().zip(&bound.slots) {
            if arg.required && slot.is_none() {
                return Err(BindError::MissingArgument {
                    function: self.name.clone(),
                    name: arg.name.clone(),
                }
                .into());
            }
        }

        Ok(bound)
    }

    /// Final argument list for a native callback: omitted optionals take their
    /// declared default (or null), extras follow.
    pub fn apply_defaults(&self, bound: BoundArgs) -> Vec<Value> {
        let mut values: Vec<Value> = bound
            .slots
            .into_iter()
            .zip(&self.arguments)
            .map(|(slot, arg)| {
                slot.or_else(|| arg.default.clone())
                    .unwrap_or(Value::Null)
            })
            .collect();
        values.extend(bound.extras);
        values
    }
}

impl fmt::Display for FunctionMetaData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args: Vec<String> = self
            .arguments
            .iter()
            .map(|arg| match &arg.default {
                Some(default) => format!("{}: {} = {}", arg.name, arg.ty.name(), default),
                None if !arg.required => format!("{}?: {}", arg.name, arg.ty.name()),
                None => format!("{}: {}", arg.name, arg.ty.name()),
            })
            .chain(self.has_wildcard.then(|| "...".to_string()))
            .collect();
        write!(f, "{}({}) -> {}", self.name, args.join(", "), self.return_type.name())
    }
}

/// A host function together with its metadata.
#[derive(Clone)]
pub struct RegisteredFunction {
    pub meta: FunctionMetaData,
    pub callback: NativeFn,
}

impl fmt::Debug for RegisteredFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredFunction")
            .field("meta", &self.meta)
            .finish_non_exhaustive()
    }
}

impl RegisteredFunction {
    /// Bind `args` and invoke the callback.
    pub fn call(&self, args: Vec<(Option<String>, Value)>) -> Result<Value, ScriptError> {
        let bound = self.meta.bind(args)?;
        let values = self.meta.apply_defaults(bound);
        Ok((self.callback)(&values)?)
    }
}

/// Functions callable by name from scripts.
#[derive(Debug, Clone, Default)]
pub struct FunctionRegistry {
    functions: NameIndex<RegisteredFunction>,
}

impl FunctionRegistry {
    pub fn register<F>(&mut self, meta: FunctionMetaData, callback: F) -> Result<(), BindError>
    where
        F: Fn(&[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        meta.validate()?;
        let callback: NativeFn = Arc::new(callback);
        let name = meta.name.clone();
        let aliases = meta.aliases.clone();
        self.functions
            .insert(&name, &aliases, RegisteredFunction { meta, callback });
        Ok(())
    }

    /// Case-insensitive lookup by name or alias.
    pub fn get_match(&self, name: &str) -> Option<&RegisteredFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get_match(name).is_some()
    }

    pub fn names(&self) -> Vec<&str> {
        self.functions.names()
    }
}

#[derive(Clone)]
struct Property {
    getter: Getter,
    setter: Option<Setter>,
}

#[derive(Clone)]
struct NativeMethod {
    meta: FunctionMetaData,
    callback: Method,
}

/// Capability descriptor of a host type: how to construct it and which
/// properties and methods scripts may use.
///
/// # Example
///
/// ```
/// use std::collections::HashMap;
/// use tillscript::registry::{Arg, ArgType, FunctionMetaData, NativeType};
/// use tillscript::Value;
///
/// let discount = NativeType::new("Discount")
///     .constructor(
///         FunctionMetaData::new("Discount").arg(Arg::required("rate", ArgType::Number)),
///         |args| Ok(HashMap::from([("Rate".to_string(), args[0].clone())])),
///     )
///     .property("Percent", |this| {
///         let rate = this.field("Rate").and_then(|r| r.as_float()).unwrap_or(0.0);
///         Ok(Value::Float(rate * 100.0))
///     });
/// assert_eq!(discount.name(), "Discount");
/// ```
#[derive(Clone)]
pub struct NativeType {
    name: String,
    constructor: Option<(FunctionMetaData, Constructor)>,
    properties: NameIndex<Property>,
    methods: NameIndex<NativeMethod>,
}

impl fmt::Debug for NativeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeType")
            .field("name", &self.name)
            .field("properties", &self.properties.names())
            .field("methods", &self.methods.names())
            .finish()
    }
}

impl NativeType {
    pub fn new(name: &str) -> Self {
        NativeType {
            name: name.to_string(),
            constructor: None,
            properties: NameIndex::default(),
            methods: NameIndex::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn constructor<F>(mut self, meta: FunctionMetaData, constructor: F) -> Self
    where
        F: Fn(&[Value]) -> Result<HashMap<String, Value>, HostError> + Send + Sync + 'static,
    {
        let constructor: Constructor = Arc::new(constructor);
        self.constructor = Some((meta, constructor));
        self
    }

    /// Read-only property.
    pub fn property<G>(mut self, name: &str, getter: G) -> Self
    where
        G: Fn(&Instance) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        let getter: Getter = Arc::new(getter);
        self.properties.insert(
            name,
            &[],
            Property {
                getter,
                setter: None,
            },
        );
        self
    }

    pub fn property_with_setter<G, S>(mut self, name: &str, getter: G, setter: S) -> Self
    where
        G: Fn(&Instance) -> Result<Value, HostError> + Send + Sync + 'static,
        S: Fn(&Instance, Value) -> Result<(), HostError> + Send + Sync + 'static,
    {
        let getter: Getter = Arc::new(getter);
        let setter: Setter = Arc::new(setter);
        self.properties.insert(
            name,
            &[],
            Property {
                getter,
                setter: Some(setter),
            },
        );
        self
    }

    pub fn method<F>(mut self, meta: FunctionMetaData, callback: F) -> Self
    where
        F: Fn(&Instance, &[Value]) -> Result<Value, HostError> + Send + Sync + 'static,
    {
        let callback: Method = Arc::new(callback);
        let name = meta.name.clone();
        let aliases = meta.aliases.clone();
        self.methods.insert(&name, &aliases, NativeMethod { meta, callback });
        self
    }

    /// Create an instance visible to scripts under `script_name`.
    pub fn construct(
        &self,
        script_name: &str,
        args: Vec<(Option<String>, Value)>,
    ) -> Result<Instance, ScriptError> {
        let fields = match &self.constructor {
            Some((meta, constructor)) => {
                let values = meta.apply_defaults(meta.bind(args)?);
                constructor(&values)?
            }
            None if args.is_empty() => HashMap::new(),
            None => {
                return Err(BindError::TooManyArguments {
                    function: script_name.to_string(),
                    max: 0,
                    given: args.len(),
                }
                .into());
            }
        };
        Ok(Instance::new(script_name, fields))
    }

    /// Property value, falling back to the instance's own fields.
    /// `None` when neither exists.
    pub fn get(&self, instance: &Instance, member: &str) -> Result<Option<Value>, ScriptError> {
        match self.properties.get(member) {
            Some(property) => Ok(Some((property.getter)(instance)?)),
            None => Ok(instance.field(member)),
        }
    }

    pub fn set(&self, instance: &Instance, member: &str, value: Value) -> Result<(), ScriptError> {
        match self.properties.get(member) {
            Some(Property {
                setter: Some(setter),
                ..
            }) => Ok(setter(instance, value)?),
            Some(_) => Err(RuntimeError::Type(format!(
                "property '{}' of {} is read-only",
                member, self.name
            ))
            .into()),
            None => {
                instance.set_field(member, value);
                Ok(())
            }
        }
    }

    pub fn has_method(&self, method: &str) -> bool {
        self.methods.get(method).is_some()
    }

    pub fn call(
        &self,
        instance: &Instance,
        method: &str,
        args: Vec<(Option<String>, Value)>,
    ) -> Result<Value, ScriptError> {
        let native = self.methods.get(method).ok_or_else(|| RuntimeError::UnknownMember {
            type_name: self.name.clone(),
            member: method.to_string(),
        })?;
        let values = native.meta.apply_defaults(native.meta.bind(args)?);
        Ok((native.callback)(instance, &values)?)
    }
}

/// Host types constructible with `new`.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: NameIndex<Arc<NativeType>>,
}

impl TypeRegistry {
    /// Register `ty` under `alias`, or under its own name when no alias is given.
    pub fn register(&mut self, ty: NativeType, alias: Option<&str>) {
        let name = alias.unwrap_or(ty.name()).to_string();
        self.types.insert(&name, &[], Arc::new(ty));
    }

    /// Case-insensitive lookup; returns the script-visible name with the descriptor.
    pub fn get_match(&self, name: &str) -> Option<(&str, &Arc<NativeType>)> {
        let canonical = self.types.canonical(name)?;
        self.types.get(canonical).map(|ty| (canonical, ty))
    }

    pub fn names(&self) -> Vec<&str> {
        self.types.names()
    }
}

/// Named constants that lex as `Word` tokens.
#[derive(Debug, Clone, Default)]
pub struct WordRegistry {
    words: NameIndex<Value>,
}

impl WordRegistry {
    pub fn register(&mut self, word: &str, value: Value) {
        self.words.insert(word, &[], value);
    }

    pub fn get(&self, word: &str) -> Option<&Value> {
        self.words.get(word)
    }

    pub fn is_empty(&self) -> bool {
        self.words.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_meta() -> FunctionMetaData {
        FunctionMetaData::new("Round")
            .arg(Arg::required("value", ArgType::Number).alias("v"))
            .arg(Arg::optional("digits", ArgType::Number, 0).alias("d"))
    }

    #[test]
    fn binds_by_position_name_and_alias() {
        let meta = round_meta();
        let positional = meta.bind(vec![(None, Value::Float(2.5)), (None, Value::Integer(1))]);
        let named = meta.bind(vec![
            (Some("digits".into()), Value::Integer(1)),
            (Some("value".into()), Value::Float(2.5)),
        ]);
        let aliased = meta.bind(vec![(Some("V".into()), Value::Float(2.5)), (Some("d".into()), Value::Integer(1))]);
        assert_eq!(positional, named);
        assert_eq!(named, aliased);
    }

    #[test]
    fn omitted_optional_takes_default() {
        let meta = round_meta();
        let bound = meta.bind(vec![(None, Value::Float(2.5))]).unwrap();
        assert_eq!(
            meta.apply_defaults(bound),
            vec![Value::Float(2.5), Value::Integer(0)]
        );
    }

    #[test]
    fn missing_required_is_a_bind_error() {
        let err = round_meta().bind(vec![(Some("d".into()), Value::Integer(1))]);
        assert!(matches!(
            err,
            Err(ScriptError::Bind(BindError::MissingArgument { .. }))
        ));
    }

    #[test]
    fn duplicate_names_fail_validation() {
        let meta = FunctionMetaData::new("f")
            .arg(Arg::any("a"))
            .arg(Arg::any("b").alias("A"));
        assert!(meta.validate().is_err());
    }

    #[test]
    fn lookups_ignore_case() {
        let mut registry = FunctionRegistry::default();
        registry
            .register(round_meta().alias("rnd"), |args| Ok(args[0].clone()))
            .unwrap();
        assert_eq!(registry.get_match("ROUND").map(|f| f.meta.name.as_str()), Some("Round"));
        assert!(registry.contains("Rnd"));
    }
}
