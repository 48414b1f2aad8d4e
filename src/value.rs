use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDate, NaiveTime, Timelike};
use parking_lot::RwLock;
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};

use crate::ast::FunctionDecl;
use crate::output::to_json;

/// A runtime value of the tillscript language.
///
/// # Type Preservation
///
/// Integers and floats are kept apart:
/// - Arithmetic keeps integer types when results are whole
/// - Mixed integer/float arithmetic goes through `rust_decimal`, so `0.1 + 0.2 == 0.3`
///
/// # Examples
///
/// ```
/// use tillscript::Value;
/// use std::collections::HashMap;
///
/// let quantity = Value::Integer(3);
/// let price = Value::Float(2.5);
///
/// let mut order = HashMap::new();
/// order.insert("Quantity".to_string(), quantity);
/// order.insert("Price".to_string(), price);
/// let order = Value::Object(order);
/// assert_eq!(order.type_name(), "map");
/// ```
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    #[default]
    Null,

    Boolean(bool),

    /// Floating-point number
    Float(f64),

    /// Integer number (preserved separately from floats)
    Integer(i64),

    /// UTF-8 string
    String(String),

    /// Calendar date
    Date(NaiveDate),

    /// Time of day
    Time(NaiveTime),

    /// Ordered list of values
    Array(Vec<Value>),

    /// Map with string keys
    Object(HashMap<String, Value>),

    /// Script function or lambda
    Function(Arc<Closure>),

    /// Instance of a host-registered type
    Instance(Instance),
}

/// A function value: the declaration plus, for lambdas, the variables
/// visible where the lambda was created.
#[derive(Debug)]
pub struct Closure {
    pub decl: Arc<FunctionDecl>,
    pub captured: Option<HashMap<String, Value>>,
}

impl PartialEq for Closure {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.decl, &other.decl) && self.captured == other.captured
    }
}

/// Object created by `new` for a host-registered type.
///
/// Instances are shared by reference: copying the value copies the handle,
/// and assignments through any handle are visible through all of them.
#[derive(Debug, Clone)]
pub struct Instance {
    pub type_name: Arc<str>,
    pub fields: Arc<RwLock<HashMap<String, Value>>>,
}

impl Instance {
    pub fn new(type_name: &str, fields: HashMap<String, Value>) -> Self {
        Instance {
            type_name: Arc::from(type_name),
            fields: Arc::new(RwLock::new(fields)),
        }
    }

    pub fn field(&self, name: &str) -> Option<Value> {
        let fields = self.fields.read();
        fields.get(name).cloned().or_else(|| {
            fields
                .iter()
                .find(|(key, _)| key.eq_ignore_ascii_case(name))
                .map(|(_, value)| value.clone())
        })
    }

    pub fn set_field(&self, name: &str, value: Value) {
        let mut fields = self.fields.write();
        let key = fields
            .keys()
            .find(|key| key.eq_ignore_ascii_case(name))
            .cloned()
            .unwrap_or_else(|| name.to_string());
        fields.insert(key, value);
    }
}

impl PartialEq for Instance {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.fields, &other.fields)
    }
}

impl Value {
    /// Check if the value is truthy (for conditions)
    pub fn is_truthy(&self) -> bool {
        use Value::*;
        match self {
            Null => false,
            Boolean(b) => *b,
            Float(n) => *n != 0.0,
            Integer(n) => *n != 0,
            String(s) => !s.is_empty(),
            Array(arr) => !arr.is_empty(),
            Object(obj) => !obj.is_empty(),
            Date(_) | Time(_) | Function(_) | Instance(_) => true,
        }
    }

    /// Human-readable type name used in error messages and `.type()`
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Boolean(_) => "boolean",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Array(_) => "array",
            Value::Object(_) => "map",
            Value::Function(_) => "function",
            Value::Instance(_) => "object",
        }
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Value::Integer(_) | Value::Float(_))
    }

    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Integer(n) => Some(*n as f64),
            Value::Float(n) => Some(*n),
            _ => None,
        }
    }

    /// Get as integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            Value::Float(n) => Some(n.round() as i64),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            Value::Integer(n) => Decimal::from_i64(*n),
            Value::Float(n) => Decimal::from_f64(*n),
            _ => None,
        }
    }

    /// Numeric view of the value, parsing numeric strings.
    ///
    /// `"12"` becomes `Integer(12)`, `" 2.5 "` becomes `Float(2.5)`;
    /// anything else that is not already a number yields `None`.
    pub fn coerce_number(&self) -> Option<Value> {
        match self {
            Value::Integer(_) | Value::Float(_) => Some(self.clone()),
            Value::String(s) => {
                let s = s.trim();
                if let Ok(n) = s.parse::<i64>() {
                    Some(Value::Integer(n))
                } else {
                    s.parse::<f64>().ok().filter(|n| n.is_finite()).map(Value::Float)
                }
            }
            _ => None,
        }
    }

    /// Build a number from a decimal result, keeping whole numbers as integers.
    pub fn from_decimal(d: Decimal) -> Value {
        if d.is_integer()
            && let Some(n) = d.to_i64()
        {
            return Value::Integer(n);
        }
        d.to_f64().map(Value::Float).unwrap_or(Value::Null)
    }

    /// Text used for string concatenation, interpolation and templates.
    ///
    /// Unlike [`to_json`], strings are not quoted and null renders as empty text.
    pub fn as_string(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", b),
            Value::Integer(n) => write!(f, "{}", n),
            Value::Float(n) => write!(f, "{}", n),
            Value::String(s) => write!(f, "{}", s),
            Value::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            Value::Time(t) if t.second() == 0 => write!(f, "{}", t.format("%H:%M")),
            Value::Time(t) => write!(f, "{}", t.format("%H:%M:%S")),
            Value::Function(c) => write!(f, "function {}", c.decl.display_name()),
            Value::Instance(i) => write!(f, "{}", i.type_name),
            Value::Array(_) | Value::Object(_) => write!(f, "{}", to_json(self)),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Integer(n.into())
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<NaiveDate> for Value {
    fn from(d: NaiveDate) -> Self {
        Value::Date(d)
    }
}

impl From<NaiveTime> for Value {
    fn from(t: NaiveTime) -> Self {
        Value::Time(t)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Array(items)
    }
}

impl From<HashMap<String, Value>> for Value {
    fn from(map: HashMap<String, Value>) -> Self {
        Value::Object(map)
    }
}

/// Convert serde_json::Value to a script value
impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => n.as_f64().map(Value::Float).unwrap_or(Value::Null),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(arr) => {
                Value::Array(arr.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(obj) => {
                Value::Object(obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect())
            }
        }
    }
}

impl Value {
    /// Convert to serde_json::Value. Dates and times become strings, functions
    /// become null and host instances become their field maps.
    pub fn to_json_value(&self) -> serde_json::Value {
        match self {
            Value::Null | Value::Function(_) => serde_json::Value::Null,
            Value::Boolean(b) => serde_json::Value::Bool(*b),
            Value::Integer(i) => serde_json::Value::Number((*i).into()),
            Value::Float(f) => serde_json::Number::from_f64(*f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Date(_) | Value::Time(_) => serde_json::Value::String(self.to_string()),
            Value::Array(arr) => {
                serde_json::Value::Array(arr.iter().map(Value::to_json_value).collect())
            }
            Value::Object(obj) => serde_json::Value::Object(
                obj.iter().map(|(k, v)| (k.clone(), v.to_json_value())).collect(),
            ),
            Value::Instance(instance) => serde_json::Value::Object(
                instance
                    .fields
                    .read()
                    .iter()
                    .map(|(k, v)| (k.clone(), v.to_json_value()))
                    .collect(),
            ),
        }
    }
}

/// Typed extraction with the engine's coercion rules.
///
/// Used by hosts to read computed variables back out of script memory.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

impl FromValue for Value {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.clone())
    }
}

impl FromValue for bool {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Boolean(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => None,
            },
            other => Some(other.is_truthy()),
        }
    }
}

impl FromValue for i64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.coerce_number().and_then(|n| n.as_int())
    }
}

impl FromValue for i32 {
    fn from_value(value: &Value) -> Option<Self> {
        i64::from_value(value).and_then(|n| i32::try_from(n).ok())
    }
}

impl FromValue for f64 {
    fn from_value(value: &Value) -> Option<Self> {
        value.coerce_number().and_then(|n| n.as_float())
    }
}

impl FromValue for Decimal {
    fn from_value(value: &Value) -> Option<Self> {
        value.coerce_number().and_then(|n| n.as_decimal())
    }
}

impl FromValue for String {
    fn from_value(value: &Value) -> Option<Self> {
        Some(value.as_string())
    }
}

impl FromValue for NaiveDate {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Date(d) => Some(*d),
            Value::String(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").ok(),
            _ => None,
        }
    }
}

impl FromValue for NaiveTime {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Time(t) => Some(*t),
            Value::String(s) => {
                let s = s.trim();
                NaiveTime::parse_from_str(s, "%H:%M:%S")
                    .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
                    .ok()
            }
            _ => None,
        }
    }
}

impl FromValue for Vec<Value> {
    fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Array(items) => Some(items.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_strings_coerce() {
        assert_eq!(Value::from("12").coerce_number(), Some(Value::Integer(12)));
        assert_eq!(Value::from(" 2.5 ").coerce_number(), Some(Value::Float(2.5)));
        assert_eq!(Value::from("abc").coerce_number(), None);
    }

    #[test]
    fn whole_decimals_stay_integers() {
        assert_eq!(Value::from_decimal(Decimal::new(110, 0)), Value::Integer(110));
        assert_eq!(Value::from_decimal(Decimal::new(75, 1)), Value::Float(7.5));
    }

    #[test]
    fn null_renders_empty_in_text() {
        assert_eq!(Value::Null.as_string(), "");
        assert_eq!(Value::Float(7.5).as_string(), "7.5");
    }
}
