//! Methods callable on any value: `items.count()`, `name.upper()`,
//! `prices.sort(function(p) { return p.Amount; })`.

use std::{
    cmp::Ordering,
    fmt::{self, Write},
};

use chrono::format::{Item, StrftimeItems};
use rust_decimal::RoundingStrategy;

use crate::{
    ast::BinOp,
    error::{RuntimeError, ScriptError, ScriptResult},
    evaluator::{Interpreter, apply_binop, compare_values, values_equal},
    value::Value,
};

fn type_error(message: String) -> ScriptError {
    RuntimeError::Type(message).into()
}

fn expect_array<'v>(method: &str, object: &'v Value) -> ScriptResult<&'v Vec<Value>> {
    match object {
        Value::Array(arr) => Ok(arr),
        _ => Err(type_error(format!(
            ".{}() requires array, got {}",
            method,
            object.type_name()
        ))),
    }
}

fn expect_string<'v>(method: &str, object: &'v Value) -> ScriptResult<&'v str> {
    match object {
        Value::String(s) => Ok(s),
        _ => Err(type_error(format!(
            ".{}() requires string, got {}",
            method,
            object.type_name()
        ))),
    }
}

fn string_arg(method: &str, args: &[Value], position: usize) -> ScriptResult<String> {
    match args.get(position) {
        Some(Value::String(s)) => Ok(s.clone()),
        Some(Value::Null) | None => Err(type_error(format!(
            ".{}() requires a string argument",
            method
        ))),
        Some(other) => Ok(other.as_string()),
    }
}

impl Interpreter<'_> {
    /// Dispatch `object.method(args)`.
    ///
    /// Host instances try their type's registered methods first; maps and
    /// instances holding a function under `method` call it; everything else
    /// goes to the built-in methods below.
    pub(crate) fn eval_method_call(
        &mut self,
        object: Value,
        method: &str,
        args: Vec<(Option<String>, Value)>,
    ) -> ScriptResult<Value> {
        if let Value::Instance(instance) = &object {
            let types = self.types;
            if let Some((_, ty)) = types.get_match(&instance.type_name)
                && ty.has_method(method)
            {
                return ty.call(instance, method, args);
            }
            if let Some(function @ Value::Function(_)) = instance.field(method) {
                let args = args.into_iter().map(|(_, v)| v).collect();
                return self.call_value(&function, args);
            }
        }
        if let Value::Object(map) = &object
            && let Some(function @ Value::Function(_)) = map.get(method)
        {
            let function = function.clone();
            let args = args.into_iter().map(|(_, v)| v).collect();
            return self.call_value(&function, args);
        }

        let args: Vec<Value> = args.into_iter().map(|(_, v)| v).collect();
        let method = method.to_ascii_lowercase();
        match method.as_str() {
            // Array methods
            "any" => self.method_any(&object, &args),
            "all" => self.method_all(&object, &args),
            "filter" => self.method_filter(&object, &args),
            "map" => self.method_map(&object, &args),
            "count" => self.method_count(&object),
            "length" => self.method_length(&object),
            "sum" => self.method_sum(&object, &args),
            "min" => self.method_extreme(&object, Ordering::Less, "min"),
            "max" => self.method_extreme(&object, Ordering::Greater, "max"),
            "avg" => self.method_avg(&object),
            "first" => self.method_first(&object),
            "last" => self.method_last(&object),
            "exists" => self.method_exists(&object),
            "unique" => self.method_unique(&object),
            "sort" => self.method_sort(&object, &args, false),
            "sort_desc" => self.method_sort(&object, &args, true),
            "reverse" => self.method_reverse(&object),
            "flatten" => self.method_flatten(&object),
            "join" => self.method_join(&object, &args),
            // String methods
            "upper" => Ok(Value::String(expect_string("upper", &object)?.to_uppercase())),
            "lower" => Ok(Value::String(expect_string("lower", &object)?.to_lowercase())),
            "trim" => Ok(Value::String(expect_string("trim", &object)?.trim().to_string())),
            "split" => self.method_split(&object, &args),
            "replace" => self.method_replace(&object, &args),
            "contains" => self.method_contains(&object, &args),
            "startswith" => {
                let prefix = string_arg("startswith", &args, 0)?;
                Ok(Value::Boolean(expect_string("startswith", &object)?.starts_with(&prefix)))
            }
            "endswith" => {
                let suffix = string_arg("endswith", &args, 0)?;
                Ok(Value::Boolean(expect_string("endswith", &object)?.ends_with(&suffix)))
            }
            "matches" => self.method_matches(&object, &args),
            // Map methods
            "keys" => self.method_keys(&object),
            "values" => self.method_values(&object),
            // Any value
            "format" => {
                let pattern = string_arg("format", &args, 0)?;
                Ok(Value::String(format_value(&object, &pattern)?))
            }
            "type" => Ok(Value::String(object.type_name().to_string())),
            _ => Err(RuntimeError::UnknownMember {
                type_name: object.type_name().to_string(),
                member: method,
            }
            .into()),
        }
    }

    /// Apply the function passed as first argument to `item`, or return the
    /// item itself when none was given.
    fn project(&mut self, args: &[Value], item: &Value) -> ScriptResult<Value> {
        match args.first() {
            Some(function @ Value::Function(_)) => self.call_value(function, vec![item.clone()]),
            _ => Ok(item.clone()),
        }
    }

    fn predicate<'v>(&self, method: &str, args: &'v [Value]) -> ScriptResult<&'v Value> {
        match args.first() {
            Some(function @ Value::Function(_)) => Ok(function),
            _ => Err(type_error(format!(
                ".{}() requires a function argument",
                method
            ))),
        }
    }

    /// .any(fn) - true if any element satisfies `fn`
    fn method_any(&mut self, object: &Value, args: &[Value]) -> ScriptResult<Value> {
        let arr = expect_array("any", object)?;
        let predicate = self.predicate("any", args)?;
        for item in arr {
            if self.call_value(predicate, vec![item.clone()])?.is_truthy() {
                return Ok(Value::Boolean(true));
            }
        }
        Ok(Value::Boolean(false))
    }

    /// .all(fn) - true if every element satisfies `fn`
    fn method_all(&mut self, object: &Value, args: &[Value]) -> ScriptResult<Value> {
        let arr = expect_array("all", object)?;
        let predicate = self.predicate("all", args)?;
        for item in arr {
            if !self.call_value(predicate, vec![item.clone()])?.is_truthy() {
                return Ok(Value::Boolean(false));
            }
        }
        Ok(Value::Boolean(true))
    }

    fn method_filter(&mut self, object: &Value, args: &[Value]) -> ScriptResult<Value> {
        let arr = expect_array("filter", object)?;
        let predicate = self.predicate("filter", args)?;
        let mut result = Vec::new();
        for item in arr {
            if self.call_value(predicate, vec![item.clone()])?.is_truthy() {
                result.push(item.clone());
            }
        }
        Ok(Value::Array(result))
    }

    fn method_map(&mut self, object: &Value, args: &[Value]) -> ScriptResult<Value> {
        let arr = expect_array("map", object)?;
        let transform = self.predicate("map", args)?;
        let mut result = Vec::with_capacity(arr.len());
        for item in arr {
            result.push(self.call_value(transform, vec![item.clone()])?);
        }
        Ok(Value::Array(result))
    }

    fn method_count(&self, object: &Value) -> ScriptResult<Value> {
        match object {
            Value::Array(arr) => Ok(Value::Integer(arr.len() as i64)),
            Value::Object(map) => Ok(Value::Integer(map.len() as i64)),
            _ => Err(type_error(format!(
                ".count() requires array, got {}",
                object.type_name()
            ))),
        }
    }

    /// .length() - returns length of array or string
    fn method_length(&self, object: &Value) -> ScriptResult<Value> {
        match object {
            Value::Array(arr) => Ok(Value::Integer(arr.len() as i64)),
            Value::String(s) => Ok(Value::Integer(s.chars().count() as i64)),
            _ => Err(type_error(format!(
                ".length() requires array or string, got {}",
                object.type_name()
            ))),
        }
    }

    /// .sum(fn?) - adds the elements, or what `fn` extracts from each
    fn method_sum(&mut self, object: &Value, args: &[Value]) -> ScriptResult<Value> {
        let arr = expect_array("sum", object)?;
        let mut total = Value::Integer(0);
        for item in arr {
            let value = self.project(args, item)?;
            if value == Value::Null {
                continue;
            }
            total = apply_binop(BinOp::Add, &total, &value).and_then(|sum| {
                if sum.is_number() {
                    Ok(sum)
                } else {
                    Err(RuntimeError::Type(format!(
                        ".sum() requires numeric values, got {}",
                        value.type_name()
                    )))
                }
            })?;
        }
        Ok(total)
    }

    /// .min() / .max()
    fn method_extreme(&self, object: &Value, wanted: Ordering, name: &str) -> ScriptResult<Value> {
        let arr = expect_array(name, object)?;
        let mut best: Option<&Value> = None;
        for item in arr {
            best = match best {
                None => Some(item),
                Some(current) if compare_values(item, current) == Some(wanted) => Some(item),
                keep => keep,
            };
        }
        Ok(best.cloned().unwrap_or(Value::Null))
    }

    /// .avg() - mean of the numeric elements; null for an empty array
    fn method_avg(&self, object: &Value) -> ScriptResult<Value> {
        let arr = expect_array("avg", object)?;
        let numbers: Vec<Value> = arr.iter().filter_map(Value::coerce_number).collect();
        if numbers.is_empty() {
            return Ok(Value::Null);
        }
        let mut total = Value::Integer(0);
        for n in &numbers {
            total = apply_binop(BinOp::Add, &total, n)?;
        }
        Ok(apply_binop(
            BinOp::Divide,
            &total,
            &Value::Integer(numbers.len() as i64),
        )?)
    }

    fn method_first(&self, object: &Value) -> ScriptResult<Value> {
        Ok(expect_array("first", object)?
            .first()
            .cloned()
            .unwrap_or(Value::Null))
    }

    fn method_last(&self, object: &Value) -> ScriptResult<Value> {
        Ok(expect_array("last", object)?
            .last()
            .cloned()
            .unwrap_or(Value::Null))
    }

    /// .exists() - true for a non-empty array
    fn method_exists(&self, object: &Value) -> ScriptResult<Value> {
        match object {
            Value::Null => Ok(Value::Boolean(false)),
            _ => Ok(Value::Boolean(!expect_array("exists", object)?.is_empty())),
        }
    }

    fn method_unique(&self, object: &Value) -> ScriptResult<Value> {
        let arr = expect_array("unique", object)?;
        let mut result: Vec<Value> = Vec::new();
        for item in arr {
            if !result.iter().any(|seen| values_equal(seen, item)) {
                result.push(item.clone());
            }
        }
        Ok(Value::Array(result))
    }

    /// .sort(fn?) / .sort_desc(fn?) - stable sort, optionally by extracted key
    fn method_sort(&mut self, object: &Value, args: &[Value], descending: bool) -> ScriptResult<Value> {
        let arr = expect_array(if descending { "sort_desc" } else { "sort" }, object)?;

        let mut items_with_keys = Vec::with_capacity(arr.len());
        for item in arr {
            let key = self.project(args, item)?;
            items_with_keys.push((item.clone(), key));
        }

        items_with_keys.sort_by(|(_, a), (_, b)| {
            let ordering = compare_values(a, b).unwrap_or(Ordering::Equal);
            if descending { ordering.reverse() } else { ordering }
        });

        Ok(Value::Array(
            items_with_keys.into_iter().map(|(v, _)| v).collect(),
        ))
    }

    fn method_reverse(&self, object: &Value) -> ScriptResult<Value> {
        match object {
            Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
            _ => {
                let mut reversed = expect_array("reverse", object)?.clone();
                reversed.reverse();
                Ok(Value::Array(reversed))
            }
        }
    }

    /// .flatten() - flattens nested arrays one level
    fn method_flatten(&self, object: &Value) -> ScriptResult<Value> {
        let mut result = Vec::new();
        for item in expect_array("flatten", object)? {
            match item {
                Value::Array(inner) => result.extend(inner.iter().cloned()),
                other => result.push(other.clone()),
            }
        }
        Ok(Value::Array(result))
    }

    /// .join(separator = ",")
    fn method_join(&self, object: &Value, args: &[Value]) -> ScriptResult<Value> {
        let arr = expect_array("join", object)?;
        let separator = match args.first() {
            Some(sep) => sep.as_string(),
            None => ",".to_string(),
        };
        let parts: Vec<String> = arr.iter().map(Value::as_string).collect();
        Ok(Value::String(parts.join(&separator)))
    }

    /// .split(delimiter) - splits string into array; an empty delimiter splits
    /// into characters
    fn method_split(&self, object: &Value, args: &[Value]) -> ScriptResult<Value> {
        let s = expect_string("split", object)?;
        let delimiter = string_arg("split", args, 0)?;
        let parts: Vec<Value> = if delimiter.is_empty() {
            s.chars().map(|c| Value::String(c.to_string())).collect()
        } else {
            s.split(delimiter.as_str())
                .map(|p| Value::String(p.to_string()))
                .collect()
        };
        Ok(Value::Array(parts))
    }

    fn method_replace(&self, object: &Value, args: &[Value]) -> ScriptResult<Value> {
        let s = expect_string("replace", object)?;
        let from = string_arg("replace", args, 0)?;
        let to = args.get(1).map(Value::as_string).unwrap_or_default();
        Ok(Value::String(s.replace(&from, &to)))
    }

    /// .contains(x) - substring, array element or map key
    fn method_contains(&self, object: &Value, args: &[Value]) -> ScriptResult<Value> {
        let needle = args.first().cloned().unwrap_or(Value::Null);
        match object {
            Value::String(s) => Ok(Value::Boolean(s.contains(&needle.as_string()))),
            Value::Array(arr) => Ok(Value::Boolean(
                arr.iter().any(|item| values_equal(item, &needle)),
            )),
            Value::Object(map) => Ok(Value::Boolean(map.contains_key(&needle.as_string()))),
            _ => Err(type_error(format!(
                ".contains() requires string, array or map, got {}",
                object.type_name()
            ))),
        }
    }

    /// .matches(pattern) - returns true if string matches regex pattern
    fn method_matches(&self, object: &Value, args: &[Value]) -> ScriptResult<Value> {
        if args.len() != 1 {
            return Err(type_error(
                ".matches() requires exactly one argument".to_string(),
            ));
        }
        let pattern = string_arg("matches", args, 0)?;
        let re = regex::Regex::new(&pattern)
            .map_err(|e| type_error(format!("invalid regex: {e}")))?;
        match object {
            Value::String(s) => Ok(Value::Boolean(re.is_match(s))),
            _ => Ok(Value::Boolean(false)),
        }
    }

    /// .keys() - map keys in sorted order
    fn method_keys(&self, object: &Value) -> ScriptResult<Value> {
        match object {
            Value::Object(map) => {
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                Ok(Value::Array(
                    keys.into_iter().map(|k| Value::String(k.clone())).collect(),
                ))
            }
            _ => Err(type_error(format!(
                ".keys() requires map, got {}",
                object.type_name()
            ))),
        }
    }

    /// .values() - map values, ordered by key
    fn method_values(&self, object: &Value) -> ScriptResult<Value> {
        match object {
            Value::Object(map) => {
                let mut entries: Vec<(&String, &Value)> = map.iter().collect();
                entries.sort_by(|a, b| a.0.cmp(b.0));
                Ok(Value::Array(
                    entries.into_iter().map(|(_, v)| v.clone()).collect(),
                ))
            }
            _ => Err(type_error(format!(
                ".values() requires map, got {}",
                object.type_name()
            ))),
        }
    }
}

/// Render `value` according to `pattern`.
///
/// - numbers: `"0.00"` / `"#,##0.00"` (digits after the point, optional
///   thousands separators) or `"N2"` / `"F2"`
/// - dates and times: `strftime` patterns such as `"%d/%m/%Y"`
/// - anything else: `{0}` in the pattern is replaced by the value's text
pub fn format_value(value: &Value, pattern: &str) -> Result<String, RuntimeError> {
    match value {
        Value::Date(d) => render_strftime(d.format_with_items(strftime_items(pattern)?.iter()), pattern),
        Value::Time(t) => render_strftime(t.format_with_items(strftime_items(pattern)?.iter()), pattern),
        Value::Integer(_) | Value::Float(_) => format_number(value, pattern),
        Value::String(_) if value.coerce_number().is_some() && is_number_pattern(pattern) => {
            let number = value.coerce_number().unwrap_or_default();
            format_number(&number, pattern)
        }
        other => Ok(pattern.replace("{0}", &other.as_string())),
    }
}

fn strftime_items(pattern: &str) -> Result<Vec<Item<'_>>, RuntimeError> {
    let items: Vec<Item<'_>> = StrftimeItems::new(pattern).collect();
    if items.iter().any(|item| matches!(item, Item::Error)) {
        return Err(RuntimeError::Type(format!(
            "invalid date/time format '{}'",
            pattern
        )));
    }
    Ok(items)
}

/// A specifier the value cannot supply, such as `%H` on a date, fails here
/// rather than in `to_string`.
fn render_strftime(formatted: impl fmt::Display, pattern: &str) -> Result<String, RuntimeError> {
    let mut text = String::new();
    write!(text, "{}", formatted).map_err(|_| {
        RuntimeError::Type(format!("format '{}' does not apply to this value", pattern))
    })?;
    Ok(text)
}

fn is_number_pattern(pattern: &str) -> bool {
    let mut chars = pattern.chars();
    match chars.next() {
        Some('N' | 'n' | 'F' | 'f') => chars.all(|c| c.is_ascii_digit()),
        Some(_) => pattern.chars().all(|c| matches!(c, '0' | '#' | ',' | '.')),
        None => false,
    }
}

/// Decimal's maximum scale
const MAX_FORMAT_DIGITS: u32 = 28;

fn format_number(value: &Value, pattern: &str) -> Result<String, RuntimeError> {
    if !is_number_pattern(pattern) {
        return Ok(pattern.replace("{0}", &value.as_string()));
    }
    let (digits, grouped) = match pattern.chars().next() {
        Some(c @ ('N' | 'n' | 'F' | 'f')) => {
            let digits = pattern[1..].parse::<u32>().unwrap_or(2);
            (digits.min(MAX_FORMAT_DIGITS), matches!(c, 'N' | 'n'))
        }
        _ => {
            let digits = pattern
                .split_once('.')
                .map(|(_, frac)| frac.len().min(MAX_FORMAT_DIGITS as usize) as u32)
                .unwrap_or(0);
            (digits, pattern.contains(','))
        }
    };
    let decimal = value.as_decimal().ok_or_else(|| RuntimeError::Coercion {
        value: value.to_string(),
        target: "decimal",
    })?;
    let rounded = decimal.round_dp_with_strategy(digits, RoundingStrategy::MidpointAwayFromZero);
    let text = format!("{:.*}", digits as usize, rounded);
    if !grouped {
        return Ok(text);
    }

    let (sign, unsigned) = match text.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", text.as_str()),
    };
    let (whole, fraction) = match unsigned.split_once('.') {
        Some((whole, fraction)) => (whole, Some(fraction)),
        None => (unsigned, None),
    };
    let mut grouped_whole = String::new();
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped_whole.push(',');
        }
        grouped_whole.push(c);
    }
    Ok(match fraction {
        Some(fraction) => format!("{}{}.{}", sign, grouped_whole, fraction),
        None => format!("{}{}", sign, grouped_whole),
    })
}
