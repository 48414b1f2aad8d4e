//! Functions every engine starts with. They are registered through the same
//! [`FunctionRegistry::register`] path a host uses for its own functions.

use chrono::{Local, NaiveDate, NaiveTime, Timelike};

use crate::{
    ast::BinOp,
    error::{BindError, HostError},
    evaluator::{apply_binop, compare_values, round_number},
    methods::format_value,
    registry::{Arg, ArgType, FunctionMetaData, FunctionRegistry},
    value::Value,
};

/// Argument at `index`, or null when absent.
fn arg(args: &[Value], index: usize) -> &Value {
    args.get(index).unwrap_or(&Value::Null)
}

fn int_arg(function: &str, args: &[Value], index: usize) -> Result<i64, HostError> {
    arg(args, index)
        .as_int()
        .ok_or_else(|| HostError::new(function, format!("argument {} must be a number", index + 1)))
}

/// Wildcard arguments with arrays spread into their elements.
fn spread(args: &[Value]) -> Vec<Value> {
    let mut values = Vec::new();
    for value in args {
        match value {
            Value::Array(items) => values.extend(items.iter().cloned()),
            Value::Null => {}
            other => values.push(other.clone()),
        }
    }
    values
}

fn extreme(function: &str, args: &[Value], wanted: std::cmp::Ordering) -> Result<Value, HostError> {
    let mut best: Option<Value> = None;
    for value in spread(args) {
        best = match best {
            None => Some(value),
            Some(current) => match compare_values(&value, &current) {
                Some(ordering) if ordering == wanted => Some(value),
                Some(_) => Some(current),
                None => {
                    return Err(HostError::new(
                        function,
                        format!("cannot compare {} with {}", value.type_name(), current.type_name()),
                    ));
                }
            },
        };
    }
    Ok(best.unwrap_or(Value::Null))
}

pub fn register_builtins(functions: &mut FunctionRegistry) -> Result<(), BindError> {
    // Numbers
    functions.register(
        FunctionMetaData::new("Round")
            .arg(Arg::required("value", ArgType::Number).alias("v").example("Round(2.345, 2)"))
            .arg(Arg::optional("digits", ArgType::Number, 0).alias("d").example("Round(value: 2.5)"))
            .returns(ArgType::Number)
            .describe("Round half away from zero to the given number of decimal places"),
        |args| {
            let digits = int_arg("Round", args, 1)?;
            let digits = u32::try_from(digits)
                .map_err(|_| HostError::new("Round", "digits must not be negative"))?;
            match arg(args, 0) {
                Value::Null => Ok(Value::Null),
                value => round_number(value, digits)
                    .ok_or_else(|| HostError::new("Round", "value is out of range")),
            }
        },
    )?;

    functions.register(
        FunctionMetaData::new("Abs")
            .arg(Arg::required("value", ArgType::Number).example("Abs(-3)"))
            .returns(ArgType::Number)
            .describe("Absolute value"),
        |args| match arg(args, 0) {
            Value::Integer(n) => Ok(n
                .checked_abs()
                .map(Value::Integer)
                .unwrap_or(Value::Float((*n as f64).abs()))),
            Value::Float(n) => Ok(Value::Float(n.abs())),
            _ => Ok(Value::Null),
        },
    )?;

    functions.register(
        FunctionMetaData::new("Min")
            .wildcard()
            .returns(ArgType::Any)
            .describe("Smallest of the arguments; arrays are searched element by element"),
        |args| extreme("Min", args, std::cmp::Ordering::Less),
    )?;

    functions.register(
        FunctionMetaData::new("Max")
            .wildcard()
            .returns(ArgType::Any)
            .describe("Largest of the arguments; arrays are searched element by element"),
        |args| extreme("Max", args, std::cmp::Ordering::Greater),
    )?;

    functions.register(
        FunctionMetaData::new("Sum")
            .alias("Total")
            .wildcard()
            .returns(ArgType::Number)
            .describe("Sum of the arguments; arrays are summed element by element"),
        |args| {
            let mut total = Value::Integer(0);
            for value in spread(args) {
                total = apply_binop(BinOp::Add, &total, &value)
                    .ok()
                    .filter(Value::is_number)
                    .ok_or_else(|| {
                        HostError::new("Sum", format!("cannot add {}", value.type_name()))
                    })?;
            }
            Ok(total)
        },
    )?;

    functions.register(
        FunctionMetaData::new("Num")
            .alias("Number")
            .alias("ToNumber")
            .arg(Arg::required("value", ArgType::Any).example("Num(\"12.5\")"))
            .arg(Arg::optional("fallback", ArgType::Any, 0))
            .returns(ArgType::Number)
            .describe("Convert to a number, or return the fallback"),
        |args| Ok(arg(args, 0).coerce_number().unwrap_or_else(|| arg(args, 1).clone())),
    )?;

    // Text
    functions.register(
        FunctionMetaData::new("Str")
            .alias("Text")
            .alias("ToString")
            .arg(Arg::required("value", ArgType::Any).example("Str(12)"))
            .returns(ArgType::Text)
            .describe("Text form of a value"),
        |args| Ok(Value::String(arg(args, 0).as_string())),
    )?;

    functions.register(
        FunctionMetaData::new("Len")
            .alias("Length")
            .arg(Arg::required("value", ArgType::Any).example("Len(\"Coffee\")"))
            .returns(ArgType::Number)
            .describe("Length of a string, array or map"),
        |args| {
            let length = match arg(args, 0) {
                Value::String(s) => s.chars().count(),
                Value::Array(items) => items.len(),
                Value::Object(map) => map.len(),
                Value::Null => 0,
                other => other.as_string().chars().count(),
            };
            Ok(Value::Integer(length as i64))
        },
    )?;

    functions.register(
        FunctionMetaData::new("Upper")
            .arg(Arg::required("text", ArgType::Text).example("Upper(\"table 4\")"))
            .returns(ArgType::Text)
            .describe("Upper-case text"),
        |args| Ok(Value::String(arg(args, 0).as_string().to_uppercase())),
    )?;

    functions.register(
        FunctionMetaData::new("Lower")
            .arg(Arg::required("text", ArgType::Text))
            .returns(ArgType::Text)
            .describe("Lower-case text"),
        |args| Ok(Value::String(arg(args, 0).as_string().to_lowercase())),
    )?;

    functions.register(
        FunctionMetaData::new("Format")
            .arg(Arg::required("value", ArgType::Any).example("Format(1234.5, \"N2\")"))
            .arg(
                Arg::required("pattern", ArgType::Text)
                    .alias("p")
                    .example("Format(Today, \"%d/%m/%Y\")"),
            )
            .returns(ArgType::Text)
            .describe("Format a number, date or time with a pattern"),
        |args| {
            format_value(arg(args, 0), &arg(args, 1).as_string())
                .map(Value::String)
                .map_err(|e| HostError::new("Format", e.to_string()))
        },
    )?;

    functions.register(
        FunctionMetaData::new("IsNull")
            .alias("Coalesce")
            .arg(Arg::required("value", ArgType::Any).example("IsNull(Order.Note, \"-\")"))
            .arg(Arg::required("fallback", ArgType::Any))
            .returns(ArgType::Any)
            .describe("The value, or the fallback when the value is null or empty text"),
        |args| match arg(args, 0) {
            Value::Null => Ok(arg(args, 1).clone()),
            Value::String(s) if s.is_empty() => Ok(arg(args, 1).clone()),
            value => Ok(value.clone()),
        },
    )?;

    // Dates and times
    functions.register(
        FunctionMetaData::new("Today")
            .bare()
            .returns(ArgType::Date)
            .describe("Current local date"),
        |_| Ok(Value::Date(Local::now().date_naive())),
    )?;

    functions.register(
        FunctionMetaData::new("Now")
            .bare()
            .returns(ArgType::Time)
            .describe("Current local time of day, to the second"),
        |_| {
            let now = Local::now().time();
            Ok(Value::Time(now.with_nanosecond(0).unwrap_or(now)))
        },
    )?;

    functions.register(
        FunctionMetaData::new("Date")
            .arg(Arg::required("year", ArgType::Number).alias("y").example("Date(2024, 3, 1)"))
            .arg(Arg::required("month", ArgType::Number).alias("m"))
            .arg(Arg::required("day", ArgType::Number).alias("d"))
            .returns(ArgType::Date)
            .describe("Build a date"),
        |args| {
            let year = int_arg("Date", args, 0)?;
            let month = int_arg("Date", args, 1)?;
            let day = int_arg("Date", args, 2)?;
            i32::try_from(year)
                .ok()
                .zip(u32::try_from(month).ok())
                .zip(u32::try_from(day).ok())
                .and_then(|((y, m), d)| NaiveDate::from_ymd_opt(y, m, d))
                .map(Value::Date)
                .ok_or_else(|| {
                    HostError::new("Date", format!("invalid date {}-{}-{}", year, month, day))
                })
        },
    )?;

    functions.register(
        FunctionMetaData::new("Time")
            .arg(Arg::required("hour", ArgType::Number).alias("h").example("Time(14, 30)"))
            .arg(Arg::optional("minute", ArgType::Number, 0).alias("m"))
            .returns(ArgType::Time)
            .describe("Build a time of day"),
        |args| {
            let hour = int_arg("Time", args, 0)?;
            let minute = int_arg("Time", args, 1)?;
            u32::try_from(hour)
                .ok()
                .zip(u32::try_from(minute).ok())
                .and_then(|(h, m)| NaiveTime::from_hms_opt(h, m, 0))
                .map(Value::Time)
                .ok_or_else(|| HostError::new("Time", format!("invalid time {}:{}", hour, minute)))
        },
    )?;

    // Duration suffixes. Dates count in days and times in minutes, so each
    // suffix converts to the unit it will be added to.
    functions.register(
        FunctionMetaData::new("days")
            .alias("day")
            .arg(Arg::required("count", ArgType::Number).example("Today + 3 days"))
            .suffixable()
            .returns(ArgType::Number)
            .describe("Number of days, for date arithmetic"),
        |args| Ok(arg(args, 0).clone()),
    )?;

    functions.register(
        FunctionMetaData::new("hours")
            .alias("hour")
            .arg(Arg::required("count", ArgType::Number).example("#12:00# + 2 hours"))
            .suffixable()
            .returns(ArgType::Number)
            .describe("Hours expressed in minutes, for time arithmetic"),
        |args| {
            apply_binop(BinOp::Multiply, arg(args, 0), &Value::Integer(60))
                .map_err(|e| HostError::new("hours", e.to_string()))
        },
    )?;

    functions.register(
        FunctionMetaData::new("minutes")
            .alias("minute")
            .alias("mins")
            .arg(Arg::required("count", ArgType::Number).example("#12:00# + 30 minutes"))
            .suffixable()
            .returns(ArgType::Number)
            .describe("Number of minutes, for time arithmetic"),
        |args| Ok(arg(args, 0).clone()),
    )?;

    Ok(())
}
