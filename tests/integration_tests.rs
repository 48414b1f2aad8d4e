use std::collections::HashMap;

use chrono::{NaiveDate, NaiveTime};
use pretty_assertions::assert_eq;
use tillscript::{Engine, EngineConfig, Value};

fn object(pairs: Vec<(&str, Value)>) -> Value {
    let mut map = HashMap::new();
    for (k, v) in pairs {
        map.insert(k.to_string(), v);
    }
    Value::Object(map)
}

fn strings(items: &[&str]) -> Value {
    Value::Array(items.iter().map(|s| Value::String(s.to_string())).collect())
}

fn order() -> Value {
    object(vec![(
        "Order",
        object(vec![
            ("Quantity", Value::Integer(3)),
            ("Price", Value::Float(2.5)),
            ("Table", Value::Integer(4)),
            ("Customer", Value::String("Ann".into())),
            (
                "Items",
                Value::Array(vec![
                    object(vec![("Name", "Coffee".into()), ("Price", Value::Float(2.5))]),
                    object(vec![("Name", "Cake".into()), ("Price", Value::Float(3.75))]),
                    object(vec![("Name", "Water".into()), ("Price", Value::Integer(1))]),
                ]),
            ),
        ]),
    )])
}

fn eval(expression: &str) -> Value {
    eval_with(expression, &Value::Null)
}

fn eval_with(expression: &str, data: &Value) -> Value {
    let engine = Engine::new();
    let data = (data != &Value::Null).then_some(data);
    let result = engine.evaluate(expression, data);
    assert!(result.success, "{} failed: {:?}", expression, result.error_message);
    result.value
}

fn date(y: i32, m: u32, d: u32) -> Value {
    Value::Date(NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn time(h: u32, m: u32) -> Value {
    Value::Time(NaiveTime::from_hms_opt(h, m, 0).unwrap())
}

// ============================================================================
// Evaluating against order data
// ============================================================================

#[test]
fn test_order_line_total() {
    assert_eq!(eval_with("Order.Quantity * Order.Price", &order()), Value::Float(7.5));
}

#[test]
fn test_member_access_is_case_insensitive_fallback() {
    assert_eq!(eval_with("Order.customer", &order()), Value::String("Ann".into()));
}

#[test]
fn test_missing_members_and_indexes_are_null() {
    assert_eq!(eval_with("Order.Note", &order()), Value::Null);
    assert_eq!(eval_with("Order.Items[10]", &order()), Value::Null);
    assert_eq!(
        eval_with("Order.Items[-1].Name", &order()),
        Value::String("Water".into())
    );
}

#[test]
fn test_lambdas_over_order_items() {
    let data = order();
    assert_eq!(
        eval_with("Order.Items.map(function(i) { return i.Price; }).sum()", &data),
        Value::Float(7.25)
    );
    assert_eq!(
        eval_with(
            "Order.Items.filter(function(i) { return i.Price > 2; }).map(function(i) { return i.Name; })",
            &data
        ),
        strings(&["Coffee", "Cake"])
    );
    assert_eq!(
        eval_with("Order.Items.any(function(i) { return i.Name == \"Cake\"; })", &data),
        Value::Boolean(true)
    );
}

#[test]
fn test_interpolation_with_data() {
    assert_eq!(
        eval_with(r#""Table ${Order.Table} for ${Order.Customer}""#, &order()),
        Value::String("Table 4 for Ann".into())
    );
}

// ============================================================================
// Arithmetic
// ============================================================================

#[test]
fn test_precedence() {
    assert_eq!(eval("2 + 3 * 4"), Value::Integer(14));
    assert_eq!(eval("(2 + 3) * 4"), Value::Integer(20));
    assert_eq!(eval("-2 * 3"), Value::Integer(-6));
    assert_eq!(eval("10 - 4 - 3"), Value::Integer(3));
}

#[test]
fn test_integer_division() {
    assert_eq!(eval("7 / 2"), Value::Float(3.5));
    assert_eq!(eval("8 / 2"), Value::Integer(4));
    assert_eq!(eval("7 % 3"), Value::Integer(1));
}

#[test]
fn test_decimal_arithmetic() {
    assert_eq!(eval("0.1 + 0.2"), Value::Float(0.3));
    assert_eq!(eval("0.1 + 0.2 == 0.3"), Value::Boolean(true));
    assert_eq!(eval("1.5 * 2"), Value::Integer(3));
}

#[test]
fn test_string_coercion() {
    assert_eq!(eval("\"Table \" + 4"), Value::String("Table 4".into()));
    assert_eq!(eval("\"4\" * 2"), Value::Integer(8));
    assert_eq!(eval("\"2\" + 3"), Value::Integer(5));
}

#[test]
fn test_equality() {
    assert_eq!(eval("3 == 3.0"), Value::Boolean(true));
    assert_eq!(eval("[1, 2] == [1, 2]"), Value::Boolean(true));
    assert_eq!(eval("\"3\" == 3"), Value::Boolean(false));
    assert_eq!(eval("null == null"), Value::Boolean(true));
    assert_eq!(eval("\"a\" != \"b\""), Value::Boolean(true));
}

#[test]
fn test_short_circuit() {
    assert_eq!(eval("false && undefinedName"), Value::Boolean(false));
    assert_eq!(eval("true || undefinedName"), Value::Boolean(true));

    let engine = Engine::new();
    assert!(!engine.evaluate("true && undefinedName", None).success);
}

#[test]
fn test_division_by_zero_fails_cleanly() {
    let engine = Engine::new();
    let result = engine.evaluate("1/0", None);
    assert!(!result.success);
    assert_eq!(result.value, Value::Null);
    assert!(result.error_message.unwrap().contains("division by zero"));
}

#[test]
fn test_syntax_errors_fail_cleanly() {
    let engine = Engine::new();
    let result = engine.evaluate("1 +", None);
    assert!(!result.success);
    assert!(result.error_message.unwrap().starts_with("syntax error"));
}

#[test]
fn test_integer_overflow_widens_instead_of_crashing() {
    let engine = Engine::new();
    let result = engine.evaluate("(-9223372036854775807 - 1) / -1", None);
    assert!(result.success, "{:?}", result.error_message);
    assert_eq!(result.value, Value::Float(9_223_372_036_854_775_808.0));
}

#[test]
fn test_deep_nesting_is_a_syntax_error() {
    let engine = Engine::new();
    let deep = format!("{}1{}", "(".repeat(1500), ")".repeat(1500));
    let result = engine.evaluate(&deep, None);
    assert!(!result.success);
    let message = result.error_message.unwrap();
    assert!(message.starts_with("syntax error: nesting deeper than 128"), "{}", message);

    let long_sum = vec!["1"; 5000].join(" + ");
    assert!(!engine.evaluate(&long_sum, None).success);
    let negations = format!("{}true", "!".repeat(5000));
    assert!(!engine.evaluate(&negations, None).success);

    let mut scripted = Engine::new();
    let blocks = format!("{}x = 1{}", "{ ".repeat(5000), " }".repeat(5000));
    assert!(!scripted.execute(&blocks).success);

    let nested = format!("{}1{}", "(".repeat(10), ")".repeat(10));
    assert_eq!(engine.evaluate(&nested, None).value, Value::Integer(1));
    let strict = Engine::with_config(EngineConfig {
        max_nesting_depth: 8,
        ..EngineConfig::default()
    });
    assert!(!strict.evaluate(&nested, None).success);
}

// ============================================================================
// Dates and times
// ============================================================================

#[test]
fn test_date_arithmetic() {
    assert_eq!(eval("#2024-03-01# + 2 days"), date(2024, 3, 3));
    assert_eq!(eval("Date(2024, 3, 1) + 30"), date(2024, 3, 31));
    assert_eq!(eval("#2024-03-10# - #2024-03-01#"), Value::Integer(9));
    assert_eq!(eval("#2024-03-01# - 1"), date(2024, 2, 29));
    assert_eq!(eval("#2024-03-01# < #2024-03-02#"), Value::Boolean(true));
}

#[test]
fn test_time_arithmetic() {
    assert_eq!(eval("#09:00# + 90 minutes"), time(10, 30));
    assert_eq!(eval("#23:30# + 1 hours"), time(0, 30));
    assert_eq!(eval("#10:15# - #09:00#"), Value::Integer(75));
    assert_eq!(eval("Time(14, 30)"), time(14, 30));
}

#[test]
fn test_today_needs_no_parentheses() {
    assert_eq!(eval("Today == Today()"), Value::Boolean(true));
    assert_eq!(eval("Today.type()"), Value::String("date".into()));
}

#[test]
fn test_unset_names_do_not_call_functions() {
    let engine = Engine::new();
    let result = engine.evaluate("total + 5", None);
    assert!(!result.success);
    assert!(result.error_message.unwrap().contains("unknown identifier 'total'"));
    assert!(!engine.evaluate("max", None).success);
    assert_eq!(eval("Total()"), Value::Integer(0));
}

#[test]
fn test_formats_a_value_cannot_supply_fail_cleanly() {
    let engine = Engine::new();
    assert!(!engine.evaluate("#2024-03-01#.format(\"%H:%M\")", None).success);
    assert!(!engine.evaluate("Format(#14:30#, \"%Y\")", None).success);
    assert_eq!(
        engine.replace_expression_values("Printed [=Format(Now, \"%Y\")]", None),
        "Printed "
    );
    assert_eq!(eval("#14:30#.format(\"%H.%M\")"), Value::String("14.30".into()));
}

// ============================================================================
// Methods and standard functions
// ============================================================================

#[test]
fn test_array_methods() {
    assert_eq!(
        eval("[3, 1, 2].sort()"),
        Value::Array(vec![Value::Integer(1), Value::Integer(2), Value::Integer(3)])
    );
    assert_eq!(eval("[1, 2, 3].sum()"), Value::Integer(6));
    assert_eq!(eval("[1, 2, 3, 4].avg()"), Value::Float(2.5));
    assert_eq!(eval("[1, 2, 2, 3].unique().count()"), Value::Integer(3));
    assert_eq!(eval("[1, 2].length"), Value::Integer(2));
    assert_eq!(eval("[\"a\", \"b\"].join(\"-\")"), Value::String("a-b".into()));
    assert_eq!(
        eval("[1, 2, 3, 4].filter(function(x) { return x % 2 == 0; })"),
        Value::Array(vec![Value::Integer(2), Value::Integer(4)])
    );
}

#[test]
fn test_string_methods() {
    assert_eq!(eval("\"Coffee\".upper()"), Value::String("COFFEE".into()));
    assert_eq!(eval("\"a,b\".split(\",\")"), strings(&["a", "b"]));
    assert_eq!(eval("\"hello\".length()"), Value::Integer(5));
    assert_eq!(eval("\"  x \".trim()"), Value::String("x".into()));
    assert_eq!(eval("\"AB12\".matches(\"^[A-Z]+[0-9]+$\")"), Value::Boolean(true));
    assert_eq!(eval("\"Espresso\".STARTSWITH(\"Esp\")"), Value::Boolean(true));
}

#[test]
fn test_map_methods() {
    assert_eq!(eval("{b: 1, a: 2}.keys()"), strings(&["a", "b"]));
    assert_eq!(
        eval("{b: 1, a: 2}.values()"),
        Value::Array(vec![Value::Integer(2), Value::Integer(1)])
    );
}

#[test]
fn test_unknown_method_fails() {
    let engine = Engine::new();
    assert!(!engine.evaluate("[1].frobnicate()", None).success);
}

#[test]
fn test_round() {
    assert_eq!(eval("Round(2.345, 2)"), Value::Float(2.35));
    assert_eq!(eval("Round(v: 2.5)"), Value::Integer(3));
    assert_eq!(eval("round(d: 1, v: 2.25)"), Value::Float(2.3));
    assert_eq!(eval("ROUND(-2.5)"), Value::Integer(-3));
}

#[test]
fn test_standard_functions() {
    assert_eq!(eval("Max(1, [5, 3], 2)"), Value::Integer(5));
    assert_eq!(eval("Min(4, 2.5)"), Value::Float(2.5));
    assert_eq!(eval("Total(1, 2, 3)"), Value::Integer(6));
    assert_eq!(eval("IsNull(null, \"-\")"), Value::String("-".into()));
    assert_eq!(eval("Num(\"x\", 0)"), Value::Integer(0));
    assert_eq!(eval("Num(\"12.5\")"), Value::Float(12.5));
    assert_eq!(eval("Len(\"abc\")"), Value::Integer(3));
    assert_eq!(eval("Abs(-3)"), Value::Integer(3));
    assert_eq!(eval("Format(1234.5, \"N2\")"), Value::String("1,234.50".into()));
    assert_eq!(eval("Str(12) + 3"), Value::Integer(15));
}

#[test]
fn test_binding_errors() {
    let engine = Engine::new();
    let missing = engine.evaluate("Round()", None);
    assert!(!missing.success);
    assert!(missing.error_message.unwrap().contains("missing required argument"));

    let unknown = engine.evaluate("Round(2.5, places: 1)", None);
    assert!(unknown.error_message.unwrap().contains("no argument named 'places'"));

    assert!(!engine.evaluate("NoSuchFunction(1)", None).success);
    assert!(!engine.evaluate("Date(2024, 2, 30)", None).success);
}

// ============================================================================
// Engine state
// ============================================================================

#[test]
fn test_evaluate_does_not_persist_assignments() {
    let engine = Engine::new();
    assert_eq!(engine.evaluate("x = 5", None).value, Value::Integer(5));
    assert!(engine.memory().get("x").is_none());
    assert!(engine.memory().get("result").is_none());
}

#[test]
fn test_execute_persists_globals() {
    let mut engine = Engine::new();
    assert!(engine.execute("var total = 10").success);
    assert_eq!(engine.execute("total + 1").value, Value::Integer(11));
    assert_eq!(engine.evaluate("total * 2", None).value, Value::Integer(20));

    engine.execute("result = \"12\"");
    assert_eq!(engine.memory().get_as::<i64>("result"), Some(12));
    assert_eq!(engine.memory().get_as::<String>("result"), Some("12".to_string()));
}

#[test]
fn test_evaluate_as() {
    let engine = Engine::new();
    assert_eq!(engine.evaluate_as::<f64>("2 * 3", None, 0.0), 6.0);
    assert_eq!(engine.evaluate_as::<i64>("1 / 0", None, -1), -1);
    assert_eq!(engine.evaluate_as::<bool>("Order.Quantity > 2", Some(&order()), false), true);
    assert_eq!(
        engine.evaluate_as::<NaiveDate>("\"not a date\"", None, NaiveDate::MIN),
        NaiveDate::MIN
    );
}

#[test]
fn test_evaluation_is_deterministic() {
    let engine = Engine::new();
    let data = order();
    let first = engine.evaluate("Order.Items.map(function(i) { return i.Name; }).join()", Some(&data));
    let second = engine.evaluate("Order.Items.map(function(i) { return i.Name; }).join()", Some(&data));
    assert_eq!(first, second);
    assert_eq!(first.value, Value::String("Coffee,Cake,Water".into()));
}

#[test]
fn test_concurrent_evaluation() {
    let engine = Engine::new();
    let data = order();
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|n| {
                let engine = &engine;
                let data = &data;
                scope.spawn(move || {
                    engine
                        .evaluate(&format!("Order.Quantity * {}", n), Some(data))
                        .value
                })
            })
            .collect();
        for (n, handle) in handles.into_iter().enumerate() {
            assert_eq!(handle.join().unwrap(), Value::Integer(3 * n as i64));
        }
    });
}
