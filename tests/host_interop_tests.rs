use std::collections::HashMap;

use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use tillscript::registry::{Arg, ArgType, FunctionMetaData, NativeType};
use tillscript::{Engine, HostError, Instance, Value};

fn discount_type() -> NativeType {
    NativeType::new("Discount")
        .constructor(
            FunctionMetaData::new("Discount").arg(Arg::required("rate", ArgType::Number)),
            |args| Ok(HashMap::from([("Rate".to_string(), args[0].clone())])),
        )
        .property_with_setter(
            "Rate",
            |this| Ok(this.field("Rate").unwrap_or_default()),
            |this, value| match value.as_float() {
                Some(rate) if (0.0..=1.0).contains(&rate) => {
                    this.set_field("Rate", value);
                    Ok(())
                }
                _ => Err(HostError::new("Discount", "rate must be between 0 and 1")),
            },
        )
        .property("Percent", |this| {
            let rate = this.field("Rate").and_then(|r| r.as_float()).unwrap_or_default();
            Ok(Value::Float(rate * 100.0))
        })
        .method(
            FunctionMetaData::new("Apply").arg(Arg::required("amount", ArgType::Number).alias("a")),
            |this, args| {
                let rate = this.field("Rate").and_then(|r| r.as_float()).unwrap_or_default();
                let amount = args[0].as_float().unwrap_or_default();
                Ok(Value::Float(amount * rate))
            },
        )
}

fn engine_with_discount() -> Engine {
    let mut engine = Engine::new();
    engine.register_type(discount_type(), None);
    engine
}

fn pair_engine() -> Engine {
    let mut engine = Engine::new();
    engine
        .register_function(
            FunctionMetaData::new("Pair")
                .arg(Arg::any("first").alias("a"))
                .arg(Arg::optional("second", ArgType::Any, "-").alias("b")),
            |args| Ok(Value::Array(args.to_vec())),
        )
        .unwrap();
    engine
}

fn pair(first: Value, second: Value) -> Value {
    Value::Array(vec![first, second])
}

// ============================================================================
// Native functions
// ============================================================================

#[test]
fn test_arguments_bind_by_position_name_and_alias() {
    let engine = pair_engine();
    let expected = pair(Value::Integer(1), Value::Integer(2));
    assert_eq!(engine.evaluate("Pair(1, 2)", None).value, expected);
    assert_eq!(engine.evaluate("Pair(second: 2, first: 1)", None).value, expected);
    assert_eq!(engine.evaluate("pair(B: 2, a: 1)", None).value, expected);
    assert_eq!(
        engine.evaluate("PAIR(1)", None).value,
        pair(Value::Integer(1), Value::String("-".into()))
    );
}

#[test]
fn test_binding_failures() {
    let engine = pair_engine();
    let message = |expression: &str| {
        let result = engine.evaluate(expression, None);
        assert!(!result.success, "{} should fail", expression);
        result.error_message.unwrap_or_default()
    };

    assert!(message("Pair()").contains("missing required argument 'first'"));
    assert!(message("Pair(1, 2, 3)").contains("takes at most 2 arguments, got 3"));
    assert!(message("Pair(1, first: 2)").contains("given more than once"));
    assert!(message("Pair(a: 1, 2)").contains("positional argument after named"));
    assert!(message("Pair(1, third: 2)").contains("no argument named 'third'"));
}

#[test]
fn test_invalid_metadata_is_rejected() {
    let mut engine = Engine::new();
    let result = engine.register_function(
        FunctionMetaData::new("Broken")
            .arg(Arg::any("value"))
            .arg(Arg::any("other").alias("VALUE")),
        |_| Ok(Value::Null),
    );
    assert!(result.is_err());
    assert!(!engine.functions().contains("Broken"));
}

#[test]
fn test_arguments_are_coerced_to_declared_types() {
    let mut engine = Engine::new();
    engine
        .register_function(
            FunctionMetaData::new("Describe")
                .arg(Arg::required("count", ArgType::Number))
                .arg(Arg::required("label", ArgType::Text))
                .arg(Arg::required("day", ArgType::Date)),
            |args| Ok(Value::Array(args.to_vec())),
        )
        .unwrap();

    assert_eq!(
        engine.evaluate("Describe(\"12\", 5, \"2024-03-01\")", None).value,
        Value::Array(vec![
            Value::Integer(12),
            Value::String("5".into()),
            Value::Date(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()),
        ])
    );

    let failed = engine.evaluate("Describe(\"many\", 5, Today)", None);
    assert!(failed.error_message.unwrap().contains("cannot convert string to number"));
}

#[test]
fn test_wildcard_functions_receive_extra_arguments() {
    let mut engine = Engine::new();
    engine
        .register_function(
            FunctionMetaData::new("Concat")
                .arg(Arg::required("separator", ArgType::Text))
                .wildcard(),
            |args| {
                let parts: Vec<String> = args[1..].iter().map(Value::as_string).collect();
                Ok(Value::String(parts.join(&args[0].as_string())))
            },
        )
        .unwrap();
    assert_eq!(
        engine.evaluate("Concat(\"/\", \"a\", 2, true)", None).value,
        Value::String("a/2/true".into())
    );
}

#[test]
fn test_suffixable_host_function() {
    let mut engine = Engine::new();
    engine
        .register_function(
            FunctionMetaData::new("percent")
                .alias("pct")
                .arg(Arg::required("value", ArgType::Number))
                .suffixable(),
            |args| Ok(Value::Float(args[0].as_float().unwrap_or_default() / 100.0)),
        )
        .unwrap();

    assert_eq!(engine.evaluate("200 * 10 pct", None).value, Value::Integer(20));
    assert_eq!(engine.evaluate("50 percent", None).value, Value::Float(0.5));

    let not_suffix = engine.evaluate("2.5 round", None);
    assert!(not_suffix.error_message.unwrap().contains("cannot be used as a suffix"));
}

#[test]
fn test_host_errors_are_reported_and_catchable() {
    let mut engine = Engine::new();
    engine
        .register_function(
            FunctionMetaData::new("Stock").arg(Arg::any("item")),
            |args| Err(HostError::new("Stock", format!("unknown item {}", args[0]))),
        )
        .unwrap();

    let failed = engine.evaluate("Stock(\"Cake\")", None);
    assert_eq!(
        failed.error_message.as_deref(),
        Some("host error: Stock: unknown item Cake")
    );

    let caught = engine.execute("var message; try { Stock(9) } catch (e) { message = e }; message");
    assert_eq!(caught.value, Value::String("Stock: unknown item 9".into()));
}

#[test]
fn test_registration_replaces_cached_parses() {
    let mut engine = Engine::new();
    assert!(!engine.evaluate("Double(2)", None).success);
    engine
        .register_function(
            FunctionMetaData::new("Double").arg(Arg::required("n", ArgType::Number)),
            |args| Ok(Value::Integer(args[0].as_int().unwrap_or_default() * 2)),
        )
        .unwrap();
    assert_eq!(engine.evaluate("Double(2)", None).value, Value::Integer(4));
}

// ============================================================================
// Native types
// ============================================================================

#[test]
fn test_construct_and_read_properties() {
    let mut engine = engine_with_discount();
    let outcome = engine.execute(
        "var d = new Discount(0.25)
         result = [d.Rate, d.Percent, d.Apply(40), d.apply(a: 8)]",
    );
    assert!(outcome.success, "{:?}", outcome.error_message);
    assert_eq!(
        engine.memory().get("result"),
        Some(&Value::Array(vec![
            Value::Float(0.25),
            Value::Float(25.0),
            Value::Float(10.0),
            Value::Float(2.0),
        ]))
    );
}

#[test]
fn test_property_setters_and_read_only_properties() {
    let mut engine = engine_with_discount();
    engine.execute("var d = new Discount(0.25)");

    assert!(engine.execute("d.Rate = 0.5").success);
    assert_eq!(engine.execute("d.Percent").value, Value::Float(50.0));

    let rejected = engine.execute("d.Rate = 2");
    assert!(rejected.error_message.unwrap().contains("rate must be between 0 and 1"));

    let read_only = engine.execute("d.Percent = 10");
    assert!(read_only.error_message.unwrap().contains("read-only"));

    // Members without a property fall back to instance fields
    assert!(engine.execute("d.Note = \"staff\"").success);
    assert_eq!(engine.execute("d.note").value, Value::String("staff".into()));
}

#[test]
fn test_instances_have_reference_semantics() {
    let mut engine = engine_with_discount();
    engine.execute(
        "var a = new Discount(0.25)
         var b = a
         b.Rate = 0.5",
    );
    assert_eq!(engine.execute("a.Rate").value, Value::Float(0.5));
    assert_eq!(engine.execute("a == b").value, Value::Boolean(true));
    assert_eq!(
        engine.execute("new Discount(0.1) == new Discount(0.1)").value,
        Value::Boolean(false)
    );
}

#[test]
fn test_type_alias_and_unknown_types() {
    let mut engine = Engine::new();
    engine.register_type(discount_type(), Some("Rabatt"));

    let value = engine.evaluate("new rabatt(0.5)", None).value;
    match value {
        Value::Instance(instance) => assert_eq!(&*instance.type_name, "Rabatt"),
        other => panic!("expected instance, got {:?}", other),
    }
    assert_eq!(
        engine.evaluate("new Rabatt(0.5).type()", None).value,
        Value::String("object".into())
    );

    let unknown = engine.evaluate("new Voucher()", None);
    assert!(unknown.error_message.unwrap().contains("unknown type 'Voucher'"));
}

#[test]
fn test_unknown_instance_member_is_an_error() {
    let engine = engine_with_discount();
    assert!(!engine.evaluate("new Discount(0.1).Missing", None).success);
    assert!(!engine.evaluate("new Discount(0.1).Missing()", None).success);
}

#[test]
fn test_instance_data_binds_its_fields() {
    let engine = Engine::new();
    let order = Instance::new(
        "Order",
        HashMap::from([
            ("Quantity".to_string(), Value::Integer(3)),
            ("Price".to_string(), Value::Float(2.5)),
        ]),
    );
    assert_eq!(
        engine.evaluate("Quantity * Price", Some(&Value::Instance(order))).value,
        Value::Float(7.5)
    );
    // Anything that is not a map or instance is bound as `data`
    assert_eq!(
        engine.evaluate("data * 2", Some(&Value::Integer(21))).value,
        Value::Integer(42)
    );
}

// ============================================================================
// Words, lexical replacement and host-owned memory
// ============================================================================

#[test]
fn test_registered_words() {
    let mut engine = Engine::new();
    engine.register_word("Vat", Value::Float(0.2));
    assert_eq!(engine.evaluate("100 * vat", None).value, Value::Integer(20));
    assert_eq!(engine.evaluate("VAT", None).value, Value::Float(0.2));
}

#[test]
fn test_lexical_replacement_renames_data() {
    let mut engine = Engine::new();
    engine.lex_replace("Order", "CurrentOrder");
    let data = Value::Object(HashMap::from([(
        "Order".to_string(),
        Value::Object(HashMap::from([("Quantity".to_string(), Value::Integer(3))])),
    )]));

    assert_eq!(engine.evaluate("Order.Quantity * 2", Some(&data)).value, Value::Integer(6));
    assert_eq!(engine.evaluate("CurrentOrder.Quantity", Some(&data)).value, Value::Integer(3));
}

#[test]
fn test_lexical_replacement_of_keywords() {
    let mut engine = Engine::new();
    engine.lex_replace("wenn", "if");
    engine.lex_replace("sonst", "else");
    let outcome = engine.execute("var r = 0; wenn (1 > 2) r = 1 sonst r = 2; r");
    assert_eq!(outcome.value, Value::Integer(2));
}

#[test]
fn test_host_seeded_globals() {
    let mut engine = Engine::new();
    engine.memory_mut().set_global("TableCount", Value::Integer(12));
    assert_eq!(engine.evaluate("TableCount - 2", None).value, Value::Integer(10));

    engine.execute("var occupied = TableCount / 4");
    assert_eq!(engine.memory().get_as::<i64>("occupied"), Some(3));
    assert_eq!(engine.memory().get_as::<f64>("occupied"), Some(3.0));
    assert_eq!(engine.memory().get_as::<i64>("missing"), None);
}
