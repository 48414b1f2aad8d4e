use pretty_assertions::assert_eq;
use tillscript::{Engine, EngineConfig, Value};

/// Run `script` on a fresh engine and return the final value of `result`.
fn result_of(script: &str) -> Value {
    let mut engine = Engine::new();
    let outcome = engine.execute(script);
    assert!(outcome.success, "script failed: {:?}", outcome.error_message);
    engine.memory().get("result").cloned().unwrap_or_default()
}

fn failure_of(script: &str) -> String {
    let mut engine = Engine::new();
    let outcome = engine.execute(script);
    assert!(!outcome.success, "script unexpectedly succeeded");
    assert_eq!(outcome.value, Value::Null);
    outcome.error_message.unwrap_or_default()
}

#[test]
fn test_while_loop() {
    assert_eq!(
        result_of("var i = 0; while (i < 3) { i = i + 1; }; result = i"),
        Value::Integer(3)
    );
}

#[test]
fn test_loop_body_variables_do_not_outlive_the_loop() {
    let mut engine = Engine::new();
    let outcome = engine.execute(
        "var i = 0
         while (i < 2) { scratch = i * 10; i++ }",
    );
    assert!(outcome.success);
    assert_eq!(engine.memory().get("i"), Some(&Value::Integer(2)));
    assert!(engine.memory().get("scratch").is_none());
    assert!(!engine.execute("scratch + 1").success);
}

#[test]
fn test_counting_for_loop() {
    let mut engine = Engine::new();
    engine.execute("var total = 0; for (var i = 1; i <= 4; i++) { total += i }");
    assert_eq!(engine.memory().get("total"), Some(&Value::Integer(10)));
    assert!(engine.memory().get("i").is_none());
}

#[test]
fn test_for_in_over_lists_maps_and_strings() {
    assert_eq!(
        result_of("result = 0; for (price in [2.5, 3.75, 1]) { result += price }"),
        Value::Float(7.25)
    );
    assert_eq!(
        result_of("result = \"\"; for (k in {b: 1, a: 2, c: 3}) { result = result + k }"),
        Value::String("abc".into())
    );
    assert_eq!(
        result_of("result = 0; for (c in \"till\") result++"),
        Value::Integer(4)
    );
}

#[test]
fn test_break_and_continue() {
    assert_eq!(
        result_of(
            "result = 0
             for (x in [1, 2, 3, 4, 5]) {
                 if (x == 2) continue;
                 if (x == 4) break;
                 result += x
             }"
        ),
        Value::Integer(4)
    );
}

#[test]
fn test_break_leaves_only_the_inner_loop() {
    assert_eq!(
        result_of(
            "var result = 0
             for (var i = 0; i < 3; i++) {
                 for (var j = 0; j < 3; j++) {
                     if (j == 1) { break; }
                     result++
                 }
             }"
        ),
        Value::Integer(3)
    );
}

#[test]
fn test_return_inside_loop_ends_only_the_function() {
    let mut engine = Engine::new();
    let outcome = engine.execute(
        "function firstOver(limit) {
             for (x in [1, 2, 3]) {
                 if (x > limit) return x * 10;
             }
             return 0;
         }
         var result = firstOver(1) + 1
         var after = \"ran\"",
    );
    assert!(outcome.success, "{:?}", outcome.error_message);
    assert_eq!(engine.memory().get("result"), Some(&Value::Integer(21)));
    assert_eq!(engine.memory().get("after"), Some(&Value::String("ran".into())));
    assert_eq!(engine.execute("firstOver(5)").value, Value::Integer(0));
}

#[test]
fn test_compound_assignment_evaluates_the_index_once() {
    let mut engine = Engine::new();
    engine.execute(
        "var prices = [10, 20, 30]
         var i = 0
         prices[i++] += 5
         prices[i++]++",
    );
    assert_eq!(engine.memory().get("i"), Some(&Value::Integer(2)));
    assert_eq!(
        engine.memory().get("prices"),
        Some(&Value::Array(vec![
            Value::Integer(15),
            Value::Integer(21),
            Value::Integer(30)
        ]))
    );
}

#[test]
fn test_if_else_forms() {
    assert_eq!(
        result_of("var result; var total = 120; if (total > 100) result = 10 else result = 0"),
        Value::Integer(10)
    );
    assert_eq!(
        result_of("var result; var total = 80; if total > 100 then result = 10 else result = 0"),
        Value::Integer(0)
    );
    assert_eq!(
        result_of(
            "var result, total = 80
             if (total > 100) {
                 result = \"large\"
             } else if (total > 50) {
                 result = \"medium\"
             } else {
                 result = \"small\"
             }"
        ),
        Value::String("medium".into())
    );
}

#[test]
fn test_functions_with_defaults_and_named_arguments() {
    let mut engine = Engine::new();
    engine.execute("function tax(amount, rate = 0.2) { return amount * rate; }");
    assert_eq!(engine.execute("tax(10)").value, Value::Integer(2));
    assert_eq!(engine.execute("tax(10, rate: 0.5)").value, Value::Integer(5));
    assert_eq!(engine.execute("tax(amount: 25)").value, Value::Integer(5));
    // Declared functions stay callable from later evaluations
    assert_eq!(engine.evaluate("tax(100)", None).value, Value::Integer(20));
}

#[test]
fn test_recursion() {
    assert_eq!(
        result_of(
            "function fact(n) {
                 if (n <= 1) return 1;
                 return n * fact(n - 1);
             }
             result = fact(5)"
        ),
        Value::Integer(120)
    );
}

#[test]
fn test_runaway_recursion_is_stopped() {
    let message = failure_of("function down(n) { return down(n + 1); } down(0)");
    assert!(message.contains("maximum call depth of 64"), "{}", message);

    let mut engine = Engine::with_config(EngineConfig {
        max_call_depth: 5,
        ..EngineConfig::default()
    });
    engine.execute("function depth(n) { if (n == 0) return 0; return 1 + depth(n - 1); }");
    assert_eq!(engine.execute("depth(4)").value, Value::Integer(4));
    assert!(!engine.execute("depth(5)").success);
}

#[test]
fn test_functions_see_globals_but_not_caller_locals() {
    let mut engine = Engine::new();
    engine.execute(
        "var rate = 0.1
         function discount(amount) { return amount * rate; }
         function outer() { var rate = 0.5; return discount(100); }",
    );
    assert_eq!(engine.execute("outer()").value, Value::Integer(10));
}

#[test]
fn test_assignment_inside_function_updates_global() {
    let mut engine = Engine::new();
    engine.execute(
        "var closed = 0
         function close(table) { closed = table; }
         run close(4)",
    );
    assert_eq!(engine.memory().get("closed"), Some(&Value::Integer(4)));
}

#[test]
fn test_lambdas_capture_their_scope() {
    assert_eq!(
        result_of(
            "function adder(n) { return function(x) { return x + n; }; }
             var addTwo = adder(2)
             result = addTwo(3)"
        ),
        Value::Integer(5)
    );
    assert_eq!(
        result_of("var double = function(x) { return x * 2; }; result = double(4)"),
        Value::Integer(8)
    );
}

#[test]
fn test_lambdas_stored_in_maps_are_methods() {
    assert_eq!(
        result_of(
            "var pricing = { vat: function(amount) { return amount * 0.2; } }
             result = pricing.vat(50)"
        ),
        Value::Integer(10)
    );
}

#[test]
fn test_try_catch_receives_thrown_value() {
    assert_eq!(
        result_of("var result; try { throw \"out of stock\"; } catch (e) { result = e }"),
        Value::String("out of stock".into())
    );
    assert_eq!(
        result_of("var result; try { throw { code: 7 }; } catch (e) { result = e.code }"),
        Value::Integer(7)
    );
}

#[test]
fn test_try_catch_intercepts_runtime_errors() {
    assert_eq!(
        result_of("var result; try { x = 1 / 0 } catch (e) { result = e }"),
        Value::String("division by zero".into())
    );
    assert_eq!(
        result_of("var result = \"untouched\"; try { x = 1 } catch (e) { result = e }"),
        Value::String("untouched".into())
    );
}

#[test]
fn test_thrown_values_unwind_functions() {
    assert_eq!(
        result_of(
            "function check(qty) { if (qty < 0) throw \"negative\"; return qty; }
             var result
             try { check(-1); result = \"unreachable\" } catch (e) { result = e }"
        ),
        Value::String("negative".into())
    );
}

#[test]
fn test_binding_errors_are_not_catchable() {
    let message = failure_of("try { NoSuchFunction(1) } catch (e) { result = e }");
    assert!(message.starts_with("bind error"), "{}", message);
}

#[test]
fn test_uncaught_throw_fails_the_script() {
    let message = failure_of("throw \"table locked\"");
    assert!(message.contains("table locked"), "{}", message);
}

#[test]
fn test_top_level_return_stops_the_script() {
    let mut engine = Engine::new();
    let outcome = engine.execute("x = 1; return x + 1; x = 99");
    assert!(outcome.success);
    assert_eq!(outcome.value, Value::Integer(2));
    assert_eq!(engine.memory().get("x"), Some(&Value::Integer(1)));
}

#[test]
fn test_increments_and_compound_assignment() {
    assert_eq!(result_of("var a = 5; result = a++ + a"), Value::Integer(11));
    assert_eq!(result_of("var a = 5; result = ++a + a"), Value::Integer(12));
    assert_eq!(result_of("result = 10; result -= 4; result *= 2"), Value::Integer(12));
}

#[test]
fn test_nested_member_assignment() {
    let mut engine = Engine::new();
    engine.execute(
        "var order = { Items: [{ Price: 2 }, { Price: 3 }] }
         order.Items[-1].Price = 4
         order.Note = \"no ice\"",
    );
    assert_eq!(engine.evaluate("order.Items[1].Price", None).value, Value::Integer(4));
    assert_eq!(
        engine.evaluate("order.Note", None).value,
        Value::String("no ice".into())
    );

    let out_of_range = engine.execute("order.Items[5].Price = 1");
    assert!(out_of_range.error_message.unwrap().contains("out of bounds"));
}
