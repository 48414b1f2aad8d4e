use pretty_assertions::assert_eq;
use tillscript::ast::{AssignOp, CallArg, InterpolationPart, UnaryOp};
use tillscript::{Expr, LexError, LexMode, Lexer, Parser, Program, ScriptError, Stmt, SyntaxError};

fn parse_expr(source: &str) -> Result<Expr, ScriptError> {
    Parser::new(Lexer::new(source).tokenize()).parse()
}

fn parse_program(source: &str) -> Result<Program, ScriptError> {
    Parser::new(Lexer::new(source).tokenize()).parse_program()
}

fn statements(source: &str) -> Vec<Stmt> {
    parse_program(source).unwrap().statements
}

fn args(args: &[CallArg]) -> String {
    args.iter()
        .map(|arg| match &arg.name {
            Some(name) => format!(" {}: {}", name, show(&arg.value)),
            None => format!(" {}", show(&arg.value)),
        })
        .collect()
}

/// Render an expression as a parenthesized prefix form.
fn show(expr: &Expr) -> String {
    match expr {
        Expr::Integer(n) => n.to_string(),
        Expr::Float(n) => n.to_string(),
        Expr::String(s) => format!("{:?}", s),
        Expr::Boolean(b) => b.to_string(),
        Expr::Null => "null".into(),
        Expr::Date(d) => format!("#{}#", d),
        Expr::Time(t) => format!("#{}#", t),
        Expr::Word { name, .. } => name.clone(),
        Expr::Identifier { name, .. } => name.clone(),
        Expr::Member { object, name } => format!("(. {} {})", show(object), name),
        Expr::Index { object, index } => format!("([] {} {})", show(object), show(index)),
        Expr::Unary { op, operand } => {
            let symbol = match op {
                UnaryOp::Negate => "-",
                UnaryOp::Not => "!",
            };
            format!("({} {})", symbol, show(operand))
        }
        Expr::BinaryOp { op, left, right } => {
            format!("({} {} {})", op.symbol(), show(left), show(right))
        }
        Expr::Assign { target, op, value } => {
            let symbol = match op {
                AssignOp::Set => "=",
                AssignOp::Add => "+=",
                AssignOp::Subtract => "-=",
                AssignOp::Multiply => "*=",
                AssignOp::Divide => "/=",
            };
            format!("({} {} {})", symbol, show(target), show(value))
        }
        Expr::Step {
            target,
            delta,
            prefix,
        } => {
            let symbol = if *delta > 0 { "++" } else { "--" };
            if *prefix {
                format!("({} {})", symbol, show(target))
            } else {
                format!("({} {})", show(target), symbol)
            }
        }
        Expr::Call { callee, args: a, .. } => format!("(call {}{})", show(callee), args(a)),
        Expr::Suffix {
            value, function, ..
        } => format!("(suffix {} {})", show(value), function),
        Expr::MethodCall {
            object,
            method,
            args: a,
        } => format!("(.{} {}{})", method, show(object), args(a)),
        Expr::New {
            type_name, args: a, ..
        } => format!("(new {}{})", type_name, args(a)),
        Expr::Lambda(decl) => {
            let params: Vec<&str> = decl.params.iter().map(|p| p.name.as_str()).collect();
            format!("(lambda {})", params.join(" "))
        }
        Expr::Array(items) => {
            let items: Vec<String> = items.iter().map(show).collect();
            format!("[{}]", items.join(" "))
        }
        Expr::Map(pairs) => {
            let pairs: Vec<String> = pairs
                .iter()
                .map(|(k, v)| format!("{}: {}", k, show(v)))
                .collect();
            format!("{{{}}}", pairs.join(" "))
        }
        Expr::Interpolated(parts) => {
            let parts: Vec<String> = parts
                .iter()
                .map(|part| match part {
                    InterpolationPart::Text(s) => format!("{:?}", s),
                    InterpolationPart::Expr(e) => show(e),
                })
                .collect();
            format!("(str {})", parts.join(" "))
        }
    }
}

fn shown(source: &str) -> String {
    show(&parse_expr(source).unwrap())
}

// ============================================================================
// Precedence and associativity
// ============================================================================

#[test]
fn test_multiplication_binds_tighter_than_addition() {
    assert_eq!(shown("2 + 3 * 4"), "(+ 2 (* 3 4))");
    assert_eq!(shown("(2 + 3) * 4"), "(* (+ 2 3) 4)");
}

#[test]
fn test_binary_operators_are_left_associative() {
    assert_eq!(shown("a - b - c"), "(- (- a b) c)");
    assert_eq!(shown("a / b * c"), "(* (/ a b) c)");
}

#[test]
fn test_assignment_is_right_associative() {
    assert_eq!(shown("a = b = 1"), "(= a (= b 1))");
    assert_eq!(shown("x += 2 * y"), "(+= x (* 2 y))");
}

#[test]
fn test_logical_and_comparison_levels() {
    assert_eq!(shown("a || b && c"), "(|| a (&& b c))");
    assert_eq!(shown("a == b < c"), "(== a (< b c))");
    assert_eq!(shown("a > 1 && b <= 2"), "(&& (> a 1) (<= b 2))");
}

#[test]
fn test_unary_binds_tighter_than_binary() {
    assert_eq!(shown("-a * b"), "(* (- a) b)");
    assert_eq!(shown("!a && b"), "(&& (! a) b)");
}

// ============================================================================
// Postfix forms
// ============================================================================

#[test]
fn test_member_and_index_chains() {
    assert_eq!(
        shown("Order.Items[0].Price"),
        "(. ([] (. Order Items) 0) Price)"
    );
}

#[test]
fn test_calls_with_named_arguments() {
    assert_eq!(shown("Round(v: 2.345, d: 2)"), "(call Round v: 2.345 d: 2)");
    assert_eq!(shown("f()"), "(call f)");
}

#[test]
fn test_method_calls() {
    assert_eq!(shown("items.sum()"), "(.sum items)");
    assert_eq!(shown("name.replace(\"a\", \"b\")"), "(.replace name \"a\" \"b\")");
}

#[test]
fn test_suffix_call() {
    assert_eq!(shown("30 minutes"), "(suffix 30 minutes)");
    assert_eq!(shown("start + 2 hours"), "(+ start (suffix 2 hours))");
}

#[test]
fn test_prefix_and_postfix_steps() {
    assert_eq!(shown("i++"), "(i ++)");
    assert_eq!(shown("--i"), "(-- i)");
    assert_eq!(shown("Order.Count++"), "((. Order Count) ++)");
}

#[test]
fn test_new_and_lambda_expressions() {
    assert_eq!(shown("new Table(4)"), "(new Table 4)");
    assert_eq!(shown("new Table"), "(new Table)");
    assert_eq!(shown("function(x, y) { return x * y; }"), "(lambda x y)");
}

#[test]
fn test_collection_literals() {
    assert_eq!(shown("[1, 2.5, \"x\"]"), "[1 2.5 \"x\"]");
    assert_eq!(shown("{qty: 2, 'name': 'x'}"), "{qty: 2 name: \"x\"}");
    assert_eq!(shown("[]"), "[]");
}

#[test]
fn test_interpolated_string() {
    assert_eq!(
        shown(r#""Total: ${a + 1}""#),
        "(str \"Total: \" (+ a 1))"
    );
}

#[test]
fn test_literals() {
    assert_eq!(shown("#2024-03-01#"), "#2024-03-01#");
    assert_eq!(shown("#14:30#"), "#14:30:00#");
    assert_eq!(shown("null"), "null");
}

// ============================================================================
// Expression errors
// ============================================================================

#[test]
fn test_missing_operand() {
    let err = parse_expr("1 +").unwrap_err();
    assert!(matches!(err, ScriptError::Syntax(SyntaxError::Unexpected { .. })), "{err:?}");
}

#[test]
fn test_invalid_assignment_target() {
    let err = parse_expr("1 = 2").unwrap_err();
    assert!(matches!(err, ScriptError::Syntax(SyntaxError::InvalidTarget { .. })));
    let err = parse_expr("f() = 2").unwrap_err();
    assert!(matches!(err, ScriptError::Syntax(SyntaxError::InvalidTarget { .. })));
}

#[test]
fn test_unknown_tokens_become_lex_errors() {
    let err = parse_expr("a @ b").unwrap_err();
    assert!(matches!(err, ScriptError::Lex(LexError::UnexpectedCharacter { .. })), "{err:?}");

    let err = parse_expr("\"abc").unwrap_err();
    assert!(matches!(err, ScriptError::Lex(LexError::UnterminatedString { .. })));

    let err = parse_expr("#2024-13-01#").unwrap_err();
    assert!(matches!(
        err,
        ScriptError::Lex(LexError::InvalidLiteral { kind: "date/time", .. })
    ));
}

#[test]
fn test_error_reports_position() {
    let err = parse_program("a = 1\nb = (2").unwrap_err();
    match err {
        ScriptError::Syntax(SyntaxError::Expected { expected, span, .. }) => {
            assert_eq!(expected, ")");
            assert_eq!(span.line, 2);
        }
        other => panic!("unexpected error {other:?}"),
    }
}

// ============================================================================
// Statements
// ============================================================================

#[test]
fn test_var_declarations() {
    let stmts = statements("var a = 1, b;");
    match &stmts[..] {
        [Stmt::Var(decls)] => {
            assert_eq!(decls.len(), 2);
            assert_eq!(decls[0].0, "a");
            assert_eq!(decls[0].1, Some(Expr::Integer(1)));
            assert_eq!(decls[1], ("b".to_string(), None));
        }
        other => panic!("unexpected statements {other:?}"),
    }
}

#[test]
fn test_newline_terminates_statements() {
    assert_eq!(statements("a = 1\nb = 2").len(), 2);
    assert_eq!(statements("a = 1; b = 2;").len(), 2);
}

#[test]
fn test_newline_before_paren_starts_a_new_statement() {
    let stmts = statements("a = f\n(1)");
    assert_eq!(stmts.len(), 2);
    match &stmts[0] {
        Stmt::Expr(expr) => assert_eq!(show(expr), "(= a f)"),
        other => panic!("unexpected statement {other:?}"),
    }
}

#[test]
fn test_missing_terminator_on_same_line() {
    let err = parse_program("a = x b = 2").unwrap_err();
    assert!(matches!(
        err,
        ScriptError::Syntax(SyntaxError::Expected { ref expected, .. }) if expected == ";"
    ));
}

#[test]
fn test_if_else_forms() {
    match &statements("if (a > 1) b = 2 else b = 3")[..] {
        [Stmt::If {
            condition,
            else_branch: Some(_),
            ..
        }] => assert_eq!(show(condition), "(> a 1)"),
        other => panic!("unexpected statements {other:?}"),
    }
    match &statements("if a > 1 then b = 2")[..] {
        [Stmt::If {
            then_branch,
            else_branch: None,
            ..
        }] => assert!(matches!(then_branch.as_ref(), Stmt::Expr(_))),
        other => panic!("unexpected statements {other:?}"),
    }
}

#[test]
fn test_for_and_for_in() {
    assert!(matches!(
        &statements("for (var i = 0; i < 3; i++) { total += i }")[..],
        [Stmt::For {
            init: Some(_),
            condition: Some(_),
            step: Some(_),
            ..
        }]
    ));
    match &statements("for (item in Order.Items) { total += item.Price }")[..] {
        [Stmt::ForEach {
            variable, iterable, ..
        }] => {
            assert_eq!(variable, "item");
            assert_eq!(show(iterable), "(. Order Items)");
        }
        other => panic!("unexpected statements {other:?}"),
    }
    assert!(matches!(
        &statements("for x in items { }")[..],
        [Stmt::ForEach { .. }]
    ));
}

#[test]
fn test_function_declaration() {
    match &statements("function add(a, b = 2) { return a + b; }")[..] {
        [Stmt::Function(decl)] => {
            assert_eq!(decl.name.as_deref(), Some("add"));
            assert_eq!(decl.params.len(), 2);
            assert_eq!(decl.params[1].default, Some(Expr::Integer(2)));
            assert_eq!(decl.body.len(), 1);
        }
        other => panic!("unexpected statements {other:?}"),
    }
}

#[test]
fn test_try_catch_and_run() {
    assert!(matches!(
        &statements("try { a = 1 } catch (e) { b = e }")[..],
        [Stmt::Try { catch_variable: Some(name), .. }] if name == "e"
    ));
    assert!(matches!(
        &statements("try { } catch { }")[..],
        [Stmt::Try { catch_variable: None, .. }]
    ));
    match &statements("run CloseTable(4)")[..] {
        [Stmt::Run(call)] => assert_eq!(show(call), "(call CloseTable 4)"),
        other => panic!("unexpected statements {other:?}"),
    }
}

#[test]
fn test_break_outside_loop_is_rejected() {
    let err = parse_program("break").unwrap_err();
    assert!(matches!(
        err,
        ScriptError::Syntax(SyntaxError::OutsideLoop { keyword: "break", .. })
    ));
    assert!(parse_program("while (true) { break; }").is_ok());
    assert!(parse_program("for (x in xs) { if (x) continue }").is_ok());
}

#[test]
fn test_function_body_does_not_inherit_loop() {
    let err = parse_program("while (true) { function f() { continue; } }").unwrap_err();
    assert!(matches!(
        err,
        ScriptError::Syntax(SyntaxError::OutsideLoop { keyword: "continue", .. })
    ));
}

#[test]
fn test_throw_requires_value() {
    let err = parse_program("throw;").unwrap_err();
    assert!(matches!(err, ScriptError::Syntax(SyntaxError::MissingThrowValue { .. })));
    assert!(parse_program("throw \"sold out\";").is_ok());
}

#[test]
fn test_duplicate_parameters_are_rejected() {
    let err = parse_program("function f(a, a) { }").unwrap_err();
    assert!(matches!(err, ScriptError::Syntax(SyntaxError::DuplicateParameter { .. })));
}

#[test]
fn test_unclosed_block() {
    let err = parse_program("{ a = 1").unwrap_err();
    assert!(matches!(
        err,
        ScriptError::Syntax(SyntaxError::Expected { ref expected, .. }) if expected == "}"
    ));
}

#[test]
fn test_retained_comments_are_ignored_by_parser() {
    let tokens = Lexer::new("a = 1 // first\n/* second */ b = 2")
        .with_mode(LexMode::RetainComments)
        .tokenize();
    let program = Parser::new(tokens).parse_program().unwrap();
    assert_eq!(program.statements.len(), 2);
}
