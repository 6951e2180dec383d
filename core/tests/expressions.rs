use tally_core::{
    Evaluator, MapScope, NativeMethod, NativeRegistry, Simplifier, TallyError, Type, Typer, Value,
    parse,
};

fn eval(source: &str) -> Result<Value, TallyError> {
    let mut scope = MapScope::new();
    Evaluator::new().evaluate(&parse(source)?, &mut scope)
}

fn eval_with(source: &str, registry: NativeRegistry) -> Result<Value, TallyError> {
    let mut scope = MapScope::new();
    Evaluator::with_target(registry).evaluate(&parse(source)?, &mut scope)
}

#[test]
fn precedence_follows_the_usual_rules() {
    assert_eq!(eval("1 + 2 * 6").unwrap(), Value::I32(13));
    assert_eq!(eval("(1 + 2) * 5").unwrap(), Value::I32(15));
    assert_eq!(eval("1 + 12 / 2 * 2").unwrap(), Value::I32(13));
    assert_eq!(eval("4 * 2 + 4 * 4").unwrap(), Value::I32(24));
    assert_eq!(eval("12 + ((1 + 3) * 3)").unwrap(), Value::I32(24));
}

#[test]
fn boolean_connectives() {
    assert_eq!(eval("true and false").unwrap(), Value::Bool(false));
    assert_eq!(eval("true or false").unwrap(), Value::Bool(true));
    assert_eq!(eval("not false").unwrap(), Value::Bool(true));
    // and binds tighter than or
    assert_eq!(eval("true or false and false").unwrap(), Value::Bool(true));
    assert_eq!(eval("false and false or true").unwrap(), Value::Bool(true));
}

#[test]
fn comparisons() {
    assert_eq!(eval("1 < 2").unwrap(), Value::Bool(true));
    assert_eq!(eval("2 <= 2").unwrap(), Value::Bool(true));
    assert_eq!(eval("2 > 3").unwrap(), Value::Bool(false));
    assert_eq!(eval("3 >= 4").unwrap(), Value::Bool(false));
    assert_eq!(eval("1 < 1.5").unwrap(), Value::Bool(true));
    assert_eq!(eval("1 == 1.0").unwrap(), Value::Bool(true));
    assert_eq!(eval("1 != 2").unwrap(), Value::Bool(true));
}

#[test]
fn equality_across_categories_is_false_not_an_error() {
    assert_eq!(eval("1 == 'one'").unwrap(), Value::Bool(false));
    assert_eq!(eval("true == 1").unwrap(), Value::Bool(false));
    assert_eq!(eval("'a' != 1").unwrap(), Value::Bool(true));
}

#[test]
fn string_literals_and_concatenation() {
    assert_eq!(eval("'a' + 'b'").unwrap(), Value::Str("ab".to_string()));
    assert_eq!(
        eval("'n = ' + 42").unwrap(),
        Value::Str("n = 42".to_string())
    );
    assert_eq!(eval("1 + '2'").unwrap(), Value::Str("12".to_string()));
    assert_eq!(
        eval("'with  spaces'").unwrap(),
        Value::Str("with  spaces".to_string())
    );
    assert_eq!(eval(r"'it\'s'").unwrap(), Value::Str("it's".to_string()));
    assert_eq!(eval("\"double\"").unwrap(), Value::Str("double".to_string()));
    // the other delimiter is plain text inside a string
    assert_eq!(eval("\"a'b\"").unwrap(), Value::Str("a'b".to_string()));
}

#[test]
fn word_operators_ignore_case() {
    assert_eq!(eval("true AND true").unwrap(), Value::Bool(true));
    assert_eq!(eval("NOT false").unwrap(), Value::Bool(true));
}

#[test]
fn assignment_updates_the_scope_and_yields_the_value() {
    let mut scope = MapScope::new();
    let result = Evaluator::new()
        .evaluate(&parse("a = 3; a * a").unwrap(), &mut scope)
        .unwrap();
    assert_eq!(result, Value::I32(9));
    assert_eq!(scope.get("a"), Some(&Value::I32(3)));
}

#[test]
fn semicolons_separate_statements() {
    assert_eq!(eval("1 + 1; 'two'; 3").unwrap(), Value::I32(3));
    assert_eq!(eval("").unwrap(), Value::Unit);
}

#[test]
fn division_semantics() {
    assert_eq!(eval("7 / 2").unwrap(), Value::I32(3));
    assert_eq!(eval("7.0 / 2").unwrap(), Value::F64(3.5));
    let err = eval("1 / 0").unwrap_err();
    assert!(matches!(err, TallyError::RuntimeError(_)));
    assert!(err.to_string().contains("Division by zero"));
}

fn overload_registry() -> NativeRegistry {
    let mut registry = NativeRegistry::new();
    registry.register(NativeMethod::new(
        "join",
        vec![Type::I32, Type::I32],
        Type::I32,
        |args| match (&args[0], &args[1]) {
            (Value::I32(a), Value::I32(b)) => Ok(Value::I32(a * 100 + b)),
            _ => unreachable!(),
        },
    ));
    registry.register(NativeMethod::new(
        "join",
        vec![Type::Str, Type::Str],
        Type::Str,
        |args| {
            Ok(Value::Str(format!(
                "{}{}",
                args[0].to_str_value()?,
                args[1].to_str_value()?
            )))
        },
    ));
    registry.register(NativeMethod::new(
        "join",
        vec![Type::Any, Type::Any],
        Type::Str,
        |_| Ok(Value::Str("any".to_string())),
    ));
    registry
}

#[test]
fn overload_resolution_prefers_the_closest_match() {
    assert_eq!(
        eval_with("join(1, 2)", overload_registry()).unwrap(),
        Value::I32(102)
    );
    assert_eq!(
        eval_with("join('a', 'b')", overload_registry()).unwrap(),
        Value::Str("ab".to_string())
    );
    assert_eq!(
        eval_with("join(true, 1)", overload_registry()).unwrap(),
        Value::Str("any".to_string())
    );
}

#[test]
fn narrow_arguments_widen_to_the_declared_parameters() {
    let mut registry = NativeRegistry::new();
    registry.register(NativeMethod::new(
        "half",
        vec![Type::F64],
        Type::F64,
        |args| match &args[0] {
            Value::F64(v) => Ok(Value::F64(v / 2.0)),
            _ => unreachable!(),
        },
    ));
    assert_eq!(eval_with("half(5)", registry).unwrap(), Value::F64(2.5));
}

#[test]
fn void_methods_run_for_effect() {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let mut registry = NativeRegistry::new();
    registry.register(NativeMethod::new("tick", vec![], Type::Unit, move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(Value::Unit)
    }));

    let result = eval_with("tick(); tick(); 7", registry).unwrap();
    assert_eq!(result, Value::I32(7));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[test]
fn unknown_method_is_reported_by_name() {
    let err = eval_with("missing(1)", NativeRegistry::new()).unwrap_err();
    assert!(matches!(err, TallyError::NoMatchingMethod(_)));
    assert!(err.to_string().contains("missing"));
}

#[test]
fn parse_errors_point_near_the_problem() {
    let err = parse("1 + 'abc").unwrap_err();
    let TallyError::ParseError { offset, .. } = err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert!(offset >= 4, "offset {offset} points before the string");

    assert!(parse("1 + ").is_err());
    assert!(parse("(1 + 2").is_err());
    assert!(parse("1 + 2)").is_err());
    assert!(parse("f(1,)").is_err());
    assert!(parse("1.").is_err());
}

#[test]
fn dangling_operators_report_the_failure_position() {
    for source in ["1 + ", "not", "(1 +", "true and"] {
        let err = parse(source).unwrap_err();
        let TallyError::ParseError { offset, .. } = err else {
            panic!("expected a parse error for {source:?}, got {err:?}");
        };
        assert!(offset > 0, "{source:?} reported offset {offset}");
    }
}

#[test]
fn adjacent_values_without_an_operator_carry_a_position() {
    let err = parse("1 2").unwrap_err();
    let TallyError::ParseError { message, offset } = err else {
        panic!("expected a parse error, got {err:?}");
    };
    assert!(message.contains("Values without operator"));
    assert!(offset > 0, "reported offset {offset}");
}

#[test]
fn printing_then_reparsing_is_stable() {
    for source in [
        "1 + 2 * 3",
        "(1 + 2) * 3",
        "a - (b - c)",
        "not (a and b)",
        "f(1, 'two', g())",
        "x = 1 + 2; x < 4.5",
        r"'it\'s'",
        "(x)",
    ] {
        let first = parse(source).unwrap();
        let printed = first.to_string();
        let second = parse(&printed).unwrap();
        assert_eq!(first, second, "round trip changed {source:?} ({printed:?})");
    }
}

#[test]
fn typing_then_folding_then_evaluating_agree() {
    let mut registry = NativeRegistry::new();
    registry.register(
        NativeMethod::new("inc", vec![Type::I32], Type::I32, |args| match &args[0] {
            Value::I32(v) => Ok(Value::I32(v + 1)),
            _ => unreachable!(),
        })
        .pure_fn(),
    );

    let mut ast = parse("inc(1 + 2) * 2").unwrap();
    Typer::new(Some(&registry)).type_ast(&mut ast).unwrap();
    assert_eq!(ast.statements[0].ty, Some(Type::I32));

    let scope = MapScope::new();
    let folded = Simplifier::new(Some(&registry)).simplify(ast, &scope).unwrap();
    assert_eq!(folded.statements[0].to_string(), "8");

    let mut scope = MapScope::new();
    let result = Evaluator::with_target(registry)
        .evaluate(&folded, &mut scope)
        .unwrap();
    assert_eq!(result, Value::I32(8));
}

#[test]
fn simplifier_resolves_variables_against_a_snapshot() {
    let mut scope = MapScope::new();
    scope.set("price", Value::F64(2.5));
    let ast = Simplifier::new(None)
        .resolve_variables(true)
        .simplify(parse("price * 4").unwrap(), &scope)
        .unwrap();
    assert_eq!(ast.statements[0].to_string(), "10.0");
}

#[test]
fn typer_rejects_category_mixups() {
    let check = |source: &str| {
        let mut ast = parse(source).unwrap();
        Typer::new(None).type_ast(&mut ast)
    };
    assert!(matches!(check("1 and true"), Err(TallyError::TypeError(_))));
    assert!(matches!(check("'a' * 2"), Err(TallyError::TypeError(_))));
    assert!(matches!(check("not 1"), Err(TallyError::TypeError(_))));
    assert!(check("1 + 2 < 4 and true").is_ok());
}

#[test]
fn numeric_results_keep_the_wider_operand_type() {
    assert_eq!(eval("1 + 2.0").unwrap(), Value::F64(3.0));
    assert_eq!(eval("2.5 * 2").unwrap(), Value::F64(5.0));
}
