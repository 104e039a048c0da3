use minic::checker::Checker;
use minic::parser::parse_source;
use minic::tac::{lower_program, optimize_program};
use minic::{run, EvalConfig, EvalError, FunctionTable, Interpreter, Value};
use pretty_assertions::assert_eq;
use rayon::prelude::*;

const FACTORIAL: &str = include_str!("../demos/factorial.c");
const NESTED: &str = include_str!("../demos/nested.c");

fn table(source: &str) -> FunctionTable {
    let program = parse_source(source).expect("demo program should parse");
    FunctionTable::from_program(&program).expect("demo program should build a table")
}

#[test]
fn factorial_program_returns_120() {
    assert_eq!(run(&table(FACTORIAL), "main"), Ok(Value(120)));
}

#[test]
fn factorial_base_cases() {
    let functions = table(FACTORIAL);
    let mut interpreter = Interpreter::new(&functions, EvalConfig::default());

    assert_eq!(interpreter.call_function("factorial", &[Value(0)]), Ok(Value(1)));
    assert_eq!(interpreter.call_function("factorial", &[Value(1)]), Ok(Value(1)));
    assert_eq!(interpreter.call_function("factorial", &[Value(5)]), Ok(Value(120)));
    assert_eq!(interpreter.call_function("factorial", &[Value(10)]), Ok(Value(3_628_800)));
}

#[test]
fn factorial_arity_is_checked() {
    let functions = table(FACTORIAL);
    let mut interpreter = Interpreter::new(&functions, EvalConfig::default());

    assert_eq!(
        interpreter.call_function("factorial", &[]),
        Err(EvalError::ArityMismatch {
            name: "factorial".to_string(),
            expected: 1,
            got: 0,
        })
    );
}

#[test]
fn nested_program_returns_10() {
    // i = 0, 1, 2 add i; i = 3, 4 add 1 per inner iteration: 0 + 1 + 2 + 3 + 4
    assert_eq!(run(&table(NESTED), "main"), Ok(Value(10)));
}

#[test]
fn repeated_runs_are_deterministic() {
    let functions = table(NESTED);
    let first = run(&functions, "main");
    for _ in 0..10 {
        assert_eq!(run(&functions, "main"), first);
    }
}

#[test]
fn independent_runs_in_parallel() {
    let factorial = table(FACTORIAL);
    let nested = table(NESTED);

    let results: Vec<_> = (0..16)
        .into_par_iter()
        .map(|i| {
            if i % 2 == 0 {
                run(&factorial, "main")
            } else {
                run(&nested, "main")
            }
        })
        .collect();

    for (i, result) in results.into_iter().enumerate() {
        let expected = if i % 2 == 0 { Value(120) } else { Value(10) };
        assert_eq!(result, Ok(expected));
    }
}

#[test]
fn entry_point_must_exist() {
    assert_eq!(
        run(&table(FACTORIAL), "start"),
        Err(EvalError::MissingEntryPoint("start".to_string()))
    );
}

#[test]
fn long_expression_chain_runs() {
    let source = format!("int main() {{ return 1{}; }}", "+1".repeat(100_000));
    let program = parse_source(&source).expect("chain should parse");

    assert_eq!(Checker::new().check_program(&program), Ok(()));
    let functions = FunctionTable::from_program(&program).expect("chain should build a table");
    assert_eq!(run(&functions, "main"), Ok(Value(100_001)));

    let mut tac = lower_program(&program);
    optimize_program(&mut tac);
    assert_eq!(tac.to_string(), "function main():\n    return 100001\nend function main\n");
}

#[test]
fn deeply_nested_parentheses_run() {
    let depth = 10_000;
    let source = format!("int main() {{ return {}41 + 1{}; }}", "(".repeat(depth), ")".repeat(depth));
    assert_eq!(run(&table(&source), "main"), Ok(Value(42)));
}

#[test]
fn factorial_lowers_to_three_address_code() {
    let tac = lower_program(&parse_source(FACTORIAL).unwrap());
    let listing = tac.function("factorial").unwrap().to_string();

    assert!(listing.starts_with("function factorial(n):\n"));
    assert!(listing.contains("    t0 = n <= 1\n    ifFalse t0 goto L0\n"));
    assert!(listing.contains("    param t1\n    t2 = call factorial, 1\n"));
    assert!(listing.ends_with("end function factorial\n"));
}
