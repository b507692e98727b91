//! Sandbox evaluation through the public API.

mod common;

use std::sync::Arc;
use std::time::Duration;

use pretty_assertions::assert_eq;

use common::test_registry;
use toolcode::capability::Value;
use toolcode::error::ToolcodeError;
use toolcode::sandbox::policy::DENYLISTED_NAMES;
use toolcode::sandbox::{evaluate, PrintRecord, Sandbox, SandboxLimits};

const SECOND: Duration = Duration::from_secs(1);

#[tokio::test]
async fn evaluates_capability_call() {
    let registry = test_registry();
    let outcome = evaluate("print(capability.add(a=1,b=2))", &registry, SECOND, 1024)
        .await
        .unwrap();
    assert_eq!(
        outcome.records,
        vec![PrintRecord {
            positional: vec![Value::Int(3)],
            named: Vec::new(),
        }]
    );
    assert_eq!(outcome.to_feedback(), "3");
}

#[tokio::test]
async fn default_api_is_an_alias_for_capability() {
    let registry = test_registry();
    let outcome = evaluate("print(default_api.add(a=20, b=22))", &registry, SECOND, 1024)
        .await
        .unwrap();
    assert_eq!(outcome.to_feedback(), "42");
}

#[tokio::test]
async fn unknown_capabilities_reach_the_default_handler() {
    let registry = test_registry();
    let outcome = evaluate(
        "print(capability.get_weather(\"Beijing\", unit=\"c\"))",
        &registry,
        SECOND,
        1024,
    )
    .await
    .unwrap();
    let feedback = outcome.to_feedback();
    assert!(
        feedback.starts_with("Default handler called for get_weather with args"),
        "{feedback}"
    );
    assert!(feedback.contains("Beijing"));
}

#[tokio::test]
async fn builtins_and_several_statements() {
    let registry = test_registry();
    let code = "print(len([1, 2, 3]), sum(range(4)))\nprint(max(capability.add(a=1, b=1), 5))";
    let outcome = evaluate(code, &registry, SECOND, 1024).await.unwrap();
    assert_eq!(outcome.len(), 2);
    assert_eq!(outcome.to_feedback(), "3\n6\n5");
}

#[tokio::test]
async fn named_only_print_is_an_invalid_result() {
    let registry = test_registry();
    let outcome = evaluate("print(total=capability.add(a=1, b=2))", &registry, SECOND, 1024)
        .await
        .unwrap();
    assert_eq!(outcome.records[0].named, vec![("total".to_string(), Value::Int(3))]);
    assert_eq!(outcome.to_feedback(), "[invalid result]");
}

#[tokio::test]
async fn no_print_means_no_result() {
    let registry = test_registry();
    let outcome = evaluate("capability.add(a=1, b=2)", &registry, SECOND, 1024)
        .await
        .unwrap();
    assert!(outcome.is_empty());
    assert_eq!(outcome.to_feedback(), "[no execution result]");
}

#[tokio::test]
async fn reserved_attributes_are_unsafe() {
    let registry = test_registry();
    let err = evaluate("print(capability.__class__)", &registry, SECOND, 1024)
        .await
        .unwrap_err();
    assert!(matches!(err, ToolcodeError::UnsafeInput(_)), "{err}");
}

#[tokio::test]
async fn every_denylisted_name_is_rejected() {
    let registry = test_registry();
    for name in DENYLISTED_NAMES {
        let code = format!("print({name}(\"x\"))");
        let err = evaluate(&code, &registry, SECOND, 1024).await.unwrap_err();
        assert!(
            matches!(err, ToolcodeError::UnsafeInput(_)),
            "{name} should be rejected, got {err}"
        );
    }
}

#[tokio::test]
async fn imports_and_definitions_are_rejected() {
    let registry = test_registry();
    for code in [
        "import os",
        "from os import path",
        "def f(): pass",
        "class A: pass",
        "global x",
        "x = capability.add(a=1, b=2)",
        "print(lambda: 1)",
    ] {
        let err = evaluate(code, &registry, SECOND, 1024).await.unwrap_err();
        assert!(matches!(err, ToolcodeError::UnsafeInput(_)), "{code}: {err}");
    }
}

#[tokio::test(start_paused = true)]
async fn slow_capability_times_out() {
    let registry = test_registry();
    let started = tokio::time::Instant::now();
    let err = evaluate(
        "print(capability.slow(ms=5000))",
        &registry,
        Duration::from_millis(100),
        1024,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ToolcodeError::Timeout(100)), "{err}");
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_millis(150));
}

#[tokio::test]
async fn oversized_output_is_discarded() {
    let registry = test_registry();
    let err = evaluate("print(\"ab\")\nprint(\"cd\")", &registry, SECOND, 5)
        .await
        .unwrap_err();
    assert!(matches!(err, ToolcodeError::OutputTooLarge { limit: 5, .. }), "{err}");

    let ok = evaluate("print(\"ab\")", &registry, SECOND, 5).await.unwrap();
    assert_eq!(ok.to_feedback(), "ab");
}

#[tokio::test]
async fn capability_errors_are_runtime_failures() {
    let registry = test_registry();
    let err = evaluate("print(capability.fail())", &registry, SECOND, 1024)
        .await
        .unwrap_err();
    assert!(matches!(err, ToolcodeError::Runtime(_)), "{err}");
    assert!(err.is_sandbox_failure());
}

#[tokio::test]
async fn sandbox_applies_its_limits() {
    let sandbox = Sandbox::new(Arc::new(test_registry())).with_limits(SandboxLimits {
        timeout: SECOND,
        max_output_bytes: 2,
    });
    let err = sandbox.evaluate("print(\"long output\")").await.unwrap_err();
    assert!(matches!(err, ToolcodeError::OutputTooLarge { limit: 2, .. }));
    assert_eq!(sandbox.limits().timeout, SECOND);
}

#[tokio::test]
async fn deeply_nested_call_text_is_rejected() {
    let registry = test_registry();
    let depth = 100_000;
    for code in [
        format!("print({}1{})", "[".repeat(depth), "]".repeat(depth)),
        format!("print({}1{})", "(".repeat(depth), ")".repeat(depth)),
        format!("print({}1)", "-".repeat(depth)),
        format!("print({{'k': {}1{}}})", "{'k': ".repeat(depth), "}".repeat(depth)),
        format!("print(capability.add{})", "()".repeat(depth)),
    ] {
        let err = evaluate(&code, &registry, SECOND, 1024).await.unwrap_err();
        assert!(
            matches!(err, ToolcodeError::UnsafeInput(ref m) if m.contains("nested too deeply")),
            "{err}"
        );
    }

    let shallow = format!("print({}1{})", "[".repeat(10), "]".repeat(10));
    let outcome = evaluate(&shallow, &registry, SECOND, 1024).await.unwrap();
    assert_eq!(outcome.to_feedback(), "[[[[[[[[[[1]]]]]]]]]]");
}

#[tokio::test]
async fn range_spanning_the_whole_integer_domain() {
    let registry = test_registry();
    let outcome = evaluate(
        "print(range(-9223372036854775807, 9223372036854775807, 4611686018427387904))",
        &registry,
        SECOND,
        1024,
    )
    .await
    .unwrap();
    assert_eq!(
        outcome.to_feedback(),
        "[-9223372036854775807, -4611686018427387903, 1, 4611686018427387905]"
    );

    let outcome = evaluate(
        "print(len(range(9223372036854775807, -9223372036854775807, -4611686018427387904)))",
        &registry,
        SECOND,
        1024,
    )
    .await
    .unwrap();
    assert_eq!(outcome.to_feedback(), "4");
}

#[tokio::test]
async fn integer_extremes_fail_as_runtime_errors() {
    let registry = test_registry();
    let min = "sum([-9223372036854775807, -1])";
    let cases = [
        format!("print(abs({min}))"),
        format!("print(-{min})"),
        format!("print(sum([{min}, -1]))"),
        "print(sum([9223372036854775807, 1]))".to_string(),
        "print(sum([1], start=9223372036854775807))".to_string(),
        "print(round(1e300))".to_string(),
        "print(int(-1e19))".to_string(),
        "print(round(float('nan')))".to_string(),
    ];
    for code in &cases {
        let err = evaluate(code, &registry, SECOND, 1024).await.unwrap_err();
        assert!(matches!(err, ToolcodeError::Runtime(_)), "{code}: {err}");
    }
}

#[tokio::test]
async fn integer_extremes_that_fit_are_computed() {
    let registry = test_registry();
    let code = "print(sum([-9223372036854775807, -1]))\n\
                print(abs(-9223372036854775807))\n\
                print(round(9223372036854775807))\n\
                print(round(-9223372036854775807, 2))";
    let outcome = evaluate(code, &registry, SECOND, 1024).await.unwrap();
    assert_eq!(
        outcome.to_feedback(),
        "-9223372036854775808\n9223372036854775807\n9223372036854775807\n-9223372036854775807"
    );
}

#[tokio::test]
async fn huge_literals_are_rejected() {
    let registry = test_registry();
    for code in ["print(99999999999999999999)", "print(0x1ffffffffffffffff)"] {
        let err = evaluate(code, &registry, SECOND, 1024).await.unwrap_err();
        assert!(matches!(err, ToolcodeError::UnsafeInput(_)), "{code}: {err}");
    }
}

#[tokio::test]
async fn attribute_calls_off_other_objects_never_run() {
    let registry = test_registry();
    for code in ["print('a'.upper())", "os.system('ls')", "print(capability.add.x(1))"] {
        let err = evaluate(code, &registry, SECOND, 1024).await.unwrap_err();
        assert!(matches!(err, ToolcodeError::UnsafeInput(_)), "{code}: {err}");
    }
}
