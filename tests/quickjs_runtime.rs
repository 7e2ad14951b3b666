use honeyclient::js::QuickJsEngine;

#[test]
fn quickjs_runs_page_script_ending_in_a_comment() {
    let engine = QuickJsEngine::new().expect("engine");
    let result: i32 = engine
        .eval_with(
            "console.log('logged from page'); var total = 40 + 2; total // trailing",
            "quickjs_comment_test.js",
        )
        .expect("script result");
    assert_eq!(result, 42);
}

#[test]
fn quickjs_reports_page_exceptions() {
    let engine = QuickJsEngine::new().expect("engine");
    let err = engine
        .eval("undefinedFunction()", "quickjs_error_test.js")
        .expect_err("reference error");
    assert!(err.to_string().starts_with("ReferenceError"));
}

#[test]
fn quickjs_allows_sloppy_mode_scope_chains() {
    let engine = QuickJsEngine::new().expect("engine");
    let result: String = engine
        .eval_with(
            "var scope = { who: 'scope' }; with (scope) { who + ':' + typeof undeclared }",
            "quickjs_with_test.js",
        )
        .expect("script result");
    assert_eq!(result, "scope:undefined");
}
