use std::cell::RefCell;
use std::rc::Rc;

use loxi::error::LoxError;
use loxi::lox::Lox;

/// Run a program through the whole pipeline with a captured `print`
/// destination.  Returns what was printed plus any diagnostics.
fn run(source: &str) -> (String, Vec<LoxError>) {
    let output = Rc::new(RefCell::new(Vec::<u8>::new()));

    let result = Lox::run_with_output(source, output.clone());

    let printed = String::from_utf8(output.borrow().clone()).expect("printed UTF-8");

    (printed, result.err().unwrap_or_default())
}

fn run_ok(source: &str) -> String {
    let (printed, errors) = run(source);

    assert!(errors.is_empty(), "unexpected diagnostics: {:?}", errors);

    printed
}

fn run_runtime_error(source: &str) -> (String, LoxError) {
    let (printed, mut errors) = run(source);

    assert_eq!(errors.len(), 1, "expected one diagnostic: {:?}", errors);

    let error = errors.pop().unwrap();
    assert!(error.is_runtime(), "expected runtime error, got {:?}", error);

    (printed, error)
}

// ───────────────────────── arithmetic and operators ─────────────────────────

#[test]
fn addition_of_numbers() {
    assert_eq!(run_ok("print 1 + 1;"), "2\n");
}

#[test]
fn plus_concatenates_when_either_side_is_text() {
    assert_eq!(run_ok("print \"a\" + 1;"), "a1\n");
    assert_eq!(run_ok("print 1 + \"a\";"), "1a\n");
    assert_eq!(run_ok("print \"x\" + true;"), "xtrue\n");
}

#[test]
fn plus_rejects_nil_operands() {
    let (_, error) = run_runtime_error("print \"a\" + nil;");
    assert!(format!("{}", error).contains("Operands must be two numbers or two strings."));
}

#[test]
fn star_multiplies() {
    assert_eq!(run_ok("print 6 * 7;"), "42\n");
}

#[test]
fn slash_divides() {
    assert_eq!(run_ok("print 10 / 4;"), "2.5\n");
}

#[test]
fn division_by_zero_is_a_runtime_error_never_infinity() {
    let (printed, error) = run_runtime_error("print 1 / 0;");

    assert_eq!(printed, "");
    assert!(format!("{}", error).contains("Cannot divide by zero."));
    assert_eq!(error.line(), Some(1));

    // Also through a variable, not just the literal.
    let (_, error) = run_runtime_error("var zero = 0; print 10 / zero;");
    assert!(format!("{}", error).contains("Cannot divide by zero."));
}

#[test]
fn comparison_operators_require_numbers() {
    assert_eq!(run_ok("print 1 < 2; print 2 <= 2; print 3 > 4; print 3 >= 4;"),
               "true\ntrue\nfalse\nfalse\n");

    let (_, error) = run_runtime_error("print \"a\" < \"b\";");
    assert!(format!("{}", error).contains("Operands must be numbers."));
}

#[test]
fn equality_has_no_cross_type_coercion() {
    assert_eq!(run_ok("print 1 == 1;"), "true\n");
    assert_eq!(run_ok("print \"1\" == 1;"), "false\n");
    assert_eq!(run_ok("print nil == nil;"), "true\n");
    assert_eq!(run_ok("print nil == false;"), "false\n");
    assert_eq!(run_ok("print 1 != 2;"), "true\n");
}

#[test]
fn unary_minus_requires_a_number() {
    assert_eq!(run_ok("print -(3 + 4);"), "-7\n");

    let (_, error) = run_runtime_error("print -\"abc\";");
    assert!(format!("{}", error).contains("Operand must be a number."));
}

#[test]
fn truthiness_only_false_and_nil_are_falsy() {
    assert_eq!(run_ok("print !false; print !nil;"), "true\ntrue\n");
    assert_eq!(run_ok("print !0; print !\"\"; print !true;"), "false\nfalse\ntrue\n");
}

#[test]
fn logical_operators_return_the_deciding_operand() {
    assert_eq!(run_ok("print nil or \"yes\";"), "yes\n");
    assert_eq!(run_ok("print 1 or 2;"), "1\n");
    assert_eq!(run_ok("print nil and 2;"), "nil\n");
    assert_eq!(run_ok("print 0 and 3;"), "3\n");
}

#[test]
fn logical_operators_short_circuit() {
    // The right side would be a runtime error if evaluated.
    assert_eq!(run_ok("print true or missing;"), "true\n");
    assert_eq!(run_ok("print false and missing;"), "false\n");
}

// ───────────────────────── variables and control flow ───────────────────────

#[test]
fn variables_and_assignment() {
    assert_eq!(run_ok("var a = 1; a = a + 2; print a;"), "3\n");
}

#[test]
fn uninitialized_variables_are_nil() {
    assert_eq!(run_ok("var a; print a;"), "nil\n");
}

#[test]
fn blocks_shadow_and_restore() {
    assert_eq!(
        run_ok("var a = \"outer\"; { var a = \"inner\"; print a; } print a;"),
        "inner\nouter\n"
    );
}

#[test]
fn if_else_takes_the_truthy_branch() {
    assert_eq!(run_ok("if (1 < 2) print \"then\"; else print \"else\";"), "then\n");
    assert_eq!(run_ok("if (nil) print \"then\"; else print \"else\";"), "else\n");
}

#[test]
fn while_and_for_loops() {
    assert_eq!(
        run_ok("var i = 0; while (i < 3) { print i; i = i + 1; }"),
        "0\n1\n2\n"
    );

    assert_eq!(
        run_ok("for (var i = 0; i < 3; i = i + 1) print i;"),
        "0\n1\n2\n"
    );
}

#[test]
fn forward_referenced_globals_resolve_at_call_time() {
    assert_eq!(
        run_ok("fun f() { return g(); } fun g() { return 1; } print f();"),
        "1\n"
    );
}

// ───────────────────────── functions and closures ───────────────────────────

#[test]
fn fib_10_is_55() {
    assert_eq!(
        run_ok("fun fib(n){ if (n<2) return n; return fib(n-1)+fib(n-2); } print fib(10);"),
        "55\n"
    );
}

#[test]
fn functions_without_return_yield_nil() {
    assert_eq!(run_ok("fun f() {} print f();"), "nil\n");
}

#[test]
fn closures_bind_statically_at_definition_time() {
    // Independent of the later shadowing in the same block.
    assert_eq!(
        run_ok("var a = \"outer\"; { fun show(){ print a; } var a = \"inner\"; show(); }"),
        "outer\n"
    );
}

#[test]
fn closures_alias_one_shared_environment() {
    let source = "\
        fun makeCounter() {\n\
            var count = 0;\n\
            fun increment() { count = count + 1; }\n\
            fun current() { return count; }\n\
            increment();\n\
            increment();\n\
            print current();\n\
        }\n\
        makeCounter();";

    // Both inner functions observe each other's mutation.
    assert_eq!(run_ok(source), "2\n");
}

#[test]
fn loop_variable_declared_once_is_shared_across_captures() {
    let source = "\
        var first; var second;\n\
        for (var i = 0; i < 2; i = i + 1) {\n\
            fun get() { return i; }\n\
            if (first == nil) first = get; else second = get;\n\
        }\n\
        print first(); print second();";

    // One declaration, one environment slot: both closures see the final i.
    assert_eq!(run_ok(source), "2\n2\n");
}

#[test]
fn per_iteration_declarations_do_not_alias() {
    let source = "\
        var first; var second;\n\
        for (var i = 0; i < 2; i = i + 1) {\n\
            var snapshot = i;\n\
            fun get() { return snapshot; }\n\
            if (first == nil) first = get; else second = get;\n\
        }\n\
        print first(); print second();";

    assert_eq!(run_ok(source), "0\n1\n");
}

#[test]
fn writes_through_a_resolved_reference_hit_the_declaring_frame() {
    let source = "\
        var a = 1;\n\
        {\n\
            fun bump() { a = a + 1; }\n\
            var a = 100;\n\
            bump();\n\
            print a;\n\
        }\n\
        print a;";

    // bump() mutates the outer a it closed over, not the later shadow.
    assert_eq!(run_ok(source), "100\n2\n");
}

#[test]
fn assignment_yields_the_assigned_value() {
    assert_eq!(run_ok("var a; print a = 7;"), "7\n");
}

// ───────────────────────── classes and instances ────────────────────────────

#[test]
fn fields_are_created_on_write_and_methods_see_this() {
    let source = "\
        class Counter {\n\
            init() { this.count = 0; }\n\
            bump() { this.count = this.count + 1; return this.count; }\n\
        }\n\
        var c = Counter();\n\
        c.bump(); c.bump();\n\
        print c.bump();";

    assert_eq!(run_ok(source), "3\n");
}

#[test]
fn inheritance_dispatch_through_the_superclass_chain() {
    let source = "\
        class A { init(x){ this.x = x; } }\n\
        class B extends A { getX(){ return this.x; } }\n\
        print B(\"v\").getX();";

    assert_eq!(run_ok(source), "v\n");
}

#[test]
fn super_runs_the_parent_implementation_on_the_current_object() {
    let source = "\
        class A {\n\
            name() { return \"A\"; }\n\
            describe() { return \"I am \" + this.name(); }\n\
        }\n\
        class B extends A {\n\
            name() { return \"B\"; }\n\
            describe() { return super.describe() + \"!\"; }\n\
        }\n\
        print B().describe();";

    // super.describe() starts lookup at A, but this.name() inside it still
    // dispatches dynamically to B.
    assert_eq!(run_ok(source), "I am B!\n");
}

#[test]
fn super_skips_the_subclass_override() {
    let source = "\
        class A { m() { print \"A\"; } }\n\
        class B extends A {\n\
            m() { print \"B\"; }\n\
            test() { super.m(); }\n\
        }\n\
        B().test();";

    assert_eq!(run_ok(source), "A\n");
}

#[test]
fn initializer_always_yields_the_instance() {
    let source = "\
        class F { init() { this.x = 1; } }\n\
        var f = F();\n\
        print f.init() == f;";

    // Re-invoking init returns the same bound instance.
    assert_eq!(run_ok(source), "true\n");
}

#[test]
fn early_return_from_initializer_still_yields_the_instance() {
    let source = "\
        class F { init(flag) { if (flag) return; this.late = 1; } }\n\
        print F(true);";

    assert_eq!(run_ok(source), "F instance\n");
}

#[test]
fn each_method_access_produces_a_fresh_bound_value() {
    let source = "\
        class C { m() { return this; } }\n\
        var c = C();\n\
        var m1 = c.m;\n\
        var m2 = c.m;\n\
        print m1 == m2;\n\
        print m1() == c;";

    // Distinct bound values, same receiver.
    assert_eq!(run_ok(source), "false\ntrue\n");
}

#[test]
fn detached_bound_methods_remember_their_receiver() {
    let source = "\
        class Greeter {\n\
            init(name) { this.name = name; }\n\
            greet() { return \"hi \" + this.name; }\n\
        }\n\
        var g = Greeter(\"ada\").greet;\n\
        print g();";

    assert_eq!(run_ok(source), "hi ada\n");
}

#[test]
fn methods_may_reference_the_class_by_name() {
    let source = "\
        class Shape {\n\
            clone() { return Shape(); }\n\
        }\n\
        print Shape().clone();";

    assert_eq!(run_ok(source), "Shape instance\n");
}

// ───────────────────────── printing forms ───────────────────────────────────

#[test]
fn print_renders_each_value_family() {
    assert_eq!(run_ok("print nil;"), "nil\n");
    assert_eq!(run_ok("print true;"), "true\n");
    assert_eq!(run_ok("print 2.5;"), "2.5\n");
    assert_eq!(run_ok("print 4;"), "4\n");
    assert_eq!(run_ok("fun f() {} print f;"), "<fn f>\n");
    assert_eq!(run_ok("print clock;"), "<native fn>\n");
    assert_eq!(run_ok("class C {} print C;"), "C\n");
    assert_eq!(run_ok("class C {} print C();"), "C instance\n");
}

#[test]
fn clock_returns_epoch_seconds() {
    assert_eq!(run_ok("print clock() > 0;"), "true\n");
}

// ───────────────────────── runtime failures ─────────────────────────────────

#[test]
fn unbound_name_halts_at_the_offending_statement() {
    let (printed, error) = run_runtime_error("print 1;\nprint missing;\nprint 2;");

    // Earlier output stands; later statements never run.
    assert_eq!(printed, "1\n");
    assert!(format!("{}", error).contains("Undefined variable 'missing'."));
    assert_eq!(error.line(), Some(2));
}

#[test]
fn assigning_an_unbound_name_is_a_runtime_error() {
    let (_, error) = run_runtime_error("missing = 1;");
    assert!(format!("{}", error).contains("Undefined variable 'missing'."));
}

#[test]
fn calling_a_non_callable_is_a_runtime_error() {
    let (_, error) = run_runtime_error("var x = 1;\nx();");

    assert!(format!("{}", error).contains("Can only call functions and classes."));
    assert_eq!(error.line(), Some(2));
}

#[test]
fn arity_is_checked_exactly() {
    let (_, error) = run_runtime_error("fun f(a) { return a; } f(1, 2);");
    assert!(format!("{}", error).contains("Expected 1 arguments but got 2."));

    let (_, error) = run_runtime_error("fun f(a) { return a; } f();");
    assert!(format!("{}", error).contains("Expected 1 arguments but got 0."));
}

#[test]
fn property_access_requires_an_instance() {
    let (_, error) = run_runtime_error("var x = 1;\nprint x.y;");
    assert!(format!("{}", error).contains("Only instances have properties."));
    assert_eq!(error.line(), Some(2));

    let (_, error) = run_runtime_error("var x = 1;\nx.y = 2;");
    assert!(format!("{}", error).contains("Only instances have fields."));
}

#[test]
fn reading_an_undefined_property_is_a_runtime_error() {
    let (_, error) = run_runtime_error("class C {} print C().missing;");
    assert!(format!("{}", error).contains("Undefined property 'missing'."));
}

#[test]
fn superclass_value_must_be_a_class() {
    let (_, error) = run_runtime_error("var NotAClass = 1;\nclass B extends NotAClass {}");
    assert!(format!("{}", error).contains("Superclass must be a class."));
    assert_eq!(error.line(), Some(2));
}

// ───────────────────────── pipeline behaviour ───────────────────────────────

#[test]
fn self_inheritance_is_a_syntax_error_before_any_interpretation() {
    let (printed, errors) = run("print \"side effect\";\nclass A extends A {}");

    // Resolution failed, so nothing at all was evaluated.
    assert_eq!(printed, "");
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(!errors[0].is_runtime());
}

#[test]
fn scan_errors_halt_the_pipeline_before_parsing() {
    let (printed, errors) = run("print 1;\n#@\nprint 2;");

    assert_eq!(printed, "");
    assert_eq!(errors.len(), 2, "{:?}", errors);
    assert!(errors.iter().all(|e| !e.is_runtime()));
}

#[test]
fn front_ends_distinguish_runtime_failures_by_kind() {
    let (_, errors) = run("print missing;");
    assert!(errors.iter().any(LoxError::is_runtime));

    let (_, errors) = run("print ;");
    assert!(!errors.iter().any(LoxError::is_runtime));
}
