use cd25_compiler::diag::{Phase, Severity};
use cd25_compiler::{compile_to_tac, parse_and_analyse, CompileError};

fn diagnostics_of(source: &str) -> Vec<cd25_compiler::diag::Diagnostic> {
    match compile_to_tac(source) {
        Ok(_) => panic!("program should not compile"),
        Err(CompileError::Invalid(diags)) => diags,
    }
}

fn assert_semantic(source: &str, needle: &str) {
    let diags = diagnostics_of(source);
    assert!(
        diags
            .iter()
            .any(|d| d.phase == Phase::Semantic && d.message.contains(needle)),
        "expected a semantic error containing '{}', got: {:?}",
        needle,
        diags
    );
}

// ── Redefinition and resolution ──────────────────────────────────────────

#[test]
fn redefinition_in_same_scope() {
    assert_semantic(
        r#"
CD25 t
main
    x : integer,
    x : real
begin
    x = 1;
end CD25 t
"#,
        "redefinition",
    );
}

#[test]
fn same_name_in_different_functions_is_fine() {
    let source = r#"
CD25 t
func f (a : integer) : integer
    tmp : integer
begin
    tmp = a;
    return tmp;
end
func g (a : integer) : integer
    tmp : integer
begin
    tmp = a + a;
    return tmp;
end
main
    x : integer
begin
    x = f(1) + g(2);
end CD25 t
"#;
    assert!(compile_to_tac(source).is_ok());
}

#[test]
fn undeclared_variable() {
    assert_semantic(
        r#"
CD25 t
main
    x : integer
begin
    x = y;
end CD25 t
"#,
        "undeclared variable",
    );
}

#[test]
fn unknown_function() {
    assert_semantic(
        r#"
CD25 t
main
    x : integer
begin
    x = foo(1);
end CD25 t
"#,
        "does not exist",
    );
}

#[test]
fn missing_struct_field() {
    assert_semantic(
        r#"
CD25 t
types
    rec is a : integer end
    tbl is array [ 2 ] of rec end
arrays
    arr : tbl
main
    x : integer
begin
    x = arr[0].missing;
end CD25 t
"#,
        "field does not exist",
    );
}

// ── Type rules ───────────────────────────────────────────────────────────

#[test]
fn real_target_rejects_int_source() {
    assert_semantic(
        r#"
CD25 t
main
    r : real
begin
    r = 1;
end CD25 t
"#,
        "incorrect type assignment",
    );
}

#[test]
fn int_target_rejects_real_source() {
    assert_semantic(
        r#"
CD25 t
main
    x : integer
begin
    x = 1.5;
end CD25 t
"#,
        "incorrect type assignment",
    );
}

#[test]
fn modulus_requires_integers() {
    assert_semantic(
        r#"
CD25 t
main
    x : integer
begin
    x = 5 % 2.0;
end CD25 t
"#,
        "modulus",
    );
}

#[test]
fn exponent_requires_integers() {
    assert_semantic(
        r#"
CD25 t
main
    x : integer
begin
    x = 2.0 ^ 2;
end CD25 t
"#,
        "exponentiation",
    );
}

#[test]
fn error_operands_do_not_cascade() {
    // `y` is undeclared; the enclosing arithmetic must not add its own
    // mismatch diagnostics on top
    let source = r#"
CD25 t
main
    x : integer
begin
    x = y % 2;
end CD25 t
"#;
    let diags = diagnostics_of(source);
    let semantic: Vec<_> = diags
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .collect();
    assert_eq!(semantic.len(), 1, "only the undeclared report: {:?}", diags);
}

#[test]
fn printing_a_boolean_is_rejected() {
    assert_semantic(
        r#"
CD25 t
main
    flag : boolean
begin
    out << flag;
end CD25 t
"#,
        "can be printed",
    );
}

#[test]
fn relop_requires_numeric_operands() {
    assert_semantic(
        r#"
CD25 t
main
    flag : boolean,
    x : integer
begin
    if (flag < x)
        x = 1;
    end
end CD25 t
"#,
        "relational operator",
    );
}

// ── Functions ────────────────────────────────────────────────────────────

#[test]
fn too_many_arguments() {
    assert_semantic(
        r#"
CD25 t
func f (a : integer) : integer
    r : integer
begin
    r = a;
    return r;
end
main
    x : integer
begin
    x = f(1, 2);
end CD25 t
"#,
        "too many",
    );
}

#[test]
fn too_few_arguments() {
    assert_semantic(
        r#"
CD25 t
func f (a : integer, b : integer) : integer
    r : integer
begin
    r = a + b;
    return r;
end
main
    x : integer
begin
    x = f(1);
end CD25 t
"#,
        "too few",
    );
}

#[test]
fn argument_type_mismatch() {
    assert_semantic(
        r#"
CD25 t
func f (a : integer) : integer
    r : integer
begin
    r = a;
    return r;
end
main
    x : integer
begin
    x = f(1.5);
end CD25 t
"#,
        "expected integer argument",
    );
}

#[test]
fn void_function_in_expression() {
    assert_semantic(
        r#"
CD25 t
func p (a : integer) : void
    t : integer
begin
    t = a;
    return void;
end
main
    x : integer
begin
    x = p(1);
end CD25 t
"#,
        "not an expression",
    );
}

#[test]
fn non_void_function_as_statement() {
    assert_semantic(
        r#"
CD25 t
func f (a : integer) : integer
    r : integer
begin
    r = a;
    return r;
end
main
    x : integer
begin
    f(1);
end CD25 t
"#,
        "not a statement",
    );
}

#[test]
fn function_must_return() {
    assert_semantic(
        r#"
CD25 t
func f (a : integer) : integer
    r : integer
begin
    r = a;
end
main
    x : integer
begin
    x = f(1);
end CD25 t
"#,
        "does not return",
    );
}

#[test]
fn local_array_declarations_are_rejected() {
    assert_semantic(
        r#"
CD25 t
types
    rec is a : integer end
    tbl is array [ 2 ] of rec end
arrays
    arr : tbl
func f (n : integer) : integer
    scratch : tbl
begin
    return n;
end
main
    x : integer
begin
    x = f(1);
end CD25 t
"#,
        "global arrays section",
    );
}

// ── Program structure ────────────────────────────────────────────────────

#[test]
fn program_name_mismatch() {
    assert_semantic(
        r#"
CD25 alpha
main
    x : integer
begin
    x = 1;
end CD25 beta
"#,
        "program name mismatch",
    );
}

#[test]
fn array_size_must_be_constant() {
    assert_semantic(
        r#"
CD25 t
types
    rec is a : integer end
    tbl is array [ k ] of rec end
arrays
    arr : tbl
main
    x : integer
begin
    x = 1;
end CD25 t
"#,
        "array size",
    );
}

#[test]
fn constant_must_be_compile_time() {
    assert_semantic(
        r#"
CD25 t
constants
    k is g
main
    x : integer
begin
    x = k;
end CD25 t
"#,
        "compile time",
    );
}

// ── Syntax errors and recovery ───────────────────────────────────────────

#[test]
fn missing_semicolon_is_a_syntax_error() {
    let diags = diagnostics_of(
        r#"
CD25 t
main
    x : integer
begin
    x = 1
end CD25 t
"#,
    );
    assert!(diags.iter().any(|d| d.phase == Phase::Syntax));
}

#[test]
fn recovery_reports_errors_in_later_statements() {
    let diags = diagnostics_of(
        r#"
CD25 t
main
    x : integer
begin
    x = ;
    x = 1;
    x = * 2;
end CD25 t
"#,
    );
    let syntax = diags
        .iter()
        .filter(|d| d.phase == Phase::Syntax)
        .count();
    assert!(
        syntax >= 2,
        "both bad statements should be reported: {:?}",
        diags
    );
}

#[test]
fn unexpected_character_is_a_lexical_error() {
    let diags = diagnostics_of(
        r#"
CD25 t
main
    x : integer
begin
    x = 1 @ 2;
end CD25 t
"#,
    );
    assert!(diags.iter().any(|d| d.phase == Phase::Lexical));
}

#[test]
fn keyword_capitalisation_warns_but_compiles() {
    let source = r#"
CD25 t
main
    x : integer
BEGIN
    x = 1;
end CD25 t
"#;
    let (ast, lister) = parse_and_analyse(source);
    assert!(ast.is_valid);
    assert!(lister
        .diagnostics()
        .iter()
        .any(|d| d.severity == Severity::Warning && d.phase == Phase::Lexical));
}

#[test]
fn diagnostics_carry_positions() {
    let diags = diagnostics_of(
        r#"
CD25 t
main
    x : integer
begin
    x = y;
end CD25 t
"#,
    );
    let undeclared = diags
        .iter()
        .find(|d| d.message.contains("undeclared"))
        .expect("undeclared diagnostic");
    assert_eq!(undeclared.line, 6);
    assert!(undeclared.col >= 9);
}
