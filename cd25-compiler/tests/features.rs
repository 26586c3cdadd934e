use cd25_compiler::compile_to_tac;
use cd25_compiler::ir::{Adr, Line, Op, Tac};

fn find<'a>(tac: &'a Tac, op: Op) -> Vec<&'a Line> {
    tac.lines.iter().filter(|l| l.op == op).collect()
}

// ── Loops ────────────────────────────────────────────────────────────────

#[test]
fn for_loop_shape() {
    let source = r#"
CD25 t
main
    i : integer
begin
    for (i = 0; i < 3)
        i += 1;
    end
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();

    // init, LABEL start, cond, GOTOF end, body, GOTO start, LABEL end
    let start_at = tac
        .lines
        .iter()
        .position(|l| l.op == Op::Label && l.left == Adr::Label(0))
        .unwrap();
    let init_at = tac
        .lines
        .iter()
        .position(|l| l.op == Op::Asign && l.left == Adr::Var(0))
        .unwrap();
    assert!(init_at < start_at);

    let gotof = find(&tac, Op::GotoF)[0];
    assert_eq!(gotof.left, Adr::Label(1));

    let goto = find(&tac, Op::Goto)[0];
    assert_eq!(goto.left, Adr::Label(0));

    let end_at = tac
        .lines
        .iter()
        .position(|l| l.op == Op::Label && l.left == Adr::Label(1))
        .unwrap();
    assert_eq!(end_at, tac.lines.len() - 1);
}

#[test]
fn repeat_branches_back_while_condition_is_false() {
    let source = r#"
CD25 t
main
    i : integer
begin
    repeat (i = 0)
        i += 1;
    until i == 3;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();

    let labels = find(&tac, Op::Label);
    assert_eq!(labels.len(), 1);
    let start = labels[0].left;

    // the back-edge is a GOTOF to the start label: the loop repeats until
    // the condition turns true
    let gotofs = find(&tac, Op::GotoF);
    assert_eq!(gotofs.len(), 1);
    assert_eq!(gotofs[0].left, start);
    assert!(find(&tac, Op::Goto).is_empty());

    let eqs = find(&tac, Op::EqI);
    assert_eq!(eqs.len(), 1);
    assert_eq!(gotofs[0].right, eqs[0].left);
}

// ── I/O ──────────────────────────────────────────────────────────────────

#[test]
fn input_picks_read_op_by_type() {
    let source = r#"
CD25 t
main
    n : integer,
    r : real
begin
    in >> n, r;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    let readi = find(&tac, Op::ReadI);
    let readf = find(&tac, Op::ReadF);
    assert_eq!(readi.len(), 1);
    assert_eq!(readi[0].left, Adr::Var(0));
    assert_eq!(readf.len(), 1);
    assert_eq!(readf[0].left, Adr::Var(1));
}

#[test]
fn output_line_interleaves_strings_and_values() {
    let source = r#"
CD25 t
main
    x : integer
begin
    out << "answer", x << line;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    let ops: Vec<Op> = tac.lines.iter().map(|l| l.op).collect();

    let str_at = ops.iter().position(|&o| o == Op::PrintStr).unwrap();
    let spc_at = ops.iter().position(|&o| o == Op::PrintSpc).unwrap();
    let int_at = ops.iter().position(|&o| o == Op::PrintI).unwrap();
    let ln_at = ops.iter().position(|&o| o == Op::PrintLn).unwrap();
    assert!(str_at < spc_at && spc_at < int_at && int_at < ln_at);

    let printed = find(&tac, Op::PrintStr)[0];
    assert_eq!(tac.string_at(printed.left), "answer");
}

// ── Whole-aggregate assignment ───────────────────────────────────────────

#[test]
fn whole_array_assignment_unrolls() {
    let source = r#"
CD25 t
types
    rec is a : integer, b : integer end
    tbl is array [ 2 ] of rec end
arrays
    src : tbl,
    dst : tbl
main
    i : integer
begin
    dst = src;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();

    // 2 elements x 2 fields x 8 bytes = 32 bytes = 4 word copies
    assert_eq!(find(&tac, Op::Deref).len(), 4);
    assert_eq!(find(&tac, Op::Store).len(), 4);
    // each word: two address adds (dst+off, src+off)
    assert_eq!(find(&tac, Op::AddI).len(), 8);
    // no runtime loop: straight-line code only
    assert!(find(&tac, Op::Goto).is_empty());
    assert!(find(&tac, Op::GotoF).is_empty());
    assert!(find(&tac, Op::Label).is_empty());
}

#[test]
fn whole_struct_assignment_copies_one_element() {
    let source = r#"
CD25 t
types
    rec is a : integer, b : integer, c : integer end
    tbl is array [ 4 ] of rec end
arrays
    arr : tbl
main
    i : integer,
    j : integer
begin
    arr[i] = arr[j];
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    // 3 fields = 3 word copies
    assert_eq!(find(&tac, Op::Deref).len(), 3);
    assert_eq!(find(&tac, Op::Store).len(), 3);
}

// ── Compound assignment ──────────────────────────────────────────────────

#[test]
fn compound_assign_to_simple_var_is_in_place() {
    let source = r#"
CD25 t
main
    x : integer
begin
    x += 2;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    let adds = find(&tac, Op::AddI);
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].left, Adr::Var(0));
    assert_eq!(adds[0].middle, Adr::Var(0));
}

#[test]
fn compound_assign_to_field_goes_through_memory() {
    let source = r#"
CD25 t
types
    rec is a : integer, b : integer end
    tbl is array [ 2 ] of rec end
arrays
    arr : tbl
main
    i : integer
begin
    arr[i].a += 1;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    // read-modify-write through the computed address
    assert_eq!(find(&tac, Op::Deref).len(), 1);
    assert_eq!(find(&tac, Op::Store).len(), 1);
    let ops: Vec<Op> = tac.lines.iter().map(|l| l.op).collect();
    let deref_at = ops.iter().position(|&o| o == Op::Deref).unwrap();
    let add_at = ops.iter().rposition(|&o| o == Op::AddI).unwrap();
    let store_at = ops.iter().position(|&o| o == Op::Store).unwrap();
    assert!(deref_at < add_at && add_at < store_at);
}

// ── Constants ────────────────────────────────────────────────────────────

#[test]
fn constants_fold_into_the_pools() {
    let source = r#"
CD25 t
constants
    k is 2 + 3,
    half is 0.5
main
    x : integer,
    r : real
begin
    x = k;
    r = half;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    assert!(tac.ints.contains(&5));
    assert!(tac.floats.contains(&0.5));

    // a constant reference is a pool operand, not a variable slot
    let k_idx = tac.ints.iter().position(|&v| v == 5).unwrap() as u16;
    let assigns = find(&tac, Op::Asign);
    assert!(assigns
        .iter()
        .any(|l| l.left == Adr::Var(0) && l.right == Adr::IntLit(k_idx)));
}

#[test]
fn constant_feeds_array_size() {
    let source = r#"
CD25 t
constants
    n is 3
types
    rec is a : integer end
    tbl is array [ n + 1 ] of rec end
arrays
    arr : tbl
main
    i : integer
begin
    i = 0;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    assert_eq!(tac.arrays, vec![32], "(3+1) elements x 1 field x 8 bytes");
}

// ── Booleans ─────────────────────────────────────────────────────────────

#[test]
fn boolean_operators_lower_to_ternary_lines() {
    let source = r#"
CD25 t
main
    flag : boolean
begin
    flag = true and false;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    assert_eq!(find(&tac, Op::True).len(), 1);
    assert_eq!(
        find(&tac, Op::False).len(),
        2,
        "boolean zero-init plus the literal"
    );
    let ands = find(&tac, Op::And);
    assert_eq!(ands.len(), 1);
    assert_eq!(ands[0].middle, Adr::Temp(0));
    assert_eq!(ands[0].right, Adr::Temp(1));
}

#[test]
fn negated_relation_computes_then_negates() {
    let source = r#"
CD25 t
main
    x : integer,
    flag : boolean
begin
    flag = not x == 3;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    let eqs = find(&tac, Op::EqI);
    let nots = find(&tac, Op::Not);
    assert_eq!(eqs.len(), 1);
    assert_eq!(nots.len(), 1);
    assert_eq!(nots[0].right, eqs[0].left);
}

#[test]
fn real_comparison_picks_float_opcode_and_promotes() {
    let source = r#"
CD25 t
main
    r : real,
    flag : boolean
begin
    flag = r > 2;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    assert_eq!(find(&tac, Op::GtF).len(), 1);
    assert!(find(&tac, Op::GtI).is_empty());
    assert_eq!(find(&tac, Op::Itof).len(), 1, "the int literal is promoted");
}

// ── Functions ────────────────────────────────────────────────────────────

#[test]
fn call_in_expression_produces_callval() {
    let source = r#"
CD25 t
func inc (a : integer) : integer
    r : integer
begin
    r = a + 1;
    return r;
end
main
    x : integer
begin
    x = inc(41);
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    let calls = find(&tac, Op::CallVal);
    assert_eq!(calls.len(), 1);
    assert_eq!(tac.string_at(calls[0].middle), "inc");
    assert_eq!(tac.int_at(calls[0].right), 1);
    assert!(find(&tac, Op::Call).is_empty());
}

#[test]
fn exponent_lowers_to_integer_pow() {
    let source = r#"
CD25 t
main
    x : integer
begin
    x = 2 ^ 10;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    assert_eq!(find(&tac, Op::Pow).len(), 1);
}

#[test]
fn function_parameters_get_param_slots() {
    let source = r#"
CD25 t
func sum (a : integer, b : integer) : integer
    s : integer
begin
    s = a + b;
    return s;
end
main
    x : integer
begin
    x = sum(1, 2);
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    let adds = find(&tac, Op::AddI);
    assert_eq!(adds[0].middle, Adr::Param(0));
    assert_eq!(adds[0].right, Adr::Param(1));
}

#[test]
fn void_function_body_gets_a_trailing_return() {
    let source = r#"
CD25 t
func ping () : void
    t : integer
begin
    t = 1;
    return void;
end
func noisy (a : integer) : integer
    t : integer
begin
    if (a > 0)
        return a;
    end
    t = 0;
    return t;
end
main
    x : integer
begin
    ping();
    x = noisy(1);
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    // one explicit RETN from ping; noisy returns values via RVAL
    assert!(find(&tac, Op::Retn).len() >= 1);
    assert_eq!(find(&tac, Op::RVal).len(), 2);
}

// ── Samples stay compilable ──────────────────────────────────────────────

#[test]
fn sample_programs_lower_cleanly() {
    for name in ["triangle", "average", "ledger", "guess"] {
        let path = format!("../samples/{}.cd", name);
        let source = std::fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read {}: {}", path, e));
        let tac = compile_to_tac(&source)
            .unwrap_or_else(|e| panic!("{} should lower: {}", name, e));
        assert!(!tac.lines.is_empty());
    }
}
