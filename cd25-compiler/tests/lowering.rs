use cd25_compiler::compile_to_tac;
use cd25_compiler::ir::{Adr, Line, Op, Tac};

fn ops_of(tac: &Tac) -> Vec<Op> {
    tac.lines.iter().map(|l| l.op).collect()
}

fn find<'a>(tac: &'a Tac, op: Op) -> Vec<&'a Line> {
    tac.lines.iter().filter(|l| l.op == op).collect()
}

// ── Scenario: integer arithmetic into a global ───────────────────────────

#[test]
fn int_addition_pools_and_lines() {
    let source = r#"
CD25 t
main
    x : integer
begin
    x = 3 + 4;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();

    // zero-init pools 0 first, then the two literals at distinct indices
    assert_eq!(tac.ints, vec![0, 3, 4]);

    let adds = find(&tac, Op::AddI);
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].left, Adr::Temp(0));
    assert_eq!(adds[0].middle, Adr::IntLit(1));
    assert_eq!(adds[0].right, Adr::IntLit(2));

    let assigns = find(&tac, Op::Asign);
    // zero-init plus the statement itself
    assert_eq!(assigns.len(), 2);
    assert_eq!(assigns[1].left, Adr::Var(0));
    assert_eq!(assigns[1].right, Adr::Temp(0));
}

// ── Scenario: int promoted on one side only ──────────────────────────────

#[test]
fn mixed_addition_promotes_the_int_side() {
    let source = r#"
CD25 t
main
    r : real
begin
    r = 3 + 2.5;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    assert_eq!(tac.ints, vec![3]);
    assert_eq!(tac.floats, vec![0.0, 2.5]);

    let itofs = find(&tac, Op::Itof);
    assert_eq!(itofs.len(), 1);
    assert_eq!(itofs[0].left, Adr::Temp(0));
    assert_eq!(itofs[0].right, Adr::IntLit(0));

    let adds = find(&tac, Op::AddF);
    assert_eq!(adds.len(), 1);
    assert_eq!(adds[0].left, Adr::Temp(1));
    assert_eq!(adds[0].middle, Adr::Temp(0));
    assert_eq!(adds[0].right, Adr::FloatLit(1));

    let last = tac.lines.last().unwrap();
    assert_eq!(last.op, Op::Asign);
    assert_eq!(last.left, Adr::Var(0));
    assert_eq!(last.right, Adr::Temp(1));
}

#[test]
fn no_conversion_when_both_sides_match() {
    let both_real = r#"
CD25 t
main
    r : real
begin
    r = 1.5 + 2.5;
end CD25 t
"#;
    let tac = compile_to_tac(both_real).unwrap();
    assert!(find(&tac, Op::Itof).is_empty());
    assert_eq!(find(&tac, Op::AddF).len(), 1);

    let both_int = r#"
CD25 t
main
    x : integer
begin
    x = 1 + 2;
end CD25 t
"#;
    let tac = compile_to_tac(both_int).unwrap();
    assert!(find(&tac, Op::Itof).is_empty());
    assert!(find(&tac, Op::AddF).is_empty());
    assert_eq!(find(&tac, Op::AddI).len(), 1);
}

// ── Scenario: if/else linearisation ──────────────────────────────────────

#[test]
fn if_else_uses_two_fresh_labels() {
    let source = r#"
CD25 t
main
    x : integer
begin
    if (x < 1)
        x = 1;
    else
        x = 2;
    end
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();

    let gotofs = find(&tac, Op::GotoF);
    let gotos = find(&tac, Op::Goto);
    let labels = find(&tac, Op::Label);
    assert_eq!(gotofs.len(), 1);
    assert_eq!(gotos.len(), 1);
    assert_eq!(labels.len(), 2);

    // GOTOF targets the else label, GOTO the end label
    assert_eq!(gotofs[0].left, Adr::Label(1));
    assert_eq!(gotos[0].left, Adr::Label(0));

    // order: GOTOF ... GOTO, LABEL(else), ... LABEL(end)
    let ops = ops_of(&tac);
    let gotof_at = ops.iter().position(|&o| o == Op::GotoF).unwrap();
    let goto_at = ops.iter().position(|&o| o == Op::Goto).unwrap();
    let else_at = tac
        .lines
        .iter()
        .position(|l| l.op == Op::Label && l.left == Adr::Label(1))
        .unwrap();
    let end_at = tac
        .lines
        .iter()
        .position(|l| l.op == Op::Label && l.left == Adr::Label(0))
        .unwrap();
    assert!(gotof_at < goto_at);
    assert!(goto_at < else_at);
    assert!(else_at < end_at);
}

// ── Scenario: call protocol and lookahead ────────────────────────────────

#[test]
fn params_are_left_to_right_before_the_call() {
    let source = r#"
CD25 t
func f (a : integer, b : integer) : void
    t : integer
begin
    t = a + b;
    return void;
end
main
    x : integer,
    y : integer
begin
    f(x, y);
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();

    let params = find(&tac, Op::Param);
    assert_eq!(params.len(), 2);
    assert_eq!(params[0].left, Adr::Var(0), "first PARAM is the left arg");
    assert_eq!(params[1].left, Adr::Var(1));

    let calls = find(&tac, Op::Call);
    assert_eq!(calls.len(), 1);
    assert_eq!(tac.string_at(calls[0].left), "f");
    assert_eq!(tac.int_at(calls[0].right), 2);

    // the lookahead contract: from the first PARAM, exactly one more PARAM
    // sits between it and the CALL
    let first_param = tac.lines.iter().position(|l| l.op == Op::Param).unwrap();
    let mut between = 0;
    for l in &tac.lines[first_param + 1..] {
        match l.op {
            Op::Call | Op::CallVal => break,
            Op::Param => between += 1,
            _ => {}
        }
    }
    assert_eq!(between, 1);
}

// ── Scenario: struct-array element write ─────────────────────────────────

#[test]
fn element_write_computes_stride_and_field_offset() {
    let source = r#"
CD25 t
constants
    n is 4
types
    rec is a : integer, b : integer, c : integer end
    tbl is array [ n ] of rec end
arrays
    arr : tbl
main
    i : integer,
    v : integer
begin
    arr[i].b = v;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();

    let muls = find(&tac, Op::MulI);
    assert_eq!(muls.len(), 1);
    assert_eq!(muls[0].left, Adr::Temp(0));
    assert_eq!(muls[0].middle, Adr::Var(0));
    assert_eq!(tac.int_at(muls[0].right), 24, "stride is 3 fields x 8 bytes");

    let adds = find(&tac, Op::AddI);
    assert_eq!(adds.len(), 2);
    assert_eq!(adds[0].left, Adr::Temp(1));
    assert_eq!(adds[0].middle, Adr::ArrayBase(0));
    assert_eq!(adds[0].right, Adr::Temp(0));
    assert_eq!(adds[1].left, Adr::Temp(2));
    assert_eq!(adds[1].middle, Adr::Temp(1));
    assert_eq!(tac.int_at(adds[1].right), 8, "second field sits 8 bytes in");

    let stores = find(&tac, Op::Store);
    assert_eq!(stores.len(), 1);
    assert_eq!(stores[0].left, Adr::Temp(2));
    assert_eq!(stores[0].right, Adr::Var(1));

    // the array pool carries the byte length: 4 elements x 24 bytes
    assert_eq!(tac.arrays, vec![96]);
}

// ── Pool dedup ───────────────────────────────────────────────────────────

#[test]
fn int_pool_dedups_repeated_literals() {
    let source = r#"
CD25 t
main
    x : integer
begin
    x = 7 + 7;
    x = 7;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    assert_eq!(tac.ints.iter().filter(|&&v| v == 7).count(), 1);
}

#[test]
fn float_pool_dedups_repeated_literals() {
    let source = r#"
CD25 t
main
    r : real
begin
    r = 1.5 + 1.5;
    r = 1.5;
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();
    assert_eq!(tac.floats.iter().filter(|&&v| v == 1.5).count(), 1);
}

// ── Per-function counter reset ───────────────────────────────────────────

#[test]
fn temp_and_label_counters_restart_per_function() {
    let source = r#"
CD25 t
func f (a : integer) : integer
    s : integer
begin
    if (a > 0)
        s = a + 1;
    end
    return s;
end
func g (b : integer) : integer
    s : integer
begin
    if (b > 0)
        s = b + 2;
    end
    return s;
end
main
    x : integer
begin
    x = f(1) + g(2);
end CD25 t
"#;
    let tac = compile_to_tac(source).unwrap();

    let func_marks: Vec<usize> = tac
        .lines
        .iter()
        .enumerate()
        .filter(|(_, l)| l.op == Op::Func)
        .map(|(i, _)| i)
        .collect();
    assert_eq!(func_marks.len(), 3, "f, g and main");

    for (which, &start) in func_marks.iter().enumerate() {
        let end = func_marks
            .get(which + 1)
            .copied()
            .unwrap_or(tac.lines.len());
        let mut first_temp = None;
        let mut first_label = None;
        for l in &tac.lines[start + 1..end] {
            for adr in [l.left, l.middle, l.right] {
                if first_temp.is_none() {
                    if let Adr::Temp(n) = adr {
                        first_temp = Some(n);
                    }
                }
                if first_label.is_none() {
                    if let Adr::Label(n) = adr {
                        first_label = Some(n);
                    }
                }
            }
        }
        assert_eq!(first_temp, Some(0), "function {} first temp", which);
        if first_label.is_some() {
            assert_eq!(first_label, Some(0), "function {} first label", which);
        }
    }
}
