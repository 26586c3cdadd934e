use cd25_compiler::{compile_to_sm25, compile_to_sm25_listing, compile_to_x86};

fn sample(name: &str) -> String {
    let path = format!("../samples/{}.cd", name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("failed to read {}: {}", path, e))
}

// ── x86-64 emission ──────────────────────────────────────────────────────

#[test]
fn samples_compile_to_x86() {
    for name in ["triangle", "average", "ledger", "guess"] {
        let asm = compile_to_x86(&sample(name), None)
            .unwrap_or_else(|e| panic!("{} should compile: {}", name, e));
        assert!(asm.contains("global main"), "{} needs a main label", name);
        assert!(asm.contains("section .text"));
        assert!(asm.contains("call exit"));
    }
}

#[test]
fn x86_two_arg_call_uses_both_param_registers() {
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
    let asm = compile_to_x86(source, None).unwrap();
    assert!(asm.contains("mov rdi, 1"), "first arg in rdi:\n{}", asm);
    assert!(asm.contains("mov rsi, 2"), "second arg in rsi:\n{}", asm);
    assert!(asm.contains("call sum"));
    // callee spills its two parameters on entry
    assert!(asm.contains("mov [rbp-8], rdi"));
    assert!(asm.contains("mov [rbp-16], rsi"));
}

#[test]
fn x86_frames_are_sixteen_byte_aligned() {
    let source = r#"
CD25 t
main
    x : integer
begin
    x = 1 + 2;
end CD25 t
"#;
    let asm = compile_to_x86(source, None).unwrap();
    for line in asm.lines() {
        if let Some(rest) = line.trim().strip_prefix("sub rsp, ") {
            let bytes: u32 = rest.parse().unwrap();
            assert_eq!(bytes % 16, 0, "frame size {} not aligned", bytes);
        }
    }
}

#[test]
fn x86_globals_become_bss_blocks() {
    let source = r#"
CD25 t
types
    rec is a : integer, b : integer end
    tbl is array [ 3 ] of rec end
arrays
    arr : tbl
main
    i : integer
begin
    i = 0;
end CD25 t
"#;
    let asm = compile_to_x86(source, None).unwrap();
    assert!(asm.contains("A0 resb 48"), "3 elements x 16 bytes:\n{}", asm);
}

#[test]
fn x86_debug_mode_embeds_line_directives() {
    let source = r#"
CD25 t
main
    x : integer
begin
    x = 1;
end CD25 t
"#;
    let asm = compile_to_x86(source, Some("t.cd")).unwrap();
    assert!(asm.contains("%line"), "debug build carries %line:\n{}", asm);
    let plain = compile_to_x86(source, None).unwrap();
    assert!(!plain.contains("%line"));
}

// ── SM25 emission ────────────────────────────────────────────────────────

#[test]
fn samples_compile_to_sm25() {
    for name in ["triangle", "average", "ledger", "guess"] {
        let module = compile_to_sm25(&sample(name))
            .unwrap_or_else(|e| panic!("{} should compile: {}", name, e));
        assert!(!module.is_empty());
    }
}

#[test]
fn sm25_module_header_counts_instruction_words() {
    let source = r#"
CD25 t
main
    x : integer
begin
    x = 1 + 2;
end CD25 t
"#;
    let module = compile_to_sm25(source).unwrap();
    let mut lines = module.lines();
    let words: usize = lines.next().unwrap().trim().parse().unwrap();
    assert!(words > 0);

    // the next `words` lines each hold eight byte values
    for _ in 0..words {
        let row = lines.next().expect("instruction row");
        let count = row.split_whitespace().count();
        assert_eq!(count, 8, "bad instruction row '{}'", row);
    }

    // then the integer pool, length first
    let n_ints: usize = lines.next().unwrap().trim().parse().unwrap();
    for _ in 0..n_ints {
        let v = lines.next().expect("int row");
        v.trim().parse::<i64>().expect("int value");
    }
}

#[test]
fn sm25_listing_is_readable() {
    let source = r#"
CD25 t
main
    x : integer
begin
    if (x < 1)
        x = 1;
    end
end CD25 t
"#;
    let listing = compile_to_sm25_listing(source).unwrap();
    assert!(listing.contains("ALLOC"));
    assert!(listing.contains("BRF"));
    assert!(listing.contains("HALT"));
}
