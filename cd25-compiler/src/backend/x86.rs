//! x86-64 text emission (NASM syntax, System V AMD64).
//!
//! Consumes the TAC alone. Every Temp/Var/Param slot lives in the current
//! function's stack frame; frame sizes are discovered by scanning forward
//! from each `FUNC` marker to the next. A `PARAM` line finds its register
//! by looking ahead to the matching `CALL`/`CALLVAL` and counting the
//! `PARAM` lines in between.

use std::fmt::Write;

use crate::ir::tac::{Adr, Line, Op, Tac};

const PARAM_REGS: [&str; 6] = ["rdi", "rsi", "rdx", "rcx", "r8", "r9"];

pub fn emit(tac: &Tac, source_name: Option<&str>) -> String {
    let mut e = Emitter {
        tac,
        out: String::new(),
        params: 0,
        vars: 0,
        source_line: 0,
        source_name,
        gen_labels: 0,
    };
    e.prologue();
    for idx in 0..tac.lines.len() {
        e.line(idx);
    }
    // main falls through here once its statements finish
    e.raw("    mov rdi, 0");
    e.raw("    call exit");
    e.out
}

struct Emitter<'a> {
    tac: &'a Tac,
    out: String,
    /// current function's parameter count (slots below vars)
    params: u16,
    /// current function's variable count (slots below temps)
    vars: u16,
    source_line: u32,
    source_name: Option<&'a str>,
    gen_labels: u32,
}

impl<'a> Emitter<'a> {
    fn raw(&mut self, s: &str) {
        self.out.push_str(s);
        self.out.push('\n');
    }

    fn ins(&mut self, s: String) {
        self.out.push_str("    ");
        self.out.push_str(&s);
        self.out.push('\n');
    }

    fn slot(&self, offset: u16) -> String {
        format!("qword [rbp-{}]", (offset as u32 + 1) * 8)
    }

    fn operand(&self, adr: Adr) -> String {
        match adr {
            Adr::Param(n) => self.slot(n),
            Adr::Var(n) => self.slot(self.params + n),
            Adr::Temp(n) => self.slot(self.params + self.vars + n),
            Adr::ArrayBase(n) => format!("A{}", n),
            Adr::IntLit(n) => self.tac.ints[n as usize].to_string(),
            Adr::FloatLit(n) => format!("[rel F{}]", n),
            Adr::StrLit(n) => format!("S{}", n),
            Adr::Label(_) | Adr::Empty => unreachable!("no operand form for {}", adr),
        }
    }

    fn is_mem(&self, adr: Adr) -> bool {
        matches!(
            adr,
            Adr::Param(_) | Adr::Var(_) | Adr::Temp(_) | Adr::FloatLit(_)
        )
    }

    /// `mov dst, src`, going through rax when both sides are memory.
    fn mov(&mut self, dst: Adr, src: Adr) {
        if matches!(src, Adr::FloatLit(_)) {
            self.ins(format!("movq xmm0, {}", self.operand(src)));
            self.ins(format!("movq {}, xmm0", self.operand(dst)));
        } else if self.is_mem(dst) && self.is_mem(src) {
            self.ins(format!("mov rax, {}", self.operand(src)));
            self.ins(format!("mov {}, rax", self.operand(dst)));
        } else {
            self.ins(format!("mov {}, {}", self.operand(dst), self.operand(src)));
        }
    }

    fn int_arith(&mut self, op: &str, l: &Line) {
        self.ins(format!("mov rax, {}", self.operand(l.middle)));
        self.ins(format!("{} rax, {}", op, self.operand(l.right)));
        self.ins(format!("mov {}, rax", self.operand(l.left)));
    }

    fn float_arith(&mut self, op: &str, l: &Line) {
        self.ins(format!("movq xmm0, {}", self.operand(l.middle)));
        self.ins(format!("{} xmm0, {}", op, self.operand(l.right)));
        self.ins(format!("movq {}, xmm0", self.operand(l.left)));
    }

    /// Integer division; quotient in rax, remainder in rdx.
    fn divide(&mut self, l: &Line, take: &str) {
        self.ins(format!("mov rax, {}", self.operand(l.middle)));
        self.ins(format!("mov rbx, {}", self.operand(l.right)));
        self.ins("cqo".to_string());
        self.ins("idiv rbx".to_string());
        self.ins(format!("mov {}, {}", self.operand(l.left), take));
    }

    fn compare_int(&mut self, set: &str, l: &Line) {
        self.ins("xor rdx, rdx".to_string());
        self.ins(format!("mov rax, {}", self.operand(l.middle)));
        self.ins(format!("cmp rax, {}", self.operand(l.right)));
        self.ins(format!("{} dl", set));
        self.ins(format!("mov {}, rdx", self.operand(l.left)));
    }

    fn compare_float(&mut self, set: &str, l: &Line) {
        self.ins("xor rdx, rdx".to_string());
        self.ins(format!("movq xmm0, {}", self.operand(l.middle)));
        self.ins(format!("ucomisd xmm0, {}", self.operand(l.right)));
        self.ins(format!("{} dl", set));
        self.ins(format!("mov {}, rdx", self.operand(l.left)));
    }

    fn print_via(&mut self, fmt_label: &str, setup: impl FnOnce(&mut Self)) {
        self.ins("mov rdi, [rel stdout]".to_string());
        self.ins(format!("lea rsi, [rel {}]", fmt_label));
        setup(self);
        self.ins("call fprintf".to_string());
    }

    /// Register for a `PARAM` line: look ahead to the matching call, count
    /// the `PARAM` lines between, and index from the left.
    fn param_register(&self, idx: usize) -> &'static str {
        let mut between = 0usize;
        for l in &self.tac.lines[idx + 1..] {
            match l.op {
                Op::Call | Op::CallVal => {
                    let argc = self.tac.int_at(l.right) as usize;
                    let position = argc - 1 - between;
                    return PARAM_REGS[position];
                }
                Op::Param => between += 1,
                _ => {}
            }
        }
        unreachable!("PARAM line with no following call")
    }

    /// Frame discovery: scan this function's lines for the largest slot of
    /// each kind, in any operand position.
    fn scan_frame(&mut self, func_idx: usize) -> u16 {
        let mut params = 0u16;
        let mut vars = 0u16;
        let mut temps = 0u16;
        for l in &self.tac.lines[func_idx + 1..] {
            if l.op == Op::Func {
                break;
            }
            for adr in [l.left, l.middle, l.right] {
                match adr {
                    Adr::Param(n) => params = params.max(n + 1),
                    Adr::Var(n) => vars = vars.max(n + 1),
                    Adr::Temp(n) => temps = temps.max(n + 1),
                    _ => {}
                }
            }
        }
        self.params = params;
        self.vars = vars;
        temps
    }

    fn line(&mut self, idx: usize) {
        let l = self.tac.lines[idx];
        if let Some(name) = self.source_name {
            if l.line > self.source_line {
                let directive = format!("%line {}+1 \"{}\"", l.line, name);
                self.raw(&directive);
                self.source_line = l.line;
            }
        }
        match l.op {
            Op::Func => self.func_prologue(idx, &l),
            Op::Asign => self.mov(l.left, l.right),
            Op::Store => {
                self.ins(format!("mov rdx, {}", self.operand(l.left)));
                self.ins(format!("mov rcx, {}", self.operand(l.right)));
                self.ins("mov [rdx], rcx".to_string());
            }
            Op::Deref => {
                self.ins(format!("mov rdx, {}", self.operand(l.right)));
                self.ins("mov rcx, [rdx]".to_string());
                self.ins(format!("mov {}, rcx", self.operand(l.left)));
            }
            Op::Itof => {
                if let Adr::IntLit(_) = l.right {
                    self.ins(format!("mov rax, {}", self.operand(l.right)));
                    self.ins("cvtsi2sd xmm0, rax".to_string());
                } else {
                    self.ins(format!("cvtsi2sd xmm0, {}", self.operand(l.right)));
                }
                self.ins(format!("movq {}, xmm0", self.operand(l.left)));
            }
            Op::Not => {
                self.ins(format!("mov rax, {}", self.operand(l.right)));
                self.ins("xor rax, 1".to_string());
                self.ins(format!("mov {}, rax", self.operand(l.left)));
            }
            Op::AddI => self.int_arith("add", &l),
            Op::SubI => self.int_arith("sub", &l),
            Op::MulI => self.int_arith("imul", &l),
            Op::And => self.int_arith("and", &l),
            Op::Or => self.int_arith("or", &l),
            Op::Xor => self.int_arith("xor", &l),
            Op::AddF => self.float_arith("addsd", &l),
            Op::SubF => self.float_arith("subsd", &l),
            Op::MulF => self.float_arith("mulsd", &l),
            Op::DivF => self.float_arith("divsd", &l),
            Op::DivI => self.divide(&l, "rax"),
            Op::Mod => self.divide(&l, "rdx"),
            Op::Pow => {
                let top = self.gen_labels;
                let done = self.gen_labels + 1;
                self.gen_labels += 2;
                self.ins("mov rcx, 1".to_string());
                self.ins("mov rdx, 0".to_string());
                self.raw(&format!(".CL{}:", top));
                self.ins(format!("cmp rdx, {}", self.operand(l.right)));
                self.ins(format!("je .CL{}", done));
                self.ins(format!("imul rcx, {}", self.operand(l.middle)));
                self.ins("inc rdx".to_string());
                self.ins(format!("jmp .CL{}", top));
                self.raw(&format!(".CL{}:", done));
                self.ins(format!("mov {}, rcx", self.operand(l.left)));
            }
            Op::True => self.ins(format!("mov {}, 1", self.operand(l.left))),
            Op::False => self.ins(format!("mov {}, 0", self.operand(l.left))),
            Op::EqI => self.compare_int("sete", &l),
            Op::NeqI => self.compare_int("setne", &l),
            Op::LtI => self.compare_int("setl", &l),
            Op::LteI => self.compare_int("setle", &l),
            Op::GtI => self.compare_int("setg", &l),
            Op::GteI => self.compare_int("setge", &l),
            Op::EqF => self.compare_float("sete", &l),
            Op::NeqF => self.compare_float("setne", &l),
            Op::LtF => self.compare_float("setb", &l),
            Op::LteF => self.compare_float("setbe", &l),
            Op::GtF => self.compare_float("seta", &l),
            Op::GteF => self.compare_float("setae", &l),
            Op::Label => {
                if let Adr::Label(n) = l.left {
                    self.raw(&format!(".L{}:", n));
                }
            }
            Op::Goto => {
                if let Adr::Label(n) = l.left {
                    self.ins(format!("jmp .L{}", n));
                }
            }
            Op::GotoF => {
                if let Adr::Label(n) = l.left {
                    self.ins(format!("cmp {}, 0", self.operand(l.right)));
                    self.ins(format!("je .L{}", n));
                }
            }
            Op::Param => {
                let reg = self.param_register(idx);
                self.ins(format!("mov {}, {}", reg, self.operand(l.left)));
            }
            Op::Call => {
                let name = self.tac.string_at(l.left).to_string();
                self.ins(format!("call {}", name));
            }
            Op::CallVal => {
                let name = self.tac.string_at(l.middle).to_string();
                self.ins(format!("call {}", name));
                self.ins(format!("mov {}, rax", self.operand(l.left)));
            }
            Op::RVal => {
                self.ins(format!("mov rax, {}", self.operand(l.left)));
                self.epilogue();
            }
            Op::Retn => self.epilogue(),
            Op::PrintI => self.print_via("inttmp", |e| {
                e.ins(format!("mov rdx, {}", e.operand(l.left)));
                e.ins("xor eax, eax".to_string());
            }),
            Op::PrintF => self.print_via("flttmp", |e| {
                e.ins(format!("movq xmm0, {}", e.operand(l.left)));
                e.ins("mov rax, 1".to_string());
            }),
            Op::PrintStr => self.print_via("strtmp", |e| {
                e.ins(format!("mov rdx, {}", e.operand(l.left)));
                e.ins("xor eax, eax".to_string());
            }),
            Op::PrintSpc => self.print_via("strtmp", |e| {
                e.ins("lea rdx, [rel space]".to_string());
                e.ins("xor eax, eax".to_string());
            }),
            Op::PrintLn => self.print_via("strtmp", |e| {
                e.ins("lea rdx, [rel newln]".to_string());
                e.ins("xor eax, eax".to_string());
            }),
            Op::ReadI => {
                self.ins("mov rdi, 0".to_string());
                self.ins("call READINPUT".to_string());
                self.ins(format!("mov {}, rax", self.operand(l.left)));
            }
            Op::ReadF => {
                self.ins("mov rdi, 1".to_string());
                self.ins("call READINPUT".to_string());
                self.ins(format!("movq {}, xmm0", self.operand(l.left)));
            }
        }
    }

    fn func_prologue(&mut self, idx: usize, l: &Line) {
        let name = self.tac.string_at(l.left).to_string();
        self.raw(&format!("    global {}", name));
        self.raw(&format!("{}:", name));
        let temps = self.scan_frame(idx);
        let total = (self.params + self.vars + temps) as u32;
        let mut bytes = total * 8;
        if bytes % 16 != 0 {
            bytes += 8;
        }
        self.ins("push rbp".to_string());
        self.ins("mov rbp, rsp".to_string());
        self.ins(format!("sub rsp, {}", bytes));
        for i in 0..self.params.min(6) {
            self.ins(format!(
                "mov [rbp-{}], {}",
                (i as u32 + 1) * 8,
                PARAM_REGS[i as usize]
            ));
        }
        if name == "main" {
            // open the input file before anything reads from it
            self.ins("mov rdi, FILENAME".to_string());
            self.ins("mov rsi, READMODE".to_string());
            self.ins("call fopen".to_string());
            self.ins("mov [rel fp], rax".to_string());
        }
    }

    fn epilogue(&mut self) {
        self.ins("mov rsp, rbp".to_string());
        self.ins("pop rbp".to_string());
        self.ins("ret".to_string());
    }

    fn prologue(&mut self) {
        self.raw("section .bss");
        self.raw("    fp resq 1");
        self.raw("    readbuf resb 64");
        for (i, len) in self.tac.arrays.iter().enumerate() {
            let _ = writeln!(self.out, "    A{} resb {}", i, len);
        }
        self.raw("section .rodata");
        for (i, v) in self.tac.floats.iter().enumerate() {
            let _ = writeln!(self.out, "    F{} dq {:?}", i, v);
        }
        for (i, s) in self.tac.strings.iter().enumerate() {
            let _ = writeln!(self.out, "    S{} db `{}`, 0", i, escape_nasm(s));
        }
        self.raw("    strtmp db \"%s\", 0");
        self.raw("    inttmp db \"%ld\", 0");
        self.raw("    flttmp db \"%lf\", 0");
        self.raw("    space db \" \", 0");
        self.raw("    newln db 10, 0");
        self.raw("    extern exit, stdout, fprintf, fopen, fgetc, atol, atof");
        self.raw("section .data");
        self.raw("    FILENAME db \"cd25stdin.txt\", 0");
        self.raw("    READMODE db \"r\", 0");
        self.raw("section .text");
        self.raw(READ_RUNTIME);
    }
}

fn escape_nasm(s: &str) -> String {
    s.replace('\\', "\\\\").replace('`', "\\`")
}

/// Reads one whitespace-delimited token from the input file and converts it
/// with atol (rdi = 0) or atof (rdi = 1).
const READ_RUNTIME: &str = r#"READINPUT:
    push rbp
    mov rbp, rsp
    push r12
    push r13
    mov r12, rdi
    lea r13, [rel readbuf]
.skipws:
    mov rdi, [rel fp]
    call fgetc
    cmp eax, 32
    je .skipws
    cmp eax, 10
    je .skipws
    cmp eax, 9
    je .skipws
    cmp eax, 13
    je .skipws
.collect:
    cmp eax, 32
    jle .done
    mov byte [r13], al
    inc r13
    mov rdi, [rel fp]
    call fgetc
    jmp .collect
.done:
    mov byte [r13], 0
    lea rdi, [rel readbuf]
    test r12, r12
    jnz .isreal
    call atol
    jmp .out
.isreal:
    call atof
.out:
    pop r13
    pop r12
    pop rbp
    ret"#;
