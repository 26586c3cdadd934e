//! SM25 stack-machine module emission.
//!
//! Each TAC line expands to a short push/operate/pop sequence over the
//! machine's evaluation stack. Instructions are fixed four-byte units
//! (opcode + 24-bit operand); the module file lists the instruction words
//! eight bytes per line followed by the integer, real and string pools.

use std::fmt::Write;

use crate::ir::tac::{Adr, Op, Tac};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum SmOp {
    Halt = 0,
    NoOp = 1,
    // pushes
    PushInt = 10,
    PushReal = 11,
    PushStr = 12,
    PushVar = 13,
    PushParam = 14,
    PushArray = 15,
    PushZero = 16,
    PushOne = 17,
    // pops
    PopVar = 20,
    PopParam = 21,
    // memory
    LoadInd = 24,
    StoreInd = 25,
    // arithmetic and logic (pop two, push one; NotOp and ItoF pop one)
    AddI = 30,
    SubI = 31,
    MulI = 32,
    DivI = 33,
    ModI = 34,
    PowI = 35,
    AddF = 36,
    SubF = 37,
    MulF = 38,
    DivF = 39,
    ItoF = 40,
    NotOp = 41,
    AndB = 42,
    OrB = 43,
    XorB = 44,
    CmpEqI = 50,
    CmpNeI = 51,
    CmpLtI = 52,
    CmpLeI = 53,
    CmpGtI = 54,
    CmpGeI = 55,
    CmpEqF = 56,
    CmpNeF = 57,
    CmpLtF = 58,
    CmpLeF = 59,
    CmpGtF = 60,
    CmpGeF = 61,
    // control
    Br = 70,
    BrFalse = 71,
    CallFn = 72,
    RetVal = 73,
    Ret = 74,
    Alloc = 75,
    Spill = 76,
    // io
    PrintInt = 80,
    PrintReal = 81,
    PrintString = 82,
    PrintSpace = 83,
    PrintNewline = 84,
    ReadInt = 85,
    ReadReal = 86,
}

impl SmOp {
    fn mnemonic(self) -> &'static str {
        match self {
            SmOp::Halt => "HALT",
            SmOp::NoOp => "NOOP",
            SmOp::PushInt => "PUSHI",
            SmOp::PushReal => "PUSHR",
            SmOp::PushStr => "PUSHS",
            SmOp::PushVar => "PUSHV",
            SmOp::PushParam => "PUSHP",
            SmOp::PushArray => "PUSHA",
            SmOp::PushZero => "PUSH0",
            SmOp::PushOne => "PUSH1",
            SmOp::PopVar => "POPV",
            SmOp::PopParam => "POPP",
            SmOp::LoadInd => "LOADI",
            SmOp::StoreInd => "STOREI",
            SmOp::AddI => "ADD",
            SmOp::SubI => "SUB",
            SmOp::MulI => "MUL",
            SmOp::DivI => "DIV",
            SmOp::ModI => "MOD",
            SmOp::PowI => "POW",
            SmOp::AddF => "ADDF",
            SmOp::SubF => "SUBF",
            SmOp::MulF => "MULF",
            SmOp::DivF => "DIVF",
            SmOp::ItoF => "ITOF",
            SmOp::NotOp => "NOT",
            SmOp::AndB => "AND",
            SmOp::OrB => "OR",
            SmOp::XorB => "XOR",
            SmOp::CmpEqI => "EQ",
            SmOp::CmpNeI => "NE",
            SmOp::CmpLtI => "LT",
            SmOp::CmpLeI => "LE",
            SmOp::CmpGtI => "GT",
            SmOp::CmpGeI => "GE",
            SmOp::CmpEqF => "EQF",
            SmOp::CmpNeF => "NEF",
            SmOp::CmpLtF => "LTF",
            SmOp::CmpLeF => "LEF",
            SmOp::CmpGtF => "GTF",
            SmOp::CmpGeF => "GEF",
            SmOp::Br => "BR",
            SmOp::BrFalse => "BRF",
            SmOp::CallFn => "CALL",
            SmOp::RetVal => "RETV",
            SmOp::Ret => "RET",
            SmOp::Alloc => "ALLOC",
            SmOp::Spill => "SPILL",
            SmOp::PrintInt => "PRINTI",
            SmOp::PrintReal => "PRINTR",
            SmOp::PrintString => "PRINTS",
            SmOp::PrintSpace => "SPACE",
            SmOp::PrintNewline => "NEWLINE",
            SmOp::ReadInt => "READI",
            SmOp::ReadReal => "READR",
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SmInstr {
    op: SmOp,
    operand: u32,
}

#[derive(Debug, Clone, Copy)]
enum Fixup {
    /// (instruction to patch, function ordinal, label number)
    Label(usize, usize, u16),
    /// (instruction to patch, string-pool index of the callee name)
    Call(usize, u16),
}

struct Translator<'a> {
    tac: &'a Tac,
    instrs: Vec<SmInstr>,
    fixups: Vec<Fixup>,
    /// (function ordinal, label number) -> instruction index
    labels: std::collections::HashMap<(usize, u16), usize>,
    /// string-pool index of a function name -> entry instruction index
    entries: std::collections::HashMap<u16, usize>,
    current_func: usize,
}

impl<'a> Translator<'a> {
    fn new(tac: &'a Tac) -> Self {
        Self {
            tac,
            instrs: Vec::new(),
            fixups: Vec::new(),
            labels: std::collections::HashMap::new(),
            entries: std::collections::HashMap::new(),
            current_func: 0,
        }
    }

    fn put(&mut self, op: SmOp, operand: u32) {
        self.instrs.push(SmInstr { op, operand });
    }

    fn push_value(&mut self, adr: Adr) {
        match adr {
            Adr::IntLit(n) => self.put(SmOp::PushInt, n as u32),
            Adr::FloatLit(n) => self.put(SmOp::PushReal, n as u32),
            Adr::StrLit(n) => self.put(SmOp::PushStr, n as u32),
            Adr::Var(n) => self.put(SmOp::PushVar, n as u32),
            Adr::Param(n) => self.put(SmOp::PushParam, n as u32),
            Adr::ArrayBase(n) => self.put(SmOp::PushArray, n as u32),
            other => unreachable!("no stack push for {}", other),
        }
    }

    fn pop_into(&mut self, adr: Adr) {
        match adr {
            Adr::Var(n) => self.put(SmOp::PopVar, n as u32),
            Adr::Param(n) => self.put(SmOp::PopParam, n as u32),
            Adr::Temp(_) => unreachable!("temporaries stay on the stack"),
            other => unreachable!("no stack pop for {}", other),
        }
    }

    /// Temporaries live on the evaluation stack, so an operand that is a
    /// temp is already on top; anything else is pushed.
    fn ensure_on_stack(&mut self, adr: Adr) {
        if !matches!(adr, Adr::Temp(_)) {
            self.push_value(adr);
        }
    }

    fn store_result(&mut self, adr: Adr) {
        if !matches!(adr, Adr::Temp(_)) {
            self.pop_into(adr);
        }
    }

    fn translate(&mut self) {
        // land on main's entry once modules start executing at word zero
        let main_idx = self
            .tac
            .strings
            .iter()
            .position(|s| s == "main")
            .map(|i| i as u16);
        if let Some(main_idx) = main_idx {
            self.fixups.push(Fixup::Call(0, main_idx));
            self.put(SmOp::Br, 0);
        }

        let tac = self.tac;
        for (idx, line) in tac.lines.iter().enumerate() {
            self.line(idx, line);
        }
        self.put(SmOp::Halt, 0);

        // resolve branch targets and call entries
        for fixup in std::mem::take(&mut self.fixups) {
            match fixup {
                Fixup::Label(at, func, label) => {
                    let target = *self
                        .labels
                        .get(&(func, label))
                        .expect("branch to an unemitted label");
                    self.instrs[at].operand = target as u32;
                }
                Fixup::Call(at, name) => {
                    let target = *self
                        .entries
                        .get(&name)
                        .expect("call to an unemitted function");
                    self.instrs[at].operand = target as u32;
                }
            }
        }
    }

    fn branch(&mut self, op: SmOp, label: Adr) {
        let Adr::Label(n) = label else {
            unreachable!("branch to a non-label operand")
        };
        self.fixups
            .push(Fixup::Label(self.instrs.len(), self.current_func, n));
        self.put(op, 0);
    }

    fn line(&mut self, idx: usize, l: &crate::ir::tac::Line) {
        use crate::ir::tac::Line;
        let binary = |t: &mut Self, op: SmOp, l: &Line| {
            t.ensure_on_stack(l.middle);
            t.ensure_on_stack(l.right);
            t.put(op, 0);
            t.store_result(l.left);
        };
        match l.op {
            Op::Func => {
                let Adr::StrLit(name) = l.left else {
                    unreachable!("function marker without a name")
                };
                self.current_func = self.entries.len() + 1;
                self.entries.insert(name, self.instrs.len());
                let (params, slots) = self.frame_of(idx);
                self.put(SmOp::Alloc, slots);
                self.put(SmOp::Spill, params);
            }
            Op::Asign => {
                self.ensure_on_stack(l.right);
                self.pop_into(l.left);
            }
            Op::Store => {
                self.ensure_on_stack(l.left);
                self.ensure_on_stack(l.right);
                self.put(SmOp::StoreInd, 0);
            }
            Op::Deref => {
                self.ensure_on_stack(l.right);
                self.put(SmOp::LoadInd, 0);
                self.store_result(l.left);
            }
            Op::Itof => {
                self.ensure_on_stack(l.right);
                self.put(SmOp::ItoF, 0);
                self.store_result(l.left);
            }
            Op::Not => {
                self.ensure_on_stack(l.right);
                self.put(SmOp::NotOp, 0);
                self.store_result(l.left);
            }
            Op::AddI => binary(self, SmOp::AddI, l),
            Op::SubI => binary(self, SmOp::SubI, l),
            Op::MulI => binary(self, SmOp::MulI, l),
            Op::DivI => binary(self, SmOp::DivI, l),
            Op::Mod => binary(self, SmOp::ModI, l),
            Op::Pow => binary(self, SmOp::PowI, l),
            Op::AddF => binary(self, SmOp::AddF, l),
            Op::SubF => binary(self, SmOp::SubF, l),
            Op::MulF => binary(self, SmOp::MulF, l),
            Op::DivF => binary(self, SmOp::DivF, l),
            Op::And => binary(self, SmOp::AndB, l),
            Op::Or => binary(self, SmOp::OrB, l),
            Op::Xor => binary(self, SmOp::XorB, l),
            Op::EqI => binary(self, SmOp::CmpEqI, l),
            Op::NeqI => binary(self, SmOp::CmpNeI, l),
            Op::LtI => binary(self, SmOp::CmpLtI, l),
            Op::LteI => binary(self, SmOp::CmpLeI, l),
            Op::GtI => binary(self, SmOp::CmpGtI, l),
            Op::GteI => binary(self, SmOp::CmpGeI, l),
            Op::EqF => binary(self, SmOp::CmpEqF, l),
            Op::NeqF => binary(self, SmOp::CmpNeF, l),
            Op::LtF => binary(self, SmOp::CmpLtF, l),
            Op::LteF => binary(self, SmOp::CmpLeF, l),
            Op::GtF => binary(self, SmOp::CmpGtF, l),
            Op::GteF => binary(self, SmOp::CmpGeF, l),
            Op::True => {
                self.put(SmOp::PushOne, 0);
                self.store_result(l.left);
            }
            Op::False => {
                self.put(SmOp::PushZero, 0);
                self.store_result(l.left);
            }
            Op::Label => {
                let Adr::Label(n) = l.left else {
                    unreachable!("label line without a label operand")
                };
                self.labels
                    .insert((self.current_func, n), self.instrs.len());
            }
            Op::Goto => self.branch(SmOp::Br, l.left),
            Op::GotoF => {
                self.ensure_on_stack(l.right);
                self.branch(SmOp::BrFalse, l.left);
            }
            Op::Param => {
                // arguments travel on the evaluation stack
                self.ensure_on_stack(l.left);
            }
            Op::Call => {
                let Adr::StrLit(name) = l.left else {
                    unreachable!("call without a name")
                };
                self.fixups.push(Fixup::Call(self.instrs.len(), name));
                self.put(SmOp::CallFn, 0);
            }
            Op::CallVal => {
                let Adr::StrLit(name) = l.middle else {
                    unreachable!("call without a name")
                };
                self.fixups.push(Fixup::Call(self.instrs.len(), name));
                self.put(SmOp::CallFn, 0);
                self.store_result(l.left);
            }
            Op::RVal => {
                self.ensure_on_stack(l.left);
                self.put(SmOp::RetVal, 0);
            }
            Op::Retn => self.put(SmOp::Ret, 0),
            Op::PrintI => {
                self.ensure_on_stack(l.left);
                self.put(SmOp::PrintInt, 0);
            }
            Op::PrintF => {
                self.ensure_on_stack(l.left);
                self.put(SmOp::PrintReal, 0);
            }
            Op::PrintStr => {
                self.ensure_on_stack(l.left);
                self.put(SmOp::PrintString, 0);
            }
            Op::PrintSpc => self.put(SmOp::PrintSpace, 0),
            Op::PrintLn => self.put(SmOp::PrintNewline, 0),
            Op::ReadI => {
                self.put(SmOp::ReadInt, 0);
                self.store_result(l.left);
            }
            Op::ReadF => {
                self.put(SmOp::ReadReal, 0);
                self.store_result(l.left);
            }
        }
    }

    /// Parameter count and total slot count for the function starting at
    /// this marker, discovered the same way the x86 backend sizes frames.
    fn frame_of(&self, start: usize) -> (u32, u32) {
        let mut params = 0u32;
        let mut vars = 0u32;
        for l in &self.tac.lines[start + 1..] {
            if l.op == Op::Func {
                break;
            }
            for adr in [l.left, l.middle, l.right] {
                match adr {
                    Adr::Param(n) => params = params.max(n as u32 + 1),
                    Adr::Var(n) => vars = vars.max(n as u32 + 1),
                    _ => {}
                }
            }
        }
        (params, params + vars)
    }
}

fn translate(tac: &Tac) -> Vec<SmInstr> {
    let mut t = Translator::new(tac);
    t.translate();
    t.instrs
}

/// The `.mod` module file: instruction words (eight bytes per line), then
/// the integer, real and string pools, each preceded by its length.
pub fn emit_module(tac: &Tac) -> String {
    let instrs = translate(tac);
    let mut bytes: Vec<u8> = Vec::with_capacity(instrs.len() * 4);
    for i in &instrs {
        bytes.push(i.op as u8);
        bytes.push((i.operand >> 16) as u8);
        bytes.push((i.operand >> 8) as u8);
        bytes.push(i.operand as u8);
    }
    while bytes.len() % 8 != 0 {
        bytes.push(SmOp::NoOp as u8);
    }

    let mut out = String::new();
    let _ = writeln!(out, "{}", bytes.len() / 8);
    for chunk in bytes.chunks(8) {
        for b in chunk {
            let _ = write!(out, " {:3}", b);
        }
        out.push('\n');
    }
    let _ = writeln!(out, "{}", tac.ints.len());
    for v in &tac.ints {
        let _ = writeln!(out, "{}", v);
    }
    let _ = writeln!(out, "{}", tac.floats.len());
    for v in &tac.floats {
        let _ = writeln!(out, "{}", v);
    }
    let _ = writeln!(out, "{}", tac.strings.len());
    for s in &tac.strings {
        let _ = writeln!(out, "{}", s);
    }
    let _ = writeln!(out, "{}", tac.arrays.len());
    for len in &tac.arrays {
        let _ = writeln!(out, "{}", len);
    }
    out
}

/// Readable mnemonic listing of the translated module.
pub fn emit_listing(tac: &Tac) -> String {
    let instrs = translate(tac);
    let mut out = String::new();
    for (i, instr) in instrs.iter().enumerate() {
        let _ = writeln!(out, "{:5}: {} {}", i, instr.op.mnemonic(), instr.operand);
    }
    out
}
