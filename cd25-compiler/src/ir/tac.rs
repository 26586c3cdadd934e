//! The three-address-code program: a flat instruction list plus the four
//! whole-program constant pools (integers, reals, strings, array sizes).
//!
//! Temp/Var/Param/Label numbering is function-local and restarts at every
//! `Func` marker line; the pool-indexed operands are global. Consumers may
//! run a forward lookahead from any `Param` line to the next `Call`/
//! `CallVal` to recover positional argument numbering.

use std::fmt;

/// TAC operand. The payload is a function-local slot number for
/// `Temp`/`Label`/`Var`/`Param`, and a pool index for the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Adr {
    Empty,
    Temp(u16),
    Label(u16),
    Var(u16),
    Param(u16),
    ArrayBase(u16),
    IntLit(u16),
    FloatLit(u16),
    StrLit(u16),
}

impl fmt::Display for Adr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Adr::Empty => write!(f, "_"),
            Adr::Temp(n) => write!(f, "T{}", n),
            Adr::Label(n) => write!(f, "L{}", n),
            Adr::Var(n) => write!(f, "V{}", n),
            Adr::Param(n) => write!(f, "P{}", n),
            Adr::ArrayBase(n) => write!(f, "A{}", n),
            Adr::IntLit(n) => write!(f, "I{}", n),
            Adr::FloatLit(n) => write!(f, "F{}", n),
            Adr::StrLit(n) => write!(f, "S{}", n),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    // data movement
    Asign,
    Store,
    Deref,
    Itof,
    Not,
    // arithmetic
    AddI,
    AddF,
    SubI,
    SubF,
    MulI,
    MulF,
    DivI,
    DivF,
    Mod,
    Pow,
    // comparisons
    EqI,
    NeqI,
    LtI,
    LteI,
    GtI,
    GteI,
    EqF,
    NeqF,
    LtF,
    LteF,
    GtF,
    GteF,
    // booleans
    And,
    Or,
    Xor,
    True,
    False,
    // control flow
    Label,
    Goto,
    GotoF,
    // functions
    Func,
    Param,
    Call,
    CallVal,
    RVal,
    Retn,
    // io
    PrintI,
    PrintF,
    PrintStr,
    PrintSpc,
    PrintLn,
    ReadI,
    ReadF,
}

impl Op {
    pub fn mnemonic(self) -> &'static str {
        match self {
            Op::Asign => "ASIGN",
            Op::Store => "STORE",
            Op::Deref => "DEREF",
            Op::Itof => "ITOF",
            Op::Not => "NOT",
            Op::AddI => "ADDI",
            Op::AddF => "ADDF",
            Op::SubI => "SUBI",
            Op::SubF => "SUBF",
            Op::MulI => "MULI",
            Op::MulF => "MULF",
            Op::DivI => "DIVI",
            Op::DivF => "DIVF",
            Op::Mod => "MOD",
            Op::Pow => "POW",
            Op::EqI => "EQI",
            Op::NeqI => "NEQI",
            Op::LtI => "LTI",
            Op::LteI => "LTEI",
            Op::GtI => "GTI",
            Op::GteI => "GTEI",
            Op::EqF => "EQF",
            Op::NeqF => "NEQF",
            Op::LtF => "LTF",
            Op::LteF => "LTEF",
            Op::GtF => "GTF",
            Op::GteF => "GTEF",
            Op::And => "AND",
            Op::Or => "OR",
            Op::Xor => "XOR",
            Op::True => "TRUE",
            Op::False => "FALSE",
            Op::Label => "LABEL",
            Op::Goto => "GOTO",
            Op::GotoF => "GOTOF",
            Op::Func => "FUNC",
            Op::Param => "PARAM",
            Op::Call => "CALL",
            Op::CallVal => "CALLVAL",
            Op::RVal => "RVAL",
            Op::Retn => "RETN",
            Op::PrintI => "PRINTI",
            Op::PrintF => "PRINTF",
            Op::PrintStr => "PRINTSTR",
            Op::PrintSpc => "PRINTSPC",
            Op::PrintLn => "PRINTLN",
            Op::ReadI => "READI",
            Op::ReadF => "READF",
        }
    }
}

/// One instruction: an operation, up to three operands, and the source line
/// it came from (0 when synthetic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Line {
    pub op: Op,
    pub left: Adr,
    pub middle: Adr,
    pub right: Adr,
    pub line: u32,
}

impl Line {
    pub fn ternary(op: Op, left: Adr, middle: Adr, right: Adr, line: u32) -> Self {
        Self {
            op,
            left,
            middle,
            right,
            line,
        }
    }

    pub fn binary(op: Op, left: Adr, right: Adr, line: u32) -> Self {
        Self::ternary(op, left, Adr::Empty, right, line)
    }

    pub fn unary(op: Op, left: Adr, line: u32) -> Self {
        Self::ternary(op, left, Adr::Empty, Adr::Empty, line)
    }

    pub fn nonary(op: Op, line: u32) -> Self {
        Self::ternary(op, Adr::Empty, Adr::Empty, Adr::Empty, line)
    }
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.op {
            Op::Asign => write!(f, "{} = {}", self.left, self.right),
            Op::Func => write!(f, "_{}:", self.left),
            Op::CallVal => write!(
                f,
                "{} = {} {} {}",
                self.left,
                self.op.mnemonic(),
                self.middle,
                self.right
            ),
            Op::PrintLn | Op::PrintSpc | Op::Retn => write!(f, "{}", self.op.mnemonic()),
            Op::PrintI | Op::PrintF | Op::PrintStr | Op::Label | Op::Goto | Op::Param
            | Op::RVal => {
                write!(f, "{} {}", self.op.mnemonic(), self.left)
            }
            Op::ReadI | Op::ReadF | Op::True | Op::False => {
                write!(f, "{} = {}", self.left, self.op.mnemonic())
            }
            Op::GotoF | Op::Call | Op::Store => {
                write!(f, "{} {} {}", self.op.mnemonic(), self.left, self.right)
            }
            Op::Itof | Op::Not | Op::Deref => {
                write!(f, "{} = {} {}", self.left, self.op.mnemonic(), self.right)
            }
            _ => write!(
                f,
                "{} = {} {} {}",
                self.left,
                self.middle,
                self.op.mnemonic(),
                self.right
            ),
        }
    }
}

/// The lowered program: lines plus pools. Read-only once emission finishes.
#[derive(Debug, Default)]
pub struct Tac {
    pub lines: Vec<Line>,
    pub ints: Vec<i64>,
    pub floats: Vec<f64>,
    pub strings: Vec<String>,
    /// Byte length of each declared global array, in declaration order; an
    /// `ArrayBase(n)` operand indexes this pool.
    pub arrays: Vec<u32>,
}

impl Tac {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn int_at(&self, adr: Adr) -> i64 {
        match adr {
            Adr::IntLit(n) => self.ints[n as usize],
            _ => panic!("expected an integer-pool operand, got {}", adr),
        }
    }

    pub fn float_at(&self, adr: Adr) -> f64 {
        match adr {
            Adr::FloatLit(n) => self.floats[n as usize],
            _ => panic!("expected a float-pool operand, got {}", adr),
        }
    }

    pub fn string_at(&self, adr: Adr) -> &str {
        match adr {
            Adr::StrLit(n) => &self.strings[n as usize],
            _ => panic!("expected a string-pool operand, got {}", adr),
        }
    }

    /// Debug rendering: pools then code, one instruction per line.
    pub fn to_lines(&self) -> Vec<String> {
        let mut out = Vec::new();
        out.push(".arrays (zero-init):".to_string());
        for (i, len) in self.arrays.iter().enumerate() {
            out.push(format!("A{}: {}", i, len));
        }
        out.push(".ints:".to_string());
        for (i, v) in self.ints.iter().enumerate() {
            out.push(format!("I{}: {}", i, v));
        }
        out.push(".floats:".to_string());
        for (i, v) in self.floats.iter().enumerate() {
            out.push(format!("F{}: {}", i, v));
        }
        out.push(".strings:".to_string());
        for (i, s) in self.strings.iter().enumerate() {
            out.push(format!("S{}: \"{}\"", i, s));
        }
        out.push(".code:".to_string());
        for l in &self.lines {
            if l.line != 0 {
                out.push(format!("{}: {}", l.line, l));
            } else {
                out.push(l.to_string());
            }
        }
        out
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for line in self.to_lines() {
            out.push_str(&line);
            out.push('\n');
        }
        out
    }
}
