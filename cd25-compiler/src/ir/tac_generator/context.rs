//! Mutable emitter state threaded through the lowering traversal.

use std::collections::HashMap;

use crate::ir::symbols::{LexemeId, Symbol, SymbolTable};
use crate::ir::tac::{Adr, Line, Op, Tac};

/// A folded global constant: its slot in the int or float pool.
#[derive(Debug, Clone, Copy)]
pub enum ConstSlot {
    Int(u16),
    Real(u16),
}

/// The emitter context. Temp and label counters are function-local and are
/// reset on entry to every function (and to the main body); the pools and
/// their dedup maps are whole-program.
pub struct Gen<'t> {
    pub table: &'t mut SymbolTable,
    pub out: Tac,
    temp_count: u16,
    label_count: u16,
    array_count: u16,
    seen_ints: HashMap<i64, u16>,
    seen_floats: HashMap<u64, u16>,
    seen_strings: HashMap<String, u16>,
    /// array-type name -> total byte length
    pub array_len: HashMap<LexemeId, u32>,
    /// array-type name -> element struct size in bytes
    pub array_stride: HashMap<LexemeId, u32>,
    /// folded global constants by name
    pub consts: HashMap<LexemeId, ConstSlot>,
}

impl<'t> Gen<'t> {
    pub fn new(table: &'t mut SymbolTable) -> Self {
        Self {
            table,
            out: Tac::new(),
            temp_count: 0,
            label_count: 0,
            array_count: 0,
            seen_ints: HashMap::new(),
            seen_floats: HashMap::new(),
            seen_strings: HashMap::new(),
            array_len: HashMap::new(),
            array_stride: HashMap::new(),
            consts: HashMap::new(),
        }
    }

    pub fn finish(self) -> Tac {
        self.out
    }

    pub fn emit(&mut self, line: Line) {
        self.out.lines.push(line);
    }

    pub fn new_temp(&mut self) -> Adr {
        let n = self.temp_count;
        self.temp_count += 1;
        Adr::Temp(n)
    }

    pub fn new_label(&mut self) -> Adr {
        let n = self.label_count;
        self.label_count += 1;
        Adr::Label(n)
    }

    /// Reset the function-local counters. Every function's temporaries and
    /// labels start at zero so backends can treat frames independently.
    pub fn reset_locals(&mut self) {
        self.temp_count = 0;
        self.label_count = 0;
    }

    pub fn next_array_base(&mut self) -> u16 {
        let n = self.array_count;
        self.array_count += 1;
        n
    }

    // ── Constant pools (whole-program, deduplicated by value) ────────────

    pub fn adr_of_int(&mut self, val: i64) -> Adr {
        if let Some(&idx) = self.seen_ints.get(&val) {
            return Adr::IntLit(idx);
        }
        let idx = self.out.ints.len() as u16;
        self.out.ints.push(val);
        self.seen_ints.insert(val, idx);
        Adr::IntLit(idx)
    }

    pub fn adr_of_float(&mut self, val: f64) -> Adr {
        if let Some(&idx) = self.seen_floats.get(&val.to_bits()) {
            return Adr::FloatLit(idx);
        }
        let idx = self.out.floats.len() as u16;
        self.out.floats.push(val);
        self.seen_floats.insert(val.to_bits(), idx);
        Adr::FloatLit(idx)
    }

    pub fn adr_of_str(&mut self, val: &str) -> Adr {
        if let Some(&idx) = self.seen_strings.get(val) {
            return Adr::StrLit(idx);
        }
        let idx = self.out.strings.len() as u16;
        self.out.strings.push(val.to_string());
        self.seen_strings.insert(val.to_string(), idx);
        Adr::StrLit(idx)
    }

    // ── Symbol helpers ───────────────────────────────────────────────────

    pub fn text(&self, sym: Symbol) -> String {
        self.table.text(sym).to_string()
    }

    /// Integer literal glyphs were validated by the lexer.
    pub fn sym_int(&self, sym: Symbol) -> i64 {
        self.table.text(sym).parse().unwrap_or(0)
    }

    pub fn sym_float(&self, sym: Symbol) -> f64 {
        self.table.text(sym).parse().unwrap_or(0.0)
    }

    pub fn emit_itof(&mut self, value: Adr, line: u32) -> Adr {
        let tmp = self.new_temp();
        self.emit(Line::binary(Op::Itof, tmp, value, line));
        tmp
    }
}
